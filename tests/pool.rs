mod common;

use common::{content, dead_addr, torrent, Behavior, Seeder};
use leech::{ConnectionPool, PoolConfig, RandomIdentity};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn pool(info_hash: leech::InfoHash, max_sessions: usize) -> ConnectionPool {
    ConnectionPool::new(
        info_hash,
        PoolConfig {
            max_sessions: Some(max_sessions),
            ..PoolConfig::default()
        },
        Arc::new(RandomIdentity),
        CancellationToken::new(),
    )
}

#[tokio::test]
async fn admission_never_exceeds_bound() {
    let data = content(50_000);
    let (metainfo, _) = torrent(&data, 16_384);

    let mut seeders = Vec::new();
    for _ in 0..6 {
        seeders.push(Seeder::spawn(&metainfo, &data, None, Behavior::default()).await);
    }

    let pool = pool(metainfo.info_hash, 2);
    let admitted = pool.admit(seeders.iter().map(|s| s.addr)).await;

    assert_eq!(admitted.len(), 2);
    assert_eq!(pool.size(), 2);
    let dialed: usize = seeders.iter().map(Seeder::connections).sum();
    assert_eq!(dialed, 2);

    // A second round has no room left and dials nobody.
    assert!(pool.admit(seeders.iter().map(|s| s.addr)).await.is_empty());
    let dialed: usize = seeders.iter().map(Seeder::connections).sum();
    assert_eq!(dialed, 2);
}

#[tokio::test]
async fn failed_handshakes_do_not_count() {
    let data = content(50_000);
    let (metainfo, _) = torrent(&data, 16_384);
    let liar = Seeder::spawn(
        &metainfo,
        &data,
        None,
        Behavior {
            wrong_info_hash: true,
            ..Behavior::default()
        },
    )
    .await;
    let good = Seeder::spawn(&metainfo, &data, None, Behavior::default()).await;

    let pool = pool(metainfo.info_hash, 1);
    let admitted = pool
        .admit([dead_addr(), liar.addr, liar.addr, good.addr])
        .await;

    assert_eq!(admitted, vec![good.addr]);
    assert_eq!(pool.addrs(), vec![good.addr]);
    assert_eq!(liar.connections(), 1);
}

#[tokio::test]
async fn pooled_sessions_serve_pieces() {
    let data = content(50_000);
    let (metainfo, _) = torrent(&data, 16_384);
    let seeder = Seeder::spawn(&metainfo, &data, None, Behavior::default()).await;

    let pool = pool(metainfo.info_hash, 4);
    pool.admit([seeder.addr]).await;

    let pieces = &metainfo.info.pieces;
    let (a, b) = tokio::join!(
        pool.download_piece(seeder.addr, pieces[0].clone()),
        pool.download_piece(seeder.addr, pieces[3].clone()),
    );
    assert_eq!(&a.unwrap()[..], &data[..16_384]);
    assert_eq!(&b.unwrap()[..], &data[3 * 16_384..]);
}

#[tokio::test]
async fn removing_last_session_fires_callback_once() {
    let data = content(50_000);
    let (metainfo, _) = torrent(&data, 16_384);
    let mut seeders = Vec::new();
    for _ in 0..3 {
        seeders.push(Seeder::spawn(&metainfo, &data, None, Behavior::default()).await);
    }

    let pool = Arc::new(pool(metainfo.info_hash, 3));
    pool.admit(seeders.iter().map(|s| s.addr)).await;
    assert_eq!(pool.size(), 3);

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    pool.on_drained(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let removals: Vec<_> = seeders
        .iter()
        .map(|s| {
            let pool = pool.clone();
            let addr = s.addr;
            tokio::spawn(async move { pool.remove(addr) })
        })
        .collect();
    for removal in removals {
        assert!(removal.await.unwrap());
    }

    assert_eq!(pool.size(), 0);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn drain_all_closes_sessions() {
    let data = content(50_000);
    let (metainfo, _) = torrent(&data, 16_384);
    let seeder = Seeder::spawn(&metainfo, &data, None, Behavior::default()).await;

    let pool = pool(metainfo.info_hash, 2);
    pool.admit([seeder.addr]).await;
    let handle = pool.get(seeder.addr).unwrap();

    assert_eq!(pool.drain_all(), 1);
    assert_eq!(pool.size(), 0);
    assert!(handle.download_piece(metainfo.info.pieces[0].clone()).await.is_err());
}
