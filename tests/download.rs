mod common;

use common::{content, dead_addr, torrent, Behavior, Seeder};
use leech::{
    ConnectionPool, Download, DownloadConfig, DownloadError, MemorySink, PieceSelection,
    PoolConfig, RandomIdentity, WriterSink,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn config(max_sessions: usize) -> DownloadConfig {
    DownloadConfig {
        pool: PoolConfig {
            max_sessions: Some(max_sessions),
            ..PoolConfig::default()
        },
        ..DownloadConfig::default()
    }
}

async fn run(
    metainfo: &leech::Metainfo,
    peers: Vec<SocketAddr>,
    config: DownloadConfig,
    selection: PieceSelection,
    sink: &mut MemorySink,
) -> Result<leech::DownloadStats, DownloadError> {
    let cancel = CancellationToken::new();
    let pool = ConnectionPool::new(
        metainfo.info_hash,
        config.pool.clone(),
        Arc::new(RandomIdentity),
        cancel.clone(),
    );
    let result = Download::new(metainfo, &pool, config, cancel)
        .with_candidates(peers)
        .run(selection, sink)
        .await;
    pool.drain_all();
    result
}

#[tokio::test]
async fn two_pieces_from_one_peer() {
    let data = content(48_000);
    let (metainfo, _) = torrent(&data, 32_768);
    assert_eq!(metainfo.info.piece_count(), 2);
    let seeder = Seeder::spawn(&metainfo, &data, None, Behavior::default()).await;

    let mut sink = MemorySink::new();
    let stats = run(
        &metainfo,
        vec![seeder.addr],
        config(4),
        PieceSelection::All,
        &mut sink,
    )
    .await
    .unwrap();

    assert_eq!(stats.pieces_verified, 2);
    assert_eq!(stats.bytes_written, 48_000);
    let pieces = sink.pieces();
    assert_eq!(pieces.len(), 2);
    assert_eq!(pieces[0].0, 0);
    assert_eq!(pieces[1].0, 32_768);
    assert_eq!(pieces[0].1.len() + pieces[1].1.len(), 48_000);
    assert_eq!(sink.into_bytes(), data);
}

#[tokio::test]
async fn pieces_spread_over_several_peers() {
    let data = content(200_000);
    let (metainfo, _) = torrent(&data, 32_768);
    let mut peers = Vec::new();
    let mut seeders = Vec::new();
    for _ in 0..3 {
        let seeder = Seeder::spawn(&metainfo, &data, None, Behavior::default()).await;
        peers.push(seeder.addr);
        seeders.push(seeder);
    }

    let mut sink = MemorySink::new();
    let stats = run(&metainfo, peers, config(3), PieceSelection::All, &mut sink)
        .await
        .unwrap();

    assert_eq!(stats.pieces_verified, metainfo.info.piece_count());
    assert_eq!(stats.hash_failures, 0);
    assert_eq!(sink.into_bytes(), data);
}

#[tokio::test]
async fn corrupt_peer_is_evicted_and_pieces_retried() {
    let data = content(200_000);
    let (metainfo, _) = torrent(&data, 32_768);
    let all: Vec<u32> = (0..metainfo.info.piece_count() as u32).collect();
    let corrupt = Seeder::spawn(
        &metainfo,
        &data,
        None,
        Behavior {
            corrupt: all.into_iter().collect(),
            ..Behavior::default()
        },
    )
    .await;
    let honest = Seeder::spawn(&metainfo, &data, None, Behavior::default()).await;

    let mut sink = MemorySink::new();
    let stats = run(
        &metainfo,
        vec![corrupt.addr, honest.addr],
        config(2),
        PieceSelection::All,
        &mut sink,
    )
    .await
    .unwrap();

    assert!(stats.hash_failures >= 1);
    assert!(stats.hash_failures <= 2);
    assert_eq!(stats.pieces_verified, metainfo.info.piece_count());
    assert_eq!(sink.into_bytes(), data);
}

#[tokio::test]
async fn only_corrupt_peers_exhaust_the_swarm() {
    let data = content(100_000);
    let (metainfo, _) = torrent(&data, 32_768);
    let seeder = Seeder::spawn(
        &metainfo,
        &data,
        None,
        Behavior {
            corrupt: [1].into_iter().collect(),
            ..Behavior::default()
        },
    )
    .await;

    let mut sink = MemorySink::new();
    let result = run(
        &metainfo,
        vec![seeder.addr],
        config(2),
        PieceSelection::All,
        &mut sink,
    )
    .await;

    assert!(matches!(result, Err(DownloadError::SwarmExhausted { .. })));
    // Piece 0 verified, piece 1 never did, so nothing past it was written.
    assert_eq!(sink.pieces().len(), 1);
    assert_eq!(sink.pieces()[0].0, 0);
}

#[tokio::test]
async fn partial_seeders_cover_each_other() {
    let data = content(130_000);
    let (metainfo, _) = torrent(&data, 32_768);
    let evens = Seeder::spawn(
        &metainfo,
        &data,
        None,
        Behavior {
            have: Some(vec![0, 2, 4]),
            ..Behavior::default()
        },
    )
    .await;
    let odds = Seeder::spawn(
        &metainfo,
        &data,
        None,
        Behavior {
            have: Some(vec![1, 3]),
            extensions: false,
            ..Behavior::default()
        },
    )
    .await;

    let mut sink = MemorySink::new();
    let stats = run(
        &metainfo,
        vec![evens.addr, odds.addr],
        config(2),
        PieceSelection::All,
        &mut sink,
    )
    .await
    .unwrap();

    assert_eq!(stats.peers_evicted, 0);
    assert_eq!(sink.into_bytes(), data);
}

#[tokio::test]
async fn single_piece_mode() {
    let data = content(100_000);
    let (metainfo, _) = torrent(&data, 32_768);
    let seeder = Seeder::spawn(&metainfo, &data, None, Behavior::default()).await;

    let mut sink = MemorySink::new();
    let stats = run(
        &metainfo,
        vec![seeder.addr],
        config(2),
        PieceSelection::Single(3),
        &mut sink,
    )
    .await
    .unwrap();

    assert_eq!(stats.pieces_verified, 1);
    assert_eq!(sink.pieces().len(), 1);
    assert_eq!(sink.pieces()[0].0, 3 * 32_768);
    assert_eq!(&sink.pieces()[0].1[..], &data[3 * 32_768..]);
}

#[tokio::test]
async fn unreachable_candidates_are_replaced() {
    let data = content(70_000);
    let (metainfo, _) = torrent(&data, 32_768);
    let seeder = Seeder::spawn(&metainfo, &data, None, Behavior::default()).await;

    let mut sink = MemorySink::new();
    run(
        &metainfo,
        vec![dead_addr(), dead_addr(), seeder.addr],
        config(1),
        PieceSelection::All,
        &mut sink,
    )
    .await
    .unwrap();
    assert_eq!(sink.into_bytes(), data);
}

#[tokio::test]
async fn no_reachable_peers() {
    let data = content(70_000);
    let (metainfo, _) = torrent(&data, 32_768);

    let mut sink = MemorySink::new();
    let result = run(
        &metainfo,
        vec![dead_addr()],
        config(2),
        PieceSelection::All,
        &mut sink,
    )
    .await;
    assert!(matches!(
        result,
        Err(DownloadError::SwarmExhausted { remaining: 3 })
    ));
    assert!(sink.is_empty());
}

#[tokio::test]
async fn stalled_download_can_be_cancelled() {
    let data = content(70_000);
    let (metainfo, _) = torrent(&data, 32_768);
    let seeder = Seeder::spawn(
        &metainfo,
        &data,
        None,
        Behavior {
            never_unchoke: true,
            ..Behavior::default()
        },
    )
    .await;

    let cancel = CancellationToken::new();
    let config = config(2);
    let pool = ConnectionPool::new(
        metainfo.info_hash,
        config.pool.clone(),
        Arc::new(RandomIdentity),
        cancel.clone(),
    );

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let result = Download::new(&metainfo, &pool, config, cancel)
        .with_candidates([seeder.addr])
        .run(PieceSelection::All, MemorySink::new())
        .await;
    assert!(matches!(result, Err(DownloadError::Cancelled)));
}

#[tokio::test]
async fn streams_into_a_writer() {
    let data = content(100_000);
    let (metainfo, _) = torrent(&data, 16_384);
    let seeder = Seeder::spawn(&metainfo, &data, None, Behavior::default()).await;

    let cancel = CancellationToken::new();
    let config = config(2);
    let pool = ConnectionPool::new(
        metainfo.info_hash,
        config.pool.clone(),
        Arc::new(RandomIdentity),
        cancel.clone(),
    );

    let mut sink = WriterSink::new(Vec::new());
    Download::new(&metainfo, &pool, config, cancel)
        .with_candidates([seeder.addr])
        .run(PieceSelection::All, &mut sink)
        .await
        .unwrap();
    assert_eq!(sink.into_inner(), data);
}
