use super::*;
use crate::bencode::{encode, Value};
use crate::config::PoolConfig;
use crate::metainfo::{InfoHash, MagnetLink};
use crate::peer::{FixedIdentity, PeerId, RandomIdentity};
use crate::tracker::{Announce, AnnounceRequest, AnnounceResponse, TrackerError};
use parking_lot::Mutex;

fn metainfo(length: i64, piece_length: i64, piece_count: usize) -> Metainfo {
    let info = Value::dict([
        ("length", Value::Integer(length)),
        ("name", Value::string("test.bin")),
        ("piece length", Value::Integer(piece_length)),
        ("pieces", Value::Bytes(Bytes::from(vec![0u8; piece_count * 20]))),
    ]);
    Metainfo::from_info_bytes(&encode(&info), vec!["http://tracker.test/announce".into()]).unwrap()
}

fn empty_pool(info_hash: InfoHash, cancel: CancellationToken) -> ConnectionPool {
    ConnectionPool::new(info_hash, PoolConfig::default(), Arc::new(RandomIdentity), cancel)
}

struct NoPeers {
    requests: Mutex<Vec<AnnounceRequest>>,
}

impl NoPeers {
    fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl Announce for NoPeers {
    async fn announce(
        &self,
        _announce: &str,
        request: &AnnounceRequest,
    ) -> Result<AnnounceResponse, TrackerError> {
        self.requests.lock().push(request.clone());
        AnnounceResponse::from_bytes(b"d8:intervali900e5:peers0:e")
    }
}

struct Failing;

impl Announce for Failing {
    async fn announce(
        &self,
        _announce: &str,
        _request: &AnnounceRequest,
    ) -> Result<AnnounceResponse, TrackerError> {
        Err(TrackerError::Failure("torrent not registered".into()))
    }
}

#[test]
fn test_piece_selection() {
    assert_eq!(PieceSelection::All.indices(3).unwrap(), vec![0, 1, 2]);
    assert_eq!(PieceSelection::Single(2).indices(3).unwrap(), vec![2]);
    assert!(matches!(
        PieceSelection::Single(3).indices(3),
        Err(DownloadError::PieceOutOfRange { index: 3, count: 3 })
    ));
}

#[test]
fn test_memory_sink() {
    let mut sink = MemorySink::new();
    assert!(sink.is_empty());
    sink.write_piece(0, Bytes::from_static(b"abc")).unwrap();
    sink.write_piece(3, Bytes::from_static(b"de")).unwrap();

    assert_eq!(sink.len(), 5);
    assert_eq!(sink.pieces()[1].0, 3);
    assert_eq!(sink.into_bytes(), b"abcde");
}

#[test]
fn test_writer_sink_requires_contiguous_pieces() {
    let mut sink = WriterSink::new(Vec::new());
    sink.write_piece(16, Bytes::from_static(b"0123")).unwrap();
    sink.write_piece(20, Bytes::from_static(b"45")).unwrap();

    let err = sink.write_piece(30, Bytes::from_static(b"x")).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    assert_eq!(sink.into_inner(), b"012345");
}

#[tokio::test]
async fn test_empty_swarm_is_exhausted() {
    let torrent = metainfo(40, 16, 3);
    let cancel = CancellationToken::new();
    let pool = empty_pool(torrent.info_hash, cancel.clone());
    let mut sink = MemorySink::new();

    let result = Download::new(&torrent, &pool, DownloadConfig::default(), cancel)
        .run(PieceSelection::All, &mut sink)
        .await;

    assert!(matches!(
        result,
        Err(DownloadError::SwarmExhausted { remaining: 3 })
    ));
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_single_piece_out_of_range() {
    let torrent = metainfo(40, 16, 3);
    let cancel = CancellationToken::new();
    let pool = empty_pool(torrent.info_hash, cancel.clone());

    let result = Download::new(&torrent, &pool, DownloadConfig::default(), cancel)
        .run(PieceSelection::Single(7), MemorySink::new())
        .await;
    assert!(matches!(
        result,
        Err(DownloadError::PieceOutOfRange { index: 7, count: 3 })
    ));
}

#[tokio::test]
async fn test_cancelled_download() {
    let torrent = metainfo(40, 16, 3);
    let cancel = CancellationToken::new();
    let pool = empty_pool(torrent.info_hash, cancel.clone());
    cancel.cancel();

    let result = Download::new(&torrent, &pool, DownloadConfig::default(), cancel)
        .with_candidates(["127.0.0.1:1".parse().unwrap()])
        .run(PieceSelection::All, MemorySink::new())
        .await;
    assert!(matches!(result, Err(DownloadError::Cancelled)));
}

#[tokio::test]
async fn test_client_announces_with_configured_identity() {
    let torrent = metainfo(40, 16, 3);
    let peer_id = PeerId(*b"-LE0001-fixedfixedfi");
    let config = DownloadConfig {
        port: 7000,
        ..DownloadConfig::default()
    };
    let client = Client::with_tracker(NoPeers::new(), config)
        .with_identity(Arc::new(FixedIdentity(peer_id)));

    let result = client
        .download(&torrent, PieceSelection::All, MemorySink::new())
        .await;
    assert!(matches!(
        result,
        Err(DownloadError::SwarmExhausted { remaining: 3 })
    ));

    let requests = client.tracker().requests.lock();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].peer_id, peer_id.0);
    assert_eq!(requests[0].port, 7000);
    assert_eq!(requests[0].left, 40);
    assert_eq!(requests[0].info_hash, torrent.info_hash);
}

#[tokio::test]
async fn test_client_checks_selection_before_announcing() {
    let torrent = metainfo(40, 16, 3);
    let client = Client::with_tracker(NoPeers::new(), DownloadConfig::default());

    let result = client
        .download(&torrent, PieceSelection::Single(3), MemorySink::new())
        .await;
    assert!(matches!(result, Err(DownloadError::PieceOutOfRange { .. })));
    assert!(client.tracker().requests.lock().is_empty());
}

#[tokio::test]
async fn test_client_surfaces_tracker_failure() {
    let torrent = metainfo(40, 16, 3);
    let client = Client::with_tracker(Failing, DownloadConfig::default());

    let result = client
        .download(&torrent, PieceSelection::All, MemorySink::new())
        .await;
    assert!(matches!(
        result,
        Err(DownloadError::Tracker(TrackerError::Failure(_)))
    ));
}

#[tokio::test]
async fn test_magnet_without_peers() {
    let magnet = MagnetLink::new(InfoHash([3u8; 20])).with_tracker("http://tracker.test/announce");
    let client = Client::with_tracker(NoPeers::new(), DownloadConfig::default());

    assert!(matches!(
        client.resolve_magnet(&magnet).await,
        Err(DownloadError::MetadataUnavailable)
    ));
    let requests = client.tracker().requests.lock();
    assert_eq!(requests[0].left, 1);
    assert_eq!(requests[0].info_hash, magnet.info_hash);
}
