//! In-process seeding peer for socket-level tests.

#![allow(dead_code)]

use bytes::Bytes;
use leech::bencode::{encode, Value};
use leech::constants::{BLOCK_SIZE, METADATA_PIECE_SIZE};
use leech::peer::{
    Bitfield, ExtensionHandshake, Handshake, Message, MetadataMessage, MetadataMessageType,
    PeerTransport, UT_METADATA,
};
use leech::{InfoHash, Metainfo};
use parking_lot::Mutex;
use sha1::{Digest, Sha1};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::Instant;

/// The ut_metadata id the seeder asks to receive requests on.
const SEEDER_METADATA_ID: u8 = 2;

/// Builds a single-file torrent over `content` and returns it with its raw
/// info dictionary.
pub fn torrent(content: &[u8], piece_length: usize) -> (Metainfo, Bytes) {
    let mut hashes = Vec::new();
    for chunk in content.chunks(piece_length) {
        hashes.extend_from_slice(&Sha1::digest(chunk));
    }

    let info = Value::dict([
        ("length", Value::Integer(content.len() as i64)),
        ("name", Value::string("payload.bin")),
        ("piece length", Value::Integer(piece_length as i64)),
        ("pieces", Value::Bytes(Bytes::from(hashes))),
    ]);
    let raw = Bytes::from(encode(&info));
    let trackers = vec!["http://tracker.test/announce".to_string()];
    let metainfo = Metainfo::from_info_bytes(&raw, trackers).unwrap();
    (metainfo, raw)
}

/// Deterministic test content.
pub fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}

/// How the seeder misbehaves.
#[derive(Debug, Clone)]
pub struct Behavior {
    /// Advertise the extension protocol and answer the extension handshake.
    pub extensions: bool,
    /// Advertise only these pieces; `None` advertises all of them.
    pub have: Option<Vec<u32>>,
    /// Pieces whose data is served corrupted.
    pub corrupt: HashSet<u32>,
    /// Hold a piece's requests and answer them in reverse order.
    pub reverse_blocks: bool,
    /// Choke and unchoke again right after the first block served.
    pub choke_mid_piece: bool,
    /// Send a keep-alive before every block.
    pub keep_alive: bool,
    /// Never unchoke.
    pub never_unchoke: bool,
    /// Answer the handshake with a different info hash.
    pub wrong_info_hash: bool,
    /// Reject every metadata request.
    pub reject_metadata: bool,
    /// Announce a piece index no bitfield could hold.
    pub oversized_have: bool,
    /// Send an unknown message id before every block.
    pub unknown_messages: bool,
    /// Write the extension handshake with its keys out of order.
    pub unsorted_handshake: bool,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            extensions: true,
            have: None,
            corrupt: HashSet::new(),
            reverse_blocks: false,
            choke_mid_piece: false,
            keep_alive: false,
            never_unchoke: false,
            wrong_info_hash: false,
            reject_metadata: false,
            oversized_have: false,
            unknown_messages: false,
            unsorted_handshake: false,
        }
    }
}

struct Shared {
    info_hash: InfoHash,
    piece_length: usize,
    content: Vec<u8>,
    raw_info: Option<Bytes>,
    behavior: Behavior,
    connections: AtomicUsize,
    blocks_served: AtomicUsize,
    peer_ids: Mutex<Vec<[u8; 20]>>,
}

/// A listening seeder. Every accepted connection is served on its own task.
pub struct Seeder {
    pub addr: SocketAddr,
    shared: Arc<Shared>,
}

impl Seeder {
    /// Seeds `content` for `metainfo`. When `raw_info` is given, the info
    /// dictionary is also served over ut_metadata.
    pub async fn spawn(
        metainfo: &Metainfo,
        content: &[u8],
        raw_info: Option<Bytes>,
        behavior: Behavior,
    ) -> Seeder {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new(Shared {
            info_hash: metainfo.info_hash,
            piece_length: metainfo.info.piece_length as usize,
            content: content.to_vec(),
            raw_info,
            behavior,
            connections: AtomicUsize::new(0),
            blocks_served: AtomicUsize::new(0),
            peer_ids: Mutex::new(Vec::new()),
        });

        let accept_shared = shared.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_shared.connections.fetch_add(1, Ordering::SeqCst);
                let conn_shared = accept_shared.clone();
                tokio::spawn(async move {
                    let transport = PeerTransport::new(stream, Duration::from_secs(5));
                    let _ = serve(transport, conn_shared).await;
                });
            }
        });

        Seeder { addr, shared }
    }

    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    pub fn blocks_served(&self) -> usize {
        self.shared.blocks_served.load(Ordering::SeqCst)
    }

    /// Peer ids from every handshake received so far.
    pub fn peer_ids(&self) -> Vec<[u8; 20]> {
        self.shared.peer_ids.lock().clone()
    }
}

/// An address nothing listens on.
pub fn dead_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

fn deadline() -> Instant {
    Instant::now() + Duration::from_secs(30)
}

async fn serve(
    mut transport: PeerTransport,
    shared: Arc<Shared>,
) -> Result<(), leech::PeerError> {
    let behavior = &shared.behavior;
    let theirs = transport.receive_handshake(deadline()).await?;
    shared.peer_ids.lock().push(theirs.peer_id);

    let info_hash = if behavior.wrong_info_hash {
        InfoHash([0xEE; 20])
    } else {
        shared.info_hash
    };
    transport
        .send_handshake(&Handshake::new(
            info_hash,
            *b"-SD0001-seedseedseed",
            behavior.extensions,
        ))
        .await?;

    let extended = behavior.extensions && theirs.supports_extension_protocol();
    if extended {
        let mut ours = ExtensionHandshake::new();
        if let Some(raw) = &shared.raw_info {
            ours.extensions
                .insert(UT_METADATA.to_string(), SEEDER_METADATA_ID);
            ours.metadata_size = Some(raw.len() as i64);
        }
        ours.client = Some("seeder".into());
        let payload = if behavior.unsorted_handshake {
            unsorted_handshake(&ours)
        } else {
            ours.encode()
        };
        transport
            .send_message(&Message::Extended { id: 0, payload })
            .await?;
    }

    let piece_count = shared.content.len().div_ceil(shared.piece_length);
    let bitfield = match &behavior.have {
        Some(have) => {
            let mut bf = Bitfield::new(piece_count);
            for &index in have {
                bf.set_piece(index as usize);
            }
            bf
        }
        None => Bitfield::full(piece_count),
    };
    transport
        .send_message(&Message::Bitfield(bitfield.to_bytes()))
        .await?;

    let mut their_metadata_id = None;
    let mut held: Vec<(u32, u32, u32)> = Vec::new();
    let mut choked_once = false;

    loop {
        match transport.receive_message(deadline()).await? {
            Message::Interested if behavior.oversized_have => {
                transport
                    .send_message(&Message::Have { piece: u32::MAX })
                    .await?;
            }
            Message::Interested if !behavior.never_unchoke => {
                transport.send_message(&Message::Unchoke).await?;
            }
            Message::Request {
                index,
                begin,
                length,
            } => {
                if !behavior.reverse_blocks {
                    send_block(&mut transport, &shared, index, begin, length).await?;
                } else {
                    held.push((index, begin, length));
                    let piece_len = piece_length(&shared, index);
                    let blocks = piece_len.div_ceil(BLOCK_SIZE as usize);
                    if held.len() == blocks {
                        for (index, begin, length) in held.drain(..).rev() {
                            send_block(&mut transport, &shared, index, begin, length).await?;
                        }
                    }
                }

                if behavior.choke_mid_piece && !choked_once {
                    choked_once = true;
                    transport.send_message(&Message::Choke).await?;
                    transport.send_message(&Message::Unchoke).await?;
                }
            }
            Message::Extended { id: 0, payload } => {
                let hs = ExtensionHandshake::decode(&payload)?;
                their_metadata_id = hs.get_extension_id(UT_METADATA);
            }
            Message::Extended {
                id: SEEDER_METADATA_ID,
                payload,
            } => {
                let (Some(raw), Some(reply_id)) = (&shared.raw_info, their_metadata_id) else {
                    continue;
                };
                let request = MetadataMessage::decode(&payload)?;
                if request.msg_type != MetadataMessageType::Request {
                    continue;
                }

                let reply = if behavior.reject_metadata {
                    MetadataMessage::reject(request.piece)
                } else {
                    let start = request.piece as usize * METADATA_PIECE_SIZE;
                    let end = (start + METADATA_PIECE_SIZE).min(raw.len());
                    MetadataMessage::data(request.piece, raw.len() as u64, raw.slice(start..end))
                };
                transport
                    .send_message(&Message::Extended {
                        id: reply_id,
                        payload: reply.encode(),
                    })
                    .await?;
            }
            _ => {}
        }
    }
}

/// The handshake with `v` ahead of `m`, the way some clients write it.
fn unsorted_handshake(hs: &ExtensionHandshake) -> Bytes {
    let client = hs.client.as_deref().unwrap_or_default();
    let mut out = format!("d1:v{}:{}1:md", client.len(), client);
    for (name, id) in &hs.extensions {
        out.push_str(&format!("{}:{}i{}e", name.len(), name, id));
    }
    out.push('e');
    if let Some(size) = hs.metadata_size {
        out.push_str(&format!("13:metadata_sizei{}e", size));
    }
    out.push('e');
    Bytes::from(out)
}

fn piece_length(shared: &Shared, index: u32) -> usize {
    let start = index as usize * shared.piece_length;
    shared.piece_length.min(shared.content.len() - start)
}

async fn send_block(
    transport: &mut PeerTransport,
    shared: &Shared,
    index: u32,
    begin: u32,
    length: u32,
) -> Result<(), leech::PeerError> {
    let start = index as usize * shared.piece_length + begin as usize;
    let mut data = shared.content[start..start + length as usize].to_vec();
    if shared.behavior.corrupt.contains(&index) {
        data[0] ^= 0xFF;
    }

    if shared.behavior.keep_alive {
        transport.send_message(&Message::KeepAlive).await?;
    }
    if shared.behavior.unknown_messages {
        transport
            .send_message(&Message::Unknown {
                id: 13,
                payload: Bytes::copy_from_slice(&index.to_be_bytes()),
            })
            .await?;
    }
    transport
        .send_message(&Message::Piece {
            index,
            begin,
            data: Bytes::from(data),
        })
        .await?;
    shared.blocks_served.fetch_add(1, Ordering::SeqCst);
    Ok(())
}
