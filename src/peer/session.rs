use super::bitfield::Bitfield;
use super::error::PeerError;
use super::extension::{ExtensionHandshake, UT_METADATA};
use super::message::{Handshake, Message};
use super::metadata::{
    metadata_piece_count, metadata_piece_size, MetadataMessage, MetadataMessageType,
};
use super::peer_id::PeerId;
use super::piece::PieceAssembler;
use super::transport::PeerTransport;
use crate::config::SessionConfig;
use crate::constants::{
    EXTENSION_HANDSHAKE_ID, LOCAL_UT_METADATA_ID, MAX_METADATA_SIZE, METADATA_PIECE_SIZE,
    USER_AGENT,
};
use crate::metainfo::{InfoHash, Piece};
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::net::SocketAddr;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Lifecycle of a [`PeerSession`].
///
/// `Disconnected → Connecting → HandshakePending → (ExtensionPending) →
/// Ready → Closed`. Any failure before `Ready`, and any connection-level
/// failure in `Ready`, ends in `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    HandshakePending,
    ExtensionPending,
    Ready,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::HandshakePending => "handshake pending",
            SessionState::ExtensionPending => "extension pending",
            SessionState::Ready => "ready",
            SessionState::Closed => "closed",
        }
    }
}

/// One TCP connection to one peer.
///
/// The session exclusively owns its socket; all I/O goes through its
/// methods. Every blocking step observes the cancellation token.
pub struct PeerSession {
    addr: SocketAddr,
    info_hash: InfoHash,
    local_id: PeerId,
    config: SessionConfig,
    cancel: CancellationToken,
    state: SessionState,
    transport: Option<PeerTransport>,
    remote_id: Option<PeerId>,
    remote_extensions: Option<ExtensionHandshake>,
    bitfield: Option<Bitfield>,
    peer_choking: bool,
    am_interested: bool,
}

impl PeerSession {
    pub fn new(
        addr: SocketAddr,
        info_hash: InfoHash,
        local_id: PeerId,
        config: SessionConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            addr,
            info_hash,
            local_id,
            config,
            cancel,
            state: SessionState::Disconnected,
            transport: None,
            remote_id: None,
            remote_extensions: None,
            bitfield: None,
            peer_choking: true,
            am_interested: false,
        }
    }

    /// Connects, handshakes and, when both sides support it, exchanges
    /// extension handshakes. On success the session is `Ready`; on failure it
    /// is `Closed` and must be discarded.
    pub async fn connect(&mut self) -> Result<(), PeerError> {
        if self.state != SessionState::Disconnected {
            return Err(PeerError::InvalidState(self.state.as_str()));
        }

        let result = self.establish().await;
        if let Err(ref e) = result {
            debug!(peer = %self.addr, error = %e, "session setup failed");
            self.close();
        }
        result
    }

    async fn establish(&mut self) -> Result<(), PeerError> {
        self.transition(SessionState::Connecting);
        let transport = with_cancel(
            &self.cancel,
            PeerTransport::connect(
                self.addr,
                self.config.connect_timeout,
                self.config.request_timeout,
            ),
        )
        .await?;
        self.transport = Some(transport);

        self.transition(SessionState::HandshakePending);
        let deadline = Instant::now() + self.config.handshake_timeout;
        let ours = Handshake::new(self.info_hash, self.local_id.0, self.config.extensions);
        let theirs = {
            let transport = self
                .transport
                .as_mut()
                .ok_or(PeerError::InvalidState("closed"))?;
            with_cancel(&self.cancel, async {
                transport.send_handshake(&ours).await?;
                transport.receive_handshake(deadline).await
            })
            .await?
        };

        if theirs.info_hash != self.info_hash {
            return Err(PeerError::InfoHashMismatch);
        }
        self.remote_id = Some(PeerId(theirs.peer_id));

        if self.config.extensions && theirs.supports_extension_protocol() {
            self.transition(SessionState::ExtensionPending);
            self.exchange_extension_handshake(deadline).await?;
        }

        self.transition(SessionState::Ready);
        Ok(())
    }

    async fn exchange_extension_handshake(&mut self, deadline: Instant) -> Result<(), PeerError> {
        let mut ours = ExtensionHandshake::with_extensions(&[(UT_METADATA, LOCAL_UT_METADATA_ID)]);
        ours.client = Some(USER_AGENT.to_string());
        ours.reqq = Some(self.config.pipeline_depth as i64);

        self.send(&Message::Extended {
            id: EXTENSION_HANDSHAKE_ID,
            payload: ours.encode(),
        })
        .await?;

        loop {
            match self.recv(deadline).await? {
                Message::Extended {
                    id: EXTENSION_HANDSHAKE_ID,
                    payload,
                } => {
                    let theirs = ExtensionHandshake::decode(&payload)?;
                    debug!(
                        peer = %self.addr,
                        extensions = ?theirs.extensions,
                        metadata_size = ?theirs.metadata_size,
                        "extension handshake received"
                    );
                    self.remote_extensions = Some(theirs);
                    return Ok(());
                }
                other => trace!(peer = %self.addr, message = ?other, "before extension handshake"),
            }
        }
    }

    /// Downloads and verifies one piece.
    ///
    /// Blocks are requested `pipeline_depth` at a time and written into the
    /// reassembly buffer at their declared offsets. A choke mid-piece drops
    /// the outstanding requests, which are re-sent after the next unchoke.
    ///
    /// # Errors
    ///
    /// - [`PeerError::PieceUnavailable`] if the peer's bitfield lacks the piece
    /// - [`PeerError::PieceHashMismatch`] if the assembled data is corrupt
    /// - [`PeerError::Timeout`] if no block arrives within `request_timeout`
    ///
    /// Only connection-level errors close the session.
    pub async fn download_piece(&mut self, piece: &Piece) -> Result<Bytes, PeerError> {
        self.ensure_ready()?;
        let result = self.fetch_piece(piece).await;
        self.settle(&result);
        result
    }

    async fn fetch_piece(&mut self, piece: &Piece) -> Result<Bytes, PeerError> {
        let index = piece.index;
        if self.lacks(index) {
            return Err(PeerError::PieceUnavailable(index));
        }

        if !self.am_interested {
            self.send(&Message::Interested).await?;
            self.am_interested = true;
        }

        let mut assembler = PieceAssembler::new(piece, self.config.block_size);
        let mut queue: VecDeque<_> = assembler.missing_requests().into();
        let mut outstanding = HashSet::new();
        let mut deadline = Instant::now() + self.config.request_timeout;

        while !assembler.is_complete() {
            if !self.peer_choking {
                while outstanding.len() < self.config.pipeline_depth {
                    let Some(request) = queue.pop_front() else {
                        break;
                    };
                    self.send(&Message::Request {
                        index: request.piece,
                        begin: request.offset,
                        length: request.length,
                    })
                    .await?;
                    outstanding.insert(request.offset);
                }
            }

            match self.recv(deadline).await? {
                Message::Piece {
                    index: got,
                    begin,
                    data,
                } if got == index => {
                    outstanding.remove(&begin);
                    if assembler.insert(begin, &data)? {
                        trace!(peer = %self.addr, piece = index, begin, "block received");
                        deadline = Instant::now() + self.config.request_timeout;
                    }
                }
                Message::Choke => {
                    debug!(peer = %self.addr, piece = index, "choked mid-piece");
                    outstanding.clear();
                    queue = assembler.missing_requests().into();
                }
                Message::Have { .. } | Message::Bitfield(_) if self.lacks(index) => {
                    return Err(PeerError::PieceUnavailable(index));
                }
                _ => {}
            }
        }

        assembler.verify()
    }

    /// Fetches the info dictionary over ut_metadata and checks it against
    /// the info hash. Requests addressed to us are answered with a reject.
    pub async fn fetch_metadata(&mut self) -> Result<Bytes, PeerError> {
        self.ensure_ready()?;
        let result = self.fetch_metadata_pieces().await;
        self.settle(&result);
        result
    }

    async fn fetch_metadata_pieces(&mut self) -> Result<Bytes, PeerError> {
        let remote_id = self
            .extension_id(UT_METADATA)
            .ok_or(PeerError::MetadataUnsupported)?;
        let size = self
            .metadata_size()
            .filter(|&size| size > 0 && size <= MAX_METADATA_SIZE)
            .ok_or(PeerError::MetadataUnsupported)?;

        let count = metadata_piece_count(size);
        for piece in 0..count as u32 {
            self.send(&Message::Extended {
                id: remote_id,
                payload: MetadataMessage::request(piece).encode(),
            })
            .await?;
        }

        let mut buf = vec![0u8; size];
        let mut received = vec![false; count];
        let mut missing = count;
        let mut deadline = Instant::now() + self.config.request_timeout;

        while missing > 0 {
            let Message::Extended { id, payload } = self.recv(deadline).await? else {
                continue;
            };
            if id != LOCAL_UT_METADATA_ID {
                continue;
            }

            let message = MetadataMessage::decode(&payload)?;
            match message.msg_type {
                MetadataMessageType::Request => {
                    self.send(&Message::Extended {
                        id: remote_id,
                        payload: MetadataMessage::reject(message.piece).encode(),
                    })
                    .await?;
                }
                MetadataMessageType::Reject => {
                    return Err(PeerError::MetadataRejected(message.piece));
                }
                MetadataMessageType::Data => {
                    let piece = message.piece as usize;
                    let data = message.data.unwrap_or_default();
                    if piece >= count || data.len() != metadata_piece_size(message.piece, size) {
                        return Err(PeerError::Protocol(format!(
                            "metadata piece {} has {} bytes",
                            piece,
                            data.len()
                        )));
                    }
                    if !received[piece] {
                        let start = piece * METADATA_PIECE_SIZE;
                        buf[start..start + data.len()].copy_from_slice(&data);
                        received[piece] = true;
                        missing -= 1;
                        deadline = Instant::now() + self.config.request_timeout;
                    }
                }
            }
        }

        let digest: [u8; 20] = Sha1::digest(&buf).into();
        if &digest != self.info_hash.as_bytes() {
            return Err(PeerError::MetadataHashMismatch);
        }

        debug!(peer = %self.addr, size, "metadata fetched");
        Ok(Bytes::from(buf))
    }

    /// Releases the socket. Idempotent.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            self.transition(SessionState::Closed);
            self.transport = None;
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The peer's ID, known once the handshake completed.
    pub fn remote_peer_id(&self) -> Option<PeerId> {
        self.remote_id
    }

    pub fn supports_extensions(&self) -> bool {
        self.remote_extensions.is_some()
    }

    /// The id the peer wants to receive the named extension on.
    pub fn extension_id(&self, name: &str) -> Option<u8> {
        self.remote_extensions
            .as_ref()
            .and_then(|ext| ext.get_extension_id(name))
    }

    pub fn metadata_size(&self) -> Option<usize> {
        self.remote_extensions
            .as_ref()
            .and_then(|ext| ext.metadata_size)
            .and_then(|size| usize::try_from(size).ok())
    }

    pub fn peer_choking(&self) -> bool {
        self.peer_choking
    }

    /// True only when the peer advertised availability and the piece is
    /// missing from it. Without any bitfield or have message the answer is
    /// unknown and the piece is attempted.
    fn lacks(&self, index: u32) -> bool {
        self.bitfield
            .as_ref()
            .is_some_and(|bf| !bf.has_piece(index as usize))
    }

    fn ensure_ready(&self) -> Result<(), PeerError> {
        if self.state != SessionState::Ready {
            return Err(PeerError::InvalidState(self.state.as_str()));
        }
        Ok(())
    }

    fn settle<T>(&mut self, result: &Result<T, PeerError>) {
        if let Err(e) = result {
            if e.closes_session() {
                warn!(peer = %self.addr, error = %e, "closing session");
                self.close();
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(peer = %self.addr, from = self.state.as_str(), to = next.as_str(), "session state");
        self.state = next;
    }

    async fn send(&mut self, message: &Message) -> Result<(), PeerError> {
        let transport = self
            .transport
            .as_mut()
            .ok_or(PeerError::InvalidState("closed"))?;
        with_cancel(&self.cancel, transport.send_message(message)).await
    }

    async fn recv(&mut self, deadline: Instant) -> Result<Message, PeerError> {
        let transport = self
            .transport
            .as_mut()
            .ok_or(PeerError::InvalidState("closed"))?;
        let message = with_cancel(&self.cancel, transport.receive_message(deadline)).await?;
        self.observe(&message)?;
        Ok(message)
    }

    fn observe(&mut self, message: &Message) -> Result<(), PeerError> {
        match message {
            Message::Choke => self.peer_choking = true,
            Message::Unchoke => self.peer_choking = false,
            Message::Have { piece } => {
                let index = *piece as usize;
                if index >= Bitfield::MAX_PIECES {
                    return Err(PeerError::Protocol(format!(
                        "have for piece {} is past any bitfield",
                        piece
                    )));
                }
                self.bitfield
                    .get_or_insert_with(Bitfield::default)
                    .set_piece(index);
            }
            Message::Bitfield(bits) => self.bitfield = Some(Bitfield::from_bytes(bits.clone())),
            Message::KeepAlive => trace!(peer = %self.addr, "keep-alive"),
            Message::Unknown { id, payload } => {
                trace!(peer = %self.addr, id, len = payload.len(), "skipping unknown message")
            }
            _ => {}
        }
        Ok(())
    }
}

async fn with_cancel<T>(
    token: &CancellationToken,
    fut: impl Future<Output = Result<T, PeerError>>,
) -> Result<T, PeerError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(PeerError::Cancelled),
        result = fut => result,
    }
}
