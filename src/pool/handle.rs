use crate::constants::SESSION_COMMAND_BUFFER;
use crate::metainfo::Piece;
use crate::peer::{PeerError, PeerId, PeerSession, SessionState, UT_METADATA};
use bytes::Bytes;
use std::net::SocketAddr;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

type Reply = oneshot::Sender<Result<Bytes, PeerError>>;

enum Command {
    DownloadPiece { piece: Piece, reply: Reply },
    FetchMetadata { reply: Reply },
}

/// Cloneable handle to a session running on its own task.
///
/// Commands are queued and executed one at a time, so concurrent callers
/// never interleave on the socket.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    addr: SocketAddr,
    peer_id: Option<PeerId>,
    metadata_size: Option<usize>,
    tx: mpsc::Sender<Command>,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Moves a `Ready` session onto its own task. `cancel` must be the
    /// token the session was built with.
    pub fn spawn(session: PeerSession, cancel: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(SESSION_COMMAND_BUFFER);
        let handle = Self {
            addr: session.addr(),
            peer_id: session.remote_peer_id(),
            metadata_size: session
                .extension_id(UT_METADATA)
                .and(session.metadata_size()),
            tx,
            cancel: cancel.clone(),
        };

        tokio::spawn(run(session, rx, cancel));
        handle
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn peer_id(&self) -> Option<PeerId> {
        self.peer_id
    }

    /// The metadata size the peer announced, if it also offers ut_metadata.
    pub fn metadata_size(&self) -> Option<usize> {
        self.metadata_size
    }

    pub async fn download_piece(&self, piece: Piece) -> Result<Bytes, PeerError> {
        self.request(|reply| Command::DownloadPiece { piece, reply })
            .await
    }

    pub async fn fetch_metadata(&self) -> Result<Bytes, PeerError> {
        self.request(|reply| Command::FetchMetadata { reply }).await
    }

    async fn request(&self, command: impl FnOnce(Reply) -> Command) -> Result<Bytes, PeerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| PeerError::ConnectionClosed)?;
        rx.await.map_err(|_| PeerError::ConnectionClosed)?
    }

    /// Signals the session task to close its socket and exit.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// True once the session task has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    #[cfg(test)]
    pub(crate) fn close_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    #[cfg(test)]
    pub(crate) fn detached(addr: SocketAddr) -> Self {
        let (tx, _rx) = mpsc::channel(1);
        Self {
            addr,
            peer_id: None,
            metadata_size: None,
            tx,
            cancel: CancellationToken::new(),
        }
    }
}

async fn run(mut session: PeerSession, mut rx: mpsc::Receiver<Command>, cancel: CancellationToken) {
    let addr = session.addr();

    loop {
        let command = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            command = rx.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        match command {
            Command::DownloadPiece { piece, reply } => {
                let _ = reply.send(session.download_piece(&piece).await);
            }
            Command::FetchMetadata { reply } => {
                let _ = reply.send(session.fetch_metadata().await);
            }
        }

        if session.state() == SessionState::Closed {
            break;
        }
    }

    session.close();
    debug!(peer = %addr, "session task finished");
}
