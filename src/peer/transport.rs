use super::error::PeerError;
use super::message::{Handshake, Message};
use crate::constants::{HANDSHAKE_LEN, MAX_MESSAGE_SIZE};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};

/// Framed reads and writes over one peer socket.
///
/// Reads are buffered in `read_buf`, so a receive that is dropped mid-frame
/// (timeout or cancellation) loses no bytes.
pub struct PeerTransport {
    stream: TcpStream,
    read_buf: BytesMut,
    write_timeout: Duration,
}

impl PeerTransport {
    /// Opens a TCP connection, failing with [`PeerError::Unreachable`] on
    /// refusal or when `connect_timeout` elapses.
    pub async fn connect(
        addr: SocketAddr,
        connect_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Self, PeerError> {
        let stream = match timeout(connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(PeerError::Unreachable {
                    addr,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(PeerError::Unreachable {
                    addr,
                    reason: "connect timed out".into(),
                })
            }
        };
        stream.set_nodelay(true)?;
        Ok(Self::new(stream, write_timeout))
    }

    pub fn new(stream: TcpStream, write_timeout: Duration) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(32 * 1024),
            write_timeout,
        }
    }

    pub async fn send_handshake(&mut self, handshake: &Handshake) -> Result<(), PeerError> {
        let data = handshake.encode();
        timeout(self.write_timeout, self.stream.write_all(&data))
            .await
            .map_err(|_| PeerError::Timeout)??;
        Ok(())
    }

    pub async fn receive_handshake(&mut self, deadline: Instant) -> Result<Handshake, PeerError> {
        self.fill(HANDSHAKE_LEN, deadline).await?;
        let data = self.read_buf.split_to(HANDSHAKE_LEN);
        Handshake::decode(&data)
    }

    pub async fn send_message(&mut self, message: &Message) -> Result<(), PeerError> {
        let data = message.encode();
        timeout(self.write_timeout, self.stream.write_all(&data))
            .await
            .map_err(|_| PeerError::Timeout)??;
        Ok(())
    }

    /// Reads the next frame. A zero-length frame decodes to
    /// [`Message::KeepAlive`].
    pub async fn receive_message(&mut self, deadline: Instant) -> Result<Message, PeerError> {
        self.fill(4, deadline).await?;

        let length = u32::from_be_bytes([
            self.read_buf[0],
            self.read_buf[1],
            self.read_buf[2],
            self.read_buf[3],
        ]) as usize;

        if length > MAX_MESSAGE_SIZE {
            return Err(PeerError::InvalidMessage(format!(
                "message too large: {}",
                length
            )));
        }

        self.fill(4 + length, deadline).await?;

        let data = self.read_buf.split_to(4 + length);
        Message::decode(data.freeze())
    }

    async fn fill(&mut self, len: usize, deadline: Instant) -> Result<(), PeerError> {
        while self.read_buf.len() < len {
            let n = timeout_at(deadline, self.stream.read_buf(&mut self.read_buf))
                .await
                .map_err(|_| PeerError::Timeout)??;

            if n == 0 {
                return Err(PeerError::ConnectionClosed);
            }
        }
        Ok(())
    }

    pub fn peer_addr(&self) -> std::io::Result<SocketAddr> {
        self.stream.peer_addr()
    }
}
