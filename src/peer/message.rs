use super::error::PeerError;
use crate::constants::{
    EXTENSION_RESERVED_BYTE, EXTENSION_RESERVED_MASK, HANDSHAKE_LEN, PROTOCOL_STRING,
};
use crate::metainfo::InfoHash;
use bytes::{Buf, BufMut, Bytes, BytesMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageId {
    Choke = 0,
    Unchoke = 1,
    Interested = 2,
    NotInterested = 3,
    Have = 4,
    Bitfield = 5,
    Request = 6,
    Piece = 7,
    Cancel = 8,
    Port = 9,
    // Extension protocol (BEP-10)
    Extended = 20,
}

impl TryFrom<u8> for MessageId {
    type Error = PeerError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MessageId::Choke),
            1 => Ok(MessageId::Unchoke),
            2 => Ok(MessageId::Interested),
            3 => Ok(MessageId::NotInterested),
            4 => Ok(MessageId::Have),
            5 => Ok(MessageId::Bitfield),
            6 => Ok(MessageId::Request),
            7 => Ok(MessageId::Piece),
            8 => Ok(MessageId::Cancel),
            9 => Ok(MessageId::Port),
            20 => Ok(MessageId::Extended),
            _ => Err(PeerError::InvalidMessageId(value)),
        }
    }
}

/// The fixed 68-byte opening message of every peer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub info_hash: InfoHash,
    pub peer_id: [u8; 20],
    pub reserved: [u8; 8],
}

impl Handshake {
    /// Builds a handshake, setting the extension-protocol reserved bit when
    /// `extensions` is true and leaving every other reserved bit zero.
    pub fn new(info_hash: InfoHash, peer_id: [u8; 20], extensions: bool) -> Self {
        let mut reserved = [0u8; 8];
        if extensions {
            reserved[EXTENSION_RESERVED_BYTE] |= EXTENSION_RESERVED_MASK;
        }
        Self {
            info_hash,
            peer_id,
            reserved,
        }
    }

    pub fn supports_extension_protocol(&self) -> bool {
        (self.reserved[EXTENSION_RESERVED_BYTE] & EXTENSION_RESERVED_MASK) != 0
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN);
        buf.put_u8(PROTOCOL_STRING.len() as u8);
        buf.put_slice(PROTOCOL_STRING);
        buf.put_slice(&self.reserved);
        buf.put_slice(self.info_hash.as_bytes());
        buf.put_slice(&self.peer_id);
        buf.freeze()
    }

    pub fn decode(data: &[u8]) -> Result<Self, PeerError> {
        if data.len() != HANDSHAKE_LEN {
            return Err(PeerError::InvalidHandshake);
        }

        if data[0] as usize != PROTOCOL_STRING.len() || &data[1..20] != PROTOCOL_STRING {
            return Err(PeerError::InvalidHandshake);
        }

        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&data[20..28]);

        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&data[28..48]);

        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&data[48..68]);

        Ok(Self {
            info_hash: InfoHash(info_hash),
            peer_id,
            reserved,
        })
    }
}

/// A length-prefixed peer wire message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have { piece: u32 },
    Bitfield(Bytes),
    Request { index: u32, begin: u32, length: u32 },
    Piece { index: u32, begin: u32, data: Bytes },
    Cancel { index: u32, begin: u32, length: u32 },
    Port(u16),
    Extended { id: u8, payload: Bytes },
    /// A message id this client does not speak. Skipped like a keep-alive.
    Unknown { id: u8, payload: Bytes },
}

impl Message {
    /// Encodes the message including its 4-byte length prefix.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();

        match self {
            Message::KeepAlive => {
                buf.put_u32(0);
            }
            Message::Choke => put_bare(&mut buf, MessageId::Choke),
            Message::Unchoke => put_bare(&mut buf, MessageId::Unchoke),
            Message::Interested => put_bare(&mut buf, MessageId::Interested),
            Message::NotInterested => put_bare(&mut buf, MessageId::NotInterested),
            Message::Have { piece } => {
                buf.put_u32(5);
                buf.put_u8(MessageId::Have as u8);
                buf.put_u32(*piece);
            }
            Message::Bitfield(bits) => {
                buf.put_u32(1 + bits.len() as u32);
                buf.put_u8(MessageId::Bitfield as u8);
                buf.put_slice(bits);
            }
            Message::Request {
                index,
                begin,
                length,
            } => put_triple(&mut buf, MessageId::Request, *index, *begin, *length),
            Message::Piece { index, begin, data } => {
                buf.put_u32(9 + data.len() as u32);
                buf.put_u8(MessageId::Piece as u8);
                buf.put_u32(*index);
                buf.put_u32(*begin);
                buf.put_slice(data);
            }
            Message::Cancel {
                index,
                begin,
                length,
            } => put_triple(&mut buf, MessageId::Cancel, *index, *begin, *length),
            Message::Port(port) => {
                buf.put_u32(3);
                buf.put_u8(MessageId::Port as u8);
                buf.put_u16(*port);
            }
            Message::Extended { id, payload } => {
                buf.put_u32(2 + payload.len() as u32);
                buf.put_u8(MessageId::Extended as u8);
                buf.put_u8(*id);
                buf.put_slice(payload);
            }
            Message::Unknown { id, payload } => {
                buf.put_u32(1 + payload.len() as u32);
                buf.put_u8(*id);
                buf.put_slice(payload);
            }
        }

        buf.freeze()
    }

    /// Decodes a complete frame, length prefix included.
    pub fn decode(mut frame: Bytes) -> Result<Self, PeerError> {
        if frame.len() < 4 {
            return Err(PeerError::InvalidMessage("too short".into()));
        }

        let length = frame.get_u32() as usize;
        if frame.remaining() != length {
            return Err(PeerError::InvalidMessage(format!(
                "length prefix {} but {} bytes follow",
                length,
                frame.remaining()
            )));
        }

        if length == 0 {
            return Ok(Message::KeepAlive);
        }

        Self::decode_body(frame)
    }

    /// Decodes the id byte and payload of a non-empty frame.
    pub fn decode_body(mut body: Bytes) -> Result<Self, PeerError> {
        if body.is_empty() {
            return Ok(Message::KeepAlive);
        }

        let raw = body.get_u8();
        let Ok(id) = MessageId::try_from(raw) else {
            return Ok(Message::Unknown {
                id: raw,
                payload: body,
            });
        };

        let message = match id {
            MessageId::Choke => Message::Choke,
            MessageId::Unchoke => Message::Unchoke,
            MessageId::Interested => Message::Interested,
            MessageId::NotInterested => Message::NotInterested,
            MessageId::Have => {
                expect_len(&body, 4, "have")?;
                Message::Have {
                    piece: body.get_u32(),
                }
            }
            MessageId::Bitfield => Message::Bitfield(body),
            MessageId::Request => {
                expect_len(&body, 12, "request")?;
                Message::Request {
                    index: body.get_u32(),
                    begin: body.get_u32(),
                    length: body.get_u32(),
                }
            }
            MessageId::Piece => {
                if body.remaining() < 8 {
                    return Err(PeerError::InvalidMessage("piece too short".into()));
                }
                let index = body.get_u32();
                let begin = body.get_u32();
                Message::Piece {
                    index,
                    begin,
                    data: body,
                }
            }
            MessageId::Cancel => {
                expect_len(&body, 12, "cancel")?;
                Message::Cancel {
                    index: body.get_u32(),
                    begin: body.get_u32(),
                    length: body.get_u32(),
                }
            }
            MessageId::Port => {
                expect_len(&body, 2, "port")?;
                Message::Port(body.get_u16())
            }
            MessageId::Extended => {
                if body.remaining() < 1 {
                    return Err(PeerError::InvalidMessage("extended too short".into()));
                }
                let id = body.get_u8();
                Message::Extended { id, payload: body }
            }
        };

        Ok(message)
    }
}

fn put_bare(buf: &mut BytesMut, id: MessageId) {
    buf.put_u32(1);
    buf.put_u8(id as u8);
}

fn put_triple(buf: &mut BytesMut, id: MessageId, index: u32, begin: u32, length: u32) {
    buf.put_u32(13);
    buf.put_u8(id as u8);
    buf.put_u32(index);
    buf.put_u32(begin);
    buf.put_u32(length);
}

fn expect_len(body: &Bytes, len: usize, what: &str) -> Result<(), PeerError> {
    if body.remaining() != len {
        return Err(PeerError::InvalidMessage(format!(
            "{} payload is {} bytes, expected {}",
            what,
            body.remaining(),
            len
        )));
    }
    Ok(())
}
