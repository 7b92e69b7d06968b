//! Metadata exchange extension (ut_metadata, BEP-9).
//!
//! Used to fetch the info dictionary from peers when only a magnet link is
//! available. Data messages carry a bencoded header followed directly by the
//! raw piece bytes.

use std::collections::BTreeMap;

use bytes::Bytes;

use super::error::PeerError;
use crate::bencode::{decode_prefix_lenient, encode, Value};
use crate::constants::METADATA_PIECE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataMessageType {
    Request = 0,
    Data = 1,
    Reject = 2,
}

impl MetadataMessageType {
    pub fn from_byte(b: i64) -> Option<Self> {
        match b {
            0 => Some(MetadataMessageType::Request),
            1 => Some(MetadataMessageType::Data),
            2 => Some(MetadataMessageType::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataMessage {
    pub msg_type: MetadataMessageType,
    pub piece: u32,
    /// Total metadata size, only present in data messages.
    pub total_size: Option<u64>,
    /// Piece content, only present in data messages.
    pub data: Option<Bytes>,
}

impl MetadataMessage {
    pub fn request(piece: u32) -> Self {
        Self {
            msg_type: MetadataMessageType::Request,
            piece,
            total_size: None,
            data: None,
        }
    }

    pub fn data(piece: u32, total_size: u64, data: Bytes) -> Self {
        Self {
            msg_type: MetadataMessageType::Data,
            piece,
            total_size: Some(total_size),
            data: Some(data),
        }
    }

    pub fn reject(piece: u32) -> Self {
        Self {
            msg_type: MetadataMessageType::Reject,
            piece,
            total_size: None,
            data: None,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut dict = BTreeMap::new();

        dict.insert(
            Bytes::from_static(b"msg_type"),
            Value::Integer(self.msg_type as i64),
        );
        dict.insert(
            Bytes::from_static(b"piece"),
            Value::Integer(self.piece as i64),
        );
        if let Some(total_size) = self.total_size {
            dict.insert(
                Bytes::from_static(b"total_size"),
                Value::Integer(total_size as i64),
            );
        }

        let mut out = encode(&Value::Dict(dict));
        if let Some(ref data) = self.data {
            out.extend_from_slice(data);
        }
        Bytes::from(out)
    }

    pub fn decode(payload: &Bytes) -> Result<Self, PeerError> {
        let (value, header_len) = decode_prefix_lenient(payload)?;
        let dict = value
            .as_dict()
            .ok_or_else(|| PeerError::Extension("expected dict".into()))?;

        let msg_type = dict
            .get(b"msg_type".as_slice())
            .and_then(Value::as_integer)
            .and_then(MetadataMessageType::from_byte)
            .ok_or_else(|| PeerError::Extension("missing or invalid msg_type".into()))?;

        let piece = dict
            .get(b"piece".as_slice())
            .and_then(Value::as_integer)
            .and_then(|p| u32::try_from(p).ok())
            .ok_or_else(|| PeerError::Extension("missing or invalid piece".into()))?;

        let total_size = dict
            .get(b"total_size".as_slice())
            .and_then(Value::as_integer)
            .and_then(|v| u64::try_from(v).ok());

        let data = (msg_type == MetadataMessageType::Data).then(|| payload.slice(header_len..));

        Ok(Self {
            msg_type,
            piece,
            total_size,
            data,
        })
    }
}

pub fn metadata_piece_count(metadata_size: usize) -> usize {
    metadata_size.div_ceil(METADATA_PIECE_SIZE)
}

/// Length of metadata piece `piece`, zero past the end.
pub fn metadata_piece_size(piece: u32, total_size: usize) -> usize {
    let offset = piece as usize * METADATA_PIECE_SIZE;
    if offset >= total_size {
        0
    } else {
        (total_size - offset).min(METADATA_PIECE_SIZE)
    }
}
