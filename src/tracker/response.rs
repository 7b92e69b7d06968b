use super::error::TrackerError;
use crate::bencode::{decode_lenient, Value};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

const COMPACT_PEER_LEN: usize = 6;

/// Decoded body of a successful announce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceResponse {
    /// Seconds the tracker asks us to wait before re-announcing.
    pub interval: Option<u32>,
    pub complete: Option<u32>,
    pub incomplete: Option<u32>,
    pub warning_message: Option<String>,
    pub peers: Vec<SocketAddr>,
}

impl AnnounceResponse {
    /// Parses a bencoded announce response.
    ///
    /// `peers` may be a compact byte string (a multiple of 6 bytes) or a list
    /// of `{ip, port}` dictionaries. A `failure reason` takes precedence over
    /// everything else.
    pub fn from_bytes(body: &[u8]) -> Result<Self, TrackerError> {
        let value = decode_lenient(body)?;
        let dict = value
            .as_dict()
            .ok_or_else(|| TrackerError::InvalidResponse("expected dict".into()))?;

        if let Some(failure) = dict.get(b"failure reason".as_slice()) {
            let reason = failure
                .as_bytes()
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .unwrap_or_default();
            return Err(TrackerError::Failure(reason));
        }

        let int_field = |key: &[u8]| {
            dict.get(key)
                .and_then(Value::as_integer)
                .and_then(|v| u32::try_from(v).ok())
        };

        let peers = match dict.get(b"peers".as_slice()) {
            Some(Value::Bytes(bytes)) => parse_compact_peers(bytes)?,
            Some(Value::List(list)) => parse_peer_dicts(list),
            Some(_) => return Err(TrackerError::InvalidResponse("peers has wrong type".into())),
            None => return Err(TrackerError::InvalidResponse("missing peers".into())),
        };

        Ok(Self {
            interval: int_field(b"interval".as_slice()),
            complete: int_field(b"complete".as_slice()),
            incomplete: int_field(b"incomplete".as_slice()),
            warning_message: dict
                .get(b"warning message".as_slice())
                .and_then(Value::as_str)
                .map(String::from),
            peers,
        })
    }
}

/// A peer in the compact IPv4 encoding: 4 address bytes then a 2-byte port,
/// both big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactPeer {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl CompactPeer {
    pub fn from_bytes(bytes: &[u8; COMPACT_PEER_LEN]) -> Self {
        Self {
            ip: Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]),
            port: u16::from_be_bytes([bytes[4], bytes[5]]),
        }
    }

    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(self.ip), self.port)
    }
}

/// Splits a compact peer string into addresses, in tracker order.
pub fn parse_compact_peers(data: &[u8]) -> Result<Vec<SocketAddr>, TrackerError> {
    if data.len() % COMPACT_PEER_LEN != 0 {
        return Err(TrackerError::InvalidPeers(data.len()));
    }

    Ok(data
        .chunks_exact(COMPACT_PEER_LEN)
        .filter_map(|chunk| <&[u8; COMPACT_PEER_LEN]>::try_from(chunk).ok())
        .map(|chunk| CompactPeer::from_bytes(chunk).to_socket_addr())
        .collect())
}

fn parse_peer_dicts(list: &[Value]) -> Vec<SocketAddr> {
    list.iter()
        .filter_map(Value::as_dict)
        .filter_map(|peer| {
            let ip: IpAddr = peer
                .get(b"ip".as_slice())
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok())?;
            let port = peer
                .get(b"port".as_slice())
                .and_then(Value::as_integer)
                .and_then(|p| u16::try_from(p).ok())?;
            Some(SocketAddr::new(ip, port))
        })
        .collect()
}
