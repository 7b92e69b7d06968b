use super::error::PeerError;
use crate::bencode::{decode_lenient, encode, Value};
use bytes::Bytes;
use std::collections::BTreeMap;

pub const UT_METADATA: &str = "ut_metadata";

/// The BEP-10 extension handshake payload.
///
/// `extensions` maps extension names to the numeric id the *sender* wants to
/// receive that extension's messages on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionHandshake {
    pub extensions: BTreeMap<String, u8>,
    pub client: Option<String>,
    pub reqq: Option<i64>,
    pub metadata_size: Option<i64>,
}

impl ExtensionHandshake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extensions(extensions: &[(&str, u8)]) -> Self {
        let mut hs = Self::new();
        for (name, id) in extensions {
            hs.extensions.insert((*name).to_string(), *id);
        }
        hs
    }

    pub fn encode(&self) -> Bytes {
        let mut dict = BTreeMap::new();

        let m = self
            .extensions
            .iter()
            .map(|(name, id)| {
                (
                    Bytes::copy_from_slice(name.as_bytes()),
                    Value::Integer(*id as i64),
                )
            })
            .collect();
        dict.insert(Bytes::from_static(b"m"), Value::Dict(m));

        if let Some(ref client) = self.client {
            dict.insert(Bytes::from_static(b"v"), Value::string(client));
        }

        if let Some(reqq) = self.reqq {
            dict.insert(Bytes::from_static(b"reqq"), Value::Integer(reqq));
        }

        if let Some(size) = self.metadata_size {
            dict.insert(Bytes::from_static(b"metadata_size"), Value::Integer(size));
        }

        Bytes::from(encode(&Value::Dict(dict)))
    }

    /// Decodes a received handshake. Entries of `m` with id 0 (disabled) or
    /// outside the one-byte range are dropped.
    pub fn decode(data: &[u8]) -> Result<Self, PeerError> {
        let value = decode_lenient(data)?;
        let dict = value
            .as_dict()
            .ok_or_else(|| PeerError::Extension("expected dict".into()))?;

        let mut hs = Self::new();

        let m = dict
            .get(b"m".as_slice())
            .and_then(Value::as_dict)
            .ok_or_else(|| PeerError::Extension("missing m dictionary".into()))?;
        for (key, val) in m {
            let id = val.as_integer().and_then(|id| u8::try_from(id).ok());
            if let (Ok(name), Some(id)) = (std::str::from_utf8(key), id) {
                if id > 0 {
                    hs.extensions.insert(name.to_string(), id);
                }
            }
        }

        hs.client = dict
            .get(b"v".as_slice())
            .and_then(Value::as_str)
            .map(String::from);

        hs.reqq = dict.get(b"reqq".as_slice()).and_then(Value::as_integer);

        hs.metadata_size = dict
            .get(b"metadata_size".as_slice())
            .and_then(Value::as_integer);

        Ok(hs)
    }

    pub fn get_extension_id(&self, name: &str) -> Option<u8> {
        self.extensions.get(name).copied()
    }
}
