//! Per-field validated extraction from decoded dictionaries.
//!
//! Each helper distinguishes an absent key ([`MetainfoError::MissingField`])
//! from a key of the wrong type ([`MetainfoError::InvalidField`]) so every
//! malformed field can be diagnosed on its own.

use super::error::MetainfoError;
use crate::bencode::Value;
use bytes::Bytes;
use std::collections::BTreeMap;

pub(crate) type Dict = BTreeMap<Bytes, Value>;

pub(crate) fn required<'a>(dict: &'a Dict, key: &'static str) -> Result<&'a Value, MetainfoError> {
    dict.get(key.as_bytes())
        .ok_or(MetainfoError::MissingField(key))
}

pub(crate) fn required_list<'a>(
    dict: &'a Dict,
    key: &'static str,
) -> Result<&'a [Value], MetainfoError> {
    required(dict, key)?
        .as_list()
        .ok_or(MetainfoError::InvalidField(key))
}

pub(crate) fn required_bytes<'a>(dict: &'a Dict, key: &'static str) -> Result<&'a Bytes, MetainfoError> {
    required(dict, key)?
        .as_bytes()
        .ok_or(MetainfoError::InvalidField(key))
}

pub(crate) fn required_str<'a>(dict: &'a Dict, key: &'static str) -> Result<&'a str, MetainfoError> {
    required(dict, key)?
        .as_str()
        .ok_or(MetainfoError::InvalidField(key))
}

/// Reads a non-negative integer.
pub(crate) fn required_u64(dict: &Dict, key: &'static str) -> Result<u64, MetainfoError> {
    required(dict, key)?
        .as_integer()
        .and_then(|i| u64::try_from(i).ok())
        .ok_or(MetainfoError::InvalidField(key))
}

/// Reads an optional key; present-but-mistyped values are an error.
pub(crate) fn optional<'a, T>(
    dict: &'a Dict,
    key: &'static str,
    extract: impl FnOnce(&'a Value) -> Option<T>,
) -> Result<Option<T>, MetainfoError> {
    match dict.get(key.as_bytes()) {
        None => Ok(None),
        Some(value) => extract(value)
            .map(Some)
            .ok_or(MetainfoError::InvalidField(key)),
    }
}
