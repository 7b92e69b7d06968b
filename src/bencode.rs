//! Bencode encoding and decoding ([BEP-3]).
//!
//! Bencode is the serialization format used for `.torrent` files, tracker
//! responses and extension-protocol payloads.
//!
//! # Data Types
//!
//! | Type | Format | Example |
//! |------|--------|---------|
//! | Integer | `i<number>e` | `i42e` → 42 |
//! | Byte String | `<length>:<data>` | `4:spam` → "spam" |
//! | List | `l<items>e` | `l4:spami42ee` → ["spam", 42] |
//! | Dictionary | `d<key><value>...e` | `d3:foo3:bare` → {"foo": "bar"} |
//!
//! # Canonical form
//!
//! The decoder only accepts canonical input: dictionary keys must be strictly
//! increasing, integers and lengths carry no leading zeros or `+` signs, and
//! `-0` is rejected. Together with the sorted-key encoder this makes
//! `encode(decode(x)) == x` for every accepted `x`, which the info hash relies
//! on.
//!
//! Tracker responses and extension payloads come from other clients that do
//! not always sort their keys. [`decode_lenient`] and
//! [`decode_prefix_lenient`] read those, keeping the last value of a repeated
//! key.
//!
//! # Examples
//!
//! ```
//! use leech::bencode::{decode, decode_prefix, encode, Value};
//!
//! let value = decode(b"d3:cow3:moo4:spaml1:a1:bee").unwrap();
//! assert_eq!(value.get(b"cow").and_then(|v| v.as_str()), Some("moo"));
//! assert_eq!(encode(&value), b"d3:cow3:moo4:spaml1:a1:bee");
//!
//! // Decoding a value at the front of a larger buffer
//! let (value, consumed) = decode_prefix(b"i42etrailing").unwrap();
//! assert_eq!(value, Value::Integer(42));
//! assert_eq!(consumed, 4);
//! ```
//!
//! [BEP-3]: http://bittorrent.org/beps/bep_0003.html

mod decode;
mod encode;
mod error;
mod value;

pub use decode::{decode, decode_lenient, decode_prefix, decode_prefix_lenient};
pub use encode::encode;
pub use error::BencodeError;
pub use value::Value;
