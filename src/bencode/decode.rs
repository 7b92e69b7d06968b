use super::error::BencodeError;
use super::value::Value;
use bytes::Bytes;
use std::collections::BTreeMap;

/// A container still being filled while walking nested input.
enum Frame {
    List(Vec<Value>),
    Dict {
        entries: BTreeMap<Bytes, Value>,
        pending_key: Option<Bytes>,
    },
}

impl Frame {
    fn awaiting_key(&self) -> bool {
        matches!(
            self,
            Frame::Dict {
                pending_key: None,
                ..
            }
        )
    }

    fn finish(self, pos: usize) -> Result<Value, BencodeError> {
        match self {
            Frame::List(items) => Ok(Value::List(items)),
            Frame::Dict {
                pending_key: Some(_),
                ..
            } => Err(BencodeError::UnexpectedChar { ch: 'e', pos }),
            Frame::Dict { entries, .. } => Ok(Value::Dict(entries)),
        }
    }
}

/// Decodes exactly one value spanning the whole input.
///
/// # Errors
///
/// Fails on malformed or non-canonical input, and with
/// [`BencodeError::TrailingData`] if bytes remain after the value.
pub fn decode(data: &[u8]) -> Result<Value, BencodeError> {
    let (value, consumed) = decode_prefix(data)?;
    if consumed != data.len() {
        return Err(BencodeError::TrailingData(consumed));
    }
    Ok(value)
}

/// Decodes one value from the start of `data`, returning it together with the
/// number of bytes it occupied.
///
/// Nesting is handled with an explicit stack, so depth is limited only by
/// available memory.
pub fn decode_prefix(data: &[u8]) -> Result<(Value, usize), BencodeError> {
    parse(data, KeyOrder::Strict)
}

/// Like [`decode`], but accepts dictionaries whose keys are out of order or
/// repeated. A repeated key keeps its last value.
///
/// Use this for payloads from trackers and peers, which are only read and
/// never re-encoded for hashing.
pub fn decode_lenient(data: &[u8]) -> Result<Value, BencodeError> {
    let (value, consumed) = decode_prefix_lenient(data)?;
    if consumed != data.len() {
        return Err(BencodeError::TrailingData(consumed));
    }
    Ok(value)
}

/// Like [`decode_prefix`], with the key ordering of [`decode_lenient`].
pub fn decode_prefix_lenient(data: &[u8]) -> Result<(Value, usize), BencodeError> {
    parse(data, KeyOrder::Any)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum KeyOrder {
    Strict,
    Any,
}

fn parse(data: &[u8], order: KeyOrder) -> Result<(Value, usize), BencodeError> {
    let mut pos = 0;
    let mut stack: Vec<Frame> = Vec::new();

    loop {
        let byte = *data.get(pos).ok_or(BencodeError::UnexpectedEof(pos))?;

        if let Some(top) = stack.last() {
            if top.awaiting_key() && byte != b'e' && !byte.is_ascii_digit() {
                return Err(BencodeError::UnexpectedChar {
                    ch: byte as char,
                    pos,
                });
            }
        }

        let value = match byte {
            b'e' => {
                let frame = stack.pop().ok_or(BencodeError::UnexpectedChar { ch: 'e', pos })?;
                let value = frame.finish(pos)?;
                pos += 1;
                value
            }
            b'l' => {
                pos += 1;
                stack.push(Frame::List(Vec::new()));
                continue;
            }
            b'd' => {
                pos += 1;
                stack.push(Frame::Dict {
                    entries: BTreeMap::new(),
                    pending_key: None,
                });
                continue;
            }
            b'i' => decode_integer(data, &mut pos)?,
            b'0'..=b'9' => Value::Bytes(decode_bytes(data, &mut pos)?),
            c => {
                return Err(BencodeError::UnexpectedChar {
                    ch: c as char,
                    pos,
                })
            }
        };

        match stack.last_mut() {
            None => return Ok((value, pos)),
            Some(Frame::List(items)) => items.push(value),
            Some(Frame::Dict {
                entries,
                pending_key,
            }) => match pending_key.take() {
                Some(key) => {
                    entries.insert(key, value);
                }
                None => {
                    let Value::Bytes(key) = value else {
                        return Err(BencodeError::UnexpectedChar { ch: 'e', pos });
                    };
                    if order == KeyOrder::Strict {
                        if let Some((last, _)) = entries.last_key_value() {
                            if key <= *last {
                                return Err(BencodeError::UnsortedKeys(pos));
                            }
                        }
                    }
                    *pending_key = Some(key);
                }
            },
        }
    }
}

fn decode_integer(data: &[u8], pos: &mut usize) -> Result<Value, BencodeError> {
    let start = *pos + 1;
    let end = data[start..]
        .iter()
        .position(|&b| b == b'e')
        .map(|i| start + i)
        .ok_or(BencodeError::UnexpectedEof(data.len()))?;

    let digits = &data[start..end];
    let invalid = |reason| BencodeError::InvalidInteger { pos: start, reason };

    let unsigned = digits.strip_prefix(b"-").unwrap_or(digits);
    if unsigned.is_empty() {
        return Err(invalid("empty"));
    }
    if !unsigned.iter().all(u8::is_ascii_digit) {
        return Err(invalid("non-digit character"));
    }
    if unsigned[0] == b'0' && (unsigned.len() > 1 || unsigned.len() != digits.len()) {
        return Err(invalid("leading zero or negative zero"));
    }

    // ASCII digits with an optional sign are valid UTF-8.
    let text = std::str::from_utf8(digits).map_err(|_| invalid("not ascii"))?;
    let value: i64 = text.parse().map_err(|_| invalid("out of range"))?;

    *pos = end + 1;
    Ok(Value::Integer(value))
}

fn decode_bytes(data: &[u8], pos: &mut usize) -> Result<Bytes, BencodeError> {
    let start = *pos;
    let colon = data[start..]
        .iter()
        .position(|&b| b == b':')
        .map(|i| start + i)
        .ok_or(BencodeError::UnexpectedEof(data.len()))?;

    let digits = &data[start..colon];
    if !digits.iter().all(u8::is_ascii_digit) || (digits.len() > 1 && digits[0] == b'0') {
        return Err(BencodeError::InvalidStringLength(start));
    }

    let len: usize = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(BencodeError::InvalidStringLength(start))?;

    let body = colon + 1;
    let end = body
        .checked_add(len)
        .filter(|&end| end <= data.len())
        .ok_or(BencodeError::UnexpectedEof(data.len()))?;

    *pos = end;
    Ok(Bytes::copy_from_slice(&data[body..end]))
}
