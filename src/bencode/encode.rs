use super::value::Value;
use bytes::Bytes;

enum Work<'a> {
    Value(&'a Value),
    Key(&'a Bytes),
    End,
}

/// Encodes a bencode value to a byte vector.
///
/// The output is canonical:
/// - Integers: `i<number>e`
/// - Byte strings: `<length>:<data>`
/// - Lists: `l<items>e`
/// - Dictionaries: `d<key><value>...e` with keys in byte-lexicographic order
///
/// # Examples
///
/// ```
/// use leech::bencode::{encode, Value};
/// use std::collections::BTreeMap;
/// use bytes::Bytes;
///
/// assert_eq!(encode(&Value::Integer(42)), b"i42e");
/// assert_eq!(encode(&Value::string("hello")), b"5:hello");
///
/// // Insertion order does not matter
/// let mut dict = BTreeMap::new();
/// dict.insert(Bytes::from_static(b"b"), Value::Integer(2));
/// dict.insert(Bytes::from_static(b"a"), Value::Integer(1));
/// assert_eq!(encode(&Value::Dict(dict)), b"d1:ai1e1:bi2ee");
/// ```
pub fn encode(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut work = vec![Work::Value(value)];

    while let Some(item) = work.pop() {
        match item {
            Work::End => buf.push(b'e'),
            Work::Key(key) => put_bytes(&mut buf, key),
            Work::Value(Value::Integer(i)) => {
                buf.push(b'i');
                buf.extend_from_slice(i.to_string().as_bytes());
                buf.push(b'e');
            }
            Work::Value(Value::Bytes(b)) => put_bytes(&mut buf, b),
            Work::Value(Value::List(items)) => {
                buf.push(b'l');
                work.push(Work::End);
                work.extend(items.iter().rev().map(Work::Value));
            }
            Work::Value(Value::Dict(entries)) => {
                buf.push(b'd');
                work.push(Work::End);
                for (key, val) in entries.iter().rev() {
                    work.push(Work::Value(val));
                    work.push(Work::Key(key));
                }
            }
        }
    }

    buf
}

fn put_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(data.len().to_string().as_bytes());
    buf.push(b':');
    buf.extend_from_slice(data);
}
