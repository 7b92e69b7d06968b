use super::error::MetainfoError;
use super::fields::{
    optional, required, required_bytes, required_list, required_str, required_u64, Dict,
};
use super::info_hash::InfoHash;
use crate::bencode::{decode, encode, Value};
use bytes::Bytes;
use std::ops::Range;
use std::path::PathBuf;

const HASH_LEN: usize = 20;
const TRACKER_SCHEMES: [&str; 3] = ["http://", "https://", "udp://"];

/// A parsed torrent file.
///
/// Built once from raw bytes and immutable afterwards; download progress is
/// tracked by the orchestrator, not here.
///
/// # Examples
///
/// ```no_run
/// use leech::metainfo::Metainfo;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let data = std::fs::read("example.torrent")?;
/// let metainfo = Metainfo::from_bytes(&data)?;
///
/// println!("Torrent: {}", metainfo.info.name);
/// println!("Size: {} bytes", metainfo.info.total_length);
/// println!("Info hash: {}", metainfo.info_hash);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Metainfo {
    /// The info dictionary containing file and piece information.
    pub info: Info,
    /// SHA-1 of the canonical `info` dictionary.
    pub info_hash: InfoHash,
    /// Deduplicated tracker URLs (http, https or udp), in first-seen order.
    pub trackers: Vec<String>,
    /// Unix timestamp when the torrent was created.
    pub creation_date: Option<i64>,
    pub comment: Option<String>,
    pub created_by: Option<String>,
    raw_info: Bytes,
}

/// The info dictionary from a torrent file.
#[derive(Debug, Clone)]
pub struct Info {
    /// Suggested name for the file or directory.
    pub name: String,
    /// Number of bytes per piece (the final piece may be shorter).
    pub piece_length: u64,
    pub pieces: Vec<Piece>,
    /// Files in content order. Single-file torrents hold exactly one entry.
    pub files: Vec<File>,
    pub total_length: u64,
    pub private: bool,
}

/// A fixed-size, hash-verified chunk of the content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    pub index: u32,
    pub hash: [u8; 20],
    /// Absolute byte offset, `index * piece_length`.
    pub offset: u64,
    pub length: u64,
}

/// A file within a torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    /// Path relative to the download directory, rooted at the torrent name
    /// for multi-file torrents.
    pub path: PathBuf,
    pub length: u64,
    /// Absolute byte offset of the file's first byte.
    pub offset: u64,
    /// Indices of the pieces overlapping this file. Boundary pieces are
    /// shared with the neighbouring file.
    pub pieces: Range<u32>,
}

impl Metainfo {
    /// Parses a torrent file from raw bytes.
    ///
    /// # Errors
    ///
    /// - [`MetainfoError::Bencode`] if the data is not valid bencode
    /// - [`MetainfoError::MissingField`] / [`MetainfoError::InvalidField`]
    ///   naming the offending key
    /// - [`MetainfoError::CorruptPieceTable`] if `pieces` is empty or not a
    ///   multiple of 20 bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, MetainfoError> {
        let value = decode(data)?;
        let root = value.as_dict().ok_or(MetainfoError::InvalidField("root"))?;

        let trackers = parse_trackers(root)?;

        let info_value = required(root, "info")?;
        let info_dict = info_value
            .as_dict()
            .ok_or(MetainfoError::InvalidField("info"))?;

        let raw_info = Bytes::from(encode(info_value));
        let info = parse_info(info_dict)?;

        Ok(Self {
            info,
            info_hash: InfoHash::from_info_bytes(&raw_info),
            trackers,
            creation_date: root.get(b"creation date".as_slice()).and_then(Value::as_integer),
            comment: root
                .get(b"comment".as_slice())
                .and_then(Value::as_str)
                .map(String::from),
            created_by: root
                .get(b"created by".as_slice())
                .and_then(Value::as_str)
                .map(String::from),
            raw_info,
        })
    }

    /// Builds a descriptor from a bare info dictionary, as obtained from
    /// peers through the metadata extension.
    pub fn from_info_bytes(raw_info: &[u8], trackers: Vec<String>) -> Result<Self, MetainfoError> {
        let value = decode(raw_info)?;
        let info_dict = value
            .as_dict()
            .ok_or(MetainfoError::InvalidField("info"))?;
        let info = parse_info(info_dict)?;

        let mut deduped = Vec::with_capacity(trackers.len());
        for url in trackers {
            push_tracker(&mut deduped, &url);
        }

        Ok(Self {
            info,
            info_hash: InfoHash::from_info_bytes(raw_info),
            trackers: deduped,
            creation_date: None,
            comment: None,
            created_by: None,
            raw_info: Bytes::copy_from_slice(raw_info),
        })
    }

    /// The canonical bencoded info dictionary the info hash was computed over.
    pub fn raw_info(&self) -> &Bytes {
        &self.raw_info
    }
}

impl Info {
    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    pub fn piece(&self, index: u32) -> Option<&Piece> {
        self.pieces.get(index as usize)
    }

    /// The files overlapping the given piece.
    pub fn files_for_piece(&self, index: u32) -> impl Iterator<Item = &File> {
        self.files
            .iter()
            .filter(move |f| f.pieces.contains(&index))
    }
}

fn parse_trackers(root: &Dict) -> Result<Vec<String>, MetainfoError> {
    let announce = optional(root, "announce", Value::as_str)?;
    let announce_list = optional(root, "announce-list", Value::as_list)?;

    if announce.is_none() && announce_list.is_none() {
        return Err(MetainfoError::MissingField("announce"));
    }

    let mut trackers = Vec::new();

    if let Some(url) = announce {
        push_tracker(&mut trackers, url);
    }

    for tier in announce_list.unwrap_or_default() {
        let urls = tier
            .as_list()
            .ok_or(MetainfoError::InvalidField("announce-list"))?;
        for url in urls {
            let url = url
                .as_str()
                .ok_or(MetainfoError::InvalidField("announce-list"))?;
            push_tracker(&mut trackers, url);
        }
    }

    Ok(trackers)
}

fn push_tracker(trackers: &mut Vec<String>, url: &str) {
    let supported = TRACKER_SCHEMES.iter().any(|scheme| url.starts_with(scheme));
    if supported && !trackers.iter().any(|t| t == url) {
        trackers.push(url.to_string());
    }
}

fn parse_info(dict: &Dict) -> Result<Info, MetainfoError> {
    let name = required_str(dict, "name")?.to_string();

    let piece_length = required_u64(dict, "piece length")?;
    if piece_length == 0 {
        return Err(MetainfoError::InvalidField("piece length"));
    }

    let hashes = required_bytes(dict, "pieces")?;
    if hashes.is_empty() || hashes.len() % HASH_LEN != 0 {
        return Err(MetainfoError::CorruptPieceTable(hashes.len()));
    }

    let private = optional(dict, "private", Value::as_integer)?.is_some_and(|v| v == 1);

    let files = match optional(dict, "length", Value::as_integer)? {
        Some(length) => {
            let length = u64::try_from(length).map_err(|_| MetainfoError::InvalidField("length"))?;
            vec![File {
                path: PathBuf::from(&name),
                length,
                offset: 0,
                pieces: piece_range(0, length, piece_length),
            }]
        }
        None => parse_files(dict, &name, piece_length)?,
    };

    let total_length = files.iter().map(|f| f.length).sum::<u64>();
    let pieces = slice_pieces(hashes, piece_length, total_length)?;

    Ok(Info {
        name,
        piece_length,
        pieces,
        files,
        total_length,
        private,
    })
}

fn parse_files(dict: &Dict, name: &str, piece_length: u64) -> Result<Vec<File>, MetainfoError> {
    let entries = match dict.get(b"files".as_slice()) {
        Some(value) => value
            .as_list()
            .ok_or(MetainfoError::InvalidField("files"))?,
        None => return Err(MetainfoError::MissingField("length or files")),
    };

    let mut files = Vec::with_capacity(entries.len());
    let mut offset = 0u64;

    for entry in entries {
        let entry = entry
            .as_dict()
            .ok_or(MetainfoError::InvalidField("files"))?;

        let length = required_u64(entry, "length")?;

        let mut path = PathBuf::from(name);
        let components = required_list(entry, "path")?;
        if components.is_empty() {
            return Err(MetainfoError::InvalidField("path"));
        }
        for component in components {
            let component = component
                .as_str()
                .ok_or(MetainfoError::InvalidField("path"))?;
            if component.is_empty() || component == ".." || component.contains('/') {
                return Err(MetainfoError::InvalidField("path"));
            }
            path.push(component);
        }

        files.push(File {
            path,
            length,
            offset,
            pieces: piece_range(offset, length, piece_length),
        });

        offset = offset
            .checked_add(length)
            .ok_or(MetainfoError::InvalidField("length"))?;
    }

    if files.is_empty() {
        return Err(MetainfoError::InvalidField("files"));
    }

    Ok(files)
}

/// Piece indices covering `[offset, offset + length)`.
fn piece_range(offset: u64, length: u64, piece_length: u64) -> Range<u32> {
    let start = (offset / piece_length) as u32;
    if length == 0 {
        return start..start;
    }
    let end = (offset + length).div_ceil(piece_length) as u32;
    start..end
}

fn slice_pieces(
    hashes: &[u8],
    piece_length: u64,
    total_length: u64,
) -> Result<Vec<Piece>, MetainfoError> {
    let count = hashes.len() / HASH_LEN;
    let expected = total_length.div_ceil(piece_length);
    if expected != count as u64 {
        return Err(MetainfoError::PieceCountMismatch {
            expected,
            actual: count,
        });
    }

    Ok(hashes
        .chunks_exact(HASH_LEN)
        .enumerate()
        .map(|(i, chunk)| {
            let mut hash = [0u8; HASH_LEN];
            hash.copy_from_slice(chunk);
            let offset = i as u64 * piece_length;
            Piece {
                index: i as u32,
                hash,
                offset,
                length: piece_length.min(total_length - offset),
            }
        })
        .collect())
}
