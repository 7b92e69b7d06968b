use bytes::Bytes;
use std::io::{self, Write};

/// Receives verified pieces.
///
/// Pieces arrive in increasing offset order with no gaps within the
/// selected range. Offsets are absolute positions in the torrent's
/// concatenated content.
pub trait PieceSink {
    fn write_piece(&mut self, offset: u64, data: Bytes) -> io::Result<()>;
}

impl<S: PieceSink + ?Sized> PieceSink for &mut S {
    fn write_piece(&mut self, offset: u64, data: Bytes) -> io::Result<()> {
        (**self).write_piece(offset, data)
    }
}

/// Keeps every piece in memory, in the order received.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pieces: Vec<(u64, Bytes)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pieces(&self) -> &[(u64, Bytes)] {
        &self.pieces
    }

    /// Total bytes received.
    pub fn len(&self) -> u64 {
        self.pieces.iter().map(|(_, data)| data.len() as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Concatenates the received pieces.
    pub fn into_bytes(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len() as usize);
        for (_, data) in self.pieces {
            out.extend_from_slice(&data);
        }
        out
    }
}

impl PieceSink for MemorySink {
    fn write_piece(&mut self, offset: u64, data: Bytes) -> io::Result<()> {
        self.pieces.push((offset, data));
        Ok(())
    }
}

/// Streams pieces into any [`Write`].
///
/// The first piece may start at any offset; after that each piece must
/// begin where the previous one ended.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
    position: Option<u64>,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            position: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> PieceSink for WriterSink<W> {
    fn write_piece(&mut self, offset: u64, data: Bytes) -> io::Result<()> {
        if let Some(position) = self.position {
            if offset != position {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("piece at offset {} does not follow {}", offset, position),
                ));
            }
        }

        self.writer.write_all(&data)?;
        self.position = Some(offset + data.len() as u64);
        Ok(())
    }
}
