use crate::metainfo::MetainfoError;
use crate::tracker::TrackerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// No remaining or obtainable peer can serve the outstanding pieces.
    #[error("swarm exhausted with {remaining} pieces outstanding")]
    SwarmExhausted { remaining: usize },

    #[error("piece index {index} out of range for {count} pieces")]
    PieceOutOfRange { index: u32, count: usize },

    #[error("download cancelled")]
    Cancelled,

    /// The sink refused a verified piece.
    #[error("sink error: {0}")]
    Sink(#[from] std::io::Error),

    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("metainfo error: {0}")]
    Metainfo(#[from] MetainfoError),

    #[error("no peer supplied the info dictionary")]
    MetadataUnavailable,

    #[error("piece task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
