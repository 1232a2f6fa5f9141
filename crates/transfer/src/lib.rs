//! Chunked file reading and progress accounting for store uploads.

mod chunked;
mod progress;

pub use chunked::{Chunk, ChunkReader, chunk_count, chunk_size_for};
pub use progress::{Progress, ProgressCounter};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk size must be positive")]
    ZeroChunkSize,

    #[error("server post_max_size {0} leaves no room for chunk data")]
    PostLimitTooSmall(u64),
}
