use std::path::Path;

use qcarta_protocol::constants::CHUNK_SAFETY_MARGIN;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::TransferError;

/// A slice of file data sent in one upload request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Byte offset within the file.
    pub offset: u64,
    /// Raw chunk data.
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Derives the upload chunk size from the server's request-body limit.
pub fn chunk_size_for(post_max_size: u64) -> Result<usize, TransferError> {
    match post_max_size.checked_sub(CHUNK_SAFETY_MARGIN) {
        Some(size) if size > 0 => {
            Ok(usize::try_from(size).map_err(|_| TransferError::PostLimitTooSmall(post_max_size))?)
        }
        _ => Err(TransferError::PostLimitTooSmall(post_max_size)),
    }
}

/// Number of chunks a file of `file_size` bytes is split into.
pub fn chunk_count(file_size: u64, chunk_size: usize) -> u64 {
    if chunk_size == 0 {
        return 0;
    }
    file_size.div_ceil(chunk_size as u64)
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Reads a file sequentially in chunks of exactly `chunk_size` bytes
/// (the last one may be shorter).
///
/// The sequence is finite and bounded by the file size observed at open.
pub struct ChunkReader {
    file: tokio::fs::File,
    chunk_size: usize,
    offset: u64,
    file_size: u64,
}

impl ChunkReader {
    /// Opens `path` for chunked reading.
    pub async fn open(path: &Path, chunk_size: usize) -> Result<Self, TransferError> {
        if chunk_size == 0 {
            return Err(TransferError::ZeroChunkSize);
        }
        let file = tokio::fs::File::open(path).await?;
        let file_size = file.metadata().await?.len();
        debug!(
            path = %path.display(),
            file_size,
            chunk_size,
            chunks = chunk_count(file_size, chunk_size),
            "opened for chunked read"
        );
        Ok(Self {
            file,
            chunk_size,
            offset: 0,
            file_size,
        })
    }

    /// Reads the next chunk. Returns `None` at EOF.
    pub async fn next_chunk(&mut self) -> Result<Option<Chunk>, TransferError> {
        let remaining = self.remaining();
        if remaining == 0 {
            return Ok(None);
        }

        let read_size = remaining.min(self.chunk_size as u64) as usize;
        let mut buf = vec![0u8; read_size];
        let mut filled = 0;
        // A single read may return short; fill the chunk unless the file shrank.
        while filled < read_size {
            let n = self.file.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            self.file_size = self.offset;
            return Ok(None);
        }
        buf.truncate(filled);

        let chunk = Chunk {
            offset: self.offset,
            data: buf,
        };
        self.offset += filled as u64;
        if filled < read_size {
            self.file_size = self.offset;
        }
        Ok(Some(chunk))
    }

    /// Current byte offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Total file size in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Bytes remaining to read.
    pub fn remaining(&self) -> u64 {
        self.file_size.saturating_sub(self.offset)
    }
}
