//! Chunked upload of a single file.

use qcarta_transfer::{ChunkReader, ProgressCounter};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::FileError;
use crate::remote::StoreSession;
use crate::types::LocalFileEntry;

/// Streams `file` to the upload area in chunks of at most `chunk_size` bytes.
///
/// Chunks are sent in order under the file's base name; the offset only
/// advances once the server accepts a chunk. Cancellation is checked
/// before every chunk. Returns the number of bytes sent.
pub async fn upload_file<S: StoreSession + ?Sized>(
    session: &S,
    file: &LocalFileEntry,
    chunk_size: usize,
    cancel: &CancellationToken,
    counter: &mut ProgressCounter,
) -> Result<u64, FileError> {
    let mut reader = ChunkReader::open(&file.absolute_path, chunk_size).await?;
    let source = file.file_name();
    let mut sent = 0u64;

    loop {
        if cancel.is_cancelled() {
            return Err(FileError::Cancelled);
        }

        let Some(chunk) = reader.next_chunk().await? else {
            break;
        };

        session
            .upload_chunk(source, chunk.offset, &chunk.data)
            .await
            .map_err(|e| FileError::ChunkUpload {
                offset: chunk.offset,
                source: e,
            })?;

        sent += chunk.len() as u64;
        counter.add_bytes(chunk.len() as u64);
    }

    debug!(path = %file.relative_path, bytes = sent, "file uploaded");
    Ok(sent)
}
