//! Sync error types.

use std::path::PathBuf;

use qcarta_transfer::TransferError;

/// Errors that end a workflow.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("authentication failed: {0}")]
    Auth(qcarta_client::Error),

    #[error("cannot fetch store '{store}': {source}")]
    Manifest {
        store: String,
        source: qcarta_client::Error,
    },

    #[error("store creation failed: {0}")]
    StoreCreate(String),

    #[error("cannot scan {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid store limits: {0}")]
    Transfer(#[from] TransferError),

    #[error("cancelled")]
    Cancelled,
}

/// Errors confined to one file of a batch.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("cannot read file: {0}")]
    Read(#[from] TransferError),

    #[error("chunk upload failed at offset {offset}: {source}")]
    ChunkUpload {
        offset: u64,
        source: qcarta_client::Error,
    },

    #[error("registration failed: {0}")]
    Registration(qcarta_client::Error),

    #[error("cancelled")]
    Cancelled,
}

impl From<walkdir::Error> for SyncError {
    fn from(e: walkdir::Error) -> Self {
        let path = e.path().map(PathBuf::from).unwrap_or_default();
        SyncError::Scan {
            path,
            source: e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_error_reports_offset() {
        let err = FileError::ChunkUpload {
            offset: 129072,
            source: qcarta_client::Error::Status {
                status: 500,
                message: "disk full".into(),
            },
        };
        assert_eq!(
            err.to_string(),
            "chunk upload failed at offset 129072: HTTP 500: disk full"
        );
    }

    #[test]
    fn auth_error_display() {
        let err = SyncError::Auth(qcarta_client::Error::Status {
            status: 403,
            message: "Invalid credentials".into(),
        });
        assert_eq!(
            err.to_string(),
            "authentication failed: HTTP 403: Invalid credentials"
        );
    }
}
