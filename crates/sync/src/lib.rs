//! Store synchronization workflows.
//!
//! This crate holds the business logic for publishing a local QGIS project
//! directory to a QCarta server. It has no UI or HTTP code of its own: the
//! server is reached through the [`Authenticator`] and [`StoreSession`]
//! traits, which `qcarta-client` implements and tests replace with mocks.
//!
//! # Create
//!
//! 1. **Authenticate**
//! 2. **Scan** the project directory
//! 3. **Send project files** (`.qgs`) to the upload area
//! 4. **Register** the store from those files
//! 5. **Fetch** the new store's descriptor
//! 6. **Sync** every other file: chunked upload, then registration
//!
//! # Update
//!
//! 1. **Authenticate**
//! 2. **Fetch** the store descriptor and manifest
//! 3. **Scan** and diff against the manifest
//! 4. **Sync** the files that are missing remotely or newer locally

pub mod changeset;
pub mod error;
pub mod orchestrator;
pub mod remote;
pub mod scanner;
pub mod types;
pub mod uploader;

// Re-export primary types for convenience.
pub use changeset::{build_create_set, build_update_set};
pub use error::{FileError, SyncError};
pub use orchestrator::StoreOrchestrator;
pub use remote::{Authenticator, HttpAuthenticator, RemoteFuture, StoreSession};
pub use scanner::{LocalScan, scan};
pub use types::{
    ChangeEntry, ChangeReason, CreateRequest, FileKind, LocalFileEntry, SyncEvent, SyncReport,
    SyncState, TransferOutcome, UpdateRequest, Workflow,
};
pub use uploader::upload_file;
