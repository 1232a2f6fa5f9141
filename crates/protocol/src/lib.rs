//! Wire protocol for the QCarta admin and REST API.
//!
//! Everything that crosses the HTTP boundary lives here: endpoint paths,
//! request form encoding and the decoded shapes of server replies.

pub mod constants;
pub mod form;
pub mod reply;
pub mod types;

// Re-export primary types for convenience.
pub use form::{FORM_CONTENT_TYPE, FormBody};
pub use reply::{ApiReply, error_message};
pub use types::{
    AccessGroupList, BasemapList, LayerFlags, LayerPublish, NamedId, RemoteFileEntry, SavedId,
    ServerProfile, StoreDescriptor, StoreInfoResponse, StoreListResponse, StoreSummary,
};

/// Errors produced while decoding or validating protocol values.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed reply: {0}")]
    Malformed(String),

    #[error("server rejected request: {0}")]
    Rejected(String),

    #[error("invalid request: {0}")]
    Invalid(String),
}
