//! Server-facing traits used by the workflows.
//!
//! `qcarta_client::Session` implements [`StoreSession`]; [`HttpAuthenticator`]
//! produces such sessions by logging in. Keeping the workflows behind these
//! traits lets tests drive them with scripted mocks.

use std::future::Future;
use std::pin::Pin;

use qcarta_client::Session;
use qcarta_protocol::{ServerProfile, StoreDescriptor};

/// Boxed future returned by the remote traits.
pub type RemoteFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, qcarta_client::Error>> + Send + 'a>>;

/// The calls a workflow makes on an authenticated session.
pub trait StoreSession: Send + Sync {
    /// Fetches a store's descriptor and manifest.
    fn store_info<'a>(&'a self, store_name: &'a str) -> RemoteFuture<'a, StoreDescriptor>;

    /// Sends one chunk of `source` starting at `offset`.
    fn upload_chunk<'a>(
        &'a self,
        source: &'a str,
        offset: u64,
        data: &'a [u8],
    ) -> RemoteFuture<'a, ()>;

    /// Registers an uploaded file in a store.
    fn register_file<'a>(
        &'a self,
        store_id: &'a str,
        relative_path: &'a str,
        mtime: f64,
    ) -> RemoteFuture<'a, ()>;

    /// Creates a store from uploaded project files.
    fn save_store<'a>(
        &'a self,
        name: &'a str,
        sources: &'a [String],
        access_group_ids: &'a [String],
    ) -> RemoteFuture<'a, Option<String>>;
}

/// Opens sessions.
pub trait Authenticator: Send + Sync {
    type Session: StoreSession;

    fn authenticate<'a>(&'a self, profile: &'a ServerProfile) -> RemoteFuture<'a, Self::Session>;
}

/// Logs in over HTTP with `qcarta_client`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpAuthenticator;

impl Authenticator for HttpAuthenticator {
    type Session = Session;

    fn authenticate<'a>(&'a self, profile: &'a ServerProfile) -> RemoteFuture<'a, Session> {
        Box::pin(Session::login(profile))
    }
}

impl StoreSession for Session {
    fn store_info<'a>(&'a self, store_name: &'a str) -> RemoteFuture<'a, StoreDescriptor> {
        Box::pin(Session::store_info(self, store_name))
    }

    fn upload_chunk<'a>(
        &'a self,
        source: &'a str,
        offset: u64,
        data: &'a [u8],
    ) -> RemoteFuture<'a, ()> {
        Box::pin(Session::upload_chunk(self, source, offset, data))
    }

    fn register_file<'a>(
        &'a self,
        store_id: &'a str,
        relative_path: &'a str,
        mtime: f64,
    ) -> RemoteFuture<'a, ()> {
        Box::pin(Session::register_file(self, store_id, relative_path, mtime))
    }

    fn save_store<'a>(
        &'a self,
        name: &'a str,
        sources: &'a [String],
        access_group_ids: &'a [String],
    ) -> RemoteFuture<'a, Option<String>> {
        Box::pin(Session::save_store(self, name, sources, access_group_ids))
    }
}
