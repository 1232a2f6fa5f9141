//! HTTP client for the QCarta admin and REST endpoints.
//!
//! A [`Session`] is created by logging in and holds the cookie jar the
//! server hands out; every later call of a workflow goes through it.

pub mod error;
pub mod session;

#[cfg(test)]
mod mock_server;

pub use error::Error;
pub use session::{PublishedLayer, Session, test_connection};
