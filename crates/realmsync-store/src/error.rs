//! Error types for the store contract.

use realmsync_protocol::ErrorClass;

/// Errors a [`WorldStore`](crate::WorldStore) backend can report.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or refused the call.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness rule was violated (second character for an account,
    /// duplicate slot index, duplicate item slot).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The row the write targets does not exist.
    #[error("{0} not found")]
    NotFound(String),
}

impl StoreError {
    /// Store failures are never the client's fault. Layers above that can
    /// attribute a conflict or a missing row to the request translate it
    /// into their own validation error first.
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Downstream
    }
}
