//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`HomeflowError`] via `#[from]` (or an explicit `From` impl for
//! adapter errors, which are boxed into the `Storage`/`Bus` variants).

/// Top-level error crossing port boundaries.
#[derive(Debug, thiserror::Error)]
pub enum HomeflowError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("malformed payload")]
    Decode(#[from] DecodeError),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("message bus error")]
    Bus(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A domain invariant was violated.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("identifier must not be empty")]
    EmptyId,

    #[error("name must not be empty")]
    EmptyName,
}

/// An inbound payload or stored record could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON")]
    Json(#[from] serde_json::Error),

    #[error("missing or invalid field `{0}`")]
    MissingField(&'static str),
}
