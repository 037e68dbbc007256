//! Error types for the session layer.

use realmsync_protocol::ErrorClass;

/// Errors raised while admitting a connection.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The credential was missing, malformed, or rejected by the
    /// [`IdentityOracle`](crate::IdentityOracle).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The client speaks a different protocol version.
    #[error("protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },

    /// The oracle did not answer within the configured bound.
    #[error("identity verification timed out")]
    Timeout,

    /// The oracle could not be reached.
    #[error("identity oracle unavailable: {0}")]
    Unavailable(String),

    /// A dev token table could not be parsed.
    #[error("invalid token table: {0}")]
    InvalidTokenTable(String),
}

impl SessionError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::AuthFailed(_) => ErrorClass::Auth,
            Self::VersionMismatch { .. } | Self::InvalidTokenTable(_) => {
                ErrorClass::Validation
            }
            Self::Timeout | Self::Unavailable(_) => ErrorClass::Downstream,
        }
    }

    /// The code carried by the `Error` frame sent before the connection is
    /// closed.
    pub fn code(&self) -> u16 {
        match self {
            Self::AuthFailed(_) => 401,
            Self::VersionMismatch { .. } | Self::InvalidTokenTable(_) => 400,
            Self::Timeout | Self::Unavailable(_) => 503,
        }
    }
}
