//! Error types for the protocol layer, and the error taxonomy every other
//! layer classifies its failures into.

/// The four kinds of failure a client can experience.
///
/// Each layer's error type maps onto one of these via a `class()` method;
/// the gateway uses the class to decide what the client gets to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Bad or missing credentials. Rejects the connection.
    Auth,
    /// The request itself is wrong. Returned verbatim to the actor.
    Validation,
    /// Lost a race on a shared object. Returned verbatim to the actor.
    Contention,
    /// A collaborator failed or timed out. Logged in detail, the client
    /// only sees a generic message.
    Downstream,
}

impl ErrorClass {
    /// Whether the error's own message may be shown to the client.
    pub fn is_client_visible(self) -> bool {
        matches!(self, Self::Validation | Self::Contention)
    }
}

/// Errors that can occur while encoding, decoding, or interpreting frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The frame is not valid JSON or does not match the envelope shape.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame decoded but breaks a protocol rule (wrong message for
    /// the connection phase, version mismatch, ...).
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The action kind is not one the gateway recognises.
    #[error("unknown action kind: {0}")]
    UnknownAction(String),

    /// The action kind is known but its payload is malformed.
    #[error("invalid payload for {kind}: {reason}")]
    InvalidPayload { kind: &'static str, reason: String },
}

impl ProtocolError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Encode(_) => ErrorClass::Downstream,
            _ => ErrorClass::Validation,
        }
    }
}
