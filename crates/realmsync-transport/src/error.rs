/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer closed the connection (or it was closed locally).
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Writing a frame failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Reading a frame failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// An inbound frame exceeded [`TransportConfig::max_frame_bytes`].
    ///
    /// [`TransportConfig::max_frame_bytes`]: crate::TransportConfig::max_frame_bytes
    #[error("frame of {size} bytes exceeds the {limit} byte limit")]
    FrameTooLarge { size: usize, limit: usize },

    /// Binding the listener or accepting a socket failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The WebSocket upgrade on an accepted socket failed or stalled.
    #[error("upgrade failed: {0}")]
    UpgradeFailed(String),

    /// The transport stopped accepting.
    #[error("transport shut down")]
    Shutdown,
}
