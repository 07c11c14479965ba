/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Dialing the remote endpoint failed (bad URL, refused, timed out,
    /// handshake rejected).
    #[error("connect to {addr} failed: {reason}")]
    ConnectFailed {
        /// The address that was dialed.
        addr: String,
        /// Human-readable failure reason from the underlying stack.
        reason: String,
    },

    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),
}

impl TransportError {
    /// Builds a [`TransportError::ConnectFailed`] from any displayable cause.
    pub fn connect_failed(
        addr: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::ConnectFailed {
            addr: addr.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_failed_display_names_address() {
        let err = TransportError::connect_failed("ws://x:1", "refused");
        assert_eq!(err.to_string(), "connect to ws://x:1 failed: refused");
    }
}
