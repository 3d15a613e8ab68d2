use std::net::SocketAddr;
use std::time::Duration;

/// Errors that can occur on the amplifier connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the amplifier.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// The configured amplifier address could not be resolved.
    #[error("cannot resolve amplifier address '{0}'")]
    Resolve(String),

    /// An I/O error occurred on the stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No reply arrived within the read timeout.
    #[error("no reply from amplifier within {0:?}")]
    Timeout(Duration),

    /// The amplifier closed the connection.
    #[error("connection closed by amplifier")]
    ConnectionClosed,

    /// An operation needed an open connection.
    #[error("transport is not connected")]
    NotConnected,

    /// `connect` was called on a transport that is already open.
    #[error("transport is already connected")]
    AlreadyConnected,
}

impl TransportError {
    /// True when the peer reset the connection underneath us.
    pub fn is_connection_reset(&self) -> bool {
        match self {
            TransportError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
