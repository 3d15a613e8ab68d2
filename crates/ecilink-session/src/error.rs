/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] ecilink_transport::TransportError),

    /// Command construction or reply parsing failed.
    #[error("codec error: {0}")]
    Codec(#[from] ecilink_codec::CodecError),

    /// Operation requires a connected session.
    #[error("not connected to the amp server")]
    NotConnected,

    /// `connect` called on a session that is already connected.
    #[error("already connected to the amp server")]
    AlreadyConnected,

    /// NTP synchronization was requested without an NTP server address.
    #[error("NTP clock sync requires the address of an NTP server")]
    MissingPeerAddress,

    /// `begin_recording` called while a recording is running.
    #[error("recording already in progress")]
    AlreadyRecording,

    /// `end_recording` called with no recording running.
    #[error("no recording in progress")]
    NotRecording,

    /// An argument outside the accepted set.
    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    /// The NTP client could not measure the clock offset.
    #[error("NTP query to {peer} failed: {reason}")]
    Ntp { peer: String, reason: String },

    /// The amp server reset the connection while receiving events.
    #[error(
        "amp server reset the connection; too many or too large events are \
         likely being sent, consider sending fewer"
    )]
    AmplifierOverloaded(#[source] ecilink_transport::TransportError),
}

impl SessionError {
    /// True for a read that hit the reply timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            SessionError::Transport(ecilink_transport::TransportError::Timeout(_))
        )
    }

    /// True when the session was used in the wrong state.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            SessionError::NotConnected
                | SessionError::AlreadyConnected
                | SessionError::MissingPeerAddress
                | SessionError::AlreadyRecording
                | SessionError::NotRecording
        )
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
