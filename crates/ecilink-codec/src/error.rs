use std::fmt;

/// Event record field that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventField {
    Start,
    Duration,
    Type,
    Label,
    Description,
    Data,
}

impl fmt::Display for EventField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventField::Start => "start",
            EventField::Duration => "duration",
            EventField::Type => "type",
            EventField::Label => "label",
            EventField::Description => "description",
            EventField::Data => "data",
        };
        f.write_str(name)
    }
}

/// Errors raised while building commands, parsing replies or encoding events.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    /// Integer width other than 1, 2, 4 or 8 bytes.
    #[error("unsupported integer width: {0} bytes")]
    InvalidIntegerWidth(usize),

    /// Integer does not fit the requested width.
    #[error("value {value} does not fit in {size} bytes")]
    IntegerOutOfRange { value: u64, size: usize },

    /// NTP timestamp bytes of the wrong length.
    #[error("{0} bytes given instead of 8 for an NTP timestamp")]
    InvalidTimeEncoding(usize),

    /// Value with no NTP timestamp representation.
    #[error("{0} is not valid for an NTP timestamp")]
    InvalidTimeType(String),

    /// Command name or tag outside the ECI command set.
    #[error("invalid ECI command: {0}")]
    UnknownCommand(String),

    /// Payload supplied to a command that takes none.
    #[error("command {command} does not take data: {payload}")]
    UnexpectedPayload {
        command: &'static str,
        payload: String,
    },

    /// Payload missing on a command that needs one.
    #[error("command {0} requires an argument")]
    MissingPayload(&'static str),

    /// Query payload is not an allowed endianness token.
    #[error("{0} is not a valid endian")]
    IllegalEndian(String),

    /// ClockSync payload is not a 32-bit integer.
    #[error("{0} is not a valid clock integer")]
    ClockValueNotInteger(String),

    /// NTP command payload could not be turned into an NTP timestamp.
    #[error("invalid NTP payload for {command}: {reason}")]
    InvalidNtpPayload {
        command: &'static str,
        reason: String,
    },

    /// EventData payload is not a pre-encoded byte buffer.
    #[error("event data requires bytes, got {0}")]
    PayloadNotBytes(String),

    /// The amplifier replied with failure (`F`).
    #[error("amp responded with failure")]
    AmplifierFailure,

    /// The amplifier replied with no recording device (`R`).
    #[error("no recording device found; please check setup")]
    NoRecordingDevice,

    /// Reply bytes of an unexpected length or shape.
    #[error("malformed ECI response ({} bytes): {:02x?}", .0.len(), .0)]
    MalformedResponse(Vec<u8>),

    /// An event record field failed validation.
    #[error("invalid event {field}: {reason}")]
    InvalidEventField { field: EventField, reason: String },
}

impl CodecError {
    /// Failure reported by the amplifier itself.
    pub fn is_amplifier_failure(&self) -> bool {
        matches!(
            self,
            CodecError::AmplifierFailure | CodecError::NoRecordingDevice
        )
    }

    /// Reply that cannot be matched to the request; the session is out of step.
    pub fn is_desync(&self) -> bool {
        matches!(self, CodecError::MalformedResponse(_))
    }

    pub(crate) fn event(field: EventField, reason: impl Into<String>) -> Self {
        CodecError::InvalidEventField {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
