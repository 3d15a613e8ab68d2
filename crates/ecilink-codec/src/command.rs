use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CodecError, Result};
use crate::primitives::{to_ntp_bytes, NtpInput};

/// The fixed ECI command set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Query,
    NewQuery,
    Exit,
    BeginRecording,
    EndRecording,
    Attention,
    ClockSync,
    NtpClockSync,
    NtpReturnClock,
    EventData,
}

impl CommandKind {
    /// Every command kind, in protocol-table order.
    pub const ALL: [CommandKind; 10] = [
        CommandKind::Query,
        CommandKind::NewQuery,
        CommandKind::Exit,
        CommandKind::BeginRecording,
        CommandKind::EndRecording,
        CommandKind::Attention,
        CommandKind::ClockSync,
        CommandKind::NtpClockSync,
        CommandKind::NtpReturnClock,
        CommandKind::EventData,
    ];

    /// The tag byte that opens this command on the wire.
    pub fn tag(self) -> u8 {
        match self {
            CommandKind::Query => b'Q',
            CommandKind::NewQuery => b'Y',
            CommandKind::Exit => b'X',
            CommandKind::BeginRecording => b'B',
            CommandKind::EndRecording => b'E',
            CommandKind::Attention => b'A',
            CommandKind::ClockSync => b'T',
            CommandKind::NtpClockSync => b'N',
            CommandKind::NtpReturnClock => b'S',
            CommandKind::EventData => b'D',
        }
    }

    /// Protocol name of the command.
    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Query => "Query",
            CommandKind::NewQuery => "NewQuery",
            CommandKind::Exit => "Exit",
            CommandKind::BeginRecording => "BeginRecording",
            CommandKind::EndRecording => "EndRecording",
            CommandKind::Attention => "Attention",
            CommandKind::ClockSync => "ClockSync",
            CommandKind::NtpClockSync => "NTPClockSync",
            CommandKind::NtpReturnClock => "NTPReturnClock",
            CommandKind::EventData => "EventData",
        }
    }

    /// Look a command up by its tag byte.
    pub fn from_tag(tag: u8) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.tag() == tag)
            .ok_or_else(|| CodecError::UnknownCommand(format!("tag 0x{tag:02x}")))
    }

    /// Whether the command must carry a payload.
    ///
    /// `NTPReturnClock` is listed without data in the SDK guide, but the
    /// amplifier only answers it when an NTP timestamp follows the tag.
    pub fn requires_payload(self) -> bool {
        matches!(
            self,
            CommandKind::Query
                | CommandKind::ClockSync
                | CommandKind::NtpClockSync
                | CommandKind::NtpReturnClock
                | CommandKind::EventData
        )
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommandKind {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| CodecError::UnknownCommand(s.to_string()))
    }
}

/// Host byte-order token sent with `Query`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Endian {
    /// `NTEL`: little-endian hosts.
    #[default]
    Ntel,
    /// `MAC-`: big-endian (PowerPC era) Macs.
    Mac,
    /// `UNIX`: big-endian Unix hosts.
    Unix,
}

impl Endian {
    /// The tokens the amplifier accepts.
    pub const ALLOWED: [&'static str; 3] = ["NTEL", "MAC-", "UNIX"];

    /// The four ASCII characters sent on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Endian::Ntel => "NTEL",
            Endian::Mac => "MAC-",
            Endian::Unix => "UNIX",
        }
    }

    /// Token describing the byte order of this host.
    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            Endian::Ntel
        } else {
            Endian::Unix
        }
    }
}

impl fmt::Display for Endian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Endian {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NTEL" => Ok(Endian::Ntel),
            "MAC-" => Ok(Endian::Mac),
            "UNIX" => Ok(Endian::Unix),
            other => Err(CodecError::IllegalEndian(other.to_string())),
        }
    }
}

/// Loosely typed command payload, checked against the command kind on encode.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Integer(i64),
    Float(f64),
    Bytes(Bytes),
}

impl Payload {
    fn describe(&self) -> String {
        match self {
            Payload::Text(text) => format!("text {text:?}"),
            Payload::Integer(value) => format!("integer {value}"),
            Payload::Float(value) => format!("float {value}"),
            Payload::Bytes(bytes) => format!("{} bytes", bytes.len()),
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Text(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Text(value)
    }
}

impl From<Endian> for Payload {
    fn from(value: Endian) -> Self {
        Payload::Text(value.as_str().to_string())
    }
}

impl From<i64> for Payload {
    fn from(value: i64) -> Self {
        Payload::Integer(value)
    }
}

impl From<i32> for Payload {
    fn from(value: i32) -> Self {
        Payload::Integer(i64::from(value))
    }
}

impl From<f64> for Payload {
    fn from(value: f64) -> Self {
        Payload::Float(value)
    }
}

impl From<Bytes> for Payload {
    fn from(value: Bytes) -> Self {
        Payload::Bytes(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(value))
    }
}

impl From<&[u8]> for Payload {
    fn from(value: &[u8]) -> Self {
        Payload::Bytes(Bytes::copy_from_slice(value))
    }
}

/// Build the wire bytes for `kind` with an optional payload.
///
/// Wire format: the command's tag byte followed by its encoded payload.
/// ```text
/// ┌─────────┬──────────────────────────────────────────────┐
/// │ Tag (1B)│ Payload (0, 4, 8 or event-record bytes)      │
/// └─────────┴──────────────────────────────────────────────┘
/// ```
pub fn encode(kind: CommandKind, payload: Option<Payload>) -> Result<Bytes> {
    let mut dst = BytesMut::with_capacity(16);
    dst.put_u8(kind.tag());

    if !kind.requires_payload() {
        if let Some(payload) = payload {
            return Err(CodecError::UnexpectedPayload {
                command: kind.name(),
                payload: payload.describe(),
            });
        }
        return Ok(dst.freeze());
    }

    let payload = payload.ok_or(CodecError::MissingPayload(kind.name()))?;

    match kind {
        CommandKind::Query => {
            let endian = match &payload {
                Payload::Text(token) => token.parse::<Endian>()?,
                other => return Err(CodecError::IllegalEndian(other.describe())),
            };
            dst.put_slice(endian.as_str().as_bytes());
        }
        CommandKind::ClockSync => {
            let millis = match payload {
                Payload::Integer(value) => i32::try_from(value)
                    .map_err(|_| CodecError::ClockValueNotInteger(format!("integer {value}")))?,
                other => return Err(CodecError::ClockValueNotInteger(other.describe())),
            };
            dst.put_i32_le(millis);
        }
        CommandKind::NtpClockSync | CommandKind::NtpReturnClock => {
            let input = match payload {
                Payload::Integer(value) => NtpInput::Whole(value),
                Payload::Float(value) => NtpInput::Seconds(value),
                Payload::Bytes(bytes) => NtpInput::Raw(bytes),
                Payload::Text(text) => {
                    return Err(CodecError::InvalidNtpPayload {
                        command: kind.name(),
                        reason: format!("text {text:?} is not a time"),
                    });
                }
            };
            let stamp = to_ntp_bytes(input).map_err(|err| CodecError::InvalidNtpPayload {
                command: kind.name(),
                reason: err.to_string(),
            })?;
            dst.put_slice(&stamp);
        }
        CommandKind::EventData => match payload {
            Payload::Bytes(record) => {
                dst.reserve(record.len());
                dst.put_slice(&record);
            }
            other => return Err(CodecError::PayloadNotBytes(other.describe())),
        },
        CommandKind::NewQuery
        | CommandKind::Exit
        | CommandKind::BeginRecording
        | CommandKind::EndRecording
        | CommandKind::Attention => {} // payload-free, handled above
    }

    Ok(dst.freeze())
}

/// Build the wire bytes for a command given by protocol name.
pub fn encode_named(name: &str, payload: Option<Payload>) -> Result<Bytes> {
    encode(name.parse()?, payload)
}

/// A command with exactly the payload its kind needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Query(Endian),
    NewQuery,
    Exit,
    BeginRecording,
    EndRecording,
    Attention,
    /// Local clock in milliseconds.
    ClockSync(i32),
    /// Corrected local time, NTP-era seconds.
    NtpClockSync(f64),
    /// Corrected local time, NTP-era seconds.
    NtpReturnClock(f64),
    /// A record produced by [`crate::event::encode_event`].
    EventData(Bytes),
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Query(_) => CommandKind::Query,
            Command::NewQuery => CommandKind::NewQuery,
            Command::Exit => CommandKind::Exit,
            Command::BeginRecording => CommandKind::BeginRecording,
            Command::EndRecording => CommandKind::EndRecording,
            Command::Attention => CommandKind::Attention,
            Command::ClockSync(_) => CommandKind::ClockSync,
            Command::NtpClockSync(_) => CommandKind::NtpClockSync,
            Command::NtpReturnClock(_) => CommandKind::NtpReturnClock,
            Command::EventData(_) => CommandKind::EventData,
        }
    }

    fn payload(&self) -> Option<Payload> {
        match self {
            Command::Query(endian) => Some((*endian).into()),
            Command::ClockSync(millis) => Some((*millis).into()),
            Command::NtpClockSync(seconds) | Command::NtpReturnClock(seconds) => {
                Some((*seconds).into())
            }
            Command::EventData(record) => Some(record.clone().into()),
            Command::NewQuery
            | Command::Exit
            | Command::BeginRecording
            | Command::EndRecording
            | Command::Attention => None,
        }
    }

    /// Encode through the same validation as [`encode`].
    pub fn encode(&self) -> Result<Bytes> {
        encode(self.kind(), self.payload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD_FREE: [CommandKind; 5] = [
        CommandKind::Exit,
        CommandKind::NewQuery,
        CommandKind::BeginRecording,
        CommandKind::EndRecording,
        CommandKind::Attention,
    ];

    #[test]
    fn unknown_command_name() {
        assert_eq!(
            encode_named("Eixt", None),
            Err(CodecError::UnknownCommand("Eixt".to_string()))
        );
        assert!(matches!(
            CommandKind::from_tag(b'W'),
            Err(CodecError::UnknownCommand(_))
        ));
    }

    #[test]
    fn tags_roundtrip_through_lookup() {
        for kind in CommandKind::ALL {
            assert_eq!(CommandKind::from_tag(kind.tag()).unwrap(), kind);
            assert_eq!(kind.name().parse::<CommandKind>().unwrap(), kind);
        }
    }

    #[test]
    fn payload_free_commands_are_single_tag_bytes() {
        for kind in PAYLOAD_FREE {
            let wire = encode(kind, None).unwrap();
            assert_eq!(wire.as_ref(), &[kind.tag()]);
        }
        assert_eq!(encode_named("Exit", None).unwrap().as_ref(), b"X");
    }

    #[test]
    fn payload_free_commands_reject_any_payload() {
        let payloads = [
            Payload::Integer(0),
            Payload::Float(1.5),
            Payload::Text("NTEL".into()),
            Payload::Bytes(Bytes::new()),
        ];
        for kind in PAYLOAD_FREE {
            for payload in payloads.clone() {
                assert!(matches!(
                    encode(kind, Some(payload)),
                    Err(CodecError::UnexpectedPayload { .. })
                ));
            }
        }
    }

    #[test]
    fn payload_commands_require_payload() {
        for kind in CommandKind::ALL.into_iter().filter(|k| k.requires_payload()) {
            assert_eq!(
                encode(kind, None),
                Err(CodecError::MissingPayload(kind.name()))
            );
        }
    }

    #[test]
    fn query_carries_endian_token() {
        for token in Endian::ALLOWED {
            let wire = encode(CommandKind::Query, Some(token.into())).unwrap();
            assert_eq!(wire.len(), 5);
            assert_eq!(wire[0], 0x51);
            assert_eq!(&wire[1..], token.as_bytes());
        }
        assert_eq!(
            Command::Query(Endian::Mac).encode().unwrap().as_ref(),
            b"QMAC-"
        );
    }

    #[test]
    fn query_rejects_other_tokens() {
        for bad in ["ntel", "BIG!", "", "NTELX"] {
            assert_eq!(
                encode(CommandKind::Query, Some(bad.into())),
                Err(CodecError::IllegalEndian(bad.to_string()))
            );
        }
        assert!(matches!(
            encode(CommandKind::Query, Some(Payload::Integer(1))),
            Err(CodecError::IllegalEndian(_))
        ));
    }

    #[test]
    fn clock_sync_is_signed_little_endian_millis() {
        let wire = Command::ClockSync(-2).encode().unwrap();
        assert_eq!(wire.as_ref(), &[b'T', 0xFE, 0xFF, 0xFF, 0xFF]);

        let wire = encode(CommandKind::ClockSync, Some(Payload::Integer(1000))).unwrap();
        assert_eq!(&wire[1..], &1000i32.to_le_bytes());
    }

    #[test]
    fn clock_sync_rejects_non_integers() {
        assert!(matches!(
            encode(CommandKind::ClockSync, Some(Payload::Float(0.15))),
            Err(CodecError::ClockValueNotInteger(_))
        ));
        assert!(matches!(
            encode(CommandKind::ClockSync, Some("cat".into())),
            Err(CodecError::ClockValueNotInteger(_))
        ));
        assert!(matches!(
            encode(CommandKind::ClockSync, Some(Payload::Integer(i64::MAX))),
            Err(CodecError::ClockValueNotInteger(_))
        ));
    }

    #[test]
    fn ntp_commands_append_timestamp() {
        let tick = 1.0 / 4_294_967_296.0;
        for kind in [CommandKind::NtpClockSync, CommandKind::NtpReturnClock] {
            let wire = encode(kind, Some(Payload::Float(1.0 + tick))).unwrap();
            assert_eq!(wire.len(), 9);
            assert_eq!(wire[0], kind.tag());
            assert_eq!(&wire[1..5], &1u32.to_le_bytes());
            assert_eq!(&wire[5..], &1u32.to_le_bytes());
        }
    }

    #[test]
    fn ntp_commands_reject_bad_timestamps() {
        let five: &[u8] = &[2, 0, 0, 0, 0];
        assert!(matches!(
            encode(CommandKind::NtpClockSync, Some(five.into())),
            Err(CodecError::InvalidNtpPayload { .. })
        ));
        assert!(matches!(
            encode(CommandKind::NtpReturnClock, Some("now".into())),
            Err(CodecError::InvalidNtpPayload { .. })
        ));
        assert!(matches!(
            encode(CommandKind::NtpClockSync, Some(Payload::Float(-3.0))),
            Err(CodecError::InvalidNtpPayload { .. })
        ));
    }

    #[test]
    fn event_data_appends_record_verbatim() {
        let record = Bytes::from_static(&[0x03, 0x00, 1, 2, 3]);
        let wire = Command::EventData(record.clone()).encode().unwrap();
        assert_eq!(wire[0], b'D');
        assert_eq!(&wire[1..], record.as_ref());
    }

    #[test]
    fn event_data_requires_bytes() {
        assert!(matches!(
            encode(CommandKind::EventData, Some("cat".into())),
            Err(CodecError::PayloadNotBytes(_))
        ));
    }

    #[test]
    fn native_endian_is_an_allowed_token() {
        assert!(Endian::ALLOWED.contains(&Endian::native().as_str()));
        assert_eq!("UNIX".parse::<Endian>().unwrap(), Endian::Unix);
    }
}
