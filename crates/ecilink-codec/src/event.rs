//! `EventData` records.
//!
//! Record layout (all integers little-endian):
//! ```text
//! ┌──────────┬────────────┬───────────────┬─────────┬───────────┬────────────┬─────────┐
//! │ len (u16)│ start (i32)│ duration (u32)│ type[4] │ u8 + label│ u8 + desc  │ nkeys u8│
//! └──────────┴────────────┴───────────────┴─────────┴───────────┴────────────┴─────────┘
//!   followed by nkeys × ┌────────┬────────┬───────────┬───────┐
//!                       │ key[4] │ tag[4] │ len (u16) │ value │
//!                       └────────┴────────┴───────────┴───────┘
//! ```
//! `len` counts every byte after itself. Times are whole milliseconds.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CodecError, EventField, Result};

/// Longest label or description accepted by the Amp Server.
pub const MAX_LABEL_CHARS: usize = 256;

/// Shortest event the amplifier records: one millisecond.
pub const MIN_DURATION_SECS: f64 = 0.001;

const CODE_LEN: usize = 4;
const BLANK_CODE: &str = "    ";
const MILLIS_PER_SEC: f64 = 1000.0;

/// A typed value attached to an event under a four-character key.
#[derive(Debug, Clone, PartialEq)]
pub enum EventValue {
    Bool(bool),
    Double(f64),
    Long(i32),
    Text(String),
}

impl EventValue {
    /// The four-byte type tag written before the value.
    pub fn tag(&self) -> &'static [u8; 4] {
        match self {
            EventValue::Bool(_) => b"bool",
            EventValue::Double(_) => b"doub",
            EventValue::Long(_) => b"long",
            EventValue::Text(_) => b"TEXT",
        }
    }

    fn wire_len(&self) -> usize {
        match self {
            EventValue::Bool(_) => 1,
            EventValue::Double(_) => 8,
            EventValue::Long(_) => 4,
            EventValue::Text(text) => text.len(),
        }
    }

    fn put(&self, dst: &mut BytesMut) {
        match self {
            EventValue::Bool(value) => dst.put_u8(u8::from(*value)),
            EventValue::Double(value) => dst.put_f64_le(*value),
            EventValue::Long(value) => dst.put_i32_le(*value),
            EventValue::Text(text) => dst.put_slice(text.as_bytes()),
        }
    }
}

impl From<bool> for EventValue {
    fn from(value: bool) -> Self {
        EventValue::Bool(value)
    }
}

impl From<f64> for EventValue {
    fn from(value: f64) -> Self {
        EventValue::Double(value)
    }
}

impl From<i32> for EventValue {
    fn from(value: i32) -> Self {
        EventValue::Long(value)
    }
}

impl From<&str> for EventValue {
    fn from(value: &str) -> Self {
        EventValue::Text(value.to_string())
    }
}

impl From<String> for EventValue {
    fn from(value: String) -> Self {
        EventValue::Text(value)
    }
}

/// A timestamped marker to be recorded alongside the EEG data.
///
/// Built with chained setters; nothing is validated until
/// [`encode_event`] runs.
///
/// ```
/// use ecilink_codec::{encode_event, Event};
///
/// let event = Event::new("stim")
///     .start(1.5)
///     .label("face")
///     .with("cond", "happy")
///     .with("tria", 12);
/// let record = encode_event(&event).unwrap();
/// assert_eq!(record.len(), 2 + usize::from(u16::from_le_bytes([record[0], record[1]])));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub event_type: String,
    /// Seconds since the session's sync epoch.
    pub start: f64,
    /// Seconds.
    pub duration: f64,
    pub label: String,
    pub description: String,
    /// Key/value pairs in send order. Keys may repeat.
    pub data: Vec<(String, EventValue)>,
}

impl Event {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            start: 0.0,
            duration: MIN_DURATION_SECS,
            label: BLANK_CODE.to_string(),
            description: BLANK_CODE.to_string(),
            data: Vec::new(),
        }
    }

    pub fn start(mut self, seconds: f64) -> Self {
        self.start = seconds;
        self
    }

    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = seconds;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append a key/value pair.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<EventValue>) -> Self {
        self.data.push((key.into(), value.into()));
        self
    }
}

/// Serialize `event` into an `EventData` record.
///
/// Every field is checked before any byte is produced.
pub fn encode_event(event: &Event) -> Result<Bytes> {
    let start_ms = start_millis(event.start)?;
    let duration_ms = duration_millis(event.duration)?;
    check_code(EventField::Type, &event.event_type, "type")?;
    let label_len = text_len(EventField::Label, &event.label)?;
    let desc_len = text_len(EventField::Description, &event.description)?;

    let nkeys = u8::try_from(event.data.len()).map_err(|_| {
        CodecError::event(
            EventField::Data,
            format!("{} keys do not fit the key count byte", event.data.len()),
        )
    })?;

    let mut keys_len = 0usize;
    for (key, value) in &event.data {
        check_code(EventField::Data, key, "key")?;
        if let EventValue::Text(text) = value {
            if !text.is_ascii() {
                return Err(CodecError::event(
                    EventField::Data,
                    format!("value of {key:?} is not ASCII"),
                ));
            }
        }
        if u16::try_from(value.wire_len()).is_err() {
            return Err(CodecError::event(
                EventField::Data,
                format!("value of {key:?} is longer than {} bytes", u16::MAX),
            ));
        }
        keys_len += 2 * CODE_LEN + 2 + value.wire_len();
    }

    let header_len = 4 + 4 + CODE_LEN + 1 + event.label.len() + 1 + event.description.len() + 1;
    let block_len = u16::try_from(header_len + keys_len).map_err(|_| {
        CodecError::event(
            EventField::Data,
            format!("record of {} bytes is too long", header_len + keys_len),
        )
    })?;

    let mut dst = BytesMut::with_capacity(2 + usize::from(block_len));
    dst.put_u16_le(block_len);
    dst.put_i32_le(start_ms);
    dst.put_u32_le(duration_ms);
    dst.put_slice(event.event_type.as_bytes());
    dst.put_u8(label_len);
    dst.put_slice(event.label.as_bytes());
    dst.put_u8(desc_len);
    dst.put_slice(event.description.as_bytes());
    dst.put_u8(nkeys);

    for (key, value) in &event.data {
        dst.put_slice(key.as_bytes());
        dst.put_slice(value.tag());
        // Bounded by the check above.
        dst.put_u16_le(value.wire_len() as u16);
        value.put(&mut dst);
    }

    Ok(dst.freeze())
}

fn start_millis(start: f64) -> Result<i32> {
    if !start.is_finite() || start < 0.0 {
        return Err(CodecError::event(
            EventField::Start,
            format!("should be >= 0, is {start}"),
        ));
    }
    let millis = (start * MILLIS_PER_SEC).round();
    if millis > f64::from(i32::MAX) {
        return Err(CodecError::event(
            EventField::Start,
            format!("{start} s does not fit in 32-bit milliseconds"),
        ));
    }
    Ok(millis as i32)
}

fn duration_millis(duration: f64) -> Result<u32> {
    if !duration.is_finite() || duration < MIN_DURATION_SECS {
        return Err(CodecError::event(
            EventField::Duration,
            format!("should be at least {MIN_DURATION_SECS}, is {duration}"),
        ));
    }
    let millis = (duration * MILLIS_PER_SEC).round();
    if millis > f64::from(u32::MAX) {
        return Err(CodecError::event(
            EventField::Duration,
            format!("{duration} s does not fit in 32-bit milliseconds"),
        ));
    }
    Ok(millis as u32)
}

fn check_code(field: EventField, code: &str, what: &str) -> Result<()> {
    if !code.is_ascii() {
        return Err(CodecError::event(field, format!("{what} {code:?} is not ASCII")));
    }
    if code.len() != CODE_LEN {
        return Err(CodecError::event(
            field,
            format!("{what} {code:?} should have 4 characters, has {}", code.len()),
        ));
    }
    Ok(())
}

fn text_len(field: EventField, text: &str) -> Result<u8> {
    if !text.is_ascii() {
        return Err(CodecError::event(field, "should be ASCII"));
    }
    if text.len() > MAX_LABEL_CHARS {
        return Err(CodecError::event(
            field,
            format!("should be <= {MAX_LABEL_CHARS} characters, is {}", text.len()),
        ));
    }
    // The length byte caps what the Amp Server nominally allows at 255.
    u8::try_from(text.len()).map_err(|_| {
        CodecError::event(
            field,
            format!("{} characters do not fit the length byte", text.len()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Event {
        Event::new("abcd")
            .start(1.0)
            .duration(0.001)
            .label("label")
            .description("description")
            .with("bool", true)
            .with("numb", 1.01)
            .with("uint", 1)
            .with("text", "dog")
    }

    fn field_of(err: CodecError) -> EventField {
        match err {
            CodecError::InvalidEventField { field, .. } => field,
            other => panic!("expected event field error, got {other:?}"),
        }
    }

    #[test]
    fn exact_layout() {
        let mut block = Vec::new();
        block.extend_from_slice(&1000i32.to_le_bytes());
        block.extend_from_slice(&1u32.to_le_bytes());
        block.extend_from_slice(b"abcd");
        block.push(5);
        block.extend_from_slice(b"label");
        block.push(11);
        block.extend_from_slice(b"description");
        block.push(4);
        block.extend_from_slice(b"boolbool");
        block.extend_from_slice(&1u16.to_le_bytes());
        block.push(0x01);
        block.extend_from_slice(b"numbdoub");
        block.extend_from_slice(&8u16.to_le_bytes());
        block.extend_from_slice(&1.01f64.to_le_bytes());
        block.extend_from_slice(b"uintlong");
        block.extend_from_slice(&4u16.to_le_bytes());
        block.extend_from_slice(&1i32.to_le_bytes());
        block.extend_from_slice(b"textTEXT");
        block.extend_from_slice(&3u16.to_le_bytes());
        block.extend_from_slice(b"dog");

        let mut expected = (block.len() as u16).to_le_bytes().to_vec();
        expected.extend_from_slice(&block);

        let record = encode_event(&valid()).unwrap();
        assert_eq!(record.as_ref(), expected.as_slice());
        assert_eq!(record.len(), 89);
    }

    #[test]
    fn defaults_are_blank_millisecond_marker() {
        let record = encode_event(&Event::new("beep")).unwrap();
        // len | start 0 | duration 1 | "beep" | 4 "    " | 4 "    " | 0 keys
        let mut expected = vec![23, 0, 0, 0, 0, 0, 1, 0, 0, 0];
        expected.extend_from_slice(b"beep");
        expected.push(4);
        expected.extend_from_slice(b"    ");
        expected.push(4);
        expected.extend_from_slice(b"    ");
        expected.push(0);
        assert_eq!(record.as_ref(), expected.as_slice());
    }

    #[test]
    fn start_is_rounded_to_milliseconds() {
        let record = encode_event(&valid().start(2.0005)).unwrap();
        let start = i32::from_le_bytes(record[2..6].try_into().unwrap());
        assert!(start == 2000 || start == 2001, "{start}");

        let record = encode_event(&valid().start(0.0994)).unwrap();
        assert_eq!(i32::from_le_bytes(record[2..6].try_into().unwrap()), 99);
    }

    #[test]
    fn duplicate_keys_are_kept_in_order() {
        let event = Event::new("dupe").with("trl#", 1).with("trl#", 2);
        let record = encode_event(&event).unwrap();
        let keys = &record[2 + 4 + 4 + 4 + 1 + 4 + 1 + 4..];
        assert_eq!(keys[0], 2);
        assert_eq!(&keys[1..9], b"trl#long");
        assert_eq!(&keys[11..15], &1i32.to_le_bytes());
        assert_eq!(&keys[15..23], b"trl#long");
        assert_eq!(&keys[25..29], &2i32.to_le_bytes());
    }

    #[test]
    fn invalid_start() {
        for start in [-1.0, -0.0001, f64::NAN, f64::INFINITY, 3.0e6] {
            let err = encode_event(&valid().start(start)).unwrap_err();
            assert_eq!(field_of(err), EventField::Start, "start {start}");
        }
    }

    #[test]
    fn invalid_duration() {
        for duration in [0.0, 0.0009, -1.0, f64::NAN, 5.0e6] {
            let err = encode_event(&valid().duration(duration)).unwrap_err();
            assert_eq!(field_of(err), EventField::Duration, "duration {duration}");
        }
    }

    #[test]
    fn invalid_type_code() {
        for code in ["abc", "abcde", "", "ab\u{e9}"] {
            let mut event = valid();
            event.event_type = code.to_string();
            assert_eq!(field_of(encode_event(&event).unwrap_err()), EventField::Type);
        }
    }

    #[test]
    fn overlong_label_and_description() {
        let long = " ".repeat(257);
        let err = encode_event(&valid().label(long.clone())).unwrap_err();
        assert_eq!(field_of(err), EventField::Label);
        let err = encode_event(&valid().description(long)).unwrap_err();
        assert_eq!(field_of(err), EventField::Description);
    }

    #[test]
    fn label_limited_by_length_byte() {
        assert!(encode_event(&valid().label("x".repeat(255))).is_ok());
        let err = encode_event(&valid().label("x".repeat(256))).unwrap_err();
        assert_eq!(field_of(err), EventField::Label);
    }

    #[test]
    fn invalid_keys() {
        for key in ["cat", "aardvark", "", "k\u{e9}y"] {
            let err = encode_event(&valid().with(key, 1)).unwrap_err();
            assert_eq!(field_of(err), EventField::Data, "key {key:?}");
        }
    }

    #[test]
    fn invalid_text_values() {
        let err = encode_event(&valid().with("name", "caf\u{e9}")).unwrap_err();
        assert_eq!(field_of(err), EventField::Data);

        let err = encode_event(&Event::new("big!").with("blob", "x".repeat(70_000))).unwrap_err();
        assert_eq!(field_of(err), EventField::Data);
    }

    #[test]
    fn too_many_keys() {
        let mut event = Event::new("many");
        for i in 0..256 {
            event = event.with(format!("k{:03}", i % 1000), true);
        }
        let err = encode_event(&event).unwrap_err();
        assert_eq!(field_of(err), EventField::Data);
    }

    #[test]
    fn oversized_record() {
        let mut event = Event::new("huge");
        for _ in 0..2 {
            event = event.with("blob", "x".repeat(40_000));
        }
        let err = encode_event(&event).unwrap_err();
        assert_eq!(field_of(err), EventField::Data);
    }
}
