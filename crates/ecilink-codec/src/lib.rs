//! Wire formats of the EGI Amp Server "Experimental Control Interface".
//!
//! This is the core layer of ecilink. It has no I/O of its own:
//! - [`primitives`] packs integers and NTP-era timestamps in the single byte
//!   order used throughout (little-endian)
//! - [`command`] turns a command kind plus payload into the bytes to send
//! - [`response`] turns the bytes the amplifier sent back into a [`Response`]
//!   or a typed failure
//! - [`event`] serializes a timestamped marker into an `EventData` record
//!
//! Every validation failure is reported before any byte leaves the host.

pub mod command;
pub mod error;
pub mod event;
pub mod primitives;
pub mod response;

pub use command::{encode, encode_named, Command, CommandKind, Endian, Payload};
pub use error::{CodecError, EventField, Result};
pub use event::{encode_event, Event, EventValue, MAX_LABEL_CHARS, MIN_DURATION_SECS};
pub use primitives::{
    from_ntp_bytes, ntp_to_system_time, pack_uint, system_to_ntp_time, to_ntp_bytes,
    unpack_uint, NtpInput, NTP_UNIX_EPOCH_DELTA,
};
pub use response::{decode, decode_with_policy, AckPolicy, Response};
