//! Amplifier replies.
//!
//! Replies carry no length prefix or request id, so the parser works from the
//! number of bytes received and the leading (or trailing) tag alone:
//!
//! | length | shape                                   | result         |
//! |--------|-----------------------------------------|----------------|
//! | 1      | `Z` / `F` / `R` / undocumented ack      | ack or failure |
//! | 2      | `I` + version byte                      | identity       |
//! | 8      | NTP timestamp                           | timestamp      |
//! | 9      | timestamp + `Z`, or `S` + timestamp     | timestamp      |

use tracing::debug;

use crate::error::{CodecError, Result};
use crate::primitives::{from_ntp_bytes, NTP_TIMESTAMP_LEN};

const TAG_ACK: u8 = b'Z';
const TAG_FAILURE: u8 = b'F';
const TAG_NO_RECORDING_DEVICE: u8 = b'R';
const TAG_IDENTITY: u8 = b'I';
const TAG_RETURN_CLOCK: u8 = b'S';

/// Single bytes some Amp Server builds send in place of `Z`.
const UNDOCUMENTED_ACKS: [u8; 3] = [TAG_IDENTITY, 0x01, TAG_RETURN_CLOCK];

/// A successful amplifier reply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Response {
    Ack,
    /// Amp Server version byte.
    Identity(u8),
    /// Amplifier clock, NTP-era seconds.
    Timestamp(f64),
}

impl Response {
    pub fn is_ack(&self) -> bool {
        matches!(self, Response::Ack)
    }
}

/// How single-byte replies other than `Z`, `F` and `R` are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AckPolicy {
    /// Accept `I`, `0x01` and `S` as acknowledgements.
    #[default]
    Tolerant,
    /// Only `Z` acknowledges.
    Strict,
}

/// Decode a reply with the default [`AckPolicy::Tolerant`] policy.
pub fn decode(bytes: &[u8]) -> Result<Response> {
    decode_with_policy(bytes, AckPolicy::default())
}

/// Decode a reply.
///
/// `F` and `R` are returned as errors so a caller cannot mistake them for
/// success.
pub fn decode_with_policy(bytes: &[u8], policy: AckPolicy) -> Result<Response> {
    match bytes {
        [TAG_ACK] => Ok(Response::Ack),
        [TAG_FAILURE] => Err(CodecError::AmplifierFailure),
        [TAG_NO_RECORDING_DEVICE] => Err(CodecError::NoRecordingDevice),
        [other] if policy == AckPolicy::Tolerant && UNDOCUMENTED_ACKS.contains(other) => {
            debug!(byte = *other, "accepting undocumented single-byte ack");
            Ok(Response::Ack)
        }
        [TAG_IDENTITY, version] => Ok(Response::Identity(*version)),
        _ if bytes.len() == NTP_TIMESTAMP_LEN => Ok(Response::Timestamp(from_ntp_bytes(bytes)?)),
        _ if bytes.len() == NTP_TIMESTAMP_LEN + 1 => decode_tagged_timestamp(bytes),
        _ => Err(CodecError::MalformedResponse(bytes.to_vec())),
    }
}

fn decode_tagged_timestamp(bytes: &[u8]) -> Result<Response> {
    let stamp = if bytes[NTP_TIMESTAMP_LEN] == TAG_ACK {
        &bytes[..NTP_TIMESTAMP_LEN]
    } else if bytes[0] == TAG_RETURN_CLOCK {
        &bytes[1..]
    } else {
        return Err(CodecError::MalformedResponse(bytes.to_vec()));
    };
    Ok(Response::Timestamp(from_ntp_bytes(stamp)?))
}
