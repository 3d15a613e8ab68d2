//! Integer packing and NTP-era timestamps.
//!
//! The ECI wire format does not tag integers with a byte order; the `Query`
//! handshake only tells the amplifier what the host uses. ecilink fixes
//! little-endian for every integer it writes or reads.

use bytes::Bytes;

use crate::error::{CodecError, Result};

/// Seconds between the NTP epoch (1900-01-01) and the Unix epoch (1970-01-01).
pub const NTP_UNIX_EPOCH_DELTA: f64 = 2_208_988_800.0;

/// Scale of the 32-bit NTP fraction field.
const NTP_FRACTION_SCALE: f64 = 4_294_967_296.0;

/// Size of an NTP timestamp on the wire.
pub const NTP_TIMESTAMP_LEN: usize = 8;

/// Pack `value` into `size` little-endian bytes.
pub fn pack_uint(value: u64, size: usize) -> Result<Bytes> {
    check_width(size)?;
    if size < 8 && value >> (size * 8) != 0 {
        return Err(CodecError::IntegerOutOfRange { value, size });
    }
    Ok(Bytes::copy_from_slice(&value.to_le_bytes()[..size]))
}

/// Unpack a 1, 2, 4 or 8 byte little-endian unsigned integer.
pub fn unpack_uint(bytes: &[u8]) -> Result<u64> {
    check_width(bytes.len())?;
    let mut raw = [0u8; 8];
    raw[..bytes.len()].copy_from_slice(bytes);
    Ok(u64::from_le_bytes(raw))
}

fn check_width(size: usize) -> Result<()> {
    match size {
        1 | 2 | 4 | 8 => Ok(()),
        other => Err(CodecError::InvalidIntegerWidth(other)),
    }
}

/// Anything that can be turned into an 8-byte NTP timestamp.
#[derive(Debug, Clone, PartialEq)]
pub enum NtpInput {
    /// Fractional seconds since the NTP epoch.
    Seconds(f64),
    /// Whole seconds since the NTP epoch; the fraction is zero.
    Whole(i64),
    /// An already encoded timestamp, passed through unchanged.
    Raw(Bytes),
}

impl From<f64> for NtpInput {
    fn from(value: f64) -> Self {
        NtpInput::Seconds(value)
    }
}

impl From<i64> for NtpInput {
    fn from(value: i64) -> Self {
        NtpInput::Whole(value)
    }
}

impl From<u32> for NtpInput {
    fn from(value: u32) -> Self {
        NtpInput::Whole(i64::from(value))
    }
}

impl From<[u8; 8]> for NtpInput {
    fn from(value: [u8; 8]) -> Self {
        NtpInput::Raw(Bytes::copy_from_slice(&value))
    }
}

impl From<&[u8]> for NtpInput {
    fn from(value: &[u8]) -> Self {
        NtpInput::Raw(Bytes::copy_from_slice(value))
    }
}

impl From<Bytes> for NtpInput {
    fn from(value: Bytes) -> Self {
        NtpInput::Raw(value)
    }
}

/// Encode a timestamp as NTP fixed point: whole seconds in the first four
/// bytes, the fraction scaled by 2^32 in the last four.
pub fn to_ntp_bytes(input: impl Into<NtpInput>) -> Result<[u8; 8]> {
    let (seconds, fraction) = match input.into() {
        NtpInput::Raw(bytes) => {
            return <[u8; 8]>::try_from(&bytes[..])
                .map_err(|_| CodecError::InvalidTimeEncoding(bytes.len()));
        }
        NtpInput::Whole(value) => {
            let seconds = u32::try_from(value)
                .map_err(|_| CodecError::InvalidTimeType(format!("integer {value}")))?;
            (seconds, 0u32)
        }
        NtpInput::Seconds(value) => {
            if !value.is_finite() || value < 0.0 || value >= NTP_FRACTION_SCALE {
                return Err(CodecError::InvalidTimeType(format!("float {value}")));
            }
            let whole = value.trunc();
            // Truncates toward zero; a sub-2^-32 remainder is dropped.
            let fraction = ((value - whole) * NTP_FRACTION_SCALE) as u32;
            (whole as u32, fraction)
        }
    };

    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&seconds.to_le_bytes());
    out[4..].copy_from_slice(&fraction.to_le_bytes());
    Ok(out)
}

/// Decode an 8-byte NTP timestamp into fractional seconds.
pub fn from_ntp_bytes(bytes: &[u8]) -> Result<f64> {
    if bytes.len() != NTP_TIMESTAMP_LEN {
        return Err(CodecError::InvalidTimeEncoding(bytes.len()));
    }
    let seconds = unpack_uint(&bytes[..4])? as f64;
    let fraction = unpack_uint(&bytes[4..])? as f64;
    Ok(seconds + fraction / NTP_FRACTION_SCALE)
}

/// Unix seconds to NTP-era seconds.
pub fn system_to_ntp_time(unix_seconds: f64) -> f64 {
    unix_seconds + NTP_UNIX_EPOCH_DELTA
}

/// NTP-era seconds to Unix seconds.
pub fn ntp_to_system_time(ntp_seconds: f64) -> f64 {
    ntp_seconds - NTP_UNIX_EPOCH_DELTA
}
