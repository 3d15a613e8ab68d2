//! Time sources used for clock synchronization.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Result, SessionError};

const SECS_PER_DAY: f64 = 86_400.0;

/// How the session aligns the amplifier clock with the host clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncMode {
    /// `NTPClockSync` with the host time corrected by an NTP offset.
    Ntp,
    /// `ClockSync` with the host's millisecond clock.
    Simple,
}

impl SyncMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncMode::Ntp => "ntp",
            SyncMode::Simple => "simple",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMode {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ntp" => Ok(SyncMode::Ntp),
            "simple" => Ok(SyncMode::Simple),
            other => Err(SessionError::IllegalArgument(format!(
                "clock mode {other:?} (expected ntp or simple)"
            ))),
        }
    }
}

/// Wall-clock time source.
pub trait Clock {
    /// Seconds since the Unix epoch.
    fn now(&self) -> f64;
}

/// The host's system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        // A clock set before 1970 reads as the epoch itself.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64())
            .unwrap_or_default()
    }
}

/// Measures how far the local clock is from an NTP peer.
pub trait NtpClient {
    /// Offset in seconds to add to local time to obtain peer time.
    fn query(&mut self, peer: &str) -> Result<f64>;
}

/// An offset measured out of band, e.g. with `ntpdate -q` against the amplifier.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StaticOffset(pub f64);

impl NtpClient for StaticOffset {
    fn query(&mut self, _peer: &str) -> Result<f64> {
        Ok(self.0)
    }
}

impl<N: NtpClient + ?Sized> NtpClient for Box<N> {
    fn query(&mut self, peer: &str) -> Result<f64> {
        (**self).query(peer)
    }
}

/// Milliseconds elapsed since the last UTC midnight.
///
/// This is the value sent with `ClockSync`; it wraps to zero once a day.
pub fn millis_since_midnight(unix_seconds: f64) -> i32 {
    let millis = (unix_seconds.rem_euclid(SECS_PER_DAY) * 1000.0).floor();
    // Always below 86_400_000.
    millis as i32
}
