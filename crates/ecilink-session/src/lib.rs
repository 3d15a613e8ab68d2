//! Session management for the EGI Amp Server ECI protocol.
//!
//! A [`Session`] owns one transport and walks it through the protocol
//! lifecycle: handshake, clock synchronization, recording and event
//! markers. Time sources are traits so the state machine can be driven
//! by a fake clock and fake amplifier in tests.

pub mod clock;
pub mod connector;
pub mod error;
pub mod session;

pub use clock::{millis_since_midnight, Clock, NtpClient, StaticOffset, SyncMode, SystemClock};
pub use connector::{connect, connect_with_config};
pub use error::{Result, SessionError};
pub use session::{EventStart, Session, SessionConfig, SessionState, RESYNC_MARKER};
