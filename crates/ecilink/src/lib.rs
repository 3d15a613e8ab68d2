//! Client driver for the EGI Amp Server "Experimental Control Interface".
//!
//! ecilink connects a stimulus program to an EGI amplifier, keeps the
//! amplifier clock aligned with the host clock, starts and stops recording
//! and injects timestamped event markers.
//!
//! # Crate Structure
//!
//! - [`transport`]: blocking TCP transport with bounded reads
//! - [`codec`]: command encoding, reply parsing and event records
//! - [`session`]: the connection state machine (behind `session` feature)
//!
//! ```no_run
//! use ecilink::codec::Event;
//! use ecilink::session::{connect, EventStart, StaticOffset, SyncMode};
//!
//! let mut amp = connect("10.10.10.42", 55513, SyncMode::Ntp, Some("10.10.10.51"), StaticOffset(0.0))?;
//! amp.begin_recording()?;
//! amp.send_event(EventStart::Now, Event::new("stim").label("face").with("cond", "happy"))?;
//! amp.disconnect()?;
//! # Ok::<(), ecilink::session::SessionError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use ecilink_transport::*;
}

/// Re-export codec types.
pub mod codec {
    pub use ecilink_codec::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use ecilink_session::*;
}
