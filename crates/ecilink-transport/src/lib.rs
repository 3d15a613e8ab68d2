//! Blocking transport to an EGI Amp Server "Experimental Control Interface".
//!
//! The ECI protocol is a strict request/response exchange over one TCP
//! connection with no request identifiers. This crate is the lowest layer of
//! ecilink: it moves whole commands out and whole replies in, with a bounded
//! read timeout so a silent amplifier surfaces as an error instead of a hang.
//!
//! Everything above this layer talks to the [`AmpTransport`] trait, which
//! lets the session state machine run against an in-memory fake in tests.

pub mod error;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use tcp::{TcpTransport, TransportConfig, DEFAULT_ECI_PORT, DEFAULT_READ_TIMEOUT};
pub use traits::AmpTransport;
