use ecilink_transport::{TcpTransport, TransportConfig};

use crate::clock::{NtpClient, SyncMode};
use crate::error::Result;
use crate::session::{Session, SessionConfig};

/// Connect to an Amp Server over TCP with default settings.
pub fn connect<N: NtpClient>(
    host: &str,
    port: u16,
    mode: SyncMode,
    peer: Option<&str>,
    ntp: N,
) -> Result<Session<TcpTransport, N>> {
    connect_with_config(
        host,
        port,
        mode,
        peer,
        ntp,
        TransportConfig::default(),
        SessionConfig::default(),
    )
}

/// Connect with explicit configuration.
pub fn connect_with_config<N: NtpClient>(
    host: &str,
    port: u16,
    mode: SyncMode,
    peer: Option<&str>,
    ntp: N,
    transport_config: TransportConfig,
    session_config: SessionConfig,
) -> Result<Session<TcpTransport, N>> {
    let transport = TcpTransport::resolve(host, port, transport_config)?;
    let mut session = Session::new(transport, ntp, session_config);
    session.connect(mode, peer)?;
    Ok(session)
}
