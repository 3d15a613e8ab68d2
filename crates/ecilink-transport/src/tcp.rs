use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::AmpTransport;

/// TCP port the Amp Server listens on for ECI sessions.
pub const DEFAULT_ECI_PORT: u16 = 55513;

/// Bounded wait for a single amplifier reply.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_RECV_BUFFER: usize = 4096;

/// Configuration for the TCP transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Maximum time to wait for one reply. Default: 1s.
    pub read_timeout: Duration,
    /// Maximum time a single write may block. `None` blocks indefinitely.
    pub write_timeout: Option<Duration>,
    /// Maximum time to wait for the TCP handshake. Default: 5s.
    pub connect_timeout: Duration,
    /// Size of the receive buffer; one reply is read per call. Default: 4096.
    pub recv_buffer: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: Some(DEFAULT_READ_TIMEOUT),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            recv_buffer: DEFAULT_RECV_BUFFER,
        }
    }
}

/// Blocking TCP connection to the Amp Server.
///
/// The transport is created idle; [`AmpTransport::connect`] opens the socket
/// and [`AmpTransport::disconnect`] closes it again. A transport can be
/// reconnected after it has been closed.
pub struct TcpTransport {
    addr: SocketAddr,
    config: TransportConfig,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    /// Create an idle transport for a resolved address.
    pub fn new(addr: SocketAddr, config: TransportConfig) -> Self {
        Self {
            addr,
            config,
            stream: None,
        }
    }

    /// Resolve `host:port` and create an idle transport for the first address.
    pub fn resolve(host: &str, port: u16, config: TransportConfig) -> Result<Self> {
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|_| TransportError::Resolve(format!("{host}:{port}")))?
            .next()
            .ok_or_else(|| TransportError::Resolve(format!("{host}:{port}")))?;
        Ok(Self::new(addr, config))
    }

    /// The amplifier address this transport connects to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Current transport configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn stream(&mut self) -> Result<&mut TcpStream> {
        self.stream.as_mut().ok_or(TransportError::NotConnected)
    }
}

impl AmpTransport for TcpTransport {
    fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Err(TransportError::AlreadyConnected);
        }

        let stream = TcpStream::connect_timeout(&self.addr, self.config.connect_timeout)
            .map_err(|source| TransportError::Connect {
                addr: self.addr,
                source,
            })?;
        stream.set_read_timeout(Some(self.config.read_timeout))?;
        stream.set_write_timeout(self.config.write_timeout)?;
        // Event markers are small and latency-sensitive.
        stream.set_nodelay(true)?;

        info!(addr = %self.addr, "connected to amp server");
        self.stream = Some(stream);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            match stream.shutdown(Shutdown::Both) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotConnected => {}
                Err(err) => return Err(TransportError::Io(err)),
            }
            debug!(addr = %self.addr, "closed amp server connection");
        }
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let write_timeout = self.config.write_timeout.unwrap_or_default();
        let stream = self.stream()?;

        let mut offset = 0usize;
        while offset < data.len() {
            match stream.write(&data[offset..]) {
                Ok(0) => return Err(TransportError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    return Err(TransportError::Timeout(write_timeout));
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        loop {
            match stream.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn read(&mut self) -> Result<Vec<u8>> {
        let read_timeout = self.config.read_timeout;
        let recv_buffer = self.config.recv_buffer.max(1);
        let stream = self.stream()?;

        let mut buf = vec![0u8; recv_buffer];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => return Err(TransportError::ConnectionClosed),
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(buf);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    return Err(TransportError::Timeout(read_timeout));
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("addr", &self.addr)
            .field("open", &self.stream.is_some())
            .finish()
    }
}
