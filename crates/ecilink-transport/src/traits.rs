use crate::error::Result;

/// A request/response channel to the amplifier.
///
/// Implementations deliver one complete command per `write` and return one
/// reply per `read`. Reads must be bounded by a timeout.
pub trait AmpTransport {
    /// Open the underlying connection.
    fn connect(&mut self) -> Result<()>;

    /// Close the connection. Closing an idle transport is a no-op.
    fn disconnect(&mut self) -> Result<()>;

    /// Send a complete encoded command.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Block until the next reply arrives or the read timeout expires.
    fn read(&mut self) -> Result<Vec<u8>>;

    /// Whether the connection is currently open.
    fn is_open(&self) -> bool;
}

impl<T: AmpTransport + ?Sized> AmpTransport for Box<T> {
    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn disconnect(&mut self) -> Result<()> {
        (**self).disconnect()
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn read(&mut self) -> Result<Vec<u8>> {
        (**self).read()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}
