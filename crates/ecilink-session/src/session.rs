use std::fmt;
use std::str::FromStr;

use ecilink_codec::{
    decode_with_policy, encode_event, system_to_ntp_time, AckPolicy, Command, Endian, Event,
    Response,
};
use ecilink_transport::AmpTransport;
use tracing::{debug, info, warn};

use crate::clock::{millis_since_midnight, Clock, NtpClient, SyncMode, SystemClock};
use crate::error::{Result, SessionError};

/// Event type code of the marker sent after an NTP resync.
pub const RESYNC_MARKER: &str = "RESY";

/// Lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Recording,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connected => "connected",
            SessionState::Recording => "recording",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Byte-order token sent with `Query`. Default: this host's.
    pub endian: Endian,
    /// Treatment of undocumented single-byte acks. Default: tolerant.
    pub ack_policy: AckPolicy,
    /// Send a `RESY` marker after every NTP resync. Default: off.
    pub mark_resync: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endian: Endian::native(),
            ack_policy: AckPolicy::default(),
            mark_resync: false,
        }
    }
}

/// When an event starts, relative to the last clock sync.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventStart {
    /// The moment the event is sent.
    Now,
    /// Seconds after the sync epoch.
    At(f64),
}

impl FromStr for EventStart {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "now" {
            return Ok(EventStart::Now);
        }
        s.parse::<f64>().map(EventStart::At).map_err(|_| {
            SessionError::IllegalArgument(format!(
                "event start {s:?} (expected \"now\" or seconds)"
            ))
        })
    }
}

/// A client session with one Amp Server.
///
/// Every operation writes one command and blocks for its reply before
/// returning, so at most one command is ever outstanding. Sessions take
/// `&mut self` throughout and are meant for a single caller.
pub struct Session<T, N, C = SystemClock> {
    transport: T,
    ntp: N,
    clock: C,
    config: SessionConfig,
    state: SessionState,
    mode: SyncMode,
    peer: Option<String>,
    offset: f64,
    sync_epoch: Option<f64>,
    last_clock_ms: Option<i32>,
    amp_version: Option<u8>,
    last_amp_clock: Option<f64>,
    recording_started_at: Option<f64>,
}

impl<T: AmpTransport, N: NtpClient> Session<T, N, SystemClock> {
    /// Create an unconnected session timed by the system clock.
    pub fn new(transport: T, ntp: N, config: SessionConfig) -> Self {
        Self::with_clock(transport, ntp, SystemClock, config)
    }
}

impl<T: AmpTransport, N: NtpClient, C: Clock> Session<T, N, C> {
    /// Create an unconnected session with an explicit time source.
    pub fn with_clock(transport: T, ntp: N, clock: C, config: SessionConfig) -> Self {
        Self {
            transport,
            ntp,
            clock,
            config,
            state: SessionState::Disconnected,
            mode: SyncMode::Simple,
            peer: None,
            offset: 0.0,
            sync_epoch: None,
            last_clock_ms: None,
            amp_version: None,
            last_amp_clock: None,
            recording_started_at: None,
        }
    }

    /// Open the transport, announce the host byte order and synchronize clocks.
    ///
    /// `peer` names the NTP server and is required in [`SyncMode::Ntp`].
    /// If any step of the handshake fails the transport is closed again.
    pub fn connect(&mut self, mode: SyncMode, peer: Option<&str>) -> Result<()> {
        if self.state != SessionState::Disconnected {
            return Err(SessionError::AlreadyConnected);
        }
        if mode == SyncMode::Ntp && peer.is_none() {
            return Err(SessionError::MissingPeerAddress);
        }

        self.transport.connect()?;
        self.state = SessionState::Connected;
        self.mode = mode;
        self.peer = peer.map(str::to_string);

        if let Err(err) = self.handshake() {
            if self.is_connected() {
                self.abort();
            }
            return Err(err);
        }

        info!(
            mode = %self.mode,
            amp_version = ?self.amp_version,
            offset = self.offset,
            "connected to amp server"
        );
        Ok(())
    }

    /// Refine the NTP synchronization with `NTPReturnClock`.
    ///
    /// The simple clock has no refinement; in that mode nothing is sent.
    pub fn resync(&mut self) -> Result<()> {
        self.require_connected()?;
        if self.mode == SyncMode::Simple {
            warn!("resync is not available with the simple clock; skipped");
            return Ok(());
        }

        let (offset, now) = self.measure_offset()?;
        let reply = self.command(Command::NtpReturnClock(system_to_ntp_time(now + offset)))?;
        self.offset = offset;
        self.sync_epoch = Some(now);
        if let Response::Timestamp(amp_clock) = reply {
            self.last_amp_clock = Some(amp_clock);
        }
        debug!(offset, amp_clock = ?self.last_amp_clock, "resynchronized");

        if self.config.mark_resync {
            self.send_event(EventStart::Now, Event::new(RESYNC_MARKER))?;
        }
        Ok(())
    }

    /// Synchronize clocks and start recording.
    pub fn begin_recording(&mut self) -> Result<()> {
        match self.state {
            SessionState::Disconnected => return Err(SessionError::NotConnected),
            SessionState::Recording => return Err(SessionError::AlreadyRecording),
            SessionState::Connected => {}
        }

        self.synchronize()?;
        let started_at = self.clock.now();
        self.command(Command::BeginRecording)?;
        self.recording_started_at = Some(started_at);
        self.state = SessionState::Recording;
        info!("recording started");
        Ok(())
    }

    /// Stop the running recording.
    pub fn end_recording(&mut self) -> Result<()> {
        match self.state {
            SessionState::Disconnected => return Err(SessionError::NotConnected),
            SessionState::Connected => return Err(SessionError::NotRecording),
            SessionState::Recording => {}
        }

        self.command(Command::EndRecording)?;
        self.recording_started_at = None;
        self.state = SessionState::Connected;
        info!("recording ended");
        Ok(())
    }

    /// Encode `event` with the given start time and send it.
    ///
    /// [`EventStart::Now`] is measured from the sync epoch. A connection
    /// reset here is reported as [`SessionError::AmplifierOverloaded`].
    pub fn send_event(&mut self, start: EventStart, event: Event) -> Result<()> {
        self.require_connected()?;
        let epoch = self.sync_epoch.ok_or(SessionError::NotConnected)?;
        let start = match start {
            EventStart::Now => self.clock.now() - epoch,
            EventStart::At(seconds) => seconds,
        };

        let record = encode_event(&event.start(start))?;
        match self.command(Command::EventData(record)) {
            Ok(_) => Ok(()),
            Err(SessionError::Transport(err)) if err.is_connection_reset() => {
                Err(SessionError::AmplifierOverloaded(err))
            }
            Err(err) => Err(err),
        }
    }

    /// Ask the amplifier for its version with `NewQuery`.
    pub fn identify(&mut self) -> Result<Option<u8>> {
        self.require_connected()?;
        if let Response::Identity(version) = self.command(Command::NewQuery)? {
            self.amp_version = Some(version);
        }
        Ok(self.amp_version)
    }

    /// End any running recording, send `Exit` and close the transport.
    pub fn disconnect(&mut self) -> Result<()> {
        self.require_connected()?;
        if self.state == SessionState::Recording {
            self.end_recording()?;
        }

        let exit = self.command(Command::Exit);
        let closed = if self.is_connected() {
            self.transport.disconnect()
        } else {
            Ok(())
        };
        self.reset();
        info!("disconnected from amp server");

        exit?;
        closed?;
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state != SessionState::Disconnected
    }

    pub fn is_recording(&self) -> bool {
        self.state == SessionState::Recording
    }

    /// Sync mode of the current connection.
    pub fn mode(&self) -> Option<SyncMode> {
        self.is_connected().then_some(self.mode)
    }

    /// NTP server address of the current connection.
    pub fn peer(&self) -> Option<&str> {
        self.peer.as_deref()
    }

    /// Last measured NTP offset in seconds; zero with the simple clock.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Local Unix time of the last clock sync.
    pub fn sync_epoch(&self) -> Option<f64> {
        self.sync_epoch
    }

    /// Version byte reported by the amplifier.
    pub fn amp_version(&self) -> Option<u8> {
        self.amp_version
    }

    /// Amplifier clock (NTP-era seconds) returned by the last resync.
    pub fn last_amp_clock(&self) -> Option<f64> {
        self.last_amp_clock
    }

    /// Local Unix time at which the running recording began.
    pub fn recording_started_at(&self) -> Option<f64> {
        self.recording_started_at
    }

    /// Seconds elapsed since the running recording began.
    pub fn since_recording_start(&self) -> Option<f64> {
        self.recording_started_at
            .map(|started| self.clock.now() - started)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn require_connected(&self) -> Result<()> {
        if self.state == SessionState::Disconnected {
            return Err(SessionError::NotConnected);
        }
        Ok(())
    }

    fn handshake(&mut self) -> Result<()> {
        if let Response::Identity(version) = self.command(Command::Query(self.config.endian))? {
            self.amp_version = Some(version);
        }
        self.synchronize()
    }

    fn synchronize(&mut self) -> Result<()> {
        self.command(Command::Attention)?;
        match self.mode {
            SyncMode::Ntp => {
                let (offset, now) = self.measure_offset()?;
                self.command(Command::NtpClockSync(system_to_ntp_time(now + offset)))?;
                self.offset = offset;
                self.sync_epoch = Some(now);
            }
            SyncMode::Simple => {
                let now = self.clock.now();
                let millis = millis_since_midnight(now);
                if self.last_clock_ms.is_some_and(|last| millis < last) {
                    warn!(millis, "simple clock wrapped past midnight; resynchronize markers");
                }
                self.command(Command::ClockSync(millis))?;
                self.last_clock_ms = Some(millis);
                self.offset = 0.0;
                self.sync_epoch = Some(now);
            }
        }
        debug!(mode = %self.mode, epoch = ?self.sync_epoch, "clock synchronized");
        Ok(())
    }

    fn measure_offset(&mut self) -> Result<(f64, f64)> {
        let peer = self.peer.as_deref().ok_or(SessionError::MissingPeerAddress)?;
        let offset = self.ntp.query(peer)?;
        Ok((offset, self.clock.now()))
    }

    fn command(&mut self, command: Command) -> Result<Response> {
        let wire = command.encode()?;
        debug!(command = %command.kind(), len = wire.len(), "sending command");
        self.transport.write(&wire)?;
        let reply = self.transport.read()?;
        debug!(command = %command.kind(), len = reply.len(), "received reply");
        match decode_with_policy(&reply, self.config.ack_policy) {
            Ok(response) => Ok(response),
            Err(err) if err.is_desync() => {
                // Replies can no longer be paired with commands.
                warn!(command = %command.kind(), error = %err, "amp server out of step; closing");
                self.abort();
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn abort(&mut self) {
        if let Err(err) = self.transport.disconnect() {
            warn!(error = %err, "failed to close transport");
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.state = SessionState::Disconnected;
        self.peer = None;
        self.offset = 0.0;
        self.sync_epoch = None;
        self.last_clock_ms = None;
        self.recording_started_at = None;
    }
}

impl<T, N, C> fmt::Debug for Session<T, N, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("mode", &self.mode)
            .field("peer", &self.peer)
            .field("offset", &self.offset)
            .field("sync_epoch", &self.sync_epoch)
            .field("amp_version", &self.amp_version)
            .finish_non_exhaustive()
    }
}
