use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use ecilink_codec::{AckPolicy, Endian, Event, EventValue};
use ecilink_session::{
    connect_with_config, Session, SessionConfig, StaticOffset, SyncMode,
};
use ecilink_transport::{TcpTransport, TransportConfig, DEFAULT_ECI_PORT};
use tracing::warn;

use crate::exit::{session_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod encode;
pub mod event;
pub mod probe;
pub mod record;
pub mod version;

pub type AmpSession = Session<TcpTransport, StaticOffset>;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect, identify the amplifier and print session facts.
    Probe(ProbeArgs),
    /// Send a single event marker.
    Event(EventArgs),
    /// Record until a duration elapses or Ctrl-C.
    Record(RecordArgs),
    /// Print the encoded EventData record without connecting.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Probe(args) => probe::run(args, format),
        Command::Event(args) => event::run(args, format),
        Command::Record(args) => record::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ClockArg {
    Ntp,
    Simple,
}

impl From<ClockArg> for SyncMode {
    fn from(clock: ClockArg) -> Self {
        match clock {
            ClockArg::Ntp => SyncMode::Ntp,
            ClockArg::Simple => SyncMode::Simple,
        }
    }
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Amp Server address.
    #[arg(env = "ECILINK_AMP")]
    pub amp: String,
    /// Amp Server ECI port.
    #[arg(long, env = "ECILINK_PORT", default_value_t = DEFAULT_ECI_PORT)]
    pub port: u16,
    /// Byte-order token sent in the handshake (NTEL, MAC-, UNIX). Default: this host's.
    #[arg(long, value_parser = parse_endian)]
    pub endian: Option<Endian>,
    /// Clock synchronization method.
    #[arg(long, value_enum, default_value = "simple")]
    pub clock: ClockArg,
    /// NTP server the amplifier follows; required with --clock ntp.
    #[arg(long, env = "ECILINK_NTP_SERVER")]
    pub ntp_server: Option<String>,
    /// Measured offset of the local clock from the NTP server, in seconds.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub ntp_offset: f64,
    /// Maximum wait for each amplifier reply (e.g. 1s, 1.5s, 500ms).
    #[arg(long, default_value = "1s")]
    pub timeout: String,
    /// Only accept 'Z' as an acknowledgement.
    #[arg(long)]
    pub strict_acks: bool,
}

#[derive(Args, Debug)]
pub struct EventFieldArgs {
    /// Four-character event type code.
    #[arg(long = "type", value_name = "CODE")]
    pub event_type: String,
    /// Event label (at most 255 ASCII characters).
    #[arg(long)]
    pub label: Option<String>,
    /// Event description (at most 255 ASCII characters).
    #[arg(long)]
    pub description: Option<String>,
    /// Event duration in seconds.
    #[arg(long, default_value_t = ecilink_codec::MIN_DURATION_SECS)]
    pub duration: f64,
    /// Key/value pair as key=kind:value, kind one of bool, doub, long, text. Repeatable.
    #[arg(long, value_name = "KEY=KIND:VALUE")]
    pub data: Vec<String>,
}

impl EventFieldArgs {
    pub fn to_event(&self) -> CliResult<Event> {
        let mut event = Event::new(self.event_type.as_str()).duration(self.duration);
        if let Some(label) = &self.label {
            event = event.label(label.as_str());
        }
        if let Some(description) = &self.description {
            event = event.description(description.as_str());
        }
        for entry in &self.data {
            let (key, value) = parse_data(entry)?;
            event = event.with(key, value);
        }
        Ok(event)
    }
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct EventArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    #[command(flatten)]
    pub event: EventFieldArgs,
    /// Start time: "now" or seconds after the clock sync.
    #[arg(long, default_value = "now")]
    pub start: String,
    /// Wrap the event in its own recording.
    #[arg(long)]
    pub record: bool,
}

#[derive(Args, Debug)]
pub struct RecordArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Stop after this long (e.g. 30s, 0.5s, 500ms). Default: until Ctrl-C.
    #[arg(long = "for", value_name = "DURATION")]
    pub for_duration: Option<String>,
    /// Event type code to mark the start of the recording with.
    #[arg(long, value_name = "CODE")]
    pub marker: Option<String>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub event: EventFieldArgs,
    /// Start time in seconds after the clock sync.
    #[arg(long, default_value_t = 0.0)]
    pub start: f64,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Connect to the amplifier described by `args`.
pub fn open_session(args: &ConnectArgs) -> CliResult<AmpSession> {
    let timeout = parse_duration(&args.timeout)?;
    let transport_config = TransportConfig {
        read_timeout: timeout,
        write_timeout: Some(timeout),
        ..TransportConfig::default()
    };
    let session_config = SessionConfig {
        endian: args.endian.unwrap_or_else(Endian::native),
        ack_policy: if args.strict_acks {
            AckPolicy::Strict
        } else {
            AckPolicy::Tolerant
        },
        ..SessionConfig::default()
    };

    connect_with_config(
        &args.amp,
        args.port,
        args.clock.into(),
        args.ntp_server.as_deref(),
        StaticOffset(args.ntp_offset),
        transport_config,
        session_config,
    )
    .map_err(|err| session_error("connect failed", err))
}

fn parse_endian(input: &str) -> Result<Endian, String> {
    input.parse().map_err(|err| format!("{err}"))
}

/// Parse `key=kind:value`.
pub fn parse_data(entry: &str) -> CliResult<(String, EventValue)> {
    let invalid = |reason: &str| CliError::new(USAGE, format!("invalid --data {entry:?}: {reason}"));

    let (key, typed) = entry.split_once('=').ok_or_else(|| invalid("expected key=kind:value"))?;
    let (kind, raw) = typed.split_once(':').ok_or_else(|| invalid("expected kind:value"))?;

    let value = match kind {
        "bool" => match raw {
            "true" | "1" => EventValue::Bool(true),
            "false" | "0" => EventValue::Bool(false),
            _ => return Err(invalid("bool must be true or false")),
        },
        "doub" => EventValue::Double(raw.parse().map_err(|_| invalid("not a number"))?),
        "long" => EventValue::Long(raw.parse().map_err(|_| invalid("not a 32-bit integer"))?),
        "text" => EventValue::Text(raw.to_string()),
        _ => return Err(invalid("kind must be bool, doub, long or text")),
    };
    Ok((key.to_string(), value))
}

/// Parse `500ms`, `2s`, `1.5s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }
    let invalid = || CliError::new(USAGE, format!("invalid duration value: {input}"));

    let duration = if let Some(num) = input.strip_suffix("ms") {
        Duration::from_millis(num.parse().map_err(|_| invalid())?)
    } else {
        let num = input.strip_suffix('s').unwrap_or(input);
        let secs: f64 = num.parse().map_err(|_| invalid())?;
        Duration::try_from_secs_f64(secs).map_err(|_| invalid())?
    };

    if duration.is_zero() {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }
    Ok(duration)
}

/// Close `session` after a failed step, keeping the original error.
pub fn close_after_error(session: &mut AmpSession) {
    if !session.is_connected() {
        return;
    }
    if let Err(err) = session.disconnect() {
        warn!(error = %err, "failed to close session after error");
    }
}
