use ecilink_session::EventStart;
use serde::Serialize;

use crate::cmd::{open_session, AmpSession, EventArgs};
use crate::exit::{session_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_report, OutputFormat, Report};

#[derive(Serialize)]
struct EventReport {
    event_type: String,
    start: String,
    duration: f64,
    keys: usize,
    recorded: bool,
    sent: bool,
}

impl Report for EventReport {
    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("type", self.event_type.clone()),
            ("start", self.start.clone()),
            ("duration", self.duration.to_string()),
            ("keys", self.keys.to_string()),
            ("recorded", self.recorded.to_string()),
            ("sent", self.sent.to_string()),
        ]
    }
}

pub fn run(args: EventArgs, format: OutputFormat) -> CliResult<i32> {
    let start: EventStart = args
        .start
        .parse()
        .map_err(|err| CliError::new(USAGE, format!("{err}")))?;
    let event = args.event.to_event()?;
    let keys = event.data.len();

    let mut session = open_session(&args.connect)?;
    let sent = send(&mut session, start, event, args.record);
    // Leave the amplifier idle even when sending failed.
    let closed = session
        .disconnect()
        .map_err(|err| session_error("disconnect failed", err));
    sent?;
    closed?;

    let report = EventReport {
        event_type: args.event.event_type.clone(),
        start: args.start.clone(),
        duration: args.event.duration,
        keys,
        recorded: args.record,
        sent: true,
    };
    print_report(&report, format);
    Ok(SUCCESS)
}

fn send(
    session: &mut AmpSession,
    start: EventStart,
    event: ecilink_codec::Event,
    record: bool,
) -> CliResult<()> {
    if record {
        session
            .begin_recording()
            .map_err(|err| session_error("begin recording failed", err))?;
    }
    session
        .send_event(start, event)
        .map_err(|err| session_error("send event failed", err))?;
    if record {
        session
            .end_recording()
            .map_err(|err| session_error("end recording failed", err))?;
    }
    Ok(())
}
