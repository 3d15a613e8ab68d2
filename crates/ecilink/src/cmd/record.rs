use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ecilink_codec::{encode_event, Event};
use ecilink_session::EventStart;
use serde::Serialize;
use tracing::info;

use crate::cmd::{close_after_error, open_session, parse_duration, RecordArgs};
use crate::exit::{codec_error, session_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{optional, print_report, OutputFormat, Report};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Serialize)]
struct RecordReport {
    recorded_secs: f64,
    marker: Option<String>,
    interrupted: bool,
}

impl Report for RecordReport {
    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("recorded_secs", format!("{:.3}", self.recorded_secs)),
            ("marker", optional(self.marker.as_deref())),
            ("interrupted", self.interrupted.to_string()),
        ]
    }
}

pub fn run(args: RecordArgs, format: OutputFormat) -> CliResult<i32> {
    let limit = args
        .for_duration
        .as_deref()
        .map(parse_duration)
        .transpose()?;
    // Validate the marker before touching the amplifier.
    let marker = match args.marker.as_deref() {
        Some(code) => {
            let event = Event::new(code);
            encode_event(&event).map_err(|err| codec_error("invalid marker", err))?;
            Some(event)
        }
        None => None,
    };

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut session = open_session(&args.connect)?;
    if let Err(err) = session.begin_recording() {
        close_after_error(&mut session);
        return Err(session_error("begin recording failed", err));
    }
    if let Some(event) = marker {
        if let Err(err) = session.send_event(EventStart::Now, event) {
            close_after_error(&mut session);
            return Err(session_error("send marker failed", err));
        }
    }
    info!(limit = ?limit, "recording; press Ctrl-C to stop");

    let started = Instant::now();
    while running.load(Ordering::SeqCst) {
        if limit.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }
    let interrupted = !running.load(Ordering::SeqCst);

    let recorded_secs = session.since_recording_start().unwrap_or_default();
    session
        .disconnect()
        .map_err(|err| session_error("disconnect failed", err))?;

    let report = RecordReport {
        recorded_secs,
        marker: args.marker.clone(),
        interrupted,
    };
    print_report(&report, format);
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
