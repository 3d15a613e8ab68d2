use serde::Serialize;

use crate::cmd::{close_after_error, open_session, ProbeArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{optional, print_report, OutputFormat, Report};

#[derive(Serialize)]
struct ProbeReport {
    amp: String,
    port: u16,
    endian: String,
    clock: String,
    ntp_server: Option<String>,
    amp_version: Option<u8>,
    offset: f64,
    sync_epoch: Option<f64>,
    connected: bool,
}

impl Report for ProbeReport {
    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("amp", format!("{}:{}", self.amp, self.port)),
            ("endian", self.endian.clone()),
            ("clock", self.clock.clone()),
            ("ntp_server", optional(self.ntp_server.as_deref())),
            ("amp_version", optional(self.amp_version)),
            ("offset", format!("{:.6}", self.offset)),
            ("sync_epoch", optional(self.sync_epoch.map(|t| format!("{t:.3}")))),
            ("connected", self.connected.to_string()),
        ]
    }
}

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = open_session(&args.connect)?;
    let amp_version = match session.identify() {
        Ok(version) => version,
        Err(err) => {
            close_after_error(&mut session);
            return Err(session_error("identify failed", err));
        }
    };

    let report = ProbeReport {
        amp: args.connect.amp.clone(),
        port: args.connect.port,
        endian: session.config().endian.to_string(),
        clock: session
            .mode()
            .map(|mode| mode.to_string())
            .unwrap_or_default(),
        ntp_server: session.peer().map(str::to_string),
        amp_version,
        offset: session.offset(),
        sync_epoch: session.sync_epoch(),
        connected: session.is_connected(),
    };

    session
        .disconnect()
        .map_err(|err| session_error("disconnect failed", err))?;

    print_report(&report, format);
    Ok(SUCCESS)
}
