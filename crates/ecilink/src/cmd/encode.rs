use ecilink_codec::encode_event;
use serde::Serialize;

use crate::cmd::EncodeArgs;
use crate::exit::{codec_error, CliResult, SUCCESS};
use crate::output::{hex, print_report, OutputFormat, Report};

#[derive(Serialize)]
struct EncodeReport {
    length: usize,
    hex: String,
    bytes: Vec<u8>,
}

impl Report for EncodeReport {
    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("length", self.length.to_string()),
            ("hex", self.hex.clone()),
        ]
    }
}

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let event = args.event.to_event()?.start(args.start);
    let record = encode_event(&event).map_err(|err| codec_error("encode failed", err))?;

    let report = EncodeReport {
        length: record.len(),
        hex: hex(&record),
        bytes: record.to_vec(),
    };
    print_report(&report, format);
    Ok(SUCCESS)
}
