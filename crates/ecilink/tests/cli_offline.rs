#![cfg(feature = "cli")]

use std::process::{Command, Output};

fn ecilink(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ecilink"))
        .args(args)
        .env_remove("ECILINK_AMP")
        .env_remove("ECILINK_NTP_SERVER")
        .output()
        .expect("ecilink should run")
}

#[test]
fn version_prints_package_version() {
    let output = ecilink(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("ecilink {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn version_extended_reports_byte_order() {
    let output = ecilink(&["version", "--extended"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("byte_order: little-endian"));
    assert!(stdout.contains("default_port: 55513"));
}

#[test]
fn encode_prints_default_marker_hex() {
    let output = ecilink(&["--format", "pretty", "encode", "--type", "beep"]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("length=25"), "{stdout}");
    assert!(
        stdout.contains("hex=17000000000001000000626565700420202020042020202000"),
        "{stdout}"
    );
}

#[test]
fn encode_json_carries_bytes() {
    let output = ecilink(&[
        "--format",
        "json",
        "encode",
        "--type",
        "resp",
        "--start",
        "1.5",
        "--data",
        "corr=bool:true",
    ]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"bytes\":["), "{stdout}");
    // start = 1500 ms, little-endian
    assert!(stdout.contains("dc050000"), "{stdout}");
}

#[test]
fn encode_rejects_bad_type_code_with_60() {
    let output = ecilink(&["encode", "--type", "abc"]);
    assert_eq!(output.status.code(), Some(60));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("type"), "{stderr}");
}

#[test]
fn malformed_data_entry_is_usage_error() {
    let output = ecilink(&["encode", "--type", "beep", "--data", "cond"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn ntp_clock_without_server_is_usage_error() {
    // No amplifier is contacted: the missing NTP server is caught first.
    let output = ecilink(&["probe", "127.0.0.1", "--port", "9", "--clock", "ntp"]);
    assert_eq!(output.status.code(), Some(64));
}
