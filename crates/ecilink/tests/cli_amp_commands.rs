#![cfg(feature = "cli")]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::process::{Command, Output};
use std::thread;

/// Loopback stand-in for the Amp Server. Answers each command the way an
/// idle amplifier does and returns the command tags it saw.
fn fake_amp(replies: fn(u8) -> &'static [u8]) -> (u16, thread::JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let port = listener.local_addr().expect("local addr").port();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("amp should accept");
        let mut tags = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let tag = buf[0];
            tags.push(tag);
            if stream.write_all(replies(tag)).is_err() || tag == b'X' {
                break;
            }
        }
        tags
    });
    (port, handle)
}

fn idle_amp(tag: u8) -> &'static [u8] {
    match tag {
        b'Q' | b'Y' => b"I\x05",
        _ => b"Z",
    }
}

fn no_recorder_amp(tag: u8) -> &'static [u8] {
    match tag {
        b'Q' | b'Y' => b"I\x05",
        b'B' => b"R",
        _ => b"Z",
    }
}

fn failing_identify_amp(tag: u8) -> &'static [u8] {
    match tag {
        b'Q' => b"I\x05",
        b'Y' => b"F",
        _ => b"Z",
    }
}

fn ecilink(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ecilink"))
        .args(["--log-level", "error"])
        .args(args)
        .env_remove("ECILINK_AMP")
        .env_remove("ECILINK_PORT")
        .env_remove("ECILINK_NTP_SERVER")
        .output()
        .expect("ecilink should run")
}

#[test]
fn probe_reports_amp_version() {
    let (port, amp) = fake_amp(idle_amp);
    let port = port.to_string();

    let output = ecilink(&["--format", "json", "probe", "127.0.0.1", "--port", &port]);

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"amp_version\":5"), "{stdout}");
    assert!(stdout.contains("\"clock\":\"simple\""), "{stdout}");
    assert!(stdout.contains("\"connected\":true"), "{stdout}");

    let tags = amp.join().expect("amp thread should complete");
    assert_eq!(tags, b"QATYX");
}

#[test]
fn probe_with_ntp_clock() {
    let (port, amp) = fake_amp(idle_amp);
    let port = port.to_string();

    let output = ecilink(&[
        "--format",
        "json",
        "probe",
        "127.0.0.1",
        "--port",
        &port,
        "--clock",
        "ntp",
        "--ntp-server",
        "127.0.0.1",
        "--ntp-offset",
        "-0.25",
    ]);

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"offset\":-0.25"), "{stdout}");
    assert_eq!(amp.join().expect("amp thread should complete"), b"QANYX");
}

#[test]
fn event_with_record_brackets_marker() {
    let (port, amp) = fake_amp(idle_amp);
    let port = port.to_string();

    let output = ecilink(&[
        "--format",
        "json",
        "event",
        "127.0.0.1",
        "--port",
        &port,
        "--type",
        "stim",
        "--label",
        "face",
        "--data",
        "cond=text:happy",
        "--record",
    ]);

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"sent\":true"), "{stdout}");
    assert_eq!(
        amp.join().expect("amp thread should complete"),
        b"QATATBDEX"
    );
}

#[test]
fn record_for_duration_with_marker() {
    let (port, amp) = fake_amp(idle_amp);
    let port = port.to_string();

    let output = ecilink(&[
        "--format",
        "pretty",
        "record",
        "127.0.0.1",
        "--port",
        &port,
        "--for",
        "200ms",
        "--marker",
        "strt",
    ]);

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("marker=strt"), "{stdout}");
    assert!(stdout.contains("interrupted=false"), "{stdout}");
    assert_eq!(
        amp.join().expect("amp thread should complete"),
        b"QATATBDEX"
    );
}

#[test]
fn missing_recording_device_fails_with_code_1() {
    let (port, amp) = fake_amp(no_recorder_amp);
    let port = port.to_string();

    let output = ecilink(&["event", "127.0.0.1", "--port", &port, "--type", "stim", "--record"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no recording device"), "{stderr}");
    // The session still signs off with Exit.
    let tags = amp.join().expect("amp thread should complete");
    assert_eq!(tags.last(), Some(&b'X'));
}

#[test]
fn record_without_recording_device_still_sends_exit() {
    let (port, amp) = fake_amp(no_recorder_amp);
    let port = port.to_string();

    let output = ecilink(&["record", "127.0.0.1", "--port", &port, "--for", "0.1s"]);

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(amp.join().expect("amp thread should complete"), b"QATATBX");
}

#[test]
fn failed_identify_still_sends_exit() {
    let (port, amp) = fake_amp(failing_identify_amp);
    let port = port.to_string();

    let output = ecilink(&["probe", "127.0.0.1", "--port", &port]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("identify failed"), "{stderr}");
    assert_eq!(amp.join().expect("amp thread should complete"), b"QATYX");
}

#[test]
fn refused_connection_returns_3() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let port = listener.local_addr().expect("local addr").port().to_string();
    drop(listener);

    let output = ecilink(&["probe", "127.0.0.1", "--port", &port]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn silent_amp_returns_124() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let port = listener.local_addr().expect("local addr").port().to_string();
    let amp = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("amp should accept");
        thread::sleep(std::time::Duration::from_millis(500));
        drop(stream);
    });

    let output = ecilink(&["probe", "127.0.0.1", "--port", &port, "--timeout", "100ms"]);
    assert_eq!(output.status.code(), Some(124));
    amp.join().expect("amp thread should complete");
}
