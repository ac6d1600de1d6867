//! Runs the binary end to end and makes sure it finishes in time.
use std::net::TcpListener;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

fn run_portprobe_with_timeout(args: &[&str], timeout: Duration) -> String {
    let mut child = Command::new(env!("CARGO_BIN_EXE_portprobe"))
        .args(args)
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();

    let start = Instant::now();
    match child.wait_timeout(timeout).unwrap() {
        Some(status) => assert!(status.success(), "portprobe exited with {status}"),
        None => {
            child.kill().unwrap();
            panic!("Timeout while running command");
        }
    }
    let duration = start.elapsed().as_secs_f32();
    println!("time: {duration:1.1}s");

    let output = child.wait_with_output().unwrap();
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn greppable_loopback_scan_finishes() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port().to_string();

    let stdout = run_portprobe_with_timeout(
        &["--no-config", "-g", "-a", "127.0.0.1", "-r", &port, "-t", "500"],
        Duration::from_secs(10),
    );

    assert_eq!(stdout.trim(), format!("127.0.0.1 -> [{port}]"));
}

#[test]
fn json_scan_of_small_range_finishes() {
    let stdout = run_portprobe_with_timeout(
        &[
            "--no-config",
            "--json",
            "-a",
            "127.0.0.1",
            "-r",
            "1-500",
            "-b",
            "100",
            "-t",
            "500",
        ],
        Duration::from_secs(20),
    );

    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["status"], "completed");
    assert_eq!(json["probes"].as_array().unwrap().len(), 500);
}

#[test]
fn invalid_target_exits_with_failure() {
    let status = Command::new(env!("CARGO_BIN_EXE_portprobe"))
        .args(["--no-config", "-a", "999.999.999.999", "-r", "1-10"])
        .stdout(Stdio::null())
        .status()
        .unwrap();

    assert_eq!(status.code(), Some(1));
}
