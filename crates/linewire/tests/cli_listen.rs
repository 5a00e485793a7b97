#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/lwcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn spawn_listener(sock_path: &Path, extra: &[&str]) -> Child {
    let child = Command::new(env!("CARGO_BIN_EXE_linewire"))
        .args(["--log-level", "error", "listen"])
        .arg(sock_path)
        .args(extra)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("listen should start");

    let start = Instant::now();
    while !sock_path.exists() {
        if start.elapsed() >= Duration::from_secs(5) {
            panic!("listener never bound {}", sock_path.display());
        }
        thread::sleep(Duration::from_millis(25));
    }
    child
}

fn send(sock_path: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_linewire"))
        .args(["--log-level", "error", "--format", "json", "send"])
        .arg(sock_path)
        .args(args)
        .output()
        .expect("send should run")
}

fn wait_with_deadline(child: &mut Child, deadline: Duration) -> Option<i32> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().expect("child should be waitable") {
            return status.code();
        }
        if start.elapsed() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            panic!("child did not exit within {deadline:?}");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

#[test]
fn send_calls_listener_and_listener_exits_after_count() {
    let dir = unique_temp_dir("count");
    let sock_path = dir.join("lw.sock");
    let mut listener = spawn_listener(&sock_path, &["--count", "1"]);

    let output = send(&sock_path, &["--method", "echo", "--params", "{\"a\":1}"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "{\"id\":1,\"result\":{\"a\":1},\"error\":null}\n"
    );

    assert_eq!(wait_with_deadline(&mut listener, Duration::from_secs(5)), Some(0));
    assert!(!sock_path.exists(), "socket file removed on exit");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn connections_are_served_independently() {
    let dir = unique_temp_dir("multi");
    let sock_path = dir.join("lw.sock");
    let mut listener = spawn_listener(&sock_path, &[]);

    for n in 0..3 {
        let params = format!("{{\"ms\":{}}}", 10 * (n + 1));
        let output = send(&sock_path, &["--method", "sleep", "--params", &params]);
        assert_eq!(output.status.code(), Some(0));
        let response: Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(response["id"], 1, "ids are per connection");
        assert_eq!(response["result"]["slept_ms"], 10 * (n + 1));
    }

    let _ = listener.kill();
    let _ = listener.wait();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn error_response_exits_failure() {
    let dir = unique_temp_dir("nomethod");
    let sock_path = dir.join("lw.sock");
    let mut listener = spawn_listener(&sock_path, &["--count", "1"]);

    let output = send(&sock_path, &["--method", "nope"]);
    assert_eq!(output.status.code(), Some(1));
    let response: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(response["error"]["kind"], "MethodNotFound");
    assert_eq!(response["result"], Value::Null);

    assert_eq!(wait_with_deadline(&mut listener, Duration::from_secs(5)), Some(0));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_to_missing_socket_fails() {
    let dir = unique_temp_dir("missing");
    let output = send(&dir.join("absent.sock"), &["--method", "ping"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("call failed"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_rejects_invalid_params_json() {
    let dir = unique_temp_dir("badparams");
    let output = send(&dir.join("unused.sock"), &["--method", "echo", "--params", "{nope"]);
    assert_eq!(output.status.code(), Some(64));
    assert!(output.stdout.is_empty());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_times_out_on_slow_handler() {
    let dir = unique_temp_dir("timeout");
    let sock_path = dir.join("lw.sock");
    let mut listener = spawn_listener(&sock_path, &[]);

    let output = send(
        &sock_path,
        &["--method", "sleep", "--params", "{\"ms\":5000}", "--timeout", "200ms"],
    );
    assert_eq!(output.status.code(), Some(124));

    let _ = listener.kill();
    let _ = listener.wait();
    let _ = std::fs::remove_dir_all(&dir);
}
