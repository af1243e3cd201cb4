//! The installed binary, run as a desktop client would: stdin left open
//! while the process is told to stop.

#![cfg(unix)]

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

const EXIT_WAIT: Duration = Duration::from_secs(10);

fn spawn_server(dir: &tempfile::TempDir) -> Child {
    Command::new(env!("CARGO_BIN_EXE_yst-mcp"))
        .arg("--grace-period-secs")
        .arg("1")
        .arg("--data-dir")
        .arg(dir.path().join("data"))
        .arg("--output-dir")
        .arg(dir.path().join("out"))
        .env("RUST_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn yst-mcp")
}

fn wait_exit(child: &mut Child) -> Option<ExitStatus> {
    let started = Instant::now();
    while started.elapsed() < EXIT_WAIT {
        if let Some(status) = child.try_wait().expect("poll child") {
            return Some(status);
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    None
}

/// Send `initialize` and read the answer, so the signal handlers are in
/// place before the test signals the process.
fn wait_ready(child: &mut Child) -> BufReader<ChildStdout> {
    let stdin = child.stdin.as_mut().expect("stdin piped");
    writeln!(
        stdin,
        r#"{{"jsonrpc":"2.0","id":1,"method":"initialize","params":{{"protocolVersion":"2024-11-05","capabilities":{{}},"clientInfo":{{"name":"test-client","version":"1.0"}}}}}}"#
    )
    .unwrap();
    stdin.flush().unwrap();

    let mut stdout = BufReader::new(child.stdout.take().expect("stdout piped"));
    let mut line = String::new();
    stdout.read_line(&mut line).unwrap();
    let resp: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(resp["id"], 1);
    assert!(resp["result"]["serverInfo"].is_object());
    stdout
}

fn stop_with(signal: Signal) {
    let dir = tempfile::tempdir().unwrap();
    let mut child = spawn_server(&dir);
    let _stdout = wait_ready(&mut child);

    // stdin stays open for the whole test.
    kill(Pid::from_raw(child.id() as i32), signal).unwrap();

    let status = match wait_exit(&mut child) {
        Some(status) => status,
        None => {
            let _ = child.kill();
            panic!("server still running after {signal:?} with stdin open");
        }
    };
    assert_eq!(status.code(), Some(0), "unexpected exit: {status:?}");
    drop(child.stdin.take());
}

#[test]
fn test_sigterm_exits_with_stdin_open() {
    stop_with(Signal::SIGTERM);
}

#[test]
fn test_sigint_exits_with_stdin_open() {
    stop_with(Signal::SIGINT);
}

#[test]
fn test_stdin_close_exits() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = spawn_server(&dir);
    let _stdout = wait_ready(&mut child);

    drop(child.stdin.take());

    let status = wait_exit(&mut child).expect("server still running after EOF");
    assert_eq!(status.code(), Some(0));
}
