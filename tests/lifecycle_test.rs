// End-to-end daemon lifecycle through the built binary and the library API

use daemonizer::{is_running, kill, DaemonError, DEFAULT_SIGNAL};
use std::path::Path;
use std::process::{Command, Output};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn daemonizer(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_daemonizer"))
        .args(args)
        .env("NO_COLOR", "1")
        .output()
        .unwrap()
}

/// Start a daemon; its stderr goes to `<pid>.err` unless `extra` names a target,
/// so it never holds on to the pipes `daemonizer()` reads from
fn start(pid: &Path, extra: &[&str]) -> Output {
    let err_path = pid.with_extension("err");
    let mut args = vec!["start", "--pid", pid.to_str().unwrap()];
    if !extra.contains(&"--stderr") {
        args.extend_from_slice(&["--stderr", err_path.to_str().unwrap()]);
    }
    args.extend_from_slice(extra);
    daemonizer(&args)
}

/// Poll until `check` holds or the timeout expires
fn wait_for(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    check()
}

#[test]
fn test_start_status_stop_with_delete() {
    let temp_dir = TempDir::new().unwrap();
    let pid_path = temp_dir.path().join("d1.pid");

    assert!(!is_running(&pid_path).unwrap());
    assert_eq!(
        daemonizer(&["status", "--pid", pid_path.to_str().unwrap()])
            .status
            .code(),
        Some(3)
    );

    let output = start(&pid_path, &["sleep", "--", "30"]);
    assert!(output.status.success(), "{:?}", output);

    // The parent returns only after recording the daemon's PID
    let recorded = std::fs::read_to_string(&pid_path).unwrap();
    let pid: u32 = recorded.trim().parse().unwrap();
    assert!(String::from_utf8_lossy(&output.stdout).contains(&recorded));
    assert!(is_running(&pid_path).unwrap());

    let status = daemonizer(&["status", "--pid", pid_path.to_str().unwrap()]);
    assert!(status.status.success());
    assert!(String::from_utf8_lossy(&status.stdout).contains(&pid.to_string()));

    let stop = daemonizer(&["stop", "--pid", pid_path.to_str().unwrap(), "--delete"]);
    assert!(stop.status.success(), "{:?}", stop);
    assert!(!pid_path.exists());
    assert!(!is_running(&pid_path).unwrap());
}

#[test]
fn test_second_start_is_refused() {
    let temp_dir = TempDir::new().unwrap();
    let pid_path = temp_dir.path().join("single.pid");

    assert!(start(&pid_path, &["sleep", "--", "30"]).status.success());
    let first_pid = std::fs::read_to_string(&pid_path).unwrap();

    let second = start(&pid_path, &["sleep", "--", "30"]);
    assert!(!second.status.success());
    assert!(String::from_utf8_lossy(&second.stderr).contains("already running"));
    // The losing start must not disturb the recorded PID
    assert_eq!(std::fs::read_to_string(&pid_path).unwrap(), first_pid);

    assert!(kill(&pid_path, true, DEFAULT_SIGNAL).unwrap());
}

#[test]
fn test_lock_released_when_daemon_dies() {
    let temp_dir = TempDir::new().unwrap();
    let pid_path = temp_dir.path().join("killed.pid");

    assert!(start(&pid_path, &["sleep", "--", "30"]).status.success());
    assert!(is_running(&pid_path).unwrap());

    // SIGKILL gives the daemon no chance to clean up
    let stop = daemonizer(&[
        "stop",
        "--pid",
        pid_path.to_str().unwrap(),
        "--signal",
        "KILL",
    ]);
    assert!(stop.status.success(), "{:?}", stop);
    assert!(pid_path.exists());

    assert!(wait_for(Duration::from_secs(5), || !is_running(&pid_path).unwrap()));

    let err = kill(&pid_path, false, DEFAULT_SIGNAL).unwrap_err();
    assert!(matches!(err, DaemonError::NotRunning(_)));

    // A stale file does not block the next start
    assert!(start(&pid_path, &["sleep", "--", "30"]).status.success());
    assert!(kill(&pid_path, true, DEFAULT_SIGNAL).unwrap());
}

#[test]
fn test_short_lived_daemon_releases_lock() {
    let temp_dir = TempDir::new().unwrap();
    let pid_path = temp_dir.path().join("short.pid");

    assert!(start(&pid_path, &["true"]).status.success());
    assert!(wait_for(Duration::from_secs(5), || !is_running(&pid_path).unwrap()));
}

#[test]
fn test_streams_are_redirected() {
    let temp_dir = TempDir::new().unwrap();
    let pid_path = temp_dir.path().join("echo.pid");
    let out_path = temp_dir.path().join("echo.out");
    let err_path = temp_dir.path().join("echo.err");

    let output = start(
        &pid_path,
        &[
            "--stdout",
            out_path.to_str().unwrap(),
            "--stderr",
            err_path.to_str().unwrap(),
            "sh",
            "--",
            "-c",
            "echo to-out; echo to-err >&2",
        ],
    );
    assert!(output.status.success(), "{:?}", output);

    assert!(wait_for(Duration::from_secs(5), || !is_running(&pid_path).unwrap()));
    assert_eq!(std::fs::read_to_string(&out_path).unwrap(), "to-out\n");
    assert_eq!(std::fs::read_to_string(&err_path).unwrap(), "to-err\n");
    // Nothing from the daemon leaks into the launcher's streams
    assert!(!String::from_utf8_lossy(&output.stdout).contains("to-out"));
}

#[test]
fn test_default_stream_targets() {
    let temp_dir = TempDir::new().unwrap();
    let pid_path = temp_dir.path().join("defaults.pid");

    // No --stdout/--stderr: output goes to /dev/null, errors to our stdout.
    // The daemon keeps a copy of our stdout pipe, so this returns after it exits.
    let output = daemonizer(&[
        "start",
        "--pid",
        pid_path.to_str().unwrap(),
        "sh",
        "--",
        "-c",
        "echo to-err >&2; echo to-out",
    ]);
    assert!(output.status.success(), "{:?}", output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("to-err"), "{}", stdout);
    assert!(!stdout.contains("to-out"), "{}", stdout);
    assert!(!stderr.contains("to-out") && !stderr.contains("to-err"));

    assert!(wait_for(Duration::from_secs(5), || !is_running(&pid_path).unwrap()));
}

#[test]
fn test_exec_failure_is_logged_to_stderr_target() {
    let temp_dir = TempDir::new().unwrap();
    let pid_path = temp_dir.path().join("bad.pid");
    let err_path = temp_dir.path().join("bad.err");

    let output = start(
        &pid_path,
        &[
            "--stderr",
            err_path.to_str().unwrap(),
            "/nonexistent/program",
        ],
    );
    assert!(output.status.success(), "{:?}", output);

    assert!(wait_for(Duration::from_secs(5), || !is_running(&pid_path).unwrap()));
    assert!(wait_for(Duration::from_secs(5), || {
        std::fs::read_to_string(&err_path)
            .map(|log| log.contains("failed to exec /nonexistent/program"))
            .unwrap_or(false)
    }));
}

#[test]
fn test_missing_stdin_target_stops_daemon() {
    let temp_dir = TempDir::new().unwrap();
    let pid_path = temp_dir.path().join("nostdin.pid");
    let err_path = temp_dir.path().join("nostdin.err");
    let missing = temp_dir.path().join("missing-input");

    let output = start(
        &pid_path,
        &[
            "--stdin",
            missing.to_str().unwrap(),
            "--stderr",
            err_path.to_str().unwrap(),
            "sleep",
            "--",
            "30",
        ],
    );
    assert!(output.status.success(), "{:?}", output);
    assert!(wait_for(Duration::from_secs(5), || !is_running(&pid_path).unwrap()));
}

#[test]
fn test_start_without_pid_fails() {
    let output = daemonizer(&["start", "sleep", "--", "30"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("pid not specified"));
}

#[test]
fn test_stop_unreadable_pid_file() {
    let temp_dir = TempDir::new().unwrap();
    let pid_path = temp_dir.path().join("nothing.pid");

    let output = daemonizer(&["stop", "--pid", pid_path.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unreadable pid file"));
}
