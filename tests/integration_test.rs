use assert_cmd::Command;
use portable_pty::{CommandBuilder, PtySize, native_pty_system};
use predicates::prelude::*;
use std::fs;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn ttypace(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ttypace").unwrap();
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_options() {
    let dir = TempDir::new().unwrap();
    ttypace(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("SESSION_FILE"))
        .stdout(predicate::str::contains("--monitor-port"))
        .stdout(predicate::str::contains("--context-variable"));
}

#[test]
fn test_session_file_is_required() {
    let dir = TempDir::new().unwrap();
    ttypace(&dir).assert().failure();
}

#[test]
fn test_list_bindings() {
    let dir = TempDir::new().unwrap();
    ttypace(&dir)
        .arg("--list-bindings")
        .assert()
        .success()
        .stdout(predicate::str::contains("Insert_Return"))
        .stdout(predicate::str::contains("Command_NextLine"))
        .stdout(predicate::str::contains("Passthrough_SwitchToCommandMode"));
}

#[test]
fn test_binding_overrides() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(".ttypace.toml"),
        "[keybindings]\n\"110\" = \"Command_PrevLine\"\n",
    )
    .unwrap();

    ttypace(&dir)
        .args(["--list-bindings", "-b", "120=Command_Quit", "-b", "121=Command_Jump"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Command_PrevLine").and(predicate::str::contains("n (110)")))
        .stdout(predicate::str::contains("x (120)"))
        .stderr(predicate::str::contains("unknown key binding action: Command_Jump"));
}

#[test]
fn test_missing_script_exit_code() {
    let dir = TempDir::new().unwrap();
    ttypace(&dir)
        .arg("no-such-script.sh")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no such script file"));
}

#[test]
fn test_include_cycle_exit_code() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.sh"), "echo a\n# INCLUDE:b.sh\n").unwrap();
    fs::write(dir.path().join("b.sh"), "echo b\n# INCLUDE:a.sh\n").unwrap();

    ttypace(&dir)
        .arg("a.sh")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("include cycle"));
}

#[test]
fn test_bad_context_variable() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("demo.sh"), "echo %name%\n").unwrap();

    ttypace(&dir)
        .args(["demo.sh", "-v", "name"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("expected NAME=VALUE"));
}

#[test]
fn test_failing_setup_script_aborts() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("demo.sh"), "echo hi\n").unwrap();

    ttypace(&dir)
        .args(["demo.sh", "--setup-script", "touch ran; exit 3"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("setup script"));
    assert!(dir.path().join("ran").exists());
}

#[test]
fn test_auto_flag_leaves_session_file_alone() {
    let dir = TempDir::new().unwrap();
    ttypace(&dir)
        .args(["--auto", "missing.sh"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no such script file: missing.sh"))
        .stderr(predicate::str::contains("invalid value").not());
}

#[test]
fn test_auto_flag_takes_pilot_with_equals() {
    let dir = TempDir::new().unwrap();
    ttypace(&dir)
        .args(["--auto=semi", "missing.sh"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no such script file"));
    ttypace(&dir)
        .args(["--auto=sideways", "missing.sh"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_show_keys_needs_a_terminal() {
    let dir = TempDir::new().unwrap();
    ttypace(&dir)
        .arg("--show-keys")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not a terminal"));
}

#[test]
fn test_debug_log_written() {
    let dir = TempDir::new().unwrap();
    ttypace(&dir)
        .args(["--list-bindings", "--debug", "--log-file", "debug.log"])
        .assert()
        .success();
    assert!(dir.path().join("debug.log").exists());
}

/// Run the binary on a real pseudoterminal and collect everything it prints.
fn run_in_pty(dir: &TempDir, args: &[&str]) -> (u32, String) {
    run_in_pty_typing(dir, args, None)
}

/// Like [`run_in_pty`], typing `keys` once `ready` shows up in the output.
fn run_in_pty_typing(dir: &TempDir, args: &[&str], typing: Option<(&str, &[u8])>) -> (u32, String) {
    let pair = native_pty_system()
        .openpty(PtySize {
            rows: 24,
            cols: 80,
            pixel_width: 0,
            pixel_height: 0,
        })
        .unwrap();

    let mut cmd = CommandBuilder::new(env!("CARGO_BIN_EXE_ttypace"));
    cmd.args(args);
    cmd.cwd(dir.path());
    cmd.env("HOME", dir.path());
    let mut child = pair.slave.spawn_command(cmd).unwrap();
    drop(pair.slave);

    let output = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&output);
    let mut reader = pair.master.try_clone_reader().unwrap();
    thread::spawn(move || {
        let mut buffer = [0u8; 1024];
        while let Ok(n) = reader.read(&mut buffer) {
            if n == 0 {
                break;
            }
            sink.lock().unwrap().extend_from_slice(&buffer[..n]);
        }
    });

    let mut writer = pair.master.take_writer().unwrap();
    let mut pending = typing;

    let deadline = Instant::now() + Duration::from_secs(20);
    let status = loop {
        if let Some((ready, keys)) = pending {
            if String::from_utf8_lossy(&output.lock().unwrap()).contains(ready) {
                writer.write_all(keys).unwrap();
                writer.flush().unwrap();
                pending = None;
            }
        }
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() > deadline {
            child.kill().unwrap();
            panic!(
                "ttypace did not exit; output so far: {}",
                String::from_utf8_lossy(&output.lock().unwrap())
            );
        }
        thread::sleep(Duration::from_millis(50));
    };
    thread::sleep(Duration::from_millis(200));
    drop(writer);

    let text = String::from_utf8_lossy(&output.lock().unwrap()).into_owned();
    (status.exit_code(), text)
}

#[test]
fn test_auto_playback_in_pty() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("demo.sh"),
        "echo %greeting%-from-ttypace\n# PAUSE:5\n# EXIT\necho never\n",
    )
    .unwrap();

    let (code, output) = run_in_pty(
        &dir,
        &["--auto=full", "--shell", "sh", "-v", "greeting=hello", "demo.sh"],
    );

    assert_eq!(code, 0, "output: {output}");
    assert!(output.contains("hello-from-ttypace"), "output: {output}");
    assert!(!output.contains("echo never"), "output: {output}");
}

#[test]
fn test_run_directive_captures_output() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("demo.sh"),
        "# RUN:echo captured\n# EXIT\n",
    )
    .unwrap();

    let (code, output) = run_in_pty(&dir, &["--auto", "--shell", "sh", "demo.sh"]);

    assert_eq!(code, 0, "output: {output}");
    let captured = fs::read_to_string(dir.path().join("0-echo_captured.out")).unwrap();
    assert_eq!(captured, "captured\n");
}

#[test]
fn test_show_keys_prints_codes() {
    let dir = TempDir::new().unwrap();
    let (code, output) = run_in_pty_typing(
        &dir,
        &["--show-keys"],
        Some(("Ctrl-C ends", &b"j\x03"[..])),
    );

    assert_eq!(code, 0, "output: {output}");
    assert!(output.contains("106  j"), "output: {output}");
    assert!(output.contains("3  Ctrl-C"), "output: {output}");
}
