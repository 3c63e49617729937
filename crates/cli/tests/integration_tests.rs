/// Integration tests driving the shell binary through stdin.
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// Runs the shell with `commands` on stdin (plus a trailing EXIT) and
/// returns stdout.
fn run_cli(envs: &[(&str, &str)], commands: &str) -> String {
    use std::io::Write;
    use std::process::{Command, Stdio};

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cli"));
    cmd.env_remove("SMAP_KEYLOG")
        .env("RUST_LOG", "warn")
        .env("SMAP_FP_LEN", "16")
        .env("SMAP_PARTITIONS", "4");
    for (k, v) in envs {
        cmd.env(k, v);
    }
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn CLI");

    {
        let stdin = child.stdin.as_mut().expect("Failed to open stdin");
        stdin
            .write_all(commands.as_bytes())
            .expect("Failed to write to stdin");
        stdin.write_all(b"EXIT\n").expect("Failed to write EXIT");
    }

    let output = child.wait_with_output().expect("Failed to read output");
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Command replies in order, without the banner and prompts.
fn replies(output: &str) -> Vec<String> {
    output
        .split("> ")
        .skip(1)
        .map(|s| s.trim_end().to_string())
        .collect()
}

fn path_str(p: &Path) -> &str {
    p.to_str().unwrap()
}

// -------------------- Basic commands --------------------

#[test]
fn test_basic_set_get() {
    let output = run_cli(&[], "SET key1 42\nGET key1\n");
    assert_eq!(replies(&output), vec!["OK", "42", "bye"]);
}

#[test]
fn test_missing_key_is_nil() {
    let output = run_cli(&[], "GET nothing\nSET a 1\nBUILD\nGET nothing\n");
    assert_eq!(
        replies(&output),
        vec!["(nil)", "OK", "OK (generations=1)", "(nil)", "bye"]
    );
}

#[test]
fn test_overwrite_across_builds() {
    let commands = "SET k 1\nBUILD\nSET k 2\nGET k\nBUILD\nGET k\n";
    let output = run_cli(&[], commands);
    assert_eq!(
        replies(&output),
        vec!["OK", "OK (generations=1)", "OK", "2", "OK (generations=2)", "2", "bye"]
    );
}

#[test]
fn test_deferred_write_visible_after_build() {
    let output = run_cli(&[], "SETD d 7\nGET d\nBUILD\nGET d\n");
    assert_eq!(
        replies(&output),
        vec!["OK", "(nil)", "OK (generations=1)", "7", "bye"]
    );
}

#[test]
fn test_buffer_threshold_from_env() {
    let mut commands = String::new();
    for i in 0..10 {
        commands.push_str(&format!("SET k{} {}\n", i, i));
    }
    commands.push_str("STATS\n");
    let output = run_cli(&[("SMAP_BUFFER", "5")], &commands);
    assert!(output.contains("generation_count: 2"));
    assert!(output.contains("generation 1: 4 blocks"));
}

#[test]
fn test_keys_and_size() {
    let output = run_cli(&[], "SIZE\nSET a 1\nSET b 2\nKEYS\nBUILD\nKEYS\n");
    let r = replies(&output);
    assert_eq!(r[0], "0");
    assert_eq!(r[3], "2");
    assert_eq!(r[5], "2");
}

#[test]
fn test_invalid_config_fails_startup() {
    let output = run_cli(&[("SMAP_FP_LEN", "40")], "GET a\n");
    assert!(!output.contains("(nil)"));
}

// -------------------- Persistence --------------------

#[test]
fn test_save_and_load_across_processes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("map.smap");

    let mut commands = String::new();
    for i in 0..1_000 {
        commands.push_str(&format!("SET key{} {}\n", i, i * 3));
    }
    commands.push_str("BUILD\nSET tail 99\n");
    commands.push_str(&format!("SAVE {}\n", path_str(&path)));
    run_cli(&[], &commands);
    assert!(path.exists());

    let output = run_cli(
        &[],
        &format!("LOAD {}\nGET key0\nGET key999\nGET tail\nKEYS\n", path_str(&path)),
    );
    assert_eq!(
        replies(&output),
        vec!["OK (keys=1001)", "0", "2997", "99", "1001", "bye"]
    );
}

#[test]
fn test_load_corrupt_file_reports_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("junk.smap");
    fs::write(&path, b"definitely not a map file").unwrap();

    let output = run_cli(&[], &format!("LOAD {}\nGET a\n", path_str(&path)));
    let r = replies(&output);
    assert!(r[0].starts_with("ERR load failed"));
    assert_eq!(r[1], "(nil)");
}

#[test]
fn test_file_keylog_survives_restart() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("deferred.log");
    let envs = [("SMAP_KEYLOG", path_str(&log))];

    run_cli(&envs, "SETD late 11\n");
    assert!(fs::metadata(&log).unwrap().len() > 0);

    let output = run_cli(&envs, "GET late\nBUILD\nGET late\n");
    assert_eq!(
        replies(&output),
        vec!["(nil)", "OK (generations=1)", "11", "bye"]
    );
    assert_eq!(fs::metadata(&log).unwrap().len(), 0);
}

#[test]
fn test_new_write_outranks_log_from_previous_run() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("keys.log");
    let envs = [("SMAP_KEYLOG", path_str(&log))];

    run_cli(&envs, "SET a 1\nSET b 2\nSET c 3\nSETD k 1\n");

    let output = run_cli(&envs, "SET k 2\nBUILD\nGET k\n");
    assert_eq!(replies(&output), vec!["OK", "OK (generations=1)", "2", "bye"]);
}
