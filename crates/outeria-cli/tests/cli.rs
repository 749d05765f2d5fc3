//! Integration tests for the `outeria` binary.

use serial_test::serial;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::tempdir;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-q", "-p", "outeria-cli", "--bin", "outeria", "--"]);
    cmd.env_remove("ROLLUP_WATCH");
    cmd
}

fn init(dir: &Path) {
    let status = cargo_bin()
        .args(["init", "--cwd"])
        .arg(dir)
        .status()
        .expect("Failed to run init command");
    assert!(status.success());
}

#[test]
fn test_version() {
    let output = cargo_bin()
        .args(["version", "--json"])
        .output()
        .expect("Failed to run version command");
    assert!(output.status.success());

    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON");
    assert_eq!(json["name"], "outeria");
    assert!(json["version"].is_string());
}

#[test]
fn test_init_json_lists_files() {
    let dir = tempdir().unwrap();
    let output = cargo_bin()
        .args(["init", "--json", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run init command");
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["ok"], true);
    assert_eq!(json["created"].as_array().unwrap().len(), 4);
    assert!(dir.path().join("src/outeria.ts").is_file());
}

#[test]
#[serial]
fn test_build_json_reports_artifacts() {
    let dir = tempdir().unwrap();
    init(dir.path());

    let output = cargo_bin()
        .args(["build", "--json", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run build command");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "{stdout}");

    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["ok"], true);
    assert_eq!(json["report"]["production"], true);
    assert_eq!(json["report"]["artifacts"].as_array().unwrap().len(), 4);
    assert!(dir.path().join("dist/outeria.min.js").is_file());
}

#[test]
#[serial]
fn test_build_watch_env_disables_minify() {
    let dir = tempdir().unwrap();
    init(dir.path());

    let output = cargo_bin()
        .env("ROLLUP_WATCH", "true")
        .args(["build", "--json", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run build command");
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["report"]["production"], false);
}

#[test]
#[serial]
fn test_build_syntax_error_exits_non_zero() {
    let dir = tempdir().unwrap();
    init(dir.path());
    std::fs::write(
        dir.path().join("src/outeria.ts"),
        "export const initialize = (element: HTMLElement): void => {\n",
    )
    .unwrap();

    let output = cargo_bin()
        .args(["build", "--json", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run build command");
    assert!(!output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["code"], "BUILD_TRANSPILE_FAILED");
    assert_eq!(json["error"]["stage"], "transpile");
    assert!(json["error"]["location"]
        .as_str()
        .unwrap()
        .starts_with("src/outeria.ts:"));
    assert!(!dir.path().join("dist/outeria.min.js").exists());
}

#[test]
fn test_build_human_error_names_code() {
    let dir = tempdir().unwrap();

    let output = cargo_bin()
        .args(["build", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run build command");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("BUILD_ENTRY_NOT_FOUND"), "{stderr}");
}

#[test]
fn test_serve_announces_port_and_serves_static() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("static")).unwrap();
    std::fs::write(dir.path().join("static/index.html"), "<p>hello</p>").unwrap();

    let mut child = cargo_bin()
        .args(["serve", "--port", "0", "--cwd"])
        .arg(dir.path())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to start server");

    let mut line = String::new();
    BufReader::new(child.stdout.take().unwrap())
        .read_line(&mut line)
        .unwrap();
    let port: u16 = line
        .trim()
        .strip_prefix("App listening on port ")
        .unwrap_or_else(|| panic!("unexpected announcement: {line}"))
        .parse()
        .unwrap();

    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream
        .write_all(b"GET /index.html HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();

    child.kill().unwrap();
    let _ = child.wait();

    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains("<p>hello</p>"));
}

#[test]
fn test_serve_port_in_use_fails() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let dir = tempdir().unwrap();

    let output = cargo_bin()
        .args(["serve", "--port", &port.to_string(), "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run serve command");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(&port.to_string()), "{stderr}");
}
