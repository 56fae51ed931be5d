use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::process::Command;
use std::thread;
use tempfile::TempDir;

const MANGA_BODY: &str = r#"{
    "id": 42,
    "title": "Test Manga",
    "episodes": [
        { "number": 1, "pages": [
            { "image": "https://cdn.example/1.jpg", "translation": "wesh" },
            { "image": "https://cdn.example/2.jpg" },
            { "image": "003.jpg" }
        ] },
        { "number": 2, "pages": [] }
    ]
}"#;

fn read_request_path(stream: TcpStream) -> (TcpStream, String) {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).unwrap();
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).unwrap();
        if header == "\r\n" || header.is_empty() {
            break;
        }
    }
    let path = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or_default()
        .to_string();
    (reader.into_inner(), path)
}

fn write_json_response(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).unwrap();
    stream.flush().unwrap();
}

const CATALOG_BODY: &str = r#"[
    { "id": 42, "title": "Test Manga", "episodes": [ { "number": 1 } ] },
    { "id": "bare", "title": "Bare", "arabic_title": "عاري" }
]"#;

/// Serves manga 42, the catalog and a search for "test"; answers 404 to
/// everything else. Returns the base URL.
fn spawn_backend() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            let (mut stream, path) = read_request_path(stream);
            if path == "/api/manga/42" {
                write_json_response(&mut stream, "200 OK", MANGA_BODY);
            } else if path == "/api/manga" {
                write_json_response(&mut stream, "200 OK", CATALOG_BODY);
            } else if path == "/api/search?q=test" {
                let body = format!(r#"{{ "results": [{MANGA_BODY}] }}"#);
                write_json_response(&mut stream, "200 OK", &body);
            } else if path.starts_with("/api/search") {
                write_json_response(&mut stream, "200 OK", r#"{ "results": [] }"#);
            } else {
                write_json_response(&mut stream, "404 Not Found", "{}");
            }
        }
    });
    format!("http://{addr}")
}

fn biderja(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("biderja").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home)
        .env("HOME", config_home)
        .env_remove("USERPROFILE");
    cmd
}

#[test]
fn test_help_flag() {
    let home = TempDir::new().unwrap();
    biderja(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--direction"))
        .stdout(predicate::str::contains("ADDRESS"));
}

#[test]
fn test_version_flag() {
    let home = TempDir::new().unwrap();
    biderja(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_unknown_direction_is_rejected() {
    let home = TempDir::new().unwrap();
    biderja(home.path())
        .args(["--direction", "up", "--dump"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown direction"));
}

#[test]
fn test_history_flag_with_empty_library() {
    let home = TempDir::new().unwrap();
    biderja(home.path())
        .arg("-r")
        .assert()
        .success()
        .stdout(predicate::str::contains("No reading history"));
    // The default configuration is written on first start.
    assert!(home.path().join("biderja").join("configuration.json").exists());
}

#[test]
fn test_dump_pads_odd_episode_for_rtl() {
    let home = TempDir::new().unwrap();
    let backend = spawn_backend();
    let output = biderja(home.path())
        .args(["--dump", "--api-url", &format!("{backend}/api"), "manga=42&chapter=1"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Test Manga - chapter 1 (rtl, 4 slots)"));
    let blank = stdout.find("(blank)").unwrap();
    let first = stdout.find("https://cdn.example/1.jpg").unwrap();
    assert!(blank < first);
    assert!(stdout.contains("wesh"));
}

#[test]
fn test_dump_ltr_with_config_file_storage() {
    let home = TempDir::new().unwrap();
    let backend = spawn_backend();
    let config_path = home.path().join("custom.json");
    std::fs::write(
        &config_path,
        format!(
            r#"{{ "Setting": {{ "api_base_url": "{backend}/api", "storage_base_url": "{backend}/storage" }} }}"#
        ),
    )
    .unwrap();

    let output = biderja(home.path())
        .arg("--dump")
        .arg("-c")
        .arg(&config_path)
        .args(["--direction", "ltr", "--manga", "42"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("(ltr, 4 slots)"));
    assert!(stdout.contains(&format!("{backend}/storage/42/1/003.jpg")));
    let stored = stdout.find("003.jpg").unwrap();
    let blank = stdout.find("(blank)").unwrap();
    assert!(stored < blank);
}

#[test]
fn test_dump_unknown_manga_fails() {
    let home = TempDir::new().unwrap();
    let backend = spawn_backend();
    biderja(home.path())
        .args(["--dump", "--api-url", &format!("{backend}/api"), "--manga", "7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("manga '7' not found"));
}

#[test]
fn test_dump_unknown_chapter_fails() {
    let home = TempDir::new().unwrap();
    let backend = spawn_backend();
    biderja(home.path())
        .args([
            "--dump",
            "--api-url",
            &format!("{backend}/api"),
            "biderja://reader/?manga=42&chapter=9",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("episode 9 of manga '42' not found"));
}

#[test]
fn test_list_prints_catalog() {
    let home = TempDir::new().unwrap();
    let backend = spawn_backend();
    biderja(home.path())
        .args(["--list", "--api-url", &format!("{backend}/api")])
        .assert()
        .success()
        .stdout(predicate::str::contains("Test Manga (1 chapters)"))
        .stdout(predicate::str::contains("عاري"));
}

#[test]
fn test_search_prints_matches() {
    let home = TempDir::new().unwrap();
    let backend = spawn_backend();
    let api = format!("{backend}/api");
    biderja(home.path())
        .args(["--search", "test", "--api-url", &api])
        .assert()
        .success()
        .stdout(predicate::str::contains("42  Test Manga (2 chapters)"));
    biderja(home.path())
        .args(["--search", "nothing", "--api-url", &api])
        .assert()
        .success()
        .stdout(predicate::str::contains("No manga found"));
}

#[test]
fn test_dump_without_manga_or_history_fails() {
    let home = TempDir::new().unwrap();
    biderja(home.path())
        .arg("--dump")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no manga given"));
}
