use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_registrard");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn registrard");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn result(resp: &serde_json::Value) -> &serde_json::Value {
    assert_eq!(
        resp.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "expected success, got: {}",
        resp
    );
    resp.get("result").expect("result")
}

fn error_code(resp: &serde_json::Value) -> &str {
    assert_eq!(
        resp.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "expected failure, got: {}",
        resp
    );
    resp.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .expect("error code")
}

#[test]
fn bootstrap_login_and_session_round_trip() {
    let workspace = temp_dir("registrar-session-flow");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(result(&health).get("version").is_some());

    // Session methods need a workspace first.
    let early = request(&mut stdin, &mut reader, "2", "session.current", json!({}));
    assert_eq!(error_code(&early), "no_workspace");

    let _ = request(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    // Fresh workspace, nobody logged in.
    let current = request(&mut stdin, &mut reader, "4", "session.current", json!({}));
    assert!(result(&current).get("user").expect("user").is_null());

    // Wrong password and unknown email produce the same failure.
    let bad_pw = request(
        &mut stdin,
        &mut reader,
        "5",
        "session.login",
        json!({ "email": "teacher@music-school.ru", "password": "nope" }),
    );
    assert_eq!(error_code(&bad_pw), "auth_failed");
    let bad_email = request(
        &mut stdin,
        &mut reader,
        "6",
        "session.login",
        json!({ "email": "nobody@music-school.ru", "password": "teacher123" }),
    );
    assert_eq!(error_code(&bad_email), "auth_failed");

    // A failed login leaves the (empty) session untouched.
    let still_out = request(&mut stdin, &mut reader, "7", "session.current", json!({}));
    assert!(result(&still_out).get("user").expect("user").is_null());

    let login = request(
        &mut stdin,
        &mut reader,
        "8",
        "session.login",
        json!({ "email": "teacher@music-school.ru", "password": "teacher123" }),
    );
    let user = result(&login).get("user").expect("user").clone();
    let teacher_id = user.get("id").and_then(|v| v.as_str()).expect("id").to_string();
    assert_eq!(user.get("role").and_then(|v| v.as_str()), Some("teacher"));
    // Credentials never appear on the wire.
    assert!(user.get("passwordHash").is_none());
    assert!(user.get("password").is_none());

    let current = request(&mut stdin, &mut reader, "9", "session.current", json!({}));
    assert_eq!(
        result(&current)
            .get("user")
            .and_then(|u| u.get("id"))
            .and_then(|v| v.as_str()),
        Some(teacher_id.as_str())
    );

    let _ = request(&mut stdin, &mut reader, "10", "session.logout", json!({}));
    // Logout is idempotent.
    let _ = request(&mut stdin, &mut reader, "11", "session.logout", json!({}));
    let current = request(&mut stdin, &mut reader, "12", "session.current", json!({}));
    assert!(result(&current).get("user").expect("user").is_null());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn bootstrap_seeds_demo_school_once() {
    let workspace = temp_dir("registrar-bootstrap");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let admin = request(
        &mut stdin,
        &mut reader,
        "2",
        "session.login",
        json!({ "email": "admin@music-school.ru", "password": "admin123" }),
    );
    let admin_id = result(&admin)
        .get("user")
        .and_then(|u| u.get("id"))
        .and_then(|v| v.as_str())
        .expect("admin id")
        .to_string();

    let users = request(
        &mut stdin,
        &mut reader,
        "3",
        "users.list",
        json!({ "actorId": admin_id }),
    );
    assert_eq!(
        result(&users)
            .get("users")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(4)
    );

    let departments = request(&mut stdin, &mut reader, "4", "departments.list", json!({}));
    assert_eq!(
        result(&departments)
            .get("departments")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(3)
    );

    let teacher = request(
        &mut stdin,
        &mut reader,
        "5",
        "session.login",
        json!({ "email": "teacher@music-school.ru", "password": "teacher123" }),
    );
    let teacher_id = result(&teacher)
        .get("user")
        .and_then(|u| u.get("id"))
        .and_then(|v| v.as_str())
        .expect("teacher id")
        .to_string();

    // Two courses seeded overall...
    let all_courses = request(
        &mut stdin,
        &mut reader,
        "6",
        "courses.list",
        json!({ "actorId": admin_id }),
    );
    assert_eq!(
        result(&all_courses)
            .get("courses")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(2)
    );

    // ...but the demo teacher owns exactly one of them.
    let owned = request(
        &mut stdin,
        &mut reader,
        "7",
        "courses.listByTeacher",
        json!({ "teacherId": teacher_id }),
    );
    let owned = result(&owned)
        .get("courses")
        .and_then(|v| v.as_array())
        .expect("courses")
        .clone();
    assert_eq!(owned.len(), 1);
    assert_eq!(
        owned[0].get("name").and_then(|v| v.as_str()),
        Some("Piano Performance")
    );

    drop(stdin);
    let _ = child.wait();

    // Reopen the same workspace: the seed must not run again.
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let admin = request(
        &mut stdin,
        &mut reader,
        "2",
        "session.login",
        json!({ "email": "admin@music-school.ru", "password": "admin123" }),
    );
    let admin_id = result(&admin)
        .get("user")
        .and_then(|u| u.get("id"))
        .and_then(|v| v.as_str())
        .expect("admin id")
        .to_string();
    let users = request(
        &mut stdin,
        &mut reader,
        "3",
        "users.list",
        json!({ "actorId": admin_id }),
    );
    assert_eq!(
        result(&users)
            .get("users")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(4)
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
