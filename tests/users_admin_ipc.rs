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

fn login(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    email: &str,
    password: &str,
) -> String {
    let resp = request(
        stdin,
        reader,
        id,
        "session.login",
        json!({ "email": email, "password": password }),
    );
    result(&resp)
        .get("user")
        .and_then(|u| u.get("id"))
        .and_then(|v| v.as_str())
        .expect("user id")
        .to_string()
}

#[test]
fn user_creation_enforces_email_uniqueness_and_fields() {
    let workspace = temp_dir("registrar-users-create");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let admin_id = login(&mut stdin, &mut reader, "2", "admin@music-school.ru", "admin123");

    let created = request(
        &mut stdin,
        &mut reader,
        "3",
        "users.create",
        json!({
            "actorId": admin_id,
            "email": "new.student@music-school.ru",
            "password": "pw12345",
            "role": "student",
            "name": "Olga",
            "surname": "Smirnova",
            "year": 2,
            "department": "winds"
        }),
    );
    let new_user = result(&created).get("user").expect("user");
    assert_eq!(new_user.get("year").and_then(|v| v.as_i64()), Some(2));
    assert!(new_user.get("createdAt").and_then(|v| v.as_str()).is_some());

    // Same email again is rejected, different email is fine.
    let dup = request(
        &mut stdin,
        &mut reader,
        "4",
        "users.create",
        json!({
            "actorId": admin_id,
            "email": "new.student@music-school.ru",
            "password": "other",
            "role": "student",
            "name": "Igor",
            "surname": "Smirnov",
            "year": 2
        }),
    );
    assert_eq!(error_code(&dup), "email_taken");
    let distinct = request(
        &mut stdin,
        &mut reader,
        "5",
        "users.create",
        json!({
            "actorId": admin_id,
            "email": "igor.smirnov@music-school.ru",
            "password": "other",
            "role": "student",
            "name": "Igor",
            "surname": "Smirnov",
            "year": 2
        }),
    );
    let _ = result(&distinct);

    // Required fields and student year bounds.
    let missing = request(
        &mut stdin,
        &mut reader,
        "6",
        "users.create",
        json!({
            "actorId": admin_id,
            "email": "incomplete@music-school.ru",
            "password": "pw",
            "role": "teacher",
            "name": "NoSurname"
        }),
    );
    assert_eq!(error_code(&missing), "bad_params");
    let bad_year = request(
        &mut stdin,
        &mut reader,
        "7",
        "users.create",
        json!({
            "actorId": admin_id,
            "email": "year8@music-school.ru",
            "password": "pw",
            "role": "student",
            "name": "Too",
            "surname": "Old",
            "year": 8
        }),
    );
    assert_eq!(error_code(&bad_year), "bad_params");

    // New accounts can log in with their hashed credential.
    let _ = login(
        &mut stdin,
        &mut reader,
        "8",
        "new.student@music-school.ru",
        "pw12345",
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn user_listing_and_creation_are_admin_capabilities() {
    let workspace = temp_dir("registrar-users-caps");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let teacher_id = login(
        &mut stdin,
        &mut reader,
        "2",
        "teacher@music-school.ru",
        "teacher123",
    );
    let student_id = login(
        &mut stdin,
        &mut reader,
        "3",
        "student@music-school.ru",
        "student123",
    );
    let director_id = login(
        &mut stdin,
        &mut reader,
        "4",
        "director@music-school.ru",
        "director123",
    );

    for (rid, actor) in [("5", &teacher_id), ("6", &student_id)] {
        let listed = request(
            &mut stdin,
            &mut reader,
            rid,
            "users.list",
            json!({ "actorId": actor }),
        );
        assert_eq!(error_code(&listed), "forbidden");
    }

    let refused = request(
        &mut stdin,
        &mut reader,
        "7",
        "users.create",
        json!({
            "actorId": teacher_id,
            "email": "x@music-school.ru",
            "password": "pw",
            "role": "student",
            "name": "A",
            "surname": "B",
            "year": 1
        }),
    );
    assert_eq!(error_code(&refused), "forbidden");

    // Director carries the same administrative rights as admin.
    let listed = request(
        &mut stdin,
        &mut reader,
        "8",
        "users.list",
        json!({ "actorId": director_id }),
    );
    assert_eq!(
        result(&listed)
            .get("users")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(4)
    );

    // users.get is open to any caller that holds an id.
    let fetched = request(
        &mut stdin,
        &mut reader,
        "9",
        "users.get",
        json!({ "userId": teacher_id }),
    );
    assert_eq!(
        result(&fetched)
            .get("user")
            .and_then(|u| u.get("role"))
            .and_then(|v| v.as_str()),
        Some("teacher")
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn user_update_merges_and_delete_is_final() {
    let workspace = temp_dir("registrar-users-update");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let admin_id = login(&mut stdin, &mut reader, "2", "admin@music-school.ru", "admin123");

    let created = request(
        &mut stdin,
        &mut reader,
        "3",
        "users.create",
        json!({
            "actorId": admin_id,
            "email": "temp@music-school.ru",
            "password": "first",
            "role": "teacher",
            "name": "Temp",
            "surname": "Teacher"
        }),
    );
    let user_id = result(&created)
        .get("user")
        .and_then(|u| u.get("id"))
        .and_then(|v| v.as_str())
        .expect("id")
        .to_string();

    // Partial merge: only patched fields change.
    let updated = request(
        &mut stdin,
        &mut reader,
        "4",
        "users.update",
        json!({
            "actorId": admin_id,
            "userId": user_id,
            "patch": { "phone": "+7 (999) 000-00-00", "password": "second" }
        }),
    );
    let user = result(&updated).get("user").expect("user");
    assert_eq!(user.get("name").and_then(|v| v.as_str()), Some("Temp"));
    assert_eq!(
        user.get("phone").and_then(|v| v.as_str()),
        Some("+7 (999) 000-00-00")
    );

    // Old password is dead, new one works.
    let stale = request(
        &mut stdin,
        &mut reader,
        "5",
        "session.login",
        json!({ "email": "temp@music-school.ru", "password": "first" }),
    );
    assert_eq!(error_code(&stale), "auth_failed");
    let _ = login(&mut stdin, &mut reader, "6", "temp@music-school.ru", "second");

    let missing = request(
        &mut stdin,
        &mut reader,
        "7",
        "users.update",
        json!({ "actorId": admin_id, "userId": "no-such-id", "patch": { "name": "X" } }),
    );
    assert_eq!(error_code(&missing), "not_found");

    let deleted = request(
        &mut stdin,
        &mut reader,
        "8",
        "users.delete",
        json!({ "actorId": admin_id, "userId": user_id }),
    );
    let _ = result(&deleted);
    let again = request(
        &mut stdin,
        &mut reader,
        "9",
        "users.delete",
        json!({ "actorId": admin_id, "userId": user_id }),
    );
    assert_eq!(error_code(&again), "not_found");
    let gone = request(
        &mut stdin,
        &mut reader,
        "10",
        "session.login",
        json!({ "email": "temp@music-school.ru", "password": "second" }),
    );
    assert_eq!(error_code(&gone), "auth_failed");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
