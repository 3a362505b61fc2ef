use crate::auth;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{load_actor, opt_i64, opt_str, require_capability, require_str};
use crate::ipc::types::{AppState, Request};
use crate::records::{is_study_year, Role, User};
use crate::scope::Action;
use serde_json::json;

fn handle_users_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let actor = match load_actor(conn, &req.params) {
        Ok(a) => a,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    if let Err((code, msg)) = require_capability(&actor, Action::ListUsers) {
        return err(&req.id, code, msg, None);
    }

    let users = match db::list_users(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    match serde_json::to_value(&users) {
        Ok(v) => ok(&req.id, json!({ "users": v })),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

fn handle_users_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let user_id = match require_str(&req.params, "userId") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };

    match db::get_user(conn, &user_id) {
        Ok(Some(user)) => match serde_json::to_value(&user) {
            Ok(v) => ok(&req.id, json!({ "user": v })),
            Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
        },
        Ok(None) => err(&req.id, "not_found", "user not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_users_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let actor = match load_actor(conn, &req.params) {
        Ok(a) => a,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    if let Err((code, msg)) = require_capability(&actor, Action::CreateUser) {
        return err(&req.id, code, msg, None);
    }

    let email = match require_str(&req.params, "email") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    let password = match require_str(&req.params, "password") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    let role_raw = match require_str(&req.params, "role") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    let Some(role) = Role::parse(&role_raw) else {
        return err(
            &req.id,
            "bad_params",
            "role must be one of: student, teacher, admin, director",
            None,
        );
    };
    let name = match require_str(&req.params, "name") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    let surname = match require_str(&req.params, "surname") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };

    // Year of study is a student attribute; other roles have none.
    let year = if role == Role::Student {
        let Some(year) = opt_i64(&req.params, "year") else {
            return err(&req.id, "bad_params", "missing year for student", None);
        };
        if !is_study_year(year) {
            return err(&req.id, "bad_params", "year must be in 1..=7", None);
        }
        Some(year)
    } else {
        None
    };

    match db::find_user_by_email(conn, &email) {
        Ok(Some(_)) => return err(&req.id, "email_taken", "email already registered", None),
        Ok(None) => {}
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let salt = auth::new_salt();
    let user = User {
        id: db::new_id(),
        email,
        password_hash: auth::hash_password(&salt, &password),
        password_salt: salt,
        role,
        name,
        surname,
        year,
        department: opt_str(&req.params, "department"),
        phone: opt_str(&req.params, "phone"),
        created_at: db::now_rfc3339(),
    };

    if let Err(e) = db::insert_user(conn, &user) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "users" })),
        );
    }
    match serde_json::to_value(&user) {
        Ok(v) => ok(&req.id, json!({ "user": v })),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

/// Partial merge: only the fields present in `patch` change.
fn handle_users_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let actor = match load_actor(conn, &req.params) {
        Ok(a) => a,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    if let Err((code, msg)) = require_capability(&actor, Action::UpdateUser) {
        return err(&req.id, code, msg, None);
    }

    let user_id = match require_str(&req.params, "userId") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut user = match db::get_user(conn, &user_id) {
        Ok(Some(u)) => u,
        Ok(None) => return err(&req.id, "not_found", "user not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    for (key, value) in patch {
        match key.as_str() {
            "email" => {
                let Some(email) = value.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
                    return err(&req.id, "bad_params", "email must not be empty", None);
                };
                if email != user.email {
                    match db::find_user_by_email(conn, email) {
                        Ok(Some(_)) => {
                            return err(&req.id, "email_taken", "email already registered", None)
                        }
                        Ok(None) => {}
                        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
                    }
                }
                user.email = email.to_string();
            }
            "password" => {
                let Some(password) = value.as_str().filter(|s| !s.is_empty()) else {
                    return err(&req.id, "bad_params", "password must not be empty", None);
                };
                user.password_salt = auth::new_salt();
                user.password_hash = auth::hash_password(&user.password_salt, password);
            }
            "role" => {
                let Some(role) = value.as_str().and_then(Role::parse) else {
                    return err(&req.id, "bad_params", "unknown role", None);
                };
                user.role = role;
            }
            "name" => match value.as_str().map(str::trim).filter(|s| !s.is_empty()) {
                Some(v) => user.name = v.to_string(),
                None => return err(&req.id, "bad_params", "name must not be empty", None),
            },
            "surname" => match value.as_str().map(str::trim).filter(|s| !s.is_empty()) {
                Some(v) => user.surname = v.to_string(),
                None => return err(&req.id, "bad_params", "surname must not be empty", None),
            },
            "year" => {
                if value.is_null() {
                    user.year = None;
                } else {
                    let Some(year) = value.as_i64().filter(|y| is_study_year(*y)) else {
                        return err(&req.id, "bad_params", "year must be in 1..=7", None);
                    };
                    user.year = Some(year);
                }
            }
            "department" => {
                user.department = value.as_str().map(str::to_string).filter(|s| !s.is_empty());
            }
            "phone" => {
                user.phone = value.as_str().map(str::to_string).filter(|s| !s.is_empty());
            }
            _ => return err(&req.id, "bad_params", format!("unknown field: {}", key), None),
        }
    }

    if let Err(e) = db::update_user(conn, &user) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    match serde_json::to_value(&user) {
        Ok(v) => ok(&req.id, json!({ "user": v })),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

/// No cascade: assignments/grades keeping this id simply dangle.
fn handle_users_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let actor = match load_actor(conn, &req.params) {
        Ok(a) => a,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    if let Err((code, msg)) = require_capability(&actor, Action::DeleteUser) {
        return err(&req.id, code, msg, None);
    }

    let user_id = match require_str(&req.params, "userId") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };

    match db::delete_user(conn, &user_id) {
        Ok(true) => ok(&req.id, json!({ "ok": true })),
        Ok(false) => err(&req.id, "not_found", "user not found", None),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.list" => Some(handle_users_list(state, req)),
        "users.get" => Some(handle_users_get(state, req)),
        "users.create" => Some(handle_users_create(state, req)),
        "users.update" => Some(handle_users_update(state, req)),
        "users.delete" => Some(handle_users_delete(state, req)),
        _ => None,
    }
}
