use crate::auth;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::require_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// Credential check plus session persistence. The same `auth_failed` reply
/// covers unknown email and wrong password, so callers cannot enumerate
/// accounts. A failed attempt leaves any prior session untouched.
fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let email = match require_str(&req.params, "email") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    let password = match req.params.get("password").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing password", None),
    };

    let user = match db::find_user_by_email(conn, &email) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let Some(user) = user else {
        return err(&req.id, "auth_failed", "invalid credentials", None);
    };
    if !auth::verify_password(&user.password_salt, &user.password_hash, &password) {
        return err(&req.id, "auth_failed", "invalid credentials", None);
    }

    if let Err(e) = db::session_set(conn, &user.id) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    match serde_json::to_value(&user) {
        Ok(v) => ok(&req.id, json!({ "user": v })),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = db::session_clear(conn) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

/// Returns the slot's full user record, or null when no one is logged in.
/// A slot pointing at a since-deleted user reads as logged out.
fn handle_current(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let user_id = match db::session_user_id(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(user_id) = user_id else {
        return ok(&req.id, json!({ "user": null }));
    };

    match db::get_user(conn, &user_id) {
        Ok(Some(user)) => match serde_json::to_value(&user) {
            Ok(v) => ok(&req.id, json!({ "user": v })),
            Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
        },
        Ok(None) => ok(&req.id, json!({ "user": null })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.login" => Some(handle_login(state, req)),
        "session.logout" => Some(handle_logout(state, req)),
        "session.current" => Some(handle_current(state, req)),
        _ => None,
    }
}
