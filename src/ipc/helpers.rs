use rusqlite::Connection;
use serde_json::Value;

use crate::db;
use crate::scope::{self, Action, Actor};

/// `(code, message)` pair a handler turns into an error envelope.
pub type Failure = (&'static str, String);

pub fn require_str(params: &Value, key: &str) -> Result<String, Failure> {
    match params.get(key).and_then(|v| v.as_str()) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(_) => Err(("bad_params", format!("{} must not be empty", key))),
        None => Err(("bad_params", format!("missing {}", key))),
    }
}

pub fn opt_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn require_i64(params: &Value, key: &str) -> Result<i64, Failure> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| ("bad_params", format!("{} must be an integer", key)))
}

pub fn opt_i64(params: &Value, key: &str) -> Option<i64> {
    params.get(key).and_then(|v| v.as_i64())
}

pub fn require_f64(params: &Value, key: &str) -> Result<f64, Failure> {
    params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| ("bad_params", format!("{} must be a number", key)))
}

/// Resolve the acting identity from the explicit `actorId` parameter.
/// Repositories never consult the session slot for this; a caller that
/// wants "the logged-in user" reads `session.current` first and passes
/// the id along.
pub fn load_actor(conn: &Connection, params: &Value) -> Result<Actor, Failure> {
    let actor_id = require_str(params, "actorId")?;
    match db::get_user(conn, &actor_id) {
        Ok(Some(user)) => Ok(Actor::from_user(&user)),
        Ok(None) => Err(("not_found", "actor not found".to_string())),
        Err(e) => Err(("db_query_failed", e.to_string())),
    }
}

pub fn require_capability(actor: &Actor, action: Action) -> Result<(), Failure> {
    if scope::allows(actor.role, action) {
        Ok(())
    } else {
        Err((
            "forbidden",
            format!("role {} may not perform this operation", actor.role.as_str()),
        ))
    }
}
