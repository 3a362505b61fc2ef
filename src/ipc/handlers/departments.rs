use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{load_actor, opt_str, require_capability, require_str};
use crate::ipc::types::{AppState, Request};
use crate::records::Department;
use crate::scope::Action;
use serde_json::json;

fn handle_departments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let departments = match db::list_departments(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    match serde_json::to_value(&departments) {
        Ok(v) => ok(&req.id, json!({ "departments": v })),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

fn handle_departments_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let actor = match load_actor(conn, &req.params) {
        Ok(a) => a,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    if let Err((code, msg)) = require_capability(&actor, Action::CreateDepartment) {
        return err(&req.id, code, msg, None);
    }

    let name = match require_str(&req.params, "name") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };

    // headTeacherId is advisory: it is not checked against the users
    // collection, matching the other foreign keys in the system.
    let department = Department {
        id: db::new_id(),
        name,
        description: opt_str(&req.params, "description").unwrap_or_default(),
        head_teacher_id: opt_str(&req.params, "headTeacherId"),
    };

    if let Err(e) = db::insert_department(conn, &department) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "departments" })),
        );
    }
    match serde_json::to_value(&department) {
        Ok(v) => ok(&req.id, json!({ "department": v })),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "departments.list" => Some(handle_departments_list(state, req)),
        "departments.create" => Some(handle_departments_create(state, req)),
        _ => None,
    }
}
