use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    load_actor, opt_str, require_capability, require_i64, require_str,
};
use crate::ipc::types::{AppState, Request};
use crate::records::{is_study_year, Course};
use crate::scope::{self, Action};
use serde_json::json;

/// Role-scoped listing: students see their year, teachers their own
/// courses, admin/director everything.
fn handle_courses_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let actor = match load_actor(conn, &req.params) {
        Ok(a) => a,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };

    let courses = match db::list_courses(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let visible = scope::visible_courses(&courses, &actor);
    match serde_json::to_value(&visible) {
        Ok(v) => ok(&req.id, json!({ "courses": v })),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

fn handle_courses_list_by_year(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let year = match require_i64(&req.params, "year") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };

    let courses = match db::list_courses(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let matched: Vec<&Course> = courses.iter().filter(|c| c.year == year).collect();
    match serde_json::to_value(&matched) {
        Ok(v) => ok(&req.id, json!({ "courses": v })),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

fn handle_courses_list_by_teacher(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let teacher_id = match require_str(&req.params, "teacherId") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };

    let courses = match db::list_courses(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let matched: Vec<&Course> = courses
        .iter()
        .filter(|c| c.teacher_id == teacher_id)
        .collect();
    match serde_json::to_value(&matched) {
        Ok(v) => ok(&req.id, json!({ "courses": v })),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

fn handle_courses_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let actor = match load_actor(conn, &req.params) {
        Ok(a) => a,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    if let Err((code, msg)) = require_capability(&actor, Action::CreateCourse) {
        return err(&req.id, code, msg, None);
    }

    let name = match require_str(&req.params, "name") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    let department = match require_str(&req.params, "department") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    // teacherId is required but not checked against the users collection.
    let teacher_id = match require_str(&req.params, "teacherId") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    let year = match require_i64(&req.params, "year") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    if !is_study_year(year) {
        return err(&req.id, "bad_params", "year must be in 1..=7", None);
    }

    let course = Course {
        id: db::new_id(),
        name,
        department,
        year,
        description: opt_str(&req.params, "description").unwrap_or_default(),
        teacher_id,
    };

    if let Err(e) = db::insert_course(conn, &course) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "courses" })),
        );
    }
    match serde_json::to_value(&course) {
        Ok(v) => ok(&req.id, json!({ "course": v })),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.list" => Some(handle_courses_list(state, req)),
        "courses.listByYear" => Some(handle_courses_list_by_year(state, req)),
        "courses.listByTeacher" => Some(handle_courses_list_by_teacher(state, req)),
        "courses.create" => Some(handle_courses_create(state, req)),
        _ => None,
    }
}
