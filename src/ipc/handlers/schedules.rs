use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{load_actor, require_capability, require_i64, require_str};
use crate::ipc::types::{AppState, Request};
use crate::records::{is_hh_mm, is_study_year, is_weekday, Schedule};
use crate::scope::{self, Action};
use serde_json::json;

fn handle_schedules_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let actor = match load_actor(conn, &req.params) {
        Ok(a) => a,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };

    let schedules = match db::list_schedules(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let visible = scope::visible_schedules(&schedules, &actor);
    match serde_json::to_value(&visible) {
        Ok(v) => ok(&req.id, json!({ "schedules": v })),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

fn handle_schedules_list_by_year(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let year = match require_i64(&req.params, "year") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };

    let schedules = match db::list_schedules(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let matched: Vec<&Schedule> = schedules.iter().filter(|s| s.year == year).collect();
    match serde_json::to_value(&matched) {
        Ok(v) => ok(&req.id, json!({ "schedules": v })),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

fn handle_schedules_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let actor = match load_actor(conn, &req.params) {
        Ok(a) => a,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    if let Err((code, msg)) = require_capability(&actor, Action::CreateSchedule) {
        return err(&req.id, code, msg, None);
    }

    let course_id = match require_str(&req.params, "courseId") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    let day = match require_str(&req.params, "day") {
        Ok(v) => v.to_ascii_lowercase(),
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    if !is_weekday(&day) {
        return err(&req.id, "bad_params", "day must be a weekday name", None);
    }
    let time = match require_str(&req.params, "time") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    if !is_hh_mm(&time) {
        return err(&req.id, "bad_params", "time must be HH:MM", None);
    }
    let duration = match require_i64(&req.params, "duration") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    if duration <= 0 {
        return err(&req.id, "bad_params", "duration must be positive minutes", None);
    }
    let year = match require_i64(&req.params, "year") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    if !is_study_year(year) {
        return err(&req.id, "bad_params", "year must be in 1..=7", None);
    }
    let room = match require_str(&req.params, "room") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };

    let schedule = Schedule {
        id: db::new_id(),
        course_id,
        teacher_id: actor.id.clone(),
        day,
        time,
        duration,
        year,
        room,
    };

    if let Err(e) = db::insert_schedule(conn, &schedule) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "schedules" })),
        );
    }
    match serde_json::to_value(&schedule) {
        Ok(v) => ok(&req.id, json!({ "schedule": v })),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedules.list" => Some(handle_schedules_list(state, req)),
        "schedules.listByYear" => Some(handle_schedules_list_by_year(state, req)),
        "schedules.create" => Some(handle_schedules_create(state, req)),
        _ => None,
    }
}
