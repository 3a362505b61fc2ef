use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    load_actor, opt_str, require_capability, require_f64, require_i64, require_str,
};
use crate::ipc::types::{AppState, Request};
use crate::records::{is_grade_type, is_study_year, Grade};
use crate::scope::{self, Action};
use serde_json::json;

/// Every grade leaves the daemon with its derived values attached so
/// callers never re-implement the scale math.
fn grade_json(grade: &Grade) -> Result<serde_json::Value, serde_json::Error> {
    let mut v = serde_json::to_value(grade)?;
    v["percent"] = json!(grade.percent());
    v["fivePoint"] = json!(grade.five_point());
    Ok(v)
}

fn grades_json(grades: &[&Grade]) -> Result<serde_json::Value, serde_json::Error> {
    let rows = grades
        .iter()
        .copied()
        .map(grade_json)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!(rows))
}

fn handle_grades_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let actor = match load_actor(conn, &req.params) {
        Ok(a) => a,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };

    let grades = match db::list_grades(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let visible = scope::visible_grades(&grades, &actor);
    let refs: Vec<&Grade> = visible.iter().collect();
    match grades_json(&refs) {
        Ok(v) => ok(&req.id, json!({ "grades": v })),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

fn handle_grades_list_by_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match require_str(&req.params, "studentId") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };

    let grades = match db::list_grades(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let matched: Vec<&Grade> = grades
        .iter()
        .filter(|g| g.student_id == student_id)
        .collect();
    match grades_json(&matched) {
        Ok(v) => ok(&req.id, json!({ "grades": v })),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

fn handle_grades_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let actor = match load_actor(conn, &req.params) {
        Ok(a) => a,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    if let Err((code, msg)) = require_capability(&actor, Action::CreateGrade) {
        return err(&req.id, code, msg, None);
    }

    let student_id = match require_str(&req.params, "studentId") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    let course_id = match require_str(&req.params, "courseId") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    let value = match require_f64(&req.params, "value") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    let max_value = match require_f64(&req.params, "maxValue") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    // Hard invariant here, not just an input-widget hint.
    if !(value > 0.0 && value <= max_value) {
        return err(
            &req.id,
            "bad_params",
            "value must satisfy 0 < value <= maxValue",
            None,
        );
    }
    let grade_type = match require_str(&req.params, "type") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    if !is_grade_type(&grade_type) {
        return err(
            &req.id,
            "bad_params",
            "type must be one of: homework, test, exam, performance",
            None,
        );
    }
    let year = match require_i64(&req.params, "year") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    if !is_study_year(year) {
        return err(&req.id, "bad_params", "year must be in 1..=7", None);
    }

    let grade = Grade {
        id: db::new_id(),
        student_id,
        course_id,
        teacher_id: actor.id.clone(),
        value,
        max_value,
        grade_type,
        description: opt_str(&req.params, "description").unwrap_or_default(),
        date: opt_str(&req.params, "date").unwrap_or_else(db::now_rfc3339),
        year,
    };

    if let Err(e) = db::insert_grade(conn, &grade) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "grades" })),
        );
    }
    match grade_json(&grade) {
        Ok(v) => ok(&req.id, json!({ "grade": v })),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.list" => Some(handle_grades_list(state, req)),
        "grades.listByStudent" => Some(handle_grades_list_by_student(state, req)),
        "grades.create" => Some(handle_grades_create(state, req)),
        _ => None,
    }
}
