use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    load_actor, opt_str, require_capability, require_i64, require_str,
};
use crate::ipc::types::{AppState, Request};
use crate::records::{is_study_year, Assignment};
use crate::scope::{self, Action};
use serde_json::json;

fn handle_assignments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let actor = match load_actor(conn, &req.params) {
        Ok(a) => a,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };

    let assignments = match db::list_assignments(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let visible = scope::visible_assignments(&assignments, &actor);
    match serde_json::to_value(&visible) {
        Ok(v) => ok(&req.id, json!({ "assignments": v })),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

/// Targeted rows for this student plus every broadcast row (no studentId).
fn handle_assignments_list_by_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match require_str(&req.params, "studentId") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };

    let assignments = match db::list_assignments(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let matched: Vec<&Assignment> = assignments
        .iter()
        .filter(|a| match a.student_id.as_deref() {
            Some(sid) => sid == student_id,
            None => true,
        })
        .collect();
    match serde_json::to_value(&matched) {
        Ok(v) => ok(&req.id, json!({ "assignments": v })),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

fn handle_assignments_list_by_teacher(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let teacher_id = match require_str(&req.params, "teacherId") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };

    let assignments = match db::list_assignments(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let matched: Vec<&Assignment> = assignments
        .iter()
        .filter(|a| a.teacher_id == teacher_id)
        .collect();
    match serde_json::to_value(&matched) {
        Ok(v) => ok(&req.id, json!({ "assignments": v })),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

fn handle_assignments_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let actor = match load_actor(conn, &req.params) {
        Ok(a) => a,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    if let Err((code, msg)) = require_capability(&actor, Action::CreateAssignment) {
        return err(&req.id, code, msg, None);
    }

    let title = match require_str(&req.params, "title") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    let course_id = match require_str(&req.params, "courseId") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    let due_date = match require_str(&req.params, "dueDate") {
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

    // Omitting studentId makes this a broadcast assignment for the whole
    // year. The issuing identity is always the actor.
    let assignment = Assignment {
        id: db::new_id(),
        title,
        description: opt_str(&req.params, "description").unwrap_or_default(),
        course_id,
        teacher_id: actor.id.clone(),
        student_id: opt_str(&req.params, "studentId"),
        year,
        due_date,
        completed: false,
        submission_date: None,
        created_at: db::now_rfc3339(),
    };

    if let Err(e) = db::insert_assignment(conn, &assignment) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "assignments" })),
        );
    }
    match serde_json::to_value(&assignment) {
        Ok(v) => ok(&req.id, json!({ "assignment": v })),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

/// Partial merge. Completion is a student capability; every other field is
/// staff-editable. A patch mixing both kinds is refused outright rather
/// than partially applied.
fn handle_assignments_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let actor = match load_actor(conn, &req.params) {
        Ok(a) => a,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };

    let assignment_id = match require_str(&req.params, "assignmentId") {
        Ok(v) => v,
        Err((code, msg)) => return err(&req.id, code, msg, None),
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };
    if patch.is_empty() {
        return err(&req.id, "bad_params", "patch must not be empty", None);
    }

    let touches_completed = patch.contains_key("completed");
    let touches_other = patch.keys().any(|k| k != "completed");
    if touches_completed {
        if let Err((code, msg)) = require_capability(&actor, Action::MarkAssignmentComplete) {
            return err(&req.id, code, msg, None);
        }
    }
    if touches_other {
        if let Err((code, msg)) = require_capability(&actor, Action::EditAssignment) {
            return err(&req.id, code, msg, None);
        }
    }

    let mut assignment = match db::get_assignment(conn, &assignment_id) {
        Ok(Some(a)) => a,
        Ok(None) => return err(&req.id, "not_found", "assignment not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    for (key, value) in patch {
        match key.as_str() {
            "title" => match value.as_str().map(str::trim).filter(|s| !s.is_empty()) {
                Some(v) => assignment.title = v.to_string(),
                None => return err(&req.id, "bad_params", "title must not be empty", None),
            },
            "description" => {
                assignment.description = value.as_str().unwrap_or_default().to_string();
            }
            "courseId" => match value.as_str().map(str::trim).filter(|s| !s.is_empty()) {
                Some(v) => assignment.course_id = v.to_string(),
                None => return err(&req.id, "bad_params", "courseId must not be empty", None),
            },
            "studentId" => {
                assignment.student_id =
                    value.as_str().map(str::to_string).filter(|s| !s.is_empty());
            }
            "dueDate" => match value.as_str().map(str::trim).filter(|s| !s.is_empty()) {
                Some(v) => assignment.due_date = v.to_string(),
                None => return err(&req.id, "bad_params", "dueDate must not be empty", None),
            },
            "year" => {
                let Some(year) = value.as_i64().filter(|y| is_study_year(*y)) else {
                    return err(&req.id, "bad_params", "year must be in 1..=7", None);
                };
                assignment.year = year;
            }
            "completed" => {
                let Some(completed) = value.as_bool() else {
                    return err(&req.id, "bad_params", "completed must be boolean", None);
                };
                assignment.completed = completed;
                // Marking complete stamps the submission time; clearing the
                // flag also clears the stamp so an open assignment never
                // claims a submission.
                assignment.submission_date = if completed {
                    Some(db::now_rfc3339())
                } else {
                    None
                };
            }
            _ => return err(&req.id, "bad_params", format!("unknown field: {}", key), None),
        }
    }

    if let Err(e) = db::update_assignment(conn, &assignment) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    match serde_json::to_value(&assignment) {
        Ok(v) => ok(&req.id, json!({ "assignment": v })),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assignments.list" => Some(handle_assignments_list(state, req)),
        "assignments.listByStudent" => Some(handle_assignments_list_by_student(state, req)),
        "assignments.listByTeacher" => Some(handle_assignments_list_by_teacher(state, req)),
        "assignments.create" => Some(handle_assignments_create(state, req)),
        "assignments.update" => Some(handle_assignments_update(state, req)),
        _ => None,
    }
}
