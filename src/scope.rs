//! Role scoping: pure derivations over already-loaded collections.
//!
//! Nothing in here touches storage. Handlers load a collection, build an
//! [`Actor`] from the explicit `actorId` request parameter, and narrow the
//! rows before replying. Mutation rights come from one capability table so
//! every handler consults the same role mapping.

use crate::records::{Assignment, Course, Grade, Role, Schedule, User};

/// The acting identity a handler resolves from `actorId`. Repositories
/// never read ambient session state; callers pass this in explicitly.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: String,
    pub role: Role,
    pub year: Option<i64>,
}

impl Actor {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            role: user.role,
            year: user.year,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ListUsers,
    CreateUser,
    UpdateUser,
    DeleteUser,
    CreateDepartment,
    CreateCourse,
    CreateAssignment,
    EditAssignment,
    MarkAssignmentComplete,
    CreateGrade,
    CreateSchedule,
}

/// Capability table: which roles may perform which mutation (plus the
/// admin-only user listing). Enforced inside the handlers, not at the UI.
pub fn allows(role: Role, action: Action) -> bool {
    use Action::*;
    match action {
        ListUsers | CreateUser | UpdateUser | DeleteUser | CreateDepartment | CreateCourse => {
            matches!(role, Role::Admin | Role::Director)
        }
        CreateAssignment | EditAssignment | CreateSchedule | CreateGrade => {
            matches!(role, Role::Teacher | Role::Admin)
        }
        MarkAssignmentComplete => matches!(role, Role::Student),
    }
}

/// Student: own + broadcast. Teacher: own. Admin/director: everything.
pub fn visible_assignments(all: &[Assignment], actor: &Actor) -> Vec<Assignment> {
    match actor.role {
        Role::Student => all
            .iter()
            .filter(|a| match a.student_id.as_deref() {
                Some(sid) => sid == actor.id,
                None => true,
            })
            .cloned()
            .collect(),
        Role::Teacher => all
            .iter()
            .filter(|a| a.teacher_id == actor.id)
            .cloned()
            .collect(),
        Role::Admin | Role::Director => all.to_vec(),
    }
}

/// Student: only their own rows. Teachers read unfiltered (they need the
/// whole ledger to grade across courses); admin/director too.
pub fn visible_grades(all: &[Grade], actor: &Actor) -> Vec<Grade> {
    match actor.role {
        Role::Student => all
            .iter()
            .filter(|g| g.student_id == actor.id)
            .cloned()
            .collect(),
        Role::Teacher | Role::Admin | Role::Director => all.to_vec(),
    }
}

/// Student: the enrolled year (a student without a year sees nothing).
pub fn visible_courses(all: &[Course], actor: &Actor) -> Vec<Course> {
    match actor.role {
        Role::Student => match actor.year {
            Some(year) => all.iter().filter(|c| c.year == year).cloned().collect(),
            None => Vec::new(),
        },
        Role::Teacher => all
            .iter()
            .filter(|c| c.teacher_id == actor.id)
            .cloned()
            .collect(),
        Role::Admin | Role::Director => all.to_vec(),
    }
}

pub fn visible_schedules(all: &[Schedule], actor: &Actor) -> Vec<Schedule> {
    match actor.role {
        Role::Student => match actor.year {
            Some(year) => all.iter().filter(|s| s.year == year).cloned().collect(),
            None => Vec::new(),
        },
        Role::Teacher => all
            .iter()
            .filter(|s| s.teacher_id == actor.id)
            .cloned()
            .collect(),
        Role::Admin | Role::Director => all.to_vec(),
    }
}
