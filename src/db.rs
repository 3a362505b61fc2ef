use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use uuid::Uuid;

use crate::auth;
use crate::records::{Assignment, Course, Department, Grade, Role, Schedule, User};

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("registrar.sqlite3");
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_salt TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL,
            name TEXT NOT NULL,
            surname TEXT NOT NULL,
            year INTEGER,
            department TEXT,
            phone TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS departments(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            head_teacher_id TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            department TEXT NOT NULL,
            year INTEGER NOT NULL,
            description TEXT NOT NULL,
            teacher_id TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_teacher ON courses(teacher_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_year ON courses(year)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignments(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            course_id TEXT NOT NULL,
            teacher_id TEXT NOT NULL,
            student_id TEXT,
            year INTEGER NOT NULL,
            due_date TEXT NOT NULL,
            completed INTEGER NOT NULL,
            submission_date TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_teacher ON assignments(teacher_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_student ON assignments(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            teacher_id TEXT NOT NULL,
            value REAL NOT NULL,
            max_value REAL NOT NULL,
            grade_type TEXT NOT NULL,
            description TEXT NOT NULL,
            date TEXT NOT NULL,
            year INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_student ON grades(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schedules(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            teacher_id TEXT NOT NULL,
            day TEXT NOT NULL,
            time TEXT NOT NULL,
            duration INTEGER NOT NULL,
            year INTEGER NOT NULL,
            room TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schedules_year ON schedules(year)",
        [],
    )?;

    // Single-slot current session; slot is forced to 0 so there is at
    // most one row.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS session(
            slot INTEGER PRIMARY KEY CHECK(slot = 0),
            user_id TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS meta(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    bootstrap_demo_data(&conn)?;

    Ok(conn)
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn meta_get(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM meta WHERE key = ?", [key], |r| r.get(0))
        .optional()?;
    Ok(value)
}

pub fn meta_set(conn: &Connection, key: &str, value: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO meta(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, value),
    )?;
    Ok(())
}

/// Seed one demo user per role, three departments, and two courses the
/// first time a workspace is opened. The guard is a meta flag, so the seed
/// runs at most once per storage lifetime even if the collections are later
/// emptied by hand.
fn bootstrap_demo_data(conn: &Connection) -> anyhow::Result<()> {
    if meta_get(conn, "bootstrapped")?.is_some() {
        return Ok(());
    }

    let tx = conn.unchecked_transaction()?;
    let now = now_rfc3339();

    let director_id = new_id();
    let admin_id = new_id();
    let teacher_id = new_id();
    let student_id = new_id();

    let seed_users: [(&str, &str, &str, Role, &str, &str, Option<i64>, Option<&str>, &str); 4] = [
        (
            director_id.as_str(),
            "director@music-school.ru",
            "director123",
            Role::Director,
            "Anna",
            "Petrova",
            None,
            None,
            "+7 (999) 123-45-67",
        ),
        (
            admin_id.as_str(),
            "admin@music-school.ru",
            "admin123",
            Role::Admin,
            "Mikhail",
            "Sidorov",
            None,
            None,
            "+7 (999) 234-56-78",
        ),
        (
            teacher_id.as_str(),
            "teacher@music-school.ru",
            "teacher123",
            Role::Teacher,
            "Elena",
            "Ivanova",
            None,
            Some("piano"),
            "+7 (999) 345-67-89",
        ),
        (
            student_id.as_str(),
            "student@music-school.ru",
            "student123",
            Role::Student,
            "Dmitry",
            "Kozlov",
            Some(3),
            Some("piano"),
            "+7 (999) 456-78-90",
        ),
    ];

    for (id, email, password, role, name, surname, year, department, phone) in seed_users {
        let salt = auth::new_salt();
        let hash = auth::hash_password(&salt, password);
        tx.execute(
            "INSERT INTO users(id, email, password_salt, password_hash, role, name, surname,
                               year, department, phone, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                id,
                email,
                &salt,
                &hash,
                role.as_str(),
                name,
                surname,
                year,
                department,
                phone,
                &now,
            ),
        )?;
    }

    let seed_departments: [(&str, &str, Option<&str>); 3] = [
        ("Piano", "Piano department", Some(teacher_id.as_str())),
        ("Winds", "Wind instruments department", None),
        ("Percussion", "Percussion instruments department", None),
    ];
    for (name, description, head_teacher_id) in seed_departments {
        tx.execute(
            "INSERT INTO departments(id, name, description, head_teacher_id) VALUES(?, ?, ?, ?)",
            (new_id(), name, description, head_teacher_id),
        )?;
    }

    // The solfeggio course belongs to the director so the demo teacher owns
    // exactly one course out of the box.
    let seed_courses: [(&str, &str, i64, &str, &str); 2] = [
        (
            "Piano Performance",
            "piano",
            3,
            "Core piano performance course for year 3",
            teacher_id.as_str(),
        ),
        (
            "Solfeggio",
            "theory",
            3,
            "Music theory and solfeggio course",
            director_id.as_str(),
        ),
    ];
    for (name, department, year, description, owner) in seed_courses {
        tx.execute(
            "INSERT INTO courses(id, name, department, year, description, teacher_id)
             VALUES(?, ?, ?, ?, ?, ?)",
            (new_id(), name, department, year, description, owner),
        )?;
    }

    meta_set(&tx, "bootstrapped", &now)?;
    tx.commit()?;
    Ok(())
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let role_raw: String = row.get(4)?;
    let role = Role::parse(&role_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown role: {}", role_raw).into(),
        )
    })?;
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_salt: row.get(2)?,
        password_hash: row.get(3)?,
        role,
        name: row.get(5)?,
        surname: row.get(6)?,
        year: row.get(7)?,
        department: row.get(8)?,
        phone: row.get(9)?,
        created_at: row.get(10)?,
    })
}

const USER_COLUMNS: &str = "id, email, password_salt, password_hash, role, name, surname,
                            year, department, phone, created_at";

pub fn list_users(conn: &Connection) -> anyhow::Result<Vec<User>> {
    let sql = format!("SELECT {} FROM users ORDER BY rowid", USER_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_user(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    let user = conn.query_row(&sql, [id], user_from_row).optional()?;
    Ok(user)
}

pub fn find_user_by_email(conn: &Connection, email: &str) -> anyhow::Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
    let user = conn.query_row(&sql, [email], user_from_row).optional()?;
    Ok(user)
}

pub fn insert_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users(id, email, password_salt, password_hash, role, name, surname,
                           year, department, phone, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &user.id,
            &user.email,
            &user.password_salt,
            &user.password_hash,
            user.role.as_str(),
            &user.name,
            &user.surname,
            user.year,
            &user.department,
            &user.phone,
            &user.created_at,
        ),
    )?;
    Ok(())
}

pub fn update_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE users SET email = ?, password_salt = ?, password_hash = ?, role = ?,
                          name = ?, surname = ?, year = ?, department = ?, phone = ?
         WHERE id = ?",
        (
            &user.email,
            &user.password_salt,
            &user.password_hash,
            user.role.as_str(),
            &user.name,
            &user.surname,
            user.year,
            &user.department,
            &user.phone,
            &user.id,
        ),
    )?;
    Ok(())
}

/// The only physical delete in the system. Dependent teacherId/studentId
/// references are left dangling on purpose.
pub fn delete_user(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let affected = conn.execute("DELETE FROM users WHERE id = ?", [id])?;
    Ok(affected > 0)
}

pub fn session_set(conn: &Connection, user_id: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO session(slot, user_id) VALUES(0, ?)
         ON CONFLICT(slot) DO UPDATE SET user_id = excluded.user_id",
        [user_id],
    )?;
    Ok(())
}

pub fn session_clear(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("DELETE FROM session WHERE slot = 0", [])?;
    Ok(())
}

pub fn session_user_id(conn: &Connection) -> anyhow::Result<Option<String>> {
    let id = conn
        .query_row("SELECT user_id FROM session WHERE slot = 0", [], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(id)
}

fn department_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Department> {
    Ok(Department {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        head_teacher_id: row.get(3)?,
    })
}

pub fn list_departments(conn: &Connection) -> anyhow::Result<Vec<Department>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, head_teacher_id FROM departments ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([], department_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn insert_department(conn: &Connection, department: &Department) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO departments(id, name, description, head_teacher_id) VALUES(?, ?, ?, ?)",
        (
            &department.id,
            &department.name,
            &department.description,
            &department.head_teacher_id,
        ),
    )?;
    Ok(())
}

fn course_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: row.get(0)?,
        name: row.get(1)?,
        department: row.get(2)?,
        year: row.get(3)?,
        description: row.get(4)?,
        teacher_id: row.get(5)?,
    })
}

pub fn list_courses(conn: &Connection) -> anyhow::Result<Vec<Course>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, department, year, description, teacher_id FROM courses ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([], course_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn insert_course(conn: &Connection, course: &Course) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO courses(id, name, department, year, description, teacher_id)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &course.id,
            &course.name,
            &course.department,
            course.year,
            &course.description,
            &course.teacher_id,
        ),
    )?;
    Ok(())
}

fn assignment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        course_id: row.get(3)?,
        teacher_id: row.get(4)?,
        student_id: row.get(5)?,
        year: row.get(6)?,
        due_date: row.get(7)?,
        completed: row.get(8)?,
        submission_date: row.get(9)?,
        created_at: row.get(10)?,
    })
}

const ASSIGNMENT_COLUMNS: &str = "id, title, description, course_id, teacher_id, student_id,
                                  year, due_date, completed, submission_date, created_at";

pub fn list_assignments(conn: &Connection) -> anyhow::Result<Vec<Assignment>> {
    let sql = format!(
        "SELECT {} FROM assignments ORDER BY rowid",
        ASSIGNMENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], assignment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_assignment(conn: &Connection, id: &str) -> anyhow::Result<Option<Assignment>> {
    let sql = format!("SELECT {} FROM assignments WHERE id = ?", ASSIGNMENT_COLUMNS);
    let assignment = conn.query_row(&sql, [id], assignment_from_row).optional()?;
    Ok(assignment)
}

pub fn insert_assignment(conn: &Connection, assignment: &Assignment) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO assignments(id, title, description, course_id, teacher_id, student_id,
                                 year, due_date, completed, submission_date, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &assignment.id,
            &assignment.title,
            &assignment.description,
            &assignment.course_id,
            &assignment.teacher_id,
            &assignment.student_id,
            assignment.year,
            &assignment.due_date,
            assignment.completed,
            &assignment.submission_date,
            &assignment.created_at,
        ),
    )?;
    Ok(())
}

pub fn update_assignment(conn: &Connection, assignment: &Assignment) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE assignments SET title = ?, description = ?, course_id = ?, teacher_id = ?,
                                student_id = ?, year = ?, due_date = ?, completed = ?,
                                submission_date = ?
         WHERE id = ?",
        (
            &assignment.title,
            &assignment.description,
            &assignment.course_id,
            &assignment.teacher_id,
            &assignment.student_id,
            assignment.year,
            &assignment.due_date,
            assignment.completed,
            &assignment.submission_date,
            &assignment.id,
        ),
    )?;
    Ok(())
}

fn grade_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Grade> {
    Ok(Grade {
        id: row.get(0)?,
        student_id: row.get(1)?,
        course_id: row.get(2)?,
        teacher_id: row.get(3)?,
        value: row.get(4)?,
        max_value: row.get(5)?,
        grade_type: row.get(6)?,
        description: row.get(7)?,
        date: row.get(8)?,
        year: row.get(9)?,
    })
}

pub fn list_grades(conn: &Connection) -> anyhow::Result<Vec<Grade>> {
    let mut stmt = conn.prepare(
        "SELECT id, student_id, course_id, teacher_id, value, max_value, grade_type,
                description, date, year
         FROM grades ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([], grade_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn insert_grade(conn: &Connection, grade: &Grade) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO grades(id, student_id, course_id, teacher_id, value, max_value,
                            grade_type, description, date, year)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &grade.id,
            &grade.student_id,
            &grade.course_id,
            &grade.teacher_id,
            grade.value,
            grade.max_value,
            &grade.grade_type,
            &grade.description,
            &grade.date,
            grade.year,
        ),
    )?;
    Ok(())
}

fn schedule_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Schedule> {
    Ok(Schedule {
        id: row.get(0)?,
        course_id: row.get(1)?,
        teacher_id: row.get(2)?,
        day: row.get(3)?,
        time: row.get(4)?,
        duration: row.get(5)?,
        year: row.get(6)?,
        room: row.get(7)?,
    })
}

pub fn list_schedules(conn: &Connection) -> anyhow::Result<Vec<Schedule>> {
    let mut stmt = conn.prepare(
        "SELECT id, course_id, teacher_id, day, time, duration, year, room
         FROM schedules ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([], schedule_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn insert_schedule(conn: &Connection, schedule: &Schedule) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO schedules(id, course_id, teacher_id, day, time, duration, year, room)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &schedule.id,
            &schedule.course_id,
            &schedule.teacher_id,
            &schedule.day,
            &schedule.time,
            schedule.duration,
            schedule.year,
            &schedule.room,
        ),
    )?;
    Ok(())
}
