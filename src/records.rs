use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
    Director,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student" => Some(Self::Student),
            "teacher" => Some(Self::Teacher),
            "admin" => Some(Self::Admin),
            "director" => Some(Self::Director),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Admin => "admin",
            Self::Director => "director",
        }
    }
}

/// Full user record. The credential columns never leave the process:
/// they are skipped on serialization, so every wire-facing user object
/// is already the public shape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_salt: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub name: String,
    pub surname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_teacher_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub name: String,
    pub department: String,
    pub year: i64,
    pub description: String,
    pub teacher_id: String,
}

/// `student_id == None` is a broadcast assignment: visible to every
/// student in the course's year.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub title: String,
    pub description: String,
    pub course_id: String,
    pub teacher_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    pub year: i64,
    pub due_date: String,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_date: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: String,
    pub student_id: String,
    pub course_id: String,
    pub teacher_id: String,
    pub value: f64,
    pub max_value: f64,
    #[serde(rename = "type")]
    pub grade_type: String,
    pub description: String,
    pub date: String,
    pub year: i64,
}

impl Grade {
    /// Whole-number percentage, rounded half away from zero.
    pub fn percent(&self) -> i64 {
        ((self.value / self.max_value) * 100.0).round() as i64
    }

    /// Contribution on the 5-point scale, one decimal.
    pub fn five_point(&self) -> f64 {
        let raw = (self.value / self.max_value) * 5.0;
        (raw * 10.0).round() / 10.0
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub course_id: String,
    pub teacher_id: String,
    pub day: String,
    pub time: String,
    pub duration: i64,
    pub year: i64,
    pub room: String,
}

pub const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

pub const GRADE_TYPES: [&str; 4] = ["homework", "test", "exam", "performance"];

pub fn is_weekday(s: &str) -> bool {
    WEEKDAYS.contains(&s)
}

pub fn is_grade_type(s: &str) -> bool {
    GRADE_TYPES.contains(&s)
}

pub fn is_study_year(year: i64) -> bool {
    (1..=7).contains(&year)
}

/// Accepts "HH:MM" with a 24-hour clock, zero-padded.
pub fn is_hh_mm(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return false;
    }
    let digits = [bytes[0], bytes[1], bytes[3], bytes[4]];
    if !digits.iter().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let hh = (bytes[0] - b'0') * 10 + (bytes[1] - b'0');
    let mm = (bytes[3] - b'0') * 10 + (bytes[4] - b'0');
    hh < 24 && mm < 60
}
