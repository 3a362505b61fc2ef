pub mod assignments;
pub mod core;
pub mod courses;
pub mod departments;
pub mod grades;
pub mod schedules;
pub mod session;
pub mod users;
