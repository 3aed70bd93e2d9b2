pub mod bugs;
pub mod projects;
pub mod users;
