pub mod catalog;
pub mod core;
pub mod reports;
pub mod schedules;
pub mod setup;
pub mod timetable;
