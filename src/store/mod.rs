//! One module per persisted entity. Functions take a `&Connection` so callers
//! can pass either the workspace connection or an open transaction.

pub mod academic_years;
pub mod attendance;
pub mod classes;
pub mod exams;
pub mod marks;
pub mod results;
pub mod students;
pub mod subjects;
pub mod teachers;

use chrono::{Local, NaiveDateTime};

pub const STAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

pub fn stamp(at: NaiveDateTime) -> String {
    at.format(STAMP_FORMAT).to_string()
}

pub fn now_stamp() -> String {
    stamp(now_local())
}
