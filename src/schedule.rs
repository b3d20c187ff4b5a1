use crate::workflow::ExamType;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

pub const ROOM_POOL: [&str; 6] = [
    "Room 101",
    "Room 102",
    "Room 103",
    "Room 201",
    "Room 202",
    "Main Hall",
];
pub const TIME_SLOTS: [&str; 4] = ["08:00", "10:30", "13:00", "15:30"];
pub const DEFAULT_DURATION: &str = "2 hours";
pub const MAX_DURATION_HOURS: f64 = 24.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("select at least one subject")]
    NoSubjects,
    #[error("subject listed twice: {0}")]
    DuplicateSubject(String),
    #[error("unknown exam type: {0}")]
    BadExamType(String),
    #[error("date must be YYYY-MM-DD: {0}")]
    BadDate(String),
    #[error("time must be HH:MM: {0}")]
    BadTime(String),
    #[error("override names a subject that is not being scheduled: {0}")]
    UnknownOverride(String),
    #[error("cannot read duration: {0}")]
    BadDuration(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubjectOverride {
    pub room: Option<String>,
    pub start_time: Option<String>,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRequest {
    pub exam_name: String,
    pub exam_type: String,
    pub class_name: String,
    pub subjects: Vec<String>,
    pub date: String,
    pub overrides: HashMap<String, SubjectOverride>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedExam {
    pub subject: String,
    pub room: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub duration: String,
    pub duration_hours: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExamPlan {
    pub exam_name: String,
    pub exam_type: ExamType,
    pub class_name: String,
    pub exams: Vec<PlannedExam>,
}

/// Reads "2 hours", "1.5 hours", "90 minutes" or a bare number of hours.
pub fn parse_duration_hours(raw: &str) -> Result<f64, ScheduleError> {
    let t = raw.trim();
    let split = t
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(t.len());
    let (num, unit) = t.split_at(split);
    let value: f64 = num
        .parse()
        .map_err(|_| ScheduleError::BadDuration(raw.to_string()))?;
    let unit = unit.trim().to_ascii_lowercase();
    let hours = if unit.starts_with("min") {
        value / 60.0
    } else if unit.is_empty() || unit.starts_with('h') {
        value
    } else {
        return Err(ScheduleError::BadDuration(raw.to_string()));
    };
    if !hours.is_finite() || hours <= 0.0 || hours > MAX_DURATION_HOURS {
        return Err(ScheduleError::BadDuration(raw.to_string()));
    }
    Ok(hours)
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, ScheduleError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ScheduleError::BadDate(raw.to_string()))
}

pub fn parse_time(raw: &str) -> Result<NaiveTime, ScheduleError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| ScheduleError::BadTime(raw.to_string()))
}

fn duration_of(hours: f64) -> Option<TimeDelta> {
    if !hours.is_finite() {
        return None;
    }
    TimeDelta::try_minutes((hours * 60.0).round() as i64)
}

/// `None` when the end does not fit in a calendar date-time.
pub fn exam_end(date: NaiveDate, start: NaiveTime, hours: f64) -> Option<NaiveDateTime> {
    date.and_time(start).checked_add_signed(duration_of(hours)?)
}

fn override_value(v: Option<&String>) -> Option<String> {
    v.map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Room, slot and duration for one subject: explicit override first, then the
/// round-robin pools indexed by the subject's position in the selection.
pub fn plan_subject(
    index: usize,
    subject: &str,
    date: NaiveDate,
    ov: Option<&SubjectOverride>,
) -> Result<PlannedExam, ScheduleError> {
    let room = override_value(ov.and_then(|o| o.room.as_ref()))
        .unwrap_or_else(|| ROOM_POOL[index % ROOM_POOL.len()].to_string());
    let start_raw = override_value(ov.and_then(|o| o.start_time.as_ref()))
        .unwrap_or_else(|| TIME_SLOTS[index % TIME_SLOTS.len()].to_string());
    let duration = override_value(ov.and_then(|o| o.duration.as_ref()))
        .unwrap_or_else(|| DEFAULT_DURATION.to_string());

    let start_time = parse_time(&start_raw)?;
    let duration_hours = parse_duration_hours(&duration)?;
    let fits = exam_end(date, start_time, duration_hours).is_some();
    let (Some(delta), true) = (duration_of(duration_hours), fits) else {
        return Err(ScheduleError::BadDuration(duration));
    };
    let end_time = start_time.overflowing_add_signed(delta).0;

    Ok(PlannedExam {
        subject: subject.to_string(),
        room,
        date,
        start_time,
        end_time,
        duration,
        duration_hours,
    })
}

/// Validates a batch request and expands it into one exam per subject.
/// Nothing is planned unless the whole request is valid.
pub fn plan(req: &ScheduleRequest) -> Result<ExamPlan, ScheduleError> {
    let exam_name = req.exam_name.trim();
    if exam_name.is_empty() {
        return Err(ScheduleError::Missing("examName"));
    }
    let class_name = req.class_name.trim();
    if class_name.is_empty() {
        return Err(ScheduleError::Missing("className"));
    }
    if req.date.trim().is_empty() {
        return Err(ScheduleError::Missing("date"));
    }
    if req.exam_type.trim().is_empty() {
        return Err(ScheduleError::Missing("examType"));
    }
    let exam_type = ExamType::parse(&req.exam_type)
        .ok_or_else(|| ScheduleError::BadExamType(req.exam_type.clone()))?;

    let subjects: Vec<&str> = req
        .subjects
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if subjects.is_empty() {
        return Err(ScheduleError::NoSubjects);
    }
    let mut seen = HashSet::new();
    for s in &subjects {
        if !seen.insert(s.to_ascii_lowercase()) {
            return Err(ScheduleError::DuplicateSubject(s.to_string()));
        }
    }

    // Override keys match subjects the same way duplicates are detected.
    let mut overrides: HashMap<String, &SubjectOverride> = HashMap::new();
    for (key, ov) in &req.overrides {
        let folded = key.trim().to_ascii_lowercase();
        if !seen.contains(&folded) {
            return Err(ScheduleError::UnknownOverride(key.clone()));
        }
        if overrides.insert(folded, ov).is_some() {
            return Err(ScheduleError::DuplicateSubject(key.clone()));
        }
    }

    let date = parse_date(&req.date)?;
    let exams = subjects
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let ov = overrides.get(&s.to_ascii_lowercase()).copied();
            plan_subject(i, s, date, ov)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ExamPlan {
        exam_name: exam_name.to_string(),
        exam_type,
        class_name: class_name.to_string(),
        exams,
    })
}
