use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_opt_str, get_required_str, get_string_list, resolve_year, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::schedule::{self, ScheduleRequest, SubjectOverride};
use crate::store::{self, exams::{self, ExamSchedule}, marks, students};
use crate::workflow;
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

fn parse_overrides(params: &serde_json::Value) -> Result<HashMap<String, SubjectOverride>, HandlerErr> {
    let Some(raw) = params.get("overrides") else {
        return Ok(HashMap::new());
    };
    if raw.is_null() {
        return Ok(HashMap::new());
    }
    let Some(obj) = raw.as_object() else {
        return Err(HandlerErr::bad_params("overrides must be an object keyed by subject"));
    };
    Ok(obj
        .iter()
        .map(|(subject, v)| {
            (
                subject.trim().to_string(),
                SubjectOverride {
                    room: get_opt_str(v, "room"),
                    start_time: get_opt_str(v, "startTime"),
                    duration: get_opt_str(v, "duration"),
                },
            )
        })
        .collect())
}

fn exam_json(e: &ExamSchedule) -> serde_json::Value {
    let deadline = e
        .ends_at()
        .map(|end| store::stamp(workflow::deadline_for(end)));
    let mut v = json!(e);
    v["marksDeadline"] = json!(deadline);
    v
}

/// Expands one request into an exam per subject and seeds a draft marks entry
/// for each from the class roster. Either every exam is created or none is.
fn exams_schedule(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let req = ScheduleRequest {
        exam_name: get_opt_str(params, "examName").unwrap_or_default(),
        exam_type: get_opt_str(params, "examType").unwrap_or_default(),
        class_name: get_opt_str(params, "className").unwrap_or_default(),
        subjects: get_string_list(params, "subjects")?,
        date: get_opt_str(params, "date").unwrap_or_default(),
        overrides: parse_overrides(params)?,
    };
    let plan = schedule::plan(&req)?;
    let year = resolve_year(conn, params)?;
    let teacher_id = get_opt_str(params, "teacherId");
    let roster = students::roster(conn, &plan.class_name, &year)?;

    let batch_id = Uuid::new_v4().to_string();
    let created_at = store::now_stamp();
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;

    let mut created = Vec::with_capacity(plan.exams.len());
    for planned in &plan.exams {
        let exam = ExamSchedule {
            id: Uuid::new_v4().to_string(),
            batch_id: batch_id.clone(),
            exam_name: plan.exam_name.clone(),
            exam_type: plan.exam_type.as_str().to_string(),
            class_name: plan.class_name.clone(),
            subject: planned.subject.clone(),
            date: planned.date.format("%Y-%m-%d").to_string(),
            start_time: planned.start_time.format("%H:%M").to_string(),
            end_time: planned.end_time.format("%H:%M").to_string(),
            duration: planned.duration.clone(),
            duration_hours: planned.duration_hours,
            room: planned.room.clone(),
            academic_year: year.clone(),
            teacher_id: teacher_id.clone(),
            created_at: created_at.clone(),
        };
        exams::insert(&tx, &exam).map_err(|e| {
            HandlerErr::new("db_insert_failed", e.to_string())
                .with_details(json!({ "table": "exam_schedules" }))
        })?;
        marks::create_template(&tx, &exam.id, &roster, &created_at).map_err(|e| {
            HandlerErr::new("db_insert_failed", e.to_string())
                .with_details(json!({ "table": "marks_entries" }))
        })?;
        created.push(exam);
    }
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;

    tracing::info!(
        batch_id = %batch_id,
        class = %plan.class_name,
        academic_year = %year,
        exams = created.len(),
        students = roster.len(),
        "exam batch scheduled"
    );

    let field = plan.exam_type.score_field().as_str();
    Ok(json!({
        "batchId": batch_id,
        "exams": created.iter().map(exam_json).collect::<Vec<_>>(),
        "marksEntries": created.iter().map(|e| json!({
            "examId": e.id,
            "subject": e.subject,
            "status": workflow::MarksStatus::Draft,
            "scoreField": field,
            "studentCount": roster.len(),
        })).collect::<Vec<_>>(),
    }))
}

fn exams_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_name = get_opt_str(params, "className");
    let year = get_opt_str(params, "academicYear");
    let teacher_id = get_opt_str(params, "teacherId");
    let rows = exams::list(conn, class_name.as_deref(), year.as_deref(), teacher_id.as_deref())?;
    Ok(json!({ "exams": rows.iter().map(exam_json).collect::<Vec<_>>() }))
}

fn exams_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(params, "examId")?;
    let exam = exams::get(conn, &exam_id)?.ok_or_else(|| HandlerErr::not_found("exam not found"))?;
    Ok(json!({ "exam": exam_json(&exam) }))
}

/// Moves an exam in time or space. Marks are untouched; the deadline follows the new end.
fn exams_reschedule(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(params, "examId")?;
    let mut exam = exams::get(conn, &exam_id)?.ok_or_else(|| HandlerErr::not_found("exam not found"))?;

    let date = schedule::parse_date(&get_opt_str(params, "date").unwrap_or_else(|| exam.date.clone()))?;
    let ov = SubjectOverride {
        room: Some(get_opt_str(params, "room").unwrap_or_else(|| exam.room.clone())),
        start_time: Some(get_opt_str(params, "startTime").unwrap_or_else(|| exam.start_time.clone())),
        duration: Some(get_opt_str(params, "duration").unwrap_or_else(|| exam.duration.clone())),
    };
    let planned = schedule::plan_subject(0, &exam.subject, date, Some(&ov))?;

    exam.date = planned.date.format("%Y-%m-%d").to_string();
    exam.start_time = planned.start_time.format("%H:%M").to_string();
    exam.end_time = planned.end_time.format("%H:%M").to_string();
    exam.duration = planned.duration;
    exam.duration_hours = planned.duration_hours;
    exam.room = planned.room;
    exams::update_timing(conn, &exam)?;
    Ok(json!({ "exam": exam_json(&exam) }))
}

/// Removes the exam and its marks entry. Published results are kept.
fn exams_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(params, "examId")?;
    if exams::get(conn, &exam_id)?.is_none() {
        return Err(HandlerErr::not_found("exam not found"));
    }
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    marks::delete(&tx, &exam_id).map_err(|e| {
        HandlerErr::new("db_delete_failed", e.to_string()).with_details(json!({ "table": "marks_entries" }))
    })?;
    exams::delete(&tx, &exam_id).map_err(|e| {
        HandlerErr::new("db_delete_failed", e.to_string()).with_details(json!({ "table": "exam_schedules" }))
    })?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "exams.schedule" => Some(with_conn(state, req, exams_schedule)),
        "exams.list" => Some(with_conn(state, req, exams_list)),
        "exams.get" => Some(with_conn(state, req, exams_get)),
        "exams.reschedule" => Some(with_conn(state, req, exams_reschedule)),
        "exams.delete" => Some(with_conn(state, req, exams_delete)),
        _ => None,
    }
}
