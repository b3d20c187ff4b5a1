use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_str, resolve_year, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::store::{attendance::{self, AttendanceStatus}, students};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;

fn get_date(params: &serde_json::Value) -> Result<String, HandlerErr> {
    let raw = get_required_str(params, "date")?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| HandlerErr::bad_params("date must be YYYY-MM-DD").with_details(json!({ "date": raw })))
}

/// Records one class day. Students missing from `records` keep whatever they had.
fn attendance_mark(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let date = get_date(params)?;
    let class_name = get_required_str(params, "className")?;
    let year = resolve_year(conn, params)?;
    let Some(records) = params.get("records").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing records"));
    };

    let roster = students::roster(conn, &class_name, &year)?;
    let mut parsed = Vec::with_capacity(records.len());
    for (i, entry) in records.iter().enumerate() {
        let student_id = get_required_str(entry, "studentId")
            .map_err(|e| e.with_details(json!({ "index": i })))?;
        let raw = get_required_str(entry, "status").map_err(|e| e.with_details(json!({ "index": i })))?;
        let status = AttendanceStatus::parse(&raw).ok_or_else(|| {
            HandlerErr::bad_params("status must be one of: present, absent, late, excused")
                .with_details(json!({ "index": i, "status": raw }))
        })?;
        if !roster.iter().any(|s| s.id == student_id) {
            return Err(HandlerErr::not_found("student is not enrolled in this class")
                .with_details(json!({ "index": i, "studentId": student_id })));
        }
        parsed.push((student_id, status));
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    for (student_id, status) in &parsed {
        attendance::upsert(&tx, &date, student_id, &class_name, &year, *status)?;
    }
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    Ok(json!({ "ok": true, "marked": parsed.len() }))
}

fn attendance_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let date = get_date(params)?;
    let class_name = get_required_str(params, "className")?;
    let year = resolve_year(conn, params)?;
    let roster = students::roster(conn, &class_name, &year)?;
    let day = attendance::day(conn, &date, &class_name, &year)?;
    let rows: Vec<serde_json::Value> = roster
        .iter()
        .map(|s| {
            json!({
                "studentId": s.id,
                "name": s.name,
                "status": day.get(&s.id),
            })
        })
        .collect();
    Ok(json!({
        "date": date,
        "className": class_name,
        "academicYear": year,
        "rows": rows,
    }))
}

fn attendance_student_summary(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let year = resolve_year(conn, params)?;
    if students::get(conn, &student_id)?.is_none() {
        return Err(HandlerErr::not_found("student not found"));
    }
    let summary = attendance::summary(conn, &student_id, &year)?;
    Ok(json!({ "summary": summary }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.mark" => Some(with_conn(state, req, attendance_mark)),
        "attendance.get" => Some(with_conn(state, req, attendance_get)),
        "attendance.studentSummary" => Some(with_conn(state, req, attendance_student_summary)),
        _ => None,
    }
}
