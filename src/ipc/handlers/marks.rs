use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    check_expected_version, get_actor, get_opt_str, get_required_str, parse_score, with_conn,
};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, exams::{self, ExamSchedule}, marks::{self, MarksEntry}, results};
use crate::workflow::{
    marks_complete, transition, Actor, ExamType, Gate, MarksEvent, MarksStatus, ScoreField,
    StudentMark,
};
use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde_json::json;

const BULK_UPDATE_MAX_EDITS: usize = 5000;
const ALL_FIELDS: [ScoreField; 3] = [ScoreField::Midterm, ScoreField::Final, ScoreField::Homework];

struct Loaded {
    exam: ExamSchedule,
    exam_type: ExamType,
    exam_end: NaiveDateTime,
    entry: MarksEntry,
}

impl Loaded {
    fn gate(&self, now: NaiveDateTime) -> Gate<'_> {
        Gate {
            now,
            exam_end: self.exam_end,
            owner: self.exam.teacher_id.as_deref(),
        }
    }
}

fn load(conn: &Connection, exam_id: &str) -> Result<Loaded, HandlerErr> {
    let exam = exams::get(conn, exam_id)?.ok_or_else(|| HandlerErr::not_found("exam not found"))?;
    let exam_type = exam.exam_type().ok_or_else(|| {
        HandlerErr::new("bad_state", "exam has an unknown exam type")
            .with_details(json!({ "examType": exam.exam_type }))
    })?;
    let exam_end = exam.ends_at().ok_or_else(|| {
        HandlerErr::new("bad_state", "exam has an unreadable date or time")
            .with_details(json!({ "date": exam.date, "startTime": exam.start_time }))
    })?;
    let entry = marks::load(conn, exam_id)?
        .ok_or_else(|| HandlerErr::not_found("marks entry not found"))?;
    Ok(Loaded {
        exam,
        exam_type,
        exam_end,
        entry,
    })
}

/// The exam-type field is always present (null when not entered); other
/// components only appear once they hold a value.
fn row_json(m: &StudentMark, field: ScoreField) -> serde_json::Value {
    let mut v = json!({
        "studentId": m.student_id,
        "name": m.name,
        "total": m.total,
        "percentage": m.percentage,
    });
    for f in ALL_FIELDS {
        let value = m.get(f);
        if f == field || value.is_some() {
            v[f.as_str()] = json!(value);
        }
    }
    v
}

fn entry_json(l: &Loaded, actor: Option<&Actor>) -> serde_json::Value {
    let field = l.exam_type.score_field();
    let now = store::now_local();
    let gate = l.gate(now);
    let mut v = json!({
        "examId": l.exam.id,
        "examName": l.exam.exam_name,
        "examType": l.exam_type.as_str(),
        "className": l.exam.class_name,
        "subject": l.exam.subject,
        "academicYear": l.exam.academic_year,
        "status": l.entry.status,
        "version": l.entry.version,
        "submittedAt": l.entry.submitted_at,
        "approvedAt": l.entry.approved_at,
        "updatedAt": l.entry.updated_at,
        "scoreField": field.as_str(),
        "deadline": store::stamp(gate.deadline()),
        "complete": marks_complete(&l.entry.rows, l.exam_type),
        "rows": l.entry.rows.iter().map(|r| row_json(r, field)).collect::<Vec<_>>(),
    });
    if let Some(actor) = actor {
        v["canEdit"] = json!(transition(l.entry.status, MarksEvent::Edit, actor, &gate).is_ok());
    }
    v
}

fn parse_field(params: &serde_json::Value, default: ScoreField) -> Result<ScoreField, HandlerErr> {
    match get_opt_str(params, "field") {
        None => Ok(default),
        Some(raw) => ScoreField::parse(&raw).ok_or_else(|| {
            HandlerErr::bad_params("field must be one of: midterm, final, homework")
                .with_details(json!({ "field": raw }))
        }),
    }
}

/// Writes the approved entry's results, replacing any earlier ones for the exam.
fn generate_results(conn: &Connection, l: &Loaded, at: &str) -> Result<usize, HandlerErr> {
    let rows = results::build_rows(&l.exam, &l.entry.rows, at);
    let n = results::replace_for_exam(conn, &l.exam.id, &rows).map_err(|e| {
        HandlerErr::new("db_insert_failed", e.to_string()).with_details(json!({ "table": "results" }))
    })?;
    tracing::info!(exam_id = %l.exam.id, results = n, "results generated");
    Ok(n)
}

fn marks_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(params, "examId")?;
    let l = load(conn, &exam_id)?;
    let actor = match params.get("actor") {
        Some(_) => Some(get_actor(params)?),
        None => None,
    };
    Ok(json!({ "entry": entry_json(&l, actor.as_ref()) }))
}

fn marks_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let status = match get_opt_str(params, "status") {
        None => None,
        Some(raw) => Some(MarksStatus::parse(&raw).ok_or_else(|| {
            HandlerErr::bad_params("status must be one of: draft, submitted, approved")
        })?),
    };
    let class_name = get_opt_str(params, "className");
    let year = get_opt_str(params, "academicYear");
    let rows = marks::list(conn, status, class_name.as_deref(), year.as_deref())?;
    Ok(json!({ "entries": rows }))
}

fn marks_update_score(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(params, "examId")?;
    let student_id = get_required_str(params, "studentId")?;
    let actor = get_actor(params)?;
    let mut l = load(conn, &exam_id)?;
    transition(l.entry.status, MarksEvent::Edit, &actor, &l.gate(store::now_local()))?;
    check_expected_version(params, l.entry.version)?;

    let field = parse_field(params, l.exam_type.score_field())?;
    let value = parse_score(params.get("value"))?;
    let row = l
        .entry
        .rows
        .iter_mut()
        .find(|r| r.student_id == student_id)
        .ok_or_else(|| {
            HandlerErr::not_found("student is not on this marks entry")
                .with_details(json!({ "studentId": student_id }))
        })?;
    row.set(field, value);

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    marks::save_row(&tx, &exam_id, row)?;
    let version = marks::touch(&tx, &exam_id, &store::now_stamp())?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;

    Ok(json!({
        "row": row_json(row, l.exam_type.score_field()),
        "version": version,
    }))
}

/// Applies many cell edits in one transaction. Any bad edit rejects the batch.
fn marks_bulk_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(params, "examId")?;
    let actor = get_actor(params)?;
    let mut l = load(conn, &exam_id)?;
    transition(l.entry.status, MarksEvent::Edit, &actor, &l.gate(store::now_local()))?;
    check_expected_version(params, l.entry.version)?;

    let Some(edits) = params.get("scores").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing scores"));
    };
    if edits.len() > BULK_UPDATE_MAX_EDITS {
        return Err(HandlerErr::bad_params("too many edits in one request").with_details(json!({
            "editCount": edits.len(),
            "maxEdits": BULK_UPDATE_MAX_EDITS
        })));
    }

    let default_field = l.exam_type.score_field();
    let mut touched: Vec<usize> = Vec::new();
    for (i, edit) in edits.iter().enumerate() {
        let with_index = |e: HandlerErr| e.with_details(json!({ "index": i }));
        let student_id = get_required_str(edit, "studentId").map_err(with_index)?;
        let field = parse_field(edit, default_field).map_err(with_index)?;
        let value = parse_score(edit.get("value")).map_err(with_index)?;
        let Some(pos) = l.entry.rows.iter().position(|r| r.student_id == student_id) else {
            return Err(with_index(HandlerErr::not_found("student is not on this marks entry")));
        };
        l.entry.rows[pos].set(field, value);
        if !touched.contains(&pos) {
            touched.push(pos);
        }
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    for &pos in &touched {
        marks::save_row(&tx, &exam_id, &l.entry.rows[pos])?;
    }
    let version = marks::touch(&tx, &exam_id, &store::now_stamp())?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;

    Ok(json!({
        "updated": touched.len(),
        "version": version,
        "complete": marks_complete(&l.entry.rows, l.exam_type),
    }))
}

/// draft -> submitted, then straight on to approved (with results) when every
/// row already has its exam-type score.
fn marks_submit(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(params, "examId")?;
    let actor = get_actor(params)?;
    let mut l = load(conn, &exam_id)?;
    let now = store::now_local();
    let gate = l.gate(now);
    let mut status = transition(l.entry.status, MarksEvent::Submit, &actor, &gate)?;
    check_expected_version(params, l.entry.version)?;

    let complete = marks_complete(&l.entry.rows, l.exam_type);
    let at = store::stamp(now);
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    let mut version = marks::write_status(&tx, &exam_id, status, &at)?;
    tracing::info!(exam_id = %exam_id, from = %l.entry.status, to = %status, "marks transition");

    let mut results_generated = 0;
    if complete {
        let from = status;
        status = transition(from, MarksEvent::AutoApprove { complete }, &actor, &gate)?;
        version = marks::write_status(&tx, &exam_id, status, &at)?;
        tracing::info!(exam_id = %exam_id, from = %from, to = %status, "marks auto-approved");
        l.entry.status = status;
        results_generated = generate_results(&tx, &l, &at)?;
    }
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;

    Ok(json!({
        "status": status,
        "autoApproved": complete,
        "resultsGenerated": results_generated,
        "version": version,
    }))
}

fn marks_approve(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(params, "examId")?;
    let actor = get_actor(params)?;
    let mut l = load(conn, &exam_id)?;
    let now = store::now_local();
    let status = transition(l.entry.status, MarksEvent::Approve, &actor, &l.gate(now))?;
    check_expected_version(params, l.entry.version)?;

    let at = store::stamp(now);
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    let version = marks::write_status(&tx, &exam_id, status, &at)?;
    tracing::info!(exam_id = %exam_id, from = %l.entry.status, to = %status, "marks approved");
    l.entry.status = status;
    let results_generated = generate_results(&tx, &l, &at)?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;

    Ok(json!({
        "status": status,
        "resultsGenerated": results_generated,
        "version": version,
    }))
}

/// submitted -> draft. Published results from an earlier approval stay until the next one.
fn marks_reject(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(params, "examId")?;
    let actor = get_actor(params)?;
    let l = load(conn, &exam_id)?;
    let status = transition(l.entry.status, MarksEvent::Reject, &actor, &l.gate(store::now_local()))?;
    check_expected_version(params, l.entry.version)?;

    let version = marks::write_status(conn, &exam_id, status, &store::now_stamp())?;
    let reason = get_opt_str(params, "reason");
    tracing::info!(
        exam_id = %exam_id,
        from = %l.entry.status,
        to = %status,
        reason = reason.as_deref().unwrap_or(""),
        "marks rejected"
    );
    Ok(json!({ "status": status, "version": version, "reason": reason }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.get" => Some(with_conn(state, req, marks_get)),
        "marks.list" => Some(with_conn(state, req, marks_list)),
        "marks.updateScore" => Some(with_conn(state, req, marks_update_score)),
        "marks.bulkUpdate" => Some(with_conn(state, req, marks_bulk_update)),
        "marks.submit" => Some(with_conn(state, req, marks_submit)),
        "marks.approve" => Some(with_conn(state, req, marks_approve)),
        "marks.reject" => Some(with_conn(state, req, marks_reject)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_json_marks_non_applicable_fields_absent() {
        let mut m = StudentMark::new("DU-2025-001", "Amina");
        let v = row_json(&m, ScoreField::Final);
        assert!(v["final"].is_null());
        assert!(v.get("final").is_some());
        assert!(v.get("midterm").is_none());
        assert!(v.get("homework").is_none());

        m.set(ScoreField::Homework, Some(12.0));
        let v = row_json(&m, ScoreField::Final);
        assert_eq!(v["homework"], json!(12.0));
        assert_eq!(v["total"], json!(12.0));
    }

    #[test]
    fn submit_without_owner_is_open_to_any_teacher() {
        let now = store::now_local();
        let gate = Gate {
            now,
            exam_end: now,
            owner: None,
        };
        let next = transition(
            MarksStatus::Draft,
            MarksEvent::Submit,
            &Actor::teacher("T-9"),
            &gate,
        );
        assert_eq!(next, Ok(MarksStatus::Submitted));
    }
}
