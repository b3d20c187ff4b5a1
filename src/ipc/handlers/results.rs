use crate::exchange;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_opt_bool, get_opt_str, get_required_str, resolve_year, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, academic_years, results::{self, ResultFilter}};
use rusqlite::Connection;
use serde_json::json;
use std::path::PathBuf;

fn results_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_opt_str(params, "examId");
    let student_id = get_opt_str(params, "studentId");
    let class_name = get_opt_str(params, "className");
    let year = get_opt_str(params, "academicYear");
    let rows = results::list(
        conn,
        &ResultFilter {
            exam_id: exam_id.as_deref(),
            student_id: student_id.as_deref(),
            class_name: class_name.as_deref(),
            academic_year: year.as_deref(),
        },
    )?;
    Ok(json!({ "results": rows }))
}

fn results_set_published(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let year = resolve_year(conn, params)?;
    let Some(published) = get_opt_bool(params, "published")? else {
        return Err(HandlerErr::bad_params("missing published"));
    };
    if !academic_years::exists(conn, &year)? {
        return Err(HandlerErr::not_found("academic year not found")
            .with_details(json!({ "academicYear": year })));
    }
    results::set_published(conn, &year, published, &store::now_stamp())?;
    tracing::info!(academic_year = %year, published, "results publication changed");
    Ok(json!({ "academicYear": year, "published": published }))
}

/// Public lookup by student ID. Only the current year's results are visible,
/// and only once that year is published.
fn results_lookup(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let year = academic_years::current(conn)?
        .ok_or_else(|| HandlerErr::new("no_current_year", "no academic year is marked current"))?;
    if !results::is_published(conn, &year)? {
        return Err(HandlerErr::new("not_published", "results are not published yet")
            .with_details(json!({ "academicYear": year })));
    }
    let rows = results::list(
        conn,
        &ResultFilter {
            student_id: Some(&student_id),
            academic_year: Some(&year),
            ..ResultFilter::default()
        },
    )?;
    let Some(first) = rows.first() else {
        return Err(HandlerErr::not_found("no results for this student ID")
            .with_details(json!({ "studentId": student_id })));
    };
    Ok(json!({
        "studentId": student_id,
        "studentName": first.student_name,
        "className": first.class_name,
        "academicYear": year,
        "results": rows,
    }))
}

fn results_export_csv(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let out_path = PathBuf::from(get_required_str(params, "outPath")?);
    let exam_id = get_opt_str(params, "examId");
    let class_name = get_opt_str(params, "className");
    let year = get_opt_str(params, "academicYear");
    let rows = results::list(
        conn,
        &ResultFilter {
            exam_id: exam_id.as_deref(),
            class_name: class_name.as_deref(),
            academic_year: year.as_deref(),
            ..ResultFilter::default()
        },
    )?;
    let n = exchange::export_results_csv(&rows, &out_path).map_err(|e| {
        HandlerErr::new("io_failed", format!("{e:#}"))
            .with_details(json!({ "path": out_path.to_string_lossy() }))
    })?;
    Ok(json!({ "ok": true, "rowsExported": n, "path": out_path.to_string_lossy() }))
}

/// Loads a results CSV. The file is parsed in full before anything is written,
/// and rows are upserted on (examId, studentId) in one transaction.
fn results_import_csv(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let in_path = PathBuf::from(get_required_str(params, "inPath")?);
    let rows = exchange::read_results_csv(&in_path).map_err(|e| {
        HandlerErr::bad_params(format!("{e:#}"))
            .with_details(json!({ "path": in_path.to_string_lossy() }))
    })?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    for row in &rows {
        results::upsert(&tx, row).map_err(|e| {
            HandlerErr::new("db_insert_failed", e.to_string()).with_details(json!({
                "table": "results",
                "examId": row.exam_id,
                "studentId": row.student_id
            }))
        })?;
    }
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    tracing::info!(rows = rows.len(), path = %in_path.display(), "results imported");
    Ok(json!({ "ok": true, "rowsImported": rows.len() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "results.list" => Some(with_conn(state, req, results_list)),
        "results.setPublished" => Some(with_conn(state, req, results_set_published)),
        "results.lookup" => Some(with_conn(state, req, results_lookup)),
        "results.exportCsv" => Some(with_conn(state, req, results_export_csv)),
        "results.importCsv" => Some(with_conn(state, req, results_import_csv)),
        _ => None,
    }
}
