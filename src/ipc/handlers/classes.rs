use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_opt_str, get_required_str, resolve_year, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::store::classes;
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn classes_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let year = get_opt_str(params, "academicYear");
    let rows = classes::list(conn, year.as_deref())?;
    Ok(json!({ "classes": rows }))
}

fn classes_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let year = resolve_year(conn, params)?;
    let grade_level = get_opt_str(params, "gradeLevel");
    if classes::exists_by_name(conn, &name, &year)? {
        return Err(HandlerErr::new("conflict", "class already exists for this academic year")
            .with_details(json!({ "name": name, "academicYear": year })));
    }

    let class_id = Uuid::new_v4().to_string();
    classes::create(conn, &class_id, &name, &year, grade_level.as_deref()).map_err(|e| {
        HandlerErr::new("db_insert_failed", e.to_string()).with_details(json!({ "table": "classes" }))
    })?;
    Ok(json!({ "classId": class_id, "name": name, "academicYear": year }))
}

fn classes_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let name = get_opt_str(params, "name");
    let grade_level = get_opt_str(params, "gradeLevel");
    if let (Some(new_name), Some((old_name, year))) = (&name, classes::get(conn, &class_id)?) {
        if *new_name != old_name && classes::exists_by_name(conn, new_name, &year)? {
            return Err(HandlerErr::new("conflict", "class already exists for this academic year"));
        }
    }
    if !classes::update(conn, &class_id, name.as_deref(), grade_level.as_deref())? {
        return Err(HandlerErr::not_found("class not found"));
    }
    Ok(json!({ "ok": true }))
}

/// Students, exams and marks entries that name the class are left untouched.
fn classes_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let Some((name, year)) = classes::get(conn, &class_id)? else {
        return Err(HandlerErr::not_found("class not found"));
    };
    classes::delete(conn, &class_id).map_err(|e| {
        HandlerErr::new("db_delete_failed", e.to_string()).with_details(json!({ "table": "classes" }))
    })?;
    tracing::info!(class = %name, academic_year = %year, "class deleted");
    Ok(json!({ "ok": true, "name": name, "academicYear": year }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(with_conn(state, req, classes_list)),
        "classes.create" => Some(with_conn(state, req, classes_create)),
        "classes.update" => Some(with_conn(state, req, classes_update)),
        "classes.delete" => Some(with_conn(state, req, classes_delete)),
        _ => None,
    }
}
