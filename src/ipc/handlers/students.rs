use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_opt_str, get_required_str, resolve_year, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, students::{self, Student, StudentPatch}};
use chrono::Datelike;
use rusqlite::Connection;
use serde_json::json;

fn students_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_name = get_opt_str(params, "className");
    let year = get_opt_str(params, "academicYear");
    let rows = students::list(conn, class_name.as_deref(), year.as_deref())?;
    Ok(json!({ "students": rows }))
}

fn students_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let s = students::get(conn, &student_id)?.ok_or_else(|| HandlerErr::not_found("student not found"))?;
    Ok(json!({ "student": s }))
}

fn students_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let class_name = get_required_str(params, "className")?;
    let year = resolve_year(conn, params)?;

    let id = match get_opt_str(params, "studentId") {
        Some(id) => {
            if students::get(conn, &id)?.is_some() {
                return Err(HandlerErr::new("conflict", "student id already in use")
                    .with_details(json!({ "studentId": id })));
            }
            id
        }
        None => {
            let enrolment = students::enrolment_year(&year, store::now_local().year());
            students::next_student_id(conn, enrolment)?
        }
    };

    let s = Student {
        id,
        name,
        sort_order: students::next_sort_order(conn, &class_name, &year)?,
        class_name,
        academic_year: year,
        gender: get_opt_str(params, "gender"),
        parent_phone: get_opt_str(params, "parentPhone"),
    };
    students::insert(conn, &s, &store::now_stamp()).map_err(|e| {
        HandlerErr::new("db_insert_failed", e.to_string()).with_details(json!({ "table": "students" }))
    })?;
    Ok(json!({ "studentId": s.id, "student": s }))
}

fn students_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let patch = StudentPatch {
        name: get_opt_str(params, "name"),
        class_name: get_opt_str(params, "className"),
        academic_year: get_opt_str(params, "academicYear"),
        gender: get_opt_str(params, "gender"),
        parent_phone: get_opt_str(params, "parentPhone"),
    };
    if !students::update(conn, &student_id, &patch, &store::now_stamp())? {
        return Err(HandlerErr::not_found("student not found"));
    }
    Ok(json!({ "ok": true }))
}

fn students_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    if !students::delete(conn, &student_id)? {
        return Err(HandlerErr::not_found("student not found"));
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(with_conn(state, req, students_list)),
        "students.get" => Some(with_conn(state, req, students_get)),
        "students.create" => Some(with_conn(state, req, students_create)),
        "students.update" => Some(with_conn(state, req, students_update)),
        "students.delete" => Some(with_conn(state, req, students_delete)),
        _ => None,
    }
}
