use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_opt_str, get_required_str, get_string_list, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::store::teachers::{self, Teacher};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn teachers_list(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({ "teachers": teachers::list(conn)? }))
}

fn teachers_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let id = get_opt_str(params, "teacherId").unwrap_or_else(|| Uuid::new_v4().to_string());
    if teachers::get(conn, &id)?.is_some() {
        return Err(HandlerErr::new("conflict", "teacher id already in use")
            .with_details(json!({ "teacherId": id })));
    }
    let t = Teacher {
        id,
        name,
        phone: get_opt_str(params, "phone"),
        email: get_opt_str(params, "email"),
        subjects: get_string_list(params, "subjects")?,
    };
    teachers::upsert(conn, &t)?;
    Ok(json!({ "teacherId": t.id }))
}

fn teachers_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "teacherId")?;
    let Some(mut t) = teachers::get(conn, &id)? else {
        return Err(HandlerErr::not_found("teacher not found"));
    };
    if let Some(name) = get_opt_str(params, "name") {
        t.name = name;
    }
    if let Some(phone) = get_opt_str(params, "phone") {
        t.phone = Some(phone);
    }
    if let Some(email) = get_opt_str(params, "email") {
        t.email = Some(email);
    }
    if params.get("subjects").is_some() {
        t.subjects = get_string_list(params, "subjects")?;
    }
    teachers::upsert(conn, &t)?;
    Ok(json!({ "teacher": t }))
}

fn teachers_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "teacherId")?;
    if !teachers::delete(conn, &id)? {
        return Err(HandlerErr::not_found("teacher not found"));
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teachers.list" => Some(with_conn(state, req, teachers_list)),
        "teachers.create" => Some(with_conn(state, req, teachers_create)),
        "teachers.update" => Some(with_conn(state, req, teachers_update)),
        "teachers.delete" => Some(with_conn(state, req, teachers_delete)),
        _ => None,
    }
}
