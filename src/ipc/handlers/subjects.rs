use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_opt_str, get_required_str, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::store::subjects::{self, Subject};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn subjects_list(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({ "subjects": subjects::list(conn)? }))
}

fn subjects_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    if subjects::exists_by_name(conn, &name)? {
        return Err(HandlerErr::new("conflict", "subject already exists")
            .with_details(json!({ "name": name })));
    }
    let subject = Subject {
        id: Uuid::new_v4().to_string(),
        name,
        code: get_opt_str(params, "code"),
    };
    subjects::create(conn, &subject)?;
    Ok(json!({ "subjectId": subject.id, "name": subject.name }))
}

fn subjects_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_str(params, "subjectId")?;
    if !subjects::delete(conn, &subject_id)? {
        return Err(HandlerErr::not_found("subject not found"));
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(with_conn(state, req, subjects_list)),
        "subjects.create" => Some(with_conn(state, req, subjects_create)),
        "subjects.delete" => Some(with_conn(state, req, subjects_delete)),
        _ => None,
    }
}
