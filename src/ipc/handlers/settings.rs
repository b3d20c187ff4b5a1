use crate::db;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_str, with_conn};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

fn settings_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let key = get_required_str(params, "key")?;
    let value = db::settings_get_json(conn, &key)?;
    Ok(json!({ "key": key, "value": value }))
}

/// Stores any JSON value under `key`; `null` is stored as-is rather than deleting.
fn settings_set(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let key = get_required_str(params, "key")?;
    let Some(value) = params.get("value") else {
        return Err(HandlerErr::bad_params("missing value"));
    };
    db::settings_set_json(conn, &key, value).map_err(|e| {
        HandlerErr::new("db_update_failed", e.to_string()).with_details(json!({ "key": key }))
    })?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "settings.get" => Some(with_conn(state, req, settings_get)),
        "settings.set" => Some(with_conn(state, req, settings_set)),
        _ => None,
    }
}
