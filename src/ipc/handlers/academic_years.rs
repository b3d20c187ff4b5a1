use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_opt_bool, get_required_str, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, academic_years};
use rusqlite::Connection;
use serde_json::json;

fn years_list(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let years = academic_years::list(conn)?;
    Ok(json!({ "academicYears": years }))
}

fn years_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let make_current = get_opt_bool(params, "current")?.unwrap_or(false);
    if academic_years::exists(conn, &name)? {
        return Err(HandlerErr::new("conflict", "academic year already exists")
            .with_details(json!({ "name": name })));
    }
    let is_current = academic_years::create(conn, &name, make_current, &store::now_stamp())?;
    Ok(json!({ "name": name, "isCurrent": is_current }))
}

fn years_set_current(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    if !academic_years::set_current(conn, &name)? {
        return Err(HandlerErr::not_found("academic year not found"));
    }
    tracing::info!(academic_year = %name, "current academic year changed");
    Ok(json!({ "current": name }))
}

fn years_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    if academic_years::current(conn)?.as_deref() == Some(name.as_str()) {
        return Err(HandlerErr::new("conflict", "cannot delete the current academic year"));
    }
    if !academic_years::delete(conn, &name)? {
        return Err(HandlerErr::not_found("academic year not found"));
    }
    Ok(json!({ "deleted": name }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "academicYears.list" => Some(with_conn(state, req, years_list)),
        "academicYears.create" => Some(with_conn(state, req, years_create)),
        "academicYears.setCurrent" => Some(with_conn(state, req, years_set_current)),
        "academicYears.delete" => Some(with_conn(state, req, years_delete)),
        _ => None,
    }
}
