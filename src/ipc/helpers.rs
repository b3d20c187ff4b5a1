use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::academic_years;
use crate::workflow::{Actor, Role};
use rusqlite::Connection;
use serde_json::json;

/// Runs `f` against the open workspace and wraps the outcome in the response envelope.
pub fn with_conn<F>(state: &AppState, req: &Request, f: F) -> serde_json::Value
where
    F: FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
{
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => {
            tracing::warn!(method = %req.method, code = e.code, message = %e.message, "request failed");
            e.response(&req.id)
        }
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    get_opt_str(params, key).ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Trimmed string param; blank counts as absent.
pub fn get_opt_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn get_opt_bool(params: &serde_json::Value, key: &str) -> Result<Option<bool>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be boolean", key))),
    }
}

pub fn get_string_list(params: &serde_json::Value, key: &str) -> Result<Vec<String>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(|s| s.to_string())
                    .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a list of strings", key)))
            })
            .collect(),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be a list of strings", key))),
    }
}

/// A score cell: absent or null clears it, otherwise a finite number >= 0.
pub fn parse_score(v: Option<&serde_json::Value>) -> Result<Option<f64>, HandlerErr> {
    let Some(v) = v else { return Ok(None) };
    if v.is_null() {
        return Ok(None);
    }
    let Some(x) = v.as_f64() else {
        return Err(HandlerErr::bad_params("score must be a number or null")
            .with_details(json!({ "value": v })));
    };
    if !x.is_finite() || x < 0.0 {
        return Err(HandlerErr::bad_params("negative marks are not allowed")
            .with_details(json!({ "value": x })));
    }
    Ok(Some(x))
}

/// The caller's identity: `params.actor = {role, teacherId?}`.
pub fn get_actor(params: &serde_json::Value) -> Result<Actor, HandlerErr> {
    let actor = params
        .get("actor")
        .ok_or_else(|| HandlerErr::bad_params("missing actor"))?;
    let role_raw = actor
        .get("role")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params("missing actor.role"))?;
    let role = Role::parse(role_raw).ok_or_else(|| {
        HandlerErr::new("forbidden", "role may not manage marks")
            .with_details(json!({ "role": role_raw }))
    })?;
    match role {
        Role::Admin => Ok(Actor::admin()),
        Role::Teacher => get_opt_str(actor, "teacherId")
            .map(Actor::teacher)
            .ok_or_else(|| HandlerErr::bad_params("missing actor.teacherId")),
    }
}

/// `params.academicYear`, or the workspace's current year.
pub fn resolve_year(conn: &Connection, params: &serde_json::Value) -> Result<String, HandlerErr> {
    if let Some(y) = get_opt_str(params, "academicYear") {
        return Ok(y);
    }
    academic_years::current(conn)?
        .ok_or_else(|| HandlerErr::new("no_current_year", "no academic year is marked current"))
}

/// Rejects a write whose `expectedVersion` no longer matches the stored row.
pub fn check_expected_version(params: &serde_json::Value, current: i64) -> Result<(), HandlerErr> {
    match params.get("expectedVersion").and_then(|v| v.as_i64()) {
        Some(expected) if expected != current => Err(HandlerErr::new(
            "conflict",
            "marks entry was changed by someone else",
        )
        .with_details(json!({ "expectedVersion": expected, "currentVersion": current }))),
        _ => Ok(()),
    }
}
