use crate::catalog::SqliteCatalog;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::model::{AcademicYear, Semester, Term};
use crate::settings::SchedulingSettings;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_bool(req: &Request, key: &str, default: bool) -> Result<bool, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be boolean", key), None)),
    }
}

/// Deserializes `params[key]` into `T`.
pub fn field<T: DeserializeOwned>(req: &Request, key: &str) -> Result<T, Value> {
    let Some(raw) = req.params.get(key).filter(|v| !v.is_null()) else {
        return Err(err(&req.id, "bad_params", format!("missing {}", key), None));
    };
    serde_json::from_value(raw.clone())
        .map_err(|e| err(&req.id, "bad_params", format!("{}: {}", key, e), None))
}

pub fn optional_field<T: DeserializeOwned>(req: &Request, key: &str) -> Result<Option<T>, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => field(req, key).map(Some),
    }
}

/// Deserializes the whole params object into `T`.
pub fn params_as<T: DeserializeOwned>(req: &Request) -> Result<T, Value> {
    serde_json::from_value(req.params.clone())
        .map_err(|e| err(&req.id, "bad_params", e.to_string(), None))
}

pub fn term(req: &Request) -> Result<Term, Value> {
    let academic_year: AcademicYear = field(req, "academicYear")?;
    let semester: Semester = field(req, "semester")?;
    Ok(Term {
        academic_year,
        semester,
    })
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

pub fn optional_date(req: &Request, key: &str) -> Result<Option<NaiveDate>, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_str()
            .and_then(parse_date)
            .map(Some)
            .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be YYYY-MM-DD", key), None)),
    }
}

pub fn settings(conn: &Connection, req: &Request) -> Result<SchedulingSettings, Value> {
    SchedulingSettings::load(conn).map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))
}

/// The catalog view and scheduling settings every scheduling handler needs.
pub fn context<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<(&'a Connection, SqliteCatalog<'a>, SchedulingSettings), Value> {
    let conn = db_conn(state, req)?;
    let settings = settings(conn, req)?;
    Ok((conn, SqliteCatalog::new(conn), settings))
}
