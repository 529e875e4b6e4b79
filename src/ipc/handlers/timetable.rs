use crate::ipc::error::{err, ok, schedule_err};
use crate::ipc::helpers::{context, required_str, term};
use crate::ipc::types::{AppState, Request};
use crate::model::ScopeKind;
use crate::store;
use crate::timetable;
use serde_json::json;

fn handle_timetable_build(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, catalog, settings) = match context(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let scope_raw = match required_str(req, "scope") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(scope) = ScopeKind::parse(&scope_raw) else {
        return err(
            &req.id,
            "bad_params",
            "scope must be one of: classroom, teacher, subject",
            None,
        );
    };
    let scope_id = match required_str(req, "scopeId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let term = match term(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let rows = match store::load_term(conn, &term, false) {
        Ok(v) => v,
        Err(e) => return schedule_err(&req.id, &e),
    };
    match timetable::build(scope, &scope_id, &term, &rows, &settings.grid, &catalog) {
        Ok(tt) => ok(&req.id, json!(tt)),
        Err(e) => schedule_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "timetable.build" => Some(handle_timetable_build(state, req)),
        _ => None,
    }
}
