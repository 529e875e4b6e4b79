use crate::ipc::error::{err, ok, schedule_err};
use crate::ipc::helpers::{context, field, required_str, term};
use crate::ipc::types::{AppState, Request};
use crate::report::{self, ResolutionStrategy, Resolver};
use crate::store;
use serde_json::json;

fn handle_workload(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, catalog, settings) = match context(state, req) {
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
    match report::workload(&term, &rows, &catalog, settings.max_weekly_hours) {
        Ok(teachers) => ok(
            &req.id,
            json!({
                "maxWeeklyHours": settings.max_weekly_hours,
                "teachers": teachers
            }),
        ),
        Err(e) => schedule_err(&req.id, &e),
    }
}

fn handle_utilization(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, catalog, settings) = match context(state, req) {
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
    match report::utilization(&term, &rows, &settings.grid, &catalog) {
        Ok(classrooms) => ok(&req.id, json!({ "classrooms": classrooms })),
        Err(e) => schedule_err(&req.id, &e),
    }
}

fn handle_density(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, _, settings) = match context(state, req) {
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
    let cells = report::density(&term, &rows, &settings.grid);
    ok(&req.id, json!({ "cells": cells }))
}

fn handle_peak_hours(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, _, settings) = match context(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let term = match term(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let top = match req.params.get("top") {
        None => settings.peak_hours_top,
        Some(v) => match v.as_u64().filter(|n| (1..=20).contains(n)) {
            Some(n) => n as usize,
            None => return err(&req.id, "bad_params", "top must be in 1..=20", None),
        },
    };
    let rows = match store::load_term(conn, &term, false) {
        Ok(v) => v,
        Err(e) => return schedule_err(&req.id, &e),
    };
    let peaks = report::peak_hours(&term, &rows, &settings.grid, top);
    ok(&req.id, json!({ "peaks": peaks }))
}

fn handle_resolutions(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, catalog, settings) = match context(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let term = match term(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let strategy_raw = match required_str(req, "strategy") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(strategy) = ResolutionStrategy::parse(&strategy_raw) else {
        return err(
            &req.id,
            "bad_params",
            "strategy must be one of: REASSIGN_ROOM, REASSIGN_TIME, REASSIGN_TEACHER",
            None,
        );
    };
    let ids: Vec<String> = match field(req, "assignmentIds") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let rows = match store::load_term(conn, &term, false) {
        Ok(v) => v,
        Err(e) => return schedule_err(&req.id, &e),
    };

    let resolver = Resolver::new(
        &settings.grid,
        &catalog,
        settings.detector(),
        settings.max_resolution_candidates,
    );
    match resolver.propose_resolutions(&ids, strategy, &rows) {
        Ok(candidates) => ok(&req.id, json!({ "candidates": candidates })),
        Err(e) => schedule_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.workload" => Some(handle_workload(state, req)),
        "reports.utilization" => Some(handle_utilization(state, req)),
        "reports.density" => Some(handle_density(state, req)),
        "reports.peakHours" => Some(handle_peak_hours(state, req)),
        "reports.resolutions" => Some(handle_resolutions(state, req)),
        _ => None,
    }
}
