use crate::allocator::Allocator;
use crate::conflict::has_blocking;
use crate::grid::DayOfWeek;
use crate::ipc::error::{err, ok, schedule_err};
use crate::ipc::helpers::{
    context, field, optional_bool, optional_date, optional_field, params_as, required_str, term,
};
use crate::ipc::types::{AppState, Request};
use crate::lifecycle::ScheduleManager;
use crate::model::{
    AcademicYear, AssignmentInput, AssignmentPatch, CloneScope, Entity, SearchFilter, Semester,
};
use crate::store;
use serde_json::json;

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, catalog, settings) = match context(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let input: AssignmentInput = match params_as(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match ScheduleManager::new(conn, &catalog, &settings).create(input) {
        Ok(stored) => ok(&req.id, json!(stored)),
        Err(e) => schedule_err(&req.id, &e),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, catalog, settings) = match context(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch: AssignmentPatch = match field(req, "patch") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match ScheduleManager::new(conn, &catalog, &settings).update(&id, patch) {
        Ok(stored) => ok(&req.id, json!(stored)),
        Err(e) => schedule_err(&req.id, &e),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, catalog, settings) = match context(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let soft = match optional_bool(req, "soft", false) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match ScheduleManager::new(conn, &catalog, &settings).delete(&id, soft) {
        Ok(()) => ok(&req.id, json!({ "id": id, "archived": soft, "deleted": !soft })),
        Err(e) => schedule_err(&req.id, &e),
    }
}

fn handle_restore(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, catalog, settings) = match context(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match ScheduleManager::new(conn, &catalog, &settings).restore(&id) {
        Ok(stored) => ok(&req.id, json!(stored)),
        Err(e) => schedule_err(&req.id, &e),
    }
}

fn handle_bulk_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, catalog, settings) = match context(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let items: Vec<AssignmentInput> = match field(req, "items") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if items.is_empty() {
        return err(&req.id, "bad_params", "items must not be empty", None);
    }
    match ScheduleManager::new(conn, &catalog, &settings).bulk_create(items) {
        Ok(stored) => ok(&req.id, json!({ "created": stored })),
        Err(e) => schedule_err(&req.id, &e),
    }
}

fn handle_search(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, _, _) = match context(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let filter: SearchFilter = if req.params.is_null() {
        SearchFilter::default()
    } else {
        match params_as(req) {
            Ok(v) => v,
            Err(e) => return e,
        }
    };
    match store::search(conn, &filter) {
        Ok(rows) => ok(&req.id, json!({ "assignments": rows })),
        Err(e) => schedule_err(&req.id, &e),
    }
}

fn handle_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, _, _) = match context(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store::require(conn, &id) {
        Ok(a) => ok(&req.id, json!({ "assignment": a })),
        Err(e) => schedule_err(&req.id, &e),
    }
}

fn handle_clone(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, catalog, settings) = match context(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let source: CloneScope = match field(req, "source") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let target: CloneScope = match field(req, "target") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match ScheduleManager::new(conn, &catalog, &settings).clone_schedule(&source, &target) {
        Ok(outcome) => ok(&req.id, json!(outcome)),
        Err(e) => schedule_err(&req.id, &e),
    }
}

fn handle_archive(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, catalog, settings) = match context(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let academic_year: AcademicYear = match field(req, "academicYear") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let semester: Option<Semester> = match optional_field(req, "semester") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match ScheduleManager::new(conn, &catalog, &settings).archive(&academic_year, semester) {
        Ok(changed) => ok(&req.id, json!({ "archived": changed })),
        Err(e) => schedule_err(&req.id, &e),
    }
}

fn handle_check_conflicts(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, catalog, settings) = match context(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let input: AssignmentInput = match field(req, "candidate") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let exclude_id: Option<String> = match optional_field(req, "excludeId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let candidate = input.into_assignment(exclude_id.clone().unwrap_or_else(|| "candidate".to_string()));
    match ScheduleManager::new(conn, &catalog, &settings).check_candidate(&candidate, exclude_id.as_deref()) {
        Ok(conflicts) => ok(
            &req.id,
            json!({ "blocking": has_blocking(&conflicts), "conflicts": conflicts }),
        ),
        Err(e) => schedule_err(&req.id, &e),
    }
}

fn handle_detect_conflicts(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, catalog, settings) = match context(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let term = match term(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match ScheduleManager::new(conn, &catalog, &settings).detect_scope(&term) {
        Ok(conflicts) => ok(&req.id, json!({ "conflicts": conflicts })),
        Err(e) => schedule_err(&req.id, &e),
    }
}

fn handle_available_slots(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, catalog, settings) = match context(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let term = match term(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let kind = match required_str(req, "entity") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let entity_id = match required_str(req, "entityId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let entity = match kind.to_ascii_lowercase().as_str() {
        "teacher" => Entity::Teacher(&entity_id),
        "classroom" => Entity::Classroom(&entity_id),
        _ => return err(&req.id, "bad_params", "entity must be teacher or classroom", None),
    };
    let day: DayOfWeek = match field(req, "dayOfWeek") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let week_of = match optional_date(req, "weekOf") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let rows = match store::load_term(conn, &term, false) {
        Ok(v) => v,
        Err(e) => return schedule_err(&req.id, &e),
    };

    let allocator = Allocator::new(&settings.grid, &catalog).for_week(week_of);
    let occupied = allocator.occupied_slots(entity, day, &term, &rows);
    match allocator.find_available_slots(entity, day, &term, &rows) {
        Ok(slots) => ok(&req.id, json!({ "slots": slots, "occupied": occupied })),
        Err(e) => schedule_err(&req.id, &e),
    }
}

fn handle_suggest(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, catalog, settings) = match context(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let term = match term(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let classroom_id = match required_str(req, "classroomId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let week_of = match optional_date(req, "weekOf") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let rows = match store::load_term(conn, &term, false) {
        Ok(v) => v,
        Err(e) => return schedule_err(&req.id, &e),
    };

    let allocator = Allocator::new(&settings.grid, &catalog).for_week(week_of);
    match allocator.suggest_assignment(
        &classroom_id,
        &subject_id,
        &teacher_id,
        &term,
        &rows,
        settings.subject_duplicate_policy,
    ) {
        Ok(slots) => ok(&req.id, json!({ "slots": slots })),
        Err(e) => schedule_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedules.create" => Some(handle_create(state, req)),
        "schedules.update" => Some(handle_update(state, req)),
        "schedules.delete" => Some(handle_delete(state, req)),
        "schedules.restore" => Some(handle_restore(state, req)),
        "schedules.bulkCreate" => Some(handle_bulk_create(state, req)),
        "schedules.search" => Some(handle_search(state, req)),
        "schedules.open" => Some(handle_open(state, req)),
        "schedules.clone" => Some(handle_clone(state, req)),
        "schedules.archive" => Some(handle_archive(state, req)),
        "schedules.checkConflicts" => Some(handle_check_conflicts(state, req)),
        "schedules.detectConflicts" => Some(handle_detect_conflicts(state, req)),
        "schedules.availableSlots" => Some(handle_available_slots(state, req)),
        "schedules.suggest" => Some(handle_suggest(state, req)),
        _ => None,
    }
}
