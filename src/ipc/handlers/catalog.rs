use crate::catalog::{
    replace_snapshot, CatalogSnapshot, ClassroomInfo, SubjectInfo, TeacherInfo, TermBounds,
    TermCalendar,
};
use crate::ipc::error::{err, ok, schedule_err};
use crate::ipc::helpers::{db_conn, params_as, parse_date};
use crate::ipc::types::{AppState, Request};
use crate::model::{AcademicYear, Semester};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassroomRow {
    id: String,
    name: Option<String>,
    #[serde(default)]
    capacity: u32,
    #[serde(default = "active_default")]
    is_active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamedRow {
    id: String,
    name: Option<String>,
    #[serde(default = "active_default")]
    is_active: bool,
}

#[derive(Debug, Deserialize)]
struct HolidayRow {
    date: String,
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TermRow {
    academic_year: AcademicYear,
    semester: Semester,
    start_date: String,
    end_date: String,
}

#[derive(Debug, Deserialize)]
struct SyncParams {
    #[serde(default)]
    classrooms: Vec<ClassroomRow>,
    #[serde(default)]
    teachers: Vec<NamedRow>,
    #[serde(default)]
    subjects: Vec<NamedRow>,
    #[serde(default)]
    holidays: Vec<HolidayRow>,
    #[serde(default)]
    terms: Vec<TermRow>,
}

fn active_default() -> bool {
    true
}

fn ensure_unique<'a>(kind: &str, ids: impl Iterator<Item = &'a str>) -> Result<(), String> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(format!("duplicate {} id: {}", kind, id));
        }
    }
    Ok(())
}

fn to_snapshot(p: SyncParams) -> Result<CatalogSnapshot, String> {
    ensure_unique("classroom", p.classrooms.iter().map(|c| c.id.as_str()))?;
    ensure_unique("teacher", p.teachers.iter().map(|t| t.id.as_str()))?;
    ensure_unique("subject", p.subjects.iter().map(|s| s.id.as_str()))?;
    let mut holidays = Vec::with_capacity(p.holidays.len());
    for h in p.holidays {
        let date = parse_date(&h.date).ok_or_else(|| format!("holiday date {:?} must be YYYY-MM-DD", h.date))?;
        holidays.push((date, h.label));
    }
    let mut terms = Vec::with_capacity(p.terms.len());
    for t in p.terms {
        let start = parse_date(&t.start_date)
            .ok_or_else(|| format!("term startDate {:?} must be YYYY-MM-DD", t.start_date))?;
        let end = parse_date(&t.end_date)
            .ok_or_else(|| format!("term endDate {:?} must be YYYY-MM-DD", t.end_date))?;
        if end < start {
            return Err(format!("term {} semester {} ends before it starts", t.academic_year, u8::from(t.semester)));
        }
        terms.push(TermCalendar {
            academic_year: t.academic_year,
            semester: t.semester,
            bounds: TermBounds { start, end },
        });
    }
    Ok(CatalogSnapshot {
        classrooms: p
            .classrooms
            .into_iter()
            .map(|c| ClassroomInfo {
                id: c.id,
                name: c.name,
                capacity: c.capacity,
                is_active: c.is_active,
            })
            .collect(),
        teachers: p
            .teachers
            .into_iter()
            .map(|t| TeacherInfo {
                id: t.id,
                name: t.name,
                is_active: t.is_active,
            })
            .collect(),
        subjects: p
            .subjects
            .into_iter()
            .map(|s| SubjectInfo {
                id: s.id,
                name: s.name,
                is_active: s.is_active,
            })
            .collect(),
        holidays,
        terms,
    })
}

fn handle_catalog_sync(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let parsed: SyncParams = match params_as(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let snapshot = match to_snapshot(parsed) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    match replace_snapshot(conn, &snapshot) {
        Ok(counts) => {
            tracing::info!(
                classrooms = counts.classrooms,
                teachers = counts.teachers,
                subjects = counts.subjects,
                "catalog synced"
            );
            ok(&req.id, json!({ "counts": counts }))
        }
        Err(e) => schedule_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "catalog.sync" => Some(handle_catalog_sync(state, req)),
        _ => None,
    }
}
