//! Query contracts of the external catalogs and the academic calendar.
//!
//! The scheduling core never owns classroom, teacher or subject records. It
//! reads them through these traits; every lookup answers with an explicit
//! `Option` so a missing record is a value, not a hazard.

use crate::error::ScheduleResult;
use crate::model::{AcademicYear, Semester, Term};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassroomInfo {
    pub id: String,
    pub name: Option<String>,
    pub capacity: u32,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherInfo {
    pub id: String,
    pub name: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectInfo {
    pub id: String,
    pub name: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermBounds {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

pub trait ClassroomCatalog {
    fn classroom(&self, id: &str) -> ScheduleResult<Option<ClassroomInfo>>;
    fn classrooms(&self) -> ScheduleResult<Vec<ClassroomInfo>>;
}

pub trait TeacherCatalog {
    fn teacher(&self, id: &str) -> ScheduleResult<Option<TeacherInfo>>;
    fn teachers(&self) -> ScheduleResult<Vec<TeacherInfo>>;
}

pub trait SubjectCatalog {
    fn subject(&self, id: &str) -> ScheduleResult<Option<SubjectInfo>>;
}

pub trait AcademicCalendar {
    fn is_holiday(&self, date: NaiveDate) -> ScheduleResult<bool>;
    fn is_teaching_period(&self, date: NaiveDate) -> ScheduleResult<bool>;
    fn term_bounds(&self, term: &Term) -> ScheduleResult<Option<TermBounds>>;
}

/// Everything the scheduling core consumes, as one object.
pub trait Catalog: ClassroomCatalog + TeacherCatalog + SubjectCatalog + AcademicCalendar {}

impl<T> Catalog for T where T: ClassroomCatalog + TeacherCatalog + SubjectCatalog + AcademicCalendar {}

const DATE_FMT: &str = "%Y-%m-%d";

/// Catalog view over the snapshot tables of a workspace database.
pub struct SqliteCatalog<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteCatalog<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

fn classroom_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<ClassroomInfo> {
    Ok(ClassroomInfo {
        id: r.get(0)?,
        name: r.get(1)?,
        capacity: r.get::<_, i64>(2)?.clamp(0, i64::from(u32::MAX)) as u32,
        is_active: r.get::<_, i64>(3)? != 0,
    })
}

impl ClassroomCatalog for SqliteCatalog<'_> {
    fn classroom(&self, id: &str) -> ScheduleResult<Option<ClassroomInfo>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, capacity, is_active FROM catalog_classrooms WHERE id = ?",
                [id],
                classroom_from_row,
            )
            .optional()?)
    }

    fn classrooms(&self) -> ScheduleResult<Vec<ClassroomInfo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, capacity, is_active FROM catalog_classrooms ORDER BY id")?;
        let rows = stmt
            .query_map([], classroom_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl TeacherCatalog for SqliteCatalog<'_> {
    fn teacher(&self, id: &str) -> ScheduleResult<Option<TeacherInfo>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, is_active FROM catalog_teachers WHERE id = ?",
                [id],
                |r| {
                    Ok(TeacherInfo {
                        id: r.get(0)?,
                        name: r.get(1)?,
                        is_active: r.get::<_, i64>(2)? != 0,
                    })
                },
            )
            .optional()?)
    }

    fn teachers(&self) -> ScheduleResult<Vec<TeacherInfo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, is_active FROM catalog_teachers ORDER BY id")?;
        let rows = stmt
            .query_map([], |r| {
                Ok(TeacherInfo {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    is_active: r.get::<_, i64>(2)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl SubjectCatalog for SqliteCatalog<'_> {
    fn subject(&self, id: &str) -> ScheduleResult<Option<SubjectInfo>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, is_active FROM catalog_subjects WHERE id = ?",
                [id],
                |r| {
                    Ok(SubjectInfo {
                        id: r.get(0)?,
                        name: r.get(1)?,
                        is_active: r.get::<_, i64>(2)? != 0,
                    })
                },
            )
            .optional()?)
    }
}

impl AcademicCalendar for SqliteCatalog<'_> {
    fn is_holiday(&self, date: NaiveDate) -> ScheduleResult<bool> {
        let day = date.format(DATE_FMT).to_string();
        let hit = self
            .conn
            .query_row(
                "SELECT 1 FROM calendar_holidays WHERE day = ? LIMIT 1",
                [day],
                |_r| Ok(()),
            )
            .optional()?;
        Ok(hit.is_some())
    }

    /// A date is a teaching day when some term covers it and it is not a holiday.
    fn is_teaching_period(&self, date: NaiveDate) -> ScheduleResult<bool> {
        let day = date.format(DATE_FMT).to_string();
        // ISO dates compare correctly as text.
        let in_term = self
            .conn
            .query_row(
                "SELECT 1 FROM calendar_terms WHERE start_date <= ?1 AND end_date >= ?1 LIMIT 1",
                [&day],
                |_r| Ok(()),
            )
            .optional()?
            .is_some();
        Ok(in_term && !self.is_holiday(date)?)
    }

    fn term_bounds(&self, term: &Term) -> ScheduleResult<Option<TermBounds>> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT start_date, end_date FROM calendar_terms
                 WHERE academic_year = ? AND semester = ?",
                params![term.academic_year.as_str(), u8::from(term.semester)],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        let Some((start, end)) = row else {
            return Ok(None);
        };
        // Rows are validated on sync; an unparsable one reads as absent.
        match (
            NaiveDate::parse_from_str(&start, DATE_FMT),
            NaiveDate::parse_from_str(&end, DATE_FMT),
        ) {
            (Ok(start), Ok(end)) => Ok(Some(TermBounds { start, end })),
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermCalendar {
    pub academic_year: AcademicYear,
    pub semester: Semester,
    pub bounds: TermBounds,
}

/// A full replacement of the catalog and calendar tables.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub classrooms: Vec<ClassroomInfo>,
    pub teachers: Vec<TeacherInfo>,
    pub subjects: Vec<SubjectInfo>,
    pub holidays: Vec<(NaiveDate, Option<String>)>,
    pub terms: Vec<TermCalendar>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCounts {
    pub classrooms: usize,
    pub teachers: usize,
    pub subjects: usize,
    pub holidays: usize,
    pub terms: usize,
}

pub fn replace_snapshot(conn: &Connection, snapshot: &CatalogSnapshot) -> ScheduleResult<SyncCounts> {
    let tx = conn.unchecked_transaction()?;
    for table in [
        "catalog_classrooms",
        "catalog_teachers",
        "catalog_subjects",
        "calendar_holidays",
        "calendar_terms",
    ] {
        tx.execute(&format!("DELETE FROM {}", table), [])?;
    }
    for c in &snapshot.classrooms {
        tx.execute(
            "INSERT INTO catalog_classrooms(id, name, capacity, is_active) VALUES(?, ?, ?, ?)",
            params![c.id, c.name, i64::from(c.capacity), c.is_active as i64],
        )?;
    }
    for t in &snapshot.teachers {
        tx.execute(
            "INSERT INTO catalog_teachers(id, name, is_active) VALUES(?, ?, ?)",
            params![t.id, t.name, t.is_active as i64],
        )?;
    }
    for s in &snapshot.subjects {
        tx.execute(
            "INSERT INTO catalog_subjects(id, name, is_active) VALUES(?, ?, ?)",
            params![s.id, s.name, s.is_active as i64],
        )?;
    }
    for (date, label) in &snapshot.holidays {
        tx.execute(
            "INSERT OR REPLACE INTO calendar_holidays(day, label) VALUES(?, ?)",
            params![date.format(DATE_FMT).to_string(), label],
        )?;
    }
    for t in &snapshot.terms {
        tx.execute(
            "INSERT OR REPLACE INTO calendar_terms(academic_year, semester, start_date, end_date)
             VALUES(?, ?, ?, ?)",
            params![
                t.academic_year.as_str(),
                u8::from(t.semester),
                t.bounds.start.format(DATE_FMT).to_string(),
                t.bounds.end.format(DATE_FMT).to_string()
            ],
        )?;
    }
    tx.commit()?;
    Ok(SyncCounts {
        classrooms: snapshot.classrooms.len(),
        teachers: snapshot.teachers.len(),
        subjects: snapshot.subjects.len(),
        holidays: snapshot.holidays.len(),
        terms: snapshot.terms.len(),
    })
}
