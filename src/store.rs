//! Row-level persistence of schedule assignments.
//!
//! Callers own the transaction; every function here runs on whatever
//! connection or transaction it is handed.

use crate::error::{ScheduleError, ScheduleResult};
use crate::grid::{ClockTime, DayOfWeek};
use crate::model::{AcademicYear, ScheduleAssignment, SearchFilter, Semester, Term};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::time::{SystemTime, UNIX_EPOCH};

const COLUMNS: &str = "id, classroom_id, teacher_id, subject_id, academic_year, semester,
    day_of_week, start_minute, end_minute, archived";

const ORDER: &str = "ORDER BY academic_year, semester, day_of_week, start_minute, classroom_id, id";

fn now_ts() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

fn conversion(idx: usize, ty: Type, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, msg.into())
}

fn assignment_from_row(r: &Row<'_>) -> rusqlite::Result<ScheduleAssignment> {
    let year: String = r.get(4)?;
    let semester: i64 = r.get(5)?;
    let day: i64 = r.get(6)?;
    let start: i64 = r.get(7)?;
    let end: i64 = r.get(8)?;

    let academic_year = AcademicYear::parse(&year).map_err(|e| conversion(4, Type::Text, e))?;
    let semester = u8::try_from(semester)
        .map_err(|e| e.to_string())
        .and_then(Semester::try_from)
        .map_err(|e| conversion(5, Type::Integer, e))?;
    let day_of_week = u8::try_from(day)
        .ok()
        .and_then(DayOfWeek::from_index)
        .ok_or_else(|| conversion(6, Type::Integer, format!("bad day index {}", day)))?;
    let minute = |idx: usize, v: i64| {
        u16::try_from(v)
            .ok()
            .and_then(ClockTime::from_minutes)
            .ok_or_else(|| conversion(idx, Type::Integer, format!("bad minute {}", v)))
    };

    Ok(ScheduleAssignment {
        id: r.get(0)?,
        classroom_id: r.get(1)?,
        teacher_id: r.get(2)?,
        subject_id: r.get(3)?,
        academic_year,
        semester,
        day_of_week,
        start_time: minute(7, start)?,
        end_time: minute(8, end)?,
        archived: r.get::<_, i64>(9)? != 0,
    })
}

pub fn insert(conn: &Connection, a: &ScheduleAssignment) -> ScheduleResult<()> {
    let ts = now_ts();
    conn.execute(
        "INSERT INTO schedule_assignments(
            id, classroom_id, teacher_id, subject_id, academic_year, semester,
            day_of_week, start_minute, end_minute, archived, created_at, updated_at
        ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            a.id,
            a.classroom_id,
            a.teacher_id,
            a.subject_id,
            a.academic_year.as_str(),
            u8::from(a.semester),
            a.day_of_week.index(),
            a.start_time.minutes(),
            a.end_time.minutes(),
            a.archived as i64,
            ts,
            ts
        ],
    )?;
    Ok(())
}

pub fn update(conn: &Connection, a: &ScheduleAssignment) -> ScheduleResult<()> {
    let changed = conn.execute(
        "UPDATE schedule_assignments
         SET classroom_id = ?, teacher_id = ?, subject_id = ?, academic_year = ?, semester = ?,
             day_of_week = ?, start_minute = ?, end_minute = ?, archived = ?, updated_at = ?
         WHERE id = ?",
        params![
            a.classroom_id,
            a.teacher_id,
            a.subject_id,
            a.academic_year.as_str(),
            u8::from(a.semester),
            a.day_of_week.index(),
            a.start_time.minutes(),
            a.end_time.minutes(),
            a.archived as i64,
            now_ts(),
            a.id
        ],
    )?;
    if changed == 0 {
        return Err(ScheduleError::not_found("assignment", &a.id));
    }
    Ok(())
}

pub fn delete(conn: &Connection, id: &str) -> ScheduleResult<()> {
    let changed = conn.execute("DELETE FROM schedule_assignments WHERE id = ?", [id])?;
    if changed == 0 {
        return Err(ScheduleError::not_found("assignment", id));
    }
    Ok(())
}

pub fn set_archived(conn: &Connection, id: &str, archived: bool) -> ScheduleResult<()> {
    let changed = conn.execute(
        "UPDATE schedule_assignments SET archived = ?, updated_at = ? WHERE id = ?",
        params![archived as i64, now_ts(), id],
    )?;
    if changed == 0 {
        return Err(ScheduleError::not_found("assignment", id));
    }
    Ok(())
}

/// Archives every live row of a year, or of one semester of it.
/// Returns how many rows changed; a second call returns 0.
pub fn archive_term(
    conn: &Connection,
    academic_year: &AcademicYear,
    semester: Option<Semester>,
) -> ScheduleResult<usize> {
    let ts = now_ts();
    let changed = match semester {
        Some(s) => conn.execute(
            "UPDATE schedule_assignments SET archived = 1, updated_at = ?
             WHERE academic_year = ? AND semester = ? AND archived = 0",
            params![ts, academic_year.as_str(), u8::from(s)],
        )?,
        None => conn.execute(
            "UPDATE schedule_assignments SET archived = 1, updated_at = ?
             WHERE academic_year = ? AND archived = 0",
            params![ts, academic_year.as_str()],
        )?,
    };
    Ok(changed)
}

pub fn get(conn: &Connection, id: &str) -> ScheduleResult<Option<ScheduleAssignment>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM schedule_assignments WHERE id = ?", COLUMNS),
            [id],
            assignment_from_row,
        )
        .optional()?)
}

pub fn require(conn: &Connection, id: &str) -> ScheduleResult<ScheduleAssignment> {
    get(conn, id)?.ok_or_else(|| ScheduleError::not_found("assignment", id))
}

/// The scoped slice every check runs against: one term, freshly read.
pub fn load_term(conn: &Connection, term: &Term, include_archived: bool) -> ScheduleResult<Vec<ScheduleAssignment>> {
    search(
        conn,
        &SearchFilter {
            academic_year: Some(term.academic_year.clone()),
            semester: Some(term.semester),
            include_archived,
            ..SearchFilter::default()
        },
    )
}

pub fn search(conn: &Connection, filter: &SearchFilter) -> ScheduleResult<Vec<ScheduleAssignment>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut binds: Vec<Value> = Vec::new();
    if let Some(v) = &filter.classroom_id {
        clauses.push("classroom_id = ?");
        binds.push(Value::Text(v.clone()));
    }
    if let Some(v) = &filter.teacher_id {
        clauses.push("teacher_id = ?");
        binds.push(Value::Text(v.clone()));
    }
    if let Some(v) = &filter.subject_id {
        clauses.push("subject_id = ?");
        binds.push(Value::Text(v.clone()));
    }
    if let Some(v) = &filter.academic_year {
        clauses.push("academic_year = ?");
        binds.push(Value::Text(v.as_str().to_string()));
    }
    if let Some(v) = filter.semester {
        clauses.push("semester = ?");
        binds.push(Value::Integer(i64::from(u8::from(v))));
    }
    if let Some(v) = filter.day_of_week {
        clauses.push("day_of_week = ?");
        binds.push(Value::Integer(i64::from(v.index())));
    }
    if !filter.include_archived {
        clauses.push("archived = 0");
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!("SELECT {} FROM schedule_assignments {} {}", COLUMNS, where_sql, ORDER);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(binds), assignment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn row(id: &str, room: &str, teacher: &str, day: DayOfWeek, start: &str) -> ScheduleAssignment {
        let start = ClockTime::parse(start).expect("start");
        ScheduleAssignment {
            id: id.into(),
            classroom_id: room.into(),
            teacher_id: teacher.into(),
            subject_id: "MATH".into(),
            academic_year: AcademicYear::parse("2024/2025").expect("year"),
            semester: Semester::First,
            day_of_week: day,
            start_time: start,
            end_time: ClockTime::from_minutes(start.minutes() + 45).expect("end"),
            archived: false,
        }
    }

    #[test]
    fn insert_get_update_delete() {
        let conn = db::open_in_memory();
        let a = row("a", "C1", "T1", DayOfWeek::Monday, "08:00");
        insert(&conn, &a).expect("insert");
        assert_eq!(get(&conn, "a").expect("get"), Some(a.clone()));

        let moved = row("a", "C2", "T1", DayOfWeek::Friday, "15:00");
        update(&conn, &moved).expect("update");
        assert_eq!(require(&conn, "a").expect("get").classroom_id, "C2");

        delete(&conn, "a").expect("delete");
        assert!(get(&conn, "a").expect("get").is_none());
        assert_eq!(delete(&conn, "a").expect_err("gone").code(), "not_found");
    }

    #[test]
    fn unique_index_rejects_same_start_for_live_rows_only() {
        let conn = db::open_in_memory();
        insert(&conn, &row("a", "C1", "T1", DayOfWeek::Monday, "08:00")).expect("insert");
        let e = insert(&conn, &row("b", "C1", "T2", DayOfWeek::Monday, "08:00")).expect_err("dup");
        assert_eq!(e.code(), "concurrency_conflict");

        set_archived(&conn, "a", true).expect("archive");
        insert(&conn, &row("b", "C1", "T2", DayOfWeek::Monday, "08:00")).expect("insert after archive");
    }

    #[test]
    fn archive_term_is_idempotent_and_search_filters() {
        let conn = db::open_in_memory();
        insert(&conn, &row("a", "C1", "T1", DayOfWeek::Tuesday, "09:00")).expect("insert");
        insert(&conn, &row("b", "C1", "T2", DayOfWeek::Monday, "08:00")).expect("insert");
        insert(&conn, &row("c", "C2", "T1", DayOfWeek::Monday, "10:00")).expect("insert");

        let by_room = search(
            &conn,
            &SearchFilter {
                classroom_id: Some("C1".into()),
                ..SearchFilter::default()
            },
        )
        .expect("search");
        let ids: Vec<&str> = by_room.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let year = AcademicYear::parse("2024/2025").expect("year");
        assert_eq!(archive_term(&conn, &year, Some(Semester::First)).expect("archive"), 3);
        assert_eq!(archive_term(&conn, &year, None).expect("archive again"), 0);

        let term = Term {
            academic_year: year,
            semester: Semester::First,
        };
        assert!(load_term(&conn, &term, false).expect("live").is_empty());
        let all = load_term(&conn, &term, true).expect("all");
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|a| a.archived));
    }

    #[test]
    fn corrupt_day_index_is_a_storage_error() {
        let conn = db::open_in_memory();
        conn.execute(
            "INSERT INTO schedule_assignments VALUES('z', 'C1', 'T1', 'MATH', '2024/2025', 1, 9, 480, 525, 0, '0', '0')",
            [],
        )
        .expect("raw insert");
        assert_eq!(get(&conn, "z").expect_err("bad day").code(), "db_error");
    }
}
