use crate::catalog::Catalog;
use crate::error::{ScheduleError, ScheduleResult};
use crate::grid::{overlaps, DayOfWeek, TimeGrid, TimeSlot};
use crate::model::{ScheduleAssignment, ScopeKind, Term};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableCell {
    pub day_of_week: DayOfWeek,
    /// One-based position within the day.
    pub period: usize,
    pub slot: TimeSlot,
    pub assignments: Vec<ScheduleAssignment>,
}

/// Read-only weekly projection for one classroom, teacher or subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timetable {
    pub scope: ScopeKind,
    pub scope_id: String,
    #[serde(flatten)]
    pub term: Term,
    pub cells: Vec<TimetableCell>,
    /// Assignments that touch no grid period at all.
    pub off_grid: Vec<ScheduleAssignment>,
}

fn ensure_scope_exists(catalog: &dyn Catalog, scope: ScopeKind, scope_id: &str) -> ScheduleResult<()> {
    let found = match scope {
        ScopeKind::Classroom => catalog.classroom(scope_id)?.is_some(),
        ScopeKind::Teacher => catalog.teacher(scope_id)?.is_some(),
        ScopeKind::Subject => catalog.subject(scope_id)?.is_some(),
    };
    if found {
        Ok(())
    } else {
        let entity = match scope {
            ScopeKind::Classroom => "classroom",
            ScopeKind::Teacher => "teacher",
            ScopeKind::Subject => "subject",
        };
        Err(ScheduleError::not_found(entity, scope_id))
    }
}

pub fn build(
    scope: ScopeKind,
    scope_id: &str,
    term: &Term,
    assignments: &[ScheduleAssignment],
    grid: &TimeGrid,
    catalog: &dyn Catalog,
) -> ScheduleResult<Timetable> {
    ensure_scope_exists(catalog, scope, scope_id)?;

    let mut mine: Vec<&ScheduleAssignment> = assignments
        .iter()
        .filter(|a| !a.archived && a.in_term(term) && scope.matches(scope_id, a))
        .collect();
    mine.sort_by(|a, b| {
        (a.day_of_week, a.start_time, &a.id).cmp(&(b.day_of_week, b.start_time, &b.id))
    });

    let mut cells = Vec::with_capacity(grid.slot_count());
    for day in grid.working_days() {
        for (idx, slot) in grid.periods_for(day).into_iter().enumerate() {
            let hits = mine
                .iter()
                .filter(|a| overlaps(&slot, &a.slot()))
                .map(|a| (*a).clone())
                .collect();
            cells.push(TimetableCell {
                day_of_week: day,
                period: idx + 1,
                slot,
                assignments: hits,
            });
        }
    }

    let off_grid = mine
        .iter()
        .filter(|a| {
            !grid
                .periods_for(a.day_of_week)
                .iter()
                .any(|p| overlaps(p, &a.slot()))
        })
        .map(|a| (*a).clone())
        .collect();

    Ok(Timetable {
        scope,
        scope_id: scope_id.to_string(),
        term: term.clone(),
        cells,
        off_grid,
    })
}
