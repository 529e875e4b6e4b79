use crate::catalog::Catalog;
use crate::error::{ScheduleError, ScheduleResult};
use crate::grid::{overlaps, DayOfWeek, TimeGrid, TimeSlot};
use crate::model::{Entity, ScheduleAssignment, SubjectDuplicatePolicy, Term};
use chrono::{Datelike, Duration as ChronoDuration, NaiveDate};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSlot {
    #[serde(flatten)]
    pub slot: TimeSlot,
    /// Year-long queries only: some date of this weekday in the term is a holiday.
    pub has_holiday_override: bool,
}

/// Free-time queries over the canonical grid.
pub struct Allocator<'a> {
    grid: &'a TimeGrid,
    catalog: &'a dyn Catalog,
    week_of: Option<NaiveDate>,
}

impl<'a> Allocator<'a> {
    pub fn new(grid: &'a TimeGrid, catalog: &'a dyn Catalog) -> Self {
        Self {
            grid,
            catalog,
            week_of: None,
        }
    }

    /// Pin queries to the week containing `date`; holidays then remove whole days.
    pub fn for_week(mut self, date: Option<NaiveDate>) -> Self {
        self.week_of = date;
        self
    }

    /// Grid slots of `day` overlapped by any live assignment of `entity` in `term`.
    pub fn occupied_slots(
        &self,
        entity: Entity<'_>,
        day: DayOfWeek,
        term: &Term,
        assignments: &[ScheduleAssignment],
    ) -> Vec<TimeSlot> {
        let busy = entity_slots(entity, day, term, assignments);
        self.grid
            .periods_for(day)
            .into_iter()
            .filter(|p| busy.iter().any(|b| overlaps(p, b)))
            .collect()
    }

    fn free_grid_slots(
        &self,
        entity: Entity<'_>,
        day: DayOfWeek,
        term: &Term,
        assignments: &[ScheduleAssignment],
    ) -> Vec<TimeSlot> {
        let busy = entity_slots(entity, day, term, assignments);
        self.grid
            .periods_for(day)
            .into_iter()
            .filter(|p| !busy.iter().any(|b| overlaps(p, b)))
            .collect()
    }

    pub fn find_available_slots(
        &self,
        entity: Entity<'_>,
        day: DayOfWeek,
        term: &Term,
        assignments: &[ScheduleAssignment],
    ) -> ScheduleResult<Vec<AvailableSlot>> {
        let free = self.free_grid_slots(entity, day, term, assignments);
        if free.is_empty() {
            return Ok(Vec::new());
        }
        let has_holiday_override = match self.week_of {
            Some(anchor) => {
                let date = date_in_week(anchor, day);
                if self.catalog.is_holiday(date)? || !self.catalog.is_teaching_period(date)? {
                    return Ok(Vec::new());
                }
                false
            }
            None => self.term_has_holiday_on(term, day)?,
        };
        Ok(free
            .into_iter()
            .map(|slot| AvailableSlot {
                slot,
                has_holiday_override,
            })
            .collect())
    }

    fn term_has_holiday_on(&self, term: &Term, day: DayOfWeek) -> ScheduleResult<bool> {
        let Some(bounds) = self.catalog.term_bounds(term)? else {
            return Ok(false);
        };
        let mut date = bounds.start;
        let target = day.index() as i64;
        let offset = (target - date.weekday().num_days_from_monday() as i64).rem_euclid(7);
        date += ChronoDuration::days(offset);
        while date <= bounds.end {
            if self.catalog.is_holiday(date)? {
                return Ok(true);
            }
            date += ChronoDuration::days(7);
        }
        Ok(false)
    }

    /// Slots of every working day where both teacher and classroom are free.
    pub fn common_free_slots(
        &self,
        classroom_id: &str,
        teacher_id: &str,
        term: &Term,
        assignments: &[ScheduleAssignment],
    ) -> ScheduleResult<Vec<TimeSlot>> {
        let mut out = Vec::new();
        for day in self.grid.working_days() {
            let teacher = self.find_available_slots(Entity::Teacher(teacher_id), day, term, assignments)?;
            if teacher.is_empty() {
                continue;
            }
            let room = self.find_available_slots(Entity::Classroom(classroom_id), day, term, assignments)?;
            out.extend(
                teacher
                    .iter()
                    .filter(|t| room.iter().any(|r| r.slot == t.slot))
                    .map(|t| t.slot),
            );
        }
        Ok(out)
    }

    /// Candidate slots for a new (classroom, subject, teacher) assignment.
    ///
    /// Unknown references fail; inactive ones are rejected. An empty result
    /// means there is no common free slot.
    pub fn suggest_assignment(
        &self,
        classroom_id: &str,
        subject_id: &str,
        teacher_id: &str,
        term: &Term,
        assignments: &[ScheduleAssignment],
        policy: SubjectDuplicatePolicy,
    ) -> ScheduleResult<Vec<TimeSlot>> {
        let classroom = self
            .catalog
            .classroom(classroom_id)?
            .ok_or_else(|| ScheduleError::not_found("classroom", classroom_id))?;
        let teacher = self
            .catalog
            .teacher(teacher_id)?
            .ok_or_else(|| ScheduleError::not_found("teacher", teacher_id))?;
        let subject = self
            .catalog
            .subject(subject_id)?
            .ok_or_else(|| ScheduleError::not_found("subject", subject_id))?;
        if !classroom.is_active || !teacher.is_active || !subject.is_active {
            return Err(ScheduleError::Validation(
                "classroom, teacher and subject must all be active".to_string(),
            ));
        }

        if policy == SubjectDuplicatePolicy::Enforce
            && assignments.iter().any(|a| {
                !a.archived
                    && a.in_term(term)
                    && a.classroom_id == classroom_id
                    && a.subject_id == subject_id
            })
        {
            return Ok(Vec::new());
        }
        self.common_free_slots(classroom_id, teacher_id, term, assignments)
    }
}

fn entity_slots(
    entity: Entity<'_>,
    day: DayOfWeek,
    term: &Term,
    assignments: &[ScheduleAssignment],
) -> Vec<TimeSlot> {
    assignments
        .iter()
        .filter(|a| !a.archived && a.in_term(term) && a.day_of_week == day && entity.owns(a))
        .map(ScheduleAssignment::slot)
        .collect()
}

/// The date of `day` in the Monday-based week containing `anchor`.
pub fn date_in_week(anchor: NaiveDate, day: DayOfWeek) -> NaiveDate {
    let monday = anchor - ChronoDuration::days(anchor.weekday().num_days_from_monday() as i64);
    monday + ChronoDuration::days(day.index() as i64)
}
