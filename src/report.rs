//! Aggregate statistics over a term snapshot and conflict resolution proposals.
//!
//! Nothing here fails for "no data": an empty snapshot yields zeroed or empty
//! reports, and a fruitless resolution search yields no candidates.

use crate::catalog::Catalog;
use crate::conflict::{has_blocking, Detector};
use crate::error::ScheduleResult;
use crate::grid::{overlaps, ClockTime, DayOfWeek, TimeGrid, TimeSlot};
use crate::model::{ScheduleAssignment, Term};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherWorkload {
    pub teacher_id: String,
    pub assignment_count: usize,
    pub minutes: u32,
    pub hours: f64,
    pub over_limit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassroomUtilization {
    pub classroom_id: String,
    pub occupied_cells: usize,
    pub total_cells: usize,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DensityCell {
    pub day_of_week: DayOfWeek,
    pub period: usize,
    pub slot: TimeSlot,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakPeriod {
    pub period: usize,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub count: usize,
}

fn live_in_term<'a>(
    term: &'a Term,
    assignments: &'a [ScheduleAssignment],
) -> impl Iterator<Item = &'a ScheduleAssignment> + 'a {
    assignments.iter().filter(move |a| !a.archived && a.in_term(term))
}

fn rounded_hours(minutes: u32) -> f64 {
    (f64::from(minutes) / 60.0 * 100.0).round() / 100.0
}

/// Weekly teaching load per teacher, heaviest first.
///
/// Active catalog teachers with nothing scheduled are listed at zero so idle
/// staff show up next to overloaded staff.
pub fn workload(
    term: &Term,
    assignments: &[ScheduleAssignment],
    catalog: &dyn Catalog,
    max_weekly_hours: u32,
) -> ScheduleResult<Vec<TeacherWorkload>> {
    let mut by_teacher: BTreeMap<String, (usize, u32)> = BTreeMap::new();
    for t in catalog.teachers()? {
        if t.is_active {
            by_teacher.entry(t.id).or_default();
        }
    }
    for a in live_in_term(term, assignments) {
        let e = by_teacher.entry(a.teacher_id.clone()).or_default();
        e.0 += 1;
        e.1 += a.duration_minutes();
    }

    let limit = max_weekly_hours * 60;
    let mut rows: Vec<TeacherWorkload> = by_teacher
        .into_iter()
        .map(|(teacher_id, (assignment_count, minutes))| TeacherWorkload {
            teacher_id,
            assignment_count,
            minutes,
            hours: rounded_hours(minutes),
            over_limit: minutes > limit,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.minutes
            .cmp(&a.minutes)
            .then_with(|| a.teacher_id.cmp(&b.teacher_id))
    });
    Ok(rows)
}

/// Occupied grid cells over total grid cells, per classroom.
pub fn utilization(
    term: &Term,
    assignments: &[ScheduleAssignment],
    grid: &TimeGrid,
    catalog: &dyn Catalog,
) -> ScheduleResult<Vec<ClassroomUtilization>> {
    let mut rooms: BTreeMap<String, Vec<TimeSlot>> = BTreeMap::new();
    for c in catalog.classrooms()? {
        if c.is_active {
            rooms.entry(c.id).or_default();
        }
    }
    for a in live_in_term(term, assignments) {
        rooms.entry(a.classroom_id.clone()).or_default().push(a.slot());
    }

    let cells = grid.all_slots();
    let total_cells = cells.len();
    Ok(rooms
        .into_iter()
        .map(|(classroom_id, busy)| {
            let occupied_cells = cells
                .iter()
                .filter(|cell| busy.iter().any(|b| overlaps(cell, b)))
                .count();
            let ratio = if total_cells == 0 {
                0.0
            } else {
                occupied_cells as f64 / total_cells as f64
            };
            ClassroomUtilization {
                classroom_id,
                occupied_cells,
                total_cells,
                ratio,
            }
        })
        .collect())
}

/// Assignments per grid cell across all classrooms, in grid order.
pub fn density(term: &Term, assignments: &[ScheduleAssignment], grid: &TimeGrid) -> Vec<DensityCell> {
    let live: Vec<&ScheduleAssignment> = live_in_term(term, assignments).collect();
    let mut out = Vec::with_capacity(grid.slot_count());
    for day in grid.working_days() {
        for (idx, slot) in grid.periods_for(day).into_iter().enumerate() {
            let count = live.iter().filter(|a| overlaps(&slot, &a.slot())).count();
            out.push(DensityCell {
                day_of_week: day,
                period: idx + 1,
                slot,
                count,
            });
        }
    }
    out
}

/// Busiest period windows summed across days, busiest first.
///
/// Cells are grouped by their actual start and end, so a day with its own
/// period list reports its real times. `period` is the earliest one-based
/// position the window holds on any day. Ties keep the earlier window first.
pub fn peak_hours(
    term: &Term,
    assignments: &[ScheduleAssignment],
    grid: &TimeGrid,
    top: usize,
) -> Vec<PeakPeriod> {
    let mut totals: BTreeMap<(ClockTime, ClockTime), (usize, usize)> = BTreeMap::new();
    for cell in density(term, assignments, grid) {
        let entry = totals
            .entry((cell.slot.start_time, cell.slot.end_time))
            .or_insert((cell.period, 0));
        entry.0 = entry.0.min(cell.period);
        entry.1 += cell.count;
    }
    let mut peaks: Vec<PeakPeriod> = totals
        .into_iter()
        .map(|((start_time, end_time), (period, count))| PeakPeriod {
            period,
            start_time,
            end_time,
            count,
        })
        .collect();
    // The map already yields windows in time order; a stable sort keeps it for ties.
    peaks.sort_by(|a, b| b.count.cmp(&a.count));
    peaks.truncate(top);
    peaks
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionStrategy {
    ReassignRoom,
    ReassignTime,
    ReassignTeacher,
}

impl ResolutionStrategy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "REASSIGN_ROOM" => Some(Self::ReassignRoom),
            "REASSIGN_TIME" => Some(Self::ReassignTime),
            "REASSIGN_TEACHER" => Some(Self::ReassignTeacher),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionCandidate {
    pub original_id: String,
    pub strategy: ResolutionStrategy,
    pub replacement: ScheduleAssignment,
}

pub struct Resolver<'a> {
    grid: &'a TimeGrid,
    catalog: &'a dyn Catalog,
    detector: Detector,
    max_per_item: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(grid: &'a TimeGrid, catalog: &'a dyn Catalog, detector: Detector, max_per_item: usize) -> Self {
        Self {
            grid,
            catalog,
            detector,
            max_per_item,
        }
    }

    /// Replacement candidates for each conflicting id under `strategy`.
    /// Unknown or archived ids contribute nothing.
    pub fn propose_resolutions(
        &self,
        conflicting_ids: &[String],
        strategy: ResolutionStrategy,
        assignments: &[ScheduleAssignment],
    ) -> ScheduleResult<Vec<ResolutionCandidate>> {
        let mut out = Vec::new();
        for id in conflicting_ids {
            let Some(original) = assignments.iter().find(|a| &a.id == id && !a.archived) else {
                continue;
            };
            let variants = match strategy {
                ResolutionStrategy::ReassignRoom => self.room_variants(original)?,
                ResolutionStrategy::ReassignTime => self.time_variants(original),
                ResolutionStrategy::ReassignTeacher => self.teacher_variants(original)?,
            };
            let accepted = variants
                .into_iter()
                .filter(|v| {
                    let found = self.detector.find_conflicts(v, assignments, Some(&original.id));
                    !has_blocking(&found)
                })
                .take(self.max_per_item)
                .map(|replacement| ResolutionCandidate {
                    original_id: original.id.clone(),
                    strategy,
                    replacement,
                });
            out.extend(accepted);
        }
        Ok(out)
    }

    fn room_variants(&self, original: &ScheduleAssignment) -> ScheduleResult<Vec<ScheduleAssignment>> {
        let needed = self
            .catalog
            .classroom(&original.classroom_id)?
            .map(|c| c.capacity)
            .unwrap_or(0);
        Ok(self
            .catalog
            .classrooms()?
            .into_iter()
            .filter(|c| c.is_active && c.id != original.classroom_id && c.capacity >= needed)
            .map(|c| ScheduleAssignment {
                classroom_id: c.id,
                ..original.clone()
            })
            .collect())
    }

    fn time_variants(&self, original: &ScheduleAssignment) -> Vec<ScheduleAssignment> {
        let current = original.slot();
        self.grid
            .all_slots()
            .into_iter()
            .filter(|s| *s != current)
            .map(|s| original.clone().with_slot(s))
            .collect()
    }

    fn teacher_variants(&self, original: &ScheduleAssignment) -> ScheduleResult<Vec<ScheduleAssignment>> {
        Ok(self
            .catalog
            .teachers()?
            .into_iter()
            .filter(|t| t.is_active && t.id != original.teacher_id)
            .map(|t| ScheduleAssignment {
                teacher_id: t.id,
                ..original.clone()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testing::MemoryCatalog;
    use crate::grid::Period;
    use crate::model::{AcademicYear, Semester, SubjectDuplicatePolicy};
    use pretty_assertions::assert_eq;

    fn term() -> Term {
        Term {
            academic_year: AcademicYear::parse("2024/2025").expect("year"),
            semester: Semester::First,
        }
    }

    fn asg(
        id: &str,
        room: &str,
        teacher: &str,
        subject: &str,
        day: DayOfWeek,
        start: &str,
        end: &str,
    ) -> ScheduleAssignment {
        ScheduleAssignment {
            id: id.into(),
            classroom_id: room.into(),
            teacher_id: teacher.into(),
            subject_id: subject.into(),
            academic_year: term().academic_year,
            semester: term().semester,
            day_of_week: day,
            start_time: ClockTime::parse(start).expect("start"),
            end_time: ClockTime::parse(end).expect("end"),
            archived: false,
        }
    }

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::default()
            .with_classroom("C1", 30, true)
            .with_classroom("C2", 30, true)
            .with_classroom("C3", 20, true)
            .with_classroom("C4", 40, false)
            .with_teacher("T1", true)
            .with_teacher("T2", true)
            .with_teacher("T3", false)
            .with_subject("MATH", true)
            .with_subject("PHYS", true)
    }

    fn snapshot() -> Vec<ScheduleAssignment> {
        vec![
            asg("a", "C1", "T1", "MATH", DayOfWeek::Monday, "08:00", "08:45"),
            asg("b", "C2", "T1", "PHYS", DayOfWeek::Monday, "09:00", "10:30"),
            asg("c", "C1", "T2", "PHYS", DayOfWeek::Tuesday, "08:00", "08:45"),
            asg("d", "C2", "T2", "MATH", DayOfWeek::Monday, "08:00", "08:45"),
        ]
    }

    #[test]
    fn workload_sorts_heaviest_first_and_flags_overload() {
        let rows = workload(&term(), &snapshot(), &catalog(), 2).expect("workload");
        let summary: Vec<(String, u32, bool)> = rows
            .iter()
            .map(|r| (r.teacher_id.clone(), r.minutes, r.over_limit))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("T1".to_string(), 135, true),
                ("T2".to_string(), 90, false),
            ]
        );
        assert_eq!(rows[0].hours, 2.25);
    }

    #[test]
    fn utilization_counts_overlapped_cells_and_idle_rooms() {
        let rows = utilization(&term(), &snapshot(), &TimeGrid::default(), &catalog()).expect("util");
        let ids: Vec<&str> = rows.iter().map(|r| r.classroom_id.as_str()).collect();
        assert_eq!(ids, vec!["C1", "C2", "C3"]);
        assert_eq!(rows[0].occupied_cells, 2);
        // 09:00-10:30 touches the 09:00 and 10:00 periods.
        assert_eq!(rows[1].occupied_cells, 3);
        assert_eq!(rows[2].occupied_cells, 0);
        assert_eq!(rows[0].total_cells, 40);
        assert_eq!(rows[0].ratio, 2.0 / 40.0);
    }

    #[test]
    fn density_and_peaks() {
        let grid = TimeGrid::default();
        let cells = density(&term(), &snapshot(), &grid);
        assert_eq!(cells.len(), 40);
        assert_eq!(cells[0].count, 2);
        assert_eq!(cells[1].count, 1);

        let peaks = peak_hours(&term(), &snapshot(), &grid, 2);
        let got: Vec<(usize, usize)> = peaks.iter().map(|p| (p.period, p.count)).collect();
        assert_eq!(got, vec![(1, 3), (2, 1)]);
        assert_eq!(peaks[0].start_time.to_string(), "08:00");
    }

    #[test]
    fn peaks_use_the_real_times_of_overridden_days() {
        let t = |s: &str| ClockTime::parse(s).expect("time");
        let friday: Vec<Period> = (7..17)
            .map(|h| Period {
                start: t(&format!("{:02}:00", h)),
                end: t(&format!("{:02}:45", h)),
            })
            .collect();
        let mut overrides = BTreeMap::new();
        overrides.insert(DayOfWeek::Friday, friday);
        let grid = TimeGrid::new(5, crate::grid::default_periods(), overrides).expect("grid");

        let rows: Vec<ScheduleAssignment> = ["C1", "C2", "C3", "C4", "C5"]
            .iter()
            .enumerate()
            .map(|(i, room)| {
                asg(&format!("f{}", i), room, &format!("T{}", i), "MATH", DayOfWeek::Friday, "16:00", "16:30")
            })
            .collect();
        let peaks = peak_hours(&term(), &rows, &grid, 3);
        assert_eq!(peaks[0].start_time.to_string(), "16:00");
        assert_eq!(peaks[0].end_time.to_string(), "16:45");
        assert_eq!(peaks[0].period, 10);
        assert_eq!(peaks[0].count, 5);
        assert!(peaks[1..].iter().all(|p| p.count == 0));

        // Friday's 08:00 window matches the default first period and folds into it.
        let eight = peak_hours(&term(), &rows, &grid, 20)
            .into_iter()
            .find(|p| p.start_time.to_string() == "08:00")
            .expect("08:00 window");
        assert_eq!(eight.period, 1);
    }

    #[test]
    fn reassign_room_respects_capacity_and_activity() {
        let grid = TimeGrid::default();
        let cat = catalog();
        let mut rows = snapshot();
        rows.push(asg("x", "C1", "T3", "BIO", DayOfWeek::Monday, "08:00", "08:45"));
        let r = Resolver::new(&grid, &cat, Detector::default(), 5);
        let got = r
            .propose_resolutions(&["x".to_string()], ResolutionStrategy::ReassignRoom, &rows)
            .expect("resolve");
        // C2 is taken at that time, C3 is too small, C4 is inactive.
        assert!(got.is_empty());

        rows.retain(|a| a.id != "d");
        let got = r
            .propose_resolutions(&["x".to_string()], ResolutionStrategy::ReassignRoom, &rows)
            .expect("resolve");
        let rooms: Vec<&str> = got.iter().map(|c| c.replacement.classroom_id.as_str()).collect();
        assert_eq!(rooms, vec!["C2"]);
    }

    #[test]
    fn reassign_time_and_teacher_are_conflict_free() {
        let grid = TimeGrid::default();
        let cat = catalog();
        let mut rows = snapshot();
        rows.push(asg("x", "C1", "T2", "BIO", DayOfWeek::Monday, "08:00", "08:45"));
        let detector = Detector::new(SubjectDuplicatePolicy::Enforce);
        let r = Resolver::new(&grid, &cat, detector, 3);

        let times = r
            .propose_resolutions(&["x".to_string()], ResolutionStrategy::ReassignTime, &rows)
            .expect("resolve");
        assert_eq!(times.len(), 3);
        for c in &times {
            assert!(!has_blocking(&detector.find_conflicts(&c.replacement, &rows, Some("x"))));
        }
        assert_eq!(times[0].replacement.start_time.to_string(), "09:00");

        // Swapping the teacher cannot clear the room clash with a.
        let teachers = r
            .propose_resolutions(&["x".to_string()], ResolutionStrategy::ReassignTeacher, &rows)
            .expect("resolve");
        assert!(teachers.is_empty());

        let none = r
            .propose_resolutions(&["missing".to_string()], ResolutionStrategy::ReassignTime, &rows)
            .expect("resolve");
        assert!(none.is_empty());
    }
}
