use crate::grid::overlaps;
use crate::model::{ConflictKind, ConflictRecord, ScheduleAssignment, Severity, SubjectDuplicatePolicy};

/// Classifies collisions between assignments of the same term.
///
/// Teacher and classroom clashes need the same day and an overlapping
/// interval. A subject duplicate only needs the same classroom and subject
/// somewhere in the week; whether it blocks depends on the policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Detector {
    policy: SubjectDuplicatePolicy,
}

impl Detector {
    pub fn new(policy: SubjectDuplicatePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> SubjectDuplicatePolicy {
        self.policy
    }

    fn duplicate_severity(&self) -> Severity {
        match self.policy {
            SubjectDuplicatePolicy::Enforce => Severity::Error,
            SubjectDuplicatePolicy::Advisory => Severity::Warning,
        }
    }

    /// Conflicts a pending assignment would cause against `existing`.
    /// `exclude_id` keeps an updated row from colliding with its stored self.
    pub fn find_conflicts(
        &self,
        candidate: &ScheduleAssignment,
        existing: &[ScheduleAssignment],
        exclude_id: Option<&str>,
    ) -> Vec<ConflictRecord> {
        let mut others: Vec<&ScheduleAssignment> = existing
            .iter()
            .filter(|e| !e.archived && e.same_term(candidate))
            .filter(|e| Some(e.id.as_str()) != exclude_id && e.id != candidate.id)
            .collect();
        others.sort_by(|a, b| visit_order(a).cmp(&visit_order(b)));

        let mut out = Vec::new();
        for other in others {
            self.classify(candidate, other, &mut out);
        }
        out
    }

    /// Pairwise scan of a stored set; each colliding pair is reported once.
    pub fn detect_existing_conflicts(&self, set: &[ScheduleAssignment]) -> Vec<ConflictRecord> {
        let mut live: Vec<&ScheduleAssignment> = set.iter().filter(|a| !a.archived).collect();
        live.sort_by(|a, b| {
            (&a.academic_year, a.semester)
                .cmp(&(&b.academic_year, b.semester))
                .then_with(|| visit_order(a).cmp(&visit_order(b)))
        });

        let mut out = Vec::new();
        for (i, a) in live.iter().enumerate() {
            for b in &live[i + 1..] {
                if !a.same_term(b) {
                    // Sorted by term, so nothing further can match.
                    break;
                }
                self.classify(a, b, &mut out);
            }
        }
        out
    }

    fn classify(&self, a: &ScheduleAssignment, b: &ScheduleAssignment, out: &mut Vec<ConflictRecord>) {
        let clash = overlaps(&a.slot(), &b.slot());
        if clash && a.teacher_id == b.teacher_id {
            out.push(ConflictRecord {
                kind: ConflictKind::Teacher,
                severity: Severity::Error,
                assignment_a: a.clone(),
                assignment_b: b.clone(),
                description: format!(
                    "teacher {} is already teaching {} in classroom {} on {} {}-{}",
                    b.teacher_id,
                    b.subject_id,
                    b.classroom_id,
                    b.day_of_week,
                    b.start_time,
                    b.end_time
                ),
            });
        }
        if clash && a.classroom_id == b.classroom_id {
            out.push(ConflictRecord {
                kind: ConflictKind::Classroom,
                severity: Severity::Error,
                assignment_a: a.clone(),
                assignment_b: b.clone(),
                description: format!(
                    "classroom {} is already used for {} by teacher {} on {} {}-{}",
                    b.classroom_id,
                    b.subject_id,
                    b.teacher_id,
                    b.day_of_week,
                    b.start_time,
                    b.end_time
                ),
            });
        }
        if a.classroom_id == b.classroom_id && a.subject_id == b.subject_id {
            out.push(ConflictRecord {
                kind: ConflictKind::SubjectDuplicate,
                severity: self.duplicate_severity(),
                assignment_a: a.clone(),
                assignment_b: b.clone(),
                description: format!(
                    "subject {} is already scheduled for classroom {} this week ({} {}-{})",
                    b.subject_id, b.classroom_id, b.day_of_week, b.start_time, b.end_time
                ),
            });
        }
    }
}

fn visit_order(a: &ScheduleAssignment) -> (crate::grid::DayOfWeek, crate::grid::ClockTime, &str) {
    (a.day_of_week, a.start_time, a.id.as_str())
}

pub fn has_blocking(records: &[ConflictRecord]) -> bool {
    records.iter().any(ConflictRecord::is_blocking)
}

pub fn split_blocking(records: Vec<ConflictRecord>) -> (Vec<ConflictRecord>, Vec<ConflictRecord>) {
    records.into_iter().partition(ConflictRecord::is_blocking)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{ClockTime, DayOfWeek};
    use crate::model::{AcademicYear, Semester};
    use pretty_assertions::assert_eq;

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
            academic_year: AcademicYear::parse("2024/2025").expect("year"),
            semester: Semester::First,
            day_of_week: day,
            start_time: ClockTime::parse(start).expect("start"),
            end_time: ClockTime::parse(end).expect("end"),
            archived: false,
        }
    }

    fn kinds(records: &[ConflictRecord]) -> Vec<ConflictKind> {
        records.iter().map(|r| r.kind).collect()
    }

    fn existing() -> Vec<ScheduleAssignment> {
        vec![asg("a1", "C1", "T1", "MATH", DayOfWeek::Monday, "08:00", "08:45")]
    }

    #[test]
    fn same_room_other_teacher_is_classroom_conflict() {
        let c = asg("new", "C1", "T2", "PHYS", DayOfWeek::Monday, "08:00", "08:45");
        let found = Detector::default().find_conflicts(&c, &existing(), None);
        assert_eq!(kinds(&found), vec![ConflictKind::Classroom]);
        assert_eq!(found[0].assignment_b.id, "a1");
    }

    #[test]
    fn same_teacher_other_room_is_teacher_conflict() {
        let c = asg("new", "C2", "T1", "PHYS", DayOfWeek::Monday, "08:00", "08:45");
        let found = Detector::default().find_conflicts(&c, &existing(), None);
        assert_eq!(kinds(&found), vec![ConflictKind::Teacher]);
    }

    #[test]
    fn same_subject_same_room_without_overlap_is_duplicate() {
        let c = asg("new", "C1", "T1", "MATH", DayOfWeek::Monday, "09:00", "09:45");
        let found = Detector::default().find_conflicts(&c, &existing(), None);
        assert_eq!(kinds(&found), vec![ConflictKind::SubjectDuplicate]);
        assert!(found[0].is_blocking());

        let advisory = Detector::new(SubjectDuplicatePolicy::Advisory).find_conflicts(&c, &existing(), None);
        assert_eq!(advisory[0].severity, Severity::Warning);
        assert!(!has_blocking(&advisory));
    }

    #[test]
    fn full_clash_yields_every_kind() {
        let c = asg("new", "C1", "T1", "MATH", DayOfWeek::Monday, "08:30", "09:15");
        let found = Detector::default().find_conflicts(&c, &existing(), None);
        assert_eq!(
            kinds(&found),
            vec![ConflictKind::Teacher, ConflictKind::Classroom, ConflictKind::SubjectDuplicate]
        );
    }

    #[test]
    fn excluded_archived_and_other_terms_are_ignored() {
        let c = asg("a1", "C1", "T1", "MATH", DayOfWeek::Monday, "08:15", "09:00");
        assert!(Detector::default().find_conflicts(&c, &existing(), Some("a1")).is_empty());

        let mut archived = existing();
        archived[0].archived = true;
        let fresh = asg("new", "C1", "T2", "PHYS", DayOfWeek::Monday, "08:00", "08:45");
        assert!(Detector::default().find_conflicts(&fresh, &archived, None).is_empty());

        let mut other_term = existing();
        other_term[0].semester = Semester::Second;
        assert!(Detector::default().find_conflicts(&fresh, &other_term, None).is_empty());
    }

    #[test]
    fn adjacent_slots_do_not_clash() {
        let c = asg("new", "C1", "T2", "PHYS", DayOfWeek::Monday, "08:45", "09:30");
        assert!(Detector::default().find_conflicts(&c, &existing(), None).is_empty());
    }

    #[test]
    fn batch_scan_reports_each_pair_once() {
        let set = vec![
            asg("a", "C1", "T1", "MATH", DayOfWeek::Monday, "08:00", "08:45"),
            asg("b", "C2", "T1", "PHYS", DayOfWeek::Monday, "08:30", "09:15"),
            asg("c", "C2", "T3", "BIO", DayOfWeek::Monday, "09:00", "09:45"),
            asg("d", "C3", "T4", "ART", DayOfWeek::Tuesday, "08:00", "08:45"),
        ];
        let found = Detector::default().detect_existing_conflicts(&set);
        let pairs: Vec<(ConflictKind, String, String)> = found
            .iter()
            .map(|r| (r.kind, r.assignment_a.id.clone(), r.assignment_b.id.clone()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (ConflictKind::Teacher, "a".to_string(), "b".to_string()),
                (ConflictKind::Classroom, "b".to_string(), "c".to_string()),
            ]
        );
    }

    #[test]
    fn clean_set_has_no_conflicts() {
        let set = vec![
            asg("a", "C1", "T1", "MATH", DayOfWeek::Monday, "08:00", "08:45"),
            asg("b", "C1", "T2", "PHYS", DayOfWeek::Monday, "09:00", "09:45"),
            asg("c", "C2", "T1", "PHYS", DayOfWeek::Monday, "09:00", "09:45"),
        ];
        let found = Detector::default().detect_existing_conflicts(&set);
        // b and c overlap but share neither teacher nor classroom.
        assert!(found.is_empty(), "{:?}", found);
    }
}
