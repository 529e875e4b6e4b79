//! Check-then-persist orchestration of assignment writes.
//!
//! Every write opens a `BEGIN IMMEDIATE` transaction before the detector
//! reads its scope, so a competing writer waits on the lock instead of
//! racing past the check. Batch operations hold one transaction for the
//! whole batch and persist nothing unless every item passes.

use crate::catalog::Catalog;
use crate::conflict::{has_blocking, split_blocking, Detector};
use crate::error::{ScheduleError, ScheduleResult};
use crate::grid::{DayOfWeek, TimeSlot};
use crate::model::{
    AcademicYear, AssignmentInput, AssignmentPatch, BatchFailure, CloneScope, ConflictRecord,
    ScheduleAssignment, Semester, Term, UnresolvedItem,
};
use crate::settings::SchedulingSettings;
use crate::store;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// A persisted assignment plus the non-blocking findings it was stored with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stored {
    pub assignment: ScheduleAssignment,
    pub warnings: Vec<ConflictRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Remap {
    pub source_id: String,
    pub new_id: String,
    pub from: TimeSlot,
    pub to: TimeSlot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneOutcome {
    pub created: Vec<ScheduleAssignment>,
    pub remapped: Vec<Remap>,
    pub warnings: Vec<ConflictRecord>,
}

pub struct ScheduleManager<'a> {
    conn: &'a Connection,
    catalog: &'a dyn Catalog,
    settings: &'a SchedulingSettings,
    detector: Detector,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn validate_interval(a: &ScheduleAssignment) -> ScheduleResult<()> {
    if a.start_time >= a.end_time {
        return Err(ScheduleError::Validation(format!(
            "startTime {} must be before endTime {}",
            a.start_time, a.end_time
        )));
    }
    Ok(())
}

impl<'a> ScheduleManager<'a> {
    pub fn new(conn: &'a Connection, catalog: &'a dyn Catalog, settings: &'a SchedulingSettings) -> Self {
        Self {
            conn,
            catalog,
            settings,
            detector: settings.detector(),
        }
    }

    fn begin(&self) -> ScheduleResult<Transaction<'a>> {
        Ok(Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?)
    }

    /// Referenced classroom, teacher and subject must exist and be active.
    fn validate_references(&self, a: &ScheduleAssignment) -> ScheduleResult<()> {
        let classroom = self
            .catalog
            .classroom(&a.classroom_id)?
            .ok_or_else(|| ScheduleError::not_found("classroom", &a.classroom_id))?;
        if !classroom.is_active {
            return Err(ScheduleError::Validation(format!(
                "classroom {} is inactive",
                a.classroom_id
            )));
        }
        let teacher = self
            .catalog
            .teacher(&a.teacher_id)?
            .ok_or_else(|| ScheduleError::not_found("teacher", &a.teacher_id))?;
        if !teacher.is_active {
            return Err(ScheduleError::Validation(format!(
                "teacher {} is inactive",
                a.teacher_id
            )));
        }
        let subject = self
            .catalog
            .subject(&a.subject_id)?
            .ok_or_else(|| ScheduleError::not_found("subject", &a.subject_id))?;
        if !subject.is_active {
            return Err(ScheduleError::Validation(format!(
                "subject {} is inactive",
                a.subject_id
            )));
        }
        Ok(())
    }

    /// Runs the detector; blocking records reject the candidate, warnings pass through.
    fn gate(
        &self,
        candidate: &ScheduleAssignment,
        existing: &[ScheduleAssignment],
        exclude_id: Option<&str>,
    ) -> ScheduleResult<Vec<ConflictRecord>> {
        let found = self.detector.find_conflicts(candidate, existing, exclude_id);
        if has_blocking(&found) {
            return Err(ScheduleError::Conflict(found));
        }
        Ok(found)
    }

    fn screen(
        &self,
        candidate: &ScheduleAssignment,
        existing: &[ScheduleAssignment],
        exclude_id: Option<&str>,
    ) -> ScheduleResult<Vec<ConflictRecord>> {
        validate_interval(candidate)?;
        self.validate_references(candidate)?;
        self.gate(candidate, existing, exclude_id)
    }

    /// Read-only detector run for a candidate against its stored term.
    pub fn check_candidate(
        &self,
        candidate: &ScheduleAssignment,
        exclude_id: Option<&str>,
    ) -> ScheduleResult<Vec<ConflictRecord>> {
        validate_interval(candidate)?;
        let existing = store::load_term(self.conn, &candidate.term(), false)?;
        Ok(self.detector.find_conflicts(candidate, &existing, exclude_id))
    }

    pub fn detect_scope(&self, term: &Term) -> ScheduleResult<Vec<ConflictRecord>> {
        let rows = store::load_term(self.conn, term, false)?;
        Ok(self.detector.detect_existing_conflicts(&rows))
    }

    pub fn create(&self, input: AssignmentInput) -> ScheduleResult<Stored> {
        let candidate = input.into_assignment(new_id());
        validate_interval(&candidate)?;

        let tx = self.begin()?;
        let existing = store::load_term(&tx, &candidate.term(), false)?;
        let warnings = self.screen(&candidate, &existing, None)?;
        store::insert(&tx, &candidate)?;
        tx.commit()?;

        tracing::info!(id = %candidate.id, warnings = warnings.len(), "assignment created");
        Ok(Stored {
            assignment: candidate,
            warnings,
        })
    }

    pub fn update(&self, id: &str, patch: AssignmentPatch) -> ScheduleResult<Stored> {
        let tx = self.begin()?;
        let current = store::require(&tx, id)?;
        if current.archived {
            return Err(ScheduleError::Validation(format!(
                "assignment {} is archived; restore it before editing",
                id
            )));
        }
        let next = patch.apply(current);
        let existing = store::load_term(&tx, &next.term(), false)?;
        let warnings = self.screen(&next, &existing, Some(id))?;
        store::update(&tx, &next)?;
        tx.commit()?;

        tracing::info!(id, "assignment updated");
        Ok(Stored {
            assignment: next,
            warnings,
        })
    }

    /// Hard delete, or archive when `soft`.
    pub fn delete(&self, id: &str, soft: bool) -> ScheduleResult<()> {
        if soft {
            return self.archive_one(id).map(|_| ());
        }
        let tx = self.begin()?;
        store::delete(&tx, id)?;
        tx.commit()?;
        tracing::info!(id, "assignment deleted");
        Ok(())
    }

    pub fn archive_one(&self, id: &str) -> ScheduleResult<ScheduleAssignment> {
        let tx = self.begin()?;
        let mut row = store::require(&tx, id)?;
        if !row.archived {
            store::set_archived(&tx, id, true)?;
            row.archived = true;
        }
        tx.commit()?;
        tracing::info!(id, "assignment archived");
        Ok(row)
    }

    /// Brings an archived row back, provided it still fits its term.
    pub fn restore(&self, id: &str) -> ScheduleResult<Stored> {
        let tx = self.begin()?;
        let row = store::require(&tx, id)?;
        if !row.archived {
            return Ok(Stored {
                assignment: row,
                warnings: Vec::new(),
            });
        }
        let live = ScheduleAssignment {
            archived: false,
            ..row
        };
        let existing = store::load_term(&tx, &live.term(), false)?;
        let warnings = self.gate(&live, &existing, Some(id))?;
        store::set_archived(&tx, id, false)?;
        tx.commit()?;

        tracing::info!(id, "assignment restored");
        Ok(Stored {
            assignment: live,
            warnings,
        })
    }

    /// Archives a year, or one semester of it. Repeating the call changes nothing.
    pub fn archive(&self, academic_year: &AcademicYear, semester: Option<Semester>) -> ScheduleResult<usize> {
        let tx = self.begin()?;
        let changed = store::archive_term(&tx, academic_year, semester)?;
        tx.commit()?;
        tracing::info!(academic_year = %academic_year, changed, "term archived");
        Ok(changed)
    }

    /// All-or-nothing create. Each input is checked against its stored term
    /// and the inputs accepted before it.
    pub fn bulk_create(&self, inputs: Vec<AssignmentInput>) -> ScheduleResult<Vec<Stored>> {
        let tx = self.begin()?;
        let mut scopes: HashMap<Term, Vec<ScheduleAssignment>> = HashMap::new();
        let mut accepted: Vec<Stored> = Vec::with_capacity(inputs.len());
        let mut failures: Vec<BatchFailure> = Vec::new();

        for (index, input) in inputs.into_iter().enumerate() {
            let candidate = input.into_assignment(new_id());
            let term = candidate.term();
            if !scopes.contains_key(&term) {
                let rows = store::load_term(&tx, &term, false)?;
                scopes.insert(term.clone(), rows);
            }
            let pool = scopes.get(&term).map(Vec::as_slice).unwrap_or(&[]);
            match self.screen(&candidate, pool, None) {
                Ok(warnings) => {
                    scopes.entry(term).or_default().push(candidate.clone());
                    accepted.push(Stored {
                        assignment: candidate,
                        warnings,
                    });
                }
                Err(e @ (ScheduleError::Validation(_)
                | ScheduleError::NotFound { .. }
                | ScheduleError::Conflict(_))) => {
                    let code = e.code().to_string();
                    let message = e.to_string();
                    let conflicts = match e {
                        ScheduleError::Conflict(records) => records,
                        _ => Vec::new(),
                    };
                    failures.push(BatchFailure {
                        index,
                        code,
                        message,
                        conflicts,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        if !failures.is_empty() {
            tx.rollback()?;
            return Err(ScheduleError::BatchRejected(failures));
        }
        for stored in &accepted {
            store::insert(&tx, &stored.assignment)?;
        }
        tx.commit()?;
        tracing::info!(created = accepted.len(), "bulk create committed");
        Ok(accepted)
    }

    fn rebase(&self, source: &ScheduleAssignment, target: &CloneScope) -> ScheduleAssignment {
        ScheduleAssignment {
            id: new_id(),
            classroom_id: target
                .classroom_id
                .clone()
                .unwrap_or_else(|| source.classroom_id.clone()),
            academic_year: target.academic_year.clone(),
            semester: target.semester,
            archived: false,
            ..source.clone()
        }
    }

    /// First conflict-free grid slot, trying the candidate's own day and then
    /// the days after it, wrapping around the working week.
    fn remap(&self, candidate: &ScheduleAssignment, pool: &[ScheduleAssignment]) -> Option<ScheduleAssignment> {
        let grid = &self.settings.grid;
        let days: Vec<DayOfWeek> = grid.working_days().collect();
        let start = days
            .iter()
            .position(|d| *d == candidate.day_of_week)
            .unwrap_or(0);
        let original = candidate.slot();
        for offset in 0..days.len() {
            let day = days[(start + offset) % days.len()];
            for slot in grid.periods_for(day) {
                if slot == original {
                    continue;
                }
                let moved = candidate.clone().with_slot(slot);
                if !has_blocking(&self.detector.find_conflicts(&moved, pool, None)) {
                    return Some(moved);
                }
            }
        }
        None
    }

    /// Copies a term (optionally one classroom of it) into another scope.
    ///
    /// Colliding items move to the first free grid slot. Items whose
    /// classroom, teacher or subject is missing or inactive cannot be placed
    /// at all. If any item cannot be placed the clone aborts with every such
    /// item and nothing is written.
    pub fn clone_schedule(&self, source: &CloneScope, target: &CloneScope) -> ScheduleResult<CloneOutcome> {
        if source == target {
            return Err(ScheduleError::Validation(
                "clone source and target must differ".to_string(),
            ));
        }
        let tx = self.begin()?;
        let rows: Vec<ScheduleAssignment> = store::load_term(&tx, &source.term(), false)?
            .into_iter()
            .filter(|a| {
                source
                    .classroom_id
                    .as_deref()
                    .map_or(true, |c| a.classroom_id == c)
            })
            .collect();

        let mut pool = store::load_term(&tx, &target.term(), false)?;
        let mut created = Vec::with_capacity(rows.len());
        let mut remapped = Vec::new();
        let mut warnings = Vec::new();
        let mut unresolved = Vec::new();

        for src in &rows {
            let candidate = self.rebase(src, target);
            match self.validate_references(&candidate) {
                Ok(()) => {}
                Err(e @ (ScheduleError::Validation(_) | ScheduleError::NotFound { .. })) => {
                    unresolved.push(UnresolvedItem {
                        source_id: src.id.clone(),
                        candidate,
                        conflicts: Vec::new(),
                        reason: Some(e.to_string()),
                    });
                    continue;
                }
                Err(e) => return Err(e),
            }
            let found = self.detector.find_conflicts(&candidate, &pool, None);
            let placed = if has_blocking(&found) {
                match self.remap(&candidate, &pool) {
                    Some(moved) => {
                        remapped.push(Remap {
                            source_id: src.id.clone(),
                            new_id: moved.id.clone(),
                            from: candidate.slot(),
                            to: moved.slot(),
                        });
                        moved
                    }
                    None => {
                        unresolved.push(UnresolvedItem {
                            source_id: src.id.clone(),
                            candidate,
                            conflicts: found,
                            reason: None,
                        });
                        continue;
                    }
                }
            } else {
                warnings.extend(split_blocking(found).1);
                candidate
            };
            pool.push(placed.clone());
            created.push(placed);
        }

        if !unresolved.is_empty() {
            tx.rollback()?;
            return Err(ScheduleError::CloneAborted(unresolved));
        }
        for a in &created {
            store::insert(&tx, a)?;
        }
        tx.commit()?;
        tracing::info!(
            created = created.len(),
            remapped = remapped.len(),
            "schedule cloned"
        );
        Ok(CloneOutcome {
            created,
            remapped,
            warnings,
        })
    }
}
