use crate::grid::{ClockTime, DayOfWeek, TimeSlot};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Academic year label such as `2024/2025`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AcademicYear(String);

impl AcademicYear {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        let bad = || format!("academicYear {:?} must look like 2024/2025", raw);
        let (a, b) = raw.split_once('/').ok_or_else(bad)?;
        if a.len() != 4 || b.len() != 4 {
            return Err(bad());
        }
        let first: u32 = a.parse().map_err(|_| bad())?;
        let second: u32 = b.parse().map_err(|_| bad())?;
        if second != first + 1 {
            return Err(bad());
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AcademicYear {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AcademicYear> for String {
    fn from(value: AcademicYear) -> Self {
        value.0
    }
}

impl fmt::Display for AcademicYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Semester {
    First,
    Second,
}

impl TryFrom<u8> for Semester {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::First),
            2 => Ok(Self::Second),
            _ => Err(format!("semester must be 1 or 2, got {}", value)),
        }
    }
}

impl From<Semester> for u8 {
    fn from(value: Semester) -> Self {
        match value {
            Semester::First => 1,
            Semester::Second => 2,
        }
    }
}

/// An (academic year, semester) pair; the unit every invariant is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Term {
    pub academic_year: AcademicYear,
    pub semester: Semester,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleAssignment {
    pub id: String,
    pub classroom_id: String,
    pub teacher_id: String,
    pub subject_id: String,
    pub academic_year: AcademicYear,
    pub semester: Semester,
    pub day_of_week: DayOfWeek,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    #[serde(default)]
    pub archived: bool,
}

impl ScheduleAssignment {
    pub fn slot(&self) -> TimeSlot {
        TimeSlot {
            day_of_week: self.day_of_week,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }

    pub fn with_slot(mut self, slot: TimeSlot) -> Self {
        self.day_of_week = slot.day_of_week;
        self.start_time = slot.start_time;
        self.end_time = slot.end_time;
        self
    }

    pub fn term(&self) -> Term {
        Term {
            academic_year: self.academic_year.clone(),
            semester: self.semester,
        }
    }

    pub fn in_term(&self, term: &Term) -> bool {
        self.academic_year == term.academic_year && self.semester == term.semester
    }

    pub fn same_term(&self, other: &ScheduleAssignment) -> bool {
        self.academic_year == other.academic_year && self.semester == other.semester
    }

    pub fn duration_minutes(&self) -> u32 {
        self.slot().duration_minutes()
    }
}

/// Caller-supplied fields of a new assignment; the id is minted on create.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentInput {
    pub classroom_id: String,
    pub teacher_id: String,
    pub subject_id: String,
    pub academic_year: AcademicYear,
    pub semester: Semester,
    pub day_of_week: DayOfWeek,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
}

impl AssignmentInput {
    pub fn into_assignment(self, id: String) -> ScheduleAssignment {
        ScheduleAssignment {
            id,
            classroom_id: self.classroom_id,
            teacher_id: self.teacher_id,
            subject_id: self.subject_id,
            academic_year: self.academic_year,
            semester: self.semester,
            day_of_week: self.day_of_week,
            start_time: self.start_time,
            end_time: self.end_time,
            archived: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentPatch {
    pub classroom_id: Option<String>,
    pub teacher_id: Option<String>,
    pub subject_id: Option<String>,
    pub academic_year: Option<AcademicYear>,
    pub semester: Option<Semester>,
    pub day_of_week: Option<DayOfWeek>,
    pub start_time: Option<ClockTime>,
    pub end_time: Option<ClockTime>,
}

impl AssignmentPatch {
    pub fn apply(self, mut a: ScheduleAssignment) -> ScheduleAssignment {
        if let Some(v) = self.classroom_id {
            a.classroom_id = v;
        }
        if let Some(v) = self.teacher_id {
            a.teacher_id = v;
        }
        if let Some(v) = self.subject_id {
            a.subject_id = v;
        }
        if let Some(v) = self.academic_year {
            a.academic_year = v;
        }
        if let Some(v) = self.semester {
            a.semester = v;
        }
        if let Some(v) = self.day_of_week {
            a.day_of_week = v;
        }
        if let Some(v) = self.start_time {
            a.start_time = v;
        }
        if let Some(v) = self.end_time {
            a.end_time = v;
        }
        a
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilter {
    pub classroom_id: Option<String>,
    pub teacher_id: Option<String>,
    pub subject_id: Option<String>,
    pub academic_year: Option<AcademicYear>,
    pub semester: Option<Semester>,
    pub day_of_week: Option<DayOfWeek>,
    #[serde(default)]
    pub include_archived: bool,
}

/// Source or destination of a clone: a term, optionally narrowed to one classroom.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneScope {
    pub academic_year: AcademicYear,
    pub semester: Semester,
    pub classroom_id: Option<String>,
}

impl CloneScope {
    pub fn term(&self) -> Term {
        Term {
            academic_year: self.academic_year.clone(),
            semester: self.semester,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    Teacher,
    Classroom,
    SubjectDuplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    pub kind: ConflictKind,
    pub severity: Severity,
    pub assignment_a: ScheduleAssignment,
    pub assignment_b: ScheduleAssignment,
    pub description: String,
}

impl ConflictRecord {
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectDuplicatePolicy {
    #[default]
    Enforce,
    Advisory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Classroom,
    Teacher,
    Subject,
}

impl ScopeKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classroom" => Some(Self::Classroom),
            "teacher" => Some(Self::Teacher),
            "subject" => Some(Self::Subject),
            _ => None,
        }
    }

    pub fn matches(self, scope_id: &str, a: &ScheduleAssignment) -> bool {
        match self {
            Self::Classroom => a.classroom_id == scope_id,
            Self::Teacher => a.teacher_id == scope_id,
            Self::Subject => a.subject_id == scope_id,
        }
    }
}

/// An allocator subject: the teacher or classroom whose free time is queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity<'a> {
    Teacher(&'a str),
    Classroom(&'a str),
}

impl Entity<'_> {
    pub fn owns(&self, a: &ScheduleAssignment) -> bool {
        match self {
            Entity::Teacher(id) => a.teacher_id == *id,
            Entity::Classroom(id) => a.classroom_id == *id,
        }
    }
}

/// A clone item that could not be placed: either no slot remapping cleared
/// its conflicts, or it references a missing or inactive catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedItem {
    pub source_id: String,
    pub candidate: ScheduleAssignment,
    pub conflicts: Vec<ConflictRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// One rejected row of an all-or-nothing batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub index: usize,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<ConflictRecord>,
}
