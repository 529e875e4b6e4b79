use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monday" | "mon" => Some(Self::Monday),
            "tuesday" | "tue" => Some(Self::Tuesday),
            "wednesday" | "wed" => Some(Self::Wednesday),
            "thursday" | "thu" => Some(Self::Thursday),
            "friday" | "fri" => Some(Self::Friday),
            "saturday" | "sat" => Some(Self::Saturday),
            "sunday" | "sun" => Some(Self::Sunday),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
            Self::Saturday => "saturday",
            Self::Sunday => "sunday",
        }
    }

    /// Zero-based position in the week, Monday first.
    pub fn index(self) -> u8 {
        match self {
            Self::Monday => 0,
            Self::Tuesday => 1,
            Self::Wednesday => 2,
            Self::Thursday => 3,
            Self::Friday => 4,
            Self::Saturday => 5,
            Self::Sunday => 6,
        }
    }

    pub fn from_index(idx: u8) -> Option<Self> {
        Self::ALL.get(idx as usize).copied()
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wall-clock time with minute precision, serialized as `HH:MM`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClockTime(u16);

impl ClockTime {
    pub const MINUTES_PER_DAY: u16 = 24 * 60;

    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        if hour >= 24 || minute >= 60 {
            return None;
        }
        Some(Self(hour * 60 + minute))
    }

    /// `24:00` is accepted so a slot may end at midnight.
    pub fn from_minutes(minutes: u16) -> Option<Self> {
        if minutes > Self::MINUTES_PER_DAY {
            return None;
        }
        Some(Self(minutes))
    }

    pub fn parse(s: &str) -> Option<Self> {
        let (h, m) = s.trim().split_once(':')?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return None;
        }
        if !h.bytes().chain(m.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }
        let hour: u16 = h.parse().ok()?;
        let minute: u16 = m.parse().ok()?;
        if hour == 24 && minute == 0 {
            return Some(Self(Self::MINUTES_PER_DAY));
        }
        Self::from_hm(hour, minute)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl fmt::Debug for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ClockTime::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid time {:?}, expected HH:MM", raw)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub day_of_week: DayOfWeek,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
}

impl TimeSlot {
    pub fn duration_minutes(&self) -> u32 {
        u32::from(self.end_time.minutes().saturating_sub(self.start_time.minutes()))
    }
}

/// Half-open interval overlap on the same day.
pub fn overlaps(a: &TimeSlot, b: &TimeSlot) -> bool {
    a.day_of_week == b.day_of_week && a.start_time < b.end_time && b.start_time < a.end_time
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub start: ClockTime,
    pub end: ClockTime,
}

impl Period {
    pub fn on(&self, day: DayOfWeek) -> TimeSlot {
        TimeSlot {
            day_of_week: day,
            start_time: self.start,
            end_time: self.end,
        }
    }
}

/// The discrete weekly slot space: consecutive working days starting Monday,
/// each split into an ordered sequence of periods.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    working_days: u8,
    periods: Vec<Period>,
    overrides: BTreeMap<DayOfWeek, Vec<Period>>,
}

impl TimeGrid {
    pub fn new(
        working_days: u8,
        periods: Vec<Period>,
        overrides: BTreeMap<DayOfWeek, Vec<Period>>,
    ) -> Result<Self, String> {
        if !(5..=7).contains(&working_days) {
            return Err("workingDays must be in 5..=7".to_string());
        }
        validate_periods(&periods, "periods")?;
        if periods.is_empty() {
            return Err("periods must not be empty".to_string());
        }
        for (day, day_periods) in &overrides {
            validate_periods(day_periods, &format!("dayOverrides.{}", day))?;
        }
        Ok(Self {
            working_days,
            periods,
            overrides,
        })
    }

    pub fn working_days(&self) -> impl Iterator<Item = DayOfWeek> + '_ {
        DayOfWeek::ALL.into_iter().take(self.working_days as usize)
    }

    pub fn is_working_day(&self, day: DayOfWeek) -> bool {
        day.index() < self.working_days
    }

    fn day_periods(&self, day: DayOfWeek) -> &[Period] {
        if !self.is_working_day(day) {
            return &[];
        }
        self.overrides
            .get(&day)
            .map(|p| p.as_slice())
            .unwrap_or(&self.periods)
    }

    /// Ordered canonical slots for one day; empty on non-working days.
    pub fn periods_for(&self, day: DayOfWeek) -> Vec<TimeSlot> {
        self.day_periods(day).iter().map(|p| p.on(day)).collect()
    }

    pub fn slot_count(&self) -> usize {
        self.working_days().map(|d| self.day_periods(d).len()).sum()
    }

    pub fn all_slots(&self) -> Vec<TimeSlot> {
        self.working_days()
            .flat_map(|d| self.periods_for(d))
            .collect()
    }
}

impl Default for TimeGrid {
    fn default() -> Self {
        Self {
            working_days: 5,
            periods: default_periods(),
            overrides: BTreeMap::new(),
        }
    }
}

/// Eight 45-minute periods starting on the hour, 08:00 through 15:00.
pub fn default_periods() -> Vec<Period> {
    (8u16..16)
        .map(|h| Period {
            start: ClockTime(h * 60),
            end: ClockTime(h * 60 + 45),
        })
        .collect()
}

fn validate_periods(periods: &[Period], key: &str) -> Result<(), String> {
    for (i, p) in periods.iter().enumerate() {
        if p.start >= p.end {
            return Err(format!("{}[{}] start must be before end", key, i));
        }
        if i > 0 && periods[i - 1].end > p.start {
            return Err(format!(
                "{}[{}] must start at or after the previous period ends",
                key, i
            ));
        }
    }
    Ok(())
}
