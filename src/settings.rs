//! The `setup.scheduling` settings section: grid shape, thresholds and the
//! subject duplicate policy.

use crate::conflict::Detector;
use crate::db;
use crate::grid::{default_periods, DayOfWeek, Period, TimeGrid};
use crate::model::SubjectDuplicatePolicy;
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

pub const SETTINGS_KEY: &str = "setup.scheduling";

pub fn default_json() -> Value {
    json!({
        "workingDays": 5,
        "periods": default_periods(),
        "dayOverrides": {},
        "maxWeeklyHours": 24,
        "subjectDuplicatePolicy": "enforce",
        "peakHoursTop": 3,
        "maxResolutionCandidates": 5
    })
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_periods(v: &Value, key: &str) -> Result<Vec<Period>, String> {
    let periods: Vec<Period> = serde_json::from_value(v.clone())
        .map_err(|e| format!("{} must be an array of {{start, end}}: {}", key, e))?;
    Ok(periods)
}

fn parse_overrides(v: &Value, key: &str) -> Result<BTreeMap<DayOfWeek, Vec<Period>>, String> {
    let obj = v
        .as_object()
        .ok_or_else(|| format!("{} must be an object keyed by day", key))?;
    let mut out = BTreeMap::new();
    for (day_raw, periods) in obj {
        let day = DayOfWeek::parse(day_raw)
            .ok_or_else(|| format!("{}: unknown day {:?}", key, day_raw))?;
        out.insert(day, parse_periods(periods, &format!("{}.{}", key, day))?);
    }
    Ok(out)
}

/// Applies `patch` field by field; the first bad field rejects the patch.
/// The merged grid must still be valid as a whole.
pub fn merge_patch(current: &mut Value, patch: &Map<String, Value>) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match k.as_str() {
            "workingDays" => {
                obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 5, 7)?));
            }
            "periods" => {
                let periods = parse_periods(v, k)?;
                obj.insert(k.clone(), json!(periods));
            }
            "dayOverrides" => {
                let overrides = parse_overrides(v, k)?;
                obj.insert(k.clone(), json!(overrides));
            }
            "maxWeeklyHours" => {
                obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 60)?));
            }
            "subjectDuplicatePolicy" => {
                let p = v
                    .as_str()
                    .ok_or_else(|| format!("{} must be string", k))?
                    .trim()
                    .to_ascii_lowercase();
                if p != "enforce" && p != "advisory" {
                    return Err("subjectDuplicatePolicy must be one of: enforce, advisory".into());
                }
                obj.insert(k.clone(), Value::String(p));
            }
            "peakHoursTop" => {
                obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 20)?));
            }
            "maxResolutionCandidates" => {
                obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 50)?));
            }
            _ => return Err(format!("unknown scheduling field: {}", k)),
        }
    }
    SchedulingSettings::from_json(current).map(|_| ())
}

/// Defaults with the saved section applied on top.
pub fn load_json(conn: &Connection) -> anyhow::Result<Value> {
    let mut current = default_json();
    if let Some(saved) = db::settings_get_json(conn, SETTINGS_KEY)? {
        if let Some(saved_obj) = saved.as_object() {
            // A stale saved value falls back to defaults rather than blocking every request.
            if merge_patch(&mut current, saved_obj).is_err() {
                tracing::warn!(key = SETTINGS_KEY, "ignoring invalid saved settings");
                current = default_json();
            }
        }
    }
    Ok(current)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulingSettings {
    pub grid: TimeGrid,
    pub max_weekly_hours: u32,
    pub subject_duplicate_policy: SubjectDuplicatePolicy,
    pub peak_hours_top: usize,
    pub max_resolution_candidates: usize,
}

impl Default for SchedulingSettings {
    fn default() -> Self {
        Self {
            grid: TimeGrid::default(),
            max_weekly_hours: 24,
            subject_duplicate_policy: SubjectDuplicatePolicy::Enforce,
            peak_hours_top: 3,
            max_resolution_candidates: 5,
        }
    }
}

impl SchedulingSettings {
    pub fn from_json(v: &Value) -> Result<Self, String> {
        let int = |key: &str, default: i64| v.get(key).and_then(|x| x.as_i64()).unwrap_or(default);

        let working_days = u8::try_from(int("workingDays", 5))
            .map_err(|_| "workingDays out of range".to_string())?;
        let periods = match v.get("periods") {
            Some(p) => parse_periods(p, "periods")?,
            None => default_periods(),
        };
        let overrides = match v.get("dayOverrides") {
            Some(o) => parse_overrides(o, "dayOverrides")?,
            None => BTreeMap::new(),
        };
        let grid = TimeGrid::new(working_days, periods, overrides)?;

        let subject_duplicate_policy = match v.get("subjectDuplicatePolicy").and_then(|x| x.as_str()) {
            Some("advisory") => SubjectDuplicatePolicy::Advisory,
            _ => SubjectDuplicatePolicy::Enforce,
        };
        Ok(Self {
            grid,
            max_weekly_hours: int("maxWeeklyHours", 24).clamp(1, 60) as u32,
            subject_duplicate_policy,
            peak_hours_top: int("peakHoursTop", 3).clamp(1, 20) as usize,
            max_resolution_candidates: int("maxResolutionCandidates", 5).clamp(1, 50) as usize,
        })
    }

    pub fn load(conn: &Connection) -> anyhow::Result<Self> {
        let raw = load_json(conn)?;
        Self::from_json(&raw).map_err(anyhow::Error::msg)
    }

    pub fn detector(&self) -> Detector {
        Detector::new(self.subject_duplicate_policy)
    }
}
