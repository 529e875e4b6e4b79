use crate::error::ScheduleError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Envelope for a core error. Domain outcomes pass through silently;
/// storage trouble is logged.
pub fn schedule_err(id: &str, e: &ScheduleError) -> serde_json::Value {
    if matches!(e, ScheduleError::Storage(_)) {
        tracing::warn!(request_id = id, code = e.code(), error = %e, "request failed");
    }
    err(id, e.code(), e.to_string(), e.details())
}
