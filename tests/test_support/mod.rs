#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tempfile::TempDir;

/// A fresh workspace directory, removed when the guard drops.
pub fn temp_dir(prefix: &str) -> TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("create temp dir")
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_timetabled");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn timetabled");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

/// Error code of a failed response; panics on success.
pub fn error_code(value: &serde_json::Value) -> String {
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "expected failure: {}",
        value
    );
    value
        .pointer("/error/code")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Two rooms, two teachers and two subjects, all active, plus the 2024/2025
/// first-semester calendar with one Monday holiday.
pub fn standard_catalog() -> serde_json::Value {
    json!({
        "classrooms": [
            { "id": "C1", "name": "Room 1", "capacity": 30 },
            { "id": "C2", "name": "Room 2", "capacity": 30 },
            { "id": "C3", "name": "Lab", "capacity": 24, "isActive": false }
        ],
        "teachers": [
            { "id": "T1", "name": "Teacher One" },
            { "id": "T2", "name": "Teacher Two" }
        ],
        "subjects": [
            { "id": "MATH", "name": "Mathematics" },
            { "id": "PHYS", "name": "Physics" },
            { "id": "BIO", "name": "Biology" }
        ],
        "holidays": [
            { "date": "2024-08-19", "label": "Collective leave" }
        ],
        "terms": [
            { "academicYear": "2024/2025", "semester": 1, "startDate": "2024-07-15", "endDate": "2024-12-20" },
            { "academicYear": "2024/2025", "semester": 2, "startDate": "2025-01-06", "endDate": "2025-06-20" },
            { "academicYear": "2025/2026", "semester": 1, "startDate": "2025-07-14", "endDate": "2025-12-19" }
        ]
    })
}

/// Selects `workspace` and loads `standard_catalog` into it.
pub fn open_workspace(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &TempDir,
) {
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    let _ = request_ok(stdin, reader, "sync", "catalog.sync", standard_catalog());
}

pub fn assignment(
    classroom: &str,
    teacher: &str,
    subject: &str,
    day: &str,
    start: &str,
    end: &str,
) -> serde_json::Value {
    json!({
        "classroomId": classroom,
        "teacherId": teacher,
        "subjectId": subject,
        "academicYear": "2024/2025",
        "semester": 1,
        "dayOfWeek": day,
        "startTime": start,
        "endTime": end
    })
}
