mod test_support;

use pretty_assertions::assert_eq;
use serde_json::json;
use test_support::{
    assignment, error_code, open_workspace, request, request_ok, spawn_sidecar, temp_dir,
};

fn kinds(resp: &serde_json::Value, pointer: &str) -> Vec<String> {
    resp.pointer(pointer)
        .and_then(|v| v.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|c| c.get("kind").and_then(|k| k.as_str()).map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn monday_first_period_scenario_reports_each_kind() {
    let workspace = temp_dir("timetable-conflicts");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    open_workspace(&mut stdin, &mut reader, &workspace);

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "schedules.create",
        assignment("C1", "T1", "MATH", "monday", "08:00", "08:45"),
    );
    assert!(created.pointer("/assignment/id").and_then(|v| v.as_str()).is_some());
    assert_eq!(created.pointer("/warnings").and_then(|v| v.as_array()).map(Vec::len), Some(0));

    let room = request(
        &mut stdin,
        &mut reader,
        "2",
        "schedules.create",
        assignment("C1", "T2", "PHYS", "monday", "08:00", "08:45"),
    );
    assert_eq!(error_code(&room), "schedule_conflict");
    assert_eq!(kinds(&room, "/error/details/conflicts"), vec!["CLASSROOM"]);

    let teacher = request(
        &mut stdin,
        &mut reader,
        "3",
        "schedules.create",
        assignment("C2", "T1", "PHYS", "monday", "08:00", "08:45"),
    );
    assert_eq!(error_code(&teacher), "schedule_conflict");
    assert_eq!(kinds(&teacher, "/error/details/conflicts"), vec!["TEACHER"]);

    let duplicate = request(
        &mut stdin,
        &mut reader,
        "4",
        "schedules.create",
        assignment("C1", "T1", "MATH", "monday", "09:00", "09:45"),
    );
    assert_eq!(error_code(&duplicate), "schedule_conflict");
    assert_eq!(
        kinds(&duplicate, "/error/details/conflicts"),
        vec!["SUBJECT_DUPLICATE"]
    );

    // Nothing but the first row was stored.
    let all = request_ok(&mut stdin, &mut reader, "5", "schedules.search", json!({}));
    assert_eq!(all.pointer("/assignments").and_then(|v| v.as_array()).map(Vec::len), Some(1));
}

#[test]
fn check_conflicts_is_read_only_and_honours_exclude_id() {
    let workspace = temp_dir("timetable-check");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    open_workspace(&mut stdin, &mut reader, &workspace);

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "schedules.create",
        assignment("C1", "T1", "MATH", "tuesday", "10:00", "10:45"),
    );
    let id = created
        .pointer("/assignment/id")
        .and_then(|v| v.as_str())
        .expect("id")
        .to_string();

    let clash = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "schedules.checkConflicts",
        json!({ "candidate": assignment("C1", "T1", "MATH", "tuesday", "10:30", "11:15") }),
    );
    assert_eq!(clash.get("blocking").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(
        kinds(&clash, "/conflicts"),
        vec!["TEACHER", "CLASSROOM", "SUBJECT_DUPLICATE"]
    );

    let moved = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "schedules.checkConflicts",
        json!({
            "candidate": assignment("C1", "T1", "MATH", "tuesday", "10:30", "11:15"),
            "excludeId": id
        }),
    );
    assert_eq!(moved.get("blocking").and_then(|v| v.as_bool()), Some(false));

    let scan = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "schedules.detectConflicts",
        json!({ "academicYear": "2024/2025", "semester": 1 }),
    );
    assert_eq!(kinds(&scan, "/conflicts"), Vec::<String>::new());
}

#[test]
fn advisory_policy_turns_duplicates_into_warnings() {
    let workspace = temp_dir("timetable-advisory");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    open_workspace(&mut stdin, &mut reader, &workspace);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "setup.update",
        json!({ "section": "scheduling", "patch": { "subjectDuplicatePolicy": "advisory" } }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "schedules.create",
        assignment("C1", "T1", "MATH", "monday", "08:00", "08:45"),
    );
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "schedules.create",
        assignment("C1", "T1", "MATH", "wednesday", "08:00", "08:45"),
    );
    assert_eq!(kinds(&second, "/warnings"), vec!["SUBJECT_DUPLICATE"]);
    assert_eq!(
        second.pointer("/warnings/0/severity").and_then(|v| v.as_str()),
        Some("warning")
    );

    let scan = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "schedules.detectConflicts",
        json!({ "academicYear": "2024/2025", "semester": 1 }),
    );
    assert_eq!(kinds(&scan, "/conflicts"), vec!["SUBJECT_DUPLICATE"]);
}

#[test]
fn invalid_references_and_intervals_are_rejected() {
    let workspace = temp_dir("timetable-validation");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    open_workspace(&mut stdin, &mut reader, &workspace);

    let inactive = request(
        &mut stdin,
        &mut reader,
        "1",
        "schedules.create",
        assignment("C3", "T1", "MATH", "monday", "08:00", "08:45"),
    );
    assert_eq!(error_code(&inactive), "validation_failed");

    let unknown = request(
        &mut stdin,
        &mut reader,
        "2",
        "schedules.create",
        assignment("C1", "T9", "MATH", "monday", "08:00", "08:45"),
    );
    assert_eq!(error_code(&unknown), "not_found");
    assert_eq!(
        unknown.pointer("/error/details/entity").and_then(|v| v.as_str()),
        Some("teacher")
    );

    let backwards = request(
        &mut stdin,
        &mut reader,
        "3",
        "schedules.create",
        assignment("C1", "T1", "MATH", "monday", "09:00", "08:00"),
    );
    assert_eq!(error_code(&backwards), "validation_failed");

    let garbled = request(
        &mut stdin,
        &mut reader,
        "4",
        "schedules.create",
        assignment("C1", "T1", "MATH", "monday", "8am", "08:45"),
    );
    assert_eq!(error_code(&garbled), "bad_params");
}
