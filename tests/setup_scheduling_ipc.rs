mod test_support;

use pretty_assertions::assert_eq;
use serde_json::json;
use test_support::{error_code, open_workspace, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn scheduling_defaults_and_update_round_trip() {
    let workspace = temp_dir("timetable-setup");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    open_workspace(&mut stdin, &mut reader, &workspace);

    let initial = request_ok(&mut stdin, &mut reader, "1", "setup.get", json!({}));
    let scheduling = initial.get("scheduling").expect("scheduling");
    assert_eq!(scheduling.get("workingDays"), Some(&json!(5)));
    assert_eq!(scheduling.get("maxWeeklyHours"), Some(&json!(24)));
    assert_eq!(scheduling.get("subjectDuplicatePolicy"), Some(&json!("enforce")));
    assert_eq!(
        scheduling.pointer("/periods/0"),
        Some(&json!({ "start": "08:00", "end": "08:45" }))
    );
    assert_eq!(
        scheduling.get("periods").and_then(|v| v.as_array()).map(Vec::len),
        Some(8)
    );

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "setup.update",
        json!({
            "section": "scheduling",
            "patch": {
                "workingDays": 6,
                "maxWeeklyHours": 30,
                "dayOverrides": { "saturday": [{ "start": "08:00", "end": "09:30" }] }
            }
        }),
    );
    assert_eq!(updated.get("ok").and_then(|v| v.as_bool()), Some(true));

    let after = request_ok(&mut stdin, &mut reader, "3", "setup.get", json!({}));
    assert_eq!(after.pointer("/scheduling/workingDays"), Some(&json!(6)));
    assert_eq!(after.pointer("/scheduling/maxWeeklyHours"), Some(&json!(30)));
    assert_eq!(
        after.pointer("/scheduling/dayOverrides/saturday/0/end"),
        Some(&json!("09:30"))
    );

    // The grid follows the new settings.
    let saturday = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "schedules.availableSlots",
        json!({
            "academicYear": "2024/2025",
            "semester": 1,
            "entity": "classroom",
            "entityId": "C1",
            "dayOfWeek": "saturday"
        }),
    );
    assert_eq!(
        saturday.get("slots").and_then(|v| v.as_array()).map(Vec::len),
        Some(1)
    );
}

#[test]
fn invalid_scheduling_patches_are_rejected() {
    let workspace = temp_dir("timetable-setup-bad");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    open_workspace(&mut stdin, &mut reader, &workspace);

    for (i, patch) in [
        json!({ "workingDays": 8 }),
        json!({ "maxWeeklyHours": "many" }),
        json!({ "subjectDuplicatePolicy": "sometimes" }),
        json!({ "periods": [{ "start": "09:00", "end": "08:00" }] }),
        json!({ "unknownField": 1 }),
    ]
    .into_iter()
    .enumerate()
    {
        let resp = request(
            &mut stdin,
            &mut reader,
            &format!("bad{}", i),
            "setup.update",
            json!({ "section": "scheduling", "patch": patch }),
        );
        assert_eq!(error_code(&resp), "bad_params", "patch {} accepted", patch);
    }

    let wrong_section = request(
        &mut stdin,
        &mut reader,
        "section",
        "setup.update",
        json!({ "section": "printing", "patch": {} }),
    );
    assert_eq!(error_code(&wrong_section), "bad_params");

    let unchanged = request_ok(&mut stdin, &mut reader, "get", "setup.get", json!({}));
    assert_eq!(unchanged.pointer("/scheduling/workingDays"), Some(&json!(5)));
}
