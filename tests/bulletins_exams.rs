
use serde_json::json;
use test_support::*;

#[test]
fn inbox_is_filtered_by_role_and_history_is_admin_only() {
    let workspace = temp_dir("campus-bulletins");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    bootstrap_admin(&mut stdin, &mut reader, &workspace);

    let _ = enroll_teacher(
        &mut stdin, &mut reader, "t1", "Asha", "AV-01", "4321", "5", "B", "CLASS_TEACHER",
    );
    let _ = enroll_student(
        &mut stdin, &mut reader, "s1", "Ravi", "111122223333", "12", "5", "B",
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "notifications.create",
        json!({
            "subject": "Staff meeting",
            "content": "Friday 3pm in the staff room",
            "targets": ["TEACHER"]
        }),
    );
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "notifications.create",
        json!({
            "subject": "Fee reminder",
            "content": "Quarter dues by the 10th",
            "targets": ["STUDENT", "PARENT"]
        }),
    );
    // The create response is the stored row, timestamp included.
    assert!(created["notification"]["createdAt"].is_string());
    assert_eq!(
        created["notification"]["senderName"].as_str(),
        Some(ADMIN_EMAIL)
    );

    let history = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "notifications.list",
        json!({ "box": "history" }),
    );
    assert_eq!(history["notifications"].as_array().map(|a| a.len()), Some(2));
    // Newest first, and identical to what create echoed.
    assert_eq!(
        history["notifications"][0]["subject"].as_str(),
        Some("Fee reminder")
    );
    assert_eq!(history["notifications"][0], created["notification"]);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "session.login",
        json!({ "role": "TEACHER", "staffId": "AV-01", "pin": "4321" }),
    );
    let inbox = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "notifications.list",
        json!({ "box": "inbox" }),
    );
    let subjects: Vec<&str> = inbox["notifications"]
        .as_array()
        .expect("inbox")
        .iter()
        .map(|n| n["subject"].as_str().expect("subject"))
        .collect();
    assert_eq!(subjects, vec!["Staff meeting"]);

    let denied_history = request(
        &mut stdin,
        &mut reader,
        "6",
        "notifications.list",
        json!({ "box": "history" }),
    );
    assert_eq!(error_code(&denied_history), "forbidden");
    let denied_create = request(
        &mut stdin,
        &mut reader,
        "7",
        "notifications.create",
        json!({ "subject": "x", "content": "y", "targets": ["STUDENT"] }),
    );
    assert_eq!(error_code(&denied_create), "forbidden");

    let student_inbox = {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            "8",
            "session.login",
            json!({
                "role": "STUDENT",
                "aadhaar": "111122223333",
                "dob": "2014-06-01",
                "rollNo": "12"
            }),
        );
        request_ok(
            &mut stdin,
            &mut reader,
            "9",
            "notifications.list",
            json!({ "box": "inbox" }),
        )
    };
    assert_eq!(
        student_inbox["notifications"][0]["subject"].as_str(),
        Some("Fee reminder")
    );
    assert_eq!(
        student_inbox["notifications"].as_array().map(|a| a.len()),
        Some(1)
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn exam_calendar_is_class_scoped_for_families() {
    let workspace = temp_dir("campus-exams");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    bootstrap_admin(&mut stdin, &mut reader, &workspace);

    let _ = enroll_student(
        &mut stdin, &mut reader, "s1", "Ravi", "111122223333", "12", "5", "B",
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "exams.create",
        json!({
            "name": "Half Yearly",
            "startDate": "2026-09-10",
            "endDate": "2026-09-20",
            "targetClasses": ["5", "6"]
        }),
    );
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "exams.create",
        json!({
            "name": "Senior Prelims",
            "startDate": "2026-11-01",
            "endDate": "2026-11-12",
            "targetClasses": ["10", "12"],
            "note": "hall allocation to follow"
        }),
    );
    let senior_id = created["event"]["id"].as_str().expect("event id").to_string();

    // Admin sees everything, newest start date first.
    let all = request_ok(&mut stdin, &mut reader, "3", "exams.list", json!({}));
    let names: Vec<&str> = all["events"]
        .as_array()
        .expect("events")
        .iter()
        .map(|e| e["name"].as_str().expect("name"))
        .collect();
    assert_eq!(names, vec!["Senior Prelims", "Half Yearly"]);

    // A class-5 parent only sees the event targeting class 5.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "session.login",
        json!({
            "role": "PARENT",
            "aadhaar": "111122223333",
            "dob": "2014-06-01",
            "rollNo": "12"
        }),
    );
    let scoped = request_ok(&mut stdin, &mut reader, "5", "exams.list", json!({}));
    let names: Vec<&str> = scoped["events"]
        .as_array()
        .expect("events")
        .iter()
        .map(|e| e["name"].as_str().expect("name"))
        .collect();
    assert_eq!(names, vec!["Half Yearly"]);

    let denied = request(
        &mut stdin,
        &mut reader,
        "6",
        "exams.delete",
        json!({ "id": senior_id, "confirm": true }),
    );
    assert_eq!(error_code(&denied), "forbidden");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn exam_dates_and_targets_are_validated() {
    let workspace = temp_dir("campus-exam-guard");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    bootstrap_admin(&mut stdin, &mut reader, &workspace);

    let backwards = request(
        &mut stdin,
        &mut reader,
        "1",
        "exams.create",
        json!({
            "name": "Backwards",
            "startDate": "2026-09-20",
            "endDate": "2026-09-10",
            "targetClasses": ["5"]
        }),
    );
    assert_eq!(error_code(&backwards), "bad_params");

    let no_targets = request(
        &mut stdin,
        &mut reader,
        "2",
        "exams.create",
        json!({
            "name": "Nobody",
            "startDate": "2026-09-10",
            "endDate": "2026-09-20",
            "targetClasses": []
        }),
    );
    assert_eq!(error_code(&no_targets), "bad_params");

    let bad_date = request(
        &mut stdin,
        &mut reader,
        "3",
        "exams.create",
        json!({
            "name": "Sloppy",
            "startDate": "10-09-2026",
            "endDate": "2026-09-20",
            "targetClasses": ["5"]
        }),
    );
    assert_eq!(error_code(&bad_date), "bad_params");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
