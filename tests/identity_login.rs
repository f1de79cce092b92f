
use serde_json::json;
use test_support::*;

#[test]
fn each_role_resolves_against_its_own_records() {
    let workspace = temp_dir("campus-identity");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    bootstrap_admin(&mut stdin, &mut reader, &workspace);

    let _ = enroll_teacher(
        &mut stdin, &mut reader, "t1", "Asha Verma", "tv-07", "4321", "5", "B", "CLASS_TEACHER",
    );
    let _ = enroll_student(
        &mut stdin, &mut reader, "s1", "Ravi Kumar", "111122223333", "12", "5", "B",
    );

    // Wrong admin password is rejected without leaking which part was wrong.
    let bad_admin = request(
        &mut stdin,
        &mut reader,
        "1",
        "session.login",
        json!({ "role": "ADMIN", "email": ADMIN_EMAIL, "password": "nope-nope" }),
    );
    assert_eq!(error_code(&bad_admin), "authentication_failed");

    // Staff ids match case-insensitively; the stored form is uppercase.
    let teacher = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "session.login",
        json!({ "role": "TEACHER", "staffId": "tv-07", "pin": "4321" }),
    );
    assert_eq!(teacher["user"]["staffId"].as_str(), Some("TV-07"));
    assert_eq!(teacher["user"]["assignedClass"].as_str(), Some("5"));

    let bad_pin = request(
        &mut stdin,
        &mut reader,
        "3",
        "session.login",
        json!({ "role": "TEACHER", "staffId": "TV-07", "pin": "0000" }),
    );
    assert_eq!(error_code(&bad_pin), "invalid_credentials");

    // Student verification is the exact aadhaar/dob/roll triple.
    let student = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "session.login",
        json!({
            "role": "STUDENT",
            "aadhaar": "111122223333",
            "dob": "2014-06-01",
            "rollNo": "12"
        }),
    );
    assert_eq!(student["user"]["role"].as_str(), Some("STUDENT"));

    let wrong_dob = request(
        &mut stdin,
        &mut reader,
        "5",
        "session.login",
        json!({
            "role": "STUDENT",
            "aadhaar": "111122223333",
            "dob": "2014-06-02",
            "rollNo": "12"
        }),
    );
    assert_eq!(error_code(&wrong_dob), "record_not_found");

    // A parent signs in with the same triple but carries the PARENT tag.
    let parent = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "session.login",
        json!({
            "role": "PARENT",
            "aadhaar": "111122223333",
            "dob": "2014-06-01",
            "rollNo": "12"
        }),
    );
    assert_eq!(parent["user"]["role"].as_str(), Some("PARENT"));

    let current = request_ok(&mut stdin, &mut reader, "7", "session.current", json!({}));
    assert_eq!(current["user"]["role"].as_str(), Some("PARENT"));

    let _ = request_ok(&mut stdin, &mut reader, "8", "session.logout", json!({}));
    let after = request_ok(&mut stdin, &mut reader, "9", "session.current", json!({}));
    assert!(after["user"].is_null());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn blocked_students_are_restricted_not_missing() {
    let workspace = temp_dir("campus-blocked");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    bootstrap_admin(&mut stdin, &mut reader, &workspace);

    let student_id = enroll_student(
        &mut stdin, &mut reader, "s1", "Meena Joshi", "444455556666", "3", "2", "A",
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.setBlocked",
        json!({ "id": student_id, "blocked": true, "confirm": true }),
    );

    let login = request(
        &mut stdin,
        &mut reader,
        "2",
        "session.login",
        json!({
            "role": "STUDENT",
            "aadhaar": "444455556666",
            "dob": "2014-06-01",
            "rollNo": "3"
        }),
    );
    assert_eq!(error_code(&login), "access_restricted");

    // Unblocking needs no confirmation and restores access.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.setBlocked",
        json!({ "id": student_id, "blocked": false }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "session.login",
        json!({
            "role": "STUDENT",
            "aadhaar": "444455556666",
            "dob": "2014-06-01",
            "rollNo": "3"
        }),
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn admin_provisioning_locks_after_first_account() {
    let workspace = temp_dir("campus-provision");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "admin.provision",
        json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
    );

    // A second anonymous provisioning attempt is shut out.
    let second = request(
        &mut stdin,
        &mut reader,
        "3",
        "admin.provision",
        json!({ "email": "intruder@example.com", "password": "longenough" }),
    );
    assert_eq!(error_code(&second), "forbidden");

    // A signed-in admin may add colleagues, but not reuse an email.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "session.login",
        json!({ "role": "ADMIN", "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "admin.provision",
        json!({ "email": "second@stmarys.example", "password": "also-long-enough" }),
    );
    let dup = request(
        &mut stdin,
        &mut reader,
        "6",
        "admin.provision",
        json!({ "email": ADMIN_EMAIL, "password": "whatever-else" }),
    );
    assert_eq!(error_code(&dup), "duplicate_record");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
