
use serde_json::json;
use test_support::*;

#[test]
fn first_read_creates_the_default_document() {
    let workspace = temp_dir("campus-settings-default");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    bootstrap_admin(&mut stdin, &mut reader, &workspace);

    let got = request_ok(&mut stdin, &mut reader, "1", "settings.get", json!({}));
    let settings = &got["settings"];
    assert_eq!(settings["schoolName"].as_str(), Some(""));
    assert_eq!(settings["juniorMaxClass"].as_u64(), Some(5));
    let configs = settings["classConfigs"].as_object().expect("classConfigs");
    assert_eq!(configs.len(), 12);
    for class in 1..=12u32 {
        assert_eq!(configs[&class.to_string()].as_u64(), Some(1));
    }

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn the_default_document_round_trips_unchanged() {
    let workspace = temp_dir("campus-settings-roundtrip");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    bootstrap_admin(&mut stdin, &mut reader, &workspace);

    // Saving exactly what the first read produced must succeed, empty
    // name fields and all.
    let doc = request_ok(&mut stdin, &mut reader, "1", "settings.get", json!({}))["settings"]
        .clone();
    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "settings.update",
        json!({ "settings": doc }),
    );
    assert_eq!(updated["settings"], doc);

    let reread = request_ok(&mut stdin, &mut reader, "3", "settings.get", json!({}));
    assert_eq!(reread["settings"], doc);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn updates_replace_the_whole_document() {
    let workspace = temp_dir("campus-settings-update");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    bootstrap_admin(&mut stdin, &mut reader, &workspace);

    let mut doc = request_ok(&mut stdin, &mut reader, "1", "settings.get", json!({}))["settings"]
        .clone();
    doc["schoolName"] = json!("St. Mary's Convent");
    doc["juniorMaxClass"] = json!(6);
    doc["classConfigs"]["5"] = json!(3);

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "settings.update",
        json!({ "settings": doc }),
    );
    assert_eq!(
        updated["settings"]["schoolName"].as_str(),
        Some("St. Mary's Convent")
    );

    let reread = request_ok(&mut stdin, &mut reader, "3", "settings.get", json!({}));
    assert_eq!(reread["settings"]["juniorMaxClass"].as_u64(), Some(6));
    assert_eq!(reread["settings"]["classConfigs"]["5"].as_u64(), Some(3));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn invalid_documents_and_wrong_roles_are_rejected() {
    let workspace = temp_dir("campus-settings-guard");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    bootstrap_admin(&mut stdin, &mut reader, &workspace);

    let mut doc = request_ok(&mut stdin, &mut reader, "1", "settings.get", json!({}))["settings"]
        .clone();
    doc["schoolName"] = json!("St. Mary's Convent");

    let mut too_many = doc.clone();
    too_many["classConfigs"]["5"] = json!(6);
    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "settings.update",
        json!({ "settings": too_many }),
    );
    assert_eq!(error_code(&resp), "bad_params");

    let mut bad_junior = doc.clone();
    bad_junior["juniorMaxClass"] = json!(12);
    let resp = request(
        &mut stdin,
        &mut reader,
        "3",
        "settings.update",
        json!({ "settings": bad_junior }),
    );
    assert_eq!(error_code(&resp), "bad_params");

    // Teachers can read but not write.
    let _ = enroll_teacher(
        &mut stdin, &mut reader, "t1", "Asha", "AV-01", "4321", "5", "B", "CLASS_TEACHER",
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "session.login",
        json!({ "role": "TEACHER", "staffId": "AV-01", "pin": "4321" }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "5", "settings.get", json!({}));
    let resp = request(
        &mut stdin,
        &mut reader,
        "6",
        "settings.update",
        json!({ "settings": doc }),
    );
    assert_eq!(error_code(&resp), "forbidden");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
