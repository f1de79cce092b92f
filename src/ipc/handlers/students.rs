use crate::auth::Operation;
use crate::ipc::error::ok;
use crate::ipc::handlers::sections::{student_row_json, STUDENT_COLUMNS};
use crate::ipc::helpers::{
    authorize, get_opt_str, get_required_str, now_iso, parse_class, parse_section, require_confirm,
    require_session, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn no_workspace(id: &str) -> serde_json::Value {
    HandlerErr {
        code: "no_workspace",
        message: "select a workspace first".to_string(),
        details: None,
    }
    .response(id)
}

fn fetch_student(conn: &Connection, id: &str) -> Result<serde_json::Value, HandlerErr> {
    let sql = format!("SELECT {} FROM students WHERE id = ? LIMIT 1", STUDENT_COLUMNS);
    conn.query_row(&sql, [id], student_row_json)
        .optional()
        .map_err(HandlerErr::unavailable)?
        .ok_or_else(|| HandlerErr::not_found("no such student"))
}

fn aadhaar_taken(conn: &Connection, aadhaar: &str, ignore_id: Option<&str>) -> Result<bool, HandlerErr> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM students WHERE aadhaar = ? LIMIT 1",
            [aadhaar],
            |r| r.get(0),
        )
        .optional()
        .map_err(HandlerErr::unavailable)?;
    Ok(match existing {
        Some(id) => ignore_id != Some(id.as_str()),
        None => false,
    })
}

fn enroll(
    conn: &Connection,
    state_session: &crate::auth::SessionUser,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let aadhaar = get_required_str(params, "aadhaar")?;
    let dob = get_required_str(params, "dob")?;
    let roll_no = get_required_str(params, "rollNo")?;
    let class = parse_class(&get_required_str(params, "class")?)?;
    let section = parse_section(&get_required_str(params, "section")?)?;

    authorize(
        state_session,
        &Operation::ManageSection {
            class: class.clone(),
            section: section.clone(),
        },
    )?;

    if aadhaar_taken(conn, &aadhaar, None)? {
        return Err(HandlerErr::duplicate(
            "a student with this aadhaar number is already enrolled",
        ));
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, name, aadhaar, dob, roll_no, class, section, is_blocked,
                              father_name, mother_name, address, admission_since, admission_class,
                              created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            id,
            name,
            aadhaar,
            dob,
            roll_no,
            class,
            section,
            get_opt_str(params, "fatherName"),
            get_opt_str(params, "motherName"),
            get_opt_str(params, "address"),
            get_opt_str(params, "admissionSince"),
            get_opt_str(params, "admissionClass"),
            now_iso(),
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            HandlerErr::duplicate("a student with this aadhaar number is already enrolled")
        }
        other => HandlerErr::sync_failed(other, "students"),
    })?;

    fetch_student(conn, &id).map(|student| json!({ "student": student }))
}

fn update(
    conn: &Connection,
    state_session: &crate::auth::SessionUser,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let current = fetch_student(conn, &id)?;
    let cur_class = current["class"].as_str().unwrap_or_default().to_string();
    let cur_section = current["section"].as_str().unwrap_or_default().to_string();

    authorize(
        state_session,
        &Operation::ManageSection {
            class: cur_class.clone(),
            section: cur_section.clone(),
        },
    )?;

    let class = match get_opt_str(params, "class") {
        Some(raw) => parse_class(&raw)?,
        None => cur_class.clone(),
    };
    let section = match get_opt_str(params, "section") {
        Some(raw) => parse_section(&raw)?,
        None => cur_section.clone(),
    };
    // Moving a student out of the section needs the destination scope too.
    if class != cur_class || section != cur_section {
        authorize(
            state_session,
            &Operation::ManageSection {
                class: class.clone(),
                section: section.clone(),
            },
        )?;
    }

    let aadhaar = get_opt_str(params, "aadhaar")
        .unwrap_or_else(|| current["aadhaar"].as_str().unwrap_or_default().to_string());
    if aadhaar_taken(conn, &aadhaar, Some(&id))? {
        return Err(HandlerErr::duplicate(
            "a student with this aadhaar number is already enrolled",
        ));
    }

    let field = |key: &str, col: &str| -> Option<String> {
        get_opt_str(params, key).or_else(|| current[col].as_str().map(str::to_string))
    };

    conn.execute(
        "UPDATE students SET name = ?, aadhaar = ?, dob = ?, roll_no = ?, class = ?, section = ?,
                             father_name = ?, mother_name = ?, address = ?,
                             admission_since = ?, admission_class = ?
         WHERE id = ?",
        rusqlite::params![
            field("name", "name"),
            aadhaar,
            field("dob", "dob"),
            field("rollNo", "rollNo"),
            class,
            section,
            field("fatherName", "fatherName"),
            field("motherName", "motherName"),
            field("address", "address"),
            field("admissionSince", "admissionSince"),
            field("admissionClass", "admissionClass"),
            id,
        ],
    )
    .map_err(|e| HandlerErr::sync_failed(e, "students"))?;

    fetch_student(conn, &id).map(|student| json!({ "student": student }))
}

fn set_blocked(
    conn: &Connection,
    state_session: &crate::auth::SessionUser,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let Some(blocked) = params.get("blocked").and_then(|v| v.as_bool()) else {
        return Err(HandlerErr::bad_params("missing blocked"));
    };
    // Cutting a family off from the portal is confirmed; restoring is not.
    if blocked {
        require_confirm(params)?;
    }

    let current = fetch_student(conn, &id)?;
    authorize(
        state_session,
        &Operation::ManageSection {
            class: current["class"].as_str().unwrap_or_default().to_string(),
            section: current["section"].as_str().unwrap_or_default().to_string(),
        },
    )?;

    conn.execute(
        "UPDATE students SET is_blocked = ? WHERE id = ?",
        rusqlite::params![blocked as i64, id],
    )
    .map_err(|e| HandlerErr::sync_failed(e, "students"))?;

    fetch_student(conn, &id).map(|student| json!({ "student": student }))
}

fn delete(
    conn: &Connection,
    state_session: &crate::auth::SessionUser,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    require_confirm(params)?;

    let current = fetch_student(conn, &id)?;
    authorize(
        state_session,
        &Operation::ManageSection {
            class: current["class"].as_str().unwrap_or_default().to_string(),
            section: current["section"].as_str().unwrap_or_default().to_string(),
        },
    )?;

    conn.execute("DELETE FROM students WHERE id = ?", [&id])
        .map_err(|e| HandlerErr::sync_failed(e, "students"))?;
    Ok(json!({ "deleted": id }))
}

fn dispatch(
    state: &mut AppState,
    req: &Request,
    f: fn(&Connection, &crate::auth::SessionUser, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let user = match require_session(state) {
        Ok(u) => u,
        Err(e) => return e.response(&req.id),
    };
    match f(conn, user, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.enroll" => Some(dispatch(state, req, enroll)),
        "students.update" => Some(dispatch(state, req, update)),
        "students.setBlocked" => Some(dispatch(state, req, set_blocked)),
        "students.delete" => Some(dispatch(state, req, delete)),
        _ => None,
    }
}
