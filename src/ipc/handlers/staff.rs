use crate::auth::{self, Operation};
use crate::ipc::error::ok;
use crate::ipc::handlers::sections::{teacher_row_json, TEACHER_COLUMNS};
use crate::ipc::helpers::{
    authorize, get_opt_str, get_required_str, now_iso, parse_class, parse_section, require_confirm,
    require_session, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

const HEAD_ROLES: [&str; 2] = ["CLASS_TEACHER", "CO_CLASS_TEACHER"];

fn parse_category(raw: &str) -> Result<String, HandlerErr> {
    let s = raw.trim().to_uppercase();
    match s.as_str() {
        "JUNIOR" | "SENIOR" | "BOTH" => Ok(s),
        _ => Err(HandlerErr::bad_params(
            "sectionCategory must be JUNIOR, SENIOR or BOTH",
        )),
    }
}

fn parse_teacher_role(raw: &str) -> Result<String, HandlerErr> {
    let s = raw.trim().to_uppercase();
    match s.as_str() {
        "CLASS_TEACHER" | "CO_CLASS_TEACHER" | "SUBJECT_TEACHER" => Ok(s),
        _ => Err(HandlerErr::bad_params(
            "teacherRole must be CLASS_TEACHER, CO_CLASS_TEACHER or SUBJECT_TEACHER",
        )),
    }
}

fn fetch_teacher(conn: &Connection, id: &str) -> Result<serde_json::Value, HandlerErr> {
    let sql = format!("SELECT {} FROM teachers WHERE id = ? LIMIT 1", TEACHER_COLUMNS);
    conn.query_row(&sql, [id], teacher_row_json)
        .optional()
        .map_err(HandlerErr::unavailable)?
        .ok_or_else(|| HandlerErr::not_found("no such staff member"))
}

/// A section carries at most one CLASS_TEACHER and one CO_CLASS_TEACHER.
fn head_role_taken(
    conn: &Connection,
    class: &str,
    section: &str,
    role: &str,
    ignore_id: Option<&str>,
) -> Result<bool, HandlerErr> {
    if !HEAD_ROLES.contains(&role) {
        return Ok(false);
    }
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM teachers
             WHERE assigned_class = ? AND section = ? AND teacher_role = ? LIMIT 1",
            [class, section, role],
            |r| r.get(0),
        )
        .optional()
        .map_err(HandlerErr::unavailable)?;
    Ok(match existing {
        Some(id) => ignore_id != Some(id.as_str()),
        None => false,
    })
}

fn enroll(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let staff_id = get_required_str(params, "staffId")?.to_uppercase();
    let pin = get_required_str(params, "pin")?;
    if pin.len() < 4 {
        return Err(HandlerErr::bad_params("pin must be at least 4 digits"));
    }
    let class = parse_class(&get_required_str(params, "assignedClass")?)?;
    let section = parse_section(&get_required_str(params, "section")?)?;
    let category = parse_category(&get_required_str(params, "sectionCategory")?)?;
    let role = parse_teacher_role(&get_required_str(params, "teacherRole")?)?;

    let taken: Option<String> = conn
        .query_row(
            "SELECT id FROM teachers WHERE staff_id = ? LIMIT 1",
            [&staff_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(HandlerErr::unavailable)?;
    if taken.is_some() {
        return Err(HandlerErr::duplicate("this staff id is already registered"));
    }
    if head_role_taken(conn, &class, &section, &role, None)? {
        return Err(HandlerErr::duplicate(format!(
            "section {}-{} already has a {}",
            class, section, role
        )));
    }

    let id = Uuid::new_v4().to_string();
    let salt = auth::new_salt();
    let pin_hash = auth::hash_secret(&salt, &pin);
    conn.execute(
        "INSERT INTO teachers(id, name, staff_id, pin_hash, pin_salt,
                              assigned_class, section, section_category, teacher_role, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![id, name, staff_id, pin_hash, salt, class, section, category, role, now_iso()],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            HandlerErr::duplicate("this staff id is already registered")
        }
        other => HandlerErr::sync_failed(other, "teachers"),
    })?;

    fetch_teacher(conn, &id).map(|teacher| json!({ "teacher": teacher }))
}

fn list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let filter = match get_opt_str(params, "sectionCategory") {
        Some(raw) => Some(parse_category(&raw)?),
        None => None,
    };

    let sql = format!("SELECT {} FROM teachers ORDER BY name ASC", TEACHER_COLUMNS);
    let mut stmt = conn.prepare(&sql).map_err(HandlerErr::unavailable)?;
    let rows = stmt
        .query_map([], teacher_row_json)
        .map_err(HandlerErr::unavailable)?;

    let mut teachers = Vec::new();
    for row in rows {
        let t = row.map_err(HandlerErr::unavailable)?;
        // BOTH staff appear under either category filter.
        let keep = match filter.as_deref() {
            Some("BOTH") | None => true,
            Some(cat) => {
                let rec = t["sectionCategory"].as_str().unwrap_or_default();
                rec == cat || rec == "BOTH"
            }
        };
        if keep {
            teachers.push(t);
        }
    }
    Ok(json!({ "teachers": teachers }))
}

fn update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let current = fetch_teacher(conn, &id)?;

    let name = get_opt_str(params, "name")
        .unwrap_or_else(|| current["name"].as_str().unwrap_or_default().to_string());
    let class = match get_opt_str(params, "assignedClass") {
        Some(raw) => parse_class(&raw)?,
        None => current["assignedClass"].as_str().unwrap_or_default().to_string(),
    };
    let section = match get_opt_str(params, "section") {
        Some(raw) => parse_section(&raw)?,
        None => current["section"].as_str().unwrap_or_default().to_string(),
    };
    let category = match get_opt_str(params, "sectionCategory") {
        Some(raw) => parse_category(&raw)?,
        None => current["sectionCategory"].as_str().unwrap_or_default().to_string(),
    };
    let role = match get_opt_str(params, "teacherRole") {
        Some(raw) => parse_teacher_role(&raw)?,
        None => current["teacherRole"].as_str().unwrap_or_default().to_string(),
    };

    let new_pin = get_opt_str(params, "pin").filter(|p| !p.is_empty());
    if let Some(pin) = &new_pin {
        if pin.len() < 4 {
            return Err(HandlerErr::bad_params("pin must be at least 4 digits"));
        }
    }

    if head_role_taken(conn, &class, &section, &role, Some(&id))? {
        return Err(HandlerErr::duplicate(format!(
            "section {}-{} already has a {}",
            class, section, role
        )));
    }

    conn.execute(
        "UPDATE teachers SET name = ?, assigned_class = ?, section = ?,
                             section_category = ?, teacher_role = ?
         WHERE id = ?",
        rusqlite::params![name, class, section, category, role, id],
    )
    .map_err(|e| HandlerErr::sync_failed(e, "teachers"))?;

    // A fresh pin replaces the old digest outright.
    if let Some(pin) = new_pin {
        let salt = auth::new_salt();
        let pin_hash = auth::hash_secret(&salt, &pin);
        conn.execute(
            "UPDATE teachers SET pin_hash = ?, pin_salt = ? WHERE id = ?",
            rusqlite::params![pin_hash, salt, id],
        )
        .map_err(|e| HandlerErr::sync_failed(e, "teachers"))?;
    }

    fetch_teacher(conn, &id).map(|teacher| json!({ "teacher": teacher }))
}

fn delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    require_confirm(params)?;
    fetch_teacher(conn, &id)?;
    conn.execute("DELETE FROM teachers WHERE id = ?", [&id])
        .map_err(|e| HandlerErr::sync_failed(e, "teachers"))?;
    Ok(json!({ "deleted": id }))
}

fn dispatch(
    state: &mut AppState,
    req: &Request,
    f: fn(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return HandlerErr {
            code: "no_workspace",
            message: "select a workspace first".to_string(),
            details: None,
        }
        .response(&req.id);
    };
    let result = require_session(state)
        .and_then(|user| authorize(user, &Operation::ManageStaff))
        .and_then(|_| f(conn, &req.params));
    match result {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "staff.enroll" => Some(dispatch(state, req, enroll)),
        "staff.list" => Some(dispatch(state, req, list)),
        "staff.update" => Some(dispatch(state, req, update)),
        "staff.delete" => Some(dispatch(state, req, delete)),
        _ => None,
    }
}
