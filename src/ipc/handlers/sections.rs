use crate::ipc::error::ok;
use crate::ipc::helpers::{get_required_str, require_session, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::nav::Tab;
use crate::roster;
use rusqlite::Connection;
use serde_json::json;

pub fn student_row_json(r: &rusqlite::Row<'_>) -> rusqlite::Result<serde_json::Value> {
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "name": r.get::<_, String>(1)?,
        "aadhaar": r.get::<_, String>(2)?,
        "dob": r.get::<_, String>(3)?,
        "rollNo": r.get::<_, String>(4)?,
        "class": r.get::<_, String>(5)?,
        "section": r.get::<_, String>(6)?,
        "isBlocked": r.get::<_, i64>(7)? != 0,
        "fatherName": r.get::<_, Option<String>>(8)?,
        "motherName": r.get::<_, Option<String>>(9)?,
        "address": r.get::<_, Option<String>>(10)?,
        "admissionSince": r.get::<_, Option<String>>(11)?,
        "admissionClass": r.get::<_, Option<String>>(12)?
    }))
}

pub const STUDENT_COLUMNS: &str = "id, name, aadhaar, dob, roll_no, class, section, is_blocked,
       father_name, mother_name, address, admission_since, admission_class";

/// Roster for one (class, section): alphabetical fetch, then a stable numeric
/// re-sort on roll number so equal rolls keep name order.
pub fn section_roster(
    conn: &Connection,
    class: &str,
    section: &str,
) -> Result<Vec<serde_json::Value>, HandlerErr> {
    let sql = format!(
        "SELECT {} FROM students WHERE class = ? AND section = ? ORDER BY name ASC",
        STUDENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql).map_err(HandlerErr::unavailable)?;
    let rows = stmt
        .query_map([class, section], student_row_json)
        .map_err(HandlerErr::unavailable)?;
    let mut students = Vec::new();
    for row in rows {
        students.push(row.map_err(HandlerErr::unavailable)?);
    }
    roster::sort_by_roll(&mut students, |s| {
        s.get("rollNo").and_then(|v| v.as_str()).unwrap_or("")
    });
    Ok(students)
}

pub fn teacher_row_json(r: &rusqlite::Row<'_>) -> rusqlite::Result<serde_json::Value> {
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "name": r.get::<_, String>(1)?,
        "staffId": r.get::<_, String>(2)?,
        "assignedClass": r.get::<_, String>(3)?,
        "section": r.get::<_, String>(4)?,
        "sectionCategory": r.get::<_, String>(5)?,
        "teacherRole": r.get::<_, String>(6)?
    }))
}

pub const TEACHER_COLUMNS: &str =
    "id, name, staff_id, assigned_class, section, section_category, teacher_role";

/// The section's lead for one of the two head roles, or null. Matching records
/// are read in name order and the first one wins, so duplicate assignments
/// never make the answer flap between reads.
fn section_head(
    conn: &Connection,
    class: &str,
    section: &str,
    role: &str,
) -> Result<serde_json::Value, HandlerErr> {
    let sql = format!(
        "SELECT {} FROM teachers
         WHERE assigned_class = ? AND section = ? AND teacher_role = ?
         ORDER BY name ASC LIMIT 1",
        TEACHER_COLUMNS
    );
    let mut stmt = conn.prepare(&sql).map_err(HandlerErr::unavailable)?;
    let mut rows = stmt
        .query_map([class, section, role], teacher_row_json)
        .map_err(HandlerErr::unavailable)?;
    match rows.next() {
        Some(row) => row.map_err(HandlerErr::unavailable),
        None => Ok(serde_json::Value::Null),
    }
}

fn handle_section_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return HandlerErr {
            code: "no_workspace",
            message: "select a workspace first".to_string(),
            details: None,
        }
        .response(&req.id);
    };

    let prep = require_session(state).map(|_| ()).and_then(|_| {
        let raw = get_required_str(&req.params, "tab")?;
        Tab::parse(&raw).ok_or_else(|| {
            HandlerErr::bad_params("tab must be STUDENTS, HOMEWORK, ATTENDANCE or FINANCE")
        })
    });
    let tab = match prep {
        Ok(tab) => tab,
        Err(e) => return e.response(&req.id),
    };

    let sel = state.nav.selection(tab);
    let (Some(class), Some(section)) = (sel.class.clone(), sel.section.clone()) else {
        return HandlerErr::bad_params("drill into a class and section first").response(&req.id);
    };
    let generation = sel.generation;

    let result = section_roster(conn, &class, &section).and_then(|students| {
        let class_teacher = section_head(conn, &class, &section, "CLASS_TEACHER")?;
        let co_class_teacher = section_head(conn, &class, &section, "CO_CLASS_TEACHER")?;
        Ok(json!({
            "tab": tab.as_str(),
            "class": class,
            "section": section,
            "generation": generation,
            "students": students,
            "classTeacher": class_teacher,
            "coClassTeacher": co_class_teacher
        }))
    });
    match result {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "section.open" => Some(handle_section_open(state, req)),
        _ => None,
    }
}
