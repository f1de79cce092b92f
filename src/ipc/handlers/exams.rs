use crate::auth::{Operation, Role};
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    authorize, get_opt_str, get_required_str, now_iso, parse_class, require_confirm,
    require_session, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, HandlerErr> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", field)))
}

fn parse_target_classes(params: &serde_json::Value) -> Result<Vec<String>, HandlerErr> {
    let Some(raw) = params.get("targetClasses").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing targetClasses"));
    };
    let mut classes = Vec::new();
    for entry in raw {
        let Some(s) = entry.as_str() else {
            return Err(HandlerErr::bad_params("targetClasses must be class strings"));
        };
        let class = parse_class(s)?;
        if !classes.contains(&class) {
            classes.push(class);
        }
    }
    if classes.is_empty() {
        return Err(HandlerErr::bad_params(
            "targetClasses must name at least one class",
        ));
    }
    Ok(classes)
}

fn row_json(r: &rusqlite::Row<'_>) -> rusqlite::Result<serde_json::Value> {
    let targets_raw: String = r.get(4)?;
    let target_classes: serde_json::Value =
        serde_json::from_str(&targets_raw).unwrap_or(serde_json::Value::Array(vec![]));
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "name": r.get::<_, String>(1)?,
        "startDate": r.get::<_, String>(2)?,
        "endDate": r.get::<_, String>(3)?,
        "targetClasses": target_classes,
        "datesheetUrl": r.get::<_, Option<String>>(5)?,
        "syllabusUrl": r.get::<_, Option<String>>(6)?,
        "note": r.get::<_, Option<String>>(7)?
    }))
}

const EXAM_COLUMNS: &str =
    "id, name, start_date, end_date, target_classes, datesheet_url, syllabus_url, note";

fn fetch_event(conn: &Connection, id: &str) -> Result<serde_json::Value, HandlerErr> {
    let sql = format!("SELECT {} FROM exam_events WHERE id = ? LIMIT 1", EXAM_COLUMNS);
    conn.query_row(&sql, [id], row_json)
        .optional()
        .map_err(HandlerErr::unavailable)?
        .ok_or_else(|| HandlerErr::not_found("no such exam event"))
}

struct EventFields {
    name: String,
    start_date: String,
    end_date: String,
    target_classes: Vec<String>,
    datesheet_url: Option<String>,
    syllabus_url: Option<String>,
    note: Option<String>,
}

fn parse_event(params: &serde_json::Value) -> Result<EventFields, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let start_raw = get_required_str(params, "startDate")?;
    let end_raw = get_required_str(params, "endDate")?;
    let start = parse_date(&start_raw, "startDate")?;
    let end = parse_date(&end_raw, "endDate")?;
    if start > end {
        return Err(HandlerErr::bad_params("startDate must not be after endDate"));
    }
    Ok(EventFields {
        name,
        start_date: start.to_string(),
        end_date: end.to_string(),
        target_classes: parse_target_classes(params)?,
        datesheet_url: get_opt_str(params, "datesheetUrl").filter(|s| !s.is_empty()),
        syllabus_url: get_opt_str(params, "syllabusUrl").filter(|s| !s.is_empty()),
        note: get_opt_str(params, "note").filter(|s| !s.is_empty()),
    })
}

fn create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let fields = parse_event(params)?;
    let id = Uuid::new_v4().to_string();
    let targets_doc = serde_json::Value::from(fields.target_classes.clone());
    conn.execute(
        "INSERT INTO exam_events(id, name, start_date, end_date, target_classes,
                                 datesheet_url, syllabus_url, note, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            id,
            fields.name,
            fields.start_date,
            fields.end_date,
            targets_doc.to_string(),
            fields.datesheet_url,
            fields.syllabus_url,
            fields.note,
            now_iso(),
        ],
    )
    .map_err(|e| HandlerErr::sync_failed(e, "exam_events"))?;
    fetch_event(conn, &id).map(|event| json!({ "event": event }))
}

fn update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    fetch_event(conn, &id)?;
    // Updates carry the full event, matching the editor's save.
    let fields = parse_event(params)?;
    let targets_doc = serde_json::Value::from(fields.target_classes.clone());
    conn.execute(
        "UPDATE exam_events SET name = ?, start_date = ?, end_date = ?, target_classes = ?,
                                datesheet_url = ?, syllabus_url = ?, note = ?
         WHERE id = ?",
        rusqlite::params![
            fields.name,
            fields.start_date,
            fields.end_date,
            targets_doc.to_string(),
            fields.datesheet_url,
            fields.syllabus_url,
            fields.note,
            id,
        ],
    )
    .map_err(|e| HandlerErr::sync_failed(e, "exam_events"))?;
    fetch_event(conn, &id).map(|event| json!({ "event": event }))
}

fn delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    require_confirm(params)?;
    fetch_event(conn, &id)?;
    conn.execute("DELETE FROM exam_events WHERE id = ?", [&id])
        .map_err(|e| HandlerErr::sync_failed(e, "exam_events"))?;
    Ok(json!({ "deleted": id }))
}

fn handle_admin_op(
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
        .and_then(|user| authorize(user, &Operation::ManageExams))
        .and_then(|_| f(conn, &req.params));
    match result {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

/// Admins and teachers see the whole calendar; students and parents only see
/// events that target their own class. Newest start date first.
fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return HandlerErr {
            code: "no_workspace",
            message: "select a workspace first".to_string(),
            details: None,
        }
        .response(&req.id);
    };
    let result = require_session(state).and_then(|user| {
        let sql = format!(
            "SELECT {} FROM exam_events ORDER BY start_date DESC",
            EXAM_COLUMNS
        );
        let mut stmt = conn.prepare(&sql).map_err(HandlerErr::unavailable)?;
        let rows = stmt.query_map([], row_json).map_err(HandlerErr::unavailable)?;
        let own_class = match user.role {
            Role::Student | Role::Parent => user.class.clone(),
            Role::Admin | Role::Teacher => None,
        };
        let mut events = Vec::new();
        for row in rows {
            let event = row.map_err(HandlerErr::unavailable)?;
            let keep = match &own_class {
                None => true,
                Some(class) => event["targetClasses"]
                    .as_array()
                    .map(|t| t.iter().any(|c| c.as_str() == Some(class.as_str())))
                    .unwrap_or(false),
            };
            if keep {
                events.push(event);
            }
        }
        Ok(json!({ "events": events }))
    });
    match result {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "exams.create" => Some(handle_admin_op(state, req, create)),
        "exams.update" => Some(handle_admin_op(state, req, update)),
        "exams.list" => Some(handle_list(state, req)),
        "exams.delete" => Some(handle_admin_op(state, req, delete)),
        _ => None,
    }
}
