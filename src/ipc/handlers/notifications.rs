use crate::auth::{Operation, Role};
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    authorize, get_opt_str, get_required_str, now_iso, require_confirm, require_session, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn parse_targets(params: &serde_json::Value) -> Result<Vec<String>, HandlerErr> {
    let Some(raw) = params.get("targets").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing targets"));
    };
    let mut targets = Vec::new();
    for entry in raw {
        let Some(role) = entry.as_str().and_then(Role::parse) else {
            return Err(HandlerErr::bad_params(
                "targets must be roles: ADMIN, TEACHER, STUDENT, PARENT",
            ));
        };
        let tag = role.as_str().to_string();
        if !targets.contains(&tag) {
            targets.push(tag);
        }
    }
    if targets.is_empty() {
        return Err(HandlerErr::bad_params("targets must name at least one role"));
    }
    Ok(targets)
}

fn row_json(r: &rusqlite::Row<'_>) -> rusqlite::Result<serde_json::Value> {
    let targets_raw: String = r.get(4)?;
    let targets: serde_json::Value =
        serde_json::from_str(&targets_raw).unwrap_or(serde_json::Value::Array(vec![]));
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "subject": r.get::<_, String>(1)?,
        "content": r.get::<_, String>(2)?,
        "senderName": r.get::<_, String>(3)?,
        "targets": targets,
        "createdAt": r.get::<_, String>(5)?
    }))
}

fn fetch_one(conn: &Connection, id: &str) -> Result<serde_json::Value, HandlerErr> {
    conn.query_row(
        "SELECT id, subject, content, sender_name, targets, created_at
         FROM notifications WHERE id = ? LIMIT 1",
        [id],
        row_json,
    )
    .optional()
    .map_err(HandlerErr::unavailable)?
    .ok_or_else(|| HandlerErr::not_found("no such notification"))
}

fn fetch_all(conn: &Connection) -> Result<Vec<serde_json::Value>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT id, subject, content, sender_name, targets, created_at
             FROM notifications ORDER BY created_at DESC",
        )
        .map_err(HandlerErr::unavailable)?;
    let rows = stmt.query_map([], row_json).map_err(HandlerErr::unavailable)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(HandlerErr::unavailable)?);
    }
    Ok(out)
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return HandlerErr {
            code: "no_workspace",
            message: "select a workspace first".to_string(),
            details: None,
        }
        .response(&req.id);
    };
    let result = require_session(state)
        .and_then(|user| authorize(user, &Operation::Broadcast).map(|_| user))
        .and_then(|user| {
            let subject = get_required_str(&req.params, "subject")?;
            let content = get_required_str(&req.params, "content")?;
            let targets = parse_targets(&req.params)?;
            let id = Uuid::new_v4().to_string();
            let targets_doc = serde_json::Value::from(targets.clone());
            conn.execute(
                "INSERT INTO notifications(id, subject, content, sender_name, targets, created_at)
                 VALUES(?, ?, ?, ?, ?, ?)",
                rusqlite::params![
                    id,
                    subject,
                    content,
                    user.name,
                    targets_doc.to_string(),
                    now_iso()
                ],
            )
            .map_err(|e| HandlerErr::sync_failed(e, "notifications"))?;
            // Echo the stored row so the response matches what list returns.
            fetch_one(conn, &id).map(|notification| json!({ "notification": notification }))
        });
    match result {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

/// `box: "inbox"` is role-filtered for the caller; `box: "history"` is the
/// admin-only full ledger. Both run newest first.
fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return HandlerErr {
            code: "no_workspace",
            message: "select a workspace first".to_string(),
            details: None,
        }
        .response(&req.id);
    };
    let which = get_opt_str(&req.params, "box").unwrap_or_else(|| "inbox".to_string());
    let result = require_session(state).and_then(|user| match which.as_str() {
        "inbox" => {
            let role_tag = user.role.as_str();
            let all = fetch_all(conn)?;
            let inbox: Vec<_> = all
                .into_iter()
                .filter(|n| {
                    n["targets"]
                        .as_array()
                        .map(|t| t.iter().any(|r| r.as_str() == Some(role_tag)))
                        .unwrap_or(false)
                })
                .collect();
            Ok(json!({ "notifications": inbox }))
        }
        "history" => {
            authorize(user, &Operation::Broadcast)?;
            Ok(json!({ "notifications": fetch_all(conn)? }))
        }
        _ => Err(HandlerErr::bad_params("box must be inbox or history")),
    });
    match result {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return HandlerErr {
            code: "no_workspace",
            message: "select a workspace first".to_string(),
            details: None,
        }
        .response(&req.id);
    };
    let result = require_session(state)
        .and_then(|user| authorize(user, &Operation::Broadcast))
        .and_then(|_| {
            let id = get_required_str(&req.params, "id")?;
            require_confirm(&req.params)?;
            let n = conn
                .execute("DELETE FROM notifications WHERE id = ?", [&id])
                .map_err(|e| HandlerErr::sync_failed(e, "notifications"))?;
            if n == 0 {
                return Err(HandlerErr::not_found("no such notification"));
            }
            Ok(json!({ "deleted": id }))
        });
    match result {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "notifications.create" => Some(handle_create(state, req)),
        "notifications.list" => Some(handle_list(state, req)),
        "notifications.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
