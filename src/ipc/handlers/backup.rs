use crate::auth::Operation;
use crate::backup;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{authorize, get_required_str, require_confirm, require_session, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let prep = require_session(state)
        .and_then(|user| authorize(user, &Operation::ManageBackups))
        .and_then(|_| get_required_str(&req.params, "outPath"));
    let out_path = match prep {
        Ok(p) => PathBuf::from(p),
        Err(e) => return e.response(&req.id),
    };

    match backup::export_registry_bundle(&workspace, &out_path) {
        Ok(summary) => {
            log::info!("registry exported to {}", out_path.to_string_lossy());
            ok(
                &req.id,
                json!({
                    "outPath": out_path.to_string_lossy(),
                    "bundleFormat": summary.bundle_format,
                    "entryCount": summary.entry_count
                }),
            )
        }
        Err(e) => err(&req.id, "sync_failed", format!("{e:?}"), None),
    }
}

/// Replaces the live registry with the bundle's copy. The connection is closed
/// before the file swap and reopened after it.
fn handle_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let prep = require_session(state)
        .and_then(|user| authorize(user, &Operation::ManageBackups))
        .and_then(|_| require_confirm(&req.params))
        .and_then(|_| get_required_str(&req.params, "inPath"));
    let in_path = match prep {
        Ok(p) => PathBuf::from(p),
        Err(e) => return e.response(&req.id),
    };

    state.db = None;
    let imported = backup::import_registry_bundle(&in_path, &workspace);
    let reopened = db::open_db(&workspace);
    match (imported, reopened) {
        (Ok(summary), Ok(conn)) => {
            state.db = Some(conn);
            // The imported registry has its own accounts; the old session is void.
            state.session = None;
            state.nav = crate::nav::NavState::default();
            log::info!("registry imported from {}", in_path.to_string_lossy());
            ok(
                &req.id,
                json!({ "bundleFormat": summary.bundle_format_detected }),
            )
        }
        (Err(e), Ok(conn)) => {
            state.db = Some(conn);
            err(&req.id, "sync_failed", format!("{e:?}"), None)
        }
        (_, Err(e)) => err(&req.id, "service_unavailable", format!("{e:?}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.export" => Some(handle_export(state, req)),
        "backup.import" => Some(handle_import(state, req)),
        _ => None,
    }
}
