use crate::auth::Operation;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{authorize, require_session, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const SETTINGS_KEY: &str = "school_settings";

/// The institutional settings singleton. Always read and written as a whole
/// document; there is no partial-field update and the last writer wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchoolSettings {
    pub school_name: String,
    pub vision: String,
    pub location: String,
    pub contact: String,
    pub email: String,
    pub website: String,
    pub junior_max_class: u32,
    /// class number ("1".."12") -> number of sections (1..=5)
    pub class_configs: BTreeMap<String, u32>,
}

impl Default for SchoolSettings {
    fn default() -> Self {
        let mut class_configs = BTreeMap::new();
        for class in 1..=12u32 {
            class_configs.insert(class.to_string(), 1);
        }
        Self {
            school_name: String::new(),
            vision: String::new(),
            location: String::new(),
            contact: String::new(),
            email: String::new(),
            website: String::new(),
            junior_max_class: 5,
            class_configs,
        }
    }
}

impl SchoolSettings {
    fn validate(&self) -> Result<(), HandlerErr> {
        if !(1..=11).contains(&self.junior_max_class) {
            return Err(HandlerErr::bad_params("juniorMaxClass must be 1-11"));
        }
        for (class, sections) in &self.class_configs {
            let class_ok = class
                .parse::<u32>()
                .map(|n| (1..=12).contains(&n))
                .unwrap_or(false);
            if !class_ok {
                return Err(HandlerErr::bad_params(format!(
                    "classConfigs key must be 1-12, got {}",
                    class
                )));
            }
            if !(1..=5).contains(sections) {
                return Err(HandlerErr::bad_params(
                    "classConfigs section counts must be 1-5",
                ));
            }
        }
        Ok(())
    }
}

/// Loads the singleton, writing defaults back on first access so every later
/// reader sees the same document.
pub fn load_or_init(conn: &Connection) -> Result<SchoolSettings, HandlerErr> {
    if let Some(saved) =
        db::settings_get_json(conn, SETTINGS_KEY).map_err(HandlerErr::unavailable)?
    {
        let parsed: SchoolSettings =
            serde_json::from_value(saved).map_err(HandlerErr::unavailable)?;
        return Ok(parsed);
    }

    let defaults = SchoolSettings::default();
    let doc = serde_json::to_value(&defaults).map_err(HandlerErr::unavailable)?;
    db::settings_set_json(conn, SETTINGS_KEY, &doc)
        .map_err(|e| HandlerErr::sync_failed(e, "config"))?;
    Ok(defaults)
}

fn settings_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let Some(doc) = params.get("settings") else {
        return Err(HandlerErr::bad_params("missing settings document"));
    };
    let incoming: SchoolSettings = serde_json::from_value(doc.clone())
        .map_err(|e| HandlerErr::bad_params(format!("malformed settings document: {}", e)))?;
    incoming.validate()?;

    let doc = serde_json::to_value(&incoming).map_err(HandlerErr::unavailable)?;
    db::settings_set_json(conn, SETTINGS_KEY, &doc)
        .map_err(|e| HandlerErr::sync_failed(e, "config"))?;
    Ok(serde_json::json!({ "settings": doc }))
}

fn handle_settings_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match load_or_init(conn).and_then(|s| {
        serde_json::to_value(&s).map_err(HandlerErr::unavailable)
    }) {
        Ok(doc) => ok(&req.id, serde_json::json!({ "settings": doc })),
        Err(e) => e.response(&req.id),
    }
}

fn handle_settings_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let result = require_session(state)
        .and_then(|user| authorize(user, &Operation::ManageSettings))
        .and_then(|_| settings_update(conn, &req.params));
    match result {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "settings.get" => Some(handle_settings_get(state, req)),
        "settings.update" => Some(handle_settings_update(state, req)),
        _ => None,
    }
}
