use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::auth::SessionUser;
use crate::nav::NavState;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The whole mutable application state. Handlers receive it `&mut`; every
/// state transition goes through one handler entry-point.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub session: Option<SessionUser>,
    pub nav: NavState,
}
