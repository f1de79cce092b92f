use serde_json::json;

use crate::auth::{self, Operation, SessionUser};
use crate::ipc::error::err;
use crate::ipc::types::AppState;

/// Failure local to one handler; turned into a wire error at the boundary.
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            code: "not_found",
            message: message.into(),
            details: None,
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            code: "forbidden",
            message: message.into(),
            details: None,
        }
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Self {
            code: "duplicate_record",
            message: message.into(),
            details: None,
        }
    }

    /// A read against the store failed.
    pub fn unavailable(e: impl ToString) -> Self {
        Self {
            code: "service_unavailable",
            message: e.to_string(),
            details: None,
        }
    }

    /// A write against the store failed.
    pub fn sync_failed(e: impl ToString, table: &str) -> Self {
        Self {
            code: "sync_failed",
            message: e.to_string(),
            details: Some(json!({ "table": table })),
        }
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_opt_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
}

/// Destructive operations carry an explicit client-side confirmation.
pub fn require_confirm(params: &serde_json::Value) -> Result<(), HandlerErr> {
    if params.get("confirm").and_then(|v| v.as_bool()) == Some(true) {
        Ok(())
    } else {
        Err(HandlerErr::bad_params(
            "destructive operation requires confirm: true",
        ))
    }
}

pub fn require_session(state: &AppState) -> Result<&SessionUser, HandlerErr> {
    state.session.as_ref().ok_or(HandlerErr {
        code: "no_session",
        message: "sign in first".to_string(),
        details: None,
    })
}

pub fn authorize(user: &SessionUser, op: &Operation) -> Result<(), HandlerErr> {
    auth::authorize(user, op).map_err(HandlerErr::forbidden)
}

/// Classes are the strings "1" through "12".
pub fn parse_class(raw: &str) -> Result<String, HandlerErr> {
    match raw.trim().parse::<u32>() {
        Ok(n) if (1..=12).contains(&n) => Ok(n.to_string()),
        _ => Err(HandlerErr::bad_params("class must be 1-12")),
    }
}

/// Sections are single letters A through E.
pub fn parse_section(raw: &str) -> Result<String, HandlerErr> {
    let s = raw.trim().to_uppercase();
    if s.len() == 1 && ('A'..='E').contains(&s.chars().next().unwrap_or(' ')) {
        Ok(s)
    } else {
        Err(HandlerErr::bad_params("section must be A-E"))
    }
}

pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}
