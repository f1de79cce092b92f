use crate::auth::{self, LoginError, Role};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_required_str, now_iso, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::nav::NavState;
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn login_err(e: LoginError) -> HandlerErr {
    HandlerErr {
        code: e.code(),
        message: e.message(),
        details: None,
    }
}

fn provision_admin(
    conn: &Connection,
    caller_is_admin: bool,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let email = get_required_str(params, "email")?;
    let password = get_required_str(params, "password")?;
    if !email.contains('@') {
        return Err(HandlerErr::bad_params("email must be a valid address"));
    }
    if password.len() < 8 {
        return Err(HandlerErr::bad_params(
            "password must be at least 8 characters",
        ));
    }

    let existing = auth::admin_count(conn).map_err(HandlerErr::unavailable)?;
    if existing > 0 && !caller_is_admin {
        return Err(HandlerErr::forbidden(
            "an administrator account already exists",
        ));
    }

    let admin_id = Uuid::new_v4().to_string();
    let salt = auth::new_salt();
    let hash = auth::hash_secret(&salt, &password);
    conn.execute(
        "INSERT INTO admins(id, email, pass_hash, pass_salt, created_at)
         VALUES(?, ?, ?, ?, ?)",
        (&admin_id, &email, &hash, &salt, now_iso()),
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            HandlerErr::duplicate("this admin email is already registered")
        }
        other => HandlerErr::sync_failed(other, "admins"),
    })?;

    Ok(json!({ "adminId": admin_id, "email": email }))
}

fn resolve_login(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<auth::SessionUser, HandlerErr> {
    let role_raw = get_required_str(params, "role")?;
    let Some(role) = Role::parse(&role_raw) else {
        return Err(HandlerErr::bad_params("unknown role"));
    };

    match role {
        Role::Admin => {
            let email = get_required_str(params, "email")?;
            let password = get_required_str(params, "password")?;
            auth::login_admin(conn, &email, &password).map_err(login_err)
        }
        Role::Teacher => {
            let staff_id = get_required_str(params, "staffId")?;
            let pin = get_required_str(params, "pin")?;
            auth::login_teacher(conn, &staff_id, &pin).map_err(login_err)
        }
        Role::Student | Role::Parent => {
            let aadhaar = get_required_str(params, "aadhaar")?;
            let dob = get_required_str(params, "dob")?;
            let roll_no = get_required_str(params, "rollNo")?;
            auth::login_student(conn, role, &aadhaar, &dob, &roll_no).map_err(login_err)
        }
    }
}

fn handle_admin_provision(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let caller_is_admin = state
        .session
        .as_ref()
        .map(|s| s.role == Role::Admin)
        .unwrap_or(false);
    match provision_admin(conn, caller_is_admin, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_session_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match resolve_login(conn, &req.params) {
        Ok(user) => {
            let profile = user.profile.clone();
            state.session = Some(user);
            // Every session starts at the top of each drill-down.
            state.nav = NavState::default();
            ok(&req.id, json!({ "user": profile }))
        }
        Err(e) => {
            log::warn!("login rejected: {}", e.code);
            e.response(&req.id)
        }
    }
}

fn handle_session_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.session = None;
    state.nav = NavState::default();
    ok(&req.id, json!({ "ok": true }))
}

fn handle_session_current(state: &mut AppState, req: &Request) -> serde_json::Value {
    let user = state
        .session
        .as_ref()
        .map(|s| s.profile.clone())
        .unwrap_or(serde_json::Value::Null);
    ok(&req.id, json!({ "user": user }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "admin.provision" => Some(handle_admin_provision(state, req)),
        "session.login" => Some(handle_session_login(state, req)),
        "session.logout" => Some(handle_session_logout(state, req)),
        "session.current" => Some(handle_session_current(state, req)),
        _ => None,
    }
}
