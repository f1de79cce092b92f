use crate::ipc::error::ok;
use crate::ipc::helpers::{get_required_str, parse_class, parse_section, require_session, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::nav::Tab;
use serde_json::json;

fn tab_param(params: &serde_json::Value) -> Result<Tab, HandlerErr> {
    let raw = get_required_str(params, "tab")?;
    Tab::parse(&raw)
        .ok_or_else(|| HandlerErr::bad_params("tab must be STUDENTS, HOMEWORK, ATTENDANCE or FINANCE"))
}

fn handle_nav_state(state: &mut AppState, req: &Request) -> serde_json::Value {
    match require_session(state) {
        Ok(_) => ok(&req.id, json!({ "tabs": state.nav.snapshot() })),
        Err(e) => e.response(&req.id),
    }
}

fn handle_select_class(state: &mut AppState, req: &Request) -> serde_json::Value {
    let prep = require_session(state)
        .map(|_| ())
        .and_then(|_| tab_param(&req.params))
        .and_then(|tab| Ok((tab, parse_class(&get_required_str(&req.params, "class")?)?)));
    match prep {
        Ok((tab, class)) => {
            let generation = state.nav.select_class(tab, class.clone());
            ok(
                &req.id,
                json!({
                    "tab": tab.as_str(),
                    "selectedClass": class,
                    "selectedSection": null,
                    "generation": generation
                }),
            )
        }
        Err(e) => e.response(&req.id),
    }
}

fn handle_select_section(state: &mut AppState, req: &Request) -> serde_json::Value {
    let prep = require_session(state)
        .map(|_| ())
        .and_then(|_| tab_param(&req.params))
        .and_then(|tab| Ok((tab, parse_section(&get_required_str(&req.params, "section")?)?)));
    match prep {
        Ok((tab, section)) => match state.nav.select_section(tab, section.clone()) {
            Ok(generation) => {
                let sel = state.nav.selection(tab);
                ok(
                    &req.id,
                    json!({
                        "tab": tab.as_str(),
                        "selectedClass": sel.class,
                        "selectedSection": section,
                        "generation": generation
                    }),
                )
            }
            Err(msg) => HandlerErr::bad_params(msg).response(&req.id),
        },
        Err(e) => e.response(&req.id),
    }
}

fn handle_back(state: &mut AppState, req: &Request) -> serde_json::Value {
    let prep = require_session(state)
        .map(|_| ())
        .and_then(|_| tab_param(&req.params));
    match prep {
        Ok(tab) => {
            let generation = state.nav.back(tab);
            let sel = state.nav.selection(tab);
            ok(
                &req.id,
                json!({
                    "tab": tab.as_str(),
                    "selectedClass": sel.class,
                    "selectedSection": sel.section,
                    "generation": generation
                }),
            )
        }
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "nav.state" => Some(handle_nav_state(state, req)),
        "nav.selectClass" => Some(handle_select_class(state, req)),
        "nav.selectSection" => Some(handle_select_section(state, req)),
        "nav.back" => Some(handle_back(state, req)),
        _ => None,
    }
}
