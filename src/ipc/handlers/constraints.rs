use crate::ipc::error::{core_err, err, ok};
use crate::ipc::helpers::{autosave_constraints, optional_str, required, required_str, student_refs};
use crate::ipc::types::{AppState, Request};
use nuclassd::constraints::{check_group, check_team};
use nuclassd::StudentRef;
use serde_json::json;

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!(state.session.constraints()))
}

fn handle_add_group(state: &mut AppState, req: &Request) -> serde_json::Value {
    let students = match student_refs(req, "students") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let reason = optional_str(req, "reason").unwrap_or("");

    match state.session.constraints_mut().add_group(students, reason) {
        Ok(id) => {
            autosave_constraints(state);
            ok(&req.id, json!({ "id": id }))
        }
        Err(e) => core_err(&req.id, &e),
    }
}

fn handle_remove_group(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match state.session.constraints_mut().remove_group(id) {
        Ok(removed) => {
            autosave_constraints(state);
            ok(&req.id, json!({ "removed": removed }))
        }
        Err(e) => core_err(&req.id, &e),
    }
}

fn handle_add_team(state: &mut AppState, req: &Request) -> serde_json::Value {
    let leader: StudentRef = match required(req, "leader") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let members = match student_refs(req, "members") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let reason = optional_str(req, "reason").unwrap_or("");

    match state.session.constraints_mut().add_team(leader, members, reason) {
        Ok(id) => {
            autosave_constraints(state);
            ok(&req.id, json!({ "id": id }))
        }
        Err(e) => core_err(&req.id, &e),
    }
}

fn handle_remove_team(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match state.session.constraints_mut().remove_team(id) {
        Ok(removed) => {
            autosave_constraints(state);
            ok(&req.id, json!({ "removed": removed }))
        }
        Err(e) => core_err(&req.id, &e),
    }
}

fn handle_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.session.constraints_mut().clear();
    autosave_constraints(state);
    ok(&req.id, json!({ "cleared": true }))
}

fn handle_check_group(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(group) = state.session.constraints().groups.iter().find(|g| g.id == id) else {
        return err(&req.id, "unknown_constraint", format!("no group with id {id}"), None);
    };
    ok(&req.id, json!(check_group(state.session.roster(), group)))
}

fn handle_check_team(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(team) = state.session.constraints().teams.iter().find(|t| t.id == id) else {
        return err(&req.id, "unknown_constraint", format!("no team with id {id}"), None);
    };
    ok(&req.id, json!(check_team(state.session.roster(), team)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "constraints.list" => Some(handle_list(state, req)),
        "constraints.addGroup" => Some(handle_add_group(state, req)),
        "constraints.removeGroup" => Some(handle_remove_group(state, req)),
        "constraints.addTeam" => Some(handle_add_team(state, req)),
        "constraints.removeTeam" => Some(handle_remove_team(state, req)),
        "constraints.clear" => Some(handle_clear(state, req)),
        "constraints.checkGroup" => Some(handle_check_group(state, req)),
        "constraints.checkTeam" => Some(handle_check_team(state, req)),
        _ => None,
    }
}
