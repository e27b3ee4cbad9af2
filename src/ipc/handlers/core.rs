use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{autosave_constraints, autosave_session, required_str};
use crate::ipc::types::{AppState, Request};
use nuclassd::store::{self, Profile, RecentKind};
use nuclassd::ConstraintBook;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "profile": state.profile,
        }),
    )
}

/// What the workspace held for the current profile.
#[derive(Debug, Clone, Copy, Default)]
struct ProfileLoad {
    restored_session: bool,
    restored_constraints: bool,
}

/// Loads what the workspace holds for the current profile into the session.
/// With `keep_unsaved`, in-memory state the workspace has no record of is
/// left in place; otherwise the session starts empty.
fn load_profile_state(state: &mut AppState, keep_unsaved: bool) -> anyhow::Result<ProfileLoad> {
    let (Some(conn), Some(profile)) = (state.db.as_ref(), state.profile.as_ref()) else {
        return Ok(ProfileLoad::default());
    };
    let saved = store::session_load(conn, profile)?;
    let book = store::constraints_load(conn, profile)?;

    let restored_constraints = book.is_some();
    match book {
        Some(b) => state.session.replace_constraints(b),
        None if keep_unsaved => {}
        None => state.session.replace_constraints(ConstraintBook::default()),
    }

    let restored_session = saved.is_some();
    match saved {
        Some(s) => state.session.restore(s.class_data, s.ledger),
        None if keep_unsaved => {}
        None => state.session.reset(),
    }

    Ok(ProfileLoad {
        restored_session,
        restored_constraints,
    })
}

/// Opens (or creates) the workspace database. Work done before a workspace
/// was chosen is written into it rather than dropped.
pub fn open_workspace(state: &mut AppState, path: PathBuf) -> anyhow::Result<()> {
    let conn = store::open_db(&path)?;
    state.workspace = Some(path);
    state.db = Some(conn);

    let loaded = load_profile_state(state, true)?;
    if !loaded.restored_session && !state.session.roster().is_empty() {
        autosave_session(state);
    }
    if !loaded.restored_constraints && !state.session.constraints().is_empty() {
        autosave_constraints(state);
    }
    Ok(())
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match required_str(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(resp) => return resp,
    };

    match open_workspace(state, path.clone()) {
        Ok(()) => {
            tracing::info!(path = %path.to_string_lossy(), "workspace selected");
            ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

fn handle_session_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let school_name = match required_str(req, "schoolName") {
        Ok(v) => v.trim().to_string(),
        Err(resp) => return resp,
    };
    let grade = match required_str(req, "grade") {
        Ok(v) => v.trim().to_string(),
        Err(resp) => return resp,
    };

    state.profile = Some(Profile {
        school_name: school_name.clone(),
        grade: grade.clone(),
    });

    if let Some(conn) = state.db.as_ref() {
        // Autocomplete lists only; a failure here must not block the session.
        for (kind, value) in [(RecentKind::SchoolName, &school_name), (RecentKind::Grade, &grade)] {
            if let Err(e) = store::recent_touch(conn, kind, value) {
                tracing::warn!(error = %e, value = %value, "recent input update failed");
            }
        }
    }

    let restored = if state.db.is_some() {
        match load_profile_state(state, false) {
            Ok(v) => v.restored_session,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    } else {
        state.session.reset();
        state.session.replace_constraints(ConstraintBook::default());
        false
    };

    let roster = state.session.roster();
    ok(
        &req.id,
        json!({
            "schoolName": school_name,
            "grade": grade,
            "restored": restored,
            "classCount": roster.class_count(),
            "studentCount": roster.student_count(),
        }),
    )
}

fn handle_session_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.session.reset();
    if let (Some(conn), Some(profile)) = (state.db.as_ref(), state.profile.as_ref()) {
        if let Err(e) = store::session_delete(conn, profile) {
            return err(&req.id, "db_delete_failed", e.to_string(), None);
        }
    }
    ok(&req.id, json!({ "reset": true }))
}

fn handle_recent_inputs(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "schoolNames": [], "grades": [] }));
    };
    let schools = store::recent_list(conn, RecentKind::SchoolName);
    let grades = store::recent_list(conn, RecentKind::Grade);
    match (schools, grades) {
        (Ok(s), Ok(g)) => ok(&req.id, json!({ "schoolNames": s, "grades": g })),
        (Err(e), _) | (_, Err(e)) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "workspace.recentInputs" => Some(handle_recent_inputs(state, req)),
        "session.open" => Some(handle_session_open(state, req)),
        "session.reset" => Some(handle_session_reset(state, req)),
        _ => None,
    }
}
