use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use nuclassd::backup::BackupMeta;
use nuclassd::store::{self, SavedSession};
use nuclassd::{ClassKey, Position, StudentRef};
use serde::de::DeserializeOwned;

pub type HandlerResult<T> = Result<T, serde_json::Value>;

pub fn required_str<'a>(req: &'a Request, key: &str) -> HandlerResult<&'a str> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(err(&req.id, "bad_params", format!("missing {key}"), None)),
    }
}

/// Deserializes `params[key]` into `T`, reporting a `bad_params` error.
pub fn required<T: DeserializeOwned>(req: &Request, key: &str) -> HandlerResult<T> {
    let Some(raw) = req.params.get(key) else {
        return Err(err(&req.id, "bad_params", format!("missing {key}"), None));
    };
    serde_json::from_value(raw.clone())
        .map_err(|e| err(&req.id, "bad_params", format!("invalid {key}: {e}"), None))
}

pub fn class_key(req: &Request, key: &str) -> HandlerResult<ClassKey> {
    let raw = required_str(req, key)?;
    raw.parse::<ClassKey>()
        .map_err(|e| err(&req.id, e.code(), e.to_string(), None))
}

pub fn position(req: &Request, key: &str) -> HandlerResult<Position> {
    required(req, key)
}

pub fn student_refs(req: &Request, key: &str) -> HandlerResult<Vec<StudentRef>> {
    required(req, key)
}

pub fn optional_str<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Writes roster + ledger to the workspace when one is open. Failures are
/// logged; the in-memory session stays authoritative.
pub fn autosave_session(state: &AppState) {
    let (Some(conn), Some(profile)) = (state.db.as_ref(), state.profile.as_ref()) else {
        return;
    };
    let saved = SavedSession {
        class_data: state.session.roster().clone(),
        ledger: state.session.ledger().clone(),
    };
    if let Err(e) = store::session_save(conn, profile, &saved) {
        tracing::warn!(error = %e, school = %profile.school_name, "session autosave failed");
    }
}

pub fn autosave_constraints(state: &AppState) {
    let (Some(conn), Some(profile)) = (state.db.as_ref(), state.profile.as_ref()) else {
        return;
    };
    if let Err(e) = store::constraints_save(conn, profile, state.session.constraints()) {
        tracing::warn!(error = %e, school = %profile.school_name, "constraint autosave failed");
    }
}

/// Backup/export labels taken from the open profile.
pub fn backup_meta(state: &AppState) -> BackupMeta {
    match state.profile.as_ref() {
        Some(p) => BackupMeta {
            school_name: Some(p.school_name.clone()),
            grade: Some(p.grade.clone()),
        },
        None => BackupMeta::default(),
    }
}
