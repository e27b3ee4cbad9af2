use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{autosave_constraints, autosave_session, backup_meta, required_str};
use crate::ipc::types::{AppState, Request};
use chrono::Utc;
use nuclassd::backup::{self, BackupDocument};
use nuclassd::export::file_stem;
use serde_json::json;
use std::path::PathBuf;

fn restored_summary(doc: &BackupDocument) -> serde_json::Value {
    json!({
        "schoolName": doc.meta.school_name,
        "grade": doc.meta.grade,
        "savedAt": doc.saved_at,
        "classCount": doc.class_data.class_count(),
        "studentCount": doc.class_data.student_count(),
        "historyCount": doc.history.len(),
        "hasConstraints": doc.separation_groups.is_some() || doc.separation_teams.is_some(),
    })
}

/// Swaps the document into the session and persists the result.
fn apply_document(state: &mut AppState, doc: BackupDocument) {
    let carries_constraints = doc.separation_groups.is_some() || doc.separation_teams.is_some();
    doc.apply_to(&mut state.session);
    autosave_session(state);
    if carries_constraints {
        autosave_constraints(state);
    }
}

fn handle_export_json(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.session.roster().is_empty() {
        return err(&req.id, "no_session", "no roster to back up", None);
    }
    let now = Utc::now();
    let meta = backup_meta(state);
    let file_name = format!("{}_백업_{}.json", file_stem(&meta), now.format("%Y-%m-%d"));
    let doc = BackupDocument::capture(&state.session, meta, now);
    match doc.to_json() {
        Ok(text) => ok(&req.id, json!({ "fileName": file_name, "json": text })),
        Err(e) => err(&req.id, "backup_failed", e.to_string(), None),
    }
}

fn handle_import_json(state: &mut AppState, req: &Request) -> serde_json::Value {
    let text = match required_str(req, "json") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let doc = match BackupDocument::from_json(text) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "invalid_backup", format!("{e:#}"), None),
    };

    let summary = restored_summary(&doc);
    apply_document(state, doc);
    tracing::info!("backup restored from json");
    ok(&req.id, summary)
}

fn handle_export_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = match required_str(req, "outPath") {
        Ok(v) => v.trim().to_string(),
        Err(resp) => return resp,
    };
    if state.session.roster().is_empty() {
        return err(&req.id, "no_session", "no roster to back up", None);
    }

    let doc = BackupDocument::capture(&state.session, backup_meta(state), Utc::now());
    let export = match backup::export_bundle(&doc, &PathBuf::from(&out_path)) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                e.to_string(),
                Some(json!({ "path": out_path })),
            )
        }
    };

    ok(
        &req.id,
        json!({
            "path": out_path,
            "bundleFormat": export.bundle_format,
            "entryCount": export.entry_count,
            "payloadSha256": export.payload_sha256,
        }),
    )
}

fn handle_import_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let in_path = match required_str(req, "inPath") {
        Ok(v) => v.trim().to_string(),
        Err(resp) => return resp,
    };
    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return err(
            &req.id,
            "not_found",
            "bundle file not found",
            Some(json!({ "path": in_path })),
        );
    }

    let (doc, import) = match backup::import_bundle(&src) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "invalid_backup",
                format!("{e:#}"),
                Some(json!({ "path": in_path })),
            )
        }
    };

    let mut summary = restored_summary(&doc);
    summary["bundleFormatDetected"] = json!(import.bundle_format_detected);
    apply_document(state, doc);
    tracing::info!(path = %in_path, format = %import.bundle_format_detected, "backup bundle restored");
    ok(&req.id, summary)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportJson" => Some(handle_export_json(state, req)),
        "backup.importJson" => Some(handle_import_json(state, req)),
        "backup.exportBundle" => Some(handle_export_bundle(state, req)),
        "backup.importBundle" => Some(handle_import_bundle(state, req)),
        _ => None,
    }
}
