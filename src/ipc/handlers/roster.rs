use crate::ipc::error::{core_err, err, ok};
use crate::ipc::helpers::{autosave_session, class_key, position, required, required_str};
use crate::ipc::types::{AppState, Request};
use nuclassd::{ClassKey, Marker, Position, Student};
use serde::Serialize;
use serde_json::json;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StudentRow<'a> {
    index: usize,
    #[serde(flatten)]
    student: &'a Student,
    marker: Option<Marker>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassView<'a> {
    class_key: ClassKey,
    violation_count: usize,
    students: Vec<StudentRow<'a>>,
}

fn roster_view(state: &AppState) -> serde_json::Value {
    let session = &state.session;
    let counts = session.violations_per_class();
    let classes: Vec<ClassView<'_>> = session
        .roster()
        .classes()
        .map(|(key, students)| ClassView {
            class_key: *key,
            violation_count: counts.get(key).copied().unwrap_or(0),
            students: students
                .iter()
                .enumerate()
                .map(|(index, student)| StudentRow {
                    index,
                    student,
                    marker: session.ledger().marker(*key, &student.name),
                })
                .collect(),
        })
        .collect();

    json!({
        "classes": classes,
        "classCount": session.roster().class_count(),
        "studentCount": session.roster().student_count(),
        "history": session.ledger().history,
        "undoDepth": session.undo_depth(),
    })
}

fn handle_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let text = match req.params.get("text").and_then(|v| v.as_str()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing text", None),
    };

    let summary = state.session.import_text(text);
    tracing::info!(
        continuing = summary.continuing,
        transfer_in = summary.transfer_in,
        "roster imported"
    );
    autosave_session(state);

    ok(
        &req.id,
        json!({
            "continuing": summary.continuing,
            "transferIn": summary.transfer_in,
            "total": summary.total(),
            "classKeys": state.session.roster().class_keys(),
        }),
    )
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, roster_view(state))
}

fn handle_swap(state: &mut AppState, req: &Request) -> serde_json::Value {
    let a = match position(req, "a") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let b = match position(req, "b") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    if let Err(e) = state.session.swap(a, b) {
        return core_err(&req.id, &e);
    }
    autosave_session(state);
    ok(
        &req.id,
        json!({
            "history": state.session.ledger().history.last(),
            "undoDepth": state.session.undo_depth(),
        }),
    )
}

fn handle_move(state: &mut AppState, req: &Request) -> serde_json::Value {
    let positions: Vec<Position> = match required(req, "positions") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    // Either a full key, or a class number within the selection's grade.
    let target = if req.params.get("targetClassKey").is_some() {
        match class_key(req, "targetClassKey") {
            Ok(v) => v,
            Err(resp) => return resp,
        }
    } else {
        let Some(class) = req.params.get("targetClass").and_then(|v| v.as_u64()) else {
            return err(&req.id, "bad_params", "missing targetClassKey or targetClass", None);
        };
        let Ok(class) = u32::try_from(class) else {
            return err(&req.id, "bad_params", format!("targetClass out of range: {class}"), None);
        };
        match state.session.target_in_grade(&positions, class) {
            Ok(v) => v,
            Err(e) => return core_err(&req.id, &e),
        }
    };

    let moved = match state.session.move_students(&positions, target) {
        Ok(v) => v,
        Err(e) => return core_err(&req.id, &e),
    };
    autosave_session(state);
    ok(
        &req.id,
        json!({
            "moved": moved,
            "undoDepth": state.session.undo_depth(),
        }),
    )
}

fn handle_sort_by_name(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.session.sort_by_name();
    autosave_session(state);
    ok(&req.id, roster_view(state))
}

fn handle_set_note(state: &mut AppState, req: &Request) -> serde_json::Value {
    let pos = if req.params.get("position").is_some() {
        match position(req, "position") {
            Ok(v) => v,
            Err(resp) => return resp,
        }
    } else {
        let key = match class_key(req, "classKey") {
            Ok(v) => v,
            Err(resp) => return resp,
        };
        let Some(index) = req
            .params
            .get("index")
            .and_then(|v| v.as_u64())
            .and_then(|v| usize::try_from(v).ok())
        else {
            return err(&req.id, "bad_params", "missing index", None);
        };
        Position::new(key, index)
    };
    let text = req
        .params
        .get("text")
        .and_then(|v| v.as_str())
        .unwrap_or("");

    if let Err(e) = state.session.set_note(pos, text) {
        return core_err(&req.id, &e);
    }
    autosave_session(state);
    let note = state.session.roster().get(&pos).and_then(|s| s.note.clone());
    ok(&req.id, json!({ "note": note }))
}

fn handle_undo(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = state.session.undo() {
        return core_err(&req.id, &e);
    }
    autosave_session(state);
    ok(&req.id, json!({ "undoDepth": state.session.undo_depth() }))
}

fn handle_history(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ledger = state.session.ledger();
    ok(
        &req.id,
        json!({
            "history": ledger.history,
            "changedStudents": ledger.changed,
            "movedStudents": ledger.moved,
        }),
    )
}

fn handle_find(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name = match required_str(req, "name") {
        Ok(v) => v.trim(),
        Err(resp) => return resp,
    };
    ok(
        &req.id,
        json!({ "positions": state.session.roster().find_by_name(name) }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roster.import" => Some(handle_import(state, req)),
        "roster.get" => Some(handle_get(state, req)),
        "roster.swap" => Some(handle_swap(state, req)),
        "roster.move" => Some(handle_move(state, req)),
        "roster.sortByName" => Some(handle_sort_by_name(state, req)),
        "roster.setNote" => Some(handle_set_note(state, req)),
        "roster.undo" => Some(handle_undo(state, req)),
        "roster.find" => Some(handle_find(state, req)),
        "history.get" => Some(handle_history(state, req)),
        _ => None,
    }
}
