use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{backup_meta, class_key};
use crate::ipc::types::{AppState, Request};
use chrono::Datelike;
use nuclassd::export::{excel_rows, file_stem, pdf_report};
use serde_json::json;

fn handle_violations(state: &mut AppState, req: &Request) -> serde_json::Value {
    if req.params.get("classKey").is_some() {
        let key = match class_key(req, "classKey") {
            Ok(v) => v,
            Err(resp) => return resp,
        };
        let details = state.session.violation_details(&key);
        return ok(
            &req.id,
            json!({
                "classKey": key,
                "count": state.session.violations_per_class().get(&key).copied().unwrap_or(0),
                "details": details,
            }),
        );
    }

    let report = state.session.violation_report();
    let total: usize = report.iter().map(|c| c.count).sum();
    ok(&req.id, json!({ "total": total, "classes": report }))
}

fn handle_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!(state.session.stats()))
}

fn handle_excel_rows(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.session.roster().is_empty() {
        return err(&req.id, "no_session", "no roster loaded", None);
    }
    let meta = backup_meta(state);
    ok(
        &req.id,
        json!({
            "fileName": format!("{}_반편성결과.xlsx", file_stem(&meta)),
            "rows": excel_rows(state.session.roster()),
        }),
    )
}

fn handle_pdf_sheets(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.session.roster().is_empty() {
        return err(&req.id, "no_session", "no roster loaded", None);
    }
    let year = match req.params.get("year") {
        None | Some(serde_json::Value::Null) => chrono::Local::now().year(),
        Some(v) => match v.as_i64().and_then(|y| i32::try_from(y).ok()) {
            Some(y) => y,
            None => return err(&req.id, "bad_params", format!("invalid year: {v}"), None),
        },
    };
    let meta = backup_meta(state);
    let report = pdf_report(state.session.roster(), state.session.ledger(), &meta, year);
    ok(
        &req.id,
        json!({
            "fileName": format!("{}_반편성내역.pdf", file_stem(&meta)),
            "report": report,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "violations.get" => Some(handle_violations(state, req)),
        "stats.get" => Some(handle_stats(state, req)),
        "export.excelRows" => Some(handle_excel_rows(state, req)),
        "export.pdfSheets" => Some(handle_pdf_sheets(state, req)),
        _ => None,
    }
}
