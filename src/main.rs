mod config;
mod ipc;

use std::io::{self, BufRead, Write};

fn main() {
    let cfg = config::Config::load();
    config::init_tracing(&cfg.log_filter());

    let mut state = ipc::AppState::new();
    if let Some(path) = cfg.workspace.clone() {
        match ipc::open_workspace(&mut state, path.clone()) {
            Ok(()) => tracing::info!(path = %path.to_string_lossy(), "workspace opened at startup"),
            Err(e) => tracing::warn!(error = %e, path = %path.to_string_lossy(), "startup workspace failed"),
        }
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "nuclassd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to answer with.
                tracing::warn!(error = %e, "unparseable request");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{resp}");
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
