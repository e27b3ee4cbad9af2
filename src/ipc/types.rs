use std::path::PathBuf;

use nuclassd::session::Session;
use nuclassd::store::Profile;
use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// School/grade the current session is saved under.
    pub profile: Option<Profile>,
    pub session: Session,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            db: None,
            profile: None,
            session: Session::new(),
        }
    }
}
