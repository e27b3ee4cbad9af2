use crate::constraints::ConstraintBook;
use crate::ledger::Ledger;
use crate::model::Roster;
use anyhow::Context;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DB_FILE: &str = "nuclass.sqlite3";
const RECENT_LIMIT: usize = 10;

/// The (school, grade) pair a roster session is saved under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub school_name: String,
    pub grade: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecentKind {
    SchoolName,
    Grade,
}

impl RecentKind {
    fn as_str(&self) -> &'static str {
        match self {
            RecentKind::SchoolName => "school_name",
            RecentKind::Grade => "grade",
        }
    }
}

/// Autosaved roster state, shaped like the backup document minus metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSession {
    #[serde(default)]
    pub class_data: Roster,
    #[serde(flatten)]
    pub ledger: Ledger,
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions(
            school_name TEXT NOT NULL,
            grade TEXT NOT NULL,
            data_json TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY(school_name, grade)
        )",
        [],
    )?;

    // Constraint lists live apart from the roster so a roster reset keeps them.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS constraint_sets(
            school_name TEXT NOT NULL,
            grade TEXT NOT NULL,
            data_json TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY(school_name, grade)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS recent_inputs(
            kind TEXT NOT NULL,
            value TEXT NOT NULL,
            used_at TEXT NOT NULL,
            PRIMARY KEY(kind, value)
        )",
        [],
    )?;

    Ok(conn)
}

pub fn session_save(conn: &Connection, profile: &Profile, saved: &SavedSession) -> anyhow::Result<()> {
    let data = serde_json::to_string(saved).context("failed to serialize session")?;
    conn.execute(
        "INSERT INTO sessions(school_name, grade, data_json, updated_at)
         VALUES(?, ?, ?, ?)
         ON CONFLICT(school_name, grade) DO UPDATE SET
           data_json = excluded.data_json,
           updated_at = excluded.updated_at",
        (&profile.school_name, &profile.grade, &data, Utc::now().to_rfc3339()),
    )?;
    Ok(())
}

pub fn session_load(conn: &Connection, profile: &Profile) -> anyhow::Result<Option<SavedSession>> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data_json FROM sessions WHERE school_name = ? AND grade = ?",
            (&profile.school_name, &profile.grade),
            |r| r.get(0),
        )
        .optional()?;
    match data {
        Some(text) => Ok(Some(
            serde_json::from_str(&text).context("stored session is not valid JSON")?,
        )),
        None => Ok(None),
    }
}

pub fn session_delete(conn: &Connection, profile: &Profile) -> anyhow::Result<()> {
    conn.execute(
        "DELETE FROM sessions WHERE school_name = ? AND grade = ?",
        (&profile.school_name, &profile.grade),
    )?;
    Ok(())
}

pub fn constraints_save(conn: &Connection, profile: &Profile, book: &ConstraintBook) -> anyhow::Result<()> {
    let data = serde_json::to_string(book).context("failed to serialize constraints")?;
    conn.execute(
        "INSERT INTO constraint_sets(school_name, grade, data_json, updated_at)
         VALUES(?, ?, ?, ?)
         ON CONFLICT(school_name, grade) DO UPDATE SET
           data_json = excluded.data_json,
           updated_at = excluded.updated_at",
        (&profile.school_name, &profile.grade, &data, Utc::now().to_rfc3339()),
    )?;
    Ok(())
}

/// `None` when nothing was ever saved for this profile.
pub fn constraints_load(conn: &Connection, profile: &Profile) -> anyhow::Result<Option<ConstraintBook>> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data_json FROM constraint_sets WHERE school_name = ? AND grade = ?",
            (&profile.school_name, &profile.grade),
            |r| r.get(0),
        )
        .optional()?;
    match data {
        Some(text) => Ok(Some(
            serde_json::from_str(&text).context("stored constraints are not valid JSON")?,
        )),
        None => Ok(None),
    }
}

/// Moves `value` to the front of the recent list for `kind`, keeping the
/// newest entries only.
pub fn recent_touch(conn: &Connection, kind: RecentKind, value: &str) -> anyhow::Result<()> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(());
    }
    // REPLACE deletes the old row, so rowid order is recency order.
    conn.execute(
        "INSERT OR REPLACE INTO recent_inputs(kind, value, used_at) VALUES(?, ?, ?)",
        (kind.as_str(), value, Utc::now().to_rfc3339()),
    )?;
    conn.execute(
        "DELETE FROM recent_inputs
         WHERE kind = ?1 AND rowid NOT IN (
           SELECT rowid FROM recent_inputs WHERE kind = ?1 ORDER BY rowid DESC LIMIT ?2
         )",
        (kind.as_str(), RECENT_LIMIT as i64),
    )?;
    Ok(())
}

pub fn recent_list(conn: &Connection, kind: RecentKind) -> anyhow::Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT value FROM recent_inputs WHERE kind = ? ORDER BY rowid DESC")?;
    let rows = stmt
        .query_map([kind.as_str()], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::StudentRef;
    use crate::parser::parse;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    fn profile() -> Profile {
        Profile {
            school_name: "누리중".to_string(),
            grade: "2학년".to_string(),
        }
    }

    #[test]
    fn session_roundtrip_and_delete() {
        let ws = temp_dir("nuclass-store-session");
        let conn = open_db(&ws).expect("open db");
        assert_eq!(session_load(&conn, &profile()).expect("load"), None);

        let mut saved = SavedSession {
            class_data: parse("3 1 1 김민수 2011.07.23. 남 634.17 2 5 28"),
            ..SavedSession::default()
        };
        saved.ledger.history.push("(이동) 2반 김민수 → 1반".to_string());
        session_save(&conn, &profile(), &saved).expect("save");
        session_save(&conn, &profile(), &saved).expect("save again");
        assert_eq!(session_load(&conn, &profile()).expect("load"), Some(saved));

        session_delete(&conn, &profile()).expect("delete");
        assert_eq!(session_load(&conn, &profile()).expect("load"), None);
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn constraints_are_stored_per_profile() {
        let ws = temp_dir("nuclass-store-constraints");
        let conn = open_db(&ws).expect("open db");
        let mut book = ConstraintBook::new();
        book.add_group(vec![StudentRef::named("가"), StudentRef::named("나")], "")
            .expect("group");
        constraints_save(&conn, &profile(), &book).expect("save");

        assert_eq!(constraints_load(&conn, &profile()).expect("load"), Some(book));
        let other = Profile {
            school_name: "누리중".to_string(),
            grade: "3학년".to_string(),
        };
        assert_eq!(constraints_load(&conn, &other).expect("load"), None);
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn recent_inputs_are_most_recent_first_and_capped() {
        let ws = temp_dir("nuclass-store-recent");
        let conn = open_db(&ws).expect("open db");
        for i in 0..12 {
            recent_touch(&conn, RecentKind::SchoolName, &format!("학교{i}")).expect("touch");
        }
        recent_touch(&conn, RecentKind::SchoolName, "학교5").expect("touch");
        recent_touch(&conn, RecentKind::Grade, "2학년").expect("touch");

        let schools = recent_list(&conn, RecentKind::SchoolName).expect("list");
        assert_eq!(schools.len(), RECENT_LIMIT);
        assert_eq!(schools[0], "학교5");
        assert_eq!(schools[1], "학교11");
        assert!(!schools.contains(&"학교0".to_string()));
        assert_eq!(recent_list(&conn, RecentKind::Grade).expect("list"), vec!["2학년"]);
        let _ = std::fs::remove_dir_all(ws);
    }
}
