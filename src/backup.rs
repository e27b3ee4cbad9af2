use crate::constraints::{ConstraintBook, SeparationGroup, SeparationTeam};
use crate::ledger::Ledger;
use crate::model::{Roster, StudentTag};
use crate::session::Session;
use anyhow::{anyhow, Context};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const DATA_ENTRY: &str = "data/backup.json";
pub const BUNDLE_FORMAT_V1: &str = "nuclass-backup-v1";
pub const LEGACY_JSON_FORMAT: &str = "legacy-json";

/// School/grade labels the operator works under; carried in backups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
}

/// Plain-data backup file. Older files (without constraint lists, or with
/// stray non-class keys in `classData`) still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    #[serde(flatten)]
    pub meta: BackupMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
    #[serde(deserialize_with = "lenient_roster")]
    pub class_data: Roster,
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default, deserialize_with = "lenient_tags")]
    pub changed_students: BTreeSet<StudentTag>,
    #[serde(default, deserialize_with = "lenient_tags")]
    pub moved_students: BTreeSet<StudentTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separation_groups: Option<Vec<SeparationGroup>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separation_teams: Option<Vec<SeparationTeam>>,
}

fn lenient_roster<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Roster, D::Error> {
    let raw = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
    Ok(Roster::from_class_data(&raw))
}

fn lenient_tags<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeSet<StudentTag>, D::Error> {
    let raw = Vec::<String>::deserialize(deserializer)?;
    Ok(raw.iter().filter_map(|s| s.parse().ok()).collect())
}

impl BackupDocument {
    pub fn capture(session: &Session, meta: BackupMeta, saved_at: DateTime<Utc>) -> Self {
        let ledger = session.ledger();
        Self {
            meta,
            saved_at: Some(saved_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            class_data: session.roster().clone(),
            history: ledger.history.clone(),
            changed_students: ledger.changed.clone(),
            moved_students: ledger.moved.clone(),
            separation_groups: Some(session.constraints().groups.clone()),
            separation_teams: Some(session.constraints().teams.clone()),
        }
    }

    /// Replaces the session's roster and ledger; constraint lists are only
    /// replaced when the document carries them.
    pub fn apply_to(self, session: &mut Session) {
        let ledger = Ledger {
            history: self.history,
            changed: self.changed_students,
            moved: self.moved_students,
        };
        session.restore(self.class_data, ledger);
        if self.separation_groups.is_some() || self.separation_teams.is_some() {
            session.replace_constraints(ConstraintBook {
                groups: self.separation_groups.unwrap_or_default(),
                teams: self.separation_teams.unwrap_or_default(),
            });
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize backup")
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(text).context("backup is not valid JSON")?;
        if value.get("classData").is_none() {
            return Err(anyhow!("backup has no classData"));
        }
        serde_json::from_value(value).context("backup has an unexpected shape")
    }
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub payload_sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn export_bundle(doc: &BackupDocument, out_path: &Path) -> anyhow::Result<ExportSummary> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let payload = doc.to_json()?;
    let payload_sha256 = sha256_hex(payload.as_bytes());

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        "payloadSha256": payload_sha256,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(DATA_ENTRY, opts)
        .context("failed to start backup entry")?;
    zip.write_all(payload.as_bytes())
        .context("failed to write backup entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: 2,
        payload_sha256,
    })
}

/// Reads a bundle written by [`export_bundle`], or a bare JSON backup file.
pub fn import_bundle(in_path: &Path) -> anyhow::Result<(BackupDocument, ImportSummary)> {
    if !is_zip_file(in_path)? {
        let text = std::fs::read_to_string(in_path)
            .with_context(|| format!("failed to read backup {}", in_path.to_string_lossy()))?;
        let doc = BackupDocument::from_json(&text)?;
        return Ok((
            doc,
            ImportSummary {
                bundle_format_detected: LEGACY_JSON_FORMAT.to_string(),
            },
        ));
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let mut payload = String::new();
    archive
        .by_name(DATA_ENTRY)
        .context("bundle missing data/backup.json")?
        .read_to_string(&mut payload)
        .context("failed to read backup entry")?;

    let expected = manifest
        .get("payloadSha256")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if sha256_hex(payload.as_bytes()) != expected {
        return Err(anyhow!("backup checksum mismatch"));
    }

    let doc = BackupDocument::from_json(&payload)?;
    Ok((
        doc,
        ImportSummary {
            bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        },
    ))
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("failed to read file signature")?;
    if read < 4 {
        return Ok(false);
    }
    Ok(sig == [0x50, 0x4B, 0x03, 0x04])
}
