use chrono::{TimeZone, Utc};
use nuclassd::backup::{self, BackupDocument, BackupMeta};
use nuclassd::{ClassKey, Position, Session, StudentRef};
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

const TEXT: &str = "3 1 1 김민수 2011.07.23. 남 634.17 2 5 28 \
                    3 1 2 박서연 2011.03.02. 여 701.50 2 4 11 \
                    3 2 1 이도윤 2011.09.14. 남 588.00 2 5 3";

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

fn meta() -> BackupMeta {
    BackupMeta {
        school_name: Some("누리중".to_string()),
        grade: Some("2학년".to_string()),
    }
}

fn edited_session() -> Session {
    let mut session = Session::new();
    session.import_text(TEXT);
    session
        .swap(
            Position::new(ClassKey::new(3, 1), 0),
            Position::new(ClassKey::new(3, 2), 0),
        )
        .expect("swap");
    session
        .constraints_mut()
        .add_group(
            vec![StudentRef::named("김민수"), StudentRef::named("박서연")],
            "",
        )
        .expect("group");
    session
}

fn document() -> BackupDocument {
    let saved_at = Utc.with_ymd_and_hms(2026, 2, 20, 9, 30, 0).unwrap();
    BackupDocument::capture(&edited_session(), meta(), saved_at)
}

#[test]
fn json_backup_is_a_fixed_point() {
    let doc = document();
    let first = doc.to_json().expect("serialize");

    let mut restored = Session::new();
    BackupDocument::from_json(&first)
        .expect("parse")
        .apply_to(&mut restored);
    let second = BackupDocument::capture(
        &restored,
        meta(),
        Utc.with_ymd_and_hms(2026, 2, 20, 9, 30, 0).unwrap(),
    )
    .to_json()
    .expect("serialize again");

    assert_eq!(first, second);
    assert_eq!(restored.undo_depth(), 0);
    assert_eq!(restored.ledger().history.len(), 1);
    assert_eq!(restored.constraints().groups.len(), 1);

    let value: serde_json::Value = serde_json::from_str(&first).expect("json");
    assert_eq!(value["schoolName"], "누리중");
    assert_eq!(value["savedAt"], "2026-02-20T09:30:00.000Z");
    assert_eq!(value["classData"]["3-1"][0]["성명"], "이도윤");
    assert_eq!(value["changedStudents"], serde_json::json!(["3-1-이도윤", "3-2-김민수"]));
}

#[test]
fn restore_without_constraint_lists_keeps_current_constraints() {
    let text = r#"{
        "schoolName": "누리중",
        "grade": "2학년",
        "classData": {
            "3-1": [{"번호":"1","성명":"김민수","생년월일":"2011.07.23.","성별":"남",
                     "기준성적":"634.17","이전학적":"2 5 28","이전학적학년":"2",
                     "이전학적반":"5","이전학적번호":"28"}],
            "history": ["stray"],
            "undefined": []
        },
        "changedStudents": ["3-1-김민수", "garbage"]
    }"#;

    let mut session = edited_session();
    BackupDocument::from_json(text)
        .expect("legacy document")
        .apply_to(&mut session);

    assert_eq!(session.roster().class_keys(), vec![ClassKey::new(3, 1)]);
    assert!(session.ledger().history.is_empty());
    assert_eq!(session.ledger().changed.len(), 1);
    assert!(session.ledger().moved.is_empty());
    assert_eq!(session.constraints().groups.len(), 1);
}

#[test]
fn document_without_class_data_is_rejected() {
    assert!(BackupDocument::from_json(r#"{"history": []}"#).is_err());
    assert!(BackupDocument::from_json("not json").is_err());
}

#[test]
fn zip_export_and_import_roundtrip() {
    let out_dir = temp_dir("nuclass-backup-out");
    let bundle_path = out_dir.join("nested").join("roster.zip");

    let doc = document();
    let export = backup::export_bundle(&doc, &bundle_path).expect("export bundle");
    assert_eq!(export.bundle_format, backup::BUNDLE_FORMAT_V1);
    assert_eq!(export.entry_count, 2);
    assert_eq!(export.payload_sha256.len(), 64);

    let f = File::open(&bundle_path).expect("open bundle");
    let mut archive = zip::ZipArchive::new(f).expect("open zip archive");
    let mut manifest = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    assert!(manifest.contains(backup::BUNDLE_FORMAT_V1));
    assert!(manifest.contains(&export.payload_sha256));
    archive
        .by_name("data/backup.json")
        .expect("payload entry in bundle");

    let (restored, import) = backup::import_bundle(&bundle_path).expect("import bundle");
    assert_eq!(import.bundle_format_detected, backup::BUNDLE_FORMAT_V1);
    assert_eq!(restored, doc);

    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn tampered_payload_is_rejected() {
    let out_dir = temp_dir("nuclass-backup-tamper");
    let good = out_dir.join("good.zip");
    let bad = out_dir.join("bad.zip");
    backup::export_bundle(&document(), &good).expect("export bundle");

    let mut archive = zip::ZipArchive::new(File::open(&good).expect("open")).expect("zip");
    let mut manifest = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    let mut payload = String::new();
    archive
        .by_name("data/backup.json")
        .expect("payload")
        .read_to_string(&mut payload)
        .expect("read payload");
    let payload = payload.replace("김민수", "김민준");

    let mut zip = zip::ZipWriter::new(File::create(&bad).expect("create"));
    let opts = zip::write::FileOptions::default();
    zip.start_file("manifest.json", opts).expect("start manifest");
    zip.write_all(manifest.as_bytes()).expect("write manifest");
    zip.start_file("data/backup.json", opts).expect("start payload");
    zip.write_all(payload.as_bytes()).expect("write payload");
    zip.finish().expect("finish");

    let e = backup::import_bundle(&bad).expect_err("checksum mismatch");
    assert!(e.to_string().contains("checksum"), "{e}");

    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn legacy_json_import_is_supported() {
    let out_dir = temp_dir("nuclass-backup-legacy");
    let legacy_file = out_dir.join("누리중_2학년_백업_2026-02-20.json");
    std::fs::write(&legacy_file, document().to_json().expect("json")).expect("write legacy file");

    let (doc, import) = backup::import_bundle(&legacy_file).expect("import legacy json");
    assert_eq!(import.bundle_format_detected, backup::LEGACY_JSON_FORMAT);
    assert_eq!(doc.class_data.student_count(), 3);

    let _ = std::fs::remove_dir_all(out_dir);
}
