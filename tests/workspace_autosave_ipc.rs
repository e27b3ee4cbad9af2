use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
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

enum Startup<'a> {
    Bare,
    Flag(&'a Path),
    Env(&'a Path),
}

fn spawn_sidecar(startup: Startup<'_>) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_nuclassd");
    let mut cmd = Command::new(exe);
    cmd.env_remove("NUCLASSD_WORKSPACE");
    match startup {
        Startup::Bare => {}
        Startup::Flag(p) => {
            cmd.arg("--workspace").arg(p);
        }
        Startup::Env(p) => {
            cmd.env("NUCLASSD_WORKSPACE", p);
        }
    }
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn nuclassd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(serde_json::Value::Null)
}

#[test]
fn edits_survive_a_sidecar_restart() {
    let workspace = temp_dir("nuclass-autosave");

    {
        let (mut child, mut stdin, mut reader) = spawn_sidecar(Startup::Flag(&workspace));
        let (i, r) = (&mut stdin, &mut reader);

        let health = request_ok(i, r, "1", "health", json!({}));
        assert_eq!(
            health["workspacePath"].as_str().map(PathBuf::from),
            Some(workspace.clone())
        );

        request_ok(
            i,
            r,
            "2",
            "session.open",
            json!({ "schoolName": "누리중", "grade": "2학년" }),
        );
        request_ok(
            i,
            r,
            "3",
            "roster.import",
            json!({
                "text": "3 1 1 가온 2011.01.01 남 10 2 1 1 \
                         3 2 1 나래 2011.01.02 여 20 2 2 2"
            }),
        );
        request_ok(
            i,
            r,
            "4",
            "roster.swap",
            json!({
                "a": { "classKey": "3-1", "index": 0 },
                "b": { "classKey": "3-2", "index": 0 }
            }),
        );
        request_ok(
            i,
            r,
            "5",
            "constraints.addGroup",
            json!({ "students": [{ "name": "가온" }, { "name": "나래" }] }),
        );

        drop(stdin);
        let _ = child.wait();
    }

    assert!(workspace.join("nuclass.sqlite3").is_file());

    let (mut child, mut stdin, mut reader) = spawn_sidecar(Startup::Env(&workspace));
    let (i, r) = (&mut stdin, &mut reader);

    let opened = request_ok(
        i,
        r,
        "1",
        "session.open",
        json!({ "schoolName": "누리중", "grade": "2학년" }),
    );
    assert_eq!(opened["restored"], json!(true));
    assert_eq!(opened["studentCount"], json!(2));

    let roster = request_ok(i, r, "2", "roster.get", json!({}));
    assert_eq!(roster["classes"][0]["students"][0]["성명"], json!("나래"));
    assert_eq!(roster["history"], json!(["(바꿈) 1반 가온 ⇔ 2반 나래"]));
    assert_eq!(roster["undoDepth"], json!(0));

    let undo = request(i, r, "3", "roster.undo", json!({}));
    assert_eq!(undo["error"]["code"], json!("empty_undo_stack"));

    let listed = request_ok(i, r, "4", "constraints.list", json!({}));
    assert_eq!(listed["groups"].as_array().map(|a| a.len()), Some(1));

    let other = request_ok(
        i,
        r,
        "5",
        "session.open",
        json!({ "schoolName": "누리중", "grade": "3학년" }),
    );
    assert_eq!(other["restored"], json!(false));
    assert_eq!(other["studentCount"], json!(0));
    let listed = request_ok(i, r, "6", "constraints.list", json!({}));
    assert_eq!(listed["groups"], json!([]));

    let recent = request_ok(i, r, "7", "workspace.recentInputs", json!({}));
    assert_eq!(recent["grades"], json!(["3학년", "2학년"]));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn selecting_a_fresh_workspace_keeps_unsaved_work() {
    let workspace = temp_dir("nuclass-late-select");

    {
        let (mut child, mut stdin, mut reader) = spawn_sidecar(Startup::Bare);
        let (i, r) = (&mut stdin, &mut reader);

        request_ok(
            i,
            r,
            "1",
            "session.open",
            json!({ "schoolName": "누리중", "grade": "2학년" }),
        );
        request_ok(
            i,
            r,
            "2",
            "roster.import",
            json!({
                "text": "3 1 1 가온 2011.01.01 남 10 2 1 1 \
                         3 2 1 나래 2011.01.02 여 20 2 2 2"
            }),
        );
        request_ok(
            i,
            r,
            "3",
            "constraints.addGroup",
            json!({ "students": [{ "name": "가온" }, { "name": "나래" }] }),
        );

        request_ok(
            i,
            r,
            "4",
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );

        let roster = request_ok(i, r, "5", "roster.get", json!({}));
        assert_eq!(roster["studentCount"], json!(2));
        assert_eq!(roster["classCount"], json!(2));
        let listed = request_ok(i, r, "6", "constraints.list", json!({}));
        assert_eq!(listed["groups"].as_array().map(|a| a.len()), Some(1));

        drop(stdin);
        let _ = child.wait();
    }

    // The selected workspace now holds what was in memory.
    let (mut child, mut stdin, mut reader) = spawn_sidecar(Startup::Flag(&workspace));
    let (i, r) = (&mut stdin, &mut reader);

    let opened = request_ok(
        i,
        r,
        "1",
        "session.open",
        json!({ "schoolName": "누리중", "grade": "2학년" }),
    );
    assert_eq!(opened["restored"], json!(true));
    assert_eq!(opened["studentCount"], json!(2));
    let listed = request_ok(i, r, "2", "constraints.list", json!({}));
    assert_eq!(listed["groups"].as_array().map(|a| a.len()), Some(1));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
