use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
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

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_schoold");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn schoold");
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
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
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
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(resp: &serde_json::Value) -> &str {
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false), "expected error: {}", resp);
    resp.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

fn seed_class(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, workspace: &PathBuf) {
    request_ok(stdin, reader, "s1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));
    request_ok(stdin, reader, "s2", "academicYears.create", json!({ "name": "2025-2026", "current": true }));
    request_ok(stdin, reader, "s3", "classes.create", json!({ "name": "8aad" }));
    for (i, name) in ["Amina Yusuf", "Bashir Omar", "Hodan Ali"].iter().enumerate() {
        request_ok(
            stdin,
            reader,
            &format!("s4-{}", i),
            "students.create",
            json!({ "name": name, "className": "8aad" }),
        );
    }
}

#[test]
fn batch_creates_one_exam_and_draft_template_per_subject() {
    let workspace = temp_dir("schoold-exam-batch");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    seed_class(&mut stdin, &mut reader, &workspace);

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "exams.schedule",
        json!({
            "examName": "Term 1",
            "examType": "Final",
            "className": "8aad",
            "subjects": ["Mathematics", "English"],
            "date": "2025-11-01"
        }),
    );
    let exams = res["exams"].as_array().expect("exams");
    assert_eq!(exams.len(), 2);
    assert_eq!(exams[0]["subject"], "Mathematics");
    assert_eq!(exams[1]["subject"], "English");
    assert_eq!(exams[0]["batchId"], res["batchId"]);
    assert_ne!(exams[0]["room"], exams[1]["room"]);
    assert_ne!(exams[0]["startTime"], exams[1]["startTime"]);
    assert_eq!(exams[0]["duration"], "2 hours");
    assert_eq!(exams[0]["startTime"], "08:00");
    assert_eq!(exams[0]["endTime"], "10:00");
    assert_eq!(exams[0]["academicYear"], "2025-2026");
    assert_eq!(exams[0]["marksDeadline"], "2025-11-02T10:00:00");

    let entries = res["marksEntries"].as_array().expect("marksEntries");
    assert_eq!(entries.len(), 2);
    for e in entries {
        assert_eq!(e["status"], "draft");
        assert_eq!(e["scoreField"], "final");
        assert_eq!(e["studentCount"], 3);
    }

    let exam_id = exams[0]["id"].as_str().expect("exam id").to_string();
    let got = request_ok(&mut stdin, &mut reader, "2", "marks.get", json!({ "examId": exam_id }));
    let rows = got["entry"]["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 3);
    assert!(rows[0]["final"].is_null());
    assert!(rows[0].get("midterm").is_none());
    assert_eq!(rows[0]["total"], 0.0);
    assert_eq!(rows[0]["percentage"], 0);
    assert_eq!(got["entry"]["status"], "draft");

    let listed = request_ok(&mut stdin, &mut reader, "3", "exams.list", json!({ "className": "8aad" }));
    assert_eq!(listed["exams"].as_array().map(|a| a.len()), Some(2));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn overrides_apply_per_subject() {
    let workspace = temp_dir("schoold-exam-overrides");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    seed_class(&mut stdin, &mut reader, &workspace);

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "exams.schedule",
        json!({
            "examName": "Quiz 3",
            "examType": "Quiz",
            "className": "8aad",
            "subjects": ["Science", "Arabic"],
            "date": "2025-11-03",
            "overrides": {
                "arabic": { "room": "Library", "startTime": "09:15", "duration": "90 minutes" }
            }
        }),
    );
    let exams = res["exams"].as_array().expect("exams");
    assert_eq!(exams[1]["room"], "Library");
    assert_eq!(exams[1]["startTime"], "09:15");
    assert_eq!(exams[1]["endTime"], "10:45");
    assert_eq!(res["marksEntries"][0]["scoreField"], "homework");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn invalid_requests_create_nothing() {
    let workspace = temp_dir("schoold-exam-invalid");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    seed_class(&mut stdin, &mut reader, &workspace);

    let cases = [
        json!({ "examName": "T", "examType": "Final", "className": "8aad", "subjects": [], "date": "2025-11-01" }),
        json!({ "examName": "T", "examType": "Final", "className": "8aad", "subjects": ["Math", "math"], "date": "2025-11-01" }),
        json!({ "examName": "T", "examType": "Final", "className": "8aad", "subjects": ["Math"], "date": "01/11/2025" }),
        json!({ "examName": "T", "examType": "Oral", "className": "8aad", "subjects": ["Math"], "date": "2025-11-01" }),
        json!({ "examName": "T", "className": "8aad", "subjects": ["Math"], "date": "2025-11-01" }),
        json!({ "examType": "Final", "className": "8aad", "subjects": ["Math"], "date": "2025-11-01" }),
        json!({
            "examName": "T", "examType": "Final", "className": "8aad", "subjects": ["Math", "Art"], "date": "2025-11-01",
            "overrides": { "Art": { "startTime": "25:99" } }
        }),
        json!({
            "examName": "T", "examType": "Final", "className": "8aad", "subjects": ["Math"], "date": "2025-11-01",
            "overrides": { "Math": { "duration": "1000000000000000 hours" } }
        }),
        json!({
            "examName": "T", "examType": "Final", "className": "8aad", "subjects": ["Math"], "date": "2025-11-01",
            "overrides": { "Music": { "room": "Hall" } }
        }),
    ];
    for (i, params) in cases.into_iter().enumerate() {
        let resp = request(&mut stdin, &mut reader, &format!("bad-{}", i), "exams.schedule", params);
        assert_eq!(error_code(&resp), "bad_params", "case {}", i);
    }

    let listed = request_ok(&mut stdin, &mut reader, "list", "exams.list", json!({}));
    assert_eq!(listed["exams"].as_array().map(|a| a.len()), Some(0));
    let entries = request_ok(&mut stdin, &mut reader, "marks", "marks.list", json!({}));
    assert_eq!(entries["entries"].as_array().map(|a| a.len()), Some(0));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn reschedule_moves_deadline_and_delete_drops_marks_entry() {
    let workspace = temp_dir("schoold-exam-reschedule");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    seed_class(&mut stdin, &mut reader, &workspace);

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "exams.schedule",
        json!({
            "examName": "Midterms",
            "examType": "Midterm",
            "className": "8aad",
            "subjects": ["History"],
            "date": "2025-10-20"
        }),
    );
    let exam_id = res["exams"][0]["id"].as_str().expect("exam id").to_string();

    let moved = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "exams.reschedule",
        json!({ "examId": exam_id, "date": "2025-10-22", "startTime": "13:00" }),
    );
    assert_eq!(moved["exam"]["date"], "2025-10-22");
    assert_eq!(moved["exam"]["endTime"], "15:00");
    assert_eq!(moved["exam"]["marksDeadline"], "2025-10-23T15:00:00");

    let absurd = request(
        &mut stdin,
        &mut reader,
        "2b",
        "exams.reschedule",
        json!({ "examId": exam_id, "duration": "1000000000000000 hours" }),
    );
    assert_eq!(error_code(&absurd), "bad_params");

    request_ok(&mut stdin, &mut reader, "3", "exams.delete", json!({ "examId": exam_id }));
    let gone = request(&mut stdin, &mut reader, "4", "marks.get", json!({ "examId": exam_id }));
    assert_eq!(error_code(&gone), "not_found");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
