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

fn admin() -> serde_json::Value {
    json!({ "role": "admin" })
}

fn teacher(id: &str) -> serde_json::Value {
    json!({ "role": "teacher", "teacherId": id })
}

/// Opens a fresh workspace with one class of three students and returns the
/// id of a single scheduled exam owned by teacher T-1.
fn seed_exam(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &PathBuf,
    exam_type: &str,
    date: &str,
) -> String {
    request_ok(stdin, reader, "s1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));
    request_ok(stdin, reader, "s2", "academicYears.create", json!({ "name": "2025-2026", "current": true }));
    request_ok(stdin, reader, "s3", "classes.create", json!({ "name": "8aad" }));
    request_ok(stdin, reader, "s4", "teachers.create", json!({ "teacherId": "T-1", "name": "Mr. Farah" }));
    for (i, name) in ["Amina Yusuf", "Bashir Omar", "Hodan Ali"].iter().enumerate() {
        request_ok(
            stdin,
            reader,
            &format!("s5-{}", i),
            "students.create",
            json!({ "name": name, "className": "8aad" }),
        );
    }
    let res = request_ok(
        stdin,
        reader,
        "s6",
        "exams.schedule",
        json!({
            "examName": "Term 1",
            "examType": exam_type,
            "className": "8aad",
            "subjects": ["Mathematics"],
            "date": date,
            "teacherId": "T-1"
        }),
    );
    res["exams"][0]["id"].as_str().expect("exam id").to_string()
}

#[test]
fn complete_submission_auto_approves_and_generates_results() {
    let workspace = temp_dir("schoold-marks-auto");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let exam_id = seed_exam(&mut stdin, &mut reader, &workspace, "Final", "2099-01-10");

    let got = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "marks.get",
        json!({ "examId": exam_id, "actor": teacher("T-1") }),
    );
    assert_eq!(got["entry"]["canEdit"], true);
    assert_eq!(got["entry"]["scoreField"], "final");

    let intruder = request(
        &mut stdin,
        &mut reader,
        "2",
        "marks.updateScore",
        json!({ "examId": exam_id, "actor": teacher("T-2"), "studentId": "DU-2025-001", "value": 10 }),
    );
    assert_eq!(error_code(&intruder), "not_owner");

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "marks.updateScore",
        json!({ "examId": exam_id, "actor": teacher("T-1"), "studentId": "DU-2025-001", "value": 280 }),
    );
    assert_eq!(updated["row"]["final"], 280.0);
    assert_eq!(updated["row"]["total"], 280.0);
    assert_eq!(updated["row"]["percentage"], 93);

    let bulk = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "marks.bulkUpdate",
        json!({
            "examId": exam_id,
            "actor": teacher("T-1"),
            "scores": [
                { "studentId": "DU-2025-002", "value": 150 },
                { "studentId": "DU-2025-003", "value": 0 }
            ]
        }),
    );
    assert_eq!(bulk["updated"], 2);
    assert_eq!(bulk["complete"], true);
    let version = bulk["version"].as_i64().expect("version");

    let stale = request(
        &mut stdin,
        &mut reader,
        "5",
        "marks.submit",
        json!({ "examId": exam_id, "actor": teacher("T-1"), "expectedVersion": version - 1 }),
    );
    assert_eq!(error_code(&stale), "conflict");

    let submitted = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "marks.submit",
        json!({ "examId": exam_id, "actor": teacher("T-1"), "expectedVersion": version }),
    );
    assert_eq!(submitted["status"], "approved");
    assert_eq!(submitted["autoApproved"], true);
    assert_eq!(submitted["resultsGenerated"], 3);

    let results = request_ok(&mut stdin, &mut reader, "7", "results.list", json!({ "examId": exam_id }));
    let rows = results["results"].as_array().expect("results");
    assert_eq!(rows.len(), 3);
    let top = rows
        .iter()
        .find(|r| r["studentId"] == "DU-2025-001")
        .expect("top student");
    assert_eq!(top["grade"], "A+");
    assert_eq!(top["percentage"], 93.33);
    let mid = rows.iter().find(|r| r["studentId"] == "DU-2025-002").expect("mid");
    assert_eq!(mid["grade"], "D");
    let zero = rows.iter().find(|r| r["studentId"] == "DU-2025-003").expect("zero");
    assert_eq!(zero["grade"], "F");

    let locked = request(
        &mut stdin,
        &mut reader,
        "8",
        "marks.updateScore",
        json!({ "examId": exam_id, "actor": admin(), "studentId": "DU-2025-001", "value": 1 }),
    );
    assert_eq!(error_code(&locked), "invalid_transition");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn deadline_blocks_teachers_but_not_admins() {
    let workspace = temp_dir("schoold-marks-deadline");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let exam_id = seed_exam(&mut stdin, &mut reader, &workspace, "Midterm", "2020-03-01");

    let late = request(
        &mut stdin,
        &mut reader,
        "1",
        "marks.updateScore",
        json!({ "examId": exam_id, "actor": teacher("T-1"), "studentId": "DU-2025-001", "value": 70 }),
    );
    assert_eq!(error_code(&late), "deadline_passed");
    let late_submit = request(
        &mut stdin,
        &mut reader,
        "2",
        "marks.submit",
        json!({ "examId": exam_id, "actor": teacher("T-1") }),
    );
    assert_eq!(error_code(&late_submit), "deadline_passed");

    let got = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "marks.get",
        json!({ "examId": exam_id, "actor": teacher("T-1") }),
    );
    assert_eq!(got["entry"]["canEdit"], false);
    assert_eq!(got["entry"]["deadline"], "2020-03-02T10:00:00");

    request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "marks.updateScore",
        json!({ "examId": exam_id, "actor": admin(), "studentId": "DU-2025-001", "value": 70 }),
    );
    let submitted = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "marks.submit",
        json!({ "examId": exam_id, "actor": admin() }),
    );
    assert_eq!(submitted["status"], "submitted");
    assert_eq!(submitted["autoApproved"], false);
    assert_eq!(submitted["resultsGenerated"], 0);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn admin_review_rejects_to_draft_then_approves() {
    let workspace = temp_dir("schoold-marks-review");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let exam_id = seed_exam(&mut stdin, &mut reader, &workspace, "Monthly", "2099-02-01");

    let early = request(
        &mut stdin,
        &mut reader,
        "1",
        "marks.approve",
        json!({ "examId": exam_id, "actor": admin() }),
    );
    assert_eq!(error_code(&early), "invalid_transition");

    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "marks.updateScore",
        json!({ "examId": exam_id, "actor": teacher("T-1"), "studentId": "DU-2025-001", "value": 18 }),
    );
    let submitted = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "marks.submit",
        json!({ "examId": exam_id, "actor": teacher("T-1") }),
    );
    assert_eq!(submitted["status"], "submitted");

    let not_admin = request(
        &mut stdin,
        &mut reader,
        "4",
        "marks.approve",
        json!({ "examId": exam_id, "actor": teacher("T-1") }),
    );
    assert_eq!(error_code(&not_admin), "forbidden");
    let edit_submitted = request(
        &mut stdin,
        &mut reader,
        "5",
        "marks.updateScore",
        json!({ "examId": exam_id, "actor": teacher("T-1"), "studentId": "DU-2025-002", "value": 5 }),
    );
    assert_eq!(error_code(&edit_submitted), "invalid_transition");

    let rejected = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "marks.reject",
        json!({ "examId": exam_id, "actor": admin(), "reason": "missing scores" }),
    );
    assert_eq!(rejected["status"], "draft");
    let got = request_ok(&mut stdin, &mut reader, "7", "marks.get", json!({ "examId": exam_id }));
    assert!(got["entry"]["submittedAt"].is_null());
    assert_eq!(got["entry"]["rows"][0]["homework"], 18.0);

    request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "marks.submit",
        json!({ "examId": exam_id, "actor": teacher("T-1") }),
    );
    let approved = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "marks.approve",
        json!({ "examId": exam_id, "actor": admin() }),
    );
    assert_eq!(approved["status"], "approved");
    assert_eq!(approved["resultsGenerated"], 3);

    let pending = request_ok(&mut stdin, &mut reader, "10", "marks.list", json!({ "status": "approved" }));
    assert_eq!(pending["entries"].as_array().map(|a| a.len()), Some(1));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn score_validation_rejects_negatives_and_unknown_students() {
    let workspace = temp_dir("schoold-marks-validation");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let exam_id = seed_exam(&mut stdin, &mut reader, &workspace, "Final", "2099-01-10");

    let negative = request(
        &mut stdin,
        &mut reader,
        "1",
        "marks.updateScore",
        json!({ "examId": exam_id, "actor": teacher("T-1"), "studentId": "DU-2025-001", "value": -3 }),
    );
    assert_eq!(error_code(&negative), "bad_params");

    let stranger = request(
        &mut stdin,
        &mut reader,
        "2",
        "marks.bulkUpdate",
        json!({
            "examId": exam_id,
            "actor": teacher("T-1"),
            "scores": [
                { "studentId": "DU-2025-001", "value": 50 },
                { "studentId": "DU-1999-999", "value": 50 }
            ]
        }),
    );
    assert_eq!(error_code(&stranger), "not_found");
    let got = request_ok(&mut stdin, &mut reader, "3", "marks.get", json!({ "examId": exam_id }));
    assert!(got["entry"]["rows"][0]["final"].is_null());

    let bad_role = request(
        &mut stdin,
        &mut reader,
        "4",
        "marks.submit",
        json!({ "examId": exam_id, "actor": { "role": "parent" } }),
    );
    assert_eq!(error_code(&bad_role), "forbidden");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
