use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "school.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS academic_years(
            name TEXT PRIMARY KEY,
            is_current INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // Classes, students and exams relate by (class name, academic year) text,
    // so deleting a class leaves its students and exams in place.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            academic_year TEXT NOT NULL,
            grade_level TEXT,
            UNIQUE(name, academic_year)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            code TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            phone TEXT,
            subjects_json TEXT NOT NULL DEFAULT '[]'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            class_name TEXT NOT NULL,
            academic_year TEXT NOT NULL,
            gender TEXT,
            parent_phone TEXT,
            sort_order INTEGER NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class_year ON students(class_name, academic_year, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exam_schedules(
            id TEXT PRIMARY KEY,
            batch_id TEXT NOT NULL,
            exam_name TEXT NOT NULL,
            exam_type TEXT NOT NULL,
            class_name TEXT NOT NULL,
            subject TEXT NOT NULL,
            date TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            duration TEXT NOT NULL,
            duration_hours REAL NOT NULL,
            room TEXT NOT NULL,
            academic_year TEXT NOT NULL,
            teacher_id TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_exam_schedules_class_year ON exam_schedules(class_name, academic_year)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_exam_schedules_batch ON exam_schedules(batch_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS marks_entries(
            exam_id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            submitted_at TEXT,
            approved_at TEXT,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_marks(
            exam_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            name TEXT NOT NULL,
            midterm REAL,
            final_score REAL,
            homework REAL,
            total REAL NOT NULL DEFAULT 0,
            percentage INTEGER NOT NULL DEFAULT 0,
            sort_order INTEGER NOT NULL,
            PRIMARY KEY(exam_id, student_id),
            FOREIGN KEY(exam_id) REFERENCES marks_entries(exam_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_marks_exam ON student_marks(exam_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS results(
            exam_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            student_name TEXT NOT NULL,
            class_name TEXT NOT NULL,
            subject TEXT NOT NULL,
            exam_name TEXT NOT NULL,
            exam_type TEXT NOT NULL,
            midterm REAL,
            final_score REAL,
            homework REAL,
            total REAL NOT NULL,
            average REAL NOT NULL,
            percentage REAL NOT NULL,
            grade TEXT NOT NULL,
            academic_year TEXT NOT NULL,
            status TEXT NOT NULL,
            generated_at TEXT NOT NULL,
            PRIMARY KEY(exam_id, student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_student_year ON results(student_id, academic_year)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS result_publications(
            academic_year TEXT PRIMARY KEY,
            published INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            date TEXT NOT NULL,
            student_id TEXT NOT NULL,
            class_name TEXT NOT NULL,
            academic_year TEXT NOT NULL,
            status TEXT NOT NULL,
            PRIMARY KEY(date, student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_student ON attendance(student_id, academic_year)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    ensure_teachers_email(&conn)?;

    Ok(conn)
}

fn ensure_teachers_email(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "teachers", "email")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE teachers ADD COLUMN email TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> rusqlite::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    // A corrupt value reads as unset rather than failing the whole request.
    Ok(raw.and_then(|s| serde_json::from_str(&s).ok()))
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, value.to_string()),
    )?;
    Ok(())
}
