use crate::store::students::Student;
use crate::workflow::{MarksStatus, StudentMark};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct MarksEntry {
    pub exam_id: String,
    pub status: MarksStatus,
    pub version: i64,
    pub submitted_at: Option<String>,
    pub approved_at: Option<String>,
    pub updated_at: String,
    pub rows: Vec<StudentMark>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarksEntrySummary {
    pub exam_id: String,
    pub exam_name: String,
    pub exam_type: String,
    pub class_name: String,
    pub subject: String,
    pub date: String,
    pub academic_year: String,
    pub status: MarksStatus,
    pub version: i64,
    pub student_count: i64,
    pub submitted_at: Option<String>,
    pub approved_at: Option<String>,
}

/// Seeds a draft entry with one empty row per enrolled student.
pub fn create_template(
    conn: &Connection,
    exam_id: &str,
    roster: &[Student],
    created_at: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO marks_entries(exam_id, status, version, updated_at) VALUES(?, ?, 1, ?)",
        (exam_id, MarksStatus::Draft.as_str(), created_at),
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO student_marks(exam_id, student_id, name, total, percentage, sort_order)
         VALUES(?, ?, ?, 0, 0, ?)",
    )?;
    for (i, s) in roster.iter().enumerate() {
        stmt.execute((exam_id, &s.id, &s.name, i as i64))?;
    }
    Ok(())
}

pub fn load(conn: &Connection, exam_id: &str) -> rusqlite::Result<Option<MarksEntry>> {
    let head = conn
        .query_row(
            "SELECT status, version, submitted_at, approved_at, updated_at
             FROM marks_entries WHERE exam_id = ?",
            [exam_id],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, Option<String>>(2)?,
                    r.get::<_, Option<String>>(3)?,
                    r.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;
    let Some((status, version, submitted_at, approved_at, updated_at)) = head else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT student_id, name, midterm, final_score, homework, total, percentage
         FROM student_marks
         WHERE exam_id = ?
         ORDER BY sort_order",
    )?;
    let rows = stmt
        .query_map([exam_id], |r| {
            Ok(StudentMark {
                student_id: r.get(0)?,
                name: r.get(1)?,
                midterm: r.get(2)?,
                final_score: r.get(3)?,
                homework: r.get(4)?,
                total: r.get(5)?,
                percentage: r.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(MarksEntry {
        exam_id: exam_id.to_string(),
        // Unknown status text is treated as an editable draft.
        status: MarksStatus::parse(&status).unwrap_or(MarksStatus::Draft),
        version,
        submitted_at,
        approved_at,
        updated_at,
        rows,
    }))
}

pub fn save_row(conn: &Connection, exam_id: &str, row: &StudentMark) -> rusqlite::Result<bool> {
    let n = conn.execute(
        "UPDATE student_marks SET
           midterm = ?, final_score = ?, homework = ?, total = ?, percentage = ?
         WHERE exam_id = ? AND student_id = ?",
        (
            row.midterm,
            row.final_score,
            row.homework,
            row.total,
            row.percentage,
            exam_id,
            &row.student_id,
        ),
    )?;
    Ok(n > 0)
}

/// Bumps the version and records a status change. Returns the new version.
pub fn write_status(
    conn: &Connection,
    exam_id: &str,
    status: MarksStatus,
    at: &str,
) -> rusqlite::Result<i64> {
    let stamp_col = match status {
        MarksStatus::Submitted => Some("submitted_at"),
        MarksStatus::Approved => Some("approved_at"),
        MarksStatus::Draft => None,
    };
    match stamp_col {
        Some(col) => conn.execute(
            &format!(
                "UPDATE marks_entries SET status = ?, {col} = ?, updated_at = ?, version = version + 1
                 WHERE exam_id = ?"
            ),
            (status.as_str(), at, at, exam_id),
        )?,
        // Reverting to draft clears both stamps.
        None => conn.execute(
            "UPDATE marks_entries SET status = ?, submitted_at = NULL, approved_at = NULL,
               updated_at = ?, version = version + 1
             WHERE exam_id = ?",
            (status.as_str(), at, exam_id),
        )?,
    };
    current_version(conn, exam_id)
}

pub fn touch(conn: &Connection, exam_id: &str, at: &str) -> rusqlite::Result<i64> {
    conn.execute(
        "UPDATE marks_entries SET updated_at = ?, version = version + 1 WHERE exam_id = ?",
        (at, exam_id),
    )?;
    current_version(conn, exam_id)
}

fn current_version(conn: &Connection, exam_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT version FROM marks_entries WHERE exam_id = ?",
        [exam_id],
        |r| r.get(0),
    )
}

pub fn list(
    conn: &Connection,
    status: Option<MarksStatus>,
    class_name: Option<&str>,
    academic_year: Option<&str>,
) -> rusqlite::Result<Vec<MarksEntrySummary>> {
    let mut stmt = conn.prepare(
        "SELECT m.exam_id, e.exam_name, e.exam_type, e.class_name, e.subject, e.date,
                e.academic_year, m.status, m.version,
                (SELECT COUNT(*) FROM student_marks sm WHERE sm.exam_id = m.exam_id),
                m.submitted_at, m.approved_at
         FROM marks_entries m
         JOIN exam_schedules e ON e.id = m.exam_id
         WHERE (?1 IS NULL OR m.status = ?1)
           AND (?2 IS NULL OR e.class_name = ?2)
           AND (?3 IS NULL OR e.academic_year = ?3)
         ORDER BY e.date, e.start_time, e.subject",
    )?;
    let rows = stmt
        .query_map(
            (status.map(|s| s.as_str()), class_name, academic_year),
            |r| {
                let status: String = r.get(7)?;
                Ok(MarksEntrySummary {
                    exam_id: r.get(0)?,
                    exam_name: r.get(1)?,
                    exam_type: r.get(2)?,
                    class_name: r.get(3)?,
                    subject: r.get(4)?,
                    date: r.get(5)?,
                    academic_year: r.get(6)?,
                    status: MarksStatus::parse(&status).unwrap_or(MarksStatus::Draft),
                    version: r.get(8)?,
                    student_count: r.get(9)?,
                    submitted_at: r.get(10)?,
                    approved_at: r.get(11)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete(conn: &Connection, exam_id: &str) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM student_marks WHERE exam_id = ?", [exam_id])?;
    conn.execute("DELETE FROM marks_entries WHERE exam_id = ?", [exam_id])?;
    Ok(())
}
