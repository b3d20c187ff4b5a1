use crate::schedule;
use crate::workflow::ExamType;
use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSchedule {
    pub id: String,
    pub batch_id: String,
    pub exam_name: String,
    pub exam_type: String,
    pub class_name: String,
    pub subject: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub duration: String,
    pub duration_hours: f64,
    pub room: String,
    pub academic_year: String,
    pub teacher_id: Option<String>,
    pub created_at: String,
}

impl ExamSchedule {
    pub fn exam_type(&self) -> Option<ExamType> {
        ExamType::parse(&self.exam_type)
    }

    /// Start plus duration, so exams running past midnight end on the next day.
    pub fn ends_at(&self) -> Option<NaiveDateTime> {
        let date = schedule::parse_date(&self.date).ok()?;
        let start = schedule::parse_time(&self.start_time).ok()?;
        schedule::exam_end(date, start, self.duration_hours)
    }
}

const COLUMNS: &str = "id, batch_id, exam_name, exam_type, class_name, subject, date, start_time, end_time, duration, duration_hours, room, academic_year, teacher_id, created_at";

fn from_row(r: &Row<'_>) -> rusqlite::Result<ExamSchedule> {
    Ok(ExamSchedule {
        id: r.get(0)?,
        batch_id: r.get(1)?,
        exam_name: r.get(2)?,
        exam_type: r.get(3)?,
        class_name: r.get(4)?,
        subject: r.get(5)?,
        date: r.get(6)?,
        start_time: r.get(7)?,
        end_time: r.get(8)?,
        duration: r.get(9)?,
        duration_hours: r.get(10)?,
        room: r.get(11)?,
        academic_year: r.get(12)?,
        teacher_id: r.get(13)?,
        created_at: r.get(14)?,
    })
}

pub fn insert(conn: &Connection, e: &ExamSchedule) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO exam_schedules({COLUMNS})
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ),
        (
            &e.id,
            &e.batch_id,
            &e.exam_name,
            &e.exam_type,
            &e.class_name,
            &e.subject,
            &e.date,
            &e.start_time,
            &e.end_time,
            &e.duration,
            e.duration_hours,
            &e.room,
            &e.academic_year,
            &e.teacher_id,
            &e.created_at,
        ),
    )?;
    Ok(())
}

pub fn get(conn: &Connection, exam_id: &str) -> rusqlite::Result<Option<ExamSchedule>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM exam_schedules WHERE id = ?"),
        [exam_id],
        from_row,
    )
    .optional()
}

pub fn list(
    conn: &Connection,
    class_name: Option<&str>,
    academic_year: Option<&str>,
    teacher_id: Option<&str>,
) -> rusqlite::Result<Vec<ExamSchedule>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM exam_schedules
         WHERE (?1 IS NULL OR class_name = ?1)
           AND (?2 IS NULL OR academic_year = ?2)
           AND (?3 IS NULL OR teacher_id = ?3)
         ORDER BY date, start_time, subject"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map((class_name, academic_year, teacher_id), from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update_timing(conn: &Connection, e: &ExamSchedule) -> rusqlite::Result<bool> {
    let n = conn.execute(
        "UPDATE exam_schedules SET
           date = ?, start_time = ?, end_time = ?, duration = ?, duration_hours = ?, room = ?
         WHERE id = ?",
        (
            &e.date,
            &e.start_time,
            &e.end_time,
            &e.duration,
            e.duration_hours,
            &e.room,
            &e.id,
        ),
    )?;
    Ok(n > 0)
}

pub fn delete(conn: &Connection, exam_id: &str) -> rusqlite::Result<bool> {
    let n = conn.execute("DELETE FROM exam_schedules WHERE id = ?", [exam_id])?;
    Ok(n > 0)
}
