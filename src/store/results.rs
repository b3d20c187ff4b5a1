use crate::grading;
use crate::store::exams::ExamSchedule;
use crate::workflow::StudentMark;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

pub const STATUS_PUBLISHED: &str = "published";

/// One published result row. Field order is also the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRow {
    pub exam_id: String,
    pub student_id: String,
    pub student_name: String,
    pub class_name: String,
    pub subject: String,
    pub exam_name: String,
    pub exam_type: String,
    pub midterm: Option<f64>,
    #[serde(rename = "final")]
    pub final_score: Option<f64>,
    pub homework: Option<f64>,
    pub total: f64,
    pub average: f64,
    pub percentage: f64,
    pub grade: String,
    pub academic_year: String,
    pub status: String,
    pub generated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct ResultFilter<'a> {
    pub exam_id: Option<&'a str>,
    pub student_id: Option<&'a str>,
    pub class_name: Option<&'a str>,
    pub academic_year: Option<&'a str>,
}

const COLUMNS: &str = "exam_id, student_id, student_name, class_name, subject, exam_name, exam_type, midterm, final_score, homework, total, average, percentage, grade, academic_year, status, generated_at";

fn from_row(r: &Row<'_>) -> rusqlite::Result<ResultRow> {
    Ok(ResultRow {
        exam_id: r.get(0)?,
        student_id: r.get(1)?,
        student_name: r.get(2)?,
        class_name: r.get(3)?,
        subject: r.get(4)?,
        exam_name: r.get(5)?,
        exam_type: r.get(6)?,
        midterm: r.get(7)?,
        final_score: r.get(8)?,
        homework: r.get(9)?,
        total: r.get(10)?,
        average: r.get(11)?,
        percentage: r.get(12)?,
        grade: r.get(13)?,
        academic_year: r.get(14)?,
        status: r.get(15)?,
        generated_at: r.get(16)?,
    })
}

/// Builds the result rows for an approved exam from its marks rows.
pub fn build_rows(exam: &ExamSchedule, marks: &[StudentMark], generated_at: &str) -> Vec<ResultRow> {
    marks
        .iter()
        .map(|m| {
            let scores = grading::derive_result(m.midterm, m.final_score, m.homework);
            ResultRow {
                exam_id: exam.id.clone(),
                student_id: m.student_id.clone(),
                student_name: m.name.clone(),
                class_name: exam.class_name.clone(),
                subject: exam.subject.clone(),
                exam_name: exam.exam_name.clone(),
                exam_type: exam.exam_type.clone(),
                midterm: m.midterm,
                final_score: m.final_score,
                homework: m.homework,
                total: scores.total,
                average: scores.average,
                percentage: scores.percentage,
                grade: scores.grade.to_string(),
                academic_year: exam.academic_year.clone(),
                status: STATUS_PUBLISHED.to_string(),
                generated_at: generated_at.to_string(),
            }
        })
        .collect()
}

pub fn upsert(conn: &Connection, row: &ResultRow) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO results({COLUMNS})
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
             ON CONFLICT(exam_id, student_id) DO UPDATE SET
               student_name = excluded.student_name,
               class_name = excluded.class_name,
               subject = excluded.subject,
               exam_name = excluded.exam_name,
               exam_type = excluded.exam_type,
               midterm = excluded.midterm,
               final_score = excluded.final_score,
               homework = excluded.homework,
               total = excluded.total,
               average = excluded.average,
               percentage = excluded.percentage,
               grade = excluded.grade,
               academic_year = excluded.academic_year,
               status = excluded.status,
               generated_at = excluded.generated_at"
        ),
        rusqlite::params![
            row.exam_id,
            row.student_id,
            row.student_name,
            row.class_name,
            row.subject,
            row.exam_name,
            row.exam_type,
            row.midterm,
            row.final_score,
            row.homework,
            row.total,
            row.average,
            row.percentage,
            row.grade,
            row.academic_year,
            row.status,
            row.generated_at,
        ],
    )?;
    Ok(())
}

/// Drops every earlier result for the exam and writes `rows` in its place.
/// Callers run this inside the approval transaction.
pub fn replace_for_exam(conn: &Connection, exam_id: &str, rows: &[ResultRow]) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM results WHERE exam_id = ?", [exam_id])?;
    for row in rows {
        upsert(conn, row)?;
    }
    Ok(rows.len())
}

pub fn list(conn: &Connection, f: &ResultFilter<'_>) -> rusqlite::Result<Vec<ResultRow>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM results
         WHERE (?1 IS NULL OR exam_id = ?1)
           AND (?2 IS NULL OR student_id = ?2)
           AND (?3 IS NULL OR class_name = ?3)
           AND (?4 IS NULL OR academic_year = ?4)
         ORDER BY academic_year, class_name, exam_name, subject, student_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            (f.exam_id, f.student_id, f.class_name, f.academic_year),
            from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn set_published(
    conn: &Connection,
    academic_year: &str,
    published: bool,
    at: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO result_publications(academic_year, published, updated_at) VALUES(?, ?, ?)
         ON CONFLICT(academic_year) DO UPDATE SET
           published = excluded.published,
           updated_at = excluded.updated_at",
        (academic_year, published as i64, at),
    )?;
    Ok(())
}

pub fn is_published(conn: &Connection, academic_year: &str) -> rusqlite::Result<bool> {
    let v: Option<i64> = conn
        .query_row(
            "SELECT published FROM result_publications WHERE academic_year = ?",
            [academic_year],
            |r| r.get(0),
        )
        .optional()?;
    Ok(v.unwrap_or(0) != 0)
}
