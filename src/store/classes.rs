use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolClass {
    pub id: String,
    pub name: String,
    pub academic_year: String,
    pub grade_level: Option<String>,
    pub student_count: i64,
    pub exam_count: i64,
}

pub fn list(conn: &Connection, academic_year: Option<&str>) -> rusqlite::Result<Vec<SchoolClass>> {
    // Counts use correlated subqueries on the (name, year) pair; there is no foreign key.
    let mut stmt = conn.prepare(
        "SELECT
           c.id,
           c.name,
           c.academic_year,
           c.grade_level,
           (SELECT COUNT(*) FROM students s
             WHERE s.class_name = c.name AND s.academic_year = c.academic_year) AS student_count,
           (SELECT COUNT(*) FROM exam_schedules e
             WHERE e.class_name = c.name AND e.academic_year = c.academic_year) AS exam_count
         FROM classes c
         WHERE (?1 IS NULL OR c.academic_year = ?1)
         ORDER BY c.academic_year DESC, c.name",
    )?;
    let rows = stmt
        .query_map([academic_year], |r| {
            Ok(SchoolClass {
                id: r.get(0)?,
                name: r.get(1)?,
                academic_year: r.get(2)?,
                grade_level: r.get(3)?,
                student_count: r.get(4)?,
                exam_count: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get(conn: &Connection, class_id: &str) -> rusqlite::Result<Option<(String, String)>> {
    conn.query_row(
        "SELECT name, academic_year FROM classes WHERE id = ?",
        [class_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )
    .optional()
}

pub fn exists_by_name(conn: &Connection, name: &str, academic_year: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM classes WHERE name = ? AND academic_year = ?",
        (name, academic_year),
        |r| r.get::<_, i64>(0),
    )
    .optional()
    .map(|v| v.is_some())
}

pub fn create(
    conn: &Connection,
    id: &str,
    name: &str,
    academic_year: &str,
    grade_level: Option<&str>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO classes(id, name, academic_year, grade_level) VALUES(?, ?, ?, ?)",
        (id, name, academic_year, grade_level),
    )?;
    Ok(())
}

/// Renaming a class does not rename the `class_name` stored on students or exams.
pub fn update(
    conn: &Connection,
    class_id: &str,
    name: Option<&str>,
    grade_level: Option<&str>,
) -> rusqlite::Result<bool> {
    let n = conn.execute(
        "UPDATE classes SET
           name = COALESCE(?, name),
           grade_level = COALESCE(?, grade_level)
         WHERE id = ?",
        (name, grade_level, class_id),
    )?;
    Ok(n > 0)
}

/// Removes only the class row. Students, exams and marks that name it stay.
pub fn delete(conn: &Connection, class_id: &str) -> rusqlite::Result<bool> {
    let n = conn.execute("DELETE FROM classes WHERE id = ?", [class_id])?;
    Ok(n > 0)
}
