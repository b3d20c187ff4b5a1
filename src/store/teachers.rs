use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub subjects: Vec<String>,
}

fn from_row(r: &Row<'_>) -> rusqlite::Result<Teacher> {
    let subjects_json: String = r.get(4)?;
    Ok(Teacher {
        id: r.get(0)?,
        name: r.get(1)?,
        phone: r.get(2)?,
        email: r.get(3)?,
        subjects: serde_json::from_str(&subjects_json).unwrap_or_default(),
    })
}

pub fn list(conn: &Connection) -> rusqlite::Result<Vec<Teacher>> {
    let mut stmt =
        conn.prepare("SELECT id, name, phone, email, subjects_json FROM teachers ORDER BY name")?;
    let rows = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get(conn: &Connection, teacher_id: &str) -> rusqlite::Result<Option<Teacher>> {
    conn.query_row(
        "SELECT id, name, phone, email, subjects_json FROM teachers WHERE id = ?",
        [teacher_id],
        from_row,
    )
    .optional()
}

pub fn upsert(conn: &Connection, t: &Teacher) -> rusqlite::Result<()> {
    let subjects_json = serde_json::Value::from(t.subjects.clone()).to_string();
    conn.execute(
        "INSERT INTO teachers(id, name, phone, email, subjects_json) VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           phone = excluded.phone,
           email = excluded.email,
           subjects_json = excluded.subjects_json",
        (&t.id, &t.name, &t.phone, &t.email, subjects_json),
    )?;
    Ok(())
}

/// Exams keep the teacher id they were scheduled with.
pub fn delete(conn: &Connection, teacher_id: &str) -> rusqlite::Result<bool> {
    let n = conn.execute("DELETE FROM teachers WHERE id = ?", [teacher_id])?;
    Ok(n > 0)
}
