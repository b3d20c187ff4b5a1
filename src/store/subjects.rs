use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub code: Option<String>,
}

pub fn list(conn: &Connection) -> rusqlite::Result<Vec<Subject>> {
    let mut stmt = conn.prepare("SELECT id, name, code FROM subjects ORDER BY name")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Subject {
                id: r.get(0)?,
                name: r.get(1)?,
                code: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn exists_by_name(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM subjects WHERE name = ? COLLATE NOCASE",
        [name],
        |r| r.get::<_, i64>(0),
    )
    .optional()
    .map(|v| v.is_some())
}

pub fn create(conn: &Connection, s: &Subject) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO subjects(id, name, code) VALUES(?, ?, ?)",
        (&s.id, &s.name, &s.code),
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, subject_id: &str) -> rusqlite::Result<bool> {
    let n = conn.execute("DELETE FROM subjects WHERE id = ?", [subject_id])?;
    Ok(n > 0)
}
