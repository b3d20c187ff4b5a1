use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicYear {
    pub name: String,
    pub is_current: bool,
}

pub fn list(conn: &Connection) -> rusqlite::Result<Vec<AcademicYear>> {
    let mut stmt = conn.prepare("SELECT name, is_current FROM academic_years ORDER BY name DESC")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(AcademicYear {
                name: r.get(0)?,
                is_current: r.get::<_, i64>(1)? != 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.query_row("SELECT 1 FROM academic_years WHERE name = ?", [name], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
}

pub fn current(conn: &Connection) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT name FROM academic_years WHERE is_current = 1 LIMIT 1",
        [],
        |r| r.get(0),
    )
    .optional()
}

/// Inserts a year. The first year ever created becomes current.
pub fn create(conn: &Connection, name: &str, make_current: bool, created_at: &str) -> rusqlite::Result<bool> {
    let first = current(conn)?.is_none();
    conn.execute(
        "INSERT INTO academic_years(name, is_current, created_at) VALUES(?, 0, ?)",
        (name, created_at),
    )?;
    if make_current || first {
        set_current(conn, name)?;
    }
    Ok(make_current || first)
}

/// Exactly one year is current afterwards, or none changes if `name` is unknown.
pub fn set_current(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    if !exists(conn, name)? {
        return Ok(false);
    }
    let tx = conn.unchecked_transaction()?;
    tx.execute("UPDATE academic_years SET is_current = 0", [])?;
    tx.execute(
        "UPDATE academic_years SET is_current = 1 WHERE name = ?",
        [name],
    )?;
    tx.commit()?;
    Ok(true)
}

pub fn delete(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    let n = conn.execute("DELETE FROM academic_years WHERE name = ?", [name])?;
    Ok(n > 0)
}
