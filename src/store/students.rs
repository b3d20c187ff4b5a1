use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

pub const STUDENT_ID_PREFIX: &str = "DU";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub class_name: String,
    pub academic_year: String,
    pub gender: Option<String>,
    pub parent_phone: Option<String>,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Default)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub class_name: Option<String>,
    pub academic_year: Option<String>,
    pub gender: Option<String>,
    pub parent_phone: Option<String>,
}

const COLUMNS: &str =
    "id, name, class_name, academic_year, gender, parent_phone, sort_order";

fn from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        name: r.get(1)?,
        class_name: r.get(2)?,
        academic_year: r.get(3)?,
        gender: r.get(4)?,
        parent_phone: r.get(5)?,
        sort_order: r.get(6)?,
    })
}

pub fn list(
    conn: &Connection,
    class_name: Option<&str>,
    academic_year: Option<&str>,
) -> rusqlite::Result<Vec<Student>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM students
         WHERE (?1 IS NULL OR class_name = ?1)
           AND (?2 IS NULL OR academic_year = ?2)
         ORDER BY academic_year DESC, class_name, sort_order, name"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map((class_name, academic_year), from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Students enrolled in `class_name` for `academic_year`, in roster order.
pub fn roster(conn: &Connection, class_name: &str, academic_year: &str) -> rusqlite::Result<Vec<Student>> {
    list(conn, Some(class_name), Some(academic_year))
}

pub fn get(conn: &Connection, student_id: &str) -> rusqlite::Result<Option<Student>> {
    let sql = format!("SELECT {COLUMNS} FROM students WHERE id = ?");
    conn.query_row(&sql, [student_id], from_row).optional()
}

/// The enrolment year is the leading four digits of the academic year label
/// ("2024-2025" -> 2024). Labels without one fall back to `fallback_year`.
pub fn enrolment_year(academic_year: &str, fallback_year: i32) -> i32 {
    academic_year
        .get(..4)
        .and_then(|y| y.parse::<i32>().ok())
        .unwrap_or(fallback_year)
}

/// Next free id of the form `DU-<year>-<seq>`, seq zero-padded to three digits.
pub fn next_student_id(conn: &Connection, year: i32) -> rusqlite::Result<String> {
    let prefix = format!("{STUDENT_ID_PREFIX}-{year}-");
    let mut stmt = conn.prepare("SELECT id FROM students WHERE id LIKE ? || '%'")?;
    let ids = stmt
        .query_map([&prefix], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    // Sequences have no fixed width; compare them as decimal strings.
    let max_seq = ids
        .iter()
        .filter_map(|id| id.strip_prefix(&prefix))
        .filter(|seq| !seq.is_empty() && seq.bytes().all(|b| b.is_ascii_digit()))
        .map(|seq| seq.trim_start_matches('0'))
        .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
        .unwrap_or("");
    Ok(format!("{prefix}{:0>3}", increment_decimal(max_seq)))
}

fn increment_decimal(digits: &str) -> String {
    let mut out: Vec<u8> = digits.bytes().collect();
    for d in out.iter_mut().rev() {
        if *d == b'9' {
            *d = b'0';
        } else {
            *d += 1;
            return String::from_utf8_lossy(&out).into_owned();
        }
    }
    out.insert(0, b'1');
    String::from_utf8_lossy(&out).into_owned()
}

pub fn insert(conn: &Connection, s: &Student, updated_at: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO students(id, name, class_name, academic_year, gender, parent_phone, sort_order, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &s.id,
            &s.name,
            &s.class_name,
            &s.academic_year,
            &s.gender,
            &s.parent_phone,
            s.sort_order,
            updated_at,
        ),
    )?;
    Ok(())
}

pub fn next_sort_order(conn: &Connection, class_name: &str, academic_year: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM students WHERE class_name = ? AND academic_year = ?",
        (class_name, academic_year),
        |r| r.get(0),
    )
}

pub fn update(conn: &Connection, student_id: &str, p: &StudentPatch, updated_at: &str) -> rusqlite::Result<bool> {
    let n = conn.execute(
        "UPDATE students SET
           name = COALESCE(?, name),
           class_name = COALESCE(?, class_name),
           academic_year = COALESCE(?, academic_year),
           gender = COALESCE(?, gender),
           parent_phone = COALESCE(?, parent_phone),
           updated_at = ?
         WHERE id = ?",
        (
            &p.name,
            &p.class_name,
            &p.academic_year,
            &p.gender,
            &p.parent_phone,
            updated_at,
            student_id,
        ),
    )?;
    Ok(n > 0)
}

/// Marks rows and published results keep the student's id and name.
pub fn delete(conn: &Connection, student_id: &str) -> rusqlite::Result<bool> {
    let n = conn.execute("DELETE FROM students WHERE id = ?", [student_id])?;
    Ok(n > 0)
}
