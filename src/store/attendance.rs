use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 4] = [
        AttendanceStatus::Present,
        AttendanceStatus::Absent,
        AttendanceStatus::Late,
        AttendanceStatus::Excused,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "present" => Some(Self::Present),
            "absent" => Some(Self::Absent),
            "late" => Some(Self::Late),
            "excused" => Some(Self::Excused),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Late => "late",
            Self::Excused => "excused",
        }
    }

    /// Late arrivals count as attended.
    pub fn attended(self) -> bool {
        matches!(self, Self::Present | Self::Late)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub student_id: String,
    pub academic_year: String,
    pub days_recorded: i64,
    pub present: i64,
    pub absent: i64,
    pub late: i64,
    pub excused: i64,
    pub attendance_rate: f64,
}

pub fn upsert(
    conn: &Connection,
    date: &str,
    student_id: &str,
    class_name: &str,
    academic_year: &str,
    status: AttendanceStatus,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO attendance(date, student_id, class_name, academic_year, status)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(date, student_id) DO UPDATE SET
           class_name = excluded.class_name,
           academic_year = excluded.academic_year,
           status = excluded.status",
        (date, student_id, class_name, academic_year, status.as_str()),
    )?;
    Ok(())
}

/// Status per student for one class day. Unmarked students are absent from the map.
pub fn day(
    conn: &Connection,
    date: &str,
    class_name: &str,
    academic_year: &str,
) -> rusqlite::Result<HashMap<String, AttendanceStatus>> {
    let mut stmt = conn.prepare(
        "SELECT student_id, status FROM attendance
         WHERE date = ? AND class_name = ? AND academic_year = ?",
    )?;
    let rows = stmt
        .query_map((date, class_name, academic_year), |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows
        .into_iter()
        .filter_map(|(id, s)| AttendanceStatus::parse(&s).map(|st| (id, st)))
        .collect())
}

pub fn summary(
    conn: &Connection,
    student_id: &str,
    academic_year: &str,
) -> rusqlite::Result<AttendanceSummary> {
    let mut stmt = conn.prepare(
        "SELECT status, COUNT(*) FROM attendance
         WHERE student_id = ? AND academic_year = ?
         GROUP BY status",
    )?;
    let counts = stmt
        .query_map((student_id, academic_year), |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut by_status: HashMap<AttendanceStatus, i64> = HashMap::new();
    for (s, n) in counts {
        if let Some(st) = AttendanceStatus::parse(&s) {
            *by_status.entry(st).or_default() += n;
        }
    }
    let get = |s: AttendanceStatus| by_status.get(&s).copied().unwrap_or(0);
    let days_recorded: i64 = AttendanceStatus::ALL.iter().map(|s| get(*s)).sum();
    let attended: i64 = AttendanceStatus::ALL
        .iter()
        .filter(|s| s.attended())
        .map(|s| get(*s))
        .sum();
    let attendance_rate = if days_recorded > 0 {
        ((attended as f64 / days_recorded as f64) * 10000.0).round() / 100.0
    } else {
        0.0
    };

    Ok(AttendanceSummary {
        student_id: student_id.to_string(),
        academic_year: academic_year.to_string(),
        days_recorded,
        present: get(AttendanceStatus::Present),
        absent: get(AttendanceStatus::Absent),
        late: get(AttendanceStatus::Late),
        excused: get(AttendanceStatus::Excused),
        attendance_rate,
    })
}
