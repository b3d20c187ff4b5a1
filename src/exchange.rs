use crate::store::results::ResultRow;
use anyhow::{Context, Result};
use std::path::Path;

/// Writes results as CSV with a header row. Empty scores stay empty cells.
pub fn export_results_csv(rows: &[ResultRow], out_path: &Path) -> Result<usize> {
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create directory {}", parent.to_string_lossy())
            })?;
        }
    }
    let mut wtr = csv::Writer::from_path(out_path)
        .with_context(|| format!("failed to create {}", out_path.to_string_lossy()))?;
    if rows.is_empty() {
        // Serialize only emits headers alongside the first record.
        wtr.write_record(RESULT_HEADERS)
            .context("failed to write CSV headers")?;
    }
    for row in rows {
        wtr.serialize(row).context("failed to write result row")?;
    }
    wtr.flush().context("failed to flush CSV file")?;
    Ok(rows.len())
}

pub const RESULT_HEADERS: [&str; 17] = [
    "examId",
    "studentId",
    "studentName",
    "className",
    "subject",
    "examName",
    "examType",
    "midterm",
    "final",
    "homework",
    "total",
    "average",
    "percentage",
    "grade",
    "academicYear",
    "status",
    "generatedAt",
];

/// Reads a file written by [`export_results_csv`]. Fails on the first bad row
/// so nothing is imported from a damaged file.
pub fn read_results_csv(in_path: &Path) -> Result<Vec<ResultRow>> {
    let mut rdr = csv::Reader::from_path(in_path)
        .with_context(|| format!("failed to open {}", in_path.to_string_lossy()))?;
    let mut rows = Vec::new();
    for (i, rec) in rdr.deserialize::<ResultRow>().enumerate() {
        // Line 1 is the header.
        let row = rec.with_context(|| format!("invalid result row at line {}", i + 2))?;
        rows.push(row);
    }
    Ok(rows)
}
