use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::batch::ExtractedRow;
use crate::error::Result;
use crate::store::EmailRecord;

pub const RUN_COLUMNS: &[&str] = &["keyword", "email", "website", "source", "linkedin", "facebook"];

pub const RECORD_COLUMNS: &[&str] = &[
    "id",
    "keyword",
    "email",
    "source",
    "website",
    "linkedin",
    "facebook",
    "created_at",
];

/// Newly stored emails from one extraction run.
pub fn write_run_csv<W: Write>(writer: W, rows: &[ExtractedRow]) -> Result<()> {
    write_csv(writer, RUN_COLUMNS, rows)
}

/// Results of a historical query.
pub fn write_records_csv<W: Write>(writer: W, records: &[EmailRecord]) -> Result<()> {
    write_csv(writer, RECORD_COLUMNS, records)
}

pub fn save_run_csv<P: AsRef<Path>>(path: P, rows: &[ExtractedRow]) -> Result<()> {
    write_run_csv(create_file(path.as_ref())?, rows)
}

pub fn save_records_csv<P: AsRef<Path>>(path: P, records: &[EmailRecord]) -> Result<()> {
    write_records_csv(create_file(path.as_ref())?, records)
}

fn create_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}

// Header written by hand so an empty result still produces a valid file.
fn write_csv<W: Write, T: Serialize>(writer: W, columns: &[&str], rows: &[T]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    wtr.write_record(columns)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row() -> ExtractedRow {
        ExtractedRow {
            keyword: "acme corp".into(),
            email: "info@acme.com".into(),
            website: Some("https://acme.com".into()),
            source: "https://acme.com/about".into(),
            linkedin: Some("https://www.linkedin.com/company/acme".into()),
            facebook: None,
        }
    }

    #[test]
    fn test_run_csv_layout() {
        let mut out = Vec::new();
        write_run_csv(&mut out, &[row()]).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "keyword,email,website,source,linkedin,facebook");
        assert_eq!(
            lines[1],
            "acme corp,info@acme.com,https://acme.com,https://acme.com/about,https://www.linkedin.com/company/acme,"
        );
    }

    #[test]
    fn test_empty_export_has_header() {
        let mut out = Vec::new();
        write_records_csv(&mut out, &[]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "id,keyword,email,source,website,linkedin,facebook,created_at\n"
        );
    }

    #[test]
    fn test_records_csv_layout() {
        let record = EmailRecord {
            id: 7,
            keyword: "acme".into(),
            email: "a@acme.com".into(),
            source: "https://acme.com".into(),
            website: None,
            linkedin: None,
            facebook: Some("https://facebook.com/acme".into()),
            created_at: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
        };

        let mut out = Vec::new();
        write_records_csv(&mut out, &[record]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let data_line = text.lines().nth(1).unwrap();
        assert!(data_line.starts_with("7,acme,a@acme.com,https://acme.com,,,https://facebook.com/acme,2024-05-01"));
    }

    #[test]
    fn test_save_run_csv_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputs").join("run.csv");
        save_run_csv(&path, &[row()]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
