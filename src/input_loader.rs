use calamine::{open_workbook_auto, Data, Range, Reader};
use indexmap::IndexSet;
use log::info;
use std::fs::File;
use std::path::Path;

use crate::error::{AppError, Result};

pub const KEYWORD_COLUMN: &str = "keyword";

/// Reads the `keyword` column of a CSV or Excel file. Blank cells are
/// dropped and repeated keywords keep only their first occurrence. A file
/// without the column is rejected before anything else happens.
pub fn load_keywords<P: AsRef<Path>>(filename: P) -> Result<Vec<String>> {
    let path = filename.as_ref();

    let is_excel = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .is_some_and(|ext| matches!(ext.as_str(), "xlsx" | "xlsm" | "xls" | "ods"));

    let keywords = if is_excel {
        load_excel(path)?
    } else {
        load_csv(path)?
    };

    info!("Loaded {} unique keyword(s) from {:?}", keywords.len(), path);
    Ok(keywords)
}

fn is_keyword_header(header: &str) -> bool {
    header.trim().eq_ignore_ascii_case(KEYWORD_COLUMN)
}

fn unique_non_blank<I: IntoIterator<Item = String>>(values: I) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

fn load_csv(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let column = rdr
        .headers()?
        .iter()
        .position(is_keyword_header)
        .ok_or_else(|| AppError::MissingColumn(KEYWORD_COLUMN.to_string()))?;

    let mut values = Vec::new();
    for record in rdr.records() {
        let record = record?;
        if let Some(value) = record.get(column) {
            values.push(value.to_string());
        }
    }

    Ok(unique_non_blank(values))
}

fn load_excel(path: &Path) -> Result<Vec<String>> {
    let mut workbook = open_workbook_auto(path).map_err(|e| AppError::excel(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::UnsupportedInput(format!("{:?} has no worksheets", path)))?
        .map_err(|e| AppError::excel(e.to_string()))?;

    keywords_from_range(&range)
}

/// First row is the header row.
fn keywords_from_range(range: &Range<Data>) -> Result<Vec<String>> {
    let mut rows = range.rows();

    let column = rows
        .next()
        .and_then(|header| header.iter().position(|cell| is_keyword_header(&cell.to_string())))
        .ok_or_else(|| AppError::MissingColumn(KEYWORD_COLUMN.to_string()))?;

    let values = rows.filter_map(|row| row.get(column).map(|cell| cell.to_string()));
    Ok(unique_non_blank(values))
}
