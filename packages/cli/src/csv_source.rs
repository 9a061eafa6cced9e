//! Loads incident records from a CSV export.
//!
//! Column headers follow the public crime dataset export format
//! ("Report Number", "Date of Occurrence", ...). Columns that are missing
//! from the file are treated as empty, and rows that cannot be decoded are
//! skipped with a warning.

use std::io::Read;
use std::path::Path;

use crime_insight_incident_models::IncidentRecord;
use serde::Deserialize;

use crate::CliError;

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Report Number", default)]
    report_number: String,
    #[serde(rename = "Date Reported", default)]
    date_reported: String,
    #[serde(rename = "Date of Occurrence", default)]
    date_occurred: String,
    #[serde(rename = "Time of Occurrence", default)]
    time_occurred: String,
    #[serde(rename = "City", default)]
    city: String,
    #[serde(rename = "Crime Code", default)]
    crime_code: String,
    #[serde(rename = "Crime Description", default)]
    crime_type: String,
    #[serde(rename = "Victim Age", default)]
    victim_age: String,
    #[serde(rename = "Victim Gender", default)]
    victim_gender: String,
    #[serde(rename = "Weapon Used", default)]
    weapon: String,
    #[serde(rename = "Case Closed", default)]
    case_closed: String,
    #[serde(rename = "Date Case Closed", default)]
    date_case_closed: Option<String>,
}

impl From<CsvRow> for IncidentRecord {
    fn from(row: CsvRow) -> Self {
        let closed = matches!(
            row.case_closed.trim().to_lowercase().as_str(),
            "yes" | "y" | "true" | "1"
        );
        Self {
            report_number: row.report_number,
            date_reported: row.date_reported,
            date_occurred: row.date_occurred,
            time_occurred: row.time_occurred,
            city: row.city,
            crime_type: row.crime_type,
            crime_code: row.crime_code,
            victim_age: row.victim_age,
            victim_gender: row.victim_gender,
            weapon: row.weapon,
            case_closed: closed,
            date_case_closed: row.date_case_closed.filter(|d| !d.trim().is_empty()),
        }
    }
}

/// Decodes every row of a CSV document.
///
/// # Errors
///
/// Returns [`CliError::Csv`] if the header row cannot be read.
pub fn read_records<R: Read>(reader: R) -> Result<Vec<IncidentRecord>, CliError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    reader.headers()?;

    let mut records = Vec::new();
    let mut skipped = 0u64;
    for row in reader.deserialize::<CsvRow>() {
        match row {
            Ok(row) => records.push(IncidentRecord::from(row)),
            Err(e) => {
                skipped += 1;
                log::debug!("Skipping malformed row: {e}");
            }
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} malformed CSV row(s)");
    }
    Ok(records)
}

/// Reads incident records from the CSV file at `path`.
///
/// # Errors
///
/// Returns [`CliError::Io`] if the file cannot be opened and
/// [`CliError::Csv`] if its header row is unreadable.
pub fn load_records(path: &Path) -> Result<Vec<IncidentRecord>, CliError> {
    let file = std::fs::File::open(path)?;
    let records = read_records(file)?;
    log::info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Report Number,Date Reported,Date of Occurrence,Time of Occurrence,\
City,Crime Code,Crime Description,Victim Age,Victim Gender,Weapon Used,Case Closed,\
Date Case Closed";

    #[test]
    fn decodes_export_rows() {
        let csv = format!(
            "{HEADER}\n\
             1,02-01-2020 00:00,01-01-2020 00:00,01-01-2020 01:11,Ahmedabad,576,IDENTITY THEFT,16,M,Blunt Object,No,\n\
             2,01-01-2020 19:00,01-01-2020 01:00,01-01-2020 06:26,Chennai,128,HOMICIDE,37,F,Poison,Yes,01-01-2020 18:00\n"
        );
        let records = read_records(csv.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].city, "Ahmedabad");
        assert_eq!(records[0].crime_type, "IDENTITY THEFT");
        assert_eq!(records[0].time_occurred, "01-01-2020 01:11");
        assert!(!records[0].case_closed);
        assert_eq!(records[0].date_case_closed, None);
        assert!(records[1].case_closed);
        assert_eq!(records[1].date_case_closed.as_deref(), Some("01-01-2020 18:00"));
        assert_eq!(records[1].victim_gender, "F");
    }

    #[test]
    fn missing_columns_default_to_empty() {
        let csv = "City,Crime Description\nDelhi,BURGLARY\n";
        let records = read_records(csv.as_bytes()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].city, "Delhi");
        assert!(records[0].date_occurred.is_empty());
        assert!(records[0].victim_age.is_empty());
        assert!(!records[0].case_closed);
    }

    #[test]
    fn empty_document_has_no_records() {
        assert!(read_records(HEADER.as_bytes()).unwrap().is_empty());
    }
}
