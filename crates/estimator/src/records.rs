//! Labelled field records loaded from CSV
//!
//! Expected format: a header row naming the columns, one of which is
//! `target`. `species` and `climate_zone` are read as text; every other
//! column must be numeric. Blank lines and `#` comments are skipped.

use std::path::Path;

use crate::errors::{EstimationError, Result};
use crate::learned::LabelledRecord;
use crate::resolver::FeatureInput;

pub const TARGET_COLUMN: &str = "target";
pub const CATEGORICAL_FIELDS: [&str; 2] = ["species", "climate_zone"];

pub fn read_labelled_csv<P: AsRef<Path>>(path: P) -> Result<Vec<LabelledRecord>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    parse_labelled_csv(&content)
}

pub fn parse_labelled_csv(content: &str) -> Result<Vec<LabelledRecord>> {
    let mut lines = content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

    let header: Vec<String> = match lines.next() {
        Some((_, line)) => line.split(',').map(|s| s.trim().to_string()).collect(),
        None => return Err(EstimationError::invalid_field("csv", "no header row")),
    };
    let target_idx = header
        .iter()
        .position(|name| name == TARGET_COLUMN)
        .ok_or_else(|| EstimationError::MissingField {
            fields: vec![TARGET_COLUMN.to_string()],
        })?;

    let mut records = Vec::new();
    for (line_no, line) in lines {
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        if parts.len() != header.len() {
            return Err(EstimationError::invalid_field(
                "csv",
                format!(
                    "line {line_no}: expected {} columns, got {}",
                    header.len(),
                    parts.len()
                ),
            ));
        }

        let mut features = FeatureInput::new();
        let mut target = 0.0;
        for (idx, (name, raw)) in header.iter().zip(&parts).enumerate() {
            if CATEGORICAL_FIELDS.contains(&name.as_str()) {
                features = features.with_categorical(name.as_str(), *raw);
                continue;
            }
            let value: f64 = raw.parse().map_err(|_| {
                EstimationError::invalid_field(
                    name.as_str(),
                    format!("line {line_no}: '{raw}' is not a number"),
                )
            })?;
            if idx == target_idx {
                target = value;
            } else {
                features = features.with_numeric(name.as_str(), value);
            }
        }

        records.push(LabelledRecord { features, target });
    }

    if records.is_empty() {
        return Err(EstimationError::invalid_field("csv", "no data rows"));
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn parses_mixed_columns() {
        let csv = "# field plots\ndbh,tree_height,species,target\n25,12,Rhizophora,310.5\n\n40,18,Avicennia,900\n";
        let records = parse_labelled_csv(csv).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].features.numeric("dbh"), Some(25.0));
        assert_eq!(records[0].features.categorical("species"), Some("Rhizophora"));
        assert_eq!(records[0].features.numeric("target"), None);
        assert_eq!(records[1].target, 900.0);
    }

    #[test]
    fn missing_target_column() {
        let err = parse_labelled_csv("dbh,species\n1,Avicennia\n").unwrap_err();
        assert!(matches!(err, EstimationError::MissingField { fields } if fields == ["target"]));
    }

    #[test]
    fn rejects_non_numeric_value() {
        let err = parse_labelled_csv("dbh,target\nwide,3\n").unwrap_err();
        assert!(matches!(err, EstimationError::InvalidField { field, .. } if field == "dbh"));
    }

    #[test]
    fn rejects_ragged_rows() {
        assert!(parse_labelled_csv("dbh,target\n1,2,3\n").is_err());
    }

    #[test]
    fn reads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "dbh,climate_zone,target").unwrap();
        writeln!(file, "12.5,temperate,40").unwrap();

        let records = read_labelled_csv(file.path()).unwrap();
        assert_eq!(records[0].features.categorical("climate_zone"), Some("temperate"));
    }
}
