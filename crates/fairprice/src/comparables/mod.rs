//! Loading comparable sets from CSV exports or JSON documents.

mod parser;

use crate::valuation::ComparableSet;
use std::io::Read;
use std::path::Path;

#[derive(Debug)]
pub enum ComparableImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Json(serde_json::Error),
    Row {
        line: usize,
        column: &'static str,
        value: String,
    },
}

impl std::fmt::Display for ComparableImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComparableImportError::Io(err) => write!(f, "failed to read comparables: {}", err),
            ComparableImportError::Csv(err) => write!(f, "invalid comparables CSV: {}", err),
            ComparableImportError::Json(err) => write!(f, "invalid comparables JSON: {}", err),
            ComparableImportError::Row {
                line,
                column,
                value,
            } if value.is_empty() => write!(f, "line {line}: `{column}` is required"),
            ComparableImportError::Row {
                line,
                column,
                value,
            } => write!(f, "line {line}: cannot parse `{column}` from '{value}'"),
        }
    }
}

impl std::error::Error for ComparableImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ComparableImportError::Io(err) => Some(err),
            ComparableImportError::Csv(err) => Some(err),
            ComparableImportError::Json(err) => Some(err),
            ComparableImportError::Row { .. } => None,
        }
    }
}

impl From<std::io::Error> for ComparableImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ComparableImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<serde_json::Error> for ComparableImportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

pub struct ComparableImporter;

impl ComparableImporter {
    /// Load a comparable set, choosing the format from the file extension:
    /// `.json` is read as a JSON array, anything else as CSV.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<ComparableSet, ComparableImportError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let is_json = path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json_reader(file)
        } else {
            Self::from_reader(file)
        }
    }

    /// Read CSV with a header row. Only `source` is mandatory; unknown
    /// categorical labels import as `Unknown`.
    pub fn from_reader<R: Read>(reader: R) -> Result<ComparableSet, ComparableImportError> {
        let comparables = parser::parse_comparables(reader)?;
        Ok(ComparableSet::new(comparables))
    }

    pub fn from_json_reader<R: Read>(reader: R) -> Result<ComparableSet, ComparableImportError> {
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::{RepairLevel, SourceRef, ViewType};

    const CSV: &str = "\
source,price,total_area,living_area,floor,total_floors,ceiling_height,build_year,repair_level,view_type,district_type,excluded
https://listings.example/a,8 200 000 ₽,48,30,5,9,\"2,8\",2015,Стандартная,во двор,  Центр ,
https://listings.example/b,8450000,51,,,,,,евроремонт,,,да
";

    #[test]
    fn parses_listing_formatted_cells() {
        let set = ComparableImporter::from_reader(CSV.as_bytes()).expect("csv parses");
        assert_eq!(set.len(), 2);

        let first = &set.as_slice()[0];
        assert_eq!(
            first.record.source,
            SourceRef("https://listings.example/a".to_string())
        );
        assert_eq!(first.record.price, Some(8_200_000.0));
        assert_eq!(first.record.ceiling_height, Some(2.8));
        assert_eq!(first.record.floor, Some(5));
        assert_eq!(first.record.build_year, Some(2015));
        assert_eq!(first.record.repair_level, Some(RepairLevel::Standard));
        assert_eq!(first.record.view_type, Some(ViewType::Yard));
        assert_eq!(first.record.fixed.district_type.as_deref(), Some("Центр"));
        assert!(!first.excluded);

        let second = &set.as_slice()[1];
        assert_eq!(second.record.living_area, None);
        assert_eq!(second.record.repair_level, Some(RepairLevel::Improved));
        assert!(second.excluded);
    }

    #[test]
    fn reports_line_and_column_of_bad_cells() {
        let csv = "source,price,total_area\na,abc,50\n";
        match ComparableImporter::from_reader(csv.as_bytes()) {
            Err(ComparableImportError::Row {
                line,
                column,
                value,
            }) => {
                assert_eq!(line, 2);
                assert_eq!(column, "price");
                assert_eq!(value, "abc");
            }
            other => panic!("expected row error, got {other:?}"),
        }
    }

    #[test]
    fn fractional_counts_are_rejected() {
        let csv = "source,floor\na,2.5\n";
        let error = ComparableImporter::from_reader(csv.as_bytes()).expect_err("floor must be whole");
        assert!(error.to_string().contains("floor"));
    }

    #[test]
    fn source_is_required() {
        let csv = "source,price\n,100\n";
        let error = ComparableImporter::from_reader(csv.as_bytes()).expect_err("source required");
        assert_eq!(error.to_string(), "line 2: `source` is required");
    }

    #[test]
    fn unknown_excluded_values_are_rejected() {
        let csv = "source,excluded\na,maybe\n";
        assert!(matches!(
            ComparableImporter::from_reader(csv.as_bytes()),
            Err(ComparableImportError::Row {
                column: "excluded",
                ..
            })
        ));
    }

    #[test]
    fn reads_json_arrays() {
        let json = r#"[
            { "source": "a", "price": 8200000, "total_area": 48, "repair_level": "premium" },
            { "source": "b", "price_per_sqm": 165000, "total_area": 50, "excluded": true }
        ]"#;
        let set = ComparableImporter::from_json_reader(json.as_bytes()).expect("json parses");
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.as_slice()[0].record.repair_level,
            Some(RepairLevel::Premium)
        );
        assert!(set.as_slice()[1].excluded);
    }
}
