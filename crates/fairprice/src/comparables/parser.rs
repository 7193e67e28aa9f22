use serde::{Deserialize, Deserializer};
use std::io::Read;

use super::ComparableImportError;
use crate::valuation::domain::{
    Comparable, ElevatorCount, FixedParameters, ObjectStatus, PhotoType, PropertyRecord,
    RepairLevel, SourceRef, ViewType, WindowType,
};
use crate::valuation::normalizer::{normalize_text, parse_number};

/// Header line plus one, since CSV lines are 1-based.
const FIRST_DATA_LINE: usize = 2;

pub(crate) fn parse_comparables<R: Read>(
    reader: R,
) -> Result<Vec<Comparable>, ComparableImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut comparables = Vec::new();

    for (index, row) in csv_reader.deserialize::<ComparableRow>().enumerate() {
        let row = row?;
        comparables.push(row.into_comparable(index + FIRST_DATA_LINE)?);
    }

    Ok(comparables)
}

#[derive(Debug, Deserialize)]
struct ComparableRow {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    source: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    price: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    total_area: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    living_area: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    price_per_sqm: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    rooms: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    floor: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    total_floors: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    ceiling_height: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    bathrooms: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    build_year: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    metro_distance_min: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    repair_level: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    window_type: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    elevator_count: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    view_type: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    photo_type: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    object_status: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    district_type: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    transport_accessibility: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    house_type: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    security_level: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    parking_type: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    excluded: Option<String>,
}

impl ComparableRow {
    fn into_comparable(self, line: usize) -> Result<Comparable, ComparableImportError> {
        let cells = Cells { line };
        let source = self.source.ok_or(ComparableImportError::Row {
            line,
            column: "source",
            value: String::new(),
        })?;

        let record = PropertyRecord {
            source: SourceRef(source),
            price: cells.number("price", self.price.as_deref())?,
            total_area: cells.number("total_area", self.total_area.as_deref())?,
            living_area: cells.number("living_area", self.living_area.as_deref())?,
            price_per_sqm: cells.number("price_per_sqm", self.price_per_sqm.as_deref())?,
            rooms: cells.count("rooms", self.rooms.as_deref())?,
            floor: cells.count("floor", self.floor.as_deref())?,
            total_floors: cells.count("total_floors", self.total_floors.as_deref())?,
            ceiling_height: cells.number("ceiling_height", self.ceiling_height.as_deref())?,
            bathrooms: cells.count("bathrooms", self.bathrooms.as_deref())?,
            build_year: cells.year("build_year", self.build_year.as_deref())?,
            metro_distance_min: cells
                .number("metro_distance_min", self.metro_distance_min.as_deref())?,
            repair_level: self.repair_level.as_deref().map(RepairLevel::parse),
            window_type: self.window_type.as_deref().map(WindowType::parse),
            elevator_count: self.elevator_count.as_deref().map(ElevatorCount::parse),
            view_type: self.view_type.as_deref().map(ViewType::parse),
            photo_type: self.photo_type.as_deref().map(PhotoType::parse),
            object_status: self.object_status.as_deref().map(ObjectStatus::parse),
            fixed: FixedParameters {
                district_type: self.district_type,
                transport_accessibility: self.transport_accessibility,
                house_type: self.house_type,
                security_level: self.security_level,
                parking_type: self.parking_type,
            },
        };

        Ok(Comparable {
            record,
            excluded: cells.flag("excluded", self.excluded.as_deref())?,
        })
    }
}

/// Cell parsers that report the offending line and column.
struct Cells {
    line: usize,
}

impl Cells {
    fn invalid(&self, column: &'static str, value: &str) -> ComparableImportError {
        ComparableImportError::Row {
            line: self.line,
            column,
            value: value.to_string(),
        }
    }

    fn number(
        &self,
        column: &'static str,
        value: Option<&str>,
    ) -> Result<Option<f64>, ComparableImportError> {
        value
            .map(|raw| parse_number(raw).ok_or_else(|| self.invalid(column, raw)))
            .transpose()
    }

    fn count(
        &self,
        column: &'static str,
        value: Option<&str>,
    ) -> Result<Option<u32>, ComparableImportError> {
        value
            .map(|raw| {
                parse_number(raw)
                    .filter(|number| {
                        number.fract() == 0.0 && *number >= 0.0 && *number <= f64::from(u32::MAX)
                    })
                    .map(|number| number as u32)
                    .ok_or_else(|| self.invalid(column, raw))
            })
            .transpose()
    }

    fn year(
        &self,
        column: &'static str,
        value: Option<&str>,
    ) -> Result<Option<i32>, ComparableImportError> {
        value
            .map(|raw| {
                parse_number(raw)
                    .filter(|number| number.fract() == 0.0 && number.abs() <= f64::from(i32::MAX))
                    .map(|number| number as i32)
                    .ok_or_else(|| self.invalid(column, raw))
            })
            .transpose()
    }

    fn flag(&self, column: &'static str, value: Option<&str>) -> Result<bool, ComparableImportError> {
        let Some(raw) = value else {
            return Ok(false);
        };
        match normalize_text(raw).as_str() {
            "true" | "1" | "yes" | "y" | "да" => Ok(true),
            "false" | "0" | "no" | "n" | "нет" => Ok(false),
            _ => Err(self.invalid(column, raw)),
        }
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
