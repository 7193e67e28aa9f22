use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::domain::{FixedParameters, PropertyRecord};

/// Relative disagreement between a supplied and a derived price per m² above
/// which the supplied value is reported as recomputed.
const PRICE_PER_SQM_TOLERANCE: f64 = 0.005;

/// Supplied and derived prices per m² closer than this are treated as the same
/// value, which keeps normalization idempotent.
const REDERIVE_EPSILON: f64 = 1e-9;

const CEILING_HEIGHT_RANGE: (f64, f64) = (2.0, 5.0);
const BUILD_YEAR_RANGE: (i32, i32) = (1700, 2100);

/// Data quality observations collected while normalizing a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    InvalidPrice,
    InvalidTotalArea,
    InvalidPricePerSqm,
    InvalidLivingArea,
    CeilingOutOfRange,
    InvalidFloor,
    InconsistentFloors,
    InvalidMetroDistance,
    InvalidBuildYear,
    PricePerSqmRecomputed,
    PriceDerived,
    MissingPricePerSqm,
}

/// A record whose derived fields are consistent, plus what had to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub record: PropertyRecord,
    pub quality: BTreeSet<QualityFlag>,
}

impl NormalizedRecord {
    pub fn has(&self, flag: QualityFlag) -> bool {
        self.quality.contains(&flag)
    }

    pub fn price_per_sqm(&self) -> Option<f64> {
        self.record.price_per_sqm
    }
}

/// Collapse whitespace, strip invisible marks and lowercase free text so
/// labels compare reliably.
pub fn normalize_text(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_lowercase()
}

/// Parse a number as it appears in scraped listings: "8 500 000 ₽",
/// "3,0 м", "165 686 ₽/м²".
pub fn parse_number(raw: &str) -> Option<f64> {
    let digits: String = raw
        .chars()
        .take_while(|ch| *ch != '/')
        .filter(|ch| ch.is_ascii_digit() || matches!(ch, '.' | ',' | '-'))
        .collect();
    if !digits.chars().any(|ch| ch.is_ascii_digit()) {
        return None;
    }

    let decimal = if digits.contains('.') {
        digits.replace(',', "")
    } else {
        digits.replace(',', ".")
    };

    decimal.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Bring a record into a consistent state: valid ranges,
/// `living_area <= total_area`, and `price_per_sqm = price / total_area`
/// whenever both operands are known.
pub fn normalize(source: &PropertyRecord) -> NormalizedRecord {
    let mut record = source.clone();
    let mut quality = BTreeSet::new();

    record.price = positive(record.price, QualityFlag::InvalidPrice, &mut quality);
    record.total_area = positive(record.total_area, QualityFlag::InvalidTotalArea, &mut quality);
    record.price_per_sqm = positive(
        record.price_per_sqm,
        QualityFlag::InvalidPricePerSqm,
        &mut quality,
    );

    if let Some(living) = record.living_area {
        let exceeds_total = record.total_area.is_some_and(|total| living > total);
        if !living.is_finite() || living <= 0.0 || exceeds_total {
            record.living_area = None;
            quality.insert(QualityFlag::InvalidLivingArea);
        }
    }

    if let Some(height) = record.ceiling_height {
        let (min, max) = CEILING_HEIGHT_RANGE;
        if !(min..=max).contains(&height) {
            record.ceiling_height = None;
            quality.insert(QualityFlag::CeilingOutOfRange);
        }
    }

    if record.floor == Some(0) {
        record.floor = None;
        quality.insert(QualityFlag::InvalidFloor);
    }
    let floors_inconsistent = match (record.floor, record.total_floors) {
        (_, Some(0)) => true,
        (Some(floor), Some(total)) => total < floor,
        _ => false,
    };
    if floors_inconsistent {
        record.total_floors = None;
        quality.insert(QualityFlag::InconsistentFloors);
    }

    if let Some(minutes) = record.metro_distance_min {
        if !minutes.is_finite() || minutes < 0.0 {
            record.metro_distance_min = None;
            quality.insert(QualityFlag::InvalidMetroDistance);
        }
    }

    if let Some(year) = record.build_year {
        let (min, max) = BUILD_YEAR_RANGE;
        if !(min..=max).contains(&year) {
            record.build_year = None;
            quality.insert(QualityFlag::InvalidBuildYear);
        }
    }

    match (record.price, record.total_area, record.price_per_sqm) {
        (Some(price), Some(area), supplied) => {
            let derived = price / area;
            match supplied {
                Some(value) if ((value - derived) / derived).abs() <= REDERIVE_EPSILON => {}
                Some(value) => {
                    if ((value - derived) / derived).abs() > PRICE_PER_SQM_TOLERANCE {
                        quality.insert(QualityFlag::PricePerSqmRecomputed);
                    }
                    record.price_per_sqm = Some(derived);
                }
                None => record.price_per_sqm = Some(derived),
            }
        }
        (None, Some(area), Some(per_sqm)) => {
            record.price = Some(per_sqm * area);
            quality.insert(QualityFlag::PriceDerived);
        }
        _ => {}
    }

    if record.price_per_sqm.is_none() {
        quality.insert(QualityFlag::MissingPricePerSqm);
    }

    record.fixed = normalize_fixed(&record.fixed);

    NormalizedRecord { record, quality }
}

fn positive(
    value: Option<f64>,
    flag: QualityFlag,
    quality: &mut BTreeSet<QualityFlag>,
) -> Option<f64> {
    match value {
        Some(value) if value.is_finite() && value > 0.0 => Some(value),
        Some(_) => {
            quality.insert(flag);
            None
        }
        None => None,
    }
}

fn normalize_fixed(fixed: &FixedParameters) -> FixedParameters {
    let clean = |value: &Option<String>| {
        value
            .as_deref()
            .map(normalize_text)
            .filter(|value| !value.is_empty())
    };

    FixedParameters {
        district_type: clean(&fixed.district_type),
        transport_accessibility: clean(&fixed.transport_accessibility),
        house_type: clean(&fixed.house_type),
        security_level: clean(&fixed.security_level),
        parking_type: clean(&fixed.parking_type),
    }
}
