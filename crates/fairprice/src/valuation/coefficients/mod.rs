//! Multiplicative price coefficients per property attribute.
//!
//! The table is plain configuration: it never looks at the target or the
//! comparables. Deciding whether a coefficient applies is the calculator's
//! job. Every lookup is total and resolves unknown or missing inputs to
//! [`NEUTRAL`].

mod standard;

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::domain::{ElevatorCount, ObjectStatus, PhotoType, RepairLevel, ViewType, WindowType};

/// Coefficient that leaves a price unchanged.
pub const NEUTRAL: f64 = 1.0;

/// One half-open band of a piecewise table: applies to values below `below`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub below: f64,
    pub coefficient: f64,
}

/// Piecewise-constant coefficient over a continuous attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandTable {
    pub bands: Vec<Band>,
    pub otherwise: f64,
}

impl BandTable {
    pub fn lookup(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return NEUTRAL;
        }
        self.bands
            .iter()
            .find(|band| value < band.below)
            .map(|band| band.coefficient)
            .unwrap_or(self.otherwise)
    }
}

/// Where an apartment sits in its building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloorPosition {
    SingleStorey,
    Ground,
    Second,
    Middle,
    Top,
}

impl FloorPosition {
    /// Classify a floor; `total_floors` is optional because listings often
    /// omit it. Fractional values are rounded first.
    pub fn classify(floor: f64, total_floors: Option<f64>) -> Option<Self> {
        if !floor.is_finite() || floor < 1.0 {
            return None;
        }
        let floor = floor.round();
        let total = total_floors
            .filter(|total| total.is_finite() && *total >= 1.0)
            .map(f64::round);

        let position = match total {
            Some(total) if total <= 1.0 => FloorPosition::SingleStorey,
            _ if floor <= 1.0 => FloorPosition::Ground,
            Some(total) if floor >= total => FloorPosition::Top,
            _ if floor <= 2.0 => FloorPosition::Second,
            _ => FloorPosition::Middle,
        };
        Some(position)
    }

    pub const fn label(self) -> &'static str {
        match self {
            FloorPosition::SingleStorey => "single-storey",
            FloorPosition::Ground => "ground floor",
            FloorPosition::Second => "second floor",
            FloorPosition::Middle => "middle floor",
            FloorPosition::Top => "top floor",
        }
    }
}

/// Non-monotonic floor coefficients: middle floors are preferred over the
/// ground and top floors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorCoefficients {
    pub single_storey: f64,
    pub ground: f64,
    pub second: f64,
    pub middle: f64,
    pub top: f64,
}

impl FloorCoefficients {
    pub fn lookup(&self, position: FloorPosition) -> f64 {
        match position {
            FloorPosition::SingleStorey => self.single_storey,
            FloorPosition::Ground => self.ground,
            FloorPosition::Second => self.second,
            FloorPosition::Middle => self.middle,
            FloorPosition::Top => self.top,
        }
    }
}

/// View coefficients plus the cap on how far a view difference may move the
/// multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewCoefficients {
    pub values: BTreeMap<ViewType, f64>,
    pub max_deviation: f64,
}

impl ViewCoefficients {
    pub fn cap_ratio(&self, ratio: f64) -> f64 {
        ratio.clamp(1.0 - self.max_deviation, 1.0 + self.max_deviation)
    }
}

/// Versioned set of coefficient lookups, grouped by cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientTable {
    pub version: String,
    // condition
    pub repair: BTreeMap<RepairLevel, f64>,
    // apartment features
    pub ceiling_height: BandTable,
    pub bathrooms: BandTable,
    pub window_type: BTreeMap<WindowType, f64>,
    pub elevator_count: BTreeMap<ElevatorCount, f64>,
    pub living_area_share: BandTable,
    // position
    pub floor: FloorCoefficients,
    pub metro_distance: BandTable,
    pub view: ViewCoefficients,
    // risk
    pub photo_type: BTreeMap<PhotoType, f64>,
    pub object_status: BTreeMap<ObjectStatus, f64>,
    pub building_age: BandTable,
    // liquidity
    pub price_tier: BandTable,
}

impl Default for CoefficientTable {
    fn default() -> Self {
        standard::table()
    }
}

impl CoefficientTable {
    pub fn repair(&self, level: RepairLevel) -> f64 {
        lookup(&self.repair, level)
    }

    pub fn ceiling_height(&self, meters: f64) -> f64 {
        self.ceiling_height.lookup(meters)
    }

    pub fn bathrooms(&self, count: f64) -> f64 {
        self.bathrooms.lookup(count)
    }

    pub fn window_type(&self, window: WindowType) -> f64 {
        lookup(&self.window_type, window)
    }

    pub fn elevator_count(&self, elevators: ElevatorCount) -> f64 {
        lookup(&self.elevator_count, elevators)
    }

    pub fn living_area_share(&self, share: f64) -> f64 {
        self.living_area_share.lookup(share)
    }

    pub fn floor(&self, floor: f64, total_floors: Option<f64>) -> f64 {
        FloorPosition::classify(floor, total_floors)
            .map(|position| self.floor.lookup(position))
            .unwrap_or(NEUTRAL)
    }

    pub fn metro_distance(&self, minutes: f64) -> f64 {
        self.metro_distance.lookup(minutes)
    }

    pub fn view(&self, view: ViewType) -> f64 {
        lookup(&self.view.values, view)
    }

    pub fn photo_type(&self, photos: PhotoType) -> f64 {
        lookup(&self.photo_type, photos)
    }

    pub fn object_status(&self, status: ObjectStatus) -> f64 {
        lookup(&self.object_status, status)
    }

    /// Age penalty; buildings "from the future" count as new.
    pub fn building_age(&self, build_year: f64, reference_year: i32) -> f64 {
        if !build_year.is_finite() {
            return NEUTRAL;
        }
        let age = (f64::from(reference_year) - build_year.round()).max(0.0);
        self.building_age.lookup(age)
    }

    pub fn price_tier(&self, price: f64) -> f64 {
        self.price_tier.lookup(price)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CoefficientTableError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CoefficientTableError> {
        let table: Self = serde_json::from_reader(reader)?;
        table.validate()?;
        Ok(table)
    }

    /// Every coefficient must be finite and positive, band edges ascending,
    /// and the view cap within `[0, 1)`.
    pub fn validate(&self) -> Result<(), CoefficientTableError> {
        check_map("repair", &self.repair)?;
        check_bands("ceiling_height", &self.ceiling_height)?;
        check_bands("bathrooms", &self.bathrooms)?;
        check_map("window_type", &self.window_type)?;
        check_map("elevator_count", &self.elevator_count)?;
        check_bands("living_area_share", &self.living_area_share)?;
        for (key, value) in [
            ("single_storey", self.floor.single_storey),
            ("ground", self.floor.ground),
            ("second", self.floor.second),
            ("middle", self.floor.middle),
            ("top", self.floor.top),
        ] {
            check_value("floor", key, value)?;
        }
        check_bands("metro_distance", &self.metro_distance)?;
        check_map("view", &self.view.values)?;
        if !(0.0..1.0).contains(&self.view.max_deviation) {
            return Err(CoefficientTableError::Invalid {
                cluster: "view",
                key: "max_deviation".to_string(),
                value: self.view.max_deviation,
            });
        }
        check_map("photo_type", &self.photo_type)?;
        check_map("object_status", &self.object_status)?;
        check_bands("building_age", &self.building_age)?;
        check_bands("price_tier", &self.price_tier)?;
        Ok(())
    }
}

fn lookup<K: Ord>(table: &BTreeMap<K, f64>, key: K) -> f64 {
    table.get(&key).copied().unwrap_or(NEUTRAL)
}

fn check_value(cluster: &'static str, key: &str, value: f64) -> Result<(), CoefficientTableError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(CoefficientTableError::Invalid {
            cluster,
            key: key.to_string(),
            value,
        })
    }
}

fn check_map<K: fmt::Display>(
    cluster: &'static str,
    table: &BTreeMap<K, f64>,
) -> Result<(), CoefficientTableError> {
    table
        .iter()
        .try_for_each(|(key, value)| check_value(cluster, &key.to_string(), *value))
}

fn check_bands(cluster: &'static str, table: &BandTable) -> Result<(), CoefficientTableError> {
    let mut previous = f64::NEG_INFINITY;
    for band in &table.bands {
        if !band.below.is_finite() || band.below <= previous {
            return Err(CoefficientTableError::Invalid {
                cluster,
                key: "below".to_string(),
                value: band.below,
            });
        }
        previous = band.below;
        check_value(cluster, &format!("< {}", band.below), band.coefficient)?;
    }
    check_value(cluster, "otherwise", table.otherwise)
}

#[derive(Debug, thiserror::Error)]
pub enum CoefficientTableError {
    #[error("failed to read coefficient table: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid coefficient table JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("coefficient `{key}` in cluster `{cluster}` must be positive and finite, got {value}")]
    Invalid {
        cluster: &'static str,
        key: String,
        value: f64,
    },
}
