use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::coefficients::FloorPosition;
use super::domain::{
    Categorical, ElevatorCount, Field, ObjectStatus, PhotoType, PropertyRecord, RepairLevel,
    ViewType, WindowType,
};
use super::stats;

/// Baseline built from a comparable set: medians for numeric fields, modes
/// for categorical ones. Fields no comparable carries stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecord {
    pub sample_size: usize,
    pub price: Option<f64>,
    pub total_area: Option<f64>,
    pub living_area: Option<f64>,
    pub price_per_sqm: Option<f64>,
    pub rooms: Option<f64>,
    pub floor: Option<f64>,
    pub total_floors: Option<f64>,
    /// Most common position among comparables with a known floor. Medians of
    /// floor and building height taken apart can describe no real listing.
    pub floor_position: Option<FloorPosition>,
    pub ceiling_height: Option<f64>,
    pub bathrooms: Option<f64>,
    pub build_year: Option<f64>,
    pub metro_distance_min: Option<f64>,
    pub living_area_share: Option<f64>,
    pub repair_level: Option<RepairLevel>,
    pub window_type: Option<WindowType>,
    pub elevator_count: Option<ElevatorCount>,
    pub view_type: Option<ViewType>,
    pub photo_type: Option<PhotoType>,
    pub object_status: Option<ObjectStatus>,
    /// How many comparables contributed to each field.
    pub presence: BTreeMap<Field, usize>,
}

/// Build the median record for a comparable set.
///
/// Callers guarantee a non-empty input; an empty slice yields an all-`None`
/// record.
pub fn aggregate(records: &[&PropertyRecord]) -> AggregateRecord {
    let mut presence = BTreeMap::new();

    let mut numeric = |field: Field, extract: &dyn Fn(&PropertyRecord) -> Option<f64>| {
        let values: Vec<f64> = records
            .iter()
            .filter_map(|record| extract(record))
            .filter(|value| value.is_finite())
            .collect();
        if !values.is_empty() {
            presence.insert(field, values.len());
        }
        stats::median(&values)
    };

    let price = numeric(Field::Price, &|r| r.price);
    let total_area = numeric(Field::TotalArea, &|r| r.total_area);
    let living_area = numeric(Field::LivingArea, &|r| r.living_area);
    let price_per_sqm = numeric(Field::PricePerSqm, &|r| r.price_per_sqm);
    let rooms = numeric(Field::Rooms, &|r| r.rooms.map(f64::from));
    let floor = numeric(Field::Floor, &|r| r.floor.map(f64::from));
    let total_floors = numeric(Field::TotalFloors, &|r| r.total_floors.map(f64::from));
    let floor_position = stats::mode_first_seen(records.iter().filter_map(|record| {
        FloorPosition::classify(
            f64::from(record.floor?),
            record.total_floors.map(f64::from),
        )
    }));
    let ceiling_height = numeric(Field::CeilingHeight, &|r| r.ceiling_height);
    let bathrooms = numeric(Field::Bathrooms, &|r| r.bathrooms.map(f64::from));
    let build_year = numeric(Field::BuildYear, &|r| r.build_year.map(f64::from));
    let metro_distance_min = numeric(Field::MetroDistance, &|r| r.metro_distance_min);
    let living_area_share = numeric(Field::LivingAreaShare, &|r| r.living_area_share());

    let repair_level = categorical(records, Field::RepairLevel, &mut presence, |r| {
        r.repair_level
    });
    let window_type = categorical(records, Field::WindowType, &mut presence, |r| r.window_type);
    let elevator_count = categorical(records, Field::ElevatorCount, &mut presence, |r| {
        r.elevator_count
    });
    let view_type = categorical(records, Field::ViewType, &mut presence, |r| r.view_type);
    let photo_type = categorical(records, Field::PhotoType, &mut presence, |r| r.photo_type);
    let object_status = categorical(records, Field::ObjectStatus, &mut presence, |r| {
        r.object_status
    });

    AggregateRecord {
        sample_size: records.len(),
        price,
        total_area,
        living_area,
        price_per_sqm,
        rooms,
        floor,
        total_floors,
        floor_position,
        ceiling_height,
        bathrooms,
        build_year,
        metro_distance_min,
        living_area_share,
        repair_level,
        window_type,
        elevator_count,
        view_type,
        photo_type,
        object_status,
        presence,
    }
}

/// Mode over the known values of a categorical field. `Unknown` labels carry
/// no information and do not vote.
fn categorical<T, F>(
    records: &[&PropertyRecord],
    field: Field,
    presence: &mut BTreeMap<Field, usize>,
    extract: F,
) -> Option<T>
where
    T: Categorical,
    F: Fn(&PropertyRecord) -> Option<T>,
{
    let values: Vec<T> = records
        .iter()
        .filter_map(|record| extract(record))
        .filter(|value| !value.is_unknown())
        .collect();
    if !values.is_empty() {
        presence.insert(field, values.len());
    }
    stats::mode_first_seen(values)
}
