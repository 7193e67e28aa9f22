use std::collections::BTreeMap;

use super::{Band, BandTable, CoefficientTable, FloorCoefficients, ViewCoefficients};
use crate::valuation::domain::{
    ElevatorCount, ObjectStatus, PhotoType, RepairLevel, ViewType, WindowType,
};

pub(super) const VERSION: &str = "standard-2024.1";

fn bands(bands: &[(f64, f64)], otherwise: f64) -> BandTable {
    BandTable {
        bands: bands
            .iter()
            .map(|&(below, coefficient)| Band { below, coefficient })
            .collect(),
        otherwise,
    }
}

pub(super) fn table() -> CoefficientTable {
    CoefficientTable {
        version: VERSION.to_string(),
        repair: BTreeMap::from([
            (RepairLevel::Rough, 0.75),
            (RepairLevel::Economy, 0.90),
            (RepairLevel::Standard, 1.00),
            (RepairLevel::Capital, 1.10),
            (RepairLevel::Improved, 1.25),
            (RepairLevel::Premium, 1.50),
            (RepairLevel::Luxury, 1.75),
            (RepairLevel::Designer, 2.00),
        ]),
        ceiling_height: bands(
            &[
                (2.5, 0.94),
                (2.7, 0.96),
                (2.9, 0.98),
                (3.1, 1.02),
                (3.4, 1.05),
            ],
            1.08,
        ),
        bathrooms: bands(&[(0.5, 0.95), (1.5, 1.00), (2.5, 1.05)], 1.08),
        window_type: BTreeMap::from([
            (WindowType::Wooden, 0.97),
            (WindowType::Plastic, 1.00),
            (WindowType::Panoramic, 1.05),
        ]),
        elevator_count: BTreeMap::from([
            (ElevatorCount::None, 0.95),
            (ElevatorCount::One, 1.00),
            (ElevatorCount::Two, 1.02),
            (ElevatorCount::ThreeOrMore, 1.03),
        ]),
        living_area_share: bands(&[(0.45, 0.97), (0.7, 1.00)], 1.02),
        floor: FloorCoefficients {
            single_storey: 1.00,
            ground: 0.93,
            second: 0.98,
            middle: 1.00,
            top: 0.97,
        },
        // minutes on foot
        metro_distance: bands(
            &[(5.0, 1.05), (10.0, 1.02), (15.0, 1.00), (25.0, 0.97)],
            0.94,
        ),
        view: ViewCoefficients {
            values: BTreeMap::from([
                (ViewType::Street, 1.00),
                (ViewType::Yard, 1.00),
                (ViewType::Park, 1.03),
                (ViewType::City, 1.03),
                (ViewType::Water, 1.05),
                (ViewType::Industrial, 0.97),
            ]),
            max_deviation: 0.05,
        },
        photo_type: BTreeMap::from([
            (PhotoType::Real, 1.00),
            (PhotoType::Rendered, 0.95),
            (PhotoType::Missing, 0.97),
        ]),
        object_status: BTreeMap::from([
            (ObjectStatus::Ready, 1.00),
            (ObjectStatus::UnderConstruction, 0.90),
        ]),
        // years since build
        building_age: bands(&[(10.0, 1.00), (25.0, 0.97), (50.0, 0.93)], 0.88),
        price_tier: bands(
            &[
                (15_000_000.0, 1.00),
                (30_000_000.0, 0.98),
                (50_000_000.0, 0.96),
            ],
            0.93,
        ),
    }
}
