use fairprice::valuation::stats::median;
use fairprice::valuation::{
    CoefficientTable, ComparableSet, PropertyRecord, RepairLevel, ValuationEngine,
    ValuationOptions, ViewType,
};
use proptest::prelude::*;

const REPAIR_LEVELS: [RepairLevel; 9] = [
    RepairLevel::Rough,
    RepairLevel::Economy,
    RepairLevel::Standard,
    RepairLevel::Capital,
    RepairLevel::Improved,
    RepairLevel::Premium,
    RepairLevel::Luxury,
    RepairLevel::Designer,
    RepairLevel::Unknown,
];

const VIEWS: [ViewType; 7] = [
    ViewType::Street,
    ViewType::Yard,
    ViewType::Park,
    ViewType::City,
    ViewType::Water,
    ViewType::Industrial,
    ViewType::Unknown,
];

fn listing() -> impl Strategy<Value = PropertyRecord> {
    (
        1_000_000.0..200_000_000.0f64,
        20.0..300.0f64,
        0..REPAIR_LEVELS.len(),
        2.0..5.0f64,
        0u32..5,
        0..VIEWS.len(),
        1900i32..2030,
        (1u32..30, 1u32..30),
    )
        .prop_map(
            |(price, area, repair, ceiling, bathrooms, view, year, (floor, floors))| {
                PropertyRecord {
                    price: Some(price),
                    total_area: Some(area),
                    repair_level: Some(REPAIR_LEVELS[repair]),
                    ceiling_height: Some(ceiling),
                    bathrooms: Some(bathrooms),
                    view_type: Some(VIEWS[view]),
                    build_year: Some(year),
                    floor: Some(floor.min(floors)),
                    total_floors: Some(floors),
                    ..PropertyRecord::new("generated")
                }
            },
        )
}

fn numeric_only(price: f64, area: f64, ceiling: f64) -> PropertyRecord {
    PropertyRecord {
        price: Some(price),
        total_area: Some(area),
        ceiling_height: Some(ceiling),
        repair_level: Some(RepairLevel::Standard),
        ..PropertyRecord::new(format!("{price}-{area}"))
    }
}

fn options() -> ValuationOptions {
    ValuationOptions {
        reference_year: 2025,
        allow_low_confidence: true,
        ..ValuationOptions::default()
    }
}

proptest! {
    #[test]
    fn multiplier_stays_within_bounds(
        target in listing(),
        comparables in proptest::collection::vec(listing(), 3..12),
    ) {
        let engine = ValuationEngine::new(CoefficientTable::default());
        let comparables: ComparableSet = comparables.into_iter().collect();
        let result = engine
            .evaluate(&target, &comparables, &options())
            .expect("generated inputs are valuable");

        prop_assert!(result.final_multiplier >= 0.7);
        prop_assert!(result.final_multiplier <= 1.4);
        prop_assert!(result.fair_price_total > 0.0);
        prop_assert_eq!(
            result.multiplier_clamped,
            result.raw_multiplier != result.final_multiplier
        );
    }

    #[test]
    fn valuation_ignores_comparable_order(
        rows in proptest::collection::vec(
            (5_000_000.0..20_000_000.0f64, 30.0..120.0f64, 2.5..3.5f64),
            3..10,
        ),
        rotation in 0usize..10,
    ) {
        let engine = ValuationEngine::new(CoefficientTable::default());
        let target = numeric_only(9_000_000.0, 60.0, 3.2);

        let forward: Vec<PropertyRecord> = rows
            .iter()
            .map(|&(price, area, ceiling)| numeric_only(price, area, ceiling))
            .collect();
        let mut shuffled = forward.clone();
        shuffled.reverse();
        let len = shuffled.len();
        shuffled.rotate_left(rotation % len);

        let forward: ComparableSet = forward.into_iter().collect();
        let shuffled: ComparableSet = shuffled.into_iter().collect();

        let first = engine
            .evaluate(&target, &forward, &options())
            .expect("forward order evaluates");
        let second = engine
            .evaluate(&target, &shuffled, &options())
            .expect("shuffled order evaluates");

        prop_assert_eq!(first.base_price_per_sqm, second.base_price_per_sqm);
        prop_assert_eq!(first.raw_multiplier, second.raw_multiplier);
        prop_assert_eq!(first.final_multiplier, second.final_multiplier);
        prop_assert_eq!(first.sample_size, second.sample_size);
    }

    #[test]
    fn median_is_permutation_invariant(
        mut values in proptest::collection::vec(-1.0e9..1.0e9f64, 1..50),
    ) {
        let before = median(&values);
        values.reverse();
        prop_assert_eq!(before, median(&values));
    }
}
