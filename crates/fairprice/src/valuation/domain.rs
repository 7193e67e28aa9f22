use std::fmt;

use serde::{Deserialize, Serialize};

use super::normalizer::normalize_text;

/// Opaque reference to where a listing came from (URL or manual id).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRef(pub String);

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Listing shape shared by the valuation target and its comparables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    #[serde(default)]
    pub source: SourceRef,
    pub price: Option<f64>,
    pub total_area: Option<f64>,
    pub living_area: Option<f64>,
    pub price_per_sqm: Option<f64>,
    pub rooms: Option<u32>,
    pub floor: Option<u32>,
    pub total_floors: Option<u32>,
    pub ceiling_height: Option<f64>,
    pub bathrooms: Option<u32>,
    pub build_year: Option<i32>,
    pub metro_distance_min: Option<f64>,
    pub repair_level: Option<RepairLevel>,
    pub window_type: Option<WindowType>,
    pub elevator_count: Option<ElevatorCount>,
    pub view_type: Option<ViewType>,
    pub photo_type: Option<PhotoType>,
    pub object_status: Option<ObjectStatus>,
    #[serde(default)]
    pub fixed: FixedParameters,
}

impl PropertyRecord {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: SourceRef(source.into()),
            ..Self::default()
        }
    }

    /// Living area as a share of total area, when both are known.
    pub fn living_area_share(&self) -> Option<f64> {
        match (self.living_area, self.total_area) {
            (Some(living), Some(total)) if total > 0.0 => Some(living / total),
            _ => None,
        }
    }
}

/// Attributes that decide which listings are comparable at all. They never
/// produce price coefficients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedParameters {
    pub district_type: Option<String>,
    pub transport_accessibility: Option<String>,
    pub house_type: Option<String>,
    pub security_level: Option<String>,
    pub parking_type: Option<String>,
}

impl FixedParameters {
    fn pairs(&self) -> [(&'static str, Option<&str>); 5] {
        [
            ("district_type", self.district_type.as_deref()),
            (
                "transport_accessibility",
                self.transport_accessibility.as_deref(),
            ),
            ("house_type", self.house_type.as_deref()),
            ("security_level", self.security_level.as_deref()),
            ("parking_type", self.parking_type.as_deref()),
        ]
    }

    /// Names of the parameters known on both sides whose values differ.
    pub fn mismatches(&self, other: &FixedParameters) -> Vec<&'static str> {
        self.pairs()
            .into_iter()
            .zip(other.pairs())
            .filter_map(|((name, ours), (_, theirs))| match (ours, theirs) {
                (Some(ours), Some(theirs)) if ours != theirs => Some(name),
                _ => None,
            })
            .collect()
    }
}

/// One entry of a comparable set. `excluded` marks a manual removal made by
/// the caller, independent of outlier filtering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comparable {
    #[serde(flatten)]
    pub record: PropertyRecord,
    #[serde(default)]
    pub excluded: bool,
}

impl From<PropertyRecord> for Comparable {
    fn from(record: PropertyRecord) -> Self {
        Self {
            record,
            excluded: false,
        }
    }
}

/// Ordered collection of comparables. Order only matters for mode tie-breaks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComparableSet {
    comparables: Vec<Comparable>,
}

impl ComparableSet {
    pub fn new(comparables: Vec<Comparable>) -> Self {
        Self { comparables }
    }

    pub fn push(&mut self, comparable: impl Into<Comparable>) {
        self.comparables.push(comparable.into());
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Comparable> {
        self.comparables.iter()
    }

    pub fn len(&self) -> usize {
        self.comparables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comparables.is_empty()
    }

    pub fn as_slice(&self) -> &[Comparable] {
        &self.comparables
    }

    /// Mark the comparable with the given source as manually excluded.
    /// Returns `false` when no comparable carries that source.
    pub fn exclude(&mut self, source: &SourceRef) -> bool {
        let mut found = false;
        for comparable in self
            .comparables
            .iter_mut()
            .filter(|comparable| &comparable.record.source == source)
        {
            comparable.excluded = true;
            found = true;
        }
        found
    }
}

impl FromIterator<PropertyRecord> for ComparableSet {
    fn from_iter<I: IntoIterator<Item = PropertyRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Comparable::from).collect())
    }
}

impl FromIterator<Comparable> for ComparableSet {
    fn from_iter<I: IntoIterator<Item = Comparable>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ComparableSet {
    type Item = &'a Comparable;
    type IntoIter = std::slice::Iter<'a, Comparable>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Record fields tracked by the aggregator and named in data errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Price,
    TotalArea,
    LivingArea,
    PricePerSqm,
    Rooms,
    Floor,
    TotalFloors,
    CeilingHeight,
    Bathrooms,
    BuildYear,
    MetroDistance,
    LivingAreaShare,
    RepairLevel,
    WindowType,
    ElevatorCount,
    ViewType,
    PhotoType,
    ObjectStatus,
}

impl Field {
    pub const fn label(self) -> &'static str {
        match self {
            Field::Price => "price",
            Field::TotalArea => "total_area",
            Field::LivingArea => "living_area",
            Field::PricePerSqm => "price_per_sqm",
            Field::Rooms => "rooms",
            Field::Floor => "floor",
            Field::TotalFloors => "total_floors",
            Field::CeilingHeight => "ceiling_height",
            Field::Bathrooms => "bathrooms",
            Field::BuildYear => "build_year",
            Field::MetroDistance => "metro_distance_min",
            Field::LivingAreaShare => "living_area_share",
            Field::RepairLevel => "repair_level",
            Field::WindowType => "window_type",
            Field::ElevatorCount => "elevator_count",
            Field::ViewType => "view_type",
            Field::PhotoType => "photo_type",
            Field::ObjectStatus => "object_status",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Coefficient clusters the variable parameters belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterCluster {
    Condition,
    Features,
    Position,
    View,
    Risk,
    Liquidity,
}

/// Parameters eligible for a price adjustment. The declaration order is the
/// order adjustments are applied and reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableParameter {
    RepairLevel,
    CeilingHeight,
    Bathrooms,
    WindowType,
    ElevatorCount,
    LivingAreaShare,
    Floor,
    MetroDistance,
    ViewType,
    PhotoType,
    ObjectStatus,
    BuildYear,
    /// Liquidity of the estimated market value. Derived from the comparable
    /// base and the target's area, never from the asking price.
    PriceTier,
}

impl VariableParameter {
    /// Listing attributes compared one by one against the baseline.
    pub const ATTRIBUTES: [VariableParameter; 12] = [
        VariableParameter::RepairLevel,
        VariableParameter::CeilingHeight,
        VariableParameter::Bathrooms,
        VariableParameter::WindowType,
        VariableParameter::ElevatorCount,
        VariableParameter::LivingAreaShare,
        VariableParameter::Floor,
        VariableParameter::MetroDistance,
        VariableParameter::ViewType,
        VariableParameter::PhotoType,
        VariableParameter::ObjectStatus,
        VariableParameter::BuildYear,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            VariableParameter::RepairLevel => "repair level",
            VariableParameter::CeilingHeight => "ceiling height",
            VariableParameter::Bathrooms => "bathrooms",
            VariableParameter::WindowType => "window type",
            VariableParameter::ElevatorCount => "elevators",
            VariableParameter::LivingAreaShare => "living area share",
            VariableParameter::Floor => "floor",
            VariableParameter::MetroDistance => "metro distance",
            VariableParameter::ViewType => "view",
            VariableParameter::PhotoType => "photos",
            VariableParameter::ObjectStatus => "object status",
            VariableParameter::BuildYear => "building age",
            VariableParameter::PriceTier => "price tier",
        }
    }

    pub const fn cluster(self) -> ParameterCluster {
        match self {
            VariableParameter::RepairLevel => ParameterCluster::Condition,
            VariableParameter::CeilingHeight
            | VariableParameter::Bathrooms
            | VariableParameter::WindowType
            | VariableParameter::ElevatorCount
            | VariableParameter::LivingAreaShare => ParameterCluster::Features,
            VariableParameter::Floor | VariableParameter::MetroDistance => {
                ParameterCluster::Position
            }
            VariableParameter::ViewType => ParameterCluster::View,
            VariableParameter::PhotoType
            | VariableParameter::ObjectStatus
            | VariableParameter::BuildYear => ParameterCluster::Risk,
            VariableParameter::PriceTier => ParameterCluster::Liquidity,
        }
    }
}

/// Apartment finish level, from bare shell to designer renovation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum RepairLevel {
    Rough,
    Economy,
    Standard,
    Capital,
    Improved,
    Premium,
    Luxury,
    Designer,
    Unknown,
}

impl RepairLevel {
    pub const fn label(self) -> &'static str {
        match self {
            RepairLevel::Rough => "черновая",
            RepairLevel::Economy => "эконом",
            RepairLevel::Standard => "стандартная",
            RepairLevel::Capital => "капитальная",
            RepairLevel::Improved => "улучшенная",
            RepairLevel::Premium => "премиум",
            RepairLevel::Luxury => "люкс",
            RepairLevel::Designer => "дизайнерская",
            RepairLevel::Unknown => "неизвестно",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match normalize_text(raw).as_str() {
            "черновая" | "без отделки" | "rough" => RepairLevel::Rough,
            "эконом" | "косметическая" | "economy" => RepairLevel::Economy,
            "стандартная" | "стандарт" | "standard" => RepairLevel::Standard,
            "капитальная" | "capital" => RepairLevel::Capital,
            "улучшенная" | "евроремонт" | "improved" => RepairLevel::Improved,
            "премиум" | "premium" => RepairLevel::Premium,
            "люкс" | "luxury" => RepairLevel::Luxury,
            "дизайнерская" | "дизайнерский" | "designer" => RepairLevel::Designer,
            _ => RepairLevel::Unknown,
        }
    }
}

/// Window glazing type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum WindowType {
    Wooden,
    Plastic,
    Panoramic,
    Unknown,
}

impl WindowType {
    pub const fn label(self) -> &'static str {
        match self {
            WindowType::Wooden => "деревянные",
            WindowType::Plastic => "пластиковые",
            WindowType::Panoramic => "панорамные",
            WindowType::Unknown => "неизвестно",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match normalize_text(raw).as_str() {
            "деревянные" | "wooden" => WindowType::Wooden,
            "пластиковые" | "пвх" | "plastic" => WindowType::Plastic,
            "панорамные" | "panoramic" => WindowType::Panoramic,
            _ => WindowType::Unknown,
        }
    }
}

/// Number of elevators serving the apartment's entrance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum ElevatorCount {
    None,
    One,
    Two,
    ThreeOrMore,
    Unknown,
}

impl ElevatorCount {
    pub const fn label(self) -> &'static str {
        match self {
            ElevatorCount::None => "нет",
            ElevatorCount::One => "1",
            ElevatorCount::Two => "2",
            ElevatorCount::ThreeOrMore => "3+",
            ElevatorCount::Unknown => "неизвестно",
        }
    }

    pub const fn from_count(count: u32) -> Self {
        match count {
            0 => ElevatorCount::None,
            1 => ElevatorCount::One,
            2 => ElevatorCount::Two,
            _ => ElevatorCount::ThreeOrMore,
        }
    }

    pub fn parse(raw: &str) -> Self {
        let normalized = normalize_text(raw);
        match normalized.as_str() {
            "нет" | "none" => ElevatorCount::None,
            "один" | "one" => ElevatorCount::One,
            "два" | "two" => ElevatorCount::Two,
            "3+" | "три и более" | "three_or_more" => ElevatorCount::ThreeOrMore,
            other => other
                .parse::<u32>()
                .map(ElevatorCount::from_count)
                .unwrap_or(ElevatorCount::Unknown),
        }
    }
}

/// What the windows face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum ViewType {
    Street,
    Yard,
    Park,
    City,
    Water,
    Industrial,
    Unknown,
}

impl ViewType {
    pub const fn label(self) -> &'static str {
        match self {
            ViewType::Street => "улица",
            ViewType::Yard => "двор",
            ViewType::Park => "парк",
            ViewType::City => "город",
            ViewType::Water => "на воду",
            ViewType::Industrial => "промзона",
            ViewType::Unknown => "неизвестно",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match normalize_text(raw).as_str() {
            "улица" | "на улицу" | "street" => ViewType::Street,
            "двор" | "во двор" | "yard" => ViewType::Yard,
            "парк" | "на парк" | "park" => ViewType::Park,
            "город" | "панорама города" | "city" => ViewType::City,
            "на воду" | "вода" | "water" => ViewType::Water,
            "промзона" | "industrial" => ViewType::Industrial,
            _ => ViewType::Unknown,
        }
    }
}

/// Whether the listing shows real photos or renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum PhotoType {
    Real,
    Rendered,
    Missing,
    Unknown,
}

impl PhotoType {
    pub const fn label(self) -> &'static str {
        match self {
            PhotoType::Real => "реальные",
            PhotoType::Rendered => "рендеры",
            PhotoType::Missing => "нет",
            PhotoType::Unknown => "неизвестно",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match normalize_text(raw).as_str() {
            "реальные" | "фото" | "real" => PhotoType::Real,
            "рендеры" | "визуализация" | "rendered" => PhotoType::Rendered,
            "нет" | "без фото" | "missing" => PhotoType::Missing,
            _ => PhotoType::Unknown,
        }
    }
}

/// Construction state of the building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum ObjectStatus {
    Ready,
    UnderConstruction,
    Unknown,
}

impl ObjectStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ObjectStatus::Ready => "готов",
            ObjectStatus::UnderConstruction => "строится",
            ObjectStatus::Unknown => "неизвестно",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match normalize_text(raw).as_str() {
            "готов" | "сдан" | "ready" => ObjectStatus::Ready,
            "строится" | "в строительстве" | "under_construction" => {
                ObjectStatus::UnderConstruction
            }
            _ => ObjectStatus::Unknown,
        }
    }
}

macro_rules! impl_label_conversions {
    ($($kind:ident),* $(,)?) => {
        $(
            impl From<String> for $kind {
                fn from(value: String) -> Self {
                    Self::parse(&value)
                }
            }

            impl From<$kind> for &'static str {
                fn from(value: $kind) -> Self {
                    value.label()
                }
            }

            impl fmt::Display for $kind {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.label())
                }
            }
        )*
    };
}

impl_label_conversions!(
    RepairLevel,
    WindowType,
    ElevatorCount,
    ViewType,
    PhotoType,
    ObjectStatus,
);

/// Categorical fields share the notion of a value that carries no information.
pub trait Categorical: Copy + PartialEq + fmt::Display {
    fn is_unknown(self) -> bool;
}

macro_rules! impl_categorical {
    ($($kind:ident),* $(,)?) => {
        $(
            impl Categorical for $kind {
                fn is_unknown(self) -> bool {
                    self == $kind::Unknown
                }
            }
        )*
    };
}

impl_categorical!(
    RepairLevel,
    WindowType,
    ElevatorCount,
    ViewType,
    PhotoType,
    ObjectStatus,
);
