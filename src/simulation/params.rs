//! Parameter-request protocol shared by the engine and the strategies
//!
//! A strategy names the quantities it needs as string keys. The engine
//! resolves each key for one vehicle into a [`ParamValue`]. Keys fall into
//! three classes, tried in order:
//!
//! 1. intrinsic: read from the vehicle itself (`xPosition`, `currentSpeed`,
//!    `length`, `lane`, or any attribute the vehicle was generated with)
//! 2. road: a road-wide quantity such as `speedLimit` or `timeStep`
//! 3. relational: `<attribute>#<direction>#<orientation>`, read from the
//!    nearest vehicle head in that lane and direction

use std::collections::{HashMap, HashSet};
use std::fmt;

use super::error::StrategyError;
use super::types::{Direction, Orientation};

pub const X_POSITION: &str = "xPosition";
pub const CURRENT_SPEED: &str = "currentSpeed";
pub const LENGTH: &str = "length";
pub const LANE: &str = "lane";

pub const MAX_SPEED: &str = "maxSpeed";
pub const SLOWDOWN_PROBABILITY: &str = "slowdownProbability";

pub const TIME_STEP: &str = "timeStep";
pub const SPEED_LIMIT: &str = "speedLimit";
pub const CELL_SIZE: &str = "cellSize";
pub const NUMBER_OF_CELLS: &str = "numberOfCells";
pub const NUMBER_OF_LANES: &str = "numberOfLanes";

const RELATIONAL_SEPARATOR: char = '#';

/// A resolved parameter.
///
/// Sentinels are distinct variants so that a strategy has to branch on them
/// before doing arithmetic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Value(f64),
    /// The lane exists but no vehicle head was found in the searched direction
    NoCarThere,
    /// The requested lane does not exist
    NoLaneThere,
}

impl ParamValue {
    pub fn as_value(&self) -> Option<f64> {
        match self {
            ParamValue::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        !matches!(self, ParamValue::Value(_))
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Value(v) => write!(f, "{}", v),
            ParamValue::NoCarThere => f.write_str("NO_CAR_THERE"),
            ParamValue::NoLaneThere => f.write_str("NO_LANE_THERE"),
        }
    }
}

/// Road- or simulation-wide quantities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoadKey {
    TimeStep,
    SpeedLimit,
    CellSize,
    NumberOfCells,
    NumberOfLanes,
}

impl RoadKey {
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            TIME_STEP => Some(RoadKey::TimeStep),
            SPEED_LIMIT => Some(RoadKey::SpeedLimit),
            CELL_SIZE => Some(RoadKey::CellSize),
            NUMBER_OF_CELLS => Some(RoadKey::NumberOfCells),
            NUMBER_OF_LANES => Some(RoadKey::NumberOfLanes),
            _ => None,
        }
    }
}

/// A key of the form `<attribute>#<direction>#<orientation>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationalKey {
    pub attribute: String,
    pub direction: Direction,
    pub orientation: Orientation,
}

impl RelationalKey {
    pub fn parse(key: &str) -> Option<Self> {
        let mut parts = key.split(RELATIONAL_SEPARATOR);
        let attribute = parts.next().filter(|a| !a.is_empty())?;
        let direction = Direction::parse(parts.next()?)?;
        let orientation = Orientation::parse(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            attribute: attribute.to_string(),
            direction,
            orientation,
        })
    }
}

/// Build a relational key, e.g. `xPosition#STRAIGHT#FORWARD`
pub fn relational_key(attribute: &str, direction: Direction, orientation: Orientation) -> String {
    format!(
        "{attribute}{sep}{}{sep}{}",
        direction.as_str(),
        orientation.as_str(),
        sep = RELATIONAL_SEPARATOR
    )
}

/// Ordered union of key lists: first occurrence wins, duplicates dropped
pub fn merge_keys<'a, I>(lists: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a [String]>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for list in lists {
        for key in list {
            if seen.insert(key.as_str()) {
                merged.push(key.clone());
            }
        }
    }
    merged
}

/// Resolved parameters handed to a strategy for one vehicle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSet {
    values: HashMap<String, ParamValue>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ParamValue) {
        self.values.insert(key.into(), value);
    }

    /// Builder-style insert of a plain number
    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.insert(key, ParamValue::Value(value));
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Look up a key that may hold a sentinel
    pub fn get(&self, key: &str) -> Result<ParamValue, StrategyError> {
        self.values
            .get(key)
            .copied()
            .ok_or_else(|| StrategyError::MissingParameter(key.to_string()))
    }

    /// Look up a key that must hold a number
    pub fn value(&self, key: &str) -> Result<f64, StrategyError> {
        match self.get(key)? {
            ParamValue::Value(v) => Ok(v),
            ParamValue::NoCarThere => Err(StrategyError::Sentinel {
                key: key.to_string(),
                value: "NO_CAR_THERE",
            }),
            ParamValue::NoLaneThere => Err(StrategyError::Sentinel {
                key: key.to_string(),
                value: "NO_LANE_THERE",
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
