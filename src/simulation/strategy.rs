//! Strategy contracts for car-following and lane-changing models
//!
//! The engine never knows a model's formula. It asks the model which keys
//! it needs, resolves them (see [`super::params`]) and hands the resulting
//! [`ParamSet`] back. Models are chosen once by id when the simulation is
//! configured.

use rand::RngCore;

use super::error::{ConfigError, StrategyError};
use super::nagel_schreckenberg::NagelSchreckenberg;
use super::params::{merge_keys, relational_key, ParamSet, ParamValue, LENGTH, X_POSITION};
use super::symmetric_lane_change::SymmetricLaneChange;
use super::types::{Direction, LaneChange, Orientation};

/// Longitudinal model: decides each vehicle's speed for the next tick
pub trait CarFollowing {
    fn id(&self) -> &'static str;

    /// Keys the engine must resolve before calling [`CarFollowing::new_speed`]
    fn request_parameters(&self) -> Vec<String>;

    /// New speed in cells per tick. Fractional values are truncated by the engine.
    fn new_speed(&mut self, params: &ParamSet) -> Result<f64, StrategyError>;

    /// Attributes the generator must sample for every vehicle
    fn parameters_for_generation(&self) -> Vec<String>;

    /// Cell size the model was calibrated for; `None` for continuous models
    fn cell_size(&self) -> Option<f64>;
}

/// Lateral model: decides whether a vehicle switches lane this tick
pub trait LaneChanging {
    fn id(&self) -> &'static str;

    fn request_parameters(&self) -> Vec<String>;

    fn change_lane_if_desired(&mut self, params: &ParamSet) -> Result<LaneChange, StrategyError>;

    fn parameters_for_generation(&self) -> Vec<String>;
}

/// Car-following models known to the simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CarFollowingModel {
    #[default]
    NagelSchreckenberg,
}

impl CarFollowingModel {
    pub fn from_id(id: &str) -> Result<Self, ConfigError> {
        match id {
            "nagel-schreckenberg" | "nasch" => Ok(CarFollowingModel::NagelSchreckenberg),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            CarFollowingModel::NagelSchreckenberg => "nagel-schreckenberg",
        }
    }

    pub fn build(&self, rng: Box<dyn RngCore>) -> Box<dyn CarFollowing> {
        match self {
            CarFollowingModel::NagelSchreckenberg => Box::new(NagelSchreckenberg::new(rng)),
        }
    }
}

/// Lane-changing models known to the simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaneChangingModel {
    #[default]
    Symmetric,
}

impl LaneChangingModel {
    pub fn from_id(id: &str) -> Result<Self, ConfigError> {
        match id {
            "symmetric" | "stca" => Ok(LaneChangingModel::Symmetric),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            LaneChangingModel::Symmetric => "symmetric",
        }
    }

    pub fn build(&self) -> Box<dyn LaneChanging> {
        match self {
            LaneChangingModel::Symmetric => Box::new(SymmetricLaneChange::new()),
        }
    }
}

/// The active strategies for one simulation
pub struct Strategies {
    pub car_following: Box<dyn CarFollowing>,
    /// `None` disables the lane-change phase
    pub lane_changing: Option<Box<dyn LaneChanging>>,
}

impl Strategies {
    pub fn new(car_following: Box<dyn CarFollowing>) -> Self {
        Self {
            car_following,
            lane_changing: None,
        }
    }

    pub fn with_lane_changing(mut self, lane_changing: Box<dyn LaneChanging>) -> Self {
        self.lane_changing = Some(lane_changing);
        self
    }

    /// Every attribute a generator must provide: the vehicle length plus
    /// whatever the active models declare
    pub fn generation_keys(&self) -> Vec<String> {
        let base = vec![LENGTH.to_string()];
        let following = self.car_following.parameters_for_generation();
        let changing = self
            .lane_changing
            .as_ref()
            .map(|lc| lc.parameters_for_generation())
            .unwrap_or_default();
        merge_keys([base.as_slice(), following.as_slice(), changing.as_slice()])
    }
}

impl std::fmt::Debug for Strategies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategies")
            .field("car_following", &self.car_following.id())
            .field("lane_changing", &self.lane_changing.as_ref().map(|lc| lc.id()))
            .finish()
    }
}

/// Free cells between a vehicle and a neighbour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gap {
    /// May be negative when the neighbour overlaps the vehicle's span
    Cells(i64),
    /// No vehicle in that direction
    Unbounded,
    /// The lane does not exist
    NoLane,
}

impl Gap {
    /// Gap as a number, with an open road reported as `open_road`
    pub fn or_open(self, open_road: i64) -> Option<i64> {
        match self {
            Gap::Cells(c) => Some(c),
            Gap::Unbounded => Some(open_road),
            Gap::NoLane => None,
        }
    }
}

/// Keys needed by [`gap_ahead`] for one direction
pub fn gap_ahead_keys(direction: Direction) -> Vec<String> {
    vec![
        relational_key(X_POSITION, direction, Orientation::Forward),
        relational_key(LENGTH, direction, Orientation::Forward),
    ]
}

/// Keys needed by [`gap_behind`] for one direction
pub fn gap_behind_keys(direction: Direction) -> Vec<String> {
    vec![relational_key(X_POSITION, direction, Orientation::Backward)]
}

/// Free cells between the vehicle's head and the tail of the next vehicle ahead
pub fn gap_ahead(params: &ParamSet, direction: Direction) -> Result<Gap, StrategyError> {
    let head_key = relational_key(X_POSITION, direction, Orientation::Forward);
    match params.get(&head_key)? {
        ParamValue::NoLaneThere => Ok(Gap::NoLane),
        ParamValue::NoCarThere => Ok(Gap::Unbounded),
        ParamValue::Value(leader_head) => {
            let leader_length =
                params.value(&relational_key(LENGTH, direction, Orientation::Forward))?;
            let own_head = params.value(X_POSITION)?;
            Ok(Gap::Cells((leader_head - leader_length - own_head) as i64))
        }
    }
}

/// Free cells between the vehicle's tail and the head of the next vehicle behind
pub fn gap_behind(params: &ParamSet, direction: Direction) -> Result<Gap, StrategyError> {
    let head_key = relational_key(X_POSITION, direction, Orientation::Backward);
    match params.get(&head_key)? {
        ParamValue::NoLaneThere => Ok(Gap::NoLane),
        ParamValue::NoCarThere => Ok(Gap::Unbounded),
        ParamValue::Value(follower_head) => {
            let own_head = params.value(X_POSITION)?;
            let own_length = params.value(LENGTH)?;
            Ok(Gap::Cells((own_head - own_length - follower_head) as i64))
        }
    }
}
