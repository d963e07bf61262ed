//! Simulation configuration
//!
//! Plain data built by the CLI (or a caller) and validated before a
//! [`super::SimWorld`] is created from it.

use super::error::ConfigError;
use super::generator::{ArrivalMode, ParamRange, ParamUnit};
use super::params::{LENGTH, MAX_SPEED, SLOWDOWN_PROBABILITY};
use super::strategy::{CarFollowingModel, LaneChangingModel};
use super::types::{CollisionPolicy, DEFAULT_CELL_SIZE};

/// Settings shared by every lane's generator
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub mode: ArrivalMode,
    /// λ, vehicles per second per lane
    pub flow_rate: f64,
    /// Queue size range; `None` places arrivals directly on the road
    pub queue: Option<(usize, usize)>,
    /// Authored ranges in physical units
    pub ranges: Vec<ParamRange>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            mode: ArrivalMode::Single,
            flow_rate: 0.3,
            queue: None,
            ranges: default_ranges(),
        }
    }
}

/// Passenger cars: one 7.5 m cell long, 81 to 135 km/h
pub fn default_ranges() -> Vec<ParamRange> {
    vec![
        ParamRange::new(LENGTH, 7.5, 7.5, ParamUnit::Meters),
        ParamRange::new(MAX_SPEED, 22.5, 37.5, ParamUnit::MetersPerSecond),
        ParamRange::new(SLOWDOWN_PROBABILITY, 0.1, 0.3, ParamUnit::Dimensionless),
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub road_length_m: f64,
    pub lanes: usize,
    /// Meters per second
    pub speed_limit_mps: f64,
    /// Meters per cell
    pub cell_size: f64,
    pub lane_changing: bool,
    pub collision_policy: CollisionPolicy,
    pub car_following: CarFollowingModel,
    pub lane_changing_model: LaneChangingModel,
    pub generator: GeneratorConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            road_length_m: 750.0,
            lanes: 3,
            speed_limit_mps: 37.5,
            cell_size: DEFAULT_CELL_SIZE,
            lane_changing: false,
            collision_policy: CollisionPolicy::Prevent,
            car_following: CarFollowingModel::default(),
            lane_changing_model: LaneChangingModel::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.road_length_m.is_finite() && self.road_length_m > 0.0) {
            return Err(ConfigError::InvalidRoadLength(self.road_length_m));
        }
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(ConfigError::InvalidCellSize(self.cell_size));
        }
        if self.lanes == 0 {
            return Err(ConfigError::NoLanes);
        }
        if !(self.speed_limit_mps.is_finite() && self.speed_limit_mps > 0.0) {
            return Err(ConfigError::InvalidSpeedLimit(self.speed_limit_mps));
        }
        let flow_rate = self.generator.flow_rate;
        if !(flow_rate.is_finite() && flow_rate >= 0.0) {
            return Err(ConfigError::InvalidFlowRate(flow_rate));
        }
        if let Some((min, max)) = self.generator.queue {
            if min > max {
                return Err(ConfigError::InvalidQueueRange { min, max });
            }
        }
        for range in &self.generator.ranges {
            range.validate()?;
        }
        Ok(())
    }

    pub fn number_of_cells(&self) -> usize {
        (self.road_length_m / self.cell_size).ceil() as usize
    }

    /// Whether two configurations describe the same grid
    pub fn same_geometry(&self, other: &SimConfig) -> bool {
        self.lanes == other.lanes
            && self.number_of_cells() == other.number_of_cells()
            && self.cell_size == other.cell_size
    }
}
