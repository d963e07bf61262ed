//! Cellular-automaton traffic simulation core
//!
//! The engine ([`CaRoad`]) advances a lanes x cells grid one tick at a time.
//! Car-following and lane-changing models plug in through the
//! parameter-request protocol in [`params`]; [`SimWorld`] wires a road, its
//! strategies and its per-lane generators together.

mod config;
mod error;
mod generator;
mod nagel_schreckenberg;
pub mod params;
mod road;
mod stats;
mod strategy;
mod symmetric_lane_change;
mod types;
mod vehicle;
mod world;

pub use config::{default_ranges, GeneratorConfig, SimConfig};
pub use error::{ConfigError, StrategyError};
pub use generator::{check_ranges, ArrivalMode, CarGenerator, ParamRange, ParamUnit, RoadKind};
pub use nagel_schreckenberg::NagelSchreckenberg;
pub use params::{merge_keys, relational_key, ParamSet, ParamValue, RelationalKey, RoadKey};
pub use road::{speed_limit_in_cells, CaRoad, Proximity, StepReport};
pub use stats::SimulationStats;
pub use strategy::{
    gap_ahead, gap_ahead_keys, gap_behind, gap_behind_keys, CarFollowing, CarFollowingModel, Gap,
    LaneChanging, LaneChangingModel, Strategies,
};
pub use symmetric_lane_change::SymmetricLaneChange;
pub use types::{
    CollisionEvent, CollisionPolicy, Direction, LaneChange, Orientation, VehicleId,
    DEFAULT_CELL_SIZE, TICK_DURATION_SECS,
};
pub use vehicle::{Cell, Color, Vehicle, VehicleSpec};
pub use world::SimWorld;
