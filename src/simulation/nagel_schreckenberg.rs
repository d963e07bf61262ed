//! Nagel-Schreckenberg car-following
//!
//! Per tick: accelerate by one cell, never exceed the vehicle's or the
//! road's maximum, never close the gap to the leader, and dawdle by one
//! cell with the vehicle's slowdown probability.

use rand::{Rng, RngCore};

use super::error::StrategyError;
use super::params::{
    ParamSet, CURRENT_SPEED, MAX_SPEED, SLOWDOWN_PROBABILITY, SPEED_LIMIT, X_POSITION,
};
use super::strategy::{gap_ahead, gap_ahead_keys, CarFollowing, Gap};
use super::types::{Direction, DEFAULT_CELL_SIZE};

pub struct NagelSchreckenberg {
    rng: Box<dyn RngCore>,
}

impl NagelSchreckenberg {
    pub fn new(rng: Box<dyn RngCore>) -> Self {
        Self { rng }
    }
}

impl CarFollowing for NagelSchreckenberg {
    fn id(&self) -> &'static str {
        "nagel-schreckenberg"
    }

    fn request_parameters(&self) -> Vec<String> {
        let mut keys = vec![
            X_POSITION.to_string(),
            CURRENT_SPEED.to_string(),
            MAX_SPEED.to_string(),
            SLOWDOWN_PROBABILITY.to_string(),
            SPEED_LIMIT.to_string(),
        ];
        keys.extend(gap_ahead_keys(Direction::Straight));
        keys
    }

    fn new_speed(&mut self, params: &ParamSet) -> Result<f64, StrategyError> {
        let max_speed = params.value(MAX_SPEED)?.min(params.value(SPEED_LIMIT)?);
        let mut speed = (params.value(CURRENT_SPEED)? + 1.0).min(max_speed);

        match gap_ahead(params, Direction::Straight)? {
            Gap::Cells(gap) => speed = speed.min(gap.max(0) as f64),
            Gap::Unbounded | Gap::NoLane => {}
        }

        if speed > 0.0 && self.rng.random::<f64>() < params.value(SLOWDOWN_PROBABILITY)? {
            speed -= 1.0;
        }

        Ok(speed.max(0.0))
    }

    fn parameters_for_generation(&self) -> Vec<String> {
        vec![MAX_SPEED.to_string(), SLOWDOWN_PROBABILITY.to_string()]
    }

    fn cell_size(&self) -> Option<f64> {
        Some(DEFAULT_CELL_SIZE)
    }
}
