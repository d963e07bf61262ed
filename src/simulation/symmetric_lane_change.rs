//! Symmetric two-lane CA lane changing
//!
//! A vehicle changes lane when it is held up in its own lane, the
//! neighbouring lane offers more room ahead, and a follower there cannot
//! reach its tail within one tick. The left lane is tried first.

use super::error::StrategyError;
use super::params::{ParamSet, CURRENT_SPEED, LENGTH, MAX_SPEED, SPEED_LIMIT, X_POSITION};
use super::strategy::{gap_ahead, gap_ahead_keys, gap_behind, gap_behind_keys, Gap, LaneChanging};
use super::types::{Direction, LaneChange};

#[derive(Debug, Default)]
pub struct SymmetricLaneChange;

impl SymmetricLaneChange {
    pub fn new() -> Self {
        Self
    }

    fn is_safe_and_better(
        params: &ParamSet,
        direction: Direction,
        gap_here: i64,
        look_back: i64,
    ) -> Result<bool, StrategyError> {
        let ahead = match gap_ahead(params, direction)?.or_open(i64::MAX) {
            Some(ahead) => ahead,
            None => return Ok(false),
        };
        if ahead < 0 || ahead <= gap_here {
            return Ok(false);
        }
        Ok(match gap_behind(params, direction)? {
            Gap::Cells(behind) => behind >= look_back,
            Gap::Unbounded => true,
            Gap::NoLane => false,
        })
    }
}

impl LaneChanging for SymmetricLaneChange {
    fn id(&self) -> &'static str {
        "symmetric"
    }

    fn request_parameters(&self) -> Vec<String> {
        let mut keys = vec![
            X_POSITION.to_string(),
            CURRENT_SPEED.to_string(),
            LENGTH.to_string(),
            MAX_SPEED.to_string(),
            SPEED_LIMIT.to_string(),
        ];
        for direction in Direction::ALL {
            keys.extend(gap_ahead_keys(direction));
        }
        keys.extend(gap_behind_keys(Direction::Left));
        keys.extend(gap_behind_keys(Direction::Right));
        keys
    }

    fn change_lane_if_desired(&mut self, params: &ParamSet) -> Result<LaneChange, StrategyError> {
        let limit = params.value(SPEED_LIMIT)?;
        let desired = (params.value(CURRENT_SPEED)? + 1.0).min(params.value(MAX_SPEED)?.min(limit));
        let look_back = limit as i64;

        let gap_here = gap_ahead(params, Direction::Straight)?
            .or_open(i64::MAX)
            .unwrap_or(i64::MAX);
        if gap_here as f64 >= desired {
            return Ok(LaneChange::Straight);
        }

        if Self::is_safe_and_better(params, Direction::Left, gap_here, look_back)? {
            return Ok(LaneChange::Left);
        }
        if Self::is_safe_and_better(params, Direction::Right, gap_here, look_back)? {
            return Ok(LaneChange::Right);
        }
        Ok(LaneChange::Straight)
    }

    fn parameters_for_generation(&self) -> Vec<String> {
        vec![MAX_SPEED.to_string()]
    }
}
