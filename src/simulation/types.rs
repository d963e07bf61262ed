//! Core types for the traffic simulation

use std::fmt;

/// A unique identifier for a vehicle record.
/// Assigned when the record is created and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VehicleId(pub usize);

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lateral direction relative to the current lane.
///
/// `Left` is the neighbouring lane with the lower index, `Right` the one
/// with the higher index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Straight,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 3] = [Direction::Straight, Direction::Left, Direction::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Straight => "STRAIGHT",
            Direction::Left => "LEFT",
            Direction::Right => "RIGHT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "STRAIGHT" => Some(Direction::Straight),
            "LEFT" => Some(Direction::Left),
            "RIGHT" => Some(Direction::Right),
            _ => None,
        }
    }

    /// The lane reached by moving in this direction, if it exists
    pub fn target_lane(&self, lane: usize, number_of_lanes: usize) -> Option<usize> {
        let target = match self {
            Direction::Straight => Some(lane),
            Direction::Left => lane.checked_sub(1),
            Direction::Right => Some(lane + 1),
        }?;
        (target < number_of_lanes).then_some(target)
    }
}

/// Longitudinal orientation of a neighbour search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Forward,
    Backward,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Forward => "FORWARD",
            Orientation::Backward => "BACKWARD",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "FORWARD" => Some(Orientation::Forward),
            "BACKWARD" => Some(Orientation::Backward),
            _ => None,
        }
    }
}

/// Decision returned by a lane-changing strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneChange {
    Left,
    Right,
    Straight,
}

impl LaneChange {
    pub fn direction(&self) -> Direction {
        match self {
            LaneChange::Left => Direction::Left,
            LaneChange::Right => Direction::Right,
            LaneChange::Straight => Direction::Straight,
        }
    }
}

/// What happens when a vehicle's move would run into an occupied cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionPolicy {
    /// Clamp the move to stop one cell short of the obstruction
    #[default]
    Prevent,
    /// Record a collision event and complete the move; the struck vehicle is wrecked
    Allow,
}

/// A collision recorded under [`CollisionPolicy::Allow`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollisionEvent {
    pub tick: u64,
    pub lane: usize,
    pub position: usize,
    pub striking: VehicleId,
    pub struck: VehicleId,
}

/// Duration of one tick in seconds
pub const TICK_DURATION_SECS: f64 = 1.0;

/// Cell size used by the classic CA models, in meters
pub const DEFAULT_CELL_SIZE: f64 = 7.5;
