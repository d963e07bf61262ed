//! Cellular-automaton road engine
//!
//! The road is a fixed `lanes x cells` grid. Every tick runs, in order:
//!
//! 1. lane-change phase (only with a lane-changing strategy): collect every
//!    vehicle's decision on the unchanged grid, then apply LEFT changes on
//!    even ticks and RIGHT changes on odd ticks
//! 2. forward phase: decide all new speeds on the pre-move grid, then move
//!    vehicles front to back, handling exits and collisions
//! 3. generation phase: let each lane's generator add a vehicle at the entry
//!
//! A failure while handling one vehicle is logged and that vehicle is left
//! untouched for the tick; the other vehicles carry on.

use std::collections::{HashMap, HashSet};

use anyhow::{bail, ensure, Context, Result};
use log::{debug, error, warn};

use super::error::ConfigError;
use super::generator::CarGenerator;
use super::params::{ParamSet, ParamValue, RelationalKey, RoadKey};
use super::strategy::Strategies;
use super::types::{
    CollisionEvent, CollisionPolicy, Direction, LaneChange, Orientation, VehicleId,
    TICK_DURATION_SECS,
};
use super::vehicle::{Cell, Vehicle, VehicleSpec};

/// Whole cells per tick allowed by a speed limit in m/s, at least one
pub fn speed_limit_in_cells(speed_limit_mps: f64, cell_size: f64) -> usize {
    ((speed_limit_mps * TICK_DURATION_SECS / cell_size).floor() as usize).max(1)
}

/// Result of a neighbour search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proximity {
    Head { position: usize, vehicle: VehicleId },
    NoCarThere,
    NoLaneThere,
}

impl Proximity {
    pub fn position(&self) -> Option<usize> {
        match self {
            Proximity::Head { position, .. } => Some(*position),
            _ => None,
        }
    }

    pub fn as_param(&self) -> ParamValue {
        match self {
            Proximity::Head { position, .. } => ParamValue::Value(*position as f64),
            Proximity::NoCarThere => ParamValue::NoCarThere,
            Proximity::NoLaneThere => ParamValue::NoLaneThere,
        }
    }
}

/// What happened during one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    pub tick: u64,
    /// Vehicles whose whole body left the road
    pub departed: usize,
    pub generated: usize,
    /// Vehicles removed after being struck under [`CollisionPolicy::Allow`]
    pub wrecked: usize,
    pub lane_changes: usize,
    /// Vehicle updates skipped because a strategy failed
    pub skipped: usize,
    /// Arrivals dropped for lack of space at the entry or in the queue
    pub discarded: usize,
    pub collisions: Vec<CollisionEvent>,
    pub vehicles_on_road: usize,
}

/// A multi-lane CA road
#[derive(Debug)]
pub struct CaRoad {
    /// Indexed `[lane][position]`
    cells: Vec<Vec<Cell>>,
    vehicles: HashMap<VehicleId, Vehicle>,
    next_vehicle_id: usize,
    number_of_lanes: usize,
    number_of_cells: usize,
    cell_size: f64,
    speed_limit_cells: usize,
    collision_policy: CollisionPolicy,
    step_count: u64,
}

impl CaRoad {
    /// Build a road from physical dimensions.
    ///
    /// `numberOfCells = ceil(length / cell_size)`; the speed limit is
    /// converted to whole cells per tick, at least one.
    pub fn new(
        road_length_m: f64,
        number_of_lanes: usize,
        speed_limit_mps: f64,
        cell_size: f64,
    ) -> Result<Self, ConfigError> {
        if !(road_length_m.is_finite() && road_length_m > 0.0) {
            return Err(ConfigError::InvalidRoadLength(road_length_m));
        }
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(ConfigError::InvalidCellSize(cell_size));
        }
        if !(speed_limit_mps.is_finite() && speed_limit_mps > 0.0) {
            return Err(ConfigError::InvalidSpeedLimit(speed_limit_mps));
        }
        let number_of_cells = (road_length_m / cell_size).ceil() as usize;
        let speed_limit_cells = speed_limit_in_cells(speed_limit_mps, cell_size);
        Self::from_cells(number_of_lanes, number_of_cells, speed_limit_cells, cell_size)
    }

    /// Build a road directly in cell units
    pub fn from_cells(
        number_of_lanes: usize,
        number_of_cells: usize,
        speed_limit_cells: usize,
        cell_size: f64,
    ) -> Result<Self, ConfigError> {
        if number_of_lanes == 0 {
            return Err(ConfigError::NoLanes);
        }
        if number_of_cells == 0 {
            return Err(ConfigError::InvalidRoadLength(0.0));
        }
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(ConfigError::InvalidCellSize(cell_size));
        }
        if speed_limit_cells == 0 {
            return Err(ConfigError::InvalidSpeedLimit(0.0));
        }
        Ok(Self {
            cells: vec![vec![Cell::default(); number_of_cells]; number_of_lanes],
            vehicles: HashMap::new(),
            next_vehicle_id: 0,
            number_of_lanes,
            number_of_cells,
            cell_size,
            speed_limit_cells,
            collision_policy: CollisionPolicy::default(),
            step_count: 0,
        })
    }

    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }

    pub fn number_of_lanes(&self) -> usize {
        self.number_of_lanes
    }

    pub fn number_of_cells(&self) -> usize {
        self.number_of_cells
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn speed_limit_cells(&self) -> usize {
        self.speed_limit_cells
    }

    /// Change the speed limit; vehicles above the new limit are slowed to it
    pub fn set_speed_limit_cells(&mut self, speed_limit_cells: usize) {
        self.speed_limit_cells = speed_limit_cells.max(1);
        let limit = self.speed_limit_cells;
        for vehicle in self.vehicles.values_mut() {
            vehicle.current_speed = vehicle.current_speed.min(limit);
        }
    }

    pub fn collision_policy(&self) -> CollisionPolicy {
        self.collision_policy
    }

    pub fn set_collision_policy(&mut self, policy: CollisionPolicy) {
        self.collision_policy = policy;
    }

    /// Number of ticks completed so far
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn cell(&self, lane: usize, position: usize) -> Option<&Cell> {
        self.cells.get(lane).and_then(|l| l.get(position))
    }

    pub fn lane_cells(&self, lane: usize) -> Option<&[Cell]> {
        self.cells.get(lane).map(|l| l.as_slice())
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(&id)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// The vehicle covering a cell, head or body
    pub fn vehicle_at(&self, lane: usize, position: usize) -> Option<&Vehicle> {
        self.cell(lane, position)
            .and_then(|c| c.vehicle)
            .and_then(|id| self.vehicles.get(&id))
    }

    /// Set a vehicle's speed, clamped to the speed limit
    pub fn set_vehicle_speed(&mut self, id: VehicleId, speed: usize) -> bool {
        let limit = self.speed_limit_cells;
        match self.vehicles.get_mut(&id) {
            Some(vehicle) => {
                vehicle.current_speed = speed.min(limit);
                true
            }
            None => false,
        }
    }

    /// Remove every vehicle and reset the tick counter
    pub fn clear(&mut self) {
        for lane in &mut self.cells {
            lane.iter_mut().for_each(Cell::clear);
        }
        self.vehicles.clear();
        self.step_count = 0;
    }

    /// Create a vehicle record and place it with its head at `head_position`.
    /// Returns `None`, creating nothing, if the body does not fit.
    pub fn spawn(
        &mut self,
        spec: VehicleSpec,
        lane: usize,
        head_position: usize,
    ) -> Option<VehicleId> {
        let length = spec.length.max(1);
        if !self.span_is_free(lane, head_position, length, None) {
            warn!(
                "Cannot spawn vehicle of length {} at lane {}, position {}",
                length, lane, head_position
            );
            return None;
        }
        let id = VehicleId(self.next_vehicle_id);
        self.next_vehicle_id += 1;
        self.vehicles.insert(id, Vehicle::from_spec(id, spec));
        if self.place(id, head_position, lane) {
            Some(id)
        } else {
            self.vehicles.remove(&id);
            None
        }
    }

    /// Occupy `head - length + 1 ..= head` in `lane` with the vehicle.
    /// Logs and leaves the grid untouched if any cell is outside the grid
    /// or held by another vehicle.
    pub fn place(&mut self, id: VehicleId, head_position: usize, lane: usize) -> bool {
        let length = match self.vehicles.get(&id) {
            Some(vehicle) => vehicle.length,
            None => {
                warn!("Cannot place unknown vehicle {}", id);
                return false;
            }
        };
        if !self.in_bounds(lane, head_position, length) {
            warn!(
                "Placement of vehicle {} (length {}) at lane {}, position {} is out of bounds",
                id, length, lane, head_position
            );
            return false;
        }
        if !self.span_is_free(lane, head_position, length, Some(id)) {
            warn!(
                "Placement of vehicle {} at lane {}, position {} overlaps another vehicle",
                id, lane, head_position
            );
            return false;
        }

        let tail = head_position + 1 - length;
        for position in tail..=head_position {
            self.cells[lane][position].occupy(id, position == head_position);
        }
        if let Some(vehicle) = self.vehicles.get_mut(&id) {
            vehicle.lane = lane;
            vehicle.head_position = head_position;
        }
        true
    }

    /// Free every cell of the vehicle whose head is at `(lane, head_position)`.
    /// The record stays in the arena. No-op unless that cell is an occupied head.
    pub fn remove(&mut self, lane: usize, head_position: usize) -> Option<VehicleId> {
        let cell = match self.cell(lane, head_position) {
            Some(cell) => *cell,
            None => {
                warn!(
                    "Removal at lane {}, position {} is out of bounds",
                    lane, head_position
                );
                return None;
            }
        };
        if !(cell.occupied && cell.is_head) {
            return None;
        }
        let id = cell.vehicle?;
        let length = self.vehicles.get(&id).map_or(1, |v| v.length);
        let tail = (head_position + 1).saturating_sub(length);
        for position in tail..=head_position {
            let cell = &mut self.cells[lane][position];
            if cell.vehicle == Some(id) {
                cell.clear();
            }
        }
        Some(id)
    }

    /// Nearest vehicle head from `(lane, position)` in the given lane direction.
    ///
    /// In the own lane the search starts one cell ahead of (or behind) the
    /// position. In a neighbouring lane a forward search includes the
    /// position itself, so a vehicle level with the caller is found ahead.
    pub fn next_occupied_cell(
        &self,
        lane: usize,
        position: usize,
        direction: Direction,
        orientation: Orientation,
    ) -> Proximity {
        let target = match direction.target_lane(lane, self.number_of_lanes) {
            Some(target) => target,
            None => return Proximity::NoLaneThere,
        };
        let cells = &self.cells[target];
        let found = match orientation {
            Orientation::Forward => {
                let start = match direction {
                    Direction::Straight => position + 1,
                    _ => position,
                };
                (start..self.number_of_cells).find(|&p| cells[p].is_head)
            }
            Orientation::Backward => (0..position.min(self.number_of_cells))
                .rev()
                .find(|&p| cells[p].is_head),
        };
        match found.and_then(|p| cells[p].vehicle.map(|v| (p, v))) {
            Some((position, vehicle)) => Proximity::Head { position, vehicle },
            None => Proximity::NoCarThere,
        }
    }

    /// Resolve `keys` for the vehicle whose head is at `(lane, position)`.
    /// Returns the resolved set and the keys that matched no class.
    pub fn resolve_parameters(
        &self,
        lane: usize,
        position: usize,
        keys: &[String],
    ) -> (ParamSet, Vec<String>) {
        let mut params = ParamSet::new();
        let mut unresolved = Vec::new();
        let vehicle = match self.vehicle_at(lane, position) {
            Some(vehicle) => vehicle,
            None => return (params, keys.to_vec()),
        };

        for key in keys {
            match self.resolve_key(vehicle, key) {
                Some(value) => params.insert(key.clone(), value),
                None => unresolved.push(key.clone()),
            }
        }
        (params, unresolved)
    }

    fn resolve_key(&self, vehicle: &Vehicle, key: &str) -> Option<ParamValue> {
        if let Some(value) = vehicle.attribute(key) {
            return Some(ParamValue::Value(value));
        }
        if let Some(road_key) = RoadKey::parse(key) {
            return Some(ParamValue::Value(self.road_value(road_key)));
        }
        let relational = RelationalKey::parse(key)?;
        match self.next_occupied_cell(
            vehicle.lane,
            vehicle.head_position,
            relational.direction,
            relational.orientation,
        ) {
            Proximity::Head { vehicle: id, .. } => self
                .vehicles
                .get(&id)
                .and_then(|neighbor| neighbor.attribute(&relational.attribute))
                .map(ParamValue::Value),
            sentinel => Some(sentinel.as_param()),
        }
    }

    fn road_value(&self, key: RoadKey) -> f64 {
        match key {
            RoadKey::TimeStep => TICK_DURATION_SECS,
            RoadKey::SpeedLimit => self.speed_limit_cells as f64,
            RoadKey::CellSize => self.cell_size,
            RoadKey::NumberOfCells => self.number_of_cells as f64,
            RoadKey::NumberOfLanes => self.number_of_lanes as f64,
        }
    }

    /// Advance the road by one tick
    pub fn step(
        &mut self,
        strategies: &mut Strategies,
        generators: &mut [CarGenerator],
    ) -> StepReport {
        let mut report = StepReport {
            tick: self.step_count,
            ..StepReport::default()
        };

        let failed = if strategies.lane_changing.is_some() {
            self.lane_change_phase(strategies, &mut report)
        } else {
            HashSet::new()
        };
        self.forward_phase(strategies, &failed, &mut report);
        self.generation_phase(generators, &mut report);

        self.step_count += 1;
        report.vehicles_on_road = self.vehicles.len();
        report
    }

    /// Head positions in processing order: highest position first, and
    /// within a position the highest lane first
    fn heads_front_to_back(&self) -> Vec<(usize, usize, VehicleId)> {
        let mut heads = Vec::with_capacity(self.vehicles.len());
        for position in (0..self.number_of_cells).rev() {
            for lane in (0..self.number_of_lanes).rev() {
                let cell = &self.cells[lane][position];
                if let (true, Some(id)) = (cell.is_head, cell.vehicle) {
                    heads.push((lane, position, id));
                }
            }
        }
        heads
    }

    /// Returns the vehicles whose lane-changing decision failed; they sit
    /// out the rest of the tick
    fn lane_change_phase(
        &mut self,
        strategies: &mut Strategies,
        report: &mut StepReport,
    ) -> HashSet<VehicleId> {
        let mut failed = HashSet::new();
        let lane_changing = match strategies.lane_changing.as_mut() {
            Some(lc) => lc,
            None => return failed,
        };
        let keys = lane_changing.request_parameters();

        let mut changes: Vec<(LaneChange, VehicleId)> = Vec::new();
        for (lane, position, id) in self.heads_front_to_back() {
            let (params, unresolved) = self.resolve_parameters(lane, position, &keys);
            if !unresolved.is_empty() {
                warn!(
                    "Lane changing: could not resolve {:?} for vehicle {}",
                    unresolved, id
                );
            }
            match lane_changing.change_lane_if_desired(&params) {
                Ok(LaneChange::Straight) => {}
                Ok(change) => {
                    if change
                        .direction()
                        .target_lane(lane, self.number_of_lanes)
                        .is_some()
                    {
                        changes.push((change, id));
                    } else {
                        debug!("Vehicle {} asked for a lane that does not exist", id);
                    }
                }
                Err(e) => {
                    error!("Lane changing failed for vehicle {}: {}", id, e);
                    report.skipped += 1;
                    failed.insert(id);
                }
            }
        }

        let even_tick = self.step_count % 2 == 0;
        for (change, id) in changes {
            let allowed = match change {
                LaneChange::Left => even_tick,
                LaneChange::Right => !even_tick,
                LaneChange::Straight => false,
            };
            if !allowed {
                continue;
            }
            let (lane, head, length) = match self.vehicles.get(&id) {
                Some(v) => (v.lane, v.head_position, v.length),
                None => continue,
            };
            let target = match change.direction().target_lane(lane, self.number_of_lanes) {
                Some(target) => target,
                None => continue,
            };
            if !self.span_is_free(target, head, length, None) {
                debug!(
                    "Lane change of vehicle {} into lane {} blocked at position {}",
                    id, target, head
                );
                continue;
            }
            if self.relocate(id, target, head, length) {
                debug!("Vehicle {} changed from lane {} to lane {}", id, lane, target);
                report.lane_changes += 1;
            }
        }
        failed
    }

    fn forward_phase(
        &mut self,
        strategies: &mut Strategies,
        skip: &HashSet<VehicleId>,
        report: &mut StepReport,
    ) {
        let car_following = &mut strategies.car_following;
        let keys = car_following.request_parameters();

        let mut decisions: Vec<(VehicleId, usize)> = Vec::new();
        for (lane, position, id) in self.heads_front_to_back() {
            if skip.contains(&id) {
                continue;
            }
            let (params, unresolved) = self.resolve_parameters(lane, position, &keys);
            if !unresolved.is_empty() {
                warn!(
                    "Car following: could not resolve {:?} for vehicle {}",
                    unresolved, id
                );
            }
            match car_following.new_speed(&params) {
                Ok(speed) if speed.is_finite() => {
                    let speed = (speed.max(0.0).trunc() as usize).min(self.speed_limit_cells);
                    decisions.push((id, speed));
                }
                Ok(speed) => {
                    error!("Car following returned {} for vehicle {}", speed, id);
                    report.skipped += 1;
                }
                Err(e) => {
                    error!("Car following failed for vehicle {}: {}", id, e);
                    report.skipped += 1;
                }
            }
        }

        for (id, speed) in decisions {
            // A vehicle ahead may have wrecked this one already
            if self.vehicles.contains_key(&id) {
                self.advance(id, speed, report);
            }
        }
    }

    /// Move one vehicle `speed` cells forward, applying the collision policy
    /// and handling vehicles that reach the end of the road
    fn advance(&mut self, id: VehicleId, speed: usize, report: &mut StepReport) {
        let (lane, head, length) = match self.vehicles.get(&id) {
            Some(v) => (v.lane, v.head_position, v.length),
            None => return,
        };
        let last_cell = self.number_of_cells - 1;
        let mut speed = speed;

        let scan_end = (head + speed).min(last_cell);
        let mut position = head + 1;
        while position <= scan_end {
            let cell = self.cells[lane][position];
            match cell.vehicle.filter(|&other| cell.occupied && other != id) {
                None => {}
                Some(other) => match self.collision_policy {
                    CollisionPolicy::Prevent => {
                        speed = position - 1 - head;
                        break;
                    }
                    CollisionPolicy::Allow => {
                        report.collisions.push(CollisionEvent {
                            tick: self.step_count,
                            lane,
                            position,
                            striking: id,
                            struck: other,
                        });
                        self.wreck(other);
                        report.wrecked += 1;
                    }
                },
            }
            position += 1;
        }

        let target = head + speed;
        if target <= last_cell {
            if let Some(vehicle) = self.vehicles.get_mut(&id) {
                vehicle.current_speed = speed;
            }
            self.relocate(id, lane, target, length);
            return;
        }

        if target + 1 >= self.number_of_cells + length {
            self.remove(lane, head);
            self.vehicles.remove(&id);
            debug!("Vehicle {} left the road from lane {}", id, lane);
            report.departed += 1;
            return;
        }

        let overflow = target - last_cell;
        if let Some(vehicle) = self.vehicles.get_mut(&id) {
            vehicle.current_speed = speed;
        }
        debug!(
            "Vehicle {} is leaving the road, {} of {} cells remain",
            id,
            length - overflow,
            length
        );
        self.relocate(id, lane, last_cell, length - overflow);
    }

    /// Remove a struck vehicle from the road entirely
    fn wreck(&mut self, id: VehicleId) {
        if let Some((lane, head)) = self.vehicles.get(&id).map(|v| (v.lane, v.head_position)) {
            self.remove(lane, head);
            self.vehicles.remove(&id);
            warn!("Vehicle {} was wrecked at lane {}, position {}", id, lane, head);
        }
    }

    /// Clear the vehicle's cells and place it again with a new head and length.
    /// Restores the previous placement if the new one is rejected.
    fn relocate(&mut self, id: VehicleId, lane: usize, head: usize, length: usize) -> bool {
        let (old_lane, old_head, old_length) = match self.vehicles.get(&id) {
            Some(v) => (v.lane, v.head_position, v.length),
            None => return false,
        };
        self.remove(old_lane, old_head);
        if let Some(vehicle) = self.vehicles.get_mut(&id) {
            vehicle.length = length.max(1);
        }
        if self.place(id, head, lane) {
            return true;
        }
        if let Some(vehicle) = self.vehicles.get_mut(&id) {
            vehicle.length = old_length;
        }
        self.place(id, old_head, old_lane);
        false
    }

    fn generation_phase(&mut self, generators: &mut [CarGenerator], report: &mut StepReport) {
        for (lane, generator) in generators
            .iter_mut()
            .enumerate()
            .take(self.number_of_lanes)
        {
            let arrivals = generator.arrivals();

            if generator.is_queued() {
                report.discarded += generator.enqueue(arrivals);
                let fits = generator
                    .front()
                    .is_some_and(|spec| self.entry_is_free(lane, spec.length.max(1)));
                if fits {
                    if let Some(spec) = generator.pop_front() {
                        self.spawn_at_entry(spec, lane, report);
                    }
                }
                continue;
            }

            if arrivals == 0 {
                continue;
            }
            let spec = generator.sample_vehicle();
            if self.entry_is_free(lane, spec.length.max(1)) {
                self.spawn_at_entry(spec, lane, report);
                report.discarded += arrivals - 1;
            } else {
                debug!("Entry of lane {} is blocked, arrival discarded", lane);
                report.discarded += arrivals;
            }
        }
    }

    fn spawn_at_entry(&mut self, spec: VehicleSpec, lane: usize, report: &mut StepReport) {
        let head = spec.length.max(1) - 1;
        if let Some(id) = self.spawn(spec, lane, head) {
            debug!("Vehicle {} entered lane {}", id, lane);
            report.generated += 1;
        }
    }

    /// `length + 1` free cells from position 0, the extra one as a buffer
    pub fn entry_is_free(&self, lane: usize, length: usize) -> bool {
        length < self.number_of_cells && self.span_is_free(lane, length, length + 1, None)
    }

    fn in_bounds(&self, lane: usize, head: usize, length: usize) -> bool {
        lane < self.number_of_lanes
            && length >= 1
            && head < self.number_of_cells
            && head + 1 >= length
    }

    /// Whether `head - length + 1 ..= head` is inside the grid and free,
    /// treating cells held by `owner` as free
    fn span_is_free(
        &self,
        lane: usize,
        head: usize,
        length: usize,
        owner: Option<VehicleId>,
    ) -> bool {
        if !self.in_bounds(lane, head, length) {
            return false;
        }
        let tail = head + 1 - length;
        self.cells[lane][tail..=head]
            .iter()
            .all(|c| c.is_free() || (owner.is_some() && c.vehicle == owner))
    }

    /// Verify the occupancy invariants of the grid and the arena
    pub fn check_invariants(&self) -> Result<()> {
        let mut covered: HashMap<VehicleId, usize> = HashMap::new();
        for (lane, cells) in self.cells.iter().enumerate() {
            for (position, cell) in cells.iter().enumerate() {
                ensure!(
                    !cell.is_head || cell.occupied,
                    "head cell at lane {lane}, position {position} is not occupied"
                );
                ensure!(
                    cell.occupied == cell.vehicle.is_some(),
                    "cell at lane {lane}, position {position} disagrees about its vehicle"
                );
                if let Some(id) = cell.vehicle {
                    let vehicle = self.vehicles.get(&id).with_context(|| {
                        format!("cell at lane {lane}, position {position} points to missing vehicle {id}")
                    })?;
                    ensure!(
                        vehicle.lane == lane,
                        "vehicle {id} is in lane {} but covers lane {lane}",
                        vehicle.lane
                    );
                    ensure!(
                        cell.is_head == (position == vehicle.head_position),
                        "vehicle {id} has a misplaced head marker at position {position}"
                    );
                    *covered.entry(id).or_default() += 1;
                }
            }
        }

        for vehicle in self.vehicles.values() {
            let id = vehicle.id;
            let tail = match vehicle.tail_position() {
                Some(tail) => tail,
                None => bail!("vehicle {id} extends behind the start of the road"),
            };
            ensure!(vehicle.length >= 1, "vehicle {id} has zero length");
            ensure!(
                vehicle.current_speed <= self.speed_limit_cells,
                "vehicle {id} exceeds the speed limit"
            );
            for position in tail..=vehicle.head_position {
                let cell = self
                    .cell(vehicle.lane, position)
                    .with_context(|| format!("vehicle {id} extends beyond the road"))?;
                ensure!(
                    cell.vehicle == Some(id),
                    "vehicle {id} body is broken at position {position}"
                );
            }
            ensure!(
                covered.get(&id).copied().unwrap_or(0) == vehicle.length,
                "vehicle {id} covers a different number of cells than its length"
            );
        }
        Ok(())
    }

    /// One line per lane: `.` empty, `>` head, `=` body
    pub fn render(&self) -> Vec<String> {
        self.cells
            .iter()
            .map(|lane| {
                lane.iter()
                    .map(|cell| match (cell.occupied, cell.is_head) {
                        (false, _) => '.',
                        (true, true) => '>',
                        (true, false) => '=',
                    })
                    .collect()
            })
            .collect()
    }
}
