//! Car generator: the stochastic arrival process and the attribute sampler
//!
//! Each lane owns one generator. The generator keeps two parameter sets:
//! the *communication* ranges as authored (meters, m/s) and the *real*
//! ranges used for sampling. The real set is always rebuilt from the
//! communication set, so calibrating for a cellular road twice never
//! shrinks the ranges twice.

use std::collections::VecDeque;

use log::debug;
use rand::{Rng, RngCore};
use rand_distr::{Distribution, Poisson};

use super::error::ConfigError;
use super::params::LENGTH;
use super::types::TICK_DURATION_SECS;
use super::vehicle::{Color, VehicleSpec};

/// Arrivals counted one inter-arrival gap at a time before the rest of the
/// tick is drawn in one go
const EXACT_ARRIVAL_LIMIT: usize = 64;

/// Physical unit of a parameter range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamUnit {
    Meters,
    MetersPerSecond,
    Dimensionless,
    /// Integer cell units, produced by cellular calibration
    Cells,
}

/// Sampling range for one generated attribute
#[derive(Debug, Clone, PartialEq)]
pub struct ParamRange {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub unit: ParamUnit,
}

impl ParamRange {
    pub fn new(name: impl Into<String>, min: f64, max: f64, unit: ParamUnit) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            unit,
        }
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ConfigError::InvalidRange {
                name: self.name.clone(),
                min: self.min,
                max: self.max,
            })
        }
    }

    /// Express a distance or speed range in whole cells (rounded up)
    pub fn to_cells(&self, cell_size: f64) -> ParamRange {
        let factor = match self.unit {
            ParamUnit::Meters => 1.0 / cell_size,
            ParamUnit::MetersPerSecond => TICK_DURATION_SECS / cell_size,
            ParamUnit::Dimensionless | ParamUnit::Cells => return self.clone(),
        };
        ParamRange {
            name: self.name.clone(),
            min: (self.min * factor).ceil(),
            max: (self.max * factor).ceil(),
            unit: ParamUnit::Cells,
        }
    }
}

/// How arrivals are drawn each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrivalMode {
    /// At most one arrival per tick, with probability `1 - e^(-λ)`
    #[default]
    Single,
    /// Exponential inter-arrival times; several arrivals per tick are possible
    Multi,
}

/// The kind of road a generator feeds
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoadKind {
    Continuous,
    Cellular { cell_size: f64 },
}

#[derive(Debug)]
struct ArrivalQueue {
    capacity: usize,
    waiting: VecDeque<VehicleSpec>,
}

/// Per-lane vehicle source
pub struct CarGenerator {
    mode: ArrivalMode,
    /// λ, arrivals per second
    flow_rate: f64,
    /// Seconds until the next arrival (multi-arrival mode)
    time_to_next: f64,
    queue: Option<ArrivalQueue>,
    communication: Vec<ParamRange>,
    real: Vec<ParamRange>,
    /// Cell size the real set was last calibrated for
    calibrated_cell_size: Option<f64>,
    rng: Box<dyn RngCore>,
}

impl std::fmt::Debug for CarGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CarGenerator")
            .field("mode", &self.mode)
            .field("flow_rate", &self.flow_rate)
            .field("time_to_next", &self.time_to_next)
            .field("queue", &self.queue)
            .field("real", &self.real)
            .field("calibrated_cell_size", &self.calibrated_cell_size)
            .finish_non_exhaustive()
    }
}

impl CarGenerator {
    pub fn new(
        mode: ArrivalMode,
        flow_rate: f64,
        ranges: Vec<ParamRange>,
        rng: Box<dyn RngCore>,
    ) -> Result<Self, ConfigError> {
        validate_flow_rate(flow_rate)?;
        let mut generator = Self {
            mode,
            flow_rate,
            time_to_next: 0.0,
            queue: None,
            real: ranges.clone(),
            communication: ranges,
            calibrated_cell_size: None,
            rng,
        };
        generator.time_to_next = generator.sample_inter_arrival();
        Ok(generator)
    }

    /// Buffer arrivals in a queue whose capacity is drawn from `[min, max]`
    pub fn with_queue(mut self, min: usize, max: usize) -> Result<Self, ConfigError> {
        if min > max {
            return Err(ConfigError::InvalidQueueRange { min, max });
        }
        let capacity = self.rng.random_range(min..=max);
        self.queue = Some(ArrivalQueue {
            capacity,
            waiting: VecDeque::with_capacity(capacity),
        });
        Ok(self)
    }

    pub fn mode(&self) -> ArrivalMode {
        self.mode
    }

    pub fn flow_rate(&self) -> f64 {
        self.flow_rate
    }

    pub fn set_flow_rate(&mut self, flow_rate: f64) -> Result<(), ConfigError> {
        validate_flow_rate(flow_rate)?;
        self.flow_rate = flow_rate;
        self.time_to_next = self.sample_inter_arrival();
        Ok(())
    }

    pub fn set_mode(&mut self, mode: ArrivalMode) {
        if self.mode != mode {
            self.mode = mode;
            self.time_to_next = self.sample_inter_arrival();
        }
    }

    pub fn communication_ranges(&self) -> &[ParamRange] {
        &self.communication
    }

    pub fn real_ranges(&self) -> &[ParamRange] {
        &self.real
    }

    /// Replace the authored ranges, keeping the current calibration
    pub fn set_ranges(&mut self, ranges: Vec<ParamRange>) {
        self.communication = ranges;
        match self.calibrated_cell_size {
            Some(cell_size) => {
                self.calibrated_cell_size = None;
                self.calibrate(RoadKind::Cellular { cell_size });
            }
            None => self.real = self.communication.clone(),
        }
    }

    pub fn is_cellular_calibrated(&self) -> bool {
        self.calibrated_cell_size.is_some()
    }

    /// Copy the communication ranges into the real set for the attached road
    pub fn calibrate(&mut self, road: RoadKind) {
        match road {
            RoadKind::Continuous => {
                self.real = self.communication.clone();
                self.calibrated_cell_size = None;
            }
            RoadKind::Cellular { cell_size } => {
                if self.calibrated_cell_size == Some(cell_size) {
                    debug!("Generator already calibrated for {} m cells", cell_size);
                    return;
                }
                self.real = self
                    .communication
                    .iter()
                    .map(|r| r.to_cells(cell_size))
                    .collect();
                self.calibrated_cell_size = Some(cell_size);
            }
        }
    }

    /// Fails unless every required key has a valid range
    pub fn check_legitimate(&self, required: &[String]) -> Result<(), ConfigError> {
        check_ranges(&self.real, required)
    }

    pub fn is_legitimate(&self, required: &[String]) -> bool {
        self.check_legitimate(required).is_ok()
    }

    /// Number of vehicles arriving during this tick
    pub fn arrivals(&mut self) -> usize {
        match self.mode {
            ArrivalMode::Single => {
                let probability = 1.0 - (-self.flow_rate).exp();
                usize::from(self.rng.random::<f64>() < probability)
            }
            ArrivalMode::Multi => {
                let mut count = 0;
                self.time_to_next -= TICK_DURATION_SECS;
                while self.time_to_next <= 0.0 {
                    count += 1;
                    if count == EXACT_ARRIVAL_LIMIT {
                        // Arrivals are memoryless: the overshoot left holds a
                        // Poisson count and the next gap starts afresh
                        let overshoot = -self.time_to_next;
                        count += self.poisson_count(self.flow_rate * overshoot);
                        self.time_to_next = self.sample_inter_arrival();
                        break;
                    }
                    self.time_to_next += self.sample_inter_arrival();
                }
                count
            }
        }
    }

    fn poisson_count(&mut self, mean: f64) -> usize {
        match Poisson::new(mean) {
            Ok(poisson) => poisson.sample(&mut self.rng) as usize,
            // Zero, or too large to sample: the mean stands in for the count
            Err(_) => mean as usize,
        }
    }

    /// Draw one vehicle's length and attributes from the real ranges
    pub fn sample_vehicle(&mut self) -> VehicleSpec {
        let mut length = 1;
        let mut spec = VehicleSpec::new(1);
        for i in 0..self.real.len() {
            let value = sample_range(&self.real[i], &mut self.rng);
            let name = &self.real[i].name;
            if name == LENGTH {
                length = value.max(1.0) as usize;
            } else {
                spec.attributes.insert(name.clone(), value);
            }
        }
        spec.length = length;
        spec.color = Color {
            r: self.rng.random(),
            g: self.rng.random(),
            b: self.rng.random(),
        };
        spec
    }

    pub fn is_queued(&self) -> bool {
        self.queue.is_some()
    }

    pub fn queue_capacity(&self) -> Option<usize> {
        self.queue.as_ref().map(|q| q.capacity)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.as_ref().map_or(0, |q| q.waiting.len())
    }

    /// Sample and buffer `count` arrivals; returns how many did not fit
    pub fn enqueue(&mut self, count: usize) -> usize {
        let free = match &self.queue {
            Some(q) => q.capacity.saturating_sub(q.waiting.len()),
            None => return count,
        };
        let accepted = count.min(free);
        let specs: Vec<VehicleSpec> = (0..accepted).map(|_| self.sample_vehicle()).collect();
        if let Some(q) = &mut self.queue {
            q.waiting.extend(specs);
        }
        count - accepted
    }

    pub fn front(&self) -> Option<&VehicleSpec> {
        self.queue.as_ref().and_then(|q| q.waiting.front())
    }

    pub fn pop_front(&mut self) -> Option<VehicleSpec> {
        self.queue.as_mut().and_then(|q| q.waiting.pop_front())
    }

    /// Empty the queue and resample its capacity
    pub fn reset_queue(&mut self, min: usize, max: usize) -> Result<(), ConfigError> {
        if min > max {
            return Err(ConfigError::InvalidQueueRange { min, max });
        }
        let capacity = self.rng.random_range(min..=max);
        self.queue = Some(ArrivalQueue {
            capacity,
            waiting: VecDeque::with_capacity(capacity),
        });
        Ok(())
    }

    pub fn disable_queue(&mut self) {
        self.queue = None;
    }

    fn sample_inter_arrival(&mut self) -> f64 {
        if self.flow_rate <= 0.0 {
            return f64::INFINITY;
        }
        // 1 - U lies in (0, 1], keeping ln finite
        let u = 1.0 - self.rng.random::<f64>();
        -u.ln() / self.flow_rate
    }
}

/// Fails unless every required key has a valid range in `ranges`
pub fn check_ranges(ranges: &[ParamRange], required: &[String]) -> Result<(), ConfigError> {
    for key in required {
        let range = ranges
            .iter()
            .find(|r| &r.name == key)
            .ok_or_else(|| ConfigError::MissingGeneratorParameter(key.clone()))?;
        range.validate()?;
    }
    Ok(())
}

fn validate_flow_rate(flow_rate: f64) -> Result<(), ConfigError> {
    if flow_rate.is_finite() && flow_rate >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidFlowRate(flow_rate))
    }
}

fn sample_range<R: Rng>(range: &ParamRange, rng: &mut R) -> f64 {
    match range.unit {
        ParamUnit::Cells => {
            let span = range.range().max(0.0).round() as u64;
            range.min + rng.random_range(0..=span) as f64
        }
        _ => range.min + rng.random::<f64>() * range.range(),
    }
}
