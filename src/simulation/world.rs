//! Simulation context that ties the road, strategies and generators together
//!
//! There is no global state: the world owns every collaborator the engine
//! needs, including the random number source each of them draws from.

use anyhow::{Context, Result};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use super::config::SimConfig;
use super::error::ConfigError;
use super::generator::{check_ranges, CarGenerator, ParamRange, RoadKind};
use super::road::{speed_limit_in_cells, CaRoad, StepReport};
use super::stats::SimulationStats;
use super::strategy::Strategies;

/// The main simulation world
#[derive(Debug)]
pub struct SimWorld {
    pub road: CaRoad,
    pub strategies: Strategies,
    /// One per lane, indexed by lane
    pub generators: Vec<CarGenerator>,
    pub stats: SimulationStats,
    config: Option<SimConfig>,
    /// Seeds the per-collaborator generators
    rng: StdRng,
}

impl SimWorld {
    /// Build a world from configuration, seeding from the OS
    pub fn from_config(config: SimConfig) -> Result<Self, ConfigError> {
        Self::build(config, StdRng::from_os_rng())
    }

    /// Build a world with a seeded RNG for reproducible simulations
    pub fn from_config_with_seed(config: SimConfig, seed: u64) -> Result<Self, ConfigError> {
        Self::build(config, StdRng::seed_from_u64(seed))
    }

    /// Assemble a world from ready-made parts.
    ///
    /// Generators are calibrated for the road and must cover every
    /// parameter the strategies need generated.
    pub fn from_parts(
        road: CaRoad,
        strategies: Strategies,
        mut generators: Vec<CarGenerator>,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        prepare_generators(&road, &strategies, &mut generators)?;
        Ok(Self {
            road,
            strategies,
            generators,
            stats: SimulationStats::new(),
            config: None,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    fn build(config: SimConfig, mut rng: StdRng) -> Result<Self, ConfigError> {
        config.validate()?;
        let road = CaRoad::new(
            config.road_length_m,
            config.lanes,
            config.speed_limit_mps,
            config.cell_size,
        )?
        .with_collision_policy(config.collision_policy);

        let strategies = build_strategies(&config, &mut rng);
        let mut generators = (0..config.lanes)
            .map(|_| build_generator(&config, &mut rng))
            .collect::<Result<Vec<_>, _>>()?;
        prepare_generators(&road, &strategies, &mut generators)?;

        info!(
            "Road: {} lanes x {} cells of {} m, speed limit {} cells/tick",
            road.number_of_lanes(),
            road.number_of_cells(),
            road.cell_size(),
            road.speed_limit_cells()
        );

        Ok(Self {
            road,
            strategies,
            generators,
            stats: SimulationStats::new(),
            config: Some(config),
            rng,
        })
    }

    pub fn config(&self) -> Option<&SimConfig> {
        self.config.as_ref()
    }

    /// Main simulation tick
    pub fn tick(&mut self) -> StepReport {
        let report = self.road.step(&mut self.strategies, &mut self.generators);
        self.stats.record(&report, &self.road);
        report
    }

    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Replace the configuration between ticks.
    ///
    /// Changing the grid (lanes, length in cells, cell size) rebuilds an
    /// empty road. Anything else is applied in place and vehicles stay.
    /// Nothing changes if the new configuration is rejected.
    pub fn apply_config(&mut self, config: SimConfig) -> Result<()> {
        config.validate().context("Rejected configuration")?;

        let geometry_changed = self
            .config
            .as_ref()
            .is_none_or(|current| !current.same_geometry(&config));
        if geometry_changed {
            let seed = self.rng.random();
            *self = Self::from_config_with_seed(config, seed)
                .context("Failed to rebuild the road for the new configuration")?;
            info!("Configuration applied, road rebuilt");
            return Ok(());
        }

        let strategies = build_strategies(&config, &mut self.rng);
        let required = strategies.generation_keys();
        let calibrated: Vec<ParamRange> = config
            .generator
            .ranges
            .iter()
            .map(|r| r.to_cells(config.cell_size))
            .collect();
        check_ranges(&calibrated, &required)
            .context("Generator parameters do not cover the selected strategies")?;

        self.road.set_collision_policy(config.collision_policy);
        self.road
            .set_speed_limit_cells(speed_limit_in_cells(config.speed_limit_mps, config.cell_size));
        self.strategies = strategies;

        let queue_changed = self
            .config
            .as_ref()
            .is_none_or(|current| current.generator.queue != config.generator.queue);
        for generator in &mut self.generators {
            generator.set_mode(config.generator.mode);
            generator.set_flow_rate(config.generator.flow_rate)?;
            generator.set_ranges(config.generator.ranges.clone());
            if queue_changed {
                match config.generator.queue {
                    Some((min, max)) => generator.reset_queue(min, max)?,
                    None => generator.disable_queue(),
                }
            }
        }

        self.config = Some(config);
        info!("Configuration applied in place");
        Ok(())
    }

    pub fn log_summary(&self) {
        self.stats.log_summary();
    }

    /// Draw the lanes in the terminal
    pub fn draw_map(&self) {
        println!("\n=== Road (tick {}) ===", self.road.step_count());
        println!("Legend: >=Head, ==Body, .=Empty");
        for (lane, line) in self.road.render().iter().enumerate() {
            println!("{:>2} |{}|", lane, line);
        }
        println!();
    }
}

fn child_rng(rng: &mut StdRng) -> Box<dyn RngCore> {
    Box::new(StdRng::seed_from_u64(rng.random()))
}

fn build_strategies(config: &SimConfig, rng: &mut StdRng) -> Strategies {
    let strategies = Strategies::new(config.car_following.build(child_rng(rng)));
    if config.lane_changing {
        strategies.with_lane_changing(config.lane_changing_model.build())
    } else {
        strategies
    }
}

fn build_generator(config: &SimConfig, rng: &mut StdRng) -> Result<CarGenerator, ConfigError> {
    let generator = CarGenerator::new(
        config.generator.mode,
        config.generator.flow_rate,
        config.generator.ranges.clone(),
        child_rng(rng),
    )?;
    match config.generator.queue {
        Some((min, max)) => generator.with_queue(min, max),
        None => Ok(generator),
    }
}

/// Calibrate every generator for the road and check it can serve the strategies
fn prepare_generators(
    road: &CaRoad,
    strategies: &Strategies,
    generators: &mut [CarGenerator],
) -> Result<(), ConfigError> {
    if let Some(model_cell_size) = strategies.car_following.cell_size() {
        if model_cell_size != road.cell_size() {
            warn!(
                "{} expects {} m cells but the road uses {} m",
                strategies.car_following.id(),
                model_cell_size,
                road.cell_size()
            );
        }
    }

    let required = strategies.generation_keys();
    for generator in generators.iter_mut() {
        generator.calibrate(RoadKind::Cellular {
            cell_size: road.cell_size(),
        });
        generator.check_legitimate(&required)?;
    }
    if generators.len() < road.number_of_lanes() {
        warn!(
            "Only {} of {} lanes have a generator",
            generators.len(),
            road.number_of_lanes()
        );
    }
    Ok(())
}
