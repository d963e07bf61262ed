use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;

use ca_traffic_sim::simulation::{
    ArrivalMode, CarFollowingModel, CollisionPolicy, GeneratorConfig, LaneChangingModel,
    SimConfig, SimWorld,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ArrivalArg {
    /// At most one vehicle per lane and tick
    Single,
    /// Exponential inter-arrival times, several vehicles per tick possible
    Multi,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CollisionArg {
    Prevent,
    Allow,
}

#[derive(Parser)]
#[command(name = "ca_traffic_sim")]
#[command(about = "Multi-lane cellular-automaton traffic simulation")]
struct Cli {
    /// Number of simulation ticks to run
    #[arg(long, default_value = "600")]
    ticks: u64,

    /// Number of lanes
    #[arg(long, default_value = "3")]
    lanes: usize,

    /// Road length in meters
    #[arg(long, default_value = "750")]
    road_length: f64,

    /// Cell size in meters
    #[arg(long, default_value = "7.5")]
    cell_size: f64,

    /// Speed limit in meters per second
    #[arg(long, default_value = "37.5")]
    speed_limit: f64,

    /// Arrivals per second per lane
    #[arg(long, default_value = "0.3")]
    flow_rate: f64,

    #[arg(long, value_enum, default_value = "single")]
    arrival_mode: ArrivalArg,

    /// Smallest queue size; enables queued generation together with --queue-max
    #[arg(long, requires = "queue_max")]
    queue_min: Option<usize>,

    /// Largest queue size
    #[arg(long, requires = "queue_min")]
    queue_max: Option<usize>,

    /// Enable the lane-change phase
    #[arg(long)]
    lane_changing: bool,

    #[arg(long, value_enum, default_value = "prevent")]
    collisions: CollisionArg,

    /// Car-following model id
    #[arg(long, default_value = "nagel-schreckenberg")]
    car_following: String,

    /// Lane-changing model id
    #[arg(long, default_value = "symmetric")]
    lane_change_model: String,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Draw the road every N ticks (0 = never)
    #[arg(long, default_value = "0")]
    draw: u64,
}

impl Cli {
    fn to_config(&self) -> Result<SimConfig> {
        let car_following = CarFollowingModel::from_id(&self.car_following)
            .context("Invalid --car-following")?;
        let lane_changing_model = LaneChangingModel::from_id(&self.lane_change_model)
            .context("Invalid --lane-change-model")?;

        Ok(SimConfig {
            road_length_m: self.road_length,
            lanes: self.lanes,
            speed_limit_mps: self.speed_limit,
            cell_size: self.cell_size,
            lane_changing: self.lane_changing,
            collision_policy: match self.collisions {
                CollisionArg::Prevent => CollisionPolicy::Prevent,
                CollisionArg::Allow => CollisionPolicy::Allow,
            },
            car_following,
            lane_changing_model,
            generator: GeneratorConfig {
                mode: match self.arrival_mode {
                    ArrivalArg::Single => ArrivalMode::Single,
                    ArrivalArg::Multi => ArrivalMode::Multi,
                },
                flow_rate: self.flow_rate,
                queue: self.queue_min.zip(self.queue_max),
                ..GeneratorConfig::default()
            },
        })
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn,ca_traffic_sim=info"),
    )
    .init();

    let cli = Cli::parse();
    let config = cli.to_config()?;
    run_headless(&cli, config)
}

/// Run the simulation without graphics
fn run_headless(cli: &Cli, config: SimConfig) -> Result<()> {
    let mut world = match cli.seed {
        Some(seed) => SimWorld::from_config_with_seed(config, seed),
        None => SimWorld::from_config(config),
    }
    .context("Simulation refused to start")?;

    info!("Running {} ticks", cli.ticks);
    if cli.draw > 0 {
        world.draw_map();
    }

    for tick in 1..=cli.ticks {
        let report = world.tick();
        for collision in &report.collisions {
            info!(
                "Collision at tick {} in lane {}, position {}: {} hit {}",
                collision.tick,
                collision.lane,
                collision.position,
                collision.striking,
                collision.struck
            );
        }
        if cli.draw > 0 && tick % cli.draw == 0 {
            world.draw_map();
        }
    }

    world
        .road
        .check_invariants()
        .context("Road invariants violated at the end of the run")?;
    world.log_summary();
    Ok(())
}
