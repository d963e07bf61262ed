//! Simulation world tests

use ca_traffic_sim::simulation::{
    default_ranges, ArrivalMode, CaRoad, CarFollowingModel, CarGenerator, CollisionPolicy,
    ConfigError, GeneratorConfig, LaneChangingModel, NagelSchreckenberg, ParamRange, ParamUnit,
    SimConfig, SimWorld, Strategies,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn short_road() -> SimConfig {
    SimConfig {
        road_length_m: 150.0,
        lanes: 3,
        ..SimConfig::default()
    }
}

fn busy(mut config: SimConfig) -> SimConfig {
    config.generator.flow_rate = 0.7;
    config
}

#[test]
fn test_world_from_default_config() {
    let world = SimWorld::from_config_with_seed(SimConfig::default(), 1).unwrap();
    assert_eq!(world.road.number_of_lanes(), 3);
    assert_eq!(world.road.number_of_cells(), 100);
    assert_eq!(world.road.speed_limit_cells(), 5);
    assert_eq!(world.generators.len(), 3);
    assert!(world
        .generators
        .iter()
        .all(|g| g.is_cellular_calibrated()));
    assert!(world.strategies.lane_changing.is_none());
}

#[test]
fn test_zero_flow_keeps_the_road_empty() {
    let mut config = short_road();
    config.generator.flow_rate = 0.0;
    let mut world = SimWorld::from_config_with_seed(config, 5).unwrap();
    assert_eq!(world.road.number_of_cells(), 20);

    world.run(100);
    assert_eq!(world.road.vehicle_count(), 0);
    assert_eq!(world.stats.total_generated, 0);
    assert_eq!(world.stats.ticks, 100);
    assert_eq!(world.stats.mean_flow(), 0.0);
}

#[test]
fn test_stats_balance_after_a_run() {
    let mut world = SimWorld::from_config_with_seed(busy(short_road()), 42).unwrap();
    world.run(300);

    let stats = &world.stats;
    assert!(stats.total_generated > 0);
    assert!(stats.total_departed > 0);
    assert_eq!(
        stats.total_generated,
        stats.total_departed + stats.total_wrecked + world.road.vehicle_count()
    );
    assert_eq!(stats.vehicles_on_road, world.road.vehicle_count());
    assert_eq!(stats.total_collisions, 0);
    assert!(stats.mean_speed() <= world.road.speed_limit_cells() as f64);
    for lane in 0..3 {
        let density = stats.density(lane);
        assert!((0.0..=1.0).contains(&density));
    }
    world.road.check_invariants().unwrap();
}

#[test]
fn test_same_seed_same_run() {
    let config = busy(short_road());
    let mut first = SimWorld::from_config_with_seed(config.clone(), 9).unwrap();
    let mut second = SimWorld::from_config_with_seed(config, 9).unwrap();
    first.run(200);
    second.run(200);

    assert_eq!(first.stats, second.stats);
    assert_eq!(first.road.render(), second.road.render());
}

#[test]
fn test_lane_changing_run_keeps_invariants() {
    let mut config = busy(short_road());
    config.lane_changing = true;
    config.generator.mode = ArrivalMode::Multi;
    config.generator.ranges[0] = ParamRange::new("length", 7.5, 15.0, ParamUnit::Meters);
    let mut world = SimWorld::from_config_with_seed(config, 77).unwrap();
    assert!(world.strategies.lane_changing.is_some());

    for _ in 0..300 {
        let report = world.tick();
        assert_eq!(report.skipped, 0);
        world.road.check_invariants().unwrap();
    }
}

#[test]
fn test_allow_policy_run_keeps_invariants() {
    let mut config = busy(short_road());
    config.collision_policy = CollisionPolicy::Allow;
    let mut world = SimWorld::from_config_with_seed(config, 3).unwrap();

    for _ in 0..200 {
        let report = world.tick();
        assert_eq!(report.wrecked, report.collisions.len());
        world.road.check_invariants().unwrap();
    }
}

#[test]
fn test_missing_generator_parameter_refuses_to_start() {
    let mut config = short_road();
    config.generator.ranges.retain(|r| r.name != "maxSpeed");

    let err = SimWorld::from_config_with_seed(config, 0).unwrap_err();
    assert_eq!(
        err,
        ConfigError::MissingGeneratorParameter("maxSpeed".to_string())
    );
}

#[test]
fn test_invalid_config_refuses_to_start() {
    let mut config = short_road();
    config.lanes = 0;
    assert_eq!(
        SimWorld::from_config_with_seed(config, 0).unwrap_err(),
        ConfigError::NoLanes
    );

    let mut config = short_road();
    config.generator.ranges = vec![ParamRange::new("length", 15.0, 7.5, ParamUnit::Meters)];
    assert!(matches!(
        SimWorld::from_config_with_seed(config, 0),
        Err(ConfigError::InvalidRange { .. })
    ));

    let mut config = short_road();
    config.generator.queue = Some((5, 2));
    assert!(matches!(
        SimWorld::from_config_with_seed(config, 0),
        Err(ConfigError::InvalidQueueRange { min: 5, max: 2 })
    ));
}

#[test]
fn test_unknown_strategy_id() {
    assert_eq!(
        CarFollowingModel::from_id("nasch"),
        Ok(CarFollowingModel::NagelSchreckenberg)
    );
    assert_eq!(
        CarFollowingModel::from_id("intelligent-driver"),
        Err(ConfigError::UnknownStrategy("intelligent-driver".to_string()))
    );
    assert_eq!(
        LaneChangingModel::from_id("stca"),
        Ok(LaneChangingModel::Symmetric)
    );
    assert!(LaneChangingModel::from_id("mobil").is_err());
}

#[test]
fn test_apply_config_in_place_keeps_vehicles() {
    let mut world = SimWorld::from_config_with_seed(busy(short_road()), 12).unwrap();
    world.run(50);
    let before = world.road.vehicle_count();
    assert!(before > 0);

    let mut config = busy(short_road());
    config.generator.flow_rate = 0.1;
    config.speed_limit_mps = 22.5;
    config.lane_changing = true;
    world.apply_config(config).unwrap();

    assert_eq!(world.road.vehicle_count(), before);
    assert_eq!(world.road.speed_limit_cells(), 3);
    assert!(world.road.vehicles().all(|v| v.current_speed <= 3));
    assert!(world.generators.iter().all(|g| g.flow_rate() == 0.1));
    assert!(world.strategies.lane_changing.is_some());
    assert_eq!(world.config().map(|c| c.speed_limit_mps), Some(22.5));

    world.run(50);
    world.road.check_invariants().unwrap();
}

#[test]
fn test_apply_config_with_new_geometry_rebuilds() {
    let mut world = SimWorld::from_config_with_seed(busy(short_road()), 12).unwrap();
    world.run(50);

    let mut config = busy(short_road());
    config.lanes = 2;
    world.apply_config(config).unwrap();

    assert_eq!(world.road.number_of_lanes(), 2);
    assert_eq!(world.road.vehicle_count(), 0);
    assert_eq!(world.generators.len(), 2);
    assert_eq!(world.stats.ticks, 0);
}

#[test]
fn test_rejected_config_changes_nothing() {
    let mut world = SimWorld::from_config_with_seed(busy(short_road()), 12).unwrap();
    world.run(20);
    let before = world.road.render();

    let mut config = busy(short_road());
    config.generator.ranges.retain(|r| r.name != "slowdownProbability");
    assert!(world.apply_config(config).is_err());

    let mut config = busy(short_road());
    config.generator.flow_rate = -2.0;
    assert!(world.apply_config(config).is_err());

    assert_eq!(world.road.render(), before);
    assert_eq!(world.config().map(|c| c.generator.flow_rate), Some(0.7));
}

#[test]
fn test_world_from_parts() {
    let road = CaRoad::from_cells(2, 30, 5, 7.5).unwrap();
    let strategies = Strategies::new(Box::new(NagelSchreckenberg::new(Box::new(
        StdRng::seed_from_u64(1),
    ))));
    let generators = (0..2)
        .map(|lane| {
            CarGenerator::new(
                ArrivalMode::Single,
                0.5,
                default_ranges(),
                Box::new(StdRng::seed_from_u64(lane)),
            )
            .unwrap()
        })
        .collect();

    let mut world = SimWorld::from_parts(road, strategies, generators, 4).unwrap();
    assert!(world.config().is_none());
    world.run(100);
    assert!(world.stats.total_generated > 0);
    world.road.check_invariants().unwrap();

    // Generators that cannot supply the model's parameters are refused
    let road = CaRoad::from_cells(1, 30, 5, 7.5).unwrap();
    let strategies = Strategies::new(Box::new(NagelSchreckenberg::new(Box::new(
        StdRng::seed_from_u64(1),
    ))));
    let generator = CarGenerator::new(
        ArrivalMode::Single,
        0.5,
        vec![ParamRange::new("length", 7.5, 7.5, ParamUnit::Meters)],
        Box::new(StdRng::seed_from_u64(0)),
    )
    .unwrap();
    assert!(matches!(
        SimWorld::from_parts(road, strategies, vec![generator], 4),
        Err(ConfigError::MissingGeneratorParameter(_))
    ));
}

#[test]
fn test_generator_config_defaults() {
    let config = GeneratorConfig::default();
    assert_eq!(config.mode, ArrivalMode::Single);
    assert!(config.queue.is_none());
    assert_eq!(config.ranges, default_ranges());
}
