//! Car generator tests

use ca_traffic_sim::simulation::{
    check_ranges, default_ranges, ArrivalMode, CarGenerator, ConfigError, ParamRange, ParamUnit,
    RoadKind,
};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::time::{Duration, Instant};

/// Returns the same word forever: 0 makes every uniform draw 0.0, `u64::MAX`
/// makes it just below 1.0
struct ConstRng(u64);

impl RngCore for ConstRng {
    fn next_u32(&mut self) -> u32 {
        self.0 as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.0
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        for (i, byte) in dst.iter_mut().enumerate() {
            *byte = self.0.to_le_bytes()[i % 8];
        }
    }
}

fn seeded_generator(mode: ArrivalMode, flow_rate: f64, seed: u64) -> CarGenerator {
    CarGenerator::new(
        mode,
        flow_rate,
        default_ranges(),
        Box::new(StdRng::seed_from_u64(seed)),
    )
    .unwrap()
}

fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[test]
fn test_zero_flow_never_arrives() {
    for mode in [ArrivalMode::Single, ArrivalMode::Multi] {
        let mut generator = seeded_generator(mode, 0.0, 11);
        let total: usize = (0..1000).map(|_| generator.arrivals()).sum();
        assert_eq!(total, 0, "{:?} mode produced arrivals", mode);
    }
}

#[test]
fn test_single_mode_arrival_probability() {
    let mut generator = seeded_generator(ArrivalMode::Single, 0.5, 3);
    let ticks = 10_000;
    let total: usize = (0..ticks).map(|_| generator.arrivals()).sum();

    let expected = 1.0 - (-0.5f64).exp();
    let observed = total as f64 / ticks as f64;
    assert!(
        (observed - expected).abs() < 0.03,
        "observed {observed}, expected {expected}"
    );
}

#[test]
fn test_single_mode_uses_the_uniform_draw() {
    let mut always = CarGenerator::new(
        ArrivalMode::Single,
        0.1,
        default_ranges(),
        Box::new(ConstRng(0)),
    )
    .unwrap();
    assert_eq!(always.arrivals(), 1);

    let mut never = CarGenerator::new(
        ArrivalMode::Single,
        0.1,
        default_ranges(),
        Box::new(ConstRng(u64::MAX)),
    )
    .unwrap();
    assert_eq!(never.arrivals(), 0);
}

#[test]
fn test_multi_mode_allows_several_arrivals_per_tick() {
    let mut generator = seeded_generator(ArrivalMode::Multi, 5.0, 21);
    let ticks = 4_000;
    let counts: Vec<usize> = (0..ticks).map(|_| generator.arrivals()).collect();

    let mean = counts.iter().sum::<usize>() as f64 / ticks as f64;
    assert!((mean - 5.0).abs() < 0.3, "mean arrivals {mean}");
    assert!(counts.iter().any(|&c| c > 1));
}

#[test]
fn test_multi_mode_handles_a_huge_flow_rate() {
    let mut generator = seeded_generator(ArrivalMode::Multi, 1e8, 1);
    let start = Instant::now();
    let counts: Vec<usize> = (0..10).map(|_| generator.arrivals()).collect();
    let elapsed = start.elapsed();

    assert!(elapsed < Duration::from_secs(1), "took {elapsed:?}");
    for count in counts {
        // Ten standard deviations either side of the mean
        assert!((99_900_000..=100_100_000).contains(&count), "count {count}");
    }
}

#[test]
fn test_set_mode_switches_arrivals() {
    let mut generator = seeded_generator(ArrivalMode::Single, 50.0, 6);
    assert_eq!(generator.mode(), ArrivalMode::Single);
    assert!((0..100).all(|_| generator.arrivals() <= 1));

    generator.set_mode(ArrivalMode::Multi);
    assert_eq!(generator.mode(), ArrivalMode::Multi);
    let total: usize = (0..100).map(|_| generator.arrivals()).sum();
    assert!(total > 100 * 40, "total {total}");
}

#[test]
fn test_cellular_calibration() {
    let ranges = vec![
        ParamRange::new("length", 7.5, 15.0, ParamUnit::Meters),
        ParamRange::new("maxSpeed", 20.0, 37.5, ParamUnit::MetersPerSecond),
        ParamRange::new("slowdownProbability", 0.1, 0.3, ParamUnit::Dimensionless),
    ];
    let mut generator = CarGenerator::new(
        ArrivalMode::Single,
        0.3,
        ranges.clone(),
        Box::new(StdRng::seed_from_u64(1)),
    )
    .unwrap();
    assert!(!generator.is_cellular_calibrated());

    generator.calibrate(RoadKind::Cellular { cell_size: 7.5 });
    assert!(generator.is_cellular_calibrated());
    let real = generator.real_ranges().to_vec();
    assert_eq!((real[0].min, real[0].max), (1.0, 2.0));
    // 20 m/s is 2.67 cells per tick, rounded up
    assert_eq!((real[1].min, real[1].max), (3.0, 5.0));
    assert_eq!(real[1].unit, ParamUnit::Cells);
    assert_eq!(real[2], ranges[2]);

    // Calibrating again for the same road changes nothing
    generator.calibrate(RoadKind::Cellular { cell_size: 7.5 });
    assert_eq!(generator.real_ranges(), real.as_slice());
    assert_eq!(generator.communication_ranges(), ranges.as_slice());

    generator.calibrate(RoadKind::Continuous);
    assert_eq!(generator.real_ranges(), ranges.as_slice());
}

#[test]
fn test_cellular_samples_are_whole_cells() {
    let mut generator = seeded_generator(ArrivalMode::Single, 0.3, 8);
    generator.calibrate(RoadKind::Cellular { cell_size: 7.5 });

    for _ in 0..200 {
        let spec = generator.sample_vehicle();
        assert_eq!(spec.length, 1);
        let max_speed = spec.attributes["maxSpeed"];
        assert_eq!(max_speed.fract(), 0.0);
        assert!((3.0..=5.0).contains(&max_speed));
        let p = spec.attributes["slowdownProbability"];
        assert!(p >= 0.1 && p < 0.3 + 1e-9);
        assert!(!spec.attributes.contains_key("length"));
    }
}

#[test]
fn test_legitimacy_requires_every_key() {
    let generator = seeded_generator(ArrivalMode::Single, 0.3, 2);
    assert!(generator.is_legitimate(&keys(&["length", "maxSpeed", "slowdownProbability"])));
    assert_eq!(
        generator.check_legitimate(&keys(&["length", "acceleration"])),
        Err(ConfigError::MissingGeneratorParameter(
            "acceleration".to_string()
        ))
    );
}

#[test]
fn test_inverted_range_is_rejected() {
    let ranges = vec![ParamRange::new("maxSpeed", 5.0, 3.0, ParamUnit::Cells)];
    assert!(matches!(
        check_ranges(&ranges, &keys(&["maxSpeed"])),
        Err(ConfigError::InvalidRange { ref name, .. }) if name == "maxSpeed"
    ));
    // Not required, not checked
    assert!(check_ranges(&ranges, &[]).is_ok());
}

#[test]
fn test_invalid_flow_rate_is_rejected() {
    for rate in [-0.1, f64::NAN, f64::INFINITY] {
        let result = CarGenerator::new(
            ArrivalMode::Multi,
            rate,
            default_ranges(),
            Box::new(StdRng::seed_from_u64(0)),
        );
        assert!(matches!(result, Err(ConfigError::InvalidFlowRate(_))));
    }

    let mut generator = seeded_generator(ArrivalMode::Single, 0.3, 0);
    assert!(generator.set_flow_rate(-1.0).is_err());
    assert_eq!(generator.flow_rate(), 0.3);
}

#[test]
fn test_queue_capacity_is_drawn_once() {
    for seed in 0..20 {
        let generator = seeded_generator(ArrivalMode::Single, 0.3, seed)
            .with_queue(2, 6)
            .unwrap();
        let capacity = generator.queue_capacity().unwrap();
        assert!((2..=6).contains(&capacity));
    }

    let mut generator = seeded_generator(ArrivalMode::Single, 0.3, 4)
        .with_queue(3, 3)
        .unwrap();
    assert_eq!(generator.enqueue(2), 0);
    assert_eq!(generator.enqueue(4), 3);
    assert_eq!(generator.queue_len(), 3);
    assert_eq!(generator.queue_capacity(), Some(3));

    assert!(generator.pop_front().is_some());
    assert_eq!(generator.queue_len(), 2);

    generator.reset_queue(1, 1).unwrap();
    assert_eq!(generator.queue_len(), 0);
    assert_eq!(generator.queue_capacity(), Some(1));

    assert_eq!(
        generator.reset_queue(4, 2),
        Err(ConfigError::InvalidQueueRange { min: 4, max: 2 })
    );
}

#[test]
fn test_unqueued_generator_rejects_enqueue() {
    let mut generator = seeded_generator(ArrivalMode::Single, 0.3, 4);
    assert!(!generator.is_queued());
    assert_eq!(generator.enqueue(3), 3);
    assert!(generator.front().is_none());
}
