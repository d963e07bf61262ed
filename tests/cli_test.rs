use std::process::{Command, Output};

fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ca_traffic_sim"))
        .args(args)
        .env("RUST_LOG", "warn,ca_traffic_sim=info")
        .output()
        .expect("Failed to execute simulation")
}

/// Extract the number after a summary label
fn summary_value(stderr: &str, label: &str) -> usize {
    let line = stderr
        .lines()
        .find(|line| line.contains(label))
        .unwrap_or_else(|| panic!("Could not find '{}' line", label));
    let parts: Vec<&str> = line.split(label).collect();
    parts
        .get(1)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or_else(|| panic!("Could not parse count from line: {}", line))
}

/// Test that the simulation runs to completion
#[test]
fn test_headless_simulation_runs() {
    let output = run_cli(&["--ticks", "100", "--seed", "7"]);

    assert!(
        output.status.success(),
        "Simulation failed to run. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("SIMULATION COMPLETE"),
        "Simulation did not complete properly. stderr: {}",
        stderr
    );
}

/// Test that simulation statistics are logged
#[test]
fn test_simulation_statistics_logged() {
    let output = run_cli(&["--ticks", "100", "--seed", "7", "--lane-changing"]);
    assert!(output.status.success(), "Simulation failed to run");

    let stderr = String::from_utf8_lossy(&output.stderr);
    for label in [
        "Ticks run:",
        "Total cars generated:",
        "Total cars departed:",
        "Cars on road:",
        "Collisions:",
        "Mean flow:",
    ] {
        assert!(stderr.contains(label), "Missing '{}' statistic", label);
    }
}

/// Test that generated cars are accounted for
#[test]
fn test_cars_are_generated_and_depart() {
    let output = run_cli(&["--ticks", "200", "--seed", "3", "--road-length", "150"]);
    assert!(output.status.success(), "Simulation failed to run");

    let stderr = String::from_utf8_lossy(&output.stderr);
    let generated = summary_value(&stderr, "Total cars generated:");
    let departed = summary_value(&stderr, "Total cars departed:");
    let on_road = summary_value(&stderr, "Cars on road:");

    assert!(generated > 0, "No cars were generated during simulation");
    assert!(departed > 0, "No cars left the road");
    assert_eq!(generated, departed + on_road);
}

/// Test that an unknown model id is refused
#[test]
fn test_unknown_model_is_refused() {
    let output = run_cli(&["--ticks", "10", "--car-following", "intelligent-driver"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("intelligent-driver"),
        "Error does not name the model. stderr: {}",
        stderr
    );
}
