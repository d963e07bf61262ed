//! Running statistics over a simulation

use log::info;

use super::road::{CaRoad, StepReport};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationStats {
    pub ticks: u64,
    pub total_generated: usize,
    pub total_departed: usize,
    pub total_wrecked: usize,
    pub total_collisions: usize,
    pub total_lane_changes: usize,
    pub total_discarded: usize,
    pub total_skipped: usize,
    pub vehicles_on_road: usize,
    /// Sum over ticks of every on-road vehicle's speed
    speed_total: u64,
    /// Sum over ticks of the number of vehicles on the road
    vehicle_ticks: u64,
    /// Per lane, sum over ticks of occupied cells
    occupied_cells: Vec<u64>,
    number_of_cells: usize,
}

impl SimulationStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one tick's report and the resulting grid into the totals
    pub fn record(&mut self, report: &StepReport, road: &CaRoad) {
        self.ticks += 1;
        self.total_generated += report.generated;
        self.total_departed += report.departed;
        self.total_wrecked += report.wrecked;
        self.total_collisions += report.collisions.len();
        self.total_lane_changes += report.lane_changes;
        self.total_discarded += report.discarded;
        self.total_skipped += report.skipped;
        self.vehicles_on_road = report.vehicles_on_road;

        self.number_of_cells = road.number_of_cells();
        if self.occupied_cells.len() != road.number_of_lanes() {
            self.occupied_cells = vec![0; road.number_of_lanes()];
        }
        for vehicle in road.vehicles() {
            self.speed_total += vehicle.current_speed as u64;
            self.vehicle_ticks += 1;
            self.occupied_cells[vehicle.lane] += vehicle.length as u64;
        }
    }

    /// Departures per tick
    pub fn mean_flow(&self) -> f64 {
        if self.ticks == 0 {
            return 0.0;
        }
        self.total_departed as f64 / self.ticks as f64
    }

    /// Cells per tick, averaged over every vehicle and tick
    pub fn mean_speed(&self) -> f64 {
        if self.vehicle_ticks == 0 {
            return 0.0;
        }
        self.speed_total as f64 / self.vehicle_ticks as f64
    }

    /// Fraction of a lane's cells occupied, averaged over ticks
    pub fn density(&self, lane: usize) -> f64 {
        match self.occupied_cells.get(lane) {
            Some(&occupied) if self.ticks > 0 && self.number_of_cells > 0 => {
                occupied as f64 / (self.ticks as f64 * self.number_of_cells as f64)
            }
            _ => 0.0,
        }
    }

    pub fn log_summary(&self) {
        info!("=== SIMULATION COMPLETE ===");
        info!("Ticks run: {}", self.ticks);
        info!("Total cars generated: {}", self.total_generated);
        info!("Total cars departed: {}", self.total_departed);
        info!("Cars on road: {}", self.vehicles_on_road);
        info!("Collisions: {}", self.total_collisions);
        info!("Lane changes: {}", self.total_lane_changes);
        info!("Discarded arrivals: {}", self.total_discarded);
        info!("Skipped updates: {}", self.total_skipped);
        info!("Mean flow: {:.3} cars/tick", self.mean_flow());
        info!("Mean speed: {:.2} cells/tick", self.mean_speed());
        for lane in 0..self.occupied_cells.len() {
            info!("Lane {} density: {:.3}", lane, self.density(lane));
        }
    }
}
