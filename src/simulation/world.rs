//! Top-level simulation orchestrator
//!
//! [`SimWorld`] owns the controller, the ambulance manager, the demand
//! model, the weather, and the RNG, and advances everything with a fixed
//! frame order: one-second logic ticks first, then spawning, vehicle
//! motion, ambulance handling, collision detection, and incident
//! bookkeeping.

use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::ambulance::AmbulancePriorityManager;
use super::controller::{GreenEntry, TrafficController};
use super::demand::DemandTracker;
use super::stats::{unix_timestamp, CycleRecord, NullSink, StatsSink};
use super::types::{Axis, Direction, LightColor, Phase, Position};
use super::weather::Weather;

/// Result of an operator command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Accepted(String),
    Rejected(String),
}

impl CommandOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CommandOutcome::Accepted(_))
    }

    pub fn message(&self) -> &str {
        match self {
            CommandOutcome::Accepted(msg) | CommandOutcome::Rejected(msg) => msg,
        }
    }
}

/// One approach's state inside a [`WorldSnapshot`]
#[derive(Debug, Clone)]
pub struct ApproachSnapshot {
    pub direction: Direction,
    pub color: LightColor,
    pub time_remaining: u32,
    pub pedestrian_active: bool,
    pub pedestrian_time_remaining: u32,
    pub queue_len: usize,
}

/// Read-only view of the world for display code
#[derive(Debug, Clone)]
pub struct WorldSnapshot {
    pub phase: Phase,
    pub weather: Weather,
    pub elapsed_secs: u32,
    pub vehicle_count: usize,
    pub cycle_count: u32,
    pub accident_count: u32,
    pub ambulances_dispatched: u32,
    pub pedestrian_calls_ns: u32,
    pub pedestrian_calls_eo: u32,
    pub override_direction: Option<Direction>,
    /// Wreck position and intervention seconds left, while one is active
    pub incident: Option<(Position, u32)>,
    /// In N, S, E, W order
    pub approaches: [ApproachSnapshot; 4],
}

pub struct SimWorld {
    pub controller: TrafficController,
    pub ambulances: AmbulancePriorityManager,
    pub demand: DemandTracker,
    pub weather: Weather,
    rng: StdRng,
    active: bool,
    accumulator: f32,
    total_elapsed_secs: u32,
    pedestrian_calls_ns: u32,
    pedestrian_calls_eo: u32,
    sink: Box<dyn StatsSink>,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Deterministic world for reproducible runs and tests
    pub fn new_with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            controller: TrafficController::new(),
            ambulances: AmbulancePriorityManager::new(),
            demand: DemandTracker::new(),
            weather: Weather::default(),
            rng,
            active: false,
            accumulator: 0.0,
            total_elapsed_secs: 0,
            pedestrian_calls_ns: 0,
            pedestrian_calls_eo: 0,
            sink: Box::new(NullSink),
        }
    }

    /// Replace the statistics sink
    pub fn with_sink(mut self, sink: Box<dyn StatsSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.total_elapsed_secs
    }

    // --- operator commands -------------------------------------------------

    /// Reset and start the simulation: N-S gets green, each approach is
    /// seeded with a short starting queue
    pub fn start(&mut self) -> CommandOutcome {
        if self.active {
            return CommandOutcome::Rejected("simulation already running".into());
        }
        self.active = true;
        self.accumulator = 0.0;
        self.total_elapsed_secs = 0;
        self.pedestrian_calls_ns = 0;
        self.pedestrian_calls_eo = 0;
        self.ambulances.cancel();
        self.demand = DemandTracker::new();
        self.controller.start();
        self.controller.seed_initial_vehicles(&mut self.rng);
        CommandOutcome::Accepted("simulation started".into())
    }

    pub fn stop(&mut self) -> CommandOutcome {
        if !self.active {
            return CommandOutcome::Rejected("simulation is not running".into());
        }
        self.active = false;
        CommandOutcome::Accepted("simulation stopped".into())
    }

    /// Pedestrian call button for one crossing
    pub fn request_pedestrian(&mut self, direction: Direction) -> CommandOutcome {
        if !self.active {
            return CommandOutcome::Rejected("simulation is not running".into());
        }
        self.controller.request_pedestrian(direction);
        match direction.axis() {
            Axis::NorthSouth => self.pedestrian_calls_ns += 1,
            Axis::EastWest => self.pedestrian_calls_eo += 1,
        }
        CommandOutcome::Accepted(format!("pedestrian call registered on {direction}"))
    }

    /// Dispatch an ambulance from an approach's spawn point
    pub fn spawn_ambulance(&mut self, direction: Direction) -> CommandOutcome {
        if !self.active {
            return CommandOutcome::Rejected("simulation is not running".into());
        }
        self.controller.spawn_ambulance(direction);
        self.ambulances.record_spawn();
        CommandOutcome::Accepted(format!("ambulance dispatched from {direction}"))
    }

    /// Place a stalled crossing pair in the middle of the box
    pub fn trigger_accident(&mut self) -> CommandOutcome {
        if !self.active {
            return CommandOutcome::Rejected("simulation is not running".into());
        }
        if !self.controller.simulate_accident() {
            return CommandOutcome::Rejected("an intervention is already in progress".into());
        }
        self.ambulances.cancel();
        CommandOutcome::Accepted("accident simulated".into())
    }

    pub fn toggle_weather(&mut self) -> CommandOutcome {
        let weather = self.weather.toggle();
        info!("weather is now {weather:?}");
        CommandOutcome::Accepted(format!("weather set to {weather:?}"))
    }

    // --- frame advance -----------------------------------------------------

    /// Advance the world by one frame of `delta_secs` wall time
    pub fn tick(&mut self, delta_secs: f32) {
        if !self.active {
            return;
        }
        self.accumulator += delta_secs;
        let mut logic_secs = 0u32;
        while self.accumulator >= 1.0 {
            self.accumulator -= 1.0;
            logic_secs += 1;
            self.logic_tick();
        }
        self.controller
            .spawn_tick(delta_secs, &mut self.demand, &mut self.rng);
        self.controller
            .update_vehicles(delta_secs, self.weather, self.ambulances.active_direction());
        self.ambulance_step();
        self.collision_step();
        self.incident_step(logic_secs);
    }

    /// One-second signal logic: timers first, then either the override
    /// extension or the normal phase machine
    fn logic_tick(&mut self) {
        self.total_elapsed_secs += 1;
        self.controller.tick_heads();
        if let Some(direction) = self.ambulances.active_direction() {
            self.controller.extend_override_green(direction);
            return;
        }
        if self.controller.incident_active() {
            return;
        }
        if let Some(entry) = self.controller.evaluate_phase() {
            self.on_green_entry(entry);
        }
    }

    /// Detection runs every frame, including under an active override: an
    /// ambulance detected on another direction takes the override over,
    /// keeping the phase saved at the first activation
    fn ambulance_step(&mut self) {
        if let Some(direction) = self.ambulances.detect_approaching(&self.controller) {
            if self.ambulances.activate(direction, self.controller.phase) {
                self.controller.apply_override(direction);
            }
        }
        if let Some(saved) = self.ambulances.verify_passed(&self.controller) {
            let entry = self.controller.end_override(saved);
            self.on_green_entry(entry);
        }
    }

    fn collision_step(&mut self) {
        if self.controller.incident_active() {
            return;
        }
        if let Some(report) = self.controller.detect_collision() {
            self.controller.trigger_incident(report);
            self.ambulances.cancel();
        }
    }

    fn incident_step(&mut self, logic_secs: u32) {
        if logic_secs == 0 {
            return;
        }
        if self.controller.advance_incident(logic_secs) {
            let entry = self.controller.resume_after_incident();
            self.on_green_entry(entry);
        }
    }

    /// Bookkeeping shared by every path that grants a fresh green: demand
    /// history, a re-roll of the demand levels, and a cycle record
    fn on_green_entry(&mut self, entry: GreenEntry) {
        self.demand.record_green_entry(entry.axis, entry.total_demand);
        self.demand.sample(&mut self.rng);
        let record = CycleRecord {
            cycle_number: entry.cycle_number,
            axis: entry.axis,
            total_demand: entry.total_demand,
            green_duration: entry.duration,
            mean_green_duration: self.controller.mean_green_time(entry.axis),
            mean_demand: self.demand.mean_demand(entry.axis),
            timestamp: unix_timestamp(),
        };
        if let Err(err) = self.sink.record_cycle(&record) {
            warn!("failed to record cycle stats: {err:#}");
        }
    }

    // --- reporting ---------------------------------------------------------

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            phase: self.controller.phase,
            weather: self.weather,
            elapsed_secs: self.total_elapsed_secs,
            vehicle_count: self.controller.vehicle_count(),
            cycle_count: self.controller.cycle_count,
            accident_count: self.controller.accident_count,
            ambulances_dispatched: self.ambulances.ambulances_dispatched(),
            pedestrian_calls_ns: self.pedestrian_calls_ns,
            pedestrian_calls_eo: self.pedestrian_calls_eo,
            override_direction: self.ambulances.active_direction(),
            incident: self
                .controller
                .incident()
                .map(|i| (i.report.location, i.remaining)),
            approaches: Direction::ALL.map(|d| {
                let head = &self.controller.heads[d];
                ApproachSnapshot {
                    direction: d,
                    color: head.color,
                    time_remaining: head.time_remaining,
                    pedestrian_active: head.pedestrian_active(),
                    pedestrian_time_remaining: head.pedestrian_time_remaining(),
                    queue_len: self.controller.queue(d).len(),
                }
            }),
        }
    }

    /// Log a human-readable end-of-run summary
    pub fn print_summary(&self) {
        let snapshot = self.snapshot();
        info!(
            "ran {}s: {} cycles, {} vehicles on scene, {} accidents, {} ambulances, {} pedestrian calls",
            snapshot.elapsed_secs,
            snapshot.cycle_count,
            snapshot.vehicle_count,
            snapshot.accident_count,
            snapshot.ambulances_dispatched,
            snapshot.pedestrian_calls_ns + snapshot.pedestrian_calls_eo,
        );
        info!(
            "mean green: N-S {:.1}s, E-W {:.1}s; mean demand: N-S {:.1}, E-W {:.1}",
            self.controller.mean_green_time(Axis::NorthSouth),
            self.controller.mean_green_time(Axis::EastWest),
            self.demand.mean_demand(Axis::NorthSouth),
            self.demand.mean_demand(Axis::EastWest),
        );
    }
}
