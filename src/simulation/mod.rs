//! Intersection simulation core
//!
//! Pure simulation logic with no rendering or I/O beyond the statistics
//! sink. Everything is driven through [`SimWorld`].

pub mod ambulance;
pub mod controller;
pub mod demand;
pub mod signal;
pub mod stats;
pub mod types;
pub mod vehicle;
pub mod weather;
pub mod world;

pub use ambulance::AmbulancePriorityManager;
pub use controller::{CollisionReport, GreenEntry, Incident, TrafficController};
pub use demand::DemandTracker;
pub use signal::{green_duration_for, PedestrianState, SignalHead};
pub use stats::{CsvSink, CycleRecord, MemorySink, NullSink, StatsSink};
pub use types::{Axis, Direction, LightColor, PerDirection, Phase, Position, VehicleId};
pub use vehicle::Vehicle;
pub use weather::Weather;
pub use world::{ApproachSnapshot, CommandOutcome, SimWorld, WorldSnapshot};
