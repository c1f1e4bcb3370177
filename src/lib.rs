//! Adaptive four-way intersection simulator
//!
//! Models a signalized crossroads with demand-adaptive green durations,
//! pedestrian calls, ambulance signal preemption, weather effects on
//! vehicle motion, and collision incidents that freeze the lights while
//! the wreck is cleared.

pub mod simulation;
