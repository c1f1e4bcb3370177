//! Exogenous traffic demand model
//!
//! Each approach carries a demand level from 1 (sparse) to 10 (saturated)
//! that drives the spawning probability. Levels drift randomly over time,
//! independent of what is happening at the lights.

use rand::Rng;
use std::collections::VecDeque;

use super::types::{Axis, Direction, PerDirection, HISTORY_LEN};

/// Demand state for one approach
#[derive(Debug, Clone, Default)]
pub struct DirectionDemand {
    /// Current level, 1..=10 once sampled; zero until the first sample,
    /// so no traffic arrives before the first adaptive green entry
    pub level: u32,
    /// Vehicles injected since the last sample, folded into spawning
    pub pending_burst: u32,
}

/// Per-approach demand levels plus a rolling history of sampled totals
#[derive(Debug, Clone)]
pub struct DemandTracker {
    per_direction: PerDirection<DirectionDemand>,
    /// Recent per-axis demand totals observed at green entries
    history_ns: VecDeque<u32>,
    history_eo: VecDeque<u32>,
}

impl Default for DemandTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DemandTracker {
    pub fn new() -> Self {
        Self {
            per_direction: PerDirection::from_fn(|_| DirectionDemand::default()),
            history_ns: VecDeque::with_capacity(HISTORY_LEN),
            history_eo: VecDeque::with_capacity(HISTORY_LEN),
        }
    }

    pub fn level(&self, direction: Direction) -> u32 {
        self.per_direction[direction].level
    }

    /// Re-roll the demand level for every approach and occasionally queue a
    /// small burst of extra arrivals
    pub fn sample<R: Rng>(&mut self, rng: &mut R) {
        for direction in Direction::ALL {
            let demand = &mut self.per_direction[direction];
            demand.level = rng.random_range(1..=10);
            if rng.random_bool(0.3) {
                demand.pending_burst += rng.random_range(1..=3);
            }
        }
    }

    /// Consume one queued burst arrival for an approach, if any
    pub fn take_burst(&mut self, direction: Direction) -> bool {
        let demand = &mut self.per_direction[direction];
        if demand.pending_burst > 0 {
            demand.pending_burst -= 1;
            true
        } else {
            false
        }
    }

    /// Record the total demand seen when an axis received green
    pub fn record_green_entry(&mut self, axis: Axis, total: u32) {
        let history = match axis {
            Axis::NorthSouth => &mut self.history_ns,
            Axis::EastWest => &mut self.history_eo,
        };
        if history.len() == HISTORY_LEN {
            history.pop_front();
        }
        history.push_back(total);
    }

    pub fn history_ns(&self) -> &VecDeque<u32> {
        &self.history_ns
    }

    pub fn history_eo(&self) -> &VecDeque<u32> {
        &self.history_eo
    }

    /// Mean of the recorded demand totals for one axis
    pub fn mean_demand(&self, axis: Axis) -> f32 {
        let history = match axis {
            Axis::NorthSouth => &self.history_ns,
            Axis::EastWest => &self.history_eo,
        };
        if history.is_empty() {
            return 0.0;
        }
        history.iter().sum::<u32>() as f32 / history.len() as f32
    }
}
