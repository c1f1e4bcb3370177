//! Per-direction traffic-light state machine
//!
//! A [`SignalHead`] owns its own countdown timers and the pedestrian call
//! state for its crossing. Phase ordering (which head is green when) is
//! enforced by the controller, not here.

use log::debug;

use super::types::{
    Direction, LightColor, DEFAULT_GREEN_SECS, PEDESTRIAN_MIN_SECS, YELLOW_DURATION_SECS,
};

/// Pedestrian call state for one head's crossing
///
/// `Active` implies the vehicle light is red; the head upholds that by
/// construction (pedestrian phases only start on a red head, and forced
/// green ends them).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PedestrianState {
    #[default]
    Idle,
    /// A call arrived while the head was not red; honored at the next
    /// red transition
    Requested,
    /// Pedestrians have right of way; counts down to zero
    Active { remaining: u32 },
}

/// Adaptive green duration from measured demand
///
/// Pure function of the combined waiting + approaching vehicle count for
/// one axis.
pub fn green_duration_for(total_demand: u32) -> u32 {
    match total_demand {
        0 => 10,
        1..=3 => 15,
        4..=7 => 25,
        _ => 35,
    }
}

/// One direction's traffic light
#[derive(Debug, Clone)]
pub struct SignalHead {
    pub direction: Direction,
    pub color: LightColor,
    /// Seconds left in the current color, floored at zero
    pub time_remaining: u32,
    /// Green duration before any adaptive adjustment
    pub base_green_duration: u32,
    /// Recomputed from demand at every green entry
    pub current_green_duration: u32,
    pedestrian: PedestrianState,
    /// Green durations served so far, for the statistics sink
    green_history: Vec<u32>,
}

impl SignalHead {
    pub fn new(direction: Direction) -> Self {
        let base = DEFAULT_GREEN_SECS;
        Self {
            direction,
            color: LightColor::Red,
            time_remaining: 0,
            base_green_duration: base,
            current_green_duration: base,
            pedestrian: PedestrianState::Idle,
            green_history: Vec::new(),
        }
    }

    /// Set the color and reset the countdown for that color.
    ///
    /// Red gets a default hold estimate of one opposing green plus yellow;
    /// a pedestrian phase starting afterwards may extend it.
    pub fn set_color(&mut self, color: LightColor) {
        self.color = color;
        self.time_remaining = match color {
            LightColor::Green => self.current_green_duration,
            LightColor::Yellow => YELLOW_DURATION_SECS,
            LightColor::Red => self.current_green_duration + YELLOW_DURATION_SECS,
        };
        debug_assert!(
            !(self.color == LightColor::Green && self.pedestrian_active()),
            "head {} green while pedestrians active",
            self.direction
        );
    }

    /// One logic-second tick: count the color timer down, and the
    /// pedestrian timer if a crossing is in progress
    pub fn tick(&mut self) {
        self.time_remaining = self.time_remaining.saturating_sub(1);
        if let PedestrianState::Active { remaining } = &mut self.pedestrian {
            *remaining -= 1;
            if *remaining == 0 {
                self.end_pedestrian_phase();
            }
        }
    }

    /// Handle a pedestrian call button press.
    ///
    /// On a red head the crossing starts immediately (unless already in
    /// progress); otherwise the call is memorized for the next red.
    pub fn request_pedestrian(&mut self) {
        if self.color == LightColor::Red {
            if !self.pedestrian_active() {
                self.start_pedestrian_phase();
            }
        } else {
            self.pedestrian = PedestrianState::Requested;
        }
    }

    /// Grant pedestrians right of way on this crossing.
    ///
    /// Extends the red hold when it would otherwise end before the
    /// crossing finishes.
    pub fn start_pedestrian_phase(&mut self) {
        debug_assert_eq!(self.color, LightColor::Red);
        self.pedestrian = PedestrianState::Active {
            remaining: PEDESTRIAN_MIN_SECS,
        };
        if self.time_remaining < PEDESTRIAN_MIN_SECS {
            self.time_remaining = PEDESTRIAN_MIN_SECS;
        }
        debug!(
            "pedestrian crossing started on {} ({}s)",
            self.direction, PEDESTRIAN_MIN_SECS
        );
    }

    fn end_pedestrian_phase(&mut self) {
        self.pedestrian = PedestrianState::Idle;
        debug!("pedestrian crossing finished on {}", self.direction);
    }

    /// Recompute the green duration from the adaptive table.
    /// Pure setter: does not change the color.
    pub fn adjust_green_duration(&mut self, total_demand: u32) {
        self.current_green_duration = green_duration_for(total_demand);
    }

    /// Emergency override: force green with a fixed duration, bypassing
    /// the normal transition path. Ends any in-progress pedestrian phase
    /// so the red-only invariant keeps holding.
    pub fn force_green(&mut self, duration: u32) {
        if self.pedestrian_active() {
            self.end_pedestrian_phase();
        }
        self.current_green_duration = duration;
        self.color = LightColor::Green;
        self.time_remaining = duration;
    }

    /// Reset the countdown, used for the ambulance green extension
    pub fn extend(&mut self, seconds: u32) {
        self.time_remaining = seconds;
    }

    pub fn pedestrian_active(&self) -> bool {
        matches!(self.pedestrian, PedestrianState::Active { .. })
    }

    pub fn pedestrian_requested(&self) -> bool {
        self.pedestrian == PedestrianState::Requested
    }

    pub fn pedestrian_time_remaining(&self) -> u32 {
        match self.pedestrian {
            PedestrianState::Active { remaining } => remaining,
            _ => 0,
        }
    }

    /// Record the duration served for the current green, for cycle stats
    pub fn record_green_time(&mut self) {
        self.green_history.push(self.current_green_duration);
    }

    /// Mean of every green duration served so far
    pub fn mean_green_time(&self) -> f32 {
        if self.green_history.is_empty() {
            return 0.0;
        }
        self.green_history.iter().sum::<u32>() as f32 / self.green_history.len() as f32
    }
}
