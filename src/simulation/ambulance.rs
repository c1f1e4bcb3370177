//! Ambulance detection and signal preemption
//!
//! Watches the approach queues for an emergency vehicle inside the
//! detection band, asks the controller for a forced green on its axis, and
//! hands the saved phase back once the ambulance has cleared the
//! intersection.

use log::info;

use super::controller::TrafficController;
use super::types::{
    Direction, Phase, AMBULANCE_CLEARANCE_DISTANCE, AMBULANCE_DETECTION_DISTANCE,
    AMBULANCE_ENTRY_DISTANCE,
};

#[derive(Debug, Default)]
pub struct AmbulancePriorityManager {
    active_direction: Option<Direction>,
    /// Phase to restore once the override ends; captured at activation
    saved_phase: Option<Phase>,
    ambulances_dispatched: u32,
}

impl AmbulancePriorityManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_direction(&self) -> Option<Direction> {
        self.active_direction
    }

    pub fn override_active(&self) -> bool {
        self.active_direction.is_some()
    }

    pub fn saved_phase(&self) -> Option<Phase> {
        self.saved_phase
    }

    pub fn ambulances_dispatched(&self) -> u32 {
        self.ambulances_dispatched
    }

    pub fn record_spawn(&mut self) {
        self.ambulances_dispatched += 1;
    }

    /// First approach with an ambulance inside the detection band, scanned
    /// in fixed N, S, E, W order. Detection is suspended while an incident
    /// is being cleared.
    pub fn detect_approaching(&self, controller: &TrafficController) -> Option<Direction> {
        if controller.incident_active() {
            return None;
        }
        for direction in Direction::ALL {
            let found = controller.queue(direction).iter().any(|v| {
                let d = v.approach_distance();
                v.is_emergency && d > AMBULANCE_ENTRY_DISTANCE && d <= AMBULANCE_DETECTION_DISTANCE
            });
            if found {
                return Some(direction);
            }
        }
        None
    }

    /// Begin an override for a direction. Returns false when that
    /// direction already holds the override; the saved phase is only
    /// captured on the first activation.
    pub fn activate(&mut self, direction: Direction, current_phase: Phase) -> bool {
        if self.active_direction == Some(direction) {
            return false;
        }
        if self.active_direction.is_none() {
            self.saved_phase = Some(current_phase);
        }
        self.active_direction = Some(direction);
        info!("ambulance priority engaged for {direction}");
        true
    }

    /// Check whether the ambulance has cleared the intersection. Returns
    /// the phase to restore once no emergency vehicle on the override
    /// approach is still short of the clearance distance.
    pub fn verify_passed(&mut self, controller: &TrafficController) -> Option<Phase> {
        let direction = self.active_direction?;
        let still_crossing = controller
            .queue(direction)
            .iter()
            .any(|v| v.is_emergency && v.approach_distance() > -AMBULANCE_CLEARANCE_DISTANCE);
        if still_crossing {
            return None;
        }
        info!("ambulance cleared, restoring normal operation");
        self.active_direction = None;
        self.saved_phase.take()
    }

    /// Drop the override without restoring anything; used when an incident
    /// takes over the lights
    pub fn cancel(&mut self) {
        self.active_direction = None;
        self.saved_phase = None;
    }
}
