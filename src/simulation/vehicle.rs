//! Vehicle state and straight-line motion along one approach

use super::types::{Direction, Position, VehicleId, AMBULANCE_SPEED, ORDINARY_SPEED};
use super::weather::Weather;

/// A vehicle travelling through the intersection
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub id: VehicleId,
    pub position: Position,
    pub direction: Direction,
    /// Ambulances get absolute priority and a dedicated motion rule
    pub is_emergency: bool,
    /// Base speed in px/s, before the weather factor
    pub base_speed: f32,
}

impl Vehicle {
    pub fn new(id: VehicleId, position: Position, direction: Direction, is_emergency: bool) -> Self {
        let base_speed = if is_emergency {
            AMBULANCE_SPEED
        } else {
            ORDINARY_SPEED
        };
        Self {
            id,
            position,
            direction,
            is_emergency,
            base_speed,
        }
    }

    /// Effective speed under the current weather
    pub fn speed(&self, weather: Weather) -> f32 {
        self.base_speed * weather.speed_factor()
    }

    /// Advance along the travel axis for one frame
    pub fn advance(&mut self, delta_secs: f32, weather: Weather) {
        let step = self.speed(weather) * delta_secs;
        match self.direction {
            Direction::North => self.position.y += step,
            Direction::South => self.position.y -= step,
            Direction::East => self.position.x -= step,
            Direction::West => self.position.x += step,
        }
    }

    /// Signed distance still to travel before reaching the center
    pub fn approach_distance(&self) -> f32 {
        self.direction.approach_distance(self.position)
    }

    pub fn in_stop_band(&self) -> bool {
        self.direction.in_stop_band(self.position)
    }

    pub fn in_conflict_zone(&self) -> bool {
        self.direction.in_conflict_zone(self.position)
    }

    pub fn has_exited(&self) -> bool {
        self.direction.has_exited(self.position)
    }
}
