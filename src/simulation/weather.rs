//! Weather state affecting vehicle speed and spacing
//!
//! Held by the orchestrator and passed into the motion code; there is no
//! global instance.

/// Current weather over the intersection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Weather {
    #[default]
    Normal,
    Rain,
}

impl Weather {
    /// Multiplier applied to every vehicle's base speed
    pub fn speed_factor(self) -> f32 {
        match self {
            Weather::Normal => 1.0,
            Weather::Rain => 0.7,
        }
    }

    /// Multiplier applied to the minimum safety gap between queued vehicles
    pub fn safety_distance_factor(self) -> f32 {
        match self {
            Weather::Normal => 1.0,
            Weather::Rain => 1.2,
        }
    }

    pub fn toggle(&mut self) -> Weather {
        *self = match self {
            Weather::Normal => Weather::Rain,
            Weather::Rain => Weather::Normal,
        };
        *self
    }

    pub fn is_rain(self) -> bool {
        self == Weather::Rain
    }
}
