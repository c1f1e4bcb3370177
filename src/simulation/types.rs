//! Core types and fixed geometry for the intersection simulation
//!
//! All distances are in the original pixel coordinate system: the
//! intersection center sits at (500, 450) on a 1600x900 plane, vehicles
//! approach along one axis and exit on the far side.

use serde::Serialize;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

/// A unique identifier for vehicles
/// Simple wrapper around a u32 for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VehicleId(pub u32);

/// One of the four approaches to the intersection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Entering from the top, travelling downward
    North,
    /// Entering from the bottom, travelling upward
    South,
    /// Entering from the right, travelling leftward
    East,
    /// Entering from the left, travelling rightward
    West,
}

/// An axis pair of directions that always share the same right-of-way phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Axis {
    NorthSouth,
    EastWest,
}

/// The color shown by a signal head
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightColor {
    Red,
    Yellow,
    Green,
}

/// The intersection-wide phase state machine
///
/// Pedestrian servicing is not its own phase: it happens as a side effect
/// of the Yellow -> Red transition and runs in parallel with the next green.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NsGreen,
    NsYellow,
    EoGreen,
    EoYellow,
}

/// A 2D position on the simulation plane
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Midpoint between two positions
    pub fn midpoint(&self, other: &Position) -> Position {
        Position {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }
}

/// Intersection center
pub const CENTER_X: f32 = 500.0;
pub const CENTER_Y: f32 = 450.0;

/// Half extent of the central square conflict zone
pub const CONFLICT_ZONE_HALF_EXTENT: f32 = 120.0;

/// Demand counting bands, measured as approach distance from the center
pub const WAITING_ZONE_NEAR: f32 = 120.0;
pub const WAITING_ZONE_FAR: f32 = 180.0;
pub const APPROACH_ZONE_FAR: f32 = 300.0;

/// Minimum gap to the vehicle ahead in the same queue, before weather scaling
pub const SAFETY_GAP: f32 = 50.0;

/// Pairwise positional deltas that count as a collision inside the zone
pub const COLLISION_THRESHOLD_X: f32 = 35.0;
pub const COLLISION_THRESHOLD_Y: f32 = 30.0;

/// Signal timing
pub const YELLOW_DURATION_SECS: u32 = 3;
pub const DEFAULT_GREEN_SECS: u32 = 30;
pub const PEDESTRIAN_MIN_SECS: u32 = 7;
pub const EARLY_EXIT_HOLDOFF_SECS: u32 = 5;

/// Incident intervention time once a collision is declared
pub const INCIDENT_INTERVENTION_SECS: u32 = 5;

/// Ambulance priority parameters
pub const AMBULANCE_GREEN_SECS: u32 = 30;
pub const AMBULANCE_EXTENSION_SECS: u32 = 10;
pub const AMBULANCE_EXTENSION_FLOOR_SECS: u32 = 3;
pub const AMBULANCE_DETECTION_DISTANCE: f32 = 300.0;
pub const AMBULANCE_ENTRY_DISTANCE: f32 = 140.0;
pub const AMBULANCE_NEAR_DISTANCE: f32 = 170.0;
pub const AMBULANCE_PEDESTRIAN_MARGIN: f32 = 20.0;
pub const AMBULANCE_CLEARANCE_DISTANCE: f32 = 200.0;

/// Vehicle speeds in px/s, before weather scaling
pub const ORDINARY_SPEED: f32 = 180.0;
pub const AMBULANCE_SPEED: f32 = 300.0;

/// Spawning cadence
pub const SPAWN_INTERVAL_SECS: f32 = 0.5;
pub const SPAWN_PROBABILITY: f64 = 0.6;
pub const INITIAL_VEHICLES_MIN: u32 = 2;
pub const INITIAL_VEHICLES_MAX: u32 = 3;

/// Rolling per-cycle demand history length
pub const HISTORY_LEN: usize = 30;

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub fn axis(self) -> Axis {
        match self {
            Direction::North | Direction::South => Axis::NorthSouth,
            Direction::East | Direction::West => Axis::EastWest,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::South => 1,
            Direction::East => 2,
            Direction::West => 3,
        }
    }

    /// Signed distance from the intersection center along this approach.
    /// Positive while the vehicle has not yet reached the center, negative
    /// once it is past it.
    pub fn approach_distance(self, position: Position) -> f32 {
        match self {
            Direction::North => CENTER_Y - position.y,
            Direction::South => position.y - CENTER_Y,
            Direction::East => position.x - CENTER_X,
            Direction::West => CENTER_X - position.x,
        }
    }

    /// Stop-line band for this approach as an approach-distance interval.
    /// The bands are asymmetric, matching the painted stop lines.
    pub fn stop_band(self) -> (f32, f32) {
        match self {
            Direction::North => (160.0, 170.0),
            Direction::South => (140.0, 170.0),
            Direction::East => (130.0, 190.0),
            Direction::West => (120.0, 180.0),
        }
    }

    /// Whether a position sits inside this approach's stop-line band
    pub fn in_stop_band(self, position: Position) -> bool {
        let d = self.approach_distance(position);
        let (near, far) = self.stop_band();
        d >= near && d <= far
    }

    /// Whether a position sits inside the central conflict zone, tested
    /// along this approach's travel axis
    pub fn in_conflict_zone(self, position: Position) -> bool {
        match self.axis() {
            Axis::NorthSouth => (position.y - CENTER_Y).abs() <= CONFLICT_ZONE_HALF_EXTENT,
            Axis::EastWest => (position.x - CENTER_X).abs() <= CONFLICT_ZONE_HALF_EXTENT,
        }
    }

    /// Fixed spawn point for this approach
    pub fn spawn_point(self) -> Position {
        match self {
            Direction::North => Position::new(CENTER_X - 60.0, 20.0),
            Direction::South => Position::new(CENTER_X + 60.0, 880.0),
            Direction::East => Position::new(980.0, CENTER_Y - 60.0),
            Direction::West => Position::new(20.0, CENTER_Y + 60.0),
        }
    }

    /// Whether a position is past this approach's exit boundary
    pub fn has_exited(self, position: Position) -> bool {
        match self {
            Direction::North => position.y > 950.0,
            Direction::South => position.y < -50.0,
            Direction::East => position.x < -50.0,
            Direction::West => position.x > 1000.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Direction::North => "North",
            Direction::South => "South",
            Direction::East => "East",
            Direction::West => "West",
        };
        write!(f, "{label}")
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "north" | "n" => Ok(Direction::North),
            "south" | "s" => Ok(Direction::South),
            "east" | "e" => Ok(Direction::East),
            "west" | "w" => Ok(Direction::West),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}

impl Axis {
    pub fn directions(self) -> [Direction; 2] {
        match self {
            Axis::NorthSouth => [Direction::North, Direction::South],
            Axis::EastWest => [Direction::East, Direction::West],
        }
    }

    pub fn cross(self) -> Axis {
        match self {
            Axis::NorthSouth => Axis::EastWest,
            Axis::EastWest => Axis::NorthSouth,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Axis::NorthSouth => "N-S",
            Axis::EastWest => "E-W",
        };
        write!(f, "{label}")
    }
}

impl Phase {
    /// The axis this phase belongs to
    pub fn axis(self) -> Axis {
        match self {
            Phase::NsGreen | Phase::NsYellow => Axis::NorthSouth,
            Phase::EoGreen | Phase::EoYellow => Axis::EastWest,
        }
    }
}

/// Fixed-size map keyed by [`Direction`]
#[derive(Debug, Clone, Default)]
pub struct PerDirection<T>([T; 4]);

impl<T> PerDirection<T> {
    pub fn from_fn(mut f: impl FnMut(Direction) -> T) -> Self {
        Self(Direction::ALL.map(&mut f))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Direction, &T)> {
        Direction::ALL.iter().map(move |&d| (d, &self.0[d.index()]))
    }
}

impl<T> Index<Direction> for PerDirection<T> {
    type Output = T;

    fn index(&self, direction: Direction) -> &T {
        &self.0[direction.index()]
    }
}

impl<T> IndexMut<Direction> for PerDirection<T> {
    fn index_mut(&mut self, direction: Direction) -> &mut T {
        &mut self.0[direction.index()]
    }
}
