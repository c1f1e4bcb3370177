//! Intersection controller: phase machine, vehicle queues, collisions
//!
//! The controller owns the four signal heads and the four approach queues.
//! It advances the green/yellow phase machine one logic second at a time,
//! moves vehicles per frame with stop-line and spacing gates, and declares
//! an incident when two crossing vehicles get too close inside the central
//! conflict zone.

use log::{debug, info, warn};
use rand::Rng;

use super::demand::DemandTracker;
use super::signal::{green_duration_for, SignalHead};
use super::types::{
    Axis, Direction, LightColor, PerDirection, Phase, Position, VehicleId,
    AMBULANCE_EXTENSION_FLOOR_SECS, AMBULANCE_EXTENSION_SECS, AMBULANCE_GREEN_SECS,
    AMBULANCE_NEAR_DISTANCE, AMBULANCE_PEDESTRIAN_MARGIN, APPROACH_ZONE_FAR, CENTER_X, CENTER_Y,
    COLLISION_THRESHOLD_X, COLLISION_THRESHOLD_Y, EARLY_EXIT_HOLDOFF_SECS,
    INCIDENT_INTERVENTION_SECS, INITIAL_VEHICLES_MAX, INITIAL_VEHICLES_MIN, SAFETY_GAP,
    SPAWN_INTERVAL_SECS, SPAWN_PROBABILITY, WAITING_ZONE_FAR, WAITING_ZONE_NEAR,
};
use super::vehicle::Vehicle;
use super::weather::Weather;

/// Two vehicles that got too close inside the conflict zone
#[derive(Debug, Clone)]
pub struct CollisionReport {
    pub ids: [VehicleId; 2],
    pub directions: [Direction; 2],
    pub location: Position,
}

/// An accident being cleared; the lights stay all-red until it resolves
#[derive(Debug, Clone)]
pub struct Incident {
    pub report: CollisionReport,
    /// Intervention seconds left before the wreck is towed away
    pub remaining: u32,
}

/// Produced whenever an axis is granted green, for demand history and the
/// statistics sink
#[derive(Debug, Clone, Copy)]
pub struct GreenEntry {
    pub axis: Axis,
    pub total_demand: u32,
    pub duration: u32,
    pub cycle_number: u32,
}

pub struct TrafficController {
    pub heads: PerDirection<SignalHead>,
    pub phase: Phase,
    queues: PerDirection<Vec<Vehicle>>,
    incident: Option<Incident>,
    /// Completed N-S green entries since start
    pub cycle_count: u32,
    pub accident_count: u32,
    next_vehicle_id: u32,
    spawn_timer: f32,
}

impl Default for TrafficController {
    fn default() -> Self {
        Self::new()
    }
}

impl TrafficController {
    pub fn new() -> Self {
        Self {
            heads: PerDirection::from_fn(SignalHead::new),
            phase: Phase::NsGreen,
            queues: PerDirection::from_fn(|_| Vec::new()),
            incident: None,
            cycle_count: 0,
            accident_count: 0,
            next_vehicle_id: 0,
            spawn_timer: 0.0,
        }
    }

    /// Reset to the initial signal state: N-S green, E-W red, counters
    /// cleared
    pub fn start(&mut self) {
        self.heads = PerDirection::from_fn(SignalHead::new);
        self.queues = PerDirection::from_fn(|_| Vec::new());
        self.incident = None;
        self.cycle_count = 0;
        self.accident_count = 0;
        self.spawn_timer = 0.0;
        // startup demand is zero, so the opening green takes the adaptive
        // minimum
        let demand = self.total_demand(Axis::NorthSouth);
        for direction in Axis::NorthSouth.directions() {
            let head = &mut self.heads[direction];
            head.adjust_green_duration(demand);
            head.set_color(LightColor::Green);
        }
        for direction in Axis::EastWest.directions() {
            self.heads[direction].set_color(LightColor::Red);
        }
        self.phase = Phase::NsGreen;
        info!("controller started, N-S green");
    }

    // --- phase machine -----------------------------------------------------

    /// Count every head's timers down by one second
    pub fn tick_heads(&mut self) {
        for direction in Direction::ALL {
            self.heads[direction].tick();
        }
    }

    /// Advance the phase machine after a one second tick.
    ///
    /// Returns a [`GreenEntry`] when an axis is granted a fresh green. Not
    /// called while an ambulance override or an incident holds the lights.
    pub fn evaluate_phase(&mut self) -> Option<GreenEntry> {
        match self.phase {
            Phase::NsGreen => {
                if self.heads[Direction::North].time_remaining == 0
                    || self.should_exit_early(Axis::NorthSouth)
                {
                    self.force_yellow_transition(Axis::NorthSouth);
                }
                None
            }
            Phase::EoGreen => {
                if self.heads[Direction::East].time_remaining == 0
                    || self.should_exit_early(Axis::EastWest)
                {
                    self.force_yellow_transition(Axis::EastWest);
                }
                None
            }
            Phase::NsYellow => self.finish_yellow(Axis::NorthSouth),
            Phase::EoYellow => self.finish_yellow(Axis::EastWest),
        }
    }

    /// An idle green axis yields early once it has held green for a while
    /// and the cross axis has vehicles waiting at its stop lines
    fn should_exit_early(&self, axis: Axis) -> bool {
        let head = &self.heads[axis.directions()[0]];
        let cross_waiting: u32 = axis
            .cross()
            .directions()
            .iter()
            .map(|&d| self.waiting_count(d))
            .sum();
        head.time_remaining + EARLY_EXIT_HOLDOFF_SECS < head.current_green_duration
            && self.total_demand(axis) == 0
            && cross_waiting > 0
    }

    /// Move an axis from green into its yellow clearance interval
    pub fn force_yellow_transition(&mut self, axis: Axis) {
        for direction in axis.directions() {
            self.heads[direction].set_color(LightColor::Yellow);
        }
        self.phase = match axis {
            Axis::NorthSouth => Phase::NsYellow,
            Axis::EastWest => Phase::EoYellow,
        };
        debug!("{axis} yellow");
    }

    /// Once yellow expires, drop the axis to red (starting any memorized
    /// pedestrian call) and grant the cross axis green as soon as no
    /// pedestrian phase is still running on it
    fn finish_yellow(&mut self, axis: Axis) -> Option<GreenEntry> {
        let lead = axis.directions()[0];
        if self.heads[lead].color == LightColor::Yellow {
            if self.heads[lead].time_remaining > 0 {
                return None;
            }
            for direction in axis.directions() {
                let head = &mut self.heads[direction];
                head.set_color(LightColor::Red);
                if head.pedestrian_requested() {
                    head.start_pedestrian_phase();
                }
            }
        }
        if self.pedestrian_active_on_axis(axis.cross()) {
            return None;
        }
        Some(self.grant_green(axis.cross()))
    }

    /// Give an axis green for an adaptively chosen duration
    fn grant_green(&mut self, axis: Axis) -> GreenEntry {
        let total_demand = self.total_demand(axis);
        let duration = green_duration_for(total_demand);
        for direction in axis.cross().directions() {
            let head = &mut self.heads[direction];
            if head.color != LightColor::Red {
                head.set_color(LightColor::Red);
            }
            if head.pedestrian_requested() {
                head.start_pedestrian_phase();
            }
        }
        for direction in axis.directions() {
            let head = &mut self.heads[direction];
            // also ends a pedestrian phase still running after an override
            // or incident resumption
            head.force_green(duration);
            head.record_green_time();
        }
        self.phase = match axis {
            Axis::NorthSouth => Phase::NsGreen,
            Axis::EastWest => Phase::EoGreen,
        };
        if axis == Axis::NorthSouth {
            self.cycle_count += 1;
        }
        debug!("{axis} green for {duration}s (demand {total_demand})");
        GreenEntry {
            axis,
            total_demand,
            duration,
            cycle_number: self.cycle_count,
        }
    }

    // --- ambulance override ------------------------------------------------

    /// Force green on the ambulance's axis, red everywhere else
    pub fn apply_override(&mut self, direction: Direction) {
        let axis = direction.axis();
        for d in axis.cross().directions() {
            let head = &mut self.heads[d];
            if head.color != LightColor::Red {
                head.set_color(LightColor::Red);
            }
        }
        for d in axis.directions() {
            self.heads[d].force_green(AMBULANCE_GREEN_SECS);
        }
        self.phase = match axis {
            Axis::NorthSouth => Phase::NsGreen,
            Axis::EastWest => Phase::EoGreen,
        };
        info!("priority green for {direction} traffic");
    }

    /// Keep the override green from expiring while the ambulance is still
    /// on its way through
    pub fn extend_override_green(&mut self, direction: Direction) {
        for d in direction.axis().directions() {
            let head = &mut self.heads[d];
            if head.time_remaining < AMBULANCE_EXTENSION_FLOOR_SECS {
                head.extend(AMBULANCE_EXTENSION_SECS);
            }
        }
    }

    /// Hand the lights back after an override, resuming on the axis that
    /// held right of way when the ambulance arrived
    pub fn end_override(&mut self, saved: Phase) -> GreenEntry {
        self.grant_green(saved.axis())
    }

    // --- vehicles ----------------------------------------------------------

    /// Insert a vehicle, keeping its queue ordered front to back by
    /// distance from the center
    pub fn spawn_at(
        &mut self,
        direction: Direction,
        position: Position,
        is_emergency: bool,
    ) -> VehicleId {
        let id = VehicleId(self.next_vehicle_id);
        self.next_vehicle_id += 1;
        let vehicle = Vehicle::new(id, position, direction, is_emergency);
        let d = vehicle.approach_distance();
        let queue = &mut self.queues[direction];
        let idx = queue
            .iter()
            .position(|v| v.approach_distance() > d)
            .unwrap_or(queue.len());
        queue.insert(idx, vehicle);
        id
    }

    pub fn spawn_ambulance(&mut self, direction: Direction) -> VehicleId {
        let id = self.spawn_at(direction, direction.spawn_point(), true);
        info!("ambulance dispatched from {direction}");
        id
    }

    /// Whether a fresh spawn would land on top of the rearmost queued
    /// vehicle
    fn spawn_blocked(&self, direction: Direction) -> bool {
        let spawn_d = direction.approach_distance(direction.spawn_point());
        self.queues[direction]
            .last()
            .is_some_and(|v| spawn_d - v.approach_distance() < SAFETY_GAP)
    }

    /// Timed arrival process: every spawn interval, each approach rolls
    /// against the spawn probability, capped by its current demand level
    pub fn spawn_tick<R: Rng>(&mut self, delta_secs: f32, demand: &mut DemandTracker, rng: &mut R) {
        self.spawn_timer += delta_secs;
        while self.spawn_timer >= SPAWN_INTERVAL_SECS {
            self.spawn_timer -= SPAWN_INTERVAL_SECS;
            for direction in Direction::ALL {
                if self.queues[direction].len() as u32 >= demand.level(direction) {
                    continue;
                }
                if self.spawn_blocked(direction) {
                    continue;
                }
                let forced = demand.take_burst(direction);
                if forced || rng.random_bool(SPAWN_PROBABILITY) {
                    self.spawn_at(direction, direction.spawn_point(), false);
                }
            }
        }
    }

    /// Seed each approach with a short starting queue behind its spawn
    /// point
    pub fn seed_initial_vehicles<R: Rng>(&mut self, rng: &mut R) {
        for direction in Direction::ALL {
            let count = rng.random_range(INITIAL_VEHICLES_MIN..=INITIAL_VEHICLES_MAX);
            let base = direction.spawn_point();
            let mut offset = 0.0;
            for _ in 0..count {
                self.spawn_at(direction, offset_behind(direction, base, offset), false);
                offset += SAFETY_GAP + rng.random_range(10.0..40.0);
            }
        }
    }

    pub fn clear_vehicles(&mut self) {
        self.queues = PerDirection::from_fn(|_| Vec::new());
    }

    /// Move every vehicle one frame, honoring spacing, stop lines, and the
    /// ambulance right-of-way rules
    pub fn update_vehicles(
        &mut self,
        delta_secs: f32,
        weather: Weather,
        override_direction: Option<Direction>,
    ) {
        // an active incident freezes all motion until the wreck is cleared
        if self.incident.is_some() {
            return;
        }
        let min_gap = SAFETY_GAP * weather.safety_distance_factor();
        for direction in Direction::ALL {
            let mut queue = std::mem::take(&mut self.queues[direction]);
            for i in 0..queue.len() {
                let gap_ok = i == 0
                    || queue[i].approach_distance() - queue[i - 1].approach_distance() >= min_gap;
                let may_move = gap_ok
                    && if queue[i].is_emergency {
                        self.ambulance_may_advance(&queue[i])
                    } else {
                        self.ordinary_may_advance(&queue[i], override_direction)
                    };
                if may_move {
                    queue[i].advance(delta_secs, weather);
                }
            }
            queue.retain(|v| !v.has_exited());
            self.queues[direction] = queue;
        }
    }

    fn ordinary_may_advance(&self, vehicle: &Vehicle, override_direction: Option<Direction>) -> bool {
        if vehicle.in_stop_band() {
            if let Some(over) = override_direction {
                if over.axis() != vehicle.direction.axis() {
                    return false;
                }
            }
            if self.heads[vehicle.direction].color != LightColor::Green {
                return false;
            }
        }
        true
    }

    /// Ambulances ignore the lights. Near the box they hold while a
    /// pedestrian crossing is active on either head of their axis, unless
    /// still beyond the safety margin, and otherwise enter only once the
    /// box holds no ordinary vehicle.
    fn ambulance_may_advance(&self, vehicle: &Vehicle) -> bool {
        let d = vehicle.approach_distance();
        if d > AMBULANCE_NEAR_DISTANCE {
            return true;
        }
        if self.pedestrian_active_on_axis(vehicle.direction.axis()) {
            return d > AMBULANCE_NEAR_DISTANCE + AMBULANCE_PEDESTRIAN_MARGIN;
        }
        self.conflict_zone_clear()
    }

    /// No ordinary vehicle inside the central conflict zone, on any axis
    fn conflict_zone_clear(&self) -> bool {
        Direction::ALL
            .iter()
            .all(|&d| self.queues[d].iter().all(|v| v.is_emergency || !v.in_conflict_zone()))
    }

    // --- collisions and incidents ------------------------------------------

    /// First pair of crossing vehicles closer than the collision
    /// thresholds inside the conflict zone
    pub fn detect_collision(&self) -> Option<CollisionReport> {
        let vehicles: Vec<&Vehicle> = Direction::ALL
            .iter()
            .flat_map(|&d| self.queues[d].iter())
            .collect();
        for i in 0..vehicles.len() {
            for j in (i + 1)..vehicles.len() {
                let (a, b) = (vehicles[i], vehicles[j]);
                if a.direction == b.direction {
                    continue;
                }
                if !a.in_conflict_zone() || !b.in_conflict_zone() {
                    continue;
                }
                if (a.position.x - b.position.x).abs() < COLLISION_THRESHOLD_X
                    && (a.position.y - b.position.y).abs() < COLLISION_THRESHOLD_Y
                {
                    return Some(CollisionReport {
                        ids: [a.id, b.id],
                        directions: [a.direction, b.direction],
                        location: a.position.midpoint(&b.position),
                    });
                }
            }
        }
        None
    }

    /// Declare an incident: every head drops to red and the phase machine
    /// freezes until the intervention finishes
    pub fn trigger_incident(&mut self, report: CollisionReport) {
        warn!(
            "collision at ({:.0}, {:.0}) between {} and {} traffic",
            report.location.x, report.location.y, report.directions[0], report.directions[1]
        );
        for direction in Direction::ALL {
            let head = &mut self.heads[direction];
            if head.color != LightColor::Red {
                head.set_color(LightColor::Red);
            }
        }
        self.accident_count += 1;
        self.incident = Some(Incident {
            report,
            remaining: INCIDENT_INTERVENTION_SECS,
        });
    }

    /// Count the intervention down; on expiry the wrecked vehicles are
    /// removed and `true` is returned so the caller can resume the lights
    pub fn advance_incident(&mut self, secs: u32) -> bool {
        match &mut self.incident {
            Some(incident) => {
                incident.remaining = incident.remaining.saturating_sub(secs);
                if incident.remaining > 0 {
                    return false;
                }
            }
            None => return false,
        }
        if let Some(incident) = self.incident.take() {
            for direction in Direction::ALL {
                self.queues[direction].retain(|v| !incident.report.ids.contains(&v.id));
            }
            info!("incident cleared");
        }
        true
    }

    /// After an incident, green goes to the busier axis; N-S wins ties
    pub fn resume_after_incident(&mut self) -> GreenEntry {
        let ns = self.total_demand(Axis::NorthSouth);
        let eo = self.total_demand(Axis::EastWest);
        let axis = if eo > ns {
            Axis::EastWest
        } else {
            Axis::NorthSouth
        };
        self.grant_green(axis)
    }

    /// Drop a stalled crossing pair into the middle of the box and declare
    /// the incident immediately. Refused while one is already being
    /// cleared.
    pub fn simulate_accident(&mut self) -> bool {
        if self.incident.is_some() {
            return false;
        }
        let a = self.spawn_at(
            Direction::North,
            Position::new(CENTER_X - 60.0, CENTER_Y),
            false,
        );
        let b = self.spawn_at(
            Direction::East,
            Position::new(CENTER_X, CENTER_Y - 60.0),
            false,
        );
        let location = Position::new(CENTER_X - 30.0, CENTER_Y - 30.0);
        self.trigger_incident(CollisionReport {
            ids: [a, b],
            directions: [Direction::North, Direction::East],
            location,
        });
        true
    }

    pub fn incident(&self) -> Option<&Incident> {
        self.incident.as_ref()
    }

    pub fn incident_active(&self) -> bool {
        self.incident.is_some()
    }

    // --- queries -----------------------------------------------------------

    pub fn queue(&self, direction: Direction) -> &[Vehicle] {
        &self.queues[direction]
    }

    pub fn vehicle_count(&self) -> usize {
        self.queues.iter().map(|(_, queue)| queue.len()).sum()
    }

    /// Vehicles stopped in the waiting band just behind the stop line
    pub fn waiting_count(&self, direction: Direction) -> u32 {
        self.queues[direction]
            .iter()
            .filter(|v| {
                let d = v.approach_distance();
                (WAITING_ZONE_NEAR..=WAITING_ZONE_FAR).contains(&d)
            })
            .count() as u32
    }

    /// Vehicles further out but already inside the approach zone
    pub fn approaching_count(&self, direction: Direction) -> u32 {
        self.queues[direction]
            .iter()
            .filter(|v| {
                let d = v.approach_distance();
                d > WAITING_ZONE_FAR && d <= APPROACH_ZONE_FAR
            })
            .count() as u32
    }

    /// Combined waiting plus approaching demand for both directions of an
    /// axis; this is what the adaptive green table keys on
    pub fn total_demand(&self, axis: Axis) -> u32 {
        axis.directions()
            .iter()
            .map(|&d| self.waiting_count(d) + self.approaching_count(d))
            .sum()
    }

    pub fn pedestrian_active_on_axis(&self, axis: Axis) -> bool {
        axis.directions()
            .iter()
            .any(|&d| self.heads[d].pedestrian_active())
    }

    pub fn request_pedestrian(&mut self, direction: Direction) {
        self.heads[direction].request_pedestrian();
    }

    pub fn mean_green_time(&self, axis: Axis) -> f32 {
        self.heads[axis.directions()[0]].mean_green_time()
    }
}

/// A position `offset` pixels behind `base` along an approach, away from
/// the center
fn offset_behind(direction: Direction, base: Position, offset: f32) -> Position {
    match direction {
        Direction::North => Position::new(base.x, base.y - offset),
        Direction::South => Position::new(base.x, base.y + offset),
        Direction::East => Position::new(base.x + offset, base.y),
        Direction::West => Position::new(base.x - offset, base.y),
    }
}
