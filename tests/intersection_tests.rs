//! End-to-end controller and world behavior

use intersection_sim::simulation::{
    Axis, CsvSink, CycleRecord, Direction, LightColor, MemorySink, Phase, Position, SimWorld,
    StatsSink, TrafficController,
};

/// Fresh running world with the seeded starting traffic removed, so the
/// early signal behavior is fully deterministic
fn empty_world(seed: u64) -> SimWorld {
    let mut world = SimWorld::new_with_seed(seed);
    assert!(world.start().is_accepted());
    world.controller.clear_vehicles();
    world
}

#[test]
fn test_startup_state() {
    let mut world = SimWorld::new_with_seed(1);
    assert!(world.start().is_accepted());

    assert_eq!(world.controller.phase, Phase::NsGreen);
    assert_eq!(world.controller.heads[Direction::North].color, LightColor::Green);
    assert_eq!(world.controller.heads[Direction::South].color, LightColor::Green);
    assert_eq!(world.controller.heads[Direction::East].color, LightColor::Red);
    assert_eq!(world.controller.heads[Direction::West].color, LightColor::Red);
    // zero demand at startup takes the shortest adaptive green
    assert_eq!(world.controller.heads[Direction::North].time_remaining, 10);

    // each approach starts with a short queue, ordered front to back
    for direction in Direction::ALL {
        let queue = world.controller.queue(direction);
        assert!((2..=3).contains(&queue.len()));
        for pair in queue.windows(2) {
            assert!(pair[0].approach_distance() <= pair[1].approach_distance());
        }
    }
}

#[test]
fn test_full_phase_cycle_with_empty_roads() {
    let mut world = empty_world(7);

    for _ in 0..10 {
        world.tick(1.0);
    }
    assert_eq!(world.controller.phase, Phase::NsYellow);
    assert_eq!(world.controller.heads[Direction::North].color, LightColor::Yellow);
    assert_eq!(world.controller.heads[Direction::East].color, LightColor::Red);

    for _ in 0..3 {
        world.tick(1.0);
    }
    // empty roads mean the shortest adaptive green
    assert_eq!(world.controller.phase, Phase::EoGreen);
    assert_eq!(world.controller.heads[Direction::East].color, LightColor::Green);
    assert_eq!(world.controller.heads[Direction::East].current_green_duration, 10);
    assert_eq!(world.controller.heads[Direction::North].color, LightColor::Red);
}

#[test]
fn test_early_exit_when_cross_traffic_waits() {
    let mut world = empty_world(11);
    // one vehicle waiting at the eastern stop line, nothing on N-S
    world
        .controller
        .spawn_at(Direction::East, Position::new(650.0, 390.0), false);

    for _ in 0..6 {
        world.tick(1.0);
    }
    // the idle green yields before its timer runs out
    assert_eq!(world.controller.phase, Phase::NsYellow);

    for _ in 0..3 {
        world.tick(1.0);
    }
    assert_eq!(world.controller.phase, Phase::EoGreen);
    assert_eq!(world.controller.heads[Direction::East].current_green_duration, 15);
}

#[test]
fn test_pedestrian_call_serviced_at_red() {
    let mut world = empty_world(5);

    assert!(world.request_pedestrian(Direction::North).is_accepted());
    assert!(world.controller.heads[Direction::North].pedestrian_requested());

    // 10s green plus 3s yellow brings N-S to red
    for _ in 0..13 {
        world.tick(1.0);
    }
    // N-S just dropped to red; the memorized call starts now
    let north = &world.controller.heads[Direction::North];
    assert!(north.pedestrian_active());
    assert_eq!(north.color, LightColor::Red);
    assert_eq!(world.controller.heads[Direction::East].color, LightColor::Green);

    for _ in 0..7 {
        let north = &world.controller.heads[Direction::North];
        if north.pedestrian_active() {
            assert_eq!(north.color, LightColor::Red);
        }
        world.tick(1.0);
    }
    assert!(!world.controller.heads[Direction::North].pedestrian_active());
}

#[test]
fn test_ambulance_preemption_and_restore() {
    let mut world = empty_world(3);
    assert!(world.spawn_ambulance(Direction::North).is_accepted());
    assert_eq!(world.ambulances.ambulances_dispatched(), 1);

    // 300 px/s at 20 fps: detected once inside the 300 px band
    for _ in 0..9 {
        world.tick(0.05);
    }
    assert!(world.ambulances.override_active());
    assert_eq!(world.ambulances.active_direction(), Some(Direction::North));
    assert_eq!(world.ambulances.saved_phase(), Some(Phase::NsGreen));
    assert_eq!(world.controller.heads[Direction::North].color, LightColor::Green);
    assert_eq!(world.controller.heads[Direction::North].time_remaining, 30);
    assert_eq!(world.controller.heads[Direction::East].color, LightColor::Red);

    // a second ambulance takes the override over once the first has left
    // the detection band; the phase saved at the first activation is kept
    assert!(world.spawn_ambulance(Direction::South).is_accepted());
    assert_eq!(world.ambulances.ambulances_dispatched(), 2);
    for _ in 0..11 {
        world.tick(0.05);
    }
    assert_eq!(world.ambulances.active_direction(), Some(Direction::South));
    assert_eq!(world.ambulances.saved_phase(), Some(Phase::NsGreen));

    // let both cross and clear the 200 px clearance distance
    for _ in 0..33 {
        world.tick(0.05);
    }
    assert!(!world.ambulances.override_active());
    assert_eq!(world.ambulances.saved_phase(), None);
    // normal operation resumed on the saved axis, with adaptive timing
    assert_eq!(world.controller.phase, Phase::NsGreen);
    assert_eq!(world.controller.heads[Direction::North].current_green_duration, 10);
}

#[test]
fn test_override_activation_is_idempotent() {
    use intersection_sim::simulation::AmbulancePriorityManager;

    let mut manager = AmbulancePriorityManager::new();
    assert!(manager.activate(Direction::North, Phase::EoGreen));
    assert_eq!(manager.saved_phase(), Some(Phase::EoGreen));

    // re-detecting the same direction is a no-op
    assert!(!manager.activate(Direction::North, Phase::NsGreen));
    assert_eq!(manager.saved_phase(), Some(Phase::EoGreen));

    // a different direction takes over, but the saved phase is kept
    assert!(manager.activate(Direction::East, Phase::NsGreen));
    assert_eq!(manager.active_direction(), Some(Direction::East));
    assert_eq!(manager.saved_phase(), Some(Phase::EoGreen));
}

#[test]
fn test_ambulance_yields_to_crossing_traffic_in_the_box() {
    let mut world = empty_world(13);
    // ambulance just short of the box, below the detection band
    world
        .controller
        .spawn_at(Direction::North, Position::new(440.0, 350.0), true);
    // a crossing vehicle still inside the conflict zone
    world
        .controller
        .spawn_at(Direction::East, Position::new(450.0, 390.0), false);

    world.tick(0.05);
    assert!(!world.ambulances.override_active());
    let ambulance = &world.controller.queue(Direction::North)[0];
    assert_eq!(ambulance.position.y, 350.0);
}

#[test]
fn test_ambulance_holds_for_crossing_pedestrians_on_its_axis() {
    let mut world = empty_world(43);
    // west head is red under the initial N-S green, so the call activates
    assert!(world.request_pedestrian(Direction::West).is_accepted());
    assert!(world.controller.heads[Direction::West].pedestrian_active());

    // ambulance close to the box on the other head of the same axis,
    // below the detection band
    world
        .controller
        .spawn_at(Direction::East, Position::new(630.0, 390.0), true);

    for _ in 0..3 {
        world.tick(0.05);
    }
    assert!(!world.ambulances.override_active());
    let ambulance = &world.controller.queue(Direction::East)[0];
    assert_eq!(ambulance.position.x, 630.0);
}

#[test]
fn test_collision_triggers_incident_and_recovery() {
    let mut world = empty_world(17);
    world
        .controller
        .spawn_at(Direction::North, Position::new(440.0, 450.0), false);
    world
        .controller
        .spawn_at(Direction::East, Position::new(450.0, 455.0), false);

    world.tick(0.05);
    assert!(world.controller.incident_active());
    assert_eq!(world.controller.accident_count, 1);
    for direction in Direction::ALL {
        assert_eq!(world.controller.heads[direction].color, LightColor::Red);
    }

    // five seconds of intervention, wreck frozen in place
    for _ in 0..4 {
        world.tick(1.0);
        assert!(world.controller.incident_active());
        assert_eq!(world.controller.vehicle_count(), 2);
    }
    world.tick(1.0);
    assert!(!world.controller.incident_active());
    assert_eq!(world.controller.vehicle_count(), 0);
    // both axes empty: N-S wins the tie
    assert_eq!(world.controller.phase, Phase::NsGreen);
    assert_eq!(world.controller.heads[Direction::North].color, LightColor::Green);
}

#[test]
fn test_same_direction_queue_never_collides() {
    let mut world = empty_world(19);
    world
        .controller
        .spawn_at(Direction::North, Position::new(440.0, 440.0), false);
    world
        .controller
        .spawn_at(Direction::North, Position::new(440.0, 470.0), false);
    assert!(world.controller.detect_collision().is_none());
}

#[test]
fn test_simulated_accident_command() {
    let mut world = empty_world(23);

    assert!(world.trigger_accident().is_accepted());
    assert_eq!(world.controller.vehicle_count(), 2);
    assert!(world.controller.incident_active());
    assert_eq!(world.controller.incident().map(|i| i.remaining), Some(5));

    // only one intervention at a time
    assert!(!world.trigger_accident().is_accepted());
}

#[test]
fn test_red_light_holds_vehicles_at_the_stop_line() {
    let mut world = empty_world(29);
    // east approach is red during the initial N-S green
    world
        .controller
        .spawn_at(Direction::East, Position::new(680.0, 390.0), false);

    for _ in 0..10 {
        world.tick(0.05);
    }
    let vehicle = &world.controller.queue(Direction::East)[0];
    assert_eq!(vehicle.position.x, 680.0);
}

#[test]
fn test_green_light_releases_vehicles() {
    let mut world = empty_world(31);
    world
        .controller
        .spawn_at(Direction::North, Position::new(440.0, 285.0), false);

    for _ in 0..10 {
        world.tick(0.05);
    }
    let vehicle = &world.controller.queue(Direction::North)[0];
    assert!((vehicle.position.y - 375.0).abs() < 0.1);
}

#[test]
fn test_safety_gap_holds_followers_back() {
    let mut world = empty_world(37);
    let leader = world
        .controller
        .spawn_at(Direction::North, Position::new(440.0, 100.0), false);
    let follower = world
        .controller
        .spawn_at(Direction::North, Position::new(440.0, 60.0), false);

    world.tick(0.05);
    let queue = world.controller.queue(Direction::North);
    assert_eq!(queue[0].id, leader);
    assert_eq!(queue[1].id, follower);
    assert!((queue[0].position.y - 109.0).abs() < 0.01);
    // 40 px gap is below the 50 px minimum, so the follower waits
    assert_eq!(queue[1].position.y, 60.0);

    world.tick(0.05);
    let queue = world.controller.queue(Direction::North);
    assert!((queue[0].position.y - 118.0).abs() < 0.01);
    assert!((queue[1].position.y - 69.0).abs() < 0.01);
}

#[test]
fn test_no_spawning_before_first_demand_sample() {
    let mut world = empty_world(41);
    for _ in 0..20 {
        world.tick(0.5);
    }
    assert_eq!(world.controller.vehicle_count(), 0);
}

#[test]
fn test_long_run_invariants() {
    let mut world = SimWorld::new_with_seed(99);
    assert!(world.start().is_accepted());

    for _ in 0..4000 {
        world.tick(0.5);
        let heads = &world.controller.heads;
        // conflicting axes never share right of way
        assert!(
            heads[Direction::North].color == LightColor::Red
                || heads[Direction::East].color == LightColor::Red
        );
        for direction in Direction::ALL {
            let head = &heads[direction];
            if head.pedestrian_active() {
                assert_eq!(head.color, LightColor::Red);
            }
        }
    }

    assert!(world.demand.history_ns().len() <= 30);
    assert!(world.demand.history_eo().len() <= 30);
    assert!(world.controller.cycle_count > 0);
}

#[test]
fn test_override_green_extension() {
    let mut controller = TrafficController::new();
    controller.start();
    controller.apply_override(Direction::North);

    controller.heads[Direction::North].time_remaining = 2;
    controller.extend_override_green(Direction::North);
    assert_eq!(controller.heads[Direction::North].time_remaining, 10);

    // above the floor, the timer is left alone
    controller.heads[Direction::North].time_remaining = 5;
    controller.extend_override_green(Direction::North);
    assert_eq!(controller.heads[Direction::North].time_remaining, 5);
}

#[test]
fn test_command_rejections_when_stopped() {
    let mut world = SimWorld::new_with_seed(2);
    assert!(!world.request_pedestrian(Direction::North).is_accepted());
    assert!(!world.spawn_ambulance(Direction::East).is_accepted());
    assert!(!world.trigger_accident().is_accepted());
    assert!(!world.stop().is_accepted());

    assert!(world.start().is_accepted());
    assert!(!world.start().is_accepted());
    assert!(world.stop().is_accepted());
    assert!(!world.stop().is_accepted());
}

#[test]
fn test_memory_sink_records_first_cycle() {
    let sink = MemorySink::new();
    let records = sink.records();
    let mut world = SimWorld::new_with_seed(1).with_sink(Box::new(sink));
    assert!(world.start().is_accepted());
    world.controller.clear_vehicles();

    for _ in 0..13 {
        world.tick(1.0);
    }

    let records = records.borrow();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.cycle_number, 0);
    assert_eq!(record.axis, Axis::EastWest);
    assert_eq!(record.total_demand, 0);
    assert_eq!(record.green_duration, 10);
    assert_eq!(record.mean_green_duration, 10.0);
    assert_eq!(record.mean_demand, 0.0);
}

#[test]
fn test_csv_sink_appends_with_single_header() {
    let path = std::env::temp_dir().join("intersection_sim_stats_test.csv");
    let _ = std::fs::remove_file(&path);

    let record = CycleRecord {
        cycle_number: 1,
        axis: Axis::NorthSouth,
        total_demand: 4,
        green_duration: 25,
        mean_green_duration: 25.0,
        mean_demand: 4.0,
        timestamp: 0,
    };

    {
        let mut sink = CsvSink::open(&path).unwrap();
        sink.record_cycle(&record).unwrap();
        sink.record_cycle(&record).unwrap();
    }
    {
        // reopening appends without repeating the header
        let mut sink = CsvSink::open(&path).unwrap();
        sink.record_cycle(&record).unwrap();
    }

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("cycle_number,axis"));
    assert_eq!(lines.iter().filter(|l| l.starts_with("cycle_number")).count(), 1);

    let _ = std::fs::remove_file(&path);
}
