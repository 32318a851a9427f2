use approx::assert_relative_eq;
use nbody_sandbox::{
    Body, BreakReason, Event, NullSink, OrbitSpec, SimConfig, SimError, Simulation, Vec2,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Gravity only, no merging or spontaneous springs.
fn gravity_only() -> SimConfig {
    SimConfig {
        g: 1.0,
        dt: 0.01,
        enable_merging: false,
        enable_spring_field: false,
        ..SimConfig::default()
    }
}

#[test]
fn two_body_step_obeys_momentum_conservation() {
    init_logging();
    let mut sim = Simulation::new(gravity_only()).unwrap();
    let dt = sim.dt();

    let light = sim
        .insert_body(Body::new(Vec2::new(-0.5, 0.0), 100.0, [255, 0, 0]).with_radius(0.1), &mut NullSink)
        .unwrap();
    let heavy = sim
        .insert_body(Body::new(Vec2::new(0.5, 0.0), 200.0, [0, 0, 255]).with_radius(0.1), &mut NullSink)
        .unwrap();

    sim.tick(&mut NullSink);

    let a = *sim.body(light).unwrap();
    let b = *sim.body(heavy).unwrap();

    // F = G m1 m2 / d^2 = 20000, toward each other.
    assert_relative_eq!(a.force.x, 20_000.0, max_relative = 1e-5);
    assert_relative_eq!(b.force.x, -20_000.0, max_relative = 1e-5);

    let acc_light = a.force / a.mass;
    let acc_heavy = b.force / b.mass;
    assert_relative_eq!(acc_light.mag() / acc_heavy.mag(), 2.0, max_relative = 1e-5);

    let (va, vb) = (a.velocity(dt), b.velocity(dt));
    assert!(va.x > 0.0 && vb.x < 0.0);
    assert_relative_eq!(va.mag() / vb.mag(), 2.0, max_relative = 1e-3);
    let momentum = va * a.mass + vb * b.mass;
    assert!(momentum.mag() < 1e-3 * (va.mag() * a.mass));
}

#[test]
fn orbiting_system_keeps_its_mass() {
    init_logging();
    let mut sim = Simulation::with_seed(
        SimConfig {
            g: 1.0,
            dt: 0.01,
            ..SimConfig::default()
        },
        42,
    )
    .unwrap();
    let mut events = Vec::new();

    let sun = sim.add_body(Vec2::zero(), Vec2::zero(), 1e4, [255, 255, 0], &mut events).unwrap();
    let spec = OrbitSpec {
        count: 60,
        distance_mean: 80.0,
        distance_std: 20.0,
        mass_ratio_mean: 1e-3,
        mass_ratio_std: 2e-4,
        eccentricity: 0.1,
    };
    sim.spawn_orbital_bodies(sun, &spec, &mut events).unwrap();
    let mass = sim.bodies().total_mass();

    let mut now = 0;
    for _ in 0..300 {
        now += 10;
        sim.update(now, &mut events);
    }

    assert!(sim.frame() >= 290);
    assert_relative_eq!(sim.bodies().total_mass(), mass, max_relative = 1e-4);
    for (_, body) in sim.bodies().iter() {
        assert!(body.pos.x.is_finite() && body.pos.y.is_finite());
        assert!(body.is_valid());
    }

    let merges = events
        .iter()
        .filter(|e| matches!(e, Event::BodiesMerged { .. }))
        .count();
    assert_eq!(sim.bodies().len(), 61 - merges);
}

#[test]
fn flung_body_snaps_its_spring() {
    init_logging();
    let mut sim = Simulation::new(SimConfig {
        g: 0.0,
        ..gravity_only()
    })
    .unwrap();
    let mut events = Vec::new();

    let anchor = sim.add_body(Vec2::zero(), Vec2::zero(), 1.0, [0; 3], &mut events).unwrap();
    let flung = sim.add_body(Vec2::new(4.0, 0.0), Vec2::zero(), 1.0, [0; 3], &mut events).unwrap();
    sim.link(anchor, flung, &mut events).unwrap();

    sim.tick(&mut events);
    assert_eq!(sim.composites().len(), 1);

    sim.set_velocity(flung, Vec2::new(1_000.0, 0.0)).unwrap();
    for _ in 0..3 {
        sim.tick(&mut events);
    }

    assert!(sim.springs().is_empty());
    assert!(sim.composites().is_empty());
    let broken: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::SpringBroken { a, b, reason, .. } => Some((*a, *b, *reason)),
            _ => None,
        })
        .collect();
    assert_eq!(broken, vec![(anchor, flung, BreakReason::Stretched)]);
}

#[test]
fn paused_simulation_does_not_move() {
    init_logging();
    let mut sim = Simulation::new(gravity_only()).unwrap();
    let mut events = Vec::new();
    let id = sim
        .add_body(Vec2::zero(), Vec2::new(5.0, 0.0), 1.0, [0; 3], &mut events)
        .unwrap();

    sim.update(0, &mut events);
    sim.update(100, &mut events);
    let before = *sim.body(id).unwrap();

    sim.pause(&mut events);
    for t in (200..5_000).step_by(100) {
        assert_eq!(sim.update(t, &mut events), 0);
    }
    assert_eq!(*sim.body(id).unwrap(), before);

    sim.resume(5_000, &mut events);
    sim.update(5_020, &mut events);
    let after = sim.body(id).unwrap();
    // Resumed motion continues from where it stopped, not from 5 s later.
    assert!(after.pos.x > before.pos.x);
    assert!(after.pos.x - before.pos.x < 1.0);
}

#[test]
fn clear_invalidates_every_id() {
    init_logging();
    let mut sim = Simulation::new(gravity_only()).unwrap();
    let mut events = Vec::new();
    let id = sim.add_body(Vec2::zero(), Vec2::zero(), 1.0, [0; 3], &mut events).unwrap();

    sim.clear(&mut events);
    assert!(sim.bodies().is_empty());
    assert_eq!(sim.select(id), Err(SimError::StaleBody(id)));
    assert_eq!(events.last(), Some(&Event::Cleared));

    let fresh = sim.add_body(Vec2::zero(), Vec2::zero(), 1.0, [0; 3], &mut events).unwrap();
    assert_ne!(fresh, id);
    sim.select(fresh).unwrap();
    assert_eq!(sim.selected().collect::<Vec<_>>(), vec![fresh]);
}

#[test]
fn yaml_config_drives_the_simulation() {
    init_logging();
    let config = SimConfig::from_yaml_str("g: 2.0\ntheta: 0.0\nmax_bodies: 3\n").unwrap();
    let mut sim = Simulation::new(config).unwrap();

    // Zero theta is clamped, never an infinite descent.
    assert!(sim.quadtree().theta() > 0.0);
    for i in 0..3 {
        sim.add_body(Vec2::new(i as f32 * 10.0, 0.0), Vec2::zero(), 1.0, [0; 3], &mut NullSink)
            .unwrap();
    }
    assert_eq!(
        sim.add_body(Vec2::new(50.0, 0.0), Vec2::zero(), 1.0, [0; 3], &mut NullSink),
        Err(SimError::CapacityExceeded { capacity: 3 })
    );
    sim.tick(&mut NullSink);
    assert_eq!(sim.quadtree().total_mass(), 3.0);
}

#[test]
fn non_finite_commands_leave_gravity_running() {
    init_logging();
    let mut sim = Simulation::new(gravity_only()).unwrap();
    let mut place = |x: f32, y: f32, mass: f32| {
        sim.insert_body(Body::new(Vec2::new(x, y), mass, [0; 3]).with_radius(0.1), &mut NullSink)
            .unwrap()
    };
    let a = place(-1.0, 0.0, 100.0);
    let b = place(1.0, 0.0, 100.0);
    let c = place(0.0, 5.0, 1.0);

    assert_eq!(sim.set_position(c, Vec2::new(f32::NAN, 0.0)), Err(SimError::NonFinite(c)));
    assert_eq!(sim.set_velocity(c, Vec2::new(0.0, f32::INFINITY)), Err(SimError::NonFinite(c)));
    assert_eq!(sim.body(c).unwrap().pos, Vec2::new(0.0, 5.0));
    assert_eq!(sim.body(c).unwrap().velocity(sim.dt()), Vec2::zero());

    sim.tick(&mut NullSink);
    sim.tick(&mut NullSink);

    assert_relative_eq!(sim.quadtree().total_mass(), 201.0);
    assert!(sim.body(a).unwrap().pos.x > -1.0);
    assert!(sim.body(b).unwrap().pos.x < 1.0);
}

#[test]
fn unlinking_is_reported() {
    init_logging();
    let mut sim = Simulation::new(gravity_only()).unwrap();
    let mut events = Vec::new();
    let a = sim.add_body(Vec2::zero(), Vec2::zero(), 1.0, [0; 3], &mut events).unwrap();
    let b = sim.add_body(Vec2::new(4.0, 0.0), Vec2::zero(), 1.0, [0; 3], &mut events).unwrap();
    sim.link(a, b, &mut events).unwrap();
    events.clear();

    assert!(sim.unlink(b, a, &mut events));
    assert!(!sim.unlink(a, b, &mut events));
    assert_eq!(events, vec![Event::SpringUnlinked { a: b, b: a }]);
    assert!(sim.springs().is_empty());
}
