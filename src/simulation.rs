use crate::{
    body::{Body, BodyId, Color, is_finite},
    body_set::BodySet,
    clock::{ClockState, SimulationClock},
    composite::CompositeBody,
    condition::Condition,
    config::SimConfig,
    error::SimError,
    events::{Event, EventSink},
    force::{CollisionDamping, Gravity, Repulsion},
    hull::ConvexHull,
    merge::{MergePolicy, SpringField},
    orbit::{self, OrbitSpec},
    quadtree::Quadtree,
    spring::{SpringNetwork, SpringParams},
};
use ultraviolet::Vec2;

/// The sandbox: bodies, springs and the per-tick pipeline that moves them.
///
/// Hosts feed wall-clock readings to [`Simulation::update`], which runs as
/// many fixed [`SimConfig::dt`] ticks as the elapsed time allows. Each tick:
///
/// 1. rebuilds the quadtree and evaluates gravity through it,
/// 2. collects neighbour pairs once,
/// 3. applies repulsion and collision damping to those pairs,
/// 4. merges and spring-links eligible pairs,
/// 5. applies spring forces and prunes broken springs,
/// 6. integrates, then regroups spring-connected bodies into composites.
#[derive(Debug)]
pub struct Simulation {
    config: SimConfig,
    bodies: BodySet,
    springs: SpringNetwork,
    quadtree: Quadtree,
    clock: SimulationClock,
    composites: Vec<CompositeBody>,

    gravity: Gravity,
    repulsion: Repulsion,
    damping: CollisionDamping,
    merge_policy: MergePolicy,
    spring_field: SpringField,

    rng: fastrand::Rng,
    /// Simulated seconds received from the clock but not yet ticked.
    accumulator: f32,
    frame: usize,
    pairs: Vec<(BodyId, BodyId)>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::from_valid_config(SimConfig::default(), 0)
    }
}

impl Simulation {
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        Self::with_seed(config, 0)
    }

    /// `seed` drives orbital spawning.
    pub fn with_seed(config: SimConfig, seed: u64) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Self::from_valid_config(config, seed))
    }

    fn from_valid_config(config: SimConfig, seed: u64) -> Self {
        log::info!(
            "Creating simulation: capacity {}, dt {:.4}s, theta {}",
            config.max_bodies,
            config.dt,
            config.theta
        );

        let gravity = Gravity {
            g: config.g,
            softening: config.softening,
        };
        let repulsion = Repulsion {
            strength: config.repulsion_strength,
            beta: config.repulsion_beta,
            slack: config.repulsion_slack,
            measure: config.overlap_measure,
        };
        let damping = CollisionDamping {
            damping: config.collision_damping,
        };
        let merge_policy = MergePolicy::new(
            Condition::IntersectionArea(config.merge_area_ratio)
                & Condition::RelativeSpeed(config.merge_speed_threshold),
        );
        let spring_field = SpringField::new(
            config.spring_link_gap,
            config.spring_link_speed,
            config.spring.params(),
        );

        Self {
            bodies: BodySet::with_capacity(config.max_bodies),
            springs: SpringNetwork::new(config.spring.max_force),
            quadtree: Quadtree::new(config.theta),
            clock: SimulationClock::new(),
            composites: Vec::new(),
            gravity,
            repulsion,
            damping,
            merge_policy,
            spring_field,
            rng: fastrand::Rng::with_seed(seed),
            accumulator: 0.0,
            frame: 0,
            pairs: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn dt(&self) -> f32 {
        self.config.dt
    }

    /// Ticks run so far.
    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    pub fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    pub fn bodies(&self) -> &BodySet {
        &self.bodies
    }

    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(id)
    }

    pub fn springs(&self) -> &SpringNetwork {
        &self.springs
    }

    /// Endpoint positions of every spring, for drawing.
    pub fn spring_segments(&self) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
        self.springs.segments(&self.bodies)
    }

    /// Spring-connected clusters as of the last tick.
    pub fn composites(&self) -> &[CompositeBody] {
        &self.composites
    }

    pub fn composite_hulls(&self) -> Vec<ConvexHull> {
        self.composites
            .iter()
            .map(|c| c.convex_hull(&self.bodies))
            .collect()
    }

    /// The composite `id` belongs to, if any.
    pub fn composite_of(&self, id: BodyId) -> Option<&CompositeBody> {
        self.composites.iter().find(|c| c.contains(id))
    }

    pub fn quadtree(&self) -> &Quadtree {
        &self.quadtree
    }

    pub fn set_theta(&mut self, theta: f32) {
        self.quadtree.set_theta(theta);
        self.config.theta = self.quadtree.theta();
        log::debug!("Theta set to {}", self.config.theta);
    }

    pub fn set_parallel(&mut self, parallel: bool) {
        self.config.parallel = parallel;
    }

    /// Creates a body with a mass-derived radius.
    pub fn add_body(
        &mut self,
        pos: Vec2,
        vel: Vec2,
        mass: f32,
        color: Color,
        sink: &mut impl EventSink,
    ) -> Result<BodyId, SimError> {
        let body = Body::new(pos, mass, color).with_velocity(vel, self.config.dt);
        self.insert_body(body, sink)
    }

    pub fn insert_body(&mut self, body: Body, sink: &mut impl EventSink) -> Result<BodyId, SimError> {
        if !body.is_valid() || !is_finite(body.pos) || !is_finite(body.prev_pos) {
            log::warn!("Rejected body with mass {} and radius {}", body.mass, body.radius);
            return Err(SimError::InvalidGeometry {
                mass: body.mass,
                radius: body.radius,
            });
        }
        let id = self.bodies.insert(body).inspect_err(|err| log::warn!("{err}"))?;
        sink.emit(Event::BodyCreated { id });
        Ok(id)
    }

    /// Removes a body. Its springs go with it.
    pub fn delete_body(&mut self, id: BodyId, sink: &mut impl EventSink) -> Result<Body, SimError> {
        let body = self.bodies.remove(id).ok_or(SimError::StaleBody(id))?;
        self.springs.prune_stale(&self.bodies);
        sink.emit(Event::BodyDeleted { id });
        Ok(body)
    }

    /// Removes every body and spring. Outstanding ids all become stale.
    pub fn clear(&mut self, sink: &mut impl EventSink) {
        log::info!("Clearing {} bodies and {} springs", self.bodies.len(), self.springs.len());
        self.bodies.clear();
        self.springs.clear();
        self.quadtree.clear();
        self.composites.clear();
        self.pairs.clear();
        sink.emit(Event::Cleared);
    }

    fn body_mut(&mut self, id: BodyId) -> Result<&mut Body, SimError> {
        self.bodies.get_mut(id).ok_or_else(|| {
            log::warn!("Command on stale body {id}");
            SimError::StaleBody(id)
        })
    }

    pub fn select(&mut self, id: BodyId) -> Result<(), SimError> {
        self.body_mut(id)?.selected = true;
        Ok(())
    }

    pub fn unselect(&mut self, id: BodyId) -> Result<(), SimError> {
        self.body_mut(id)?.selected = false;
        Ok(())
    }

    pub fn unselect_all(&mut self) {
        for body in self.bodies.as_mut_slice() {
            body.selected = false;
        }
    }

    pub fn selected(&self) -> impl Iterator<Item = BodyId> + '_ {
        self.bodies
            .iter()
            .filter(|(_, body)| body.selected)
            .map(|(id, _)| id)
    }

    /// Rejects NaN or infinite velocities, leaving the body untouched.
    pub fn set_velocity(&mut self, id: BodyId, vel: Vec2) -> Result<(), SimError> {
        let dt = self.config.dt;
        let body = self.body_mut(id)?;
        let mut moved = *body;
        moved.set_velocity(vel, dt);
        if !is_finite(vel) || !is_finite(moved.prev_pos) {
            log::warn!("Rejected velocity {vel:?} for body {id}");
            return Err(SimError::NonFinite(id));
        }
        *body = moved;
        Ok(())
    }

    /// Moves a body, keeping its velocity. Rejects NaN or infinite positions.
    pub fn set_position(&mut self, id: BodyId, pos: Vec2) -> Result<(), SimError> {
        let body = self.body_mut(id)?;
        let mut moved = *body;
        moved.set_position(pos);
        if !is_finite(pos) || !is_finite(moved.prev_pos) {
            log::warn!("Rejected position {pos:?} for body {id}");
            return Err(SimError::NonFinite(id));
        }
        *body = moved;
        Ok(())
    }

    /// Links two bodies with the configured spring defaults, at rest at their
    /// current separation.
    pub fn link(&mut self, a: BodyId, b: BodyId, sink: &mut impl EventSink) -> Result<(), SimError> {
        self.link_with(a, b, self.config.spring.params(), sink)
    }

    pub fn link_with(
        &mut self,
        a: BodyId,
        b: BodyId,
        params: SpringParams,
        sink: &mut impl EventSink,
    ) -> Result<(), SimError> {
        self.springs
            .link(&self.bodies, a, b, params)
            .inspect_err(|err| log::warn!("{err}"))?;
        sink.emit(Event::SpringLinked { a, b });
        Ok(())
    }

    /// Returns false if no spring joined the pair.
    pub fn unlink(&mut self, a: BodyId, b: BodyId, sink: &mut impl EventSink) -> bool {
        let removed = self.springs.unlink(a, b);
        if removed {
            sink.emit(Event::SpringUnlinked { a, b });
        }
        removed
    }

    pub fn pause(&mut self, sink: &mut impl EventSink) {
        if self.clock.pause() {
            log::debug!("Paused at frame {}", self.frame);
            sink.emit(Event::Paused);
        }
    }

    pub fn resume(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        if self.clock.resume(now_ms) {
            log::debug!("Resumed at frame {}", self.frame);
            sink.emit(Event::Resumed);
        }
    }

    pub fn toggle_pause(&mut self, now_ms: u64, sink: &mut impl EventSink) -> ClockState {
        match self.clock.state() {
            ClockState::Running => self.pause(sink),
            ClockState::Paused => self.resume(now_ms, sink),
        }
        self.clock.state()
    }

    /// Places satellites around `reference`.
    ///
    /// Stops early when the body set fills up; the bodies placed so far stay.
    /// Fails only if none could be placed.
    pub fn spawn_orbital_bodies(
        &mut self,
        reference: BodyId,
        spec: &OrbitSpec,
        sink: &mut impl EventSink,
    ) -> Result<Vec<BodyId>, SimError> {
        let center = *self.bodies.get(reference).ok_or(SimError::StaleBody(reference))?;
        let generated = orbit::orbital_bodies(&center, spec, self.config.g, self.config.dt, &mut self.rng);

        let mut ids = Vec::with_capacity(generated.len());
        for body in generated {
            match self.insert_body(body, sink) {
                Ok(id) => ids.push(id),
                Err(err) if ids.is_empty() => return Err(err),
                Err(_) => {
                    log::warn!("Placed {} of {} orbital bodies", ids.len(), spec.count);
                    break;
                }
            }
        }
        Ok(ids)
    }

    /// Adds energy to the composite containing `id` without moving its
    /// centre of mass. A body outside any composite just speeds up.
    pub fn add_composite_energy(&mut self, id: BodyId, internal: f32, rotational: f32) -> Result<(), SimError> {
        let dt = self.config.dt;
        if !self.bodies.contains(id) {
            return Err(SimError::StaleBody(id));
        }

        match self.composites.iter().find(|c| c.contains(id)) {
            Some(composite) => {
                composite.add_internal_energy(&mut self.bodies, internal, dt);
                composite.add_rotational_energy(&mut self.bodies, rotational, dt);
            }
            None => {
                if let Some(body) = self.bodies.get_mut(id) {
                    body.add_kinetic_energy(internal + rotational, dt);
                }
            }
        }
        Ok(())
    }

    /// Feeds a wall-clock reading and runs the fixed ticks it pays for.
    /// Returns the number of ticks run.
    pub fn update(&mut self, now_ms: u64, sink: &mut impl EventSink) -> usize {
        self.clock.update(now_ms);
        if self.clock.is_paused() {
            return 0;
        }

        let dt = self.config.dt;
        self.accumulator += self.clock.time_step();

        let mut ticks = 0;
        while self.accumulator >= dt && ticks < self.config.max_substeps as usize {
            self.tick(sink);
            self.accumulator -= dt;
            ticks += 1;
        }

        if self.accumulator >= dt {
            log::debug!("Falling behind: dropping {:.3}s of simulated time", self.accumulator);
            self.accumulator %= dt;
        }
        ticks
    }

    /// Runs exactly one fixed step.
    pub fn tick(&mut self, sink: &mut impl EventSink) {
        let dt = self.config.dt;
        self.bodies.reset_forces();

        if self.bodies.is_empty() {
            self.quadtree.clear();
            self.springs.clear();
            self.composites.clear();
            self.frame += 1;
            return;
        }

        self.quadtree.build(self.bodies.as_slice());
        if self.config.parallel {
            self.quadtree.par_compute_forces(self.bodies.as_mut_slice(), &self.gravity);
        } else {
            self.quadtree.compute_forces(self.bodies.as_mut_slice(), &self.gravity);
        }

        self.quadtree.compute_neighbor_pairs(self.neighbor_margin());
        self.quadtree.compute_local_forces(self.bodies.as_mut_slice(), &self.repulsion, dt);
        self.quadtree.compute_local_forces(self.bodies.as_mut_slice(), &self.damping, dt);

        // Slots are only valid until the body set changes; switch to ids.
        let ids = self.bodies.ids();
        self.pairs.clear();
        self.pairs.extend(
            self.quadtree
                .overlapping_pairs()
                .iter()
                .map(|&(i, j)| (ids[i], ids[j])),
        );

        let merged = if self.config.enable_merging {
            self.merge_policy.apply(&self.pairs, &mut self.bodies, dt, sink)
        } else {
            0
        };
        let linked = if self.config.enable_spring_field {
            self.spring_field
                .apply(&self.pairs, &self.bodies, &mut self.springs, dt, sink)
        } else {
            0
        };

        let broken = self.springs.update(&mut self.bodies, dt, sink);
        self.bodies.integrate(dt);
        self.composites = self.springs.find_composite_bodies(&self.bodies, |_| true);

        self.frame += 1;
        log::trace!(
            "Frame {}: {} bodies, {} pairs, {} merged, {} linked, {} broken, {} composites",
            self.frame,
            self.bodies.len(),
            self.pairs.len(),
            merged,
            linked,
            broken,
            self.composites.len()
        );
    }

    /// Pair reach: wide enough for every pair-based pass that is enabled.
    fn neighbor_margin(&self) -> f32 {
        let mut margin = self.config.neighborhood_margin.max(self.config.repulsion_slack);
        if self.config.enable_spring_field {
            margin = margin.max(self.config.spring_link_gap);
        }
        margin
    }
}
