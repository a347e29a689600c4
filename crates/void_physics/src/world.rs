//! Physics world - main simulation container

use crate::body::{BodyId, RigidBody};
use crate::broadphase::{Broadphase, NaiveBroadphase};
use crate::collision_matrix::CollisionMatrix;
use crate::config::PhysicsConfig;
use crate::constraint::{Constraint, ConstraintId};
use crate::error::{PhysicsError, Result};
use crate::events::{
    BodyEvent, BodyEventKind, ChannelEventHandler, EventCollector, PhysicsEvent,
    PhysicsEventHandler, WorldEvent,
};
use crate::integrator::{self, Renormalize};
use crate::material::{ContactMaterial, ContactMaterialId, Material, MaterialId, MaterialTable};
use crate::math::tangents;
use crate::narrowphase::{Contact, ContactGenerator, ContactPool, DefaultContactGenerator};
use crate::solver::{Equation, Solver, SpookSolver};
use crossbeam_channel::Receiver;
use glam::Vec3;
use std::collections::HashMap;

/// Scale applied to `mu * (mi + mj)` to bound friction rows
const FRICTION_FORCE_SCALE: f32 = 100.0;

/// The main physics world containing all simulation state
pub struct PhysicsWorld {
    /// Configuration
    config: PhysicsConfig,

    /// Gravity
    gravity: Vec3,

    /// Bodies in insertion order; the position is the body index
    bodies: Vec<RigidBody>,

    /// Body id to index, rebuilt on add/remove
    id_index: HashMap<BodyId, usize>,

    /// Next id handed out by `id()`
    next_id: u32,

    /// Registered materials and contact materials
    materials: MaterialTable,

    /// User constraints in insertion order
    constraints: Vec<(ConstraintId, Box<dyn Constraint>)>,

    /// Contact history for the current and previous step
    collision_matrix: CollisionMatrix,

    /// Broad phase
    broadphase: Box<dyn Broadphase>,

    /// Narrow phase
    contact_generator: Box<dyn ContactGenerator>,

    /// Constraint solver
    solver: Box<dyn Solver>,

    /// Contacts generated by the last step
    contacts: Vec<Contact>,

    /// Released contact records
    contact_pool: ContactPool,

    /// Event collector
    events: EventCollector,

    /// Additional event handlers
    handlers: Vec<Box<dyn PhysicsEventHandler>>,

    /// Simulated time
    time: f32,

    /// Number of completed steps
    step_number: u64,

    /// Timestep of the last step
    last_dt: Option<f32>,

    /// Accumulated time for fixed timestep
    accumulated_time: f32,
}

impl PhysicsWorld {
    /// Create a new physics world
    pub fn new(config: PhysicsConfig) -> Self {
        let gravity = Vec3::from_array(config.gravity);
        let solver = SpookSolver::new(
            config.solver_iterations,
            config.spook_stiffness,
            config.spook_relaxation,
        );

        Self {
            config,
            gravity,
            bodies: Vec::new(),
            id_index: HashMap::new(),
            next_id: 0,
            materials: MaterialTable::new(),
            constraints: Vec::new(),
            collision_matrix: CollisionMatrix::new(0),
            broadphase: Box::new(NaiveBroadphase::new()),
            contact_generator: Box::new(DefaultContactGenerator::new()),
            solver: Box::new(solver),
            contacts: Vec::new(),
            contact_pool: ContactPool::new(),
            events: EventCollector::new(),
            handlers: Vec::new(),
            time: 0.0,
            step_number: 0,
            last_dt: None,
            accumulated_time: 0.0,
        }
    }

    /// Create a world after validating the configuration
    pub fn try_new(config: PhysicsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Get the physics configuration
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Set gravity
    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    /// Get gravity
    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    /// Hand out the next id. Bodies and constraints draw from the same counter.
    pub fn id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ==================== Bodies ====================

    /// Add a body, returning its id.
    ///
    /// The body's live state is reset from its `init_*` fields and the
    /// collision matrix is reallocated, which clears all contact history.
    pub fn add(&mut self, mut body: RigidBody) -> BodyId {
        let id = BodyId(self.id());
        body.assign_id(id);
        body.reset_to_initial();
        body.set_time_last_sleepy(self.time);

        self.id_index.insert(id, self.bodies.len());
        self.bodies.push(body);
        self.collision_matrix.resize(self.bodies.len());

        log::debug!("Added body {:?} ({} bodies)", id, self.bodies.len());
        id
    }

    /// Remove a body and return it
    pub fn remove(&mut self, id: BodyId) -> Result<RigidBody> {
        let index = self.index_of(id).ok_or(PhysicsError::BodyNotFound(id))?;
        let body = self.bodies.remove(index);
        self.rebuild_index();
        self.collision_matrix.resize(self.bodies.len());

        let dangling = self
            .constraints
            .iter()
            .filter(|(_, c)| c.body_i() == id || c.body_j() == Some(id))
            .count();
        if dangling > 0 {
            log::warn!(
                "Removed body {:?} is still referenced by {} constraint(s)",
                id,
                dangling
            );
        }

        log::debug!("Removed body {:?} ({} bodies)", id, self.bodies.len());
        Ok(body)
    }

    fn rebuild_index(&mut self) {
        self.id_index.clear();
        for (index, body) in self.bodies.iter().enumerate() {
            if let Some(id) = body.id() {
                self.id_index.insert(id, index);
            }
        }
    }

    /// Current index of a body
    pub fn index_of(&self, id: BodyId) -> Option<usize> {
        self.id_index.get(&id).copied()
    }

    /// Get a body
    pub fn body(&self, id: BodyId) -> Option<&RigidBody> {
        self.index_of(id).map(|i| &self.bodies[i])
    }

    /// Get a body mutably
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        self.index_of(id).map(move |i| &mut self.bodies[i])
    }

    /// All bodies in index order
    pub fn bodies(&self) -> &[RigidBody] {
        &self.bodies
    }

    /// Number of bodies
    pub fn num_objects(&self) -> usize {
        self.bodies.len()
    }

    /// Forget every recorded contact involving a body, without reallocating
    pub fn clear_collision_state(&mut self, id: BodyId) -> Result<()> {
        let index = self.index_of(id).ok_or(PhysicsError::BodyNotFound(id))?;
        self.collision_matrix.clear_body(index);
        Ok(())
    }

    // ==================== Constraints ====================

    /// Add a user constraint
    pub fn add_constraint(&mut self, constraint: impl Constraint + 'static) -> ConstraintId {
        let id = ConstraintId(self.id());
        self.constraints.push((id, Box::new(constraint)));
        log::debug!("Added constraint {:?}", id);
        id
    }

    /// Remove a user constraint and return it
    pub fn remove_constraint(&mut self, id: ConstraintId) -> Result<Box<dyn Constraint>> {
        let index = self
            .constraints
            .iter()
            .position(|(cid, _)| *cid == id)
            .ok_or(PhysicsError::ConstraintNotFound(id))?;
        log::debug!("Removed constraint {:?}", id);
        Ok(self.constraints.remove(index).1)
    }

    /// Number of user constraints
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    // ==================== Materials ====================

    /// Register a material. Registering the same material again is a no-op.
    pub fn add_material(&mut self, material: &Material) -> MaterialId {
        self.materials.add_material(material)
    }

    /// Register a contact material, registering its two materials first
    pub fn add_contact_material(&mut self, cmat: ContactMaterial) -> Result<ContactMaterialId> {
        self.materials.add_contact_material(cmat)
    }

    /// Contact material for a pair of materials, in either order
    pub fn contact_material(&self, m1: &Material, m2: &Material) -> Option<&ContactMaterial> {
        self.materials.contact_material(m1, m2)
    }

    /// Registered materials and contact materials
    pub fn materials(&self) -> &MaterialTable {
        &self.materials
    }

    fn contact_coefficients(&self, i: usize, j: usize) -> (f32, f32) {
        let cmat = match (&self.bodies[i].material, &self.bodies[j].material) {
            (Some(mi), Some(mj)) => self.materials.contact_material(mi, mj),
            _ => None,
        };
        match cmat {
            Some(cm) => (cm.friction, cm.restitution),
            None => (self.config.default_friction, self.config.default_restitution),
        }
    }

    // ==================== Collaborators ====================

    /// Replace the broad phase
    pub fn set_broadphase(&mut self, broadphase: impl Broadphase + 'static) {
        self.broadphase = Box::new(broadphase);
    }

    /// Replace the narrow phase
    pub fn set_contact_generator(&mut self, generator: impl ContactGenerator + 'static) {
        self.contact_generator = Box::new(generator);
    }

    /// Replace the constraint solver
    pub fn set_solver(&mut self, solver: impl Solver + 'static) {
        self.solver = Box::new(solver);
    }

    // ==================== Simulation ====================

    /// Advance by `frame_time` using fixed `timestep` steps.
    ///
    /// Returns the number of steps taken, at most `max_substeps`.
    pub fn advance(&mut self, frame_time: f32) -> Result<u32> {
        if !(frame_time.is_finite() && frame_time >= 0.0) {
            return Err(PhysicsError::InvalidTimestep(frame_time));
        }
        self.accumulated_time += frame_time;

        let timestep = self.config.timestep;
        let mut steps = 0;
        while self.accumulated_time >= timestep && steps < self.config.max_substeps {
            self.step(timestep)?;
            self.accumulated_time -= timestep;
            steps += 1;
        }

        // Drop time we could not catch up on
        if steps == self.config.max_substeps && self.accumulated_time >= timestep {
            log::trace!("Dropping {:.4}s of accumulated time", self.accumulated_time);
            self.accumulated_time = 0.0;
        }

        Ok(steps)
    }

    /// Step with the last used timestep, or the configured one
    pub fn step_default(&mut self) -> Result<()> {
        self.step(self.last_dt.unwrap_or(self.config.timestep))
    }

    /// Run one full simulation step of `dt` seconds.
    ///
    /// Broadphase output, contact bodies and constraint bodies are checked
    /// before any body, history or event state changes, so a failed step
    /// leaves the world as it was apart from `contacts()`.
    pub fn step(&mut self, dt: f32) -> Result<()> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(PhysicsError::InvalidTimestep(dt));
        }

        let (p1, p2) = self.broadphase.collision_pairs(&self.bodies);
        self.check_pairs(&p1, &p2)?;

        self.contact_pool.release_all(&mut self.contacts);
        self.contact_generator.get_contacts(
            &p1,
            &p2,
            &self.bodies,
            &mut self.contacts,
            &mut self.contact_pool,
        );
        let contact_bodies = self.resolve_contacts()?;
        let constraint_bodies = self.resolve_constraints()?;

        self.last_dt = Some(dt);
        self.events.clear();

        for body in &mut self.bodies {
            integrator::apply_gravity(body, self.gravity);
        }

        // Must age the history before any of this step's bits are written
        self.collision_matrix.tick();
        self.solver.reset(self.bodies.len());

        let contacts = std::mem::take(&mut self.contacts);
        for (c, &(i, j)) in contacts.iter().zip(&contact_bodies) {
            self.handle_contact(c, i, j);
        }
        self.contacts = contacts;

        self.add_user_constraints(&constraint_bodies);

        let rows = self.solver.num_rows();
        if rows > 0 {
            self.solver.set_timestep(dt);
            self.solver.solve();
            for (i, body) in self.bodies.iter_mut().enumerate() {
                if body.motion_state.is_dynamic() {
                    body.velocity += self.solver.linear_delta(i);
                    body.angular_velocity += self.solver.angular_delta(i);
                }
            }
        }

        for body in &mut self.bodies {
            integrator::apply_damping(body);
        }

        self.emit_world_event(WorldEvent::PreStep);
        for body in &mut self.bodies {
            body.run_pre_step();
        }

        let renormalize = self.renormalize_this_step();
        for body in &mut self.bodies {
            integrator::integrate_semi_implicit_euler(body, dt, renormalize);
        }

        self.time += dt;
        self.step_number += 1;

        self.emit_world_event(WorldEvent::PostStep);
        for body in &mut self.bodies {
            body.run_post_step();
        }

        if self.config.allow_sleep {
            for i in 0..self.bodies.len() {
                if let Some(kind) = self.bodies[i].sleep_tick(self.time) {
                    self.dispatch_body_event(i, kind);
                }
            }
        }

        log::trace!(
            "Step {}: {} pairs, {} contacts, {} rows",
            self.step_number,
            p1.len(),
            self.contacts.len(),
            rows
        );
        Ok(())
    }

    fn check_pairs(&self, p1: &[usize], p2: &[usize]) -> Result<()> {
        if p1.len() != p2.len() {
            return Err(PhysicsError::BroadphaseMismatch {
                left: p1.len(),
                right: p2.len(),
            });
        }
        let bodies = self.bodies.len();
        match p1.iter().chain(p2).find(|&&index| index >= bodies) {
            Some(&index) => Err(PhysicsError::PairOutOfRange { index, bodies }),
            None => Ok(()),
        }
    }

    fn renormalize_this_step(&self) -> Option<Renormalize> {
        let period = u64::from(self.config.quat_normalize_skip) + 1;
        if self.step_number % period != 0 {
            return None;
        }
        Some(if self.config.quat_normalize_fast {
            Renormalize::Fast
        } else {
            Renormalize::Exact
        })
    }

    /// Body indices for every generated contact
    fn resolve_contacts(&self) -> Result<Vec<(usize, usize)>> {
        self.contacts
            .iter()
            .map(|c| {
                let i = self.index_of(c.bi).ok_or(PhysicsError::BodyNotFound(c.bi))?;
                let j = self.index_of(c.bj).ok_or(PhysicsError::BodyNotFound(c.bj))?;
                Ok((i, j))
            })
            .collect()
    }

    /// Body indices for every user constraint, in insertion order
    fn resolve_constraints(&self) -> Result<Vec<(usize, Option<usize>)>> {
        self.constraints
            .iter()
            .map(|(_, constraint)| {
                let id_i = constraint.body_i();
                let i = self.index_of(id_i).ok_or(PhysicsError::BodyNotFound(id_i))?;
                let j = match constraint.body_j() {
                    Some(id_j) => Some(self.index_of(id_j).ok_or(PhysicsError::BodyNotFound(id_j))?),
                    None => None,
                };
                Ok((i, j))
            })
            .collect()
    }

    /// Classify one contact: record history, fire events and add solver rows
    fn handle_contact(&mut self, c: &Contact, i: usize, j: usize) {
        let (mu, e) = self.contact_coefficients(i, j);

        let gap = {
            let (bi, bj) = (&self.bodies[i], &self.bodies[j]);
            ((bj.position + c.rj) - (bi.position + c.ri)).dot(c.ni)
        };
        if gap >= 0.0 {
            return;
        }

        // A pair with several contacts is announced by its first one only
        let announced = self.collision_matrix.get(i, j, true) != 0;
        self.collision_matrix.set(i, j, 1, true);
        if !announced && self.collision_matrix.is_new_contact(i, j) {
            let mut mirrored = *c;
            mirrored.swap();
            self.dispatch_body_event(i, BodyEventKind::Collide { with: c.bj, contact: *c });
            self.dispatch_body_event(j, BodyEventKind::Collide { with: c.bi, contact: mirrored });

            for index in [i, j] {
                if let Some(kind) = self.bodies[index].wake_up() {
                    self.dispatch_body_event(index, kind);
                }
            }
        }

        let (bi, bj) = (&self.bodies[i], &self.bodies[j]);
        let u_rel = (bj.velocity + bj.angular_velocity.cross(c.rj))
            - (bi.velocity + bi.angular_velocity.cross(c.ri));

        self.solver
            .add_constraint(normal_row(c, gap, e, u_rel, bi, bj, (i, j)));

        if mu > 0.0 {
            let bound = mu * FRICTION_FORCE_SCALE * (bi.mass() + bj.mass());
            let (t1, t2) = tangents(c.ni);
            for t in [t1, t2] {
                self.solver
                    .add_constraint(friction_row(c, t, bound, u_rel, bi, bj, (i, j)));
            }
        }
    }

    fn add_user_constraints(&mut self, links: &[(usize, Option<usize>)]) {
        let Self {
            constraints,
            bodies,
            solver,
            ..
        } = self;

        for ((_, constraint), &(i, j)) in constraints.iter_mut().zip(links) {
            constraint.update(&bodies[i], j.map(|j| &bodies[j]));
            solver.add_constraint2(constraint.as_ref(), Some(i), j);
        }
    }

    // ==================== Events ====================

    /// Register an additional event handler
    pub fn add_event_handler(&mut self, handler: Box<dyn PhysicsEventHandler>) {
        self.handlers.push(handler);
    }

    /// Receive every future event through a channel
    pub fn event_channel(&mut self) -> Receiver<PhysicsEvent> {
        let (handler, receiver) = ChannelEventHandler::unbounded();
        self.handlers.push(Box::new(handler));
        receiver
    }

    /// Events emitted by the last step
    pub fn events(&self) -> &EventCollector {
        &self.events
    }

    fn emit_world_event(&mut self, event: WorldEvent) {
        log::trace!("World event {:?}", event);
        self.events.on_world_event(event);
        for handler in &mut self.handlers {
            handler.on_world_event(event);
        }
    }

    fn dispatch_body_event(&mut self, index: usize, kind: BodyEventKind) {
        let body = &mut self.bodies[index];
        let Some(target) = body.id() else {
            return;
        };
        let event = BodyEvent { target, kind };
        log::trace!("Body event {:?}", event);

        body.dispatch_event(&event);
        self.events.on_body_event(&event);
        for handler in &mut self.handlers {
            handler.on_body_event(&event);
        }
    }

    // ==================== Debug ====================

    /// Contacts generated by the last step, penetrating or not
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// Simulated time
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Number of completed steps
    pub fn step_number(&self) -> u64 {
        self.step_number
    }

    /// Timestep of the last step
    pub fn last_dt(&self) -> Option<f32> {
        self.last_dt
    }

    /// Contact history
    pub fn collision_matrix(&self) -> &CollisionMatrix {
        &self.collision_matrix
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(PhysicsConfig::default())
    }
}

/// Push-only row keeping the contact from penetrating further.
///
/// The gap term is `(1 + e) * gap` along the normal: penetration is always
/// corrected and restitution `e` only strengthens the correction.
fn normal_row(
    c: &Contact,
    gap: f32,
    restitution: f32,
    u_rel: Vec3,
    bi: &RigidBody,
    bj: &RigidBody,
    (i, j): (usize, usize),
) -> Equation {
    let n = c.ni;
    let gn = n * (gap * (1.0 + restitution));
    let un_rel = n * (u_rel.dot(n) * 0.5);

    let mut eq = Equation {
        jacobian: [-n, -c.ri.cross(n), n, c.rj.cross(n)],
        gap: [-gn, Vec3::ZERO, gn, Vec3::ZERO],
        bias_velocity: [-un_rel, Vec3::ZERO, un_rel, Vec3::ZERO],
        external_force: [bi.force, bi.torque, -bj.force, -bj.torque],
        lower: 0.0,
        upper: f32::INFINITY,
        body_i: Some(i),
        body_j: Some(j),
        ..Default::default()
    };
    eq.set_default_mass_props(bi, Some(bj));
    eq
}

/// Tangential row with a symmetric force bound
fn friction_row(
    c: &Contact,
    t: Vec3,
    bound: f32,
    u_rel: Vec3,
    bi: &RigidBody,
    bj: &RigidBody,
    (i, j): (usize, usize),
) -> Equation {
    let ut_rel = t * u_rel.dot(t);

    let mut eq = Equation {
        jacobian: [-t, -c.ri.cross(t), t, c.rj.cross(t)],
        bias_velocity: [-ut_rel, Vec3::ZERO, ut_rel, Vec3::ZERO],
        lower: -bound,
        upper: bound,
        body_i: Some(i),
        body_j: Some(j),
        ..Default::default()
    };
    eq.set_default_mass_props(bi, Some(bj));
    eq.set_default_force(bi, Some(bj));
    eq
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::MotionState;
    use crate::constraint::DistanceConstraint;
    use crate::shape::Shape;
    use approx::assert_relative_eq;

    fn zero_gravity() -> PhysicsWorld {
        PhysicsWorld::new(PhysicsConfig::default().with_gravity(0.0, 0.0, 0.0))
    }

    fn sphere_at(y: f32) -> RigidBody {
        RigidBody::new(1.0, Shape::sphere(1.0))
            .with_position(Vec3::new(0.0, y, 0.0))
            .with_damping(0.0, 0.0)
    }

    #[test]
    fn test_create_world() {
        let world = PhysicsWorld::default();
        assert_eq!(world.num_objects(), 0);
        assert_eq!(world.constraint_count(), 0);
        assert_eq!(world.gravity(), Vec3::new(0.0, -9.81, 0.0));
    }

    #[test]
    fn test_try_new_rejects_bad_config() {
        let config = PhysicsConfig::default().with_timestep(0.0);
        assert!(matches!(
            PhysicsWorld::try_new(config),
            Err(PhysicsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_ids_are_shared_and_increasing() {
        let mut world = PhysicsWorld::default();
        let a = world.add(sphere_at(0.0));
        let c = world.add_constraint(DistanceConstraint::to_point(a, Vec3::ZERO, 1.0));
        let b = world.add(sphere_at(5.0));
        assert_eq!(a, BodyId(0));
        assert_eq!(c, ConstraintId(1));
        assert_eq!(b, BodyId(2));
        assert_eq!(world.id(), 3);
    }

    #[test]
    fn test_add_resets_initial_state_and_resizes_matrix() {
        let mut world = PhysicsWorld::default();
        let mut body = sphere_at(3.0);
        body.position = Vec3::new(9.0, 9.0, 9.0);
        let id = world.add(body);

        assert_eq!(world.body(id).map(|b| b.position), Some(Vec3::new(0.0, 3.0, 0.0)));
        assert_eq!(world.collision_matrix().size(), 1);
        world.add(sphere_at(6.0));
        assert_eq!(world.collision_matrix().size(), 2);
    }

    #[test]
    fn test_remove_reindexes() {
        let mut world = PhysicsWorld::default();
        let a = world.add(sphere_at(0.0));
        let b = world.add(sphere_at(5.0));
        let c = world.add(sphere_at(10.0));

        let removed = world.remove(b).unwrap();
        assert_eq!(removed.id(), Some(b));
        assert_eq!(world.num_objects(), 2);
        assert_eq!(world.index_of(a), Some(0));
        assert_eq!(world.index_of(c), Some(1));
        assert_eq!(world.index_of(b), None);
        assert_eq!(world.collision_matrix().size(), 2);

        assert!(matches!(world.remove(b), Err(PhysicsError::BodyNotFound(id)) if id == b));
    }

    #[test]
    fn test_invalid_timestep() {
        let mut world = PhysicsWorld::default();
        for dt in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(world.step(dt), Err(PhysicsError::InvalidTimestep(_))));
        }
        assert_eq!(world.step_number(), 0);
    }

    #[test]
    fn test_step_default_reuses_last_dt() {
        let mut world = PhysicsWorld::default();
        world.step_default().unwrap();
        assert_relative_eq!(world.time(), 1.0 / 60.0);

        world.step(0.5).unwrap();
        world.step_default().unwrap();
        assert_eq!(world.last_dt(), Some(0.5));
        assert_relative_eq!(world.time(), 1.0 / 60.0 + 1.0, epsilon = 1e-5);
        assert_eq!(world.step_number(), 3);
    }

    #[test]
    fn test_advance_fixed_steps() {
        let mut world = PhysicsWorld::new(PhysicsConfig::default().with_timestep(0.25));
        assert_eq!(world.advance(0.625).unwrap(), 2);
        assert_eq!(world.advance(0.125).unwrap(), 1);
        assert_eq!(world.step_number(), 3);

        // Capped at max_substeps
        assert_eq!(world.advance(10.0).unwrap(), 4);
        assert_eq!(world.advance(0.0).unwrap(), 0);
    }

    #[test]
    fn test_world_events_order() {
        let mut world = PhysicsWorld::default();
        world.step(0.1).unwrap();
        assert_eq!(
            world.events().world_events,
            vec![WorldEvent::PreStep, WorldEvent::PostStep]
        );
    }

    #[test]
    fn test_penetrating_pair_gets_rows() {
        let mut world = zero_gravity();
        let a = world.add(sphere_at(0.0));
        let b = world.add(sphere_at(1.9));
        world.step(1.0 / 60.0).unwrap();

        assert_eq!(world.contacts().len(), 1);
        assert_eq!(world.events().collisions().count(), 2);
        let vy_a = world.body(a).map(|b| b.velocity.y).unwrap_or(0.0);
        let vy_b = world.body(b).map(|b| b.velocity.y).unwrap_or(0.0);
        assert!(vy_b > vy_a);
    }

    #[test]
    fn test_separated_contact_adds_no_event() {
        let mut world = zero_gravity();
        world.add(sphere_at(0.0));
        world.add(sphere_at(2.5));
        world.step(1.0 / 60.0).unwrap();
        assert!(world.contacts().is_empty());
        assert_eq!(world.events().collisions().count(), 0);
    }

    #[test]
    fn test_contact_material_coefficients() {
        let mut world = zero_gravity();
        let ice = Material::new("ice");
        let rubber = Material::new("rubber");
        world
            .add_contact_material(ContactMaterial::new(&ice, &rubber, 0.0, 0.5))
            .unwrap();

        world.add(sphere_at(0.0).with_material(&ice));
        world.add(sphere_at(1.9).with_material(&rubber));
        world.add(sphere_at(30.0));

        assert_eq!(world.contact_coefficients(0, 1), (0.0, 0.5));
        assert_eq!(world.contact_coefficients(1, 0), (0.0, 0.5));
        assert_eq!(world.contact_coefficients(0, 2), (0.3, 0.2));
    }

    #[test]
    fn test_friction_rows_only_with_friction() {
        let mut world = zero_gravity();
        let m = Material::new("frictionless");
        world
            .add_contact_material(ContactMaterial::new(&m, &m, 0.0, 0.0))
            .unwrap();
        world.add(sphere_at(0.0).with_material(&m));
        world.add(sphere_at(1.9).with_material(&m));
        world.step(1.0 / 60.0).unwrap();
        let frictionless_rows = world.solver.num_rows();

        let mut world = zero_gravity();
        world.add(sphere_at(0.0));
        world.add(sphere_at(1.9));
        world.step(1.0 / 60.0).unwrap();

        assert_eq!(frictionless_rows, 1);
        assert_eq!(world.solver.num_rows(), 3);
    }

    #[test]
    fn test_static_body_untouched_by_solver() {
        let mut world = zero_gravity();
        let ground = world.add(RigidBody::new(0.0, Shape::sphere(1.0)));
        world.add(sphere_at(1.9));
        world.step(1.0 / 60.0).unwrap();
        let ground = world.body(ground).unwrap();
        assert_eq!(ground.velocity, Vec3::ZERO);
        assert_eq!(ground.position, Vec3::ZERO);
    }

    #[test]
    fn test_kinematic_ignores_gravity() {
        let mut world = PhysicsWorld::default();
        let id = world.add(
            sphere_at(0.0)
                .with_motion_state(MotionState::Kinematic)
                .with_velocity(Vec3::X),
        );
        world.step(0.5).unwrap();
        let body = world.body(id).unwrap();
        assert_relative_eq!(body.position.x, 0.5);
        assert_eq!(body.position.y, 0.0);
    }

    #[test]
    fn test_clear_collision_state() {
        let mut world = zero_gravity();
        let a = world.add(sphere_at(0.0));
        world.add(sphere_at(1.9));
        world.step(1.0 / 60.0).unwrap();
        assert_eq!(world.collision_matrix().get(0, 1, true), 1);

        world.clear_collision_state(a).unwrap();
        assert_eq!(world.collision_matrix().get(0, 1, true), 0);
        assert_eq!(world.collision_matrix().size(), 2);
        assert!(world.clear_collision_state(BodyId(99)).is_err());
    }

    #[test]
    fn test_constraint_to_removed_body_fails_step() {
        let mut world = zero_gravity();
        let a = world.add(sphere_at(0.0));
        let b = world.add(sphere_at(5.0));
        let c = world.add_constraint(DistanceConstraint::new(a, b, 5.0));
        world.remove(b).unwrap();

        assert!(matches!(world.step(0.1), Err(PhysicsError::BodyNotFound(id)) if id == b));

        world.remove_constraint(c).unwrap();
        assert!(world.step(0.1).is_ok());
        assert!(matches!(
            world.remove_constraint(c),
            Err(PhysicsError::ConstraintNotFound(_))
        ));
    }

    #[test]
    fn test_failed_step_changes_nothing() {
        let mut world = PhysicsWorld::default();
        let a = world.add(sphere_at(0.0));
        let b = world.add(sphere_at(5.0));
        world.add_constraint(DistanceConstraint::new(a, b, 5.0));
        world.remove(b).unwrap();

        assert!(world.step(0.1).is_err());

        let body = world.body(a).unwrap();
        assert_eq!(body.force, Vec3::ZERO);
        assert_eq!(body.velocity, Vec3::ZERO);
        assert_eq!(world.step_number(), 0);
        assert_eq!(world.last_dt(), None);
        assert!(world.events().world_events.is_empty());
    }

    #[test]
    fn test_multi_contact_pair_announced_once() {
        let mut world = zero_gravity();
        world.add(RigidBody::new(0.0, Shape::Plane));
        world.add(
            RigidBody::new(1.0, Shape::cuboid(0.5, 0.5, 0.5)).with_position(Vec3::new(0.0, 0.0, 0.4)),
        );
        world.step(1.0 / 60.0).unwrap();

        assert_eq!(world.contacts().len(), 4);
        assert_eq!(world.events().collisions().count(), 2);
        assert_eq!(world.collision_matrix().get(0, 1, true), 1);
    }

    #[test]
    fn test_renormalize_cadence() {
        let mut world = PhysicsWorld::default();
        assert_eq!(world.renormalize_this_step(), Some(Renormalize::Fast));
        world.step_number = 1;
        assert_eq!(world.renormalize_this_step(), None);
        world.step_number = 3;
        assert_eq!(world.renormalize_this_step(), Some(Renormalize::Fast));

        world.config.quat_normalize_fast = false;
        world.config.quat_normalize_skip = 0;
        world.step_number = 7;
        assert_eq!(world.renormalize_this_step(), Some(Renormalize::Exact));
    }

    #[test]
    fn test_sleep_tick_emits_events() {
        let mut world = PhysicsWorld::new(
            PhysicsConfig::default()
                .with_gravity(0.0, 0.0, 0.0)
                .with_sleeping(true),
        );
        let id = world.add(sphere_at(0.0));
        world.step(0.1).unwrap();
        let sleepy: Vec<_> = world.events().sleep_transitions().collect();
        assert_eq!(sleepy.len(), 1);
        assert!(matches!(sleepy[0].kind, BodyEventKind::Sleepy));

        for _ in 0..12 {
            world.step(0.1).unwrap();
        }
        assert!(world.body(id).map(|b| b.is_sleeping()).unwrap_or(false));
    }
}
