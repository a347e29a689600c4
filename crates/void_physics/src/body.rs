//! Rigid body types

use crate::events::{BodyEvent, BodyEventKind, BodyEventType, EventListeners, ListenerId};
use crate::material::Material;
use crate::shape::Shape;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Identifier assigned by the world when a body is added
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub u32);

/// Which pipeline stages act on a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MotionState {
    /// Fully simulated: gravity, contacts, damping and integration
    #[default]
    Dynamic,
    /// Never moves, infinite mass
    Static,
    /// Moves by its velocity only
    Kinematic,
}

impl MotionState {
    /// Check if dynamic
    pub fn is_dynamic(self) -> bool {
        self == Self::Dynamic
    }

    /// Check if static
    pub fn is_static(self) -> bool {
        self == Self::Static
    }

    /// Check if kinematic
    pub fn is_kinematic(self) -> bool {
        self == Self::Kinematic
    }

    /// Bodies that get integrated
    pub fn is_dynamic_or_kinematic(self) -> bool {
        matches!(self, Self::Dynamic | Self::Kinematic)
    }

    /// Bodies that never collide with each other
    pub fn is_static_or_kinematic(self) -> bool {
        matches!(self, Self::Static | Self::Kinematic)
    }
}

/// Whether a body carries rotational state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    /// Point mass: position and velocity only
    Particle,
    /// Full rigid body with orientation and angular velocity
    Rigid,
}

/// Sleep state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SleepState {
    #[default]
    Awake,
    Sleepy,
    Sleeping,
}

/// Callback run on a body before or after integration
pub type StepHook = Box<dyn FnMut(&mut RigidBody) + Send>;

/// A simulated body
pub struct RigidBody {
    id: Option<BodyId>,
    kind: BodyKind,
    shape: Shape,

    /// Which pipeline stages apply
    pub motion_state: MotionState,

    mass: f32,
    inv_mass: f32,
    inertia: Vec3,
    inv_inertia: Vec3,

    /// World position of the center of mass
    pub position: Vec3,
    /// Position copied into `position` when added to a world
    pub init_position: Vec3,
    /// Linear velocity
    pub velocity: Vec3,
    /// Velocity copied into `velocity` when added to a world
    pub init_velocity: Vec3,
    /// Orientation
    pub quaternion: Quat,
    /// Orientation copied into `quaternion` when a rigid body is added
    pub init_quaternion: Quat,
    /// Angular velocity in world axes
    pub angular_velocity: Vec3,
    /// Angular velocity copied when a rigid body is added
    pub init_angular_velocity: Vec3,

    /// Force accumulated this step
    pub force: Vec3,
    /// Torque accumulated this step
    pub torque: Vec3,

    /// Fraction of linear velocity removed per step
    pub linear_damping: f32,
    /// Fraction of angular velocity removed per step
    pub angular_damping: f32,

    /// Surface material
    pub material: Option<Material>,

    /// Whether this body may fall asleep
    pub allow_sleep: bool,
    sleep_state: SleepState,
    /// Speed below which the body counts as sleepy
    pub sleep_speed_limit: f32,
    /// Seconds a body must stay sleepy before sleeping
    pub sleep_time_limit: f32,
    time_last_sleepy: f32,

    pre_step: Option<StepHook>,
    post_step: Option<StepHook>,
    listeners: EventListeners,
}

impl RigidBody {
    /// Create a rigid body. Bodies without positive mass are static.
    pub fn new(mass: f32, shape: Shape) -> Self {
        Self::with_kind(BodyKind::Rigid, mass, shape)
    }

    /// Create a point-mass particle
    pub fn particle(mass: f32) -> Self {
        Self::with_kind(BodyKind::Particle, mass, Shape::Particle)
    }

    fn with_kind(kind: BodyKind, mass: f32, shape: Shape) -> Self {
        let mut body = Self {
            id: None,
            kind,
            shape,
            motion_state: MotionState::Static,
            mass: 0.0,
            inv_mass: 0.0,
            inertia: Vec3::ZERO,
            inv_inertia: Vec3::ZERO,
            position: Vec3::ZERO,
            init_position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            init_velocity: Vec3::ZERO,
            quaternion: Quat::IDENTITY,
            init_quaternion: Quat::IDENTITY,
            angular_velocity: Vec3::ZERO,
            init_angular_velocity: Vec3::ZERO,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            linear_damping: 0.01,
            angular_damping: 0.01,
            material: None,
            allow_sleep: true,
            sleep_state: SleepState::Awake,
            sleep_speed_limit: 0.1,
            sleep_time_limit: 1.0,
            time_last_sleepy: 0.0,
            pre_step: None,
            post_step: None,
            listeners: EventListeners::default(),
        };
        body.set_mass(mass);
        body.motion_state = if mass <= 0.0 {
            MotionState::Static
        } else {
            MotionState::Dynamic
        };
        body
    }

    // ==================== Builders ====================

    /// Set initial position
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.init_position = position;
        self.position = position;
        self
    }

    /// Set initial velocity
    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.init_velocity = velocity;
        self.velocity = velocity;
        self
    }

    /// Set initial orientation
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.init_quaternion = rotation;
        self.quaternion = rotation;
        self
    }

    /// Set initial angular velocity
    pub fn with_angular_velocity(mut self, angular_velocity: Vec3) -> Self {
        self.init_angular_velocity = angular_velocity;
        self.angular_velocity = angular_velocity;
        self
    }

    /// Override the motion state
    pub fn with_motion_state(mut self, motion_state: MotionState) -> Self {
        self.motion_state = motion_state;
        self
    }

    /// Set material
    pub fn with_material(mut self, material: &Material) -> Self {
        self.material = Some(material.clone());
        self
    }

    /// Set damping
    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    /// Install a pre-step hook
    pub fn with_pre_step(mut self, hook: impl FnMut(&mut RigidBody) + Send + 'static) -> Self {
        self.pre_step = Some(Box::new(hook));
        self
    }

    /// Install a post-step hook
    pub fn with_post_step(mut self, hook: impl FnMut(&mut RigidBody) + Send + 'static) -> Self {
        self.post_step = Some(Box::new(hook));
        self
    }

    // ==================== Properties ====================

    /// Id assigned by the world, if the body was ever added
    pub fn id(&self) -> Option<BodyId> {
        self.id
    }

    pub(crate) fn assign_id(&mut self, id: BodyId) {
        self.id = Some(id);
    }

    /// Particle or rigid body
    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    /// Whether orientation and angular velocity are simulated
    pub fn has_rotation(&self) -> bool {
        self.kind == BodyKind::Rigid
    }

    /// Collision shape
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Mass
    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Inverse mass, zero for non-positive mass
    pub fn inv_mass(&self) -> f32 {
        self.inv_mass
    }

    /// Diagonal inertia
    pub fn inertia(&self) -> Vec3 {
        self.inertia
    }

    /// Diagonal inverse inertia, zero on axes without inertia
    pub fn inv_inertia(&self) -> Vec3 {
        self.inv_inertia
    }

    /// Set mass and recompute inertia from the shape. Does not change the motion state.
    pub fn set_mass(&mut self, mass: f32) {
        self.mass = mass.max(0.0);
        self.inv_mass = if mass > 0.0 { 1.0 / mass } else { 0.0 };
        self.inertia = if self.has_rotation() {
            self.shape.local_inertia(self.mass)
        } else {
            Vec3::ZERO
        };
        let inv = |i: f32| if i > 0.0 { 1.0 / i } else { 0.0 };
        self.inv_inertia = Vec3::new(inv(self.inertia.x), inv(self.inertia.y), inv(self.inertia.z));
    }

    // ==================== Forces ====================

    /// Accumulate a force applied at a world point
    pub fn apply_force(&mut self, force: Vec3, world_point: Vec3) {
        let r = world_point - self.position;
        self.force += force;
        self.torque += r.cross(force);
    }

    /// Change velocities by an impulse applied at a world point
    pub fn apply_impulse(&mut self, impulse: Vec3, world_point: Vec3) {
        let r = world_point - self.position;
        self.velocity += impulse * self.inv_mass;
        self.angular_velocity += r.cross(impulse) * self.inv_inertia;
    }

    /// Copy the initial state into the live state, as done by `PhysicsWorld::add`
    pub(crate) fn reset_to_initial(&mut self) {
        self.position = self.init_position;
        self.velocity = self.init_velocity;
        if self.has_rotation() {
            self.angular_velocity = self.init_angular_velocity;
            self.quaternion = self.init_quaternion;
        }
    }

    // ==================== Sleeping ====================

    /// Current sleep state
    pub fn sleep_state(&self) -> SleepState {
        self.sleep_state
    }

    /// Check if awake
    pub fn is_awake(&self) -> bool {
        self.sleep_state == SleepState::Awake
    }

    /// Check if sleepy
    pub fn is_sleepy(&self) -> bool {
        self.sleep_state == SleepState::Sleepy
    }

    /// Check if sleeping
    pub fn is_sleeping(&self) -> bool {
        self.sleep_state == SleepState::Sleeping
    }

    /// Force the body asleep
    pub fn sleep(&mut self) {
        self.sleep_state = SleepState::Sleeping;
    }

    /// Wake the body. Returns `WakeUp` if it was sleeping.
    pub fn wake_up(&mut self) -> Option<BodyEventKind> {
        let was = self.sleep_state;
        self.sleep_state = SleepState::Awake;
        (was == SleepState::Sleeping).then_some(BodyEventKind::WakeUp)
    }

    pub(crate) fn set_time_last_sleepy(&mut self, time: f32) {
        self.time_last_sleepy = time;
    }

    /// Advance the sleep state machine at world time `time`.
    ///
    /// Returns the transition event, if any.
    pub fn sleep_tick(&mut self, time: f32) -> Option<BodyEventKind> {
        if !self.allow_sleep {
            return None;
        }
        let speed_sq = self.velocity.length_squared();
        let limit_sq = self.sleep_speed_limit * self.sleep_speed_limit;
        match self.sleep_state {
            SleepState::Awake if speed_sq < limit_sq => {
                self.sleep_state = SleepState::Sleepy;
                self.time_last_sleepy = time;
                Some(BodyEventKind::Sleepy)
            }
            SleepState::Sleepy if speed_sq > limit_sq => self.wake_up(),
            SleepState::Sleepy if time - self.time_last_sleepy > self.sleep_time_limit => {
                self.sleep_state = SleepState::Sleeping;
                Some(BodyEventKind::Sleep)
            }
            _ => None,
        }
    }

    // ==================== Hooks and listeners ====================

    /// Replace the pre-step hook
    pub fn set_pre_step(&mut self, hook: Option<StepHook>) {
        self.pre_step = hook;
    }

    /// Replace the post-step hook
    pub fn set_post_step(&mut self, hook: Option<StepHook>) {
        self.post_step = hook;
    }

    pub(crate) fn run_pre_step(&mut self) {
        if let Some(mut hook) = self.pre_step.take() {
            hook(self);
            if self.pre_step.is_none() {
                self.pre_step = Some(hook);
            }
        }
    }

    pub(crate) fn run_post_step(&mut self) {
        if let Some(mut hook) = self.post_step.take() {
            hook(self);
            if self.post_step.is_none() {
                self.post_step = Some(hook);
            }
        }
    }

    /// Listen for events dispatched on this body
    pub fn add_event_listener(
        &mut self,
        event_type: BodyEventType,
        listener: impl FnMut(&BodyEvent) + Send + 'static,
    ) -> ListenerId {
        self.listeners.add(event_type, Box::new(listener))
    }

    /// Remove a listener, returning whether it existed
    pub fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Whether any listener is registered for the type
    pub fn has_event_listener(&self, event_type: BodyEventType) -> bool {
        self.listeners.has(event_type)
    }

    /// Dispatch an event to this body's listeners
    pub fn dispatch_event(&mut self, event: &BodyEvent) {
        self.listeners.dispatch(event);
    }
}

impl std::fmt::Debug for RigidBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RigidBody")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("shape", &self.shape)
            .field("motion_state", &self.motion_state)
            .field("mass", &self.mass)
            .field("position", &self.position)
            .field("velocity", &self.velocity)
            .field("quaternion", &self.quaternion)
            .field("angular_velocity", &self.angular_velocity)
            .field("sleep_state", &self.sleep_state)
            .field("listeners", &self.listeners)
            .finish()
    }
}
