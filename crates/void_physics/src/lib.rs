//! Void Physics - rigid body world core
//!
//! This crate advances a set of rigid bodies in time: gravity, pair
//! finding, contact generation, SPOOK constraint solving, semi-implicit
//! Euler integration and sleep bookkeeping.
//!
//! # Features
//!
//! - Rigid bodies and particles (dynamic, static, kinematic)
//! - Spheres, planes, boxes and particles
//! - Edge-triggered collide events and body sleeping
//! - Materials and per-pair contact materials (friction, restitution)
//! - User constraints (distance, point-to-point)
//! - Swappable broad phase, narrow phase and solver
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    PhysicsWorld                      │
//! │  ┌────────────┐  ┌───────────────┐  ┌─────────────┐ │
//! │  │ RigidBody  │  │ MaterialTable │  │ Constraints │ │
//! │  └────────────┘  └───────────────┘  └─────────────┘ │
//! │  ┌─────────────────────────────────────────────────┐│
//! │  │                   step(dt)                       ││
//! │  │  gravity → broadphase → matrix tick → contacts   ││
//! │  │  → solver → damping → integrate → sleep          ││
//! │  └─────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────┘
//!                          │
//!          ┌───────────────┼────────────────┐
//!          ▼               ▼                ▼
//!    ┌───────────┐   ┌────────────┐   ┌────────────┐
//!    │WorldEvent │   │ BodyEvent  │   │  Channel   │
//!    │ pre/post  │   │collide/... │   │  handler   │
//!    └───────────┘   └────────────┘   └────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use void_physics::prelude::*;
//!
//! let mut physics = PhysicsWorld::new(PhysicsConfig::default());
//!
//! let ground = RigidBody::new(0.0, Shape::Plane)
//!     .with_rotation(Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2));
//! physics.add(ground);
//!
//! let ball = physics.add(
//!     RigidBody::new(1.0, Shape::sphere(0.5)).with_position(Vec3::new(0.0, 10.0, 0.0)),
//! );
//!
//! physics.step(1.0 / 60.0)?;
//! for event in physics.events().collisions_of(ball) {
//!     println!("{:?} hit {:?}", event.target, event.other());
//! }
//! ```

pub mod body;
pub mod broadphase;
pub mod collision_matrix;
pub mod config;
pub mod constraint;
pub mod error;
pub mod events;
pub mod integrator;
pub mod material;
pub mod math;
pub mod narrowphase;
pub mod shape;
pub mod solver;
pub mod world;

pub mod prelude {
    //! Common imports for physics functionality
    pub use crate::body::{BodyId, BodyKind, MotionState, RigidBody, SleepState};
    pub use crate::broadphase::{Broadphase, NaiveBroadphase};
    pub use crate::config::PhysicsConfig;
    pub use crate::constraint::{
        Constraint, ConstraintId, DistanceConstraint, PointToPointConstraint,
    };
    pub use crate::error::{PhysicsError, Result};
    pub use crate::events::{
        BodyEvent, BodyEventKind, BodyEventType, EventCollector, PhysicsEvent,
        PhysicsEventHandler, WorldEvent,
    };
    pub use crate::material::{ContactMaterial, Material};
    pub use crate::narrowphase::{Contact, ContactGenerator, DefaultContactGenerator};
    pub use crate::shape::Shape;
    pub use crate::solver::{Equation, Solver, SpookSolver};
    pub use crate::world::PhysicsWorld;
    pub use glam::{Quat, Vec3};
}

pub use prelude::*;
