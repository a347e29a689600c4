//! Per-body force, damping and semi-implicit Euler integration

use crate::body::RigidBody;
use crate::math::{integrate_orientation, normalize_fast};
use glam::Vec3;

/// How to renormalize an orientation after integration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renormalize {
    /// First-order approximation
    Fast,
    /// Exact division by the length
    Exact,
}

/// Add `gravity * mass` to the force of dynamic bodies
pub fn apply_gravity(body: &mut RigidBody, gravity: Vec3) {
    if body.motion_state.is_dynamic() {
        body.force += gravity * body.mass();
    }
}

/// Remove a fraction of the velocity of dynamic bodies
pub fn apply_damping(body: &mut RigidBody) {
    if body.motion_state.is_dynamic() {
        body.velocity *= 1.0 - body.linear_damping;
        body.angular_velocity *= 1.0 - body.angular_damping;
    }
}

/// Integrates velocities from the accumulated force and torque
pub fn integrate_velocities(body: &mut RigidBody, dt: f32) {
    if !body.motion_state.is_dynamic_or_kinematic() {
        return;
    }
    body.velocity += body.force * body.inv_mass() * dt;
    if body.has_rotation() {
        body.angular_velocity += body.torque * body.inv_inertia() * dt;
    }
}

/// Integrates position and orientation from the velocities. Sleeping bodies stay put.
pub fn integrate_positions(body: &mut RigidBody, dt: f32, renormalize: Option<Renormalize>) {
    if !body.motion_state.is_dynamic_or_kinematic() || body.is_sleeping() {
        return;
    }

    body.position += body.velocity * dt;

    if body.has_rotation() {
        let q = integrate_orientation(body.quaternion, body.angular_velocity, dt);
        body.quaternion = match renormalize {
            Some(Renormalize::Fast) => normalize_fast(q),
            Some(Renormalize::Exact) => q.normalize(),
            None => q,
        };
    }
}

/// Performs a full integration step (semi-implicit Euler) and clears forces
pub fn integrate_semi_implicit_euler(body: &mut RigidBody, dt: f32, renormalize: Option<Renormalize>) {
    // Velocity first, then position with the new velocity
    integrate_velocities(body, dt);
    integrate_positions(body, dt, renormalize);
    body.force = Vec3::ZERO;
    body.torque = Vec3::ZERO;
}
