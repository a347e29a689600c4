//! User-defined constraints between bodies

use crate::body::{BodyId, RigidBody};
use crate::math::normalize_or;
use crate::solver::Equation;
use glam::Vec3;

/// Identifier assigned by the world when a constraint is added
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(pub u32);

/// A constraint that builds its own solver rows each step
pub trait Constraint: Send {
    /// The constrained body
    fn body_i(&self) -> BodyId;

    /// The second body, or `None` when constrained to the world
    fn body_j(&self) -> Option<BodyId>;

    /// Rebuild the rows from the current body state
    fn update(&mut self, bi: &RigidBody, bj: Option<&RigidBody>);

    /// Rows produced by the last `update`
    fn equations(&self) -> &[Equation];
}

/// What the far end of a distance constraint is attached to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistanceTarget {
    Body(BodyId),
    Point(Vec3),
}

/// Keeps two bodies, or a body and a fixed point, at a set distance
#[derive(Debug, Clone)]
pub struct DistanceConstraint {
    body_i: BodyId,
    target: DistanceTarget,
    /// Rest distance
    pub distance: f32,
    equation: Equation,
}

impl DistanceConstraint {
    /// Constrain the centers of two bodies
    pub fn new(body_i: BodyId, body_j: BodyId, distance: f32) -> Self {
        Self {
            body_i,
            target: DistanceTarget::Body(body_j),
            distance,
            equation: Equation::default(),
        }
    }

    /// Constrain a body's center to a fixed world point
    pub fn to_point(body: BodyId, point: Vec3, distance: f32) -> Self {
        Self {
            body_i: body,
            target: DistanceTarget::Point(point),
            distance,
            equation: Equation::default(),
        }
    }

    /// Far end of the constraint
    pub fn target(&self) -> DistanceTarget {
        self.target
    }

    /// Bound the constraint force to `[-|force|, |force|]`
    pub fn set_max_force(&mut self, force: f32) {
        self.equation.upper = force.abs();
        self.equation.lower = -force.abs();
    }
}

impl Constraint for DistanceConstraint {
    fn body_i(&self) -> BodyId {
        self.body_i
    }

    fn body_j(&self) -> Option<BodyId> {
        match self.target {
            DistanceTarget::Body(id) => Some(id),
            DistanceTarget::Point(_) => None,
        }
    }

    fn update(&mut self, bi: &RigidBody, bj: Option<&RigidBody>) {
        let xj = match (self.target, bj) {
            (DistanceTarget::Body(_), Some(bj)) => bj.position,
            (DistanceTarget::Point(p), _) => p,
            (DistanceTarget::Body(id), None) => {
                log::warn!("Distance constraint target {:?} missing, holding position", id);
                bi.position
            }
        };

        let eq = &mut self.equation;
        let dir = normalize_or(xj - bi.position, Vec3::X);
        eq.jacobian = [dir, Vec3::ZERO, -dir, Vec3::ZERO];

        eq.set_default_mass_props(bi, bj);
        eq.set_default_force(bi, bj);

        let violation = -(xj - bi.position - dir * self.distance);
        eq.gap = [violation, Vec3::ZERO, -violation, Vec3::ZERO];
    }

    fn equations(&self) -> &[Equation] {
        std::slice::from_ref(&self.equation)
    }
}

/// What the far pivot of a point-to-point constraint is attached to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PivotTarget {
    /// A pivot in the local frame of another body
    Body(BodyId, Vec3),
    /// A fixed world point
    Point(Vec3),
}

/// Joins a pivot on one body to a pivot on another body, or to a fixed
/// world point, with one row per world axis.
///
/// Pivots are given in each body's local frame.
#[derive(Debug, Clone)]
pub struct PointToPointConstraint {
    body_i: BodyId,
    pivot_i: Vec3,
    target: PivotTarget,
    equations: [Equation; 3],
}

impl PointToPointConstraint {
    /// Join `pivot_i` on `body_i` to `pivot_j` on `body_j`
    pub fn new(body_i: BodyId, pivot_i: Vec3, body_j: BodyId, pivot_j: Vec3) -> Self {
        Self {
            body_i,
            pivot_i,
            target: PivotTarget::Body(body_j, pivot_j),
            equations: [Equation::default(); 3],
        }
    }

    /// Pin `pivot` on `body` to a fixed world point
    pub fn to_point(body: BodyId, pivot: Vec3, point: Vec3) -> Self {
        Self {
            body_i: body,
            pivot_i: pivot,
            target: PivotTarget::Point(point),
            equations: [Equation::default(); 3],
        }
    }

    /// Far end of the constraint
    pub fn target(&self) -> PivotTarget {
        self.target
    }

    /// Bound every row's force to `[-|force|, |force|]`
    pub fn set_max_force(&mut self, force: f32) {
        for eq in &mut self.equations {
            eq.upper = force.abs();
            eq.lower = -force.abs();
        }
    }
}

impl Constraint for PointToPointConstraint {
    fn body_i(&self) -> BodyId {
        self.body_i
    }

    fn body_j(&self) -> Option<BodyId> {
        match self.target {
            PivotTarget::Body(id, _) => Some(id),
            PivotTarget::Point(_) => None,
        }
    }

    fn update(&mut self, bi: &RigidBody, bj: Option<&RigidBody>) {
        let ri = bi.quaternion * self.pivot_i;
        let (anchor_j, rj, wj, vj) = match (self.target, bj) {
            (PivotTarget::Body(_, pivot), Some(bj)) => {
                let rj = bj.quaternion * pivot;
                (bj.position + rj, rj, bj.angular_velocity, bj.velocity)
            }
            (PivotTarget::Point(p), _) => (p, Vec3::ZERO, Vec3::ZERO, Vec3::ZERO),
            (PivotTarget::Body(id, _), None) => {
                log::warn!("Point-to-point target {:?} missing, holding pivot", id);
                (bi.position + ri, Vec3::ZERO, Vec3::ZERO, Vec3::ZERO)
            }
        };

        // Separation and relative velocity of the two pivots
        let separation = anchor_j - (bi.position + ri);
        let u_rel = (vj + wj.cross(rj)) - (bi.velocity + bi.angular_velocity.cross(ri));

        for (eq, axis) in self.equations.iter_mut().zip([Vec3::X, Vec3::Y, Vec3::Z]) {
            eq.jacobian = [-axis, -ri.cross(axis), axis, rj.cross(axis)];
            eq.set_default_mass_props(bi, bj);
            eq.set_default_force(bi, bj);

            let g = axis * separation.dot(axis);
            eq.gap = [-g, Vec3::ZERO, g, Vec3::ZERO];
            let w = axis * (u_rel.dot(axis) * 0.5);
            eq.bias_velocity = [-w, Vec3::ZERO, w, Vec3::ZERO];
        }
    }

    fn equations(&self) -> &[Equation] {
        &self.equations
    }
}
