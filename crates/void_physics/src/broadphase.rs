//! Broad phase: candidate body pairs for contact generation

use crate::body::RigidBody;
use crate::shape::PLANE_NORMAL;

/// Proposes body pairs that may be touching.
///
/// Returns two equal-length lists of indices into `bodies`.
pub trait Broadphase: Send {
    fn collision_pairs(&mut self, bodies: &[RigidBody]) -> (Vec<usize>, Vec<usize>);
}

/// Tests every pair with bounding spheres and plane half-spaces
#[derive(Debug, Default, Clone)]
pub struct NaiveBroadphase;

impl NaiveBroadphase {
    /// Create a new naive broadphase
    pub fn new() -> Self {
        Self
    }

    /// Static, kinematic and sleeping bodies never move each other
    fn is_inactive(body: &RigidBody) -> bool {
        body.motion_state.is_static_or_kinematic() || body.is_sleeping()
    }

    /// Whether two bodies should be tested at all
    fn needs_test(bi: &RigidBody, bj: &RigidBody) -> bool {
        !(Self::is_inactive(bi) && Self::is_inactive(bj))
    }

    fn overlaps(bi: &RigidBody, bj: &RigidBody) -> bool {
        match (bi.shape().is_plane(), bj.shape().is_plane()) {
            (true, true) => false,
            (true, false) => Self::below_plane(bi, bj),
            (false, true) => Self::below_plane(bj, bi),
            (false, false) => {
                let r = bi.shape().bounding_radius() + bj.shape().bounding_radius();
                bi.position.distance_squared(bj.position) < r * r
            }
        }
    }

    fn below_plane(plane: &RigidBody, other: &RigidBody) -> bool {
        let normal = plane.quaternion * PLANE_NORMAL;
        let offset = other.position - plane.position;
        offset.dot(normal) - other.shape().bounding_radius() < 0.0
    }
}

impl Broadphase for NaiveBroadphase {
    fn collision_pairs(&mut self, bodies: &[RigidBody]) -> (Vec<usize>, Vec<usize>) {
        let mut pairs1 = Vec::new();
        let mut pairs2 = Vec::new();

        for i in 0..bodies.len() {
            for j in 0..i {
                let (bi, bj) = (&bodies[i], &bodies[j]);
                if Self::needs_test(bi, bj) && Self::overlaps(bi, bj) {
                    pairs1.push(i);
                    pairs2.push(j);
                }
            }
        }

        (pairs1, pairs2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::MotionState;
    use crate::shape::Shape;
    use glam::{Quat, Vec3};

    fn sphere_at(y: f32) -> RigidBody {
        RigidBody::new(1.0, Shape::sphere(1.0)).with_position(Vec3::new(0.0, y, 0.0))
    }

    #[test]
    fn test_overlapping_spheres_pair() {
        let bodies = vec![sphere_at(0.0), sphere_at(1.5), sphere_at(10.0)];
        let (p1, p2) = NaiveBroadphase::new().collision_pairs(&bodies);
        assert_eq!(p1, vec![1]);
        assert_eq!(p2, vec![0]);
    }

    #[test]
    fn test_static_pairs_skipped() {
        let bodies = vec![
            sphere_at(0.0).with_motion_state(MotionState::Static),
            sphere_at(0.5).with_motion_state(MotionState::Kinematic),
        ];
        let (p1, _) = NaiveBroadphase::new().collision_pairs(&bodies);
        assert!(p1.is_empty());
    }

    #[test]
    fn test_sleeping_pairs_skipped() {
        let mut bodies = vec![sphere_at(0.0), sphere_at(0.5)];
        bodies[0].sleep();
        bodies[1].sleep();
        let (p1, _) = NaiveBroadphase::new().collision_pairs(&bodies);
        assert!(p1.is_empty());

        bodies[1].wake_up();
        let (p1, _) = NaiveBroadphase::new().collision_pairs(&bodies);
        assert_eq!(p1.len(), 1);
    }

    #[test]
    fn test_sleeping_body_on_static_ground_skipped() {
        let ground = RigidBody::new(0.0, Shape::Plane)
            .with_rotation(Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2));
        let mut bodies = vec![ground, sphere_at(0.5)];
        bodies[1].sleep();
        let (p1, _) = NaiveBroadphase::new().collision_pairs(&bodies);
        assert!(p1.is_empty());

        bodies[1].wake_up();
        let (p1, p2) = NaiveBroadphase::new().collision_pairs(&bodies);
        assert_eq!((p1, p2), (vec![1], vec![0]));
    }

    #[test]
    fn test_plane_half_space() {
        // Plane normal +Z rotated to +Y
        let ground = RigidBody::new(0.0, Shape::Plane)
            .with_rotation(Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2));
        let bodies = vec![ground, sphere_at(0.5), sphere_at(3.0)];
        let (p1, p2) = NaiveBroadphase::new().collision_pairs(&bodies);
        assert_eq!(p1, vec![1]);
        assert_eq!(p2, vec![0]);
    }
}
