//! Narrow phase: contact points for candidate pairs

use crate::body::{BodyId, RigidBody};
use crate::math::normalize_or;
use crate::shape::{Shape, PLANE_NORMAL};
use glam::{Quat, Vec3};

/// A contact between two bodies
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// First body
    pub bi: BodyId,
    /// Second body
    pub bj: BodyId,
    /// Contact point relative to the center of `bi`, in world axes
    pub ri: Vec3,
    /// Contact point relative to the center of `bj`, in world axes
    pub rj: Vec3,
    /// Unit normal pointing from `bi` toward `bj`
    pub ni: Vec3,
}

impl Contact {
    /// Exchange the roles of the two bodies
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.bi, &mut self.bj);
        std::mem::swap(&mut self.ri, &mut self.rj);
        self.ni = -self.ni;
    }
}

/// Free list of contact records reused between steps
#[derive(Debug, Default)]
pub struct ContactPool {
    free: Vec<Contact>,
}

impl ContactPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a record for the pair, reusing a released one when available
    pub fn acquire(&mut self, bi: BodyId, bj: BodyId) -> Contact {
        match self.free.pop() {
            Some(mut c) => {
                c.bi = bi;
                c.bj = bj;
                c.ri = Vec3::ZERO;
                c.rj = Vec3::ZERO;
                c.ni = Vec3::ZERO;
                c
            }
            None => Contact {
                bi,
                bj,
                ri: Vec3::ZERO,
                rj: Vec3::ZERO,
                ni: Vec3::ZERO,
            },
        }
    }

    /// Return every record in `contacts` to the pool
    pub fn release_all(&mut self, contacts: &mut Vec<Contact>) {
        self.free.append(contacts);
    }

    /// Number of records available for reuse
    pub fn available(&self) -> usize {
        self.free.len()
    }
}

/// Produces contacts for broadphase pairs
pub trait ContactGenerator: Send {
    /// Append contacts for every pair `(p1[k], p2[k])` of indices into `bodies` to `out`
    fn get_contacts(
        &mut self,
        p1: &[usize],
        p2: &[usize],
        bodies: &[RigidBody],
        out: &mut Vec<Contact>,
        pool: &mut ContactPool,
    );
}

/// Contact generation for spheres, planes, boxes and particles
#[derive(Debug, Default, Clone)]
pub struct DefaultContactGenerator;

impl DefaultContactGenerator {
    /// Create a new contact generator
    pub fn new() -> Self {
        Self
    }

    /// Contacts between two bodies, with `bi` first in the resulting records
    fn near_phase(
        &self,
        bi: &RigidBody,
        bj: &RigidBody,
        ids: (BodyId, BodyId),
        out: &mut Vec<Contact>,
        pool: &mut ContactPool,
    ) {
        if bi.shape().kind() > bj.shape().kind() {
            let start = out.len();
            self.ordered(bj, bi, (ids.1, ids.0), out, pool);
            for c in &mut out[start..] {
                c.swap();
            }
        } else {
            self.ordered(bi, bj, ids, out, pool);
        }
    }

    /// `a` is never of a later shape kind than `b`
    fn ordered(
        &self,
        a: &RigidBody,
        b: &RigidBody,
        ids: (BodyId, BodyId),
        out: &mut Vec<Contact>,
        pool: &mut ContactPool,
    ) {
        let mut c = pool.acquire(ids.0, ids.1);
        let found = match (*a.shape(), *b.shape()) {
            (Shape::Sphere { radius: ra }, Shape::Sphere { radius: rb }) => {
                sphere_sphere(&mut c, a.position, ra, b.position, rb)
            }
            (Shape::Sphere { radius }, Shape::Plane) => {
                sphere_plane(&mut c, a.position, radius, b.position, b.quaternion)
            }
            (Shape::Sphere { radius }, Shape::Box { half_extents }) => {
                sphere_box(&mut c, a.position, radius, b.position, b.quaternion, half_extents)
            }
            (Shape::Sphere { radius }, Shape::Particle) => {
                sphere_sphere(&mut c, a.position, radius, b.position, 0.0)
            }
            (Shape::Plane, Shape::Box { half_extents }) => {
                plane_box(&c, a, b, half_extents, out, pool);
                false
            }
            (Shape::Plane, Shape::Particle) => plane_particle(&mut c, a.position, a.quaternion, b.position),
            (sa, sb) => {
                log::trace!("No contact generation for {:?} against {:?}", sa.kind(), sb.kind());
                false
            }
        };
        if found {
            out.push(c);
        } else {
            pool.free.push(c);
        }
    }
}

impl ContactGenerator for DefaultContactGenerator {
    fn get_contacts(
        &mut self,
        p1: &[usize],
        p2: &[usize],
        bodies: &[RigidBody],
        out: &mut Vec<Contact>,
        pool: &mut ContactPool,
    ) {
        for (&i, &j) in p1.iter().zip(p2) {
            let (bi, bj) = (&bodies[i], &bodies[j]);
            let (Some(id_i), Some(id_j)) = (bi.id(), bj.id()) else {
                log::warn!("Skipping pair ({}, {}): body not added to a world", i, j);
                continue;
            };
            self.near_phase(bi, bj, (id_i, id_j), out, pool);
        }
    }
}

fn sphere_sphere(c: &mut Contact, xi: Vec3, ri: f32, xj: Vec3, rj: f32) -> bool {
    let delta = xj - xi;
    if delta.length_squared() < 1e-12 {
        log::warn!("Coincident sphere centers, using +Y as contact normal");
    }
    c.ni = normalize_or(delta, Vec3::Y);
    c.ri = c.ni * ri;
    c.rj = c.ni * -rj;
    true
}

fn sphere_plane(c: &mut Contact, xi: Vec3, radius: f32, xj: Vec3, qj: Quat) -> bool {
    // Normal points out of the sphere, into the plane
    c.ni = -(qj * PLANE_NORMAL).normalize();
    c.ri = c.ni * radius;

    let plane_to_sphere = xi - xj;
    let ortho = c.ni * c.ni.dot(plane_to_sphere);
    c.rj = plane_to_sphere - ortho;
    ortho.length() <= radius
}

fn sphere_box(
    c: &mut Contact,
    xi: Vec3,
    radius: f32,
    xj: Vec3,
    qj: Quat,
    half_extents: Vec3,
) -> bool {
    let box_to_sphere = xi - xj;
    // Unit face normals come from the rotation so flat boxes stay finite
    let normals = [qj * Vec3::X, qj * Vec3::Y, qj * Vec3::Z];
    let h = half_extents.to_array();
    let axes = [normals[0] * h[0], normals[1] * h[1], normals[2] * h[2]];
    let sides = [
        (normals[0], h[0]),
        (normals[1], h[1]),
        (normals[2], h[2]),
        (-normals[0], h[0]),
        (-normals[1], h[1]),
        (-normals[2], h[2]),
    ];

    // Faces
    for (idx, &(ns, hs)) in sides.iter().enumerate() {
        let dot = box_to_sphere.dot(ns);
        if dot < hs + radius && dot > 0.0 {
            let (k1, k2) = ((idx + 1) % 3, (idx + 2) % 3);
            let (ns1, ns2) = (normals[k1], normals[k2]);
            let dot1 = box_to_sphere.dot(ns1);
            let dot2 = box_to_sphere.dot(ns2);
            if dot1.abs() < h[k1] && dot2.abs() < h[k2] {
                c.ri = ns * -radius;
                c.ni = -ns;
                c.rj = ns * hs + ns1 * dot1 + ns2 * dot2;
                return true;
            }
        }
    }

    // Corners
    for sx in [-1.0, 1.0] {
        for sy in [-1.0, 1.0] {
            for sz in [-1.0, 1.0] {
                let corner = axes[0] * sx + axes[1] * sy + axes[2] * sz;
                let sphere_to_corner = xj + corner - xi;
                if sphere_to_corner.length() < radius {
                    c.ni = normalize_or(sphere_to_corner, -box_to_sphere.normalize_or_zero());
                    c.ri = c.ni * radius;
                    c.rj = corner;
                    return true;
                }
            }
        }
    }

    // Edges
    for (j, &(nj, hj)) in sides.iter().enumerate() {
        for (k, &(nk, hk)) in sides.iter().enumerate() {
            if j % 3 == k % 3 {
                continue;
            }
            let tangent = nk.cross(nj);
            let center = nj * hj + nk * hk;
            let orthonorm = (xi - center - xj).dot(tangent);
            let orthogonal = tangent * orthonorm;

            let l = (0..3).find(|l| *l != j % 3 && *l != k % 3).unwrap_or(0);
            let dist = xi - orthogonal - center - xj;

            if orthonorm.abs() < h[l] && dist.length() < radius {
                c.rj = center + orthogonal;
                c.ni = normalize_or(-dist, -box_to_sphere.normalize_or_zero());
                c.ri = normalize_or(c.rj + xj - xi, c.ni) * radius;
                return true;
            }
        }
    }

    false
}

/// Up to four box corners at or below the plane
fn plane_box(
    template: &Contact,
    plane: &RigidBody,
    cuboid: &RigidBody,
    half_extents: Vec3,
    out: &mut Vec<Contact>,
    pool: &mut ContactPool,
) {
    let n = (plane.quaternion * PLANE_NORMAL).normalize();
    let e = half_extents;
    let mut count = 0;

    for sx in [1.0, -1.0] {
        for sy in [1.0, -1.0] {
            for sz in [1.0, -1.0] {
                if count == 4 {
                    return;
                }
                let corner = cuboid.quaternion * Vec3::new(sx * e.x, sy * e.y, sz * e.z);
                let plane_to_corner = corner + cuboid.position - plane.position;
                let d = n.dot(plane_to_corner);
                if d <= 0.0 {
                    let mut c = pool.acquire(template.bi, template.bj);
                    c.ni = n;
                    c.ri = plane_to_corner - n * d;
                    c.rj = corner;
                    out.push(c);
                    count += 1;
                }
            }
        }
    }
}

fn plane_particle(c: &mut Contact, xi: Vec3, qi: Quat, xj: Vec3) -> bool {
    let n = (qi * PLANE_NORMAL).normalize();
    let plane_to_particle = xj - xi;
    let d = n.dot(plane_to_particle);
    if d > 0.0 {
        return false;
    }
    c.ni = n;
    c.ri = plane_to_particle - n * d;
    c.rj = Vec3::ZERO;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn added(mut body: RigidBody, id: u32) -> RigidBody {
        body.assign_id(BodyId(id));
        body
    }

    fn ground(id: u32) -> RigidBody {
        added(
            RigidBody::new(0.0, Shape::Plane)
                .with_rotation(Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2)),
            id,
        )
    }

    fn gap(c: &Contact, bodies: &[RigidBody], i: usize, j: usize) -> f32 {
        ((bodies[j].position + c.rj) - (bodies[i].position + c.ri)).dot(c.ni)
    }

    fn generate(bodies: &[RigidBody], i: usize, j: usize) -> Vec<Contact> {
        let mut out = Vec::new();
        let mut pool = ContactPool::new();
        DefaultContactGenerator::new().get_contacts(&[i], &[j], bodies, &mut out, &mut pool);
        out
    }

    #[test]
    fn test_sphere_sphere() {
        let bodies = vec![
            added(RigidBody::new(1.0, Shape::sphere(1.0)), 0),
            added(
                RigidBody::new(1.0, Shape::sphere(1.0)).with_position(Vec3::new(0.0, 1.9, 0.0)),
                1,
            ),
        ];
        let contacts = generate(&bodies, 0, 1);
        assert_eq!(contacts.len(), 1);
        let c = contacts[0];
        assert_eq!(c.bi, BodyId(0));
        assert_eq!(c.ni, Vec3::Y);
        assert_eq!(c.ri, Vec3::Y);
        assert_eq!(c.rj, -Vec3::Y);
        assert_abs_diff_eq!(gap(&c, &bodies, 0, 1), -0.1, epsilon = 1e-5);
    }

    #[test]
    fn test_sphere_plane_both_orders() {
        let bodies = vec![
            ground(0),
            added(
                RigidBody::new(1.0, Shape::sphere(1.0)).with_position(Vec3::new(0.0, 0.8, 0.0)),
                1,
            ),
        ];

        // Sphere first
        let c = generate(&bodies, 1, 0)[0];
        assert_eq!(c.bi, BodyId(1));
        assert_abs_diff_eq!(c.ni.y, -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(gap(&c, &bodies, 1, 0), -0.2, epsilon = 1e-5);

        // Plane first: swapped back
        let c = generate(&bodies, 0, 1)[0];
        assert_eq!(c.bi, BodyId(0));
        assert_eq!(c.bj, BodyId(1));
        assert_abs_diff_eq!(c.ni.y, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(gap(&c, &bodies, 0, 1), -0.2, epsilon = 1e-5);
    }

    #[test]
    fn test_sphere_far_above_plane() {
        let bodies = vec![
            ground(0),
            added(
                RigidBody::new(1.0, Shape::sphere(1.0)).with_position(Vec3::new(0.0, 5.0, 0.0)),
                1,
            ),
        ];
        assert!(generate(&bodies, 1, 0).is_empty());
    }

    #[test]
    fn test_plane_box_four_corners() {
        let bodies = vec![
            ground(0),
            added(
                RigidBody::new(1.0, Shape::cuboid(1.0, 1.0, 1.0)).with_position(Vec3::new(0.0, 0.9, 0.0)),
                1,
            ),
        ];
        let contacts = generate(&bodies, 0, 1);
        assert_eq!(contacts.len(), 4);
        for c in &contacts {
            assert_abs_diff_eq!(gap(c, &bodies, 0, 1), -0.1, epsilon = 1e-5);
            assert_abs_diff_eq!(c.ni.y, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_sphere_box_face() {
        let bodies = vec![
            added(
                RigidBody::new(1.0, Shape::sphere(0.5)).with_position(Vec3::new(0.0, 1.4, 0.0)),
                0,
            ),
            added(RigidBody::new(1.0, Shape::cuboid(1.0, 1.0, 1.0)), 1),
        ];
        let contacts = generate(&bodies, 0, 1);
        assert_eq!(contacts.len(), 1);
        let c = contacts[0];
        assert_abs_diff_eq!(c.ni.y, -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(gap(&c, &bodies, 0, 1), -0.1, epsilon = 1e-5);
    }

    #[test]
    fn test_sphere_box_corner() {
        let bodies = vec![
            added(
                RigidBody::new(1.0, Shape::sphere(0.5)).with_position(Vec3::splat(1.2)),
                0,
            ),
            added(RigidBody::new(1.0, Shape::cuboid(1.0, 1.0, 1.0)), 1),
        ];
        let contacts = generate(&bodies, 0, 1);
        assert_eq!(contacts.len(), 1);
        let c = contacts[0];
        assert_eq!(c.rj, Vec3::ONE);
        assert!(gap(&c, &bodies, 0, 1) < 0.0);
    }

    #[test]
    fn test_sphere_box_edge() {
        // Sphere beyond the +X/+Y edge, within its Z extent
        let bodies = vec![
            added(
                RigidBody::new(1.0, Shape::sphere(0.5)).with_position(Vec3::new(1.3, 1.3, 0.2)),
                0,
            ),
            added(RigidBody::new(1.0, Shape::cuboid(1.0, 1.0, 1.0)), 1),
        ];
        let contacts = generate(&bodies, 0, 1);
        assert_eq!(contacts.len(), 1);
        let c = contacts[0];
        assert_abs_diff_eq!(c.rj.x, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(c.rj.y, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(c.rj.z, 0.2, epsilon = 1e-5);
        assert!(gap(&c, &bodies, 0, 1) < 0.0);
    }

    #[test]
    fn test_sphere_on_flat_box_is_finite() {
        let bodies = vec![
            added(
                RigidBody::new(1.0, Shape::sphere(0.5)).with_position(Vec3::new(0.1, 0.4, 0.0)),
                0,
            ),
            added(RigidBody::new(1.0, Shape::cuboid(1.0, 0.0, 1.0)), 1),
        ];
        let contacts = generate(&bodies, 0, 1);
        assert_eq!(contacts.len(), 1);
        let c = contacts[0];
        assert!(c.ni.is_finite() && c.ri.is_finite() && c.rj.is_finite());
        assert_abs_diff_eq!(c.ni.y, -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(gap(&c, &bodies, 0, 1), -0.1, epsilon = 1e-5);
    }

    #[test]
    fn test_plane_particle() {
        let bodies = vec![
            ground(0),
            added(RigidBody::particle(1.0).with_position(Vec3::new(0.3, -0.05, 0.0)), 1),
        ];
        let c = generate(&bodies, 1, 0)[0];
        assert_eq!(c.bi, BodyId(1));
        assert_abs_diff_eq!(gap(&c, &bodies, 1, 0), -0.05, epsilon = 1e-6);
    }

    #[test]
    fn test_unsupported_pair_yields_nothing() {
        let bodies = vec![
            added(RigidBody::new(1.0, Shape::cuboid(1.0, 1.0, 1.0)), 0),
            added(RigidBody::new(1.0, Shape::cuboid(1.0, 1.0, 1.0)), 1),
        ];
        assert!(generate(&bodies, 0, 1).is_empty());
    }

    #[test]
    fn test_pool_reuse() {
        let mut pool = ContactPool::new();
        let mut contacts = vec![pool.acquire(BodyId(0), BodyId(1)), pool.acquire(BodyId(2), BodyId(3))];
        pool.release_all(&mut contacts);
        assert!(contacts.is_empty());
        assert_eq!(pool.available(), 2);
        let c = pool.acquire(BodyId(5), BodyId(6));
        assert_eq!(c.bi, BodyId(5));
        assert_eq!(c.ni, Vec3::ZERO);
        assert_eq!(pool.available(), 1);
    }
}
