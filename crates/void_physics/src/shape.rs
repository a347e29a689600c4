//! Collision shapes attached to rigid bodies

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Collision shape type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// Sphere with radius
    Sphere { radius: f32 },
    /// Infinite plane through the body origin, normal along local +Z
    Plane,
    /// Box with half-extents
    Box { half_extents: Vec3 },
    /// Point mass without extent
    Particle,
}

/// Discriminant used to order shape pairs in the narrow phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShapeKind {
    Sphere,
    Plane,
    Box,
    Particle,
}

impl Shape {
    /// Create a sphere shape
    pub fn sphere(radius: f32) -> Self {
        Self::Sphere { radius }
    }

    /// Create a box shape from half extents
    pub fn cuboid(hx: f32, hy: f32, hz: f32) -> Self {
        Self::Box {
            half_extents: Vec3::new(hx, hy, hz),
        }
    }

    /// Get the shape kind
    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Sphere { .. } => ShapeKind::Sphere,
            Self::Plane => ShapeKind::Plane,
            Self::Box { .. } => ShapeKind::Box,
            Self::Particle => ShapeKind::Particle,
        }
    }

    /// Diagonal of the body-frame inertia tensor for the given mass
    pub fn local_inertia(&self, mass: f32) -> Vec3 {
        match *self {
            Self::Sphere { radius } => Vec3::splat(2.0 * mass * radius * radius / 5.0),
            Self::Box { half_extents: e } => {
                let (x, y, z) = (2.0 * e.x, 2.0 * e.y, 2.0 * e.z);
                Vec3::new(
                    mass / 12.0 * (y * y + z * z),
                    mass / 12.0 * (x * x + z * z),
                    mass / 12.0 * (y * y + x * x),
                )
            }
            Self::Plane | Self::Particle => Vec3::ZERO,
        }
    }

    /// Radius of a sphere centered on the body that encloses the shape
    pub fn bounding_radius(&self) -> f32 {
        match *self {
            Self::Sphere { radius } => radius,
            Self::Box { half_extents } => half_extents.length(),
            Self::Plane => f32::INFINITY,
            Self::Particle => 0.0,
        }
    }

    /// Whether this is a plane
    pub fn is_plane(&self) -> bool {
        matches!(self, Self::Plane)
    }
}

/// Local normal of every plane shape
pub const PLANE_NORMAL: Vec3 = Vec3::Z;
