//! Small vector and quaternion helpers on top of glam

use glam::{Quat, Vec3};

/// Lengths below this are treated as degenerate directions
pub const EPSILON: f32 = 1e-6;

/// Two unit tangents orthogonal to `normal` and to each other.
///
/// A zero-length normal yields the X and Y axes.
pub fn tangents(normal: Vec3) -> (Vec3, Vec3) {
    let len = normal.length();
    if len < EPSILON {
        return (Vec3::X, Vec3::Y);
    }
    let n = normal / len;

    let t1 = if n.x.abs() >= 0.57735 {
        Vec3::new(n.y, -n.x, 0.0)
    } else {
        Vec3::new(0.0, n.z, -n.y)
    };
    let t1 = t1 / (t1.length() + EPSILON);
    let t2 = n.cross(t1);

    (t1, t2)
}

/// Normalize `v`, or return `fallback` when `v` has no usable direction
pub fn normalize_or(v: Vec3, fallback: Vec3) -> Vec3 {
    let len = v.length();
    if len < EPSILON {
        fallback
    } else {
        v / len
    }
}

/// First-order renormalization, accurate when `q` is already close to unit length
pub fn normalize_fast(q: Quat) -> Quat {
    let f = (3.0 - q.length_squared()) * 0.5;
    if f == 0.0 {
        Quat::from_xyzw(0.0, 0.0, 0.0, 0.0)
    } else {
        q * f
    }
}

/// Advance an orientation by angular velocity `w` over `dt`.
///
/// Computes `q + 0.5 * dt * (w, 0) * q` without renormalizing.
pub fn integrate_orientation(q: Quat, w: Vec3, dt: f32) -> Quat {
    let wq = Quat::from_xyzw(w.x, w.y, w.z, 0.0) * q;
    let half_dt = 0.5 * dt;
    Quat::from_xyzw(
        q.x + half_dt * wq.x,
        q.y + half_dt * wq.y,
        q.z + half_dt * wq.z,
        q.w + half_dt * wq.w,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_tangents_are_orthonormal() {
        for n in [Vec3::X, Vec3::Y, Vec3::Z, Vec3::new(1.0, 2.0, -3.0).normalize()] {
            let (t1, t2) = tangents(n);
            assert_abs_diff_eq!(t1.length(), 1.0, epsilon = 1e-4);
            assert_abs_diff_eq!(t2.length(), 1.0, epsilon = 1e-4);
            assert_abs_diff_eq!(t1.dot(n), 0.0, epsilon = 1e-5);
            assert_abs_diff_eq!(t2.dot(n), 0.0, epsilon = 1e-5);
            assert_abs_diff_eq!(t1.dot(t2), 0.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_tangents_of_zero_normal() {
        let (t1, t2) = tangents(Vec3::ZERO);
        assert_eq!(t1, Vec3::X);
        assert_eq!(t2, Vec3::Y);
    }

    #[test]
    fn test_normalize_fast_close_to_exact() {
        let q = Quat::from_xyzw(0.1, 0.2, 0.3, 0.95);
        let fast = normalize_fast(q);
        assert_abs_diff_eq!(fast.length(), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_integrate_orientation_about_z() {
        let q = integrate_orientation(Quat::IDENTITY, Vec3::new(0.0, 0.0, 1.0), 0.1);
        assert_abs_diff_eq!(q.z, 0.05, epsilon = 1e-6);
        assert_abs_diff_eq!(q.w, 1.0, epsilon = 1e-6);
        assert!(q.length() > 1.0);
    }
}
