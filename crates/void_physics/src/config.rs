//! Physics configuration

use crate::error::{PhysicsError, Result};
use serde::{Deserialize, Serialize};

/// Physics world configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsConfig {
    /// Gravity vector (default: -9.81 in Y)
    pub gravity: [f32; 3],

    /// Timestep used when `step` is called without one
    pub timestep: f32,

    /// Maximum number of fixed steps taken by a single `advance`
    pub max_substeps: u32,

    /// Friction used for material pairs without a contact material
    pub default_friction: f32,

    /// Restitution used for material pairs without a contact material
    pub default_restitution: f32,

    /// Gauss-Seidel sweeps per solve
    pub solver_iterations: u32,

    /// SPOOK constraint stiffness (k). The solver scales its regularization by 0.1.
    pub spook_stiffness: f32,

    /// SPOOK relaxation in timesteps (d)
    pub spook_relaxation: f32,

    /// Run the body sleep state machine after every step
    pub allow_sleep: bool,

    /// Orientation is renormalized when `step_number % (skip + 1) == 0`
    pub quat_normalize_skip: u32,

    /// Use the first-order approximation when renormalizing
    pub quat_normalize_fast: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.81, 0.0],
            timestep: 1.0 / 60.0,
            max_substeps: 4,
            default_friction: 0.3,
            default_restitution: 0.2,
            solver_iterations: 5,
            spook_stiffness: 500.0,
            spook_relaxation: 4.0,
            allow_sleep: false,
            quat_normalize_skip: 2,
            quat_normalize_fast: true,
        }
    }
}

impl PhysicsConfig {
    /// Create a configuration for high-precision simulation
    pub fn high_precision() -> Self {
        Self {
            solver_iterations: 20,
            max_substeps: 8,
            quat_normalize_skip: 0,
            quat_normalize_fast: false,
            ..Default::default()
        }
    }

    /// Create a configuration for fast simulation (lower quality)
    pub fn fast() -> Self {
        Self {
            solver_iterations: 2,
            max_substeps: 2,
            ..Default::default()
        }
    }

    /// Set gravity
    pub fn with_gravity(mut self, x: f32, y: f32, z: f32) -> Self {
        self.gravity = [x, y, z];
        self
    }

    /// Set timestep
    pub fn with_timestep(mut self, timestep: f32) -> Self {
        self.timestep = timestep;
        self
    }

    /// Enable or disable body sleeping
    pub fn with_sleeping(mut self, allow_sleep: bool) -> Self {
        self.allow_sleep = allow_sleep;
        self
    }

    /// Set solver iteration count
    pub fn with_solver_iterations(mut self, iterations: u32) -> Self {
        self.solver_iterations = iterations;
        self
    }

    /// Set the fallback contact coefficients
    pub fn with_default_contact(mut self, friction: f32, restitution: f32) -> Self {
        self.default_friction = friction;
        self.default_restitution = restitution;
        self
    }

    /// Check that every field is usable by the world
    pub fn validate(&self) -> Result<()> {
        if !(self.timestep.is_finite() && self.timestep > 0.0) {
            return Err(PhysicsError::InvalidConfig(format!(
                "timestep must be positive, got {}",
                self.timestep
            )));
        }
        if self.gravity.iter().any(|g| !g.is_finite()) {
            return Err(PhysicsError::InvalidConfig("gravity must be finite".into()));
        }
        if self.solver_iterations == 0 {
            return Err(PhysicsError::InvalidConfig(
                "solver_iterations must be at least 1".into(),
            ));
        }
        if self.spook_stiffness <= 0.0 || self.spook_relaxation < 0.0 {
            return Err(PhysicsError::InvalidConfig(format!(
                "SPOOK parameters out of range (k = {}, d = {})",
                self.spook_stiffness, self.spook_relaxation
            )));
        }
        if self.default_friction < 0.0 || self.default_restitution < 0.0 {
            return Err(PhysicsError::InvalidConfig(
                "default contact coefficients must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(PhysicsConfig::default().validate().is_ok());
        assert!(PhysicsConfig::high_precision().validate().is_ok());
        assert!(PhysicsConfig::fast().validate().is_ok());
    }

    #[test]
    fn test_default_normalizes_every_third_step() {
        let config = PhysicsConfig::default();
        assert_eq!(config.quat_normalize_skip + 1, 3);
        assert!(config.quat_normalize_fast);
    }

    #[test]
    fn test_invalid_timestep_rejected() {
        let config = PhysicsConfig::default().with_timestep(0.0);
        assert!(matches!(config.validate(), Err(PhysicsError::InvalidConfig(_))));

        let config = PhysicsConfig::default().with_timestep(f32::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let config = PhysicsConfig::default().with_solver_iterations(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip_keeps_fields() {
        let config = PhysicsConfig::default()
            .with_gravity(0.0, 0.0, -1.0)
            .with_sleeping(true);
        let json = serde_json::to_string(&config).unwrap();
        let back: PhysicsConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.gravity, [0.0, 0.0, -1.0]);
        assert!(back.allow_sleep);
    }
}
