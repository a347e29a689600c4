//! Constraint rows and the SPOOK Gauss-Seidel solver
//!
//! Every row couples at most two bodies. Its Jacobian is split into four
//! 3-vectors: linear and angular parts for body `i`, then for body `j`.
//! After `solve`, the solver holds a linear and an angular velocity delta
//! per body index.

use crate::body::RigidBody;
use crate::constraint::Constraint;
use glam::Vec3;

/// One constraint row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Equation {
    /// Jacobian blocks `[lin_i, ang_i, lin_j, ang_j]`
    pub jacobian: [Vec3; 4],
    /// Inverse mass / inertia diagonal per block
    pub inv_mass: [Vec3; 4],
    /// Constraint violation per block
    pub gap: [Vec3; 4],
    /// Constraint velocity per block
    pub bias_velocity: [Vec3; 4],
    /// External force and torque per block
    pub external_force: [Vec3; 4],
    /// Lower bound on the multiplier
    pub lower: f32,
    /// Upper bound on the multiplier
    pub upper: f32,
    /// Index of the first body, if any
    pub body_i: Option<usize>,
    /// Index of the second body, if any
    pub body_j: Option<usize>,
}

impl Default for Equation {
    fn default() -> Self {
        Self {
            jacobian: [Vec3::ZERO; 4],
            inv_mass: [Vec3::ZERO; 4],
            gap: [Vec3::ZERO; 4],
            bias_velocity: [Vec3::ZERO; 4],
            external_force: [Vec3::ZERO; 4],
            lower: -1e6,
            upper: 1e6,
            body_i: None,
            body_j: None,
        }
    }
}

impl Equation {
    /// Fill the inverse mass blocks from the bodies
    pub fn set_default_mass_props(&mut self, bi: &RigidBody, bj: Option<&RigidBody>) {
        self.inv_mass[0] = Vec3::splat(bi.inv_mass());
        self.inv_mass[1] = bi.inv_inertia();
        if let Some(bj) = bj {
            self.inv_mass[2] = Vec3::splat(bj.inv_mass());
            self.inv_mass[3] = bj.inv_inertia();
        }
    }

    /// Fill the external force blocks from the bodies' accumulated force and torque
    pub fn set_default_force(&mut self, bi: &RigidBody, bj: Option<&RigidBody>) {
        self.external_force[0] = bi.force;
        self.external_force[1] = bi.torque;
        if let Some(bj) = bj {
            self.external_force[2] = bj.force;
            self.external_force[3] = bj.torque;
        }
    }
}

fn dot4(a: &[Vec3; 4], b: &[Vec3; 4]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x.dot(*y)).sum()
}

fn weighted_dot4(a: &[Vec3; 4], w: &[Vec3; 4], b: &[Vec3; 4]) -> f32 {
    a.iter().zip(w).zip(b).map(|((x, m), y)| (*x * *m).dot(*y)).sum()
}

/// Accumulates constraint rows and computes per-body velocity corrections
pub trait Solver: Send {
    /// Drop all rows and zero the deltas for `n_bodies` bodies
    fn reset(&mut self, n_bodies: usize);

    /// Append a row, returning its index
    fn add_constraint(&mut self, equation: Equation) -> usize;

    /// Append every row of a user constraint, tagged with the given body indices
    fn add_constraint2(
        &mut self,
        constraint: &dyn Constraint,
        body_i: Option<usize>,
        body_j: Option<usize>,
    ) {
        for equation in constraint.equations() {
            self.add_constraint(Equation {
                body_i,
                body_j,
                ..*equation
            });
        }
    }

    /// Set the timestep used by the next `solve`
    fn set_timestep(&mut self, h: f32);

    /// Number of rows added since the last reset
    fn num_rows(&self) -> usize;

    /// Solve all rows
    fn solve(&mut self);

    /// Linear velocity correction for a body index
    fn linear_delta(&self, body: usize) -> Vec3;

    /// Angular velocity correction for a body index
    fn angular_delta(&self, body: usize) -> Vec3;
}

/// SPOOK stepper solved with projected Gauss-Seidel
#[derive(Debug, Clone)]
pub struct SpookSolver {
    /// Sweeps over all rows per solve
    pub iterations: u32,
    /// Constraint stiffness (k)
    pub stiffness: f32,
    /// Relaxation time in timesteps (d)
    pub relaxation: f32,
    h: f32,
    equations: Vec<Equation>,
    lambda: Vec<f32>,
    v_lambda: Vec<Vec3>,
    w_lambda: Vec<Vec3>,
}

impl SpookSolver {
    /// Create a solver
    pub fn new(iterations: u32, stiffness: f32, relaxation: f32) -> Self {
        Self {
            iterations,
            stiffness,
            relaxation,
            h: 1.0 / 60.0,
            equations: Vec::new(),
            lambda: Vec::new(),
            v_lambda: Vec::new(),
            w_lambda: Vec::new(),
        }
    }

    /// SPOOK constants `(a, b, eps)` for the current timestep.
    ///
    /// `eps` is a tenth of the textbook `4 / (h² k (1 + 4d))`.
    pub fn spook_params(&self) -> (f32, f32, f32) {
        let (h, k, d) = (self.h, self.stiffness, self.relaxation);
        let a = 4.0 / (h * (1.0 + 4.0 * d));
        let b = (4.0 * d) / (1.0 + 4.0 * d);
        let eps = 0.1 * 4.0 / (h * h * k * (1.0 + 4.0 * d));
        (a, b, eps)
    }

    /// Multipliers from the last solve, in row order
    pub fn multipliers(&self) -> &[f32] {
        &self.lambda
    }

    /// Rows added since the last reset
    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    fn grow_bodies(&mut self, index: Option<usize>) {
        if let Some(i) = index {
            if i >= self.v_lambda.len() {
                self.v_lambda.resize(i + 1, Vec3::ZERO);
                self.w_lambda.resize(i + 1, Vec3::ZERO);
            }
        }
    }
}

impl Default for SpookSolver {
    fn default() -> Self {
        Self::new(5, 500.0, 4.0)
    }
}

impl Solver for SpookSolver {
    fn reset(&mut self, n_bodies: usize) {
        self.equations.clear();
        self.lambda.clear();
        self.v_lambda.clear();
        self.w_lambda.clear();
        self.v_lambda.resize(n_bodies, Vec3::ZERO);
        self.w_lambda.resize(n_bodies, Vec3::ZERO);
    }

    fn add_constraint(&mut self, equation: Equation) -> usize {
        self.grow_bodies(equation.body_i);
        self.grow_bodies(equation.body_j);
        self.equations.push(equation);
        self.equations.len() - 1
    }

    fn set_timestep(&mut self, h: f32) {
        self.h = h;
    }

    fn num_rows(&self) -> usize {
        self.equations.len()
    }

    fn solve(&mut self) {
        let (a, b, eps) = self.spook_params();
        let h = self.h;
        let n = self.equations.len();

        let mut c = Vec::with_capacity(n);
        let mut rhs = Vec::with_capacity(n);
        for eq in &self.equations {
            let g_minv_gt = weighted_dot4(&eq.jacobian, &eq.inv_mass, &eq.jacobian);
            let gq = dot4(&eq.jacobian, &eq.gap);
            let gw = dot4(&eq.jacobian, &eq.bias_velocity);
            let g_minv_f = weighted_dot4(&eq.jacobian, &eq.inv_mass, &eq.external_force);
            c.push(1.0 / (g_minv_gt + eps));
            rhs.push(-a * gq - b * gw - h * g_minv_f);
        }

        self.lambda.clear();
        self.lambda.resize(n, 0.0);

        for _ in 0..self.iterations {
            for l in 0..n {
                let eq = &self.equations[l];
                let g = &eq.jacobian;

                let mut g_ulambda = 0.0;
                if let Some(i) = eq.body_i {
                    g_ulambda += g[0].dot(self.v_lambda[i]) + g[1].dot(self.w_lambda[i]);
                }
                if let Some(j) = eq.body_j {
                    g_ulambda += g[2].dot(self.v_lambda[j]) + g[3].dot(self.w_lambda[j]);
                }

                let previous = self.lambda[l];
                let unclamped = previous + c[l] * (rhs[l] - g_ulambda - eps * previous);
                let clamped = unclamped.max(eq.lower).min(eq.upper);
                let delta = clamped - previous;
                self.lambda[l] = clamped;

                if let Some(i) = eq.body_i {
                    self.v_lambda[i] += eq.inv_mass[0] * g[0] * delta;
                    self.w_lambda[i] += eq.inv_mass[1] * g[1] * delta;
                }
                if let Some(j) = eq.body_j {
                    self.v_lambda[j] += eq.inv_mass[2] * g[2] * delta;
                    self.w_lambda[j] += eq.inv_mass[3] * g[3] * delta;
                }
            }
        }

        log::trace!("SPOOK solved {} rows in {} iterations", n, self.iterations);
    }

    fn linear_delta(&self, body: usize) -> Vec3 {
        self.v_lambda.get(body).copied().unwrap_or(Vec3::ZERO)
    }

    fn angular_delta(&self, body: usize) -> Vec3 {
        self.w_lambda.get(body).copied().unwrap_or(Vec3::ZERO)
    }
}
