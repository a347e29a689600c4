//! Pairwise contact history for the current and previous step
//!
//! Both steps share one flat `n * n` array. For a pair `(i, j)` the current
//! step's bit lives in one triangle and the previous step's bit in the other,
//! so ageing the history is a copy across the diagonal.

/// Packed two-step contact state for every body pair
#[derive(Debug, Clone, Default)]
pub struct CollisionMatrix {
    n: usize,
    data: Vec<i16>,
}

impl CollisionMatrix {
    /// Create a zeroed matrix for `n` bodies
    pub fn new(n: usize) -> Self {
        Self {
            n,
            data: vec![0; n * n],
        }
    }

    /// Reallocate for `n` bodies, discarding all history
    pub fn resize(&mut self, n: usize) {
        log::debug!("Collision matrix reallocated for {} bodies", n);
        *self = Self::new(n);
    }

    /// Number of bodies the matrix is sized for
    pub fn size(&self) -> usize {
        self.n
    }

    fn index(&self, mut i: usize, mut j: usize, current: bool) -> usize {
        if (current && i < j) || (!current && i > j) {
            std::mem::swap(&mut i, &mut j);
        }
        i + j * self.n
    }

    /// Read the contact bit for `(i, j)` in the current or previous step
    pub fn get(&self, i: usize, j: usize, current: bool) -> i16 {
        self.data[self.index(i, j, current)]
    }

    /// Write the contact bit for `(i, j)` in the current or previous step
    pub fn set(&mut self, i: usize, j: usize, value: i16, current: bool) {
        let idx = self.index(i, j, current);
        self.data[idx] = value;
    }

    /// Age the history: current becomes previous, current is cleared
    pub fn tick(&mut self) {
        for i in 0..self.n {
            for j in 0..i {
                let current = self.get(i, j, true);
                self.set(i, j, current, false);
                self.set(i, j, 0, true);
            }
        }
    }

    /// Zero both steps' bits for every pair involving body `i`
    pub fn clear_body(&mut self, i: usize) {
        for j in 0..self.n {
            self.set(i, j, 0, true);
            self.set(i, j, 0, false);
        }
    }

    /// Whether `(i, j)` touches now but did not in the previous step
    pub fn is_new_contact(&self, i: usize, j: usize) -> bool {
        self.get(i, j, true) != self.get(i, j, false)
    }
}
