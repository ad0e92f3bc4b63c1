//! Structure-of-arrays particle storage used by gather and deposit
//!
//! The pusher that advances these arrays lives outside this crate; here a
//! tile is only read (positions, momenta, weights) and the gathered fields
//! are written to a [`FieldSamples`] of the same length.

use serde::{Deserialize, Serialize};

/// Particles of one block. All arrays always have the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticleTile {
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
    /// Momentum per unit mass, gamma * v
    ux: Vec<f64>,
    uy: Vec<f64>,
    uz: Vec<f64>,
    /// Macro-particle weight (physical particles represented)
    w: Vec<f64>,
}

impl ParticleTile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            x: Vec::with_capacity(n),
            y: Vec::with_capacity(n),
            z: Vec::with_capacity(n),
            ux: Vec::with_capacity(n),
            uy: Vec::with_capacity(n),
            uz: Vec::with_capacity(n),
            w: Vec::with_capacity(n),
        }
    }

    /// Add a particle at rest
    pub fn push(&mut self, pos: [f64; 3], w: f64) {
        self.push_moving(pos, [0.0; 3], w);
    }

    pub fn push_moving(&mut self, pos: [f64; 3], u: [f64; 3], w: f64) {
        self.x.push(pos[0]);
        self.y.push(pos[1]);
        self.z.push(pos[2]);
        self.ux.push(u[0]);
        self.uy.push(u[1]);
        self.uz.push(u[2]);
        self.w.push(w);
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    #[inline]
    pub fn position(&self, ip: usize) -> [f64; 3] {
        [self.x[ip], self.y[ip], self.z[ip]]
    }

    #[inline]
    pub fn momentum(&self, ip: usize) -> [f64; 3] {
        [self.ux[ip], self.uy[ip], self.uz[ip]]
    }

    #[inline]
    pub fn weight(&self, ip: usize) -> f64 {
        self.w[ip]
    }

    /// Mutable position arrays for an external pusher
    pub fn positions_mut(&mut self) -> (&mut [f64], &mut [f64], &mut [f64]) {
        (&mut self.x, &mut self.y, &mut self.z)
    }
}

/// Per-particle E and B, one array per component
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSamples {
    pub ex: Vec<f64>,
    pub ey: Vec<f64>,
    pub ez: Vec<f64>,
    pub bx: Vec<f64>,
    pub by: Vec<f64>,
    pub bz: Vec<f64>,
}

impl FieldSamples {
    pub fn zeros(n: usize) -> Self {
        Self {
            ex: vec![0.0; n],
            ey: vec![0.0; n],
            ez: vec![0.0; n],
            bx: vec![0.0; n],
            by: vec![0.0; n],
            bz: vec![0.0; n],
        }
    }

    pub fn len(&self) -> usize {
        self.ex.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ex.is_empty()
    }

    /// Match the particle count, keeping no prior content
    pub fn resize(&mut self, n: usize) {
        for v in [
            &mut self.ex,
            &mut self.ey,
            &mut self.ez,
            &mut self.bx,
            &mut self.by,
            &mut self.bz,
        ] {
            v.clear();
            v.resize(n, 0.0);
        }
    }

    #[inline]
    pub(crate) fn store(&mut self, ip: usize, e: [f64; 3], b: [f64; 3]) {
        self.ex[ip] = e[0];
        self.ey[ip] = e[1];
        self.ez[ip] = e[2];
        self.bx[ip] = b[0];
        self.by[ip] = b[1];
        self.bz[ip] = b[2];
    }
}
