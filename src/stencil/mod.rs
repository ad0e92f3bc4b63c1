//! Finite-difference Maxwell stencils
//!
//! Per-cell update formulas for B, E and the divergence-cleaning scalar F.
//! Every B-type derivative is a forward difference, optionally smoothed
//! across the transverse axes (CKC); every E-type derivative is a plain
//! backward difference. The same formulas serve the interior fields and
//! the split fields of the PML, which is why each curl returns its two
//! derivative contributions separately.
//!
//! References:
//! - Yee, "Numerical solution of initial boundary value problems" (1966)
//! - Cowan et al., "Generalized algorithm for control of numerical
//!   dispersion in explicit time-domain electromagnetic simulations" (2013)

pub mod ckc;
pub mod divergence;
pub mod yee;

use serde::{Deserialize, Serialize};

use crate::mesh::{Dimensionality, Geometry, Sample};

/// Which B stencil to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DispersionScheme {
    /// Second-order Yee
    #[default]
    #[serde(rename = "yee")]
    Standard,
    /// Cole-Karkkainen-Cowan
    #[serde(rename = "ckc")]
    DispersionCorrected,
}

/// Weights of a forward difference along each axis
///
/// For a derivative along `a`: `alpha[a]` on the centerline, `beta[a][t]`
/// on the two neighbor lines along transverse axis `t`, `gamma[a]` on the
/// four diagonal lines. Yee is `alpha = 1` with nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StencilCoefficients {
    pub alpha: [f64; 3],
    pub beta: [[f64; 3]; 3],
    pub gamma: [f64; 3],
    pub smoothed: bool,
}

impl StencilCoefficients {
    pub const YEE: StencilCoefficients = StencilCoefficients {
        alpha: [1.0; 3],
        beta: [[0.0; 3]; 3],
        gamma: [0.0; 3],
        smoothed: false,
    };

    pub fn new(scheme: DispersionScheme, dims: Dimensionality, cell_size: [f64; 3]) -> Self {
        match scheme {
            DispersionScheme::Standard => Self::YEE,
            DispersionScheme::DispersionCorrected => ckc::ckc_coefficients(dims, cell_size),
        }
    }
}

/// Everything a per-cell formula needs besides the fields
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StencilContext {
    pub dims: Dimensionality,
    pub coeffs: StencilCoefficients,
    pub dxinv: [f64; 3],
    /// Radius of radial index 0 (RZ only)
    pub rmin: f64,
}

impl StencilContext {
    pub fn new(scheme: DispersionScheme, geom: &Geometry) -> Self {
        let dx = [geom.cell_size[0], geom.cell_size[1], geom.cell_size[2]];
        let rmin = match geom.dims {
            Dimensionality::Cylindrical => geom.prob_lo[0],
            _ => 0.0,
        };
        Self {
            dims: geom.dims,
            coeffs: StencilCoefficients::new(scheme, geom.dims, dx),
            dxinv: dx.map(|v| 1.0 / v),
            rmin,
        }
    }

    #[inline]
    pub fn is_cylindrical(&self) -> bool {
        self.dims == Dimensionality::Cylindrical
    }

    /// `rmin / dr`: radial position of index 0 in cell units
    #[inline]
    pub fn rmin_cells(&self) -> f64 {
        self.rmin * self.dxinv[0]
    }

    /// True at the radial node sitting on the symmetry axis
    #[inline]
    pub fn on_axis(&self, i: i32) -> bool {
        self.is_cylindrical() && i == 0 && self.rmin == 0.0
    }
}

/// The two axes transverse to `axis`, in cyclic order
#[inline]
pub fn transverse(axis: usize) -> [usize; 2] {
    [(axis + 1) % 3, (axis + 2) % 3]
}

#[inline]
fn unit(axis: usize, s: i32) -> [i32; 3] {
    let mut u = [0; 3];
    u[axis] = s;
    u
}

#[inline]
fn add3(a: [i32; 3], b: [i32; 3]) -> [i32; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// `f(p + e_axis) - f(p)`, smoothed transversally when the coefficients ask for it
///
/// Not scaled by the cell size.
#[inline]
pub fn forward_diff<S: Sample>(f: &S, ctx: &StencilContext, axis: usize, i: i32, j: i32, k: i32) -> f64 {
    let e = unit(axis, 1);
    let d = |o: [i32; 3]| {
        f.at(i + o[0] + e[0], j + o[1] + e[1], k + o[2] + e[2]) - f.at(i + o[0], j + o[1], k + o[2])
    };
    let c = &ctx.coeffs;
    let mut v = c.alpha[axis] * d([0; 3]);
    if c.smoothed {
        let active = ctx.dims.active();
        let [t1, t2] = transverse(axis);
        for t in [t1, t2] {
            if active[t] {
                v += c.beta[axis][t] * (d(unit(t, 1)) + d(unit(t, -1)));
            }
        }
        if active[t1] && active[t2] {
            let mut corners = 0.0;
            for s1 in [1, -1] {
                for s2 in [1, -1] {
                    corners += d(add3(unit(t1, s1), unit(t2, s2)));
                }
            }
            v += c.gamma[axis] * corners;
        }
    }
    v
}

/// `f(p) - f(p - e_axis)`, not scaled by the cell size
#[inline]
pub fn backward_diff<S: Sample>(f: &S, axis: usize, i: i32, j: i32, k: i32) -> f64 {
    let e = unit(axis, 1);
    f.at(i, j, k) - f.at(i - e[0], j - e[1], k - e[2])
}
