//! pic-fields: electromagnetic field core for particle-in-cell simulation
//!
//! This crate provides:
//! - Shape-factor interpolation kernels (orders 0-3)
//! - Field gather onto particles and charge/current deposition onto the mesh
//! - Finite-difference Maxwell stencils (Yee and CKC) in 1D, 2D, 3D and RZ
//! - Split-field PML absorbing layers with checkpoint/restart
//! - A per-level, per-patch field evolution driver with cost instrumentation
//!
//! All quantities are SI. Fields live on a block-structured mesh
//! ([`mesh::MultiField`]); every component reads its parameters from an
//! explicit [`SimulationConfig`] rather than from global state.

pub mod cost;
pub mod deposit;
pub mod error;
pub mod evolve;
pub mod gather;
pub mod mesh;
pub mod particles;
pub mod pml;
pub mod shape;
pub mod stencil;

pub use error::{PicError, Result};
pub use evolve::{DtType, FieldEvolver, PatchFields, PatchType};
pub use mesh::{Dimensionality, FieldKind, Geometry, IndexBox, MultiField, Staggering};
pub use particles::{FieldSamples, ParticleTile};
pub use pml::Pml;
pub use stencil::DispersionScheme;

use serde::{Deserialize, Serialize};

/// Speed of light in vacuum (m/s)
pub const C0: f64 = 299_792_458.0;
/// Permittivity of free space (F/m)
pub const EPS0: f64 = 8.854_187_817e-12;
/// Permeability of free space (H/m)
pub const MU0: f64 = 1.256_637_062e-6;

/// Everything the field core needs to know, fixed at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub dims: Dimensionality,
    pub domain: DomainConfig,
    /// Cell-size ratio between consecutive refinement levels
    pub ref_ratio: i32,
    pub scheme: DispersionScheme,
    pub staggering: Staggering,
    /// Shape-factor order for gather and deposit (0-3)
    pub interpolation_order: usize,
    /// Use order - 1 for cell-centered axes in the gather
    pub lower_order_in_v: bool,
    /// Evolve the divergence-cleaning scalar F
    pub divergence_cleaning: bool,
    pub moving_window: bool,
    /// Accumulate per-block wall time per cell
    pub cost_tracking: bool,
    /// Absorbing layer; `None` disables it
    pub pml: Option<PmlConfig>,
    /// Courant number used by [`evolve::courant_dt`]
    pub cfl: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dims: Dimensionality::ThreeD,
            domain: DomainConfig::default(),
            ref_ratio: 2,
            scheme: DispersionScheme::Standard,
            staggering: Staggering::Yee,
            interpolation_order: 1,
            lower_order_in_v: false,
            divergence_cleaning: false,
            moving_window: false,
            cost_tracking: false,
            pml: None,
            cfl: 0.99,
        }
    }
}

/// Domain extent and block decomposition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    /// Level-0 cells per axis (1 on axes the dimensionality does not simulate)
    pub n_cell: [i32; 3],
    pub prob_lo: [f64; 3],
    pub prob_hi: [f64; 3],
    pub max_grid_size: i32,
    pub periodic: [bool; 3],
    /// One refined box per level above 0, in level-0 cell indices
    pub refined_regions: Vec<IndexBox>,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            n_cell: [32, 32, 32],
            prob_lo: [0.0; 3],
            prob_hi: [1e-3; 3],
            max_grid_size: 32,
            periodic: [false; 3],
            refined_regions: Vec::new(),
        }
    }
}

/// Absorbing layer parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PmlConfig {
    /// Layer thickness in cells
    pub ncell: i32,
    /// Width of the damping ramp at the outer end of the layer, in cells
    pub delta: i32,
    /// Enable flags for the low side of each axis
    pub lo: [bool; 3],
    /// Enable flags for the high side of each axis
    pub hi: [bool; 3],
}

impl Default for PmlConfig {
    fn default() -> Self {
        Self {
            ncell: 10,
            delta: 10,
            lo: [true; 3],
            hi: [true; 3],
        }
    }
}

impl SimulationConfig {
    /// Parse a JSON config and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject parameter combinations the field core cannot run
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(PicError::InvalidConfig(msg));
        let active = self.dims.active();
        let d = &self.domain;

        if self.interpolation_order > 3 {
            return bad(format!(
                "interpolation order {} (supported: 0-3)",
                self.interpolation_order
            ));
        }
        if self.lower_order_in_v && self.interpolation_order == 0 {
            return bad("lower_order_in_v needs interpolation order >= 1".into());
        }
        if self.scheme == DispersionScheme::DispersionCorrected
            && self.dims == Dimensionality::Cylindrical
        {
            return bad("the CKC stencil is not defined in cylindrical geometry".into());
        }
        if self.staggering == Staggering::Nodal {
            return bad("nodal staggering requires a spectral solver; the FDTD stencils are staggered".into());
        }
        if self.ref_ratio < 1 {
            return bad(format!("ref_ratio {} must be >= 1", self.ref_ratio));
        }
        if d.max_grid_size < 1 {
            return bad(format!("max_grid_size {} must be >= 1", d.max_grid_size));
        }
        if !(self.cfl > 0.0) {
            return bad(format!("cfl {} must be positive", self.cfl));
        }
        for axis in 0..3 {
            if d.n_cell[axis] < 1 || (!active[axis] && d.n_cell[axis] != 1) {
                return bad(format!(
                    "n_cell {:?} does not match {:?}",
                    d.n_cell, self.dims
                ));
            }
            if active[axis] && !(d.prob_hi[axis] > d.prob_lo[axis]) {
                return bad(format!("empty physical extent on axis {axis}"));
            }
        }

        if let Some(pml) = &self.pml {
            if pml.ncell < 1 || pml.delta < 1 || pml.delta > pml.ncell {
                return bad(format!(
                    "PML needs 1 <= delta <= ncell (got ncell {}, delta {})",
                    pml.ncell, pml.delta
                ));
            }
            for axis in 0..3 {
                let enabled = active[axis] && (pml.lo[axis] || pml.hi[axis]);
                if enabled && d.periodic[axis] {
                    return bad(format!("PML enabled on periodic axis {axis}"));
                }
            }
            if self.dims == Dimensionality::Cylindrical && pml.lo[0] {
                return bad("no PML on the axis side (r low) in cylindrical geometry".into());
            }
        }

        let domain = IndexBox::from_size(d.n_cell);
        let mut parent = domain;
        for (n, region) in d.refined_regions.iter().enumerate() {
            let masked = IndexBox::new(self.dims.mask(region.lo, 0), self.dims.mask(region.hi, 0));
            if masked.is_empty() || !parent.contains_box(&masked) {
                return bad(format!(
                    "refined region {} {:?} is not inside its parent level",
                    n + 1,
                    region
                ));
            }
            parent = masked;
        }
        Ok(())
    }

    /// PML enable flags with inactive axes cleared, or `None` when no side is on
    pub fn pml_sides(&self) -> Option<([bool; 3], [bool; 3])> {
        let pml = self.pml.as_ref()?;
        let active = self.dims.active();
        let lo = [0, 1, 2].map(|d| pml.lo[d] && active[d]);
        let hi = [0, 1, 2].map(|d| pml.hi[d] && active[d]);
        (lo.iter().chain(hi.iter()).any(|&on| on)).then_some((lo, hi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_2d() -> SimulationConfig {
        SimulationConfig {
            dims: Dimensionality::TwoD,
            domain: DomainConfig {
                n_cell: [16, 1, 16],
                ..DomainConfig::default()
            },
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
        assert!(config_2d().validate().is_ok());
    }

    #[test]
    fn test_rejects_inconsistent_n_cell() {
        let mut config = config_2d();
        config.domain.n_cell = [16, 4, 16];
        assert!(matches!(config.validate(), Err(PicError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_bad_pml() {
        let mut config = config_2d();
        config.pml = Some(PmlConfig {
            ncell: 4,
            delta: 6,
            ..PmlConfig::default()
        });
        assert!(config.validate().is_err());

        config.pml = Some(PmlConfig::default());
        config.domain.periodic = [true, false, false];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_ckc_in_cylindrical() {
        let mut config = config_2d();
        config.dims = Dimensionality::Cylindrical;
        config.scheme = DispersionScheme::DispersionCorrected;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pml_sides_masks_inactive_axes() {
        let mut config = config_2d();
        config.pml = Some(PmlConfig::default());
        let (lo, hi) = config.pml_sides().unwrap();
        assert_eq!(lo, [true, false, true]);
        assert_eq!(hi, [true, false, true]);
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "dims": "one_d",
            "domain": { "n_cell": [1, 1, 64], "prob_hi": [1.0, 1.0, 1.0] },
            "scheme": "ckc",
            "pml": { "ncell": 8, "delta": 4 }
        }"#;
        let config = SimulationConfig::from_json(json).unwrap();
        assert_eq!(config.dims, Dimensionality::OneD);
        assert_eq!(config.scheme, DispersionScheme::DispersionCorrected);
        assert_eq!(config.pml.as_ref().map(|p| p.delta), Some(4));
        assert_eq!(config.domain.max_grid_size, 32);
    }
}
