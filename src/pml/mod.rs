//! Split-field perfectly matched layer
//!
//! The layer surrounds a patch of the regular mesh with slabs of its own
//! blocks. Each field component is stored split by derivative axis (two
//! parts for B, three for E and F); the physical value is the sum of the
//! parts. Every part is pushed with the ordinary stencil and then damped
//! along its own axis, so a wave entering the layer decays with depth.
//!
//! One `Pml` exists per refinement level, with a fine-patch layer and, on
//! levels above 0, a coarse-patch layer.

pub mod checkpoint;
pub mod exchange;
pub mod push;
pub mod sigma;

use tracing::info;

use crate::evolve::PatchType;
use crate::mesh::{BoxArray, Dimensionality, FieldKind, Geometry, IndexBox, IndexType, MultiField, Staggering};
use crate::stencil::{DispersionScheme, StencilContext};
use crate::{SimulationConfig, EPS0, MU0};

pub use sigma::{profile, CachedFactors, SigmaBox};

/// Split components per field
pub const NCOMP_E: usize = 3;
pub const NCOMP_B: usize = 2;
pub const NCOMP_F: usize = 3;

/// Ghost cells of the layer's E and B
const PML_NGROW_EB: i32 = 2;

/// Slabs covering `interior` grown by `ncell` on the enabled sides
///
/// Slabs along x span the grown y and z extents, slabs along y the interior
/// x and grown z, slabs along z the interior x and y; together they tile
/// the shell without overlap.
pub fn pml_regions(interior: IndexBox, ncell: i32, lo: [bool; 3], hi: [bool; 3]) -> Vec<IndexBox> {
    let mut grown = interior;
    for d in 0..3 {
        if lo[d] {
            grown.lo[d] -= ncell;
        }
        if hi[d] {
            grown.hi[d] += ncell;
        }
    }

    let mut regions = Vec::new();
    for axis in 0..3 {
        let mut base = interior;
        for d in axis + 1..3 {
            base.lo[d] = grown.lo[d];
            base.hi[d] = grown.hi[d];
        }
        if lo[axis] {
            let mut slab = base;
            slab.lo[axis] = interior.lo[axis] - ncell;
            slab.hi[axis] = interior.lo[axis] - 1;
            regions.push(slab);
        }
        if hi[axis] {
            let mut slab = base;
            slab.lo[axis] = interior.hi[axis] + 1;
            slab.hi[axis] = interior.hi[axis] + ncell;
            regions.push(slab);
        }
    }
    regions
}

/// Ghost width of the layer's F
pub fn f_ngrow(config: &SimulationConfig) -> i32 {
    if config.moving_window {
        2
    } else if config.scheme == DispersionScheme::DispersionCorrected {
        1
    } else {
        0
    }
}

/// The layer around one patch (fine or coarse) of one level
#[derive(Debug, Clone)]
pub struct PmlPatch {
    ba: BoxArray,
    /// Patch the layer wraps around
    interior: IndexBox,
    pub e: [MultiField; 3],
    pub b: [MultiField; 3],
    pub f: Option<MultiField>,
    pub sigma: SigmaBox,
    pub ctx: StencilContext,
}

impl PmlPatch {
    /// Build the layer of `ncell` cells around `interior`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &SimulationConfig,
        geom: &Geometry,
        interior: IndexBox,
        ncell: i32,
        delta: i32,
        lo: [bool; 3],
        hi: [bool; 3],
    ) -> Self {
        let dims = config.dims;
        let regions = pml_regions(interior, ncell, lo, hi);
        let mut grown = interior;
        for d in 0..3 {
            grown.lo[d] -= if lo[d] { ncell } else { 0 };
            grown.hi[d] += if hi[d] { ncell } else { 0 };
        }

        let max_size = dims.mask([config.domain.max_grid_size; 3], 1);
        let boxes: Vec<IndexBox> = regions.iter().flat_map(|r| r.chop(max_size)).collect();
        let periodic = [0, 1, 2].map(|d| geom.periodic[d] && interior.length(d) == geom.domain.length(d));
        let ba = BoxArray::new(boxes, grown, periodic);

        let ngrow = dims.mask([PML_NGROW_EB; 3], 0);
        let e = FieldKind::E.map(|k| MultiField::new(&ba, k.index_type(dims, Staggering::Yee), NCOMP_E, ngrow));
        let b = FieldKind::B.map(|k| MultiField::new(&ba, k.index_type(dims, Staggering::Yee), NCOMP_B, ngrow));
        let f = config.divergence_cleaning.then(|| {
            MultiField::new(
                &ba,
                IndexType::NODE.masked(dims),
                NCOMP_F,
                dims.mask([f_ngrow(config); 3], 0),
            )
        });

        let range = grown.grow(dims.mask([PML_NGROW_EB + 1; 3], 0));
        let cell_size = [geom.dx(0), geom.dx(1), geom.dx(2)];
        let sigma = SigmaBox::new(range, interior, lo, hi, ncell, delta, cell_size);

        Self {
            ba,
            interior,
            e,
            b,
            f,
            sigma,
            ctx: StencilContext::new(config.scheme, geom),
        }
    }

    pub fn box_array(&self) -> &BoxArray {
        &self.ba
    }

    pub fn interior(&self) -> IndexBox {
        self.interior
    }

    /// Electromagnetic energy held in the layer
    pub fn field_energy(&self, cell_volume: f64) -> f64 {
        let e2: f64 = self.e.iter().map(MultiField::sum_squares).sum();
        let b2: f64 = self.b.iter().map(MultiField::sum_squares).sum();
        (0.5 * EPS0 * e2 + 0.5 * b2 / MU0) * cell_volume
    }
}

/// Absorbing layer of one refinement level
#[derive(Debug, Clone)]
pub struct Pml {
    level: usize,
    ncell: i32,
    delta: i32,
    lo: [bool; 3],
    hi: [bool; 3],
    fine: PmlPatch,
    coarse: Option<PmlPatch>,
}

impl Pml {
    /// Layer around the fine patch `fine_interior` and, above level 0, the coarse patch
    ///
    /// `ncell` and `delta` are in fine cells; the coarse layer uses the
    /// same thickness rounded up to whole coarse cells.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &SimulationConfig,
        level: usize,
        fine_geom: &Geometry,
        fine_interior: IndexBox,
        coarse: Option<(&Geometry, IndexBox)>,
        ncell: i32,
        delta: i32,
        lo: [bool; 3],
        hi: [bool; 3],
    ) -> Self {
        let fine = PmlPatch::new(config, fine_geom, fine_interior, ncell, delta, lo, hi);
        let ratio = config.ref_ratio;
        let coarse = coarse.map(|(geom, interior)| {
            let cncell = (ncell + ratio - 1) / ratio;
            let cdelta = (delta + ratio - 1) / ratio;
            PmlPatch::new(config, geom, interior, cncell, cdelta, lo, hi)
        });

        info!(
            level,
            ncell,
            delta,
            fine_boxes = fine.ba.len(),
            coarse_boxes = coarse.as_ref().map_or(0, |p| p.ba.len()),
            "Built PML"
        );

        Self {
            level,
            ncell,
            delta,
            lo,
            hi,
            fine,
            coarse,
        }
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn ncell(&self) -> i32 {
        self.ncell
    }

    pub fn delta(&self) -> i32 {
        self.delta
    }

    pub fn sides(&self) -> ([bool; 3], [bool; 3]) {
        (self.lo, self.hi)
    }

    /// Layer of the given patch type; `None` for a coarse patch on level 0
    pub fn patch(&self, patch: PatchType) -> Option<&PmlPatch> {
        match patch {
            PatchType::Fine => Some(&self.fine),
            PatchType::Coarse => self.coarse.as_ref(),
        }
    }

    pub fn patch_mut(&mut self, patch: PatchType) -> Option<&mut PmlPatch> {
        match patch {
            PatchType::Fine => Some(&mut self.fine),
            PatchType::Coarse => self.coarse.as_mut(),
        }
    }
}

/// Enable flags for a refined level's layer
///
/// Every side is absorbing except one that coincides with a domain side
/// whose level-0 layer is off.
pub fn refined_sides(
    dims: Dimensionality,
    patch: IndexBox,
    domain: IndexBox,
    level0: ([bool; 3], [bool; 3]),
) -> ([bool; 3], [bool; 3]) {
    let active = dims.active();
    let lo = [0, 1, 2].map(|d| active[d] && (patch.lo[d] != domain.lo[d] || level0.0[d]));
    let hi = [0, 1, 2].map(|d| active[d] && (patch.hi[d] != domain.hi[d] || level0.1[d]));
    (lo, hi)
}
