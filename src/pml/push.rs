//! Split-field updates inside the layer
//!
//! Each part is advanced by the stencil term along its own derivative
//! axis, computed from the partner fields' physical (summed) values, then
//! multiplied by the damping factor of that axis. The factor table follows
//! the part's centering along the axis: node-centered parts use `sigma`,
//! cell-centered parts `sigma_star`.

use rayon::prelude::*;

use super::{CachedFactors, PmlPatch};
use crate::mesh::{FieldArray, IndexBox, IndexType, MultiField};
use crate::stencil::divergence::div_e_terms;
use crate::stencil::yee::{bx_terms, by_terms, bz_terms, ex_terms, ey_terms, ez_terms, f_gradient_term};
use crate::stencil::{transverse, StencilContext};

#[inline]
fn damp(fab: &mut FieldArray, n: usize, p: [i32; 3], axis: usize, nodal: bool, fac: &CachedFactors, inc: f64) {
    let [i, j, k] = p;
    let v = (fab.get(i, j, k, n) + inc) * fac.factor(axis, p[axis], nodal);
    fab.set(i, j, k, n, v);
}

/// B parts of one block
pub fn push_b_block(
    b: [&mut FieldArray; 3],
    e: [&FieldArray; 3],
    tiles: [IndexBox; 3],
    index_types: [IndexType; 3],
    ctx: &StencilContext,
    dt: f64,
    fac: &CachedFactors,
) {
    let tot = e.map(|fab| fab.total());
    for (a, fab) in b.into_iter().enumerate() {
        let axes = transverse(a);
        tiles[a].for_each(|i, j, k| {
            let t = match a {
                0 => bx_terms(ctx, dt, &tot[1], &tot[2], i, j, k),
                1 => by_terms(ctx, dt, &tot[0], &tot[2], i, j, k),
                _ => bz_terms(ctx, dt, &tot[0], &tot[1], i, j, k),
            };
            for (n, &axis) in axes.iter().enumerate() {
                damp(fab, n, [i, j, k], axis, index_types[a].is_nodal(axis), fac, t[n]);
            }
        });
    }
}

/// E parts of one block; the third part carries the F gradient when F exists
#[allow(clippy::too_many_arguments)]
pub fn push_e_block(
    e: [&mut FieldArray; 3],
    b: [&FieldArray; 3],
    f: Option<&FieldArray>,
    tiles: [IndexBox; 3],
    index_types: [IndexType; 3],
    ctx: &StencilContext,
    dt: f64,
    fac: &CachedFactors,
) {
    let tot = b.map(|fab| fab.total());
    let ftot = f.map(|fab| fab.total());
    for (a, fab) in e.into_iter().enumerate() {
        let [t1, t2] = transverse(a);
        let it = index_types[a];
        tiles[a].for_each(|i, j, k| {
            if a == 1 && ctx.on_axis(i) {
                return;
            }
            let t = match a {
                0 => ex_terms(ctx, dt, &tot[1], &tot[2], i, j, k),
                1 => ey_terms(ctx, dt, &tot[0], &tot[2], i, j, k),
                _ => ez_terms(ctx, dt, &tot[0], &tot[1], i, j, k),
            };
            let p = [i, j, k];
            damp(fab, 0, p, t1, it.is_nodal(t1), fac, t[0]);
            damp(fab, 1, p, t2, it.is_nodal(t2), fac, t[1]);
            if let Some(ft) = &ftot {
                let g = f_gradient_term(ctx, dt, ft, a, i, j, k);
                damp(fab, 2, p, a, it.is_nodal(a), fac, g);
            }
        });
    }
}

/// F parts of one block, undamped; the damping is applied with E's
pub fn push_f_block(f: &mut FieldArray, e: [&FieldArray; 3], tile: IndexBox, ctx: &StencilContext, dt: f64) {
    let [ex, ey, ez] = e.map(|fab| fab.total());
    tile.for_each(|i, j, k| {
        let t = div_e_terms(ctx, [&ex, &ey, &ez], i, j, k);
        for (axis, term) in t.into_iter().enumerate() {
            f.add(i, j, k, axis, dt * term);
        }
    });
}

/// Damp each F part along its own axis
pub fn damp_f_block(f: &mut FieldArray, tile: IndexBox, fac: &CachedFactors) {
    tile.for_each(|i, j, k| {
        for axis in 0..3 {
            damp(f, axis, [i, j, k], axis, true, fac, 0.0);
        }
    });
}

fn tiles(fields: &[MultiField; 3], blk: usize) -> [IndexBox; 3] {
    [0, 1, 2].map(|d| fields[d].valid_box(blk))
}

/// Advance the layer's B by `dt`
pub fn push_pml_b(patch: &mut PmlPatch, dt: f64) {
    let fac = patch.sigma.b_factors(dt);
    let ctx = patch.ctx;
    let e = &patch.e;
    let index_types = patch.b.each_ref().map(|mf| mf.index_type());
    let tile_boxes: Vec<[IndexBox; 3]> = (0..patch.b[0].nblocks()).map(|blk| tiles(&patch.b, blk)).collect();
    let [bx, by, bz] = &mut patch.b;

    bx.blocks_mut()
        .par_iter_mut()
        .zip(by.blocks_mut().par_iter_mut())
        .zip(bz.blocks_mut().par_iter_mut())
        .zip(tile_boxes.par_iter())
        .enumerate()
        .for_each(|(blk, (((fx, fy), fz), t))| {
            let eb = [e[0].block(blk), e[1].block(blk), e[2].block(blk)];
            push_b_block([fx, fy, fz], eb, *t, index_types, &ctx, dt, fac);
        });
}

/// Advance the layer's E by `dt`, then damp E and F with the E factors
pub fn push_pml_e(patch: &mut PmlPatch, dt: f64) {
    let fac = patch.sigma.e_factors(dt);
    let ctx = patch.ctx;
    let b = &patch.b;
    let index_types = patch.e.each_ref().map(|mf| mf.index_type());
    let tile_boxes: Vec<[IndexBox; 3]> = (0..patch.e[0].nblocks()).map(|blk| tiles(&patch.e, blk)).collect();
    let [ex, ey, ez] = &mut patch.e;
    let f = patch.f.as_ref();

    ex.blocks_mut()
        .par_iter_mut()
        .zip(ey.blocks_mut().par_iter_mut())
        .zip(ez.blocks_mut().par_iter_mut())
        .zip(tile_boxes.par_iter())
        .enumerate()
        .for_each(|(blk, (((fx, fy), fz), t))| {
            let bb = [b[0].block(blk), b[1].block(blk), b[2].block(blk)];
            let fb = f.map(|mf| mf.block(blk));
            push_e_block([fx, fy, fz], bb, fb, *t, index_types, &ctx, dt, fac);
        });

    if let Some(f) = patch.f.as_mut() {
        let f_tiles: Vec<IndexBox> = (0..f.nblocks()).map(|blk| f.valid_box(blk)).collect();
        f.blocks_mut()
            .par_iter_mut()
            .zip(f_tiles.par_iter())
            .for_each(|(fab, tile)| damp_f_block(fab, *tile, fac));
    }
}

/// Advance the layer's F by `dt`; nothing to do without divergence cleaning
///
/// The parts are left undamped. They are damped by the next
/// [`push_pml_e`], so every F push must be followed by an E push before the
/// layer's F is read.
pub fn push_pml_f(patch: &mut PmlPatch, dt: f64) {
    let Some(f) = patch.f.as_mut() else {
        return;
    };
    let ctx = patch.ctx;
    let e = &patch.e;
    let tile_boxes: Vec<IndexBox> = (0..f.nblocks()).map(|blk| f.valid_box(blk)).collect();

    f.blocks_mut()
        .par_iter_mut()
        .zip(tile_boxes.par_iter())
        .enumerate()
        .for_each(|(blk, (fab, tile))| {
            let eb = [e[0].block(blk), e[1].block(blk), e[2].block(blk)];
            push_f_block(fab, eb, *tile, &ctx, dt);
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{Dimensionality, Geometry};
    use crate::{DomainConfig, PmlConfig, SimulationConfig};

    fn layer(divergence_cleaning: bool) -> PmlPatch {
        let config = SimulationConfig {
            dims: Dimensionality::OneD,
            domain: DomainConfig {
                n_cell: [1, 1, 32],
                prob_hi: [1.0, 1.0, 32e-3],
                max_grid_size: 16,
                ..DomainConfig::default()
            },
            divergence_cleaning,
            pml: Some(PmlConfig::default()),
            ..SimulationConfig::default()
        };
        let d = &config.domain;
        let g = Geometry::new(config.dims, d.n_cell, d.prob_lo, d.prob_hi, d.periodic);
        PmlPatch::new(&config, &g, g.domain, 8, 8, [false, false, true], [false, false, true])
    }

    #[test]
    fn test_uniform_field_only_decays() {
        // Uniform fields have no curl; each part just loses its damping factor
        let mut p = layer(false);
        for mf in p.e.iter_mut() {
            mf.set_val(1.0);
        }
        for mf in p.b.iter_mut() {
            mf.set_val(1.0);
        }
        let dt = 1e-12;
        push_pml_b(&mut p, dt);
        let fac = p.sigma.b_factors(dt).clone();

        // Bx part 1 is the z part; Bx is cell-centered along z
        let bx = p.b[0].block(0);
        let k = -5;
        assert!((bx.get(0, 0, k, 1) - fac.factor(2, k, false)).abs() < 1e-14);
        // Part 0 is the (inactive) y part: factor 1
        assert!((bx.get(0, 0, k, 0) - 1.0).abs() < 1e-14);
        assert!(bx.get(0, 0, k, 1) < 1.0);
    }

    #[test]
    fn test_e_push_has_no_source_without_curl() {
        let mut p = layer(true);
        push_pml_e(&mut p, 1e-12);
        push_pml_f(&mut p, 1e-12);
        for mf in p.e.iter().chain(p.f.iter()) {
            assert_eq!(mf.max_abs(), 0.0);
        }
    }

    #[test]
    fn test_f_push_skipped_when_absent() {
        let mut p = layer(false);
        push_pml_f(&mut p, 1e-12);
        assert!(p.f.is_none());
        // F pushes never touch the factor caches
        let mut q = layer(true);
        push_pml_f(&mut q, 1e-12);
        assert_eq!(q.sigma.cached_dt(), (None, None));
    }

    #[test]
    fn test_f_parts_damped_by_following_e_push() {
        let mut p = layer(true);
        p.f.as_mut().unwrap().set_val(1.0);
        let dt = 1e-12;

        // No E, so no divergence source and no damping yet
        push_pml_f(&mut p, dt);
        let k = -5;
        for n in 0..crate::pml::NCOMP_F {
            assert_eq!(p.f.as_ref().unwrap().block(0).get(0, 0, k, n), 1.0);
        }

        push_pml_e(&mut p, dt);
        let fac = p.sigma.e_factors(dt).clone();
        let f = p.f.as_ref().unwrap().block(0);
        assert!((f.get(0, 0, k, 2) - fac.factor(2, k, true)).abs() < 1e-14);
        assert!(f.get(0, 0, k, 2) < 1.0);
        assert_eq!(f.get(0, 0, k, 0), 1.0);
        assert_eq!(f.get(0, 0, k, 1), 1.0);
    }

    #[test]
    fn test_wave_inside_layer_decays() {
        let mut p = layer(false);
        // A lone Ex spike in the outer half of the low slab
        let blk = 0;
        p.e[0].block_mut(blk).set(0, 0, -6, 1, 1.0);
        let dt = 0.5 * 1e-3 / crate::C0;
        let start = p.field_energy(1.0);
        for _ in 0..20 {
            push_pml_b(&mut p, dt);
            p.b.iter_mut().for_each(MultiField::fill_boundary);
            push_pml_e(&mut p, dt);
            p.e.iter_mut().for_each(MultiField::fill_boundary);
        }
        assert!(p.field_energy(1.0) < 0.5 * start);
    }
}
