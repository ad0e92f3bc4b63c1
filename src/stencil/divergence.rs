//! Discrete divergence of E (on nodes) and B (on cell centers), and the F push

use super::StencilContext;
use crate::mesh::{FieldArray, IndexBox, Sample};
use crate::MU0;
use crate::C0;

/// div E at a node, split by axis and scaled by the inverse cell size
#[inline]
pub fn div_e_terms<S: Sample>(ctx: &StencilContext, e: [&S; 3], i: i32, j: i32, k: i32) -> [f64; 3] {
    let active = ctx.dims.active();
    let mut t = [0.0; 3];
    if ctx.is_cylindrical() {
        t[0] = if ctx.on_axis(i) {
            4.0 * ctx.dxinv[0] * e[0].at(i, j, k)
        } else {
            let r = ctx.rmin_cells() + i as f64;
            let ru = 1.0 + 0.5 / r;
            let rd = 1.0 - 0.5 / r;
            ctx.dxinv[0] * (ru * e[0].at(i, j, k) - rd * e[0].at(i - 1, j, k))
        };
    } else if active[0] {
        t[0] = ctx.dxinv[0] * (e[0].at(i, j, k) - e[0].at(i - 1, j, k));
    }
    if active[1] {
        t[1] = ctx.dxinv[1] * (e[1].at(i, j, k) - e[1].at(i, j - 1, k));
    }
    if active[2] {
        t[2] = ctx.dxinv[2] * (e[2].at(i, j, k) - e[2].at(i, j, k - 1));
    }
    t
}

#[inline]
pub fn div_e_at<S: Sample>(ctx: &StencilContext, e: [&S; 3], i: i32, j: i32, k: i32) -> f64 {
    div_e_terms(ctx, e, i, j, k).iter().sum()
}

/// div B at a cell center
#[inline]
pub fn div_b_at<S: Sample>(ctx: &StencilContext, b: [&S; 3], i: i32, j: i32, k: i32) -> f64 {
    let active = ctx.dims.active();
    let mut v = 0.0;
    if ctx.is_cylindrical() {
        let r = ctx.rmin_cells() + i as f64 + 0.5;
        let ru = 1.0 + 0.5 / r;
        let rd = 1.0 - 0.5 / r;
        v += ctx.dxinv[0] * (ru * b[0].at(i + 1, j, k) - rd * b[0].at(i, j, k));
    } else if active[0] {
        v += ctx.dxinv[0] * (b[0].at(i + 1, j, k) - b[0].at(i, j, k));
    }
    if active[1] {
        v += ctx.dxinv[1] * (b[1].at(i, j + 1, k) - b[1].at(i, j, k));
    }
    if active[2] {
        v += ctx.dxinv[2] * (b[2].at(i, j, k + 1) - b[2].at(i, j, k));
    }
    v
}

/// `F += dt (div E - rho / eps0)` over one nodal tile
pub fn push_f_block(
    f: &mut FieldArray,
    e: [&FieldArray; 3],
    rho: &FieldArray,
    rho_comp: usize,
    tile: IndexBox,
    ctx: &StencilContext,
    dt: f64,
) {
    let [ex, ey, ez] = e.map(|fab| fab.comp(0));
    let mu_c2 = MU0 * C0 * C0;
    tile.for_each(|i, j, k| {
        let div = div_e_at(ctx, [&ex, &ey, &ez], i, j, k);
        f.add(i, j, k, 0, dt * (div - mu_c2 * rho.get(i, j, k, rho_comp)));
    });
}

/// Write div E into component 0 of a nodal block
pub fn compute_div_e(out: &mut FieldArray, e: [&FieldArray; 3], tile: IndexBox, ctx: &StencilContext) {
    let [ex, ey, ez] = e.map(|fab| fab.comp(0));
    tile.for_each(|i, j, k| out.set(i, j, k, 0, div_e_at(ctx, [&ex, &ey, &ez], i, j, k)));
}

/// Write div B into component 0 of a cell-centered block
pub fn compute_div_b(out: &mut FieldArray, b: [&FieldArray; 3], tile: IndexBox, ctx: &StencilContext) {
    let [bx, by, bz] = b.map(|fab| fab.comp(0));
    tile.for_each(|i, j, k| out.set(i, j, k, 0, div_b_at(ctx, [&bx, &by, &bz], i, j, k)));
}
