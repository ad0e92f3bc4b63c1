//! Curl updates for B and E
//!
//! `*_terms` return `dt` times one component's rate of change, split by
//! derivative axis in the order the PML stores its split components:
//! Bx = (xy, xz), By = (yz, yx), Bz = (zx, zy) and likewise for E.
//! Terms along axes the dimensionality does not simulate are zero.

use super::{backward_diff, forward_diff, StencilContext};
use crate::mesh::{FieldArray, IndexBox, Sample};
use crate::{C0, MU0};

#[inline]
fn fwd<S: Sample>(ctx: &StencilContext, dt: f64, f: &S, axis: usize, i: i32, j: i32, k: i32) -> f64 {
    if ctx.dims.is_active(axis) {
        dt * ctx.dxinv[axis] * forward_diff(f, ctx, axis, i, j, k)
    } else {
        0.0
    }
}

#[inline]
fn bwd<S: Sample>(ctx: &StencilContext, c2dt: f64, f: &S, axis: usize, i: i32, j: i32, k: i32) -> f64 {
    if ctx.dims.is_active(axis) {
        c2dt * ctx.dxinv[axis] * backward_diff(f, axis, i, j, k)
    } else {
        0.0
    }
}

#[inline]
pub fn bx_terms<S: Sample>(ctx: &StencilContext, dt: f64, ey: &S, ez: &S, i: i32, j: i32, k: i32) -> [f64; 2] {
    [-fwd(ctx, dt, ez, 1, i, j, k), fwd(ctx, dt, ey, 2, i, j, k)]
}

#[inline]
pub fn by_terms<S: Sample>(ctx: &StencilContext, dt: f64, ex: &S, ez: &S, i: i32, j: i32, k: i32) -> [f64; 2] {
    [-fwd(ctx, dt, ex, 2, i, j, k), fwd(ctx, dt, ez, 0, i, j, k)]
}

#[inline]
pub fn bz_terms<S: Sample>(ctx: &StencilContext, dt: f64, ex: &S, ey: &S, i: i32, j: i32, k: i32) -> [f64; 2] {
    let zx = if ctx.is_cylindrical() {
        // (1/r) d(r E_theta)/dr at the cell-centered radius
        let r = ctx.rmin_cells() + i as f64 + 0.5;
        let ru = 1.0 + 0.5 / r;
        let rd = 1.0 - 0.5 / r;
        -dt * ctx.dxinv[0] * (ru * ey.at(i + 1, j, k) - rd * ey.at(i, j, k))
    } else {
        -fwd(ctx, dt, ey, 0, i, j, k)
    };
    [zx, fwd(ctx, dt, ex, 1, i, j, k)]
}

#[inline]
pub fn ex_terms<S: Sample>(ctx: &StencilContext, dt: f64, by: &S, bz: &S, i: i32, j: i32, k: i32) -> [f64; 2] {
    let c2dt = C0 * C0 * dt;
    [bwd(ctx, c2dt, bz, 1, i, j, k), -bwd(ctx, c2dt, by, 2, i, j, k)]
}

#[inline]
pub fn ey_terms<S: Sample>(ctx: &StencilContext, dt: f64, bx: &S, bz: &S, i: i32, j: i32, k: i32) -> [f64; 2] {
    let c2dt = C0 * C0 * dt;
    [bwd(ctx, c2dt, bx, 2, i, j, k), -bwd(ctx, c2dt, bz, 0, i, j, k)]
}

#[inline]
pub fn ez_terms<S: Sample>(ctx: &StencilContext, dt: f64, bx: &S, by: &S, i: i32, j: i32, k: i32) -> [f64; 2] {
    let c2dt = C0 * C0 * dt;
    let zx = if ctx.is_cylindrical() {
        if ctx.on_axis(i) {
            // Regularized on the axis: (1/r) d(r B_theta)/dr -> 4 B_theta(dr/2) / dr
            4.0 * c2dt * ctx.dxinv[0] * by.at(i, j, k)
        } else {
            let r = ctx.rmin_cells() + i as f64;
            let ru = 1.0 + 0.5 / r;
            let rd = 1.0 - 0.5 / r;
            c2dt * ctx.dxinv[0] * (ru * by.at(i, j, k) - rd * by.at(i - 1, j, k))
        }
    } else {
        bwd(ctx, c2dt, by, 0, i, j, k)
    };
    [zx, -bwd(ctx, c2dt, bx, 1, i, j, k)]
}

/// `c^2 dt dF/d(axis)` for the divergence-cleaning correction of E
#[inline]
pub fn f_gradient_term<S: Sample>(ctx: &StencilContext, dt: f64, f: &S, axis: usize, i: i32, j: i32, k: i32) -> f64 {
    fwd(ctx, C0 * C0 * dt, f, axis, i, j, k)
}

/// Advance B by `dt` over the given per-component boxes of one block
pub fn push_b_block(b: [&mut FieldArray; 3], e: [&FieldArray; 3], tiles: [IndexBox; 3], ctx: &StencilContext, dt: f64) {
    let [bx, by, bz] = b;
    let [ex, ey, ez] = e.map(|f| f.comp(0));

    tiles[0].for_each(|i, j, k| {
        let t = bx_terms(ctx, dt, &ey, &ez, i, j, k);
        bx.add(i, j, k, 0, t[0] + t[1]);
    });
    tiles[1].for_each(|i, j, k| {
        let t = by_terms(ctx, dt, &ex, &ez, i, j, k);
        by.add(i, j, k, 0, t[0] + t[1]);
    });
    tiles[2].for_each(|i, j, k| {
        let t = bz_terms(ctx, dt, &ex, &ey, i, j, k);
        bz.add(i, j, k, 0, t[0] + t[1]);
    });
}

/// Advance E by `dt` over one block: curl B, current, and the F gradient if present
pub fn push_e_block(
    e: [&mut FieldArray; 3],
    b: [&FieldArray; 3],
    current: [&FieldArray; 3],
    f: Option<&FieldArray>,
    tiles: [IndexBox; 3],
    ctx: &StencilContext,
    dt: f64,
) {
    let [ex, ey, ez] = e;
    let [bx, by, bz] = b.map(|f| f.comp(0));
    let mu_c2_dt = MU0 * C0 * C0 * dt;
    let grad = |axis: usize, i: i32, j: i32, k: i32| match f {
        Some(fab) => f_gradient_term(ctx, dt, &fab.comp(0), axis, i, j, k),
        None => 0.0,
    };

    tiles[0].for_each(|i, j, k| {
        let t = ex_terms(ctx, dt, &by, &bz, i, j, k);
        let v = t[0] + t[1] + grad(0, i, j, k) - mu_c2_dt * current[0].get(i, j, k, 0);
        ex.add(i, j, k, 0, v);
    });
    tiles[1].for_each(|i, j, k| {
        // E_theta is pinned to zero on the axis
        if ctx.on_axis(i) {
            return;
        }
        let t = ey_terms(ctx, dt, &bx, &bz, i, j, k);
        let v = t[0] + t[1] + grad(1, i, j, k) - mu_c2_dt * current[1].get(i, j, k, 0);
        ey.add(i, j, k, 0, v);
    });
    tiles[2].for_each(|i, j, k| {
        let t = ez_terms(ctx, dt, &bx, &by, i, j, k);
        let v = t[0] + t[1] + grad(2, i, j, k) - mu_c2_dt * current[2].get(i, j, k, 0);
        ez.add(i, j, k, 0, v);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{Dimensionality, FieldKind, Staggering};
    use crate::stencil::{DispersionScheme, StencilCoefficients};

    fn ctx(dims: Dimensionality, dx: f64, rmin: f64) -> StencilContext {
        StencilContext {
            dims,
            coeffs: StencilCoefficients::new(DispersionScheme::Standard, dims, [dx; 3]),
            dxinv: [1.0 / dx; 3],
            rmin,
        }
    }

    fn block(dims: Dimensionality, kind: FieldKind, n: i32, f: impl Fn(i32, i32, i32) -> f64) -> FieldArray {
        let cell = IndexBox::from_size(dims.mask([n; 3], 1));
        let bx = cell
            .convert(kind.index_type(dims, Staggering::Yee))
            .grow(dims.mask([2; 3], 0));
        let mut fab = FieldArray::new(bx, 1);
        bx.for_each(|i, j, k| fab.set(i, j, k, 0, f(i, j, k)));
        fab
    }

    #[test]
    fn test_faraday_sign() {
        // Ey = k z  =>  dBx/dt = dEy/dz = k
        let dims = Dimensionality::ThreeD;
        let c = ctx(dims, 0.5, 0.0);
        let ey = block(dims, FieldKind::Ey, 4, |_, _, k| 3.0 * k as f64 * 0.5);
        let ez = block(dims, FieldKind::Ez, 4, |_, _, _| 1.0);
        let t = bx_terms(&c, 1e-3, &ey.comp(0), &ez.comp(0), 1, 1, 1);
        assert!(t[0].abs() < 1e-15);
        assert!((t[1] - 3.0e-3).abs() < 1e-15);
    }

    #[test]
    fn test_uniform_fields_are_stationary() {
        let dims = Dimensionality::TwoD;
        let c = ctx(dims, 1e-3, 0.0);
        let n = 4;
        let mut e: Vec<FieldArray> = FieldKind::E.iter().map(|&k| block(dims, k, n, |_, _, _| 2.0)).collect();
        let b: Vec<FieldArray> = FieldKind::B.iter().map(|&k| block(dims, k, n, |_, _, _| 1e-8)).collect();
        let j: Vec<FieldArray> = FieldKind::J.iter().map(|&k| block(dims, k, n, |_, _, _| 0.0)).collect();
        let cell = IndexBox::from_size([n, 1, n]);
        let tiles = FieldKind::E.map(|k| cell.convert(k.index_type(dims, Staggering::Yee)));

        let [ex, ey, ez] = &mut e[..] else { unreachable!() };
        push_e_block([ex, ey, ez], [&b[0], &b[1], &b[2]], [&j[0], &j[1], &j[2]], None, tiles, &c, 1e-12);
        for fab in &e {
            assert!(fab.data().iter().all(|&v| (v - 2.0).abs() < 1e-12));
        }
    }

    #[test]
    fn test_current_drives_e() {
        let dims = Dimensionality::OneD;
        let c = ctx(dims, 1e-3, 0.0);
        let n = 4;
        let mut e: Vec<FieldArray> = FieldKind::E.iter().map(|&k| block(dims, k, n, |_, _, _| 0.0)).collect();
        let b: Vec<FieldArray> = FieldKind::B.iter().map(|&k| block(dims, k, n, |_, _, _| 0.0)).collect();
        let j: Vec<FieldArray> = FieldKind::J.iter().map(|&k| block(dims, k, n, |_, _, _| 5.0)).collect();
        let cell = IndexBox::from_size([1, 1, n]);
        let tiles = FieldKind::E.map(|k| cell.convert(k.index_type(dims, Staggering::Yee)));
        let dt = 1e-12;

        let [ex, ey, ez] = &mut e[..] else { unreachable!() };
        push_e_block([ex, ey, ez], [&b[0], &b[1], &b[2]], [&j[0], &j[1], &j[2]], None, tiles, &c, dt);
        let expected = -MU0 * C0 * C0 * dt * 5.0;
        assert!((e[0].get(0, 0, 2, 0) - expected).abs() < 1e-12 * expected.abs());
        assert!((e[2].get(0, 0, 2, 0) - expected).abs() < 1e-12 * expected.abs());
    }

    #[test]
    fn test_axis_curl_regularization() {
        // B_theta = a r at cell centers: (1/r) d(r B_theta)/dr = 2a everywhere, including r = 0
        let dims = Dimensionality::Cylindrical;
        let a = 3.0;
        let dt = 1e-12;
        for dr in [1e-2, 1e-4] {
            let c = ctx(dims, dr, 0.0);
            let bth = block(dims, FieldKind::By, 8, |i, _, _| a * (i as f64 + 0.5) * dr);
            let br = block(dims, FieldKind::Bx, 8, |_, _, _| 0.0);
            let expected = 2.0 * a * C0 * C0 * dt;
            for i in 0..3 {
                let t = ez_terms(&c, dt, &br.comp(0), &bth.comp(0), i, 0, 2);
                assert!(t[0].is_finite());
                assert!((t[0] - expected).abs() < 1e-12 * expected, "i {i}: {}", t[0]);
            }
        }
    }

    #[test]
    fn test_theta_skipped_on_axis_only_when_rmin_is_zero() {
        let dims = Dimensionality::Cylindrical;
        let n = 4;
        let cell = IndexBox::from_size([n, 1, n]);
        let tiles = FieldKind::E.map(|k| cell.convert(k.index_type(dims, Staggering::Yee)));
        let b: Vec<FieldArray> = FieldKind::B.iter().map(|&k| block(dims, k, n, |_, _, _| 0.0)).collect();
        let j: Vec<FieldArray> = FieldKind::J.iter().map(|&k| block(dims, k, n, |_, _, _| 1.0)).collect();

        for (rmin, moved) in [(0.0, false), (0.5, true)] {
            let c = ctx(dims, 1e-3, rmin);
            let mut e: Vec<FieldArray> = FieldKind::E.iter().map(|&k| block(dims, k, n, |_, _, _| 0.0)).collect();
            let [ex, ey, ez] = &mut e[..] else { unreachable!() };
            push_e_block([ex, ey, ez], [&b[0], &b[1], &b[2]], [&j[0], &j[1], &j[2]], None, tiles, &c, 1e-12);
            assert_eq!(e[1].get(0, 0, 1, 0) != 0.0, moved);
            assert!(e[1].get(1, 0, 1, 0) != 0.0);
        }
    }
}
