//! Particle-to-mesh deposition of charge and current
//!
//! Particles of one block scatter in parallel into an atomic buffer shaped
//! like the block (ghost cells included); the buffer is folded into the mesh
//! array once every particle has been processed. Contributions that land in
//! ghost cells reach their owning block through `MultiField::sum_boundary`.

use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;

use crate::gather::InterpGrid;
use crate::mesh::{FieldArray, FieldKind, IndexBox};
use crate::particles::ParticleTile;
use crate::shape::{compute_shape_factor, ShapeFactor};
use crate::C0;

/// f64 accumulator over a block, safe for concurrent adds
pub struct DepositBuffer {
    bx: IndexBox,
    ncomp: usize,
    data: Vec<AtomicU64>,
}

impl DepositBuffer {
    pub fn new(bx: IndexBox, ncomp: usize) -> Self {
        let data = (0..bx.num_pts() * ncomp)
            .map(|_| AtomicU64::new(0.0_f64.to_bits()))
            .collect();
        Self { bx, ncomp, data }
    }

    /// Zeroed buffer covering the same points as `fab`
    pub fn like(fab: &FieldArray) -> Self {
        Self::new(fab.bx(), fab.ncomp())
    }

    #[inline]
    fn idx(&self, i: i32, j: i32, k: i32, n: usize) -> usize {
        assert!(
            self.bx.contains(i, j, k) && n < self.ncomp,
            "deposit at ({i}, {j}, {k}, {n}) outside {:?} x {}",
            self.bx,
            self.ncomp
        );
        let [nx, ny, nz] = self.bx.size();
        let ii = (i - self.bx.lo[0]) as usize;
        let jj = (j - self.bx.lo[1]) as usize;
        let kk = (k - self.bx.lo[2]) as usize;
        ((n * nz + kk) * ny + jj) * nx + ii
    }

    /// Atomic add (compare-and-swap on the bit pattern)
    #[inline]
    pub fn add(&self, i: i32, j: i32, k: i32, n: usize, value: f64) {
        let atomic = &self.data[self.idx(i, j, k, n)];
        let mut old = atomic.load(Ordering::Relaxed);
        loop {
            let new_f = f64::from_bits(old) + value;
            match atomic.compare_exchange_weak(old, new_f.to_bits(), Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => break,
                Err(x) => old = x,
            }
        }
    }

    /// Add the accumulated values into `fab`
    pub fn fold_into(self, fab: &mut FieldArray) {
        debug_assert_eq!(fab.bx(), self.bx);
        for (dst, src) in fab.data_mut().iter_mut().zip(self.data) {
            *dst += f64::from_bits(src.into_inner());
        }
    }
}

/// Inverse cell volume over the simulated axes
fn inv_cell_volume(grid: &InterpGrid) -> f64 {
    let active = grid.dims.active();
    (0..3)
        .filter(|&d| active[d])
        .map(|d| 1.0 / grid.dx[d])
        .product()
}

#[inline]
fn node_factors(coords: [f64; 3], grid: &InterpGrid, order: usize, cell_axis: Option<(usize, f64)>) -> [ShapeFactor; 3] {
    let active = grid.dims.active();
    let mut s = [ShapeFactor::UNIT; 3];
    for d in 0..3 {
        if active[d] {
            let x = match cell_axis {
                Some((axis, shift)) if axis == d => coords[d] - shift,
                _ => coords[d],
            };
            s[d] = compute_shape_factor(order, x);
        }
    }
    s
}

#[inline]
fn scatter(buffer: &DepositBuffer, s: &[ShapeFactor; 3], comp: usize, value: f64) {
    for (k, wz) in s[2].iter() {
        for (j, wy) in s[1].iter() {
            for (i, wx) in s[0].iter() {
                buffer.add(i, j, k, comp, value * wx * wy * wz);
            }
        }
    }
}

/// Deposit `q * w / cell volume` of every particle into component `comp` of a nodal rho block
pub fn deposit_charge(
    tile: &ParticleTile,
    charge: f64,
    rho: &mut FieldArray,
    comp: usize,
    grid: &InterpGrid,
    order: usize,
) {
    let invvol = inv_cell_volume(grid);
    let buffer = DepositBuffer::like(rho);

    (0..tile.len()).into_par_iter().for_each(|ip| {
        let (coords, _) = grid.grid_coords(tile.position(ip));
        let wq = charge * tile.weight(ip) * invvol;
        let s = node_factors(coords, grid, order, None);
        scatter(&buffer, &s, comp, wq);
    });

    buffer.fold_into(rho);
}

/// Direct (non charge-conserving) current deposition onto staggered J blocks
///
/// Each component is centered like the matching E component, so its own
/// axis uses cell-centered weights shifted by `stagger_shift`. In RZ the
/// Cartesian velocity is projected onto (r, theta).
pub fn deposit_current(
    tile: &ParticleTile,
    charge: f64,
    j: [&mut FieldArray; 3],
    grid: &InterpGrid,
    order: usize,
    stagger_shift: f64,
) {
    let invvol = inv_cell_volume(grid);
    let inv_c2 = 1.0 / (C0 * C0);
    let buffers: Vec<DepositBuffer> = j.iter().map(|fab| DepositBuffer::like(fab)).collect();

    (0..tile.len()).into_par_iter().for_each(|ip| {
        let (coords, azimuth) = grid.grid_coords(tile.position(ip));
        let u = tile.momentum(ip);
        let inv_gamma = 1.0 / (1.0 + (u[0] * u[0] + u[1] * u[1] + u[2] * u[2]) * inv_c2).sqrt();
        let mut v = u.map(|ud| ud * inv_gamma);
        if let Some((costheta, sintheta)) = azimuth {
            let (vx, vy) = (v[0], v[1]);
            v[0] = costheta * vx + sintheta * vy;
            v[1] = -sintheta * vx + costheta * vy;
        }
        let wq = charge * tile.weight(ip) * invvol;

        for (d, buffer) in buffers.iter().enumerate() {
            let nodal = FieldKind::J[d].yee_nodal();
            let cell_axis = (!nodal[d]).then_some((d, stagger_shift));
            let s = node_factors(coords, grid, order, cell_axis);
            scatter(buffer, &s, 0, wq * v[d]);
        }
    });

    for (fab, buffer) in j.into_iter().zip(buffers) {
        buffer.fold_into(fab);
    }
}
