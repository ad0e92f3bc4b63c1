//! Damping tables of the absorbing layer
//!
//! Conductivity is tabulated per axis at nodes (`sigma`) and at cell
//! centers (`sigma_star`) from the depth into the layer. The per-step
//! factors `exp(-sigma dt)` depend on the push time step, so they are
//! cached separately for B pushes and E/F pushes and rebuilt whenever the
//! step changes.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::mesh::IndexBox;
use crate::C0;

/// Fraction of full damping `depth` cells into a layer of `ncell` cells
///
/// Zero over the inner `ncell - delta` cells, then a quadratic ramp
/// reaching 1 at the outer edge.
pub fn profile(depth: f64, ncell: i32, delta: i32) -> f64 {
    let delta = delta as f64;
    let ramp = (depth - (ncell as f64 - delta)).clamp(0.0, delta) / delta;
    ramp * ramp
}

/// Conductivity along one axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigmaTable {
    /// Index of the first entry of both tables
    pub lo: i32,
    /// At nodes `lo..lo + sigma.len()`
    pub sigma: Vec<f64>,
    /// At cell centers `lo..lo + sigma_star.len()`
    pub sigma_star: Vec<f64>,
}

impl SigmaTable {
    /// Table for axis `axis` covering `range`, measured from the faces of `interior`
    #[allow(clippy::too_many_arguments)]
    fn new(
        axis: usize,
        range: IndexBox,
        interior: IndexBox,
        lo_on: bool,
        hi_on: bool,
        ncell: i32,
        delta: i32,
        dx: f64,
    ) -> Self {
        let sigma_max = 4.0 * C0 / dx;
        let (ilo, ihi) = (interior.lo[axis], interior.hi[axis] + 1);

        let node_depth = |i: i32| -> f64 {
            if lo_on && i < ilo {
                (ilo - i) as f64
            } else if hi_on && i > ihi {
                (i - ihi) as f64
            } else {
                0.0
            }
        };
        let cell_depth = |i: i32| -> f64 {
            let x = i as f64 + 0.5;
            if lo_on && i < ilo {
                ilo as f64 - x
            } else if hi_on && i >= ihi {
                x - ihi as f64
            } else {
                0.0
            }
        };

        let lo = range.lo[axis];
        let sigma = (lo..=range.hi[axis] + 1)
            .map(|i| sigma_max * profile(node_depth(i), ncell, delta))
            .collect();
        let sigma_star = (lo..=range.hi[axis])
            .map(|i| sigma_max * profile(cell_depth(i), ncell, delta))
            .collect();
        Self { lo, sigma, sigma_star }
    }

    #[inline]
    fn lookup(values: &[f64], lo: i32, i: i32) -> f64 {
        usize::try_from(i - lo)
            .ok()
            .and_then(|n| values.get(n).copied())
            .unwrap_or(0.0)
    }

    pub fn at_node(&self, i: i32) -> f64 {
        Self::lookup(&self.sigma, self.lo, i)
    }

    pub fn at_cell(&self, i: i32) -> f64 {
        Self::lookup(&self.sigma_star, self.lo, i)
    }
}

/// `exp(-sigma dt)` tables for one push time step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedFactors {
    pub dt: f64,
    lo: [i32; 3],
    sigma_fac: [Vec<f64>; 3],
    sigma_star_fac: [Vec<f64>; 3],
}

impl CachedFactors {
    pub fn new(tables: &[SigmaTable; 3], dt: f64) -> Self {
        let decay = |v: &Vec<f64>| v.iter().map(|s| (-s * dt).exp()).collect::<Vec<f64>>();
        Self {
            dt,
            lo: [0, 1, 2].map(|d| tables[d].lo),
            sigma_fac: [0, 1, 2].map(|d| decay(&tables[d].sigma)),
            sigma_star_fac: [0, 1, 2].map(|d| decay(&tables[d].sigma_star)),
        }
    }

    /// Damping factor at index `i` along `axis`; 1 outside the tables
    #[inline]
    pub fn factor(&self, axis: usize, i: i32, nodal: bool) -> f64 {
        let values = if nodal {
            &self.sigma_fac[axis]
        } else {
            &self.sigma_star_fac[axis]
        };
        usize::try_from(i - self.lo[axis])
            .ok()
            .and_then(|n| values.get(n).copied())
            .unwrap_or(1.0)
    }
}

/// Tables of one PML patch plus the two factor caches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigmaBox {
    pub tables: [SigmaTable; 3],
    b_factors: Option<CachedFactors>,
    e_factors: Option<CachedFactors>,
}

impl SigmaBox {
    /// Tables over `range` (layer plus ghost cells) for a layer wrapped around `interior`
    pub fn new(
        range: IndexBox,
        interior: IndexBox,
        lo: [bool; 3],
        hi: [bool; 3],
        ncell: i32,
        delta: i32,
        cell_size: [f64; 3],
    ) -> Self {
        let tables = [0, 1, 2].map(|d| SigmaTable::new(d, range, interior, lo[d], hi[d], ncell, delta, cell_size[d]));
        Self {
            tables,
            b_factors: None,
            e_factors: None,
        }
    }

    /// Factors for a B push of `dt`, rebuilt if the cached step differs
    pub fn b_factors(&mut self, dt: f64) -> &CachedFactors {
        refresh(&mut self.b_factors, &self.tables, dt, "B")
    }

    /// Factors for an E or F push of `dt`, rebuilt if the cached step differs
    pub fn e_factors(&mut self, dt: f64) -> &CachedFactors {
        refresh(&mut self.e_factors, &self.tables, dt, "E")
    }

    /// True when both boxes tabulate the same index ranges
    pub fn same_layout(&self, other: &SigmaBox) -> bool {
        self.tables.iter().zip(&other.tables).all(|(a, b)| {
            a.lo == b.lo && a.sigma.len() == b.sigma.len() && a.sigma_star.len() == b.sigma_star.len()
        })
    }

    /// Step the B and E caches were last built for
    pub fn cached_dt(&self) -> (Option<f64>, Option<f64>) {
        (
            self.b_factors.as_ref().map(|c| c.dt),
            self.e_factors.as_ref().map(|c| c.dt),
        )
    }
}

fn refresh<'a>(
    slot: &'a mut Option<CachedFactors>,
    tables: &[SigmaTable; 3],
    dt: f64,
    kind: &'static str,
) -> &'a CachedFactors {
    let stale = !matches!(slot, Some(c) if c.dt == dt);
    if stale {
        debug!(kind, old_dt = ?slot.as_ref().map(|c| c.dt), new_dt = dt, "Recomputing PML damping factors");
        *slot = Some(CachedFactors::new(tables, dt));
    }
    slot.get_or_insert_with(|| CachedFactors::new(tables, dt))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slab_box(ncell: i32, delta: i32) -> SigmaBox {
        let interior = IndexBox::from_size([16, 1, 16]);
        let range = interior.grow([ncell + 2, 0, ncell + 2]);
        SigmaBox::new(
            range,
            interior,
            [true, false, true],
            [true, false, false],
            ncell,
            delta,
            [1e-3; 3],
        )
    }

    #[test]
    fn test_profile_ramps_monotonically() {
        for (ncell, delta) in [(10, 10), (10, 4), (6, 1), (1, 1)] {
            assert_eq!(profile(0.0, ncell, delta), 0.0);
            assert!((profile(ncell as f64, ncell, delta) - 1.0).abs() < 1e-15);
            let mut prev = 0.0;
            for step in 0..=(4 * ncell) {
                let p = profile(step as f64 * 0.25, ncell, delta);
                assert!(p >= prev && p <= 1.0);
                prev = p;
            }
        }
    }

    #[test]
    fn test_tables_vanish_inside_and_grow_outward() {
        let sb = slab_box(8, 8);
        let x = &sb.tables[0];
        for i in 0..=16 {
            assert_eq!(x.at_node(i), 0.0);
        }
        for i in 0..16 {
            assert_eq!(x.at_cell(i), 0.0);
        }
        assert!(x.at_node(-1) > 0.0);
        assert!(x.at_node(-8) > x.at_node(-4));
        assert!(x.at_cell(-1) < x.at_node(-1));
        assert!(x.at_node(17) > 0.0);

        // z high side disabled
        let z = &sb.tables[2];
        assert_eq!(z.at_node(20), 0.0);
        assert!(z.at_node(-3) > 0.0);
        // Full damping at the outer edge
        assert!((x.at_node(-8) - 4.0 * C0 / 1e-3).abs() < 1e-6 * C0);
    }

    #[test]
    fn test_factor_cache_follows_dt() {
        let mut sb = slab_box(4, 2);
        assert_eq!(sb.cached_dt(), (None, None));

        let f1 = sb.b_factors(1e-12).clone();
        assert_eq!(sb.cached_dt(), (Some(1e-12), None));
        // Same dt reuses the cache
        assert_eq!(sb.b_factors(1e-12), &f1);

        let f2 = sb.b_factors(2e-12).clone();
        assert!(f2.factor(0, -4, true) < f1.factor(0, -4, true));
        assert!((f2.factor(0, -4, true) - f1.factor(0, -4, true).powi(2)).abs() < 1e-14);

        sb.e_factors(5e-13);
        assert_eq!(sb.cached_dt(), (Some(2e-12), Some(5e-13)));
        assert_eq!(f2.factor(0, 5, false), 1.0);
        assert_eq!(f2.factor(0, 1000, false), 1.0);
    }
}
