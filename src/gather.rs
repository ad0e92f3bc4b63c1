//! Field gather: interpolate mesh E and B onto particle positions
//!
//! Each axis gets two shape factors per particle, one for node-centered and
//! one for cell-centered points (offset by the stagger shift, optionally one
//! order lower). A component picks, per axis, whichever matches its Yee
//! centering.

use rayon::prelude::*;

use crate::mesh::{Dimensionality, FieldArray, FieldKind, Geometry};
use crate::particles::{FieldSamples, ParticleTile};
use crate::shape::{compute_shape_factor, ShapeFactor};
use crate::SimulationConfig;

/// Mapping from physical position to grid-index coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpGrid {
    pub dims: Dimensionality,
    pub dx: [f64; 3],
    /// Physical position of index 0 on each axis
    pub xyzmin: [f64; 3],
}

impl InterpGrid {
    pub fn from_geometry(geom: &Geometry) -> Self {
        Self {
            dims: geom.dims,
            dx: [geom.cell_size[0], geom.cell_size[1], geom.cell_size[2]],
            xyzmin: [geom.prob_lo[0], geom.prob_lo[1], geom.prob_lo[2]],
        }
    }

    /// Grid-index coordinates plus the (cos, sin) of the azimuth in RZ
    #[inline]
    pub fn grid_coords(&self, pos: [f64; 3]) -> ([f64; 3], Option<(f64, f64)>) {
        let [x, y, z] = pos;
        let zc = (z - self.xyzmin[2]) / self.dx[2];
        match self.dims {
            Dimensionality::ThreeD => (
                [
                    (x - self.xyzmin[0]) / self.dx[0],
                    (y - self.xyzmin[1]) / self.dx[1],
                    zc,
                ],
                None,
            ),
            Dimensionality::TwoD => ([(x - self.xyzmin[0]) / self.dx[0], 0.0, zc], None),
            Dimensionality::OneD => ([0.0, 0.0, zc], None),
            Dimensionality::Cylindrical => {
                let r = (x * x + y * y).sqrt();
                // On the axis the azimuth is undefined; pick theta = 0
                let (costheta, sintheta) = if r > 0.0 { (x / r, y / r) } else { (1.0, 0.0) };
                (
                    [(r - self.xyzmin[0]) / self.dx[0], 0.0, zc],
                    Some((costheta, sintheta)),
                )
            }
        }
    }
}

/// Interpolation order and centering options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolationParams {
    pub order: usize,
    /// Use `order - 1` on cell-centered axes
    pub lower_in_v: bool,
    /// 0.5 on a staggered grid, 0 on a nodal one
    pub stagger_shift: f64,
}

impl InterpolationParams {
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            order: config.interpolation_order,
            lower_in_v: config.lower_order_in_v,
            stagger_shift: config.staggering.shift(),
        }
    }

    fn cell_order(&self) -> usize {
        if self.lower_in_v {
            self.order.saturating_sub(1)
        } else {
            self.order
        }
    }
}

/// The six field blocks read by the gather
#[derive(Clone, Copy)]
pub struct FieldRefs<'a> {
    pub e: [&'a FieldArray; 3],
    pub b: [&'a FieldArray; 3],
}

/// Shape factors of one particle on node- and cell-centered points
struct Stencil {
    node: [ShapeFactor; 3],
    cell: [ShapeFactor; 3],
}

impl Stencil {
    #[inline]
    fn new(coords: [f64; 3], dims: Dimensionality, params: &InterpolationParams) -> Self {
        let active = dims.active();
        let mut node = [ShapeFactor::UNIT; 3];
        let mut cell = [ShapeFactor::UNIT; 3];
        for d in 0..3 {
            if active[d] {
                node[d] = compute_shape_factor(params.order, coords[d]);
                cell[d] = compute_shape_factor(params.cell_order(), coords[d] - params.stagger_shift);
            }
        }
        Self { node, cell }
    }

    /// Weighted sum of component 0 of `fab` with the centering of `kind`
    #[inline]
    fn interpolate(&self, fab: &FieldArray, kind: FieldKind) -> f64 {
        let nodal = kind.yee_nodal();
        let pick = |d: usize| if nodal[d] { &self.node[d] } else { &self.cell[d] };
        let (sx, sy, sz) = (pick(0), pick(1), pick(2));

        let mut value = 0.0;
        for (k, wz) in sz.iter() {
            for (j, wy) in sy.iter() {
                for (i, wx) in sx.iter() {
                    value += wx * wy * wz * fab.get(i, j, k, 0);
                }
            }
        }
        value
    }
}

/// E and B at a single position
#[inline]
pub fn gather_at(
    pos: [f64; 3],
    fields: &FieldRefs,
    grid: &InterpGrid,
    params: &InterpolationParams,
) -> ([f64; 3], [f64; 3]) {
    let (coords, azimuth) = grid.grid_coords(pos);
    let stencil = Stencil::new(coords, grid.dims, params);

    let mut e = [0.0; 3];
    let mut b = [0.0; 3];
    for d in 0..3 {
        e[d] = stencil.interpolate(fields.e[d], FieldKind::E[d]);
        b[d] = stencil.interpolate(fields.b[d], FieldKind::B[d]);
    }

    if let Some((costheta, sintheta)) = azimuth {
        // (r, theta) components back to (x, y)
        let (er, et) = (e[0], e[1]);
        e[0] = costheta * er - sintheta * et;
        e[1] = sintheta * er + costheta * et;
        let (br, bt) = (b[0], b[1]);
        b[0] = costheta * br - sintheta * bt;
        b[1] = sintheta * br + costheta * bt;
    }
    (e, b)
}

/// Gather E and B for every particle of a tile, overwriting `samples`
pub fn gather_fields(
    tile: &ParticleTile,
    samples: &mut FieldSamples,
    fields: &FieldRefs,
    grid: &InterpGrid,
    params: &InterpolationParams,
) {
    let values: Vec<([f64; 3], [f64; 3])> = (0..tile.len())
        .into_par_iter()
        .map(|ip| gather_at(tile.position(ip), fields, grid, params))
        .collect();

    samples.resize(tile.len());
    for (ip, (e, b)) in values.into_iter().enumerate() {
        samples.store(ip, e, b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{IndexBox, Staggering};

    fn block(dims: Dimensionality, kind: FieldKind, f: impl Fn(i32, i32, i32) -> f64) -> FieldArray {
        let cell = IndexBox::from_size(dims.mask([8; 3], 1));
        let bx = cell
            .convert(kind.index_type(dims, Staggering::Yee))
            .grow(dims.mask([3; 3], 0));
        let mut fab = FieldArray::new(bx, 1);
        bx.for_each(|i, j, k| fab.set(i, j, k, 0, f(i, j, k)));
        fab
    }

    fn fields_with(dims: Dimensionality, f: impl Fn(FieldKind, i32, i32, i32) -> f64) -> Vec<FieldArray> {
        FieldKind::E
            .iter()
            .chain(FieldKind::B.iter())
            .map(|&kind| block(dims, kind, |i, j, k| f(kind, i, j, k)))
            .collect()
    }

    fn refs(fabs: &[FieldArray]) -> FieldRefs<'_> {
        FieldRefs {
            e: [&fabs[0], &fabs[1], &fabs[2]],
            b: [&fabs[3], &fabs[4], &fabs[5]],
        }
    }

    fn unit_grid(dims: Dimensionality) -> InterpGrid {
        InterpGrid {
            dims,
            dx: [1.0; 3],
            xyzmin: [0.0; 3],
        }
    }

    #[test]
    fn test_constant_field_every_order() {
        let fabs = fields_with(Dimensionality::ThreeD, |kind, _, _, _| match kind {
            FieldKind::Ex => 1.0,
            FieldKind::Ey => 2.0,
            FieldKind::Ez => 3.0,
            FieldKind::Bx => -1.0,
            FieldKind::By => -2.0,
            _ => -3.0,
        });
        let grid = unit_grid(Dimensionality::ThreeD);
        for order in 0..=3 {
            for lower_in_v in [false, true] {
                if lower_in_v && order == 0 {
                    continue;
                }
                let params = InterpolationParams {
                    order,
                    lower_in_v,
                    stagger_shift: 0.5,
                };
                let (e, b) = gather_at([3.3, 4.7, 2.2], &refs(&fabs), &grid, &params);
                for d in 0..3 {
                    assert!((e[d] - (d + 1) as f64).abs() < 1e-13);
                    assert!((b[d] + (d + 1) as f64).abs() < 1e-13);
                }
            }
        }
    }

    #[test]
    fn test_linear_field_exact_at_order_one() {
        // Ex is node-centered along z in 1D; its value at index k is 2k
        let fabs = fields_with(Dimensionality::OneD, |kind, _, _, k| match kind {
            FieldKind::Ex => 2.0 * k as f64,
            FieldKind::By => k as f64 + 0.5,
            _ => 0.0,
        });
        let grid = InterpGrid {
            dims: Dimensionality::OneD,
            dx: [1.0, 1.0, 0.5],
            xyzmin: [0.0; 3],
        };
        let params = InterpolationParams {
            order: 1,
            lower_in_v: false,
            stagger_shift: 0.5,
        };
        let mut tile = ParticleTile::new();
        tile.push([0.0, 0.0, 1.3], 1.0);
        tile.push([0.0, 0.0, 2.05], 1.0);
        let mut samples = FieldSamples::default();
        gather_fields(&tile, &mut samples, &refs(&fabs), &grid, &params);

        assert_eq!(samples.len(), 2);
        assert!((samples.ex[0] - 5.2).abs() < 1e-12);
        assert!((samples.ex[1] - 8.2).abs() < 1e-12);
        // By is cell-centered in z: value at cell k sits at k + 0.5
        assert!((samples.by[0] - 2.6).abs() < 1e-12);
    }

    #[test]
    fn test_output_overwrites() {
        let fabs = fields_with(Dimensionality::TwoD, |_, _, _, _| 1.0);
        let mut tile = ParticleTile::new();
        tile.push([2.5, 0.0, 2.5], 1.0);
        let mut samples = FieldSamples::zeros(1);
        samples.ex[0] = 100.0;
        let params = InterpolationParams {
            order: 2,
            lower_in_v: false,
            stagger_shift: 0.5,
        };
        gather_fields(&tile, &mut samples, &refs(&fabs), &unit_grid(Dimensionality::TwoD), &params);
        assert!((samples.ex[0] - 1.0).abs() < 1e-13);
    }

    #[test]
    fn test_cylindrical_rotation() {
        // Purely radial E and azimuthal B, uniform in (r, z)
        let fabs = fields_with(Dimensionality::Cylindrical, |kind, _, _, _| match kind {
            FieldKind::Ex => 2.0,
            FieldKind::By => 3.0,
            _ => 0.0,
        });
        let grid = unit_grid(Dimensionality::Cylindrical);
        let params = InterpolationParams {
            order: 1,
            lower_in_v: false,
            stagger_shift: 0.5,
        };
        let theta: f64 = 0.6;
        let r = 2.4;
        let (e, b) = gather_at([r * theta.cos(), r * theta.sin(), 3.0], &refs(&fabs), &grid, &params);
        assert!((e[0] - 2.0 * theta.cos()).abs() < 1e-12);
        assert!((e[1] - 2.0 * theta.sin()).abs() < 1e-12);
        assert!((b[0] + 3.0 * theta.sin()).abs() < 1e-12);
        assert!((b[1] - 3.0 * theta.cos()).abs() < 1e-12);

        // On the axis the fields pass through unrotated
        let (e, b) = gather_at([0.0, 0.0, 3.0], &refs(&fabs), &grid, &params);
        assert!(e[0].is_finite() && b[1].is_finite());
        assert!((e[0] - 2.0).abs() < 1e-12);
        assert!((b[1] - 3.0).abs() < 1e-12);
    }
}
