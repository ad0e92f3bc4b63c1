//! Shape factors: B-spline interpolation weights between a particle and the mesh
//!
//! Coordinates are in grid-index units, measured from the point whose index
//! is 0 along the axis. Order `n` touches `n + 1` consecutive points.

/// Highest supported interpolation order
pub const MAX_ORDER: usize = 3;

/// Slots in a shifted shape-factor buffer (`order + 3` for the highest order)
pub const SHIFTED_LEN: usize = MAX_ORDER + 3;

/// Weights of one particle along one axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeFactor {
    weights: [f64; MAX_ORDER + 1],
    len: usize,
    /// Index of the leftmost touched point
    pub first: i32,
}

impl ShapeFactor {
    /// Weight 1 on index 0, for axes the simulation does not resolve
    pub const UNIT: ShapeFactor = ShapeFactor {
        weights: [1.0, 0.0, 0.0, 0.0],
        len: 1,
        first: 0,
    };

    pub fn weights(&self) -> &[f64] {
        &self.weights[..self.len]
    }

    /// `(index, weight)` pairs
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.weights()
            .iter()
            .enumerate()
            .map(move |(m, &w)| (self.first + m as i32, w))
    }
}

/// Compute the shape factor of `order` at coordinate `x`
///
/// Orders above [`MAX_ORDER`] are clamped to it.
#[inline]
pub fn compute_shape_factor(order: usize, x: f64) -> ShapeFactor {
    debug_assert!(order <= MAX_ORDER, "shape factor order {order}");
    let mut weights = [0.0; MAX_ORDER + 1];
    match order {
        0 => {
            let j = (x + 0.5).floor();
            weights[0] = 1.0;
            ShapeFactor {
                weights,
                len: 1,
                first: j as i32,
            }
        }
        1 => {
            let j = x.floor();
            let xint = x - j;
            weights[0] = 1.0 - xint;
            weights[1] = xint;
            ShapeFactor {
                weights,
                len: 2,
                first: j as i32,
            }
        }
        2 => {
            let j = (x + 0.5).floor();
            let xint = x - j;
            weights[0] = 0.5 * (0.5 - xint) * (0.5 - xint);
            weights[1] = 0.75 - xint * xint;
            weights[2] = 0.5 * (0.5 + xint) * (0.5 + xint);
            ShapeFactor {
                weights,
                len: 3,
                first: j as i32 - 1,
            }
        }
        _ => {
            let j = x.floor();
            let xint = x - j;
            let oxint = 1.0 - xint;
            weights[0] = oxint * oxint * oxint / 6.0;
            weights[1] = 2.0 / 3.0 - xint * xint * (1.0 - 0.5 * xint);
            weights[2] = 2.0 / 3.0 - oxint * oxint * (1.0 - 0.5 * oxint);
            weights[3] = xint * xint * xint / 6.0;
            ShapeFactor {
                weights,
                len: 4,
                first: j as i32 - 1,
            }
        }
    }
}

/// Shape factor at an old position laid out relative to a new reference cell
///
/// Slot `p` holds the weight of point `i_new - 1 + p`, so a particle that
/// moved by at most one cell in either direction lands inside the buffer.
/// Used by current-conserving deposition, which differences old and new
/// weights slot by slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShiftedShapeFactor {
    pub weights: [f64; SHIFTED_LEN],
    /// Index of the leftmost point the old position touches
    pub leftmost: i32,
}

pub fn compute_shifted_shape_factor(order: usize, x_old: f64, i_new: i32) -> ShiftedShapeFactor {
    let sf = compute_shape_factor(order, x_old);
    let mut weights = [0.0; SHIFTED_LEN];
    let start = sf.first - (i_new - 1);
    for (m, &w) in sf.weights().iter().enumerate() {
        let slot = usize::try_from(start + m as i32)
            .ok()
            .filter(|&p| p < order + 3)
            .and_then(|p| weights.get_mut(p));
        debug_assert!(slot.is_some(), "particle moved more than one cell");
        if let Some(slot) = slot {
            *slot = w;
        }
    }
    ShiftedShapeFactor {
        weights,
        leftmost: sf.first,
    }
}
