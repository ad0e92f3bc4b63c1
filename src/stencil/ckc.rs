//! Cole-Karkkainen-Cowan coefficients
//!
//! Derived once from the cell sizes: only ratios of `dt/dx` between axes
//! enter, so the time step cancels. On a cubic 3D grid the weights are
//! `alpha = 7/12`, `beta = 1/12`, `gamma = 1/48`.

use super::StencilCoefficients;
use crate::mesh::Dimensionality;

pub fn ckc_coefficients(dims: Dimensionality, cell_size: [f64; 3]) -> StencilCoefficients {
    let inv = cell_size.map(|d| 1.0 / d);
    match dims {
        Dimensionality::ThreeD => {
            let delta = inv[0].max(inv[1]).max(inv[2]);
            let [rx, ry, rz] = inv.map(|v| (v / delta) * (v / delta));
            let sum = ry * rz + rz * rx + rx * ry;
            let beta = 0.125 * (1.0 - rx * ry * rz / sum);

            let mut c = StencilCoefficients {
                alpha: [0.0; 3],
                beta: [[0.0; 3]; 3],
                gamma: [0.0; 3],
                smoothed: true,
            };
            c.beta[0][1] = ry * beta;
            c.beta[0][2] = rz * beta;
            c.beta[1][0] = rx * beta;
            c.beta[1][2] = rz * beta;
            c.beta[2][0] = rx * beta;
            c.beta[2][1] = ry * beta;
            c.gamma[0] = ry * rz * (0.0625 - 0.125 * ry * rz / sum);
            c.gamma[1] = rx * rz * (0.0625 - 0.125 * rx * rz / sum);
            c.gamma[2] = rx * ry * (0.0625 - 0.125 * rx * ry / sum);
            for a in 0..3 {
                let [t1, t2] = super::transverse(a);
                c.alpha[a] = 1.0 - 2.0 * c.beta[a][t1] - 2.0 * c.beta[a][t2] - 4.0 * c.gamma[a];
            }
            c
        }
        Dimensionality::TwoD => {
            let delta = inv[0].max(inv[2]);
            let rx = (inv[0] / delta) * (inv[0] / delta);
            let rz = (inv[2] / delta) * (inv[2] / delta);

            let mut c = StencilCoefficients {
                alpha: [1.0; 3],
                beta: [[0.0; 3]; 3],
                gamma: [0.0; 3],
                smoothed: true,
            };
            c.beta[0][2] = 0.125 * rz;
            c.beta[2][0] = 0.125 * rx;
            c.alpha[0] = 1.0 - 2.0 * c.beta[0][2];
            c.alpha[2] = 1.0 - 2.0 * c.beta[2][0];
            c
        }
        // A single axis has no transverse neighbors to smooth over
        Dimensionality::OneD | Dimensionality::Cylindrical => StencilCoefficients::YEE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cubic_grid_weights() {
        let c = ckc_coefficients(Dimensionality::ThreeD, [1e-6; 3]);
        for a in 0..3 {
            assert_relative_eq!(c.alpha[a], 7.0 / 12.0, epsilon = 1e-14);
            assert_relative_eq!(c.gamma[a], 1.0 / 48.0, epsilon = 1e-14);
            for t in super::super::transverse(a) {
                assert_relative_eq!(c.beta[a][t], 1.0 / 12.0, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn test_weights_are_consistent() {
        // Stencil weights along each derivative sum to one for any aspect ratio
        let c = ckc_coefficients(Dimensionality::ThreeD, [1.0, 0.7, 2.3]);
        for a in 0..3 {
            let [t1, t2] = super::super::transverse(a);
            let sum = c.alpha[a] + 2.0 * c.beta[a][t1] + 2.0 * c.beta[a][t2] + 4.0 * c.gamma[a];
            assert_relative_eq!(sum, 1.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_square_grid_2d() {
        let c = ckc_coefficients(Dimensionality::TwoD, [0.5, 1.0, 0.5]);
        assert_relative_eq!(c.alpha[0], 0.75);
        assert_relative_eq!(c.alpha[2], 0.75);
        assert_relative_eq!(c.beta[0][2], 0.125);
        assert_relative_eq!(c.beta[2][0], 0.125);
        assert_eq!(c.gamma, [0.0; 3]);
    }

    #[test]
    fn test_one_d_is_yee() {
        assert_eq!(
            ckc_coefficients(Dimensionality::OneD, [1.0; 3]),
            StencilCoefficients::YEE
        );
    }
}
