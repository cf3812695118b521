//! Strain tensor derivation from horizontal displacement fields.
//!
//! Strain is computed independently per time step from that step's
//! displacement fields using backward finite differences over immediate
//! grid neighbors. The first row and first column have no backward
//! neighbor and are left at zero.

use serde::{Deserialize, Serialize};

/// A 2-D symmetric strain tensor at one grid point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrainTensor {
    /// East-west normal component.
    pub exx: f64,
    /// North-south normal component.
    pub eyy: f64,
    /// Shear component.
    pub exy: f64,
}

impl StrainTensor {
    /// Second invariant, `sqrt(0.5 (exx^2 + eyy^2 + 2 exy^2))`.
    ///
    /// Always non-negative; used as the scalar strain magnitude.
    pub fn second_invariant(&self) -> f64 {
        (0.5 * (self.exx * self.exx + self.eyy * self.eyy + 2.0 * self.exy * self.exy)).sqrt()
    }

    /// First invariant (trace): local areal dilatation.
    pub fn dilatation(&self) -> f64 {
        self.exx + self.eyy
    }

    /// Maximum shear strain: radius of Mohr's circle.
    pub fn max_shear(&self) -> f64 {
        let half_diff = 0.5 * (self.exx - self.eyy);
        (half_diff * half_diff + self.exy * self.exy).sqrt()
    }
}

/// Strain component fields for one time step, flattened row-major.
#[derive(Debug, Clone)]
pub struct StrainFields {
    /// exx per cell.
    pub xx: Vec<f64>,
    /// eyy per cell.
    pub yy: Vec<f64>,
    /// exy per cell.
    pub xy: Vec<f64>,
}

/// Derives the strain fields from one time step's horizontal
/// displacements.
///
/// `east` and `north` are flattened `(nlat, nlon)` fields; `spacing_m`
/// is the grid spacing in meters. For interior points (i > 0, j > 0):
///
/// - `exx = (e[i][j] - e[i][j-1]) / spacing`
/// - `eyy = (n[i][j] - n[i-1][j]) / spacing`
/// - `exy = 0.5 ((e[i][j] - e[i-1][j]) + (n[i][j] - n[i][j-1])) / spacing`
pub fn derive_strain(
    east: &[f64],
    north: &[f64],
    nlat: usize,
    nlon: usize,
    spacing_m: f64,
) -> StrainFields {
    debug_assert_eq!(east.len(), nlat * nlon);
    debug_assert_eq!(north.len(), nlat * nlon);

    let mut xx = vec![0.0; nlat * nlon];
    let mut yy = vec![0.0; nlat * nlon];
    let mut xy = vec![0.0; nlat * nlon];

    for i in 1..nlat {
        for j in 1..nlon {
            let idx = i * nlon + j;
            let west = i * nlon + (j - 1);
            let south = (i - 1) * nlon + j;

            let dedx = (east[idx] - east[west]) / spacing_m;
            let dndy = (north[idx] - north[south]) / spacing_m;
            let dedy = (east[idx] - east[south]) / spacing_m;
            let dndx = (north[idx] - north[west]) / spacing_m;

            xx[idx] = dedx;
            yy[idx] = dndy;
            xy[idx] = 0.5 * (dedy + dndx);
        }
    }

    StrainFields { xx, yy, xy }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_displacement_gives_zero_strain() {
        let east = vec![3.0; 16];
        let north = vec![-2.0; 16];
        let strain = derive_strain(&east, &north, 4, 4, 1000.0);
        assert!(strain.xx.iter().all(|&v| v == 0.0));
        assert!(strain.yy.iter().all(|&v| v == 0.0));
        assert!(strain.xy.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_linear_east_gradient_gives_constant_exx() {
        // east displacement grows 1 m per column, spacing 1000 m.
        let nlat = 3;
        let nlon = 4;
        let mut east = vec![0.0; nlat * nlon];
        for i in 0..nlat {
            for j in 0..nlon {
                east[i * nlon + j] = j as f64;
            }
        }
        let north = vec![0.0; nlat * nlon];
        let strain = derive_strain(&east, &north, nlat, nlon, 1000.0);
        for i in 1..nlat {
            for j in 1..nlon {
                assert!((strain.xx[i * nlon + j] - 1e-3).abs() < 1e-15);
            }
        }
    }

    #[test]
    fn test_boundaries_stay_zero() {
        let east: Vec<f64> = (0..16).map(|k| k as f64).collect();
        let north: Vec<f64> = (0..16).map(|k| (k * k) as f64).collect();
        let strain = derive_strain(&east, &north, 4, 4, 500.0);
        for j in 0..4 {
            assert_eq!(strain.xx[j], 0.0); // first row
        }
        for i in 0..4 {
            assert_eq!(strain.yy[i * 4], 0.0); // first column
        }
    }

    #[test]
    fn test_second_invariant_non_negative() {
        let samples = [
            StrainTensor { exx: 1e-6, eyy: -2e-6, exy: 0.5e-6 },
            StrainTensor { exx: -1e-6, eyy: -1e-6, exy: -3e-6 },
            StrainTensor { exx: 0.0, eyy: 0.0, exy: 0.0 },
        ];
        for s in samples {
            assert!(s.second_invariant() >= 0.0);
        }
    }

    #[test]
    fn test_derived_quantities() {
        let s = StrainTensor { exx: 4e-6, eyy: -2e-6, exy: 4e-6 };
        assert!((s.dilatation() - 2e-6).abs() < 1e-18);
        // Mohr radius: sqrt((3e-6)^2 + (4e-6)^2) = 5e-6.
        assert!((s.max_shear() - 5e-6).abs() < 1e-16);
    }
}
