//! Region specification and spatial grid generation.
//!
//! Kilometer extents are converted to degree extents with the standard
//! equirectangular approximation: 1 degree of latitude spans ~111 km, and
//! a degree of longitude shrinks by cos(latitude) toward the poles.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Meters per degree of latitude in the equirectangular approximation.
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// Rectangular simulation region centered on a geographic point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionSpec {
    /// Center latitude in degrees.
    pub center_lat: f64,
    /// Center longitude in degrees.
    pub center_lon: f64,
    /// East-west extent in kilometers.
    pub width_km: f64,
    /// North-south extent in kilometers.
    pub height_km: f64,
    /// Grid spacing in kilometers.
    pub resolution_km: f64,
}

impl RegionSpec {
    /// Validates the region before any grid allocation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("width_km", self.width_km),
            ("height_km", self.height_km),
            ("resolution_km", self.resolution_km),
        ] {
            if value <= 0.0 {
                return Err(ConfigError::NonPositiveRegionField { field, value });
            }
        }
        if self.resolution_km >= self.width_km || self.resolution_km >= self.height_km {
            return Err(ConfigError::ResolutionExceedsExtent {
                resolution_km: self.resolution_km,
                width_km: self.width_km,
                height_km: self.height_km,
            });
        }
        Ok(())
    }

    /// Step counts `(lat_steps, lon_steps)` this region produces, without
    /// allocating anything. Lets callers apply size ceilings first.
    pub fn steps(&self) -> (usize, usize) {
        (
            axis_steps(self.height_km, self.resolution_km),
            axis_steps(self.width_km, self.resolution_km),
        )
    }
}

fn axis_steps(extent_km: f64, resolution_km: f64) -> usize {
    ((extent_km / resolution_km).round() as usize).max(2)
}

/// Evenly spaced latitude/longitude lattice derived from a [`RegionSpec`].
///
/// Rebuilt fresh for every experiment and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialGrid {
    /// Latitude samples, south to north, length `lat_steps`.
    pub lats: Vec<f64>,
    /// Longitude samples, west to east, length `lon_steps`.
    pub lons: Vec<f64>,
    /// Grid spacing in meters (`resolution_km * 1000`).
    pub spacing_m: f64,
}

impl SpatialGrid {
    /// Builds the lattice for a region, validating it first.
    ///
    /// Step counts are `max(2, round(extent_km / resolution_km))` so a
    /// degenerate one-row grid can never be produced.
    pub fn from_region(region: &RegionSpec) -> Result<Self, ConfigError> {
        region.validate()?;

        let (lat_steps, lon_steps) = region.steps();

        let lat_half_deg = (region.height_km / 2.0) / 111.0;
        let lon_half_deg =
            (region.width_km / 2.0) / (111.0 * region.center_lat.to_radians().cos());

        Ok(Self {
            lats: linspace(
                region.center_lat - lat_half_deg,
                region.center_lat + lat_half_deg,
                lat_steps,
            ),
            lons: linspace(
                region.center_lon - lon_half_deg,
                region.center_lon + lon_half_deg,
                lon_steps,
            ),
            spacing_m: region.resolution_km * 1000.0,
        })
    }

    /// Number of latitude rows.
    pub fn lat_steps(&self) -> usize {
        self.lats.len()
    }

    /// Number of longitude columns.
    pub fn lon_steps(&self) -> usize {
        self.lons.len()
    }

    /// Total number of grid points.
    pub fn cells(&self) -> usize {
        self.lats.len() * self.lons.len()
    }

    /// Coordinates of the point at (lat row, lon column).
    pub fn point(&self, i: usize, j: usize) -> (f64, f64) {
        (self.lats[i], self.lons[j])
    }

    /// Flattened meshgrid in row-major order: `(lat_grid, lon_grid)`,
    /// each of length `cells()`, indexed `i * lon_steps + j`.
    pub fn mesh(&self) -> (Vec<f64>, Vec<f64>) {
        let mut lat_grid = Vec::with_capacity(self.cells());
        let mut lon_grid = Vec::with_capacity(self.cells());
        for &lat in &self.lats {
            for &lon in &self.lons {
                lat_grid.push(lat);
                lon_grid.push(lon);
            }
        }
        (lat_grid, lon_grid)
    }

    /// Index of the grid point nearest to `(lat, lon)` by minimum
    /// absolute coordinate difference on each axis independently.
    pub fn nearest_index(&self, lat: f64, lon: f64) -> (usize, usize) {
        (nearest(&self.lats, lat), nearest(&self.lons, lon))
    }
}

pub(crate) fn nearest(axis: &[f64], target: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (k, &v) in axis.iter().enumerate() {
        let d = (v - target).abs();
        if d < best_dist {
            best_dist = d;
            best = k;
        }
    }
    best
}

/// `n` evenly spaced values spanning `[start, end]` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    debug_assert!(n >= 2);
    let step = (end - start) / (n - 1) as f64;
    (0..n).map(|k| start + step * k as f64).collect()
}
