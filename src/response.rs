//! Elastic response engine: displacement fields under a surface load.
//!
//! For a disk load of radius R and scaled pressure p at planar distance
//! d from the load center:
//!
//! - inside the footprint (d <= R): `w = -p K1 (1 - 0.5 (d/R)^2)`
//! - outside (d > R): `w = -p K1 (R/d)^2`
//! - horizontal, for d > 0: radially outward, `|h| = p K2`, split into
//!   east/north by the offset components; zero exactly at d = 0.
//!
//! K1 and K2 are empirical compliance constants standing in for a
//! calibrated Green's-function solution; they are carried in
//! [`ResponseParams`] so they can be overridden against real deformation
//! data. Distances use the equirectangular approximation (111 km per
//! degree, longitude scaled by cos of the load-center latitude).

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::grid::{SpatialGrid, METERS_PER_DEGREE};
use crate::load::LoadPoint;

/// Empirical scale constants of the simplified response formula.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponseParams {
    /// Vertical compliance in m/Pa.
    pub k1: f64,
    /// Horizontal compliance in m/Pa.
    pub k2: f64,
    /// Gravitational acceleration in m/s^2.
    pub gravity: f64,
}

impl Default for ResponseParams {
    fn default() -> Self {
        Self {
            k1: 1e-7,
            k2: 1e-8,
            gravity: 9.81,
        }
    }
}

/// Per-cell planar offsets from a load center, precomputed once per run
/// and rescaled by the time factor at every step.
#[derive(Debug, Clone)]
pub struct DistanceField {
    /// Signed eastward offset in meters, per cell.
    pub east_m: Vec<f64>,
    /// Signed northward offset in meters, per cell.
    pub north_m: Vec<f64>,
    /// Euclidean planar distance in meters, per cell.
    pub dist_m: Vec<f64>,
}

impl DistanceField {
    /// Computes offsets of every grid point from `(center_lat, center_lon)`.
    pub fn from_grid(grid: &SpatialGrid, center_lat: f64, center_lon: f64) -> Self {
        let cos_lat = center_lat.to_radians().cos();
        let cells = grid.cells();
        let mut east_m = Vec::with_capacity(cells);
        let mut north_m = Vec::with_capacity(cells);
        let mut dist_m = Vec::with_capacity(cells);
        for &lat in &grid.lats {
            let north = (lat - center_lat) * METERS_PER_DEGREE;
            for &lon in &grid.lons {
                let east = (lon - center_lon) * METERS_PER_DEGREE * cos_lat;
                east_m.push(east);
                north_m.push(north);
                dist_m.push((east * east + north * north).sqrt());
            }
        }
        Self {
            east_m,
            north_m,
            dist_m,
        }
    }

    /// Number of cells covered.
    pub fn cells(&self) -> usize {
        self.dist_m.len()
    }
}

/// Displacement fields of a single time step, flattened row-major.
#[derive(Debug, Clone)]
pub struct StepFields {
    /// Vertical displacement in meters (negative is subsidence).
    pub vertical: Vec<f64>,
    /// Eastward horizontal displacement in meters.
    pub east: Vec<f64>,
    /// Northward horizontal displacement in meters.
    pub north: Vec<f64>,
}

impl StepFields {
    fn zeros(cells: usize) -> Self {
        Self {
            vertical: vec![0.0; cells],
            east: vec![0.0; cells],
            north: vec![0.0; cells],
        }
    }
}

fn vertical_at(dist: f64, radius_m: f64, scaled_pressure: f64, k1: f64) -> f64 {
    if dist <= radius_m {
        let edge = dist / radius_m;
        -scaled_pressure * k1 * (1.0 - 0.5 * edge * edge)
    } else {
        let decay = radius_m / dist;
        -scaled_pressure * k1 * decay * decay
    }
}

/// Displacement fields for one time step of a disk load.
///
/// `scaled_pressure` is the static pressure already multiplied by the
/// step's time factor.
pub fn disk_step(
    field: &DistanceField,
    radius_m: f64,
    scaled_pressure: f64,
    params: &ResponseParams,
) -> StepFields {
    let vertical: Vec<f64> = field
        .dist_m
        .par_iter()
        .map(|&d| vertical_at(d, radius_m, scaled_pressure, params.k1))
        .collect();

    let (east, north): (Vec<f64>, Vec<f64>) = field
        .dist_m
        .par_iter()
        .zip(field.east_m.par_iter().zip(field.north_m.par_iter()))
        .map(|(&d, (&e, &n))| {
            if d > 0.0 {
                let h = scaled_pressure * params.k2 / d;
                (h * e, h * n)
            } else {
                (0.0, 0.0)
            }
        })
        .unzip();

    StepFields {
        vertical,
        east,
        north,
    }
}

/// Displacement fields for one time step of an irregular load, realized
/// as a superposition of one small disk per footprint point.
///
/// Each point contributes with its own local pressure
/// `height_m * density * g * time_factor`; `point_radius_m` is the
/// footprint radius assigned to every point (typically half the grid
/// spacing).
pub fn irregular_step(
    grid: &SpatialGrid,
    points: &[LoadPoint],
    density_kg_m3: f64,
    point_radius_m: f64,
    time_factor: f64,
    params: &ResponseParams,
) -> StepFields {
    let mut total = StepFields::zeros(grid.cells());
    for point in points {
        let pressure = point.height_m * density_kg_m3 * params.gravity * time_factor;
        let field = DistanceField::from_grid(grid, point.lat, point.lon);
        let part = disk_step(&field, point_radius_m, pressure, params);
        for i in 0..total.vertical.len() {
            total.vertical[i] += part.vertical[i];
            total.east[i] += part.east[i];
            total.north[i] += part.north[i];
        }
    }
    total
}
