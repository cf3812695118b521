//! Simulation orchestration: experiment configuration, the run loop,
//! and the dense result fields.
//!
//! A run validates its configuration eagerly, checks the memory ceiling
//! before allocating anything, then walks the time steps serially —
//! each step's fields are computed in parallel, and cancellation and
//! deadline are checked at every step boundary.

use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::earth::{EarthModel, EarthParams};
use crate::error::{ConfigError, SimulationError};
use crate::grid::{linspace, RegionSpec, SpatialGrid};
use crate::load::{parse_load_points, LoadPoint, LoadSpec};
use crate::response::{disk_step, irregular_step, DistanceField, ResponseParams, StepFields};
use crate::strain::{derive_strain, StrainTensor};

/// A fully specified simulation request. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Experiment name, also the cache key.
    pub name: String,
    /// Surface load being applied.
    pub load: LoadSpec,
    /// Earth-response model tag.
    pub earth_model: EarthModel,
    /// Crustal property parameters carried into the descriptor.
    pub earth: EarthParams,
    /// Number of time steps (at least 2).
    pub time_steps: u32,
    /// Total simulated duration in years.
    pub duration_years: f64,
    /// Simulation region; the load is centered on its center.
    pub region: RegionSpec,
    /// Output file name recorded in the descriptor.
    pub output_file: String,
}

impl ExperimentConfig {
    /// Creates a configuration with CrusDe-style defaults: elastic earth
    /// model, 20 time steps over 100 years.
    pub fn new(name: impl Into<String>, load: LoadSpec, region: RegionSpec) -> Self {
        let name = name.into();
        let output_file = format!("{name}_results.nc");
        Self {
            name,
            load,
            earth_model: EarthModel::default(),
            earth: EarthParams::default(),
            time_steps: 20,
            duration_years: 100.0,
            region,
            output_file,
        }
    }

    /// Validates every field, fast-failing before any allocation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.time_steps < 2 {
            return Err(ConfigError::TooFewTimeSteps(self.time_steps));
        }
        if self.duration_years <= 0.0 {
            return Err(ConfigError::NonPositiveDuration(self.duration_years));
        }
        self.region.validate()?;
        self.load.validate()
    }
}

/// A dense scalar field indexed `[time, lat_index, lon_index]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field3 {
    data: Vec<f64>,
    steps: usize,
    nlat: usize,
    nlon: usize,
}

impl Field3 {
    fn zeros(steps: usize, nlat: usize, nlon: usize) -> Self {
        Self {
            data: vec![0.0; steps * nlat * nlon],
            steps,
            nlat,
            nlon,
        }
    }

    /// Shape as `(steps, nlat, nlon)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.steps, self.nlat, self.nlon)
    }

    /// Value at `(t, i, j)`.
    pub fn get(&self, t: usize, i: usize, j: usize) -> f64 {
        self.data[(t * self.nlat + i) * self.nlon + j]
    }

    /// The flattened `(nlat, nlon)` slab of one time step.
    pub fn step(&self, t: usize) -> &[f64] {
        let n = self.nlat * self.nlon;
        &self.data[t * n..(t + 1) * n]
    }

    fn step_mut(&mut self, t: usize) -> &mut [f64] {
        let n = self.nlat * self.nlon;
        &mut self.data[t * n..(t + 1) * n]
    }
}

/// Scalar quantity that can be extracted from a result as a time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultField {
    /// Vertical displacement in meters.
    Vertical,
    /// Magnitude of the horizontal displacement in meters.
    Horizontal,
    /// Strain second invariant, dimensionless.
    StrainMagnitude,
}

/// Output of one simulation run. Immutable once produced; consumed
/// read-only by the risk evaluator and the visualization layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Experiment name this result belongs to.
    pub name: String,
    /// Time of each step in years, length T.
    pub times: Vec<f64>,
    /// Latitude samples, length Nlat.
    pub lats: Vec<f64>,
    /// Longitude samples, length Nlon.
    pub lons: Vec<f64>,
    /// Vertical displacement (m), shape (T, Nlat, Nlon).
    pub vertical: Field3,
    /// Eastward horizontal displacement (m).
    pub horizontal_east: Field3,
    /// Northward horizontal displacement (m).
    pub horizontal_north: Field3,
    /// Strain xx component.
    pub strain_xx: Field3,
    /// Strain yy component.
    pub strain_yy: Field3,
    /// Strain xy component.
    pub strain_xy: Field3,
    /// Copy of the originating configuration.
    pub parameters: ExperimentConfig,
}

impl SimulationResult {
    /// Number of time steps.
    pub fn steps(&self) -> usize {
        self.times.len()
    }

    /// Index of the grid point nearest to `(lat, lon)`.
    pub fn nearest_index(&self, lat: f64, lon: f64) -> (usize, usize) {
        (
            crate::grid::nearest(&self.lats, lat),
            crate::grid::nearest(&self.lons, lon),
        )
    }

    /// Strain tensor at one sample.
    pub fn strain_at(&self, t: usize, i: usize, j: usize) -> StrainTensor {
        StrainTensor {
            exx: self.strain_xx.get(t, i, j),
            eyy: self.strain_yy.get(t, i, j),
            exy: self.strain_xy.get(t, i, j),
        }
    }

    /// Horizontal displacement magnitude at one sample.
    pub fn horizontal_at(&self, t: usize, i: usize, j: usize) -> f64 {
        let he = self.horizontal_east.get(t, i, j);
        let hn = self.horizontal_north.get(t, i, j);
        (he * he + hn * hn).sqrt()
    }

    /// Per-step values of `field` at the grid point nearest `(lat, lon)`.
    pub fn time_series(&self, lat: f64, lon: f64, field: ResultField) -> Vec<f64> {
        let (i, j) = self.nearest_index(lat, lon);
        (0..self.steps())
            .map(|t| match field {
                ResultField::Vertical => self.vertical.get(t, i, j),
                ResultField::Horizontal => self.horizontal_at(t, i, j),
                ResultField::StrainMagnitude => self.strain_at(t, i, j).second_invariant(),
            })
            .collect()
    }
}

/// Ceiling on result size, checked before any field allocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum `time_steps * lat_steps * lon_steps` product per field.
    pub max_field_cells: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        // Six f64 fields of this size stay under ~1 GiB.
        Self {
            max_field_cells: 20_000_000,
        }
    }
}

/// Cooperative cancellation handle, checked at time-step boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of the run holding this token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// True once `cancel` has been called.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Optional knobs for one run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Response constants; defaults match the reference tool emulation.
    pub response: ResponseParams,
    /// Memory ceiling.
    pub limits: ResourceLimits,
    /// Cooperative cancellation token.
    pub cancel: Option<CancelToken>,
    /// Hard deadline for the whole run.
    pub deadline: Option<Instant>,
    /// Irregular footprint points, overriding the load's source file
    /// (useful for callers that already hold the point list).
    pub points: Option<Vec<LoadPoint>>,
}

enum Footprint {
    Disk { field: DistanceField, radius_m: f64 },
    Irregular { points: Vec<LoadPoint>, point_radius_m: f64 },
}

/// Runs one simulation to completion.
pub fn run_simulation(
    config: &ExperimentConfig,
    options: &RunOptions,
) -> Result<SimulationResult, SimulationError> {
    config.validate()?;
    guard_divisions(config)?;

    // The ceiling applies before any axis or field allocation; overflow
    // of the cell product counts as exceeding it.
    let steps = config.time_steps as usize;
    let (nlat, nlon) = config.region.steps();
    let requested = steps
        .checked_mul(nlat)
        .and_then(|cells| cells.checked_mul(nlon))
        .unwrap_or(usize::MAX);
    if requested > options.limits.max_field_cells {
        return Err(SimulationError::ResourceExhausted {
            requested,
            ceiling: options.limits.max_field_cells,
        });
    }

    let grid = SpatialGrid::from_region(&config.region)?;

    let footprint = resolve_footprint(config, options, &grid)?;
    let pressure = config.load.pressure_pa(options.response.gravity);
    let times = linspace(0.0, config.duration_years, steps);

    let mut vertical = Field3::zeros(steps, nlat, nlon);
    let mut east = Field3::zeros(steps, nlat, nlon);
    let mut north = Field3::zeros(steps, nlat, nlon);
    let mut strain_xx = Field3::zeros(steps, nlat, nlon);
    let mut strain_yy = Field3::zeros(steps, nlat, nlon);
    let mut strain_xy = Field3::zeros(steps, nlat, nlon);

    info!(
        "running '{}': {} steps over {} x {} grid ({} load, {} model)",
        config.name,
        steps,
        nlat,
        nlon,
        config.load.kind.name(),
        config.earth_model.name()
    );
    let started = Instant::now();

    for t in 0..steps {
        if let Some(token) = &options.cancel {
            if token.is_cancelled() {
                return Err(SimulationError::Cancelled { step: t });
            }
        }
        if let Some(deadline) = options.deadline {
            if Instant::now() >= deadline {
                return Err(SimulationError::DeadlineExceeded { step: t });
            }
        }

        let factor = config
            .load
            .temporal_law
            .time_factor(t, steps, config.duration_years);

        let fields: StepFields = match &footprint {
            Footprint::Disk { field, radius_m } => {
                disk_step(field, *radius_m, pressure * factor, &options.response)
            }
            Footprint::Irregular {
                points,
                point_radius_m,
            } => irregular_step(
                &grid,
                points,
                config.load.density_kg_m3,
                *point_radius_m,
                factor,
                &options.response,
            ),
        };

        let strain = derive_strain(&fields.east, &fields.north, nlat, nlon, grid.spacing_m);

        vertical.step_mut(t).copy_from_slice(&fields.vertical);
        east.step_mut(t).copy_from_slice(&fields.east);
        north.step_mut(t).copy_from_slice(&fields.north);
        strain_xx.step_mut(t).copy_from_slice(&strain.xx);
        strain_yy.step_mut(t).copy_from_slice(&strain.yy);
        strain_xy.step_mut(t).copy_from_slice(&strain.xy);
    }

    debug!(
        "'{}' finished in {:.2?}",
        config.name,
        started.elapsed()
    );

    Ok(SimulationResult {
        name: config.name.clone(),
        times,
        lats: grid.lats,
        lons: grid.lons,
        vertical,
        horizontal_east: east,
        horizontal_north: north,
        strain_xx,
        strain_yy,
        strain_xy,
        parameters: config.clone(),
    })
}

/// Rejects configurations that would divide by zero in the response or
/// temporal-law formulas.
fn guard_divisions(config: &ExperimentConfig) -> Result<(), SimulationError> {
    if !config.load.kind.is_irregular() && config.load.radius_m <= 0.0 {
        return Err(SimulationError::NumericalGuard(format!(
            "disk radius_m must be positive, got {}",
            config.load.radius_m
        )));
    }
    if let Some(reason) = config.load.temporal_law.division_guard() {
        return Err(SimulationError::NumericalGuard(reason));
    }
    Ok(())
}

fn resolve_footprint(
    config: &ExperimentConfig,
    options: &RunOptions,
    grid: &SpatialGrid,
) -> Result<Footprint, SimulationError> {
    if config.load.kind.is_irregular() {
        let points = match &options.points {
            Some(points) => points.clone(),
            None => {
                // validate() guarantees the file reference exists.
                let path = config.load.source_file.as_deref().unwrap_or_default();
                let reader = BufReader::new(File::open(path)?);
                parse_load_points(reader)?
            }
        };
        if points.is_empty() {
            return Err(SimulationError::NumericalGuard(
                "irregular load point list is empty".to_string(),
            ));
        }
        Ok(Footprint::Irregular {
            points,
            point_radius_m: grid.spacing_m / 2.0,
        })
    } else {
        Ok(Footprint::Disk {
            field: DistanceField::from_grid(
                grid,
                config.region.center_lat,
                config.region.center_lon,
            ),
            radius_m: config.load.radius_m,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::TemporalLaw;

    fn region(width_km: f64, height_km: f64, resolution_km: f64) -> RegionSpec {
        RegionSpec {
            center_lat: 0.0,
            center_lon: 0.0,
            width_km,
            height_km,
            resolution_km,
        }
    }

    fn disk_config() -> ExperimentConfig {
        let mut config = ExperimentConfig::new(
            "glacier-test",
            LoadSpec::disk(10_000.0, 100.0, 1000.0),
            region(100.0, 100.0, 10.0),
        );
        config.time_steps = 5;
        config
    }

    #[test]
    fn test_end_to_end_scenario_shapes_and_pressure() {
        let result = run_simulation(&disk_config(), &RunOptions::default()).unwrap();
        assert_eq!(result.lats.len(), 10);
        assert_eq!(result.lons.len(), 10);
        assert_eq!(result.vertical.shape(), (5, 10, 10));
        assert_eq!(result.strain_xy.shape(), (5, 10, 10));
        assert!((disk_config().load.pressure_pa(9.81) - 981_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_center_displacement_matches_closed_form() {
        // 110 km at 10 km resolution gives 11 samples, so the exact
        // region center is on the grid and sits at distance zero.
        let mut config = ExperimentConfig::new(
            "center-test",
            LoadSpec::disk(10_000.0, 100.0, 1000.0),
            region(110.0, 110.0, 10.0),
        );
        config.time_steps = 2;
        let result = run_simulation(&config, &RunOptions::default()).unwrap();

        let (i, j) = result.nearest_index(0.0, 0.0);
        assert!(result.lats[i].abs() < 1e-12);
        assert!(result.lons[j].abs() < 1e-12);
        // -P * K1 * (1 - 0.5 * 0^2) with P = 981000, K1 = 1e-7.
        let expected = -981_000.0 * 1e-7;
        assert!((result.vertical.get(0, i, j) - expected).abs() < 1e-12);
        // Horizontal components vanish exactly at the load center.
        assert_eq!(result.horizontal_east.get(0, i, j), 0.0);
        assert_eq!(result.horizontal_north.get(0, i, j), 0.0);
    }

    #[test]
    fn test_glacier_melt_unloads_to_zero() {
        let mut config = ExperimentConfig::new(
            "melt",
            LoadSpec::glacier_melt(10_000.0, 500.0, 0.1),
            region(100.0, 100.0, 10.0),
        );
        config.time_steps = 5;
        let result = run_simulation(&config, &RunOptions::default()).unwrap();
        let series = result.time_series(0.0, 0.0, ResultField::Vertical);
        assert!(series[0] < 0.0, "full load subsides at step 0");
        assert_eq!(series[4], 0.0, "fully unloaded at the final step");
    }

    #[test]
    fn test_strain_magnitude_non_negative_everywhere() {
        let result = run_simulation(&disk_config(), &RunOptions::default()).unwrap();
        let (steps, nlat, nlon) = result.vertical.shape();
        for t in 0..steps {
            for i in 0..nlat {
                for j in 0..nlon {
                    assert!(result.strain_at(t, i, j).second_invariant() >= 0.0);
                }
            }
        }
    }

    #[test]
    fn test_resource_ceiling_rejected_before_allocation() {
        let options = RunOptions {
            limits: ResourceLimits { max_field_cells: 10 },
            ..Default::default()
        };
        assert!(matches!(
            run_simulation(&disk_config(), &options),
            Err(SimulationError::ResourceExhausted { requested: 500, ceiling: 10 })
        ));
    }

    #[test]
    fn test_oversized_region_rejected_before_grid_allocation() {
        let mut config = disk_config();
        config.region.width_km = 1e300;
        config.region.height_km = 1e300;
        config.region.resolution_km = 1e-5;
        assert!(matches!(
            run_simulation(&config, &RunOptions::default()),
            Err(SimulationError::ResourceExhausted { .. })
        ));
    }

    #[test]
    fn test_cancellation_at_step_boundary() {
        let token = CancelToken::new();
        token.cancel();
        let options = RunOptions {
            cancel: Some(token),
            ..Default::default()
        };
        assert!(matches!(
            run_simulation(&disk_config(), &options),
            Err(SimulationError::Cancelled { step: 0 })
        ));
    }

    #[test]
    fn test_zero_radius_disk_trips_numerical_guard() {
        let mut config = disk_config();
        config.load.radius_m = 0.0;
        assert!(matches!(
            run_simulation(&config, &RunOptions::default()),
            Err(SimulationError::NumericalGuard(_))
        ));
    }

    #[test]
    fn test_invalid_region_rejected_eagerly() {
        let mut config = disk_config();
        config.region.resolution_km = -1.0;
        assert!(matches!(
            run_simulation(&config, &RunOptions::default()),
            Err(SimulationError::Config(ConfigError::NonPositiveRegionField { .. }))
        ));
    }

    #[test]
    fn test_irregular_load_from_injected_points() {
        let mut config = ExperimentConfig::new(
            "coastline",
            LoadSpec::sea_level_rise("coastline.txt", 0.0, 1.0),
            region(100.0, 100.0, 10.0),
        );
        config.time_steps = 3;
        let options = RunOptions {
            points: Some(vec![
                LoadPoint { lat: 0.2, lon: 0.2, height_m: 1.0 },
                LoadPoint { lat: -0.2, lon: 0.1, height_m: 1.0 },
            ]),
            ..Default::default()
        };
        let result = run_simulation(&config, &options).unwrap();
        // Ramp from zero: no load at step 0, full load at the last step.
        let series = result.time_series(0.2, 0.2, ResultField::Vertical);
        assert_eq!(series[0], 0.0);
        assert!(series[2] < 0.0);
    }

    #[test]
    fn test_step_law_applies_load_instantaneously() {
        let mut config = ExperimentConfig::new(
            "eruption",
            LoadSpec::lava_flow(5_000.0, 50.0, 50.0),
            region(100.0, 100.0, 10.0),
        );
        config.time_steps = 5;
        config.duration_years = 100.0;
        let result = run_simulation(&config, &RunOptions::default()).unwrap();
        let series = result.time_series(0.0, 0.0, ResultField::Vertical);
        // Steps at 0, 25, 50, 75, 100 years; eruption at year 50.
        assert_eq!(series[0], 0.0);
        assert_eq!(series[1], 0.0);
        assert!(series[2] < 0.0);
        assert!((series[2] - series[4]).abs() < 1e-15);
    }
}
