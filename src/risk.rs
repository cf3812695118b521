//! Volcanic risk impact derived from a simulation result.
//!
//! Samples the displacement and strain fields at the grid point nearest
//! a target (typically a volcano) and combines them into a composite
//! risk index. The scaling constants and weights have no cited physical
//! derivation; they live in [`RiskParams`] so they can be recalibrated
//! against real deformation data.

use serde::{Deserialize, Serialize};

use crate::simulation::SimulationResult;

/// Scaling constants and weights of the composite risk index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskParams {
    /// Multiplier turning vertical displacement into a pressure-change
    /// proxy.
    pub pressure_scale: f64,
    /// Multiplier turning strain magnitude into a stability-impact
    /// proxy.
    pub stability_scale: f64,
    /// Multiplier turning the dilation rate into a pathway-dilation
    /// proxy.
    pub dilation_scale: f64,
    /// Weight of the pressure-change term.
    pub weight_pressure: f64,
    /// Weight of the stability-impact term.
    pub weight_stability: f64,
    /// Weight of the pathway-dilation term.
    pub weight_dilation: f64,
    /// Risk index above which the level is High.
    pub high_threshold: f64,
    /// Risk index above which the level is Medium.
    pub medium_threshold: f64,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            pressure_scale: 1e6,
            stability_scale: 1e9,
            dilation_scale: 1e6,
            weight_pressure: 0.4,
            weight_stability: 0.3,
            weight_dilation: 0.3,
            high_threshold: 10.0,
            medium_threshold: 5.0,
        }
    }
}

/// Categorical risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Index at or below the medium threshold.
    Low,
    /// Index above the medium threshold, at or below the high threshold.
    Medium,
    /// Index above the high threshold.
    High,
}

impl RiskLevel {
    /// Classifies a risk index against the configured thresholds.
    pub fn classify(risk_index: f64, params: &RiskParams) -> Self {
        if risk_index > params.high_threshold {
            RiskLevel::High
        } else if risk_index > params.medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

/// Snapshot of deformation-driven risk factors at one target and time.
///
/// Ephemeral: recomputed on demand from a [`SimulationResult`], never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskImpact {
    /// Vertical displacement at the target in meters.
    pub vertical_disp: f64,
    /// Horizontal displacement magnitude at the target in meters.
    pub horizontal_disp: f64,
    /// Strain second invariant at the target, in microstrain.
    pub strain_magnitude: f64,
    /// Magma chamber pressure-change proxy (scaled arbitrary units).
    pub pressure_change: f64,
    /// Edifice stability-impact proxy (scaled arbitrary units).
    pub stability_impact: f64,
    /// Magma pathway-dilation proxy (scaled arbitrary units).
    pub pathway_dilation: f64,
    /// Weighted composite index.
    pub risk_index: f64,
    /// Categorical level of `risk_index`.
    pub risk_level: RiskLevel,
}

/// Evaluates the risk impact at `(lat, lon)` for one time step.
///
/// `time_index` defaults to the final step and is clamped to it when it
/// points past the end of the run. The nearest grid point is used
/// directly; no interpolation is performed.
pub fn evaluate_risk(
    result: &SimulationResult,
    lat: f64,
    lon: f64,
    time_index: Option<usize>,
    params: &RiskParams,
) -> RiskImpact {
    let last = result.steps() - 1;
    let t = time_index.unwrap_or(last).min(last);
    let (i, j) = result.nearest_index(lat, lon);

    let vertical_disp = result.vertical.get(t, i, j);
    let horizontal_disp = result.horizontal_at(t, i, j);
    let strain_mag = result.strain_at(t, i, j).second_invariant();
    let dilation_rate = dilation_rate(result, t, i, j);

    let pressure_change = -vertical_disp * params.pressure_scale;
    let stability_impact = strain_mag * params.stability_scale;
    let pathway_dilation = dilation_rate * params.dilation_scale;

    let risk_index = params.weight_pressure * pressure_change.abs()
        + params.weight_stability * stability_impact
        + params.weight_dilation * pathway_dilation;

    RiskImpact {
        vertical_disp,
        horizontal_disp,
        strain_magnitude: strain_mag * 1e6,
        pressure_change,
        stability_impact,
        pathway_dilation,
        risk_index,
        risk_level: RiskLevel::classify(risk_index, params),
    }
}

/// Sum of absolute central differences of vertical displacement along
/// both grid axes. Zero at grid boundaries, where a neighbor is missing.
fn dilation_rate(result: &SimulationResult, t: usize, i: usize, j: usize) -> f64 {
    let nlat = result.lats.len();
    let nlon = result.lons.len();
    if i == 0 || i + 1 >= nlat || j == 0 || j + 1 >= nlon {
        return 0.0;
    }
    let dvdx = (result.vertical.get(t, i, j + 1) - result.vertical.get(t, i, j - 1)) / 2.0;
    let dvdy = (result.vertical.get(t, i + 1, j) - result.vertical.get(t, i - 1, j)) / 2.0;
    dvdx.abs() + dvdy.abs()
}
