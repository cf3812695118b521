//! Surface load specification: footprint parameters and temporal laws.
//!
//! A load is a spatial footprint (uniform disk, or an irregular set of
//! points) combined with a temporal law scaling its intensity over the
//! run. The canonical scenarios map onto those pairs: a melting glacier
//! is a disk that unloads linearly, sea-level rise is an irregular
//! coastline footprint ramping up, a lava flow is a disk applied as a
//! step.

use std::io::BufRead;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Density of glacial ice in kg/m^3.
pub const ICE_DENSITY: f64 = 900.0;
/// Density of sea water in kg/m^3.
pub const WATER_DENSITY: f64 = 1000.0;
/// Typical density of emplaced lava in kg/m^3.
pub const LAVA_DENSITY: f64 = 2700.0;

/// The kind of surface load being simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadKind {
    /// Circular uniform-thickness load with constant intensity.
    Disk,
    /// Arbitrary footprint given as a point list, constant intensity.
    Irregular,
    /// Disk load unloading linearly over the run.
    GlacierMelt,
    /// Irregular footprint ramping up linearly over the run.
    SeaLevel,
    /// Disk load applied instantaneously at an eruption time.
    LavaFlow,
}

impl LoadKind {
    /// Canonical lower-snake name, as used in requests and logs.
    pub fn name(&self) -> &'static str {
        match self {
            LoadKind::Disk => "disk",
            LoadKind::Irregular => "irregular",
            LoadKind::GlacierMelt => "glacier_melt",
            LoadKind::SeaLevel => "sea_level",
            LoadKind::LavaFlow => "lava_flow",
        }
    }

    /// Parses a request string into a kind.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name {
            "disk" => Ok(LoadKind::Disk),
            "irregular" => Ok(LoadKind::Irregular),
            "glacier_melt" => Ok(LoadKind::GlacierMelt),
            "sea_level" => Ok(LoadKind::SeaLevel),
            "lava_flow" => Ok(LoadKind::LavaFlow),
            other => Err(ConfigError::UnknownLoadKind(other.to_string())),
        }
    }

    /// True when the footprint is a point list rather than a disk.
    pub fn is_irregular(&self) -> bool {
        matches!(self, LoadKind::Irregular | LoadKind::SeaLevel)
    }
}

/// Dimensionless multiplier mapping a time step to load intensity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TemporalLaw {
    /// Full load at every step.
    Constant,
    /// Progressive unloading: factor runs from 1 at step 0 to 0 at the
    /// final step. `final_fraction` is carried for descriptor interchange
    /// with the reference tool; the simplified engine always unloads to
    /// zero.
    LinearDecrease { final_fraction: f64 },
    /// Linear ramp from `initial_height_m / final_height_m` at step 0 up
    /// to 1 at the final step. The load's `height_m` is the final height.
    LinearIncrease {
        initial_height_m: f64,
        final_height_m: f64,
    },
    /// Zero before the step time, full load at and after it.
    Step { step_time_years: f64 },
}

impl TemporalLaw {
    /// Multiplier for time step `t` of a run with `steps` steps spanning
    /// `duration_years`. Requires `steps >= 2` (validated upstream).
    pub fn time_factor(&self, t: usize, steps: usize, duration_years: f64) -> f64 {
        let frac = t as f64 / (steps - 1) as f64;
        match *self {
            TemporalLaw::Constant => 1.0,
            TemporalLaw::LinearDecrease { .. } => 1.0 - frac,
            TemporalLaw::LinearIncrease {
                initial_height_m,
                final_height_m,
            } => {
                let f0 = initial_height_m / final_height_m;
                f0 + (1.0 - f0) * frac
            }
            TemporalLaw::Step { step_time_years } => {
                if frac * duration_years >= step_time_years {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Names the division-by-zero hazard in this law, if any. The
    /// linear-increase ramp divides by the final height.
    pub fn division_guard(&self) -> Option<String> {
        match *self {
            TemporalLaw::LinearIncrease { final_height_m, .. } if final_height_m <= 0.0 => Some(
                format!("linear_increase final_height_m must be positive, got {final_height_m}"),
            ),
            _ => None,
        }
    }
}

/// Physical parameters of a surface load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadSpec {
    /// What is being simulated.
    pub kind: LoadKind,
    /// Disk radius in meters (ignored for irregular footprints).
    pub radius_m: f64,
    /// Load thickness in meters. For ramping loads this is the final
    /// height.
    pub height_m: f64,
    /// Load material density in kg/m^3.
    pub density_kg_m3: f64,
    /// Point-list file for irregular footprints.
    pub source_file: Option<String>,
    /// Time evolution of the load intensity.
    pub temporal_law: TemporalLaw,
}

impl LoadSpec {
    /// Plain disk load held constant over the run.
    pub fn disk(radius_m: f64, height_m: f64, density_kg_m3: f64) -> Self {
        Self {
            kind: LoadKind::Disk,
            radius_m,
            height_m,
            density_kg_m3,
            source_file: None,
            temporal_law: TemporalLaw::Constant,
        }
    }

    /// Melting ice cap: disk of ice unloading linearly.
    pub fn glacier_melt(radius_m: f64, initial_height_m: f64, final_fraction: f64) -> Self {
        Self {
            kind: LoadKind::GlacierMelt,
            radius_m,
            height_m: initial_height_m,
            density_kg_m3: ICE_DENSITY,
            source_file: None,
            temporal_law: TemporalLaw::LinearDecrease { final_fraction },
        }
    }

    /// Sea-level rise over an irregular coastline footprint.
    pub fn sea_level_rise(
        coastline_file: impl Into<String>,
        initial_height_m: f64,
        final_height_m: f64,
    ) -> Self {
        Self {
            kind: LoadKind::SeaLevel,
            radius_m: 0.0,
            height_m: final_height_m,
            density_kg_m3: WATER_DENSITY,
            source_file: Some(coastline_file.into()),
            temporal_law: TemporalLaw::LinearIncrease {
                initial_height_m,
                final_height_m,
            },
        }
    }

    /// Lava flow emplaced instantaneously at `eruption_time_years`.
    pub fn lava_flow(radius_m: f64, height_m: f64, eruption_time_years: f64) -> Self {
        Self {
            kind: LoadKind::LavaFlow,
            radius_m,
            height_m,
            density_kg_m3: LAVA_DENSITY,
            source_file: None,
            temporal_law: TemporalLaw::Step {
                step_time_years: eruption_time_years,
            },
        }
    }

    /// Static surface pressure of the full load, `P = h * rho * g`, in Pa.
    pub fn pressure_pa(&self, gravity: f64) -> f64 {
        self.height_m * self.density_kg_m3 * gravity
    }

    /// Validates the physical parameters for the chosen kind.
    ///
    /// Division-by-zero hazards (a zero-radius disk, a zero final ramp
    /// height) are reported separately as numerical guards by the
    /// simulation runner, not here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.height_m <= 0.0 {
            return Err(ConfigError::NonPositiveLoadField {
                field: "height_m",
                value: self.height_m,
            });
        }
        if self.density_kg_m3 <= 0.0 {
            return Err(ConfigError::NonPositiveLoadField {
                field: "density_kg_m3",
                value: self.density_kg_m3,
            });
        }
        if self.kind.is_irregular() && self.source_file.is_none() {
            return Err(ConfigError::MissingLoadFile);
        }
        Ok(())
    }
}

/// One sample of an irregular load footprint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Local load thickness in meters.
    pub height_m: f64,
}

/// Parses a whitespace-separated `lat lon height_m` point list.
///
/// Blank lines and lines starting with `#` are skipped.
pub fn parse_load_points<R: BufRead>(reader: R) -> Result<Vec<LoadPoint>, ConfigError> {
    let mut points = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| ConfigError::MalformedLoadPoint {
            line: idx + 1,
            reason: e.to_string(),
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut fields = trimmed.split_whitespace();
        let mut next_num = |name: &str| -> Result<f64, ConfigError> {
            fields
                .next()
                .ok_or_else(|| ConfigError::MalformedLoadPoint {
                    line: idx + 1,
                    reason: format!("missing {name}"),
                })?
                .parse::<f64>()
                .map_err(|e| ConfigError::MalformedLoadPoint {
                    line: idx + 1,
                    reason: format!("{name}: {e}"),
                })
        };
        points.push(LoadPoint {
            lat: next_num("lat")?,
            lon: next_num("lon")?,
            height_m: next_num("height_m")?,
        });
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_law_is_unity() {
        for t in 0..20 {
            assert_eq!(TemporalLaw::Constant.time_factor(t, 20, 100.0), 1.0);
        }
    }

    #[test]
    fn test_linear_decrease_endpoints() {
        let law = TemporalLaw::LinearDecrease { final_fraction: 0.1 };
        assert_eq!(law.time_factor(0, 20, 100.0), 1.0);
        assert_eq!(law.time_factor(19, 20, 100.0), 0.0);
    }

    #[test]
    fn test_linear_increase_ramps_to_unity() {
        let law = TemporalLaw::LinearIncrease {
            initial_height_m: 0.5,
            final_height_m: 2.0,
        };
        assert!((law.time_factor(0, 11, 100.0) - 0.25).abs() < 1e-12);
        assert!((law.time_factor(10, 11, 100.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_step_law_switches_at_step_time() {
        let law = TemporalLaw::Step { step_time_years: 50.0 };
        // 11 steps over 100 years: step t corresponds to t * 10 years.
        for t in 0..5 {
            assert_eq!(law.time_factor(t, 11, 100.0), 0.0, "step {t}");
        }
        for t in 5..11 {
            assert_eq!(law.time_factor(t, 11, 100.0), 1.0, "step {t}");
        }
    }

    #[test]
    fn test_disk_pressure() {
        let load = LoadSpec::disk(10_000.0, 100.0, 1000.0);
        assert!((load.pressure_pa(9.81) - 981_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_glacier_preset_uses_ice_density() {
        let load = LoadSpec::glacier_melt(10_000.0, 500.0, 0.1);
        assert_eq!(load.density_kg_m3, ICE_DENSITY);
        assert!(matches!(load.temporal_law, TemporalLaw::LinearDecrease { .. }));
        assert!(load.validate().is_ok());
    }

    #[test]
    fn test_zero_ramp_height_names_division_guard() {
        let law = TemporalLaw::LinearIncrease {
            initial_height_m: 0.0,
            final_height_m: 0.0,
        };
        assert!(law.division_guard().is_some());
        assert!(TemporalLaw::Constant.division_guard().is_none());
    }

    #[test]
    fn test_irregular_without_file_rejected() {
        let load = LoadSpec {
            kind: LoadKind::Irregular,
            radius_m: 0.0,
            height_m: 1.0,
            density_kg_m3: 1000.0,
            source_file: None,
            temporal_law: TemporalLaw::Constant,
        };
        assert!(matches!(load.validate(), Err(ConfigError::MissingLoadFile)));
    }

    #[test]
    fn test_parse_load_points() {
        let input = "# lat lon height\n63.6 -19.1 120.0\n\n63.7 -19.2 80.0\n";
        let points = parse_load_points(input.as_bytes()).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].height_m, 120.0);
        assert_eq!(points[1].lat, 63.7);
    }

    #[test]
    fn test_parse_load_points_rejects_garbage() {
        let err = parse_load_points("63.6 east 120.0\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedLoadPoint { line: 1, .. }));
    }

    #[test]
    fn test_kind_name_round_trip() {
        for kind in [
            LoadKind::Disk,
            LoadKind::Irregular,
            LoadKind::GlacierMelt,
            LoadKind::SeaLevel,
            LoadKind::LavaFlow,
        ] {
            assert_eq!(LoadKind::parse(kind.name()).unwrap(), kind);
        }
    }
}
