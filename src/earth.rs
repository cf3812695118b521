//! Earth response model tags and crustal property parameters.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Earth-response model selection.
///
/// All four tags are accepted and serialized distinctly into the
/// descriptor for interchange with the reference tool, but the simplified
/// response engine computes the same disk-decay formula for each of them
/// (see DESIGN.md). This enum is the seam where per-model responses would
/// plug in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EarthModel {
    /// Elastic half-space.
    Elastic,
    /// Thick elastic plate.
    ThickPlate,
    /// Final relaxed (fully viscous) response.
    Relaxed,
    /// Exponentially decaying transient response.
    ExponentialDecay,
}

impl Default for EarthModel {
    fn default() -> Self {
        Self::Elastic
    }
}

impl EarthModel {
    /// Request-facing tag name.
    pub fn name(&self) -> &'static str {
        match self {
            EarthModel::Elastic => "elastic",
            EarthModel::ThickPlate => "thick_plate",
            EarthModel::Relaxed => "relaxed",
            EarthModel::ExponentialDecay => "exponential_decay",
        }
    }

    /// Green's-function plugin name in the descriptor format.
    pub fn plugin(&self) -> &'static str {
        match self {
            EarthModel::Elastic => "pinel_hs_elastic",
            EarthModel::ThickPlate => "pinel_hs_thickplate",
            EarthModel::Relaxed => "pinel_hs_final_relaxed",
            EarthModel::ExponentialDecay => "exponential_decay",
        }
    }

    /// Parses a request tag.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name {
            "elastic" => Ok(EarthModel::Elastic),
            "thick_plate" => Ok(EarthModel::ThickPlate),
            "relaxed" => Ok(EarthModel::Relaxed),
            "exponential_decay" => Ok(EarthModel::ExponentialDecay),
            other => Err(ConfigError::UnknownEarthModel(other.to_string())),
        }
    }

    /// Inverse of [`EarthModel::plugin`].
    pub fn from_plugin(plugin: &str) -> Result<Self, ConfigError> {
        match plugin {
            "pinel_hs_elastic" => Ok(EarthModel::Elastic),
            "pinel_hs_thickplate" => Ok(EarthModel::ThickPlate),
            "pinel_hs_final_relaxed" => Ok(EarthModel::Relaxed),
            "exponential_decay" => Ok(EarthModel::ExponentialDecay),
            other => Err(ConfigError::UnknownEarthModel(other.to_string())),
        }
    }
}

/// Crustal and lithospheric properties carried in the descriptor's
/// earth-model block. Regional presets are drawn from published global
/// models (LITHO1.0 and regional studies).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EarthParams {
    /// Effective elastic thickness in km.
    pub elastic_thickness_km: f64,
    /// Young's modulus in GPa.
    pub young_modulus_gpa: f64,
    /// Poisson's ratio, dimensionless.
    pub poisson_ratio: f64,
    /// Upper mantle density in kg/m^3.
    pub mantle_density: f64,
    /// Crustal density in kg/m^3.
    pub crustal_density: f64,
    /// Gravitational acceleration in m/s^2.
    pub gravity: f64,
    /// Relaxation time constant in years, used by the exponential-decay
    /// model's descriptor block.
    pub relaxation_time_years: f64,
}

impl Default for EarthParams {
    fn default() -> Self {
        Self {
            elastic_thickness_km: 30.0,
            young_modulus_gpa: 100.0,
            poisson_ratio: 0.25,
            mantle_density: 3300.0,
            crustal_density: 2700.0,
            gravity: 9.81,
            relaxation_time_years: 10.0,
        }
    }
}

impl EarthParams {
    /// Thin-crust mid-ocean-ridge setting with high geothermal gradients.
    pub fn iceland() -> Self {
        Self {
            elastic_thickness_km: 10.0,
            young_modulus_gpa: 70.0,
            poisson_ratio: 0.25,
            mantle_density: 3300.0,
            crustal_density: 2800.0,
            ..Self::default()
        }
    }

    /// Oceanic hot spot with significant lithospheric flexure.
    pub fn hawaii() -> Self {
        Self {
            elastic_thickness_km: 30.0,
            young_modulus_gpa: 80.0,
            poisson_ratio: 0.27,
            mantle_density: 3350.0,
            crustal_density: 2900.0,
            ..Self::default()
        }
    }

    /// Thick continental crust above a subduction zone.
    pub fn andes() -> Self {
        Self {
            elastic_thickness_km: 40.0,
            young_modulus_gpa: 75.0,
            poisson_ratio: 0.26,
            mantle_density: 3300.0,
            crustal_density: 2800.0,
            ..Self::default()
        }
    }

    /// Looks up a regional preset by name, falling back to defaults.
    pub fn for_region(region: &str) -> Self {
        match region.to_ascii_lowercase().as_str() {
            "iceland" => Self::iceland(),
            "hawaii" => Self::hawaii(),
            "andes" => Self::andes(),
            _ => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_name_round_trip() {
        for model in [
            EarthModel::Elastic,
            EarthModel::ThickPlate,
            EarthModel::Relaxed,
            EarthModel::ExponentialDecay,
        ] {
            assert_eq!(EarthModel::parse(model.name()).unwrap(), model);
            assert_eq!(EarthModel::from_plugin(model.plugin()).unwrap(), model);
        }
    }

    #[test]
    fn test_unknown_model_rejected() {
        assert!(matches!(
            EarthModel::parse("viscoelastic"),
            Err(ConfigError::UnknownEarthModel(_))
        ));
    }

    #[test]
    fn test_regional_presets() {
        assert_eq!(EarthParams::for_region("Iceland").elastic_thickness_km, 10.0);
        assert_eq!(EarthParams::for_region("hawaii").poisson_ratio, 0.27);
        assert_eq!(
            EarthParams::for_region("atlantis"),
            EarthParams::default()
        );
    }
}
