//! Crustal load-response simulation engine.
//!
//! This crate models the elastic response of the crust to surface loads
//! (glaciers, lava flows, sea-level change) over a regional grid,
//! emulating the CrusDe simulation tool: displacement fields per time
//! step, derived strain tensors, and a volcanic risk impact evaluator,
//! with CrusDe-compatible XML experiment descriptors.

pub mod cache;
pub mod descriptor;
pub mod earth;
pub mod error;
pub mod export;
pub mod grid;
pub mod load;
pub mod response;
pub mod risk;
pub mod simulation;
pub mod strain;

pub use cache::SimulationCache;
pub use descriptor::{build_descriptor, parse_descriptor};
pub use earth::{EarthModel, EarthParams};
pub use error::{ConfigError, DescriptorError, ExportError, SimulationError};
pub use grid::{RegionSpec, SpatialGrid};
pub use load::{LoadKind, LoadPoint, LoadSpec, TemporalLaw};
pub use response::ResponseParams;
pub use risk::{evaluate_risk, RiskImpact, RiskLevel, RiskParams};
pub use simulation::{
    run_simulation, CancelToken, ExperimentConfig, ResourceLimits, ResultField, RunOptions,
    SimulationResult,
};
pub use strain::StrainTensor;
