//! Error taxonomy for configuration, simulation, and descriptor handling.

use thiserror::Error;

/// Errors raised while validating a simulation request, before any
/// grid or field array is allocated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid region: {field} must be positive, got {value}")]
    NonPositiveRegionField { field: &'static str, value: f64 },
    #[error("invalid region: resolution_km ({resolution_km}) must be smaller than both extents ({width_km} x {height_km} km)")]
    ResolutionExceedsExtent {
        resolution_km: f64,
        width_km: f64,
        height_km: f64,
    },
    #[error("invalid load: {field} must be positive, got {value}")]
    NonPositiveLoadField { field: &'static str, value: f64 },
    #[error("irregular load requires a source point file but none was given")]
    MissingLoadFile,
    #[error("malformed load point file at line {line}: {reason}")]
    MalformedLoadPoint { line: usize, reason: String },
    #[error("time_steps must be at least 2, got {0}")]
    TooFewTimeSteps(u32),
    #[error("duration_years must be positive, got {0}")]
    NonPositiveDuration(f64),
    #[error("experiment name must not be empty")]
    EmptyName,
    #[error("unknown load kind '{0}'")]
    UnknownLoadKind(String),
    #[error("unknown earth model '{0}'")]
    UnknownEarthModel(String),
}

/// Errors raised while running a simulation or interacting with the
/// result cache.
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("requested {requested} field cells exceeds the configured ceiling of {ceiling}")]
    ResourceExhausted { requested: usize, ceiling: usize },
    #[error("numerical guard tripped: {0}")]
    NumericalGuard(String),
    #[error("simulation cancelled at time step {step}")]
    Cancelled { step: usize },
    #[error("deadline exceeded at time step {step}")]
    DeadlineExceeded { step: usize },
    #[error("experiment '{0}' is already being computed")]
    AlreadyComputing(String),
    #[error("failed to read load point file: {0}")]
    LoadFileIo(#[from] std::io::Error),
}

/// Errors raised while building or parsing an experiment descriptor.
#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
    #[error("descriptor is malformed: {0}")]
    Malformed(String),
    #[error("descriptor is missing required element '{0}'")]
    MissingElement(&'static str),
    #[error("could not parse parameter '{name}' value '{value}' as a number")]
    BadNumber { name: String, value: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised while writing or reading experiment files on disk.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error("result serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}
