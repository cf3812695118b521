//! File I/O for experiment descriptors and result snapshots.
//!
//! Descriptors are the XML interchange format from [`crate::descriptor`].
//! Result snapshots are JSON serializations of a [`SimulationResult`];
//! the snapshot path is derived from the configuration's declared output
//! file by swapping its extension for `.json`. Snapshots depend on
//! serde_json's `float_roundtrip` feature so field values survive a
//! write/read cycle bit-for-bit.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use log::info;

use crate::descriptor::{build_descriptor, parse_descriptor};
use crate::error::ExportError;
use crate::simulation::{ExperimentConfig, SimulationResult};

/// Writes the descriptor XML for `config` to `path`.
pub fn write_descriptor(config: &ExperimentConfig, path: &Path) -> Result<(), ExportError> {
    let xml = build_descriptor(config)?;
    std::fs::write(path, xml)?;
    info!("wrote descriptor for '{}' to {}", config.name, path.display());
    Ok(())
}

/// Reads and parses a descriptor XML file.
pub fn read_descriptor(path: &Path) -> Result<ExperimentConfig, ExportError> {
    let xml = std::fs::read_to_string(path)?;
    Ok(parse_descriptor(&xml)?)
}

/// Snapshot path for a result, derived from its configured output file.
pub fn snapshot_path(result: &SimulationResult) -> PathBuf {
    PathBuf::from(&result.parameters.output_file).with_extension("json")
}

/// Writes a result snapshot as JSON to `path`.
pub fn write_snapshot(result: &SimulationResult, path: &Path) -> Result<(), ExportError> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, result)?;
    info!("wrote snapshot for '{}' to {}", result.name, path.display());
    Ok(())
}

/// Reads a result snapshot written by [`write_snapshot`].
pub fn read_snapshot(path: &Path) -> Result<SimulationResult, ExportError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::RegionSpec;
    use crate::load::LoadSpec;
    use crate::simulation::{run_simulation, RunOptions};

    fn config(name: &str) -> ExperimentConfig {
        let mut config = ExperimentConfig::new(
            name,
            LoadSpec::disk(10_000.0, 100.0, 1000.0),
            RegionSpec {
                center_lat: 0.0,
                center_lon: 0.0,
                width_km: 50.0,
                height_km: 50.0,
                resolution_km: 10.0,
            },
        );
        config.time_steps = 3;
        config
    }

    #[test]
    fn test_descriptor_file_round_trip() {
        let dir = std::env::temp_dir();
        let path = dir.join("crustload_descriptor_test.xml");
        let config = config("file-round-trip");
        write_descriptor(&config, &path).unwrap();
        let parsed = read_descriptor(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let result = run_simulation(&config("snapshot"), &RunOptions::default()).unwrap();
        let path = std::env::temp_dir().join("crustload_snapshot_test.json");
        write_snapshot(&result, &path).unwrap();
        let restored = read_snapshot(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(restored, result);
    }

    #[test]
    fn test_snapshot_path_swaps_extension() {
        let result = run_simulation(&config("paths"), &RunOptions::default()).unwrap();
        assert_eq!(snapshot_path(&result), PathBuf::from("paths_results.json"));
    }

    #[test]
    fn test_missing_descriptor_is_io_error() {
        let missing = Path::new("/definitely/not/here.xml");
        assert!(matches!(read_descriptor(missing), Err(ExportError::Io(_))));
    }
}
