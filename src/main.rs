//! Crustload CLI - crustal load-response simulator.
//!
//! Run load-response experiments, exchange CrusDe-compatible XML
//! descriptors, and evaluate volcanic risk impact at a target point.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crustload::export::{read_descriptor, snapshot_path, write_descriptor, write_snapshot};
use crustload::risk::{evaluate_risk, RiskParams};
use crustload::simulation::{
    run_simulation, ExperimentConfig, ResourceLimits, ResultField, RunOptions, SimulationResult,
};
use crustload::{EarthModel, EarthParams, LoadSpec, RegionSpec};

/// Crustal load-response simulator.
#[derive(Parser)]
#[command(name = "crustload")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation and write a result snapshot.
    Simulate {
        /// Descriptor XML to run; overrides all inline experiment flags.
        #[arg(short, long)]
        descriptor: Option<PathBuf>,

        #[command(flatten)]
        experiment: ExperimentArgs,

        /// Ceiling on time_steps x lat_steps x lon_steps per field.
        #[arg(long, default_value = "20000000")]
        max_cells: usize,

        /// Abort the run after this many seconds.
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Snapshot path; defaults to the output file with a .json extension.
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },

    /// Write the descriptor XML for an experiment.
    Describe {
        #[command(flatten)]
        experiment: ExperimentArgs,

        /// Where to write the XML; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a simulation and evaluate risk impact at a target point.
    Risk {
        /// Descriptor XML to run; overrides all inline experiment flags.
        #[arg(short, long)]
        descriptor: Option<PathBuf>,

        #[command(flatten)]
        experiment: ExperimentArgs,

        /// Target latitude in degrees.
        #[arg(long)]
        lat: f64,

        /// Target longitude in degrees.
        #[arg(long)]
        lon: f64,

        /// Time step to evaluate; defaults to the final step.
        #[arg(long)]
        time_index: Option<usize>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LoadScenario {
    /// Constant disk load.
    Disk,
    /// Disk of ice unloading linearly.
    GlacierMelt,
    /// Disk of lava applied at an eruption time.
    LavaFlow,
    /// Irregular footprint rising linearly.
    SeaLevel,
    /// Irregular footprint held constant.
    Irregular,
}

#[derive(Clone, Copy, ValueEnum)]
enum EarthModelArg {
    /// Elastic halfspace (pinel_hs_elastic).
    Elastic,
    /// Thick plate over halfspace (pinel_hs_thickplate).
    ThickPlate,
    /// Final relaxed state (pinel_hs_final_relaxed).
    Relaxed,
    /// Exponential decay toward relaxation.
    ExponentialDecay,
}

impl From<EarthModelArg> for EarthModel {
    fn from(arg: EarthModelArg) -> Self {
        match arg {
            EarthModelArg::Elastic => EarthModel::Elastic,
            EarthModelArg::ThickPlate => EarthModel::ThickPlate,
            EarthModelArg::Relaxed => EarthModel::Relaxed,
            EarthModelArg::ExponentialDecay => EarthModel::ExponentialDecay,
        }
    }
}

#[derive(Args)]
struct ExperimentArgs {
    /// Experiment name.
    #[arg(short, long, default_value = "experiment")]
    name: String,

    /// Load scenario.
    #[arg(long, value_enum, default_value = "disk")]
    scenario: LoadScenario,

    /// Disk radius in meters.
    #[arg(long, default_value = "10000")]
    radius_m: f64,

    /// Load thickness in meters (final height for ramping loads).
    #[arg(long, default_value = "100")]
    height_m: f64,

    /// Load density in kg/m^3; defaults per scenario (ice, water, lava).
    #[arg(long)]
    density: Option<f64>,

    /// Point-list file for irregular footprints (lat lon height_m).
    #[arg(long)]
    load_file: Option<PathBuf>,

    /// Remaining ice fraction at the end of a glacier-melt run.
    #[arg(long, default_value = "0.0")]
    final_fraction: f64,

    /// Initial water height for a sea-level run, in meters.
    #[arg(long, default_value = "0.0")]
    initial_height_m: f64,

    /// Eruption time for a lava-flow run, in years.
    #[arg(long, default_value = "0.0")]
    eruption_year: f64,

    /// Earth response model.
    #[arg(long, value_enum, default_value = "elastic")]
    earth_model: EarthModelArg,

    /// Regional crustal preset (iceland, hawaii, andes).
    #[arg(long, default_value = "default")]
    earth_preset: String,

    /// Region center latitude in degrees.
    #[arg(long, default_value = "63.63")]
    center_lat: f64,

    /// Region center longitude in degrees.
    #[arg(long, default_value = "-19.62")]
    center_lon: f64,

    /// Region width in kilometers.
    #[arg(long, default_value = "100")]
    width_km: f64,

    /// Region height in kilometers.
    #[arg(long, default_value = "100")]
    height_km: f64,

    /// Grid resolution in kilometers.
    #[arg(long, default_value = "2")]
    resolution_km: f64,

    /// Number of time steps.
    #[arg(long, default_value = "20")]
    time_steps: u32,

    /// Simulated duration in years.
    #[arg(long, default_value = "100")]
    duration_years: f64,
}

impl ExperimentArgs {
    fn into_config(self) -> ExperimentConfig {
        let file = self
            .load_file
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| "load.txt".to_string());

        let mut load = match self.scenario {
            LoadScenario::Disk => LoadSpec::disk(self.radius_m, self.height_m, 1000.0),
            LoadScenario::GlacierMelt => {
                LoadSpec::glacier_melt(self.radius_m, self.height_m, self.final_fraction)
            }
            LoadScenario::LavaFlow => {
                LoadSpec::lava_flow(self.radius_m, self.height_m, self.eruption_year)
            }
            LoadScenario::SeaLevel => {
                LoadSpec::sea_level_rise(file, self.initial_height_m, self.height_m)
            }
            LoadScenario::Irregular => {
                let mut spec = LoadSpec::disk(0.0, self.height_m, 1000.0);
                spec.kind = crustload::LoadKind::Irregular;
                spec.source_file = Some(file);
                spec
            }
        };
        if let Some(density) = self.density {
            load.density_kg_m3 = density;
        }

        let region = RegionSpec {
            center_lat: self.center_lat,
            center_lon: self.center_lon,
            width_km: self.width_km,
            height_km: self.height_km,
            resolution_km: self.resolution_km,
        };

        let mut config = ExperimentConfig::new(self.name.clone(), load, region);
        config.earth_model = self.earth_model.into();
        config.earth = EarthParams::for_region(&self.earth_preset);
        config.time_steps = self.time_steps;
        config.duration_years = self.duration_years;
        config
    }
}

fn main() {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            descriptor,
            experiment,
            max_cells,
            timeout_secs,
            snapshot,
        } => run_simulate(descriptor, experiment, max_cells, timeout_secs, snapshot),
        Commands::Describe { experiment, output } => run_describe(experiment, output),
        Commands::Risk {
            descriptor,
            experiment,
            lat,
            lon,
            time_index,
        } => run_risk(descriptor, experiment, lat, lon, time_index),
    }
}

fn resolve_config(descriptor: Option<PathBuf>, experiment: ExperimentArgs) -> ExperimentConfig {
    match descriptor {
        Some(path) => read_descriptor(&path).unwrap_or_else(|e| {
            eprintln!("Error reading descriptor {}: {}", path.display(), e);
            std::process::exit(1);
        }),
        None => experiment.into_config(),
    }
}

fn run_simulate(
    descriptor: Option<PathBuf>,
    experiment: ExperimentArgs,
    max_cells: usize,
    timeout_secs: Option<u64>,
    snapshot: Option<PathBuf>,
) {
    let config = resolve_config(descriptor, experiment);

    let options = RunOptions {
        limits: ResourceLimits {
            max_field_cells: max_cells,
        },
        deadline: timeout_secs.map(|s| Instant::now() + Duration::from_secs(s)),
        ..Default::default()
    };

    println!("Crustload - Load-Response Simulator");
    println!("===================================");
    println!("Experiment: {}", config.name);
    println!("Load: {}", config.load.kind.name());
    println!("Earth model: {}", config.earth_model.name());
    println!(
        "Region: {} x {} km at {} km resolution",
        config.region.width_km, config.region.height_km, config.region.resolution_km
    );
    println!(
        "Steps: {} over {} years",
        config.time_steps, config.duration_years
    );

    let start = Instant::now();
    let result = run_simulation(&config, &options).unwrap_or_else(|e| {
        eprintln!("Error during simulation: {}", e);
        std::process::exit(1);
    });
    println!("Simulation completed in {:.2?}", start.elapsed());

    print_summary(&result, &config);

    let path = snapshot.unwrap_or_else(|| snapshot_path(&result));
    write_snapshot(&result, &path).unwrap_or_else(|e| {
        eprintln!("Error writing snapshot: {}", e);
        std::process::exit(1);
    });
    println!("Snapshot written to {}", path.display());
}

fn print_summary(result: &SimulationResult, config: &ExperimentConfig) {
    let series = result.time_series(
        config.region.center_lat,
        config.region.center_lon,
        ResultField::Vertical,
    );
    let peak = series.iter().cloned().fold(0.0_f64, f64::min);
    println!();
    println!(
        "Grid: {} x {} points, {} time steps",
        result.lats.len(),
        result.lons.len(),
        result.steps()
    );
    println!("Peak subsidence at region center: {:.6} m", peak);
}

fn run_describe(experiment: ExperimentArgs, output: Option<PathBuf>) {
    let config = experiment.into_config();
    match output {
        Some(path) => {
            write_descriptor(&config, &path).unwrap_or_else(|e| {
                eprintln!("Error writing descriptor: {}", e);
                std::process::exit(1);
            });
            println!("Descriptor written to {}", path.display());
        }
        None => {
            let xml = crustload::build_descriptor(&config).unwrap_or_else(|e| {
                eprintln!("Error building descriptor: {}", e);
                std::process::exit(1);
            });
            println!("{xml}");
        }
    }
}

fn run_risk(
    descriptor: Option<PathBuf>,
    experiment: ExperimentArgs,
    lat: f64,
    lon: f64,
    time_index: Option<usize>,
) {
    let config = resolve_config(descriptor, experiment);
    let result = run_simulation(&config, &RunOptions::default()).unwrap_or_else(|e| {
        eprintln!("Error during simulation: {}", e);
        std::process::exit(1);
    });

    let impact = evaluate_risk(&result, lat, lon, time_index, &RiskParams::default());

    println!("Risk impact at ({:.4}, {:.4})", lat, lon);
    println!("==============================");
    println!("Vertical displacement:   {:.6} m", impact.vertical_disp);
    println!("Horizontal displacement: {:.6} m", impact.horizontal_disp);
    println!("Strain magnitude:        {:.4} microstrain", impact.strain_magnitude);
    println!("Pressure change proxy:   {:.4}", impact.pressure_change);
    println!("Stability impact proxy:  {:.4}", impact.stability_impact);
    println!("Pathway dilation proxy:  {:.4}", impact.pathway_dilation);
    println!("Risk index:              {:.4}", impact.risk_index);
    println!("Risk level:              {}", impact.risk_level.name());
}
