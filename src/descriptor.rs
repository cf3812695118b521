//! Experiment descriptor: the CrusDe-compatible XML interchange format.
//!
//! A descriptor fully describes one simulation run — earth model plugin
//! and parameters, load plugin and parameters, optional load history,
//! simulation steps/duration, region, and output directive — and must
//! round-trip: building one from an [`ExperimentConfig`] and parsing it
//! back reproduces the same load kind and parameter values.
//!
//! Load kinds map onto (load plugin, load-history plugin) pairs the way
//! the reference tool expects them:
//!
//! | kind          | load plugin | load history      |
//! |---------------|-------------|-------------------|
//! | disk          | `disk`      | —                 |
//! | glacier_melt  | `disk`      | `linear_decrease` |
//! | lava_flow     | `disk`      | `step_function`   |
//! | irregular     | `irregular` | —                 |
//! | sea_level     | `irregular` | `linear_increase` |

use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::earth::{EarthModel, EarthParams};
use crate::error::DescriptorError;
use crate::grid::RegionSpec;
use crate::load::{LoadKind, LoadSpec, TemporalLaw};
use crate::simulation::ExperimentConfig;

/// Format version emitted in the root element, matching the reference
/// tool release this engine emulates.
pub const FORMAT_VERSION: &str = "0.3.0";

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn text_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<(), DescriptorError> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn parameter(writer: &mut XmlWriter, name: &str, value: &str) -> Result<(), DescriptorError> {
    let mut el = BytesStart::new("parameter");
    el.push_attribute(("name", name));
    writer.write_event(Event::Start(el))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new("parameter")))?;
    Ok(())
}

fn open(writer: &mut XmlWriter, name: &str) -> Result<(), DescriptorError> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    Ok(())
}

fn close(writer: &mut XmlWriter, name: &str) -> Result<(), DescriptorError> {
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn num(value: f64) -> String {
    // `Display` prints the shortest representation that parses back to
    // the identical f64, which is what keeps round-trips exact.
    format!("{value}")
}

/// Serializes a configuration into descriptor XML.
pub fn build_descriptor(config: &ExperimentConfig) -> Result<String, DescriptorError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut root = BytesStart::new("CrusDe");
    root.push_attribute(("version", FORMAT_VERSION));
    writer.write_event(Event::Start(root))?;

    open(&mut writer, "experiment")?;
    text_element(&mut writer, "name", &config.name)?;
    text_element(
        &mut writer,
        "description",
        &format!(
            "CrusDe simulation of {} effects on crustal deformation",
            config.load.kind.name()
        ),
    )?;
    close(&mut writer, "experiment")?;

    open(&mut writer, "model")?;
    write_green(&mut writer, config)?;
    write_load(&mut writer, &config.load)?;
    write_load_history(&mut writer, config)?;
    write_crustal_decay(&mut writer, config)?;
    close(&mut writer, "model")?;

    open(&mut writer, "simulation")?;
    parameter(&mut writer, "timesteps", &config.time_steps.to_string())?;
    parameter(&mut writer, "duration_years", &num(config.duration_years))?;
    write_region(&mut writer, &config.region)?;
    close(&mut writer, "simulation")?;

    open(&mut writer, "output")?;
    text_element(&mut writer, "plugin", "netcdf")?;
    open(&mut writer, "parameters")?;
    parameter(&mut writer, "filename", &config.output_file)?;
    close(&mut writer, "parameters")?;
    close(&mut writer, "output")?;

    close(&mut writer, "CrusDe")?;

    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| DescriptorError::Malformed(e.to_string()))
}

fn write_green(writer: &mut XmlWriter, config: &ExperimentConfig) -> Result<(), DescriptorError> {
    open(writer, "green")?;
    text_element(writer, "plugin", config.earth_model.plugin())?;
    open(writer, "parameters")?;
    let earth = &config.earth;
    parameter(writer, "elastic_thickness", &num(earth.elastic_thickness_km))?;
    parameter(writer, "young_modulus", &num(earth.young_modulus_gpa))?;
    parameter(writer, "poisson_ratio", &num(earth.poisson_ratio))?;
    parameter(writer, "density_mantle", &num(earth.mantle_density))?;
    parameter(writer, "density_crust", &num(earth.crustal_density))?;
    parameter(writer, "gravity", &num(earth.gravity))?;
    close(writer, "parameters")?;
    close(writer, "green")?;
    Ok(())
}

fn write_load(writer: &mut XmlWriter, load: &LoadSpec) -> Result<(), DescriptorError> {
    open(writer, "load")?;
    if load.kind.is_irregular() {
        text_element(writer, "plugin", "irregular")?;
        open(writer, "parameters")?;
        let file = load.source_file.as_deref().unwrap_or("load.txt");
        parameter(writer, "file", file)?;
        if load.kind == LoadKind::Irregular {
            parameter(writer, "height_m", &num(load.height_m))?;
        }
        parameter(writer, "density_kg_m3", &num(load.density_kg_m3))?;
        close(writer, "parameters")?;
    } else {
        text_element(writer, "plugin", "disk")?;
        open(writer, "parameters")?;
        parameter(writer, "radius_m", &num(load.radius_m))?;
        parameter(writer, "height_m", &num(load.height_m))?;
        parameter(writer, "density_kg_m3", &num(load.density_kg_m3))?;
        close(writer, "parameters")?;
    }
    close(writer, "load")?;
    Ok(())
}

fn write_load_history(
    writer: &mut XmlWriter,
    config: &ExperimentConfig,
) -> Result<(), DescriptorError> {
    let (plugin, params): (&str, Vec<(&str, String)>) = match config.load.temporal_law {
        TemporalLaw::Constant => return Ok(()),
        TemporalLaw::LinearDecrease { final_fraction } => (
            "linear_decrease",
            vec![
                ("duration_years", num(config.duration_years)),
                ("final_fraction", num(final_fraction)),
            ],
        ),
        TemporalLaw::LinearIncrease {
            initial_height_m,
            final_height_m,
        } => (
            "linear_increase",
            vec![
                ("duration_years", num(config.duration_years)),
                ("initial_height_m", num(initial_height_m)),
                ("final_height_m", num(final_height_m)),
            ],
        ),
        TemporalLaw::Step { step_time_years } => (
            "step_function",
            vec![("step_time_years", num(step_time_years))],
        ),
    };

    open(writer, "load_history")?;
    text_element(writer, "plugin", plugin)?;
    open(writer, "parameters")?;
    for (name, value) in params {
        parameter(writer, name, &value)?;
    }
    close(writer, "parameters")?;
    close(writer, "load_history")?;
    Ok(())
}

fn write_crustal_decay(
    writer: &mut XmlWriter,
    config: &ExperimentConfig,
) -> Result<(), DescriptorError> {
    if config.earth_model != EarthModel::ExponentialDecay {
        return Ok(());
    }
    open(writer, "crustal_decay")?;
    text_element(writer, "plugin", "exponential")?;
    open(writer, "parameters")?;
    parameter(writer, "tau_years", &num(config.earth.relaxation_time_years))?;
    close(writer, "parameters")?;
    close(writer, "crustal_decay")?;
    Ok(())
}

fn write_region(writer: &mut XmlWriter, region: &RegionSpec) -> Result<(), DescriptorError> {
    open(writer, "region")?;
    parameter(writer, "center_lat", &num(region.center_lat))?;
    parameter(writer, "center_lon", &num(region.center_lon))?;
    parameter(writer, "width_km", &num(region.width_km))?;
    parameter(writer, "height_km", &num(region.height_km))?;
    parameter(writer, "resolution_km", &num(region.resolution_km))?;
    close(writer, "region")?;
    Ok(())
}

/// Accumulated raw content of one descriptor document.
#[derive(Default)]
struct RawDescriptor {
    name: Option<String>,
    green_plugin: Option<String>,
    green_params: Vec<(String, String)>,
    load_plugin: Option<String>,
    load_params: Vec<(String, String)>,
    history_plugin: Option<String>,
    history_params: Vec<(String, String)>,
    decay_params: Vec<(String, String)>,
    sim_params: Vec<(String, String)>,
    region_params: Vec<(String, String)>,
    output_file: Option<String>,
}

impl RawDescriptor {
    fn lookup<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn number(params: &[(String, String)], name: &str) -> Result<f64, DescriptorError> {
        let value = Self::lookup(params, name)
            .ok_or(DescriptorError::MissingElement("parameter"))?;
        value.parse().map_err(|_| DescriptorError::BadNumber {
            name: name.to_string(),
            value: value.to_string(),
        })
    }

    fn number_or(
        params: &[(String, String)],
        name: &str,
        default: f64,
    ) -> Result<f64, DescriptorError> {
        match Self::lookup(params, name) {
            Some(value) => value.parse().map_err(|_| DescriptorError::BadNumber {
                name: name.to_string(),
                value: value.to_string(),
            }),
            None => Ok(default),
        }
    }
}

/// Parses descriptor XML back into a configuration.
pub fn parse_descriptor(xml: &str) -> Result<ExperimentConfig, DescriptorError> {
    let raw = scan_document(xml)?;
    assemble(raw)
}

fn scan_document(xml: &str) -> Result<RawDescriptor, DescriptorError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut raw = RawDescriptor::default();
    let mut stack: Vec<String> = Vec::new();
    let mut pending_param: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(el) => {
                let name = String::from_utf8_lossy(el.name().as_ref()).into_owned();
                if name == "parameter" {
                    let attr = el
                        .try_get_attribute("name")
                        .map_err(|e| DescriptorError::Malformed(e.to_string()))?
                        .ok_or(DescriptorError::Malformed(
                            "parameter element without a name attribute".to_string(),
                        ))?;
                    let value = attr
                        .unescape_value()
                        .map_err(DescriptorError::Xml)?
                        .into_owned();
                    pending_param = Some(value);
                }
                stack.push(name);
            }
            Event::Text(text) => {
                let value = text.unescape()?.into_owned();
                record_text(&mut raw, &stack, &mut pending_param, value);
            }
            Event::End(_) => {
                if stack.pop().as_deref() == Some("parameter") {
                    // A parameter without text contributes nothing.
                    pending_param = None;
                }
            }
            Event::Empty(el) => {
                // A self-closing parameter carries an empty value, which
                // surfaces as BadNumber for numeric lookups downstream.
                let name = String::from_utf8_lossy(el.name().as_ref()).into_owned();
                if name == "parameter" {
                    let attr = el
                        .try_get_attribute("name")
                        .map_err(|e| DescriptorError::Malformed(e.to_string()))?
                        .ok_or(DescriptorError::Malformed(
                            "parameter element without a name attribute".to_string(),
                        ))?;
                    let mut pending = Some(
                        attr.unescape_value()
                            .map_err(DescriptorError::Xml)?
                            .into_owned(),
                    );
                    stack.push(name);
                    record_text(&mut raw, &stack, &mut pending, String::new());
                    stack.pop();
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(raw)
}

fn record_text(
    raw: &mut RawDescriptor,
    stack: &[String],
    pending_param: &mut Option<String>,
    value: String,
) {
    let in_section = |name: &str| stack.iter().any(|s| s == name);
    let current = stack.last().map(String::as_str);

    if current == Some("parameter") {
        let Some(param_name) = pending_param.take() else {
            return;
        };
        let entry = (param_name, value);
        if in_section("green") {
            raw.green_params.push(entry);
        } else if in_section("load_history") {
            raw.history_params.push(entry);
        } else if in_section("crustal_decay") {
            raw.decay_params.push(entry);
        } else if in_section("load") {
            raw.load_params.push(entry);
        } else if in_section("region") {
            raw.region_params.push(entry);
        } else if in_section("simulation") {
            raw.sim_params.push(entry);
        } else if in_section("output") {
            if entry.0 == "filename" {
                raw.output_file = Some(entry.1);
            }
        }
        return;
    }

    match current {
        Some("name") if in_section("experiment") => raw.name = Some(value),
        Some("plugin") => {
            if in_section("green") {
                raw.green_plugin = Some(value);
            } else if in_section("load_history") {
                raw.history_plugin = Some(value);
            } else if in_section("load") {
                raw.load_plugin = Some(value);
            }
            // The output plugin is always netcdf; nothing to keep.
        }
        _ => {}
    }
}

fn assemble(raw: RawDescriptor) -> Result<ExperimentConfig, DescriptorError> {
    let green_plugin = raw
        .green_plugin
        .as_deref()
        .ok_or(DescriptorError::MissingElement("green/plugin"))?;
    let load_plugin = raw
        .load_plugin
        .as_deref()
        .ok_or(DescriptorError::MissingElement("load/plugin"))?;

    let earth_model = EarthModel::from_plugin(green_plugin)?;
    let defaults = EarthParams::default();
    let earth = EarthParams {
        elastic_thickness_km: RawDescriptor::number_or(
            &raw.green_params,
            "elastic_thickness",
            defaults.elastic_thickness_km,
        )?,
        young_modulus_gpa: RawDescriptor::number_or(
            &raw.green_params,
            "young_modulus",
            defaults.young_modulus_gpa,
        )?,
        poisson_ratio: RawDescriptor::number_or(
            &raw.green_params,
            "poisson_ratio",
            defaults.poisson_ratio,
        )?,
        mantle_density: RawDescriptor::number_or(
            &raw.green_params,
            "density_mantle",
            defaults.mantle_density,
        )?,
        crustal_density: RawDescriptor::number_or(
            &raw.green_params,
            "density_crust",
            defaults.crustal_density,
        )?,
        gravity: RawDescriptor::number_or(&raw.green_params, "gravity", defaults.gravity)?,
        relaxation_time_years: RawDescriptor::number_or(
            &raw.decay_params,
            "tau_years",
            defaults.relaxation_time_years,
        )?,
    };

    let duration_years = RawDescriptor::number(&raw.sim_params, "duration_years")?;
    let time_steps = RawDescriptor::number(&raw.sim_params, "timesteps")? as u32;

    let load = assemble_load(&raw, load_plugin)?;

    let region = RegionSpec {
        center_lat: RawDescriptor::number(&raw.region_params, "center_lat")?,
        center_lon: RawDescriptor::number(&raw.region_params, "center_lon")?,
        width_km: RawDescriptor::number(&raw.region_params, "width_km")?,
        height_km: RawDescriptor::number(&raw.region_params, "height_km")?,
        resolution_km: RawDescriptor::number(&raw.region_params, "resolution_km")?,
    };

    let name = raw.name.ok_or(DescriptorError::MissingElement("name"))?;
    let output_file = raw
        .output_file
        .unwrap_or_else(|| format!("{name}_results.nc"));

    Ok(ExperimentConfig {
        name,
        load,
        earth_model,
        earth,
        time_steps,
        duration_years,
        region,
        output_file,
    })
}

fn assemble_load(raw: &RawDescriptor, load_plugin: &str) -> Result<LoadSpec, DescriptorError> {
    let history = raw.history_plugin.as_deref();
    match (load_plugin, history) {
        ("disk", None) => Ok(LoadSpec {
            kind: LoadKind::Disk,
            radius_m: RawDescriptor::number(&raw.load_params, "radius_m")?,
            height_m: RawDescriptor::number(&raw.load_params, "height_m")?,
            density_kg_m3: RawDescriptor::number(&raw.load_params, "density_kg_m3")?,
            source_file: None,
            temporal_law: TemporalLaw::Constant,
        }),
        ("disk", Some("linear_decrease")) => Ok(LoadSpec {
            kind: LoadKind::GlacierMelt,
            radius_m: RawDescriptor::number(&raw.load_params, "radius_m")?,
            height_m: RawDescriptor::number(&raw.load_params, "height_m")?,
            density_kg_m3: RawDescriptor::number(&raw.load_params, "density_kg_m3")?,
            source_file: None,
            temporal_law: TemporalLaw::LinearDecrease {
                final_fraction: RawDescriptor::number(&raw.history_params, "final_fraction")?,
            },
        }),
        ("disk", Some("step_function")) => Ok(LoadSpec {
            kind: LoadKind::LavaFlow,
            radius_m: RawDescriptor::number(&raw.load_params, "radius_m")?,
            height_m: RawDescriptor::number(&raw.load_params, "height_m")?,
            density_kg_m3: RawDescriptor::number(&raw.load_params, "density_kg_m3")?,
            source_file: None,
            temporal_law: TemporalLaw::Step {
                step_time_years: RawDescriptor::number(&raw.history_params, "step_time_years")?,
            },
        }),
        ("irregular", None) => Ok(LoadSpec {
            kind: LoadKind::Irregular,
            radius_m: 0.0,
            height_m: RawDescriptor::number(&raw.load_params, "height_m")?,
            density_kg_m3: RawDescriptor::number(&raw.load_params, "density_kg_m3")?,
            source_file: RawDescriptor::lookup(&raw.load_params, "file").map(str::to_string),
            temporal_law: TemporalLaw::Constant,
        }),
        ("irregular", Some("linear_increase")) => {
            let final_height_m =
                RawDescriptor::number(&raw.history_params, "final_height_m")?;
            Ok(LoadSpec {
                kind: LoadKind::SeaLevel,
                radius_m: 0.0,
                height_m: final_height_m,
                density_kg_m3: RawDescriptor::number_or(
                    &raw.load_params,
                    "density_kg_m3",
                    crate::load::WATER_DENSITY,
                )?,
                source_file: RawDescriptor::lookup(&raw.load_params, "file").map(str::to_string),
                temporal_law: TemporalLaw::LinearIncrease {
                    initial_height_m: RawDescriptor::number(
                        &raw.history_params,
                        "initial_height_m",
                    )?,
                    final_height_m,
                },
            })
        }
        (plugin, history) => Err(DescriptorError::Malformed(format!(
            "unsupported load plugin/history combination: {plugin} / {history:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::ICE_DENSITY;

    fn region() -> RegionSpec {
        RegionSpec {
            center_lat: 63.63,
            center_lon: -19.62,
            width_km: 100.0,
            height_km: 80.0,
            resolution_km: 2.5,
        }
    }

    #[test]
    fn test_disk_round_trip() {
        let config = ExperimentConfig::new(
            "katla-disk",
            LoadSpec::disk(12_345.6789, 101.5, 1017.25),
            region(),
        );
        let xml = build_descriptor(&config).unwrap();
        let parsed = parse_descriptor(&xml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_glacier_melt_round_trip() {
        let mut config = ExperimentConfig::new(
            "myrdalsjokull",
            LoadSpec::glacier_melt(9_000.0, 430.0, 0.1),
            region(),
        );
        config.time_steps = 50;
        config.duration_years = 150.0;
        let xml = build_descriptor(&config).unwrap();
        let parsed = parse_descriptor(&xml).unwrap();
        assert_eq!(parsed.load, config.load);
        assert_eq!(parsed.load.density_kg_m3, ICE_DENSITY);
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_lava_flow_round_trip() {
        let config = ExperimentConfig::new(
            "eldfell",
            LoadSpec::lava_flow(2_500.0, 40.0, 3.5),
            region(),
        );
        let xml = build_descriptor(&config).unwrap();
        let parsed = parse_descriptor(&xml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_sea_level_round_trip() {
        let config = ExperimentConfig::new(
            "surtsey-coast",
            LoadSpec::sea_level_rise("coastline.txt", 0.25, 1.75),
            region(),
        );
        let xml = build_descriptor(&config).unwrap();
        let parsed = parse_descriptor(&xml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_earth_model_and_params_round_trip() {
        let mut config = ExperimentConfig::new(
            "thick-plate",
            LoadSpec::disk(10_000.0, 100.0, 1000.0),
            region(),
        );
        config.earth_model = EarthModel::ThickPlate;
        config.earth = EarthParams::hawaii();
        let xml = build_descriptor(&config).unwrap();
        assert!(xml.contains("pinel_hs_thickplate"));
        let parsed = parse_descriptor(&xml).unwrap();
        assert_eq!(parsed.earth_model, EarthModel::ThickPlate);
        assert_eq!(parsed.earth, EarthParams::hawaii());
    }

    #[test]
    fn test_exponential_decay_round_trips_tau() {
        let mut config = ExperimentConfig::new(
            "relaxing",
            LoadSpec::disk(10_000.0, 100.0, 1000.0),
            region(),
        );
        config.earth_model = EarthModel::ExponentialDecay;
        config.earth.relaxation_time_years = 25.0;
        let xml = build_descriptor(&config).unwrap();
        assert!(xml.contains("crustal_decay"));
        assert!(xml.contains("tau_years"));
        let parsed = parse_descriptor(&xml).unwrap();
        assert_eq!(parsed.earth.relaxation_time_years, 25.0);
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_decay_block_absent_for_other_models() {
        let config = ExperimentConfig::new(
            "elastic-only",
            LoadSpec::disk(10_000.0, 100.0, 1000.0),
            region(),
        );
        let xml = build_descriptor(&config).unwrap();
        assert!(!xml.contains("crustal_decay"));
    }

    #[test]
    fn test_self_closing_parameter_surfaces_as_bad_number() {
        let config = ExperimentConfig::new(
            "empty-param",
            LoadSpec::disk(10_000.0, 100.0, 1000.0),
            region(),
        );
        let xml = build_descriptor(&config).unwrap().replace(
            "<parameter name=\"radius_m\">10000</parameter>",
            "<parameter name=\"radius_m\"/>",
        );
        match parse_descriptor(&xml) {
            Err(DescriptorError::BadNumber { name, value }) => {
                assert_eq!(name, "radius_m");
                assert!(value.is_empty());
            }
            other => panic!("expected BadNumber, got {other:?}"),
        }
    }

    #[test]
    fn test_descriptor_carries_version_and_output() {
        let config = ExperimentConfig::new(
            "version-check",
            LoadSpec::disk(10_000.0, 100.0, 1000.0),
            region(),
        );
        let xml = build_descriptor(&config).unwrap();
        assert!(xml.contains("version=\"0.3.0\""));
        assert!(xml.contains("version-check_results.nc"));
        assert!(xml.contains("netcdf"));
    }

    #[test]
    fn test_malformed_document_rejected() {
        assert!(parse_descriptor("<CrusDe><model></model></CrusDe>").is_err());
    }

    #[test]
    fn test_bad_number_named_in_error() {
        let config = ExperimentConfig::new(
            "bad-number",
            LoadSpec::disk(10_000.0, 100.0, 1000.0),
            region(),
        );
        let xml = build_descriptor(&config)
            .unwrap()
            .replace(">10000<", ">not-a-number<");
        match parse_descriptor(&xml) {
            Err(DescriptorError::BadNumber { name, .. }) => assert_eq!(name, "radius_m"),
            other => panic!("expected BadNumber, got {other:?}"),
        }
    }
}
