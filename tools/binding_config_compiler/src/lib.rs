//! Compiles `config/sensor_rotate.toml` into the constants the firmware
//! `include!`s at build time.

use std::{
    collections::BTreeSet,
    fmt::{self, Write as _},
    fs,
    path::Path,
};

use serde::Deserialize;

pub const MAX_SENSORS_LIMIT: u8 = 16;
pub const MAX_LAYERS_LIMIT: u8 = 16;
pub const SENSOR_NAME_MAX: usize = 32;
pub const NAMESPACE_MAX: usize = 8;

#[derive(Debug)]
pub enum ConfigCompilerError {
    Io(String),
    Parse(String),
    Validation(Vec<String>),
}

impl fmt::Display for ConfigCompilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "io error: {msg}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::Validation(errors) => {
                write!(f, "validation failed: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for ConfigCompilerError {}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RotateConfig {
    pub limits: Limits,
    #[serde(default, rename = "sensor")]
    pub sensors: Vec<SensorEntry>,
    #[serde(default)]
    pub persistence: Persistence,
    #[serde(default, rename = "default")]
    pub defaults: Vec<DefaultEntry>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Limits {
    pub sensors: u8,
    pub layers: u8,
    #[serde(default = "default_tap_ms")]
    pub default_tap_ms: u32,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensorEntry {
    pub name: String,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum Granularity {
    #[default]
    PerCell,
    WholeTable,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Persistence {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub granularity: Granularity,
}

impl Default for Persistence {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            granularity: Granularity::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultEntry {
    pub sensor: u8,
    pub layer: u8,
    pub cw: Option<DefaultAction>,
    pub ccw: Option<DefaultAction>,
    pub tap_ms: Option<u32>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultAction {
    pub action: u16,
    #[serde(default)]
    pub param1: u32,
    #[serde(default)]
    pub param2: u32,
}

fn default_tap_ms() -> u32 {
    5
}

fn default_namespace() -> String {
    "rsr".to_string()
}

pub fn parse_config_str(source: &str) -> Result<RotateConfig, ConfigCompilerError> {
    toml::from_str(source).map_err(|e| ConfigCompilerError::Parse(e.to_string()))
}

pub fn parse_config_file(path: &Path) -> Result<RotateConfig, ConfigCompilerError> {
    let source = fs::read_to_string(path)
        .map_err(|e| ConfigCompilerError::Io(format!("{}: {e}", path.display())))?;
    parse_config_str(&source)
}

pub fn validate_config(config: &RotateConfig) -> Result<(), ConfigCompilerError> {
    let mut errors = Vec::new();
    let limits = &config.limits;

    if limits.sensors == 0 || limits.sensors > MAX_SENSORS_LIMIT {
        errors.push(format!("limits.sensors must be in 1..={MAX_SENSORS_LIMIT}"));
    }
    if limits.layers == 0 || limits.layers > MAX_LAYERS_LIMIT {
        errors.push(format!("limits.layers must be in 1..={MAX_LAYERS_LIMIT}"));
    }
    if config.sensors.len() != usize::from(limits.sensors) {
        errors.push(format!(
            "sensor entries ({}) must match limits.sensors ({})",
            config.sensors.len(),
            limits.sensors
        ));
    }
    for (idx, sensor) in config.sensors.iter().enumerate() {
        if sensor.name.is_empty() || sensor.name.len() > SENSOR_NAME_MAX {
            errors.push(format!(
                "sensor[{idx}].name must be 1..={SENSOR_NAME_MAX} bytes"
            ));
        }
    }

    let namespace = &config.persistence.namespace;
    if namespace.is_empty()
        || namespace.len() > NAMESPACE_MAX
        || !namespace.bytes().all(|b| b.is_ascii_alphanumeric())
    {
        errors.push(format!(
            "persistence.namespace must be 1..={NAMESPACE_MAX} ascii alphanumerics"
        ));
    }

    let mut seen = BTreeSet::new();
    for (idx, entry) in config.defaults.iter().enumerate() {
        if entry.sensor >= limits.sensors {
            errors.push(format!("default[{idx}].sensor must be < limits.sensors"));
        }
        if entry.layer >= limits.layers {
            errors.push(format!("default[{idx}].layer must be < limits.layers"));
        }
        if !seen.insert((entry.sensor, entry.layer)) {
            errors.push(format!(
                "default[{idx}] duplicates sensor {} layer {}",
                entry.sensor, entry.layer
            ));
        }
        if entry.cw.is_none() && entry.ccw.is_none() {
            errors.push(format!("default[{idx}] must set cw or ccw"));
        }
        for (dir, action) in [("cw", entry.cw), ("ccw", entry.ccw)] {
            if action.is_some_and(|a| a.action == 0) {
                errors.push(format!("default[{idx}].{dir}.action must be > 0"));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigCompilerError::Validation(errors))
    }
}

pub fn render_generated_config(config: &RotateConfig) -> String {
    let mut out = String::new();
    let limits = &config.limits;

    out.push_str("// @generated by binding_config_compiler. Do not edit.\n\n");
    let _ = writeln!(out, "pub const MAX_SENSORS: usize = {};", limits.sensors);
    let _ = writeln!(out, "pub const MAX_LAYERS: usize = {};", limits.layers);
    let _ = writeln!(
        out,
        "pub const DEFAULT_TAP_MS: u32 = {};",
        limits.default_tap_ms
    );
    let _ = writeln!(
        out,
        "pub const SETTINGS_NAMESPACE: &str = {:?};",
        config.persistence.namespace
    );
    let granularity = match config.persistence.granularity {
        Granularity::PerCell => "PerCell",
        Granularity::WholeTable => "WholeTable",
    };
    let _ = writeln!(
        out,
        "pub const PERSIST_GRANULARITY: PersistGranularity = PersistGranularity::{granularity};"
    );

    out.push_str("\npub const SENSOR_NAMES: [&str; MAX_SENSORS] = [\n");
    for sensor in &config.sensors {
        let _ = writeln!(out, "    {:?},", sensor.name);
    }
    out.push_str("];\n");

    let mut defaults = config.defaults.clone();
    defaults.sort_by_key(|entry| (entry.sensor, entry.layer));

    out.push_str("\npub const DEFAULT_BINDINGS: &[DefaultEntry] = &[\n");
    for entry in &defaults {
        let tap_ms = entry.tap_ms.unwrap_or(limits.default_tap_ms);
        out.push_str("    DefaultEntry {\n");
        let _ = writeln!(out, "        sensor: {},", entry.sensor);
        let _ = writeln!(out, "        layer: {},", entry.layer);
        let _ = writeln!(out, "        cw: {},", render_action(entry.cw, tap_ms));
        let _ = writeln!(out, "        ccw: {},", render_action(entry.ccw, tap_ms));
        out.push_str("    },\n");
    }
    out.push_str("];\n");

    out
}

fn render_action(action: Option<DefaultAction>, tap_ms: u32) -> String {
    match action {
        Some(action) => format!(
            "Some(Binding {{ action: ActionId({}), param1: {}, param2: {}, tap_ms: {} }})",
            action.action, action.param1, action.param2, tap_ms
        ),
        None => "None".to_string(),
    }
}

pub fn generate_from_str(source: &str) -> Result<String, ConfigCompilerError> {
    let config = parse_config_str(source)?;
    validate_config(&config)?;
    Ok(render_generated_config(&config))
}

pub fn generate_from_path(path: &Path) -> Result<String, ConfigCompilerError> {
    let config = parse_config_file(path)?;
    validate_config(&config)?;
    Ok(render_generated_config(&config))
}
