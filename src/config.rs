//! Static limits, sensor names and compiled-in default bindings.
//!
//! Everything in this module is generated from `config/sensor_rotate.toml`
//! by `tools/binding_config_compiler` during the build.

use crate::{
    storage::PersistGranularity,
    types::{ActionId, Binding},
};

/// One compiled-in default for a (sensor, layer) pair.
#[derive(Clone, Copy, Debug)]
pub struct DefaultEntry {
    pub sensor: u8,
    pub layer: u8,
    pub cw: Option<Binding>,
    pub ccw: Option<Binding>,
}

include!(concat!(env!("OUT_DIR"), "/sensor_rotate_config.rs"));

pub fn sensor_name(index: usize) -> Option<&'static str> {
    SENSOR_NAMES.get(index).copied()
}
