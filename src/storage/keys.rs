use core::fmt::Write as _;

use heapless::String;

use crate::{
    error::PersistError,
    types::{LayerIndex, SensorIndex},
};

pub const SETTINGS_KEY_MAX: usize = 24;
const TABLE_SUFFIX: &str = "bindings";

pub type SettingsKey = String<SETTINGS_KEY_MAX>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyTarget {
    Cell(SensorIndex, LayerIndex),
    Table,
}

/// `"<ns>/s<sensor>/l<layer>"`
pub fn cell_key(
    namespace: &str,
    sensor: SensorIndex,
    layer: LayerIndex,
) -> Result<SettingsKey, PersistError> {
    let mut key = SettingsKey::new();
    write!(key, "{namespace}/s{}/l{}", sensor.get(), layer.get())
        .map_err(|_| PersistError::KeyTooLong)?;
    Ok(key)
}

/// `"<ns>/bindings"`
pub fn table_key(namespace: &str) -> Result<SettingsKey, PersistError> {
    let mut key = SettingsKey::new();
    write!(key, "{namespace}/{TABLE_SUFFIX}").map_err(|_| PersistError::KeyTooLong)?;
    Ok(key)
}

/// `None` for keys that belong to another namespace.
pub fn parse_key(namespace: &str, key: &str) -> Option<Result<KeyTarget, PersistError>> {
    let rest = key.strip_prefix(namespace)?.strip_prefix('/')?;
    if rest == TABLE_SUFFIX {
        return Some(Ok(KeyTarget::Table));
    }
    Some(parse_cell(rest))
}

fn parse_cell(rest: &str) -> Result<KeyTarget, PersistError> {
    let (sensor, layer) = rest.split_once('/').ok_or(PersistError::UnknownKey)?;
    let sensor = parse_index(sensor.strip_prefix('s'))?;
    let layer = parse_index(layer.strip_prefix('l'))?;
    let sensor = SensorIndex::new(sensor).map_err(|_| PersistError::UnknownKey)?;
    let layer = LayerIndex::new(layer).map_err(|_| PersistError::UnknownKey)?;
    Ok(KeyTarget::Cell(sensor, layer))
}

fn parse_index(digits: Option<&str>) -> Result<u8, PersistError> {
    let digits = digits.ok_or(PersistError::UnknownKey)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PersistError::UnknownKey);
    }
    digits.parse().map_err(|_| PersistError::UnknownKey)
}
