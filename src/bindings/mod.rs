//! The sensor x layer binding table and default-binding resolution.

mod store;

pub use store::BindingStore;

use crate::{
    config::{DEFAULT_BINDINGS, MAX_LAYERS, MAX_SENSORS},
    types::{Binding, Direction, LayerBindings, LayerIndex, SensorIndex},
};

/// Source of compiled-in fallbacks for cells the client never configured.
pub trait DefaultBindings {
    fn default_binding(
        &self,
        sensor: SensorIndex,
        layer: LayerIndex,
        direction: Direction,
    ) -> Option<Binding>;
}

impl<F> DefaultBindings for F
where
    F: Fn(SensorIndex, LayerIndex, Direction) -> Option<Binding>,
{
    fn default_binding(
        &self,
        sensor: SensorIndex,
        layer: LayerIndex,
        direction: Direction,
    ) -> Option<Binding> {
        self(sensor, layer, direction)
    }
}

/// Defaults generated from `config/sensor_rotate.toml`.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompiledDefaults;

impl DefaultBindings for CompiledDefaults {
    fn default_binding(
        &self,
        sensor: SensorIndex,
        layer: LayerIndex,
        direction: Direction,
    ) -> Option<Binding> {
        let entry = DEFAULT_BINDINGS
            .iter()
            .find(|entry| entry.sensor == sensor.get() && entry.layer == layer.get())?;
        match direction {
            Direction::Cw => entry.cw,
            Direction::Ccw => entry.ccw,
        }
        .filter(Binding::is_configured)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoDefaults;

impl DefaultBindings for NoDefaults {
    fn default_binding(&self, _: SensorIndex, _: LayerIndex, _: Direction) -> Option<Binding> {
        None
    }
}

/// Substitutes the default for each unconfigured direction of `cell`.
pub fn resolve_cell<D: DefaultBindings + ?Sized>(
    mut cell: LayerBindings,
    sensor: SensorIndex,
    layer: LayerIndex,
    defaults: &D,
) -> LayerBindings {
    for direction in [Direction::Cw, Direction::Ccw] {
        if cell.get(direction).is_configured() {
            continue;
        }
        if let Some(fallback) = defaults.default_binding(sensor, layer, direction) {
            cell.set(direction, fallback);
        }
    }
    cell
}

/// Single authoritative in-memory copy of every (sensor, layer) cell.
#[derive(Clone, Debug)]
pub struct BindingTable {
    cells: [[LayerBindings; MAX_LAYERS]; MAX_SENSORS],
}

impl Default for BindingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl BindingTable {
    pub const fn new() -> Self {
        Self {
            cells: [[LayerBindings::UNSET; MAX_LAYERS]; MAX_SENSORS],
        }
    }

    pub fn get(&self, sensor: SensorIndex, layer: LayerIndex) -> LayerBindings {
        self.cells[sensor.as_usize()][layer.as_usize()]
    }

    pub fn get_resolved<D: DefaultBindings + ?Sized>(
        &self,
        sensor: SensorIndex,
        layer: LayerIndex,
        defaults: &D,
    ) -> LayerBindings {
        resolve_cell(self.get(sensor, layer), sensor, layer, defaults)
    }

    pub fn set(&mut self, sensor: SensorIndex, layer: LayerIndex, bindings: LayerBindings) {
        self.cells[sensor.as_usize()][layer.as_usize()] = bindings;
    }

    /// Cells in sensor-major, layer-minor order.
    pub fn iter(&self) -> impl Iterator<Item = (SensorIndex, LayerIndex, &LayerBindings)> + '_ {
        SensorIndex::all().flat_map(move |sensor| {
            LayerIndex::all().map(move |layer| {
                (
                    sensor,
                    layer,
                    &self.cells[sensor.as_usize()][layer.as_usize()],
                )
            })
        })
    }
}

#[cfg(test)]
mod tests;
