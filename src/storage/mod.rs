//! Persistence of the binding table through an abstract key/blob store.

mod flash;
mod keys;

pub use flash::{FlashKvStore, FLASH_SLOT_LEN};
pub use keys::{cell_key, parse_key, table_key, KeyTarget, SettingsKey, SETTINGS_KEY_MAX};

use crate::{
    bindings::BindingTable,
    config::{MAX_LAYERS, MAX_SENSORS},
    error::PersistError,
    types::{LayerBindings, LayerIndex, SensorIndex, LAYER_BINDINGS_RECORD_LEN, TABLE_RECORD_LEN},
};

/// Key/blob store the bindings are persisted into.
pub trait KvStore {
    fn save(&mut self, key: &str, blob: &[u8]) -> Result<(), PersistError>;

    /// Calls `visit` once per stored key.
    fn load_all(&mut self, visit: &mut dyn FnMut(&str, &[u8])) -> Result<(), PersistError>;
}

impl<T: KvStore + ?Sized> KvStore for &mut T {
    fn save(&mut self, key: &str, blob: &[u8]) -> Result<(), PersistError> {
        (**self).save(key, blob)
    }

    fn load_all(&mut self, visit: &mut dyn FnMut(&str, &[u8])) -> Result<(), PersistError> {
        (**self).load_all(visit)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PersistGranularity {
    /// One key per (sensor, layer) cell.
    #[default]
    PerCell,
    /// One key holding every cell.
    WholeTable,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CommitPolicy {
    #[default]
    Immediate,
    /// Mutate memory and raise the pending flag; write on flush.
    Deferred,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LoadReport {
    pub loaded: usize,
    pub rejected: usize,
    /// Keys in our namespace written under the other granularity.
    pub ignored: usize,
}

pub struct PersistenceAdapter<S> {
    store: S,
    granularity: PersistGranularity,
    namespace: &'static str,
    dirty: [[bool; MAX_LAYERS]; MAX_SENSORS],
}

impl<S: KvStore> PersistenceAdapter<S> {
    pub fn new(store: S, granularity: PersistGranularity, namespace: &'static str) -> Self {
        Self {
            store,
            granularity,
            namespace,
            dirty: [[false; MAX_LAYERS]; MAX_SENSORS],
        }
    }

    pub fn granularity(&self) -> PersistGranularity {
        self.granularity
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn has_pending(&self) -> bool {
        self.dirty.iter().flatten().any(|&dirty| dirty)
    }

    pub fn is_dirty(&self, sensor: SensorIndex, layer: LayerIndex) -> bool {
        self.dirty[sensor.as_usize()][layer.as_usize()]
    }

    /// Called after `table` already holds the new cell value.
    pub fn record_change(
        &mut self,
        table: &BindingTable,
        sensor: SensorIndex,
        layer: LayerIndex,
        policy: CommitPolicy,
    ) -> Result<(), PersistError> {
        self.mark(sensor, layer, true);
        if policy == CommitPolicy::Deferred {
            log::debug!(
                "persist: deferred s{} l{}",
                sensor.get(),
                layer.get()
            );
            return Ok(());
        }

        match self.granularity {
            PersistGranularity::PerCell => self.save_cell(table, sensor, layer),
            PersistGranularity::WholeTable => self.save_table(table),
        }
    }

    /// Writes everything still pending. Returns the number of store writes.
    pub fn flush(&mut self, table: &BindingTable) -> Result<usize, PersistError> {
        if !self.has_pending() {
            return Ok(0);
        }

        match self.granularity {
            PersistGranularity::WholeTable => self.save_table(table).map(|()| 1),
            PersistGranularity::PerCell => {
                let mut writes = 0;
                for (sensor, layer, _) in table.iter() {
                    if !self.is_dirty(sensor, layer) {
                        continue;
                    }
                    self.save_cell(table, sensor, layer)?;
                    writes += 1;
                }
                Ok(writes)
            }
        }
    }

    /// Pushes every persisted record into `table`. Restored cells are not
    /// marked pending. A bad record is skipped without touching its cell.
    pub fn restore(&mut self, table: &mut BindingTable) -> Result<LoadReport, PersistError> {
        let namespace = self.namespace;
        let granularity = self.granularity;
        let mut report = LoadReport::default();

        self.store.load_all(&mut |key, blob| {
            let Some(target) = parse_key(namespace, key) else {
                return;
            };
            let outcome = match (target, granularity) {
                (Ok(KeyTarget::Cell(sensor, layer)), PersistGranularity::PerCell) => {
                    restore_cell(table, sensor, layer, blob)
                }
                (Ok(KeyTarget::Table), PersistGranularity::WholeTable) => {
                    restore_table(table, blob)
                }
                (Ok(_), _) => {
                    log::warn!("persist: ignoring {key} under {granularity:?}");
                    report.ignored += 1;
                    return;
                }
                (Err(err), _) => Err(err),
            };
            match outcome {
                Ok(()) => {
                    log::debug!("persist: loaded {key}");
                    report.loaded += 1;
                }
                Err(err) => {
                    log::error!("persist: rejected {key}: {err}");
                    report.rejected += 1;
                }
            }
        })?;

        Ok(report)
    }

    fn mark(&mut self, sensor: SensorIndex, layer: LayerIndex, dirty: bool) {
        self.dirty[sensor.as_usize()][layer.as_usize()] = dirty;
    }

    fn save_cell(
        &mut self,
        table: &BindingTable,
        sensor: SensorIndex,
        layer: LayerIndex,
    ) -> Result<(), PersistError> {
        let key = cell_key(self.namespace, sensor, layer)?;
        let mut record = [0u8; LAYER_BINDINGS_RECORD_LEN];
        table.get(sensor, layer).encode(&mut record);

        if let Err(err) = self.store.save(&key, &record) {
            log::error!("persist: save {} failed: {err}", key.as_str());
            return Err(err);
        }
        self.mark(sensor, layer, false);
        log::debug!("persist: saved {}", key.as_str());
        Ok(())
    }

    fn save_table(&mut self, table: &BindingTable) -> Result<(), PersistError> {
        let key = table_key(self.namespace)?;
        let record = encode_table(table);

        if let Err(err) = self.store.save(&key, &record) {
            log::error!("persist: save {} failed: {err}", key.as_str());
            return Err(err);
        }
        self.dirty = [[false; MAX_LAYERS]; MAX_SENSORS];
        log::debug!("persist: saved {}", key.as_str());
        Ok(())
    }
}

pub fn encode_table(table: &BindingTable) -> [u8; TABLE_RECORD_LEN] {
    let mut record = [0u8; TABLE_RECORD_LEN];
    let mut cell = [0u8; LAYER_BINDINGS_RECORD_LEN];
    for (chunk, (_, _, bindings)) in record
        .chunks_exact_mut(LAYER_BINDINGS_RECORD_LEN)
        .zip(table.iter())
    {
        bindings.encode(&mut cell);
        chunk.copy_from_slice(&cell);
    }
    record
}

fn restore_cell(
    table: &mut BindingTable,
    sensor: SensorIndex,
    layer: LayerIndex,
    blob: &[u8],
) -> Result<(), PersistError> {
    let record: &[u8; LAYER_BINDINGS_RECORD_LEN] =
        blob.try_into().map_err(|_| PersistError::SizeMismatch {
            expected: LAYER_BINDINGS_RECORD_LEN,
            actual: blob.len(),
        })?;
    table.set(sensor, layer, LayerBindings::decode(record));
    Ok(())
}

fn restore_table(table: &mut BindingTable, blob: &[u8]) -> Result<(), PersistError> {
    if blob.len() != TABLE_RECORD_LEN {
        return Err(PersistError::SizeMismatch {
            expected: TABLE_RECORD_LEN,
            actual: blob.len(),
        });
    }
    let cells = SensorIndex::all().flat_map(|sensor| LayerIndex::all().map(move |layer| (sensor, layer)));
    for ((sensor, layer), chunk) in cells.zip(blob.chunks_exact(LAYER_BINDINGS_RECORD_LEN)) {
        let mut record = [0u8; LAYER_BINDINGS_RECORD_LEN];
        record.copy_from_slice(chunk);
        table.set(sensor, layer, LayerBindings::decode(&record));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
