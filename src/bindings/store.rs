use heapless::Vec;

use super::{BindingTable, DefaultBindings};
use crate::{
    config::MAX_LAYERS,
    error::PersistError,
    storage::{CommitPolicy, KvStore, LoadReport, PersistGranularity, PersistenceAdapter},
    types::{LayerBindings, LayerIndex, SensorIndex},
};

/// The binding table together with the adapter that persists it.
pub struct BindingStore<S> {
    table: BindingTable,
    persistence: PersistenceAdapter<S>,
}

impl<S: KvStore> BindingStore<S> {
    pub fn new(store: S, granularity: PersistGranularity, namespace: &'static str) -> Self {
        Self {
            table: BindingTable::new(),
            persistence: PersistenceAdapter::new(store, granularity, namespace),
        }
    }

    /// Startup hydration. Restored cells do not count as pending changes.
    pub fn load_all(&mut self) -> Result<LoadReport, PersistError> {
        let report = self.persistence.restore(&mut self.table)?;
        log::info!(
            "bindings: restored loaded={} rejected={} ignored={}",
            report.loaded,
            report.rejected,
            report.ignored
        );
        Ok(report)
    }

    pub fn get(&self, sensor: SensorIndex, layer: LayerIndex) -> LayerBindings {
        self.table.get(sensor, layer)
    }

    pub fn get_resolved<D: DefaultBindings + ?Sized>(
        &self,
        sensor: SensorIndex,
        layer: LayerIndex,
        defaults: &D,
    ) -> LayerBindings {
        self.table.get_resolved(sensor, layer, defaults)
    }

    /// Replaces the cell, then persists per `policy`. The in-memory change
    /// stays applied when the store write fails.
    pub fn set(
        &mut self,
        sensor: SensorIndex,
        layer: LayerIndex,
        bindings: LayerBindings,
        policy: CommitPolicy,
    ) -> Result<(), PersistError> {
        self.table.set(sensor, layer, bindings);
        self.persistence
            .record_change(&self.table, sensor, layer, policy)
    }

    /// Resolved cells for layers `0..min(max_layers, MAX_LAYERS)`.
    pub fn get_all<D: DefaultBindings + ?Sized>(
        &self,
        sensor: SensorIndex,
        max_layers: usize,
        defaults: &D,
    ) -> Vec<LayerBindings, MAX_LAYERS> {
        LayerIndex::all()
            .take(max_layers)
            .map(|layer| self.get_resolved(sensor, layer, defaults))
            .collect()
    }

    pub fn has_pending_changes(&self) -> bool {
        self.persistence.has_pending()
    }

    /// Returns the number of store writes issued.
    pub fn flush_pending(&mut self) -> Result<usize, PersistError> {
        let writes = self.persistence.flush(&self.table)?;
        if writes > 0 {
            log::info!("bindings: flushed writes={writes}");
        }
        Ok(writes)
    }

    pub fn table(&self) -> &BindingTable {
        &self.table
    }

    pub fn persistence(&self) -> &PersistenceAdapter<S> {
        &self.persistence
    }

    pub fn persistence_mut(&mut self) -> &mut PersistenceAdapter<S> {
        &mut self.persistence
    }

    pub fn into_store(self) -> S {
        self.persistence.into_store()
    }
}
