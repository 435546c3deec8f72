//! The process-wide owner of the binding store and the rotation channels.
//!
//! Hosts construct one [`SensorRotate`] at startup and hand out references to
//! the sampling path and the configuration facade. Bindings and channels sit
//! behind separate locks, no call holds both, and the action queue is always
//! driven with both released.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::RawMutex, Mutex};
use heapless::Vec;

use crate::{
    bindings::{BindingStore, CompiledDefaults, DefaultBindings},
    config::{MAX_LAYERS, MAX_SENSORS, PERSIST_GRANULARITY, SETTINGS_NAMESPACE},
    dispatch::{emit_pairs, ActionQueue, DispatchOutcome, RotationChannel, SampleOutcome},
    error::{Error, PersistError},
    storage::{CommitPolicy, KvStore, LoadReport, PersistGranularity},
    telemetry::Telemetry,
    types::{
        Binding, Direction, LayerBindings, LayerIndex, SensorIndex, SensorValue,
        TriggersPerRotation,
    },
};

type ChannelBank = [[RotationChannel; MAX_LAYERS]; MAX_SENSORS];

/// Outcome of a store mutation and the pending flag as it stood when the
/// binding lock was released.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CommitReport {
    pub result: Result<(), Error>,
    pub has_pending_changes: bool,
}

pub struct SensorRotate<M: RawMutex, S, D = CompiledDefaults> {
    bindings: Mutex<M, RefCell<BindingStore<S>>>,
    channels: Mutex<M, RefCell<ChannelBank>>,
    defaults: D,
    telemetry: Telemetry,
}

impl<M: RawMutex, S: KvStore> SensorRotate<M, S, CompiledDefaults> {
    /// Wires the generated configuration: compiled-in defaults, namespace and
    /// persistence granularity.
    pub fn from_config(store: S) -> Self {
        Self::new(store, CompiledDefaults, PERSIST_GRANULARITY, SETTINGS_NAMESPACE)
    }
}

impl<M: RawMutex, S: KvStore, D: DefaultBindings> SensorRotate<M, S, D> {
    pub fn new(
        store: S,
        defaults: D,
        granularity: PersistGranularity,
        namespace: &'static str,
    ) -> Self {
        Self {
            bindings: Mutex::new(RefCell::new(BindingStore::new(
                store,
                granularity,
                namespace,
            ))),
            channels: Mutex::new(RefCell::new(core::array::from_fn(|_| {
                core::array::from_fn(|_| RotationChannel::new())
            }))),
            defaults,
            telemetry: Telemetry::new(),
        }
    }

    /// Tears the owner down and hands back the backing store.
    pub fn into_store(self) -> S {
        self.bindings.into_inner().into_inner().into_store()
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Runs `f` with shared access to the binding store.
    pub fn with_bindings<R>(&self, f: impl FnOnce(&BindingStore<S>) -> R) -> R {
        self.bindings.lock(|store| f(&store.borrow()))
    }

    pub(crate) fn with_bindings_mut<R>(&self, f: impl FnOnce(&mut BindingStore<S>) -> R) -> R {
        self.bindings.lock(|store| f(&mut store.borrow_mut()))
    }

    fn with_channel<R>(
        &self,
        sensor: SensorIndex,
        layer: LayerIndex,
        f: impl FnOnce(&mut RotationChannel) -> R,
    ) -> R {
        self.channels.lock(|bank| {
            let mut bank = bank.borrow_mut();
            f(&mut bank[sensor.as_usize()][layer.as_usize()])
        })
    }

    /// Hydrates the table from the store. Bad records are skipped.
    pub fn load_persisted(&self) -> Result<LoadReport, Error> {
        let report = self.with_bindings_mut(BindingStore::load_all)?;
        self.telemetry.record_load_rejections(report.rejected);
        Ok(report)
    }

    pub fn get_bindings(&self, sensor: u8, layer: u8) -> Result<LayerBindings, Error> {
        let sensor = SensorIndex::new(sensor)?;
        let layer = LayerIndex::new(layer)?;
        Ok(self.with_bindings(|store| store.get(sensor, layer)))
    }

    pub fn get_resolved(&self, sensor: u8, layer: u8) -> Result<LayerBindings, Error> {
        let sensor = SensorIndex::new(sensor)?;
        let layer = LayerIndex::new(layer)?;
        Ok(self.with_bindings(|store| store.get_resolved(sensor, layer, &self.defaults)))
    }

    pub fn set_bindings(
        &self,
        sensor: u8,
        layer: u8,
        bindings: LayerBindings,
        policy: CommitPolicy,
    ) -> Result<(), Error> {
        let sensor = SensorIndex::new(sensor)?;
        let layer = LayerIndex::new(layer)?;
        self.with_bindings_mut(|store| store.set(sensor, layer, bindings, policy))
            .map_err(|err| self.persist_failed(err))
    }

    /// Read-modify-write of one direction. The other direction keeps its
    /// stored value, so an unset direction keeps following its default.
    pub fn set_direction(
        &self,
        sensor: u8,
        layer: u8,
        direction: Direction,
        binding: Binding,
        policy: CommitPolicy,
    ) -> Result<(), Error> {
        self.set_direction_reported(sensor, layer, direction, binding, policy)
            .result
    }

    /// [`Self::set_direction`], also sampling the pending flag inside the
    /// same critical section as the write.
    pub fn set_direction_reported(
        &self,
        sensor: u8,
        layer: u8,
        direction: Direction,
        binding: Binding,
        policy: CommitPolicy,
    ) -> CommitReport {
        let (sensor, layer) = match (SensorIndex::new(sensor), LayerIndex::new(layer)) {
            (Ok(sensor), Ok(layer)) => (sensor, layer),
            (Err(err), _) | (_, Err(err)) => return self.rejected(err.into()),
        };
        let (result, has_pending_changes) = self.with_bindings_mut(|store| {
            let mut cell = store.get(sensor, layer);
            cell.set(direction, binding);
            let result = store.set(sensor, layer, cell, policy);
            (result, store.has_pending_changes())
        });
        CommitReport {
            result: result.map_err(|err| self.persist_failed(err)),
            has_pending_changes,
        }
    }

    /// Resolved cells for layers `0..min(max_layers, MAX_LAYERS)`, locking
    /// once per layer.
    pub fn get_all(
        &self,
        sensor: u8,
        max_layers: usize,
    ) -> Result<Vec<LayerBindings, MAX_LAYERS>, Error> {
        let sensor = SensorIndex::new(sensor)?;
        Ok(LayerIndex::all()
            .take(max_layers)
            .map(|layer| {
                self.with_bindings(|store| store.get_resolved(sensor, layer, &self.defaults))
            })
            .collect())
    }

    pub fn has_pending_changes(&self) -> bool {
        self.with_bindings(BindingStore::has_pending_changes)
    }

    /// Commits every deferred change. The pending flag stays raised on failure.
    pub fn flush_pending(&self) -> Result<(), Error> {
        self.flush_pending_reported().result
    }

    /// [`Self::flush_pending`], also sampling the pending flag inside the
    /// same critical section as the flush.
    pub fn flush_pending_reported(&self) -> CommitReport {
        let (result, has_pending_changes) = self.with_bindings_mut(|store| {
            let result = store.flush_pending().map(|_| ());
            (result, store.has_pending_changes())
        });
        CommitReport {
            result: result.map_err(|err| self.persist_failed(err)),
            has_pending_changes,
        }
    }

    /// Opens a processing cycle for one channel.
    pub fn begin_cycle(&self, sensor: u8, layer: u8) -> Result<(), Error> {
        let sensor = SensorIndex::new(sensor)?;
        let layer = LayerIndex::new(layer)?;
        self.with_channel(sensor, layer, RotationChannel::begin);
        Ok(())
    }

    pub fn accept_sample(
        &self,
        sensor: u8,
        layer: u8,
        value: SensorValue,
        triggers_per_rotation: TriggersPerRotation,
    ) -> Result<SampleOutcome, Error> {
        let sensor = SensorIndex::new(sensor)?;
        let layer = LayerIndex::new(layer)?;
        let outcome = self.with_channel(sensor, layer, |channel| {
            channel.accept_sample(value, triggers_per_rotation)
        });

        match outcome {
            SampleOutcome::Accepted { triggers } => {
                self.telemetry.record_sample_accepted();
                log::debug!(
                    "rotate: s{} l{} val1={} val2={} triggers={triggers}",
                    sensor.get(),
                    layer.get(),
                    value.val1,
                    value.val2
                );
            }
            SampleOutcome::Duplicate => {
                self.telemetry.record_sample_ignored();
                log::debug!(
                    "rotate: s{} l{} already accepted this cycle",
                    sensor.get(),
                    layer.get()
                );
            }
            SampleOutcome::OutsideCycle => {
                self.telemetry.record_sample_ignored();
                log::warn!(
                    "rotate: s{} l{} sample outside cycle",
                    sensor.get(),
                    layer.get()
                );
            }
        }
        Ok(outcome)
    }

    /// Closes the cycle, resolves the binding for the direction that fired and
    /// emits one press/release pair per trigger.
    pub fn commit_cycle<Q: ActionQueue + ?Sized>(
        &self,
        sensor: u8,
        layer: u8,
        queue: &mut Q,
    ) -> Result<DispatchOutcome, Error> {
        let sensor = SensorIndex::new(sensor)?;
        let layer = LayerIndex::new(layer)?;

        let Some(selection) = self.with_channel(sensor, layer, RotationChannel::commit) else {
            return Ok(DispatchOutcome::Idle);
        };
        let resolved =
            self.with_bindings(|store| store.get_resolved(sensor, layer, &self.defaults));
        let binding = *resolved.get(selection.direction);

        let outcome = emit_pairs(queue, sensor, layer, selection, &binding);
        match outcome {
            DispatchOutcome::Dispatched { pairs, .. } => self.telemetry.record_dispatch(pairs),
            DispatchOutcome::Inconclusive { pairs_emitted, .. } => {
                self.telemetry.record_queue_rejection(pairs_emitted)
            }
            DispatchOutcome::Unresolved { .. } => self.telemetry.record_unresolved_action(),
            DispatchOutcome::Idle | DispatchOutcome::NoBinding { .. } => {}
        }
        Ok(outcome)
    }

    /// Closes the cycle without dispatching; used for layers that are not
    /// the one being processed.
    pub fn discard_cycle(&self, sensor: u8, layer: u8) -> Result<(), Error> {
        let sensor = SensorIndex::new(sensor)?;
        let layer = LayerIndex::new(layer)?;
        self.with_channel(sensor, layer, RotationChannel::discard);
        Ok(())
    }

    /// One full cycle: begin, accept `value`, commit.
    pub fn process_sample<Q: ActionQueue + ?Sized>(
        &self,
        sensor: u8,
        layer: u8,
        value: SensorValue,
        triggers_per_rotation: TriggersPerRotation,
        queue: &mut Q,
    ) -> Result<DispatchOutcome, Error> {
        self.begin_cycle(sensor, layer)?;
        self.accept_sample(sensor, layer, value, triggers_per_rotation)?;
        self.commit_cycle(sensor, layer, queue)
    }

    /// Remainder carried by a channel across cycles.
    pub fn remainder(&self, sensor: u8, layer: u8) -> Result<SensorValue, Error> {
        let sensor = SensorIndex::new(sensor)?;
        let layer = LayerIndex::new(layer)?;
        Ok(self.with_channel(sensor, layer, |channel| channel.accumulator().remainder()))
    }

    fn rejected(&self, err: Error) -> CommitReport {
        CommitReport {
            result: Err(err),
            has_pending_changes: self.has_pending_changes(),
        }
    }

    fn persist_failed(&self, err: PersistError) -> Error {
        self.telemetry.record_persist_failure();
        Error::Persist(err)
    }
}
