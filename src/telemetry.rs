use core::sync::atomic::{AtomicU32, Ordering};

#[derive(Default)]
pub struct Telemetry {
    samples_accepted: AtomicU32,
    samples_ignored: AtomicU32,
    dispatches: AtomicU32,
    pairs_emitted: AtomicU32,
    queue_rejections: AtomicU32,
    unresolved_actions: AtomicU32,
    persist_failures: AtomicU32,
    load_rejections: AtomicU32,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Snapshot {
    pub samples_accepted: u32,
    pub samples_ignored: u32,
    pub dispatches: u32,
    pub pairs_emitted: u32,
    pub queue_rejections: u32,
    pub unresolved_actions: u32,
    pub persist_failures: u32,
    pub load_rejections: u32,
}

impl Telemetry {
    pub const fn new() -> Self {
        Self {
            samples_accepted: AtomicU32::new(0),
            samples_ignored: AtomicU32::new(0),
            dispatches: AtomicU32::new(0),
            pairs_emitted: AtomicU32::new(0),
            queue_rejections: AtomicU32::new(0),
            unresolved_actions: AtomicU32::new(0),
            persist_failures: AtomicU32::new(0),
            load_rejections: AtomicU32::new(0),
        }
    }

    pub(crate) fn record_sample_accepted(&self) {
        self.samples_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sample_ignored(&self) {
        self.samples_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatch(&self, pairs: u32) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
        self.pairs_emitted.fetch_add(pairs, Ordering::Relaxed);
    }

    pub(crate) fn record_queue_rejection(&self, pairs_emitted: u32) {
        self.queue_rejections.fetch_add(1, Ordering::Relaxed);
        self.pairs_emitted.fetch_add(pairs_emitted, Ordering::Relaxed);
    }

    pub(crate) fn record_unresolved_action(&self) {
        self.unresolved_actions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_persist_failure(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_load_rejections(&self, count: usize) {
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        self.load_rejections.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            samples_accepted: self.samples_accepted.load(Ordering::Relaxed),
            samples_ignored: self.samples_ignored.load(Ordering::Relaxed),
            dispatches: self.dispatches.load(Ordering::Relaxed),
            pairs_emitted: self.pairs_emitted.load(Ordering::Relaxed),
            queue_rejections: self.queue_rejections.load(Ordering::Relaxed),
            unresolved_actions: self.unresolved_actions.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            load_rejections: self.load_rejections.load(Ordering::Relaxed),
        }
    }
}
