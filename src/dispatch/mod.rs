//! Trigger resolution and press/release emission.

mod channel;

pub use channel::{ChannelPhase, RotationChannel, SampleOutcome};

use crate::types::{ActionId, Binding, Direction, LayerIndex, SensorIndex};

/// One press or release handed to the host action queue.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ActionEvent {
    pub sensor: SensorIndex,
    pub layer: LayerIndex,
    pub action: ActionId,
    pub param1: u32,
    pub param2: u32,
    pub pressed: bool,
    /// Hold time before the next queued event; zero on releases.
    pub tap_ms: u32,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QueueError {
    Rejected,
    /// The host has no behavior for this action id right now.
    UnresolvedAction,
}

/// Host capability that executes bindings.
pub trait ActionQueue {
    fn enqueue(&mut self, event: ActionEvent) -> Result<(), QueueError>;
}

impl<T: ActionQueue + ?Sized> ActionQueue for &mut T {
    fn enqueue(&mut self, event: ActionEvent) -> Result<(), QueueError> {
        (**self).enqueue(event)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TriggerSelection {
    pub direction: Direction,
    pub count: u32,
}

/// Positive counts fire CW, negative counts fire CCW with the sign dropped.
pub fn select_direction(triggers: i32) -> Option<TriggerSelection> {
    match triggers {
        0 => None,
        t if t > 0 => Some(TriggerSelection {
            direction: Direction::Cw,
            count: t.unsigned_abs(),
        }),
        t => Some(TriggerSelection {
            direction: Direction::Ccw,
            count: t.unsigned_abs(),
        }),
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DispatchOutcome {
    /// Nothing rotated this cycle.
    Idle,
    /// The selected direction has neither a runtime nor a default binding.
    NoBinding { direction: Direction },
    Dispatched { direction: Direction, pairs: u32 },
    /// Logged and dropped; expected while the client is reconfiguring.
    Unresolved { action: ActionId },
    /// The queue refused an event; remaining repetitions were skipped.
    Inconclusive { direction: Direction, pairs_emitted: u32 },
}

/// Emits `selection.count` press/release pairs for `binding`, stopping at the
/// first queue failure.
pub fn emit_pairs<Q: ActionQueue + ?Sized>(
    queue: &mut Q,
    sensor: SensorIndex,
    layer: LayerIndex,
    selection: TriggerSelection,
    binding: &Binding,
) -> DispatchOutcome {
    let direction = selection.direction;
    if !binding.is_configured() {
        log::debug!(
            "rotate: no binding s{} l{} {}",
            sensor.get(),
            layer.get(),
            direction.as_str()
        );
        return DispatchOutcome::NoBinding { direction };
    }

    log::debug!(
        "rotate: s{} l{} {} action={} triggers={} tap_ms={}",
        sensor.get(),
        layer.get(),
        direction.as_str(),
        binding.action.0,
        selection.count,
        binding.tap_ms
    );

    let event = |pressed: bool| ActionEvent {
        sensor,
        layer,
        action: binding.action,
        param1: binding.param1,
        param2: binding.param2,
        pressed,
        tap_ms: if pressed { binding.tap_ms } else { 0 },
    };

    for pairs_emitted in 0..selection.count {
        let result = queue
            .enqueue(event(true))
            .and_then(|()| queue.enqueue(event(false)));
        match result {
            Ok(()) => {}
            Err(QueueError::UnresolvedAction) => {
                log::warn!("rotate: action {} not resolvable", binding.action.0);
                return DispatchOutcome::Unresolved {
                    action: binding.action,
                };
            }
            Err(QueueError::Rejected) => {
                log::warn!(
                    "rotate: queue rejected s{} l{} after {pairs_emitted} pairs",
                    sensor.get(),
                    layer.get()
                );
                return DispatchOutcome::Inconclusive {
                    direction,
                    pairs_emitted,
                };
            }
        }
    }

    DispatchOutcome::Dispatched {
        direction,
        pairs: selection.count,
    }
}
