use statig::{blocking::IntoStateMachineExt as _, prelude::*};

use super::{select_direction, TriggerSelection};
use crate::{
    accumulator::{AcceptOutcome, Accumulator},
    types::{SensorValue, TriggersPerRotation},
};

#[derive(Clone, Copy, Debug)]
enum ChannelEvent {
    Begin,
    Sample {
        value: SensorValue,
        triggers_per_rotation: TriggersPerRotation,
    },
    Commit,
    Discard,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SampleOutcome {
    Accepted { triggers: i32 },
    Duplicate,
    /// No cycle was open for this channel.
    OutsideCycle,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[repr(u8)]
pub enum ChannelPhase {
    #[default]
    Idle = 0,
    Accepting = 1,
}

#[derive(Default)]
struct ChannelContext {
    sample: Option<SampleOutcome>,
    selection: Option<TriggerSelection>,
}

/// Cycle state machine for one (sensor, layer) channel.
pub struct RotationChannel {
    machine: statig::blocking::StateMachine<ChannelHsm>,
}

impl Default for RotationChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl RotationChannel {
    pub fn new() -> Self {
        Self {
            machine: ChannelHsm::default().state_machine(),
        }
    }

    /// Opens a cycle: clears the trigger count and the accepted flag.
    pub fn begin(&mut self) {
        self.dispatch(ChannelEvent::Begin);
    }

    pub fn accept_sample(
        &mut self,
        value: SensorValue,
        triggers_per_rotation: TriggersPerRotation,
    ) -> SampleOutcome {
        self.dispatch(ChannelEvent::Sample {
            value,
            triggers_per_rotation,
        })
        .sample
        .unwrap_or(SampleOutcome::OutsideCycle)
    }

    /// Closes the cycle and reports which direction fired, if any.
    pub fn commit(&mut self) -> Option<TriggerSelection> {
        self.dispatch(ChannelEvent::Commit).selection
    }

    /// Closes the cycle without firing.
    pub fn discard(&mut self) {
        self.dispatch(ChannelEvent::Discard);
    }

    pub fn phase(&self) -> ChannelPhase {
        match self.machine.state() {
            State::Idle { .. } => ChannelPhase::Idle,
            State::Accepting { .. } => ChannelPhase::Accepting,
        }
    }

    pub fn accumulator(&self) -> &Accumulator {
        &self.machine.inner().accumulator
    }

    fn dispatch(&mut self, event: ChannelEvent) -> ChannelContext {
        let mut context = ChannelContext::default();
        self.machine.handle_with_context(&event, &mut context);
        context
    }
}

#[derive(Default)]
struct ChannelHsm {
    accumulator: Accumulator,
}

#[state_machine(initial = "State::idle()")]
impl ChannelHsm {
    #[state]
    fn idle(&mut self, context: &mut ChannelContext, event: &ChannelEvent) -> Outcome<State> {
        match event {
            ChannelEvent::Begin => {
                self.accumulator.reset();
                Transition(State::accepting())
            }
            ChannelEvent::Sample { .. } => {
                context.sample = Some(SampleOutcome::OutsideCycle);
                Handled
            }
            ChannelEvent::Commit | ChannelEvent::Discard => {
                self.accumulator.reset();
                Handled
            }
        }
    }

    #[state]
    fn accepting(&mut self, context: &mut ChannelContext, event: &ChannelEvent) -> Outcome<State> {
        match event {
            ChannelEvent::Begin => {
                self.accumulator.reset();
                Handled
            }
            ChannelEvent::Sample {
                value,
                triggers_per_rotation,
            } => {
                let outcome = match self
                    .accumulator
                    .accept_sample(*value, *triggers_per_rotation)
                {
                    AcceptOutcome::Accepted { triggers } => SampleOutcome::Accepted { triggers },
                    AcceptOutcome::AlreadyAccepted => SampleOutcome::Duplicate,
                };
                context.sample = Some(outcome);
                Handled
            }
            ChannelEvent::Commit => {
                let triggers = self.accumulator.take_triggers();
                context.selection = select_direction(triggers);
                Transition(State::idle())
            }
            ChannelEvent::Discard => {
                self.accumulator.reset();
                Transition(State::idle())
            }
        }
    }
}
