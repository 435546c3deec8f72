//! Fixed-point delta accumulation for one (sensor, layer) channel.
//!
//! Raw readings are integer degrees plus micro-degrees. The remainder carries
//! sub-trigger rotation across cycles; only the trigger count and the
//! accepted flag are cycle-scoped.

use crate::types::{SensorValue, TriggersPerRotation};

pub const MICRO_PER_DEGREE: i32 = 1_000_000;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AcceptOutcome {
    Accepted { triggers: i32 },
    /// A sample was already taken this cycle; the reading was dropped.
    AlreadyAccepted,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Accumulator {
    remainder: SensorValue,
    triggers: i32,
    accepted: bool,
}

impl Accumulator {
    pub const fn new() -> Self {
        Self {
            remainder: SensorValue::new(0, 0),
            triggers: 0,
            accepted: false,
        }
    }

    pub fn accept_sample(
        &mut self,
        value: SensorValue,
        triggers_per_rotation: TriggersPerRotation,
    ) -> AcceptOutcome {
        if self.accepted {
            return AcceptOutcome::AlreadyAccepted;
        }
        self.accepted = true;

        let triggers = if value.val1 == 0 {
            // Driver already reports discrete ticks.
            value.val2
        } else {
            let mut remainder = self.remainder;
            remainder.val1 = remainder.val1.saturating_add(value.val1);
            remainder.val2 = remainder.val2.saturating_add(value.val2);

            // Truncating division: the carry follows the sign of val2 and
            // mixed-sign remainders are left as they are.
            if remainder.val2 >= MICRO_PER_DEGREE || remainder.val2 <= -MICRO_PER_DEGREE {
                remainder.val1 = remainder.val1.saturating_add(remainder.val2 / MICRO_PER_DEGREE);
                remainder.val2 %= MICRO_PER_DEGREE;
            }

            let trigger_degrees = triggers_per_rotation.trigger_degrees();
            let triggers = remainder.val1 / trigger_degrees;
            remainder.val1 %= trigger_degrees;

            self.remainder = remainder;
            triggers
        };

        self.triggers = triggers;
        AcceptOutcome::Accepted { triggers }
    }

    /// Starts a new cycle. The carried remainder survives.
    pub fn reset(&mut self) {
        self.triggers = 0;
        self.accepted = false;
    }

    /// Hands out this cycle's trigger count and closes the cycle.
    pub fn take_triggers(&mut self) -> i32 {
        let triggers = self.triggers;
        self.reset();
        triggers
    }

    pub const fn triggers(&self) -> i32 {
        self.triggers
    }

    pub const fn remainder(&self) -> SensorValue {
        self.remainder
    }

    pub const fn is_accepted(&self) -> bool {
        self.accepted
    }
}
