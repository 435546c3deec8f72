//! Runtime-configurable rotary sensor bindings.
//!
//! Raw incremental sensor readings are quantized into directional triggers,
//! resolved against a per-sensor, per-layer binding table (runtime override,
//! then compiled-in default, then nothing) and emitted as press/release pairs
//! to an external action queue. The binding table is persisted through an
//! abstract key/blob store and exposed to a configuration client through a
//! small request/response facade.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod accumulator;
pub mod bindings;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod facade;
pub mod service;
pub mod storage;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{Error, Malformed, OutOfRange, PersistError};
pub use service::SensorRotate;
pub use types::{
    ActionId, Binding, Direction, LayerBindings, LayerIndex, SensorIndex, SensorValue,
    TriggersPerRotation,
};
