//! Request/response surface for a remote configuration client.
//!
//! Transport is the host's business: requests arrive typed, or as one ASCII
//! line through [`handle_line`]. Every failure becomes an error response;
//! nothing here panics on client input.

mod parser;

pub use parser::parse_request;

use core::fmt::{self, Write as _};

use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::{String, Vec};

use crate::{
    bindings::DefaultBindings,
    config::{sensor_name, MAX_LAYERS, MAX_SENSORS},
    error::Error,
    service::SensorRotate,
    storage::{CommitPolicy, KvStore},
    types::{Binding, Direction, LayerBindings, LayerIndex, SensorIndex},
};

pub const ERROR_MESSAGE_MAX: usize = 64;

pub type ErrorMessage = String<ERROR_MESSAGE_MAX>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Request {
    SetBinding {
        sensor: u32,
        layer: u32,
        direction: Direction,
        binding: Binding,
        /// Defer the store write until `SavePendingChanges`.
        skip_save: bool,
    },
    GetAllLayerBindings {
        sensor: u32,
    },
    GetSensors,
    HasPendingChanges,
    SavePendingChanges,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SensorInfo {
    pub index: u8,
    pub name: &'static str,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Response {
    BindingSet {
        has_pending_changes: bool,
    },
    LayerBindings {
        sensor: u8,
        layers: Vec<LayerBindings, MAX_LAYERS>,
        has_pending_changes: bool,
    },
    Sensors {
        sensors: Vec<SensorInfo, MAX_SENSORS>,
    },
    PendingChanges {
        has_pending_changes: bool,
    },
    Saved {
        has_pending_changes: bool,
    },
    Error {
        message: ErrorMessage,
        has_pending_changes: bool,
    },
}

impl Response {
    pub fn error(err: impl fmt::Display, has_pending_changes: bool) -> Self {
        let mut message = ErrorMessage::new();
        // Overlong messages are cut at capacity.
        let _ = write!(message, "{err}");
        Self::Error {
            message,
            has_pending_changes,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Error { .. })
    }

    pub fn has_pending_changes(&self) -> Option<bool> {
        match self {
            Self::BindingSet {
                has_pending_changes,
            }
            | Self::LayerBindings {
                has_pending_changes,
                ..
            }
            | Self::PendingChanges {
                has_pending_changes,
            }
            | Self::Saved {
                has_pending_changes,
            }
            | Self::Error {
                has_pending_changes,
                ..
            } => Some(*has_pending_changes),
            Self::Sensors { .. } => None,
        }
    }

    /// Renders the response as one `RSR OK ...` / `RSR ERR ...` line,
    /// without the terminator.
    pub fn write_line<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        match self {
            Self::BindingSet {
                has_pending_changes,
            } => write!(out, "RSR OK SET pending={}", u8::from(*has_pending_changes)),
            Self::LayerBindings {
                sensor,
                layers,
                has_pending_changes,
            } => {
                write!(
                    out,
                    "RSR OK GETALL s={sensor} pending={}",
                    u8::from(*has_pending_changes)
                )?;
                for (layer, bindings) in layers.iter().enumerate() {
                    write!(out, " l{layer}")?;
                    write_binding(out, "cw", &bindings.cw)?;
                    write_binding(out, "ccw", &bindings.ccw)?;
                }
                Ok(())
            }
            Self::Sensors { sensors } => {
                out.write_str("RSR OK SENSORS")?;
                for sensor in sensors {
                    write!(out, " {}={}", sensor.index, sensor.name)?;
                }
                Ok(())
            }
            Self::PendingChanges {
                has_pending_changes,
            } => write!(out, "RSR OK PENDING {}", u8::from(*has_pending_changes)),
            Self::Saved {
                has_pending_changes,
            } => write!(out, "RSR OK SAVE pending={}", u8::from(*has_pending_changes)),
            Self::Error { message, .. } => write!(out, "RSR ERR {message}"),
        }
    }
}

fn write_binding<W: fmt::Write>(out: &mut W, label: &str, binding: &Binding) -> fmt::Result {
    write!(
        out,
        " {label}={},0x{:08X},0x{:08X},{}",
        binding.action.0, binding.param1, binding.param2, binding.tap_ms
    )
}

/// Executes one typed request.
pub fn handle<M, S, D>(service: &SensorRotate<M, S, D>, request: Request) -> Response
where
    M: RawMutex,
    S: KvStore,
    D: DefaultBindings,
{
    match request {
        Request::SetBinding {
            sensor,
            layer,
            direction,
            binding,
            skip_save,
        } => {
            let policy = if skip_save {
                CommitPolicy::Deferred
            } else {
                CommitPolicy::Immediate
            };
            let indices = SensorIndex::try_from(sensor)
                .and_then(|sensor| Ok((sensor, LayerIndex::try_from(layer)?)));
            let (sensor, layer) = match indices {
                Ok((sensor, layer)) => (sensor.get(), layer.get()),
                Err(err) => return failed("set", err.into(), service.has_pending_changes()),
            };
            let report = service.set_direction_reported(sensor, layer, direction, binding, policy);
            match report.result {
                Ok(()) => {
                    log::info!(
                        "rpc: set s{sensor} l{layer} {} action={} deferred={skip_save}",
                        direction.as_str(),
                        binding.action.0
                    );
                    Response::BindingSet {
                        has_pending_changes: report.has_pending_changes,
                    }
                }
                Err(err) => failed("set", err, report.has_pending_changes),
            }
        }
        Request::GetAllLayerBindings { sensor } => {
            let layers = SensorIndex::try_from(sensor)
                .map_err(Error::from)
                .and_then(|sensor| {
                    let sensor = sensor.get();
                    Ok((sensor, service.get_all(sensor, MAX_LAYERS)?))
                });
            match layers {
                Ok((sensor, layers)) => Response::LayerBindings {
                    sensor,
                    layers,
                    has_pending_changes: service.has_pending_changes(),
                },
                Err(err) => failed("getall", err, service.has_pending_changes()),
            }
        }
        Request::GetSensors => Response::Sensors {
            sensors: (0..MAX_SENSORS)
                .filter_map(|index| {
                    Some(SensorInfo {
                        index: u8::try_from(index).ok()?,
                        name: sensor_name(index)?,
                    })
                })
                .collect(),
        },
        Request::HasPendingChanges => Response::PendingChanges {
            has_pending_changes: service.has_pending_changes(),
        },
        Request::SavePendingChanges => {
            let report = service.flush_pending_reported();
            match report.result {
                Ok(()) => Response::Saved {
                    has_pending_changes: report.has_pending_changes,
                },
                Err(err) => failed("save", err, report.has_pending_changes),
            }
        }
    }
}

/// Parses and executes one ASCII command line, then writes the response line.
pub fn handle_line<M, S, D, W>(
    service: &SensorRotate<M, S, D>,
    line: &[u8],
    out: &mut W,
) -> fmt::Result
where
    M: RawMutex,
    S: KvStore,
    D: DefaultBindings,
    W: fmt::Write,
{
    let response = match parse_request(line) {
        Ok(request) => handle(service, request),
        Err(err) => {
            log::warn!("rpc: malformed request: {err}");
            Response::error(Error::Malformed(err), service.has_pending_changes())
        }
    };
    response.write_line(out)
}

fn failed(op: &str, err: Error, has_pending_changes: bool) -> Response {
    log::warn!("rpc: {op} failed: {err}");
    Response::error(err, has_pending_changes)
}
