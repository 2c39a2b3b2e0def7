//! Shared message shapes for the device telemetry channel.
//!
//! Producers and consumers exchange [`WsEvent`] frames:
//!
//! ```json
//! { "type": "snapshot", "data": [ <DeviceState>, ... ] }
//! { "type": "telemetry", "data": <Telemetry> }
//! ```

pub mod errors;
pub mod model;
pub mod registry;
pub mod validate;

pub use errors::{Error, Result};
pub use model::{DeviceState, DoorState, Metrics, Telemetry, WsEvent};
pub use registry::DeviceRegistry;
pub use validate::{validate, validate_state};
