use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical state of a monitored door or gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoorState {
    Open,
    Closed,
    Moving,
    Error,
}

impl DoorState {
    /// Wire tag of this state
    pub fn as_str(&self) -> &'static str {
        match self {
            DoorState::Open => "open",
            DoorState::Closed => "closed",
            DoorState::Moving => "moving",
            DoorState::Error => "error",
        }
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Measurements carried by a single reading. Every field is optional and
/// absent fields are left out of the JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    /// Degrees Celsius
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_c: Option<f64>,
    /// Relative humidity in percent, expected within [0, 100]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub door_state: Option<DoorState>,
}

impl Metrics {
    pub fn with_temp_c(mut self, temp_c: f64) -> Self {
        self.temp_c = Some(temp_c);
        self
    }

    pub fn with_humidity(mut self, humidity: f64) -> Self {
        self.humidity = Some(humidity);
        self
    }

    pub fn with_door_state(mut self, door_state: DoorState) -> Self {
        self.door_state = Some(door_state);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.temp_c.is_none() && self.humidity.is_none() && self.door_state.is_none()
    }
}

/// One timestamped sensor reading from a device.
///
/// `ts` accepts RFC 3339 date-times (the extended ISO-8601 profile with
/// seconds and an offset). Other offsets are converted to UTC and fractional
/// seconds of zero are dropped, so `"2025-11-02T14:00:00.000+02:00"` is
/// written back as `"2025-11-02T12:00:00Z"`. Basic-format or minute-precision
/// ISO-8601 strings such as `"20251102T120000Z"` are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Telemetry {
    pub device_id: String,
    pub ts: DateTime<Utc>,
    pub metrics: Metrics,
}

impl Telemetry {
    pub fn new(device_id: impl Into<String>, ts: DateTime<Utc>, metrics: Metrics) -> Self {
        Self {
            device_id: device_id.into(),
            ts,
            metrics,
        }
    }
}

/// Last-known status of a device.
///
/// `last_seen` is expected to be at or after `last_telemetry.ts`, and
/// `device_id` to match `last_telemetry.device_id`. Neither is enforced by
/// the type; see [`crate::validate::validate_state`].
///
/// `last_seen` follows the same RFC 3339 rules as [`Telemetry::ts`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    pub device_id: String,
    pub last_seen: DateTime<Utc>,
    pub last_telemetry: Telemetry,
}

impl DeviceState {
    /// Builds a state from a reading, taking the device id from it
    pub fn new(last_seen: DateTime<Utc>, last_telemetry: Telemetry) -> Self {
        Self {
            device_id: last_telemetry.device_id.clone(),
            last_seen,
            last_telemetry,
        }
    }
}

/// Message carried over the websocket channel, discriminated by `type`
/// with the payload under `data`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum WsEvent {
    /// Full point-in-time view of all known devices
    Snapshot(Vec<DeviceState>),
    /// One incremental update
    Telemetry(Telemetry),
}

impl WsEvent {
    /// Value of the `type` discriminant
    pub fn kind(&self) -> &'static str {
        match self {
            WsEvent::Snapshot(_) => "snapshot",
            WsEvent::Telemetry(_) => "telemetry",
        }
    }
}

impl From<Telemetry> for WsEvent {
    fn from(telemetry: Telemetry) -> Self {
        WsEvent::Telemetry(telemetry)
    }
}
