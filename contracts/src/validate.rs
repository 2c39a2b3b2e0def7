//! Opt-in checks for the documented expectations the wire shapes do not
//! enforce. Deserialization never calls these.

use crate::errors::{Error, Result};
use crate::model::{DeviceState, Telemetry};

const HUMIDITY_MIN: f64 = 0.0;
const HUMIDITY_MAX: f64 = 100.0;

/// Validates a telemetry reading
pub fn validate(telemetry: &Telemetry) -> Result<()> {
    if telemetry.device_id.is_empty() {
        return Err(Error::invalid("deviceId", "cannot be empty"));
    }

    if let Some(temp_c) = telemetry.metrics.temp_c {
        if !temp_c.is_finite() {
            return Err(Error::invalid(
                "metrics.tempC",
                format!("{} is not a finite number", temp_c),
            ));
        }
    }

    if let Some(humidity) = telemetry.metrics.humidity {
        // NaN is out of range
        if !(HUMIDITY_MIN..=HUMIDITY_MAX).contains(&humidity) {
            return Err(Error::invalid(
                "metrics.humidity",
                format!("{} out of range [{}, {}]", humidity, HUMIDITY_MIN, HUMIDITY_MAX),
            ));
        }
    }

    Ok(())
}

/// Validates a device state, including the reading it carries
pub fn validate_state(state: &DeviceState) -> Result<()> {
    validate(&state.last_telemetry)?;

    if state.device_id != state.last_telemetry.device_id {
        return Err(Error::invalid(
            "deviceId",
            format!(
                "{} does not match lastTelemetry.deviceId {}",
                state.device_id, state.last_telemetry.device_id
            ),
        ));
    }

    if state.last_seen < state.last_telemetry.ts {
        return Err(Error::invalid(
            "lastSeen",
            format!(
                "{} precedes lastTelemetry.ts {}",
                state.last_seen.to_rfc3339(),
                state.last_telemetry.ts.to_rfc3339()
            ),
        ));
    }

    Ok(())
}
