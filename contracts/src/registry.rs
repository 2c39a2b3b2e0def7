use crate::errors::Result;
use crate::model::{DeviceState, Telemetry, WsEvent};
use crate::validate::validate;
use chrono::{DateTime, Utc};
use std::collections::btree_map::{BTreeMap, Entry};
use tracing::debug;

/// Last-known state of every device that has reported, keyed by device id.
///
/// States built here always satisfy `last_seen >= last_telemetry.ts`.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<String, DeviceState>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a reading into the state of its device.
    ///
    /// A reading older than the stored one refreshes `last_seen` but does not
    /// replace `last_telemetry`.
    pub fn apply(&mut self, telemetry: Telemetry, received_at: DateTime<Utc>) -> &DeviceState {
        let seen = received_at.max(telemetry.ts);

        match self.devices.entry(telemetry.device_id.clone()) {
            Entry::Vacant(slot) => slot.insert(DeviceState::new(seen, telemetry)),
            Entry::Occupied(slot) => {
                let state = slot.into_mut();
                state.last_seen = state.last_seen.max(seen);

                if telemetry.ts >= state.last_telemetry.ts {
                    state.last_telemetry = telemetry;
                } else {
                    debug!(
                        "Stale telemetry for {}: {} is older than {}",
                        state.device_id,
                        telemetry.ts.to_rfc3339(),
                        state.last_telemetry.ts.to_rfc3339()
                    );
                }

                state
            }
        }
    }

    /// Parses a raw telemetry payload as a device publishes it, validates it
    /// and applies it
    pub fn ingest(&mut self, payload: &[u8], received_at: DateTime<Utc>) -> Result<&DeviceState> {
        let telemetry = serde_json::from_slice::<Telemetry>(payload)?;
        validate(&telemetry)?;

        Ok(self.apply(telemetry, received_at))
    }

    /// Merges a state taken from a snapshot, keeping the newer reading and
    /// the later `last_seen` of the stored and incoming states
    pub fn restore(&mut self, incoming: DeviceState) {
        match self.devices.entry(incoming.device_id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(incoming);
            }
            Entry::Occupied(slot) => {
                let state = slot.into_mut();
                state.last_seen = state.last_seen.max(incoming.last_seen);
                if incoming.last_telemetry.ts > state.last_telemetry.ts {
                    state.last_telemetry = incoming.last_telemetry;
                }
            }
        }
    }

    pub fn get(&self, device_id: &str) -> Option<&DeviceState> {
        self.devices.get(device_id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// States ordered by device id
    pub fn states(&self) -> impl Iterator<Item = &DeviceState> {
        self.devices.values()
    }

    /// Snapshot event of all known devices, ordered by device id
    pub fn snapshot(&self) -> WsEvent {
        WsEvent::Snapshot(self.states().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use crate::model::{DoorState, Metrics};
    use crate::validate::validate_state;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 2, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn reading(device_id: &str, ts: DateTime<Utc>, temp_c: f64) -> Telemetry {
        Telemetry::new(device_id, ts, Metrics::default().with_temp_c(temp_c))
    }

    #[test]
    fn test_apply_creates_device() {
        let mut registry = DeviceRegistry::new();
        assert!(registry.is_empty());

        let state = registry.apply(reading("gate-001", at(0), 21.5), at(1));
        assert_eq!(state.device_id, "gate-001");
        assert_eq!(state.last_seen, at(1));
        assert_eq!(state.last_telemetry.metrics.temp_c, Some(21.5));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_last_seen_never_precedes_telemetry() {
        let mut registry = DeviceRegistry::new();

        // device clock ahead of the receiver
        let state = registry.apply(reading("gate-001", at(10), 20.0), at(5));
        assert_eq!(state.last_seen, at(10));
        assert!(validate_state(state).is_ok());
    }

    #[test]
    fn test_newer_reading_replaces_last_telemetry() {
        let mut registry = DeviceRegistry::new();
        registry.apply(reading("gate-001", at(0), 20.0), at(0));
        registry.apply(reading("gate-001", at(30), 22.0), at(31));

        let state = registry.get("gate-001").unwrap();
        assert_eq!(state.last_telemetry.metrics.temp_c, Some(22.0));
        assert_eq!(state.last_seen, at(31));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_stale_reading_only_refreshes_last_seen() {
        let mut registry = DeviceRegistry::new();
        registry.apply(reading("gate-001", at(30), 22.0), at(30));
        registry.apply(reading("gate-001", at(10), 18.0), at(45));

        let state = registry.get("gate-001").unwrap();
        assert_eq!(state.last_telemetry.ts, at(30));
        assert_eq!(state.last_telemetry.metrics.temp_c, Some(22.0));
        assert_eq!(state.last_seen, at(45));
    }

    #[test]
    fn test_ingest_parses_and_applies() {
        let mut registry = DeviceRegistry::new();
        let payload = br#"{"deviceId":"tor-1","ts":"2025-11-02T12:00:00Z","metrics":{"doorState":"open"}}"#;

        let state = registry.ingest(payload, at(2)).unwrap();
        assert_eq!(state.device_id, "tor-1");
        assert_eq!(state.last_telemetry.metrics.door_state, Some(DoorState::Open));
    }

    #[test]
    fn test_ingest_rejects_invalid_json() {
        let mut registry = DeviceRegistry::new();

        assert!(matches!(registry.ingest(b"invalid json", at(0)), Err(Error::Json(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_ingest_rejects_out_of_range_humidity() {
        let mut registry = DeviceRegistry::new();
        let payload = br#"{"deviceId":"tor-1","ts":"2025-11-02T12:00:00Z","metrics":{"humidity":140}}"#;

        assert!(matches!(registry.ingest(payload, at(0)), Err(Error::Validation { .. })));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_restore_keeps_newer_data() {
        let mut registry = DeviceRegistry::new();
        registry.apply(reading("gate-001", at(20), 21.0), at(20));

        let older = DeviceState::new(at(60), reading("gate-001", at(5), 15.0));
        registry.restore(older);

        let state = registry.get("gate-001").unwrap();
        assert_eq!(state.last_telemetry.metrics.temp_c, Some(21.0));
        assert_eq!(state.last_seen, at(60));

        registry.restore(DeviceState::new(at(90), reading("gate-002", at(90), 19.0)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_restore_newer_snapshot_replaces_telemetry() {
        let mut registry = DeviceRegistry::new();
        registry.apply(reading("gate-001", at(20), 21.0), at(25));

        let newer = DeviceState::new(at(40), reading("gate-001", at(35), 23.5));
        registry.restore(newer.clone());

        let state = registry.get("gate-001").unwrap();
        assert_eq!(state, &newer);
        assert!(validate_state(state).is_ok());
    }

    #[test]
    fn test_restore_newer_telemetry_keeps_later_last_seen() {
        let mut registry = DeviceRegistry::new();
        registry.apply(reading("gate-001", at(20), 21.0), at(100));

        registry.restore(DeviceState::new(at(50), reading("gate-001", at(45), 23.5)));

        let state = registry.get("gate-001").unwrap();
        assert_eq!(state.last_telemetry.ts, at(45));
        assert_eq!(state.last_telemetry.metrics.temp_c, Some(23.5));
        assert_eq!(state.last_seen, at(100));
        assert!(validate_state(state).is_ok());
    }

    #[test]
    fn test_restore_equal_timestamp_keeps_stored_telemetry() {
        let mut registry = DeviceRegistry::new();
        registry.apply(reading("gate-001", at(30), 21.0), at(30));

        registry.restore(DeviceState::new(at(31), reading("gate-001", at(30), 99.0)));

        let state = registry.get("gate-001").unwrap();
        assert_eq!(state.last_telemetry.metrics.temp_c, Some(21.0));
        assert_eq!(state.last_seen, at(31));
        assert!(validate_state(state).is_ok());
    }

    #[test]
    fn test_snapshot_is_ordered_by_device_id() {
        let mut registry = DeviceRegistry::new();
        for id in ["gate-003", "gate-001", "gate-002"] {
            registry.apply(reading(id, at(0), 20.0), at(0));
        }

        match registry.snapshot() {
            WsEvent::Snapshot(states) => {
                let ids: Vec<&str> = states.iter().map(|s| s.device_id.as_str()).collect();
                assert_eq!(ids, ["gate-001", "gate-002", "gate-003"]);
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_registry_snapshot() {
        assert_eq!(DeviceRegistry::new().snapshot(), WsEvent::Snapshot(Vec::new()));
    }
}
