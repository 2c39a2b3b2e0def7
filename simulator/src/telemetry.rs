use chrono::{DateTime, Utc};
use contracts::{DoorState, Metrics, Telemetry};
use rand::Rng;

const REPORT_PROBABILITY: f64 = 0.8;
const OUTLIER_PROBABILITY: f64 = 0.05;
const DOOR_CHANGE_PROBABILITY: f64 = 0.2;
const DOOR_FAULT_PROBABILITY: f64 = 0.01;

/// Door of a simulated gate, cycling
/// closed -> moving -> open -> moving -> closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoorCycle {
    state: DoorState,
    opening: bool,
}

impl Default for DoorCycle {
    fn default() -> Self {
        Self {
            state: DoorState::Closed,
            opening: false,
        }
    }
}

impl DoorCycle {
    pub fn state(&self) -> DoorState {
        self.state
    }

    /// Moves to the next position of the cycle. A faulted door recovers to closed.
    pub fn advance(&mut self) {
        let (state, opening) = match self.state {
            DoorState::Closed => (DoorState::Moving, true),
            DoorState::Moving if self.opening => (DoorState::Open, false),
            DoorState::Moving => (DoorState::Closed, false),
            DoorState::Open => (DoorState::Moving, false),
            DoorState::Error => (DoorState::Closed, false),
        };
        self.state = state;
        self.opening = opening;
    }

    pub fn fault(&mut self) {
        self.state = DoorState::Error;
    }
}

#[derive(Debug, Clone)]
pub struct SimDevice {
    pub device_id: String,
    base_temp_c: f64,
    temp_c: f64,
    humidity: f64,
    door: DoorCycle,
}

impl SimDevice {
    pub fn new(device_id: String, rng: &mut impl Rng) -> Self {
        let base_temp_c = rng.gen_range(15.0..25.0);
        Self {
            device_id,
            base_temp_c,
            temp_c: base_temp_c,
            humidity: rng.gen_range(30.0..80.0),
            door: DoorCycle::default(),
        }
    }

    /// Steps the device and reports a random subset of its metrics
    pub fn next_reading(&mut self, rng: &mut impl Rng, ts: DateTime<Utc>) -> Telemetry {
        // Drift back toward the baseline
        self.temp_c += rng.gen_range(-0.3..0.3) + (self.base_temp_c - self.temp_c) * 0.1;
        self.humidity = (self.humidity + rng.gen_range(-1.0..1.0)).clamp(0.0, 100.0);

        let door_before = self.door.state();
        if rng.gen_bool(DOOR_FAULT_PROBABILITY) {
            self.door.fault();
        } else if self.door.state() == DoorState::Moving
            || self.door.state() == DoorState::Error
            || rng.gen_bool(DOOR_CHANGE_PROBABILITY)
        {
            self.door.advance();
        }

        let mut metrics = Metrics::default();
        if rng.gen_bool(REPORT_PROBABILITY) {
            let temp_c = if rng.gen_bool(OUTLIER_PROBABILITY) {
                rng.gen_range(-50.0..100.0) // 5% outliers
            } else {
                self.temp_c
            };
            metrics = metrics.with_temp_c(round_tenths(temp_c));
        }
        if rng.gen_bool(REPORT_PROBABILITY) {
            metrics = metrics.with_humidity(round_tenths(self.humidity));
        }
        // Door changes are always reported
        if self.door.state() != door_before || rng.gen_bool(REPORT_PROBABILITY) {
            metrics = metrics.with_door_state(self.door.state());
        }

        Telemetry::new(self.device_id.clone(), ts, metrics)
    }
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Formats the id of the `index`-th device, counting from 1
pub fn device_id(prefix: &str, index: usize) -> String {
    format!("{}-{:03}", prefix, index)
}

#[derive(Debug, Clone)]
pub struct Fleet {
    devices: Vec<SimDevice>,
}

impl Fleet {
    pub fn new(prefix: &str, size: usize, rng: &mut impl Rng) -> Self {
        let devices = (1..=size)
            .map(|index| SimDevice::new(device_id(prefix, index), &mut *rng))
            .collect();
        Self { devices }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn devices_mut(&mut self) -> impl Iterator<Item = &mut SimDevice> {
        self.devices.iter_mut()
    }
}
