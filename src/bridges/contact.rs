// MIT License - Copyright (c) 2026 Peter Wright
// Contact sensor accessory bridge

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::SensorBinding;
use crate::accessory::{AccessoryHost, Characteristic, ContactState};
use crate::config::SensorConfig;
use crate::event::RfRaw;

/// Maps one `(serial, loop)` of RF telemetry onto a contact-sensor accessory.
///
/// A closed loop (bit set) reads as contact detected.
pub struct ContactBridge {
    binding: SensorBinding,
    contact: Option<ContactState>,
    host: Arc<dyn AccessoryHost>,
}

impl ContactBridge {
    pub fn new(accessory: Uuid, sensor: &SensorConfig, host: Arc<dyn AccessoryHost>) -> Self {
        Self {
            binding: SensorBinding::new(accessory, sensor.serial.clone(), sensor.loop_index),
            contact: None,
            host,
        }
    }

    pub fn serial(&self) -> &str {
        &self.binding.serial
    }

    pub fn accessory(&self) -> Uuid {
        self.binding.accessory
    }

    pub fn on_rf(&mut self, event: &RfRaw) -> bool {
        let Some(reading) = self.binding.read(event) else {
            return false;
        };
        if let Some(battery) = self.binding.battery_update(&reading) {
            self.host.update(self.binding.accessory, battery);
        }
        let state = if reading.active {
            ContactState::Detected
        } else {
            ContactState::NotDetected
        };
        if self.contact != Some(state) {
            debug!("Contact {}:{} -> {state:?}", reading.serial_id, reading.loop_index);
            self.contact = Some(state);
            self.host
                .update(self.binding.accessory, Characteristic::ContactSensorState(state));
        }
        true
    }
}
