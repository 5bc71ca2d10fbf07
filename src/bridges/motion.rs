// MIT License - Copyright (c) 2026 Peter Wright
// Motion sensor accessory bridge

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::SensorBinding;
use crate::accessory::{AccessoryHost, Characteristic};
use crate::config::SensorConfig;
use crate::event::RfRaw;

/// Maps one `(serial, loop)` of RF telemetry onto a motion-sensor accessory.
///
/// Polarity is inverted relative to [`ContactBridge`](super::ContactBridge):
/// a closed loop means no motion, so motion is reported only when the bit is clear.
pub struct MotionBridge {
    binding: SensorBinding,
    motion: Option<bool>,
    host: Arc<dyn AccessoryHost>,
}

impl MotionBridge {
    pub fn new(accessory: Uuid, sensor: &SensorConfig, host: Arc<dyn AccessoryHost>) -> Self {
        Self {
            binding: SensorBinding::new(accessory, sensor.serial.clone(), sensor.loop_index),
            motion: None,
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
        let detected = !reading.active;
        if self.motion != Some(detected) {
            debug!("Motion {}:{} -> {detected}", reading.serial_id, reading.loop_index);
            self.motion = Some(detected);
            self.host
                .update(self.binding.accessory, Characteristic::MotionDetected(detected));
        }
        true
    }
}
