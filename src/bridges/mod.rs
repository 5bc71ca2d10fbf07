// MIT License - Copyright (c) 2026 Peter Wright
// Per-accessory device bridges

pub mod contact;
pub mod motion;
pub mod partition;

use uuid::Uuid;

use crate::accessory::{BatteryStatus, Characteristic};
use crate::event::RfRaw;
use crate::telemetry::{self, LoopIndex, SensorReading};

pub use contact::ContactBridge;
pub use motion::MotionBridge;
pub use partition::PartitionBridge;

/// The `(serial, loop)` binding and battery state shared by the RF sensor bridges.
#[derive(Debug, Clone)]
struct SensorBinding {
    accessory: Uuid,
    serial: String,
    loop_index: LoopIndex,
    battery: Option<BatteryStatus>,
}

impl SensorBinding {
    fn new(accessory: Uuid, serial: String, loop_index: LoopIndex) -> Self {
        Self {
            accessory,
            serial,
            loop_index,
            battery: None,
        }
    }

    fn read(&self, event: &RfRaw) -> Option<SensorReading> {
        telemetry::decode(event, &self.serial, self.loop_index)
    }

    /// The battery characteristic, if it differs from the last one pushed.
    fn battery_update(&mut self, reading: &SensorReading) -> Option<Characteristic> {
        let status = BatteryStatus::from_low(reading.battery_low);
        if self.battery == Some(status) {
            return None;
        }
        self.battery = Some(status);
        Some(Characteristic::StatusLowBattery(status))
    }
}

/// Either RF sensor bridge, so the orchestrator can fan telemetry out by serial.
pub enum SensorBridge {
    Contact(ContactBridge),
    Motion(MotionBridge),
}

impl SensorBridge {
    pub fn serial(&self) -> &str {
        match self {
            Self::Contact(b) => b.serial(),
            Self::Motion(b) => b.serial(),
        }
    }

    pub fn accessory(&self) -> Uuid {
        match self {
            Self::Contact(b) => b.accessory(),
            Self::Motion(b) => b.accessory(),
        }
    }

    /// Feed RF telemetry. Returns `false` when it was for another transmitter.
    pub fn on_rf(&mut self, event: &RfRaw) -> bool {
        match self {
            Self::Contact(b) => b.on_rf(event),
            Self::Motion(b) => b.on_rf(event),
        }
    }
}
