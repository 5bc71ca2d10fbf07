// MIT License - Copyright (c) 2026 Peter Wright
// Accessory model exposed to the host framework

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::partition::PartitionState;

pub const MANUFACTURER: &str = "Honeywell/Ademco";
pub const MODEL: &str = "AD2USB";
pub const PARTITION_SERIAL_NUMBER: &str = "DefaultSerial";

/// UUID of the custom keypad display text characteristic (read/notify/write string).
pub const LCD_TEXT_UUID: &str = "fd837bd3-a17c-47f0-80c7-59fc24c10e40";

/// Accessory kinds this bridge exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessoryKind {
    SecuritySystem,
    ContactSensor,
    MotionSensor,
}

impl AccessoryKind {
    /// Characteristic names supported by the accessory's primary service.
    pub fn characteristics(self) -> &'static [&'static str] {
        match self {
            Self::SecuritySystem => &[
                "SecuritySystemCurrentState",
                "SecuritySystemTargetState",
                "LCDText",
            ],
            Self::ContactSensor => &["ContactSensorState", "StatusLowBattery"],
            Self::MotionSensor => &["MotionDetected", "StatusLowBattery"],
        }
    }
}

impl fmt::Display for AccessoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SecuritySystem => f.write_str("SecuritySystem"),
            Self::ContactSensor => f.write_str("ContactSensor"),
            Self::MotionSensor => f.write_str("MotionSensor"),
        }
    }
}

/// Accessory information service values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessoryInfo {
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
}

impl AccessoryInfo {
    pub fn new(serial_number: impl Into<String>) -> Self {
        Self {
            manufacturer: MANUFACTURER.to_string(),
            model: MODEL.to_string(),
            serial_number: serial_number.into(),
        }
    }
}

/// An accessory as registered with the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accessory {
    pub uuid: Uuid,
    pub kind: AccessoryKind,
    pub display_name: String,
    pub info: AccessoryInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactState {
    Detected,
    NotDetected,
}

impl ContactState {
    pub fn value(self) -> u8 {
        match self {
            Self::Detected => 0,
            Self::NotDetected => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatteryStatus {
    Normal,
    Low,
}

impl BatteryStatus {
    pub fn from_low(low: bool) -> Self {
        if low { Self::Low } else { Self::Normal }
    }

    pub fn value(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Low => 1,
        }
    }
}

/// A typed characteristic value pushed to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Characteristic {
    SecuritySystemCurrentState(PartitionState),
    SecuritySystemTargetState(PartitionState),
    LcdText(String),
    ContactSensorState(ContactState),
    MotionDetected(bool),
    StatusLowBattery(BatteryStatus),
}

impl Characteristic {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SecuritySystemCurrentState(_) => "SecuritySystemCurrentState",
            Self::SecuritySystemTargetState(_) => "SecuritySystemTargetState",
            Self::LcdText(_) => "LCDText",
            Self::ContactSensorState(_) => "ContactSensorState",
            Self::MotionDetected(_) => "MotionDetected",
            Self::StatusLowBattery(_) => "StatusLowBattery",
        }
    }

    /// Wire value as JSON.
    pub fn json_value(&self) -> serde_json::Value {
        match self {
            Self::SecuritySystemCurrentState(s) | Self::SecuritySystemTargetState(s) => {
                s.characteristic_value().into()
            }
            Self::LcdText(text) => text.as_str().into(),
            Self::ContactSensorState(c) => c.value().into(),
            Self::MotionDetected(detected) => (*detected).into(),
            Self::StatusLowBattery(b) => b.value().into(),
        }
    }
}

/// A client write against an accessory characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub accessory: Uuid,
    pub target_state: PartitionState,
}

/// The host accessory framework, as seen by the bridge.
///
/// Both calls must return without waiting on remote clients.
pub trait AccessoryHost: Send + Sync {
    /// Register a newly created accessory.
    fn register(&self, accessory: &Accessory) -> Result<()>;

    /// Push a characteristic value for a registered or restored accessory.
    fn update(&self, accessory: Uuid, value: Characteristic);
}
