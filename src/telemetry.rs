// MIT License - Copyright (c) 2026 Peter Wright
// RF sensor telemetry decoding

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::event::RfRaw;

/// One of the four inputs multiplexed onto a wireless transmitter (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct LoopIndex(u8);

impl LoopIndex {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 4;

    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Zero-based position into a [`Loops`] array.
    fn position(self) -> usize {
        (self.0 - 1) as usize
    }
}

impl TryFrom<i64> for LoopIndex {
    type Error = BridgeError;

    fn try_from(value: i64) -> Result<Self> {
        u8::try_from(value)
            .ok()
            .and_then(Self::new)
            .ok_or(BridgeError::InvalidLoop { value })
    }
}

impl TryFrom<u8> for LoopIndex {
    type Error = BridgeError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value).ok_or(BridgeError::InvalidLoop {
            value: i64::from(value),
        })
    }
}

impl From<LoopIndex> for u8 {
    fn from(index: LoopIndex) -> u8 {
        index.0
    }
}

impl fmt::Display for LoopIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four loop bits of a transmitter, `true` meaning closed/secure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Loops([bool; 4]);

impl Loops {
    pub fn new(bits: [bool; 4]) -> Self {
        Self(bits)
    }

    pub fn get(&self, index: LoopIndex) -> bool {
        self.0[index.position()]
    }

    /// Look up a loop by raw 1-based number; out-of-range numbers yield `None`.
    pub fn bit(&self, number: u8) -> Option<bool> {
        LoopIndex::new(number).map(|i| self.get(i))
    }

    pub fn as_array(&self) -> [bool; 4] {
        self.0
    }
}

/// A decoded reading for one `(serial, loop)` sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorReading {
    pub serial_id: String,
    pub loop_index: LoopIndex,
    pub battery_low: bool,
    /// The raw loop bit. Contact and motion sensors read it with opposite polarity.
    pub active: bool,
}

/// Decode `event` for the sensor bound to `(serial, loop_index)`.
///
/// Returns `None` when the telemetry belongs to another transmitter.
pub fn decode(event: &RfRaw, serial: &str, loop_index: LoopIndex) -> Option<SensorReading> {
    if event.serial != serial {
        return None;
    }
    Some(SensorReading {
        serial_id: event.serial.clone(),
        loop_index,
        battery_low: !event.battery,
        active: event.loops.get(loop_index),
    })
}

/// Like [`decode`], but with an unvalidated loop number. Never indexes out of bounds.
pub fn decode_raw(event: &RfRaw, serial: &str, loop_number: u8) -> Option<SensorReading> {
    LoopIndex::new(loop_number).and_then(|index| decode(event, serial, index))
}
