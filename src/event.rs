// MIT License - Copyright (c) 2026 Peter Wright
// Panel event stream

use crate::telemetry::Loops;

/// Raw RF transmitter telemetry as reported by the panel driver.
///
/// Polarity is normalised by the driver: `battery` is `true` while the
/// transmitter battery is healthy, and each loop bit is `true` while that
/// loop is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfRaw {
    pub serial: String,
    /// Periodic check-in flag. Decoded, never acted upon.
    pub supervision: bool,
    pub battery: bool,
    pub loops: Loops,
}

impl RfRaw {
    pub fn new(
        serial: impl Into<String>,
        supervision: bool,
        battery: bool,
        loops: [bool; 4],
    ) -> Self {
        Self {
            serial: serial.into(),
            supervision,
            battery,
            loops: Loops::new(loops),
        }
    }
}

/// All events that can be emitted by the panel driver.
///
/// Users subscribe via `DriverHandle::subscribe()` to receive a
/// `tokio::sync::broadcast::Receiver<PanelEvent>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    /// TCP connection to the AD2USB appliance established
    Connected,
    /// TCP connection lost
    Disconnected,
    ArmedAway,
    ArmedStay,
    ArmedNight,
    Disarmed,
    /// Keypad display text changed
    LcdText { text: String },
    /// RF sensor telemetry
    RfRaw(RfRaw),
}

/// Type alias for the broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<PanelEvent>;

/// Type alias for the broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<PanelEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}
