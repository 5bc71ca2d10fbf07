// MIT License - Copyright (c) 2026 Peter Wright
// Keypad message de-duplication

use tracing::debug;

use super::protocol::{KeypadMessage, Message};
use crate::event::PanelEvent;
use crate::partition::PartitionState;

/// Turns the periodic keypad broadcasts into change events.
///
/// The AD2USB repeats the keypad message every few seconds; only a change in
/// derived arm state or display text produces an event.
#[derive(Debug, Default)]
pub struct KeypadTracker {
    arm_state: Option<PartitionState>,
    text: Option<String>,
}

impl KeypadTracker {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Events for one parsed line, in emission order.
    pub fn ingest(&mut self, message: Message) -> Vec<PanelEvent> {
        match message {
            Message::Keypad(keypad) => self.keypad(keypad),
            Message::Rfx { serial, status } => vec![PanelEvent::RfRaw(status.to_event(&serial))],
            Message::Other(line) => {
                if !line.is_empty() {
                    debug!("Ignoring AD2USB message: {line}");
                }
                Vec::new()
            }
        }
    }

    fn keypad(&mut self, keypad: KeypadMessage) -> Vec<PanelEvent> {
        let mut events = Vec::new();
        let state = keypad.flags.arm_state();
        if self.arm_state != Some(state) {
            self.arm_state = Some(state);
            events.push(arm_event(state));
        }
        if self.text.as_deref() != Some(keypad.text.as_str()) {
            events.push(PanelEvent::LcdText {
                text: keypad.text.clone(),
            });
            self.text = Some(keypad.text);
        }
        events
    }
}

fn arm_event(state: PartitionState) -> PanelEvent {
    match state {
        PartitionState::AwayArmed => PanelEvent::ArmedAway,
        PartitionState::StayArmed => PanelEvent::ArmedStay,
        PartitionState::NightArmed => PanelEvent::ArmedNight,
        PartitionState::Disarmed => PanelEvent::Disarmed,
    }
}
