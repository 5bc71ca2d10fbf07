// MIT License - Copyright (c) 2026 Peter Wright
// Security system accessory bridge

use std::sync::Arc;

use uuid::Uuid;

use crate::accessory::{AccessoryHost, Characteristic};
use crate::partition::{CommandSink, PartitionChange, PartitionState, PartitionStateMachine};

/// Binds the partition state machine to a security-system accessory.
pub struct PartitionBridge {
    accessory: Uuid,
    machine: PartitionStateMachine,
    host: Arc<dyn AccessoryHost>,
    sink: Arc<dyn CommandSink>,
}

impl PartitionBridge {
    /// Create the bridge and push the initial `Disarmed` values.
    pub fn new(
        accessory: Uuid,
        pin: impl Into<String>,
        host: Arc<dyn AccessoryHost>,
        sink: Arc<dyn CommandSink>,
    ) -> Self {
        let bridge = Self {
            accessory,
            machine: PartitionStateMachine::new(pin),
            host,
            sink,
        };
        bridge.push(PartitionChange::Target(bridge.machine.target()));
        bridge.push(PartitionChange::Current(bridge.machine.current()));
        bridge
    }

    pub fn accessory(&self) -> Uuid {
        self.accessory
    }

    pub fn state(&self) -> &PartitionStateMachine {
        &self.machine
    }

    /// Panel confirmed an arm state.
    pub fn on_arm_state(&mut self, state: PartitionState) {
        for change in self.machine.confirm(state) {
            self.push(change);
        }
    }

    /// Panel keypad text changed.
    pub fn on_lcd_text(&mut self, text: &str) {
        if let Some(change) = self.machine.display(text) {
            self.push(change);
        }
    }

    /// A client wrote the target-state characteristic.
    pub fn on_target_write(&mut self, state: PartitionState) {
        for change in self.machine.request(state, self.sink.as_ref()) {
            self.push(change);
        }
    }

    fn push(&self, change: PartitionChange) {
        let value = match change {
            PartitionChange::Current(s) => Characteristic::SecuritySystemCurrentState(s),
            PartitionChange::Target(s) => Characteristic::SecuritySystemTargetState(s),
            PartitionChange::LcdText(text) => Characteristic::LcdText(text),
        };
        self.host.update(self.accessory, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridges::test_support::{RecordingHost, RecordingSink};
    use crate::partition::ArmCommand;

    fn bridge() -> (PartitionBridge, Arc<RecordingHost>, Arc<RecordingSink>) {
        let host = Arc::new(RecordingHost::default());
        let sink = Arc::new(RecordingSink::default());
        let bridge = PartitionBridge::new(Uuid::from_u128(1), "1234", host.clone(), sink.clone());
        (bridge, host, sink)
    }

    #[test]
    fn test_initial_values_disarmed() {
        let (_bridge, host, _) = bridge();
        let updates: Vec<_> = host.take_updates().into_iter().map(|(_, c)| c).collect();
        assert_eq!(
            updates,
            vec![
                Characteristic::SecuritySystemTargetState(PartitionState::Disarmed),
                Characteristic::SecuritySystemCurrentState(PartitionState::Disarmed),
            ]
        );
    }

    #[test]
    fn test_armed_stay_updates_both() {
        let (mut bridge, host, _) = bridge();
        host.take_updates();
        bridge.on_arm_state(PartitionState::StayArmed);
        let updates: Vec<_> = host.take_updates().into_iter().map(|(_, c)| c).collect();
        assert_eq!(
            updates,
            vec![
                Characteristic::SecuritySystemTargetState(PartitionState::StayArmed),
                Characteristic::SecuritySystemCurrentState(PartitionState::StayArmed),
            ]
        );
        bridge.on_arm_state(PartitionState::StayArmed);
        assert!(host.take_updates().is_empty());
    }

    #[test]
    fn test_disarm_write_while_stay_armed() {
        let (mut bridge, host, sink) = bridge();
        bridge.on_arm_state(PartitionState::StayArmed);
        host.take_updates();

        bridge.on_target_write(PartitionState::Disarmed);
        assert_eq!(
            *sink.sent.lock().unwrap(),
            vec![(ArmCommand::Disarm, "1234".to_string())]
        );
        assert_eq!(bridge.state().target(), PartitionState::Disarmed);
        assert_eq!(bridge.state().current(), PartitionState::StayArmed);
        assert_eq!(
            host.take_updates(),
            vec![(
                Uuid::from_u128(1),
                Characteristic::SecuritySystemTargetState(PartitionState::Disarmed)
            )]
        );

        bridge.on_arm_state(PartitionState::Disarmed);
        assert_eq!(bridge.state().current(), PartitionState::Disarmed);
    }

    #[test]
    fn test_write_while_disconnected_still_moves_target() {
        let (mut bridge, host, sink) = bridge();
        host.take_updates();
        sink.disconnected
            .store(true, std::sync::atomic::Ordering::SeqCst);

        bridge.on_target_write(PartitionState::AwayArmed);
        assert_eq!(sink.sent.lock().unwrap().len(), 1);
        assert_eq!(bridge.state().target(), PartitionState::AwayArmed);
        assert_eq!(bridge.state().current(), PartitionState::Disarmed);
        assert_eq!(
            host.take_updates(),
            vec![(
                Uuid::from_u128(1),
                Characteristic::SecuritySystemTargetState(PartitionState::AwayArmed)
            )]
        );
    }

    #[test]
    fn test_lcd_text_forwarded_verbatim() {
        let (mut bridge, host, _) = bridge();
        host.take_updates();
        bridge.on_lcd_text("ARMED ***STAY***");
        assert_eq!(
            host.take_updates(),
            vec![(Uuid::from_u128(1), Characteristic::LcdText("ARMED ***STAY***".into()))]
        );
        assert_eq!(bridge.state().current(), PartitionState::Disarmed);
    }
}
