// MIT License - Copyright (c) 2026 Peter Wright
// Security partition state machine

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;

/// Arm state of the single security partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PartitionState {
    #[default]
    Disarmed,
    AwayArmed,
    StayArmed,
    NightArmed,
}

impl PartitionState {
    pub const ALL: [PartitionState; 4] = [
        Self::Disarmed,
        Self::AwayArmed,
        Self::StayArmed,
        Self::NightArmed,
    ];

    /// Numeric value of the security-system current/target characteristics.
    ///
    /// `STAY_ARM=0, AWAY_ARM=1, NIGHT_ARM=2, DISARM(ED)=3`
    pub fn characteristic_value(self) -> u8 {
        match self {
            Self::StayArmed => 0,
            Self::AwayArmed => 1,
            Self::NightArmed => 2,
            Self::Disarmed => 3,
        }
    }

    pub fn from_characteristic_value(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::StayArmed),
            1 => Some(Self::AwayArmed),
            2 => Some(Self::NightArmed),
            3 => Some(Self::Disarmed),
            _ => None,
        }
    }

    /// Target-state name as used on the wire (`AWAY_ARM`, `DISARM`, ...).
    pub fn target_name(self) -> &'static str {
        match self {
            Self::StayArmed => "STAY_ARM",
            Self::AwayArmed => "AWAY_ARM",
            Self::NightArmed => "NIGHT_ARM",
            Self::Disarmed => "DISARM",
        }
    }

    pub fn from_target_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "STAY_ARM" => Some(Self::StayArmed),
            "AWAY_ARM" => Some(Self::AwayArmed),
            "NIGHT_ARM" => Some(Self::NightArmed),
            "DISARM" | "DISARMED" => Some(Self::Disarmed),
            _ => None,
        }
    }

    /// The panel command that requests this state.
    pub fn command(self) -> ArmCommand {
        match self {
            Self::AwayArmed => ArmCommand::ArmAway,
            Self::StayArmed => ArmCommand::ArmStay,
            Self::NightArmed => ArmCommand::ArmNight,
            Self::Disarmed => ArmCommand::Disarm,
        }
    }
}

impl fmt::Display for PartitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disarmed => "Disarmed",
            Self::AwayArmed => "Armed Away",
            Self::StayArmed => "Armed Stay",
            Self::NightArmed => "Armed Night",
        };
        f.write_str(s)
    }
}

/// Commands accepted by the panel driver. Each is parameterised by the user PIN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArmCommand {
    ArmAway,
    ArmStay,
    ArmNight,
    Disarm,
}

impl ArmCommand {
    pub fn name(self) -> &'static str {
        match self {
            Self::ArmAway => "armAway",
            Self::ArmStay => "armStay",
            Self::ArmNight => "armNight",
            Self::Disarm => "disarm",
        }
    }
}

/// One-way command channel into the panel driver.
///
/// Implementations must return immediately; confirmation arrives later as an
/// ordinary [`PanelEvent`](crate::event::PanelEvent).
pub trait CommandSink: Send + Sync {
    fn send(&self, command: ArmCommand, pin: &str) -> Result<()>;

    /// Ask the driver to re-emit the panel's current arm state and display
    /// text, e.g. after the event consumer lagged and may have missed them.
    fn resync(&self) {}
}

/// A characteristic-level change produced by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionChange {
    Current(PartitionState),
    Target(PartitionState),
    LcdText(String),
}

/// Current/target arm state of the one security partition.
///
/// `current` only moves on panel confirmation. `target` moves on confirmation
/// and, speculatively, on write requests. There is no timeout: an unconfirmed
/// command leaves the two diverged until the next confirming event.
#[derive(Debug, Clone)]
pub struct PartitionStateMachine {
    current: PartitionState,
    target: PartitionState,
    lcd_text: String,
    pin: String,
}

impl PartitionStateMachine {
    pub fn new(pin: impl Into<String>) -> Self {
        Self {
            current: PartitionState::Disarmed,
            target: PartitionState::Disarmed,
            lcd_text: String::new(),
            pin: pin.into(),
        }
    }

    pub fn current(&self) -> PartitionState {
        self.current
    }

    pub fn target(&self) -> PartitionState {
        self.target
    }

    /// Whether a commanded state is still awaiting panel confirmation.
    pub fn is_pending(&self) -> bool {
        self.current != self.target
    }

    /// Apply an authoritative arm/disarm confirmation from the panel.
    ///
    /// Returns the changes in the order they should be pushed (target first).
    pub fn confirm(&mut self, state: PartitionState) -> Vec<PartitionChange> {
        info!("{state}");
        let mut changes = Vec::new();
        if self.target != state {
            self.target = state;
            changes.push(PartitionChange::Target(state));
        }
        if self.current != state {
            self.current = state;
            changes.push(PartitionChange::Current(state));
        }
        changes
    }

    /// Record new keypad display text.
    pub fn display(&mut self, text: &str) -> Option<PartitionChange> {
        debug!("LCD - {text}");
        if self.lcd_text == text {
            return None;
        }
        self.lcd_text = text.to_string();
        Some(PartitionChange::LcdText(self.lcd_text.clone()))
    }

    /// Handle a client write of the target state.
    ///
    /// Issues exactly one command through `sink` and sets `target`
    /// speculatively, whether or not the sink accepts it. `current` is left
    /// alone until the panel confirms.
    pub fn request(&mut self, state: PartitionState, sink: &dyn CommandSink) -> Vec<PartitionChange> {
        let command = state.command();
        info!("{}: requesting {state}", command.name());
        if let Err(e) = sink.send(command, &self.pin) {
            warn!("{} not sent: {e}", command.name());
        }
        if self.target == state {
            return Vec::new();
        }
        self.target = state;
        vec![PartitionChange::Target(state)]
    }
}
