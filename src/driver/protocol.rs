// MIT License - Copyright (c) 2026 Peter Wright
// AD2USB line protocol

use bitflags::bitflags;

use crate::event::RfRaw;
use crate::partition::{ArmCommand, PartitionState};

bitflags! {
    /// Keypad status bits from the first bracketed field of a keypad message.
    ///
    /// Positions (0-based) in `[1000000100000000----]`:
    /// `READY AWAY HOME BACKLIGHT PROG beeps BYPASS AC CHIME ALARM_OCCURRED
    ///  ALARM_SOUNDING BATTERY_LOW INSTANT FIRE SYSTEM_ISSUE PERIMETER_ONLY`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KeypadFlags: u32 {
        const READY          = 1 << 0;
        const ARMED_AWAY     = 1 << 1;
        const ARMED_HOME     = 1 << 2;
        const BACKLIGHT      = 1 << 3;
        const PROGRAMMING    = 1 << 4;
        // position 5 is the beep count, not a flag
        const ZONE_BYPASSED  = 1 << 6;
        const AC_POWER       = 1 << 7;
        const CHIME          = 1 << 8;
        const ALARM_OCCURRED = 1 << 9;
        const ALARM_SOUNDING = 1 << 10;
        const BATTERY_LOW    = 1 << 11;
        /// Entry delay off (ARMED INSTANT / MAX)
        const ENTRY_DELAY_OFF = 1 << 12;
        const FIRE           = 1 << 13;
        const SYSTEM_ISSUE   = 1 << 14;
        const PERIMETER_ONLY = 1 << 15;
    }
}

const BEEP_POSITION: usize = 5;

impl KeypadFlags {
    /// Parse the bit field string. `'1'` sets the flag at that position.
    pub fn from_bits_str(s: &str) -> Self {
        let mut flags = Self::empty();
        for (i, ch) in s.chars().enumerate().take(16) {
            if i == BEEP_POSITION || ch != '1' {
                continue;
            }
            flags |= Self::from_bits_truncate(1 << i);
        }
        flags
    }

    /// Arm state implied by the keypad flags.
    pub fn arm_state(self) -> PartitionState {
        if self.contains(Self::ARMED_AWAY) {
            PartitionState::AwayArmed
        } else if self.contains(Self::ARMED_HOME) {
            if self.contains(Self::ENTRY_DELAY_OFF) {
                PartitionState::NightArmed
            } else {
                PartitionState::StayArmed
            }
        } else {
            PartitionState::Disarmed
        }
    }
}

bitflags! {
    /// Status byte of an `!RFX` message. Loop bits are set while the loop is faulted.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RfxStatus: u8 {
        const LOW_BATTERY = 0x02;
        const SUPERVISION = 0x04;
        const LOOP3       = 0x10;
        const LOOP2       = 0x20;
        const LOOP4       = 0x40;
        const LOOP1       = 0x80;
    }
}

impl RfxStatus {
    /// Convert to the normalised event form (battery healthy / loop closed).
    pub fn to_event(self, serial: &str) -> RfRaw {
        RfRaw::new(
            serial,
            self.contains(Self::SUPERVISION),
            !self.contains(Self::LOW_BATTERY),
            [
                !self.contains(Self::LOOP1),
                !self.contains(Self::LOOP2),
                !self.contains(Self::LOOP3),
                !self.contains(Self::LOOP4),
            ],
        )
    }
}

/// A keypad status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeypadMessage {
    pub flags: KeypadFlags,
    pub zone: String,
    pub text: String,
}

/// One decoded line from the AD2USB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Keypad(KeypadMessage),
    Rfx { serial: String, status: RfxStatus },
    /// Anything this bridge has no use for (`!EXP`, `!REL`, `!LRR`, `!Sending`, ...).
    Other(String),
}

/// Parse a single line (without its line terminator).
pub fn parse_line(line: &str) -> Message {
    let line = line.trim_end_matches(['\r', '\n']);
    if let Some(rest) = line.strip_prefix("!RFX:") {
        if let Some(msg) = parse_rfx(rest) {
            return msg;
        }
    } else if line.starts_with('[') {
        if let Some(msg) = parse_keypad(line) {
            return Message::Keypad(msg);
        }
    }
    Message::Other(line.to_string())
}

fn parse_rfx(rest: &str) -> Option<Message> {
    let (serial, status) = rest.split_once(',')?;
    let status = u8::from_str_radix(status.trim(), 16).ok()?;
    let serial = serial.trim();
    if serial.is_empty() {
        return None;
    }
    Some(Message::Rfx {
        serial: serial.to_string(),
        status: RfxStatus::from_bits_truncate(status),
    })
}

/// `[bits],zone,[raw],"alpha text"`
fn parse_keypad(line: &str) -> Option<KeypadMessage> {
    let close = line.find(']')?;
    let bits = &line[1..close];
    let rest = line[close + 1..].strip_prefix(',')?;
    let (zone, rest) = rest.split_once(',')?;
    let text_start = rest.find('"')?;
    let text_end = rest.rfind('"')?;
    if text_end <= text_start {
        return None;
    }
    Some(KeypadMessage {
        flags: KeypadFlags::from_bits_str(bits),
        zone: zone.to_string(),
        text: rest[text_start + 1..text_end].trim_end().to_string(),
    })
}

/// Keypad key sequence for a command.
pub fn keypad_sequence(command: ArmCommand, pin: &str) -> String {
    let suffix = match command {
        ArmCommand::Disarm => "1",
        ArmCommand::ArmAway => "2",
        ArmCommand::ArmStay => "3",
        ArmCommand::ArmNight => "33",
    };
    format!("{pin}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keypad_disarmed() {
        let msg = parse_line(
            r#"[1000000100000000----],008,[f70000051008001c28020000000000],"DISARMED CHIME   Ready to Arm  ""#,
        );
        let Message::Keypad(k) = msg else {
            panic!("expected keypad message, got {msg:?}");
        };
        assert!(k.flags.contains(KeypadFlags::READY));
        assert!(k.flags.contains(KeypadFlags::AC_POWER));
        assert!(!k.flags.contains(KeypadFlags::ARMED_AWAY));
        assert_eq!(k.zone, "008");
        assert_eq!(k.text, "DISARMED CHIME   Ready to Arm");
        assert_eq!(k.flags.arm_state(), PartitionState::Disarmed);
    }

    #[test]
    fn test_keypad_arm_states() {
        assert_eq!(
            KeypadFlags::from_bits_str("0100000100000000----").arm_state(),
            PartitionState::AwayArmed
        );
        assert_eq!(
            KeypadFlags::from_bits_str("0010000100000000----").arm_state(),
            PartitionState::StayArmed
        );
        assert_eq!(
            KeypadFlags::from_bits_str("0010000100001000----").arm_state(),
            PartitionState::NightArmed
        );
    }

    #[test]
    fn test_beep_position_not_a_flag() {
        let flags = KeypadFlags::from_bits_str("0000010000000000----");
        assert!(flags.is_empty());
    }

    #[test]
    fn test_parse_rfx() {
        let msg = parse_line("!RFX:0180036,80\r");
        assert_eq!(
            msg,
            Message::Rfx {
                serial: "0180036".to_string(),
                status: RfxStatus::LOOP1,
            }
        );
    }

    #[test]
    fn test_rfx_normalisation() {
        let event = (RfxStatus::LOW_BATTERY | RfxStatus::LOOP2).to_event("1234567");
        assert!(!event.battery);
        assert!(!event.supervision);
        assert_eq!(event.loops.as_array(), [true, false, true, true]);

        let event = RfxStatus::SUPERVISION.to_event("1234567");
        assert!(event.battery);
        assert!(event.supervision);
        assert_eq!(event.loops.as_array(), [true; 4]);
    }

    #[test]
    fn test_parse_other_lines() {
        assert!(matches!(parse_line("!EXP:07,01,01"), Message::Other(_)));
        assert!(matches!(parse_line("!Sending.done"), Message::Other(_)));
        assert!(matches!(parse_line("!RFX:bad"), Message::Other(_)));
        assert!(matches!(parse_line("[0000"), Message::Other(_)));
        assert!(matches!(parse_line(""), Message::Other(_)));
    }

    #[test]
    fn test_keypad_sequences() {
        assert_eq!(keypad_sequence(ArmCommand::Disarm, "1234"), "12341");
        assert_eq!(keypad_sequence(ArmCommand::ArmAway, "1234"), "12342");
        assert_eq!(keypad_sequence(ArmCommand::ArmStay, "1234"), "12343");
        assert_eq!(keypad_sequence(ArmCommand::ArmNight, "1234"), "123433");
    }
}
