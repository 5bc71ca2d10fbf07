// MIT License - Copyright (c) 2026 Peter Wright
// MQTT accessory host

use chrono::Utc;
use rumqttc::{AsyncClient, QoS};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};
use uuid::Uuid;

use crate::accessory::{
    Accessory, AccessoryHost, AccessoryKind, Characteristic, LCD_TEXT_UUID, WriteRequest,
};
use crate::error::{BridgeError, Result};
use crate::partition::PartitionState;

// ---------------------------------------------------------------------------
// MQTT JSON types
// ---------------------------------------------------------------------------

// Accessory description: <publish_topic>/<uuid>/config
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MqttAccessory<'a> {
    pub now: u64,
    pub uuid: Uuid,
    pub kind: AccessoryKind,
    pub display_name: &'a str,
    pub manufacturer: &'a str,
    pub model: &'a str,
    pub serial_number: &'a str,
    pub characteristics: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lcd_text_uuid: Option<&'static str>,
}

// Characteristic value: <publish_topic>/<uuid>/<Characteristic>
#[derive(Debug, Serialize)]
pub struct MqttCharacteristic {
    pub now: u64,
    pub accessory: Uuid,
    pub characteristic: &'static str,
    pub value: Value,
}

// Inbound write (subscribed)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MqttWrite {
    accessory: Uuid,
    target_state: Value,
}

fn now_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

pub fn accessory_payload(accessory: &Accessory) -> MqttAccessory<'_> {
    MqttAccessory {
        now: now_epoch_ms(),
        uuid: accessory.uuid,
        kind: accessory.kind,
        display_name: &accessory.display_name,
        manufacturer: &accessory.info.manufacturer,
        model: &accessory.info.model,
        serial_number: &accessory.info.serial_number,
        characteristics: accessory.kind.characteristics(),
        lcd_text_uuid: (accessory.kind == AccessoryKind::SecuritySystem).then_some(LCD_TEXT_UUID),
    }
}

pub fn characteristic_payload(accessory: Uuid, value: &Characteristic) -> MqttCharacteristic {
    MqttCharacteristic {
        now: now_epoch_ms(),
        accessory,
        characteristic: value.name(),
        value: value.json_value(),
    }
}

/// Parse a write published on the subscribe topic.
///
/// `targetState` may be a name (`"AWAY_ARM"`) or the characteristic number.
pub fn parse_write_request(payload: &str) -> Result<WriteRequest> {
    let write: MqttWrite = serde_json::from_str(payload)?;
    let target_state = match &write.target_state {
        Value::String(name) => PartitionState::from_target_name(name),
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| u8::try_from(v).ok())
            .and_then(PartitionState::from_characteristic_value),
        _ => None,
    }
    .ok_or_else(|| BridgeError::InvalidWrite {
        reason: format!("unknown targetState {}", write.target_state),
    })?;
    Ok(WriteRequest {
        accessory: write.accessory,
        target_state,
    })
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// Publishes accessories and their characteristic values as retained MQTT messages.
#[derive(Clone)]
pub struct MqttHost {
    client: AsyncClient,
    topic: String,
}

impl MqttHost {
    pub fn new(client: AsyncClient, publish_topic: impl Into<String>) -> Self {
        Self {
            client,
            topic: publish_topic.into(),
        }
    }

    fn publish_json(&self, topic: String, payload: &impl Serialize) -> Result<()> {
        let json = serde_json::to_string(payload)?;
        debug!("MQTT -> {topic}: {json}");
        self.client
            .try_publish(topic, QoS::AtLeastOnce, true, json)?;
        Ok(())
    }
}

impl AccessoryHost for MqttHost {
    fn register(&self, accessory: &Accessory) -> Result<()> {
        let topic = format!("{}/{}/config", self.topic, accessory.uuid);
        self.publish_json(topic, &accessory_payload(accessory))
    }

    fn update(&self, accessory: Uuid, value: Characteristic) {
        let topic = format!("{}/{}/{}", self.topic, accessory, value.name());
        if let Err(e) = self.publish_json(topic, &characteristic_payload(accessory, &value)) {
            error!("Failed to publish {} for {accessory}: {e}", value.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessory::{AccessoryInfo, ContactState};

    const UUID: &str = "0b8d1f5e-4e0c-5f5e-9a2b-6c1d2e3f4a5b";

    #[test]
    fn test_parse_write_by_name() {
        let req = parse_write_request(&format!(
            r#"{{"accessory":"{UUID}","targetState":"NIGHT_ARM"}}"#
        ))
        .unwrap();
        assert_eq!(req.accessory.to_string(), UUID);
        assert_eq!(req.target_state, PartitionState::NightArmed);
    }

    #[test]
    fn test_parse_write_by_number() {
        let req = parse_write_request(&format!(r#"{{"accessory":"{UUID}","targetState":3}}"#))
            .unwrap();
        assert_eq!(req.target_state, PartitionState::Disarmed);
        let req = parse_write_request(&format!(r#"{{"accessory":"{UUID}","targetState":1}}"#))
            .unwrap();
        assert_eq!(req.target_state, PartitionState::AwayArmed);
    }

    #[test]
    fn test_parse_write_rejects_bad_input() {
        assert!(parse_write_request("not json").is_err());
        assert!(parse_write_request(&format!(r#"{{"accessory":"{UUID}","targetState":7}}"#)).is_err());
        assert!(
            parse_write_request(&format!(r#"{{"accessory":"{UUID}","targetState":"PANIC"}}"#)).is_err()
        );
        assert!(parse_write_request(r#"{"accessory":"nope","targetState":"DISARM"}"#).is_err());
    }

    #[test]
    fn test_accessory_payload_fields() {
        let accessory = Accessory {
            uuid: Uuid::from_u128(7),
            kind: AccessoryKind::SecuritySystem,
            display_name: "House".to_string(),
            info: AccessoryInfo::new("DefaultSerial"),
        };
        let json = serde_json::to_value(accessory_payload(&accessory)).unwrap();
        assert_eq!(json["kind"], "SecuritySystem");
        assert_eq!(json["displayName"], "House");
        assert_eq!(json["serialNumber"], "DefaultSerial");
        assert_eq!(json["lcdTextUuid"], LCD_TEXT_UUID);
        assert!(json["now"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_characteristic_payload_fields() {
        let json = serde_json::to_value(characteristic_payload(
            Uuid::from_u128(7),
            &Characteristic::ContactSensorState(ContactState::Detected),
        ))
        .unwrap();
        assert_eq!(json["characteristic"], "ContactSensorState");
        assert_eq!(json["value"], 0);
    }
}
