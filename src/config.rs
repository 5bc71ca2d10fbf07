// MIT License - Copyright (c) 2026 Peter Wright
// Configuration file schema and validation

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use serde::de::IgnoredAny;
use tracing::{info, warn};

use crate::error::{BridgeError, Result};
use crate::telemetry::LoopIndex;

pub const DEFAULT_PARTITION_NAME: &str = "Security System";

// ---------------------------------------------------------------------------
// File schema
// ---------------------------------------------------------------------------

/// A config value that may be written either as a string or as an integer.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Text(String),
    /// Anything else (booleans, tables, ...). Treated as missing.
    Other(IgnoredAny),
}

impl Scalar {
    /// Non-empty textual form, or `None` when the value is unusable.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Int(n) => Some(n.to_string()),
            Self::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }

    /// RF transmitter serial as the AD2USB prints it. Integers are
    /// zero-padded to seven digits, since TOML drops the leading zero of
    /// `serial = 0180036`.
    pub fn as_serial(&self) -> Option<String> {
        match self {
            Self::Int(n) if *n >= 0 => Some(format!("{n:07}")),
            Self::Int(_) => None,
            _ => self.as_text(),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Other(_) => None,
        }
    }
}

/// Top-level TOML document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeToml {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<Scalar>,
    #[serde(default)]
    pub pin: Option<Scalar>,
    #[serde(default)]
    pub partition_name: Option<String>,
    #[serde(default)]
    pub rf_contacts: Vec<SensorToml>,
    #[serde(default)]
    pub rf_motion_sensors: Vec<SensorToml>,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_max_backoff_shift")]
    pub max_backoff_shift: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_command_queue")]
    pub command_queue: usize,
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    #[serde(default)]
    pub mqtt: Option<MqttToml>,
}

fn default_reconnect_delay() -> u64 {
    10000
}
fn default_max_backoff_shift() -> u32 {
    4
}
fn default_connect_timeout() -> u64 {
    10000
}
fn default_command_queue() -> usize {
    16
}
fn default_cache_path() -> PathBuf {
    PathBuf::from("accessories.json")
}

/// One entry of `rfContacts` / `rfMotionSensors`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SensorToml {
    #[serde(default)]
    pub serial: Option<Scalar>,
    #[serde(default, rename = "loop")]
    pub loop_index: Option<Scalar>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttToml {
    pub url: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_publish_topic")]
    pub publish_topic: String,
    #[serde(default = "default_subscribe_topic")]
    pub subscribe_topic: String,
}

fn default_client_id() -> String {
    "ad2usb-bridge".to_string()
}
fn default_publish_topic() -> String {
    "ad2usb".to_string()
}
fn default_subscribe_topic() -> String {
    "ad2usb/set".to_string()
}

impl BridgeToml {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Validate the panel section and device lists.
    ///
    /// A missing `host`, `port` or `pin` disables the whole bridge. Invalid
    /// device entries are skipped with a warning; their siblings still load.
    pub fn validate(&self) -> Result<BridgeConfig> {
        let host = self
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(BridgeError::NotConfigured { field: "host" })?;
        let port = self
            .port
            .as_ref()
            .and_then(Scalar::as_int)
            .and_then(|p| u16::try_from(p).ok())
            .filter(|p| *p != 0)
            .ok_or(BridgeError::NotConfigured { field: "port" })?;
        let pin = self
            .pin
            .as_ref()
            .and_then(Scalar::as_text)
            .ok_or(BridgeError::NotConfigured { field: "pin" })?;

        let partition_name = self
            .partition_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PARTITION_NAME.to_string());

        Ok(BridgeConfig {
            driver: DriverConfig::builder()
                .host(host)
                .port(port)
                .reconnect_delay_ms(self.reconnect_delay_ms)
                .max_backoff_shift(self.max_backoff_shift)
                .connect_timeout_ms(self.connect_timeout_ms)
                .command_queue(self.command_queue)
                .build(),
            pin,
            partition_name,
            contacts: validate_sensors(SensorClass::Contact, &self.rf_contacts),
            motion_sensors: validate_sensors(SensorClass::Motion, &self.rf_motion_sensors),
            cache_path: self.cache_path.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Validated configuration
// ---------------------------------------------------------------------------

/// RF sensor flavour. The same loop bit reads with opposite polarity per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorClass {
    Contact,
    Motion,
}

impl fmt::Display for SensorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contact => f.write_str("Contact"),
            Self::Motion => f.write_str("Motion Sensor"),
        }
    }
}

/// A validated RF sensor entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorConfig {
    pub serial: String,
    pub loop_index: LoopIndex,
    pub name: String,
}

impl SensorConfig {
    pub fn new(serial: impl Into<String>, loop_index: LoopIndex, name: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            loop_index,
            name: name.into(),
        }
    }

    /// Accessory serial number, `<serial>:<loop>`.
    pub fn serial_number(&self) -> String {
        format!("{}:{}", self.serial, self.loop_index)
    }
}

impl SensorToml {
    pub fn validate(&self) -> Result<SensorConfig> {
        let serial = self
            .serial
            .as_ref()
            .and_then(Scalar::as_serial)
            .ok_or_else(|| invalid("missing serial"))?;
        let raw_loop = self
            .loop_index
            .as_ref()
            .and_then(Scalar::as_int)
            .ok_or_else(|| invalid("missing loop"))?;
        let loop_index = LoopIndex::try_from(raw_loop)?;
        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| invalid("missing name"))?;
        Ok(SensorConfig::new(serial, loop_index, name))
    }
}

fn invalid(reason: &str) -> BridgeError {
    BridgeError::InvalidDevice {
        reason: reason.to_string(),
    }
}

fn validate_sensors(class: SensorClass, entries: &[SensorToml]) -> Vec<SensorConfig> {
    let mut seen = HashSet::new();
    let mut sensors = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        match entry.validate() {
            Ok(sensor) => {
                if !seen.insert((sensor.serial.clone(), sensor.loop_index)) {
                    warn!(
                        "Duplicate {class} {} in config. Not loading \"{}\".",
                        sensor.serial_number(),
                        sensor.name
                    );
                    continue;
                }
                info!("Loading {class} - {} ({})", sensor.name, sensor.serial_number());
                sensors.push(sensor);
            }
            Err(e) => warn!("Invalid {class} #{} in config ({e}). Not loading it.", i + 1),
        }
    }
    sensors
}

/// The bridge configuration after validation.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub driver: DriverConfig,
    pub pin: String,
    pub partition_name: String,
    pub contacts: Vec<SensorConfig>,
    pub motion_sensors: Vec<SensorConfig>,
    pub cache_path: PathBuf,
}

impl BridgeConfig {
    /// A config with no sensors, mostly useful in tests.
    pub fn new(host: impl Into<String>, port: u16, pin: impl Into<String>) -> Self {
        Self {
            driver: DriverConfig::builder().host(host).port(port).build(),
            pin: pin.into(),
            partition_name: DEFAULT_PARTITION_NAME.to_string(),
            contacts: Vec::new(),
            motion_sensors: Vec::new(),
            cache_path: default_cache_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// Driver connection settings
// ---------------------------------------------------------------------------

/// Connection settings for the AD2USB driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// ser2sock / AD2USB host
    pub host: String,
    /// ser2sock port (default: 10000)
    pub port: u16,
    /// Base reconnect delay in milliseconds
    pub reconnect_delay_ms: u64,
    /// Backoff doubles up to `2^max_backoff_shift` times the base delay
    pub max_backoff_shift: u32,
    /// TCP connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Outbound keypad command queue depth
    pub command_queue: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 10000,
            reconnect_delay_ms: default_reconnect_delay(),
            max_backoff_shift: default_max_backoff_shift(),
            connect_timeout_ms: default_connect_timeout(),
            command_queue: default_command_queue(),
        }
    }
}

impl DriverConfig {
    pub fn builder() -> DriverConfigBuilder {
        DriverConfigBuilder::default()
    }

    /// Reconnect delay before the given attempt (1-based), with capped exponential backoff.
    pub fn backoff_delay_ms(&self, attempt: u32) -> u64 {
        let shift = attempt.saturating_sub(1).min(self.max_backoff_shift);
        self.reconnect_delay_ms.saturating_mul(1u64 << shift)
    }
}

/// Builder for DriverConfig.
#[derive(Debug, Clone, Default)]
pub struct DriverConfigBuilder {
    config: DriverConfig,
}

impl DriverConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.config.reconnect_delay_ms = ms;
        self
    }

    pub fn max_backoff_shift(mut self, shift: u32) -> Self {
        self.config.max_backoff_shift = shift;
        self
    }

    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    pub fn command_queue(mut self, depth: usize) -> Self {
        self.config.command_queue = depth.max(1);
        self
    }

    pub fn build(self) -> DriverConfig {
        self.config
    }
}

/// Parse an MQTT URL like "mqtt://host:port" into (host, port).
pub fn parse_mqtt_url(url: &str) -> Option<(String, u16)> {
    let stripped = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);
    let (host, port_str) = stripped.rsplit_once(':')?;
    let port = port_str.parse().ok()?;
    Some((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        host = "192.168.1.20"
        port = 10000
        pin = "1234"
        partitionName = "House"

        [[rfContacts]]
        serial = "1234567"
        loop = 2
        name = "Front Door"

        [[rfContacts]]
        serial = 7654321
        loop = "1"
        name = "Back Door"

        [[rfMotionSensors]]
        serial = "0180036"
        loop = 1
        name = "Hallway"

        [mqtt]
        url = "mqtt://localhost:1883"
    "#;

    #[test]
    fn test_full_config() {
        let config = BridgeToml::from_toml(FULL).unwrap().validate().unwrap();
        assert_eq!(config.driver.host, "192.168.1.20");
        assert_eq!(config.driver.port, 10000);
        assert_eq!(config.pin, "1234");
        assert_eq!(config.partition_name, "House");
        assert_eq!(config.contacts.len(), 2);
        assert_eq!(config.contacts[0].serial_number(), "1234567:2");
        assert_eq!(config.contacts[1].serial, "7654321");
        assert_eq!(config.contacts[1].loop_index.get(), 1);
        assert_eq!(config.motion_sensors.len(), 1);
        assert_eq!(config.motion_sensors[0].serial, "0180036");
    }

    #[test]
    fn test_default_partition_name() {
        let toml = r#"
            host = "panel"
            port = 10000
            pin = "1234"
        "#;
        let config = BridgeToml::from_toml(toml).unwrap().validate().unwrap();
        assert_eq!(config.partition_name, DEFAULT_PARTITION_NAME);
        assert!(config.contacts.is_empty());
        assert_eq!(config.cache_path, PathBuf::from("accessories.json"));
    }

    #[test]
    fn test_missing_required_fields_disable_bridge() {
        let cases = [
            (r#"port = 1
                pin = "1""#, "host"),
            (r#"host = "h"
                pin = "1""#, "port"),
            (r#"host = "h"
                port = 1"#, "pin"),
            (r#"host = "h"
                port = 1
                pin = """#, "pin"),
            (r#"host = "h"
                port = 0
                pin = "1""#, "port"),
        ];
        for (toml, field) in cases {
            let err = BridgeToml::from_toml(toml).unwrap().validate().unwrap_err();
            assert!(
                matches!(err, BridgeError::NotConfigured { field: f } if f == field),
                "expected missing {field}, got {err}"
            );
        }
    }

    #[test]
    fn test_invalid_entries_skipped() {
        let toml = r#"
            host = "h"
            port = 10000
            pin = "1234"

            [[rfContacts]]
            loop = 1
            name = "No Serial"

            [[rfContacts]]
            serial = "1111111"
            name = "No Loop"

            [[rfContacts]]
            serial = "2222222"
            loop = 1

            [[rfContacts]]
            serial = "3333333"
            loop = 5
            name = "Bad Loop"

            [[rfContacts]]
            serial = "4444444"
            loop = true
            name = "Bool Loop"

            [[rfContacts]]
            serial = "5555555"
            loop = 4
            name = "Good"
        "#;
        let config = BridgeToml::from_toml(toml).unwrap().validate().unwrap();
        assert_eq!(config.contacts.len(), 1);
        assert_eq!(config.contacts[0].name, "Good");
    }

    #[test]
    fn test_duplicate_sensor_skipped_per_class() {
        let toml = r#"
            host = "h"
            port = 10000
            pin = "1234"

            [[rfContacts]]
            serial = "1234567"
            loop = 2
            name = "Front Door"

            [[rfContacts]]
            serial = "1234567"
            loop = 2
            name = "Front Door Again"

            [[rfMotionSensors]]
            serial = "1234567"
            loop = 2
            name = "Same Transmitter, Other Class"
        "#;
        let config = BridgeToml::from_toml(toml).unwrap().validate().unwrap();
        assert_eq!(config.contacts.len(), 1);
        assert_eq!(config.contacts[0].name, "Front Door");
        assert_eq!(config.motion_sensors.len(), 1);
    }

    #[test]
    fn test_integer_serial_keeps_leading_zero() {
        let toml = r#"
            host = "h"
            port = 10000
            pin = "1234"

            [[rfMotionSensors]]
            serial = 180036
            loop = 1
            name = "Hallway"

            [[rfMotionSensors]]
            serial = -5
            loop = 1
            name = "Negative"
        "#;
        let config = BridgeToml::from_toml(toml).unwrap().validate().unwrap();
        assert_eq!(config.motion_sensors.len(), 1);
        assert_eq!(config.motion_sensors[0].serial, "0180036");
        assert_eq!(config.motion_sensors[0].serial_number(), "0180036:1");
    }

    #[test]
    fn test_driver_tuning_keys() {
        let defaults = BridgeToml::from_toml(FULL).unwrap().validate().unwrap();
        assert_eq!(defaults.driver, DriverConfig {
            host: "192.168.1.20".to_string(),
            port: 10000,
            ..DriverConfig::default()
        });

        let toml = r#"
            host = "h"
            port = 10000
            pin = "1234"
            reconnectDelayMs = 500
            maxBackoffShift = 2
            connectTimeoutMs = 3000
            commandQueue = 0
        "#;
        let driver = BridgeToml::from_toml(toml).unwrap().validate().unwrap().driver;
        assert_eq!(driver.reconnect_delay_ms, 500);
        assert_eq!(driver.connect_timeout_ms, 3000);
        assert_eq!(driver.command_queue, 1);
        assert_eq!(driver.backoff_delay_ms(10), 2000);
    }

    #[test]
    fn test_backoff_delay() {
        let config = DriverConfig::builder().reconnect_delay_ms(1000).build();
        assert_eq!(config.backoff_delay_ms(1), 1000);
        assert_eq!(config.backoff_delay_ms(2), 2000);
        assert_eq!(config.backoff_delay_ms(5), 16000);
        assert_eq!(config.backoff_delay_ms(50), 16000);
    }

    #[test]
    fn test_mqtt_defaults() {
        let config = BridgeToml::from_toml(FULL).unwrap();
        let mqtt = config.mqtt.unwrap();
        assert_eq!(mqtt.client_id, "ad2usb-bridge");
        assert_eq!(mqtt.publish_topic, "ad2usb");
        assert_eq!(mqtt.subscribe_topic, "ad2usb/set");
    }

    #[test]
    fn test_parse_mqtt_url() {
        assert_eq!(
            parse_mqtt_url("mqtt://broker.local:1883"),
            Some(("broker.local".to_string(), 1883))
        );
        assert_eq!(parse_mqtt_url("tcp://10.0.0.2:8883"), Some(("10.0.0.2".to_string(), 8883)));
        assert_eq!(parse_mqtt_url("broker.local"), None);
        assert_eq!(parse_mqtt_url("mqtt://broker:notaport"), None);
    }
}
