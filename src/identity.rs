// MIT License - Copyright (c) 2026 Peter Wright
// Accessory identity derivation and create-vs-restore reconciliation

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::{info, warn};
use uuid::Uuid;

use crate::accessory::{
    Accessory, AccessoryInfo, AccessoryKind, PARTITION_SERIAL_NUMBER,
};
use crate::cache::PersistedAccessory;
use crate::config::{BridgeConfig, SensorClass, SensorConfig};
use crate::telemetry::LoopIndex;

/// Namespace for the name-based (v5) accessory UUIDs.
const IDENTITY_NAMESPACE: Uuid = Uuid::from_u128(0x6ad2_05b0_8f1e_4c3a_9d4e_2a61_c0de_a11e);

/// Stable identity of a logical device.
///
/// The partition is a singleton; sensors are keyed by class, serial and loop.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceIdentity {
    Partition,
    Contact { serial: String, loop_index: LoopIndex },
    Motion { serial: String, loop_index: LoopIndex },
}

impl DeviceIdentity {
    pub fn sensor(class: SensorClass, sensor: &SensorConfig) -> Self {
        let serial = sensor.serial.clone();
        let loop_index = sensor.loop_index;
        match class {
            SensorClass::Contact => Self::Contact { serial, loop_index },
            SensorClass::Motion => Self::Motion { serial, loop_index },
        }
    }

    /// Registry key: `partition`, `contact:<serial>:<loop>` or `motion:<serial>:<loop>`.
    pub fn key(&self) -> String {
        match self {
            Self::Partition => "partition".to_string(),
            Self::Contact { serial, loop_index } => format!("contact:{serial}:{loop_index}"),
            Self::Motion { serial, loop_index } => format!("motion:{serial}:{loop_index}"),
        }
    }

    /// Parse a registry key back into an identity.
    pub fn parse(key: &str) -> Option<Self> {
        if key == "partition" {
            return Some(Self::Partition);
        }
        let (tag, rest) = key.split_once(':')?;
        let (serial, loop_str) = rest.rsplit_once(':')?;
        if serial.is_empty() {
            return None;
        }
        let loop_index = LoopIndex::new(loop_str.parse().ok()?)?;
        let serial = serial.to_string();
        match tag {
            "contact" => Some(Self::Contact { serial, loop_index }),
            "motion" => Some(Self::Motion { serial, loop_index }),
            _ => None,
        }
    }

    /// Deterministic accessory UUID derived from the key.
    pub fn uuid(&self) -> Uuid {
        Uuid::new_v5(&IDENTITY_NAMESPACE, self.key().as_bytes())
    }

    pub fn kind(&self) -> AccessoryKind {
        match self {
            Self::Partition => AccessoryKind::SecuritySystem,
            Self::Contact { .. } => AccessoryKind::ContactSensor,
            Self::Motion { .. } => AccessoryKind::MotionSensor,
        }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// The configuration an accessory record is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundConfig {
    Partition { name: String },
    Sensor { class: SensorClass, sensor: SensorConfig },
}

/// A configured device paired with its host-side accessory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryRecord {
    pub identity: DeviceIdentity,
    pub accessory: Accessory,
    pub bound: BoundConfig,
}

impl AccessoryRecord {
    pub fn to_persisted(&self) -> PersistedAccessory {
        PersistedAccessory {
            uuid: self.accessory.uuid,
            identity: self.identity.key(),
            kind: self.accessory.kind,
            display_name: self.accessory.display_name.clone(),
            serial_number: self.accessory.info.serial_number.clone(),
        }
    }
}

/// Outcome for one configured device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Not known to the host: register a fresh accessory.
    Create(AccessoryRecord),
    /// Previously persisted: rebind the existing accessory.
    Restore(AccessoryRecord),
}

impl Decision {
    pub fn record(&self) -> &AccessoryRecord {
        match self {
            Self::Create(r) | Self::Restore(r) => r,
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(self, Self::Create(_))
    }
}

/// Result of reconciling configuration against persisted accessories.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// One decision per configured device, partition first.
    pub decisions: Vec<Decision>,
    /// Persisted accessories no configured device maps to.
    pub orphans: Vec<PersistedAccessory>,
}

/// Decide, for every configured device, whether to create or restore its accessory.
///
/// Pure: no host calls are made here.
pub fn reconcile(config: &BridgeConfig, persisted: &[PersistedAccessory]) -> Reconciliation {
    let by_uuid: HashMap<Uuid, &PersistedAccessory> =
        persisted.iter().map(|p| (p.uuid, p)).collect();
    let mut claimed = HashSet::new();
    let mut decisions = Vec::new();

    let mut decide = |identity: DeviceIdentity, name: &str, serial_number: String, bound| {
        let uuid = identity.uuid();
        if !claimed.insert(uuid) {
            warn!("Duplicate device {identity} in config. Not loading \"{name}\".");
            return;
        }
        let decision = match by_uuid.get(&uuid) {
            Some(p) => Decision::Restore(AccessoryRecord {
                accessory: Accessory {
                    uuid,
                    kind: identity.kind(),
                    display_name: p.display_name.clone(),
                    info: AccessoryInfo::new(p.serial_number.clone()),
                },
                identity,
                bound,
            }),
            None => Decision::Create(AccessoryRecord {
                accessory: Accessory {
                    uuid,
                    kind: identity.kind(),
                    display_name: name.to_string(),
                    info: AccessoryInfo::new(serial_number),
                },
                identity,
                bound,
            }),
        };
        decisions.push(decision);
    };

    decide(
        DeviceIdentity::Partition,
        &config.partition_name,
        PARTITION_SERIAL_NUMBER.to_string(),
        BoundConfig::Partition {
            name: config.partition_name.clone(),
        },
    );

    let sensors = config
        .contacts
        .iter()
        .map(|s| (SensorClass::Contact, s))
        .chain(config.motion_sensors.iter().map(|s| (SensorClass::Motion, s)));
    for (class, sensor) in sensors {
        decide(
            DeviceIdentity::sensor(class, sensor),
            &sensor.name,
            sensor.serial_number(),
            BoundConfig::Sensor {
                class,
                sensor: sensor.clone(),
            },
        );
    }

    let orphans: Vec<PersistedAccessory> = persisted
        .iter()
        .filter(|p| !claimed.contains(&p.uuid))
        .cloned()
        .collect();
    for orphan in &orphans {
        info!(
            "Persisted accessory \"{}\" ({}) is no longer configured",
            orphan.display_name, orphan.identity
        );
    }

    Reconciliation { decisions, orphans }
}
