// MIT License - Copyright (c) 2026 Peter Wright
// Bridge orchestrator: registry reconciliation and event routing

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::accessory::{AccessoryHost, WriteRequest};
use crate::bridges::{ContactBridge, MotionBridge, PartitionBridge, SensorBridge};
use crate::cache::{AccessoryCache, PersistedAccessory};
use crate::config::{BridgeConfig, SensorClass};
use crate::error::{BridgeError, Result};
use crate::event::{EventReceiver, PanelEvent, RfRaw};
use crate::identity::{self, AccessoryRecord, BoundConfig, Decision};
use crate::partition::{CommandSink, PartitionState};

/// Owns the accessory registry and every live bridge.
///
/// All mutation happens on the task driving [`Orchestrator::run`], so no
/// locking is needed around partition or sensor state.
pub struct Orchestrator {
    config: BridgeConfig,
    host: Arc<dyn AccessoryHost>,
    sink: Arc<dyn CommandSink>,
    cache: AccessoryCache,
    records: Vec<AccessoryRecord>,
    partition: Option<PartitionBridge>,
    sensors: HashMap<String, Vec<SensorBridge>>,
}

impl Orchestrator {
    pub fn new(
        config: BridgeConfig,
        host: Arc<dyn AccessoryHost>,
        sink: Arc<dyn CommandSink>,
        cache: AccessoryCache,
    ) -> Self {
        Self {
            config,
            host,
            sink,
            cache,
            records: Vec::new(),
            partition: None,
            sensors: HashMap::new(),
        }
    }

    /// Reconcile configuration against the persisted accessories and bind a
    /// bridge to every record. Must complete before events are delivered.
    pub fn reconcile(&mut self) -> Result<()> {
        let persisted = self.cache.load()?;
        let result = identity::reconcile(&self.config, &persisted);

        let mut created = 0;
        let mut restored = 0;
        for decision in result.decisions {
            let record = match decision {
                Decision::Create(record) => {
                    if let Err(e) = self.host.register(&record.accessory) {
                        error!(
                            "Failed to register \"{}\": {e}",
                            record.accessory.display_name
                        );
                        continue;
                    }
                    info!(
                        "Created {} \"{}\"",
                        record.accessory.kind, record.accessory.display_name
                    );
                    created += 1;
                    record
                }
                Decision::Restore(record) => {
                    debug!(
                        "Restored {} \"{}\"",
                        record.accessory.kind, record.accessory.display_name
                    );
                    restored += 1;
                    record
                }
            };
            self.bind(&record);
            self.records.push(record);
        }

        let mut keep: Vec<PersistedAccessory> =
            self.records.iter().map(AccessoryRecord::to_persisted).collect();
        keep.extend(result.orphans);
        if let Err(e) = self.cache.save(&keep) {
            warn!("Could not persist accessory cache: {e}");
        }

        info!(
            "Accessory registry ready: {created} created, {restored} restored, {} sensors",
            self.sensor_count()
        );
        Ok(())
    }

    fn bind(&mut self, record: &AccessoryRecord) {
        let uuid = record.accessory.uuid;
        match &record.bound {
            BoundConfig::Partition { .. } => {
                self.partition = Some(PartitionBridge::new(
                    uuid,
                    self.config.pin.clone(),
                    self.host.clone(),
                    self.sink.clone(),
                ));
            }
            BoundConfig::Sensor { class, sensor } => {
                let bridge = match class {
                    SensorClass::Contact => {
                        SensorBridge::Contact(ContactBridge::new(uuid, sensor, self.host.clone()))
                    }
                    SensorClass::Motion => {
                        SensorBridge::Motion(MotionBridge::new(uuid, sensor, self.host.clone()))
                    }
                };
                self.sensors
                    .entry(sensor.serial.clone())
                    .or_default()
                    .push(bridge);
            }
        }
    }

    pub fn records(&self) -> &[AccessoryRecord] {
        &self.records
    }

    pub fn partition(&self) -> Option<&PartitionBridge> {
        self.partition.as_ref()
    }

    fn sensor_count(&self) -> usize {
        self.sensors.values().map(Vec::len).sum()
    }

    /// Route one panel event to the bridges it concerns.
    pub fn handle_event(&mut self, event: PanelEvent) {
        match event {
            PanelEvent::Connected => info!("Panel connected"),
            PanelEvent::Disconnected => warn!("Panel disconnected"),
            PanelEvent::ArmedAway => self.arm_state(PartitionState::AwayArmed),
            PanelEvent::ArmedStay => self.arm_state(PartitionState::StayArmed),
            PanelEvent::ArmedNight => self.arm_state(PartitionState::NightArmed),
            PanelEvent::Disarmed => self.arm_state(PartitionState::Disarmed),
            PanelEvent::LcdText { text } => {
                if let Some(partition) = self.partition.as_mut() {
                    partition.on_lcd_text(&text);
                }
            }
            PanelEvent::RfRaw(raw) => self.rf(&raw),
        }
    }

    fn arm_state(&mut self, state: PartitionState) {
        info!("Panel reports {state}");
        if let Some(partition) = self.partition.as_mut() {
            partition.on_arm_state(state);
        }
    }

    fn rf(&mut self, raw: &RfRaw) {
        let Some(bridges) = self.sensors.get_mut(&raw.serial) else {
            debug!("RF telemetry from unconfigured transmitter {}", raw.serial);
            return;
        };
        for bridge in bridges {
            bridge.on_rf(raw);
        }
    }

    /// Apply a client write to the partition target state.
    pub fn handle_write(&mut self, request: WriteRequest) -> Result<()> {
        let partition = self
            .partition
            .as_mut()
            .filter(|p| p.accessory() == request.accessory)
            .ok_or_else(|| BridgeError::UnknownAccessory {
                uuid: request.accessory.to_string(),
            })?;
        info!("Target state set to {}", request.target_state);
        partition.on_target_write(request.target_state);
        Ok(())
    }

    /// Reconcile, then serve events and writes until shutdown or the event
    /// stream closes.
    pub async fn run(
        mut self,
        mut events: EventReceiver,
        mut writes: mpsc::Receiver<WriteRequest>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        if self.records.is_empty() {
            self.reconcile()?;
        }

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => self.handle_event(event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Orchestrator lagged by {n} panel events, requesting panel state again");
                        self.sink.resync();
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Panel event stream closed");
                        return Ok(());
                    }
                },
                Some(request) = writes.recv() => {
                    if let Err(e) = self.handle_write(request) {
                        warn!("Write rejected: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    debug!("Orchestrator shutting down");
                    return Ok(());
                }
            }
        }
    }
}
