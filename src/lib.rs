// MIT License - Copyright (c) 2026 Peter Wright
// AD2USB alarm panel to accessory bridge
//
//! # ad2usb-bridge
//!
//! Maps the event stream of an AD2USB (Honeywell/Ademco) panel interface onto
//! accessory states: one security-system accessory for the partition, plus
//! contact and motion sensor accessories for configured RF transmitter loops.
//!
//! The panel is reached over TCP (ser2sock). Accessories are exposed through
//! an [`AccessoryHost`]; the bundled [`mqtt::MqttHost`] publishes them as
//! retained JSON messages.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use ad2usb_bridge::{AccessoryCache, BridgeToml, DriverHandle, Orchestrator};
//! # use ad2usb_bridge::{Accessory, AccessoryHost, Characteristic};
//! # struct LogHost;
//! # impl AccessoryHost for LogHost {
//! #     fn register(&self, _: &Accessory) -> ad2usb_bridge::Result<()> { Ok(()) }
//! #     fn update(&self, _: uuid::Uuid, _: Characteristic) {}
//! # }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BridgeToml::from_toml(&std::fs::read_to_string("config.toml")?)?
//!         .validate()?;
//!
//!     let driver = DriverHandle::connect(config.driver.clone());
//!     let events = driver.subscribe();
//!     let cache = AccessoryCache::new(&config.cache_path);
//!     let orchestrator =
//!         Orchestrator::new(config, Arc::new(LogHost), Arc::new(driver.commands()), cache);
//!
//!     let (_writes_tx, writes) = tokio::sync::mpsc::channel(16);
//!     let (_stop_tx, stop) = tokio::sync::watch::channel(false);
//!     orchestrator.run(events, writes, stop).await?;
//!     driver.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod accessory;
pub mod bridges;
pub mod cache;
pub mod config;
pub mod driver;
pub mod error;
pub mod event;
pub mod identity;
pub mod mqtt;
pub mod orchestrator;
pub mod partition;
pub mod telemetry;

// Re-exports for convenience
pub use accessory::{Accessory, AccessoryHost, AccessoryKind, Characteristic, WriteRequest};
pub use cache::{AccessoryCache, PersistedAccessory};
pub use config::{BridgeConfig, BridgeToml, DriverConfig, DriverConfigBuilder, SensorClass, SensorConfig};
pub use driver::{CommandQueue, DriverHandle};
pub use error::{BridgeError, Result};
pub use event::{EventReceiver, PanelEvent, RfRaw};
pub use identity::{DeviceIdentity, Decision};
pub use orchestrator::Orchestrator;
pub use partition::{ArmCommand, CommandSink, PartitionState, PartitionStateMachine};
pub use telemetry::{LoopIndex, SensorReading};
