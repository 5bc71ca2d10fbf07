// MIT License - Copyright (c) 2026 Peter Wright
// MQTT bridge

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::{mpsc, watch};
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use ad2usb_bridge::config::{MqttToml, parse_mqtt_url};
use ad2usb_bridge::mqtt::{MqttHost, parse_write_request};
use ad2usb_bridge::{AccessoryCache, BridgeConfig, BridgeToml, DriverHandle, Orchestrator};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "ad2usb2mqtt")]
#[command(about = "Bridge between an AD2USB alarm panel interface and MQTT accessories")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

struct Settings {
    /// `None` when host, port or pin is missing: the bridge stays idle.
    bridge: Option<BridgeConfig>,
    mqtt: MqttToml,
    mqtt_host: String,
    mqtt_port: u16,
}

fn load_settings(path: &str) -> Result<Settings> {
    let text = std::fs::read_to_string(path).context("Failed to read config file")?;
    let toml = BridgeToml::from_toml(&text).context("Failed to parse config file")?;
    let mqtt = toml.mqtt.clone().context("Missing [mqtt] section")?;
    let (mqtt_host, mqtt_port) = parse_mqtt_url(&mqtt.url)
        .context("MQTT URL must be in format mqtt://host:port")?;
    let bridge = match toml.validate() {
        Ok(bridge) => Some(bridge),
        Err(e) => {
            warn!("AD2USB bridge disabled: {e}");
            None
        }
    };
    Ok(Settings {
        bridge,
        mqtt,
        mqtt_host,
        mqtt_port,
    })
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=debug or RUST_LOG=ad2usb_bridge=trace).
    // Default: info.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();
    let mut settings = load_settings(&cli.config)?;

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();
        let mut driver = None;

        if let Some(bridge) = settings.bridge.clone() {
            // Set up MQTT
            let mut mqtt_opts =
                MqttOptions::new(&settings.mqtt.client_id, &settings.mqtt_host, settings.mqtt_port);
            mqtt_opts.set_keep_alive(Duration::from_secs(30));
            let (client, mut eventloop) = AsyncClient::new(mqtt_opts, 256);

            // Task 1: MQTT event loop (forwards accessory writes)
            let (writes_tx, writes_rx) = mpsc::channel(16);
            let client_cmds = client.clone();
            let sub_topic = settings.mqtt.subscribe_topic.clone();
            tasks.push(tokio::spawn(async move {
                loop {
                    match eventloop.poll().await {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            // rumqttc does not resubscribe after a broker reconnect.
                            info!("MQTT: connected, subscribing to {sub_topic}");
                            if let Err(e) =
                                client_cmds.subscribe(&sub_topic, QoS::AtLeastOnce).await
                            {
                                error!("Failed to subscribe to {sub_topic}: {e}");
                            }
                        }
                        Ok(Event::Incoming(Packet::Publish(msg))) => {
                            if msg.topic == sub_topic {
                                let payload = String::from_utf8_lossy(&msg.payload);
                                info!("MQTT write received: {payload}");
                                match parse_write_request(&payload) {
                                    Ok(request) => {
                                        if let Err(e) = writes_tx.try_send(request) {
                                            warn!("Dropping MQTT write: {e}");
                                        }
                                    }
                                    Err(e) => warn!("Failed to parse MQTT write: {e}"),
                                }
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!("MQTT event loop error: {e}");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }));

            // Task 2: panel connection and accessory orchestration
            info!(
                "Connecting to AD2USB at {}:{}",
                bridge.driver.host, bridge.driver.port
            );
            let handle = DriverHandle::connect(bridge.driver.clone());
            let events = handle.subscribe();
            let cache = AccessoryCache::new(&bridge.cache_path);
            let host = Arc::new(MqttHost::new(client, settings.mqtt.publish_topic.clone()));
            let orchestrator = Orchestrator::new(bridge, host, Arc::new(handle.commands()), cache);
            tasks.push(tokio::spawn(async move {
                if let Err(e) = orchestrator.run(events, writes_rx, shutdown_rx).await {
                    error!("Orchestrator stopped: {e}");
                }
            }));
            driver = Some(handle);

            info!("MQTT bridge running. Send SIGHUP to restart, SIGINT/SIGTERM to stop.");
        } else {
            info!("Nothing to run. Send SIGHUP after fixing the config, SIGINT/SIGTERM to stop.");
        }

        // Wait for a signal
        let restart = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down...");
                false
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                false
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP, reloading config and restarting connections...");
                true
            }
        };

        let _ = shutdown_tx.send(true);
        if let Some(driver) = driver {
            driver.shutdown().await;
        }
        for task in tasks {
            task.abort();
        }

        if !restart {
            break;
        }

        // Reload config from disk; keep previous config on failure
        info!("Reloading config from {}", cli.config);
        match load_settings(&cli.config) {
            Ok(new_settings) => {
                settings = new_settings;
                info!("Config reloaded successfully");
            }
            Err(e) => warn!("Failed to reload config, keeping previous: {e:#}"),
        }
        debug!("Reconnecting...");
    }

    info!("Shutdown complete");
    Ok(())
}
