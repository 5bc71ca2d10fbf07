// MIT License - Copyright (c) 2026 Peter Wright
// AD2USB panel driver over TCP (ser2sock)

pub mod keypad;
pub mod protocol;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{Notify, mpsc, watch};
use tokio::time::{Duration, sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::config::DriverConfig;
use crate::error::{BridgeError, Result};
use crate::event::{EventReceiver, EventSender, PanelEvent, event_channel};
use crate::partition::{ArmCommand, CommandSink};

use keypad::KeypadTracker;
use protocol::{keypad_sequence, parse_line};

/// Cloneable command sink feeding the connection task.
///
/// Commands are refused while the socket is down so that a stale arm or
/// disarm is never replayed after a reconnect.
#[derive(Clone)]
pub struct CommandQueue {
    tx: mpsc::Sender<String>,
    connected: Arc<AtomicBool>,
    resync: Arc<Notify>,
}

impl CommandSink for CommandQueue {
    fn send(&self, command: ArmCommand, pin: &str) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BridgeError::Disconnected);
        }
        self.tx
            .try_send(keypad_sequence(command, pin))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => BridgeError::CommandQueueFull {
                    command: command.name().to_string(),
                },
                mpsc::error::TrySendError::Closed(_) => BridgeError::ChannelClosed,
            })?;
        debug!("Queued {}", command.name());
        Ok(())
    }

    fn resync(&self) {
        self.resync.notify_one();
    }
}

/// Handle to a running driver task.
pub struct DriverHandle {
    commands: CommandQueue,
    event_tx: EventSender,
    /// Buffers events until the first subscriber takes it.
    first_rx: Mutex<Option<EventReceiver>>,
    shutdown_tx: watch::Sender<bool>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl DriverHandle {
    /// Start connecting to the AD2USB in the background.
    ///
    /// Returns immediately; [`PanelEvent::Connected`] is emitted once the
    /// socket is up, and the task reconnects with backoff after every drop.
    pub fn connect(config: DriverConfig) -> Self {
        let (event_tx, event_rx) = event_channel(256);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (tx, rx) = mpsc::channel(config.command_queue.max(1));
        let connected = Arc::new(AtomicBool::new(false));
        let resync = Arc::new(Notify::new());

        let commands = CommandQueue {
            tx,
            connected: connected.clone(),
            resync: resync.clone(),
        };
        let link = Link {
            events: event_tx.clone(),
            commands: rx,
            connected,
            resync,
        };
        let task = tokio::spawn(run(config, link, shutdown_rx));

        Self {
            commands,
            event_tx,
            first_rx: Mutex::new(Some(event_rx)),
            shutdown_tx,
            task: Some(task),
        }
    }

    /// Subscribe to panel events.
    ///
    /// The first subscriber also receives everything emitted since
    /// [`DriverHandle::connect`], so an early `Connected` or arm state is not lost.
    pub fn subscribe(&self) -> EventReceiver {
        let first = self.first_rx.lock().ok().and_then(|mut rx| rx.take());
        first.unwrap_or_else(|| self.event_tx.subscribe())
    }

    pub fn commands(&self) -> CommandQueue {
        self.commands.clone()
    }

    /// Stop the connection task and wait for it to exit.
    pub async fn shutdown(mut self) {
        info!("Disconnecting from AD2USB");
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(h) = self.task.take() {
            h.abort();
        }
    }
}

enum SessionEnd {
    Closed,
    Shutdown,
}

/// Channels shared between the handle and the connection task.
struct Link {
    events: EventSender,
    commands: mpsc::Receiver<String>,
    connected: Arc<AtomicBool>,
    resync: Arc<Notify>,
}

async fn run(config: DriverConfig, mut link: Link, mut shutdown_rx: watch::Receiver<bool>) {
    let mut attempt: u32 = 0;
    loop {
        if attempt > 0 {
            let delay_ms = config.backoff_delay_ms(attempt);
            warn!(
                "AD2USB connection attempt {attempt} failed, retrying in {:.1}s...",
                delay_ms as f64 / 1000.0
            );
            tokio::select! {
                _ = sleep(Duration::from_millis(delay_ms)) => {}
                _ = shutdown_rx.changed() => return,
            }
        }
        attempt += 1;

        info!("Attempting connection to {} on port {}...", config.host, config.port);
        let connect = TcpStream::connect((config.host.as_str(), config.port));
        let stream = match timeout(Duration::from_millis(config.connect_timeout_ms), connect).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!("AD2USB connect failed: {}", BridgeError::Io(e));
                continue;
            }
            Err(_) => {
                warn!("AD2USB connect failed: {}", BridgeError::ConnectionTimeout);
                continue;
            }
        };

        info!("Connected to AD2USB service");
        while link.commands.try_recv().is_ok() {
            warn!("Dropping command queued before connection");
        }
        link.connected.store(true, Ordering::SeqCst);
        let _ = link.events.send(PanelEvent::Connected);

        let end = session(stream, &mut link, &mut shutdown_rx).await;

        link.connected.store(false, Ordering::SeqCst);
        let _ = link.events.send(PanelEvent::Disconnected);
        if !should_reconnect(&end) {
            return;
        }
        // Always back off at least once after a session ends.
        attempt = 1;
    }
}

/// Whether the connection task should try again after a session ended.
fn should_reconnect(end: &Result<SessionEnd>) -> bool {
    match end {
        Ok(SessionEnd::Shutdown) => {
            debug!("Driver shutting down");
            false
        }
        Ok(SessionEnd::Closed) => {
            warn!("AD2USB closed the connection");
            true
        }
        Err(e) if e.is_retryable() => {
            warn!("AD2USB connection lost: {e}");
            true
        }
        Err(e) => {
            error!("AD2USB session failed, not reconnecting: {e}");
            false
        }
    }
}

async fn session(
    stream: TcpStream,
    link: &mut Link,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Result<SessionEnd> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).split(b'\n');
    let mut tracker = KeypadTracker::default();

    loop {
        tokio::select! {
            segment = lines.next_segment() => {
                let Some(bytes) = segment? else {
                    return Ok(SessionEnd::Closed);
                };
                let line = String::from_utf8_lossy(&bytes);
                debug!("AD2USB <- {}", line.trim_end());
                for event in tracker.ingest(parse_line(&line)) {
                    let _ = link.events.send(event);
                }
            }
            Some(keys) = link.commands.recv() => {
                writer.write_all(keys.as_bytes()).await?;
                writer.flush().await?;
            }
            _ = link.resync.notified() => {
                debug!("Re-emitting keypad state on next broadcast");
                tracker.reset();
            }
            _ = shutdown_rx.changed() => {
                return Ok(SessionEnd::Shutdown);
            }
        }
    }
}
