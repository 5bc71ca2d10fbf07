// MIT License - Copyright (c) 2026 Peter Wright
// Bridge error types

use std::path::PathBuf;

/// All errors that can occur in the ad2usb bridge library.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Socket disconnected")]
    Disconnected,

    #[error("Bridge not configured: missing `{field}`")]
    NotConfigured { field: &'static str },

    #[error("Invalid device entry: {reason}")]
    InvalidDevice { reason: String },

    #[error("Invalid loop index: {value} (must be 1-4)")]
    InvalidLoop { value: i64 },

    #[error("Failed to parse config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Accessory cache {path}: {source}")]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("Invalid write request: {reason}")]
    InvalidWrite { reason: String },

    #[error("Unknown accessory: {uuid}")]
    UnknownAccessory { uuid: String },

    #[error("Command queue full, dropped: {command}")]
    CommandQueueFull { command: String },

    #[error("Channel closed")]
    ChannelClosed,
}

impl BridgeError {
    /// Whether this error is transient and the connection should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::Io(_)
                | BridgeError::ConnectionTimeout
                | BridgeError::Disconnected
                | BridgeError::CommandQueueFull { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(BridgeError::Disconnected.is_retryable());
        assert!(BridgeError::ConnectionTimeout.is_retryable());
        assert!(BridgeError::Io(std::io::Error::other("reset")).is_retryable());
        assert!(!BridgeError::NotConfigured { field: "pin" }.is_retryable());
        assert!(!BridgeError::InvalidLoop { value: 5 }.is_retryable());
    }

    #[test]
    fn test_not_configured_message() {
        let e = BridgeError::NotConfigured { field: "host" };
        assert_eq!(e.to_string(), "Bridge not configured: missing `host`");
    }
}
