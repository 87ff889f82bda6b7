//! Error types surfaced by the public API.

use thiserror::Error;

use crate::core::bluetooth::{LinkError, Side};
use crate::core::protocol::PacketError;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Bluetooth permission not granted")]
    PermissionDenied,

    #[error("Failed to connect {side} device: {source}")]
    Connection {
        side: Side,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to connect ring device: {0}")]
    RingConnection(#[source] anyhow::Error),

    #[error("No devices connected")]
    NotConnected,

    #[error("No Bluetooth adapter available")]
    AdapterUnavailable,

    #[error("Image payload is not valid base64: {0}")]
    InvalidImage(#[from] base64::DecodeError),

    #[error(transparent)]
    Packet(#[from] PacketError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Ring sensitivity must be between 0 and 100, got {0}")]
    InvalidSensitivity(u8),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;
