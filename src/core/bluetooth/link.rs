//! GATT link to one connected peripheral
//! The protocol engine only ever talks to a [`GattLink`]; the bluest backed
//! implementation lives here as well.

use async_trait::async_trait;
use bluest::error::ErrorKind;
use bluest::{Adapter, Characteristic, Device};
use futures_util::future;
use futures_util::stream::{BoxStream, StreamExt};
use log::{info, warn};
use thiserror::Error;

/// Transport level failure of a GATT operation
#[derive(Debug, Clone, Error)]
pub enum LinkError {
    /// The platform refused the operation
    #[error("operation not authorized: {0}")]
    NotAuthorized(String),
    /// The peripheral is gone or the handle is stale
    #[error("device handle is no longer valid: {0}")]
    InvalidHandle(String),
    /// Any other GATT failure
    #[error("GATT operation failed: {0}")]
    Gatt(String),
}

impl LinkError {
    /// Permission and handle errors are propagated; everything else is reported as a failed send.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NotAuthorized(_) | Self::InvalidHandle(_))
    }
}

impl From<bluest::Error> for LinkError {
    fn from(err: bluest::Error) -> Self {
        match err.kind() {
            ErrorKind::NotAuthorized => Self::NotAuthorized(err.to_string()),
            ErrorKind::NotConnected => Self::InvalidHandle(err.to_string()),
            _ => Self::Gatt(err.to_string()),
        }
    }
}

/// One connected peripheral: a write characteristic and a notify characteristic.
#[async_trait]
pub trait GattLink: Send + Sync {
    /// Platform identifier of the peripheral, for logging
    fn id(&self) -> String;

    /// Write without waiting for an ATT response
    async fn write_without_response(&self, data: &[u8]) -> Result<(), LinkError>;

    /// Write and wait for the ATT write response
    async fn write_with_response(&self, data: &[u8]) -> Result<(), LinkError>;

    /// Read the current value of the notify characteristic
    async fn read_notify(&self) -> Result<Vec<u8>, LinkError>;

    /// Subscribe to the notify characteristic. Frames arrive in order; the
    /// subscription ends when the returned stream is dropped.
    async fn subscribe(&self) -> Result<BoxStream<'_, Vec<u8>>, LinkError>;

    async fn is_connected(&self) -> bool;

    async fn disconnect(&self) -> Result<(), LinkError>;
}

/// [`GattLink`] over a bluest device
#[derive(Clone)]
pub struct BluestLink {
    adapter: Adapter,
    device: Device,
    write_char: Characteristic,
    notify_char: Characteristic,
}

impl BluestLink {
    pub fn new(
        adapter: Adapter,
        device: Device,
        write_char: Characteristic,
        notify_char: Characteristic,
    ) -> Self {
        Self {
            adapter,
            device,
            write_char,
            notify_char,
        }
    }

    /// Largest single write the stack accepts on the write characteristic
    pub fn max_write_len(&self) -> Result<usize, LinkError> {
        Ok(self.write_char.max_write_len()?)
    }
}

#[async_trait]
impl GattLink for BluestLink {
    fn id(&self) -> String {
        self.device.id().to_string()
    }

    async fn write_without_response(&self, data: &[u8]) -> Result<(), LinkError> {
        self.write_char.write_without_response(data).await?;
        Ok(())
    }

    async fn write_with_response(&self, data: &[u8]) -> Result<(), LinkError> {
        self.write_char.write(data).await?;
        Ok(())
    }

    async fn read_notify(&self) -> Result<Vec<u8>, LinkError> {
        Ok(self.notify_char.read().await?)
    }

    async fn subscribe(&self) -> Result<BoxStream<'_, Vec<u8>>, LinkError> {
        let stream = self.notify_char.notify().await?;
        let id = self.id();
        Ok(stream
            .filter_map(move |item| {
                future::ready(match item {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warn!("Error in notification stream of {}: {}", id, e);
                        None
                    }
                })
            })
            .boxed())
    }

    async fn is_connected(&self) -> bool {
        self.device.is_connected().await
    }

    async fn disconnect(&self) -> Result<(), LinkError> {
        if self.device.is_connected().await {
            info!("Disconnecting from device {}", self.device.id());
            self.adapter.disconnect_device(&self.device).await?;
            info!("Successfully disconnected");
        } else {
            info!("Device {} not connected", self.device.id());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(LinkError::NotAuthorized("denied".into()).is_fatal());
        assert!(LinkError::InvalidHandle("gone".into()).is_fatal());
        assert!(!LinkError::Gatt("busy".into()).is_fatal());
    }
}
