//! Application state management
//! This module builds the glasses and ring managers from the configuration.

use std::sync::Arc;

use log::{info, warn};

use crate::config::AppConfig;
use crate::core::bluetooth::connection::{
    AdapterPermission, BluestConnector, DeviceConnector, PermissionGate,
};
use crate::core::bluetooth::{GlassesManager, RingManager, Side};
use crate::core::render::GlyphWidthTable;
use crate::error::BridgeError;

/// Application state shared by the commands
pub struct AppState {
    pub config: AppConfig,
    /// The glasses manager instance
    pub glasses: Arc<GlassesManager>,
    /// The ring manager instance
    pub ring: Arc<RingManager>,
}

impl AppState {
    /// Creates the state on the default Bluetooth adapter
    pub async fn new(config: AppConfig) -> Result<Self, BridgeError> {
        info!("Initializing Bluetooth adapter...");
        let connector = BluestConnector::with_default_adapter().await?;
        let permissions = AdapterPermission::new(connector.adapter().clone());
        let glyphs =
            GlyphWidthTable::load_or_builtin(config.glasses.glyph_table_path.as_deref()).await;

        Ok(Self::from_parts(config, Arc::new(connector), Arc::new(permissions), glyphs))
    }

    /// Builds both managers on one connector and permission gate.
    pub fn from_parts(
        config: AppConfig,
        connector: Arc<dyn DeviceConnector>,
        permissions: Arc<dyn PermissionGate>,
        glyphs: GlyphWidthTable,
    ) -> Self {
        let glasses = GlassesManager::new(
            config.glasses.clone(),
            connector.clone(),
            permissions.clone(),
            glyphs,
        );
        let ring = RingManager::new(config.ring.clone(), connector, permissions);

        Self {
            config,
            glasses: Arc::new(glasses),
            ring: Arc::new(ring),
        }
    }

    /// Connects every device with a saved address. Failures are logged and returned.
    pub async fn connect_configured(&self) -> Vec<BridgeError> {
        let mut failures = Vec::new();

        let sides = [
            (Side::Left, self.config.glasses.left_address.as_deref()),
            (Side::Right, self.config.glasses.right_address.as_deref()),
        ];
        for (side, address) in sides {
            let Some(address) = address else {
                info!("No {} address configured", side);
                continue;
            };
            let result = match side {
                Side::Left => self.glasses.connect_left(address).await,
                _ => self.glasses.connect_right(address).await,
            };
            if let Err(e) = result {
                warn!("{}", e);
                failures.push(e);
            }
        }

        if let Some(address) = self.config.ring.address.as_deref() {
            if let Err(e) = self.ring.connect(address).await {
                warn!("{}", e);
                failures.push(e);
            }
        }
        failures
    }

    pub async fn shutdown(&self) {
        self.glasses.disconnect().await;
        self.ring.disconnect().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::mock::{AllowAll, MockConnector, MockLink};

    #[tokio::test]
    async fn test_connects_configured_sides_only() {
        let connector = Arc::new(MockConnector::new());
        connector.add(MockLink::new("AA:BB:CC:DD:EE:01"));

        let mut config = AppConfig::default();
        config.glasses.left_address = Some("AA:BB:CC:DD:EE:01".to_string());
        config.glasses.right_address = Some("AA:BB:CC:DD:EE:02".to_string());
        config.glasses.firmware_timeout_ms = 10;
        config.glasses.connection_timeout_ms = 100;

        let state = AppState::from_parts(
            config,
            connector.clone(),
            Arc::new(AllowAll),
            GlyphWidthTable::builtin(),
        );
        let failures = state.connect_configured().await;

        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], BridgeError::Connection { side: Side::Right, .. }));
        assert!(state.glasses.is_left_connected());
        assert!(!state.ring.is_connected());
        assert_eq!(connector.attempts(), 2);

        state.shutdown().await;
        assert!(!state.glasses.is_connected());
    }
}
