use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::bluetooth::constants::{
    BATTERY_RESPONSE_TIMEOUT_MS, RING_CONNECTION_TIMEOUT_MS, RING_DEFAULT_SENSITIVITY,
    RING_KEEPALIVE_INTERVAL_MS,
};
use crate::core::bluetooth::types::GattProfile;

/// Ring remote settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    pub address: Option<String>,

    pub service_uuid: Uuid,
    pub write_uuid: Uuid,
    pub notify_uuid: Uuid,

    pub connection_timeout_ms: u64,
    pub keepalive_interval_ms: u64,
    pub response_timeout_ms: u64,
    /// Initial gesture sensitivity, 0 to 100, kept client side
    pub sensitivity: u8,
}

impl Default for RingConfig {
    fn default() -> Self {
        let profile = GattProfile::RING;
        RingConfig {
            address: None,
            service_uuid: profile.service,
            write_uuid: profile.write_characteristic,
            notify_uuid: profile.notify_characteristic,
            connection_timeout_ms: RING_CONNECTION_TIMEOUT_MS,
            keepalive_interval_ms: RING_KEEPALIVE_INTERVAL_MS,
            response_timeout_ms: BATTERY_RESPONSE_TIMEOUT_MS,
            sensitivity: RING_DEFAULT_SENSITIVITY,
        }
    }
}

impl RingConfig {
    pub fn profile(&self) -> GattProfile {
        GattProfile {
            service: self.service_uuid,
            write_characteristic: self.write_uuid,
            notify_characteristic: self.notify_uuid,
        }
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}
