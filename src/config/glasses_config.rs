use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::bluetooth::constants::{
    BATTERY_RESPONSE_TIMEOUT_MS, BMP_END_DELAY_MS, BMP_PACKET_DELAY_MS, CONNECTION_TIMEOUT_MS,
    DEFAULT_RESPONSE_TIMEOUT_MS, FIRMWARE_RESPONSE_TIMEOUT_MS, HEARTBEAT_INTERVAL_MS,
    TELEPROMPTER_LINE_WIDTH_PX, TELEPROMPTER_PACKET_DELAY_MS, TEXT_PACKET_DELAY_MS,
    UPTIME_RESPONSE_TIMEOUT_MS,
};
use crate::core::bluetooth::types::GattProfile;

/// Glasses connection, timing and layout settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlassesConfig {
    /// Saved address of the left lens
    pub left_address: Option<String>,
    /// Saved address of the right lens
    pub right_address: Option<String>,

    pub service_uuid: Uuid,
    pub write_uuid: Uuid,
    pub notify_uuid: Uuid,

    pub connection_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    /// Wait for the heartbeat echo
    pub heartbeat_timeout_ms: u64,
    pub battery_timeout_ms: u64,
    pub uptime_timeout_ms: u64,
    pub firmware_timeout_ms: u64,

    pub text_packet_delay_ms: u64,
    pub bmp_packet_delay_ms: u64,
    /// Pause between the bitmap end marker and the CRC frame
    pub bmp_end_delay_ms: u64,
    pub teleprompter_packet_delay_ms: u64,

    /// Pixel budget of one teleprompter line
    pub teleprompter_line_width_px: u32,
    /// Manual scrolling instead of the automatic teleprompter mode
    pub teleprompter_manual_mode: bool,
    /// Glyph-width table replacing the built-in one
    pub glyph_table_path: Option<PathBuf>,
}

impl Default for GlassesConfig {
    fn default() -> Self {
        let profile = GattProfile::GLASSES;
        GlassesConfig {
            left_address: None,
            right_address: None,
            service_uuid: profile.service,
            write_uuid: profile.write_characteristic,
            notify_uuid: profile.notify_characteristic,
            connection_timeout_ms: CONNECTION_TIMEOUT_MS,
            heartbeat_interval_ms: HEARTBEAT_INTERVAL_MS,
            heartbeat_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            battery_timeout_ms: BATTERY_RESPONSE_TIMEOUT_MS,
            uptime_timeout_ms: UPTIME_RESPONSE_TIMEOUT_MS,
            firmware_timeout_ms: FIRMWARE_RESPONSE_TIMEOUT_MS,
            text_packet_delay_ms: TEXT_PACKET_DELAY_MS,
            bmp_packet_delay_ms: BMP_PACKET_DELAY_MS,
            bmp_end_delay_ms: BMP_END_DELAY_MS,
            teleprompter_packet_delay_ms: TELEPROMPTER_PACKET_DELAY_MS,
            teleprompter_line_width_px: TELEPROMPTER_LINE_WIDTH_PX,
            teleprompter_manual_mode: false,
            glyph_table_path: None,
        }
    }
}

impl GlassesConfig {
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

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol_constants() {
        let config = GlassesConfig::default();
        assert_eq!(config.profile(), GattProfile::GLASSES);
        assert_eq!(config.connection_timeout(), Duration::from_secs(10));
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(15));
        assert_eq!(config.teleprompter_line_width_px, 180);
        assert!(!config.teleprompter_manual_mode);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: GlassesConfig =
            serde_json::from_str(r#"{"left_address": "AA:BB:CC:DD:EE:01", "text_packet_delay_ms": 8}"#)
                .unwrap();
        assert_eq!(config.left_address.as_deref(), Some("AA:BB:CC:DD:EE:01"));
        assert_eq!(config.text_packet_delay_ms, 8);
        assert_eq!(config.bmp_packet_delay_ms, 5);
    }
}
