//! Battery, firmware and uptime telemetry of the glasses
//!
//! Every query is independent. A missing or malformed response leaves the
//! corresponding field as it was.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};

use crate::core::bluetooth::commands::GlassesCommand;
use crate::core::bluetooth::link::GattLink;
use crate::core::bluetooth::transport::send_command_with_response;
use crate::core::bluetooth::types::{ConnectionState, DeviceStatus, GlassesStatus, Side};
use crate::utils::lock;

/// `[0x2C, _, level]` → level
pub fn decode_battery(response: &[u8]) -> Option<u8> {
    response.get(2).copied()
}

/// `[0x37, _, lo, hi]` → seconds since boot
pub fn decode_uptime(response: &[u8]) -> Option<u16> {
    match response {
        [_, _, low, high, ..] => Some(u16::from_le_bytes([*low, *high])),
        _ => None,
    }
}

/// The whole response as text, trimmed. Empty responses carry no firmware string.
pub fn decode_firmware(response: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(response);
    let trimmed = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[derive(Debug, Clone, Copy)]
pub struct StatusTimeouts {
    pub battery: Duration,
    pub uptime: Duration,
    pub firmware: Duration,
}

/// Last known telemetry per side
#[derive(Clone)]
pub struct StatusManager {
    status: Arc<Mutex<GlassesStatus>>,
    timeouts: StatusTimeouts,
}

impl StatusManager {
    pub fn new(timeouts: StatusTimeouts) -> Self {
        Self {
            status: Arc::new(Mutex::new(GlassesStatus::default())),
            timeouts,
        }
    }

    /// Snapshot with `connected` taken from `state`
    pub fn snapshot(&self, state: ConnectionState) -> GlassesStatus {
        let mut status = lock(&self.status).clone();
        status.left.connected = state.left;
        status.right.connected = state.right;
        status
    }

    /// Back to the unknown sentinels
    pub fn reset(&self) {
        *lock(&self.status) = GlassesStatus::default();
    }

    fn update(&self, side: Side, apply: impl FnOnce(&mut DeviceStatus)) {
        let mut status = lock(&self.status);
        match side {
            Side::Left => apply(&mut status.left),
            Side::Right => apply(&mut status.right),
            Side::Both => {}
        }
    }

    pub fn firmware(&self, side: Side) -> Option<String> {
        let status = lock(&self.status);
        match side {
            Side::Left => status.left.firmware.clone(),
            Side::Right => status.right.firmware.clone(),
            Side::Both => None,
        }
    }

    async fn query(
        &self,
        link: &dyn GattLink,
        command: GlassesCommand,
        wait: Duration,
    ) -> Option<Vec<u8>> {
        match send_command_with_response(link, &command.to_bytes(), command.expected_header(), wait)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("{:?} query to {} failed: {}", command, link.id(), e);
                None
            }
        }
    }

    pub async fn refresh_battery(&self, side: Side, link: &dyn GattLink) -> Option<u8> {
        let response = self.query(link, GlassesCommand::Battery, self.timeouts.battery).await;
        let level = response.as_deref().and_then(decode_battery);
        match level {
            Some(level) => {
                info!("{} battery: {}%", side, level);
                self.update(side, |status| status.battery = i32::from(level));
            }
            None => debug!("No battery level from {}", side),
        }
        level
    }

    pub async fn refresh_uptime(&self, side: Side, link: &dyn GattLink) -> Option<u16> {
        let response = self.query(link, GlassesCommand::Uptime, self.timeouts.uptime).await;
        let uptime = response.as_deref().and_then(decode_uptime);
        match uptime {
            Some(seconds) => {
                info!("{} uptime: {}s", side, seconds);
                self.update(side, |status| status.uptime_seconds = i32::from(seconds));
            }
            None => debug!("No uptime from {}", side),
        }
        uptime
    }

    pub async fn refresh_firmware(&self, side: Side, link: &dyn GattLink) -> Option<String> {
        let response = self.query(link, GlassesCommand::Firmware, self.timeouts.firmware).await;
        let firmware = response.as_deref().and_then(decode_firmware);
        match &firmware {
            Some(version) => {
                info!("{} firmware: {}", side, version);
                let version = version.clone();
                self.update(side, |status| status.firmware = Some(version));
            }
            None => debug!("No firmware string from {}", side),
        }
        firmware
    }

    /// Requests the firmware string unless it is already known.
    pub async fn ensure_firmware(&self, side: Side, link: &dyn GattLink) {
        if self.firmware(side).is_none() {
            self.refresh_firmware(side, link).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::mock::MockLink;
    use crate::core::bluetooth::types::UNKNOWN;

    fn manager() -> StatusManager {
        StatusManager::new(StatusTimeouts {
            battery: Duration::from_millis(50),
            uptime: Duration::from_millis(50),
            firmware: Duration::from_millis(50),
        })
    }

    #[test]
    fn test_decode_battery() {
        assert_eq!(decode_battery(&[0x2C, 0x01, 0x4B]), Some(75));
        assert_eq!(decode_battery(&[0x2C, 0x01]), None);
    }

    #[test]
    fn test_decode_uptime() {
        assert_eq!(decode_uptime(&[0x37, 0x00, 0x0A, 0x00]), Some(10));
        assert_eq!(decode_uptime(&[0x37, 0x00, 0x10, 0x0E]), Some(3600));
        assert_eq!(decode_uptime(&[0x37, 0x00, 0x0A]), None);
    }

    #[test]
    fn test_decode_firmware() {
        assert_eq!(
            decode_firmware(b"net build time: 2024-05-01 ver 1.5.6\n\0"),
            Some("net build time: 2024-05-01 ver 1.5.6".to_string())
        );
        assert_eq!(decode_firmware(b"  "), None);
        assert_eq!(decode_firmware(&[]), None);
    }

    #[tokio::test]
    async fn test_refresh_updates_only_answered_fields() {
        let status = manager();
        let link = MockLink::new("left");
        link.respond_with(|request| match request {
            [0x2C, 0x01] => vec![vec![0x2C, 0x01, 0x4B]],
            _ => Vec::new(),
        });

        assert_eq!(status.refresh_battery(Side::Left, &link).await, Some(75));
        assert_eq!(status.refresh_uptime(Side::Left, &link).await, None);

        let snapshot = status.snapshot(ConnectionState { left: true, right: false });
        assert!(snapshot.left.connected);
        assert_eq!(snapshot.left.battery, 75);
        assert_eq!(snapshot.left.uptime_seconds, UNKNOWN);
        assert_eq!(snapshot.right, DeviceStatus::default());
    }

    #[tokio::test]
    async fn test_firmware_is_requested_once() {
        let status = manager();
        let link = MockLink::new("left");
        link.respond_with(|request| match request {
            [0x23, 0x74] => vec![b"ver 1.4.5".to_vec()],
            _ => Vec::new(),
        });

        status.ensure_firmware(Side::Left, &link).await;
        status.ensure_firmware(Side::Left, &link).await;
        assert_eq!(status.firmware(Side::Left).as_deref(), Some("ver 1.4.5"));
        assert_eq!(link.writes_with_response().len(), 1);

        status.reset();
        assert_eq!(status.firmware(Side::Left), None);
    }
}
