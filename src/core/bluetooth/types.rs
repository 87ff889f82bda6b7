//! Defines shared data structures for the Bluetooth module.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::bluetooth::constants::{
    UUID_GLASSES_NOTIFY_CHAR, UUID_GLASSES_SERVICE, UUID_GLASSES_WRITE_CHAR,
    UUID_RING_NOTIFY_CHAR, UUID_RING_SERVICE, UUID_RING_WRITE_CHAR,
};

/// Sentinel for a numeric telemetry field that has not been read yet
pub const UNKNOWN: i32 = -1;

/// Which half of the glasses an operation addresses.
///
/// `Both` is a dispatch directive only; connection slots are always `Left` or `Right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
    Both,
}

impl Side {
    /// Resolves a directive to the concrete sides, always left before right.
    pub fn targets(self) -> &'static [Side] {
        match self {
            Side::Left => &[Side::Left],
            Side::Right => &[Side::Right],
            Side::Both => &[Side::Left, Side::Right],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
            Side::Both => "both",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-side connection flags of the glasses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub left: bool,
    pub right: bool,
}

impl ConnectionState {
    pub fn get(&self, side: Side) -> bool {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
            Side::Both => self.left && self.right,
        }
    }

    pub fn set(&mut self, side: Side, connected: bool) {
        match side {
            Side::Left => self.left = connected,
            Side::Right => self.right = connected,
            Side::Both => {
                self.left = connected;
                self.right = connected;
            }
        }
    }

    pub fn any(&self) -> bool {
        self.left || self.right
    }
}

/// Telemetry snapshot of one lens.
///
/// `battery` and `uptime_seconds` hold [`UNKNOWN`] until a response has been decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub connected: bool,
    pub battery: i32,
    pub uptime_seconds: i32,
    pub firmware: Option<String>,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self {
            connected: false,
            battery: UNKNOWN,
            uptime_seconds: UNKNOWN,
            firmware: None,
        }
    }
}

impl DeviceStatus {
    /// Battery percentage, if known
    pub fn battery_level(&self) -> Option<u8> {
        u8::try_from(self.battery).ok()
    }

    /// Seconds since boot, if known
    pub fn uptime(&self) -> Option<u32> {
        u32::try_from(self.uptime_seconds).ok()
    }
}

/// Telemetry for both lenses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlassesStatus {
    pub left: DeviceStatus,
    pub right: DeviceStatus,
}

/// Ring gesture handling mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GestureMode {
    Teleprompter,
    Presentation,
    #[default]
    Disabled,
}

/// Telemetry and client-side settings of the ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingStatus {
    pub connected: bool,
    pub battery: i32,
    pub firmware: Option<String>,
    pub gesture_mode: GestureMode,
    pub sensitivity: u8,
}

/// The GATT layout a peripheral is expected to expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GattProfile {
    pub service: Uuid,
    pub write_characteristic: Uuid,
    pub notify_characteristic: Uuid,
}

impl GattProfile {
    pub const GLASSES: GattProfile = GattProfile {
        service: UUID_GLASSES_SERVICE,
        write_characteristic: UUID_GLASSES_WRITE_CHAR,
        notify_characteristic: UUID_GLASSES_NOTIFY_CHAR,
    };

    pub const RING: GattProfile = GattProfile {
        service: UUID_RING_SERVICE,
        write_characteristic: UUID_RING_WRITE_CHAR,
        notify_characteristic: UUID_RING_NOTIFY_CHAR,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_targets_are_left_first() {
        assert_eq!(Side::Both.targets(), &[Side::Left, Side::Right]);
        assert_eq!(Side::Left.targets(), &[Side::Left]);
        assert_eq!(Side::Right.targets(), &[Side::Right]);
    }

    #[test]
    fn test_connection_state_set_and_get() {
        let mut state = ConnectionState::default();
        assert!(!state.any());

        state.set(Side::Left, true);
        assert!(state.get(Side::Left));
        assert!(!state.get(Side::Right));
        assert!(!state.get(Side::Both));

        state.set(Side::Both, true);
        assert!(state.get(Side::Both));
    }

    #[test]
    fn test_device_status_defaults_to_unknown() {
        let status = DeviceStatus::default();
        assert_eq!(status.battery, UNKNOWN);
        assert_eq!(status.uptime_seconds, UNKNOWN);
        assert_eq!(status.battery_level(), None);
        assert_eq!(status.uptime(), None);
        assert!(status.firmware.is_none());
    }
}
