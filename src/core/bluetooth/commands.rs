//! Fixed command frames for the glasses and the ring
//! Content frames (text, bitmap, teleprompter) are built in `core::protocol`.

use crate::core::bluetooth::constants::{
    CMD_BATTERY, CMD_EXIT, CMD_FIRMWARE_REQUEST, CMD_HEARTBEAT, CMD_UPTIME, HEARTBEAT_MARKER,
    RING_BATTERY_REQUEST_LEN, RING_BATTERY_REQUEST_TRAILER, RING_CMD_BATTERY,
};

/// Glasses commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlassesCommand {
    /// Leave the current view and return to the dashboard (0x18)
    Exit,
    /// Battery level query (0x2C, 0x01)
    Battery,
    /// Firmware string query (0x23, 0x74)
    Firmware,
    /// Seconds since boot (0x37)
    Uptime,
    /// Liveness probe (0x25, 6, 0, seq, 0x04, seq)
    Heartbeat { seq: u8 },
}

impl GlassesCommand {
    /// Convert the command to its byte representation
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Exit => vec![CMD_EXIT],
            Self::Battery => vec![CMD_BATTERY, 0x01],
            Self::Firmware => CMD_FIRMWARE_REQUEST.to_vec(),
            Self::Uptime => vec![CMD_UPTIME],
            Self::Heartbeat { seq } => vec![CMD_HEARTBEAT, 6, 0, *seq, HEARTBEAT_MARKER, *seq],
        }
    }

    /// Leading bytes of the notification answering this command
    pub fn expected_header(&self) -> &'static [u8] {
        match self {
            Self::Exit => &[],
            Self::Battery => &[CMD_BATTERY],
            // The firmware reply is free text without a header
            Self::Firmware => &[],
            Self::Uptime => &[CMD_UPTIME],
            Self::Heartbeat { .. } => &[CMD_HEARTBEAT],
        }
    }
}

/// Ring commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingCommand {
    /// Battery query, doubling as the keep-alive probe
    Battery,
}

impl RingCommand {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Battery => {
                let mut frame = vec![0u8; RING_BATTERY_REQUEST_LEN];
                frame[0] = RING_CMD_BATTERY;
                frame[RING_BATTERY_REQUEST_LEN - 1] = RING_BATTERY_REQUEST_TRAILER;
                frame
            }
        }
    }

    pub fn expected_header(&self) -> &'static [u8] {
        match self {
            Self::Battery => &[RING_CMD_BATTERY],
        }
    }
}

/// A heartbeat echo must carry the command byte, the marker and the probe's sequence number.
pub fn is_valid_heartbeat_response(response: &[u8], seq: u8) -> bool {
    response.len() > 5
        && response[0] == CMD_HEARTBEAT
        && response[3] == seq
        && response[4] == HEARTBEAT_MARKER
}
