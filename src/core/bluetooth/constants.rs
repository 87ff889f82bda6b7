//! Constants used throughout the protocol engine
//! This module contains the UUIDs, command bytes, chunk sizes and timing values
//! for the G1 glasses and the ring remote.

use uuid::Uuid;

/// The UUID of the glasses UART service (Nordic UART layout)
pub const UUID_GLASSES_SERVICE: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);

/// The UUID of the glasses write characteristic
pub const UUID_GLASSES_WRITE_CHAR: Uuid = Uuid::from_u128(0x6e400002_b5a3_f393_e0a9_e50e24dcca9e);

/// The UUID of the glasses notification characteristic
pub const UUID_GLASSES_NOTIFY_CHAR: Uuid = Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e);

/// The UUID of the ring service
pub const UUID_RING_SERVICE: Uuid = Uuid::from_u128(0xbae80001_4f05_4503_8e65_3af1f7329d1f);

/// The UUID of the ring write characteristic
pub const UUID_RING_WRITE_CHAR: Uuid = Uuid::from_u128(0xbae80012_4f05_4503_8e65_3af1f7329d1f);

/// The UUID of the ring notification characteristic
pub const UUID_RING_NOTIFY_CHAR: Uuid = Uuid::from_u128(0xbae80013_4f05_4503_8e65_3af1f7329d1f);

/// MTU requested after connecting
pub const MTU_SIZE: usize = 247;

/// ATT header bytes subtracted from the MTU for a single write
pub const ATT_OVERHEAD: usize = 3;

/// Timeout for opening a glasses connection in milliseconds
pub const CONNECTION_TIMEOUT_MS: u64 = 10_000;

/// Timeout for opening a ring connection in milliseconds
pub const RING_CONNECTION_TIMEOUT_MS: u64 = 8_000;

/// Glasses command bytes
pub const CMD_TEXT: u8 = 0x4E;
pub const CMD_EXIT: u8 = 0x18;
pub const CMD_HEARTBEAT: u8 = 0x25;
pub const CMD_BMP_DATA: u8 = 0x15;
pub const CMD_BMP_END: [u8; 3] = [0x20, 0x0D, 0x0E];
pub const CMD_CRC: u8 = 0x16;
pub const CMD_BATTERY: u8 = 0x2C;
pub const CMD_UPTIME: u8 = 0x37;
pub const CMD_FIRMWARE_REQUEST: [u8; 2] = [0x23, 0x74];
pub const CMD_TELEPROMPTER: u8 = 0x09;
pub const CMD_TELEPROMPTER_END: u8 = 0x06;

/// Heartbeat marker byte at offset 4 of probe and echo
pub const HEARTBEAT_MARKER: u8 = 0x04;

/// Text display parameters
pub const TEXT_CHUNK_SIZE: usize = 200;
pub const TEXT_HEADER_SIZE: usize = 9;
pub const NEW_SCREEN_FLAG: u8 = 0x71;
pub const DEFAULT_POS: u16 = 0;
pub const DEFAULT_PAGE_NUM: u8 = 1;
pub const DEFAULT_MAX_PAGES: u8 = 1;
pub const MAX_LINE_LENGTH: usize = 60;
pub const MAX_DISPLAY_LINES: usize = 5;

/// Bitmap transfer parameters
pub const BMP_CHUNK_SIZE: usize = 194;
pub const BMP_STORAGE_ADDRESS: [u8; 4] = [0x00, 0x1C, 0x00, 0x00];
pub const BMP_WIDTH: u32 = 576;
pub const BMP_HEIGHT: u32 = 136;

/// Teleprompter protocol parameters
pub const TELEPROMPTER_HEADER_SIZE: usize = 2;
pub const TELEPROMPTER_CONTROL_SIZE: usize = 10;
pub const TELEPROMPTER_RESERVED: u8 = 0x00;
pub const TELEPROMPTER_NEW_SCREEN_NORMAL: u8 = 0x01;
pub const TELEPROMPTER_NEW_SCREEN_MANUAL: u8 = 0x03;
pub const TELEPROMPTER_FLAGS_NORMAL: u8 = 0x81;
pub const TELEPROMPTER_FLAGS_MANUAL: u8 = 0x00;
pub const TELEPROMPTER_COUNTDOWN: u8 = 1;
pub const TELEPROMPTER_SUBCMD: u8 = 0x05;
pub const TELEPROMPTER_FINISH: u8 = 0x01;
pub const TELEPROMPTER_BYTE_BUDGET: usize = 112;
pub const TELEPROMPTER_LINE_WIDTH_PX: u32 = 180;
pub const TELEPROMPTER_BREAK_LOOKBACK: usize = 40;
pub const TELEPROMPTER_NEXT_PADDING: &str = "\n        ";
pub const TELEPROMPTER_DEFAULT_SCROLL: u8 = 0;
pub const TELEPROMPTER_MAX_SCROLL: u8 = 100;

/// Inter-packet delays in milliseconds
pub const TEXT_PACKET_DELAY_MS: u64 = 5;
pub const BMP_PACKET_DELAY_MS: u64 = 5;
pub const BMP_END_DELAY_MS: u64 = 10;
pub const TELEPROMPTER_PACKET_DELAY_MS: u64 = 10;

/// Response timeouts in milliseconds
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 3_000;
pub const BATTERY_RESPONSE_TIMEOUT_MS: u64 = 250;
pub const UPTIME_RESPONSE_TIMEOUT_MS: u64 = 250;
pub const FIRMWARE_RESPONSE_TIMEOUT_MS: u64 = 500;

/// Glasses heartbeat interval in milliseconds
pub const HEARTBEAT_INTERVAL_MS: u64 = 15_000;

/// Ring command bytes
pub const RING_CMD_BATTERY: u8 = 0x31;
pub const RING_BATTERY_REQUEST_LEN: usize = 16;
pub const RING_BATTERY_REQUEST_TRAILER: u8 = 0x03;

/// Ring keep-alive interval in milliseconds
pub const RING_KEEPALIVE_INTERVAL_MS: u64 = 5_000;

/// Upper bound of the ring sensitivity
pub const RING_SENSITIVITY_MAX: u8 = 100;
pub const RING_DEFAULT_SENSITIVITY: u8 = 50;
