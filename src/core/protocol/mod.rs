//! Packet builders for the three content modes
//! Builders are pure: they turn a payload into frames and never touch the link.

pub mod bitmap;
pub mod teleprompter;
pub mod text;

use thiserror::Error;

/// One BLE write-sized frame, command byte first
pub type Packet = Vec<u8>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("Text needs {0} packets, at most 255 fit the header")]
    TooManyChunks(usize),

    #[error("Teleprompter value too large: {0} > 255 bytes")]
    ValueTooLarge(usize),

    #[error("Invalid bitmap: {0}")]
    InvalidBitmap(String),
}

pub use bitmap::{bmp_end_packet, compute_bmp_crc32, crc_packet, create_bmp_packets};
pub use teleprompter::{TeleprompterSession, build_teleprompter_value, teleprompter_end_packet};
pub use text::{TextPacketBuilder, create_text_packets};
