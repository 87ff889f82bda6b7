//! Bitmap transfer frames and the transfer checksum

use crate::core::bluetooth::constants::{
    BMP_CHUNK_SIZE, BMP_STORAGE_ADDRESS, CMD_BMP_DATA, CMD_BMP_END, CMD_CRC,
};
use crate::core::protocol::Packet;

/// Splits `bmp` into 194 byte chunks. The first chunk carries the storage address.
pub fn create_bmp_packets(bmp: &[u8]) -> Vec<Packet> {
    bmp.chunks(BMP_CHUNK_SIZE)
        .enumerate()
        .map(|(index, chunk)| {
            let mut packet = Vec::with_capacity(2 + BMP_STORAGE_ADDRESS.len() + chunk.len());
            packet.push(CMD_BMP_DATA);
            packet.push((index & 0xFF) as u8);
            if index == 0 {
                packet.extend_from_slice(&BMP_STORAGE_ADDRESS);
            }
            packet.extend_from_slice(chunk);
            packet
        })
        .collect()
}

/// End-of-transfer marker, sent after the last chunk
pub fn bmp_end_packet() -> Packet {
    CMD_BMP_END.to_vec()
}

/// IEEE CRC-32 over the storage address followed by the bitmap bytes.
pub fn compute_bmp_crc32(bmp: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&BMP_STORAGE_ADDRESS);
    hasher.update(bmp);
    hasher.finalize()
}

/// Checksum frame, big-endian
pub fn crc_packet(crc: u32) -> Packet {
    let mut packet = Vec::with_capacity(5);
    packet.push(CMD_CRC);
    packet.extend_from_slice(&crc.to_be_bytes());
    packet
}
