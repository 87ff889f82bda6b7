//! Text display frames

use crate::core::bluetooth::constants::{
    CMD_TEXT, DEFAULT_MAX_PAGES, DEFAULT_PAGE_NUM, DEFAULT_POS, NEW_SCREEN_FLAG, TEXT_CHUNK_SIZE,
    TEXT_HEADER_SIZE,
};
use crate::core::protocol::{Packet, PacketError};

/// Splits the UTF-8 bytes of `text` into 200 byte chunks, each behind a 9 byte header.
///
/// Chunks cut through code points; the glasses reassemble the bytes before decoding.
pub fn create_text_packets(text: &str, seq: u8) -> Result<Vec<Packet>, PacketError> {
    let data = text.as_bytes();
    let total = data.len().div_ceil(TEXT_CHUNK_SIZE);
    let total_byte = u8::try_from(total).map_err(|_| PacketError::TooManyChunks(total))?;

    Ok(data
        .chunks(TEXT_CHUNK_SIZE)
        .enumerate()
        .map(|(index, chunk)| {
            let mut packet = Vec::with_capacity(TEXT_HEADER_SIZE + chunk.len());
            packet.extend_from_slice(&[
                CMD_TEXT,
                seq,
                total_byte,
                index as u8,
                NEW_SCREEN_FLAG,
                (DEFAULT_POS >> 8) as u8,
                (DEFAULT_POS & 0xFF) as u8,
                DEFAULT_PAGE_NUM,
                DEFAULT_MAX_PAGES,
            ]);
            packet.extend_from_slice(chunk);
            packet
        })
        .collect())
}

/// Owns the sync sequence shared by all chunks of one send.
#[derive(Debug, Default)]
pub struct TextPacketBuilder {
    seq: u8,
}

impl TextPacketBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the frames for `text` and advances the sequence once.
    pub fn build(&mut self, text: &str) -> Result<Vec<Packet>, PacketError> {
        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);
        create_text_packets(text, seq)
    }

    pub fn seq(&self) -> u8 {
        self.seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_is_a_single_packet() {
        let packets = create_text_packets("Hello", 3).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].len(), 14);
        assert_eq!(&packets[0][..9], &[0x4E, 3, 1, 0, 0x71, 0x00, 0x00, 0x01, 0x01]);
        assert_eq!(&packets[0][9..], b"Hello");
    }

    #[test]
    fn test_chunks_reassemble() {
        let text = "ä".repeat(250);
        let packets = create_text_packets(&text, 0).unwrap();
        assert_eq!(packets.len(), 3);

        let mut joined = Vec::new();
        for (index, packet) in packets.iter().enumerate() {
            assert_eq!(packet[2], 3);
            assert_eq!(packet[3], index as u8);
            assert!(packet.len() <= 9 + 200);
            joined.extend_from_slice(&packet[9..]);
        }
        assert_eq!(joined, text.as_bytes());
    }

    #[test]
    fn test_empty_text_has_no_packets() {
        assert!(create_text_packets("", 0).unwrap().is_empty());
    }

    #[test]
    fn test_oversized_text_is_rejected() {
        let text = "a".repeat(200 * 256);
        assert_eq!(
            create_text_packets(&text, 0),
            Err(PacketError::TooManyChunks(256))
        );
    }

    #[test]
    fn test_builder_advances_once_per_call() {
        let mut builder = TextPacketBuilder::new();
        let first = builder.build(&"x".repeat(450)).unwrap();
        let second = builder.build("y").unwrap();

        assert!(first.iter().all(|p| p[1] == 0));
        assert_eq!(second[0][1], 1);
        assert_eq!(builder.seq(), 2);
    }

    #[test]
    fn test_builder_sequence_wraps() {
        let mut builder = TextPacketBuilder { seq: 255 };
        assert_eq!(builder.build("a").unwrap()[0][1], 255);
        assert_eq!(builder.build("b").unwrap()[0][1], 0);
    }
}
