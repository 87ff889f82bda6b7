use g1_teleprompter_bridge_lib::core::bluetooth::status::{
    decode_battery, decode_firmware, decode_uptime,
};
use g1_teleprompter_bridge_lib::core::protocol::{
    PacketError, TeleprompterSession, TextPacketBuilder, bmp_end_packet, compute_bmp_crc32,
    crc_packet, create_bmp_packets, create_text_packets, teleprompter_end_packet,
};
use g1_teleprompter_bridge_lib::core::render::GlyphWidthTable;

fn reassemble(packets: &[Vec<u8>]) -> Vec<u8> {
    packets.iter().flat_map(|p| p[9..].to_vec()).collect()
}

#[test]
fn test_hello_scenario() {
    let packets = create_text_packets("Hello", 7).unwrap();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].len(), 14);
    assert_eq!(&packets[0][..9], &[0x4E, 7, 1, 0, 0x71, 0x00, 0x00, 0x01, 0x01]);
    assert_eq!(&packets[0][9..], b"Hello");
}

#[test]
fn test_text_chunks_reassemble() {
    let inputs = [
        "a".repeat(199),
        "a".repeat(200),
        "a".repeat(201),
        "Grüße, 世界! 😀 ".repeat(60),
        "x".repeat(200 * 255),
    ];
    for text in &inputs {
        let packets = create_text_packets(text, 0).unwrap();
        assert_eq!(packets.len(), text.len().div_ceil(200));
        for (index, packet) in packets.iter().enumerate() {
            assert_eq!(packet[2] as usize, packets.len());
            assert_eq!(packet[3] as usize, index);
            assert!(packet.len() <= 209);
        }
        assert_eq!(reassemble(&packets), text.as_bytes());
    }
}

#[test]
fn test_text_limits() {
    assert!(create_text_packets("", 0).unwrap().is_empty());
    assert_eq!(
        create_text_packets(&"x".repeat(200 * 255 + 1), 0),
        Err(PacketError::TooManyChunks(256))
    );
}

#[test]
fn test_sync_sequence_wraps() {
    let mut builder = TextPacketBuilder::new();
    for _ in 0..255 {
        builder.build("tick").unwrap();
    }
    assert_eq!(builder.build("tick").unwrap()[0][1], 255);
    assert_eq!(builder.build("tick").unwrap()[0][1], 0);
}

#[test]
fn test_bitmap_transfer_frames() {
    let bmp: Vec<u8> = (0..1000u32).map(|i| (i * 7) as u8).collect();
    let packets = create_bmp_packets(&bmp);

    assert_eq!(packets.len(), 6);
    assert_eq!(&packets[0][..6], &[0x15, 0x00, 0x00, 0x1C, 0x00, 0x00]);
    for (index, packet) in packets.iter().enumerate().skip(1) {
        assert_eq!(&packet[..2], &[0x15, index as u8]);
    }
    let payload: Vec<u8> = packets
        .iter()
        .enumerate()
        .flat_map(|(i, p)| p[if i == 0 { 6 } else { 2 }..].to_vec())
        .collect();
    assert_eq!(payload, bmp);
    assert_eq!(bmp_end_packet(), vec![0x20, 0x0D, 0x0E]);
}

#[test]
fn test_crc_covers_storage_address() {
    let bmp = b"BM example payload".to_vec();
    let crc = compute_bmp_crc32(&bmp);

    let mut prefixed = vec![0x00, 0x1C, 0x00, 0x00];
    prefixed.extend_from_slice(&bmp);
    assert_eq!(crc, crc32fast::hash(&prefixed));
    assert_ne!(crc, crc32fast::hash(&bmp));
    assert_eq!(crc, compute_bmp_crc32(&bmp));

    let packet = crc_packet(crc);
    assert_eq!(packet[0], 0x16);
    assert_eq!(u32::from_be_bytes([packet[1], packet[2], packet[3], packet[4]]), crc);
}

#[test]
fn test_crc_detects_single_bit_flips() {
    let bmp: Vec<u8> = (0..64u8).collect();
    let crc = compute_bmp_crc32(&bmp);
    for byte in 0..bmp.len() {
        for bit in 0..8 {
            let mut flipped = bmp.clone();
            flipped[byte] ^= 1 << bit;
            assert_ne!(compute_bmp_crc32(&flipped), crc);
        }
    }
}

#[test]
fn test_teleprompter_session() {
    let glyphs = GlyphWidthTable::builtin();
    let mut session = TeleprompterSession::new(false);

    let packets = session
        .prepare("Welcome everyone. Today we talk about BLE.", 150, &glyphs, 180)
        .unwrap();
    assert_eq!(packets.len(), 2);
    for (index, packet) in packets.iter().enumerate() {
        assert_eq!(packet[0], 0x09);
        assert_eq!(packet[1] as usize, packet.len());
        assert_eq!(packet[3], index as u8);
        assert_eq!(packet[4], 0x01);
        assert_eq!(packet[5], 2);
        assert_eq!(packet[7], index as u8 + 1);
        assert_eq!(packet[10], 0x81);
        assert_eq!(packet[11], 100);
    }
    assert!(packets[1].ends_with(b"\n        "));

    assert_eq!(session.seq(), 2);
    assert_eq!(session.end_packet(), teleprompter_end_packet(2));
    assert_eq!(session.seq(), 2);
}

#[test]
fn test_manual_mode_flags() {
    let glyphs = GlyphWidthTable::builtin();
    let mut session = TeleprompterSession::new(true);
    let packets = session.prepare("Manual", 0, &glyphs, 180).unwrap();
    assert_eq!(packets[0][4], 0x03);
    assert_eq!(packets[0][10], 0x00);
}

#[test]
fn test_status_scenarios() {
    assert_eq!(decode_battery(&[0x2C, 0x01, 0x4B]), Some(75));
    assert_eq!(decode_uptime(&[0x37, 0x00, 0x0A, 0x00]), Some(10));
    assert_eq!(decode_uptime(&[0x37]), None);
    assert_eq!(decode_firmware(b"ver 1.6.1"), Some("ver 1.6.1".to_string()));
}
