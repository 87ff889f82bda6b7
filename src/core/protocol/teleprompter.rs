//! Teleprompter control-array frames
//!
//! A screen update is one or two value packets: part 1 holds the visible text,
//! part 2 the upcoming text. Every packet consumes one sequence number; the end
//! frame repeats the current one.

use log::debug;

use crate::core::bluetooth::constants::{
    CMD_TELEPROMPTER, CMD_TELEPROMPTER_END, TELEPROMPTER_CONTROL_SIZE, TELEPROMPTER_COUNTDOWN,
    TELEPROMPTER_FINISH, TELEPROMPTER_FLAGS_MANUAL, TELEPROMPTER_FLAGS_NORMAL,
    TELEPROMPTER_HEADER_SIZE, TELEPROMPTER_MAX_SCROLL, TELEPROMPTER_NEW_SCREEN_MANUAL,
    TELEPROMPTER_NEW_SCREEN_NORMAL, TELEPROMPTER_RESERVED, TELEPROMPTER_SUBCMD,
};
use crate::core::protocol::{Packet, PacketError};
use crate::core::render::layout::{GlyphWidthTable, split_text_for_teleprompter};

/// Builds one value packet: `[0x09, len]`, the 10 byte control array, then `payload`.
pub fn build_teleprompter_value(
    seq: u8,
    num_parts: u8,
    part_index: u8,
    payload: &[u8],
    scroll_percent: u8,
    manual_mode: bool,
) -> Result<Packet, PacketError> {
    let (new_screen, flags) = if manual_mode {
        (TELEPROMPTER_NEW_SCREEN_MANUAL, TELEPROMPTER_FLAGS_MANUAL)
    } else {
        (TELEPROMPTER_NEW_SCREEN_NORMAL, TELEPROMPTER_FLAGS_NORMAL)
    };

    let len = TELEPROMPTER_HEADER_SIZE + TELEPROMPTER_CONTROL_SIZE + payload.len();
    let len_byte = u8::try_from(len).map_err(|_| PacketError::ValueTooLarge(len))?;

    let mut packet = Vec::with_capacity(len);
    packet.extend_from_slice(&[
        CMD_TELEPROMPTER,
        len_byte,
        TELEPROMPTER_RESERVED,
        seq,
        new_screen,
        num_parts,
        TELEPROMPTER_RESERVED,
        part_index,
        TELEPROMPTER_RESERVED,
        TELEPROMPTER_COUNTDOWN,
        flags,
        scroll_percent.min(TELEPROMPTER_MAX_SCROLL),
    ]);
    packet.extend_from_slice(payload);
    Ok(packet)
}

/// Part 1 carries `visible`. Part 2, present when `next` is non-empty, uses the
/// following sequence number.
pub fn build_teleprompter_packets(
    visible: &str,
    next: &str,
    seq: u8,
    scroll_percent: u8,
    manual_mode: bool,
) -> Result<Vec<Packet>, PacketError> {
    let num_parts = if next.is_empty() { 1 } else { 2 };
    let mut packets = vec![build_teleprompter_value(
        seq,
        num_parts,
        1,
        visible.as_bytes(),
        scroll_percent,
        manual_mode,
    )?];
    if !next.is_empty() {
        packets.push(build_teleprompter_value(
            seq.wrapping_add(1),
            2,
            2,
            next.as_bytes(),
            scroll_percent,
            manual_mode,
        )?);
    }
    Ok(packets)
}

/// Ends the session shown under `seq`.
pub fn teleprompter_end_packet(seq: u8) -> Packet {
    vec![
        CMD_TELEPROMPTER,
        CMD_TELEPROMPTER_END,
        TELEPROMPTER_RESERVED,
        seq,
        TELEPROMPTER_SUBCMD,
        TELEPROMPTER_FINISH,
    ]
}

/// Sequence counter of one teleprompter stream
#[derive(Debug, Default)]
pub struct TeleprompterSession {
    seq: u8,
    manual_mode: bool,
}

impl TeleprompterSession {
    pub fn new(manual_mode: bool) -> Self {
        Self {
            seq: 0,
            manual_mode,
        }
    }

    pub fn seq(&self) -> u8 {
        self.seq
    }

    /// Wraps `text` to `line_width_px`, splits it into visible and next parts
    /// and builds the frames. The counter only advances when building succeeds.
    pub fn prepare(
        &mut self,
        text: &str,
        scroll_percent: u8,
        glyphs: &GlyphWidthTable,
        line_width_px: u32,
    ) -> Result<Vec<Packet>, PacketError> {
        let wrapped = glyphs.add_line_breaks(text, line_width_px);
        let split = split_text_for_teleprompter(&wrapped);
        debug!(
            "Teleprompter split: visible {} bytes, next {} bytes",
            split.visible.len(),
            split.next.len()
        );

        let packets = build_teleprompter_packets(
            &split.visible,
            &split.next,
            self.seq,
            scroll_percent,
            self.manual_mode,
        )?;
        self.seq = self.seq.wrapping_add(packets.len() as u8);
        Ok(packets)
    }

    /// End frame for the current sequence number; the counter is not advanced.
    pub fn end_packet(&self) -> Packet {
        teleprompter_end_packet(self.seq)
    }
}
