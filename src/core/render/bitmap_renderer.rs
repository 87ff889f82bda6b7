//! Text to 1-bit BMP rasterizer for the 576x136 glasses display
//!
//! The pixel buffer starts with every bit set (background) and glyph pixels are
//! cleared. Layout is a monospace grid of 8x16 cells inside a padded text area;
//! rows that do not fit are dropped.

use base64::{Engine, engine::general_purpose::STANDARD};
use log::debug;

use crate::core::bluetooth::constants::{BMP_HEIGHT, BMP_WIDTH};
use crate::core::protocol::PacketError;
use crate::core::render::font::{GLYPH_HEIGHT, GLYPH_WIDTH, Glyph, glyph};

const FILE_HEADER_SIZE: usize = 14;
const INFO_HEADER_SIZE: usize = 40;
const PALETTE_SIZE: usize = 8;
/// Offset of the pixel data in the file
pub const PIXEL_DATA_OFFSET: usize = FILE_HEADER_SIZE + INFO_HEADER_SIZE + PALETTE_SIZE;
/// 72 DPI
const PIXELS_PER_METER: i32 = 2835;

pub const DEFAULT_PADDING: usize = 8;

#[derive(Debug, Clone)]
pub struct BitmapRenderer {
    width: usize,
    height: usize,
    padding: usize,
    word_wrap: bool,
}

impl Default for BitmapRenderer {
    fn default() -> Self {
        Self {
            width: BMP_WIDTH as usize,
            height: BMP_HEIGHT as usize,
            padding: DEFAULT_PADDING,
            word_wrap: true,
        }
    }
}

impl BitmapRenderer {
    pub fn new(width: usize, height: usize, padding: usize) -> Self {
        Self {
            width,
            height,
            padding,
            word_wrap: true,
        }
    }

    /// Wrap on character count only, ignoring word boundaries.
    pub fn without_word_wrap(mut self) -> Self {
        self.word_wrap = false;
        self
    }

    /// Bytes per pixel row, padded to a multiple of four
    pub fn row_stride(&self) -> usize {
        self.width.div_ceil(8).div_ceil(4) * 4
    }

    pub fn chars_per_row(&self) -> usize {
        self.width.saturating_sub(self.padding * 2) / GLYPH_WIDTH
    }

    pub fn max_rows(&self) -> usize {
        self.height.saturating_sub(self.padding * 2) / GLYPH_HEIGHT
    }

    /// Renders `text` into a complete BMP file.
    pub fn text_to_bitmap(&self, text: &str) -> Result<Vec<u8>, PacketError> {
        let pixels = self.render_pixels(text);
        let bmp = self.create_bmp_file(&pixels);
        if !self.validate_bmp_format(&bmp) {
            return Err(PacketError::InvalidBitmap(
                "generated BMP failed validation".to_string(),
            ));
        }
        debug!("Rendered {} bytes of BMP for {} chars", bmp.len(), text.chars().count());
        Ok(bmp)
    }

    /// Raw bottom-up pixel rows for `text`.
    pub fn render_pixels(&self, text: &str) -> Vec<u8> {
        let stride = self.row_stride();
        let mut buffer = vec![0xFF; stride * self.height];

        let chars_per_row = self.chars_per_row();
        let max_rows = self.max_rows();
        if text.trim().is_empty() || chars_per_row == 0 || max_rows == 0 {
            return buffer;
        }

        let lines = self.wrap_text(text, chars_per_row);
        for (line_index, line) in lines.iter().take(max_rows).enumerate() {
            let y = self.padding + line_index * GLYPH_HEIGHT;
            for (char_index, c) in line.chars().take(chars_per_row).enumerate() {
                if c == ' ' {
                    continue;
                }
                let x = self.padding + char_index * GLYPH_WIDTH;
                self.draw_glyph(&mut buffer, glyph(c), x, y, stride);
            }
        }
        buffer
    }

    fn draw_glyph(&self, buffer: &mut [u8], pattern: &Glyph, x: usize, y: usize, stride: usize) {
        let max_x = (x + GLYPH_WIDTH).min(self.width);
        let max_y = (y + GLYPH_HEIGHT).min(self.height);

        for (row, bits) in pattern.iter().enumerate() {
            if y + row >= max_y {
                break;
            }
            if *bits == 0 {
                continue;
            }
            // BMP rows are stored bottom-up
            let row_offset = (self.height - 1 - (y + row)) * stride;
            for bit in 0..GLYPH_WIDTH {
                let pixel_x = x + bit;
                if pixel_x >= max_x {
                    break;
                }
                if bits & (0x80 >> bit) != 0 {
                    let byte_index = row_offset + (pixel_x >> 3);
                    buffer[byte_index] &= !(1 << (7 - (pixel_x & 7)));
                }
            }
        }
    }

    /// Greedy word wrap to `max_chars`; words longer than a line are cut.
    pub fn wrap_text(&self, text: &str, max_chars: usize) -> Vec<String> {
        if max_chars == 0 {
            return Vec::new();
        }
        if !self.word_wrap {
            return chunk_chars(text, max_chars);
        }

        let mut lines = Vec::new();
        let mut current = String::new();
        for word in text.split(' ') {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };

            if candidate.chars().count() <= max_chars {
                current = candidate;
            } else if !current.is_empty() {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            } else {
                lines.extend(chunk_chars(word, max_chars));
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
        lines
    }

    /// Wraps `pixels` in file header, info header and the two-entry palette.
    pub fn create_bmp_file(&self, pixels: &[u8]) -> Vec<u8> {
        let file_size = PIXEL_DATA_OFFSET + pixels.len();
        let mut bmp = Vec::with_capacity(file_size);

        // BITMAPFILEHEADER
        bmp.extend_from_slice(b"BM");
        bmp.extend_from_slice(&(file_size as u32).to_le_bytes());
        bmp.extend_from_slice(&0u16.to_le_bytes());
        bmp.extend_from_slice(&0u16.to_le_bytes());
        bmp.extend_from_slice(&(PIXEL_DATA_OFFSET as u32).to_le_bytes());

        // BITMAPINFOHEADER, positive height = bottom-up
        bmp.extend_from_slice(&(INFO_HEADER_SIZE as u32).to_le_bytes());
        bmp.extend_from_slice(&(self.width as i32).to_le_bytes());
        bmp.extend_from_slice(&(self.height as i32).to_le_bytes());
        bmp.extend_from_slice(&1u16.to_le_bytes());
        bmp.extend_from_slice(&1u16.to_le_bytes());
        bmp.extend_from_slice(&0u32.to_le_bytes());
        bmp.extend_from_slice(&(pixels.len() as u32).to_le_bytes());
        bmp.extend_from_slice(&PIXELS_PER_METER.to_le_bytes());
        bmp.extend_from_slice(&PIXELS_PER_METER.to_le_bytes());
        bmp.extend_from_slice(&2u32.to_le_bytes());
        bmp.extend_from_slice(&2u32.to_le_bytes());

        // Palette, BGRA
        bmp.extend_from_slice(&0x00FF_FFFFu32.to_le_bytes());
        bmp.extend_from_slice(&0x0000_0000u32.to_le_bytes());

        bmp.extend_from_slice(pixels);
        bmp
    }

    /// Checks signature, declared file size and dimensions.
    pub fn validate_bmp_format(&self, bmp: &[u8]) -> bool {
        if bmp.len() < 26 || &bmp[..2] != b"BM" {
            return false;
        }
        let read_u32 = |offset: usize| {
            u32::from_le_bytes([bmp[offset], bmp[offset + 1], bmp[offset + 2], bmp[offset + 3]])
        };
        let file_size = read_u32(2) as usize;
        let width = read_u32(18) as i32;
        let height = (read_u32(22) as i32).unsigned_abs() as usize;

        file_size == bmp.len() && width == self.width as i32 && height == self.height
    }
}

/// Base64 text of a BMP file, as accepted by `send_image`.
pub fn bitmap_to_base64(bmp: &[u8]) -> String {
    STANDARD.encode(bmp)
}

fn chunk_chars(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
