//! Text rendering: glyph widths and layout, and the BMP rasterizer

pub mod bitmap_renderer;
pub mod font;
pub mod layout;

pub use bitmap_renderer::{BitmapRenderer, bitmap_to_base64};
pub use layout::{GlyphWidthTable, TeleprompterSplit, format_text_for_display};
