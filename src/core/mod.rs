//! Core functionality for the G1 Teleprompter Bridge
//! This module contains the BLE protocol engine, the packet builders and the
//! text and bitmap rendering they rely on.

pub mod bluetooth;
pub mod protocol;
pub mod render;

// Re-export commonly used types
pub use bluetooth::{GlassesManager, RingManager};
