//! G1 Teleprompter Bridge library
//! BLE protocol engine for the Even G1 glasses and their ring remote.

// Module declarations
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod state;
pub mod utils;

pub use crate::core::bluetooth::{
    ConnectionState, DeviceStatus, GlassesManager, GlassesStatus, RingManager, RingStatus, Side,
};
pub use error::{BridgeError, Result};
pub use state::AppState;
