//! Bluetooth functionality for the G1 Teleprompter Bridge
//! This module handles all bluetooth operations including connecting both
//! lenses of the glasses and the ring, framing writes and reading telemetry.

pub mod commands;
pub mod connection;
pub mod constants;
pub mod dispatcher;
pub mod heartbeat;
pub mod link;
pub mod manager;
pub mod observer;
pub mod ring;
pub mod scanner;
pub mod status;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

// Re-export types that should be publicly accessible
pub use commands::{GlassesCommand, RingCommand};
pub use connection::{
    AdapterPermission, BluestConnector, ConnectionManager, DeviceConnector, PermissionGate,
};
pub use dispatcher::{DispatchMode, DispatchOutcome, execute_for_devices};
pub use link::{BluestLink, GattLink, LinkError};
pub use manager::GlassesManager;
pub use observer::Subscription;
pub use ring::RingManager;
pub use scanner::BluetoothScanner;
pub use types::{
    ConnectionState, DeviceStatus, GattProfile, GestureMode, GlassesStatus, RingStatus, Side,
};
