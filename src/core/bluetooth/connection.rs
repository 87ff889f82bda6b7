//! Bluetooth connection handling for the glasses and the ring
//! This module opens links, owns the per-side handles and publishes state changes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bluest::Adapter;
use futures_util::future::join_all;
use log::{error, info, warn};
use tokio::time::timeout;

use crate::core::bluetooth::constants::{ATT_OVERHEAD, MTU_SIZE};
use crate::core::bluetooth::link::{BluestLink, GattLink};
use crate::core::bluetooth::observer::{ObserverList, Subscription};
use crate::core::bluetooth::scanner::BluetoothScanner;
use crate::core::bluetooth::types::{ConnectionState, GattProfile, Side};
use crate::error::BridgeError;
use crate::utils::lock;

/// Opens a [`GattLink`] to the device at an address.
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    async fn connect(&self, address: &str, profile: &GattProfile) -> Result<Arc<dyn GattLink>>;
}

/// Runtime Bluetooth permission check, performed before every connection attempt.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn request(&self) -> bool;
}

/// Grants permission when the adapter reports itself available.
pub struct AdapterPermission {
    adapter: Adapter,
    wait: Duration,
}

impl AdapterPermission {
    pub fn new(adapter: Adapter) -> Self {
        Self {
            adapter,
            wait: Duration::from_secs(2),
        }
    }
}

#[async_trait]
impl PermissionGate for AdapterPermission {
    async fn request(&self) -> bool {
        match timeout(self.wait, self.adapter.wait_available()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Bluetooth adapter not available: {}", e);
                false
            }
            Err(_) => {
                warn!("Bluetooth adapter did not become available in {:?}", self.wait);
                false
            }
        }
    }
}

/// Connects through a bluest adapter.
#[derive(Clone)]
pub struct BluestConnector {
    adapter: Adapter,
}

impl BluestConnector {
    pub fn new(adapter: Adapter) -> Self {
        Self { adapter }
    }

    /// Opens the default adapter and waits until it is usable.
    pub async fn with_default_adapter() -> Result<Self, BridgeError> {
        let adapter = Adapter::default()
            .await
            .ok_or(BridgeError::AdapterUnavailable)?;
        adapter
            .wait_available()
            .await
            .map_err(|_| BridgeError::AdapterUnavailable)?;
        info!("Bluetooth adapter is available.");
        Ok(Self { adapter })
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }
}

#[async_trait]
impl DeviceConnector for BluestConnector {
    async fn connect(&self, address: &str, profile: &GattProfile) -> Result<Arc<dyn GattLink>> {
        let scanner = BluetoothScanner::new(self.adapter.clone());
        let device = scanner.find_device(address, profile.service).await?;

        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let id = device.id().to_string();
        info!("Device details - ID: {}, Name: {:?}", id, name);

        if !device.is_connected().await {
            info!("Initiating connection to {}...", id);
            self.adapter.connect_device(&device).await?;
        }

        info!("Connection successful, discovering services...");
        let services = device.services().await?;
        let service = services
            .iter()
            .find(|s| s.uuid() == profile.service)
            .ok_or_else(|| {
                for service in &services {
                    info!("Available service: {}", service.uuid());
                }
                anyhow!("Service not found: {}", profile.service)
            })?
            .clone();

        let mut notify_char_opt = None;
        let mut write_char_opt = None;
        for characteristic in service.characteristics().await? {
            let uuid = characteristic.uuid();
            if uuid == profile.notify_characteristic {
                info!("Found notification characteristic: {}", uuid);
                notify_char_opt = Some(characteristic);
            } else if uuid == profile.write_characteristic {
                info!("Found write characteristic: {}", uuid);
                write_char_opt = Some(characteristic);
            }
        }

        let notify_char = notify_char_opt.ok_or_else(|| {
            anyhow!("Notification characteristic not found: {}", profile.notify_characteristic)
        })?;
        let write_char = write_char_opt.ok_or_else(|| {
            anyhow!("Write characteristic not found: {}", profile.write_characteristic)
        })?;

        let link = BluestLink::new(self.adapter.clone(), device, write_char, notify_char);

        // The platform negotiates the MTU itself; only report when it came out small.
        match link.max_write_len() {
            Ok(len) if len < MTU_SIZE - ATT_OVERHEAD => warn!(
                "Negotiated write length {} is below the requested MTU {}",
                len, MTU_SIZE
            ),
            Ok(len) => info!("Maximum write length: {}", len),
            Err(e) => warn!("Could not query the write length: {}", e),
        }

        Ok(Arc::new(link))
    }
}

#[derive(Default)]
struct Slots {
    left: Option<Arc<dyn GattLink>>,
    right: Option<Arc<dyn GattLink>>,
    state: ConnectionState,
}

impl Slots {
    fn slot_mut(&mut self, side: Side) -> Option<&mut Option<Arc<dyn GattLink>>> {
        match side {
            Side::Left => Some(&mut self.left),
            Side::Right => Some(&mut self.right),
            Side::Both => None,
        }
    }

    fn slot(&self, side: Side) -> Option<&Arc<dyn GattLink>> {
        match side {
            Side::Left => self.left.as_ref(),
            Side::Right => self.right.as_ref(),
            Side::Both => None,
        }
    }
}

/// Owns the per-side links and the connection flags.
///
/// Cloning yields another handle to the same slots and observers. The slot lock
/// is never held across an await or while observers run.
#[derive(Clone)]
pub struct ConnectionManager {
    connector: Arc<dyn DeviceConnector>,
    permissions: Arc<dyn PermissionGate>,
    profile: GattProfile,
    connect_timeout: Duration,
    slots: Arc<Mutex<Slots>>,
    observers: ObserverList<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn DeviceConnector>,
        permissions: Arc<dyn PermissionGate>,
        profile: GattProfile,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            permissions,
            profile,
            connect_timeout,
            slots: Arc::new(Mutex::new(Slots::default())),
            observers: ObserverList::new(),
        }
    }

    /// Connects `side` to the device at `address`.
    pub async fn connect(&self, address: &str, side: Side) -> Result<(), BridgeError> {
        if side == Side::Both {
            return Err(BridgeError::Connection {
                side,
                source: anyhow!("a connection slot is either left or right"),
            });
        }

        if !self.permissions.request().await {
            error!("Bluetooth permission not granted");
            return Err(BridgeError::PermissionDenied);
        }

        info!("Connecting {} device at {}", side, address);
        let link = match timeout(
            self.connect_timeout,
            self.connector.connect(address, &self.profile),
        )
        .await
        {
            Ok(Ok(link)) => link,
            Ok(Err(source)) => {
                error!("Failed to connect {} device: {:#}", side, source);
                return Err(BridgeError::Connection { side, source });
            }
            Err(_) => {
                error!("Connecting {} device timed out", side);
                return Err(BridgeError::Connection {
                    side,
                    source: anyhow!("timed out after {:?}", self.connect_timeout),
                });
            }
        };

        let link_id = link.id();
        let (previous, snapshot) = {
            let mut slots = lock(&self.slots);
            let previous = slots.slot_mut(side).and_then(|slot| slot.replace(link));
            slots.state.set(side, true);
            (previous, slots.state)
        };

        // The connector hands back the live device when it is already connected.
        if let Some(previous) = previous.filter(|previous| previous.id() != link_id) {
            if let Err(e) = previous.disconnect().await {
                warn!("Failed to release previous {} link: {}", side, e);
            }
        }

        info!("{} device connected", side);
        self.observers.notify(&snapshot);
        Ok(())
    }

    /// Disconnects both sides concurrently and resets the flags.
    pub async fn disconnect_all(&self) {
        let (links, changed) = {
            let mut slots = lock(&self.slots);
            let links: Vec<(Side, Arc<dyn GattLink>)> = [
                slots.left.take().map(|l| (Side::Left, l)),
                slots.right.take().map(|l| (Side::Right, l)),
            ]
            .into_iter()
            .flatten()
            .collect();
            let changed = slots.state.any();
            slots.state = ConnectionState::default();
            (links, changed)
        };

        let results = join_all(links.iter().map(|(side, link)| async move {
            (*side, link.disconnect().await)
        }))
        .await;
        for (side, result) in results {
            if let Err(e) = result {
                warn!("Error while disconnecting {} device: {}", side, e);
            }
        }

        info!("All devices disconnected");
        if changed || !links.is_empty() {
            self.observers.notify(&ConnectionState::default());
        }
    }

    /// Marks `side` disconnected after a failed liveness check and releases its link.
    ///
    /// Returns false when the side was already disconnected.
    pub async fn demote(&self, side: Side) -> bool {
        let mut released = Vec::new();
        let snapshot = {
            let mut slots = lock(&self.slots);
            let mut changed = false;
            for target in side.targets() {
                if let Some(link) = slots.slot_mut(*target).and_then(Option::take) {
                    released.push(link);
                }
                if slots.state.get(*target) {
                    slots.state.set(*target, false);
                    changed = true;
                }
            }
            changed.then_some(slots.state)
        };

        for link in released {
            if let Err(e) = link.disconnect().await {
                warn!("Error while releasing {} link: {}", side, e);
            }
        }

        match snapshot {
            Some(state) => {
                warn!("{} device marked as disconnected", side);
                self.observers.notify(&state);
                true
            }
            None => false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.slots).state
    }

    pub fn is_connected(&self, side: Side) -> bool {
        self.state().get(side)
    }

    /// Link of a single side
    pub fn link(&self, side: Side) -> Option<Arc<dyn GattLink>> {
        lock(&self.slots).slot(side).cloned()
    }

    /// Resolves `side` to the present links, left before right.
    pub fn links(&self, side: Side) -> Vec<(Side, Arc<dyn GattLink>)> {
        let slots = lock(&self.slots);
        side.targets()
            .iter()
            .filter_map(|target| slots.slot(*target).map(|link| (*target, link.clone())))
            .collect()
    }

    /// Registers `callback` and immediately calls it with the current state.
    pub fn on_connection_state_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        let current = self.state();
        callback(current);
        self.observers.subscribe(callback)
    }
}
