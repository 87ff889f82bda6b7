//! Ring remote: single-sided connection, battery telemetry and keep-alive

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use log::{error, info, warn};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::config::ring_config::RingConfig;
use crate::core::bluetooth::commands::RingCommand;
use crate::core::bluetooth::connection::{DeviceConnector, PermissionGate};
use crate::core::bluetooth::constants::RING_SENSITIVITY_MAX;
use crate::core::bluetooth::link::GattLink;
use crate::core::bluetooth::observer::{ObserverList, Subscription};
use crate::core::bluetooth::transport::send_command_with_response;
use crate::core::bluetooth::types::{GestureMode, RingStatus, UNKNOWN};
use crate::error::BridgeError;
use crate::utils::lock;

/// `[0x31, level, ...]` → level
pub fn decode_ring_battery(response: &[u8]) -> Option<u8> {
    response.get(1).copied()
}

struct RingState {
    link: Option<Arc<dyn GattLink>>,
    status: RingStatus,
}

/// State shared with the keep-alive task
struct RingShared {
    state: Mutex<RingState>,
    observers: ObserverList<bool>,
    response_timeout: Duration,
}

impl RingShared {
    fn link(&self) -> Option<Arc<dyn GattLink>> {
        lock(&self.state).link.clone()
    }

    fn is_connected(&self) -> bool {
        lock(&self.state).status.connected
    }

    /// Drops the link and clears the flag; notifies only on a change.
    async fn release(&self) -> bool {
        let (link, changed) = {
            let mut state = lock(&self.state);
            let changed = state.status.connected;
            state.status.connected = false;
            (state.link.take(), changed)
        };
        if let Some(link) = link {
            if let Err(e) = link.disconnect().await {
                warn!("Error while disconnecting ring: {}", e);
            }
        }
        if changed {
            self.observers.notify(&false);
        }
        changed
    }

    /// Sends the battery request and records the level. `None` when the ring did not answer.
    async fn query_battery(&self, link: &dyn GattLink) -> Option<u8> {
        let command = RingCommand::Battery;
        let response = send_command_with_response(
            link,
            &command.to_bytes(),
            command.expected_header(),
            self.response_timeout,
        )
        .await;

        let level = match response {
            Ok(response) => response.as_deref().and_then(decode_ring_battery),
            Err(e) => {
                warn!("Ring battery request failed: {}", e);
                None
            }
        };
        if let Some(level) = level {
            lock(&self.state).status.battery = i32::from(level);
        }
        level
    }
}

/// Manages the ring remote
pub struct RingManager {
    config: RingConfig,
    connector: Arc<dyn DeviceConnector>,
    permissions: Arc<dyn PermissionGate>,
    shared: Arc<RingShared>,
    keepalive: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl RingManager {
    pub fn new(
        config: RingConfig,
        connector: Arc<dyn DeviceConnector>,
        permissions: Arc<dyn PermissionGate>,
    ) -> Self {
        let status = RingStatus {
            connected: false,
            battery: UNKNOWN,
            firmware: None,
            gesture_mode: GestureMode::default(),
            sensitivity: config.sensitivity.min(RING_SENSITIVITY_MAX),
        };
        let shared = Arc::new(RingShared {
            state: Mutex::new(RingState { link: None, status }),
            observers: ObserverList::new(),
            response_timeout: config.response_timeout(),
        });

        Self {
            config,
            connector,
            permissions,
            shared,
            keepalive: Mutex::new(None),
        }
    }

    pub async fn connect(&self, address: &str) -> Result<(), BridgeError> {
        if !self.permissions.request().await {
            error!("Bluetooth permission not granted");
            return Err(BridgeError::PermissionDenied);
        }

        info!("Connecting ring at {}", address);
        let profile = self.config.profile();
        let link = match timeout(
            self.config.connection_timeout(),
            self.connector.connect(address, &profile),
        )
        .await
        {
            Ok(Ok(link)) => link,
            Ok(Err(e)) => {
                error!("Failed to connect ring device: {:#}", e);
                return Err(BridgeError::RingConnection(e));
            }
            Err(_) => {
                error!("Connecting ring timed out");
                return Err(BridgeError::RingConnection(anyhow!(
                    "timed out after {:?}",
                    self.config.connection_timeout()
                )));
            }
        };

        let link_id = link.id();
        let previous = {
            let mut state = lock(&self.shared.state);
            state.status.connected = true;
            state.link.replace(link)
        };
        if let Some(previous) = previous.filter(|previous| previous.id() != link_id) {
            if let Err(e) = previous.disconnect().await {
                warn!("Failed to release previous ring link: {}", e);
            }
        }

        info!("Ring connected");
        self.shared.observers.notify(&true);
        self.start_keepalive();
        Ok(())
    }

    pub async fn disconnect(&self) {
        self.stop_keepalive();
        self.shared.release().await;
        info!("Ring disconnected");
    }

    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    /// Registers `callback` and immediately calls it with the current state.
    pub fn on_connection_state_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        callback(self.is_connected());
        self.shared.observers.subscribe(callback)
    }

    pub async fn refresh_battery_info(&self) -> RingStatus {
        if let Some(link) = self.shared.link() {
            match self.shared.query_battery(link.as_ref()).await {
                Some(level) => info!("Ring battery: {}%", level),
                None => warn!("No battery level from ring"),
            }
        }
        self.get_ring_status()
    }

    pub fn get_ring_status(&self) -> RingStatus {
        lock(&self.shared.state).status.clone()
    }

    /// Stored client-side; the ring has no command for it.
    pub fn set_gesture_mode(&self, mode: GestureMode) {
        info!("Setting ring gesture mode to {:?}", mode);
        lock(&self.shared.state).status.gesture_mode = mode;
    }

    pub fn set_sensitivity(&self, sensitivity: u8) -> Result<(), BridgeError> {
        if sensitivity > RING_SENSITIVITY_MAX {
            return Err(BridgeError::InvalidSensitivity(sensitivity));
        }
        info!("Setting ring sensitivity to {}", sensitivity);
        lock(&self.shared.state).status.sensitivity = sensitivity;
        Ok(())
    }

    fn start_keepalive(&self) {
        self.stop_keepalive();

        let cancel_token = CancellationToken::new();
        let cancel_token_for_task = cancel_token.clone();
        let shared = self.shared.clone();
        let interval = self.config.keepalive_interval();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel_token_for_task.cancelled() => break,
                    _ = sleep(interval) => {
                        let Some(link) = shared.link() else { break };
                        if shared.query_battery(link.as_ref()).await.is_none() {
                            warn!("Ring keep-alive failed, marking ring as disconnected");
                            shared.release().await;
                            break;
                        }
                    }
                }
            }
        });

        *lock(&self.keepalive) = Some((cancel_token, handle));
        info!("Ring keep-alive started with an interval of {:?}", interval);
    }

    fn stop_keepalive(&self) {
        if let Some((cancel_token, _handle)) = lock(&self.keepalive).take() {
            cancel_token.cancel();
        }
    }
}

impl Drop for RingManager {
    fn drop(&mut self) {
        self.stop_keepalive();
    }
}
