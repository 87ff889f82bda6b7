//! In-memory links and connectors for tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast;

use crate::core::bluetooth::connection::{DeviceConnector, PermissionGate};
use crate::core::bluetooth::link::{GattLink, LinkError};
use crate::core::bluetooth::types::GattProfile;

type Responder = Box<dyn Fn(&[u8]) -> Vec<Vec<u8>> + Send + Sync>;

#[derive(Default)]
struct MockState {
    writes_without_response: Vec<Vec<u8>>,
    writes_with_response: Vec<Vec<u8>>,
    fail_without_response: bool,
    fail_with_response: bool,
    write_error: Option<LinkError>,
    read_value: Option<Vec<u8>>,
    responder: Option<Responder>,
    connected: bool,
}

/// Records writes and answers them with scripted notifications.
pub struct MockLink {
    id: String,
    state: Mutex<MockState>,
    notifications: broadcast::Sender<Vec<u8>>,
}

impl MockLink {
    pub fn new(id: &str) -> Self {
        let (notifications, _) = broadcast::channel(64);
        Self {
            id: id.to_string(),
            state: Mutex::new(MockState {
                connected: true,
                ..Default::default()
            }),
            notifications,
        }
    }

    /// Every successful write is passed to `responder`; the frames it returns are notified.
    pub fn respond_with<F>(&self, responder: F)
    where
        F: Fn(&[u8]) -> Vec<Vec<u8>> + Send + Sync + 'static,
    {
        self.state.lock().unwrap().responder = Some(Box::new(responder));
    }

    /// Echoes heartbeat probes back unchanged.
    pub fn echo_heartbeats(&self) {
        self.respond_with(|request| {
            if request.first() == Some(&0x25) {
                vec![request.to_vec()]
            } else {
                Vec::new()
            }
        });
    }

    pub fn set_read_value(&self, value: Vec<u8>) {
        self.state.lock().unwrap().read_value = Some(value);
    }

    pub fn fail_write_without_response(&self, fail: bool) {
        self.state.lock().unwrap().fail_without_response = fail;
    }

    pub fn fail_write_with_response(&self, fail: bool) {
        self.state.lock().unwrap().fail_with_response = fail;
    }

    pub fn set_write_error(&self, error: LinkError) {
        self.state.lock().unwrap().write_error = Some(error);
    }

    pub fn writes_without_response(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().writes_without_response.clone()
    }

    pub fn writes_with_response(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().writes_with_response.clone()
    }

    /// All writes, without-response first then with-response
    pub fn all_writes(&self) -> Vec<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state
            .writes_without_response
            .iter()
            .chain(state.writes_with_response.iter())
            .cloned()
            .collect()
    }

    pub fn connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    fn record(&self, data: &[u8], with_response: bool) -> Result<(), LinkError> {
        let frames = {
            let mut state = self.state.lock().unwrap();
            if let Some(error) = state.write_error.clone() {
                return Err(error);
            }
            if with_response && state.fail_with_response {
                return Err(LinkError::Gatt("write with response rejected".into()));
            }
            if !with_response && state.fail_without_response {
                return Err(LinkError::Gatt("write without response rejected".into()));
            }
            if with_response {
                state.writes_with_response.push(data.to_vec());
            } else {
                state.writes_without_response.push(data.to_vec());
            }
            state
                .responder
                .as_ref()
                .map(|responder| responder(data))
                .unwrap_or_default()
        };
        for frame in frames {
            let _ = self.notifications.send(frame);
        }
        Ok(())
    }
}

#[async_trait]
impl GattLink for MockLink {
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn write_without_response(&self, data: &[u8]) -> Result<(), LinkError> {
        self.record(data, false)
    }

    async fn write_with_response(&self, data: &[u8]) -> Result<(), LinkError> {
        self.record(data, true)
    }

    async fn read_notify(&self) -> Result<Vec<u8>, LinkError> {
        self.state
            .lock()
            .unwrap()
            .read_value
            .clone()
            .ok_or_else(|| LinkError::Gatt("no value".into()))
    }

    async fn subscribe(&self) -> Result<BoxStream<'_, Vec<u8>>, LinkError> {
        let receiver = self.notifications.subscribe();
        Ok(stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(frame) => return Some((frame, receiver)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed())
    }

    async fn is_connected(&self) -> bool {
        self.connected()
    }

    async fn disconnect(&self) -> Result<(), LinkError> {
        self.state.lock().unwrap().connected = false;
        Ok(())
    }
}

/// Hands out registered [`MockLink`]s by address.
#[derive(Default)]
pub struct MockConnector {
    links: Mutex<HashMap<String, Arc<MockLink>>>,
    attempts: Mutex<usize>,
    delay: Mutex<Option<Duration>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `link` under its id and returns a handle for scripting it.
    pub fn add(&self, link: MockLink) -> Arc<MockLink> {
        let link = Arc::new(link);
        self.links
            .lock()
            .unwrap()
            .insert(link.id.clone(), link.clone());
        link
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl DeviceConnector for MockConnector {
    async fn connect(&self, address: &str, _profile: &GattProfile) -> Result<Arc<dyn GattLink>> {
        *self.attempts.lock().unwrap() += 1;
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let link = self
            .links
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .ok_or_else(|| anyhow!("device {} not found", address))?;
        link.state.lock().unwrap().connected = true;
        Ok(link)
    }
}

pub struct AllowAll;

#[async_trait]
impl PermissionGate for AllowAll {
    async fn request(&self) -> bool {
        true
    }
}

pub struct DenyAll;

#[async_trait]
impl PermissionGate for DenyAll {
    async fn request(&self) -> bool {
        false
    }
}
