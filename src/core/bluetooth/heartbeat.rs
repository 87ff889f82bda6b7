//! Periodic liveness probe of the glasses
//!
//! Left is probed before right, and right only after left passed. A side
//! without a link counts as passed for that ordering.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::commands::{GlassesCommand, is_valid_heartbeat_response};
use crate::core::bluetooth::connection::ConnectionManager;
use crate::core::bluetooth::link::GattLink;
use crate::core::bluetooth::transport::send_command_with_response;
use crate::core::bluetooth::types::Side;
use crate::utils::lock;

struct Probe {
    connection: ConnectionManager,
    response_timeout: Duration,
    seq: AtomicU8,
}

impl Probe {
    async fn beat(&self) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        debug!("Heartbeat {}", seq);

        let left_ok = match self.connection.link(Side::Left) {
            Some(link) => self.probe_side(Side::Left, link.as_ref(), seq).await,
            None => true,
        };
        if !left_ok {
            // Right keeps its flag unprobed; the next tick finds no left link and probes it.
            self.connection.demote(Side::Left).await;
            return;
        }

        if let Some(link) = self.connection.link(Side::Right) {
            if !self.probe_side(Side::Right, link.as_ref(), seq).await {
                self.connection.demote(Side::Right).await;
            }
        }
    }

    async fn probe_side(&self, side: Side, link: &dyn GattLink, seq: u8) -> bool {
        let command = GlassesCommand::Heartbeat { seq };
        let response = send_command_with_response(
            link,
            &command.to_bytes(),
            command.expected_header(),
            self.response_timeout,
        )
        .await;

        match response {
            Ok(Some(frame)) if is_valid_heartbeat_response(&frame, seq) => true,
            Ok(Some(_)) => {
                warn!("{} heartbeat echo did not match sequence {}", side, seq);
                false
            }
            Ok(None) => {
                warn!("No heartbeat response from {}", side);
                false
            }
            Err(e) => {
                warn!("Heartbeat to {} failed: {}", side, e);
                false
            }
        }
    }
}

/// Owns the heartbeat task. Starting replaces a running task.
pub struct HeartbeatMonitor {
    probe: Arc<Probe>,
    interval: Duration,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl HeartbeatMonitor {
    pub fn new(
        connection: ConnectionManager,
        interval: Duration,
        response_timeout: Duration,
    ) -> Self {
        Self {
            probe: Arc::new(Probe {
                connection,
                response_timeout,
                seq: AtomicU8::new(0),
            }),
            interval,
            task: Mutex::new(None),
        }
    }

    /// One probe round, as run on every tick
    pub async fn beat(&self) {
        self.probe.beat().await;
    }

    pub fn is_running(&self) -> bool {
        lock(&self.task)
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }

    /// Spawns the interval task. It ends by itself once no side is connected.
    pub fn start(&self) {
        self.stop();

        let cancel_token = CancellationToken::new();
        let cancel_token_for_task = cancel_token.clone();
        let probe = self.probe.clone();
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel_token_for_task.cancelled() => break,
                    _ = sleep(interval) => {
                        if !probe.connection.state().any() {
                            info!("No side connected, heartbeat stopped");
                            break;
                        }
                        probe.beat().await;
                    }
                }
            }
        });

        *lock(&self.task) = Some((cancel_token, handle));
        info!("Heartbeat started with an interval of {:?}", self.interval);
    }

    pub fn stop(&self) {
        if let Some((cancel_token, _handle)) = lock(&self.task).take() {
            cancel_token.cancel();
            info!("Heartbeat stopped");
        }
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        if let Some((cancel_token, _)) = lock(&self.task).take() {
            cancel_token.cancel();
        }
    }
}
