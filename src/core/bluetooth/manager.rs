//! Glasses manager for the G1 Teleprompter Bridge
//! This module provides the main interface for glasses operations: connecting
//! both lenses, pushing text, bitmaps and teleprompter frames, and telemetry.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{error, info, warn};
use tokio::time::sleep;

use crate::config::glasses_config::GlassesConfig;
use crate::core::bluetooth::commands::GlassesCommand;
use crate::core::bluetooth::connection::{ConnectionManager, DeviceConnector, PermissionGate};
use crate::core::bluetooth::constants::TELEPROMPTER_DEFAULT_SCROLL;
use crate::core::bluetooth::dispatcher::{DispatchMode, execute_for_devices};
use crate::core::bluetooth::heartbeat::HeartbeatMonitor;
use crate::core::bluetooth::link::{GattLink, LinkError};
use crate::core::bluetooth::observer::Subscription;
use crate::core::bluetooth::status::{StatusManager, StatusTimeouts};
use crate::core::bluetooth::transport::{send_packets, write_to_device};
use crate::core::bluetooth::types::{ConnectionState, GlassesStatus, Side};
use crate::core::protocol::{
    Packet, PacketError, TeleprompterSession, TextPacketBuilder, bmp_end_packet,
    compute_bmp_crc32, crc_packet, create_bmp_packets,
};
use crate::core::render::{BitmapRenderer, GlyphWidthTable, format_text_for_display};
use crate::error::BridgeError;
use crate::utils::lock;

/// Frames of one bitmap transfer, shared by both sides
struct BitmapTransfer {
    chunks: Vec<Packet>,
    end: Packet,
    crc: Packet,
}

impl BitmapTransfer {
    fn new(bmp: &[u8]) -> Self {
        Self {
            chunks: create_bmp_packets(bmp),
            end: bmp_end_packet(),
            crc: crc_packet(compute_bmp_crc32(bmp)),
        }
    }

    async fn send(
        &self,
        link: &dyn GattLink,
        packet_delay: Duration,
        end_delay: Duration,
    ) -> Result<bool, LinkError> {
        info!("Starting BMP transfer to {}: {} packets", link.id(), self.chunks.len());
        if !send_packets(link, &self.chunks, packet_delay).await? {
            return Ok(false);
        }
        if !write_to_device(link, &self.end, false).await? {
            error!("Failed to send BMP end command to {}", link.id());
            return Ok(false);
        }
        sleep(end_delay).await;
        if !write_to_device(link, &self.crc, false).await? {
            error!("Failed to send BMP CRC to {}", link.id());
            return Ok(false);
        }
        info!("BMP transfer to {} completed", link.id());
        Ok(true)
    }
}

/// Manages both lenses of the glasses
pub struct GlassesManager {
    config: GlassesConfig,
    /// Per-side links and connection flags
    connection: ConnectionManager,
    /// Battery, uptime and firmware of both sides
    status: StatusManager,
    heartbeat: HeartbeatMonitor,
    text_builder: Mutex<TextPacketBuilder>,
    teleprompter: Mutex<TeleprompterSession>,
    glyphs: GlyphWidthTable,
    renderer: BitmapRenderer,
}

impl GlassesManager {
    pub fn new(
        config: GlassesConfig,
        connector: Arc<dyn DeviceConnector>,
        permissions: Arc<dyn PermissionGate>,
        glyphs: GlyphWidthTable,
    ) -> Self {
        let connection = ConnectionManager::new(
            connector,
            permissions,
            config.profile(),
            config.connection_timeout(),
        );
        let status = StatusManager::new(StatusTimeouts {
            battery: Duration::from_millis(config.battery_timeout_ms),
            uptime: Duration::from_millis(config.uptime_timeout_ms),
            firmware: Duration::from_millis(config.firmware_timeout_ms),
        });
        let heartbeat = HeartbeatMonitor::new(
            connection.clone(),
            config.heartbeat_interval(),
            config.heartbeat_timeout(),
        );
        let teleprompter = TeleprompterSession::new(config.teleprompter_manual_mode);

        Self {
            config,
            connection,
            status,
            heartbeat,
            text_builder: Mutex::new(TextPacketBuilder::new()),
            teleprompter: Mutex::new(teleprompter),
            glyphs,
            renderer: BitmapRenderer::default(),
        }
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn renderer(&self) -> &BitmapRenderer {
        &self.renderer
    }

    pub async fn connect_left(&self, address: &str) -> Result<(), BridgeError> {
        self.connect(address, Side::Left).await
    }

    pub async fn connect_right(&self, address: &str) -> Result<(), BridgeError> {
        self.connect(address, Side::Right).await
    }

    async fn connect(&self, address: &str, side: Side) -> Result<(), BridgeError> {
        self.connection.connect(address, side).await?;

        if let Some(link) = self.connection.link(side) {
            self.status.ensure_firmware(side, link.as_ref()).await;
        }
        if !self.heartbeat.is_running() {
            self.heartbeat.start();
        }
        Ok(())
    }

    /// Disconnects both sides and forgets their telemetry
    pub async fn disconnect(&self) {
        self.heartbeat.stop();
        self.connection.disconnect_all().await;
        self.status.reset();
    }

    /// True while at least one side is connected
    pub fn is_connected(&self) -> bool {
        self.connection.state().any()
    }

    pub fn is_left_connected(&self) -> bool {
        self.connection.is_connected(Side::Left)
    }

    pub fn is_right_connected(&self) -> bool {
        self.connection.is_connected(Side::Right)
    }

    pub fn on_connection_state_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        self.connection.on_connection_state_change(callback)
    }

    fn ensure_connected(&self) -> Result<(), BridgeError> {
        if self.is_connected() {
            Ok(())
        } else {
            error!("No glasses connected");
            Err(BridgeError::NotConnected)
        }
    }

    /// Sends `packets` to every connected side, left before right.
    async fn send_sequential(
        &self,
        packets: &[Packet],
        delay: Duration,
    ) -> Result<bool, BridgeError> {
        execute_for_devices(
            &self.connection,
            Side::Both,
            DispatchMode::Sequential,
            move |_, link| async move {
                send_packets(link.as_ref(), packets, delay)
                    .await
                    .map_err(BridgeError::from)
            },
        )
        .await
        .into_result()
    }

    /// Shows `text` on the display, wrapped to five lines.
    pub async fn send_text(&self, text: &str) -> Result<bool, BridgeError> {
        self.ensure_connected()?;
        let formatted = format_text_for_display(text);
        let packets = lock(&self.text_builder).build(&formatted)?;
        info!("Sending text: {} bytes in {} packet(s)", formatted.len(), packets.len());

        let delay = Duration::from_millis(self.config.text_packet_delay_ms);
        self.send_sequential(&packets, delay).await
    }

    /// Renders `text` into a bitmap and sends it.
    pub async fn send_text_as_image(&self, text: &str) -> Result<bool, BridgeError> {
        self.ensure_connected()?;
        let bmp = self.renderer.text_to_bitmap(text)?;
        self.send_bitmap(&bmp).await
    }

    /// Sends a base64 encoded BMP file.
    pub async fn send_image(&self, base64_bmp: &str) -> Result<bool, BridgeError> {
        self.ensure_connected()?;
        let bmp = STANDARD.decode(base64_bmp.trim())?;
        self.send_bitmap(&bmp).await
    }

    /// Sends a BMP file to both sides at once.
    pub async fn send_bitmap(&self, bmp: &[u8]) -> Result<bool, BridgeError> {
        self.ensure_connected()?;
        if bmp.is_empty() {
            return Err(PacketError::InvalidBitmap("empty bitmap".to_string()).into());
        }
        if !self.renderer.validate_bmp_format(bmp) {
            warn!("Bitmap does not look like a 576x136 BMP, sending it anyway");
        }

        let transfer = &BitmapTransfer::new(bmp);
        let packet_delay = Duration::from_millis(self.config.bmp_packet_delay_ms);
        let end_delay = Duration::from_millis(self.config.bmp_end_delay_ms);

        execute_for_devices(
            &self.connection,
            Side::Both,
            DispatchMode::Parallel,
            move |_, link| async move {
                transfer
                    .send(link.as_ref(), packet_delay, end_delay)
                    .await
                    .map_err(BridgeError::from)
            },
        )
        .await
        .into_result()
    }

    /// Starts or updates the firmware teleprompter with `text`.
    pub async fn send_official_teleprompter(
        &self,
        text: &str,
        scroll_percent: Option<u8>,
    ) -> Result<bool, BridgeError> {
        self.ensure_connected()?;
        let scroll = scroll_percent.unwrap_or(TELEPROMPTER_DEFAULT_SCROLL);
        let packets = lock(&self.teleprompter).prepare(
            text,
            scroll,
            &self.glyphs,
            self.config.teleprompter_line_width_px,
        )?;
        info!("Sending teleprompter text at {}%: {} packet(s)", scroll, packets.len());

        let delay = Duration::from_millis(self.config.teleprompter_packet_delay_ms);
        self.send_sequential(&packets, delay).await
    }

    /// Ends the teleprompter session.
    pub async fn exit_official_teleprompter(&self) -> Result<bool, BridgeError> {
        self.ensure_connected()?;
        let packet = lock(&self.teleprompter).end_packet();
        info!("Ending teleprompter session");
        self.send_sequential(&[packet], Duration::ZERO).await
    }

    /// Returns the glasses to the dashboard.
    pub async fn exit(&self) -> Result<bool, BridgeError> {
        self.ensure_connected()?;
        self.send_sequential(&[GlassesCommand::Exit.to_bytes()], Duration::ZERO)
            .await
    }

    pub async fn refresh_battery_info(&self) -> GlassesStatus {
        let status = &self.status;
        execute_for_devices(
            &self.connection,
            Side::Both,
            DispatchMode::Sequential,
            move |side, link| async move { Ok(status.refresh_battery(side, link.as_ref()).await) },
        )
        .await;
        self.get_device_status()
    }

    pub async fn refresh_uptime(&self) -> GlassesStatus {
        let status = &self.status;
        execute_for_devices(
            &self.connection,
            Side::Both,
            DispatchMode::Sequential,
            move |side, link| async move { Ok(status.refresh_uptime(side, link.as_ref()).await) },
        )
        .await;
        self.get_device_status()
    }

    /// Re-reads the firmware string of every connected side.
    pub async fn refresh_firmware_info(&self) -> GlassesStatus {
        let status = &self.status;
        execute_for_devices(
            &self.connection,
            Side::Both,
            DispatchMode::Sequential,
            move |side, link| async move { Ok(status.refresh_firmware(side, link.as_ref()).await) },
        )
        .await;
        self.get_device_status()
    }

    pub fn get_device_status(&self) -> GlassesStatus {
        self.status.snapshot(self.connection.state())
    }
}
