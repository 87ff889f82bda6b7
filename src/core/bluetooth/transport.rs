//! Raw characteristic writes and the command/response primitive

use std::time::Duration;

use futures_util::StreamExt;
use log::{debug, error, warn};
use tokio::time::{sleep, timeout};

use crate::core::bluetooth::link::{GattLink, LinkError};
use crate::utils::to_hex;

/// Writes `data` to the write characteristic.
///
/// A failed write without response is retried once with response. Ordinary
/// GATT failures are logged and reported as `Ok(false)`; permission and
/// handle errors are returned as `Err`.
pub async fn write_to_device(
    link: &dyn GattLink,
    data: &[u8],
    require_response: bool,
) -> Result<bool, LinkError> {
    debug!(
        "Writing {} response to {}: {}",
        if require_response { "with" } else { "without" },
        link.id(),
        to_hex(data)
    );

    if !require_response {
        match link.write_without_response(data).await {
            Ok(()) => return Ok(true),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Write without response failed ({}), falling back to write with response", e);
            }
        }
    }

    match link.write_with_response(data).await {
        Ok(()) => Ok(true),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            error!("Write to {} failed: {}", link.id(), e);
            Ok(false)
        }
    }
}

/// True when `data` starts with `prefix`. An empty prefix matches anything.
pub fn header_matches(data: &[u8], prefix: &[u8]) -> bool {
    data.starts_with(prefix)
}

/// Sends `request` and waits for a notification starting with `expected_prefix`.
///
/// Non-matching notifications are skipped. When nothing matches within
/// `wait`, the notify characteristic is read once directly. `Ok(None)` means
/// no usable response; only permission and handle errors are returned as `Err`.
pub async fn send_command_with_response(
    link: &dyn GattLink,
    request: &[u8],
    expected_prefix: &[u8],
    wait: Duration,
) -> Result<Option<Vec<u8>>, LinkError> {
    debug!(
        "Command {}, expecting header [{}]",
        to_hex(request),
        to_hex(expected_prefix)
    );

    // Subscribe before writing so a fast reply is not missed
    let mut notifications = match link.subscribe().await {
        Ok(stream) => Some(stream),
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            warn!("Could not subscribe to notifications of {}: {}", link.id(), e);
            None
        }
    };

    if !write_to_device(link, request, true).await? {
        error!("Failed to write command {}", to_hex(request));
        return Ok(None);
    }

    if let Some(stream) = notifications.as_mut() {
        let matched = timeout(wait, async {
            while let Some(frame) = stream.next().await {
                debug!("Received notification: {}", to_hex(&frame));
                if header_matches(&frame, expected_prefix) {
                    return Some(frame);
                }
                warn!(
                    "Ignoring unexpected response, waiting for header [{}]",
                    to_hex(expected_prefix)
                );
            }
            None
        })
        .await;

        match matched {
            Ok(Some(frame)) => return Ok(Some(frame)),
            Ok(None) => warn!("Notification stream of {} ended", link.id()),
            Err(_) => warn!("Timed out after {:?} waiting for response", wait),
        }
    }
    drop(notifications);

    warn!("No notification matched, trying a direct read");
    match link.read_notify().await {
        Ok(data) if header_matches(&data, expected_prefix) => {
            debug!("Read response: {}", to_hex(&data));
            Ok(Some(data))
        }
        Ok(data) => {
            debug!("Read value does not match expected header: {}", to_hex(&data));
            Ok(None)
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            debug!("Direct read from {} failed: {}", link.id(), e);
            Ok(None)
        }
    }
}

/// Writes `packets` in order with `delay` between them. Stops at the first failed write.
pub async fn send_packets(
    link: &dyn GattLink,
    packets: &[Vec<u8>],
    delay: Duration,
) -> Result<bool, LinkError> {
    for (i, packet) in packets.iter().enumerate() {
        if !write_to_device(link, packet, false).await? {
            error!("Failed to send packet {}/{} to {}", i + 1, packets.len(), link.id());
            return Ok(false);
        }
        if i + 1 < packets.len() && !delay.is_zero() {
            sleep(delay).await;
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::mock::MockLink;

    #[test]
    fn test_header_matches() {
        assert!(header_matches(&[0x2C, 0x01, 0x4B], &[0x2C]));
        assert!(header_matches(&[0x2C], &[]));
        assert!(header_matches(&[], &[]));
        assert!(!header_matches(&[0x2C], &[0x2C, 0x01]));
        assert!(!header_matches(&[0x37, 0x00], &[0x2C]));
    }

    #[tokio::test]
    async fn test_write_falls_back_to_with_response() {
        let link = MockLink::new("left");
        link.fail_write_without_response(true);

        assert!(write_to_device(&link, &[0x18], false).await.unwrap());
        assert_eq!(link.writes_with_response(), vec![vec![0x18]]);
        assert!(link.writes_without_response().is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_reports_false() {
        let link = MockLink::new("left");
        link.fail_write_without_response(true);
        link.fail_write_with_response(true);

        assert!(!write_to_device(&link, &[0x18], false).await.unwrap());
    }

    #[tokio::test]
    async fn test_permission_error_propagates() {
        let link = MockLink::new("left");
        link.set_write_error(LinkError::NotAuthorized("denied".into()));

        let result = write_to_device(&link, &[0x18], false).await;
        assert!(matches!(result, Err(LinkError::NotAuthorized(_))));
    }

    #[tokio::test]
    async fn test_unexpected_notifications_are_skipped() {
        let link = MockLink::new("left");
        link.respond_with(|_| vec![vec![0x37, 0x00, 0x0A, 0x00], vec![0x2C, 0x01, 0x4B]]);

        let response = send_command_with_response(
            &link,
            &[0x2C, 0x01],
            &[0x2C],
            Duration::from_millis(200),
        )
        .await
        .unwrap();
        assert_eq!(response, Some(vec![0x2C, 0x01, 0x4B]));
    }

    #[tokio::test]
    async fn test_timeout_falls_back_to_read() {
        let link = MockLink::new("left");
        link.set_read_value(vec![0x2C, 0x01, 0x50]);

        let response = send_command_with_response(
            &link,
            &[0x2C, 0x01],
            &[0x2C],
            Duration::from_millis(20),
        )
        .await
        .unwrap();
        assert_eq!(response, Some(vec![0x2C, 0x01, 0x50]));
    }

    #[tokio::test]
    async fn test_no_response_is_none() {
        let link = MockLink::new("left");
        link.set_read_value(vec![0x99]);

        let response = send_command_with_response(
            &link,
            &[0x2C, 0x01],
            &[0x2C],
            Duration::from_millis(20),
        )
        .await
        .unwrap();
        assert_eq!(response, None);
    }

    #[tokio::test]
    async fn test_send_packets_in_order() {
        let link = MockLink::new("left");
        let packets = vec![vec![1], vec![2], vec![3]];

        assert!(send_packets(&link, &packets, Duration::from_millis(1)).await.unwrap());
        assert_eq!(link.writes_without_response(), packets);
    }
}
