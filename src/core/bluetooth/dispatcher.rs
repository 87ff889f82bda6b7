//! Fans one logical operation out to the connected sides

use std::future::Future;
use std::sync::Arc;

use futures_util::future::join_all;
use log::{debug, error};

use crate::core::bluetooth::connection::ConnectionManager;
use crate::core::bluetooth::link::{GattLink, LinkError};
use crate::core::bluetooth::types::Side;
use crate::error::BridgeError;

/// Whether sides run one after another (left first) or concurrently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchMode {
    #[default]
    Sequential,
    Parallel,
}

/// Per-side results of one dispatch
#[derive(Debug)]
pub struct DispatchOutcome<T> {
    /// Number of sides that had a link and were attempted
    pub attempted: usize,
    /// Results of the sides whose operation returned `Ok`
    pub results: Vec<(Side, T)>,
    /// Sides whose operation returned `Err`
    pub failures: Vec<(Side, BridgeError)>,
}

impl<T> DispatchOutcome<T> {
    fn new() -> Self {
        Self {
            attempted: 0,
            results: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl DispatchOutcome<bool> {
    /// True when at least one side was attempted and every attempted side returned `true`.
    pub fn all_succeeded(&self) -> bool {
        self.attempted > 0
            && self.results.len() == self.attempted
            && self.results.iter().all(|(_, ok)| *ok)
    }

    /// Surfaces a permission error if one side hit it, otherwise [`Self::all_succeeded`].
    pub fn into_result(mut self) -> Result<bool, BridgeError> {
        if let Some(index) = self
            .failures
            .iter()
            .position(|(_, e)| is_permission_error(e))
        {
            let (_, e) = self.failures.swap_remove(index);
            return Err(e);
        }
        Ok(self.all_succeeded())
    }
}

fn is_permission_error(e: &BridgeError) -> bool {
    matches!(
        e,
        BridgeError::PermissionDenied | BridgeError::Link(LinkError::NotAuthorized(_))
    )
}

fn is_stale_handle(e: &BridgeError) -> bool {
    matches!(e, BridgeError::Link(LinkError::InvalidHandle(_)))
}

/// Runs `operation` for every side `side` resolves to that currently has a link.
///
/// Failures are logged and collected, never propagated. A side whose handle
/// turned out stale is demoted. In sequential mode a permission error stops
/// the remaining sides.
pub async fn execute_for_devices<T, F, Fut>(
    connection: &ConnectionManager,
    side: Side,
    mode: DispatchMode,
    operation: F,
) -> DispatchOutcome<T>
where
    F: Fn(Side, Arc<dyn GattLink>) -> Fut,
    Fut: Future<Output = Result<T, BridgeError>>,
{
    let links = connection.links(side);
    let mut outcome = DispatchOutcome::new();
    outcome.attempted = links.len();
    debug!("Dispatching to {} ({} link(s), {:?})", side, links.len(), mode);

    let results = match mode {
        DispatchMode::Sequential => {
            let mut results = Vec::with_capacity(links.len());
            for (target, link) in links {
                let result = operation(target, link).await;
                let stop = matches!(&result, Err(e) if is_permission_error(e));
                results.push((target, result));
                if stop {
                    break;
                }
            }
            results
        }
        DispatchMode::Parallel => {
            let operation = &operation;
            join_all(
                links
                    .into_iter()
                    .map(|(target, link)| async move { (target, operation(target, link).await) }),
            )
            .await
        }
    };

    for (target, result) in results {
        match result {
            Ok(value) => outcome.results.push((target, value)),
            Err(e) => {
                error!("Operation on {} failed: {}", target, e);
                if is_stale_handle(&e) {
                    connection.demote(target).await;
                }
                outcome.failures.push((target, e));
            }
        }
    }
    outcome
}
