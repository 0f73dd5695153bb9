// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Expiry Sweeper
//!
//! Background task that periodically drops expired entries (stale nonces,
//! abandoned claim sessions) from the key-value store. Reads already treat
//! expired entries as missing; the sweep only reclaims space.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::KvStore;

/// Default interval between sweeps.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct ExpirySweeper {
    store: Arc<dyn KvStore>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run one sweep, logging the outcome.
    pub fn sweep_once(&self) -> usize {
        match self.store.purge_expired() {
            Ok(purged) => {
                if purged > 0 {
                    debug!(purged, "Purged expired store entries");
                }
                purged
            }
            Err(e) => {
                warn!(error = %e, "Expiry sweep failed, will retry");
                0
            }
        }
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Expiry sweeper starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    self.sweep_once();
                },
                _ = shutdown.cancelled() => {
                    info!("Expiry sweeper shutting down");
                    return;
                }
            }
        }
    }
}
