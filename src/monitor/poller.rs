// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The fleet poller.
//!
//! `check_host` runs the full connect/execute/parse pipeline for one host
//! and always produces a snapshot; the executor's two failure classes map
//! to `Offline` and `Error` status, and parsing cannot fail. `FleetPoller`
//! fans `check_host` out across all registered hosts under a semaphore
//! capped at [`AppConfig::MAX_CONCURRENT_SESSIONS`], so fleet size never
//! dictates the number of simultaneous outbound sessions. Each task writes
//! only its own host's snapshot; a slow host delays its own slot and
//! nothing else.

use std::sync::Arc;

use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use crate::common::config::{AppConfig, Thresholds};
use crate::device::{parse_huawei, parse_nvidia};
use crate::error::{Error, Result};
use crate::monitor::snapshot::HostSnapshot;
use crate::registry::Host;
use crate::remote::{split_sections, RemoteExecutor};

/// Persistence collaborator: receives one snapshot per completed host
/// poll. Writes for different hosts must be independent.
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn store_snapshot(&self, host_id: u64, snapshot: HostSnapshot);
}

/// Poll one host and classify the outcome. Never fails: every failure
/// class becomes a snapshot status.
pub async fn check_host(host: &Host, thresholds: &Thresholds) -> HostSnapshot {
    let executor = RemoteExecutor::new(&host.address, host.port, &host.username, &host.password);

    let session = match executor.connect().await {
        Ok(session) => session,
        Err(e) => {
            warn!(address = %host.address, error = %e, "host unreachable");
            return HostSnapshot::offline();
        }
    };

    let result = session.exec(&crate::remote::probe_script()).await;
    // Closed on every branch, including the failure path below.
    session.close().await;

    match result {
        Ok(output) => {
            let sections = split_sections(&output.stdout);
            let nvidia = parse_nvidia(&sections.nvidia, thresholds);
            let huawei = parse_huawei(&sections.huawei, thresholds);
            HostSnapshot::online(sections.arch, sections.os_info, nvidia, huawei)
        }
        Err(e) => {
            warn!(address = %host.address, error = %e, "probe command failed");
            HostSnapshot::error(e.to_string())
        }
    }
}

/// Connect and return the raw delimiter-annotated probe output without
/// parsing, for the diagnostic surface.
pub async fn fetch_raw(host: &Host) -> Result<String> {
    let executor = RemoteExecutor::new(&host.address, host.port, &host.username, &host.password);
    let output = executor.probe_raw().await?;
    if output.stdout.is_empty() && !output.stderr.is_empty() {
        return Err(Error::CommandFailed(output.stderr));
    }
    Ok(output.stdout)
}

/// Polls the whole fleet with bounded concurrency and per-host failure
/// isolation.
pub struct FleetPoller {
    store: Arc<dyn SnapshotStore>,
    thresholds: Thresholds,
    semaphore: Arc<Semaphore>,
}

impl FleetPoller {
    pub fn new(store: Arc<dyn SnapshotStore>, thresholds: Thresholds) -> Self {
        Self {
            store,
            thresholds,
            semaphore: Arc::new(Semaphore::new(AppConfig::MAX_CONCURRENT_SESSIONS)),
        }
    }

    /// One concurrent sweep across the given hosts. Returns the number of
    /// hosts whose snapshot was written. Completion order across hosts is
    /// arbitrary; a failed or panicked task is logged and never affects
    /// its siblings.
    pub async fn poll_all(&self, hosts: Vec<Host>) -> usize {
        let mut tasks = FuturesUnordered::new();

        for host in hosts {
            let store = Arc::clone(&self.store);
            let semaphore = Arc::clone(&self.semaphore);
            let thresholds = self.thresholds;

            tasks.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return None, // Semaphore closed: shutting down
                };
                let snapshot = check_host(&host, &thresholds).await;
                store.store_snapshot(host.id, snapshot).await;
                Some(host.address)
            }));
        }

        let mut completed = 0;
        while let Some(result) = tasks.next().await {
            match result {
                Ok(Some(address)) => {
                    debug!(%address, "host poll complete");
                    completed += 1;
                }
                Ok(None) => {}
                Err(e) => error!(error = %e, "host poll task panicked"),
            }
        }
        completed
    }

    /// Single-host refresh outside the pool: runs synchronously with no
    /// permit so an in-flight fleet sweep cannot starve a manual check.
    pub async fn refresh_one(&self, host: &Host) -> HostSnapshot {
        let snapshot = check_host(host, &self.thresholds).await;
        self.store.store_snapshot(host.id, snapshot.clone()).await;
        snapshot
    }
}
