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

//! The host registry: the persistence collaborator of the poll engine.
//!
//! Hosts, their latest snapshots, and the poll interval live in one
//! JSON file behind an `RwLock`. Every mutation rewrites the file; a
//! missing file on startup is an empty registry. Snapshot writes are
//! independent per host, so concurrent poll tasks never contend on more
//! than the lock itself.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::error;

use crate::common::config::AppConfig;
use crate::error::{Error, Result};
use crate::monitor::poller::SnapshotStore;
use crate::monitor::snapshot::{HostSnapshot, HostStatus};

/// A registered remote machine: identity plus credentials. Immutable
/// input to the poll pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub id: u64,
    pub address: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub remark: Option<String>,
}

/// Registration payload for a new host.
#[derive(Debug, Clone, Deserialize)]
pub struct NewHost {
    pub address: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub remark: Option<String>,
}

fn default_ssh_port() -> u16 {
    22
}

/// Partial update of a host's mutable fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostUpdate {
    pub username: Option<String>,
    pub password: Option<String>,
    pub remark: Option<String>,
}

/// A host together with its latest snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostRecord {
    #[serde(flatten)]
    pub host: Host,
    pub snapshot: HostSnapshot,
}

/// Accelerator-oriented listing filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum AccFilter {
    HasAcc,
    NoAcc,
    Idle,
    Busy,
    Warning,
}

/// Listing filter; all conditions are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Substring match over address, username and accelerator type.
    pub search: Option<String>,
    pub arch: Option<String>,
    pub status: Option<HostStatus>,
    pub acc: Option<AccFilter>,
}

impl ListFilter {
    fn matches(&self, record: &HostRecord) -> bool {
        if let Some(search) = &self.search {
            let acc_type = record.snapshot.accelerator_type.as_deref().unwrap_or("");
            if !record.host.address.contains(search)
                && !record.host.username.contains(search)
                && !acc_type.contains(search)
            {
                return false;
            }
        }
        if let Some(arch) = &self.arch {
            if record.snapshot.arch.as_deref() != Some(arch.as_str()) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if record.snapshot.status != status {
                return false;
            }
        }
        if let Some(acc) = self.acc {
            let s = &record.snapshot;
            let ok = match acc {
                AccFilter::HasAcc => s.accelerator_count > 0,
                AccFilter::NoAcc => s.accelerator_count == 0,
                AccFilter::Idle => s.idle_count > 0,
                AccFilter::Busy => s.busy_count > 0,
                AccFilter::Warning => s.warning_count > 0,
            };
            if !ok {
                return false;
            }
        }
        true
    }
}

/// One page of a filtered listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub size: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct RegistryState {
    next_id: u64,
    interval_seconds: u64,
    hosts: Vec<HostRecord>,
}

impl Default for RegistryState {
    fn default() -> Self {
        Self {
            next_id: 1,
            interval_seconds: AppConfig::DEFAULT_POLL_INTERVAL_SECS,
            hosts: Vec::new(),
        }
    }
}

/// JSON-file-backed host registry.
pub struct HostRegistry {
    path: Option<PathBuf>,
    state: RwLock<RegistryState>,
}

impl HostRegistry {
    /// Open the registry at `path`, creating an empty one if the file
    /// does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RegistryState::default(),
            Err(e) => return Err(Error::Io(e)),
        };
        Ok(Self {
            path: Some(path),
            state: RwLock::new(state),
        })
    }

    /// Registry with no backing file. Used by the one-off CLI check and
    /// by tests.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: RwLock::new(RegistryState::default()),
        }
    }

    fn persist(&self, state: &RegistryState) -> Result<()> {
        if let Some(path) = &self.path {
            let contents = serde_json::to_string_pretty(state)?;
            std::fs::write(path, contents)?;
        }
        Ok(())
    }

    pub async fn add_host(&self, new: NewHost) -> Result<HostRecord> {
        let mut state = self.state.write().await;
        if state.hosts.iter().any(|r| r.host.address == new.address) {
            return Err(Error::DuplicateAddress(new.address));
        }

        let host = Host {
            id: state.next_id,
            address: new.address,
            port: new.port,
            username: new.username,
            password: new.password,
            remark: new.remark,
        };
        state.next_id += 1;

        let record = HostRecord {
            host,
            snapshot: HostSnapshot::pending(),
        };
        state.hosts.push(record.clone());
        self.persist(&state)?;
        Ok(record)
    }

    pub async fn update_host(&self, id: u64, update: HostUpdate) -> Result<HostRecord> {
        let mut state = self.state.write().await;
        let record = state
            .hosts
            .iter_mut()
            .find(|r| r.host.id == id)
            .ok_or(Error::HostNotFound(id))?;

        if let Some(username) = update.username {
            record.host.username = username;
        }
        if let Some(password) = update.password {
            record.host.password = password;
        }
        if let Some(remark) = update.remark {
            record.host.remark = Some(remark);
        }

        let updated = record.clone();
        self.persist(&state)?;
        Ok(updated)
    }

    pub async fn delete_host(&self, id: u64) -> Result<()> {
        let mut state = self.state.write().await;
        let before = state.hosts.len();
        state.hosts.retain(|r| r.host.id != id);
        if state.hosts.len() == before {
            return Err(Error::HostNotFound(id));
        }
        self.persist(&state)?;
        Ok(())
    }

    pub async fn get(&self, id: u64) -> Result<HostRecord> {
        let state = self.state.read().await;
        state
            .hosts
            .iter()
            .find(|r| r.host.id == id)
            .cloned()
            .ok_or(Error::HostNotFound(id))
    }

    /// All host descriptors, for a fleet sweep.
    pub async fn hosts(&self) -> Vec<Host> {
        let state = self.state.read().await;
        state.hosts.iter().map(|r| r.host.clone()).collect()
    }

    /// Filtered, paginated listing. `page` is 1-based.
    pub async fn list(&self, filter: &ListFilter, page: usize, size: usize) -> Page<HostRecord> {
        let state = self.state.read().await;
        let matched: Vec<&HostRecord> =
            state.hosts.iter().filter(|r| filter.matches(r)).collect();
        let total = matched.len();
        let page = page.max(1);
        let size = size.max(1);
        let items = matched
            .into_iter()
            .skip((page - 1) * size)
            .take(size)
            .cloned()
            .collect();
        Page {
            items,
            total,
            page,
            size,
        }
    }

    pub async fn interval_seconds(&self) -> u64 {
        self.state.read().await.interval_seconds
    }

    pub async fn set_interval_seconds(&self, seconds: u64) -> Result<u64> {
        let mut state = self.state.write().await;
        state.interval_seconds = seconds.max(1);
        self.persist(&state)?;
        Ok(state.interval_seconds)
    }
}

#[async_trait::async_trait]
impl SnapshotStore for HostRegistry {
    async fn store_snapshot(&self, host_id: u64, snapshot: HostSnapshot) {
        let mut state = self.state.write().await;
        // A host deleted mid-poll simply has nowhere to store its result.
        if let Some(record) = state.hosts.iter_mut().find(|r| r.host.id == host_id) {
            record.snapshot = snapshot;
        }
        if let Err(e) = self.persist(&state) {
            error!(host_id, error = %e, "failed to persist snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_host(address: &str) -> NewHost {
        NewHost {
            address: address.to_string(),
            port: 22,
            username: "ops".to_string(),
            password: "secret".to_string(),
            remark: None,
        }
    }

    #[tokio::test]
    async fn test_add_get_delete() {
        let registry = HostRegistry::in_memory();
        let record = registry.add_host(new_host("10.0.0.1")).await.unwrap();
        assert_eq!(record.host.id, 1);
        assert_eq!(record.snapshot.status, HostStatus::Offline);

        let fetched = registry.get(1).await.unwrap();
        assert_eq!(fetched.host.address, "10.0.0.1");

        registry.delete_host(1).await.unwrap();
        assert!(matches!(
            registry.get(1).await,
            Err(Error::HostNotFound(1))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_address_rejected() {
        let registry = HostRegistry::in_memory();
        registry.add_host(new_host("10.0.0.1")).await.unwrap();
        let err = registry.add_host(new_host("10.0.0.1")).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateAddress(_)));
    }

    #[tokio::test]
    async fn test_partial_update() {
        let registry = HostRegistry::in_memory();
        registry.add_host(new_host("10.0.0.1")).await.unwrap();

        let updated = registry
            .update_host(
                1,
                HostUpdate {
                    remark: Some("rack 3".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.host.remark.as_deref(), Some("rack 3"));
        assert_eq!(updated.host.username, "ops"); // untouched
    }

    #[tokio::test]
    async fn test_store_snapshot_updates_record() {
        let registry = HostRegistry::in_memory();
        registry.add_host(new_host("10.0.0.1")).await.unwrap();

        registry
            .store_snapshot(1, HostSnapshot::error("boom".to_string()))
            .await;
        let record = registry.get(1).await.unwrap();
        assert_eq!(record.snapshot.status, HostStatus::Error);
        assert_eq!(record.snapshot.error_message.as_deref(), Some("boom"));

        // Unknown id is silently ignored (host deleted mid-poll)
        registry.store_snapshot(99, HostSnapshot::offline()).await;
    }

    #[tokio::test]
    async fn test_list_filters_and_pagination() {
        let registry = HostRegistry::in_memory();
        for i in 1..=5 {
            registry
                .add_host(new_host(&format!("10.0.0.{i}")))
                .await
                .unwrap();
        }
        registry
            .store_snapshot(
                3,
                HostSnapshot::online(Some("x86_64".to_string()), None, None, None),
            )
            .await;

        let all = registry.list(&ListFilter::default(), 1, 10).await;
        assert_eq!(all.total, 5);

        let page2 = registry.list(&ListFilter::default(), 2, 2).await;
        assert_eq!(page2.items.len(), 2);
        assert_eq!(page2.items[0].host.id, 3);

        let online = registry
            .list(
                &ListFilter {
                    status: Some(HostStatus::Online),
                    ..Default::default()
                },
                1,
                10,
            )
            .await;
        assert_eq!(online.total, 1);
        assert_eq!(online.items[0].host.id, 3);

        let searched = registry
            .list(
                &ListFilter {
                    search: Some("0.4".to_string()),
                    ..Default::default()
                },
                1,
                10,
            )
            .await;
        assert_eq!(searched.total, 1);
        assert_eq!(searched.items[0].host.address, "10.0.0.4");
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");

        {
            let registry = HostRegistry::open(&path).unwrap();
            registry.add_host(new_host("10.0.0.1")).await.unwrap();
            registry.set_interval_seconds(30).await.unwrap();
        }

        let reopened = HostRegistry::open(&path).unwrap();
        assert_eq!(reopened.interval_seconds().await, 30);
        let record = reopened.get(1).await.unwrap();
        assert_eq!(record.host.address, "10.0.0.1");

        // Ids keep incrementing after reload
        let next = reopened.add_host(new_host("10.0.0.2")).await.unwrap();
        assert_eq!(next.host.id, 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = HostRegistry::open(dir.path().join("absent.json")).unwrap();
        assert!(registry.hosts().await.is_empty());
        assert_eq!(
            registry.interval_seconds().await,
            AppConfig::DEFAULT_POLL_INTERVAL_SECS
        );
    }
}
