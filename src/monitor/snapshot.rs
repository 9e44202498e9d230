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

//! The per-host snapshot and the vendor-report aggregator.
//!
//! A snapshot is constructed fresh on every poll; nothing is carried over
//! between cycles and no per-device identity survives a poll boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::device::{AcceleratorDevice, VendorReport};

/// Outcome of one poll of one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostStatus {
    /// Parsing completed without failure. Zero accelerators is a valid
    /// Online outcome, distinct from any failure.
    Online,
    /// The connection was never established.
    Offline,
    /// The connection succeeded but command execution failed.
    Error,
}

/// The full result of one poll of one host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSnapshot {
    pub arch: Option<String>,
    pub os_info: Option<String>,
    /// Human-readable union of vendor model strings, e.g.
    /// "A100-SXM4-80GB, T4, Ascend 910B2C". Absent when no accelerator
    /// was found or the host was unreachable.
    pub accelerator_type: Option<String>,
    pub devices: Vec<AcceleratorDevice>,
    pub accelerator_count: u32,
    pub idle_count: u32,
    pub busy_count: u32,
    pub warning_count: u32,
    pub status: HostStatus,
    pub error_message: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl HostSnapshot {
    fn empty(status: HostStatus, error_message: Option<String>) -> Self {
        Self {
            arch: None,
            os_info: None,
            accelerator_type: None,
            devices: Vec::new(),
            accelerator_count: 0,
            idle_count: 0,
            busy_count: 0,
            warning_count: 0,
            status,
            error_message,
            last_updated: Utc::now(),
        }
    }

    /// Snapshot for a host that was never reached. Accelerator fields are
    /// reset to "no data", never left over from a prior cycle.
    pub fn offline() -> Self {
        Self::empty(HostStatus::Offline, Some("Connection failed".to_string()))
    }

    /// Snapshot for a host whose session was established but whose probe
    /// command failed or timed out.
    pub fn error(message: String) -> Self {
        Self::empty(HostStatus::Error, Some(message))
    }

    /// Placeholder for a host that has not been polled yet.
    pub fn pending() -> Self {
        Self::empty(HostStatus::Offline, None)
    }

    /// Merge the per-vendor parse results into one Online snapshot.
    ///
    /// Counts are summed across whichever reports are present, device
    /// lists concatenate in vendor-presentation order (NVIDIA first),
    /// and non-empty type labels join with a comma. Both vendors absent
    /// is the valid "no accelerator found" outcome.
    pub fn online(
        arch: Option<String>,
        os_info: Option<String>,
        nvidia: Option<VendorReport>,
        huawei: Option<VendorReport>,
    ) -> Self {
        let mut devices = Vec::new();
        let mut idle_count = 0;
        let mut busy_count = 0;
        let mut warning_count = 0;
        let mut labels = Vec::new();

        for report in [nvidia, huawei].into_iter().flatten() {
            idle_count += report.idle_count;
            busy_count += report.busy_count;
            warning_count += report.warning_count;
            if let Some(label) = report.type_label.filter(|l| !l.is_empty()) {
                labels.push(label);
            }
            devices.extend(report.devices);
        }

        Self {
            arch,
            os_info,
            accelerator_type: (!labels.is_empty()).then(|| labels.join(", ")),
            accelerator_count: idle_count + busy_count + warning_count,
            devices,
            idle_count,
            busy_count,
            warning_count,
            status: HostStatus::Online,
            error_message: None,
            last_updated: Utc::now(),
        }
    }

    /// The structural invariant every snapshot maintains.
    pub fn counts_consistent(&self) -> bool {
        self.accelerator_count == self.idle_count + self.busy_count + self.warning_count
            && self.accelerator_count == self.devices.len() as u32
    }
}
