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

use serde::{Deserialize, Serialize};

/// Health classification of a single accelerator for one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthState {
    Ok,
    Warning,
}

/// Utilization classification of a healthy accelerator.
///
/// A device in Warning state carries no utilization classification at all;
/// that is modeled as `Option<Utilization>` on [`AcceleratorDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Utilization {
    Idle,
    Busy,
}

/// One physical or logical accelerator discovered on a host.
///
/// Memory values are in the vendor-native scale (MiB for nvidia-smi,
/// MB for npu-smi HBM counters); they are only ever compared against
/// each other, never across vendors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceleratorDevice {
    /// Vendor-reported device index.
    pub id: String,
    /// Vendor-reported model name, as printed by the tool.
    pub name: String,
    pub memory_total: u64,
    pub memory_used: u64,
    /// Temperature in Celsius, when the vendor output carried one.
    pub temperature: Option<u32>,
    pub health: HealthState,
    /// `None` exactly when `health == Warning`.
    pub utilization: Option<Utilization>,
}

impl AcceleratorDevice {
    pub fn is_idle(&self) -> bool {
        self.utilization == Some(Utilization::Idle)
    }

    pub fn is_busy(&self) -> bool {
        self.utilization == Some(Utilization::Busy)
    }

    pub fn is_warning(&self) -> bool {
        self.health == HealthState::Warning
    }
}

/// One vendor parser's contribution to a host snapshot: the canonical
/// device list plus the aggregate counts and type label derived from it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VendorReport {
    pub devices: Vec<AcceleratorDevice>,
    pub idle_count: u32,
    pub busy_count: u32,
    pub warning_count: u32,
    /// Human-readable model summary, e.g. "T4" or "Ascend 910B2C".
    pub type_label: Option<String>,
}

impl VendorReport {
    /// Build a report from classified devices. Counts are derived from the
    /// device states, so `devices.len() == idle + busy + warning` holds by
    /// construction.
    pub fn from_devices(devices: Vec<AcceleratorDevice>, type_label: Option<String>) -> Self {
        let idle_count = devices.iter().filter(|d| d.is_idle()).count() as u32;
        let busy_count = devices.iter().filter(|d| d.is_busy()).count() as u32;
        let warning_count = devices.iter().filter(|d| d.is_warning()).count() as u32;
        Self {
            devices,
            idle_count,
            busy_count,
            warning_count,
            type_label,
        }
    }

    pub fn device_count(&self) -> u32 {
        self.devices.len() as u32
    }
}
