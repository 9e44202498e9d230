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

/// Application configuration constants
pub struct AppConfig;

impl AppConfig {
    // Remote session limits
    pub const CONNECT_TIMEOUT_SECS: u64 = 5;
    pub const COMMAND_TIMEOUT_SECS: u64 = 10;
    pub const MAX_CONCURRENT_SESSIONS: usize = 10;

    // Scheduling
    pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

    // API server
    pub const DEFAULT_API_PORT: u16 = 8000;
    pub const DEFAULT_PAGE_SIZE: usize = 10;
    pub const DEFAULT_REGISTRY_FILE: &'static str = "fleet-smi.json";
}

/// Classification thresholds for vendor parsers.
///
/// The defaults encode the canonical rules: a device hotter than
/// `warning_temp_c` is a Warning regardless of load, and memory-usage
/// ratios above the per-vendor busy percentage classify a healthy device
/// as Busy. The Huawei threshold only applies as a fallback when the
/// npu-smi output carries no process table; when the table is present,
/// process attachment is the busy signal and the ratio is ignored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Thresholds {
    /// Temperature in Celsius above which a device is in Warning state.
    pub warning_temp_c: f64,
    /// NVIDIA memory-usage percentage above which a healthy device is Busy.
    pub nvidia_busy_percent: f64,
    /// Huawei memory-usage percentage above which a healthy device is Busy,
    /// used only when no process table is present in the output.
    pub huawei_busy_percent: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning_temp_c: 85.0,
            nvidia_busy_percent: 10.0,
            huawei_busy_percent: 5.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_defaults() {
        let t = Thresholds::default();
        assert_eq!(t.warning_temp_c, 85.0);
        assert_eq!(t.nvidia_busy_percent, 10.0);
        assert_eq!(t.huawei_busy_percent, 5.0);
    }
}
