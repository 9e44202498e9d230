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

//! Parser for the nvidia-smi CSV query block.
//!
//! Expected input is the output of
//! `nvidia-smi --query-gpu=index,name,memory.total,memory.used,temperature.gpu
//! --format=csv,noheader`, one line per device:
//!
//! ```text
//! 0, Tesla T4, 16384 MiB, 500 MiB, 45
//! ```
//!
//! Fields may carry unit suffixes ("MiB", "C"); the numeric value is the
//! leading number of each field. Malformed lines are skipped, never fatal.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::common::config::Thresholds;
use crate::device::types::{AcceleratorDevice, HealthState, Utilization, VendorReport};

/// Sentinel emitted by the probe script when nvidia-smi is not installed.
pub const NVIDIA_NOT_FOUND: &str = "NVIDIA_NOT_FOUND";

static LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)").expect("invalid leading-number regex"));

/// Extract the leading number from a field like "16384 MiB" or "45 C".
/// Returns 0.0 when the field carries no number at all.
fn take_number(field: &str) -> f64 {
    LEADING_NUMBER
        .find(field)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Strip common brand prefixes for the aggregate type string
/// (e.g. "NVIDIA GeForce RTX 4090" -> "RTX 4090").
fn short_name(name: &str) -> String {
    name.replace("NVIDIA ", "")
        .replace("GeForce ", "")
        .replace("Tesla ", "")
}

/// Parse the NVIDIA section of the probe output.
///
/// Returns `None` when the tool was absent or reported no devices; this is
/// a valid "no NVIDIA accelerators" outcome, not an error.
pub fn parse_nvidia(block: &str, thresholds: &Thresholds) -> Option<VendorReport> {
    let block = block.trim();
    if block.is_empty() || block.contains(NVIDIA_NOT_FOUND) || block.contains("command not found") {
        return None;
    }

    let mut devices = Vec::new();
    let mut names = Vec::new();

    for line in block.lines() {
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        if parts.len() < 5 {
            continue; // Skip malformed lines
        }

        let name = parts[1].to_string();
        let total_mem = take_number(parts[2]);
        let used_mem = take_number(parts[3]);
        let temp = take_number(parts[4]);

        let usage_percent = if total_mem > 0.0 {
            used_mem / total_mem * 100.0
        } else {
            0.0
        };

        let (health, utilization) = if temp > thresholds.warning_temp_c {
            (HealthState::Warning, None)
        } else if usage_percent > thresholds.nvidia_busy_percent {
            (HealthState::Ok, Some(Utilization::Busy))
        } else {
            (HealthState::Ok, Some(Utilization::Idle))
        };

        let short = short_name(&name);
        if !names.contains(&short) {
            names.push(short);
        }

        devices.push(AcceleratorDevice {
            id: parts[0].to_string(),
            name,
            memory_total: total_mem as u64,
            memory_used: used_mem as u64,
            temperature: Some(temp as u32),
            health,
            utilization,
        });
    }

    if devices.is_empty() {
        return None;
    }

    names.sort();
    Some(VendorReport::from_devices(devices, Some(names.join(", "))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(block: &str) -> Option<VendorReport> {
        parse_nvidia(block, &Thresholds::default())
    }

    #[test]
    fn test_idle_device() {
        let report = parse("0, Tesla T4, 16384 MiB, 500 MiB, 45").unwrap();
        assert_eq!(report.devices.len(), 1);

        let dev = &report.devices[0];
        assert_eq!(dev.id, "0");
        assert_eq!(dev.name, "Tesla T4");
        assert_eq!(dev.memory_total, 16384);
        assert_eq!(dev.memory_used, 500);
        assert_eq!(dev.temperature, Some(45));
        assert_eq!(dev.health, HealthState::Ok);
        assert_eq!(dev.utilization, Some(Utilization::Idle));

        assert_eq!(report.idle_count, 1);
        assert_eq!(report.busy_count, 0);
        assert_eq!(report.warning_count, 0);
        assert_eq!(report.type_label.as_deref(), Some("T4"));
    }

    #[test]
    fn test_busy_device() {
        let report = parse("0, NVIDIA A100-SXM4-80GB, 81920 MiB, 40000 MiB, 62").unwrap();
        assert_eq!(report.busy_count, 1);
        assert_eq!(report.idle_count, 0);
        assert_eq!(report.type_label.as_deref(), Some("A100-SXM4-80GB"));
    }

    #[test]
    fn test_warning_overrides_usage() {
        // 90C > 85C threshold: Warning even at ~92% memory usage
        let report = parse("0, Tesla T4, 16384 MiB, 15000 MiB, 90").unwrap();
        assert_eq!(report.warning_count, 1);
        assert_eq!(report.idle_count, 0);
        assert_eq!(report.busy_count, 0);
        assert_eq!(report.devices[0].utilization, None);
    }

    #[test]
    fn test_multiple_devices_mixed_states() {
        let block = "0, Tesla T4, 16384 MiB, 500 MiB, 45\n\
                     1, Tesla T4, 16384 MiB, 12000 MiB, 70\n\
                     2, NVIDIA A100-SXM4-80GB, 81920 MiB, 100 MiB, 91";
        let report = parse(block).unwrap();
        assert_eq!(report.devices.len(), 3);
        assert_eq!(report.idle_count, 1);
        assert_eq!(report.busy_count, 1);
        assert_eq!(report.warning_count, 1);
        // Distinct short names, sorted
        assert_eq!(report.type_label.as_deref(), Some("A100-SXM4-80GB, T4"));
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let block = "garbage line\n\
                     0, Tesla T4, 16384 MiB, 500 MiB, 45\n\
                     1, incomplete, 1024 MiB";
        let report = parse(block).unwrap();
        assert_eq!(report.devices.len(), 1);
    }

    #[test]
    fn test_sentinel_yields_none() {
        assert!(parse("NVIDIA_NOT_FOUND").is_none());
        assert!(parse("bash: nvidia-smi: command not found").is_none());
        assert!(parse("").is_none());
        assert!(parse("   \n  ").is_none());
    }

    #[test]
    fn test_zero_total_memory_never_busy() {
        let report = parse("0, Tesla T4, 0 MiB, 0 MiB, 45").unwrap();
        assert_eq!(report.devices[0].utilization, Some(Utilization::Idle));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let block = "0, Tesla T4, 16384 MiB, 500 MiB, 45";
        let a = parse(block).unwrap();
        let b = parse(block).unwrap();
        assert_eq!(a.idle_count, b.idle_count);
        assert_eq!(a.type_label, b.type_label);
        assert_eq!(a.devices.len(), b.devices.len());
    }

    #[test]
    fn test_take_number() {
        assert_eq!(take_number("16384 MiB"), 16384.0);
        assert_eq!(take_number("45 C"), 45.0);
        assert_eq!(take_number("89.5"), 89.5);
        assert_eq!(take_number("[N/A]"), 0.0);
    }
}
