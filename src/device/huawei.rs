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

//! Parser for the `npu-smi info` ASCII table.
//!
//! The output has two logically distinct sections. First a per-device
//! status table where each device spans two or more physical lines and
//! the HBM usage is wrapped onto a continuation line:
//!
//! ```text
//! | NPU   Name                | Health        | Power(W)    Temp(C)           Hugepages-Usage(page)|
//! | Chip                      | Bus-Id        | AICore(%)   Memory-Usage(MB)  HBM-Usage(MB)        |
//! +===========================+===============+====================================================+
//! | 0     910B2C              | OK            | 89.5        44                0    / 0             |
//! | 0                         | 0000:C1:00.0  | 0           0    / 0          3632 / 65536         |
//! ```
//!
//! and then, optionally, a process table listing which device indices
//! currently have a process attached:
//!
//! ```text
//! | NPU     Chip              | Process id    | Process name             | Process memory(MB)      |
//! +===========================+===============+====================================================+
//! | 1       0                 | 1840146       | python                   | 255                     |
//! ```
//!
//! The layout is not a grammar; devices are recognized by a line-level
//! pattern and their memory figures by a bounded lookahead over the
//! wrapped continuation lines. Any line that fits no pattern is ignored.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::common::config::Thresholds;
use crate::device::types::{AcceleratorDevice, HealthState, Utilization, VendorReport};

/// Sentinel emitted by the probe script when npu-smi is not installed.
pub const HUAWEI_NOT_FOUND: &str = "HUAWEI_NOT_FOUND";

/// How many continuation lines below a status line are searched for the
/// wrapped HBM usage pair.
const MEMORY_LOOKAHEAD_LINES: usize = 7;

/// A status line opens a new device entry: index, model, a health keyword
/// in its own column, then a power/temperature numeric field.
static STATUS_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\|\s*(\d+)\s+([A-Za-z0-9-]+)\s*\|\s*([A-Za-z]+)\s*\|\s*([\d.]+)\s+(\d+)\b")
        .expect("invalid status line regex")
});

/// A "used / total" pair anywhere in a line, e.g. "3632 / 65536".
static MEM_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,6})\s*/\s*(\d{1,6})").expect("invalid memory pair regex"));

/// Leading device index of a process-table row.
static PROCESS_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\|\s*(\d+)\s+").expect("invalid process row regex"));

static NO_PROCESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"No running processes found in NPU\s*(\d+)").expect("invalid no-process regex")
});

fn is_process_table_header(line: &str) -> bool {
    (line.contains("Process id") && line.contains("Process name"))
        || (line.trim_start().starts_with("| NPU") && line.contains("Process"))
}

/// A raw device entry before classification.
struct StatusEntry {
    id: u32,
    model: String,
    health: String,
    temperature: u32,
    memory_used: u64,
    memory_total: u64,
}

/// Collect "used / total" candidates in the bounded window below a status
/// line and pick the HBM pair: the first candidate with a total of at
/// least 1000 distinguishes HBM-scale totals from small unrelated counters
/// sharing the same rows; failing that, the largest total wins.
fn scan_memory_pairs(lines: &[&str], start: usize) -> (u64, u64) {
    let mut candidates = Vec::new();
    let end = (start + 1 + MEMORY_LOOKAHEAD_LINES).min(lines.len());

    for line in &lines[start + 1..end] {
        if line.trim_start().starts_with('+') || is_process_table_header(line) {
            break;
        }
        for cap in MEM_PAIR.captures_iter(line) {
            let used: u64 = cap[1].parse().unwrap_or(0);
            let total: u64 = cap[2].parse().unwrap_or(0);
            if total == 0 {
                continue; // 0/0 placeholder columns carry no information
            }
            candidates.push((used, total));
        }
    }

    if let Some(&pair) = candidates.iter().find(|(_, total)| *total >= 1000) {
        return pair;
    }
    candidates
        .into_iter()
        .max_by_key(|(_, total)| *total)
        .unwrap_or((0, 0))
}

/// Device indices marked busy by the process table, if one is present.
fn scan_process_table(lines: &[&str]) -> Vec<u32> {
    let mut busy = Vec::new();
    for line in lines {
        if NO_PROCESS.is_match(line) {
            continue; // Device explicitly has no process; never marks busy
        }
        let Some(cap) = PROCESS_ROW.captures(line) else {
            continue;
        };
        let Ok(index) = cap[1].parse::<u32>() else {
            continue;
        };
        // Confirm the second column opens with a numeric process id, so
        // border and header rows never count as processes.
        let cols: Vec<&str> = line
            .split('|')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();
        let has_pid = cols
            .get(1)
            .and_then(|c| c.split_whitespace().next())
            .is_some_and(|tok| tok.chars().all(|ch| ch.is_ascii_digit()));
        if has_pid && !busy.contains(&index) {
            busy.push(index);
        }
    }
    busy
}

/// Derive the aggregate type label from the first device's model:
/// known Ascend families carry the model number, anything else falls
/// back to a generic vendor label.
fn type_label(entries: &[StatusEntry]) -> String {
    match entries.first() {
        Some(e) if e.model.starts_with("910") || e.model.starts_with("310") => {
            format!("Ascend {}", e.model)
        }
        _ => "Huawei Ascend".to_string(),
    }
}

/// Parse the Huawei section of the probe output.
///
/// Returns `None` when the tool was absent; a present-but-unparseable
/// block degrades to `None` as well (zero devices, not an error).
pub fn parse_huawei(block: &str, thresholds: &Thresholds) -> Option<VendorReport> {
    let block = block.trim();
    if block.is_empty() || block.contains(HUAWEI_NOT_FOUND) || block.contains("command not found") {
        return None;
    }

    let lines: Vec<&str> = block.lines().collect();
    let process_header = lines.iter().position(|l| is_process_table_header(l));
    let status_end = process_header.unwrap_or(lines.len());

    let mut entries = Vec::new();
    for idx in 0..status_end {
        let Some(cap) = STATUS_LINE.captures(lines[idx]) else {
            continue;
        };
        let (memory_used, memory_total) = scan_memory_pairs(&lines, idx);
        entries.push(StatusEntry {
            id: cap[1].parse().unwrap_or(0),
            model: cap[2].to_string(),
            health: cap[3].to_string(),
            temperature: cap[5].parse().unwrap_or(0),
            memory_used,
            memory_total,
        });
    }

    if entries.is_empty() {
        return None;
    }

    let busy_indices = process_header.map(|h| scan_process_table(&lines[h + 1..]));
    let label = type_label(&entries);

    let devices = entries
        .into_iter()
        .map(|e| {
            let healthy = e.health.eq_ignore_ascii_case("OK");
            let (health, utilization) = if !healthy {
                (HealthState::Warning, None)
            } else {
                // When a process table is present it is authoritative:
                // process attachment decides Busy, memory ratio is ignored.
                // Without a table, fall back to the memory-usage threshold.
                let busy = match &busy_indices {
                    Some(indices) => indices.contains(&e.id),
                    None => {
                        let percent = if e.memory_total > 0 {
                            e.memory_used as f64 / e.memory_total as f64 * 100.0
                        } else {
                            0.0
                        };
                        percent > thresholds.huawei_busy_percent
                    }
                };
                let state = if busy {
                    Utilization::Busy
                } else {
                    Utilization::Idle
                };
                (HealthState::Ok, Some(state))
            };

            AcceleratorDevice {
                id: e.id.to_string(),
                name: format!("Ascend {}", e.model),
                memory_total: e.memory_total,
                memory_used: e.memory_used,
                temperature: Some(e.temperature),
                health,
                utilization,
            }
        })
        .collect();

    Some(VendorReport::from_devices(devices, Some(label)))
}
