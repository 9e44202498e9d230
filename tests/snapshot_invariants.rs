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

//! End-to-end pipeline tests: raw probe output through section splitting,
//! vendor parsing and the snapshot merge.

use fleet_smi::common::config::Thresholds;
use fleet_smi::device::{parse_huawei, parse_nvidia};
use fleet_smi::monitor::{HostSnapshot, HostStatus};
use fleet_smi::remote::{split_sections, SECTION_DELIM};

fn snapshot_from_probe(stdout: &str) -> HostSnapshot {
    let thresholds = Thresholds::default();
    let sections = split_sections(stdout);
    HostSnapshot::online(
        sections.arch,
        sections.os_info,
        parse_nvidia(&sections.nvidia, &thresholds),
        parse_huawei(&sections.huawei, &thresholds),
    )
}

fn probe(arch: &str, os: &str, nvidia: &str, huawei: &str) -> String {
    format!(
        "{arch}\n{d}\n{os}\n{d}\n{nvidia}\n{d}\n{huawei}\n",
        d = SECTION_DELIM
    )
}

const HUAWEI_TABLE: &str = "\
| NPU   Name                | Health        | Power(W)    Temp(C)           Hugepages-Usage(page)|
| Chip                      | Bus-Id        | AICore(%)   Memory-Usage(MB)  HBM-Usage(MB)        |
+===========================+===============+====================================================+
| 0     910B2C              | OK            | 89.5        44                0    / 0             |
| 0                         | 0000:C1:00.0  | 0           0    / 0          3632 / 65536         |
+===========================+===============+====================================================+
| NPU     Chip              | Process id    | Process name             | Process memory(MB)      |
+===========================+===============+====================================================+
| 0       0                 | 1840146       | python                   | 255                     |
+===========================+===============+====================================================+";

#[test]
fn mixed_fleet_host_merges_both_vendors() {
    let stdout = probe(
        "x86_64",
        "Ubuntu 22.04.3 LTS",
        "0, Tesla T4, 16384 MiB, 500 MiB, 45\n1, Tesla T4, 16384 MiB, 15000 MiB, 90",
        HUAWEI_TABLE,
    );
    let snap = snapshot_from_probe(&stdout);

    assert_eq!(snap.status, HostStatus::Online);
    assert_eq!(snap.arch.as_deref(), Some("x86_64"));
    assert_eq!(snap.os_info.as_deref(), Some("Ubuntu 22.04.3 LTS"));

    // One idle T4, one Warning T4 (90C), one busy Ascend (live process)
    assert_eq!(snap.accelerator_count, 3);
    assert_eq!(snap.idle_count, 1);
    assert_eq!(snap.busy_count, 1);
    assert_eq!(snap.warning_count, 1);
    assert_eq!(snap.accelerator_type.as_deref(), Some("T4, Ascend 910B2C"));

    // NVIDIA devices precede Huawei devices
    assert_eq!(snap.devices[0].name, "Tesla T4");
    assert_eq!(snap.devices[2].name, "Ascend 910B2C");

    assert!(snap.counts_consistent());
}

#[test]
fn both_sentinels_is_online_with_no_accelerators() {
    let stdout = probe(
        "aarch64",
        "Debian GNU/Linux 12",
        "NVIDIA_NOT_FOUND",
        "HUAWEI_NOT_FOUND",
    );
    let snap = snapshot_from_probe(&stdout);

    assert_eq!(snap.status, HostStatus::Online);
    assert_eq!(snap.accelerator_count, 0);
    assert_eq!(snap.accelerator_type, None);
    assert!(snap.counts_consistent());
}

#[test]
fn warning_devices_never_count_as_idle_or_busy() {
    let stdout = probe(
        "x86_64",
        "Ubuntu 22.04.3 LTS",
        "0, Tesla T4, 16384 MiB, 15000 MiB, 90",
        "HUAWEI_NOT_FOUND",
    );
    let snap = snapshot_from_probe(&stdout);

    assert_eq!(snap.warning_count, 1);
    assert_eq!(snap.idle_count, 0);
    assert_eq!(snap.busy_count, 0);
    assert_eq!(snap.devices[0].utilization, None);
    assert!(snap.counts_consistent());
}

#[test]
fn offline_snapshot_carries_no_accelerator_data() {
    let snap = HostSnapshot::offline();
    assert_eq!(snap.status, HostStatus::Offline);
    assert_eq!(snap.error_message.as_deref(), Some("Connection failed"));
    assert_eq!(snap.accelerator_count, 0);
    assert_eq!(snap.accelerator_type, None);
    assert!(snap.devices.is_empty());
    assert!(snap.counts_consistent());
}

#[test]
fn parsing_the_same_probe_twice_is_identical() {
    let stdout = probe(
        "x86_64",
        "Ubuntu 22.04.3 LTS",
        "0, Tesla T4, 16384 MiB, 500 MiB, 45",
        HUAWEI_TABLE,
    );
    let a = snapshot_from_probe(&stdout);
    let b = snapshot_from_probe(&stdout);

    assert_eq!(a.accelerator_count, b.accelerator_count);
    assert_eq!(a.idle_count, b.idle_count);
    assert_eq!(a.busy_count, b.busy_count);
    assert_eq!(a.warning_count, b.warning_count);
    assert_eq!(a.accelerator_type, b.accelerator_type);
    assert_eq!(a.devices.len(), b.devices.len());
}

#[test]
fn garbled_vendor_blocks_degrade_to_zero_devices() {
    let stdout = probe(
        "x86_64",
        "Ubuntu 22.04.3 LTS",
        "totally, not, what, was, expected, at all\nshort line",
        "| mangled table +++ ||| no structure",
    );
    let snap = snapshot_from_probe(&stdout);

    // One "valid-shaped" CSV line parses (six comma fields), the rest is
    // dropped; the mangled Huawei block yields nothing. Never an error.
    assert_eq!(snap.status, HostStatus::Online);
    assert!(snap.counts_consistent());
}

#[test]
fn snapshot_serializes_to_json_and_back() {
    let stdout = probe(
        "x86_64",
        "Ubuntu 22.04.3 LTS",
        "0, Tesla T4, 16384 MiB, 500 MiB, 45",
        "HUAWEI_NOT_FOUND",
    );
    let snap = snapshot_from_probe(&stdout);

    let json = serde_json::to_string(&snap).unwrap();
    let restored: HostSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.accelerator_count, snap.accelerator_count);
    assert_eq!(restored.status, snap.status);
    assert!(restored.counts_consistent());
}
