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

//! The composed probe script and its section splitter.
//!
//! A poll issues exactly one remote command so each host costs a single
//! round trip. The script emits architecture, OS description, the NVIDIA
//! CSV query, and the Huawei status dump, separated by a delimiter token
//! that does not occur in any tool's output. Absent tools produce sentinel
//! tokens via shell `||` fallbacks, so a missing nvidia-smi never aborts
//! the Huawei section.

use crate::device::{HUAWEI_NOT_FOUND, NVIDIA_NOT_FOUND};

/// Separator between the probe sections.
pub const SECTION_DELIM: &str = "|||FLEET-SMI-SECTION|||";

/// Build the combined diagnostic script sent over the session.
pub fn probe_script() -> String {
    format!(
        "uname -m; echo '{delim}'; \
         (grep PRETTY_NAME /etc/os-release | cut -d'=' -f2 | tr -d '\"') || uname -sr; echo '{delim}'; \
         nvidia-smi --query-gpu=index,name,memory.total,memory.used,temperature.gpu --format=csv,noheader 2>/dev/null || echo '{nvidia}'; echo '{delim}'; \
         npu-smi info 2>/dev/null || echo '{huawei}'",
        delim = SECTION_DELIM,
        nvidia = NVIDIA_NOT_FOUND,
        huawei = HUAWEI_NOT_FOUND,
    )
}

/// The probe output split back into its sections.
#[derive(Debug, Clone, Default)]
pub struct ProbeSections {
    pub arch: Option<String>,
    pub os_info: Option<String>,
    pub nvidia: String,
    pub huawei: String,
}

/// Split delimiter-annotated probe stdout into sections.
///
/// Missing trailing sections (a session cut short mid-script) leave the
/// corresponding fields empty; the parsers treat empty blocks as "no
/// devices", so a truncated probe degrades instead of failing.
pub fn split_sections(stdout: &str) -> ProbeSections {
    let mut parts = stdout.split(SECTION_DELIM);

    let non_empty = |s: &str| {
        let t = s.trim();
        (!t.is_empty()).then(|| t.to_string())
    };

    ProbeSections {
        arch: parts.next().and_then(non_empty),
        os_info: parts.next().and_then(non_empty),
        nvidia: parts.next().map(|s| s.trim().to_string()).unwrap_or_default(),
        huawei: parts.next().map(|s| s.trim().to_string()).unwrap_or_default(),
    }
}
