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

//! Vendor parsers: pure transformations from raw diagnostic text into
//! canonical accelerator records. Each parser embeds its own
//! classification heuristic; none of them ever fails on malformed input.

pub mod huawei;
pub mod nvidia;
pub mod types;

pub use huawei::{parse_huawei, HUAWEI_NOT_FOUND};
pub use nvidia::{parse_nvidia, NVIDIA_NOT_FOUND};
pub use types::{AcceleratorDevice, HealthState, Utilization, VendorReport};
