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

//! Unified error types for fleet-smi.
//!
//! The poll pipeline distinguishes two remote failure classes: a session
//! that could never be established ([`Error::ConnectionFailed`], which maps
//! to an `Offline` snapshot) and a session that was established but whose
//! command raised or timed out ([`Error::CommandFailed`], which maps to an
//! `Error` snapshot). Vendor parsers never produce errors: malformed output
//! degrades to zero devices for that vendor.

use thiserror::Error;

/// The main error type for fleet-smi operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The SSH session to a host could not be established within the
    /// connect timeout (TCP failure, authentication failure, or timeout).
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The session was established but command execution raised or
    /// exceeded its timeout.
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// No host with the given id exists in the registry.
    #[error("Host {0} not found")]
    HostNotFound(u64),

    /// A host with the same address is already registered.
    #[error("Host address already registered: {0}")]
    DuplicateAddress(String),

    /// An I/O error occurred while reading or writing the registry file.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The registry file could not be serialized or deserialized.
    #[error("Registry serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A specialized Result type for fleet-smi operations.
pub type Result<T> = std::result::Result<T, Error>;
