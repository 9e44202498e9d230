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

use clap::{Parser, Subcommand};

use crate::common::config::AppConfig;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the fleet monitor: HTTP API plus the periodic poll scheduler.
    Serve(ServeArgs),
    /// Check a single host once and print its snapshot as JSON.
    Check(CheckArgs),
}

#[derive(Parser)]
pub struct ServeArgs {
    /// The port to listen on for the API server.
    #[arg(short, long, default_value_t = AppConfig::DEFAULT_API_PORT)]
    pub port: u16,
    /// Path of the JSON registry file holding hosts and snapshots.
    #[arg(short, long, default_value = AppConfig::DEFAULT_REGISTRY_FILE)]
    pub registry: String,
}

#[derive(Parser)]
pub struct CheckArgs {
    /// Host address to connect to.
    pub address: String,
    /// SSH port.
    #[arg(short = 'P', long, default_value_t = 22)]
    pub port: u16,
    /// SSH username.
    #[arg(short, long)]
    pub username: String,
    /// SSH password.
    #[arg(short = 'w', long)]
    pub password: String,
    /// Print the raw probe output instead of the parsed snapshot.
    #[arg(long)]
    pub raw: bool,
}
