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

mod api;
mod cli;
mod common;
mod device;
mod error;
mod monitor;
mod registry;
mod remote;

use clap::Parser;
use tokio::signal;

use cli::{CheckArgs, Cli, Commands};
use common::config::Thresholds;
use monitor::{check_host, fetch_raw};
use registry::Host;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Clean shutdown on Ctrl+C
    tokio::spawn(async {
        signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        std::process::exit(0);
    });

    match cli.command {
        Commands::Serve(args) => {
            if let Err(e) = api::run_serve_mode(&args).await {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        Commands::Check(args) => run_check_mode(&args).await,
    }
}

/// One-off synchronous check of an ad-hoc host, outside any registry.
async fn run_check_mode(args: &CheckArgs) {
    let host = Host {
        id: 0,
        address: args.address.clone(),
        port: args.port,
        username: args.username.clone(),
        password: args.password.clone(),
        remark: None,
    };

    if args.raw {
        match fetch_raw(&host).await {
            Ok(output) => println!("{output}"),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    let snapshot = check_host(&host, &Thresholds::default()).await;
    match serde_json::to_string_pretty(&snapshot) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
