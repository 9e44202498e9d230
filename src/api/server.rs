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

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::handlers::{
    create_host, delete_host, get_settings, list_hosts, put_settings, raw_probe, refresh_all,
    refresh_host, update_host, ApiState, SharedState,
};
use crate::cli::ServeArgs;
use crate::common::config::Thresholds;
use crate::error::Result;
use crate::monitor::FleetPoller;
use crate::registry::HostRegistry;

fn router(state: SharedState) -> Router {
    Router::new()
        .route("/hosts", get(list_hosts).post(create_host))
        .route(
            "/hosts/{id}",
            axum::routing::put(update_host).delete(delete_host),
        )
        .route("/hosts/{id}/refresh", post(refresh_host))
        .route("/hosts/refresh_all", post(refresh_all))
        .route("/hosts/{id}/raw", get(raw_probe))
        .route("/settings", get(get_settings).put(put_settings))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// The periodic trigger: sweep the fleet, sleep the configured interval,
/// repeat. The interval is re-read from the registry each cycle so a
/// settings change needs no rescheduling machinery.
async fn scheduler_loop(registry: Arc<HostRegistry>, poller: Arc<FleetPoller>) {
    loop {
        let hosts = registry.hosts().await;
        if !hosts.is_empty() {
            info!(hosts = hosts.len(), "starting scheduled fleet poll");
            let completed = poller.poll_all(hosts).await;
            info!(completed, "fleet poll finished");
        }
        let interval = registry.interval_seconds().await;
        tokio::time::sleep(Duration::from_secs(interval)).await;
    }
}

/// Run the API server plus the background poll scheduler.
pub async fn run_serve_mode(args: &ServeArgs) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleet_smi=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let registry = Arc::new(HostRegistry::open(&args.registry)?);
    let poller = Arc::new(FleetPoller::new(
        Arc::clone(&registry) as Arc<dyn crate::monitor::SnapshotStore>,
        Thresholds::default(),
    ));

    tokio::spawn(scheduler_loop(
        Arc::clone(&registry),
        Arc::clone(&poller),
    ));

    let state: SharedState = Arc::new(ApiState { registry, poller });
    let app = router(state);

    let listener = TcpListener::bind(("0.0.0.0", args.port)).await?;
    info!(port = args.port, registry = %args.registry, "fleet-smi API listening");

    if let Err(e) = axum::serve(listener, app).await {
        warn!(error = %e, "API server stopped");
    }
    Ok(())
}
