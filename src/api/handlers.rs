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

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::common::config::AppConfig;
use crate::error::Error;
use crate::monitor::{fetch_raw, FleetPoller, HostStatus};
use crate::registry::{AccFilter, HostRecord, HostRegistry, HostUpdate, ListFilter, NewHost, Page};

/// Shared application state for all routes.
pub struct ApiState {
    pub registry: Arc<HostRegistry>,
    pub poller: Arc<FleetPoller>,
}

pub type SharedState = Arc<ApiState>;

/// HTTP mapping of the library errors.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::HostNotFound(_) => StatusCode::NOT_FOUND,
            Error::DuplicateAddress(_) => StatusCode::CONFLICT,
            Error::ConnectionFailed(_) | Error::CommandFailed(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_size")]
    pub size: usize,
    pub search: Option<String>,
    pub arch: Option<String>,
    pub status: Option<String>,
    pub acc_type: Option<String>,
}

fn default_page() -> usize {
    1
}

fn default_size() -> usize {
    AppConfig::DEFAULT_PAGE_SIZE
}

fn parse_status(s: &str) -> Option<HostStatus> {
    match s {
        "Online" => Some(HostStatus::Online),
        "Offline" => Some(HostStatus::Offline),
        "Error" => Some(HostStatus::Error),
        _ => None,
    }
}

fn parse_acc_filter(s: &str) -> Option<AccFilter> {
    match s {
        "HasAcc" => Some(AccFilter::HasAcc),
        "NoAcc" => Some(AccFilter::NoAcc),
        "Idle" => Some(AccFilter::Idle),
        "Busy" => Some(AccFilter::Busy),
        "Warning" => Some(AccFilter::Warning),
        _ => None,
    }
}

pub async fn list_hosts(
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> Json<Page<HostRecord>> {
    let filter = ListFilter {
        search: query.search,
        arch: query.arch,
        status: query.status.as_deref().and_then(parse_status),
        acc: query.acc_type.as_deref().and_then(parse_acc_filter),
    };
    Json(state.registry.list(&filter, query.page, query.size).await)
}

pub async fn create_host(
    State(state): State<SharedState>,
    Json(new): Json<NewHost>,
) -> Result<Json<HostRecord>, ApiError> {
    let record = state.registry.add_host(new).await?;
    info!(address = %record.host.address, "host registered");

    // First check runs in the background so registration returns at once.
    let poller = Arc::clone(&state.poller);
    let host = record.host.clone();
    tokio::spawn(async move {
        poller.refresh_one(&host).await;
    });

    Ok(Json(record))
}

pub async fn update_host(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
    Json(update): Json<HostUpdate>,
) -> Result<Json<HostRecord>, ApiError> {
    Ok(Json(state.registry.update_host(id, update).await?))
}

pub async fn delete_host(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.registry.delete_host(id).await?;
    Ok(Json(json!({ "ok": true })))
}

/// Synchronous single-host refresh. Runs outside the worker pool so an
/// in-flight fleet sweep never delays a manual check.
pub async fn refresh_host(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
) -> Result<Json<HostRecord>, ApiError> {
    let record = state.registry.get(id).await?;
    state.poller.refresh_one(&record.host).await;
    Ok(Json(state.registry.get(id).await?))
}

/// Kick off a fleet-wide poll without waiting for it.
pub async fn refresh_all(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let hosts = state.registry.hosts().await;
    let count = hosts.len();
    let poller = Arc::clone(&state.poller);
    tokio::spawn(async move {
        poller.poll_all(hosts).await;
    });
    Json(json!({ "message": "fleet poll started", "count": count }))
}

/// Raw passthrough: the unparsed, delimiter-annotated probe output for
/// human troubleshooting. No parsing or classification is involved.
pub async fn raw_probe(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let record = state.registry.get(id).await?;
    let output = fetch_raw(&record.host).await?;
    Ok(Json(json!({ "output": output })))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Settings {
    pub interval_seconds: u64,
}

pub async fn get_settings(State(state): State<SharedState>) -> Json<Settings> {
    Json(Settings {
        interval_seconds: state.registry.interval_seconds().await,
    })
}

/// Update the poll interval. The scheduler reads the interval at the top
/// of each cycle, so the new value applies from the next sweep.
pub async fn put_settings(
    State(state): State<SharedState>,
    Json(settings): Json<Settings>,
) -> Result<Json<Settings>, ApiError> {
    let interval_seconds = state
        .registry
        .set_interval_seconds(settings.interval_seconds)
        .await?;
    info!(interval_seconds, "poll interval updated");
    Ok(Json(Settings { interval_seconds }))
}
