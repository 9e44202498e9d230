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

//! Remote command execution over SSH.
//!
//! One executor per host-poll task. Establishing the session is bounded by
//! the connect timeout and every command by the command timeout; a session
//! that cannot be established maps to [`Error::ConnectionFailed`] and an
//! established session whose command raises or times out maps to
//! [`Error::CommandFailed`]. Callers close the session on every exit path.

use std::sync::Arc;
use std::time::Duration;

use russh::client;
use russh_keys::key::PublicKey;
use tokio::net::TcpStream;

use crate::common::config::AppConfig;
use crate::error::{Error, Result};
use crate::remote::script::probe_script;

/// Output of one remote command.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<u32>,
}

/// russh client handler. Host keys are accepted as supplied: fleet hosts
/// are registered by an operator, not discovered.
struct ProbeHandler;

#[async_trait::async_trait]
impl client::Handler for ProbeHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Connects to one host and executes commands under bounded timeouts.
pub struct RemoteExecutor {
    address: String,
    port: u16,
    username: String,
    password: String,
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl RemoteExecutor {
    pub fn new(address: &str, port: u16, username: &str, password: &str) -> Self {
        Self {
            address: address.to_string(),
            port,
            username: username.to_string(),
            password: password.to_string(),
            connect_timeout: Duration::from_secs(AppConfig::CONNECT_TIMEOUT_SECS),
            command_timeout: Duration::from_secs(AppConfig::COMMAND_TIMEOUT_SECS),
        }
    }

    /// Open an authenticated session to the host.
    pub async fn connect(&self) -> Result<RemoteSession> {
        let config = Arc::new(client::Config {
            inactivity_timeout: Some(self.command_timeout),
            ..Default::default()
        });

        let stream = tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect((self.address.as_str(), self.port)),
        )
        .await
        .map_err(|_| {
            Error::ConnectionFailed(format!(
                "connect to {}:{} timed out after {}s",
                self.address,
                self.port,
                self.connect_timeout.as_secs()
            ))
        })?
        .map_err(|e| Error::ConnectionFailed(format!("{}:{}: {e}", self.address, self.port)))?;

        let mut handle = client::connect_stream(config, stream, ProbeHandler)
            .await
            .map_err(|e| Error::ConnectionFailed(format!("SSH handshake failed: {e}")))?;

        let authenticated = handle
            .authenticate_password(&self.username, &self.password)
            .await
            .map_err(|e| Error::ConnectionFailed(format!("authentication error: {e}")))?;
        if !authenticated {
            return Err(Error::ConnectionFailed(format!(
                "authentication failed for user '{}'",
                self.username
            )));
        }

        Ok(RemoteSession {
            handle,
            command_timeout: self.command_timeout,
        })
    }

    /// Connect, run the combined probe script, and close the session,
    /// returning the unparsed delimiter-annotated stdout. Used by the
    /// diagnostic raw-passthrough surface and by `check_host`.
    pub async fn probe_raw(&self) -> Result<ExecOutput> {
        let session = self.connect().await?;
        let result = session.exec(&probe_script()).await;
        session.close().await;
        result
    }
}

/// An authenticated session on one host.
pub struct RemoteSession {
    handle: client::Handle<ProbeHandler>,
    command_timeout: Duration,
}

impl std::fmt::Debug for RemoteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSession")
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

impl RemoteSession {
    /// Execute one command, collecting stdout/stderr until the channel
    /// closes or the command timeout fires.
    pub async fn exec(&self, command: &str) -> Result<ExecOutput> {
        tokio::time::timeout(self.command_timeout, self.exec_inner(command))
            .await
            .map_err(|_| {
                Error::CommandFailed(format!(
                    "command timed out after {}s",
                    self.command_timeout.as_secs()
                ))
            })?
    }

    async fn exec_inner(&self, command: &str) -> Result<ExecOutput> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandFailed(format!("channel open failed: {e}")))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::CommandFailed(format!("exec failed: {e}")))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;

        loop {
            match channel.wait().await {
                Some(russh::ChannelMsg::Data { data }) => {
                    stdout.extend_from_slice(&data);
                }
                Some(russh::ChannelMsg::ExtendedData { data, ext }) => {
                    if ext == 1 {
                        stderr.extend_from_slice(&data);
                    }
                }
                Some(russh::ChannelMsg::ExitStatus { exit_status }) => {
                    exit_code = Some(exit_status);
                }
                Some(russh::ChannelMsg::Eof) => {}
                Some(russh::ChannelMsg::Close) | None => break,
                _ => {}
            }
        }

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            exit_code,
        })
    }

    /// Close the session. Best effort: a host that dropped the connection
    /// mid-poll has nothing left to close.
    pub async fn close(self) {
        let _ = self
            .handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await;
    }
}
