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

//! Error types for a deployment run.
//!
//! Every variant names the stage that failed so build logs can tell the
//! categories apart:
//!
//! - configuration: [`DeployError::InvalidConfig`]
//! - credential staging: [`DeployError::CredentialWrite`]
//! - transfer: [`DeployError::TransferSpawn`], [`DeployError::TransferFailed`]
//! - key parsing: [`DeployError::KeyParse`]
//! - connection: [`DeployError::Dial`], [`DeployError::AuthRejected`]
//! - remote execution: [`DeployError::SessionOpen`], [`DeployError::RemoteExec`],
//!   [`DeployError::RemoteExit`], [`DeployError::RemoteNoExitStatus`]

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a deployment run.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Configuration rejected before anything was executed
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Key material could not be staged on disk
    #[error("credential write failed for {path}: {source}")]
    CredentialWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The rsync process could not be started
    #[error("transfer to {host} failed to start '{program}': {source}")]
    TransferSpawn {
        host: String,
        program: String,
        #[source]
        source: io::Error,
    },

    /// The rsync process exited unsuccessfully
    #[error("transfer to {host} failed: {}", exit_description(.code))]
    TransferFailed { host: String, code: Option<i32> },

    /// The private key could not be decoded
    #[error("key parse failure: {source}")]
    KeyParse {
        #[source]
        source: russh::keys::Error,
    },

    /// TCP connection or SSH handshake failed
    #[error("dial failure for {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: russh::Error,
    },

    /// The server refused the public key
    #[error("dial failure for {addr}: public key authentication rejected for user '{user}'")]
    AuthRejected { addr: String, user: String },

    /// A session channel could not be opened on an established connection
    #[error("session open failure on {host}: {source}")]
    SessionOpen {
        host: String,
        #[source]
        source: russh::Error,
    },

    /// The remote script could not be started on an open session
    #[error("remote execution failure on {host}: {source}")]
    RemoteExec {
        host: String,
        #[source]
        source: russh::Error,
    },

    /// The remote script exited with a non-zero status
    #[error("remote commands on {host} exited with status {status}")]
    RemoteExit { host: String, status: u32 },

    /// The channel closed without reporting an exit status
    #[error("remote commands on {host} ended without an exit status")]
    RemoteNoExitStatus { host: String },
}

impl DeployError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Host the failure is attributed to, if it happened inside the host loop.
    pub fn host(&self) -> Option<&str> {
        match self {
            Self::TransferSpawn { host, .. }
            | Self::TransferFailed { host, .. }
            | Self::SessionOpen { host, .. }
            | Self::RemoteExec { host, .. }
            | Self::RemoteExit { host, .. }
            | Self::RemoteNoExitStatus { host } => Some(host),
            Self::Dial { addr, .. } | Self::AuthRejected { addr, .. } => Some(addr),
            Self::InvalidConfig { .. } | Self::CredentialWrite { .. } | Self::KeyParse { .. } => {
                None
            }
        }
    }
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("rsync exited with status {code}"),
        None => "rsync was terminated by a signal".to_string(),
    }
}

/// Result type for deployment operations
pub type Result<T> = std::result::Result<T, DeployError>;
