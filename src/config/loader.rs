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

//! Payload loading, defaulting and validation.

use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;

use super::types::{Config, PluginInput, DEFAULT_PORT, DEFAULT_SOURCE, DEFAULT_USER};
use super::utils::expand_tilde;
use crate::error::DeployError;

impl PluginInput {
    /// Decode a payload from its JSON text.
    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).context("Failed to decode plugin payload as JSON")
    }

    /// Load the payload from, in order of priority:
    /// 1. An inline JSON argument
    /// 2. A payload file
    /// 3. Standard input
    pub async fn load(inline: Option<&str>, file: Option<&Path>) -> Result<Self> {
        if let Some(payload) = inline {
            tracing::debug!("Reading plugin payload from command line argument");
            return Self::from_json(payload);
        }

        if let Some(path) = file {
            let path = expand_tilde(path);
            tracing::debug!("Reading plugin payload from {:?}", path);
            let content = fs::read_to_string(&path).await.with_context(|| {
                format!("Failed to read plugin payload at {}", path.display())
            })?;
            return Self::from_json(&content);
        }

        tracing::debug!("Reading plugin payload from stdin");
        let mut content = String::new();
        tokio::io::stdin()
            .read_to_string(&mut content)
            .await
            .context("Failed to read plugin payload from stdin")?;
        Self::from_json(&content)
    }
}

impl Config {
    /// Fill in `port`, `user` and `source` when they were left unset.
    pub fn apply_defaults(&mut self) {
        if self.port == 0 {
            self.port = DEFAULT_PORT;
        }
        if self.user.is_empty() {
            self.user = DEFAULT_USER.to_string();
        }
        if self.source.is_empty() {
            self.source = DEFAULT_SOURCE.to_string();
        }
    }

    /// Same as [`Config::apply_defaults`], consuming and returning the config.
    pub fn with_defaults(mut self) -> Self {
        self.apply_defaults();
        self
    }

    /// Reject settings that cannot run to completion.
    ///
    /// Remote commands need a key to authenticate with; without one the
    /// remote phase would be unreachable, so the run is refused up front.
    pub fn validate(&self, has_credential: bool) -> Result<(), DeployError> {
        if !self.commands.is_empty() && !has_credential {
            return Err(DeployError::invalid_config(
                "commands are configured but no private key was supplied",
            ));
        }
        if self.hosts.iter().any(|host| host.trim().is_empty()) {
            return Err(DeployError::invalid_config("host entries must not be empty"));
        }
        Ok(())
    }
}
