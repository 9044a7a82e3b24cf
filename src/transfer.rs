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

//! rsync invocation building and execution.
//!
//! [`TransferCommand::build`] turns the sync settings into the exact argument
//! vector for one host:
//!
//! ```text
//! rsync -az [-r] [--del] -e "ssh -p <port> -o ..." [--include=P]* [--exclude=P]* [--filter=P]* <src>... <user>@<host>:<target>
//! ```
//!
//! Arguments are never quoted; the vector is executed directly, not through
//! a shell.

use async_trait::async_trait;
use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::config::Config;
use crate::error::{DeployError, Result};
use crate::source;

const RSYNC_PROGRAM: &str = "rsync";

/// Archive mode plus compression.
const ARCHIVE_FLAGS: &str = "-az";

/// Host key options passed to the ssh transport. CI runners are ephemeral,
/// so host keys are neither persisted nor prompted for.
const SSH_TRANSPORT_OPTIONS: &str =
    "-o UserKnownHostsFile=/dev/null -o LogLevel=quiet -o StrictHostKeyChecking=no";

/// A fully resolved rsync invocation for a single host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCommand {
    host: String,
    program: String,
    args: Vec<OsString>,
}

impl TransferCommand {
    /// Assemble the rsync invocation that syncs `config.source` to `host`.
    ///
    /// Defaults are not applied here; callers pass a config that already
    /// went through [`Config::apply_defaults`].
    pub fn build(config: &Config, host: &str, root: &Path) -> Self {
        let mut args: Vec<OsString> = vec![ARCHIVE_FLAGS.into()];

        if config.recursive {
            args.push("-r".into());
        }
        if config.delete {
            args.push("--del".into());
        }

        args.push("-e".into());
        args.push(ssh_transport(config.port).into());

        args.extend(config.include.iter().map(|p| format!("--include={p}").into()));
        args.extend(config.exclude.iter().map(|p| format!("--exclude={p}").into()));
        args.extend(config.filter.iter().map(|p| format!("--filter={p}").into()));

        args.extend(source::resolve(&config.source, root));
        args.push(destination(&config.user, host, &config.target).into());

        Self {
            host: host.to_string(),
            program: RSYNC_PROGRAM.to_string(),
            args,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Program name followed by its arguments.
    pub fn argv(&self) -> Vec<OsString> {
        std::iter::once(OsString::from(&self.program))
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// The destination argument (`user@host:target`).
    pub fn destination(&self) -> &str {
        self.args
            .last()
            .and_then(|arg| arg.to_str())
            .unwrap_or_default()
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        command
    }
}

/// Trace form used in build logs: arguments joined by spaces, unquoted.
impl fmt::Display for TransferCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

fn ssh_transport(port: u16) -> String {
    format!("ssh -p {port} {SSH_TRANSPORT_OPTIONS}")
}

fn destination(user: &str, host: &str, target: &str) -> String {
    format!("{user}@{host}:{target}")
}

/// Executes transfer commands.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Run `command` to completion; any unsuccessful outcome is an error.
    async fn sync(&self, command: &TransferCommand) -> Result<()>;
}

/// Runs rsync as a child process with the build log attached to its output.
#[derive(Debug, Default, Clone, Copy)]
pub struct RsyncTransport;

#[async_trait]
impl Transport for RsyncTransport {
    async fn sync(&self, command: &TransferCommand) -> Result<()> {
        let status = command
            .to_command()
            .status()
            .await
            .map_err(|source| DeployError::TransferSpawn {
                host: command.host().to_string(),
                program: command.program().to_string(),
                source,
            })?;

        if !status.success() {
            return Err(DeployError::TransferFailed {
                host: command.host().to_string(),
                code: status.code(),
            });
        }

        tracing::debug!("Transfer to {} completed", command.host());
        Ok(())
    }
}
