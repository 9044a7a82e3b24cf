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

//! Host iteration.
//!
//! Hosts are processed strictly one after another in configuration order.
//! For each host the sources are synced first and the remote commands run
//! afterwards; the first failure stops the whole run and later hosts are
//! never contacted.

use std::path::PathBuf;

use crate::config::{Config, Workspace};
use crate::credentials;
use crate::error::Result;
use crate::ssh::RemoteRunner;
use crate::transfer::{TransferCommand, Transport};

/// Drives a deployment across all configured hosts.
pub struct Deployer<T, R> {
    transport: T,
    remote: R,
    ssh_dir: PathBuf,
}

impl<T: Transport, R: RemoteRunner> Deployer<T, R> {
    /// `ssh_dir` is where the workspace key is staged for the rsync
    /// transport, normally `~/.ssh`.
    pub fn new(transport: T, remote: R, ssh_dir: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            remote,
            ssh_dir: ssh_dir.into(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Sync and run commands on every host, stopping at the first failure.
    pub async fn run(&self, mut config: Config, workspace: &Workspace) -> Result<()> {
        let credential = workspace.credential();

        config.validate(credential.is_some())?;
        config.apply_defaults();

        credentials::stage(credential, &self.ssh_dir)?;

        if config.hosts.is_empty() {
            tracing::warn!("No hosts configured, nothing to do");
            return Ok(());
        }

        for host in &config.hosts {
            tracing::info!("Deploying to {}", host);

            let command = TransferCommand::build(&config, host, &workspace.path);

            // Trace for the build log
            println!("$ {command}");
            self.transport.sync(&command).await?;

            if config.commands.is_empty() {
                continue;
            }

            // validate() guarantees a credential whenever commands are set
            if let Some(keys) = credential {
                self.remote.run(&config, keys, host).await?;
            }
        }

        tracing::info!("Deployed to {} host(s)", config.hosts.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Keys;
    use crate::error::DeployError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingTransport {
        synced: Mutex<Vec<TransferCommand>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn sync(&self, command: &TransferCommand) -> Result<()> {
            self.synced.lock().unwrap().push(command.clone());
            if self.fail_on.as_deref() == Some(command.host()) {
                return Err(DeployError::TransferFailed {
                    host: command.host().to_string(),
                    code: Some(23),
                });
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingRunner {
        runs: Mutex<Vec<(String, String)>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl RemoteRunner for RecordingRunner {
        async fn run(&self, config: &Config, _credential: &Keys, host: &str) -> Result<()> {
            self.runs
                .lock()
                .unwrap()
                .push((host.to_string(), config.commands.join("\n")));
            if self.fail_on.as_deref() == Some(host) {
                return Err(DeployError::RemoteExit {
                    host: host.to_string(),
                    status: 1,
                });
            }
            Ok(())
        }
    }

    fn hosts(names: &[&str]) -> Vec<String> {
        names.iter().map(|h| h.to_string()).collect()
    }

    fn workspace(with_key: bool) -> Workspace {
        Workspace {
            path: PathBuf::from("/drone/src"),
            keys: with_key.then(|| Keys::new("private key")),
        }
    }

    fn synced_hosts(transport: &RecordingTransport) -> Vec<String> {
        transport
            .synced
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.host().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_fail_fast_on_transfer_failure() {
        let temp_dir = TempDir::new().unwrap();
        let transport = RecordingTransport {
            fail_on: Some("h1".to_string()),
            ..Default::default()
        };
        let deployer = Deployer::new(transport, RecordingRunner::default(), temp_dir.path());
        let config = Config {
            hosts: hosts(&["h1", "h2"]),
            commands: vec!["uptime".to_string()],
            ..Config::default()
        };

        let err = deployer.run(config, &workspace(true)).await.unwrap_err();

        assert_eq!(err.host(), Some("h1"));
        assert_eq!(synced_hosts(deployer.transport()), vec!["h1"]);
        assert!(deployer.remote().runs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fail_fast_on_remote_failure() {
        let temp_dir = TempDir::new().unwrap();
        let runner = RecordingRunner {
            fail_on: Some("h1".to_string()),
            ..Default::default()
        };
        let deployer = Deployer::new(RecordingTransport::default(), runner, temp_dir.path());
        let config = Config {
            hosts: hosts(&["h1", "h2"]),
            commands: vec!["uptime".to_string()],
            ..Config::default()
        };

        let err = deployer.run(config, &workspace(true)).await.unwrap_err();

        assert!(matches!(err, DeployError::RemoteExit { status: 1, .. }));
        assert_eq!(synced_hosts(deployer.transport()), vec!["h1"]);
        assert_eq!(deployer.remote().runs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_every_host_in_order_including_duplicates() {
        let temp_dir = TempDir::new().unwrap();
        let deployer = Deployer::new(
            RecordingTransport::default(),
            RecordingRunner::default(),
            temp_dir.path(),
        );
        let config = Config {
            hosts: hosts(&["web1", "web2", "web1"]),
            target: "/srv/app".to_string(),
            commands: vec!["cd /srv/app".to_string(), "./restart.sh".to_string()],
            ..Config::default()
        };

        deployer.run(config, &workspace(true)).await.unwrap();

        assert_eq!(synced_hosts(deployer.transport()), vec!["web1", "web2", "web1"]);
        assert_eq!(
            *deployer.remote().runs.lock().unwrap(),
            vec![
                ("web1".to_string(), "cd /srv/app\n./restart.sh".to_string()),
                ("web2".to_string(), "cd /srv/app\n./restart.sh".to_string()),
                ("web1".to_string(), "cd /srv/app\n./restart.sh".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_remote_phase_skipped_without_commands() {
        let temp_dir = TempDir::new().unwrap();
        let deployer = Deployer::new(
            RecordingTransport::default(),
            RecordingRunner::default(),
            temp_dir.path(),
        );
        let config = Config {
            hosts: hosts(&["h1", "h2"]),
            ..Config::default()
        };

        deployer.run(config, &workspace(true)).await.unwrap();

        assert_eq!(synced_hosts(deployer.transport()), vec!["h1", "h2"]);
        assert!(deployer.remote().runs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_defaults_applied_before_build() {
        let temp_dir = TempDir::new().unwrap();
        let deployer = Deployer::new(
            RecordingTransport::default(),
            RecordingRunner::default(),
            temp_dir.path(),
        );
        let config = Config {
            hosts: hosts(&["example.com"]),
            target: "/var/www".to_string(),
            ..Config::default()
        };

        let workspace = Workspace {
            path: temp_dir.path().to_path_buf(),
            keys: None,
        };

        deployer.run(config, &workspace).await.unwrap();

        let synced = deployer.transport().synced.lock().unwrap();
        let args = synced[0].args();
        assert_eq!(
            args[2],
            "ssh -p 22 -o UserKnownHostsFile=/dev/null -o LogLevel=quiet -o StrictHostKeyChecking=no"
        );
        assert_eq!(synced[0].destination(), "root@example.com:/var/www");
        // "./" resolves to the workspace root, trailing separator kept
        assert_eq!(args[3].to_str(), Some(format!("{}/", temp_dir.path().display()).as_str()));
    }

    #[tokio::test]
    async fn test_commands_without_key_rejected_up_front() {
        let temp_dir = TempDir::new().unwrap();
        let ssh_dir = temp_dir.path().join(".ssh");
        let deployer = Deployer::new(
            RecordingTransport::default(),
            RecordingRunner::default(),
            &ssh_dir,
        );
        let config = Config {
            hosts: hosts(&["h1"]),
            commands: vec!["uptime".to_string()],
            ..Config::default()
        };

        let err = deployer.run(config, &workspace(false)).await.unwrap_err();

        assert!(matches!(err, DeployError::InvalidConfig { .. }));
        assert!(synced_hosts(deployer.transport()).is_empty());
        assert!(!ssh_dir.exists());
    }

    #[tokio::test]
    async fn test_key_staged_once_before_first_host() {
        let temp_dir = TempDir::new().unwrap();
        let ssh_dir = temp_dir.path().join(".ssh");
        let deployer = Deployer::new(
            RecordingTransport::default(),
            RecordingRunner::default(),
            &ssh_dir,
        );
        let config = Config {
            hosts: hosts(&["h1", "h2"]),
            ..Config::default()
        };

        deployer.run(config, &workspace(true)).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(ssh_dir.join(credentials::IDENTITY_FILE)).unwrap(),
            "private key"
        );
    }

    #[tokio::test]
    async fn test_no_hosts_is_a_no_op() {
        let temp_dir = TempDir::new().unwrap();
        let deployer = Deployer::new(
            RecordingTransport::default(),
            RecordingRunner::default(),
            temp_dir.path(),
        );

        deployer
            .run(Config::default(), &workspace(false))
            .await
            .unwrap();

        assert!(synced_hosts(deployer.transport()).is_empty());
    }
}
