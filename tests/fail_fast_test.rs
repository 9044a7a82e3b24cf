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

//! Tests for fail-fast host iteration.
//!
//! The first failing host stops the run; hosts after it are never synced
//! and never receive remote commands.

use async_trait::async_trait;
use drone_rsync::config::Keys;
use drone_rsync::{Config, DeployError, Deployer, RemoteRunner, TransferCommand, Transport, Workspace};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Ordered log of everything the driver did, shared by both fakes.
type EventLog = Arc<Mutex<Vec<String>>>;

struct FakeTransport {
    events: EventLog,
    failing_host: Option<&'static str>,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn sync(&self, command: &TransferCommand) -> drone_rsync::Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("sync {}", command.host()));
        if self.failing_host == Some(command.host()) {
            return Err(DeployError::TransferFailed {
                host: command.host().to_string(),
                code: Some(12),
            });
        }
        Ok(())
    }
}

struct FakeRunner {
    events: EventLog,
    failing_host: Option<&'static str>,
}

#[async_trait]
impl RemoteRunner for FakeRunner {
    async fn run(&self, _config: &Config, _credential: &Keys, host: &str) -> drone_rsync::Result<()> {
        self.events.lock().unwrap().push(format!("exec {host}"));
        if self.failing_host == Some(host) {
            return Err(DeployError::RemoteNoExitStatus {
                host: host.to_string(),
            });
        }
        Ok(())
    }
}

fn deployer(
    events: &EventLog,
    ssh_dir: &TempDir,
    failing_sync: Option<&'static str>,
    failing_exec: Option<&'static str>,
) -> Deployer<FakeTransport, FakeRunner> {
    Deployer::new(
        FakeTransport {
            events: Arc::clone(events),
            failing_host: failing_sync,
        },
        FakeRunner {
            events: Arc::clone(events),
            failing_host: failing_exec,
        },
        ssh_dir.path(),
    )
}

fn config(hosts: &[&str], commands: &[&str]) -> Config {
    Config {
        hosts: hosts.iter().map(|h| h.to_string()).collect(),
        target: "/srv".to_string(),
        commands: commands.iter().map(|c| c.to_string()).collect(),
        ..Config::default()
    }
}

fn workspace() -> Workspace {
    Workspace {
        path: "/drone/src".into(),
        keys: Some(Keys::new("private key")),
    }
}

#[tokio::test]
async fn test_all_hosts_succeed_in_order() {
    let events = EventLog::default();
    let ssh_dir = TempDir::new().unwrap();

    deployer(&events, &ssh_dir, None, None)
        .run(config(&["h1", "h2", "h3"], &["uptime"]), &workspace())
        .await
        .unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        vec!["sync h1", "exec h1", "sync h2", "exec h2", "sync h3", "exec h3"]
    );
}

#[tokio::test]
async fn test_transfer_failure_stops_remaining_hosts() {
    let events = EventLog::default();
    let ssh_dir = TempDir::new().unwrap();

    let err = deployer(&events, &ssh_dir, Some("h1"), None)
        .run(config(&["h1", "h2"], &["uptime"]), &workspace())
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::TransferFailed { code: Some(12), .. }));
    assert_eq!(err.host(), Some("h1"));
    assert_eq!(*events.lock().unwrap(), vec!["sync h1"]);
}

#[tokio::test]
async fn test_remote_failure_stops_remaining_hosts() {
    let events = EventLog::default();
    let ssh_dir = TempDir::new().unwrap();

    let err = deployer(&events, &ssh_dir, None, Some("h2"))
        .run(config(&["h1", "h2", "h3"], &["uptime"]), &workspace())
        .await
        .unwrap_err();

    assert_eq!(err.host(), Some("h2"));
    assert_eq!(
        *events.lock().unwrap(),
        vec!["sync h1", "exec h1", "sync h2", "exec h2"]
    );
}

#[tokio::test]
async fn test_failure_on_last_host_still_reported() {
    let events = EventLog::default();
    let ssh_dir = TempDir::new().unwrap();

    let err = deployer(&events, &ssh_dir, Some("h2"), None)
        .run(config(&["h1", "h2"], &[]), &workspace())
        .await
        .unwrap_err();

    assert_eq!(err.host(), Some("h2"));
    assert_eq!(*events.lock().unwrap(), vec!["sync h1", "sync h2"]);
}
