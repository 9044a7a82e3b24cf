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
//! One connection and exactly one session channel per host. All configured
//! commands are joined with newlines and executed as a single script, so
//! `cd`, exported variables and alike carry over from one line to the next.
//! Remote stdout/stderr are streamed to the local stdout/stderr as they
//! arrive.

use async_trait::async_trait;
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKey, PrivateKeyWithHashAlg};
use russh::{Channel, ChannelMsg, Disconnect};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::handler::ClientHandler;
use crate::config::{Config, Keys};
use crate::error::{DeployError, Result};

/// Executes the post-sync commands on a host.
#[async_trait]
pub trait RemoteRunner: Send + Sync {
    /// Run `config.commands` on `host`, authenticating with `credential`.
    async fn run(&self, config: &Config, credential: &Keys, host: &str) -> Result<()>;
}

/// [`RemoteRunner`] backed by russh.
#[derive(Clone)]
pub struct SshRunner {
    client_config: Arc<client::Config>,
}

impl SshRunner {
    pub fn new() -> Self {
        Self {
            client_config: Arc::new(client::Config::default()),
        }
    }

    /// Run `script` on `host` and forward its output to `stdout` / `stderr`.
    ///
    /// The connection is closed before returning, whatever the outcome.
    pub async fn exec<O, E>(
        &self,
        config: &Config,
        credential: &Keys,
        host: &str,
        script: &str,
        stdout: &mut O,
        stderr: &mut E,
    ) -> Result<()>
    where
        O: AsyncWrite + Unpin + Send,
        E: AsyncWrite + Unpin + Send,
    {
        let addr = join_host_port(host, config.port);

        // Trace for the build log
        println!("$ ssh {}@{} -p {}", config.user, addr, config.port);

        let key = parse_private_key(&credential.private)?;
        let handle = self.connect(host, &addr, &config.user, key).await?;

        let outcome = execute(&handle, host, script, stdout, stderr).await;

        if let Err(e) = handle
            .disconnect(Disconnect::ByApplication, "", "")
            .await
        {
            tracing::debug!("Failed to disconnect from {}: {}", addr, e);
        }

        outcome
    }

    /// Connect to `addr` and authenticate as `user` with `key`.
    async fn connect(
        &self,
        host: &str,
        addr: &str,
        user: &str,
        key: PrivateKey,
    ) -> Result<Handle<ClientHandler>> {
        let dial_error = |source| DeployError::Dial {
            addr: addr.to_string(),
            source,
        };

        let mut handle = client::connect(
            self.client_config.clone(),
            addr,
            ClientHandler::new(host),
        )
        .await
        .map_err(dial_error)?;

        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .map_err(dial_error)?
            .flatten();
        let auth = handle
            .authenticate_publickey(user, PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg))
            .await
            .map_err(dial_error)?;

        if !auth.success() {
            return Err(DeployError::AuthRejected {
                addr: addr.to_string(),
                user: user.to_string(),
            });
        }

        tracing::debug!("Connected and authenticated to {} as {}", addr, user);
        Ok(handle)
    }
}

impl Default for SshRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SshRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshRunner")
            .field("client_config", &"russh::client::Config")
            .finish()
    }
}

#[async_trait]
impl RemoteRunner for SshRunner {
    async fn run(&self, config: &Config, credential: &Keys, host: &str) -> Result<()> {
        let script = join_commands(&config.commands);
        self.exec(
            config,
            credential,
            host,
            &script,
            &mut tokio::io::stdout(),
            &mut tokio::io::stderr(),
        )
        .await
    }
}

/// Decode a PEM or OpenSSH encoded private key.
pub fn parse_private_key(pem: &str) -> Result<PrivateKey> {
    russh::keys::decode_secret_key(pem, None).map_err(|source| DeployError::KeyParse { source })
}

/// `host:port`, with IPv6 literals bracketed.
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Script body executed on the remote host.
pub fn join_commands(commands: &[String]) -> String {
    commands.join("\n")
}

/// Open the session channel, run `script` and close the channel again,
/// whatever the outcome.
async fn execute<O, E>(
    handle: &Handle<ClientHandler>,
    host: &str,
    script: &str,
    stdout: &mut O,
    stderr: &mut E,
) -> Result<()>
where
    O: AsyncWrite + Unpin + Send,
    E: AsyncWrite + Unpin + Send,
{
    let mut channel =
        handle
            .channel_open_session()
            .await
            .map_err(|source| DeployError::SessionOpen {
                host: host.to_string(),
                source,
            })?;

    let outcome = run_script(&mut channel, host, script, stdout, stderr).await;

    if let Err(e) = channel.close().await {
        tracing::debug!("Failed to close session on {}: {}", host, e);
    }

    outcome
}

async fn run_script<O, E>(
    channel: &mut Channel<Msg>,
    host: &str,
    script: &str,
    stdout: &mut O,
    stderr: &mut E,
) -> Result<()>
where
    O: AsyncWrite + Unpin + Send,
    E: AsyncWrite + Unpin + Send,
{
    channel
        .exec(true, script)
        .await
        .map_err(|source| DeployError::RemoteExec {
            host: host.to_string(),
            source,
        })?;

    let mut exit_status: Option<u32> = None;

    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { ref data } => forward(stdout, data).await,
            ChannelMsg::ExtendedData { ref data, ext } if ext == 1 => {
                forward(stderr, data).await
            }
            // Output may still follow the exit status; keep reading until
            // the channel closes.
            ChannelMsg::ExitStatus {
                exit_status: status,
            } => exit_status = Some(status),
            _ => {}
        }
    }

    match exit_status {
        Some(0) => {
            tracing::debug!("Remote commands on {} completed", host);
            Ok(())
        }
        Some(status) => Err(DeployError::RemoteExit {
            host: host.to_string(),
            status,
        }),
        None => Err(DeployError::RemoteNoExitStatus {
            host: host.to_string(),
        }),
    }
}

async fn forward<W: AsyncWrite + Unpin>(writer: &mut W, data: &[u8]) {
    if let Err(e) = writer.write_all(data).await {
        tracing::warn!("Failed to forward remote output: {}", e);
        return;
    }
    if let Err(e) = writer.flush().await {
        tracing::warn!("Failed to flush remote output: {}", e);
    }
}
