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

use anyhow::{Context, Result};
use clap::Parser;

use drone_rsync::{
    cli::Cli,
    config::PluginInput,
    credentials::default_ssh_dir,
    executor::Deployer,
    ssh::SshRunner,
    transfer::RsyncTransport,
    utils::init_logging,
};

/// Commit the binary was built from, falling back to the package version.
fn build_commit() -> &'static str {
    option_env!("BUILD_COMMIT").unwrap_or(env!("CARGO_PKG_VERSION"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    println!("Drone Rsync Plugin built from {}", build_commit());

    let input = PluginInput::load(cli.payload.as_deref(), cli.input.as_deref())
        .await
        .context("Unable to parse invalid plugin input")?;

    let ssh_dir = cli.ssh_dir.unwrap_or_else(default_ssh_dir);
    tracing::debug!("Staging credentials in {:?}", ssh_dir);

    let deployer = Deployer::new(RsyncTransport, SshRunner::new(), ssh_dir);
    deployer.run(input.vargs, &input.workspace).await?;

    Ok(())
}
