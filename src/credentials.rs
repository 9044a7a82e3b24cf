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

//! Staging of the workspace key for the ssh transport used by rsync.
//!
//! The key is written once, before any host is contacted, as the default
//! identity file of the SSH directory together with a client config that
//! disables strict host key checking. Files are left in place afterwards.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::{home_dir, Keys};
use crate::error::{DeployError, Result};

pub const IDENTITY_FILE: &str = "id_rsa";
pub const CLIENT_CONFIG_FILE: &str = "config";
const CLIENT_CONFIG: &str = "StrictHostKeyChecking no\n";

/// Default SSH directory of the current user (`~/.ssh`).
pub fn default_ssh_dir() -> PathBuf {
    home_dir().join(".ssh")
}

/// Files written by [`stage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedCredential {
    pub identity_file: PathBuf,
    pub config_file: PathBuf,
}

/// Write `keys` into `ssh_dir`.
///
/// Returns `None` without touching the filesystem when no private key was
/// supplied.
pub fn stage(keys: Option<&Keys>, ssh_dir: &Path) -> Result<Option<StagedCredential>> {
    let Some(keys) = keys.filter(|keys| !keys.private.is_empty()) else {
        tracing::debug!("No private key supplied, skipping credential staging");
        return Ok(None);
    };

    create_ssh_dir(ssh_dir)?;

    let config_file = ssh_dir.join(CLIENT_CONFIG_FILE);
    write_secure(&config_file, CLIENT_CONFIG.as_bytes())?;

    let identity_file = ssh_dir.join(IDENTITY_FILE);
    write_secure(&identity_file, keys.private.as_bytes())?;

    tracing::info!(path = %identity_file.display(), "Staged private key");

    Ok(Some(StagedCredential {
        identity_file,
        config_file,
    }))
}

fn create_ssh_dir(path: &Path) -> Result<()> {
    let wrap = |source| DeployError::CredentialWrite {
        path: path.to_path_buf(),
        source,
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;

        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700) // drwx------
            .create(path)
            .map_err(wrap)?;
    }

    #[cfg(not(unix))]
    {
        fs::create_dir_all(path).map_err(wrap)?;
    }

    Ok(())
}

/// Write file with owner-only permissions (0600 on Unix)
fn write_secure(path: &Path, content: &[u8]) -> Result<()> {
    let wrap = |source| DeployError::CredentialWrite {
        path: path.to_path_buf(),
        source,
    };

    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600) // -rw-------
            .open(path)
            .map_err(wrap)?;

        // mode() only applies on creation; tighten files left by earlier runs
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(wrap)?;
        file.write_all(content).map_err(wrap)?;
    }

    #[cfg(not(unix))]
    {
        fs::write(path, content).map_err(wrap)?;
    }

    Ok(())
}
