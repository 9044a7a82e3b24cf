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

//! Configuration type definitions.

use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::PathBuf;
use zeroize::Zeroizing;

pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_USER: &str = "root";
pub const DEFAULT_SOURCE: &str = "./";

/// Plugin payload handed over by the CI runner.
///
/// Only the `workspace` and `vargs` sections are used; the runner also sends
/// `repo`, `build`, `system` and friends, which are ignored.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct PluginInput {
    #[serde(default)]
    pub workspace: Workspace,

    #[serde(default)]
    pub vargs: Config,
}

/// Build workspace shared by every host in the run.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Workspace {
    /// Workspace root; relative sources are resolved against it.
    #[serde(default)]
    pub path: PathBuf,

    #[serde(default)]
    pub keys: Option<Keys>,
}

impl Workspace {
    /// The private key, if one was supplied and is non-empty.
    pub fn credential(&self) -> Option<&Keys> {
        self.keys.as_ref().filter(|keys| !keys.private.is_empty())
    }
}

/// Key pair attached to the workspace.
#[derive(Deserialize, Clone, PartialEq, Eq)]
pub struct Keys {
    #[serde(default)]
    pub public: String,

    /// PEM or OpenSSH encoded private key
    #[serde(default = "empty_secret")]
    pub private: Zeroizing<String>,
}

impl Keys {
    pub fn new(private: impl Into<String>) -> Self {
        Self {
            public: String::new(),
            private: Zeroizing::new(private.into()),
        }
    }
}

impl fmt::Debug for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keys")
            .field("public", &self.public)
            .field("private", &"<redacted>")
            .finish()
    }
}

fn empty_secret() -> Zeroizing<String> {
    Zeroizing::new(String::new())
}

/// Sync settings (the `vargs` section of the payload).
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Destination hosts in execution order. Duplicates are synced twice.
    #[serde(rename = "host", default, deserialize_with = "string_or_list")]
    pub hosts: Vec<String>,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub port: u16,

    /// Single path or glob pattern, absolute or relative to the workspace.
    #[serde(default)]
    pub source: String,

    /// Destination path on the remote host, used verbatim.
    #[serde(default)]
    pub target: String,

    #[serde(default)]
    pub delete: bool,

    #[serde(default)]
    pub recursive: bool,

    #[serde(default, deserialize_with = "string_or_list")]
    pub include: Vec<String>,

    #[serde(default, deserialize_with = "string_or_list")]
    pub exclude: Vec<String>,

    #[serde(default, deserialize_with = "string_or_list")]
    pub filter: Vec<String>,

    /// Shell lines run on each host after a successful sync.
    #[serde(default)]
    pub commands: Vec<String>,
}

/// Accepts `"a"`, `["a", "b"]` or `null`.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        One(String),
        Many(Vec<String>),
    }

    Ok(
        match Option::<StringOrList>::deserialize(deserializer)? {
            Some(StringOrList::One(value)) => vec![value],
            Some(StringOrList::Many(values)) => values,
            None => Vec::new(),
        },
    )
}
