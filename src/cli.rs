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

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "drone-rsync",
    version,
    about = "Drone plugin to sync files to remote hosts with rsync and run commands over SSH",
    long_about = "drone-rsync syncs build artifacts from the workspace to one or more hosts with rsync,\nthen optionally runs a list of shell commands on each host over SSH.\nHosts are processed one at a time; the first failure aborts the run.",
    after_help = "EXAMPLES:\n  Payload as argument:   drone-rsync '{\"workspace\":{\"path\":\"/drone/src\"},\"vargs\":{\"host\":\"example.com\",\"target\":\"/var/www\"}}'\n  Payload from a file:   drone-rsync -i payload.json\n  Payload from stdin:    drone-rsync < payload.json"
)]
pub struct Cli {
    #[arg(
        help = "Plugin payload as JSON\nRead from --input or standard input when omitted",
        conflicts_with = "input"
    )]
    pub payload: Option<String>,

    #[arg(short = 'i', long, help = "Read the plugin payload from a file")]
    pub input: Option<PathBuf>,

    #[arg(
        long,
        env = "DRONE_RSYNC_SSH_DIR",
        help = "Directory the private key and SSH client config are written to [default: ~/.ssh]"
    )]
    pub ssh_dir: Option<PathBuf>,

    #[arg(
        short = 'v',
        long,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,
}
