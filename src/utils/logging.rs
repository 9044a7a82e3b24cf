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

use tracing_subscriber::EnvFilter;

/// Create an environment filter based on verbosity level
pub fn create_env_filter(verbosity: u8) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(verbosity_directives(verbosity))
    }
}

fn verbosity_directives(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "drone_rsync=warn",
        1 => "drone_rsync=info",
        // -vv: include russh debug logs for SSH troubleshooting
        2 => "drone_rsync=debug,russh=debug",
        _ => "drone_rsync=trace,russh=trace",
    }
}

/// Initialize logging to stderr.
///
/// Stdout is reserved for the build log (command traces and the output of
/// rsync and remote commands).
pub fn init_logging(verbosity: u8) {
    let filter = create_env_filter(verbosity);

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_verbosity_directives() {
        assert_eq!(verbosity_directives(0), "drone_rsync=warn");
        assert_eq!(verbosity_directives(1), "drone_rsync=info");
        assert_eq!(verbosity_directives(2), "drone_rsync=debug,russh=debug");
        assert_eq!(verbosity_directives(3), "drone_rsync=trace,russh=trace");
        assert_eq!(verbosity_directives(9), "drone_rsync=trace,russh=trace");
    }

    #[test]
    #[serial]
    fn test_create_env_filter() {
        let original = std::env::var("RUST_LOG").ok();
        std::env::remove_var("RUST_LOG");

        assert_eq!(create_env_filter(1).to_string(), "drone_rsync=info");

        std::env::set_var("RUST_LOG", "russh=trace");
        assert_eq!(create_env_filter(0).to_string(), "russh=trace");

        match original {
            Some(value) => std::env::set_var("RUST_LOG", value),
            None => std::env::remove_var("RUST_LOG"),
        }
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging(0);
        init_logging(2);
    }
}
