pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod executor;
pub mod source;
pub mod ssh;
pub mod transfer;
pub mod utils;

pub use cli::Cli;
pub use config::{Config, PluginInput, Workspace};
pub use error::{DeployError, Result};
pub use executor::Deployer;
pub use ssh::{RemoteRunner, SshRunner};
pub use transfer::{RsyncTransport, TransferCommand, Transport};
