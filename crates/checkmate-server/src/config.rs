//! Server configuration.

use std::time::Duration;

use checkmate_core::config::{
    DEFAULT_HEARTBEAT_INTERVAL_SECS, DEFAULT_SINGLE_USE_LENGTH, DEFAULT_TIMED_LENGTH,
    DEFAULT_WRITE_TIMEOUT_SECS,
};
use checkmate_core::{ContinuityConfig, CredentialConfig};
use clap::Parser;

use crate::error::{Error, Result};

/// Default lifespan of a credential issued by the add-user stream.
pub const DEFAULT_ADD_USER_LIFESPAN_SECS: u64 = 30;

/// Checkmate server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Heartbeat and delivery settings shared by every feed registry.
    pub continuity: ContinuityConfig,

    /// Secret lengths and default lifespans for ephemeral credentials.
    pub credentials: CredentialConfig,

    /// Lifespan of each credential issued by the add-user stream.
    pub add_user_lifespan: Duration,

    /// Issue a bootstrap credential when the account store is empty.
    pub bootstrap: bool,

    /// Fixed bootstrap secret instead of a random one.
    pub bootstrap_secret: Option<String>,
}

impl ServerConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            continuity: ContinuityConfig::default(),
            credentials: CredentialConfig::default(),
            add_user_lifespan: Duration::from_secs(DEFAULT_ADD_USER_LIFESPAN_SECS),
            bootstrap: true,
            bootstrap_secret: None,
        }
    }

    /// Set the feed registry configuration.
    pub fn with_continuity(mut self, continuity: ContinuityConfig) -> Self {
        self.continuity = continuity;
        self
    }

    /// Set the credential configuration.
    pub fn with_credentials(mut self, credentials: CredentialConfig) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the add-user credential lifespan.
    pub fn with_add_user_lifespan(mut self, lifespan: Duration) -> Self {
        self.add_user_lifespan = lifespan;
        self
    }

    /// Use a fixed bootstrap secret.
    pub fn with_bootstrap_secret(mut self, secret: impl Into<String>) -> Self {
        self.bootstrap_secret = Some(secret.into());
        self
    }

    /// Disable the bootstrap credential.
    pub fn without_bootstrap(mut self) -> Self {
        self.bootstrap = false;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Command-line arguments for the server.
#[derive(Parser, Debug)]
#[command(name = "checkmate-server")]
#[command(version, about = "Checkmate library management server", long_about = None)]
pub struct Args {
    /// Heartbeat interval for list streams, in seconds.
    #[arg(long, default_value_t = DEFAULT_HEARTBEAT_INTERVAL_SECS)]
    pub heartbeat: u64,

    /// Maximum time a single stream write may take, in seconds.
    #[arg(long, default_value_t = DEFAULT_WRITE_TIMEOUT_SECS)]
    pub write_timeout: u64,

    /// Lifespan of add-user credentials, in seconds.
    #[arg(long, default_value_t = DEFAULT_ADD_USER_LIFESPAN_SECS)]
    pub add_user_lifespan: u64,

    /// Number of digits in timed credentials.
    #[arg(long, default_value_t = DEFAULT_TIMED_LENGTH)]
    pub timed_length: usize,

    /// Number of hex characters in single-use credentials.
    #[arg(long, default_value_t = DEFAULT_SINGLE_USE_LENGTH)]
    pub single_use_length: usize,

    /// Do not issue a bootstrap credential for an empty account store.
    #[arg(long)]
    pub no_bootstrap: bool,

    /// Use this secret for the bootstrap credential.
    #[arg(long)]
    pub bootstrap_secret: Option<String>,
}

impl Args {
    /// Convert command-line arguments to server configuration.
    pub fn into_config(self) -> Result<ServerConfig> {
        if self.heartbeat == 0 {
            return Err(Error::Config("heartbeat interval must be positive".to_string()));
        }
        if self.write_timeout == 0 {
            return Err(Error::Config("write timeout must be positive".to_string()));
        }
        if self.add_user_lifespan == 0 {
            return Err(Error::Config("add-user lifespan must be positive".to_string()));
        }

        let continuity = ContinuityConfig::new()
            .with_heartbeat_interval(Duration::from_secs(self.heartbeat))
            .with_write_timeout(Duration::from_secs(self.write_timeout));
        let credentials = CredentialConfig::new()
            .with_timed_length(self.timed_length)
            .with_single_use_length(self.single_use_length);

        Ok(ServerConfig {
            continuity,
            credentials,
            add_user_lifespan: Duration::from_secs(self.add_user_lifespan),
            bootstrap: !self.no_bootstrap,
            bootstrap_secret: self.bootstrap_secret,
        })
    }
}
