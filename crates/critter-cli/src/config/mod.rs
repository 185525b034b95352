//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── camunda: CamundaConfig   # Cluster address, OAuth server, credentials
//! ├── token_cache: PathBuf     # File caching the access token between runs
//! └── command: Command         # What to do
//! ```
//!
//! All connection settings can be provided via CLI arguments or the
//! environment variables of a Camunda client credentials file.
//!
//! # Example
//!
//! ```bash
//! critter --zeebe-rest-address "https://bru-2.zeebe.camunda.io/<cluster>" \
//!     --client-id "..." --client-secret "..." start --animal fox --wait
//!
//! # Or via environment variables
//! ZEEBE_REST_ADDRESS="..." CAMUNDA_CLIENT_ID="..." CAMUNDA_CLIENT_SECRET="..." critter token
//! ```

mod command;

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use critter_camunda::CamundaConfig;

pub use self::command::{Command, JobsCommand, StartArgs, WorkerArgs, into_variables};
use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_STARTUP};

/// Default location of the token cache.
pub const DEFAULT_TOKEN_CACHE: &str = ".critter/token.json";

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "critter")]
#[command(about = "Deploys and drives the animal image retrieval process on Camunda 8")]
#[command(version)]
pub struct Cli {
    /// Cluster connection and credentials.
    #[clap(flatten)]
    pub camunda: CamundaConfig,

    /// File caching the access token between invocations.
    #[arg(long, env = "CRITTER_TOKEN_CACHE", default_value = DEFAULT_TOKEN_CACHE)]
    pub token_cache: PathBuf,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    ///
    /// The .env file is loaded first so that clap can use its values as
    /// defaults for `env`-backed options.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.camunda
            .validate()
            .context("invalid cluster configuration")?;

        if self.token_cache.as_os_str().is_empty() {
            anyhow::bail!("token cache path must not be empty");
        }

        Ok(())
    }

    /// Logs configuration (no sensitive information).
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );

        tracing::debug!(
            target: TRACING_TARGET_CONFIG,
            base_url = %self.camunda.base_url,
            auth_url = %self.camunda.auth_url,
            token_audience = %self.camunda.token_audience,
            client_id = %self.camunda.client_id,
            http_timeout_secs = self.camunda.http_timeout,
            token_cache = %self.token_cache.display(),
            command = self.command.name(),
            "Cluster configuration"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}
