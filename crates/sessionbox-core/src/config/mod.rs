//! Configuration for the orchestration loop and its endpoints
//!
//! Values come from an optional YAML file and from environment variables
//! (usually populated from a `.env` file by the binary). Environment values
//! win. Everything is resolved and validated before any network call is made.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

use crate::errors::AgentError;
use std::path::Path;

/// Resolve the configuration for `mode` from the process environment and an
/// optional YAML file.
pub async fn load_config<P: AsRef<Path>>(
    mode: RunMode,
    file: Option<P>,
) -> Result<AppConfig, AgentError> {
    let file_config = match file {
        Some(path) => ConfigLoader::load_file(path).await?,
        None => FileConfig::default(),
    };
    ConfigLoader::from_env(mode, file_config)
}
