// ABOUTME: Command module aggregator for the ephemeron CLI.
// ABOUTME: Re-exports deploy, teardown, rollback, and status command handlers.

mod deploy;
mod rollback;
mod status;
mod teardown;

pub use deploy::deploy;
pub use rollback::rollback;
pub use status::status;
pub use teardown::teardown;

use ephemeron::config::Config;
use ephemeron::error::Result;
use ephemeron::provider::aws::AwsCli;
use ephemeron::types::EnvironmentName;
use std::env;
use std::path::Path;

/// Load the config file and merge the overrides for `environment`.
pub fn load_config(path: Option<&Path>, environment: &EnvironmentName) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::discover(&env::current_dir()?)?,
    };
    config.for_environment(environment)
}

/// Provider client for an already-merged config.
pub fn provider(config: &Config) -> Result<AwsCli> {
    AwsCli::from_config(&config.aws)
}
