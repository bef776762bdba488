pub mod config_cmd;
pub mod ping;
pub mod run;

use std::path::PathBuf;

use talkgate_config::{Config, ConfigError};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub(crate) fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(talkgate_config::config_path)
}

/// Load the config for commands that need accounts.
///
/// An absent file with no accounts from the environment is reported as
/// `NoConfig` rather than an empty account list.
pub(crate) fn load(global: &GlobalOpts) -> Result<(Config, PathBuf), CliError> {
    let path = config_path(global);
    let cfg = talkgate_config::load_config(&path)?;
    if cfg.accounts.is_empty() && !path.exists() {
        return Err(CliError::NoConfig {
            path: path.display().to_string(),
        });
    }
    if cfg.accounts.is_empty() {
        return Err(ConfigError::NoAccounts.into());
    }
    Ok((cfg, path))
}
