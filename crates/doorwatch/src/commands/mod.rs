pub mod check;
pub mod run;

use doorwatch_config::Config;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Load the config named by `--config` (or the default path) plus environment.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(doorwatch_config::load_config(global.config.as_deref())?)
}
