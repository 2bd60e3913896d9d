//! The `config` command: inspect configuration.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use crate::error::{Result, TolkError};

pub fn run_config(action: &ConfigAction, settings: Settings) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let content = toml::to_string_pretty(&settings)
                .map_err(|e| TolkError::Config(e.to_string()))?;
            println!("{content}");
        }
        ConfigAction::Path => {
            let path = Settings::default_config_path();
            println!("{}", path.display());
            if !path.exists() {
                Output::info("(file does not exist yet; defaults are in effect)");
            }
        }
    }
    Ok(())
}
