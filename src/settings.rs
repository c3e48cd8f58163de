//! User-wide program settings, read from `settings.toml` in the yarmouk config folder.
//!
//! Every setting is optional. Options given on the command line take precedence.
use crate::get_yarmouk_config_dir;
use crate::input::read_toml;
use crate::log::DEFAULT_LOG_LEVEL;
use anyhow::{Context, Result};
use documented::DocumentedFields;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};

const SETTINGS_FILE_NAME: &str = "settings.toml";

const DEFAULT_SETTINGS_FILE_HEADER: &str = "# Program settings for yarmouk.
# Each setting below is shown with its default value. Remove the leading '#' to change it.
";

/// The location of the settings file
pub fn get_settings_file_path() -> PathBuf {
    get_yarmouk_config_dir().join(SETTINGS_FILE_NAME)
}

/// Settings which apply to every model run
#[derive(Debug, DocumentedFields, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Log level (off, error, warn, info, debug or trace). YARMOUK_LOG_LEVEL takes precedence.
    pub log_level: String,
    /// Replace an existing output folder rather than failing
    pub overwrite: bool,
    /// Write the monthly flow along every link to debug_link_flows.csv
    pub debug_model: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            overwrite: false,
            debug_model: false,
        }
    }
}

impl Settings {
    /// Load the user's settings, using defaults if they have no settings file
    pub fn load() -> Result<Settings> {
        Self::load_from_path(&get_settings_file_path())
    }

    fn load_from_path(file_path: &Path) -> Result<Settings> {
        if file_path.is_file() {
            read_toml(file_path)
        } else {
            Ok(Settings::default())
        }
    }

    /// A settings file with every setting commented out, each preceded by its description
    pub fn default_file_contents() -> Result<String> {
        let mut out = DEFAULT_SETTINGS_FILE_HEADER.to_string();
        for line in toml::to_string(&Settings::default())?.lines() {
            let Some((key, _)) = line.split_once('=') else {
                continue;
            };

            let key = key.trim();
            let docs = Settings::get_field_docs(key)
                .with_context(|| format!("Setting {key} is undocumented"))?;
            writeln!(&mut out)?;
            for doc_line in docs.lines() {
                writeln!(&mut out, "# # {}", doc_line.trim())?;
            }
            writeln!(&mut out, "# {}", line.trim())?;
        }

        Ok(out)
    }
}
