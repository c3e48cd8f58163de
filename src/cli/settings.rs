//! `yarmouk settings` subcommands.
use crate::settings::{Settings, get_settings_file_path};
use anyhow::{Context, Result};
use clap::Subcommand;
use std::fs;
use std::path::Path;

/// What to do with the settings file
#[derive(Subcommand)]
pub enum SettingsSubcommands {
    /// Open the settings file in a text editor, creating it first if needed
    Edit,
    /// Print where the settings file is read from
    Path,
    /// Print a settings file with every setting at its default value
    DumpDefault,
    /// Print the settings currently in effect
    Show,
}

impl SettingsSubcommands {
    /// Run this subcommand
    pub fn execute(self) -> Result<()> {
        match self {
            Self::Edit => {
                let file_path = get_settings_file_path();
                create_settings_file_if_missing(&file_path)?;
                println!("Opening settings file for editing: {}", file_path.display());
                edit::edit_file(&file_path)
                    .with_context(|| format!("Could not edit {}", file_path.display()))?;
            }
            Self::Path => println!("{}", get_settings_file_path().display()),
            Self::DumpDefault => print!("{}", Settings::default_file_contents()?),
            Self::Show => {
                let settings = Settings::load().context("Failed to load settings.")?;
                print!("{}", toml::to_string(&settings)?);
            }
        }

        Ok(())
    }
}

/// Write the default settings file to `file_path`, unless there is one there already
fn create_settings_file_if_missing(file_path: &Path) -> Result<()> {
    if file_path.is_file() {
        return Ok(());
    }

    if let Some(config_dir) = file_path.parent() {
        fs::create_dir_all(config_dir)
            .with_context(|| format!("Failed to create directory: {}", config_dir.display()))?;
    }
    fs::write(file_path, Settings::default_file_contents()?)?;

    Ok(())
}
