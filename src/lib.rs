//! A monthly water allocation model for a transboundary river basin.
//!
//! Water is routed through a network of reservoirs, aquifers and outlets, and the flow leaving the
//! basin is split between two parties according to a bilateral treaty.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod aquifer;
pub mod basin;
pub mod cli;
pub mod forecast;
pub mod history;
pub mod id;
pub mod input;
pub mod institution;
pub mod log;
pub mod model;
pub mod outlet;
pub mod output;
pub mod reservoir;
pub mod settings;
pub mod simulation;
pub mod topology;
pub mod units;
pub mod year;

#[cfg(test)]
mod fixture;

/// Get the folder in which program configuration files are stored
pub fn get_yarmouk_config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_default();
    path.push("yarmouk");
    path
}
