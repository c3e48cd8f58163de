//! Code for writing metadata about a model run to file.
use crate::model::Model;
use anyhow::{Result, anyhow};
use chrono::prelude::*;
use platform_info::{PlatformInfo, PlatformInfoAPI, UNameAPI};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// The output file name for metadata
const METADATA_FILE_NAME: &str = "metadata.toml";

/// Information about the program build via `built` crate
mod built_info {
    // The file has been placed there by the build script.
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

#[derive(Serialize)]
struct Metadata<'a> {
    run: RunMetadata<'a>,
    model: ModelMetadata,
    program: ProgramMetadata,
    platform: PlatformMetadata,
}

/// When and where the run took place
#[derive(Serialize)]
struct RunMetadata<'a> {
    /// Path to the model which was run
    model_path: &'a Path,
    /// The date and time on which the run started
    datetime: String,
}

/// The simulated period
#[derive(Serialize)]
struct ModelMetadata {
    start_year: u32,
    num_timesteps: u32,
    /// Every calendar year the run covers, including part years
    years: Vec<u32>,
    num_nodes: usize,
}

/// The program which produced the results
#[derive(Serialize)]
struct ProgramMetadata {
    name: &'static str,
    version: &'static str,
    /// The target architecture for the build (e.g. x86_64-unknown-linux-gnu)
    target: &'static str,
    is_debug: bool,
    rustc_version: &'static str,
    build_time_utc: &'static str,
    /// The short git commit hash, with a `-dirty` suffix for uncommitted changes
    git_commit_hash: String,
}

impl ProgramMetadata {
    fn new() -> Self {
        let git_commit_hash = match built_info::GIT_COMMIT_HASH_SHORT {
            Some(hash) if built_info::GIT_DIRTY == Some(true) => format!("{hash}-dirty"),
            Some(hash) => hash.to_string(),
            None => "unknown".to_string(),
        };

        Self {
            name: built_info::PKG_NAME,
            version: built_info::PKG_VERSION,
            target: built_info::TARGET,
            is_debug: built_info::DEBUG,
            rustc_version: built_info::RUSTC_VERSION,
            build_time_utc: built_info::BUILT_TIME_UTC,
            git_commit_hash,
        }
    }
}

/// The machine the model was run on, as reported by [`PlatformInfo`]
#[derive(Serialize)]
struct PlatformMetadata {
    sysname: String,
    nodename: String,
    release: String,
    version: String,
    machine: String,
    osname: String,
}

impl PlatformMetadata {
    fn new() -> Result<Self> {
        let info =
            PlatformInfo::new().map_err(|err| anyhow!("Unable to determine platform info: {err}"))?;

        Ok(Self {
            sysname: info.sysname().to_string_lossy().into(),
            nodename: info.nodename().to_string_lossy().into(),
            release: info.release().to_string_lossy().into(),
            version: info.version().to_string_lossy().into(),
            machine: info.machine().to_string_lossy().into(),
            osname: info.osname().to_string_lossy().into(),
        })
    }
}

/// Write metadata about a run of `model` to the output folder in TOML format
pub fn write_metadata(output_path: &Path, model: &Model) -> Result<()> {
    let metadata = Metadata {
        run: RunMetadata {
            model_path: &model.model_path,
            datetime: Local::now().to_rfc2822(),
        },
        model: ModelMetadata {
            start_year: model.calendar.start_year,
            num_timesteps: model.num_timesteps,
            years: model.iter_years().collect(),
            num_nodes: model.basin.iter_nodes().count(),
        },
        program: ProgramMetadata::new(),
        platform: PlatformMetadata::new()?,
    };
    let file_path = output_path.join(METADATA_FILE_NAME);
    fs::write(&file_path, toml::to_string(&metadata)?)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::model;
    use rstest::rstest;
    use tempfile::tempdir;

    #[rstest]
    fn test_write_metadata(model: Model) {
        let dir = tempdir().unwrap();
        write_metadata(dir.path(), &model).unwrap();

        let contents = fs::read_to_string(dir.path().join(METADATA_FILE_NAME)).unwrap();
        let metadata: toml::Table = toml::from_str(&contents).unwrap();
        assert_eq!(metadata["run"]["model_path"].as_str(), Some("model"));
        assert_eq!(metadata["model"]["start_year"].as_integer(), Some(1983));
        assert_eq!(metadata["model"]["num_timesteps"].as_integer(), Some(36));
        assert_eq!(metadata["model"]["num_nodes"].as_integer(), Some(3));
        let years: Vec<_> = metadata["model"]["years"]
            .as_array()
            .unwrap()
            .iter()
            .map(|year| year.as_integer().unwrap())
            .collect();
        assert_eq!(years, [1983, 1984, 1985]);
        assert_eq!(metadata["program"]["name"].as_str(), Some("yarmouk"));
        assert!(metadata.contains_key("platform"));
    }
}
