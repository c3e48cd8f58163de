//! Writing the monthly history of a run to CSV files.
use crate::basin::LinkKind;
use crate::history::{Attribute, Tracked};
use crate::model::Model;
use crate::simulation::Simulation;
use crate::year::Calendar;
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod metadata;
use metadata::write_metadata;

/// Results for each model go in a subfolder of this one, named after the model
const OUTPUT_DIRECTORY_ROOT: &str = "yarmouk_results";

/// The output file name for the history of basin nodes
const NODE_HISTORY_FILE_NAME: &str = "node_history.csv";

/// The output file name for the history of the institutions
const INSTITUTION_HISTORY_FILE_NAME: &str = "institution_history.csv";

/// The output file name for link flows
const LINK_FLOWS_FILE_NAME: &str = "debug_link_flows.csv";

/// The default output folder for the model in `model_dir`
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // A path of "." has no file name until resolved
    let model_dir = model_dir
        .canonicalize()
        .with_context(|| format!("Model folder {} not found", model_dir.display()))?;
    let model_name = model_dir
        .file_name()
        .and_then(|name| name.to_str())
        .context("Model folder name is not valid UTF-8")?;

    Ok(Path::new(OUTPUT_DIRECTORY_ROOT).join(model_name))
}

/// Create the folder `output_dir` for results, along with any parent folders.
///
/// An existing directory which isn't empty is only replaced if `allow_overwrite` is true.
///
/// # Returns
///
/// Whether an existing directory was overwritten.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if output_dir.is_dir() {
        if fs::read_dir(output_dir)?.next().is_none() {
            // Already exists and is empty
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Use --overwrite to replace it."
        );
        fs::remove_dir_all(output_dir)?;
        true
    } else {
        false
    };

    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// Represents a row in the node and institution history CSV files
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct HistoryRow {
    timestep: u32,
    year: u32,
    month: u32,
    entity: String,
    attribute: Attribute,
    value: f64,
}

/// Represents a row in the link flows CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct LinkFlowRow {
    timestep: u32,
    year: u32,
    month: u32,
    link: String,
    kind: LinkKind,
    flow: f64,
}

/// The calendar year and month (1-12) of a timestep
fn year_and_month(calendar: &Calendar, timestep: u32) -> (u32, u32) {
    (
        calendar.year(timestep),
        Calendar::month_index(timestep) as u32 + 1,
    )
}

/// Write the tracked attributes of some entities as rows of a history file
fn write_history_rows<'a, I>(
    writer: &mut csv::Writer<File>,
    calendar: &Calendar,
    timestep: u32,
    entities: I,
) -> Result<()>
where
    I: Iterator<Item = &'a dyn Tracked>,
{
    let (year, month) = year_and_month(calendar, timestep);
    for entity in entities {
        for (attribute, value) in entity.tracked_attributes() {
            writer.serialize(HistoryRow {
                timestep,
                year,
                month,
                entity: entity.entity().to_string(),
                attribute,
                value,
            })?;
        }
    }

    Ok(())
}

/// An object for writing the state of the simulation to file
pub struct DataWriter {
    nodes_writer: csv::Writer<File>,
    institutions_writer: csv::Writer<File>,
    link_flows_writer: Option<csv::Writer<File>>,
}

impl DataWriter {
    /// Write the run metadata and open the history files in `output_path`.
    ///
    /// The link flows file is only written if `save_debug_info` is set.
    pub fn create(output_path: &Path, model: &Model, save_debug_info: bool) -> Result<Self> {
        write_metadata(output_path, model).context("Failed to save metadata")?;

        let new_writer = |file_name| csv::Writer::from_path(output_path.join(file_name));

        let link_flows_writer = if save_debug_info {
            Some(new_writer(LINK_FLOWS_FILE_NAME)?)
        } else {
            None
        };

        Ok(Self {
            nodes_writer: new_writer(NODE_HISTORY_FILE_NAME)?,
            institutions_writer: new_writer(INSTITUTION_HISTORY_FILE_NAME)?,
            link_flows_writer,
        })
    }

    /// Write the state of every node and institution at the end of a timestep
    pub fn write_timestep(&mut self, timestep: u32, simulation: &Simulation) -> Result<()> {
        let calendar = simulation.calendar();
        write_history_rows(
            &mut self.nodes_writer,
            calendar,
            timestep,
            simulation.basin().iter_nodes().map(|node| node as &dyn Tracked),
        )?;
        write_history_rows(
            &mut self.institutions_writer,
            calendar,
            timestep,
            simulation.iter_institutions(),
        )?;

        if let Some(wtr) = &mut self.link_flows_writer {
            let (year, month) = year_and_month(calendar, timestep);
            for link in simulation.basin().iter_links() {
                wtr.serialize(LinkFlowRow {
                    timestep,
                    year,
                    month,
                    link: link.name.clone(),
                    kind: link.kind,
                    flow: link.flow.value(),
                })?;
            }
        }

        Ok(())
    }

    /// Make sure everything written so far is on disk
    pub fn flush(&mut self) -> Result<()> {
        self.nodes_writer.flush()?;
        self.institutions_writer.flush()?;
        if let Some(wtr) = &mut self.link_flows_writer {
            wtr.flush()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, model};
    use itertools::Itertools;
    use rstest::rstest;
    use tempfile::tempdir;

    fn read_rows<T: for<'de> Deserialize<'de>>(file_path: &Path) -> Vec<T> {
        csv::Reader::from_path(file_path)
            .unwrap()
            .into_deserialize()
            .try_collect()
            .unwrap()
    }

    #[test]
    fn test_create_output_directory_new() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("a").join("b");
        assert!(!create_output_directory(&output_dir, false).unwrap());
        assert!(output_dir.is_dir());
    }

    #[test]
    fn test_create_output_directory_existing() {
        let dir = tempdir().unwrap();

        // Empty folders can be reused
        assert!(!create_output_directory(dir.path(), false).unwrap());

        let file_path = dir.path().join("old.csv");
        fs::write(&file_path, "old").unwrap();
        assert_error!(
            create_output_directory(dir.path(), false),
            "Output folder already exists and is not empty. Use --overwrite to replace it."
        );
        assert!(file_path.exists());

        assert!(create_output_directory(dir.path(), true).unwrap());
        assert!(dir.path().is_dir());
        assert!(!file_path.exists());
    }

    #[rstest]
    fn test_write_timestep(model: Model) {
        let dir = tempdir().unwrap();
        let mut writer = DataWriter::create(dir.path(), &model, true).unwrap();
        let mut simulation = Simulation::new(model);
        {
            let timestep = simulation.step().unwrap();
            writer.write_timestep(timestep, &simulation).unwrap();
            writer.flush().unwrap();
        }

        assert!(dir.path().join("metadata.toml").is_file());

        let rows: Vec<HistoryRow> = read_rows(&dir.path().join(NODE_HISTORY_FILE_NAME));
        let storage = rows
            .iter()
            .find(|row| row.entity == "Dam" && row.attribute == Attribute::Storage)
            .unwrap();
        assert_eq!(storage.timestep, 0);
        assert_eq!(storage.year, 1983);
        assert_eq!(storage.month, 1);
        assert_eq!(storage.value, 0.0);

        let rows: Vec<HistoryRow> = read_rows(&dir.path().join(INSTITUTION_HISTORY_FILE_NAME));
        assert!(rows.iter().any(|row| row.entity == "regulator"));
        assert!(rows.iter().all(|row| row.entity != "Dam"));

        let rows: Vec<LinkFlowRow> = read_rows(&dir.path().join(LINK_FLOWS_FILE_NAME));
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(|row| row.kind == LinkKind::Transfer));
    }

    #[rstest]
    fn test_write_timestep_no_debug(model: Model) {
        let dir = tempdir().unwrap();
        let mut writer = DataWriter::create(dir.path(), &model, false).unwrap();
        writer.flush().unwrap();
        assert!(dir.path().join(NODE_HISTORY_FILE_NAME).is_file());
        assert!(!dir.path().join(LINK_FLOWS_FILE_NAME).exists());
    }
}
