//! Common routines for handling input data.
use crate::basin::{Basin, Node, NodeID};
use crate::model::{Model, ModelParameters};
use crate::units::Dimensionless;
use anyhow::{Context, Result, ensure};
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use serde::de::{Deserialize, DeserializeOwned, Deserializer};
use std::fmt::Display;
use std::fs;
use std::io::Read;
use std::path::Path;

mod aquifer;
use aquifer::read_aquifers;
mod forecast;
use forecast::ForecastTables;
mod link;
use link::read_links;
mod outlet;
use outlet::read_outlets;
mod reservoir;
use reservoir::read_reservoirs;

/// Read a series of type `T`s from a CSV file.
///
/// Will raise an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<'a, T: DeserializeOwned + 'a>(
    file_path: &'a Path,
) -> Result<impl Iterator<Item = T> + 'a> {
    let vec = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))?
        .into_deserialize()
        .collect::<Result<Vec<T>, _>>()
        .with_context(|| input_err_msg(file_path))?;
    ensure!(
        !vec.is_empty(),
        input_err_msg(file_path) + ": CSV file cannot be empty"
    );

    Ok(vec.into_iter())
}

/// A table with a key column followed by one column of values per node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WideTable {
    columns: IndexMap<NodeID, Vec<f64>>,
    num_rows: usize,
}

impl WideTable {
    /// The number of rows in the table
    pub fn len(&self) -> usize {
        self.num_rows
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// The values for a node, if the table has a column for it
    pub fn column(&self, id: &str) -> Option<&[f64]> {
        self.columns.get(id).map(Vec::as_slice)
    }

    /// Iterate over the nodes the table has columns for
    pub fn ids(&self) -> impl Iterator<Item = &NodeID> {
        self.columns.keys()
    }
}

/// Read a CSV file with a key column followed by one column per node.
///
/// The key in row `i` (counting from zero) must equal `expected_key(i)`.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
/// * `key_column` - Name of the first column
/// * `expected_key` - The key each row must have
pub fn read_wide_csv<F>(file_path: &Path, key_column: &str, expected_key: F) -> Result<WideTable>
where
    F: Fn(usize) -> f64,
{
    let file = fs::File::open(file_path).with_context(|| input_err_msg(file_path))?;
    read_wide_csv_from_reader(file, key_column, expected_key)
        .with_context(|| input_err_msg(file_path))
}

fn read_wide_csv_from_reader<R, F>(reader: R, key_column: &str, expected_key: F) -> Result<WideTable>
where
    R: Read,
    F: Fn(usize) -> f64,
{
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers()?.clone();
    ensure!(
        headers.get(0) == Some(key_column),
        "The first column must be {key_column}"
    );
    let ids = headers.iter().skip(1).map(NodeID::from).collect_vec();
    ensure!(ids.iter().all_unique(), "Column names must be unique");

    let mut values = vec![Vec::new(); ids.len()];
    let mut num_rows = 0;
    for record in reader.records() {
        let record = record?;
        let key = record.get(0).unwrap_or_default();
        let expected = expected_key(num_rows);
        ensure!(
            key.parse::<f64>().ok() == Some(expected),
            "Expected {key_column} {expected} in row {}, found {key}",
            num_rows + 1
        );
        for (column, value) in values.iter_mut().zip(record.iter().skip(1)) {
            column.push(
                value
                    .parse()
                    .with_context(|| format!("Invalid value {value} for {key_column} {key}"))?,
            );
        }
        num_rows += 1;
    }
    ensure!(num_rows > 0, "CSV file cannot be empty");

    Ok(WideTable {
        columns: ids.into_iter().zip(values).collect(),
        num_rows,
    })
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Read a Dimensionless float, checking that it is between 0 and 1
pub fn deserialise_proportion<'de, D>(deserialiser: D) -> Result<Dimensionless, D::Error>
where
    D: Deserializer<'de>,
{
    let value: f64 = Deserialize::deserialize(deserialiser)?;
    if !(0.0..=1.0).contains(&value) {
        Err(serde::de::Error::custom("Value must be between 0 and 1"))?;
    }

    Ok(Dimensionless(value))
}

/// Read a Dimensionless float, checking that it is between 0 and 1 and not zero
pub fn deserialise_proportion_nonzero<'de, D>(deserialiser: D) -> Result<Dimensionless, D::Error>
where
    D: Deserializer<'de>,
{
    let value = deserialise_proportion(deserialiser)?;
    if value == Dimensionless(0.0) {
        Err(serde::de::Error::custom("Value cannot be zero"))?;
    }

    Ok(value)
}

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Check that a value read from input is finite and non-negative
pub fn check_non_negative<T: Display>(value: f64, what: T) -> Result<()> {
    ensure!(
        value.is_finite() && value >= 0.0,
        "{what} must be a finite, non-negative number (got {value})"
    );

    Ok(())
}

/// Read a model from the specified directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// The static model data, with the basin in its initial state, or an error.
pub fn load_model<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
    let model_dir = model_dir.as_ref();
    let parameters = ModelParameters::from_path(model_dir)?;
    let calendar = parameters.calendar()?;

    let forecasts = ForecastTables::from_path(model_dir)?;
    let num_timesteps = parameters.num_timesteps.unwrap_or(forecasts.inflow_len());

    let mut nodes: Vec<Node> = Vec::new();
    nodes.extend(
        read_reservoirs(model_dir, &parameters, &calendar, &forecasts)?
            .into_iter()
            .map(Node::Reservoir),
    );
    nodes.extend(
        read_aquifers(model_dir, &parameters, &forecasts)?
            .into_iter()
            .map(Node::Aquifer),
    );
    nodes.extend(
        read_outlets(model_dir, &forecasts)?
            .into_iter()
            .map(Node::Outlet),
    );

    let node_ids: IndexSet<NodeID> = nodes.iter().map(|node| node.id().clone()).collect();
    forecasts.check_node_ids(&node_ids)?;

    let links = read_links(model_dir)?;
    let basin = Basin::new(nodes, links).context("Invalid basin network")?;

    let model = Model::new(model_dir, parameters, basin, num_timesteps)?;
    model
        .check_forecast_coverage()
        .context("Forecasts do not cover the simulated period")?;

    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use rstest::rstest;
    use serde::Deserialize;
    use serde::de::IntoDeserializer;
    use serde::de::value::{Error as ValueError, F64Deserializer};
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Record {
        id: String,
        value: u32,
    }

    /// Create an example CSV file in dir_path
    fn create_csv_file(dir_path: &Path, contents: &str) -> PathBuf {
        let file_path = dir_path.join("test.csv");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "{contents}").unwrap();
        file_path
    }

    /// Test a normal read
    #[test]
    fn test_read_csv() {
        let dir = tempdir().unwrap();
        let file_path = create_csv_file(dir.path(), "id,value\nhello,1\nworld,2\n");
        let records: Vec<Record> = read_csv(&file_path).unwrap().collect();
        assert_eq!(
            records,
            &[
                Record {
                    id: "hello".to_string(),
                    value: 1,
                },
                Record {
                    id: "world".to_string(),
                    value: 2,
                }
            ]
        );

        // File with only a header is an error
        let file_path = create_csv_file(dir.path(), "id,value\n");
        assert!(read_csv::<Record>(&file_path).is_err());
    }

    fn read_wide(contents: &str) -> Result<WideTable> {
        read_wide_csv_from_reader(contents.as_bytes(), "timestep", |row| row as f64)
    }

    #[test]
    fn test_read_wide_csv() {
        let table = read_wide("timestep,A,B\n0,1.0,2.0\n1, 3.0 ,4.0\n").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.column("A").unwrap(), [1.0, 3.0]);
        assert_eq!(table.column("B").unwrap(), [2.0, 4.0]);
        assert!(table.column("C").is_none());
        assert_eq!(table.ids().map(|id| id.to_string()).collect_vec(), ["A", "B"]);
    }

    #[rstest]
    #[case("time,A\n0,1.0\n", "The first column must be timestep")]
    #[case("timestep,A,A\n0,1.0,1.0\n", "Column names must be unique")]
    #[case("timestep,A\n0,1.0\n2,1.0\n", "Expected timestep 1 in row 2, found 2")]
    #[case("timestep,A\n0,wet\n", "Invalid value wet for timestep 0")]
    #[case("timestep,A\n", "CSV file cannot be empty")]
    fn test_read_wide_csv_invalid(#[case] contents: &str, #[case] msg: &str) {
        assert_error!(read_wide(contents), msg);
    }

    #[test]
    fn test_read_wide_csv_missing_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("missing.csv");
        assert!(read_wide_csv(&file_path, "timestep", |row| row as f64).is_err());
    }

    #[test]
    fn test_read_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.toml");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "id = \"hello\"\nvalue = 1").unwrap();
        }

        assert_eq!(
            read_toml::<Record>(&file_path).unwrap(),
            Record {
                id: "hello".to_string(),
                value: 1,
            }
        );

        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "bad toml syntax").unwrap();
        }

        assert!(read_toml::<Record>(&file_path).is_err());
    }

    fn deserialise_f64(value: f64) -> Result<Dimensionless, ValueError> {
        let deserialiser: F64Deserializer<ValueError> = value.into_deserializer();
        deserialise_proportion_nonzero(deserialiser)
    }

    #[rstest]
    #[case(0.01, true)]
    #[case(0.5, true)]
    #[case(1.0, true)]
    #[case(0.0, false)]
    #[case(-1.0, false)]
    #[case(2.0, false)]
    #[case(f64::NAN, false)]
    #[case(f64::INFINITY, false)]
    fn test_deserialise_proportion_nonzero(#[case] value: f64, #[case] valid: bool) {
        assert_eq!(deserialise_f64(value).is_ok(), valid);
    }

    #[test]
    fn test_check_non_negative() {
        assert!(check_non_negative(0.0, "capacity").is_ok());
        assert_error!(
            check_non_negative(-1.0, "capacity"),
            "capacity must be a finite, non-negative number (got -1)"
        );
        assert!(check_non_negative(f64::NAN, "capacity").is_err());
    }
}
