//! The example models bundled with the program and the CLI commands for using them.
use super::{RunOpts, handle_run_command};
use crate::settings::Settings;
use anyhow::{Context, Result, bail, ensure};
use clap::Subcommand;
use include_dir::{Dir, DirEntry, include_dir};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// The example models, one per subfolder
static DEMOS_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/demos");

/// The file describing an example model
const README_FILE_NAME: &str = "README.txt";

/// What to do with the bundled examples
#[derive(Subcommand)]
pub enum ExampleSubcommands {
    /// List the examples, with a one-line summary of each.
    List,
    /// Print the description of an example.
    Info {
        /// The name of the example.
        name: String,
    },
    /// Copy the input files of an example into a new folder.
    Extract {
        /// The name of the example.
        name: String,
        /// Where to put the files (defaults to a folder named after the example).
        new_path: Option<PathBuf>,
    },
    /// Run an example without extracting it first.
    Run {
        /// The name of the example.
        name: String,
        /// Folder to write results to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Also write monthly link flows
        #[arg(long)]
        debug_model: bool,
    },
}

impl ExampleSubcommands {
    /// Run this subcommand
    pub fn execute(self) -> Result<()> {
        match self {
            Self::List => handle_example_list_command(),
            Self::Info { name } => println!("{}", get_readme(&name)?),
            Self::Extract { name, new_path } => {
                let dest = new_path.unwrap_or_else(|| PathBuf::from(&name));
                extract_example(&name, &dest)?;
            }
            Self::Run {
                name,
                output_dir,
                debug_model,
            } => handle_example_run_command(&name, output_dir.as_deref(), debug_model, None)?,
        }

        Ok(())
    }
}

/// Get the folder holding an example
fn get_example(name: &str) -> Result<&'static Dir<'static>> {
    DEMOS_DIR.get_dir(name).context("Example not found.")
}

/// Get the description of an example
fn get_readme(name: &str) -> Result<&'static str> {
    let path: PathBuf = [name, README_FILE_NAME].iter().collect();
    get_example(name)?;
    DEMOS_DIR
        .get_file(path)
        .with_context(|| format!("Example {name} has no {README_FILE_NAME}"))?
        .contents_utf8()
        .with_context(|| format!("{README_FILE_NAME} is not UTF-8 encoded"))
}

/// Handle the `example list` command, showing the first line of each example's description
fn handle_example_list_command() {
    for entry in DEMOS_DIR.dirs() {
        let name = entry.path().display().to_string();
        let summary = get_readme(&name)
            .ok()
            .and_then(|readme| readme.lines().next())
            .unwrap_or_default();
        println!("{name}\t{summary}");
    }
}

/// Copy the files of example `name` into the folder `new_path`, which must not exist
fn extract_example(name: &str, new_path: &Path) -> Result<()> {
    let example = get_example(name)?;
    ensure!(
        !new_path.exists(),
        "Destination directory {} already exists",
        new_path.display()
    );

    fs::create_dir_all(new_path)?;
    for entry in example.entries() {
        let DirEntry::File(file) = entry else {
            bail!("Subdirectories in examples not supported");
        };
        let file_name = file.path().file_name().context("Invalid file in example")?;
        fs::write(new_path.join(file_name), file.contents())?;
    }

    Ok(())
}

/// Handle the `example run` command.
///
/// The example is extracted to a temporary folder, which is deleted afterwards.
pub fn handle_example_run_command(
    name: &str,
    output_path: Option<&Path>,
    debug_model: bool,
    settings: Option<Settings>,
) -> Result<()> {
    let temp_dir = TempDir::new().context("Failed to create temporary directory.")?;
    let model_path = temp_dir.path().join(name);
    extract_example(name, &model_path)?;

    let opts = RunOpts {
        output_dir: output_path.map(Path::to_path_buf),
        overwrite: false,
        debug_model,
    };
    handle_run_command(&model_path, &opts, settings)
}
