//! The command line interface for running and validating basin models.
use crate::input::load_model;
use crate::log;
use crate::output::{create_output_directory, get_output_dir};
use crate::settings::Settings;
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod example;
use example::ExampleSubcommands;
pub mod settings;
use settings::SettingsSubcommands;

/// Command-line arguments for the `yarmouk` program
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The command to run, if any
    #[command(subcommand)]
    command: Option<Commands>,
    /// Print the documentation for all commands as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options controlling a model run, which override the program settings
#[derive(Args, Default)]
pub struct RunOpts {
    /// Folder to write results to (defaults to one named after the model)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Replace the output folder if it already holds files
    #[arg(long)]
    pub overwrite: bool,
    /// Also write the flow along every link for each month
    #[arg(long)]
    pub debug_model: bool,
}

/// Top-level commands
#[derive(Subcommand)]
enum Commands {
    /// Simulate water allocation for a basin model.
    Run {
        /// Folder containing `model.toml` and the input CSV files.
        model_dir: PathBuf,
        /// Output options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// List, extract or run the bundled example models.
    Example {
        /// What to do with the examples.
        #[command(subcommand)]
        subcommand: ExampleSubcommands,
    },
    /// Check that a model loads without running it.
    Validate {
        /// Folder containing `model.toml` and the input CSV files.
        model_dir: PathBuf,
    },
    /// View or edit the program settings file.
    Settings {
        /// What to do with the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Dispatch to the handler for this command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { model_dir, opts } => handle_run_command(&model_dir, &opts, None),
            Self::Example { subcommand } => subcommand.execute(),
            Self::Validate { model_dir } => handle_validate_command(&model_dir, None),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Entry point for the command-line program
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        // No command given
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Load the program settings, unless they have been provided
fn load_settings(settings: Option<Settings>) -> Result<Settings> {
    match settings {
        Some(settings) => Ok(settings),
        None => Settings::load().context("Failed to load settings."),
    }
}

/// The folder results are written to: the one given or else one named after the model
fn resolve_output_dir(model_path: &Path, output_dir: Option<&Path>) -> Result<PathBuf> {
    match output_dir {
        Some(output_dir) => Ok(output_dir.to_path_buf()),
        None => get_output_dir(model_path),
    }
}

/// Handle the `run` command.
///
/// Command-line options take precedence over the program settings.
pub fn handle_run_command(
    model_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(settings)?;
    let debug_model = opts.debug_model || settings.debug_model;
    let allow_overwrite = opts.overwrite || settings.overwrite;

    let output_path = resolve_output_dir(model_path, opts.output_dir.as_deref())?;
    let overwritten = create_output_directory(&output_path, allow_overwrite).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            output_path.display()
        )
    })?;

    log::init(Some(&settings.log_level), Some(&output_path))
        .context("Failed to initialise logging.")?;

    // Only now that the logger is running can this be reported
    if overwritten {
        warn!("Existing output folder was overwritten");
    }

    let model = load_model(model_path).context("Failed to load model.")?;
    info!(
        "Loaded model from {}: {} nodes, {} timesteps from {}",
        model_path.display(),
        model.basin.iter_nodes().count(),
        model.num_timesteps,
        model.calendar.start_year
    );
    info!("Output folder: {}", output_path.display());

    crate::simulation::run(model, &output_path, debug_model)?;
    info!("Simulation complete!");

    Ok(())
}

/// Handle the `validate` command.
///
/// No log files are written.
pub fn handle_validate_command(model_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = load_settings(settings)?;
    log::init(Some(&settings.log_level), None).context("Failed to initialise logging.")?;

    let model = load_model(model_path).context("Failed to validate model.")?;
    info!(
        "Model validation successful! {} nodes over {} timesteps",
        model.basin.iter_nodes().count(),
        model.num_timesteps
    );

    Ok(())
}
