//! The command line interface for the preparation pipeline.
use crate::config::Config;
use crate::{log, pipeline};
use ::log::info;
use anyhow::{Context, Result, ensure};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "secnet_results";

#[derive(Parser)]
#[command(version, about)]
/// The command line interface for secnet.
pub struct Cli {
    #[command(subcommand)]
    /// The available commands.
    pub command: Commands,
}

#[derive(Subcommand)]
/// The available commands.
pub enum Commands {
    /// Prepare a sector-coupled network from a model directory.
    Prepare {
        /// Path to the model directory.
        model_dir: PathBuf,
        /// Scenario descriptor, overriding the configuration.
        #[arg(long)]
        scenario: Option<String>,
        /// Investment year, overriding the configuration.
        #[arg(long)]
        year: Option<u32>,
        /// Output folder (defaults to secnet_results/<model name>).
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Handle the `prepare` command.
pub fn handle_prepare_command(
    model_dir: &Path,
    scenario: Option<&str>,
    year: Option<u32>,
    output: Option<&Path>,
) -> Result<()> {
    let mut config = Config::from_path(model_dir).context("Failed to load configuration.")?;
    if let Some(scenario) = scenario {
        config.scenario.sector_opts = scenario.to_string();
    }
    if let Some(year) = year {
        ensure!(
            config.scenario.planning_horizons.contains(&year),
            "Investment year {year} is not a planning horizon"
        );
        config.scenario.investment_year = year;
    }

    let output_dir = match output {
        Some(dir) => dir.to_path_buf(),
        None => get_output_dir(model_dir)?,
    };
    create_output_directory(&output_dir)?;
    log::init(config.log_level.as_deref(), Some(&output_dir))
        .context("Failed to initialise logging.")?;
    info!("Output folder: {}", output_dir.display());

    pipeline::prepare(model_dir, config, &output_dir)
}

/// Get the default output folder for the model at the specified path
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Canonicalise in case the user has specified "."
    let model_dir = model_dir
        .canonicalize()
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create the output folder if it does not yet exist
pub fn create_output_directory(output_dir: &Path) -> Result<()> {
    if output_dir.is_dir() {
        // already exists
        return Ok(());
    }

    fs::create_dir_all(output_dir)
        .with_context(|| format!("Could not create output folder {}", output_dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_get_output_dir() {
        let dir = tempdir().unwrap();
        let model_dir = dir.path().join("mymodel");
        fs::create_dir(&model_dir).unwrap();

        let output_dir = get_output_dir(&model_dir).unwrap();
        assert_eq!(
            output_dir,
            PathBuf::from(OUTPUT_DIRECTORY_ROOT).join("mymodel")
        );
    }

    #[test]
    fn test_create_output_directory() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("out");

        create_output_directory(&output_dir).unwrap();
        assert!(output_dir.is_dir());

        // A second call is a no-op
        create_output_directory(&output_dir).unwrap();
    }
}
