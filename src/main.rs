//! Origami Pipeline CLI
//!
//! Runs the cutter → folders → stocker production line.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use origami_pipeline::{run_pipeline, Config};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Parser)]
#[command(name = "origami-pipeline")]
#[command(about = "Simulate an origami production line", long_about = None)]
struct Cli {
    /// Path to configuration file (built-in defaults are used if the
    /// default path does not exist)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the number of pieces to produce
    #[arg(long, global = true)]
    total_pieces: Option<u64>,

    /// Override the simulated work time multiplier
    #[arg(long, global = true)]
    time_scale: Option<f64>,

    /// Override the pattern selection seed
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline (default if no command specified)
    Run,

    /// Validate configuration
    Validate,

    /// Generate a sample configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        None | Some(Commands::Run) => {
            let config = load_config(&cli)?;
            run_pipeline(config)?;
        }

        Some(Commands::Validate) => {
            let config = load_config(&cli)?;
            config.validate()?;
            println!("Configuration is valid");
        }

        Some(Commands::GenerateConfig { output }) => {
            generate_config_command(output)?;
        }
    }

    Ok(())
}

/// Load the config file (if any) and apply command-line overrides.
///
/// Validation is left to the caller: `run_pipeline` validates before starting.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                Config::from_file(&default_path)?
            } else {
                tracing::debug!("No config file found, using defaults");
                Config::default()
            }
        }
    };

    if let Some(total) = cli.total_pieces {
        config.production.total_pieces = total;
    }
    if let Some(scale) = cli.time_scale {
        config.timing.time_scale = scale;
    }
    if let Some(seed) = cli.seed {
        config.timing.seed = Some(seed);
    }

    Ok(config)
}

fn generate_config_command(output: &PathBuf) -> Result<()> {
    let yaml = r#"# Origami Pipeline Configuration

# === PRODUCTION: Topology and table sizes ===
production:
  # Pieces to cut; the run ends once this many have been put away
  total_pieces: 16

  # Capacity of the table between the cutter and the folders
  paper_table_capacity: 2

  # Capacity of the table between the folders and the stocker
  finished_table_capacity: 4

  # Number of folder threads
  folder_count: 2

  # How often the main thread checks for completion (milliseconds)
  poll_interval_ms: 1000

# === TIMING: Simulated work ===
timing:
  # Multiplier for every simulated delay (0 = no sleeping, 0.1 = 10x faster)
  time_scale: 1.0

  # Seconds the stocker needs to put one piece away
  stock_secs: 6

  # Fixed seed for reproducible pattern choices (omit for random)
  # seed: 42

# === METRICS: Progress reporting ===
metrics:
  enabled: true

  # Progress line interval in seconds
  report_interval_secs: 10

  # Write the final metrics snapshot as JSON
  # output_path: "metrics.json"
"#;

    std::fs::write(output, yaml)?;
    println!("Generated sample configuration at: {}", output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_default() {
        // No subcommand - should default to Run
        let cli = Cli::try_parse_from(["origami-pipeline"]);
        assert!(cli.is_ok());
        let cli = cli.unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::try_parse_from(["origami-pipeline", "-c", "other.yaml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("other.yaml")));
    }

    #[test]
    fn test_cli_parse_validate() {
        let cli = Cli::try_parse_from(["origami-pipeline", "validate", "-c", "test.json"]);
        assert!(matches!(cli.unwrap().command, Some(Commands::Validate)));
    }

    #[test]
    fn test_cli_overrides_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "production:\n  total_pieces: 4\n").unwrap();

        let cli = Cli::try_parse_from([
            "origami-pipeline",
            "-c",
            path.to_str().unwrap(),
            "--time-scale",
            "0",
            "--seed",
            "9",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();

        assert_eq!(config.production.total_pieces, 4);
        assert_eq!(config.timing.time_scale, 0.0);
        assert_eq!(config.timing.seed, Some(9));
    }

    #[test]
    fn test_cli_invalid_override_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "{}\n").unwrap();

        let cli = Cli::try_parse_from([
            "origami-pipeline",
            "-c",
            path.to_str().unwrap(),
            "--total-pieces",
            "0",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();

        assert_eq!(config.production.total_pieces, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_generated_config_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("generated.yaml");

        generate_config_command(&path).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.production.total_pieces, 16);
    }
}
