use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// Bushfire Asset Protection Zone assessment tool
#[derive(Parser)]
#[command(name = "apz")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON APZ distance table (built-in table if not given)
    #[arg(short, long, env = "APZ_TABLE", global = true)]
    table: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Side of the elevation threshold, for `classify`.
#[derive(Clone, Copy, ValueEnum)]
pub enum PartitionArg {
    /// At or below the threshold
    Upslope,
    /// Above the threshold
    Downslope,
}

impl From<PartitionArg> for apz::ElevationPartition {
    fn from(arg: PartitionArg) -> Self {
        match arg {
            PartitionArg::Upslope => apz::ElevationPartition::UpslopeOrFlat,
            PartitionArg::Downslope => apz::ElevationPartition::Downslope,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full assessment and write all output layers
    Assess {
        #[command(flatten)]
        inputs: commands::input::SiteArgs,

        /// Structure footprints (GeoJSON)
        #[arg(long)]
        structures: PathBuf,

        /// Fixed elevation threshold in metres (mean under the structures if not given)
        #[arg(long, env = "APZ_ELEVATION_THRESHOLD")]
        threshold: Option<f64>,

        /// Output directory
        #[arg(short, long, default_value = "apz_output")]
        output: PathBuf,
    },

    /// Compute zone statistics only
    Stats {
        #[command(flatten)]
        inputs: commands::input::SiteArgs,

        /// Output file (CSV, or JSON with --json); stdout if not specified
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output JSON instead of CSV
        #[arg(short, long)]
        json: bool,
    },

    /// Show the fuel class and APZ distance for a vegetation label
    Classify {
        /// Vegetation label, e.g. "Coastal Swamp Forest"
        label: String,

        /// Elevation partition of the ground
        #[arg(long, value_enum)]
        partition: Option<PartitionArg>,

        /// Maximum slope in degrees, needed for downslope ground
        #[arg(long)]
        max_slope: Option<f64>,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Print the APZ distance table in use
    Table {
        /// Output the table as JSON
        #[arg(short, long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for table output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "apz=info,apz_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Assess {
            inputs,
            structures,
            threshold,
            output,
        } => commands::assess::run(inputs, structures, threshold, cli.table, output),
        Commands::Stats {
            inputs,
            output,
            json,
        } => commands::stats::run(inputs, output, json),
        Commands::Classify {
            label,
            partition,
            max_slope,
            json,
        } => commands::classify::run(&label, partition, max_slope, cli.table, json),
        Commands::Table { json } => commands::table::run(cli.table, json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_classify_upslope_without_slope() {
        let cli = Cli::try_parse_from(["apz", "classify", "Grassland", "--partition", "upslope"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Classify {
                partition: Some(PartitionArg::Upslope),
                max_slope: None,
                ..
            }
        ));
    }

    #[test]
    fn test_classify_downslope_with_slope() {
        let cli = Cli::try_parse_from([
            "apz",
            "classify",
            "Coastal Swamp Forest",
            "--partition",
            "downslope",
            "--max-slope",
            "7",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Classify {
                partition: Some(PartitionArg::Downslope),
                max_slope: Some(s),
                ..
            } if s == 7.0
        ));
    }
}
