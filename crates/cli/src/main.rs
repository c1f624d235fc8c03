//! Anomaly Detector CLI
//!
//! Inspects model files and talks to a running detector.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{inspect, predict, status};
use detector_lib::ModelOptions;

/// Anomaly Detector CLI
#[derive(Parser)]
#[command(name = "adctl")]
#[command(author, version, about = "CLI for the Anomaly Detector", long_about = None)]
pub struct Cli {
    /// Detector URL (can also be set via DETECTOR_API_URL env var)
    #[arg(long, env = "DETECTOR_API_URL", default_value = "http://localhost:6000")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print input and output metadata of a model file
    Inspect {
        /// Path to the ONNX model
        model: String,

        /// Pin the model input to this many features
        #[arg(long)]
        input_features: Option<usize>,

        /// Graph output carrying the prediction
        #[arg(long, default_value_t = 0)]
        output_index: usize,
    },

    /// Request a prediction from a running detector
    Predict {
        /// Feature values, in model order
        #[arg(required = true, num_args = 1.., allow_negative_numbers = true)]
        features: Vec<f64>,
    },

    /// Show detector health and readiness
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect {
            model,
            input_features,
            output_index,
        } => {
            let options = ModelOptions {
                input_features,
                output_index,
            };
            inspect::inspect_model(&model, &options, cli.format)?;
        }
        Commands::Predict { features } => {
            let client = client::ApiClient::new(&cli.api_url)?;
            predict::predict(&client, &features, cli.format).await?;
        }
        Commands::Status => {
            let client = client::ApiClient::new(&cli.api_url)?;
            status::show_status(&client, cli.format).await?;
        }
    }

    Ok(())
}
