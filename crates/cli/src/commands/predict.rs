//! Send a feature vector to a running detector

use anyhow::Result;
use colored::Colorize;

use crate::client::ApiClient;
use crate::output::{color_trust, print_json, trust_level, OutputFormat};

pub async fn predict(client: &ApiClient, features: &[f64], format: OutputFormat) -> Result<()> {
    let result = client.predict(features).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            println!("{}", "Prediction".bold());
            println!("{}", "=".repeat(40));
            println!("Features:     {:?}", features);
            println!("Prediction:   {}", result.prediction);
            println!("Trust score:  {}", color_trust(result.trust_score));
            println!("Assessment:   {}", trust_level(result.trust_score));
        }
    }

    Ok(())
}
