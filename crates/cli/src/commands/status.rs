//! Show health and readiness of a running detector

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use crate::client::ApiClient;
use crate::output::{color_status, format_timestamp, print_info, print_json, OutputFormat};

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Last Check")]
    last_check: String,
}

#[derive(Serialize)]
struct StatusReport<'a> {
    health: &'a detector_lib::HealthResponse,
    readiness: &'a detector_lib::ReadinessResponse,
}

pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let (_, health) = client.health().await?;
    let (_, readiness) = client.readiness().await?;

    match format {
        OutputFormat::Json => print_json(&StatusReport {
            health: &health,
            readiness: &readiness,
        })?,
        OutputFormat::Table => {
            let overall = serde_json::to_value(health.status)?
                .as_str()
                .unwrap_or_default()
                .to_string();
            let ready = if readiness.ready { "ready" } else { "not ready" };

            println!("{}", "Detector Status".bold());
            println!("{}", "=".repeat(50));
            println!("Health:     {}", color_status(&overall));
            println!("Readiness:  {}", color_status(ready));
            if let Some(reason) = &readiness.reason {
                print_info(reason);
            }
            println!();

            let mut rows: Vec<ComponentRow> = health
                .components
                .iter()
                .map(|(name, component)| {
                    let status = serde_json::to_value(component.status)
                        .ok()
                        .and_then(|v| v.as_str().map(str::to_string))
                        .unwrap_or_default();
                    ComponentRow {
                        name: name.clone(),
                        status: color_status(&status),
                        message: component.message.clone().unwrap_or_default(),
                        last_check: format_timestamp(component.last_check_timestamp),
                    }
                })
                .collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));

            println!("{}", Table::new(rows).with(Style::rounded()).to_string());
        }
    }

    Ok(())
}
