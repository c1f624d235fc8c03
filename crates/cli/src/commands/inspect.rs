//! Print the metadata of a model file without starting the service

use anyhow::{Context, Result};
use colored::Colorize;
use detector_lib::{predictor::TensorInfo, AnomalyModel, ModelOptions, OnnxModel};
use tabled::{settings::Style, Table, Tabled};

use crate::output::{print_json, print_success, print_warning, OutputFormat};

#[derive(Tabled)]
struct TensorRow {
    #[tabled(rename = "Kind")]
    kind: &'static str,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Fact")]
    fact: String,
}

fn rows<'a>(kind: &'static str, tensors: &'a [TensorInfo]) -> impl Iterator<Item = TensorRow> + 'a {
    tensors.iter().map(move |t| TensorRow {
        kind,
        name: t.name.clone(),
        fact: t.fact.clone(),
    })
}

/// Load a model and print its inputs and outputs
pub fn inspect_model(path: &str, options: &ModelOptions, format: OutputFormat) -> Result<()> {
    let model = OnnxModel::from_path(path, options)
        .with_context(|| format!("Failed to load model from {}", path))?;
    let metadata = model.metadata();

    match format {
        OutputFormat::Json => print_json(&metadata)?,
        OutputFormat::Table => {
            print_success(&format!("Model loaded from {}", path));

            if metadata.inputs.is_empty() {
                print_warning("Model declares no named inputs.");
            } else {
                println!("{} {:?}", "Input names:".bold(), metadata.input_names());
            }

            println!();
            println!("{}", "Model structure".bold());
            let table_rows: Vec<TensorRow> = rows("input", &metadata.inputs)
                .chain(rows("output", &metadata.outputs))
                .collect();
            println!("{}", Table::new(table_rows).with(Style::rounded()).to_string());
        }
    }

    Ok(())
}
