//! ONNX model inference using tract
//!
//! Loads an exported anomaly detector (for example a scikit-learn model
//! converted with sklearn-onnx) and runs it on single-row batches.

use super::{AnomalyModel, ModelMetadata, TensorInfo};
use crate::error::ModelError;
use crate::models::FeatureVector;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Inference latency above which a warning is logged
pub const MAX_INFERENCE_MS: u128 = 5;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Options applied while loading an ONNX graph
#[derive(Debug, Clone, Default)]
pub struct ModelOptions {
    /// Pin the input fact to `f32 [1, n]`. When unset the graph's own input fact is used.
    pub input_features: Option<usize>,
    /// Graph output holding the prediction
    pub output_index: usize,
}

/// ONNX-backed anomaly model
pub struct OnnxModel {
    plan: TractModel,
    input_type: DatumType,
    output_index: usize,
    metadata: ModelMetadata,
    inference_count: AtomicU64,
    slow_inference_count: AtomicU64,
}

impl OnnxModel {
    /// Load a model from an ONNX file
    pub fn from_path(path: impl AsRef<Path>, options: &ModelOptions) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load(&bytes, options, path.display().to_string())
    }

    /// Load a model from in-memory ONNX bytes
    pub fn from_bytes(bytes: &[u8], options: &ModelOptions) -> Result<Self, ModelError> {
        Self::load(bytes, options, "<memory>".to_string())
    }

    fn load(bytes: &[u8], options: &ModelOptions, source: String) -> Result<Self, ModelError> {
        let mut model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(bytes))
            .context("Failed to parse ONNX model")?;

        if let Some(n) = options.input_features {
            model = model
                .with_input_fact(0, f32::fact([1, n]).into())
                .context("Failed to set input shape")?;
        }

        let typed = model.into_optimized().context("Failed to optimize model")?;
        let input_type = typed
            .input_fact(0)
            .context("Model declares no inputs")?
            .datum_type;

        let output_count = typed.output_outlets()?.len();
        if options.output_index >= output_count {
            return Err(anyhow::anyhow!(
                "Output index {} out of range, model has {} outputs",
                options.output_index,
                output_count
            )
            .into());
        }

        let metadata = describe(&typed, source)?;
        let plan = typed
            .into_runnable()
            .context("Failed to create runnable model")?;

        debug!(
            source = %metadata.source,
            input_type = ?input_type,
            outputs = output_count,
            "ONNX model loaded"
        );

        Ok(Self {
            plan,
            input_type,
            output_index: options.output_index,
            metadata,
            inference_count: AtomicU64::new(0),
            slow_inference_count: AtomicU64::new(0),
        })
    }

    /// Get inference statistics
    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            total_inferences: self.inference_count.load(Ordering::Relaxed),
            slow_inferences: self.slow_inference_count.load(Ordering::Relaxed),
        }
    }
}

impl AnomalyModel for OnnxModel {
    fn predict_batch(&self, rows: &[FeatureVector]) -> Result<Vec<f64>> {
        let start = Instant::now();

        let input = rows_to_tensor(rows, self.input_type)?;
        let result = self.plan.run(tvec!(input.into()))?;
        let output = result
            .get(self.output_index)
            .with_context(|| format!("No output at index {}", self.output_index))?;

        let values = output.cast_to::<f64>()?;
        let predictions = split_rows(values.as_slice::<f64>()?, rows.len())?;

        let elapsed = start.elapsed();
        self.inference_count.fetch_add(1, Ordering::Relaxed);

        if elapsed.as_millis() > MAX_INFERENCE_MS {
            self.slow_inference_count.fetch_add(1, Ordering::Relaxed);
            warn!(elapsed_ms = elapsed.as_millis(), "Inference exceeded {}ms target", MAX_INFERENCE_MS);
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        Ok(predictions)
    }

    fn metadata(&self) -> ModelMetadata {
        self.metadata.clone()
    }
}

/// Inference statistics
#[derive(Debug, Clone)]
pub struct InferenceStats {
    pub total_inferences: u64,
    pub slow_inferences: u64,
}

/// Stack rows into an `[rows, width]` tensor of the model's input type
fn rows_to_tensor(rows: &[FeatureVector], datum_type: DatumType) -> Result<Tensor> {
    let width = rows.first().context("Cannot run inference on an empty batch")?.len();
    if let Some(row) = rows.iter().find(|row| row.len() != width) {
        anyhow::bail!(
            "Ragged batch: expected {} features per row, found {}",
            width,
            row.len()
        );
    }

    let data: Vec<f64> = rows.iter().flat_map(|row| row.as_slice().iter().copied()).collect();
    let tensor: Tensor = tract_ndarray::Array2::from_shape_vec((rows.len(), width), data)?.into();
    Ok(tensor.cast_to_dt(datum_type)?.into_owned())
}

/// Take one value per row from a row-major output.
/// Outputs with several values per row contribute their first column.
fn split_rows(values: &[f64], rows: usize) -> Result<Vec<f64>> {
    if rows == 0 || values.len() < rows || values.len() % rows != 0 {
        anyhow::bail!(
            "Model output has {} values, which does not fit {} rows",
            values.len(),
            rows
        );
    }
    let stride = values.len() / rows;
    Ok(values.iter().step_by(stride).copied().collect())
}

fn describe(model: &TypedModel, source: String) -> Result<ModelMetadata> {
    let describe_outlets = |outlets: &[OutletId]| -> Result<Vec<TensorInfo>> {
        outlets
            .iter()
            .map(|outlet| {
                let name = model
                    .outlet_label(*outlet)
                    .map(str::to_string)
                    .unwrap_or_else(|| model.node(outlet.node).name.clone());
                let fact = model.outlet_fact(*outlet)?;
                Ok(TensorInfo {
                    name,
                    fact: format!("{:?}", fact),
                })
            })
            .collect()
    };

    Ok(ModelMetadata {
        source,
        inputs: describe_outlets(model.input_outlets()?)?,
        outputs: describe_outlets(model.output_outlets()?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;
    use std::io::Write;
    use tract_onnx::pb::{
        self,
        tensor_shape_proto::{dimension::Value as Dim, Dimension},
        type_proto,
    };

    const FLOAT: i32 = 1;
    const INT64: i32 = 7;

    fn tensor_info(name: &str, elem_type: i32, dims: Vec<Dim>) -> pb::ValueInfoProto {
        pb::ValueInfoProto {
            name: name.into(),
            r#type: Some(pb::TypeProto {
                value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                    elem_type,
                    shape: Some(pb::TensorShapeProto {
                        dim: dims
                            .into_iter()
                            .map(|d| Dimension {
                                value: Some(d),
                                ..Default::default()
                            })
                            .collect(),
                    }),
                })),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// `X[N, 3] -> ReduceSum -> score`, `score -> Cast(int64) -> label`.
    /// Outputs are `[label, score]`, the layout of an exported classifier.
    fn summing_model() -> Vec<u8> {
        let batch = Dim::DimParam("N".into());
        let sum = pb::NodeProto {
            input: vec!["X".into()],
            output: vec!["score".into()],
            op_type: "ReduceSum".into(),
            name: "sum".into(),
            attribute: vec![
                pb::AttributeProto {
                    name: "axes".into(),
                    r#type: 7,
                    ints: vec![1],
                    ..Default::default()
                },
                pb::AttributeProto {
                    name: "keepdims".into(),
                    r#type: 2,
                    i: 0,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let cast = pb::NodeProto {
            input: vec!["score".into()],
            output: vec!["label".into()],
            op_type: "Cast".into(),
            name: "cast".into(),
            attribute: vec![pb::AttributeProto {
                name: "to".into(),
                r#type: 2,
                i: INT64 as i64,
                ..Default::default()
            }],
            ..Default::default()
        };
        let graph = pb::GraphProto {
            name: "summing".into(),
            node: vec![sum, cast],
            input: vec![tensor_info("X", FLOAT, vec![batch.clone(), Dim::DimValue(3)])],
            output: vec![
                tensor_info("label", INT64, vec![batch.clone()]),
                tensor_info("score", FLOAT, vec![batch]),
            ],
            ..Default::default()
        };
        pb::ModelProto {
            ir_version: 7,
            graph: Some(graph),
            opset_import: vec![pb::OperatorSetIdProto {
                domain: "".into(),
                version: 11,
            }],
            ..Default::default()
        }
        .encode_to_vec()
    }

    fn options(input_features: Option<usize>, output_index: usize) -> ModelOptions {
        ModelOptions {
            input_features,
            output_index,
        }
    }

    #[test]
    fn test_label_output_is_cast_to_f64() {
        let model = OnnxModel::from_bytes(&summing_model(), &ModelOptions::default()).unwrap();
        let predictions = model
            .predict_batch(&[FeatureVector(vec![0.25, 0.25, 0.5])])
            .unwrap();

        assert_eq!(predictions, vec![1.0]);
    }

    #[test]
    fn test_output_index_selects_score() {
        let model = OnnxModel::from_bytes(&summing_model(), &options(None, 1)).unwrap();
        let predictions = model
            .predict_batch(&[FeatureVector(vec![0.1, 0.1, 0.17])])
            .unwrap();

        assert_eq!(predictions.len(), 1);
        assert!((predictions[0] - 0.37).abs() < 1e-6);
    }

    #[test]
    fn test_pinned_input_features() {
        let model = OnnxModel::from_bytes(&summing_model(), &options(Some(3), 0)).unwrap();
        let predictions = model
            .predict_batch(&[FeatureVector(vec![1.0, 1.0, 1.0])])
            .unwrap();

        assert_eq!(predictions, vec![3.0]);
    }

    #[test]
    fn test_width_mismatch_is_an_error() {
        let model = OnnxModel::from_bytes(&summing_model(), &ModelOptions::default()).unwrap();
        assert!(model.predict_batch(&[FeatureVector(vec![1.0, 2.0])]).is_err());
    }

    #[test]
    fn test_output_index_out_of_range() {
        let err = OnnxModel::from_bytes(&summing_model(), &options(None, 5))
            .err()
            .unwrap();
        assert!(err
            .to_string()
            .contains("Output index 5 out of range, model has 2 outputs"));
    }

    #[test]
    fn test_metadata_lists_inputs_and_outputs() {
        let model = OnnxModel::from_bytes(&summing_model(), &ModelOptions::default()).unwrap();
        let metadata = model.metadata();

        assert_eq!(metadata.source, "<memory>");
        assert_eq!(metadata.input_names(), vec!["X"]);
        assert!(metadata.inputs[0].fact.contains('3'));
        assert_eq!(metadata.outputs.len(), 2);
    }

    #[test]
    fn test_inference_stats_count_runs() {
        let model = OnnxModel::from_bytes(&summing_model(), &ModelOptions::default()).unwrap();
        for _ in 0..3 {
            model
                .predict_batch(&[FeatureVector(vec![0.0, 0.0, 0.0])])
                .unwrap();
        }

        let stats = model.stats();
        assert_eq!(stats.total_inferences, 3);
        assert!(stats.slow_inferences <= stats.total_inferences);
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&summing_model()).unwrap();

        let model = OnnxModel::from_path(file.path(), &options(None, 1)).unwrap();
        assert_eq!(model.metadata().source, file.path().display().to_string());

        let predictions = model
            .predict_batch(&[FeatureVector(vec![0.5, 0.5, 0.5])])
            .unwrap();
        assert_eq!(predictions, vec![1.5]);
    }

    #[test]
    fn test_served_through_prediction_service() {
        use crate::models::PredictRequest;
        use crate::predictor::PredictionService;
        use std::sync::Arc;

        let model = OnnxModel::from_bytes(&summing_model(), &options(None, 1)).unwrap();
        let service = PredictionService::new(Arc::new(model));

        let result = service
            .predict(&PredictRequest::from_slice(br#"{"features": [0.1, 0.1, 0.17]}"#).unwrap())
            .unwrap();
        assert!((result.trust_score - 63.0).abs() < 1e-4);

        let mismatch =
            service.predict(&PredictRequest::from_slice(br#"{"features": [1, 2]}"#).unwrap());
        assert!(matches!(mismatch, Err(crate::PredictError::PredictionFailure(_))));
    }

    #[test]
    fn test_rows_to_tensor_shape() {
        let rows = vec![FeatureVector(vec![0.1, 0.2, 0.3])];
        let tensor = rows_to_tensor(&rows, f32::datum_type()).unwrap();

        assert_eq!(tensor.shape(), &[1, 3]);
        assert_eq!(tensor.datum_type(), f32::datum_type());
    }

    #[test]
    fn test_rows_to_tensor_keeps_double_precision() {
        let rows = vec![FeatureVector(vec![0.1, 0.2])];
        let tensor = rows_to_tensor(&rows, f64::datum_type()).unwrap();

        assert_eq!(tensor.as_slice::<f64>().unwrap(), &[0.1, 0.2]);
    }

    #[test]
    fn test_rows_to_tensor_rejects_ragged_batch() {
        let rows = vec![FeatureVector(vec![1.0, 2.0]), FeatureVector(vec![1.0])];
        let err = rows_to_tensor(&rows, f32::datum_type()).unwrap_err();
        assert!(err.to_string().contains("Ragged batch"));
    }

    #[test]
    fn test_rows_to_tensor_rejects_empty_batch() {
        assert!(rows_to_tensor(&[], f32::datum_type()).is_err());
    }

    #[test]
    fn test_split_rows() {
        assert_eq!(split_rows(&[1.0], 1).unwrap(), vec![1.0]);
        assert_eq!(split_rows(&[0.2, 0.8, 0.6, 0.4], 2).unwrap(), vec![0.2, 0.6]);
        assert!(split_rows(&[], 1).is_err());
        assert!(split_rows(&[1.0, 2.0, 3.0], 2).is_err());
    }

    #[test]
    fn test_missing_model_file() {
        let err = OnnxModel::from_path("/nonexistent/model.onnx", &ModelOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, ModelError::Io { .. }));
    }

    #[test]
    fn test_invalid_model_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"this is not an onnx graph").unwrap();

        let err = OnnxModel::from_path(file.path(), &ModelOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, ModelError::Load(_)));
    }
}
