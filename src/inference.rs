use std::fs;

use ndarray::{Array1, Array2};
use serde::Deserialize;
use tract_onnx::prelude::*;

use crate::error::{InferenceError, StartupError};
use crate::models::FEATURE_DIM;

type RunnablePlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Everything a request handler needs: the fitted scaler and the classifier,
/// loaded once at boot and shared read-only across workers.
pub struct AppState {
    pub scaler: Scaler,
    pub classifier: Box<dyn Classify>,
}

/// Fitted statistics of the standardizing transform, as exported alongside
/// the classifier: `mean` and `scale`, one entry per feature.
#[derive(Debug, Deserialize)]
pub struct ScalerParams {
    pub mean: Vec<f32>,
    pub scale: Vec<f32>,
}

/// Standardizing feature scaler. `transform` maps each column `i` of a batch
/// through `(x - mean[i]) / scale[i]` without mutating its input.
#[derive(Debug, Clone)]
pub struct Scaler {
    mean: Array1<f32>,
    scale: Array1<f32>,
}

impl Scaler {
    pub fn load(path: &str) -> Result<Self, StartupError> {
        log::debug!("loading scaler parameters from {}", path);
        let raw = fs::read_to_string(path).map_err(|source| StartupError::ScalerRead {
            path: path.to_owned(),
            source,
        })?;
        let params: ScalerParams =
            serde_json::from_str(&raw).map_err(|source| StartupError::ScalerParse {
                path: path.to_owned(),
                source,
            })?;
        Self::from_params(params)
    }

    pub fn from_params(params: ScalerParams) -> Result<Self, StartupError> {
        if params.mean.len() != FEATURE_DIM || params.scale.len() != FEATURE_DIM {
            return Err(StartupError::ScalerInvalid(format!(
                "expected {} entries in mean and scale, got {} and {}",
                FEATURE_DIM,
                params.mean.len(),
                params.scale.len()
            )));
        }
        if params.scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            return Err(StartupError::ScalerInvalid(
                "scale entries must be finite and nonzero".to_owned(),
            ));
        }
        Ok(Self {
            mean: Array1::from(params.mean),
            scale: Array1::from(params.scale),
        })
    }

    pub fn transform(&self, batch: &Array2<f32>) -> Result<Array2<f32>, InferenceError> {
        if batch.ncols() != self.mean.len() {
            return Err(InferenceError::ShapeMismatch {
                expected: self.mean.len(),
                got: batch.ncols(),
            });
        }
        Ok((batch - &self.mean) / &self.scale)
    }
}

/// The classifier seam: a fitted model mapping a scaled batch to one label
/// per row.
pub trait Classify: Send + Sync {
    fn predict(&self, batch: &Array2<f32>) -> Result<Vec<i64>, InferenceError>;
}

/// ONNX classifier run through tract. The graph takes a `(batch, 7)` f32
/// tensor and emits a score matrix; the label is the argmax column per row.
pub struct OnnxClassifier {
    plan: RunnablePlan,
}

impl OnnxClassifier {
    pub fn load(path: &str) -> Result<Self, StartupError> {
        log::debug!("loading classifier from {}", path);
        let plan = onnx()
            .model_for_path(path)
            .and_then(|m| {
                m.with_input_fact(
                    0,
                    InferenceFact::dt_shape(f32::datum_type(), tvec!(1, FEATURE_DIM)),
                )
            })
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| StartupError::ClassifierLoad {
                path: path.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(Self { plan })
    }
}

impl Classify for OnnxClassifier {
    fn predict(&self, batch: &Array2<f32>) -> Result<Vec<i64>, InferenceError> {
        let (rows, cols) = batch.dim();
        if cols != FEATURE_DIM {
            return Err(InferenceError::ShapeMismatch {
                expected: FEATURE_DIM,
                got: cols,
            });
        }

        let tensor = tract_ndarray::Array::from_shape_vec((rows, cols), batch.iter().copied().collect())
            .map_err(|e| InferenceError::Execution(e.to_string()))?
            .into_tensor();

        let result = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| InferenceError::Execution(e.to_string()))?;

        let output = result[0]
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::Output(e.to_string()))?;
        let scores = output
            .into_dimensionality::<tract_ndarray::Ix2>()
            .map_err(|e| InferenceError::Output(e.to_string()))?;

        scores
            .outer_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| a.total_cmp(b))
                    .map(|(index, _)| index as i64)
                    .ok_or_else(|| {
                        InferenceError::Output("classifier returned an empty score row".to_owned())
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn fitted_scaler() -> Scaler {
        Scaler::from_params(ScalerParams {
            mean: vec![40.0, 7.0, 1.0, 25.0, 1.0, 5.0, 2.0],
            scale: vec![10.0, 1.0, 2.0, 25.0, 1.0, 5.0, 2.0],
        })
        .unwrap()
    }

    #[test]
    fn transform_standardizes_each_column() {
        let scaler = fitted_scaler();
        let batch = arr2(&[[50.0, 8.0, 3.0, 50.0, 2.0, 10.0, 4.0]]);
        let scaled = scaler.transform(&batch).unwrap();
        assert_eq!(scaled, arr2(&[[1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]]));
    }

    #[test]
    fn transform_does_not_mutate_its_input() {
        let scaler = fitted_scaler();
        let batch = arr2(&[[50.0, 8.0, 3.0, 50.0, 2.0, 10.0, 4.0]]);
        let copy = batch.clone();
        scaler.transform(&batch).unwrap();
        assert_eq!(batch, copy);
    }

    #[test]
    fn transform_rejects_the_wrong_width() {
        let scaler = fitted_scaler();
        let batch = arr2(&[[1.0, 2.0, 3.0]]);
        match scaler.transform(&batch) {
            Err(InferenceError::ShapeMismatch { expected, got }) => {
                assert_eq!(expected, 7);
                assert_eq!(got, 3);
            }
            other => panic!("expected a shape mismatch, got {:?}", other),
        }
    }

    #[test]
    fn scaler_params_must_cover_every_feature() {
        let result = Scaler::from_params(ScalerParams {
            mean: vec![0.0; 3],
            scale: vec![1.0; 3],
        });
        assert!(matches!(result, Err(StartupError::ScalerInvalid(_))));
    }

    #[test]
    fn zero_scale_is_rejected() {
        let result = Scaler::from_params(ScalerParams {
            mean: vec![0.0; 7],
            scale: vec![1.0, 1.0, 0.0, 1.0, 1.0, 1.0, 1.0],
        });
        assert!(matches!(result, Err(StartupError::ScalerInvalid(_))));
    }

    #[test]
    fn missing_scaler_artifact_fails_loading() {
        let result = Scaler::load("does-not-exist.json");
        assert!(matches!(result, Err(StartupError::ScalerRead { .. })));
    }

    #[test]
    fn missing_classifier_artifact_fails_loading() {
        let result = OnnxClassifier::load("does-not-exist.onnx");
        assert!(matches!(result, Err(StartupError::ClassifierLoad { .. })));
    }
}
