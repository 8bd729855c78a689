use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Request-level failures, mapped onto HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed, missing, or mistyped input fields, or an empty batch.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The scaler or classifier failed during transform/predict.
    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let kind = match self {
            ApiError::Validation(_) => "validation",
            ApiError::Inference(_) => "inference",
        };
        HttpResponse::build(self.status_code()).json(json!({
            "error": kind,
            "message": self.to_string(),
        }))
    }
}

/// Failure inside the scaler or classifier call. Not retried.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("expected {expected} features per record, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("model execution failed: {0}")]
    Execution(String),

    #[error("model output unusable: {0}")]
    Output(String),
}

/// Boot-time failures. Fatal: the server must not start serving without
/// both fitted artifacts.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read scaler parameters from {path}: {source}")]
    ScalerRead {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse scaler parameters from {path}: {source}")]
    ScalerParse {
        path: String,
        source: serde_json::Error,
    },

    #[error("invalid scaler parameters: {0}")]
    ScalerInvalid(String),

    #[error("failed to load classifier from {path}: {reason}")]
    ClassifierLoad { path: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        let err = ApiError::Validation("missing field `age`".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn inference_maps_to_500() {
        let err = ApiError::from(InferenceError::ShapeMismatch {
            expected: 7,
            got: 3,
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn error_body_names_the_kind() {
        let err = ApiError::Validation("bad".into());
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
