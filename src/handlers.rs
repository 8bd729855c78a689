use actix_web::{web, HttpResponse};
use ndarray::{Array1, Axis};

use crate::error::ApiError;
use crate::inference::AppState;
use crate::models::{FeatureRecord, HealthResponse};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        ApiError::Validation(err.to_string()).into()
    }))
    .service(web::resource("/input").route(web::post().to(predict)))
    .service(web::resource("/health").route(web::get().to(health)));
}

/// Score a submitted batch of records. Only the first record is scored;
/// additional records are dropped, a policy kept from the original API.
pub async fn predict(
    state: web::Data<AppState>,
    records: web::Json<Vec<FeatureRecord>>,
) -> Result<HttpResponse, ApiError> {
    let records = records.into_inner();
    let first = records.first().ok_or_else(|| {
        ApiError::Validation("request body must contain at least one record".to_owned())
    })?;
    if records.len() > 1 {
        log::warn!(
            "received {} records, scoring only the first",
            records.len()
        );
    }

    let batch = Array1::from(first.to_features().to_vec()).insert_axis(Axis(0));
    let scaled = state.scaler.transform(&batch)?;
    let labels = state.classifier.predict(&scaled)?;
    log::debug!("scored record as {:?}", labels);

    Ok(HttpResponse::Ok().json(labels))
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        model_loaded: true,
    })
}
