mod error;
mod handlers;
mod inference;
mod models;

use std::{env, io};

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};

use crate::error::StartupError;
use crate::inference::{AppState, OnnxClassifier, Scaler};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_owned());
    let scaler_path = env::var("SCALER_PATH").unwrap_or_else(|_| "scaler.json".to_owned());
    let model_path = env::var("MODEL_PATH").unwrap_or_else(|_| "model.onnx".to_owned());

    // Both fitted artifacts must load before the listener binds.
    let scaler = Scaler::load(&scaler_path).map_err(fatal)?;
    let classifier = OnnxClassifier::load(&model_path).map_err(fatal)?;
    log::info!(
        "loaded scaler from {} and classifier from {}",
        scaler_path,
        model_path
    );

    let state = web::Data::new(AppState {
        scaler,
        classifier: Box::new(classifier),
    });

    log::info!("server running at http://{}", bind_addr);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(handlers::configure)
    })
    .bind(bind_addr)?
    .run()
    .await
}

fn fatal(err: StartupError) -> io::Error {
    log::error!("startup failed: {}", err);
    io::Error::new(io::ErrorKind::Other, err.to_string())
}
