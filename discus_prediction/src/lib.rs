mod inference_service;
mod model_service;
mod ort_service;
mod postprocessing;
mod preprocessing;
mod routes;
mod server;
mod state;
mod telemetry;

pub mod config;
pub mod error;

#[cfg(test)]
mod testing;

pub use inference_service::{InferenceService, Prediction};
pub use model_service::ModelService;
pub use ort_service::OrtModelService;
pub use server::{build_router, start_server, HttpServer};
pub use state::LabelSet;
pub use telemetry::Metrics;
