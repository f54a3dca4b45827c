mod labels;
mod metrics;
mod predict_image;
mod status;

use crate::{model_service::ModelService, server::SharedState};
use axum::{
    routing::{get, post},
    Router,
};

pub fn api_routes<M: ModelService>() -> Router<SharedState<M>> {
    Router::new()
        .route("/", get(status::info))
        .route("/health", get(status::healthcheck))
        .route("/labels", get(labels::class_labels::<M>))
        .route("/metrics", get(metrics::metrics_handler::<M>))
        .route("/predict", post(predict_image::predict_image::<M>))
}
