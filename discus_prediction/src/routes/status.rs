use axum::response::{IntoResponse, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct Liveness {
    state: &'static str,
}

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
}

/// Fixed payload the web front end polls before enabling uploads.
pub async fn info() -> impl IntoResponse {
    Json(Liveness {
        state: "Back end runs properly",
    })
}

pub async fn healthcheck() -> impl IntoResponse {
    Json(Health {
        status: "Available",
    })
}
