use crate::{model_service::ModelService, server::SharedState};
use axum::{
    extract::State,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

#[derive(Serialize)]
pub struct ClassLabels<'a> {
    labels: &'a [String],
}

/// Class names in model output order.
pub async fn class_labels<M: ModelService>(
    State(state): State<SharedState<M>>,
) -> Response {
    let labels = state.inference_service.labels();
    Json(ClassLabels {
        labels: labels.as_slice(),
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use crate::testing::{get, json_body, server_config, test_router};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_labels_route() {
        let response = get(test_router(&server_config()), "/labels").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let labels = body["labels"].as_array().unwrap();
        assert_eq!(labels.len(), 21);
        assert_eq!(labels[0], "Albino_Golden");
        assert_eq!(labels[11], "Pigeon_Blood");
        assert_eq!(labels[20], "Wild");
    }
}
