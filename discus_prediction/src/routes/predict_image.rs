use crate::{error::PredictionError, model_service::ModelService, server::SharedState};
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;

const ROUTE: &str = "/predict";
const FILE_FIELD: &str = "file";

#[derive(Serialize)]
pub struct PredictionResponse {
    predicted_class: String,
    confidence: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    error: String,
}

#[derive(Error, Debug)]
pub enum PredictImageError {
    #[error("missing multipart field `{0}`")]
    MissingField(&'static str),
    #[error("invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    Prediction(#[from] PredictionError),
    #[error("prediction failed")]
    PredictionFailed,
}

impl PredictImageError {
    fn status(&self) -> StatusCode {
        match self {
            PredictImageError::MissingField(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PredictImageError::Multipart(err) => err.status(),
            PredictImageError::Prediction(_) | PredictImageError::PredictionFailed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for PredictImageError {
    fn into_response(self) -> Response {
        let error = ErrorResponse {
            error: self.to_string(),
        };
        (self.status(), Json(error)).into_response()
    }
}

/// Reads the `file` field of the form into memory. Other fields are ignored.
async fn read_file_field(multipart: &mut Multipart) -> Result<Vec<u8>, PredictImageError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) {
            return Ok(field.bytes().await?.to_vec());
        }
    }

    Err(PredictImageError::MissingField(FILE_FIELD))
}

#[instrument(skip(state, multipart))]
pub async fn predict_image<M: ModelService>(
    State(state): State<SharedState<M>>,
    mut multipart: Multipart,
) -> Result<Json<PredictionResponse>, PredictImageError> {
    state.metrics.record_request(ROUTE);

    let image_data = read_file_field(&mut multipart).await?;

    let start = Instant::now();
    let result = state.inference_service.predict(image_data.into()).await;
    state
        .metrics
        .record_prediction_duration(start.elapsed().as_millis() as u64, ROUTE);

    match result {
        Ok(prediction) => {
            state.metrics.record_prediction(&prediction.label);
            Ok(Json(PredictionResponse {
                confidence: prediction.confidence(),
                predicted_class: prediction.label,
            }))
        }
        Err(err) => {
            tracing::error!("Prediction failed: {}", err);
            if state.expose_error_details {
                Err(err.into())
            } else {
                Err(PredictImageError::PredictionFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::ServerConfig,
        testing::{get, json_body, server_config, solid_bmp, solid_png, test_router},
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use tower::ServiceExt;

    const BOUNDARY: &str = "discus-test-boundary";

    fn router(expose_error_details: bool) -> Router {
        test_router(&ServerConfig {
            expose_error_details,
            ..server_config()
        })
    }

    fn multipart_body(field: &str, filename: &str, data: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn predict_request(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/predict")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_predict_returns_class_and_confidence() {
        let body = multipart_body("file", "fish.png", &solid_png([255, 0, 0]));

        let response = router(true).oneshot(predict_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["predicted_class"], "Wild");
        let confidence = body["confidence"].as_str().unwrap();
        assert!(confidence.ends_with('%'));
        let value: f64 = confidence.trim_end_matches('%').parse().unwrap();
        assert!(value > 50.0 && value <= 100.0);
    }

    #[tokio::test]
    async fn test_predict_accepts_uploads_above_default_body_limit() {
        // axum caps bodies at 2 MB unless the limit is lifted.
        let image = solid_bmp(1024, 1024, [0, 0, 0]);
        assert!(image.len() > 3 * 1024 * 1024);
        let body = multipart_body("file", "fish.bmp", &image);

        let response = router(true).oneshot(predict_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["predicted_class"], "Albino_Golden");
    }

    #[tokio::test]
    async fn test_predict_rejects_uploads_above_configured_limit() {
        let app = test_router(&ServerConfig {
            max_upload_bytes: Some(1024),
            ..server_config()
        });
        let image = solid_bmp(120, 80, [0, 0, 0]);
        assert!(image.len() > 1024);
        let body = multipart_body("file", "fish.bmp", &image);

        let response = app.oneshot(predict_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_predict_skips_other_fields() {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n"
        )
        .into_bytes();
        body.extend_from_slice(&multipart_body("file", "fish.png", &solid_png([0, 0, 0])));

        let response = router(true).oneshot(predict_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["predicted_class"], "Albino_Golden");
    }

    #[tokio::test]
    async fn test_predict_non_image_is_server_error() {
        let body = multipart_body("file", "notes.txt", b"just some text, not a picture");

        let response = router(true).oneshot(predict_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        let error = body["error"].as_str().unwrap();
        assert!(error.starts_with("Error decoding image"));
    }

    #[tokio::test]
    async fn test_predict_hides_error_details_when_configured() {
        let body = multipart_body("file", "notes.txt", b"just some text, not a picture");

        let response = router(false).oneshot(predict_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error"], "prediction failed");
    }

    #[tokio::test]
    async fn test_predict_without_file_field_is_rejected() {
        let body = multipart_body("image", "fish.png", &solid_png([0, 0, 0]));

        let response = router(true).oneshot(predict_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            json_body(response).await["error"],
            "missing multipart field `file`"
        );
    }

    #[tokio::test]
    async fn test_predict_without_multipart_body_is_rejected() {
        let request = Request::post("/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let response = router(true).oneshot(request).await.unwrap();

        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let request = Request::get("/")
            .header(header::ORIGIN, "http://localhost:5173")
            .body(Body::empty())
            .unwrap();

        let response = router(true).oneshot(request).await.unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5173"
        );
    }

    #[tokio::test]
    async fn test_metrics_route() {
        let app = router(true);
        let body = multipart_body("file", "fish.png", &solid_png([0, 0, 0]));
        app.clone().oneshot(predict_request(body)).await.unwrap();

        let response = get(app, "/metrics").await;

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("predictions_total"));
    }
}
