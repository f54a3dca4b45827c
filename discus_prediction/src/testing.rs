//! Fixtures shared by the unit tests.

use crate::{
    config::ServerConfig, error::PredictionError, inference_service::InferenceService,
    model_service::ModelService, server::build_router, state::LabelSet, telemetry::Metrics,
};
use axum::{
    body::{to_bytes, Body},
    http::Request,
    response::Response,
    Router,
};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use ndarray::{Array, Axis, Ix4};
use serde_json::Value;
use std::{io::Cursor, sync::Arc};
use tower::ServiceExt;

/// Scores the class whose index matches the mean red intensity, so a black
/// image lands on class 0 and a pure red one on the last class.
#[derive(Clone)]
pub struct MockModelService {
    num_classes: usize,
}

impl MockModelService {
    pub fn new(num_classes: usize) -> Self {
        Self { num_classes }
    }
}

impl ModelService for MockModelService {
    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn infer(&self, input: &Array<f32, Ix4>) -> Result<Vec<f32>, PredictionError> {
        let red = input.index_axis(Axis(1), 0).mean().unwrap_or(0.0);
        let class_id = (red * (self.num_classes - 1) as f32).round() as usize;

        let mut logits = vec![0.0; self.num_classes];
        logits[class_id.min(self.num_classes - 1)] = 10.0;
        Ok(logits)
    }
}

pub fn discus_labels() -> LabelSet {
    LabelSet::parse(Cursor::new(include_str!("../models/discus_labels.txt")))
        .expect("shipped label file is valid")
}

pub fn encode_image(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, format).expect("image encodes");
    cursor.into_inner()
}

pub fn solid_png(rgb: [u8; 3]) -> Vec<u8> {
    let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(120, 80, Rgb(rgb));
    encode_image(&DynamicImage::ImageRgb8(img), ImageFormat::Png)
}

/// Same image as [`solid_png`] but stored uncompressed, so the upload size is
/// roughly `width * height * 3` bytes.
pub fn solid_bmp(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(width, height, Rgb(rgb));
    encode_image(&DynamicImage::ImageRgb8(img), ImageFormat::Bmp)
}

pub fn server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        expose_error_details: true,
        max_upload_bytes: None,
    }
}

/// Full router over the mock model and the shipped label set.
pub fn test_router(server_config: &ServerConfig) -> Router {
    let inference_service = InferenceService::new(MockModelService::new(21), discus_labels())
        .expect("label set matches mock head");
    let metrics = Arc::new(Metrics::new().expect("metrics exporter builds"));
    build_router(inference_service, metrics, server_config)
}

pub async fn get(router: Router, uri: &str) -> Response {
    router
        .oneshot(Request::get(uri).body(Body::empty()).expect("request builds"))
        .await
        .expect("router is infallible")
}

pub async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body is readable");
    serde_json::from_slice(&bytes).expect("body is json")
}
