use crate::{
    config::{Config, ServerConfig, Validatable},
    error::ModelLoadError,
    inference_service::InferenceService,
    model_service::ModelService,
    ort_service::OrtModelService,
    routes::api_routes,
    state::LabelSet,
    telemetry::Metrics,
};
use axum::{extract::DefaultBodyLimit, Router};
use axum_otel_metrics::HttpMetricsLayerBuilder;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;

pub struct SharedState<M: ModelService> {
    pub inference_service: InferenceService<M>,
    pub metrics: Arc<Metrics>,
    pub expose_error_details: bool,
}

impl<M: ModelService> Clone for SharedState<M> {
    fn clone(&self) -> Self {
        Self {
            inference_service: self.inference_service.clone(),
            metrics: self.metrics.clone(),
            expose_error_details: self.expose_error_details,
        }
    }
}

pub fn build_router<M: ModelService>(
    inference_service: InferenceService<M>,
    metrics: Arc<Metrics>,
    server_config: &ServerConfig,
) -> Router {
    let app_state = SharedState {
        inference_service,
        metrics,
        expose_error_details: server_config.expose_error_details,
    };

    let body_limit = match server_config.max_upload_bytes {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        .merge(api_routes::<M>())
        .with_state(app_state)
        .layer(body_limit)
        .layer(CorsLayer::very_permissive())
        .layer(HttpMetricsLayerBuilder::new().build())
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new<M: ModelService>(
        inference_service: InferenceService<M>,
        server_config: &ServerConfig,
    ) -> anyhow::Result<Self> {
        let metrics = Arc::new(Metrics::new()?);
        let router = build_router(inference_service, metrics, server_config);
        let listener = TcpListener::bind(server_config.get_address()).await?;

        Ok(Self { router, listener })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        tracing::info!("Prediction service listening on {}", self.listener.local_addr()?);

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async {
                shutdown_signal().await;
                tracing::info!("Shutdown signal received, starting graceful shutdown");
            })
            .await?;

        Ok(())
    }
}

pub async fn start_server(config: Config) -> anyhow::Result<()> {
    let labels_path = config.labels.get_path();
    let labels = LabelSet::load(&labels_path).map_err(|source| ModelLoadError::Labels {
        path: labels_path,
        source,
    })?;

    let ort_model_service = OrtModelService::new(&config.model).inspect_err(|e| {
        tracing::error!("Failed to instantiate ort model service: {}", e);
    })?;
    let inference_service = InferenceService::new(ort_model_service, labels)?;
    tracing::info!("Serving {} classes", inference_service.labels().len());

    let server = HttpServer::new(inference_service, &config.server).await?;
    server.run().await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
