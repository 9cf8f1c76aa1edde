use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{error, info};
use warp::Filter;

use crate::core::MessageProcessingPipeline;
use crate::monitoring::Metrics;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub struct HttpServer {
    pipeline: Arc<MessageProcessingPipeline>,
    port: u16,
}

impl HttpServer {
    pub fn new(pipeline: Arc<MessageProcessingPipeline>, port: u16) -> Self {
        Self { pipeline, port }
    }

    /// Serve `/health`, `/metrics` and `/metrics/json` until the pipeline is cancelled.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let pipeline = self.pipeline.clone();

        let health = warp::path("health").and(warp::get()).and_then(move || {
            let pipeline = pipeline.clone();
            async move {
                let health = pipeline.health().await;
                let status = if health.healthy {
                    warp::http::StatusCode::OK
                } else {
                    warp::http::StatusCode::SERVICE_UNAVAILABLE
                };
                Ok::<_, Infallible>(warp::reply::with_status(
                    warp::reply::json(&health),
                    status,
                ))
            }
        });

        let metrics = warp::path("metrics")
            .and(warp::path::end())
            .and(warp::get())
            .map(|| match Metrics::get_prometheus_metrics() {
                Ok(metrics_text) => {
                    warp::reply::with_header(metrics_text, "content-type", PROMETHEUS_CONTENT_TYPE)
                }
                Err(e) => {
                    error!("Failed to generate Prometheus metrics: {}", e);
                    warp::reply::with_header(
                        "# Unable to generate metrics".to_string(),
                        "content-type",
                        PROMETHEUS_CONTENT_TYPE,
                    )
                }
            });

        let json_pipeline = self.pipeline.clone();
        let json_metrics = warp::path!("metrics" / "json")
            .and(warp::get())
            .and_then(move || {
                let pipeline = json_pipeline.clone();
                async move {
                    let snapshot = pipeline.metrics.get_snapshot().await;
                    let queue_depth = pipeline.get_queue_depth().await.ok();

                    let response = json!({
                        "messages_consumed": snapshot.total_messages_consumed,
                        "messages_acked": snapshot.total_messages_acked,
                        "messages_rejected": snapshot.total_messages_rejected,
                        "messages_requeued": snapshot.total_messages_requeued,
                        "status_update_failures": snapshot.total_status_update_failures,
                        "rabbitmq_healthy": snapshot.rabbitmq_healthy,
                        "stores_healthy": snapshot.stores_healthy,
                        "queue_depth": queue_depth,
                        "uptime_seconds": snapshot.uptime_seconds,
                        "last_message_time": snapshot.last_message_time,
                    });

                    Ok::<_, Infallible>(warp::reply::json(&response))
                }
            });

        let routes = health.or(json_metrics).or(metrics);

        let shutdown = self.pipeline.get_cancellation_token();
        let (addr, server) = warp::serve(routes).try_bind_with_graceful_shutdown(
            ([0, 0, 0, 0], self.port),
            async move {
                shutdown.cancelled().await;
            },
        )?;

        info!("Starting HTTP server on {}", addr);
        server.await;
        info!("HTTP server stopped");

        Ok(())
    }
}
