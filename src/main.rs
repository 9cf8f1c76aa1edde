use campaign_message_consumer::{Config, HttpServer, MessageProcessingPipeline};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration first: the log level comes from it
    let config = Config::from_env();

    let default_filter = config
        .as_ref()
        .map(Config::log_filter)
        .unwrap_or_else(|_| "campaign_message_consumer=info,warn".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting campaign message consumer");

    let config = config.map_err(|e| {
        error!("Failed to load configuration: {e}");
        e
    })?;

    config.validate().map_err(|e| {
        error!("Configuration validation failed: {e}");
        e
    })?;

    info!("Configuration loaded successfully");
    info!("RabbitMQ queue: {}", config.queue);
    info!("SurrealDB: {} ({}/{})", config.surreal_url, config.surreal_ns, config.surreal_db);
    info!(
        "Prefetch: {}, store timeout: {}ms",
        config.prefetch_count, config.processing_timeout_ms
    );

    let pipeline = Arc::new(
        MessageProcessingPipeline::new(config.clone())
            .await
            .map_err(|e| {
                error!("Failed to create pipeline: {e}");
                e
            })?,
    );

    let http_server = HttpServer::new(pipeline.clone(), config.http_port);
    let http_handle = tokio::spawn(async move {
        if let Err(e) = http_server.start().await {
            error!("HTTP server error: {e}");
        }
    });

    let shutdown_pipeline = pipeline.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        warn!("Received shutdown signal, finishing in-flight delivery...");

        if let Err(e) = shutdown_pipeline.stop().await {
            error!("Error during shutdown: {e}");
        }
    });

    info!("Pipeline initialized successfully, consuming messages...");
    let result = pipeline.start().await;

    // Stops the HTTP server too when the pipeline ended on its own
    if let Err(e) = pipeline.stop().await {
        error!("Error during shutdown: {e}");
    }
    if let Err(e) = http_handle.await {
        warn!("HTTP server task panicked: {e}");
    }

    match result {
        Ok(()) => {
            info!("Pipeline shut down gracefully");
            Ok(())
        }
        Err(e) => {
            error!("Pipeline error: {e}");
            Err(e.into())
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut term, mut int) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(term), Ok(int)) => (term, int),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to register signal handlers: {e}");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = term.recv() => info!("Received SIGTERM"),
        _ = int.recv() => info!("Received SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
