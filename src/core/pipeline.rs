use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::processor::MessageProcessor;
use super::types::{PipelineHealth, PipelineMetrics};
use crate::config::Config;
use crate::consumer::RabbitMQConsumer;
use crate::error::{ConsumerError, Result};
use crate::monitoring::Metrics;
use crate::sync::{PostgresClient, SurrealClient};

pub struct MessageProcessingPipeline {
    config: Config,
    consumer: RabbitMQConsumer,
    processor: MessageProcessor,
    surreal_client: Arc<SurrealClient>,
    postgres_client: Arc<PostgresClient>,
    pub metrics: Arc<Metrics>,
    is_running: AtomicBool,
    cancellation_token: CancellationToken,
}

impl MessageProcessingPipeline {
    /// Connect both stores, then the broker. Any failure here is fatal for the process.
    pub async fn new(config: Config) -> Result<Self> {
        info!("Initializing message processing pipeline");

        let postgres_client = Arc::new(
            PostgresClient::new(&config.database_url, config.database_pool_size).await?,
        );

        let surreal_client = Arc::new(
            SurrealClient::new(
                &config.surreal_url,
                &config.surreal_user,
                &config.surreal_pass,
                &config.surreal_ns,
                &config.surreal_db,
            )
            .await?,
        );

        // Subscribe last so no delivery arrives before the stores are usable
        let consumer = RabbitMQConsumer::new(
            &config.rabbitmq_url,
            &config.queue,
            config.prefetch_count,
            &config.consumer_tag,
        )
        .await?;

        let metrics = Arc::new(Metrics::new());

        let processor = MessageProcessor::new(
            surreal_client.clone(),
            postgres_client.clone(),
            metrics.clone(),
            config.processing_timeout(),
        );

        Ok(Self {
            config,
            consumer,
            processor,
            surreal_client,
            postgres_client,
            metrics,
            is_running: AtomicBool::new(false),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Consume until `stop` is called or the broker subscription ends.
    pub async fn start(&self) -> Result<()> {
        if self
            .is_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ConsumerError::Broker(
                "Pipeline is already running".to_string(),
            ));
        }

        info!(
            queue = self.consumer.queue(),
            prefetch_count = self.config.prefetch_count,
            timeout_ms = self.config.processing_timeout_ms,
            "Starting message processing pipeline"
        );

        self.metrics.set_rabbitmq_health(true);
        self.metrics.set_stores_health(true);

        let result = self
            .processor
            .run(self.consumer.deliveries(), &self.cancellation_token)
            .await;

        self.metrics.set_rabbitmq_health(false);

        if let Err(e) = self.consumer.close().await {
            warn!(error = %e, "Failed to close RabbitMQ consumer cleanly");
        }

        self.is_running.store(false, Ordering::SeqCst);

        match &result {
            Ok(()) => info!("Pipeline stopped"),
            Err(e) => error!(error = %e, "Pipeline stopped with error"),
        }

        result
    }

    pub async fn stop(&self) -> Result<()> {
        info!("Stopping message processing pipeline");
        self.cancellation_token.cancel();
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub async fn health(&self) -> PipelineHealth {
        let snapshot = self.metrics.get_snapshot().await;

        let rabbitmq_consumer_healthy = snapshot.rabbitmq_healthy && self.consumer.is_connected();
        let stores_healthy =
            self.surreal_client.is_healthy().await && self.postgres_client.is_healthy().await;

        PipelineHealth {
            healthy: rabbitmq_consumer_healthy && stores_healthy,
            rabbitmq_consumer_healthy,
            stores_healthy,
            last_check: chrono::Utc::now(),
            metrics: PipelineMetrics {
                total_messages_consumed: snapshot.total_messages_consumed,
                total_messages_acked: snapshot.total_messages_acked,
                total_messages_rejected: snapshot.total_messages_rejected,
                total_messages_requeued: snapshot.total_messages_requeued,
                total_status_update_failures: snapshot.total_status_update_failures,
            },
        }
    }

    pub fn get_cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub async fn get_queue_depth(&self) -> Result<u32> {
        self.consumer.get_queue_depth().await
    }
}
