use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Gauge, Histogram, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::warn;

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
    static ref MESSAGES_CONSUMED_COUNTER: Counter = Counter::new(
        "campaign_consumer_messages_consumed_total",
        "Total deliveries received from the queue"
    ).unwrap();
    static ref MESSAGES_ACKED_COUNTER: Counter = Counter::new(
        "campaign_consumer_messages_acked_total",
        "Total deliveries acknowledged"
    ).unwrap();
    static ref MESSAGES_REJECTED_COUNTER: Counter = Counter::new(
        "campaign_consumer_messages_rejected_total",
        "Total deliveries discarded as malformed or incomplete"
    ).unwrap();
    static ref MESSAGES_REQUEUED_COUNTER: Counter = Counter::new(
        "campaign_consumer_messages_requeued_total",
        "Total deliveries returned to the queue after a transient failure"
    ).unwrap();
    static ref DOCUMENTS_SAVED_COUNTER: Counter = Counter::new(
        "campaign_consumer_documents_saved_total",
        "Total message documents written to SurrealDB"
    ).unwrap();
    static ref CAMPAIGNS_MARKED_SENT_COUNTER: Counter = Counter::new(
        "campaign_consumer_campaigns_marked_sent_total",
        "Total campaigns transitioned to SENT"
    ).unwrap();
    static ref CAMPAIGNS_NOT_FOUND_COUNTER: Counter = Counter::new(
        "campaign_consumer_campaigns_not_found_total",
        "Total last-message deliveries whose campaign did not exist"
    ).unwrap();
    static ref STATUS_UPDATE_FAILURES_COUNTER: Counter = Counter::new(
        "campaign_consumer_status_update_failures_total",
        "Total campaign status updates that failed after the message was stored"
    ).unwrap();
    static ref PROCESSING_DURATION_HISTOGRAM: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "campaign_consumer_processing_duration_seconds",
            "Time spent processing a delivery in seconds"
        ).buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0])
    ).unwrap();
    static ref RABBITMQ_HEALTHY_GAUGE: Gauge = Gauge::new(
        "campaign_consumer_rabbitmq_healthy",
        "RabbitMQ consumer health status (1=healthy, 0=unhealthy)"
    ).unwrap();
    static ref STORES_HEALTHY_GAUGE: Gauge = Gauge::new(
        "campaign_consumer_stores_healthy",
        "Document and status store health status (1=healthy, 0=unhealthy)"
    ).unwrap();
    static ref UPTIME_GAUGE: Gauge = Gauge::new(
        "campaign_consumer_uptime_seconds",
        "Application uptime in seconds"
    ).unwrap();
}

#[derive(Debug, Clone)]
pub struct Metrics {
    messages_consumed: Arc<AtomicU64>,
    messages_acked: Arc<AtomicU64>,
    messages_rejected: Arc<AtomicU64>,
    messages_requeued: Arc<AtomicU64>,
    status_update_failures: Arc<AtomicU64>,

    start_time: DateTime<Utc>,
    last_message_time: Arc<RwLock<Option<DateTime<Utc>>>>,

    rabbitmq_healthy: Arc<AtomicBool>,
    stores_healthy: Arc<AtomicBool>,
}

impl Metrics {
    pub fn new() -> Self {
        // Registration fails on repeated construction (e.g. in tests); the statics keep counting
        let collectors: Vec<(&str, Box<dyn prometheus::core::Collector>)> = vec![
            ("MESSAGES_CONSUMED_COUNTER", Box::new(MESSAGES_CONSUMED_COUNTER.clone())),
            ("MESSAGES_ACKED_COUNTER", Box::new(MESSAGES_ACKED_COUNTER.clone())),
            ("MESSAGES_REJECTED_COUNTER", Box::new(MESSAGES_REJECTED_COUNTER.clone())),
            ("MESSAGES_REQUEUED_COUNTER", Box::new(MESSAGES_REQUEUED_COUNTER.clone())),
            ("DOCUMENTS_SAVED_COUNTER", Box::new(DOCUMENTS_SAVED_COUNTER.clone())),
            ("CAMPAIGNS_MARKED_SENT_COUNTER", Box::new(CAMPAIGNS_MARKED_SENT_COUNTER.clone())),
            ("CAMPAIGNS_NOT_FOUND_COUNTER", Box::new(CAMPAIGNS_NOT_FOUND_COUNTER.clone())),
            ("STATUS_UPDATE_FAILURES_COUNTER", Box::new(STATUS_UPDATE_FAILURES_COUNTER.clone())),
            ("PROCESSING_DURATION_HISTOGRAM", Box::new(PROCESSING_DURATION_HISTOGRAM.clone())),
            ("RABBITMQ_HEALTHY_GAUGE", Box::new(RABBITMQ_HEALTHY_GAUGE.clone())),
            ("STORES_HEALTHY_GAUGE", Box::new(STORES_HEALTHY_GAUGE.clone())),
            ("UPTIME_GAUGE", Box::new(UPTIME_GAUGE.clone())),
        ];
        for (name, collector) in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                warn!("Failed to register {}: {}", name, e);
            }
        }

        Self {
            messages_consumed: Arc::new(AtomicU64::new(0)),
            messages_acked: Arc::new(AtomicU64::new(0)),
            messages_rejected: Arc::new(AtomicU64::new(0)),
            messages_requeued: Arc::new(AtomicU64::new(0)),
            status_update_failures: Arc::new(AtomicU64::new(0)),
            start_time: Utc::now(),
            last_message_time: Arc::new(RwLock::new(None)),
            rabbitmq_healthy: Arc::new(AtomicBool::new(false)),
            stores_healthy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn record_message_consumed(&self) {
        self.messages_consumed.fetch_add(1, Ordering::Relaxed);
        MESSAGES_CONSUMED_COUNTER.inc();
    }

    pub fn record_message_acked(&self) {
        self.messages_acked.fetch_add(1, Ordering::Relaxed);
        MESSAGES_ACKED_COUNTER.inc();
    }

    pub fn record_message_rejected(&self) {
        self.messages_rejected.fetch_add(1, Ordering::Relaxed);
        MESSAGES_REJECTED_COUNTER.inc();
    }

    pub fn record_message_requeued(&self) {
        self.messages_requeued.fetch_add(1, Ordering::Relaxed);
        MESSAGES_REQUEUED_COUNTER.inc();
    }

    pub fn record_document_saved(&self) {
        DOCUMENTS_SAVED_COUNTER.inc();
    }

    pub fn record_campaign_marked_sent(&self) {
        CAMPAIGNS_MARKED_SENT_COUNTER.inc();
    }

    pub fn record_campaign_not_found(&self) {
        CAMPAIGNS_NOT_FOUND_COUNTER.inc();
    }

    pub fn record_status_update_failure(&self) {
        self.status_update_failures.fetch_add(1, Ordering::Relaxed);
        STATUS_UPDATE_FAILURES_COUNTER.inc();
    }

    pub fn record_processing_time(&self, duration: Duration) {
        PROCESSING_DURATION_HISTOGRAM.observe(duration.as_secs_f64());
    }

    pub fn set_rabbitmq_health(&self, healthy: bool) {
        self.rabbitmq_healthy.store(healthy, Ordering::Relaxed);
        RABBITMQ_HEALTHY_GAUGE.set(if healthy { 1.0 } else { 0.0 });
    }

    pub fn set_stores_health(&self, healthy: bool) {
        self.stores_healthy.store(healthy, Ordering::Relaxed);
        STORES_HEALTHY_GAUGE.set(if healthy { 1.0 } else { 0.0 });
    }

    pub async fn update_last_message_time(&self) {
        *self.last_message_time.write().await = Some(Utc::now());
    }

    pub async fn get_snapshot(&self) -> MetricsSnapshot {
        let uptime = (Utc::now() - self.start_time).num_seconds().max(0) as u64;
        UPTIME_GAUGE.set(uptime as f64);

        MetricsSnapshot {
            total_messages_consumed: self.messages_consumed.load(Ordering::Relaxed),
            total_messages_acked: self.messages_acked.load(Ordering::Relaxed),
            total_messages_rejected: self.messages_rejected.load(Ordering::Relaxed),
            total_messages_requeued: self.messages_requeued.load(Ordering::Relaxed),
            total_status_update_failures: self.status_update_failures.load(Ordering::Relaxed),
            rabbitmq_healthy: self.rabbitmq_healthy.load(Ordering::Relaxed),
            stores_healthy: self.stores_healthy.load(Ordering::Relaxed),
            uptime_seconds: uptime,
            start_time: self.start_time,
            last_message_time: *self.last_message_time.read().await,
        }
    }

    pub fn get_prometheus_metrics() -> Result<String, Box<dyn std::error::Error>> {
        let encoder = TextEncoder::new();
        let metric_families = REGISTRY.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    #[cfg(test)]
    pub fn reset_for_tests() {
        MESSAGES_CONSUMED_COUNTER.reset();
        MESSAGES_ACKED_COUNTER.reset();
        MESSAGES_REJECTED_COUNTER.reset();
        MESSAGES_REQUEUED_COUNTER.reset();
        DOCUMENTS_SAVED_COUNTER.reset();
        CAMPAIGNS_MARKED_SENT_COUNTER.reset();
        CAMPAIGNS_NOT_FOUND_COUNTER.reset();
        STATUS_UPDATE_FAILURES_COUNTER.reset();
        // Note: Histogram types don't support reset()
        RABBITMQ_HEALTHY_GAUGE.set(0.0);
        STORES_HEALTHY_GAUGE.set(0.0);
        UPTIME_GAUGE.set(0.0);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_messages_consumed: u64,
    pub total_messages_acked: u64,
    pub total_messages_rejected: u64,
    pub total_messages_requeued: u64,
    pub total_status_update_failures: u64,
    pub rabbitmq_healthy: bool,
    pub stores_healthy: bool,
    pub uptime_seconds: u64,
    pub start_time: DateTime<Utc>,
    pub last_message_time: Option<DateTime<Utc>>,
}
