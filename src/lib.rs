pub mod config;
pub mod consumer;
pub mod core;
pub mod error;
pub mod http_server;
pub mod monitoring;
pub mod sync;

pub use config::Config;
pub use core::{MessageProcessingPipeline, MessageProcessor};
pub use error::{ConsumerError, Result};
pub use http_server::HttpServer;
