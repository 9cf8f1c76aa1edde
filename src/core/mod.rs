pub mod decoder;
pub mod pipeline;
pub mod processor;
pub mod types;

pub use pipeline::MessageProcessingPipeline;
pub use processor::MessageProcessor;
pub use types::*;
