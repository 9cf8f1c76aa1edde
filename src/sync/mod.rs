pub mod postgres_client;
pub mod stores;
pub mod surreal_client;

pub use postgres_client::PostgresClient;
pub use stores::{CampaignStatusStore, MessageStore};
pub use surreal_client::SurrealClient;

#[cfg(any(test, feature = "testing"))]
pub use stores::{MockCampaignStatusStore, MockMessageStore};
