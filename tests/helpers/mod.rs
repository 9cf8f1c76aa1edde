pub mod db_assertions;
pub mod mock_messages;

pub use db_assertions::DbAssertions;
pub use mock_messages::MessageBuilder;
pub use test_harness::TestHarness;
