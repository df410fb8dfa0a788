pub mod checkpoint_store;
pub mod sqlite_store;

pub use checkpoint_store::{CheckpointStore, InMemoryCheckpointStore, SessionSummary};
pub use sqlite_store::SqliteCheckpointStore;
