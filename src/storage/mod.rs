pub mod dismissed;
pub mod kv;
pub mod memory;

pub use dismissed::{DismissedSet, DISMISSED_KEY};
pub use kv::{JsonFileStore, KeyValueStore, MemoryStore};
pub use memory::{ItemStore, ItemStoreMetadata};
