// src/preferences/mod.rs - Dining preferences: record, store, staging

pub mod model;
pub mod price;
pub mod storage;
pub mod store;

pub use model::{PreferenceField, PreferenceRecord, PriceRange, RatingKey};
pub use storage::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use store::{snap_rating, PreferenceStore, PREFERENCES_KEY};
