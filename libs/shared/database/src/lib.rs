pub mod kv;
pub mod seed;
pub mod snapshot;
pub mod store;

pub use kv::{
    cache_json, KeyValueStore, KvError, MemoryKeyValueStore, RedisKeyValueStore, DEPARTMENTS_CACHE_KEY,
    DEPARTMENTS_CACHE_TTL_SECONDS,
};
pub use store::{EntityStore, StoreError, Tables};
