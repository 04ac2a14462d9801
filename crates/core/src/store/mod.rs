//! Ephemeral artifact store.
//!
//! Binds produced files to opaque capability ids for a fixed TTL. Every
//! entry is evicted by two independent paths: a one-shot timer scheduled at
//! insert time, and a periodic sweep that catches anything the timer missed.
//! Expiry is logical first: `get` stops returning an entry the moment its
//! TTL elapses, whether or not its files are gone yet.

mod config;
mod ephemeral;
mod error;
mod types;

pub use config::StoreConfig;
pub use ephemeral::{generate_id, EphemeralStore};
pub use error::StoreError;
pub use types::{EvictionPath, StoreStats, TempObject};
