//! Durable tier storage.

mod store;

pub use store::{StoreCounters, TierStore};
