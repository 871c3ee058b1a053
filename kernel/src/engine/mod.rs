//! Default, ready-to-use implementations of the storage and execution seams
//! ([`crate::StorageHandler`], [`crate::engine::default::executor::TaskExecutor`]).
//! Nothing in [`crate::log_segment`] or [`crate::snapshot`] depends on this module directly;
//! it exists so callers don't have to write their own `object_store`/`tokio` plumbing to use
//! this crate.

pub mod default;
