//! Snapshot management core for a Delta-style transactional log.
//!
//! Given a `_delta_log` directory that other writers may be mutating concurrently, this crate
//! reconstructs the file manifest needed to materialize any version of the table
//! ([`log_segment::LogSegmentBuilder`]), selects the newest usable checkpoint
//! ([`checkpoint::CheckpointSelector`]), wraps the result into an immutable [`snapshot::Snapshot`]
//! with retry past checkpoint corruption ([`snapshot::SnapshotFactory`]), and keeps one up to date
//! under concurrent readers and writers ([`snapshot::cache::SnapshotCache`]).
//!
//! Writing new commits, conflict detection, garbage collection, and checkpoint creation are out
//! of scope -- this crate only reads and reconstructs.

pub mod actions;
pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod error;
pub mod log_segment;
pub mod path;
pub mod replay;
pub mod snapshot;
pub mod storage;

pub use actions::{Action, Checksum, Protocol, TableMetadata, TableMetadataBuilder};
pub use checkpoint::{CheckpointInstance, CheckpointSelector, LastCheckpointHint};
pub use config::SnapshotCacheConfig;
pub use error::{DeltaResult, Error};
pub use log_segment::{LogSegment, LogSegmentBuilder};
pub use path::{ParsedLogPath, Version};
pub use snapshot::cache::SnapshotCache;
pub use snapshot::{LogProvider, Snapshot, SnapshotFactory, Versioned};
pub use storage::{FileMeta, StorageHandler};
