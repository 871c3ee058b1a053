//! A number of utilities useful for testing that we want to use in multiple crates.

use std::sync::Arc;

use delta_snapshot_kernel::engine::default::executor::tokio::TokioBackgroundExecutor;
use delta_snapshot_kernel::engine::default::filesystem::ObjectStoreStorageHandler;
use delta_snapshot_kernel::{Action, StorageHandler};

use object_store::memory::InMemory;
use object_store::{path::Path, ObjectStore};
use url::Url;
use uuid::Uuid;

/// get an ObjectStore path for a delta log file, based on the version and kind.
pub fn delta_path_for_version(version: u64, suffix: &str) -> Path {
    let path = format!("_delta_log/{version:020}.{suffix}");
    Path::from(path.as_str())
}

pub fn delta_path_for_multipart_checkpoint(version: u64, part: u32, num_parts: u32) -> Path {
    let path =
        format!("_delta_log/{version:020}.checkpoint.{part:010}.{num_parts:010}.parquet");
    Path::from(path.as_str())
}

fn actions_to_ndjson(actions: &[Action]) -> String {
    actions
        .iter()
        .map(|action| serde_json::to_string(action).expect("action serializes"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Put a commit file into the specified object store, carrying `actions`. Version 0 is expected
/// to include an `Action::AssignId` somewhere in the log up to and including the version loaded,
/// but callers are free to spread table-creation actions across versions as a real writer would.
pub async fn add_commit(
    store: &dyn ObjectStore,
    version: u64,
    actions: Vec<Action>,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = delta_path_for_version(version, "json");
    store.put(&path, actions_to_ndjson(&actions).into()).await?;
    Ok(())
}

/// Put a single-part checkpoint at `version`, carrying `actions`.
pub async fn add_checkpoint(
    store: &dyn ObjectStore,
    version: u64,
    actions: Vec<Action>,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = delta_path_for_version(version, "checkpoint.parquet");
    store.put(&path, actions_to_ndjson(&actions).into()).await?;
    Ok(())
}

/// Put one shard of a `num_parts`-part checkpoint at `version`.
pub async fn add_checkpoint_part(
    store: &dyn ObjectStore,
    version: u64,
    part: u32,
    num_parts: u32,
    actions: Vec<Action>,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = delta_path_for_multipart_checkpoint(version, part, num_parts);
    store.put(&path, actions_to_ndjson(&actions).into()).await?;
    Ok(())
}

/// Write `_delta_log/_last_checkpoint` pointing at `version` (and, for a multi-part checkpoint,
/// `parts`).
pub async fn write_last_checkpoint_hint(
    store: &dyn ObjectStore,
    version: u64,
    parts: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let hint = delta_snapshot_kernel::LastCheckpointHint {
        version,
        size: 0,
        parts,
    };
    let path = Path::from("_delta_log/_last_checkpoint");
    store.put(&path, serde_json::to_vec(&hint)?.into()).await?;
    Ok(())
}

/// The minimal action set every commit-0 fixture needs: a fresh `tableId` and a trivial schema.
pub fn genesis_actions() -> Vec<Action> {
    vec![
        Action::AssignId {
            table_id: Uuid::new_v4(),
        },
        Action::UpgradeFormat { format_version: 1 },
        Action::AddSchema {
            schema: delta_snapshot_kernel::actions::Schema {
                schema_id: 0,
                fields: vec!["id".to_string()],
            },
        },
        Action::SetSchema { schema_id: 0 },
    ]
}

/// Build an in-memory store with a linear log `0.json..=last_version.json`, each commit after 0
/// carrying a harmless `SetProperties` no-op so every version is distinguishable in a checksum.
pub async fn build_linear_log(last_version: u64) -> Result<Arc<dyn ObjectStore>, Box<dyn std::error::Error>> {
    let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
    add_commit(&store, 0, genesis_actions()).await?;
    for version in 1..=last_version {
        let actions = vec![Action::SetProperties {
            updates: std::collections::HashMap::from([(
                "commit.version".to_string(),
                version.to_string(),
            )]),
        }];
        add_commit(&store, version, actions).await?;
    }
    Ok(store)
}

/// Set up a [`delta_snapshot_kernel::StorageHandler`] and table-root `Url` over a fresh in-memory
/// store, mirroring `delta-kernel-rs`'s `engine_store_setup`. The returned root points at
/// `_delta_log/` at the store's top level, matching where [`add_commit`]/[`add_checkpoint`] and
/// friends place their files (they don't take a table name, so the root can't have one either).
pub fn storage_handler_setup() -> (Arc<dyn ObjectStore>, Arc<dyn StorageHandler>, Url) {
    let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
    let handler: Arc<dyn StorageHandler> = Arc::new(ObjectStoreStorageHandler::new(store.clone()));
    let log_root = Url::parse("memory:///_delta_log/").expect("valid url");
    (store, handler, log_root)
}

/// A background executor suitable for test use; each call returns a fresh instance so tests never
/// share runtime state (spec §9 design note).
pub fn test_executor() -> Arc<TokioBackgroundExecutor> {
    Arc::new(TokioBackgroundExecutor::new())
}
