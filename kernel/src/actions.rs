//! The table-metadata action log.
//!
//! Follows the polymorphic tagged-variant design from the design notes: rather than modeling
//! actions via dynamic dispatch, each action is a data-only enum variant with an `apply` method
//! that folds itself into a [`TableMetadataBuilder`]. `DeltaCommit` and checkpoint files both
//! carry newline-delimited JSON-encoded `Action`s (see [`crate::replay`]).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DeltaResult, Error};
use crate::path::Version;

pub type SchemaId = i64;
pub type SpecId = i64;
pub type SortOrderId = i64;
pub type SnapshotId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub schema_id: SchemaId,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSpec {
    pub spec_id: SpecId,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub order_id: SortOrderId,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub snapshot_id: SnapshotId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub snapshot_id: SnapshotId,
    pub timestamp_ms: i64,
    pub parent_snapshot_id: Option<SnapshotId>,
}

/// The read/write protocol version in effect. Tracked separately from [`TableMetadata`], mirroring
/// `delta-kernel-rs`'s split between `Protocol` (a reader/writer compatibility gate) and `Metadata`
/// (the table's actual schema/partitioning/properties).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protocol {
    pub format_version: i32,
}

impl Default for Protocol {
    fn default() -> Self {
        Self { format_version: 1 }
    }
}

/// Resolved table state after replaying every action observed up to and including a version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMetadata {
    pub table_id: Uuid,
    pub location: Option<String>,
    pub current_schema_id: Option<SchemaId>,
    pub schemas: HashMap<SchemaId, Schema>,
    pub default_spec_id: Option<SpecId>,
    pub partition_specs: HashMap<SpecId, PartitionSpec>,
    pub default_sort_order_id: Option<SortOrderId>,
    pub sort_orders: HashMap<SortOrderId, SortOrder>,
    pub properties: HashMap<String, String>,
    pub refs: HashMap<String, Reference>,
    pub snapshots: Vec<SnapshotRecord>,
}

/// One entry in a commit or checkpoint file's action log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    AssignId {
        table_id: Uuid,
    },
    UpgradeFormat {
        format_version: i32,
    },
    AddSchema {
        schema: Schema,
    },
    SetSchema {
        schema_id: SchemaId,
    },
    AddPartitionSpec {
        spec: PartitionSpec,
    },
    SetDefaultPartitionSpec {
        spec_id: SpecId,
    },
    AddSortOrder {
        order: SortOrder,
    },
    SetDefaultSortOrder {
        order_id: SortOrderId,
    },
    AddSnapshot {
        snapshot: SnapshotRecord,
    },
    RemoveSnapshot {
        snapshot_id: SnapshotId,
    },
    SetRef {
        name: String,
        reference: Reference,
    },
    RemoveRef {
        name: String,
    },
    SetProperties {
        updates: HashMap<String, String>,
    },
    RemoveProperties {
        removals: Vec<String>,
    },
    SetLocation {
        location: String,
    },
}

impl Action {
    pub fn apply(&self, builder: &mut TableMetadataBuilder) {
        match self {
            Action::AssignId { table_id } => builder.table_id = Some(*table_id),
            Action::UpgradeFormat { format_version } => {
                builder.protocol.format_version = *format_version;
            }
            Action::AddSchema { schema } => {
                builder.schemas.insert(schema.schema_id, schema.clone());
            }
            Action::SetSchema { schema_id } => builder.current_schema_id = Some(*schema_id),
            Action::AddPartitionSpec { spec } => {
                builder.partition_specs.insert(spec.spec_id, spec.clone());
            }
            Action::SetDefaultPartitionSpec { spec_id } => builder.default_spec_id = Some(*spec_id),
            Action::AddSortOrder { order } => {
                builder.sort_orders.insert(order.order_id, order.clone());
            }
            Action::SetDefaultSortOrder { order_id } => {
                builder.default_sort_order_id = Some(*order_id);
            }
            Action::AddSnapshot { snapshot } => builder.snapshots.push(snapshot.clone()),
            Action::RemoveSnapshot { snapshot_id } => {
                builder.snapshots.retain(|s| s.snapshot_id != *snapshot_id);
            }
            Action::SetRef { name, reference } => {
                builder.refs.insert(name.clone(), reference.clone());
            }
            Action::RemoveRef { name } => {
                builder.refs.remove(name);
            }
            Action::SetProperties { updates } => {
                builder.properties.extend(updates.clone());
            }
            Action::RemoveProperties { removals } => {
                for key in removals {
                    builder.properties.remove(key);
                }
            }
            Action::SetLocation { location } => builder.location = Some(location.clone()),
        }
    }
}

/// Accumulates [`Action`]s into a [`TableMetadata`] + [`Protocol`] pair. One builder is folded
/// over a checkpoint's actions (if any) followed by each delta file's actions, in order.
#[derive(Debug, Default)]
pub struct TableMetadataBuilder {
    table_id: Option<Uuid>,
    protocol: Protocol,
    location: Option<String>,
    current_schema_id: Option<SchemaId>,
    schemas: HashMap<SchemaId, Schema>,
    default_spec_id: Option<SpecId>,
    partition_specs: HashMap<SpecId, PartitionSpec>,
    default_sort_order_id: Option<SortOrderId>,
    sort_orders: HashMap<SortOrderId, SortOrder>,
    properties: HashMap<String, String>,
    refs: HashMap<String, Reference>,
    snapshots: Vec<SnapshotRecord>,
}

impl TableMetadataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_all<'a>(&mut self, actions: impl IntoIterator<Item = &'a Action>) {
        for action in actions {
            action.apply(self);
        }
    }

    /// Finalize the builder. Fails with [`Error::IllegalLogState`] if no `AssignId` action was
    /// ever observed -- every real table's first commit assigns its id (spec §3: `tableId`
    /// assigned at table creation).
    pub fn build(self, version: Version) -> DeltaResult<(TableMetadata, Protocol)> {
        let table_id = self.table_id.ok_or_else(|| {
            Error::IllegalLogState(format!(
                "no AssignId action observed while replaying up to version {version}"
            ))
        })?;
        let metadata = TableMetadata {
            table_id,
            location: self.location,
            current_schema_id: self.current_schema_id,
            schemas: self.schemas,
            default_spec_id: self.default_spec_id,
            partition_specs: self.partition_specs,
            default_sort_order_id: self.default_sort_order_id,
            sort_orders: self.sort_orders,
            properties: self.properties,
            refs: self.refs,
            snapshots: self.snapshots,
        };
        Ok((metadata, self.protocol))
    }
}

/// Optional sidecar summary (`NNNNNNNNNNNNNNNNNNNN.crc`) accelerating access to a version's
/// table id, protocol, and a rough size estimate without replaying the full action log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checksum {
    pub table_id: Uuid,
    pub protocol: Protocol,
    pub num_files: u64,
    pub table_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_assign_id_then_schema() {
        let id = Uuid::new_v4();
        let actions = vec![
            Action::AssignId { table_id: id },
            Action::UpgradeFormat { format_version: 2 },
            Action::AddSchema {
                schema: Schema {
                    schema_id: 0,
                    fields: vec!["id".to_string()],
                },
            },
            Action::SetSchema { schema_id: 0 },
        ];
        let mut builder = TableMetadataBuilder::new();
        builder.apply_all(&actions);
        let (metadata, protocol) = builder.build(0).unwrap();
        assert_eq!(metadata.table_id, id);
        assert_eq!(metadata.current_schema_id, Some(0));
        assert_eq!(protocol.format_version, 2);
    }

    #[test]
    fn build_without_assign_id_fails() {
        let builder = TableMetadataBuilder::new();
        assert!(builder.build(0).is_err());
    }

    #[test]
    fn remove_property_after_set() {
        let mut builder = TableMetadataBuilder::new();
        builder.apply_all(&[
            Action::AssignId {
                table_id: Uuid::new_v4(),
            },
            Action::SetProperties {
                updates: HashMap::from([("a".to_string(), "1".to_string())]),
            },
            Action::RemoveProperties {
                removals: vec!["a".to_string()],
            },
        ]);
        let (metadata, _) = builder.build(0).unwrap();
        assert!(metadata.properties.is_empty());
    }
}
