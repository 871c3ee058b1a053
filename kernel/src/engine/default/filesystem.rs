//! An `object_store`-backed [`StorageHandler`], grounded on `engine/default/storage.rs`'s
//! URL-scheme-dispatching `parse_url_opts` helper and the `ObjectStoreStorageHandler` type
//! referenced throughout `delta-kernel-rs`'s log segment tests.

use bytes::Bytes;
use futures::executor::block_on;
use futures::TryStreamExt;
use object_store::{path::Path, ObjectStore};
use std::sync::Arc;
use url::Url;

use crate::error::{DeltaResult, Error};
use crate::path::Version;
use crate::storage::{FileMeta, StorageHandler};

/// Converts a table-root-relative [`Url`] into an `object_store` [`Path`] by stripping the
/// leading `/` that every `memory://` / `file://` URL path carries.
fn to_store_path(url: &Url) -> Path {
    Path::from(url.path())
}

fn to_file_meta(base: &Url, meta: object_store::ObjectMeta) -> FileMeta {
    let file_name = meta.location.filename().unwrap_or_default();
    FileMeta {
        location: base
            .join(file_name)
            .unwrap_or_else(|_| base.clone()),
        last_modified: meta.last_modified.timestamp_millis(),
        size: meta.size as u64,
    }
}

pub struct ObjectStoreStorageHandler {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreStorageHandler {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

impl StorageHandler for ObjectStoreStorageHandler {
    fn list_from(&self, path: &Url, start_version: Version) -> DeltaResult<Vec<FileMeta>> {
        let prefix = to_store_path(path);
        let listing: Vec<_> = block_on(async {
            self.store
                .list(Some(&prefix))
                .try_collect::<Vec<_>>()
                .await
        })
        .map_err(|e| match e {
            object_store::Error::NotFound { .. } => Error::FileNotFound(path.to_string()),
            other => Error::ObjectStore(other),
        })?;

        let start_marker = format!("{start_version:020}");
        let mut files: Vec<FileMeta> = listing
            .into_iter()
            .filter(|meta| {
                meta.location
                    .filename()
                    .map(|name| name >= start_marker.as_str())
                    .unwrap_or(false)
            })
            .map(|meta| to_file_meta(path, meta))
            .collect();
        files.sort_by(|a, b| a.location.as_str().cmp(b.location.as_str()));
        Ok(files)
    }

    fn read_file(&self, file: &FileMeta) -> DeltaResult<Bytes> {
        let path = to_store_path(&file.location);
        let result = block_on(async { self.store.get(&path).await })?;
        Ok(block_on(async { result.bytes().await })?)
    }
}
