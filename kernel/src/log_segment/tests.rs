//! End-to-end `LogSegmentBuilder` scenarios (spec §8 S1-S6).

use object_store::ObjectStore;
use test_log::test;
use test_utils::{
    add_checkpoint, add_checkpoint_part, add_commit, delta_path_for_version, genesis_actions,
    storage_handler_setup,
};

use super::*;

#[test]
fn s1_linear_log() {
    let (store, storage, log_root) = storage_handler_setup();
    futures::executor::block_on(async {
        for v in 0..=5u64 {
            add_commit(store.as_ref(), v, genesis_actions()).await.unwrap();
        }
    });
    let builder = LogSegmentBuilder::new(storage.as_ref(), log_root);
    let segment = builder.build(None, None).unwrap();
    assert_eq!(segment.version, 5);
    assert_eq!(segment.checkpoint_version, None);
    assert_eq!(segment.deltas.len(), 6);
}

#[test]
fn s2_with_checkpoint() {
    let (store, storage, log_root) = storage_handler_setup();
    futures::executor::block_on(async {
        for v in 0..=10u64 {
            add_commit(store.as_ref(), v, genesis_actions()).await.unwrap();
        }
        add_checkpoint(store.as_ref(), 7, genesis_actions()).await.unwrap();
    });
    let builder = LogSegmentBuilder::new(storage.as_ref(), log_root);
    let segment = builder.build(None, None).unwrap();
    assert_eq!(segment.checkpoint_version, Some(7));
    let versions: Vec<Version> = segment.deltas.iter().map(|d| d.version).collect();
    assert_eq!(versions, vec![8, 9, 10]);
}

#[test]
fn s3_multipart_checkpoint() {
    let (store, storage, log_root) = storage_handler_setup();
    futures::executor::block_on(async {
        for v in 0..=5u64 {
            add_commit(store.as_ref(), v, genesis_actions()).await.unwrap();
        }
        add_checkpoint_part(store.as_ref(), 3, 1, 2, genesis_actions()).await.unwrap();
        add_checkpoint_part(store.as_ref(), 3, 2, 2, genesis_actions()).await.unwrap();
    });
    let builder = LogSegmentBuilder::new(storage.as_ref(), log_root);
    let segment = builder.build(None, None).unwrap();
    assert_eq!(segment.checkpoint_version, Some(3));
    assert_eq!(segment.checkpoint.len(), 2);
    let versions: Vec<Version> = segment.deltas.iter().map(|d| d.version).collect();
    assert_eq!(versions, vec![4, 5]);
}

#[test]
fn s4_missing_part_fallback_no_prior_checkpoint() {
    let (store, storage, log_root) = storage_handler_setup();
    futures::executor::block_on(async {
        // pre-checkpoint deltas are gone (already consolidated away by an earlier writer); only
        // the post-checkpoint tail remains, so there is nothing for the fallback to rebuild from.
        for v in 3..=5u64 {
            add_commit(store.as_ref(), v, genesis_actions()).await.unwrap();
        }
        // only part 1 of 2 is present: the checkpoint at v=3 is incomplete.
        add_checkpoint_part(store.as_ref(), 3, 1, 2, genesis_actions()).await.unwrap();
    });
    let builder = LogSegmentBuilder::new(storage.as_ref(), log_root);
    let err = builder.build(Some(3), None).unwrap_err();
    assert!(matches!(err, Error::MissingCheckpointParts(3)));
}

#[test]
fn s4_missing_part_fallback_succeeds_with_prior_checkpoint() {
    let (store, storage, log_root) = storage_handler_setup();
    futures::executor::block_on(async {
        for v in 0..=5u64 {
            add_commit(store.as_ref(), v, genesis_actions()).await.unwrap();
        }
        add_checkpoint(store.as_ref(), 1, genesis_actions()).await.unwrap();
        // only part 1 of 2 is present: the checkpoint at v=3 is incomplete.
        add_checkpoint_part(store.as_ref(), 3, 1, 2, genesis_actions()).await.unwrap();
    });
    let builder = LogSegmentBuilder::new(storage.as_ref(), log_root);
    let segment = builder.build(Some(3), None).unwrap();
    assert_eq!(segment.checkpoint_version, Some(1));
    let versions: Vec<Version> = segment.deltas.iter().map(|d| d.version).collect();
    assert_eq!(versions, vec![2, 3, 4, 5]);
}

#[test]
fn s5_gap_is_missing_delta_file() {
    let (store, storage, log_root) = storage_handler_setup();
    futures::executor::block_on(async {
        for v in [0u64, 1, 3] {
            add_commit(store.as_ref(), v, genesis_actions()).await.unwrap();
        }
    });
    let builder = LogSegmentBuilder::new(storage.as_ref(), log_root);
    let err = builder.build(None, None).unwrap_err();
    assert!(matches!(err, Error::MissingDeltaFile(2)));
}

#[test]
fn empty_directory_without_hint_fails() {
    let (_store, storage, log_root) = storage_handler_setup();
    let builder = LogSegmentBuilder::new(storage.as_ref(), log_root);
    let err = builder.build(None, None).unwrap_err();
    assert!(matches!(err, Error::EmptyDirectory(_)));
}

#[test]
fn stale_hint_recreated_directory_retries_from_scratch() {
    let (store, storage, log_root) = storage_handler_setup();
    futures::executor::block_on(async {
        for v in 0..=2u64 {
            add_commit(store.as_ref(), v, genesis_actions()).await.unwrap();
        }
    });
    let builder = LogSegmentBuilder::new(storage.as_ref(), log_root);
    // hint points past the end of the recreated (shorter) log; listing from the hint version
    // onward is empty, so the builder must retry from scratch rather than failing.
    let segment = builder.build(Some(50), None).unwrap();
    assert_eq!(segment.version, 2);
    assert_eq!(segment.checkpoint_version, None);
}

#[test]
fn zero_length_checkpoint_is_ignored() {
    let (store, storage, log_root) = storage_handler_setup();
    futures::executor::block_on(async {
        for v in 0..=2u64 {
            add_commit(store.as_ref(), v, genesis_actions()).await.unwrap();
        }
        let path = delta_path_for_version(1, "checkpoint.parquet");
        store.put(&path, String::new().into()).await.unwrap();
    });
    let builder = LogSegmentBuilder::new(storage.as_ref(), log_root);
    let segment = builder.build(None, None).unwrap();
    assert_eq!(segment.checkpoint_version, None);
    assert_eq!(segment.version, 2);
}

#[test]
fn version_to_load_truncates_listing() {
    let (store, storage, log_root) = storage_handler_setup();
    futures::executor::block_on(async {
        for v in 0..=10u64 {
            add_commit(store.as_ref(), v, genesis_actions()).await.unwrap();
        }
        add_checkpoint(store.as_ref(), 7, genesis_actions()).await.unwrap();
    });
    let builder = LogSegmentBuilder::new(storage.as_ref(), log_root);
    // version_to_load=3 is below the checkpoint at 7, so the checkpoint must not be selected.
    let segment = builder.build(None, Some(3)).unwrap();
    assert_eq!(segment.version, 3);
    assert_eq!(segment.checkpoint_version, None);
    let versions: Vec<Version> = segment.deltas.iter().map(|d| d.version).collect();
    assert_eq!(versions, vec![0, 1, 2, 3]);
}
