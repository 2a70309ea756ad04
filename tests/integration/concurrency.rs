//! Concurrency scenarios: write-once manifests, striping, cancellation.

use std::sync::Arc;

use torpor_engine::{
    CancelFlag, EngineError, SnapshotRequest, WorkspaceRef,
};
use torpor_integration_tests::{TestRig, text_payload};
use torpor_store::ObjectStore;
use torpor_transport::TransportError;
use torpor_types::{ContentClass, PlacementPolicy, SnapshotId};

#[tokio::test]
async fn test_concurrent_snapshots_same_id_exactly_one_wins() {
    let rig = Arc::new(TestRig::new(1, PlacementPolicy::Single, 4 * 1024));
    let id = SnapshotId::new("snap-1700000000-race");

    let a = rig.write_archive("a.tar", &text_payload(40_000)).await;
    let b = rig.write_archive("b.tar", &text_payload(40_000)).await;

    let rig_a = rig.clone();
    let id_a = id.clone();
    let first = tokio::spawn(async move {
        rig_a
            .engine
            .create_snapshot(SnapshotRequest {
                workspace: a,
                content_class: ContentClass::Text,
                snapshot_id: Some(id_a),
            })
            .await
    });
    let rig_b = rig.clone();
    let id_b = id.clone();
    let second = tokio::spawn(async move {
        rig_b
            .engine
            .create_snapshot(SnapshotRequest {
                workspace: b,
                content_class: ContentClass::Text,
                snapshot_id: Some(id_b),
            })
            .await
    });

    let results = [first.await.unwrap(), second.await.unwrap()];
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one writer may finalize {id}");

    let loser = results.iter().find(|r| r.is_err()).unwrap();
    assert!(matches!(
        loser.as_ref().unwrap_err(),
        EngineError::Transport(TransportError::ManifestAlreadyExists { .. })
    ));

    // The surviving manifest is intact and restorable.
    let (_, restored) = rig.restore(&id, "out.tar").await.unwrap();
    assert_eq!(restored.len(), 40_000);
}

#[tokio::test]
async fn test_striped_snapshot_restores_across_providers() {
    let rig = TestRig::new(3, PlacementPolicy::Striped, 4 * 1024);
    let data = text_payload(40_000); // 10 chunks over 3 providers
    let workspace = rig.write_archive("ws.tar", &data).await;

    let handle = rig.snapshot(workspace, ContentClass::Text).await.unwrap();
    assert_eq!(handle.num_chunks, 10);

    // Every provider holds at least one chunk object.
    for (i, store) in rig.stores.iter().enumerate() {
        let chunk_objects = store
            .list("snapshots/")
            .await
            .unwrap()
            .into_iter()
            .filter(|k| k.contains("/chunk_"))
            .count();
        assert!(chunk_objects >= 3, "provider {i} holds {chunk_objects} chunks");
    }

    let (_, restored) = rig.restore(&handle.snapshot_id, "out.tar").await.unwrap();
    assert_eq!(restored, data);
}

#[tokio::test]
async fn test_cancelled_snapshot_leaves_no_manifest() {
    let rig = TestRig::new(1, PlacementPolicy::Single, 1024);
    let workspace = rig.write_archive("ws.tar", &text_payload(64 * 1024)).await;

    let cancel = CancelFlag::new();
    cancel.cancel();

    let err = rig
        .engine
        .create_snapshot_with_cancel(
            SnapshotRequest {
                workspace,
                content_class: ContentClass::Text,
                snapshot_id: None,
            },
            &cancel,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
    assert!(rig.engine.list_snapshots().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancelled_restore_keeps_partial_marker() {
    let rig = TestRig::new(1, PlacementPolicy::Single, 1024);
    let data = text_payload(32 * 1024);
    let workspace = rig.write_archive("ws.tar", &data).await;
    let handle = rig.snapshot(workspace, ContentClass::Text).await.unwrap();

    let cancel = CancelFlag::new();
    cancel.cancel();

    let target = WorkspaceRef::new(rig.dir.path().join("out.tar"));
    let err = rig
        .engine
        .restore_snapshot_with_cancel(&handle.snapshot_id, &target, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
    assert!(!target.archive.exists());
    assert!(target.staging_path().exists());

    // A fresh restore (new operation, same target) succeeds — failed or
    // cancelled operations are retried by reissuing, never resumed.
    let (_, restored) = rig.restore(&handle.snapshot_id, "out.tar").await.unwrap();
    assert_eq!(restored, data);
}

#[tokio::test]
async fn test_parallel_restores_of_same_snapshot() {
    let rig = Arc::new(TestRig::new(2, PlacementPolicy::Striped, 4 * 1024));
    let data = text_payload(60_000);
    let workspace = rig.write_archive("ws.tar", &data).await;
    let handle = rig.snapshot(workspace, ContentClass::Text).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..4 {
        let rig = rig.clone();
        let id = handle.snapshot_id.clone();
        tasks.push(tokio::spawn(async move {
            rig.restore(&id, &format!("out-{i}.tar")).await
        }));
    }
    for task in tasks {
        let (_, restored) = task.await.unwrap().unwrap();
        assert_eq!(restored, data);
    }
}
