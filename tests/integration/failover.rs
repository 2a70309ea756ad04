//! Provider-failure scenarios: alternate-location fallback and hard
//! unavailability.

use torpor_engine::EngineError;
use torpor_integration_tests::{TestRig, provider_name, text_payload};
use torpor_store::ObjectStore;
use torpor_transport::{TransportError, manifest_key};
use torpor_types::{ContentClass, PlacementPolicy};

/// Copy every chunk object from one provider to another and record the
/// second provider as an alternate location in the stored manifest.
///
/// This models a deployment that replicates chunks out of band (the
/// manifest's `providers` list supports any number of locations, even
/// though the engine itself writes each chunk once).
async fn replicate_chunks(rig: &TestRig, snapshot_key: &str, from: usize, to: usize) {
    let chunk_keys: Vec<String> = rig.stores[from]
        .list("snapshots/")
        .await
        .unwrap()
        .into_iter()
        .filter(|k| k != snapshot_key)
        .collect();

    for key in &chunk_keys {
        let data = rig.read_object(from, key).await.expect("chunk exists");
        rig.overwrite_object(to, key, data);
    }

    let raw = rig.read_object(from, snapshot_key).await.expect("manifest");
    let mut manifest: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    for chunk in manifest["chunks"].as_array_mut().unwrap() {
        let providers = chunk["providers"].as_array_mut().unwrap();
        providers.push(serde_json::Value::String(provider_name(to)));
    }
    let patched = serde_json::to_vec_pretty(&manifest).unwrap();
    rig.overwrite_object(from, snapshot_key, patched.clone());
    rig.overwrite_object(to, snapshot_key, patched);
}

#[tokio::test]
async fn test_restore_succeeds_from_alternate_location() {
    let rig = TestRig::new(2, PlacementPolicy::Single, 8 * 1024);
    let data = text_payload(60_000);
    let workspace = rig.write_archive("ws.tar", &data).await;
    let handle = rig.snapshot(workspace, ContentClass::Text).await.unwrap();

    replicate_chunks(&rig, &manifest_key(&handle.snapshot_id), 0, 1).await;

    // Primary goes dark. Every chunk records minio-b as an alternate, so
    // the restore must succeed without any caller-visible error.
    rig.set_provider_down(0, true);
    let (_, restored) = rig.restore(&handle.snapshot_id, "out.tar").await.unwrap();
    assert_eq!(restored, data);
}

#[tokio::test]
async fn test_restore_fails_when_only_location_unreachable() {
    let rig = TestRig::new(1, PlacementPolicy::Single, 8 * 1024);
    let workspace = rig.write_archive("ws.tar", &text_payload(20_000)).await;
    let handle = rig.snapshot(workspace, ContentClass::Text).await.unwrap();

    rig.set_provider_down(0, true);
    let err = rig.restore(&handle.snapshot_id, "out.tar").await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Transport(TransportError::ProviderUnavailable { .. })
    ));
}

#[tokio::test]
async fn test_restore_fails_when_chunk_objects_deleted() {
    let rig = TestRig::new(1, PlacementPolicy::Single, 8 * 1024);
    let workspace = rig.write_archive("ws.tar", &text_payload(20_000)).await;
    let handle = rig.snapshot(workspace, ContentClass::Text).await.unwrap();

    // Delete the chunk objects out from under the manifest.
    let manifest = manifest_key(&handle.snapshot_id);
    for key in rig.stores[0].list("snapshots/").await.unwrap() {
        if key != manifest {
            rig.stores[0].delete(&key).await.unwrap();
        }
    }

    let err = rig.restore(&handle.snapshot_id, "out.tar").await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Transport(TransportError::DownloadFailed { .. })
    ));
}

#[tokio::test]
async fn test_manifest_fetch_falls_back_to_replica() {
    // publish_manifest replicates the manifest to all providers; with the
    // primary down the manifest (and striped chunks on the survivor) are
    // still readable, so listing keeps working.
    let rig = TestRig::new(2, PlacementPolicy::Single, 8 * 1024);
    let workspace = rig.write_archive("ws.tar", &text_payload(5_000)).await;
    let handle = rig.snapshot(workspace, ContentClass::Text).await.unwrap();

    rig.set_provider_down(0, true);
    let manifest = rig.engine.snapshot_manifest(&handle.snapshot_id).await.unwrap();
    assert_eq!(manifest.snapshot_id, handle.snapshot_id);
}

#[tokio::test]
async fn test_snapshot_fails_when_upload_target_down() {
    let rig = TestRig::new(1, PlacementPolicy::Single, 8 * 1024);
    let workspace = rig.write_archive("ws.tar", &text_payload(20_000)).await;

    rig.set_provider_down(0, true);
    let err = rig.snapshot(workspace, ContentClass::Text).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Transport(TransportError::UploadFailed { .. })
    ));

    // No manifest may exist for the failed snapshot.
    rig.set_provider_down(0, false);
    assert!(rig.engine.list_snapshots().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_transient_upload_failures_are_retried() {
    let rig = TestRig::new(1, PlacementPolicy::Single, 8 * 1024);
    let workspace = rig.write_archive("ws.tar", &text_payload(9_000)).await;

    // Two injected failures, retry budget of three attempts per op.
    rig.flaky[0].fail_next(2);
    let handle = rig.snapshot(workspace, ContentClass::Text).await.unwrap();
    let (_, restored) = rig.restore(&handle.snapshot_id, "out.tar").await.unwrap();
    assert_eq!(restored.len(), 9_000);
}
