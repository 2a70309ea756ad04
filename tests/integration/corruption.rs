//! Corruption scenarios: restores must fail loudly, never silently serve
//! wrong bytes.

use torpor_engine::{EngineError, WorkspaceRef};
use torpor_integration_tests::{TestRig, text_payload};
use torpor_transport::{chunk_key, manifest_key};
use torpor_types::{CodecId, ContentClass, PlacementPolicy};

#[tokio::test]
async fn test_bit_flip_after_upload_aborts_restore() {
    let rig = TestRig::new(1, PlacementPolicy::Single, 8 * 1024);
    let data = text_payload(40_000);
    let workspace = rig.write_archive("ws.tar", &data).await;
    let handle = rig.snapshot(workspace, ContentClass::Text).await.unwrap();

    // Flip one bit in a stored chunk object on every read.
    rig.flaky[0].corrupt_object(&chunk_key(&handle.snapshot_id, 1, CodecId::Lz4));

    let err = rig.restore(&handle.snapshot_id, "out.tar").await.unwrap_err();
    // A flipped bit either breaks the frame (corrupt chunk) or survives
    // decoding and trips the digest check (integrity violation). Both
    // abort; neither may produce output.
    assert!(
        matches!(
            err,
            EngineError::Codec(_) | EngineError::IntegrityViolation { .. }
        ),
        "unexpected error: {err}"
    );
    assert!(!rig.dir.path().join("out.tar").exists());
}

#[tokio::test]
async fn test_failed_restore_leaves_explicit_partial_marker() {
    let rig = TestRig::new(1, PlacementPolicy::Single, 8 * 1024);
    let data = text_payload(40_000);
    let workspace = rig.write_archive("ws.tar", &data).await;
    let handle = rig.snapshot(workspace, ContentClass::Text).await.unwrap();

    rig.flaky[0].corrupt_object(&chunk_key(&handle.snapshot_id, 0, CodecId::Lz4));

    let target = WorkspaceRef::new(rig.dir.path().join("out.tar"));
    rig.engine
        .restore_snapshot(&handle.snapshot_id, &target)
        .await
        .unwrap_err();

    assert!(!target.archive.exists(), "no plausible-looking target");
    assert!(
        target.staging_path().exists(),
        ".partial staging file marks the incomplete restore"
    );
}

#[tokio::test]
async fn test_tampered_manifest_rejected_before_any_transfer() {
    let rig = TestRig::new(1, PlacementPolicy::Single, 8 * 1024);
    let workspace = rig.write_archive("ws.tar", &text_payload(30_000)).await;
    let handle = rig.snapshot(workspace, ContentClass::Text).await.unwrap();

    // Tamper: inflate a chunk's recorded size so the totals disagree.
    let key = manifest_key(&handle.snapshot_id);
    let raw = rig.read_object(0, &key).await.unwrap();
    let mut manifest: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    manifest["chunks"][0]["original_size"] = serde_json::json!(999_999);
    rig.overwrite_object(0, &key, serde_json::to_vec(&manifest).unwrap());

    let target = WorkspaceRef::new(rig.dir.path().join("out.tar"));
    let err = rig
        .engine
        .restore_snapshot(&handle.snapshot_id, &target)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Manifest(_)), "got {err}");

    // Validation failed before any chunk transfer: no staging file was
    // even created.
    assert!(!target.staging_path().exists());
}

#[tokio::test]
async fn test_truncated_manifest_rejected() {
    let rig = TestRig::new(1, PlacementPolicy::Single, 8 * 1024);
    let workspace = rig.write_archive("ws.tar", &text_payload(30_000)).await;
    let handle = rig.snapshot(workspace, ContentClass::Text).await.unwrap();

    let key = manifest_key(&handle.snapshot_id);
    let raw = rig.read_object(0, &key).await.unwrap();
    rig.overwrite_object(0, &key, raw[..raw.len() / 2].to_vec());

    let err = rig.restore(&handle.snapshot_id, "out.tar").await.unwrap_err();
    assert!(matches!(err, EngineError::Manifest(_)));
}

#[tokio::test]
async fn test_corrupt_manifest_blocks_delete() {
    // Prune goes through the manifest; a broken manifest must surface as
    // an invalid-manifest error, not a partial delete that looks clean.
    let rig = TestRig::new(1, PlacementPolicy::Single, 8 * 1024);
    let workspace = rig.write_archive("ws.tar", &text_payload(10_000)).await;
    let handle = rig.snapshot(workspace, ContentClass::Text).await.unwrap();

    let key = manifest_key(&handle.snapshot_id);
    rig.overwrite_object(0, &key, b"{not json".to_vec());

    let err = rig
        .engine
        .delete_snapshot(&handle.snapshot_id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Manifest(_)));
}
