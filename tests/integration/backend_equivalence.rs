//! RemoteBackend over the loopback server and VirtualBackend must agree on
//! every engine-visible result.

use super::support::{remote_backend, shape, virtual_backend, LoopbackTransport};
use canopy::backend::{Backend, RemoteBackend, ReconcilePolicy};
use canopy::error::{ApiError, BackendError};
use canopy::types::NodeKind;
use canopy::workspace::WorkspaceEngine;
use std::sync::Arc;

async fn run_sequence(backend: &dyn Backend) {
    backend.create_file("/a/b.txt").await.unwrap();
    backend.write_file("/a/b.txt", "content").await.unwrap();
    backend.rename_path("/a", "/a2").await.unwrap();
    assert_eq!(backend.read_file("/a2/b.txt").await.unwrap(), "content");
    backend.delete_path("/a2/b.txt").await.unwrap();
}

#[tokio::test]
async fn test_backend_sequence_produces_identical_trees() {
    let local = virtual_backend();
    let (remote, _transport) = remote_backend();

    run_sequence(&local).await;
    run_sequence(&remote).await;

    let local_tree = local.list_tree("/").await.unwrap();
    let remote_tree = remote.list_tree("/").await.unwrap();
    assert_eq!(shape(&local_tree), shape(&remote_tree));
    assert_eq!(
        shape(&local_tree)
            .into_iter()
            .map(|(p, _)| p)
            .collect::<Vec<_>>(),
        vec!["/a2", "/a2/keep.txt", "/a2/nested", "/a2/nested/deep.txt", "/top.txt"]
    );
    assert_eq!(
        local.git_status("/").await.unwrap(),
        remote.git_status("/").await.unwrap()
    );
}

#[tokio::test]
async fn test_backend_errors_match() {
    let local = virtual_backend();
    let (remote, _transport) = remote_backend();
    let backends: [&dyn Backend; 2] = [&local, &remote];

    for backend in backends {
        assert!(matches!(
            backend.create_file("/top.txt").await,
            Err(BackendError::Conflict(_))
        ));
        assert!(matches!(
            backend.create_folder("/missing/dir").await,
            Err(BackendError::NotFound(_))
        ));
        assert!(matches!(
            backend.delete_path("/missing").await,
            Err(BackendError::NotFound(_))
        ));
        assert!(matches!(
            backend.rename_path("/top.txt", "/a").await,
            Err(BackendError::Conflict(_))
        ));
        assert!(matches!(
            backend.read_file("/a").await,
            Err(BackendError::NotFound(_))
        ));
        assert!(matches!(
            backend.list_tree("/top.txt").await,
            Err(BackendError::NotFound(_))
        ));
    }
}

#[tokio::test]
async fn test_subtree_listing_matches() {
    let local = virtual_backend();
    let (remote, _transport) = remote_backend();

    let local_tree = local.list_tree("/a").await.unwrap();
    let remote_tree = remote.list_tree("/a").await.unwrap();
    assert_eq!(local_tree.root(), "/a");
    assert_eq!(remote_tree.root(), "/a");
    assert_eq!(shape(&local_tree), shape(&remote_tree));
}

async fn drive_engine(engine: &WorkspaceEngine) -> Vec<(String, NodeKind)> {
    engine.refresh().await.unwrap();
    engine.create(NodeKind::File, "/a", "b.txt").await.unwrap();
    engine.save_file("/a/b.txt", "content").await.unwrap();
    engine.rename("/a", "a2").await.unwrap();
    engine.remove("/a2/b.txt").await.unwrap();
    shape(&engine.snapshot())
}

#[tokio::test]
async fn test_engines_agree_across_backends_and_policies() {
    let local = WorkspaceEngine::new(Arc::new(virtual_backend()), "/").unwrap();
    let expected = drive_engine(&local).await;

    for policy in [ReconcilePolicy::Refetch, ReconcilePolicy::Patch] {
        let transport = Arc::new(LoopbackTransport::new());
        let engine = WorkspaceEngine::new(Arc::new(RemoteBackend::new(transport.clone())), "/")
            .unwrap()
            .with_reconcile(policy);
        assert_eq!(drive_engine(&engine).await, expected, "policy {:?}", policy);

        // The mirror matches what the server holds
        let server_tree = transport.server().list_tree("/").await.unwrap();
        assert_eq!(shape(&server_tree), expected);
    }
}

#[tokio::test]
async fn test_engines_agree_on_already_exists() {
    let local = WorkspaceEngine::new(Arc::new(virtual_backend()), "/").unwrap();
    let (remote, transport) = remote_backend();
    let remote = WorkspaceEngine::new(Arc::new(remote), "/").unwrap();

    for engine in [&local, &remote] {
        engine.refresh().await.unwrap();
        let err = engine.create(NodeKind::File, "/", "top.txt").await.unwrap_err();
        assert!(matches!(err, ApiError::AlreadyExists(_)));
    }
    // Rejected locally: only the initial listing reached the server
    assert_eq!(transport.requests().len(), 1);
}
