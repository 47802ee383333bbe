//! Engine behavior over the remote backend: reconciliation, queueing, and
//! refresh supersession.

use super::support::{virtual_backend, LoopbackTransport};
use canopy::backend::{Backend, Method, ReconcilePolicy, RemoteBackend};
use canopy::error::ApiError;
use canopy::tree::Node;
use canopy::types::NodeKind;
use canopy::workspace::{EditorTabs, RefreshOutcome, WorkspaceEngine};
use std::sync::Arc;
use std::time::Duration;

fn remote_engine(transport: Arc<LoopbackTransport>) -> Arc<WorkspaceEngine> {
    Arc::new(WorkspaceEngine::new(Arc::new(RemoteBackend::new(transport)), "/").unwrap())
}

#[tokio::test]
async fn test_rename_then_remove_over_remote() {
    let server = LoopbackTransport::with_server(virtual_backend());
    let transport = Arc::new(server);
    transport.server().delete_path("/a").await.unwrap();
    transport.server().delete_path("/top.txt").await.unwrap();
    transport.server().create_folder("/src").await.unwrap();
    transport.server().create_file("/src/main.ts").await.unwrap();

    let engine = remote_engine(transport.clone());
    engine.refresh().await.unwrap();
    assert_eq!(
        engine.snapshot().nodes().to_vec(),
        vec![Arc::new(Node::directory(
            "/src",
            vec![Node::file("/src/main.ts")]
        ))]
    );

    engine.rename("/src", "app").await.unwrap();
    assert_eq!(engine.snapshot().paths(), vec!["/app", "/app/main.ts"]);

    engine.remove("/app").await.unwrap();
    assert!(engine.snapshot().is_empty());
}

#[tokio::test]
async fn test_refetch_failure_falls_back_to_local_patch() {
    let transport = Arc::new(LoopbackTransport::new());
    let engine = remote_engine(transport.clone());
    engine.refresh().await.unwrap();

    transport.fail_tree_listing(true);
    engine.rename("/a", "renamed").await.unwrap();

    let paths = engine.snapshot().paths();
    assert!(paths.contains(&"/renamed/nested/deep.txt".to_string()));
    assert!(!paths.iter().any(|p| p.starts_with("/a/")));

    // An explicit refresh still surfaces the listing failure
    assert!(matches!(
        engine.refresh().await,
        Err(ApiError::BackendUnavailable(_))
    ));
    transport.fail_tree_listing(false);
    assert_eq!(engine.refresh().await.unwrap(), RefreshOutcome::Applied);
    assert_eq!(engine.snapshot().paths(), paths);
}

#[tokio::test]
async fn test_refetch_picks_up_server_side_changes() {
    let transport = Arc::new(LoopbackTransport::new());
    let engine = remote_engine(transport.clone());
    engine.refresh().await.unwrap();

    // Appears on the server behind the engine's back
    transport.server().create_file("/generated.lock").await.unwrap();
    engine.create(NodeKind::File, "/", "new.txt").await.unwrap();

    let snapshot = engine.snapshot();
    assert!(snapshot.contains("/generated.lock"));
    assert!(snapshot.contains("/new.txt"));
}

#[tokio::test]
async fn test_failed_mutation_leaves_tree_untouched() {
    let transport = Arc::new(LoopbackTransport::new());
    let engine = remote_engine(transport.clone());
    engine.refresh().await.unwrap();
    let before = engine.snapshot();

    // The server lost /top.txt, so the local pre-check passes but the call fails
    transport.server().delete_path("/top.txt").await.unwrap();
    let err = engine.rename("/top.txt", "moved.txt").await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    assert!(engine.snapshot().ptr_eq(&before));
}

#[tokio::test(start_paused = true)]
async fn test_mutations_on_one_root_never_overlap() {
    let transport = Arc::new(LoopbackTransport::new().with_delay(Duration::from_millis(20)));
    let engine = remote_engine(transport.clone());
    engine.refresh().await.unwrap();

    let names: Vec<String> = (0..5).map(|i| format!("file{}.txt", i)).collect();
    let creates = names.iter().map(|name| {
        let engine = engine.clone();
        let name = name.clone();
        async move { engine.create(NodeKind::File, "/", &name).await }
    });
    let results = futures::future::join_all(creates).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(transport.max_in_flight(), 1);
    let tree = engine.snapshot();
    for name in &names {
        assert!(tree.contains(&format!("/{}", name)));
    }
    // Issue order is kept
    let created: Vec<String> = results.into_iter().map(|r| r.unwrap()).collect();
    let top_level: Vec<&str> = tree.nodes().iter().map(|n| n.path.as_str()).collect();
    assert_eq!(
        top_level[2..].to_vec(),
        created.iter().map(String::as_str).collect::<Vec<_>>()
    );
    assert_eq!(engine.pending_operations(), 0);
}

#[tokio::test]
async fn test_concurrent_renames_of_overlapping_subtrees_stay_consistent() {
    let engine = Arc::new(WorkspaceEngine::new(Arc::new(virtual_backend()), "/").unwrap());
    engine.refresh().await.unwrap();

    let (outer, inner) = tokio::join!(
        engine.rename("/a", "outer"),
        engine.rename("/a/nested", "inner")
    );
    // The outer rename runs first, so the inner path no longer exists
    assert!(outer.is_ok());
    assert!(matches!(inner, Err(ApiError::NotFound(_))));
    engine.snapshot().validate().unwrap();
    assert!(engine.snapshot().contains("/outer/nested/deep.txt"));
}

#[tokio::test]
async fn test_stale_refresh_is_discarded() {
    let transport = Arc::new(LoopbackTransport::new());
    let engine = remote_engine(transport.clone());
    engine.refresh().await.unwrap();

    transport.arm_gate();
    let stale = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.refresh().await })
    };
    while !transport.gate_waiting() {
        tokio::task::yield_now().await;
    }

    transport.server().create_file("/fresh.txt").await.unwrap();
    assert_eq!(engine.refresh().await.unwrap(), RefreshOutcome::Applied);

    transport.release();
    assert_eq!(stale.await.unwrap().unwrap(), RefreshOutcome::Superseded);
    assert!(engine.snapshot().contains("/fresh.txt"));
}

#[tokio::test]
async fn test_mutation_supersedes_in_flight_refresh() {
    let transport = Arc::new(LoopbackTransport::new());
    let engine = remote_engine(transport.clone());
    engine.refresh().await.unwrap();

    transport.arm_gate();
    let stale = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.refresh().await })
    };
    while !transport.gate_waiting() {
        tokio::task::yield_now().await;
    }

    engine.create(NodeKind::Directory, "/", "made").await.unwrap();
    transport.release();
    assert_eq!(stale.await.unwrap().unwrap(), RefreshOutcome::Superseded);
    assert!(engine.snapshot().find("/made").unwrap().is_dir());
}

#[tokio::test]
async fn test_editor_tabs_follow_tree_changes() {
    let tabs = Arc::new(EditorTabs::new());
    let engine = WorkspaceEngine::new(Arc::new(virtual_backend()), "/")
        .unwrap()
        .with_editor(tabs.clone());
    engine.refresh().await.unwrap();

    engine.open_file("/a/keep.txt").await.unwrap();
    engine.open_file("/a/nested/deep.txt").await.unwrap();
    engine.open_file("/top.txt").await.unwrap();

    engine.rename("/a", "b").await.unwrap();
    let paths: Vec<String> = tabs.tabs().into_iter().map(|t| t.path).collect();
    assert_eq!(paths, vec!["/b/keep.txt", "/b/nested/deep.txt", "/top.txt"]);
    assert_eq!(tabs.tab("/b/keep.txt").unwrap().content, "keep");

    engine.remove("/b/nested").await.unwrap();
    let paths: Vec<String> = tabs.tabs().into_iter().map(|t| t.path).collect();
    assert_eq!(paths, vec!["/b/keep.txt", "/top.txt"]);
}

#[tokio::test(start_paused = true)]
async fn test_rename_queued_behind_switch_root_runs_on_new_root() {
    let transport = Arc::new(LoopbackTransport::new().with_delay(Duration::from_millis(20)));
    let engine = remote_engine(transport.clone());
    engine.refresh().await.unwrap();

    let create = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.create(NodeKind::File, "/", "one.txt").await })
    };
    tokio::task::yield_now().await;
    let switch = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.switch_root("/a").await })
    };
    tokio::task::yield_now().await;
    let rename = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.rename("/a/keep.txt", "k2.txt").await })
    };

    assert_eq!(create.await.unwrap().unwrap(), "/one.txt");
    switch.await.unwrap().unwrap();
    assert_eq!(rename.await.unwrap().unwrap(), "/a/k2.txt");

    // The mirror belongs to the new root only
    assert_eq!(engine.root(), "/a");
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.root(), "/a");
    assert_eq!(
        snapshot.paths(),
        vec!["/a/k2.txt", "/a/nested", "/a/nested/deep.txt"]
    );
    assert_eq!(transport.server().read_file("/a/k2.txt").await.unwrap(), "keep");
    assert_eq!(engine.pending_operations(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_patch_create_succeeds_when_refresh_lands_first() {
    let transport = Arc::new(LoopbackTransport::new());
    transport.delay_reply(Method::Post, "/file", Duration::from_millis(50));
    let engine = Arc::new(
        WorkspaceEngine::new(Arc::new(RemoteBackend::new(transport.clone())), "/")
            .unwrap()
            .with_reconcile(ReconcilePolicy::Patch),
    );
    engine.refresh().await.unwrap();

    let create = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.create(NodeKind::File, "/", "new.txt").await })
    };
    // The server has applied the create but not replied yet
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(engine.refresh().await.unwrap(), RefreshOutcome::Applied);
    assert!(engine.snapshot().contains("/new.txt"));

    assert_eq!(create.await.unwrap().unwrap(), "/new.txt");
    let copies = engine
        .snapshot()
        .paths()
        .into_iter()
        .filter(|p| p == "/new.txt")
        .count();
    assert_eq!(copies, 1);
    assert_eq!(engine.selected().as_deref(), Some("/new.txt"));
    engine.snapshot().validate().unwrap();
}
