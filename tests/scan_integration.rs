//! Integration tests for scanning, bulk deletion and the HTTP surface.

use std::fs;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use docindex::deleter::BulkDeleter;
use docindex::scanner::{spawn_scan, ScanEvent, ScanOptions, ScanSession, SessionRegistry};
use docindex::server::{create_router, ApiKeyConfig, AppState};
use docindex::storage::{
    init_storage, query_files, register_directory, Catalog, Database, DirectoryRecord, FileQuery,
};
use tempfile::TempDir;
use tokio_stream::StreamExt;
use tower::ServiceExt;

fn open_catalog(tmp: &TempDir) -> Database {
    let db = Database::open(tmp.path().join("catalog.db")).unwrap();
    init_storage(&db).unwrap();
    db
}

fn register(db: &Database, root: &std::path::Path) -> DirectoryRecord {
    db.with_conn(|conn| register_directory(conn, root)).unwrap()
}

fn run_scan(db: &Database, dir: &DirectoryRecord, registry: &SessionRegistry) -> Vec<ScanEvent> {
    let mut session = ScanSession::new(db.clone(), dir.clone(), ScanOptions::default());
    session.start(registry).unwrap();
    let mut events = Vec::new();
    session.run(|event| events.push(event)).unwrap();
    events
}

fn filenames(db: &Database, dir: &DirectoryRecord) -> Vec<String> {
    let mut names: Vec<_> = db
        .list_files_by_directory(dir.id)
        .unwrap()
        .into_values()
        .map(|f| f.filename)
        .collect();
    names.sort();
    names
}

/// A rescan adds new files, drops removed ones and replaces modified ones.
#[test]
fn test_rescan_tracks_changes() {
    let data = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("x.txt"), "x").unwrap();
    fs::write(root.path().join("y.txt"), "y").unwrap();
    fs::create_dir(root.path().join("sub")).unwrap();
    fs::write(root.path().join("sub/keep.md"), "keep").unwrap();

    let db = open_catalog(&data);
    let dir = register(&db, root.path());
    let registry = SessionRegistry::new();

    run_scan(&db, &dir, &registry);
    assert_eq!(filenames(&db, &dir), vec!["keep.md", "x.txt", "y.txt"]);
    let x_before = db.list_files_by_directory(dir.id).unwrap();

    fs::remove_file(root.path().join("y.txt")).unwrap();
    fs::write(root.path().join("z.txt"), "z").unwrap();
    fs::write(root.path().join("x.txt"), "x grew").unwrap();

    let events = run_scan(&db, &dir, &registry);
    assert_eq!(
        events.last(),
        Some(&ScanEvent::Complete {
            total_scanned: 3,
            added: 2,
            deleted: 2,
        })
    );
    assert_eq!(filenames(&db, &dir), vec!["keep.md", "x.txt", "z.txt"]);

    let x_path = root
        .path()
        .canonicalize()
        .unwrap()
        .join("x.txt")
        .to_string_lossy()
        .into_owned();
    let x_after = db.list_files_by_directory(dir.id).unwrap();
    assert_ne!(x_before[&x_path].id, x_after[&x_path].id);
    assert_eq!(x_after[&x_path].size_bytes, 6);
}

/// Ignored subtrees never reach the catalog, and the catalog persists across reopen.
#[test]
fn test_ignore_rules_and_persistence() {
    let data = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    fs::write(root.path().join(".docignore"), "node_modules\n*.tmp\n").unwrap();
    fs::create_dir_all(root.path().join("web/node_modules/pkg")).unwrap();
    fs::write(root.path().join("web/node_modules/pkg/index.js"), "js").unwrap();
    fs::write(root.path().join("web/app.js"), "app").unwrap();
    fs::write(root.path().join("scratch.tmp"), "tmp").unwrap();

    {
        let db = open_catalog(&data);
        let dir = register(&db, root.path());
        run_scan(&db, &dir, &SessionRegistry::new());
    }

    let db = open_catalog(&data);
    let page = db
        .with_conn(|conn| query_files(conn, &FileQuery::default()))
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].filename, "app.js");
    assert_eq!(page.items[0].extension, ".js");
}

/// Dropping the event stream early does not abort the scan.
#[tokio::test]
async fn test_scan_survives_dropped_stream() {
    let data = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    for i in 0..20 {
        fs::write(root.path().join(format!("f{i:02}.txt")), "x").unwrap();
    }

    let db = open_catalog(&data);
    let dir = register(&db, root.path());
    let registry = SessionRegistry::new();

    let mut session = ScanSession::new(db.clone(), dir.clone(), ScanOptions::default());
    session.start(&registry).unwrap();
    let mut stream = spawn_scan(session);
    let first = stream.next().await.unwrap();
    assert!(matches!(first, ScanEvent::Progress { count: 1, .. }));
    drop(stream);

    for _ in 0..200 {
        if !registry.is_active(dir.id) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(!registry.is_active(dir.id));
    assert_eq!(db.list_files_by_directory(dir.id).unwrap().len(), 20);
}

/// Deleting through the library leaves an audit trail and the catalog in sync.
#[test]
fn test_bulk_delete_after_scan() {
    let data = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("a.log"), "a").unwrap();
    fs::write(root.path().join("b.log"), "b").unwrap();

    let db = open_catalog(&data);
    let dir = register(&db, root.path());
    let registry = SessionRegistry::new();
    run_scan(&db, &dir, &registry);

    let ids: Vec<i64> = db
        .list_files_by_directory(dir.id)
        .unwrap()
        .into_values()
        .map(|f| f.id)
        .collect();
    let report = BulkDeleter::new(db.clone(), registry.clone())
        .delete_files(&ids, "ops")
        .unwrap();
    assert_eq!(report.deleted_count, 2);
    assert!(report.failures.is_empty());
    assert!(report.audit_log_id.is_some());
    assert!(!root.path().join("a.log").exists());

    // A rescan finds nothing to change.
    let events = run_scan(&db, &dir, &registry);
    assert_eq!(
        events,
        vec![ScanEvent::Complete {
            total_scanned: 0,
            added: 0,
            deleted: 0,
        }]
    );
}

/// Full router with authentication.
#[tokio::test]
async fn test_router_scan_with_api_key() {
    let data = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("doc.txt"), "doc").unwrap();

    let db = open_catalog(&data);
    let dir = register(&db, root.path());
    let state = AppState::new(db, ScanOptions::default());
    let router = create_router(state, ApiKeyConfig::new(Some("secret".to_string())));

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/v1/directories/{}/scan", dir.id))
                .header("authorization", "Bearer secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "application/x-ndjson"
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    let last = text.lines().last().unwrap();
    assert_eq!(
        last,
        r#"{"type":"complete","total_scanned":1,"added":1,"deleted":0}"#
    );
}
