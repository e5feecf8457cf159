use std::sync::Arc;

use d_config::client::ReconcileWorker;
use d_config::diff::ChangeType;
use tempfile::tempdir;
use tokio::sync::watch;

use crate::commons::*;
use crate::enable_logger;

#[tokio::test]
async fn test_listener_follows_publish_modify_and_delete() {
    enable_logger();
    let dir = tempdir().expect("tempdir");
    let server = InMemoryServer::new();
    let registry = client_registry(dir.path());
    let worker = ReconcileWorker::new(registry.clone(), server.client("10.0.0.1", None));
    let listener = Recorder::change_aware();
    registry.add_listener(&key("app.properties"), listener.clone());

    server.publish(&key("app.properties"), "a=1", "properties");
    worker.run_once(0).await.expect("cycle ok");
    assert_eq!(listener.received(), vec![Some("a=1".to_string())]);

    server.publish(&key("app.properties"), "a=2", "properties");
    worker.run_once(0).await.expect("cycle ok");
    assert_eq!(listener.last(), Some(Some("a=2".to_string())));
    let modified = listener.changes()[1].change_item("a").cloned().expect("a changed");
    assert_eq!(modified.change_type, ChangeType::Modified);
    assert_eq!(modified.old_value.as_deref(), Some("1"));
    assert_eq!(modified.new_value.as_deref(), Some("2"));

    // Nothing changed on the server: no redelivery
    worker.run_once(0).await.expect("cycle ok");
    assert_eq!(listener.received().len(), 2);

    server.delete(&key("app.properties"));
    worker.run_once(0).await.expect("cycle ok");
    assert_eq!(listener.last(), Some(None));
    let deleted = listener.changes()[2].change_item("a").cloned().expect("a deleted");
    assert_eq!(deleted.change_type, ChangeType::Deleted);
}

#[tokio::test]
async fn test_structured_content_is_diffed_per_key() {
    let dir = tempdir().expect("tempdir");
    let server = InMemoryServer::new();
    let registry = client_registry(dir.path());
    let worker = ReconcileWorker::new(registry.clone(), server.client("10.0.0.1", None));
    let listener = Recorder::change_aware();
    registry.add_listener(&key("db.yaml"), listener.clone());

    server.publish(&key("db.yaml"), "db:\n  host: a\n  port: 5432\n", "yaml");
    worker.run_once(0).await.expect("cycle ok");
    server.publish(&key("db.yaml"), "db:\n  host: b\n  port: 5432\n", "yaml");
    worker.run_once(0).await.expect("cycle ok");

    let event = listener.changes().pop().expect("change event");
    assert_eq!(event.len(), 1);
    let host = event.change_item("db.host").expect("host changed");
    assert_eq!(host.new_value.as_deref(), Some("b"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_running_worker_delivers_every_publish() {
    let dir = tempdir().expect("tempdir");
    let server = InMemoryServer::new();
    let registry = client_registry(dir.path());
    let worker = Arc::new(ReconcileWorker::new(registry.clone(), server.client("10.0.0.1", None)));
    let first = Recorder::new();
    let second = Recorder::new();
    registry.add_listener(&key("a"), first.clone());
    registry.add_listener(&key("b"), second.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let handle = worker.start(shutdown_rx);

    server.publish(&key("a"), "v1", "text");
    server.publish(&key("b"), "v1", "text");
    assert!(eventually(|| first.last() == Some(Some("v1".to_string()))).await);
    assert!(eventually(|| second.last() == Some(Some("v1".to_string()))).await);

    server.publish(&key("a"), "v2", "text");
    assert!(eventually(|| first.last() == Some(Some("v2".to_string()))).await);
    assert_eq!(second.received(), vec![Some("v1".to_string())]);

    shutdown_tx.send(()).expect("worker listening");
    handle.await.expect("worker stopped cleanly");
}
