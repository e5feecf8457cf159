use d_config::client::ReconcileWorker;
use tempfile::tempdir;

use crate::commons::*;

#[tokio::test]
async fn test_beta_reaches_only_targeted_clients() {
    let server = InMemoryServer::new();
    let canary_dir = tempdir().expect("tempdir");
    let stable_dir = tempdir().expect("tempdir");
    let canary = client_registry(canary_dir.path());
    let stable = client_registry(stable_dir.path());
    let canary_worker = ReconcileWorker::new(canary.clone(), server.client("10.0.0.1", None));
    let stable_worker = ReconcileWorker::new(stable.clone(), server.client("10.0.0.2", None));
    let canary_listener = Recorder::new();
    let stable_listener = Recorder::new();
    canary.add_listener(&key("app"), canary_listener.clone());
    stable.add_listener(&key("app"), stable_listener.clone());

    server.publish(&key("app"), "P", "text");
    server.publish_beta(&key("app"), "B", &["10.0.0.1"]);
    canary_worker.run_once(0).await.expect("cycle ok");
    stable_worker.run_once(0).await.expect("cycle ok");

    assert_eq!(canary_listener.last(), Some(Some("B".to_string())));
    assert_eq!(stable_listener.last(), Some(Some("P".to_string())));

    server.stop_beta(&key("app"));
    canary_worker.run_once(0).await.expect("cycle ok");
    stable_worker.run_once(0).await.expect("cycle ok");

    assert_eq!(canary_listener.received(), vec![Some("B".to_string()), Some("P".to_string())]);
    assert_eq!(stable_listener.received(), vec![Some("P".to_string())]);
}

#[tokio::test]
async fn test_tag_overrides_beta() {
    let server = InMemoryServer::new();
    let dir = tempdir().expect("tempdir");
    let registry = client_registry(dir.path());
    let worker = ReconcileWorker::new(registry.clone(), server.client("10.0.0.1", Some("canary")));
    let listener = Recorder::new();
    registry.add_listener(&key("app"), listener.clone());

    server.publish(&key("app"), "P", "text");
    server.publish_beta(&key("app"), "B", &["10.0.0.1"]);
    server.publish_tag(&key("app"), "canary", "T");
    worker.run_once(0).await.expect("cycle ok");

    assert_eq!(listener.received(), vec![Some("T".to_string())]);
}
