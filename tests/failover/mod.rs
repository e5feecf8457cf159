use std::fs;
use std::sync::Arc;

use async_trait::async_trait;
use d_config::client::ConfigProbe;
use d_config::client::ConfigTransport;
use d_config::client::FileFallbackLoader;
use d_config::client::ReconcileWorker;
use d_config::client::RemoteConfig;
use d_config::Error;
use d_config::GroupKey;
use d_config::LocalStoreConfig;
use d_config::Result;
use tempfile::tempdir;

use crate::commons::*;

struct UnreachableServer;

#[async_trait]
impl ConfigTransport for UnreachableServer {
    async fn check_updates(
        &self,
        _probes: Vec<ConfigProbe>,
        _has_initializing: bool,
    ) -> Result<Vec<GroupKey>> {
        Err(Error::Transport("connection refused".into()))
    }

    async fn fetch(
        &self,
        _key: &GroupKey,
    ) -> Result<RemoteConfig> {
        Err(Error::Transport("connection refused".into()))
    }
}

#[tokio::test]
async fn test_failover_file_overrides_server_until_removed() {
    let dir = tempdir().expect("tempdir");
    let server = InMemoryServer::new();
    let registry = client_registry(dir.path());
    let worker = ReconcileWorker::new(registry.clone(), server.client("10.0.0.1", None));
    let listener = Recorder::new();
    registry.add_listener(&key("app"), listener.clone());

    server.publish(&key("app"), "remote-1", "text");
    worker.run_once(0).await.expect("cycle ok");

    let loader = FileFallbackLoader::new(&LocalStoreConfig {
        root_dir: dir.path().to_path_buf(),
        snapshot_enabled: true,
    });
    let failover = loader.failover_path(AGENT, &key("app")).expect("valid path");
    fs::create_dir_all(failover.parent().expect("has parent")).expect("create dirs");
    fs::write(&failover, "local").expect("write failover");

    worker.run_once(0).await.expect("cycle ok");
    server.publish(&key("app"), "remote-2", "text");
    worker.run_once(0).await.expect("cycle ok");
    assert_eq!(listener.received(), vec![Some("remote-1".to_string()), Some("local".to_string())]);

    fs::remove_file(&failover).expect("remove failover");
    worker.run_once(0).await.expect("cycle ok");
    assert_eq!(listener.last(), Some(Some("remote-2".to_string())));
}

#[tokio::test]
async fn test_snapshot_serves_content_while_server_is_down() {
    let dir = tempdir().expect("tempdir");
    let server = InMemoryServer::new();
    {
        let registry = client_registry(dir.path());
        let worker = ReconcileWorker::new(registry.clone(), server.client("10.0.0.1", None));
        registry.add_listener(&key("app"), Recorder::new());
        server.publish(&key("app"), "cached", "text");
        worker.run_once(0).await.expect("cycle ok");
    }

    // A restarted client with the server gone
    let registry = client_registry(dir.path());
    let worker = ReconcileWorker::new(registry.clone(), Arc::new(UnreachableServer));
    registry.add_listener(&key("app"), Recorder::new());

    assert!(worker.run_once(0).await.is_err());
    let entry = registry.get(&key("app")).expect("entry");
    assert_eq!(entry.content().as_deref(), Some("cached"));
    assert!(entry.is_initializing());
}
