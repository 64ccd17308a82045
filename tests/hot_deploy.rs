//! Hot deploy against a real directory watch.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use plugin_gateway::deploy::{
    DeclarativeScriptLoader, DeploySettings, HotDeployer, NotifySource, WatcherState,
};
use plugin_gateway::plugins::PluginRegistry;

async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}

fn write(dir: &Path, name: &str, body: &str) {
    std::fs::write(dir.join(name), body).unwrap();
}

#[tokio::test]
async fn test_deploy_redeploy_undeploy() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "existing.toml", "name = \"existing\"\nsecured = false");

    let registry = Arc::new(PluginRegistry::default());
    let mut deployer = HotDeployer::new(
        registry.clone(),
        Arc::new(DeclarativeScriptLoader::default()),
        NotifySource::new(Duration::from_millis(100)),
        DeploySettings {
            directory: dir.path().to_path_buf(),
            startup_delay: Duration::ZERO,
            deploy_timeout: Duration::from_secs(5),
        },
    );
    let mut state = deployer.subscribe_state();
    let (shutdown, rx) = broadcast::channel(1);
    let task = tokio::spawn(async move {
        let result = deployer.run(rx).await;
        (deployer, result)
    });

    state
        .wait_for(|s| *s == WatcherState::Watching)
        .await
        .unwrap();
    assert!(registry.lookup("/existing").is_some());

    write(dir.path(), "moving.toml", "name = \"moving\"\nuri = \"/a\"");
    assert!(eventually(|| registry.lookup("/a").is_some()).await);

    write(dir.path(), "moving.toml", "name = \"moving\"\nuri = \"/b\"");
    assert!(eventually(|| registry.lookup("/b").is_some() && registry.lookup("/a").is_none()).await);

    std::fs::remove_file(dir.path().join("moving.toml")).unwrap();
    assert!(eventually(|| registry.lookup("/b").is_none()).await);

    shutdown.send(()).unwrap();
    let (deployer, result) = task.await.unwrap();
    assert!(result.is_ok());
    assert_eq!(deployer.state(), WatcherState::Stopped);
    let remaining: Vec<_> = deployer
        .deployments()
        .values()
        .map(|e| e.service_name.clone())
        .collect();
    assert_eq!(remaining, vec!["existing".to_string()]);
}
