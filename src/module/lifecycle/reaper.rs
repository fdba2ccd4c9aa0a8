//! Idle container reaper.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::LifecycleManager;

/// Spawns the long-lived reaper task.
///
/// Scans the lifecycle table on the configured period and evicts handles
/// whose last access exceeds the idle timeout. The task runs until the
/// returned handle is aborted at shutdown; scan errors never escape the
/// lifecycle manager.
pub fn spawn(lifecycle: Arc<LifecycleManager>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(lifecycle.config().reap_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick of a tokio interval fires immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            debug!("Scanning for idle containers");
            lifecycle.reap_idle().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::registry::Framework;
    use crate::module::runtime::ContainerRuntime;
    use crate::settings::GatewayConfig;
    use crate::test::{HttpStub, MockRuntime, descriptor_for};
    use std::time::Duration;

    #[tokio::test]
    async fn reaper_task_evicts_within_one_period_plus_grace() {
        let stub = HttpStub::spawn().await;
        let runtime = Arc::new(MockRuntime::new());
        let config = GatewayConfig {
            idle_timeout: Duration::from_millis(60),
            reap_interval: Duration::from_millis(20),
            probe_timeout: Duration::from_millis(400),
            probe_interval: Duration::from_millis(20),
            probe_attempt_timeout: Duration::from_millis(100),
            stop_grace: Duration::from_millis(10),
            ..GatewayConfig::default()
        };
        let lifecycle = Arc::new(LifecycleManager::new(
            Arc::clone(&runtime) as Arc<dyn ContainerRuntime>,
            config,
        ));
        let descriptor = descriptor_for("shop", Framework::Vite, stub.port());

        lifecycle.ensure_ready(&descriptor).await.expect("warm up");

        let reaper = spawn(Arc::clone(&lifecycle));
        tokio::time::sleep(Duration::from_millis(250)).await;
        reaper.abort();

        assert!(!lifecycle.is_running("shop").await);
    }
}
