//! Container lifecycle engine.
//!
//! Maintains the per-application container handles and produces a ready
//! container on demand. The heart of the module is
//! [`LifecycleManager::ensure_ready`]: a thundering herd of first-hit
//! requests for one application must start exactly one container, while
//! requests for different applications never block each other. This is
//! enforced with one lazily created mutex per application name; entries
//! are never removed during the process lifetime.
//!
//! Handles are evicted when the readiness probe fails, when the idle
//! reaper finds them stale, when the proxy observes a transport failure,
//! and at shutdown. Eviction is identity-checked: an eviction only removes
//! the handle when it still refers to the same engine container, so the
//! reaper cannot race a concurrent warm-up and reap a fresh replacement.

pub mod probe;
pub mod reaper;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::module::registry::AppDescriptor;
use crate::module::runtime::{ContainerRuntime, RunSpec};
use crate::settings::GatewayConfig;

/// A type alias for a `Result` with the `LifecycleError` error type.
pub type Result<T, E = LifecycleError> = std::result::Result<T, E>;

/// Errors related to container warm-up.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The container started but never answered its readiness probe. The
    /// handle has already been evicted and the container stopped.
    #[error("The service on '{app}' did not respond in a timely manner. Info: {diagnostics}")]
    NotReady { app: String, diagnostics: String },

    /// The engine could not run the container.
    #[error("Error starting container: {0}")]
    Startup(String),
}

/// Reference to a live container for one application.
#[derive(Debug, Clone)]
pub struct ContainerHandle {
    /// Engine identifier of the running container.
    pub container_id: String,

    /// Monotonic timestamp of the last successful dispatch.
    pub last_access: Instant,
}

/// Maintains at most one live container per application and the
/// per-application warm-up locks.
pub struct LifecycleManager {
    runtime: Arc<dyn ContainerRuntime>,
    probe_client: reqwest::Client,
    config: GatewayConfig,
    handles: Mutex<HashMap<String, ContainerHandle>>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    running: AtomicI64,
}

impl LifecycleManager {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: GatewayConfig) -> Self {
        Self {
            runtime,
            probe_client: reqwest::Client::new(),
            config,
            handles: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            running: AtomicI64::new(0),
        }
    }

    /// Returns the gateway configuration this manager runs with.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Creates the warm-up lock for an application. Called at
    /// registration; the entry lives until process exit.
    pub async fn register_app(&self, app_name: &str) {
        self.app_lock(app_name).await;
    }

    /// Returns the per-application warm-up lock, creating it lazily.
    async fn app_lock(&self, app_name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(app_name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Produces a ready container for the application, lazily.
    ///
    /// Fast path: an existing handle is touched and returned immediately.
    /// Slow path: the per-application mutex is taken, the table re-checked
    /// (double-checked initialization), and only then is a container run
    /// and probed for readiness. The mutex is held across the probe, so
    /// concurrent first hits for the same application wait for the single
    /// warm-up instead of starting their own.
    ///
    /// # Returns
    /// The engine container id to dispatch to.
    ///
    /// # Errors
    /// - [`LifecycleError::Startup`] when the engine cannot run the image.
    /// - [`LifecycleError::NotReady`] when the probe deadline expires; the
    ///   container is stopped and its last logs are carried in the error.
    pub async fn ensure_ready(&self, descriptor: &AppDescriptor) -> Result<String> {
        if let Some(id) = self.touch(&descriptor.app_name).await {
            return Ok(id);
        }

        let lock = self.app_lock(&descriptor.app_name).await;
        let _guard = lock.lock().await;

        // Double verification: another request may have completed the
        // warm-up while this one waited on the lock.
        if let Some(id) = self.touch(&descriptor.app_name).await {
            return Ok(id);
        }

        info!("Starting container for '{}'...", descriptor.app_name);

        let container_id = self
            .runtime
            .run_container(self.run_spec(descriptor))
            .await
            .map_err(|e| LifecycleError::Startup(e.to_string()))?;

        self.install(&descriptor.app_name, &container_id).await;

        let ready = probe::wait_for_service(
            &self.probe_client,
            &descriptor.probe_url(),
            self.config.probe_timeout,
            self.config.probe_interval,
            self.config.probe_attempt_timeout,
        )
        .await;

        if !ready {
            let diagnostics = self.stop_and_collect(&container_id).await;
            self.evict(&descriptor.app_name, &container_id).await;
            return Err(LifecycleError::NotReady {
                app: descriptor.app_name.clone(),
                diagnostics,
            });
        }

        self.touch(&descriptor.app_name).await;
        Ok(container_id)
    }

    /// [`LifecycleManager::ensure_ready`] running in its own task.
    ///
    /// A client disconnect drops the request future mid-await; spawning
    /// keeps the warm-up and its readiness probe running to their
    /// deadline, so a half-started container is never orphaned.
    pub async fn ensure_ready_detached(
        self: &Arc<Self>,
        descriptor: Arc<AppDescriptor>,
    ) -> Result<String> {
        let manager = Arc::clone(self);
        let warmup = tokio::spawn(async move { manager.ensure_ready(&descriptor).await });

        match warmup.await {
            Ok(result) => result,
            Err(e) => Err(LifecycleError::Startup(e.to_string())),
        }
    }

    /// Builds the engine run specification for an application.
    fn run_spec(&self, descriptor: &AppDescriptor) -> RunSpec {
        let mut labels = HashMap::new();
        labels.insert("type".to_string(), "serverless".to_string());
        labels.insert(
            "invocation".to_string(),
            chrono::Utc::now().timestamp().to_string(),
        );

        RunSpec {
            image: descriptor.image_ref.clone(),
            internal_port: descriptor.framework.internal_port(descriptor.host_port),
            host_port: descriptor.host_port,
            env: descriptor.runtime_env(),
            labels,
            memory_limit_bytes: self.config.memory_limit_bytes,
            nano_cpus: self.config.nano_cpus,
        }
    }

    /// Installs a fresh handle for the application.
    async fn install(&self, app_name: &str, container_id: &str) {
        let mut handles = self.handles.lock().await;
        handles.insert(
            app_name.to_string(),
            ContainerHandle {
                container_id: container_id.to_string(),
                last_access: Instant::now(),
            },
        );
        self.running.fetch_add(1, Ordering::Relaxed);
    }

    /// Updates `last_access` and returns the container id when a handle
    /// exists.
    pub async fn touch(&self, app_name: &str) -> Option<String> {
        let mut handles = self.handles.lock().await;
        handles.get_mut(app_name).map(|handle| {
            handle.last_access = Instant::now();
            handle.container_id.clone()
        })
    }

    /// Whether a live handle exists for the application.
    pub async fn is_running(&self, app_name: &str) -> bool {
        self.handles.lock().await.contains_key(app_name)
    }

    /// Removes the handle when it still refers to `container_id`.
    ///
    /// Returns `true` when the handle was removed. The identity check
    /// keeps a stale eviction (reaper, failed forward) from removing a
    /// replacement container installed in the meantime.
    pub async fn evict(&self, app_name: &str, container_id: &str) -> bool {
        let mut handles = self.handles.lock().await;
        match handles.get(app_name) {
            Some(handle) if handle.container_id == container_id => {
                handles.remove(app_name);
                self.running.fetch_sub(1, Ordering::Relaxed);
                true
            }
            _ => false,
        }
    }

    /// Evicts handles whose last access is older than the idle timeout,
    /// stopping and removing their containers. Errors are logged and
    /// swallowed; the reaper must never die.
    pub async fn reap_idle(&self) {
        let idle_timeout = self.config.idle_timeout;
        let now = Instant::now();

        let expired: Vec<(String, ContainerHandle)> = {
            let handles = self.handles.lock().await;
            handles
                .iter()
                .filter(|(_, handle)| now.duration_since(handle.last_access) > idle_timeout)
                .map(|(name, handle)| (name.clone(), handle.clone()))
                .collect()
        };

        for (app_name, handle) in expired {
            if !self.evict(&app_name, &handle.container_id).await {
                continue;
            }

            let idle = now.duration_since(handle.last_access);
            info!(
                "Container '{}' stopped due to inactivity ({:.1}s)",
                app_name,
                idle.as_secs_f64()
            );

            if let Err(e) = self
                .runtime
                .stop_container(&handle.container_id, self.config.stop_grace)
                .await
            {
                warn!("Error stopping container '{}': {}", app_name, e);
            }
            if let Err(e) = self.runtime.remove_container(&handle.container_id, false).await {
                warn!("Error removing container '{}': {}", app_name, e);
            }
        }
    }

    /// Stops a container, captures its exit code and last logs, and
    /// removes it. Used to attach diagnostics to failed warm-ups.
    pub async fn stop_and_collect(&self, container_id: &str) -> String {
        let state = self.runtime.container_state(container_id).await;

        if matches!(state, Ok(s) if s.is_running())
            && let Err(e) = self
                .runtime
                .stop_container(container_id, self.config.stop_grace)
                .await
        {
            warn!("Error stopping container {}: {}", container_id, e);
        }

        let exit_code = self.runtime.wait_container(container_id).await.ok();
        let logs = self
            .runtime
            .logs(container_id, 50)
            .await
            .unwrap_or_default();

        if let Err(e) = self.runtime.remove_container(container_id, true).await {
            warn!("Error removing container {}: {}", container_id, e);
        }

        match exit_code {
            Some(code) => format!("exit_code={}, logs: {}", code, logs.trim()),
            None => format!("logs: {}", logs.trim()),
        }
    }

    /// Stops and removes every live container. Called once at shutdown.
    pub async fn shutdown(&self) {
        let drained: Vec<(String, ContainerHandle)> = {
            let mut handles = self.handles.lock().await;
            self.running.store(0, Ordering::Relaxed);
            handles.drain().collect()
        };

        for (app_name, handle) in drained {
            info!("Stopping container for '{}'", app_name);
            if let Err(e) = self
                .runtime
                .stop_container(&handle.container_id, self.config.stop_grace)
                .await
            {
                warn!("Error stopping container '{}': {}", app_name, e);
            }
            if let Err(e) = self.runtime.remove_container(&handle.container_id, false).await {
                warn!("Error removing container '{}': {}", app_name, e);
            }
        }
    }

    /// Shared counter of live containers, read by the metrics collector.
    pub fn running_count(&self) -> &AtomicI64 {
        &self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::registry::Framework;
    use crate::test::{HttpStub, MockRuntime, descriptor_for};
    use std::time::Duration;

    fn fast_config() -> GatewayConfig {
        GatewayConfig {
            probe_timeout: Duration::from_millis(400),
            probe_interval: Duration::from_millis(20),
            probe_attempt_timeout: Duration::from_millis(100),
            idle_timeout: Duration::from_millis(80),
            reap_interval: Duration::from_millis(20),
            stop_grace: Duration::from_millis(10),
            ..GatewayConfig::default()
        }
    }

    #[tokio::test]
    async fn concurrent_first_hits_start_exactly_one_container() {
        let stub = HttpStub::spawn().await;
        let runtime = Arc::new(MockRuntime::new());
        let lifecycle = Arc::new(LifecycleManager::new(
            Arc::clone(&runtime) as Arc<dyn ContainerRuntime>,
            fast_config(),
        ));
        let descriptor = Arc::new(descriptor_for("shop", Framework::Vite, stub.port()));

        let mut tasks = Vec::new();
        for _ in 0..50 {
            let lifecycle = Arc::clone(&lifecycle);
            let descriptor = Arc::clone(&descriptor);
            tasks.push(tokio::spawn(async move {
                lifecycle.ensure_ready(&descriptor).await
            }));
        }

        for task in tasks {
            task.await.expect("join").expect("ensure_ready");
        }

        assert_eq!(runtime.run_calls(), 1);
        assert!(lifecycle.is_running("shop").await);
    }

    #[tokio::test]
    async fn failed_probe_evicts_and_stops_the_container() {
        let port = crate::test::unused_port().await;
        let runtime = Arc::new(MockRuntime::new());
        let lifecycle = LifecycleManager::new(
            Arc::clone(&runtime) as Arc<dyn ContainerRuntime>,
            fast_config(),
        );
        let descriptor = descriptor_for("shop", Framework::Vite, port);

        let result = lifecycle.ensure_ready(&descriptor).await;
        assert!(matches!(result, Err(LifecycleError::NotReady { .. })));

        assert_eq!(runtime.run_calls(), 1);
        assert!(runtime.remove_calls() >= 1);
        assert!(!lifecycle.is_running("shop").await);
    }

    #[tokio::test]
    async fn run_failure_surfaces_as_startup_error() {
        let runtime = Arc::new(MockRuntime::failing());
        let lifecycle = LifecycleManager::new(
            Arc::clone(&runtime) as Arc<dyn ContainerRuntime>,
            fast_config(),
        );
        let descriptor = descriptor_for("shop", Framework::Vite, 3999);

        let result = lifecycle.ensure_ready(&descriptor).await;
        assert!(matches!(result, Err(LifecycleError::Startup(_))));
        assert!(!lifecycle.is_running("shop").await);
    }

    #[tokio::test]
    async fn idle_handles_are_reaped() {
        let stub = HttpStub::spawn().await;
        let runtime = Arc::new(MockRuntime::new());
        let lifecycle = LifecycleManager::new(
            Arc::clone(&runtime) as Arc<dyn ContainerRuntime>,
            fast_config(),
        );
        let descriptor = descriptor_for("shop", Framework::Vite, stub.port());

        lifecycle.ensure_ready(&descriptor).await.expect("warm up");
        assert!(lifecycle.is_running("shop").await);

        tokio::time::sleep(Duration::from_millis(150)).await;
        lifecycle.reap_idle().await;

        assert!(!lifecycle.is_running("shop").await);
        assert!(runtime.stop_calls() >= 1);
        assert!(runtime.remove_calls() >= 1);

        // The next request warms a fresh container.
        lifecycle.ensure_ready(&descriptor).await.expect("rewarm");
        assert_eq!(runtime.run_calls(), 2);
    }

    #[tokio::test]
    async fn fresh_handles_survive_the_reaper() {
        let stub = HttpStub::spawn().await;
        let runtime = Arc::new(MockRuntime::new());
        let lifecycle = LifecycleManager::new(
            Arc::clone(&runtime) as Arc<dyn ContainerRuntime>,
            fast_config(),
        );
        let descriptor = descriptor_for("shop", Framework::Vite, stub.port());

        lifecycle.ensure_ready(&descriptor).await.expect("warm up");
        lifecycle.reap_idle().await;

        assert!(lifecycle.is_running("shop").await);
        assert_eq!(runtime.stop_calls(), 0);
    }

    #[tokio::test]
    async fn eviction_checks_container_identity() {
        let stub = HttpStub::spawn().await;
        let runtime = Arc::new(MockRuntime::new());
        let lifecycle = LifecycleManager::new(
            Arc::clone(&runtime) as Arc<dyn ContainerRuntime>,
            fast_config(),
        );
        let descriptor = descriptor_for("shop", Framework::Vite, stub.port());

        let id = lifecycle.ensure_ready(&descriptor).await.expect("warm up");

        assert!(!lifecycle.evict("shop", "some-other-container").await);
        assert!(lifecycle.is_running("shop").await);

        assert!(lifecycle.evict("shop", &id).await);
        assert!(!lifecycle.is_running("shop").await);
    }

    #[tokio::test]
    async fn shutdown_drains_every_handle() {
        let stub = HttpStub::spawn().await;
        let runtime = Arc::new(MockRuntime::new());
        let lifecycle = LifecycleManager::new(
            Arc::clone(&runtime) as Arc<dyn ContainerRuntime>,
            fast_config(),
        );

        let a = descriptor_for("a", Framework::Vite, stub.port());
        let b = descriptor_for("b", Framework::Nextjs, stub.port());
        // The nextjs probe path requires the stub to answer under the base
        // path, which it does for any path.
        lifecycle.ensure_ready(&a).await.expect("warm a");
        lifecycle.ensure_ready(&b).await.expect("warm b");

        lifecycle.shutdown().await;

        assert!(!lifecycle.is_running("a").await);
        assert!(!lifecycle.is_running("b").await);
        assert_eq!(runtime.stop_calls(), 2);
        assert_eq!(runtime.remove_calls(), 2);
    }
}
