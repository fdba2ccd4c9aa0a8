//! Container runtime adapter.
//!
//! A thin capability layer over the container engine. The gateway talks to
//! the engine exclusively through the [`ContainerRuntime`] trait so the
//! lifecycle engine and the HTTP surface can be exercised against a mock
//! runtime in tests, while production uses the Docker implementation in
//! [`docker`].

pub mod docker;

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use docker::DockerRuntime;

/// A type alias for a `Result` with the `RuntimeError` error type.
pub type Result<T, E = RuntimeError> = std::result::Result<T, E>;

/// Errors related to container engine operations.
///
/// This enum groups all engine-level errors in a single type, making error
/// handling consistent across the application. Each variant represents
/// a specific failure scenario and provides a human-readable error message.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The engine daemon could not be reached.
    #[error("Container engine connection error: {0}")]
    Connection(String),

    /// An image build failed.
    #[error("Image build error: {0}")]
    Build(String),

    /// The referenced image or container does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other engine error.
    #[error("Container engine error: {0}")]
    Engine(String),
}

/// Coarse view of a container's engine status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Running,
    Exited,
    Unknown,
}

impl ContainerState {
    pub fn is_running(self) -> bool {
        matches!(self, ContainerState::Running)
    }
}

/// Everything the engine needs to run one application container.
///
/// Built by the lifecycle manager from an application descriptor and the
/// gateway configuration; consumed by [`ContainerRuntime::run_container`].
#[derive(Debug, Clone)]
pub struct RunSpec {
    /// Image reference, e.g. `myapp:latest`.
    pub image: String,

    /// Port the service listens on inside the container.
    pub internal_port: u16,

    /// Host port the container port is published to.
    pub host_port: u16,

    /// Environment entries in `KEY=value` form.
    pub env: Vec<String>,

    /// Labels attached to the container.
    pub labels: HashMap<String, String>,

    /// Memory cap in bytes.
    pub memory_limit_bytes: i64,

    /// CPU quota in nano-CPUs.
    pub nano_cpus: i64,
}

/// Capability set of the container engine.
///
/// - `build_image` is the registration-time image build.
/// - `run_container` returns after the container is created and started,
///   not after the contained service is ready; readiness is the lifecycle
///   manager's problem.
/// - `stop_container`/`remove_container`/`wait_container` are the teardown
///   half, used by the reaper and by failed warm-ups.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Builds an image from `context_dir` using the named dockerfile and
    /// the given build arguments. Returns the image reference.
    async fn build_image(
        &self,
        context_dir: &Path,
        dockerfile: &str,
        tag: &str,
        build_args: &HashMap<String, String>,
    ) -> Result<String>;

    /// Creates and starts a container. Returns the engine container id.
    async fn run_container(&self, spec: RunSpec) -> Result<String>;

    /// Queries the engine status of a container.
    async fn container_state(&self, id: &str) -> Result<ContainerState>;

    /// Fetches the last `tail` log lines of a container.
    async fn logs(&self, id: &str, tail: usize) -> Result<String>;

    /// Stops a container, giving it `grace` to exit cleanly.
    async fn stop_container(&self, id: &str, grace: Duration) -> Result<()>;

    /// Removes a container.
    async fn remove_container(&self, id: &str, force: bool) -> Result<()>;

    /// Waits for a container to exit and returns its exit code.
    async fn wait_container(&self, id: &str) -> Result<i64>;
}

#[cfg(test)]
mod tests {
    use super::ContainerState;

    #[test]
    fn container_state_running_check() {
        assert!(ContainerState::Running.is_running());
        assert!(!ContainerState::Exited.is_running());
        assert!(!ContainerState::Unknown.is_running());
    }
}
