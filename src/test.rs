//! # 🔬 Test Environment Infrastructure
//!
//! This module provides utilities for exercising the gateway without a
//! container engine:
//!
//! - [`MockRuntime`] — a counting implementation of the container runtime
//!   adapter. Tests assert on how often containers were run, stopped, and
//!   removed, which is how the single-start and reaping guarantees are
//!   verified.
//! - [`HttpStub`] — a minimal in-process HTTP server standing in for the
//!   containerized application. It echoes the request line and headers
//!   back in the response body, so proxy tests can assert on the exact
//!   path and header set the upstream received. Variants stop serving
//!   after a number of connections or go silent, to simulate dead and
//!   hanging containers.
//!
//! The module is intended for unit and integration testing scenarios; it
//! is not part of the production runtime.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::module::registry::{AppDescriptor, Framework};
use crate::module::runtime::{ContainerRuntime, ContainerState, Result, RunSpec, RuntimeError};

/// Builds a descriptor the way registration would, without a build step.
pub fn descriptor_for(name: &str, framework: Framework, port: u16) -> AppDescriptor {
    AppDescriptor {
        app_name: name.to_string(),
        framework,
        host_port: port,
        env_vars: HashMap::new(),
        image_ref: format!("{}:latest", name),
    }
}

/// Binds an ephemeral port and releases it, returning a port that is very
/// likely unused for the duration of a short test.
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind ephemeral port");
    let port = listener
        .local_addr()
        .expect("Failed to read local address")
        .port();
    drop(listener);
    port
}

/// Serving behavior of an [`HttpStub`].
enum StubMode {
    /// Echo every request.
    Echo,
    /// Echo the first `n` connections, then stop accepting. Later
    /// connection attempts are refused, like a container that died.
    RefuseAfter(usize),
    /// Echo the first `n` connections, then accept but never answer,
    /// like a container that hangs.
    SilentAfter(usize),
}

/// Minimal in-process HTTP upstream used by lifecycle and proxy tests.
pub struct HttpStub {
    port: u16,
    handle: JoinHandle<()>,
}

impl HttpStub {
    /// Spawns a stub that answers every request.
    pub async fn spawn() -> Self {
        Self::spawn_with(StubMode::Echo).await
    }

    /// Spawns a stub that answers `n` connections and then refuses.
    pub async fn spawn_refusing_after(n: usize) -> Self {
        Self::spawn_with(StubMode::RefuseAfter(n)).await
    }

    /// Spawns a stub that answers `n` connections and then hangs.
    pub async fn spawn_silent_after(n: usize) -> Self {
        Self::spawn_with(StubMode::SilentAfter(n)).await
    }

    /// Port the stub is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    async fn spawn_with(mode: StubMode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind stub listener");
        let port = listener
            .local_addr()
            .expect("Failed to read stub address")
            .port();

        let handle = tokio::spawn(async move {
            let mut served: usize = 0;
            loop {
                // Dropping the listener refuses all further connection
                // attempts, like a container that died.
                if let StubMode::RefuseAfter(n) = &mode
                    && served >= *n
                {
                    break;
                }

                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };

                let answer = match &mode {
                    StubMode::Echo | StubMode::RefuseAfter(_) => true,
                    StubMode::SilentAfter(n) => served < *n,
                };
                served += 1;

                tokio::spawn(async move {
                    if answer {
                        echo_connection(socket).await;
                    } else {
                        hold_connection(socket).await;
                    }
                });
            }
        });

        HttpStub { port, handle }
    }
}

impl Drop for HttpStub {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Reads the request head and writes it back as the response body:
/// the first line is `<METHOD> <PATH>`, followed by the header lines.
async fn echo_connection(mut socket: tokio::net::TcpStream) {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        match socket.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.windows(4).any(|w| w == b"\r\n\r\n") || buffer.len() > 64 * 1024 {
                    break;
                }
            }
            Err(_) => return,
        }
    }

    let head = String::from_utf8_lossy(&buffer);
    let head = head.split("\r\n\r\n").next().unwrap_or_default();
    let body: String = head
        .lines()
        .map(|line| {
            // Drop the protocol suffix of the request line so assertions
            // read `<METHOD> <PATH>`.
            if line.starts_with("HTTP/") || !line.contains(':') {
                line.split(" HTTP/").next().unwrap_or(line).to_string()
            } else {
                line.to_ascii_lowercase()
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    let response = format!(
        "HTTP/1.1 200 OK\r\n\
         content-type: text/plain\r\n\
         x-upstream: stub\r\n\
         connection: close\r\n\
         content-length: {}\r\n\r\n{}",
        body.len(),
        body
    );

    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Keeps the socket open without ever answering.
async fn hold_connection(mut socket: tokio::net::TcpStream) {
    let mut sink = [0u8; 1024];
    loop {
        match socket.read(&mut sink).await {
            Ok(0) | Err(_) => break,
            Ok(_) => tokio::time::sleep(Duration::from_millis(50)).await,
        }
    }
    // Hold the connection a little longer than any test timeout.
    tokio::time::sleep(Duration::from_secs(60)).await;
}

/// Counting container runtime used by lifecycle and endpoint tests.
///
/// Containers are purely virtual: `run_container` hands out sequential
/// ids and the counters record every engine interaction.
pub struct MockRuntime {
    run_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    remove_calls: AtomicUsize,
    build_calls: AtomicUsize,
    sequence: AtomicUsize,
    fail_run: bool,
    fail_build: bool,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self {
            run_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            remove_calls: AtomicUsize::new(0),
            build_calls: AtomicUsize::new(0),
            sequence: AtomicUsize::new(0),
            fail_run: false,
            fail_build: false,
        }
    }

    /// A runtime whose `run_container` always fails.
    pub fn failing() -> Self {
        Self {
            fail_run: true,
            ..Self::new()
        }
    }

    /// A runtime whose `build_image` always fails.
    pub fn failing_build() -> Self {
        Self {
            fail_build: true,
            ..Self::new()
        }
    }

    pub fn run_calls(&self) -> usize {
        self.run_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    pub fn build_calls(&self) -> usize {
        self.build_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn build_image(
        &self,
        _context_dir: &Path,
        _dockerfile: &str,
        tag: &str,
        _build_args: &HashMap<String, String>,
    ) -> Result<String> {
        self.build_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_build {
            return Err(RuntimeError::Build("simulated build failure".to_string()));
        }
        Ok(tag.to_string())
    }

    async fn run_container(&self, _spec: RunSpec) -> Result<String> {
        if self.fail_run {
            return Err(RuntimeError::Engine("simulated run failure".to_string()));
        }
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        let id = self.sequence.fetch_add(1, Ordering::SeqCst);
        Ok(format!("mock-container-{}", id))
    }

    async fn container_state(&self, _id: &str) -> Result<ContainerState> {
        Ok(ContainerState::Running)
    }

    async fn logs(&self, id: &str, _tail: usize) -> Result<String> {
        Ok(format!("logs of {}", id))
    }

    async fn stop_container(&self, _id: &str, _grace: Duration) -> Result<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove_container(&self, _id: &str, _force: bool) -> Result<()> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn wait_container(&self, _id: &str) -> Result<i64> {
        Ok(0)
    }
}
