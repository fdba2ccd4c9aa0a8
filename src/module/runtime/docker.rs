//! Docker implementation of the container runtime adapter.
//!
//! Talks to the local Docker daemon through `bollard`. Image builds stream
//! the engine's build output into the application log; the build context is
//! a tar archive of the project directory honoring its `.dockerignore`.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::LogOutput;
use bollard::query_parameters::{
    BuildImageOptions, CreateContainerOptions, InspectContainerOptions, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use bollard::service::{ContainerCreateBody, HostConfig, PortBinding};
use colored::Colorize;
use futures_util::StreamExt;
use tracing::{debug, info};

use super::{ContainerRuntime, ContainerState, Result, RunSpec, RuntimeError};

/// Container runtime backed by the local Docker daemon.
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connects to the Docker daemon using the default socket.
    ///
    /// # Returns
    /// - `Ok(DockerRuntime)` when the daemon socket is usable.
    /// - `Err(RuntimeError::Connection)` otherwise.
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError::Connection(e.to_string()))?;
        Ok(Self { docker })
    }
}

/// Maps a `bollard` error into the adapter's error type.
fn to_err(e: bollard::errors::Error) -> RuntimeError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => RuntimeError::NotFound(e.to_string()),
        _ => RuntimeError::Engine(e.to_string()),
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn build_image(
        &self,
        context_dir: &Path,
        dockerfile: &str,
        tag: &str,
        build_args: &HashMap<String, String>,
    ) -> Result<String> {
        let tar_bytes = create_build_context(context_dir)?;

        let opts = BuildImageOptions {
            dockerfile: dockerfile.to_string(),
            t: Some(tag.to_string()),
            buildargs: Some(build_args.clone()),
            rm: true,
            forcerm: true,
            ..Default::default()
        };

        let body = bollard::body_full(tar_bytes.into());
        let mut stream = self.docker.build_image(opts, None, Some(body));
        while let Some(result) = stream.next().await {
            match result {
                Ok(chunk) => {
                    if let Some(line) = chunk.stream {
                        let msg = line.trim();
                        if !msg.is_empty() {
                            debug!("Build: {}", msg);
                        }
                    }
                    if let Some(error) = chunk.error {
                        return Err(RuntimeError::Build(error));
                    }
                    if let Some(detail) = chunk.error_detail {
                        let msg = detail.message.unwrap_or_default();
                        return Err(RuntimeError::Build(msg));
                    }
                }
                Err(e) => return Err(RuntimeError::Build(e.to_string())),
            }
        }

        info!("{} {}", "Built image".bright_green(), tag.bright_blue());
        Ok(tag.to_string())
    }

    async fn run_container(&self, spec: RunSpec) -> Result<String> {
        let container_port_key = format!("{}/tcp", spec.internal_port);

        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            container_port_key.clone(),
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(spec.host_port.to_string()),
            }]),
        );

        let host_config = HostConfig {
            port_bindings: Some(port_bindings),
            memory: Some(spec.memory_limit_bytes),
            nano_cpus: Some(spec.nano_cpus),
            ..Default::default()
        };

        let body = ContainerCreateBody {
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            labels: Some(spec.labels.clone()),
            exposed_ports: Some(HashMap::from([(container_port_key, HashMap::new())])),
            host_config: Some(host_config),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(None::<CreateContainerOptions>, body)
            .await
            .map_err(to_err)?;

        self.docker
            .start_container(&response.id, None::<StartContainerOptions>)
            .await
            .map_err(to_err)?;

        info!(
            "{} {} {} {}",
            "Started container".bright_green(),
            (&response.id[..12]).bright_blue(),
            "for image".bright_green(),
            spec.image.bright_blue()
        );

        Ok(response.id)
    }

    async fn container_state(&self, id: &str) -> Result<ContainerState> {
        let inspect = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(to_err)?;

        let state = inspect.state;
        let running = state.as_ref().and_then(|s| s.running).unwrap_or(false);

        Ok(if running {
            ContainerState::Running
        } else if state.is_some() {
            ContainerState::Exited
        } else {
            ContainerState::Unknown
        })
    }

    async fn logs(&self, id: &str, tail: usize) -> Result<String> {
        let opts = LogsOptions {
            stdout: true,
            stderr: true,
            tail: tail.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.logs(id, Some(opts));
        let mut output = String::new();

        while let Some(result) = stream.next().await {
            match result {
                Ok(LogOutput::StdOut { message }) | Ok(LogOutput::StdErr { message }) => {
                    output.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(_) => {}
                Err(e) => return Err(to_err(e)),
            }
        }

        Ok(output)
    }

    async fn stop_container(&self, id: &str, grace: Duration) -> Result<()> {
        self.docker
            .stop_container(
                id,
                Some(StopContainerOptions {
                    t: Some(grace.as_secs() as i32),
                    signal: None,
                }),
            )
            .await
            .map_err(to_err)?;
        Ok(())
    }

    async fn remove_container(&self, id: &str, force: bool) -> Result<()> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force,
                    ..Default::default()
                }),
            )
            .await
            .map_err(to_err)?;
        Ok(())
    }

    async fn wait_container(&self, id: &str) -> Result<i64> {
        let mut stream = self
            .docker
            .wait_container(id, None::<WaitContainerOptions>);

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            Some(Err(e)) => Err(to_err(e)),
            None => Err(RuntimeError::Engine(
                "Container wait stream ended without a status".to_string(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Build-context helpers
// ---------------------------------------------------------------------------

/// Parses `.dockerignore` in the context directory into (pattern, negated)
/// rules. Missing or unreadable files yield no rules.
fn parse_dockerignore(context_dir: &Path) -> Vec<(String, bool)> {
    let ignore_path = context_dir.join(".dockerignore");
    let content = match std::fs::read_to_string(&ignore_path) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };

    content
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return None;
            }
            if let Some(pattern) = trimmed.strip_prefix('!') {
                Some((pattern.trim_end_matches('/').to_string(), true))
            } else {
                Some((trimmed.trim_end_matches('/').to_string(), false))
            }
        })
        .collect()
}

/// Applies the ignore rules to a context-relative path. Later rules win,
/// matching the engine's own evaluation order.
fn is_ignored(rel_path: &str, rules: &[(String, bool)]) -> bool {
    let mut ignored = false;
    for (pattern, negated) in rules {
        let matches =
            glob_match(pattern, rel_path) || rel_path.starts_with(&format!("{}/", pattern));
        if matches {
            ignored = !negated;
        }
    }
    ignored
}

fn glob_match(pattern: &str, text: &str) -> bool {
    let mut regex_str = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => regex_str.push_str(".*"),
            '?' => regex_str.push('.'),
            '.' | '+' | '(' | ')' | '{' | '}' | '[' | ']' | '^' | '$' | '|' | '\\' => {
                regex_str.push('\\');
                regex_str.push(ch);
            }
            _ => regex_str.push(ch),
        }
    }
    regex_str.push('$');
    regex::Regex::new(&regex_str)
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

/// Archives the project directory into an in-memory tar suitable as a
/// build context, skipping entries excluded by `.dockerignore`.
fn create_build_context(context_dir: &Path) -> Result<Vec<u8>> {
    let rules = parse_dockerignore(context_dir);
    let mut archive = tar::Builder::new(Vec::new());

    fn walk_dir(
        dir: &Path,
        base: &Path,
        rules: &[(String, bool)],
        archive: &mut tar::Builder<Vec<u8>>,
    ) -> Result<()> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            RuntimeError::Build(format!("Failed to read directory {}: {}", dir.display(), e))
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| RuntimeError::Build(e.to_string()))?;
            let abs_path = entry.path();
            let rel_path = abs_path
                .strip_prefix(base)
                .unwrap_or(&abs_path)
                .to_string_lossy()
                .to_string();

            if is_ignored(&rel_path, rules) {
                continue;
            }

            if abs_path.is_dir() {
                walk_dir(&abs_path, base, rules, archive)?;
            } else {
                archive
                    .append_path_with_name(&abs_path, &rel_path)
                    .map_err(|e| {
                        RuntimeError::Build(format!(
                            "Failed to add {} to build context: {}",
                            rel_path, e
                        ))
                    })?;
            }
        }
        Ok(())
    }

    walk_dir(context_dir, context_dir, &rules, &mut archive)?;

    archive
        .into_inner()
        .map_err(|e| RuntimeError::Build(format!("Failed to finalize build context: {}", e)))
}
