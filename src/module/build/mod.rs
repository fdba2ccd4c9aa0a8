//! Registration-time build pipeline.
//!
//! Seeds a project directory with the generated build files and drives the
//! container runtime to produce the application image. Build failures are
//! reported to the caller and never touch the registry.

pub mod templates;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::module::registry::Framework;
use crate::module::runtime::ContainerRuntime;

/// A type alias for a `Result` with the `BuildError` error type.
pub type Result<T, E = BuildError> = std::result::Result<T, E>;

/// Errors related to the image build pipeline.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The supplied project path does not exist or is not a directory.
    #[error("Project path '{0}' is not a directory")]
    InvalidProjectPath(String),

    /// A generated build file could not be written.
    #[error("Failed to write {0}: {1}")]
    WriteFile(String, String),

    /// The engine failed to build the image.
    #[error("Image build failed: {0}")]
    Build(String),
}

/// Builds application images from project directories.
pub struct BuildService {
    runtime: Arc<dyn ContainerRuntime>,
}

impl BuildService {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Builds the image for an application.
    ///
    /// Ensures the project carries a `.dockerignore`, the framework's
    /// dockerfile, and (for static frameworks) an `nginx.conf`, then builds
    /// the image tagged `<app_name>:latest` with `BASE_PATH=/app/<name>`
    /// injected into the caller's build arguments.
    ///
    /// # Returns
    /// The image reference of the built image.
    pub async fn build(
        &self,
        project_path: &str,
        app_name: &str,
        framework: Framework,
        env_vars: &HashMap<String, String>,
    ) -> Result<String> {
        let project = PathBuf::from(project_path);
        if !project.is_dir() {
            return Err(BuildError::InvalidProjectPath(project_path.to_string()));
        }

        ensure_dockerignore(&project)?;
        create_build_files(&project, framework)?;

        let mut build_args = env_vars.clone();
        build_args.insert("BASE_PATH".to_string(), format!("/app/{}", app_name));

        let tag = format!("{}:latest", app_name);
        info!("Building image {} from {}", tag, project.display());

        self.runtime
            .build_image(&project, framework.dockerfile_name(), &tag, &build_args)
            .await
            .map_err(|e| BuildError::Build(e.to_string()))
    }
}

/// Seeds a default `.dockerignore` when the project has none.
fn ensure_dockerignore(project: &Path) -> Result<()> {
    write_if_absent(project, ".dockerignore", templates::DOCKERIGNORE)
}

/// Writes the framework's dockerfile and, for static frameworks, the nginx
/// site configuration. Existing files are left untouched so projects can
/// override the generated recipes.
fn create_build_files(project: &Path, framework: Framework) -> Result<()> {
    write_if_absent(
        project,
        framework.dockerfile_name(),
        templates::dockerfile(framework),
    )?;

    if framework.is_static() {
        write_if_absent(project, "nginx.conf", templates::NGINX_CONF)?;
    }

    Ok(())
}

fn write_if_absent(project: &Path, name: &str, content: &str) -> Result<()> {
    let path = project.join(name);
    if path.exists() {
        debug!("{} already exists, keeping it", path.display());
        return Ok(());
    }

    std::fs::write(&path, content)
        .map_err(|e| BuildError::WriteFile(name.to_string(), e.to_string()))
}
