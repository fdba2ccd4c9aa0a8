//! Application registry.
//!
//! In-memory catalog of registered applications. Each registration produces
//! an immutable [`AppDescriptor`] keyed by its unique name; descriptors are
//! never mutated and live until process exit. The registry also owns the
//! monotonic host-port allocator used when the caller does not pin a port.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU16, Ordering};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// A type alias for a `Result` with the `RegistryError` error type.
pub type Result<T, E = RegistryError> = std::result::Result<T, E>;

/// Errors related to application registration.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// An application with the same name is already registered.
    #[error("Application '{0}' is already registered")]
    AlreadyExists(String),

    /// The application name is not URL-safe.
    #[error("Invalid application name '{0}'")]
    InvalidName(String),

    /// The framework tag is not one of the supported values.
    #[error("Unsupported framework '{0}'")]
    UnsupportedFramework(String),
}

/// Accepted application names: URL-safe, starting with an alphanumeric.
static APP_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("invalid application name pattern")
});

/// Frontend framework of a registered application.
///
/// `Vite` and `React` share identical runtime behavior: the built assets sit
/// behind an HTTP server on internal port 80 that knows nothing about base
/// paths. `Nextjs` is a node server listening on the published port and is
/// itself aware of its `/app/<name>` base path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    Nextjs,
    Vite,
    React,
}

impl Framework {
    /// Parses a framework tag as submitted by the registration API.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "nextjs" => Ok(Framework::Nextjs),
            "vite" => Ok(Framework::Vite),
            "react" => Ok(Framework::React),
            other => Err(RegistryError::UnsupportedFramework(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Framework::Nextjs => "nextjs",
            Framework::Vite => "vite",
            Framework::React => "react",
        }
    }

    /// Static frameworks serve prebuilt assets from `/` and cannot handle
    /// a base-path prefix.
    pub fn is_static(self) -> bool {
        matches!(self, Framework::Vite | Framework::React)
    }

    /// Name of the generated dockerfile for this framework. React reuses
    /// the Vite build recipe.
    pub fn dockerfile_name(self) -> &'static str {
        match self {
            Framework::Nextjs => "Dockerfile.nextjs",
            Framework::Vite | Framework::React => "Dockerfile.vite",
        }
    }

    /// Port the containerized service listens on. Static frameworks sit
    /// behind nginx on 80; nextjs honors the `PORT` variable.
    pub fn internal_port(self, host_port: u16) -> u16 {
        if self.is_static() { 80 } else { host_port }
    }
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable registration record for one application.
#[derive(Debug, Clone)]
pub struct AppDescriptor {
    /// Unique, URL-safe application name.
    pub app_name: String,

    /// Frontend framework of the application.
    pub framework: Framework,

    /// Host port the application container is published on.
    pub host_port: u16,

    /// Caller-supplied environment, injected as image build arguments and
    /// echoed back by the listing endpoint.
    pub env_vars: HashMap<String, String>,

    /// Reference to the image built at registration.
    pub image_ref: String,
}

impl AppDescriptor {
    /// URL prefix the application is exposed under.
    pub fn base_path(&self) -> String {
        format!("/app/{}", self.app_name)
    }

    /// Readiness probe URL for the application container.
    ///
    /// Static frameworks are probed at `/`; nextjs is base-path aware and
    /// must be probed under its prefix.
    pub fn probe_url(&self) -> String {
        if self.framework.is_static() {
            format!("http://127.0.0.1:{}/", self.host_port)
        } else {
            format!("http://127.0.0.1:{}{}/", self.host_port, self.base_path())
        }
    }

    /// Environment handed to the container at run time.
    ///
    /// `BASE_PATH` is a build-time concern and is never forwarded here.
    /// Static frameworks receive nothing from the caller; nextjs receives
    /// the caller variables minus `NEXT_PUBLIC_*`, which are already baked
    /// into the build. Every container gets `PORT` and `HOSTNAME`.
    pub fn runtime_env(&self) -> Vec<String> {
        let mut env: Vec<String> = match self.framework {
            Framework::Nextjs => self
                .env_vars
                .iter()
                .filter(|(k, _)| !k.starts_with("NEXT_PUBLIC_"))
                .map(|(k, v)| format!("{}={}", k, v))
                .collect(),
            Framework::Vite | Framework::React => Vec::new(),
        };

        env.push(format!("PORT={}", self.host_port));
        env.push("HOSTNAME=0.0.0.0".to_string());
        env
    }
}

/// Monotonic allocator of host ports.
///
/// Hands out strictly increasing ports starting at the configured base.
/// Ports are never recycled; a failed registration leaks its port, which
/// is acceptable because registrations are rare and bounded.
pub struct PortAllocator {
    next: AtomicU16,
}

impl PortAllocator {
    pub fn new(base_port: u16) -> Self {
        Self {
            next: AtomicU16::new(base_port),
        }
    }

    /// Returns the next unused host port.
    pub fn next(&self) -> u16 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

/// In-memory catalog mapping application names to descriptors.
///
/// Reads vastly outnumber writes: every proxied request resolves a
/// descriptor, while writes happen once per registration. Insertion order
/// is preserved for the static-asset fallback, which falls back to the
/// first registered application.
pub struct AppRegistry {
    apps: RwLock<RegistryTable>,
    ports: PortAllocator,
    registered: AtomicI64,
}

#[derive(Default)]
struct RegistryTable {
    by_name: HashMap<String, Arc<AppDescriptor>>,
    order: Vec<String>,
}

impl AppRegistry {
    pub fn new(base_port: u16) -> Self {
        Self {
            apps: RwLock::new(RegistryTable::default()),
            ports: PortAllocator::new(base_port),
            registered: AtomicI64::new(0),
        }
    }

    /// Validates a caller-supplied application name.
    pub fn validate_name(name: &str) -> Result<()> {
        if APP_NAME.is_match(name) {
            Ok(())
        } else {
            Err(RegistryError::InvalidName(name.to_string()))
        }
    }

    /// Returns the port allocator for the registration path.
    pub fn ports(&self) -> &PortAllocator {
        &self.ports
    }

    /// Inserts a descriptor. Fails when the name is already taken; the
    /// caller must check [`AppRegistry::get`] before building an image to
    /// avoid wasted work.
    pub async fn put(&self, descriptor: AppDescriptor) -> Result<Arc<AppDescriptor>> {
        let mut table = self.apps.write().await;
        if table.by_name.contains_key(&descriptor.app_name) {
            return Err(RegistryError::AlreadyExists(descriptor.app_name));
        }

        let descriptor = Arc::new(descriptor);
        table.order.push(descriptor.app_name.clone());
        table
            .by_name
            .insert(descriptor.app_name.clone(), Arc::clone(&descriptor));
        self.registered.fetch_add(1, Ordering::Relaxed);

        Ok(descriptor)
    }

    /// Looks up a descriptor by application name.
    pub async fn get(&self, app_name: &str) -> Option<Arc<AppDescriptor>> {
        self.apps.read().await.by_name.get(app_name).cloned()
    }

    /// Returns all descriptors in registration order.
    pub async fn list(&self) -> Vec<Arc<AppDescriptor>> {
        let table = self.apps.read().await;
        table
            .order
            .iter()
            .filter_map(|name| table.by_name.get(name).cloned())
            .collect()
    }

    /// Resolves the application a static-asset request belongs to: the
    /// first registered name appearing in the referer, else the first
    /// registered application, else nothing.
    pub async fn resolve_by_referer(&self, referer: &str) -> Option<String> {
        let table = self.apps.read().await;
        table
            .order
            .iter()
            .find(|name| referer.contains(&format!("/app/{}", name)))
            .or_else(|| table.order.first())
            .cloned()
    }

    /// Shared counter of registered applications, read by the metrics
    /// collector.
    pub fn registered_count(&self) -> &AtomicI64 {
        &self.registered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, framework: Framework, port: u16) -> AppDescriptor {
        AppDescriptor {
            app_name: name.to_string(),
            framework,
            host_port: port,
            env_vars: HashMap::new(),
            image_ref: format!("{}:latest", name),
        }
    }

    #[test]
    fn port_allocator_is_strictly_increasing() {
        let ports = PortAllocator::new(3500);
        let allocated: Vec<u16> = (0..16).map(|_| ports.next()).collect();

        for pair in allocated.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(allocated[0], 3500);
    }

    #[test]
    fn app_names_must_be_url_safe() {
        assert!(AppRegistry::validate_name("shop-front").is_ok());
        assert!(AppRegistry::validate_name("Shop_2").is_ok());
        assert!(AppRegistry::validate_name("").is_err());
        assert!(AppRegistry::validate_name("-leading").is_err());
        assert!(AppRegistry::validate_name("white space").is_err());
        assert!(AppRegistry::validate_name("slash/name").is_err());
    }

    #[test]
    fn framework_parsing_and_ports() {
        assert_eq!(Framework::parse("nextjs").expect("parse"), Framework::Nextjs);
        assert_eq!(Framework::parse("vite").expect("parse"), Framework::Vite);
        assert_eq!(Framework::parse("react").expect("parse"), Framework::React);
        assert!(Framework::parse("angular").is_err());

        assert_eq!(Framework::Vite.internal_port(3510), 80);
        assert_eq!(Framework::React.internal_port(3510), 80);
        assert_eq!(Framework::Nextjs.internal_port(3510), 3510);
    }

    #[test]
    fn probe_url_depends_on_framework() {
        let vite = descriptor("shop", Framework::Vite, 3500);
        assert_eq!(vite.probe_url(), "http://127.0.0.1:3500/");

        let next = descriptor("dash", Framework::Nextjs, 3501);
        assert_eq!(next.probe_url(), "http://127.0.0.1:3501/app/dash/");
    }

    #[test]
    fn runtime_env_filters_by_framework() {
        let mut env = HashMap::new();
        env.insert("NEXT_PUBLIC_API".to_string(), "x".to_string());
        env.insert("SECRET".to_string(), "y".to_string());

        let mut next = descriptor("dash", Framework::Nextjs, 3501);
        next.env_vars = env.clone();
        let runtime = next.runtime_env();
        assert!(runtime.contains(&"SECRET=y".to_string()));
        assert!(!runtime.iter().any(|e| e.starts_with("NEXT_PUBLIC_API=")));
        assert!(runtime.contains(&"PORT=3501".to_string()));
        assert!(runtime.contains(&"HOSTNAME=0.0.0.0".to_string()));

        let mut vite = descriptor("shop", Framework::Vite, 3500);
        vite.env_vars = env;
        let runtime = vite.runtime_env();
        assert_eq!(
            runtime,
            vec!["PORT=3500".to_string(), "HOSTNAME=0.0.0.0".to_string()]
        );
    }

    #[tokio::test]
    async fn registry_rejects_duplicates_and_preserves_records() {
        let registry = AppRegistry::new(3500);
        let first = descriptor("shop", Framework::Vite, 3500);
        registry.put(first.clone()).await.expect("first put");

        let duplicate = registry.put(descriptor("shop", Framework::React, 3501)).await;
        assert!(matches!(duplicate, Err(RegistryError::AlreadyExists(_))));

        let stored = registry.get("shop").await.expect("stored descriptor");
        assert_eq!(stored.framework, Framework::Vite);
        assert_eq!(stored.host_port, 3500);
        assert_eq!(stored.image_ref, first.image_ref);
        assert!(registry.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn referer_resolution_prefers_matching_app() {
        let registry = AppRegistry::new(3500);
        registry
            .put(descriptor("first", Framework::Vite, 3500))
            .await
            .expect("put");
        registry
            .put(descriptor("second", Framework::Nextjs, 3501))
            .await
            .expect("put");

        let resolved = registry
            .resolve_by_referer("http://host/app/second/page")
            .await;
        assert_eq!(resolved.as_deref(), Some("second"));

        let fallback = registry.resolve_by_referer("http://host/other").await;
        assert_eq!(fallback.as_deref(), Some("first"));

        let empty = AppRegistry::new(3500);
        assert!(empty.resolve_by_referer("anything").await.is_none());
    }
}
