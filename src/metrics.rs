//! # Metrics Module
//!
//! This module provides the necessary components to collect and
//! expose gateway metrics to the Prometheus server.
//!
//! The metrics collected by this module are:
//!
//! - Number of registered applications
//! - Number of live application containers
//!
//! The values are maintained by the registry and the lifecycle manager as
//! cheap atomic counters and read here on every scrape, so collection
//! never touches the async lock hierarchy.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use prometheus::{
    IntGauge, Opts,
    core::{Collector, Desc},
    proto,
};

use crate::module::lifecycle::LifecycleManager;
use crate::module::registry::AppRegistry;

/// Number of metrics exposed by this collector.
const METRICS_NUMBER: usize = 2;

/// A Prometheus collector that exposes gateway state.
///
/// ## Exposed Metrics
///
/// - `registered_apps`
///   Applications currently present in the registry.
///
/// - `running_containers`
///   Live container handles held by the lifecycle manager.
pub(crate) struct GatewayCollector {
    registry: Arc<AppRegistry>,
    lifecycle: Arc<LifecycleManager>,
    /// Metric descriptors required by the Prometheus `Collector` trait.
    descs: Vec<Desc>,
    registered_apps: IntGauge,
    running_containers: IntGauge,
}

impl GatewayCollector {
    /// Creates a new `GatewayCollector` over the gateway components.
    ///
    /// # Arguments
    ///
    /// `registry` - The application registry to report on.
    /// `lifecycle` - The lifecycle manager to report on.
    /// `namespace` - The Prometheus namespace under which the metrics
    ///   will be exposed.
    pub fn new<S: Into<String>>(
        registry: Arc<AppRegistry>,
        lifecycle: Arc<LifecycleManager>,
        namespace: S,
    ) -> Result<GatewayCollector, prometheus::Error> {
        let namespace = namespace.into();
        let mut descs = Vec::new();

        let opts = |name: &str, help: &str| Opts::new(name, help).namespace(namespace.clone());

        let registered_apps = IntGauge::with_opts(opts(
            "registered_apps",
            "Applications currently present in the registry.",
        ))?;
        descs.extend(registered_apps.desc().into_iter().cloned());

        let running_containers = IntGauge::with_opts(opts(
            "running_containers",
            "Live application containers held by the lifecycle manager.",
        ))?;
        descs.extend(running_containers.desc().into_iter().cloned());

        Ok(GatewayCollector {
            registry,
            lifecycle,
            descs,
            registered_apps,
            running_containers,
        })
    }
}

/// Implementation of the `Collector` trait for the `GatewayCollector`.
impl Collector for GatewayCollector {
    /// Returns the metric descriptors exposed by this collector.
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    /// Collects the current metric values and returns them as
    /// Prometheus `MetricFamily` instances.
    fn collect(&self) -> Vec<proto::MetricFamily> {
        self.registered_apps
            .set(self.registry.registered_count().load(Ordering::Relaxed));
        self.running_containers
            .set(self.lifecycle.running_count().load(Ordering::Relaxed));

        let mut mfs = Vec::with_capacity(METRICS_NUMBER);
        mfs.extend(self.registered_apps.collect());
        mfs.extend(self.running_containers.collect());
        mfs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::registry::{AppDescriptor, Framework};
    use crate::module::runtime::ContainerRuntime;
    use crate::settings::GatewayConfig;
    use crate::test::MockRuntime;
    use prometheus::{Encoder, Registry, TextEncoder};
    use std::collections::HashMap;

    #[tokio::test]
    async fn collector_reports_registry_size() {
        let registry = Arc::new(AppRegistry::new(3500));
        let runtime = Arc::new(MockRuntime::new()) as Arc<dyn ContainerRuntime>;
        let lifecycle = Arc::new(LifecycleManager::new(runtime, GatewayConfig::default()));

        let collector = GatewayCollector::new(
            Arc::clone(&registry),
            Arc::clone(&lifecycle),
            "gateway_test",
        )
        .expect("collector");

        registry
            .put(AppDescriptor {
                app_name: "shop".to_string(),
                framework: Framework::Vite,
                host_port: 3500,
                env_vars: HashMap::new(),
                image_ref: "shop:latest".to_string(),
            })
            .await
            .expect("put");

        let prometheus_registry = Registry::default();
        prometheus_registry
            .register(Box::new(collector))
            .expect("register collector");

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&prometheus_registry.gather(), &mut buffer)
            .expect("encode");
        let rendered = String::from_utf8(buffer).expect("utf8");

        assert!(rendered.contains("gateway_test_registered_apps 1"));
        assert!(rendered.contains("gateway_test_running_containers 0"));
    }
}
