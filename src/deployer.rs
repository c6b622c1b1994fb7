//! Deployers
//!
//! [`Deployer`] stages workloads on the hub in the three shapes the e2e
//! suites use:
//! - Subscription: OCM channel subscription in the application namespace
//! - ApplicationSet: ArgoCD generator in the ArgoCD namespace
//! - Discovered: plain manifests applied straight to a managed cluster
//!
//! Every create and delete goes through [`ensure_created`] and
//! [`ensure_deleted`], so each step and each flow can be rerun after a
//! partial failure.
//!
//! # Example
//!
//! ```no_run
//! use fleetstage::{DeployConfig, Deployer, WorkloadDescriptor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let deployer = Deployer::connect(DeployConfig::new().hub_context("hub")).await?;
//!     let workload = WorkloadDescriptor::new(
//!         "https://github.com/RamenDR/ocm-ramen-samples",
//!         "workloads/deployment/k8s-regional-rbd",
//!         "main",
//!     );
//!
//!     deployer.deploy_application_set("appset-deploy-rbd", &workload).await?;
//!     // ... exercise failover ...
//!     deployer.undeploy_application_set("appset-deploy-rbd").await?;
//!     Ok(())
//! }
//! ```

use kube::api::DynamicObject;
use tracing::{debug, info, instrument};

use crate::config::{ConfigError, DeployConfig};
use crate::gate::{is_last_generator, is_sole_occupant, GateError};
use crate::lifecycle::{ensure_created, ensure_deleted, Convergence, LifecycleError};
use crate::manifest::{compose, ManifestError};
use crate::objects::{self, HubObject};
use crate::resource::{ResourceHandle, ResourceKind};
use crate::staging::StagedManifest;
use crate::store::{KubeStore, RemoteStore, StoreError};
use crate::tool::{Kubectl, ManifestTool, ToolError};
use crate::workload::WorkloadDescriptor;

/// Errors from deployer operations
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Creates and removes workload fixtures on the hub
pub struct Deployer<S = KubeStore, T = Kubectl> {
    store: S,
    tool: T,
    config: DeployConfig,
}

impl Deployer<KubeStore, Kubectl> {
    /// Connect to the hub described by `config`
    pub async fn connect(config: DeployConfig) -> Result<Self, DeployError> {
        config.validate()?;
        let store = KubeStore::connect(&config).await?;
        let tool = Kubectl::from_config(&config);
        Ok(Self::new(store, tool, config))
    }
}

impl<S, T> Deployer<S, T>
where
    S: RemoteStore,
    T: ManifestTool,
{
    pub fn new(store: S, tool: T, config: DeployConfig) -> Self {
        debug!(store = store.name(), tool = tool.name(), "Created deployer");
        Self {
            store,
            tool,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    async fn create(&self, hub_object: HubObject) -> Result<Convergence, DeployError> {
        let HubObject { handle, object } = hub_object;
        Ok(ensure_created(&self.store, &handle, object).await?)
    }

    async fn delete(&self, handle: ResourceHandle) -> Result<Convergence, DeployError> {
        Ok(ensure_deleted(&self.store, &handle).await?)
    }

    // ------------------------------------------------------------
    // Per-kind operations
    // ------------------------------------------------------------

    /// Bind the configured cluster set into `namespace`
    pub async fn create_managed_cluster_set_binding(
        &self,
        namespace: &str,
    ) -> Result<Convergence, DeployError> {
        self.create(objects::cluster_set_binding(&self.config.cluster_set, namespace))
            .await
    }

    pub async fn delete_managed_cluster_set_binding(
        &self,
        namespace: &str,
    ) -> Result<Convergence, DeployError> {
        self.delete(ResourceHandle::new(
            ResourceKind::ManagedClusterSetBinding,
            &self.config.cluster_set,
            namespace,
        ))
        .await
    }

    pub async fn create_placement(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Convergence, DeployError> {
        self.create(objects::placement(name, namespace, &self.config.cluster_set))
            .await
    }

    pub async fn delete_placement(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Convergence, DeployError> {
        self.delete(ResourceHandle::new(ResourceKind::Placement, name, namespace))
            .await
    }

    /// Subscribe application `name` to the configured channel
    pub async fn create_subscription(
        &self,
        name: &str,
        workload: &WorkloadDescriptor,
    ) -> Result<Convergence, DeployError> {
        let subscription = objects::subscription(name, workload, &self.config.channel_ref())?;
        self.create(subscription).await
    }

    pub async fn delete_subscription(&self, name: &str) -> Result<Convergence, DeployError> {
        self.delete(ResourceHandle::new(ResourceKind::Subscription, name, name))
            .await
    }

    /// Fetch the subscription of application `name`
    pub async fn get_subscription(&self, name: &str) -> Result<DynamicObject, DeployError> {
        let handle = ResourceHandle::new(ResourceKind::Subscription, name, name);
        Ok(self.store.get(&handle).await?)
    }

    pub async fn create_placement_decision_config_map(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Convergence, DeployError> {
        self.create(objects::placement_decision_config_map(name, namespace))
            .await
    }

    pub async fn delete_config_map(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Convergence, DeployError> {
        self.delete(ResourceHandle::new(ResourceKind::ConfigMap, name, namespace))
            .await
    }

    pub async fn create_application_set(
        &self,
        name: &str,
        workload: &WorkloadDescriptor,
    ) -> Result<Convergence, DeployError> {
        let appset = objects::application_set(
            name,
            &self.config.argocd_namespace,
            workload,
            self.config.requeue_after_seconds,
        )?;
        self.create(appset).await
    }

    pub async fn delete_application_set(&self, name: &str) -> Result<Convergence, DeployError> {
        self.delete(ResourceHandle::new(
            ResourceKind::ApplicationSet,
            name,
            &self.config.argocd_namespace,
        ))
        .await
    }

    /// Whether exactly one `ApplicationSet` is left in the ArgoCD namespace
    pub async fn is_last_application_set(&self) -> Result<bool, DeployError> {
        Ok(is_sole_occupant(&self.store, &self.config.argocd_namespace).await?)
    }

    // ------------------------------------------------------------
    // Flows
    // ------------------------------------------------------------

    /// Stage application `name` as an OCM subscription
    #[instrument(skip(self, workload), fields(app = %name, deployer = "subscription"))]
    pub async fn deploy_subscription(
        &self,
        name: &str,
        workload: &WorkloadDescriptor,
    ) -> Result<(), DeployError> {
        self.create_managed_cluster_set_binding(name).await?;
        self.create_placement(name, name).await?;
        self.create_subscription(name, workload).await?;

        info!("Deployed subscription");
        Ok(())
    }

    #[instrument(skip(self), fields(app = %name, deployer = "subscription"))]
    pub async fn undeploy_subscription(&self, name: &str) -> Result<(), DeployError> {
        self.delete_subscription(name).await?;
        self.delete_placement(name, name).await?;
        self.delete_managed_cluster_set_binding(name).await?;

        info!("Undeployed subscription");
        Ok(())
    }

    /// Stage application `name` as an ArgoCD `ApplicationSet`
    #[instrument(skip(self, workload), fields(app = %name, deployer = "appset"))]
    pub async fn deploy_application_set(
        &self,
        name: &str,
        workload: &WorkloadDescriptor,
    ) -> Result<(), DeployError> {
        let namespace = &self.config.argocd_namespace;

        self.create_managed_cluster_set_binding(namespace).await?;
        self.create_placement_decision_config_map(name, namespace)
            .await?;
        self.create_placement(name, namespace).await?;
        self.create_application_set(name, workload).await?;

        info!("Deployed application set");
        Ok(())
    }

    /// Remove application `name`, and the shared binding if it was the last one
    ///
    /// The gate runs first and ignores this application's own
    /// `ApplicationSet`, which is deleted last of its objects. A rerun after a
    /// partial teardown reaches the same decision. If the gate cannot list,
    /// nothing is deleted.
    #[instrument(skip(self), fields(app = %name, deployer = "appset"))]
    pub async fn undeploy_application_set(&self, name: &str) -> Result<(), DeployError> {
        let namespace = &self.config.argocd_namespace;
        let own = ResourceHandle::new(ResourceKind::ApplicationSet, name, namespace);
        let last = is_last_generator(&self.store, &own).await?;

        self.delete_config_map(name, namespace).await?;
        self.delete_placement(name, namespace).await?;
        self.delete_application_set(name).await?;

        if last {
            self.delete_managed_cluster_set_binding(namespace).await?;
        } else {
            info!(namespace = %namespace, "Other application sets remain, keeping cluster set binding");
        }

        info!("Undeployed application set");
        Ok(())
    }

    /// Apply `workload` directly to `cluster`
    #[instrument(skip(self, workload), fields(namespace = %namespace, cluster = %cluster, deployer = "discovered"))]
    pub async fn deploy_discovered_apps(
        &self,
        workload: &WorkloadDescriptor,
        namespace: &str,
        cluster: &str,
    ) -> Result<(), DeployError> {
        let staged = StagedManifest::write(&compose(workload)?)?;
        let output = self.tool.apply(staged.dir(), namespace, cluster).await?;
        debug!(tool = self.tool.name(), stdout = %output.stdout, "Applied discovered apps");
        Ok(())
    }

    /// Delete the resources of `workload` from `cluster`
    #[instrument(skip(self, workload), fields(namespace = %namespace, cluster = %cluster, deployer = "discovered"))]
    pub async fn delete_discovered_apps(
        &self,
        workload: &WorkloadDescriptor,
        namespace: &str,
        cluster: &str,
    ) -> Result<(), DeployError> {
        let staged = StagedManifest::write(&compose(workload)?)?;
        let output = self.tool.delete(staged.dir(), namespace, cluster).await?;
        debug!(tool = self.tool.name(), stdout = %output.stdout, "Deleted discovered apps");
        Ok(())
    }
}
