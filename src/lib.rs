//! fleetstage - deployment fixtures for multi-cluster Kubernetes e2e tests
//!
//! fleetstage creates and removes the hub objects that stage a workload
//! across managed clusters: OCM cluster-set bindings, placements and
//! subscriptions, ArgoCD `ApplicationSet`s, and plain kustomizations applied
//! straight to a cluster.
//!
//! Every create treats "already exists" as success and every delete treats
//! "not found" as success, so test setup and teardown can be rerun freely.
//!
//! # Example
//!
//! ```no_run
//! use fleetstage::{DeployConfig, Deployer, WorkloadDescriptor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     fleetstage::telemetry::init_logging();
//!
//!     let deployer = Deployer::connect(DeployConfig::new().hub_context("hub")).await?;
//!     let workload = WorkloadDescriptor::new(
//!         "https://github.com/RamenDR/ocm-ramen-samples",
//!         "workloads/deployment/k8s-regional-rbd",
//!         "main",
//!     );
//!
//!     deployer.deploy_subscription("subscr-deploy-rbd", &workload).await?;
//!     deployer.undeploy_subscription("subscr-deploy-rbd").await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod deployer;
pub mod gate;
pub mod lifecycle;
pub mod manifest;
pub mod objects;
pub mod resource;
pub mod staging;
pub mod store;
pub mod telemetry;
pub mod tool;
pub mod workload;

// Re-export commonly used types
pub use config::{ConfigError, DeployConfig};
pub use deployer::{DeployError, Deployer};
pub use gate::{is_last_generator, is_sole_occupant, GateError};
pub use lifecycle::{ensure_created, ensure_deleted, Convergence, LifecycleError};
pub use manifest::{compose, Manifest, ManifestError};
pub use resource::{Gvr, ResourceHandle, ResourceKind};
pub use staging::StagedManifest;
pub use store::{KubeStore, MemoryStore, RemoteStore, StoreError, StoreOp};
pub use tool::{Kubectl, ManifestTool, ToolError, ToolOutput};
pub use workload::WorkloadDescriptor;
