//! Hub cluster store
//!
//! Talks to the hub API server through kube's dynamic client, so the OCM and
//! ArgoCD kinds need no generated types.

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use tracing::{debug, info, instrument};

use super::{classify_kube_error, RemoteStore, StoreError};
use crate::config::DeployConfig;
use crate::resource::{ResourceHandle, ResourceKind};

/// Store backed by the hub cluster
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    /// Wrap an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the kubeconfig and context from `config`
    ///
    /// Falls back to the default client resolution (in-cluster, then
    /// `KUBECONFIG`/`~/.kube/config`) when neither is set.
    pub async fn connect(config: &DeployConfig) -> Result<Self, StoreError> {
        let options = KubeConfigOptions {
            context: config.hub_context.clone(),
            ..Default::default()
        };

        let kube_config = match (&config.kubeconfig, &config.hub_context) {
            (Some(path), _) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .map_err(|e| StoreError::Client(format!("{path}: {e}")))?;
                kube::Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .map_err(|e| StoreError::Client(e.to_string()))?
            }
            (None, Some(_)) => kube::Config::from_kubeconfig(&options)
                .await
                .map_err(|e| StoreError::Client(e.to_string()))?,
            (None, None) => kube::Config::infer()
                .await
                .map_err(|e| StoreError::Client(e.to_string()))?,
        };

        let client =
            Client::try_from(kube_config).map_err(|e| StoreError::Client(e.to_string()))?;

        debug!(context = ?config.hub_context, "Connected to hub cluster");
        Ok(Self { client })
    }

    fn api(&self, kind: ResourceKind, namespace: &str) -> Api<DynamicObject> {
        let ar = kind.gvr().to_api_resource();
        Api::namespaced_with(self.client.clone(), namespace, &ar)
    }
}

#[async_trait]
impl RemoteStore for KubeStore {
    #[instrument(skip(self, object), fields(kind = %handle.kind, name = %handle.name, namespace = %handle.namespace))]
    async fn create(
        &self,
        handle: &ResourceHandle,
        object: &DynamicObject,
    ) -> Result<(), StoreError> {
        self.api(handle.kind, &handle.namespace)
            .create(&PostParams::default(), object)
            .await
            .map_err(|e| classify_kube_error(&e, handle))?;

        info!("Created resource");
        Ok(())
    }

    #[instrument(skip(self), fields(kind = %handle.kind, name = %handle.name, namespace = %handle.namespace))]
    async fn delete(&self, handle: &ResourceHandle) -> Result<(), StoreError> {
        self.api(handle.kind, &handle.namespace)
            .delete(&handle.name, &DeleteParams::default())
            .await
            .map_err(|e| classify_kube_error(&e, handle))?;

        info!("Deleted resource");
        Ok(())
    }

    async fn get(&self, handle: &ResourceHandle) -> Result<DynamicObject, StoreError> {
        self.api(handle.kind, &handle.namespace)
            .get(&handle.name)
            .await
            .map_err(|e| classify_kube_error(&e, handle))
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        let list = self
            .api(kind, namespace)
            .list(&ListParams::default())
            .await
            .map_err(|e| StoreError::Api(format!("failed to list {kind} in {namespace}: {e}")))?;

        Ok(list.items)
    }

    fn name(&self) -> &'static str {
        "kube"
    }
}
