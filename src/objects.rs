//! Hub object builders
//!
//! Each builder returns a [`HubObject`]: the handle the lifecycle layer uses
//! plus the full object body. Builders are pure; nothing here talks to the
//! hub.
//!
//! # Example
//!
//! ```
//! use fleetstage::objects;
//!
//! let placement = objects::placement("busybox", "busybox", "default");
//! assert_eq!(placement.object.data["spec"]["numberOfClusters"], 1);
//! ```

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::manifest::{parse_overlay, ManifestError};
use crate::resource::{ResourceHandle, ResourceKind};
use crate::workload::WorkloadDescriptor;

/// Label carrying the owning application
pub const APP_LABEL_KEY: &str = "app";

/// Label the cluster decision generator selects placements by
pub const PLACEMENT_LABEL_KEY: &str = "cluster.open-cluster-management.io/placement";

const GITHUB_BRANCH_ANNOTATION: &str = "apps.open-cluster-management.io/github-branch";
const GITHUB_PATH_ANNOTATION: &str = "apps.open-cluster-management.io/github-path";

/// A hub object ready for [`ensure_created`](crate::lifecycle::ensure_created)
#[derive(Debug, Clone)]
pub struct HubObject {
    pub handle: ResourceHandle,
    pub object: DynamicObject,
}

impl HubObject {
    fn new(handle: ResourceHandle, labels: BTreeMap<String, String>, data: Value) -> Self {
        let mut object = handle.skeleton();
        object.metadata = ObjectMeta {
            name: Some(handle.name.clone()),
            namespace: Some(handle.namespace.clone()),
            labels: (!labels.is_empty()).then_some(labels),
            ..ObjectMeta::default()
        };
        object.data = data;
        Self { handle, object }
    }

    #[must_use]
    fn annotations(mut self, annotations: BTreeMap<String, String>) -> Self {
        self.object.metadata.annotations = Some(annotations);
        self
    }
}

fn app_label(value: &str) -> BTreeMap<String, String> {
    [(APP_LABEL_KEY.to_string(), value.to_string())]
        .into_iter()
        .collect()
}

/// Binding of `cluster_set` into `namespace`
///
/// OCM requires the binding to be named after the cluster set.
pub fn cluster_set_binding(cluster_set: &str, namespace: &str) -> HubObject {
    HubObject::new(
        ResourceHandle::new(ResourceKind::ManagedClusterSetBinding, cluster_set, namespace),
        app_label(namespace),
        json!({ "spec": { "clusterSet": cluster_set } }),
    )
}

/// Placement selecting one cluster from `cluster_set`
pub fn placement(name: &str, namespace: &str, cluster_set: &str) -> HubObject {
    HubObject::new(
        ResourceHandle::new(ResourceKind::Placement, name, namespace),
        app_label(name),
        json!({
            "spec": {
                "clusterSets": [cluster_set],
                "numberOfClusters": 1,
            }
        }),
    )
}

/// Subscription of application `name` to `channel` (`namespace/name`)
///
/// The subscription lives in a namespace named after the application. An
/// overlay on the workload becomes a kustomization package override.
pub fn subscription(
    name: &str,
    workload: &WorkloadDescriptor,
    channel: &str,
) -> Result<HubObject, ManifestError> {
    let mut spec = json!({
        "channel": channel,
        "placement": {
            "placementRef": { "kind": "Placement", "name": name }
        },
    });

    if let Some(text) = workload.overlay_text() {
        let overlay = parse_overlay(text)?;
        spec["packageOverrides"] = json!([{
            "packageName": "kustomization",
            "packageOverrides": [{ "value": overlay }],
        }]);
    }

    let annotations = [
        (GITHUB_BRANCH_ANNOTATION.to_string(), workload.revision.clone()),
        (GITHUB_PATH_ANNOTATION.to_string(), workload.path.clone()),
    ]
    .into_iter()
    .collect();

    Ok(HubObject::new(
        ResourceHandle::new(ResourceKind::Subscription, name, name),
        app_label(name),
        json!({ "spec": spec }),
    )
    .annotations(annotations))
}

/// ConfigMap teaching the ArgoCD duck-type generator to read placement decisions
pub fn placement_decision_config_map(name: &str, namespace: &str) -> HubObject {
    HubObject::new(
        ResourceHandle::new(ResourceKind::ConfigMap, name, namespace),
        BTreeMap::new(),
        json!({
            "data": {
                "apiVersion": "cluster.open-cluster-management.io/v1beta1",
                "kind": "placementdecisions",
                "statusListKey": "decisions",
                "matchKey": "clusterName",
            }
        }),
    )
}

/// ApplicationSet deploying `workload` to the clusters chosen by placement `name`
pub fn application_set(
    name: &str,
    argocd_namespace: &str,
    workload: &WorkloadDescriptor,
    requeue_after_seconds: i64,
) -> Result<HubObject, ManifestError> {
    let mut source = json!({
        "repoURL": workload.repository_url,
        "path": workload.path,
        "targetRevision": workload.revision,
    });

    if let Some(text) = workload.overlay_text() {
        source["kustomize"] = Value::Object(parse_overlay(text)?);
    }

    let data = json!({
        "spec": {
            "generators": [{
                "clusterDecisionResource": {
                    "configMapRef": name,
                    "labelSelector": {
                        "matchLabels": { PLACEMENT_LABEL_KEY: name }
                    },
                    "requeueAfterSeconds": requeue_after_seconds,
                }
            }],
            "template": {
                "metadata": { "name": format!("{name}-{{{{name}}}}") },
                "spec": {
                    "source": source,
                    "destination": {
                        "server": "{{server}}",
                        "namespace": name,
                    },
                    "project": "default",
                    "syncPolicy": {
                        "automated": { "prune": true, "selfHeal": true },
                        "syncOptions": ["CreateNamespace=true", "PruneLast=true"],
                    },
                },
            },
        }
    });

    Ok(HubObject::new(
        ResourceHandle::new(ResourceKind::ApplicationSet, name, argocd_namespace),
        BTreeMap::new(),
        data,
    ))
}
