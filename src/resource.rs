//! Resource kinds and handles
//!
//! Every object fleetstage manages on the hub is one of a small, closed set of
//! kinds. A [`ResourceHandle`] names a single object of one of those kinds.

use kube::api::DynamicObject;
use kube::core::ApiResource;
use std::fmt;

/// Kinds of hub objects managed by the deployers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    /// OCM `ManagedClusterSetBinding`
    ManagedClusterSetBinding,
    /// OCM `Placement`
    Placement,
    /// OCM application `Subscription`
    Subscription,
    /// Core `ConfigMap`
    ConfigMap,
    /// ArgoCD `ApplicationSet` (the generator resource)
    ApplicationSet,
}

impl ResourceKind {
    /// All managed kinds
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::ManagedClusterSetBinding,
        ResourceKind::Placement,
        ResourceKind::Subscription,
        ResourceKind::ConfigMap,
        ResourceKind::ApplicationSet,
    ];

    /// Group/version/resource for this kind
    #[must_use]
    pub fn gvr(self) -> Gvr {
        match self {
            Self::ManagedClusterSetBinding => Gvr::new(
                "cluster.open-cluster-management.io",
                "v1beta2",
                "managedclustersetbindings",
                "ManagedClusterSetBinding",
            ),
            Self::Placement => Gvr::new(
                "cluster.open-cluster-management.io",
                "v1beta1",
                "placements",
                "Placement",
            ),
            Self::Subscription => Gvr::new(
                "apps.open-cluster-management.io",
                "v1",
                "subscriptions",
                "Subscription",
            ),
            Self::ConfigMap => Gvr::new("", "v1", "configmaps", "ConfigMap"),
            Self::ApplicationSet => {
                Gvr::new("argoproj.io", "v1alpha1", "applicationsets", "ApplicationSet")
            }
        }
    }

    /// Kind name as it appears in `kind:` fields
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ManagedClusterSetBinding => "ManagedClusterSetBinding",
            Self::Placement => "Placement",
            Self::Subscription => "Subscription",
            Self::ConfigMap => "ConfigMap",
            Self::ApplicationSet => "ApplicationSet",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `GroupVersionResource` for a managed kind
///
/// Used to build the dynamic API for kinds that have no typed structs in
/// `k8s-openapi` (all of them except `ConfigMap`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gvr {
    /// API group ("" for core)
    pub group: String,
    /// API version (e.g., "v1beta1")
    pub version: String,
    /// Plural resource name
    pub resource: String,
    /// Kind name
    pub kind: String,
}

impl Gvr {
    #[must_use]
    pub fn new(group: &str, version: &str, resource: &str, kind: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            resource: resource.to_string(),
            kind: kind.to_string(),
        }
    }

    /// `apiVersion` string, `group/version` or just `version` for core
    #[must_use]
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Convert to kube `ApiResource`
    #[must_use]
    pub fn to_api_resource(&self) -> ApiResource {
        ApiResource {
            group: self.group.clone(),
            version: self.version.clone(),
            api_version: self.api_version(),
            kind: self.kind.clone(),
            plural: self.resource.clone(),
        }
    }
}

/// Identifies one namespaced object in the remote store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceHandle {
    pub kind: ResourceKind,
    pub name: String,
    pub namespace: String,
}

impl ResourceHandle {
    pub fn new(kind: ResourceKind, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Empty object of this kind with name and namespace filled in
    #[must_use]
    pub fn skeleton(&self) -> DynamicObject {
        DynamicObject::new(&self.name, &self.kind.gvr().to_api_resource()).within(&self.namespace)
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_api_version_has_no_group() {
        let gvr = ResourceKind::ConfigMap.gvr();
        assert_eq!(gvr.api_version(), "v1");
        assert_eq!(gvr.to_api_resource().api_version, "v1");
    }

    #[test]
    fn test_group_api_version() {
        let ar = ResourceKind::ApplicationSet.gvr().to_api_resource();
        assert_eq!(ar.api_version, "argoproj.io/v1alpha1");
        assert_eq!(ar.plural, "applicationsets");
        assert_eq!(ar.kind, "ApplicationSet");
    }

    #[test]
    fn test_kind_names_match_gvr() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str(), kind.gvr().kind);
        }
    }

    #[test]
    fn test_skeleton_carries_identity() {
        let handle = ResourceHandle::new(ResourceKind::Placement, "busybox", "busybox-ns");
        let obj = handle.skeleton();

        assert_eq!(obj.metadata.name.as_deref(), Some("busybox"));
        assert_eq!(obj.metadata.namespace.as_deref(), Some("busybox-ns"));
        let types = obj.types.expect("skeleton should carry type meta");
        assert_eq!(types.kind, "Placement");
        assert_eq!(types.api_version, "cluster.open-cluster-management.io/v1beta1");
    }

    #[test]
    fn test_handle_display() {
        let handle = ResourceHandle::new(ResourceKind::ConfigMap, "cm", "argocd");
        assert_eq!(handle.to_string(), "ConfigMap argocd/cm");
    }
}
