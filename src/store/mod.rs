//! Remote declarative stores
//!
//! A store holds the hub objects the deployers manage. Two stores ship with
//! fleetstage:
//! - Kube (default): the hub cluster's API server via kube's dynamic client
//! - Memory: an in-process map, for unit tests and dry runs
//!
//! Stores report "already exists" and "not found" as distinct variants so the
//! lifecycle layer can treat them as convergence rather than failure.

use crate::resource::{ResourceHandle, ResourceKind};
use async_trait::async_trait;
use kube::api::DynamicObject;

mod kube_store;
mod memory;

pub use kube_store::KubeStore;
pub use memory::{MemoryStore, StoreOp};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    AlreadyExists(ResourceHandle),

    #[error("{0} not found")]
    NotFound(ResourceHandle),

    #[error("{0}")]
    Api(String),

    #[error("Failed to create Kubernetes client: {0}")]
    Client(String),
}

impl StoreError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Capability set of a remote declarative store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create `object` at `handle`
    async fn create(&self, handle: &ResourceHandle, object: &DynamicObject)
        -> Result<(), StoreError>;

    /// Delete the object at `handle`
    async fn delete(&self, handle: &ResourceHandle) -> Result<(), StoreError>;

    /// Fetch the object at `handle`
    async fn get(&self, handle: &ResourceHandle) -> Result<DynamicObject, StoreError>;

    /// List all objects of `kind` in `namespace`
    async fn list(&self, kind: ResourceKind, namespace: &str)
        -> Result<Vec<DynamicObject>, StoreError>;

    /// Store name for display
    fn name(&self) -> &'static str;
}

/// Map a kube error onto the store taxonomy
///
/// A 409 is only "already exists" when the API says so; a resourceVersion
/// conflict is a real failure. A 404 is only "not found" when it names the
/// object; a 404 for the resource type means the hub does not serve the kind.
pub(crate) fn classify_kube_error(err: &kube::Error, handle: &ResourceHandle) -> StoreError {
    match err {
        kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
            StoreError::AlreadyExists(handle.clone())
        }
        kube::Error::Api(ae) if ae.code == 404 && !is_unserved_kind(&ae.message) => {
            StoreError::NotFound(handle.clone())
        }
        _ => StoreError::Api(describe_kube_error(err, handle)),
    }
}

const UNSERVED_KIND_MESSAGE: &str = "the server could not find the requested resource";

fn is_unserved_kind(message: &str) -> bool {
    message.contains(UNSERVED_KIND_MESSAGE)
}

/// Human-readable message for a kube error, with the handle as context
pub(crate) fn describe_kube_error(err: &kube::Error, handle: &ResourceHandle) -> String {
    let raw = err.to_string();

    if raw.contains("Forbidden") || raw.contains("403") {
        return format!("{handle}: permission denied (check RBAC)");
    }

    if is_unserved_kind(&raw) {
        return format!("{handle}: {} CRD is not installed on the hub", handle.kind);
    }

    if raw.contains("connection refused") || raw.contains("ECONNREFUSED") {
        return format!("{handle}: cannot connect to Kubernetes API");
    }

    if raw.contains("timeout") || raw.contains("deadline exceeded") {
        return format!("{handle}: operation timed out");
    }

    format!("{handle}: {raw}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        api_error_with(code, reason, &format!("{reason} for test"))
    }

    fn api_error_with(code: u16, reason: &str, message: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: message.to_string(),
            reason: reason.to_string(),
            code,
        })
    }

    fn handle() -> ResourceHandle {
        ResourceHandle::new(ResourceKind::Placement, "app", "app-ns")
    }

    #[test]
    fn test_classify_already_exists() {
        let err = classify_kube_error(&api_error(409, "AlreadyExists"), &handle());
        assert!(err.is_already_exists());
    }

    #[test]
    fn test_classify_conflict_is_not_already_exists() {
        let err = classify_kube_error(&api_error(409, "Conflict"), &handle());
        assert!(matches!(err, StoreError::Api(_)));
    }

    #[test]
    fn test_classify_not_found() {
        let err = classify_kube_error(&api_error(404, "NotFound"), &handle());
        assert!(err.is_not_found());
    }

    #[test]
    fn test_classify_object_not_found_message() {
        let err = api_error_with(
            404,
            "NotFound",
            r#"placements.cluster.open-cluster-management.io "app" not found"#,
        );
        assert!(classify_kube_error(&err, &handle()).is_not_found());
    }

    #[test]
    fn test_classify_unserved_kind_is_not_not_found() {
        let handle = ResourceHandle::new(ResourceKind::ApplicationSet, "app", "argocd");
        let err = api_error_with(404, "NotFound", UNSERVED_KIND_MESSAGE);

        let classified = classify_kube_error(&err, &handle);

        assert!(!classified.is_not_found());
        let msg = classified.to_string();
        assert!(msg.contains("ApplicationSet CRD is not installed"), "got: {msg}");
    }

    #[test]
    fn test_forbidden_message_mentions_rbac() {
        let err = classify_kube_error(&api_error(403, "Forbidden"), &handle());
        let msg = err.to_string();
        assert!(msg.contains("permission denied"), "got: {msg}");
        assert!(msg.contains("app-ns/app"), "got: {msg}");
    }
}
