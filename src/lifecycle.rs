//! Idempotent create/delete
//!
//! Create and delete are convergence operations: the goal is an end state,
//! and finding the store already in that state counts as success. This holds
//! for every [`ResourceKind`](crate::resource::ResourceKind); there is no
//! per-kind variant of these functions.

use kube::api::DynamicObject;
use tracing::{debug, info};

use crate::resource::ResourceHandle;
use crate::store::{RemoteStore, StoreError};

/// How a lifecycle call reached its end state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// This call made the change
    Changed,
    /// The store was already in the desired state
    AlreadyConverged,
}

impl Convergence {
    pub fn changed(self) -> bool {
        self == Self::Changed
    }
}

/// Error type for lifecycle operations
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Failed to create {handle}: {source}")]
    CreateFailed {
        handle: ResourceHandle,
        #[source]
        source: StoreError,
    },

    #[error("Failed to delete {handle}: {source}")]
    DeleteFailed {
        handle: ResourceHandle,
        #[source]
        source: StoreError,
    },
}

impl LifecycleError {
    pub fn handle(&self) -> &ResourceHandle {
        match self {
            Self::CreateFailed { handle, .. } | Self::DeleteFailed { handle, .. } => handle,
        }
    }
}

/// Create `object` at `handle` unless it already exists
///
/// Name and namespace on the object are overwritten from the handle.
pub async fn ensure_created<S>(
    store: &S,
    handle: &ResourceHandle,
    mut object: DynamicObject,
) -> Result<Convergence, LifecycleError>
where
    S: RemoteStore + ?Sized,
{
    object.metadata.name = Some(handle.name.clone());
    object.metadata.namespace = Some(handle.namespace.clone());

    match store.create(handle, &object).await {
        Ok(()) => Ok(Convergence::Changed),
        Err(StoreError::AlreadyExists(_)) => {
            info!(
                kind = %handle.kind,
                name = %handle.name,
                namespace = %handle.namespace,
                "Resource already exists"
            );
            Ok(Convergence::AlreadyConverged)
        }
        Err(source) => Err(LifecycleError::CreateFailed {
            handle: handle.clone(),
            source,
        }),
    }
}

/// Delete the object at `handle` unless it is already gone
pub async fn ensure_deleted<S>(
    store: &S,
    handle: &ResourceHandle,
) -> Result<Convergence, LifecycleError>
where
    S: RemoteStore + ?Sized,
{
    match store.delete(handle).await {
        Ok(()) => Ok(Convergence::Changed),
        Err(StoreError::NotFound(_)) => {
            debug!(
                kind = %handle.kind,
                name = %handle.name,
                namespace = %handle.namespace,
                "Resource not found"
            );
            Ok(Convergence::AlreadyConverged)
        }
        Err(source) => Err(LifecycleError::DeleteFailed {
            handle: handle.clone(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceKind;
    use crate::store::{MemoryStore, StoreOp};

    fn handle(kind: ResourceKind) -> ResourceHandle {
        ResourceHandle::new(kind, "busybox", "busybox-ns")
    }

    #[tokio::test]
    async fn test_ensure_created_is_idempotent_for_every_kind() {
        let store = MemoryStore::new();

        for kind in ResourceKind::ALL {
            let h = handle(kind);
            let first = ensure_created(&store, &h, h.skeleton()).await.unwrap();
            let second = ensure_created(&store, &h, h.skeleton()).await.unwrap();

            assert_eq!(first, Convergence::Changed, "{kind}");
            assert_eq!(second, Convergence::AlreadyConverged, "{kind}");
        }

        assert_eq!(store.len(), ResourceKind::ALL.len());
    }

    #[tokio::test]
    async fn test_ensure_deleted_is_idempotent_for_every_kind() {
        let store = MemoryStore::new();

        for kind in ResourceKind::ALL {
            let h = handle(kind);
            ensure_created(&store, &h, h.skeleton()).await.unwrap();

            let first = ensure_deleted(&store, &h).await.unwrap();
            let second = ensure_deleted(&store, &h).await.unwrap();

            assert!(first.changed(), "{kind}");
            assert!(!second.changed(), "{kind}");
        }

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_ensure_created_overrides_object_identity() {
        let store = MemoryStore::new();
        let h = handle(ResourceKind::Placement);
        let stray = ResourceHandle::new(ResourceKind::Placement, "other", "elsewhere").skeleton();

        ensure_created(&store, &h, stray).await.unwrap();

        let stored = store.get(&h).await.unwrap();
        assert_eq!(stored.metadata.name.as_deref(), Some("busybox"));
        assert_eq!(stored.metadata.namespace.as_deref(), Some("busybox-ns"));
    }

    #[tokio::test]
    async fn test_create_surfaces_other_errors() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::Create, "admission webhook denied");
        let h = handle(ResourceKind::Subscription);

        let err = ensure_created(&store, &h, h.skeleton()).await.unwrap_err();

        assert!(matches!(err, LifecycleError::CreateFailed { .. }));
        assert_eq!(err.handle(), &h);
        let msg = err.to_string();
        assert!(msg.contains("Subscription busybox-ns/busybox"), "got: {msg}");
        assert!(msg.contains("admission webhook denied"), "got: {msg}");
    }

    #[tokio::test]
    async fn test_delete_surfaces_other_errors() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::Delete, "forbidden");
        let h = handle(ResourceKind::ConfigMap);

        let err = ensure_deleted(&store, &h).await.unwrap_err();
        assert!(matches!(err, LifecycleError::DeleteFailed { .. }));
    }
}
