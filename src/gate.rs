//! Deletion gate for shared generator resources
//!
//! Several applications may share the hub objects that sit next to their
//! `ApplicationSet` in the ArgoCD namespace. Those objects may only go away
//! with the last `ApplicationSet`.
//!
//! [`is_sole_occupant`] counts; it does not check identity. Callers must
//! invoke it while their own `ApplicationSet` still exists, so that "exactly
//! one" means "only mine". Called before the caller's own resource exists, a
//! count of zero returns `false` and nothing is deleted.
//!
//! [`is_last_generator`] checks identity instead and gives the same answer
//! whether or not the caller's own `ApplicationSet` is already gone, so a
//! teardown interrupted after that delete still converges when rerun.

use kube::api::DynamicObject;
use tracing::debug;

use crate::resource::{ResourceHandle, ResourceKind};
use crate::store::{RemoteStore, StoreError};

/// Error type for gate checks
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Cannot verify sole occupancy of {namespace}: {source}")]
    ListFailed {
        namespace: String,
        #[source]
        source: StoreError,
    },
}

/// Kind counted by [`is_sole_occupant`]
pub const GENERATOR_KIND: ResourceKind = ResourceKind::ApplicationSet;

async fn list_generators<S>(store: &S, namespace: &str) -> Result<Vec<DynamicObject>, GateError>
where
    S: RemoteStore + ?Sized,
{
    store
        .list(GENERATOR_KIND, namespace)
        .await
        .map_err(|source| GateError::ListFailed {
            namespace: namespace.to_string(),
            source,
        })
}

/// Number of generator resources in `namespace`
pub async fn generator_count<S>(store: &S, namespace: &str) -> Result<usize, GateError>
where
    S: RemoteStore + ?Sized,
{
    Ok(list_generators(store, namespace).await?.len())
}

/// True when exactly one generator resource exists in `namespace`
///
/// A failed list is an error, never `true`.
pub async fn is_sole_occupant<S>(store: &S, namespace: &str) -> Result<bool, GateError>
where
    S: RemoteStore + ?Sized,
{
    let count = generator_count(store, namespace).await?;
    debug!(namespace = %namespace, count, "Counted generator resources");
    Ok(count == 1)
}

/// True when no generator other than `own` exists in `own`'s namespace
///
/// `own` itself may or may not still exist. A failed list is an error,
/// never `true`.
pub async fn is_last_generator<S>(store: &S, own: &ResourceHandle) -> Result<bool, GateError>
where
    S: RemoteStore + ?Sized,
{
    let others = list_generators(store, &own.namespace)
        .await?
        .iter()
        .filter(|o| o.metadata.name.as_deref() != Some(own.name.as_str()))
        .count();

    debug!(handle = %own, others, "Counted other generator resources");
    Ok(others == 0)
}
