//! In-memory store
//!
//! Mirrors the API server's create/delete/get/list semantics closely enough
//! for the lifecycle contract: creating an existing object and deleting a
//! missing one return the same distinct errors the hub would.

use async_trait::async_trait;
use kube::api::DynamicObject;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{RemoteStore, StoreError};
use crate::resource::{ResourceHandle, ResourceKind};

/// Store operation, used to target injected failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Create,
    Delete,
    Get,
    List,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<ResourceHandle, DynamicObject>,
    failures: VecDeque<(StoreOp, String)>,
    calls: Vec<StoreOp>,
}

/// Store backed by an in-process map
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `op` fail with a generic API error
    ///
    /// Failures queue up and are consumed in order.
    pub fn fail_next(&self, op: StoreOp, message: impl Into<String>) {
        self.lock().failures.push_back((op, message.into()));
    }

    /// Whether an object exists at `handle`
    pub fn contains(&self, handle: &ResourceHandle) -> bool {
        self.lock().objects.contains_key(handle)
    }

    /// Number of stored objects of `kind` in `namespace`
    pub fn count(&self, kind: ResourceKind, namespace: &str) -> usize {
        self.lock()
            .objects
            .keys()
            .filter(|h| h.kind == kind && h.namespace == namespace)
            .count()
    }

    /// Total number of stored objects
    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Operations seen so far, in call order
    pub fn calls(&self) -> Vec<StoreOp> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self, op: StoreOp) -> Result<MutexGuard<'_, State>, StoreError> {
        let mut state = self.lock();
        state.calls.push(op);

        if let Some(pos) = state.failures.iter().position(|(o, _)| *o == op) {
            if let Some((_, message)) = state.failures.remove(pos) {
                return Err(StoreError::Api(message));
            }
        }

        Ok(state)
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn create(
        &self,
        handle: &ResourceHandle,
        object: &DynamicObject,
    ) -> Result<(), StoreError> {
        let mut state = self.enter(StoreOp::Create)?;

        if state.objects.contains_key(handle) {
            return Err(StoreError::AlreadyExists(handle.clone()));
        }

        state.objects.insert(handle.clone(), object.clone());
        Ok(())
    }

    async fn delete(&self, handle: &ResourceHandle) -> Result<(), StoreError> {
        let mut state = self.enter(StoreOp::Delete)?;

        state
            .objects
            .remove(handle)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(handle.clone()))
    }

    async fn get(&self, handle: &ResourceHandle) -> Result<DynamicObject, StoreError> {
        let state = self.enter(StoreOp::Get)?;

        state
            .objects
            .get(handle)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(handle.clone()))
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        let state = self.enter(StoreOp::List)?;

        Ok(state
            .objects
            .iter()
            .filter(|(h, _)| h.kind == kind && h.namespace == namespace)
            .map(|(_, obj)| obj.clone())
            .collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
