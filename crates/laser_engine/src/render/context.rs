//! Shared scene context
//!
//! Every handle the engine creates keeps a [`SceneContext`]: the backend it
//! must release its object through, and the counter registry its lifetime is
//! accounted in. Cloning the context is cheap (two reference-count bumps).

use crate::foundation::counters::{CounterRegistry, InstanceCounter};
use crate::render::backend::SceneBackend;
use std::ops::Deref;
use std::rc::Rc;
use std::sync::Arc;

/// Backend plus the counter registry handles report to
#[derive(Clone)]
pub struct SceneContext {
    backend: Rc<dyn SceneBackend>,
    counters: Arc<CounterRegistry>,
}

impl SceneContext {
    /// Context accounting into the process-wide registry
    pub fn new(backend: Rc<dyn SceneBackend>) -> Self {
        Self::with_counters(backend, Arc::clone(CounterRegistry::global()))
    }

    /// Context accounting into a caller-provided registry
    pub fn with_counters(backend: Rc<dyn SceneBackend>, counters: Arc<CounterRegistry>) -> Self {
        Self { backend, counters }
    }

    /// The rendering backend
    pub fn backend(&self) -> &dyn SceneBackend {
        self.backend.as_ref()
    }

    /// Registry lifetime events are recorded in
    pub fn counters(&self) -> &Arc<CounterRegistry> {
        &self.counters
    }

    /// New instance counter for `T` in this context's registry
    pub fn counter<T: ?Sized + 'static>(&self) -> InstanceCounter<T> {
        InstanceCounter::new_in(&self.counters)
    }
}

impl Deref for SceneContext {
    type Target = dyn SceneBackend;

    fn deref(&self) -> &Self::Target {
        self.backend.as_ref()
    }
}

impl std::fmt::Debug for SceneContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneContext").finish_non_exhaustive()
    }
}
