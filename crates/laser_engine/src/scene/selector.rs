//! Triangle selectors for characters
//!
//! Ray casts only hit nodes that carry a triangle selector. A [`Selector`]
//! builds one over a character's current mesh; attaching it with
//! [`ObjectHandle::attach_selector`] makes the character visible to the
//! laser. The node keeps its own reference, so the selector may be dropped
//! once attached.

use crate::engine::{Engine, EngineResult};
use crate::foundation::counters::InstanceCounter;
use crate::render::resource::{ResourceHandle, ResourceId, TriangleSelector};
use crate::scene::object::ObjectHandle;
use std::marker::PhantomData;

/// Owned triangle selector built over one character
///
/// Borrows the character it was built from, so it cannot outlive it.
#[derive(Debug)]
pub struct Selector<'node> {
    resource: ResourceHandle<TriangleSelector>,
    _object: PhantomData<&'node ObjectHandle>,
    _counter: InstanceCounter<Selector<'static>>,
}

impl<'node> Selector<'node> {
    /// Build a selector over `object`'s node
    ///
    /// # Errors
    /// [`EngineError::ResourceCreation`](crate::EngineError::ResourceCreation)
    /// if the backend cannot build it.
    ///
    /// # Panics
    /// If `object` has been released.
    pub fn create(_engine: &Engine, object: &'node ObjectHandle) -> EngineResult<Self> {
        Self::for_object(object)
    }

    /// Build a selector over `object`'s node in the scene the object lives in
    pub fn for_object(object: &'node ObjectHandle) -> EngineResult<Self> {
        let context = object.context();
        let resource = ResourceHandle::acquire(context, context.create_triangle_selector(object.id()))?;
        Ok(Self {
            resource,
            _object: PhantomData,
            _counter: context.counter(),
        })
    }

    /// Identity of the selector
    pub fn id(&self) -> ResourceId {
        self.resource.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::counters::CounterRegistry;
    use crate::render::backend::SceneBackend;
    use crate::render::context::SceneContext;
    use crate::render::headless::{HeadlessBackend, NativeKind};
    use crate::scene::object::CharacterKind;
    use crate::EngineError;
    use std::path::Path;
    use std::rc::Rc;
    use std::sync::Arc;

    fn setup(backend: HeadlessBackend) -> (Rc<HeadlessBackend>, SceneContext) {
        let headless = Rc::new(backend);
        let context = SceneContext::with_counters(headless.clone(), Arc::new(CounterRegistry::new()));
        (headless, context)
    }

    #[test]
    fn test_attached_selector_survives_drop() {
        let (headless, context) = setup(HeadlessBackend::new());
        let ninja = ObjectHandle::create_in(&context, Path::new("media"), CharacterKind::Ninja, "Ninja").unwrap();
        {
            let selector = Selector::for_object(&ninja).unwrap();
            ninja.attach_selector(&selector);
            assert_eq!(headless.refcount(selector.id()), Some(2));
        }

        let attached = headless.triangle_selector(ninja.id()).unwrap();
        assert_eq!(headless.refcount(attached), Some(1));
        assert_eq!(context.counters().balance_of::<Selector<'static>>(), 0);

        drop(ninja);
        assert_eq!(headless.ledger().live, 0);
    }

    #[test]
    fn test_creation_failure() {
        let (headless, context) = setup(HeadlessBackend::new());
        let dwarf = ObjectHandle::create_in(&context, Path::new("media"), CharacterKind::Dwarf, "Dwarf").unwrap();
        headless.set_failing(NativeKind::TriangleSelector, true);

        let err = Selector::for_object(&dwarf).unwrap_err();
        assert!(matches!(err, EngineError::ResourceCreation { resource: "triangle selector" }));
        assert_eq!(headless.live_count(NativeKind::TriangleSelector), 0);
    }
}
