//! Owning and observing handles to backend resources
//!
//! A [`ResourceHandle<K>`] refers to one reference-counted native object of
//! kind `K`. An *owning* handle holds the reference the backend handed out at
//! creation time and gives it back exactly once: on [`ResourceHandle::release`]
//! or on drop, whichever comes first. An *observing* handle merely names the
//! object and never touches its reference count.
//!
//! Owning handles are move-only. [`ResourceHandle::observe`] is the only way
//! to get a second handle to the same object, and it never owns.

use crate::engine::{EngineError, EngineResult};
use crate::foundation::counters::InstanceCounter;
use crate::render::backend::SceneBackend;
use crate::render::context::SceneContext;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::num::NonZeroU64;

/// Identity of a native object inside the backend (its "address")
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(NonZeroU64);

impl ResourceId {
    /// Wrap a raw backend id
    pub const fn from_raw(raw: NonZeroU64) -> Self {
        Self(raw)
    }

    /// Raw backend id
    pub const fn raw(self) -> NonZeroU64 {
        self.0
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({:#x})", self.0)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Marker trait for the kinds of native objects a handle can refer to
pub trait ResourceKind: 'static {
    /// Name used in logs and errors
    const NAME: &'static str;
}

macro_rules! resource_kinds {
    ($($(#[$meta:meta])* $kind:ident => $name:literal),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug)]
            pub enum $kind {}

            impl ResourceKind for $kind {
                const NAME: &'static str = $name;
            }
        )*
    };
}

resource_kinds! {
    /// Rendering device
    Device => "device",
    /// Animated mesh scene node
    AnimatedNode => "animated mesh node",
    /// Static mesh scene node with octree culling
    OctreeNode => "octree mesh node",
    /// Camera scene node
    CameraNode => "camera node",
    /// Billboard scene node
    BillboardNode => "billboard node",
    /// Light scene node
    LightNode => "light node",
    /// Triangle selector used for collision queries
    TriangleSelector => "triangle selector",
    /// Scene node animator
    Animator => "animator",
}

/// Handle to one native object of kind `K`
///
/// Handles compare and hash by the object they refer to, whether they own it
/// or not. Empty handles refer to nothing and all compare equal to each
/// other (keeping `Eq` reflexive), never to a non-empty handle.
pub struct ResourceHandle<K: ResourceKind> {
    context: SceneContext,
    id: Option<ResourceId>,
    owning: bool,
    _counter: InstanceCounter<Self>,
    _kind: PhantomData<K>,
}

impl<K: ResourceKind> ResourceHandle<K> {
    /// Take ownership of the reference produced by a backend creation call
    ///
    /// `None` means the creation call failed.
    pub fn acquire(context: &SceneContext, created: Option<ResourceId>) -> EngineResult<Self> {
        let id = created.ok_or(EngineError::ResourceCreation { resource: K::NAME })?;
        log::debug!("Acquired {} {id}", K::NAME);
        Ok(Self::with_id(context, id, true))
    }

    /// Non-owning view of an object owned elsewhere
    pub fn observer(context: &SceneContext, id: ResourceId) -> Self {
        Self::with_id(context, id, false)
    }

    fn with_id(context: &SceneContext, id: ResourceId, owning: bool) -> Self {
        Self {
            context: context.clone(),
            id: Some(id),
            owning,
            _counter: context.counter(),
            _kind: PhantomData,
        }
    }

    /// Non-owning view of the same object
    ///
    /// # Panics
    /// If the handle is empty.
    #[track_caller]
    pub fn observe(&self) -> Self {
        Self::observer(&self.context, self.id())
    }

    /// Move ownership into a new handle, leaving this one empty
    pub fn take(&mut self) -> Self {
        let taken = Self {
            context: self.context.clone(),
            id: self.id.take(),
            owning: self.owning,
            _counter: InstanceCounter::take_from(&mut self._counter),
            _kind: PhantomData,
        };
        self.owning = false;
        taken
    }

    /// Give the reference back to the backend (owning handles only) and empty the handle
    ///
    /// Calling it again is a no-op.
    pub fn release(&mut self) {
        if let Some(id) = self.id.take() {
            if self.owning {
                log::debug!("Releasing {} {id}", K::NAME);
                self.context.release(id);
            }
        }
        self.owning = false;
    }

    /// The object's identity
    ///
    /// # Panics
    /// If the handle is empty; using a released handle is a logic error.
    #[track_caller]
    pub fn id(&self) -> ResourceId {
        match self.id {
            Some(id) => id,
            None => panic!("{} handle used after it was released", K::NAME),
        }
    }

    /// The object's identity, or `None` for an empty handle
    pub const fn try_id(&self) -> Option<ResourceId> {
        self.id
    }

    /// Whether this handle no longer refers to anything
    pub const fn is_empty(&self) -> bool {
        self.id.is_none()
    }

    /// Whether dropping this handle releases the object
    pub const fn is_owning(&self) -> bool {
        self.owning
    }

    /// Context the object lives in
    pub const fn context(&self) -> &SceneContext {
        &self.context
    }

    /// Backend and id together, for pass-through calls
    ///
    /// # Panics
    /// If the handle is empty.
    #[track_caller]
    pub fn target(&self) -> (&dyn SceneBackend, ResourceId) {
        (self.context.backend(), self.id())
    }
}

impl<K: ResourceKind> Drop for ResourceHandle<K> {
    fn drop(&mut self) {
        self.release();
    }
}

// `None == None`: released handles are interchangeable
impl<K: ResourceKind> PartialEq for ResourceHandle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<K: ResourceKind> Eq for ResourceHandle<K> {}

impl<K: ResourceKind> Hash for ResourceHandle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<K: ResourceKind> fmt::Debug for ResourceHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("kind", &K::NAME)
            .field("id", &self.id)
            .field("owning", &self.owning)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::counters::CounterRegistry;
    use crate::render::backend::SceneBackend;
    use crate::render::headless::HeadlessBackend;
    use crate::scene::light::default_light;
    use std::rc::Rc;
    use std::sync::Arc;

    fn setup() -> (Rc<HeadlessBackend>, SceneContext) {
        let headless = Rc::new(HeadlessBackend::new());
        let context = SceneContext::with_counters(headless.clone(), Arc::new(CounterRegistry::new()));
        (headless, context)
    }

    #[test]
    fn test_acquire_null_fails() {
        let (_, context) = setup();
        let err = ResourceHandle::<Device>::acquire(&context, None).unwrap_err();
        assert!(matches!(err, EngineError::ResourceCreation { resource: "device" }));
        assert_eq!(context.counters().balance_of::<ResourceHandle<Device>>(), 0);
    }

    #[test]
    fn test_drop_releases_exactly_once() {
        let (headless, context) = setup();
        {
            let mut handle =
                ResourceHandle::<LightNode>::acquire(&context, headless.add_light(&default_light())).unwrap();
            assert!(handle.is_owning());
            handle.release();
            assert!(handle.is_empty());
            handle.release();
        }

        let ledger = headless.ledger();
        assert_eq!(ledger.live, 0);
        assert_eq!(ledger.released, 1);
        assert_eq!(ledger.over_released, 0);
    }

    #[test]
    fn test_observer_does_not_release() {
        let (headless, context) = setup();
        let owner = ResourceHandle::<LightNode>::acquire(&context, headless.add_light(&default_light())).unwrap();
        {
            let observer = owner.observe();
            assert!(!observer.is_owning());
            assert_eq!(observer, owner);
        }
        assert_eq!(headless.ledger().live, 1);
        drop(owner);
        assert_eq!(headless.ledger().live, 0);
    }

    #[test]
    fn test_take_transfers_ownership() {
        let (headless, context) = setup();
        let mut source = ResourceHandle::<LightNode>::acquire(&context, headless.add_light(&default_light())).unwrap();
        let id = source.id();

        let target = source.take();
        assert!(source.is_empty());
        assert!(!source.is_owning());
        assert_eq!(target.id(), id);
        assert!(target.is_owning());

        drop(source);
        assert_eq!(headless.ledger().live, 1);
        drop(target);
        let ledger = headless.ledger();
        assert_eq!(ledger.live, 0);
        assert_eq!(ledger.over_released, 0);
    }

    #[test]
    fn test_empty_handles_compare_equal_only_to_each_other() {
        let (headless, context) = setup();
        let mut first = ResourceHandle::<LightNode>::acquire(&context, headless.add_light(&default_light())).unwrap();
        let mut second = ResourceHandle::<LightNode>::acquire(&context, headless.add_light(&default_light())).unwrap();
        assert_ne!(first, second);

        first.release();
        assert_ne!(first, second);
        assert_ne!(second, first);

        second.release();
        assert_eq!(first, second);
    }

    #[test]
    #[should_panic(expected = "used after it was released")]
    fn test_empty_handle_access_panics() {
        let (headless, context) = setup();
        let mut handle = ResourceHandle::<LightNode>::acquire(&context, headless.add_light(&default_light())).unwrap();
        handle.release();
        let _ = handle.id();
    }

    #[test]
    fn test_handle_counters_balance() {
        let (headless, context) = setup();
        {
            let mut owner = ResourceHandle::<BillboardNode>::acquire(&context, headless.add_billboard_node()).unwrap();
            let view = owner.observe();
            let moved = owner.take();
            assert_eq!(view, moved);
            assert_eq!(context.counters().balance_of::<ResourceHandle<BillboardNode>>(), 3);
        }

        let snapshot = context.counters().snapshot_of::<ResourceHandle<BillboardNode>>().unwrap();
        assert_eq!(snapshot.balance(), 0);
        assert!(context.counters().validate().is_clean());
        assert_eq!(headless.ledger().over_released, 0);
    }
}
