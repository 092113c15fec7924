//! Character objects
//!
//! An [`ObjectHandle`] is either the owner of one animated character node
//! (created from a [`CharacterKind`]) or an observer of a node owned
//! elsewhere, such as the object currently under the laser.

use crate::engine::{Engine, EngineError, EngineResult};
use crate::foundation::counters::InstanceCounter;
use crate::foundation::math::Vec3;
use crate::foundation::ranged::Angle;
use crate::render::backend::{AnimationDesc, MaterialDesc, MaterialFlag, MaterialType, Md2Animation, NodeFlags};
use crate::render::context::SceneContext;
use crate::render::resource::{AnimatedNode, ResourceHandle, ResourceId};
use crate::scene::selector::Selector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// The characters that can be added to the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharacterKind {
    /// MD2 model with vertex animation
    Faerie,
    /// B3D model with skinned skeletal animation
    Ninja,
    /// X model with skeletal animation, no skinning
    Dwarf,
    /// MDL model with skinned skeletal animation
    Yodan,
}

impl CharacterKind {
    /// Every character, in a stable order
    pub const ALL: [Self; 4] = [Self::Faerie, Self::Ninja, Self::Dwarf, Self::Yodan];

    /// How this character is built
    pub const fn descriptor(self) -> CharacterDescriptor {
        match self {
            Self::Faerie => CharacterDescriptor {
                mesh: "faerie.md2",
                texture: Some("faerie2.bmp"),
                scale: 1.6,
                animation_speed: 20.0,
                md2_animation: Some(Md2Animation::Point),
                normalize_normals: true,
            },
            Self::Ninja => CharacterDescriptor {
                mesh: "ninja.b3d",
                texture: None,
                scale: 10.0,
                animation_speed: 8.0,
                md2_animation: None,
                normalize_normals: true,
            },
            Self::Dwarf => CharacterDescriptor {
                mesh: "dwarf.x",
                texture: None,
                scale: 1.0,
                animation_speed: 20.0,
                md2_animation: None,
                normalize_normals: false,
            },
            Self::Yodan => CharacterDescriptor {
                mesh: "yodan.mdl",
                texture: None,
                scale: 0.8,
                animation_speed: 20.0,
                md2_animation: None,
                normalize_normals: false,
            },
        }
    }
}

impl fmt::Display for CharacterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Recipe for one character: files relative to the media directory plus setup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacterDescriptor {
    /// Mesh file
    pub mesh: &'static str,
    /// Texture replacing the mesh's own, if any
    pub texture: Option<&'static str>,
    /// Uniform scale
    pub scale: f32,
    /// Animation frames per second
    pub animation_speed: f32,
    /// MD2 animation cycle, for MD2 meshes
    pub md2_animation: Option<Md2Animation>,
    /// Renormalize normals after scaling
    pub normalize_normals: bool,
}

/// Owning or observing handle to an animated character node
///
/// Cloning produces an observer of the same node. Two handles are equal when
/// they refer to the same node; released handles only equal each other.
pub struct ObjectHandle {
    node: ResourceHandle<AnimatedNode>,
    _counter: InstanceCounter<Self>,
}

impl ObjectHandle {
    /// Add a character to the engine's scene
    ///
    /// # Errors
    /// [`EngineError::AssetLoad`] if the mesh or texture is missing,
    /// [`EngineError::ResourceCreation`] if the node cannot be created.
    pub fn create(engine: &Engine, kind: CharacterKind, name: &str) -> EngineResult<Self> {
        Self::create_in(engine.context(), engine.media_path(), kind, name)
    }

    /// Add a character to a scene, resolving files against `media_path`
    ///
    /// All assets are loaded before the node is created, so a failure never
    /// leaves a half-configured node behind.
    pub fn create_in(context: &SceneContext, media_path: &Path, kind: CharacterKind, name: &str) -> EngineResult<Self> {
        let descriptor = kind.descriptor();

        let mesh_path = media_path.join(descriptor.mesh);
        let mesh = context
            .load_mesh(&mesh_path)
            .ok_or(EngineError::AssetLoad { path: mesh_path })?;
        let texture = match descriptor.texture {
            Some(file) => {
                let texture_path = media_path.join(file);
                let texture = context.load_texture(&texture_path);
                Some(texture.ok_or(EngineError::AssetLoad { path: texture_path })?)
            }
            None => None,
        };

        let node = ResourceHandle::acquire(
            context,
            context.add_animated_mesh_node(mesh, NodeFlags::PICKABLE | NodeFlags::HIGHLIGHTABLE),
        )?;
        let (backend, id) = node.target();
        if (descriptor.scale - 1.0).abs() > f32::EPSILON {
            backend.set_scale(id, Vec3::repeat(descriptor.scale));
        }
        backend.set_animation(
            id,
            &AnimationDesc {
                speed: descriptor.animation_speed,
                md2: descriptor.md2_animation,
            },
        );
        backend.set_material(
            id,
            &MaterialDesc {
                material_type: MaterialType::Solid,
                texture,
                lighting: true,
                normalize_normals: descriptor.normalize_normals,
            },
        );
        backend.set_name(id, name);

        log::info!("Added {kind} '{name}' as {id}");
        Ok(Self {
            node,
            _counter: context.counter(),
        })
    }

    /// Observe a node that is owned elsewhere
    pub fn observe_node(context: &SceneContext, id: ResourceId) -> Self {
        Self {
            node: ResourceHandle::observer(context, id),
            _counter: context.counter(),
        }
    }

    /// Move the character
    pub fn position(&self, x: f32, y: f32, z: f32) {
        let (backend, id) = self.node.target();
        backend.set_position(id, Vec3::new(x, y, z));
    }

    /// Rotate the character (degrees per axis)
    pub fn rotation(&self, x: Angle, y: Angle, z: Angle) {
        let (backend, id) = self.node.target();
        backend.set_rotation(id, Vec3::new(x.get(), y.get(), z.get()));
    }

    /// Make `selector` the node's collision shape, which makes it pickable
    pub fn attach_selector(&self, selector: &Selector<'_>) {
        let (backend, id) = self.node.target();
        backend.set_triangle_selector(id, Some(selector.id()));
    }

    /// Render unlit while highlighted so the character stands out
    pub fn highlight(&self, select: bool) {
        let (backend, id) = self.node.target();
        backend.set_material_flag(id, MaterialFlag::Lighting, !select);
    }

    /// Node name
    pub fn name(&self) -> String {
        let (backend, id) = self.node.target();
        backend.name(id)
    }

    /// Current position
    pub fn current_position(&self) -> Vec3 {
        let (backend, id) = self.node.target();
        backend.position(id)
    }

    /// Identity of the node
    ///
    /// # Panics
    /// If the handle has been emptied by [`ObjectHandle::release`].
    pub fn id(&self) -> ResourceId {
        self.node.id()
    }

    /// Whether dropping this handle removes the character
    pub const fn is_owning(&self) -> bool {
        self.node.is_owning()
    }

    /// Give the node back now instead of on drop
    pub fn release(&mut self) {
        self.node.release();
    }

    pub(crate) const fn context(&self) -> &SceneContext {
        self.node.context()
    }
}

impl Clone for ObjectHandle {
    fn clone(&self) -> Self {
        Self {
            node: self.node.observe(),
            _counter: self._counter.clone(),
        }
    }
}

impl PartialEq for ObjectHandle {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl Eq for ObjectHandle {}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("id", &self.node.try_id())
            .field("owning", &self.node.is_owning())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::counters::CounterRegistry;
    use crate::render::backend::SceneBackend;
    use crate::render::headless::HeadlessBackend;
    use approx::assert_relative_eq;
    use std::rc::Rc;
    use std::sync::Arc;

    fn setup(backend: HeadlessBackend) -> (Rc<HeadlessBackend>, SceneContext) {
        let headless = Rc::new(backend);
        let context = SceneContext::with_counters(headless.clone(), Arc::new(CounterRegistry::new()));
        (headless, context)
    }

    #[test]
    fn test_create_configures_node() {
        let (headless, context) = setup(HeadlessBackend::new());
        let faerie = ObjectHandle::create_in(&context, Path::new("media"), CharacterKind::Faerie, "Faerie").unwrap();
        let id = faerie.id();

        assert!(faerie.is_owning());
        assert_eq!(faerie.name(), "Faerie");
        assert_eq!(headless.flags(id), NodeFlags::PICKABLE | NodeFlags::HIGHLIGHTABLE);
        assert_relative_eq!(headless.scale(id), Vec3::repeat(1.6));

        let material = headless.material(id);
        assert!(material.texture.is_some());
        assert!(material.lighting);
        assert!(material.normalize_normals);

        let animation = headless.animation(id).unwrap();
        assert_eq!(animation.md2, Some(Md2Animation::Point));
        assert_relative_eq!(animation.speed, 20.0);
    }

    #[test]
    fn test_every_kind_can_be_created() {
        let (headless, context) = setup(HeadlessBackend::new());
        let objects: Vec<_> = CharacterKind::ALL
            .iter()
            .map(|kind| ObjectHandle::create_in(&context, Path::new("media"), *kind, &kind.to_string()).unwrap())
            .collect();

        assert_eq!(headless.ledger().live, 4);
        assert_eq!(objects[3].name(), "Yodan");
        drop(objects);
        assert_eq!(headless.ledger().live, 0);
    }

    #[test]
    fn test_missing_texture_creates_nothing() {
        let (headless, context) = setup(HeadlessBackend::new().with_missing_asset("faerie2.bmp"));
        let err = ObjectHandle::create_in(&context, Path::new("media"), CharacterKind::Faerie, "Faerie").unwrap_err();

        assert!(matches!(err, EngineError::AssetLoad { ref path } if path.ends_with("faerie2.bmp")));
        assert_eq!(headless.ledger().created, 0);
        assert_eq!(context.counters().balance_of::<ObjectHandle>(), 0);
    }

    #[test]
    fn test_missing_mesh_is_reported() {
        let (_, context) = setup(HeadlessBackend::new().with_missing_asset("ninja.b3d"));
        let err = ObjectHandle::create_in(&context, Path::new("media"), CharacterKind::Ninja, "Ninja").unwrap_err();
        assert!(matches!(err, EngineError::AssetLoad { .. }));
    }

    #[test]
    fn test_highlight_toggles_lighting() {
        let (headless, context) = setup(HeadlessBackend::new());
        let dwarf = ObjectHandle::create_in(&context, Path::new("media"), CharacterKind::Dwarf, "Dwarf").unwrap();

        dwarf.highlight(true);
        assert!(!headless.material(dwarf.id()).lighting);
        dwarf.highlight(false);
        assert!(headless.material(dwarf.id()).lighting);
    }

    #[test]
    fn test_position_and_rotation() {
        let (headless, context) = setup(HeadlessBackend::new());
        let yodan = ObjectHandle::create_in(&context, Path::new("media"), CharacterKind::Yodan, "Yodan").unwrap();

        yodan.position(-90.0, -15.0, -140.0);
        yodan.rotation(Angle::new(0.0).unwrap(), Angle::new(-90.0).unwrap(), Angle::new(180.0).unwrap());

        assert_relative_eq!(yodan.current_position(), Vec3::new(-90.0, -15.0, -140.0));
        assert_relative_eq!(headless.rotation(yodan.id()), Vec3::new(0.0, -90.0, 180.0));
    }

    #[test]
    fn test_clone_observes_and_compares_by_identity() {
        let (headless, context) = setup(HeadlessBackend::new());
        let ninja = ObjectHandle::create_in(&context, Path::new("media"), CharacterKind::Ninja, "Ninja").unwrap();
        let other = ObjectHandle::create_in(&context, Path::new("media"), CharacterKind::Ninja, "Ninja").unwrap();

        let view = ninja.clone();
        assert!(!view.is_owning());
        assert_eq!(view, ninja);
        assert_ne!(view, other);
        assert_eq!(ObjectHandle::observe_node(&context, ninja.id()), ninja);

        let snapshot = context.counters().snapshot_of::<ObjectHandle>().unwrap();
        assert_eq!(snapshot.balance(), 3);

        drop(view);
        assert_eq!(headless.refcount(ninja.id()), Some(1));
    }

    #[test]
    #[should_panic(expected = "used after it was released")]
    fn test_use_after_release_panics() {
        let (_, context) = setup(HeadlessBackend::new());
        let mut dwarf = ObjectHandle::create_in(&context, Path::new("media"), CharacterKind::Dwarf, "Dwarf").unwrap();
        dwarf.release();
        let _ = dwarf.name();
    }
}
