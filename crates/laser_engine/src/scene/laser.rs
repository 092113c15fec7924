//! Laser dot
//!
//! A small additive billboard placed wherever the camera ray hits. It is
//! excluded from picking itself.

use crate::engine::{EngineError, EngineResult};
use crate::foundation::math::Vec3;
use crate::render::backend::{MaterialDesc, MaterialFlag, MaterialType, NodeFlags};
use crate::render::context::SceneContext;
use crate::render::resource::{BillboardNode, ResourceHandle, ResourceId};
use std::path::Path;

/// Laser texture, relative to the media directory
pub const LASER_TEXTURE: &str = "particle.bmp";

/// Billboard edge length
pub const LASER_SIZE: f32 = 20.0;

/// Billboard marking the laser hit point
#[derive(Debug)]
pub struct LaserPointer {
    node: ResourceHandle<BillboardNode>,
}

impl LaserPointer {
    /// Add the laser billboard
    ///
    /// # Errors
    /// [`EngineError::AssetLoad`] if the texture is missing (checked before
    /// the billboard is added), [`EngineError::ResourceCreation`] if the
    /// billboard fails.
    pub fn create(context: &SceneContext, media_path: &Path) -> EngineResult<Self> {
        let texture_path = media_path.join(LASER_TEXTURE);
        let texture = context
            .load_texture(&texture_path)
            .ok_or(EngineError::AssetLoad { path: texture_path })?;

        let node = ResourceHandle::<BillboardNode>::acquire(context, context.add_billboard_node())?;
        let (backend, id) = node.target();
        backend.set_material(
            id,
            &MaterialDesc {
                material_type: MaterialType::TransparentAddColor,
                texture: Some(texture),
                lighting: false,
                normalize_normals: false,
            },
        );
        backend.set_material_flag(id, MaterialFlag::ZBuffer, false);
        backend.set_size(id, LASER_SIZE, LASER_SIZE);
        backend.set_flags(id, NodeFlags::empty());
        // shown on the first hit
        backend.set_visible(id, false);

        Ok(Self { node })
    }

    /// Show the dot at `point`
    pub fn show_at(&self, point: Vec3) {
        let (backend, id) = self.node.target();
        backend.set_visible(id, true);
        backend.set_position(id, point);
    }

    /// Hide the dot, as if the ray went to infinity
    pub fn hide(&self) {
        let (backend, id) = self.node.target();
        backend.set_visible(id, false);
    }

    /// Whether the dot is shown
    pub fn is_visible(&self) -> bool {
        let (backend, id) = self.node.target();
        backend.is_visible(id)
    }

    /// Where the dot was last placed
    pub fn position(&self) -> Vec3 {
        let (backend, id) = self.node.target();
        backend.position(id)
    }

    /// Identity of the billboard
    pub fn id(&self) -> ResourceId {
        self.node.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::counters::CounterRegistry;
    use crate::render::backend::SceneBackend;
    use crate::render::headless::HeadlessBackend;
    use std::rc::Rc;
    use std::sync::Arc;

    fn setup(backend: HeadlessBackend) -> (Rc<HeadlessBackend>, SceneContext) {
        let headless = Rc::new(backend);
        let context = SceneContext::with_counters(headless.clone(), Arc::new(CounterRegistry::new()));
        (headless, context)
    }

    #[test]
    fn test_laser_material() {
        let (headless, context) = setup(HeadlessBackend::new());
        let laser = LaserPointer::create(&context, Path::new("media")).unwrap();
        let material = headless.material(laser.id());

        assert_eq!(material.material_type, MaterialType::TransparentAddColor);
        assert!(material.texture.is_some());
        assert!(!material.lighting);
        assert!(!headless.zbuffer(laser.id()));
        assert_eq!(headless.size(laser.id()), (LASER_SIZE, LASER_SIZE));
        assert!(headless.flags(laser.id()).is_empty());
    }

    #[test]
    fn test_show_and_hide() {
        let (_, context) = setup(HeadlessBackend::new());
        let laser = LaserPointer::create(&context, Path::new("media")).unwrap();
        assert!(!laser.is_visible());

        laser.show_at(Vec3::new(1.0, 2.0, 3.0));
        assert!(laser.is_visible());
        assert_eq!(laser.position(), Vec3::new(1.0, 2.0, 3.0));

        laser.hide();
        assert!(!laser.is_visible());
    }

    #[test]
    fn test_missing_texture_adds_nothing() {
        let (headless, context) = setup(HeadlessBackend::new().with_missing_asset(LASER_TEXTURE));
        assert!(matches!(
            LaserPointer::create(&context, Path::new("media")),
            Err(EngineError::AssetLoad { .. })
        ));
        assert_eq!(headless.ledger().created, 0);
    }
}
