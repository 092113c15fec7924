//! Scene light
//!
//! One white point light so that characters are not completely dark when
//! they are not highlighted.

use crate::engine::EngineResult;
use crate::foundation::math::{ColorF, Vec3};
use crate::render::backend::{LightParams, NodeFlags};
use crate::render::context::SceneContext;
use crate::render::resource::{LightNode, ResourceHandle, ResourceId};

/// Light placement used by the engine
pub fn default_light() -> LightParams {
    LightParams {
        position: Vec3::new(-60.0, 100.0, 400.0),
        color: ColorF::WHITE,
        radius: 600.0,
    }
}

/// Point light node
#[derive(Debug)]
pub struct Light {
    node: ResourceHandle<LightNode>,
}

impl Light {
    /// Add a point light that the laser cannot select
    ///
    /// # Errors
    /// [`EngineError::ResourceCreation`](crate::EngineError::ResourceCreation)
    /// if the backend cannot add it.
    pub fn create(context: &SceneContext, params: &LightParams) -> EngineResult<Self> {
        let node = ResourceHandle::<LightNode>::acquire(context, context.add_light(params))?;
        let (backend, id) = node.target();
        backend.set_flags(id, NodeFlags::empty());
        Ok(Self { node })
    }

    /// Identity of the light node
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

    #[test]
    fn test_light_is_not_pickable() {
        let headless = Rc::new(HeadlessBackend::new());
        let context = SceneContext::with_counters(headless.clone(), Arc::new(CounterRegistry::new()));
        let light = Light::create(&context, &default_light()).unwrap();

        assert!(headless.flags(light.id()).is_empty());
        assert_eq!(headless.position(light.id()), Vec3::new(-60.0, 100.0, 400.0));
    }
}
