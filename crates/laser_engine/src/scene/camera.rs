//! First-person camera
//!
//! The camera walks through the level under gravity and collides with its
//! walls. The laser is cast from its position towards its target.

use crate::engine::EngineResult;
use crate::foundation::counters::InstanceCounter;
use crate::foundation::math::Vec3;
use crate::render::backend::{CameraParams, CollisionResponseParams, NodeFlags};
use crate::render::context::SceneContext;
use crate::render::resource::{Animator, CameraNode, ResourceHandle, ResourceId};
use crate::scene::level::Level;

/// FPS controls: mouse look speed, walk speed and jump impulse
pub const CAMERA_PARAMS: CameraParams = CameraParams {
    rotate_speed: 50.0,
    move_speed: 0.3,
    jump_speed: 2.0,
    flags: NodeFlags::empty(),
};

/// Collision ellipsoid, gravity and ellipsoid offset for the camera
pub fn collision_params() -> CollisionResponseParams {
    CollisionResponseParams {
        ellipsoid_radius: Vec3::new(30.0, 50.0, 30.0),
        gravity: Vec3::new(0.0, -10.0, 0.0),
        ellipsoid_translation: Vec3::new(0.0, 30.0, 0.0),
    }
}

/// The engine's camera
#[derive(Debug)]
pub struct Camera {
    animator: ResourceHandle<Animator>,
    node: ResourceHandle<CameraNode>,
    _counter: InstanceCounter<Self>,
}

impl Camera {
    /// Add an FPS camera that collides with `level`
    ///
    /// # Errors
    /// [`EngineError::ResourceCreation`](crate::EngineError::ResourceCreation)
    /// if the camera or its collision animator cannot be created; the camera
    /// node is released in the latter case.
    pub fn create(context: &SceneContext, level: &Level) -> EngineResult<Self> {
        let node = ResourceHandle::<CameraNode>::acquire(context, context.add_camera_fps(&CAMERA_PARAMS))?;
        let animator = ResourceHandle::<Animator>::acquire(
            context,
            context.create_collision_response_animator(level.selector_id(), node.id(), &collision_params()),
        )?;
        context.add_animator(node.id(), animator.id());

        Ok(Self {
            animator,
            node,
            _counter: context.counter(),
        })
    }

    /// Move the camera
    pub fn position(&self, x: f32, y: f32, z: f32) {
        let (backend, id) = self.node.target();
        backend.set_position(id, Vec3::new(x, y, z));
    }

    /// Point the camera at a location
    pub fn target(&self, x: f32, y: f32, z: f32) {
        let (backend, id) = self.node.target();
        backend.set_target(id, Vec3::new(x, y, z));
    }

    /// Where the camera is
    pub fn current_position(&self) -> Vec3 {
        let (backend, id) = self.node.target();
        backend.position(id)
    }

    /// Where the camera looks
    pub fn current_target(&self) -> Vec3 {
        let (backend, id) = self.node.target();
        backend.target(id)
    }

    /// Identity of the camera node
    pub fn id(&self) -> ResourceId {
        self.node.id()
    }

    /// Identity of the collision animator
    pub fn animator_id(&self) -> ResourceId {
        self.animator.id()
    }

    pub(crate) const fn context(&self) -> &SceneContext {
        self.node.context()
    }
}
