//! Laser picking
//!
//! Once per frame a finite ray is cast from the camera towards its target.
//! The nearest pickable node it hits moves the laser dot; if that node is a
//! highlightable character it becomes the selected object.
//!
//! # Usage
//! ```no_run
//! # use std::rc::Rc;
//! # use laser_engine::prelude::*;
//! # let mut engine = Engine::new(Rc::new(HeadlessBackend::new()), EngineConfig::default()).unwrap();
//! engine.run(|engine| {
//!     if let Some(selected) = engine.selected_object() {
//!         engine.draw_label(&selected.name());
//!     }
//! })
//! .unwrap();
//! ```

use crate::foundation::math::{Ray, Vec3};
use crate::render::backend::NodeFlags;
use crate::render::resource::ResourceId;
use crate::scene::{Camera, LaserPointer, ObjectHandle};

/// Length of the laser ray
pub const RAY_LENGTH: f32 = 1000.0;

/// What the laser found in one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PickOutcome {
    /// Hit a character, which is now the selected object
    Highlightable {
        /// Node that was hit
        node: ResourceId,
        /// Hit location
        point: Vec3,
    },
    /// Hit something pickable that cannot be selected (e.g. the level)
    Pickable {
        /// Node that was hit
        node: ResourceId,
        /// Hit location
        point: Vec3,
    },
    /// Hit nothing within [`RAY_LENGTH`]
    Miss,
}

impl PickOutcome {
    /// Node hit, if any
    pub const fn node(&self) -> Option<ResourceId> {
        match self {
            Self::Highlightable { node, .. } | Self::Pickable { node, .. } => Some(*node),
            Self::Miss => None,
        }
    }
}

/// Tracks the object under the laser between frames
#[derive(Debug, Default)]
pub struct PickingSystem {
    selected: Option<ObjectHandle>,
}

impl PickingSystem {
    /// Nothing selected
    pub const fn new() -> Self {
        Self { selected: None }
    }

    /// Object currently under the laser, if it is a character
    pub const fn selected_object(&self) -> Option<&ObjectHandle> {
        self.selected.as_ref()
    }

    /// Forget the selection
    pub fn clear(&mut self) {
        self.selected = None;
    }

    /// Cast the laser from `camera` and update `laser` and the selection
    ///
    /// The selection handle is only replaced when a different character is
    /// hit; hitting the same one again leaves the existing handle untouched.
    pub fn process(&mut self, camera: &Camera, laser: &LaserPointer) -> PickOutcome {
        let context = camera.context();
        let ray = Ray::towards(camera.current_position(), camera.current_target(), RAY_LENGTH);

        let Some(hit) = context.cast_ray(&ray, NodeFlags::PICKABLE) else {
            self.selected = None;
            laser.hide();
            return PickOutcome::Miss;
        };

        laser.show_at(hit.point);
        if context.flags(hit.node).contains(NodeFlags::HIGHLIGHTABLE) {
            let unchanged = self
                .selected
                .as_ref()
                .is_some_and(|selected| selected.id() == hit.node);
            if !unchanged {
                log::debug!("Laser now on {}", hit.node);
                self.selected = Some(ObjectHandle::observe_node(context, hit.node));
            }
            PickOutcome::Highlightable {
                node: hit.node,
                point: hit.point,
            }
        } else {
            self.selected = None;
            PickOutcome::Pickable {
                node: hit.node,
                point: hit.point,
            }
        }
    }
}
