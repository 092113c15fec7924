//! Quake 3 level geometry
//!
//! The level mesh comes from the map archive the engine mounts at startup.
//! Its octree triangle selector is what the camera collides with and what
//! stops the laser at walls and floors.

use crate::engine::{EngineError, EngineResult};
use crate::foundation::math::Vec3;
use crate::render::backend::NodeFlags;
use crate::render::context::SceneContext;
use crate::render::resource::{OctreeNode, ResourceHandle, ResourceId, TriangleSelector};
use std::path::PathBuf;

/// Archive holding the level, relative to the media directory
pub const MAP_ARCHIVE: &str = "map-20kdm2.pk3";

/// Level mesh inside [`MAP_ARCHIVE`]
pub const LEVEL_MESH: &str = "20kdm2.bsp";

/// Minimal polygon count per octree node of the level selector
pub const MIN_POLYS_PER_NODE: u32 = 128;

/// Where the level is placed so the map's interesting part is near the origin
pub fn level_offset() -> Vec3 {
    Vec3::new(-1350.0, -130.0, -1400.0)
}

/// Level node plus its collision selector
#[derive(Debug)]
pub struct Level {
    selector: ResourceHandle<TriangleSelector>,
    node: ResourceHandle<OctreeNode>,
}

impl Level {
    /// Load the level from the mounted archive
    ///
    /// # Errors
    /// [`EngineError::AssetLoad`] if the mesh is not in any mounted archive,
    /// [`EngineError::ResourceCreation`] if the node or selector fails.
    pub fn create(context: &SceneContext) -> EngineResult<Self> {
        let mesh_path = PathBuf::from(LEVEL_MESH);
        let mesh = context
            .load_mesh(&mesh_path)
            .ok_or(EngineError::AssetLoad { path: mesh_path })?;

        let node = ResourceHandle::<OctreeNode>::acquire(context, context.add_octree_node(mesh, NodeFlags::PICKABLE))?;
        let (backend, id) = node.target();
        backend.set_position(id, level_offset());

        let selector = ResourceHandle::<TriangleSelector>::acquire(
            context,
            backend.create_octree_triangle_selector(id, MIN_POLYS_PER_NODE),
        )?;
        backend.set_triangle_selector(id, Some(selector.id()));

        log::info!("Level {LEVEL_MESH} loaded as {id}");
        Ok(Self { selector, node })
    }

    /// Identity of the level node
    pub fn id(&self) -> ResourceId {
        self.node.id()
    }

    /// Identity of the level's triangle selector
    pub fn selector_id(&self) -> ResourceId {
        self.selector.id()
    }
}
