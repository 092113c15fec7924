//! Backend abstraction traits for the scene facade
//!
//! This module defines the trait a rendering library must implement so the
//! engine can drive it. Everything behind it (window bootstrap, asset formats,
//! the actual rasterizer) is the backend's business; the engine only creates
//! and releases native objects, mutates nodes, casts rays and brackets frames.
//!
//! All methods take `&self`: native objects are reference counted inside the
//! backend, and several handles hold on to the same backend at once.

use crate::core::config::DeviceType;
use crate::foundation::math::{Color, ColorF, Ray, ScreenRect, Vec3};
use crate::input::InputEvent;
use crate::render::resource::ResourceId;
use bitflags::bitflags;
use std::num::NonZeroU64;
use std::path::Path;

bitflags! {
    /// Id bits tagged on scene nodes to control ray picking
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NodeFlags: u32 {
        /// Ray casts may hit this node
        const PICKABLE = 1 << 0;
        /// Hitting this node makes it the selected object
        const HIGHLIGHTABLE = 1 << 1;
    }
}

macro_rules! asset_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU64);

        impl $name {
            /// Wrap a raw backend id
            pub const fn from_raw(raw: NonZeroU64) -> Self {
                Self(raw)
            }

            /// Raw backend id
            pub const fn raw(self) -> NonZeroU64 {
                self.0
            }
        }
    };
}

asset_id!(
    /// Mesh cached by the backend; never released by the engine
    MeshId
);
asset_id!(
    /// Texture cached by the backend; never released by the engine
    TextureId
);
asset_id!(
    /// GUI font cached by the backend; never released by the engine
    FontId
);

/// Parameters for device creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceParams {
    /// Video driver to use
    pub device_type: DeviceType,
    /// Window or screen width in pixels
    pub width: u32,
    /// Window or screen height in pixels
    pub height: u32,
    /// Color depth; only meaningful in full screen mode
    pub bits_per_pixel: u32,
    /// Full screen instead of a window
    pub full_screen: bool,
    /// Allocate a stencil buffer (needed for shadows)
    pub stencil_buffer: bool,
    /// Wait for vertical sync when presenting
    pub vsync: bool,
}

/// First-person camera tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraParams {
    /// Mouse look speed
    pub rotate_speed: f32,
    /// Walk speed
    pub move_speed: f32,
    /// Jump impulse
    pub jump_speed: f32,
    /// Id flags of the camera node
    pub flags: NodeFlags,
}

/// Collision response animator parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionResponseParams {
    /// Radii of the ellipsoid approximating the animated node
    pub ellipsoid_radius: Vec3,
    /// Gravity applied per second
    pub gravity: Vec3,
    /// Offset of the ellipsoid relative to the node position
    pub ellipsoid_translation: Vec3,
}

/// Point light parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightParams {
    /// Light position
    pub position: Vec3,
    /// Diffuse color
    pub color: ColorF,
    /// Falloff radius
    pub radius: f32,
}

/// How a material is blended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MaterialType {
    /// Opaque
    #[default]
    Solid,
    /// Additive transparency using the texture color
    TransparentAddColor,
}

/// Individually switchable material flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialFlag {
    /// Dynamic lighting
    Lighting,
    /// Depth testing
    ZBuffer,
}

/// Full material description applied to a node's first material slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaterialDesc {
    /// Blending mode
    pub material_type: MaterialType,
    /// Texture in slot 0
    pub texture: Option<TextureId>,
    /// Dynamic lighting
    pub lighting: bool,
    /// Renormalize normals after scaling
    pub normalize_normals: bool,
}

/// Built-in MD2 animation cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Md2Animation {
    /// Idle
    Stand,
    /// Running
    Run,
    /// Pointing gesture
    Point,
    /// Waving gesture
    Wave,
}

/// Animation setup for an animated mesh node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationDesc {
    /// Frames per second
    pub speed: f32,
    /// MD2 cycle to play, for MD2 meshes
    pub md2: Option<Md2Animation>,
}

/// Result of a successful ray cast
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Nearest node hit by the ray
    pub node: ResourceId,
    /// Where the ray hit it
    pub point: Vec3,
}

/// Rendering library as seen by the engine
///
/// Creation methods return `None` when the library fails; the engine turns
/// that into a typed error. Every id returned by a creation method carries one
/// reference that the caller must give back through [`SceneBackend::release`].
pub trait SceneBackend {
    // ---- device ---------------------------------------------------------

    /// Create the device (window, driver, scene manager)
    fn create_device(&self, params: &DeviceParams) -> Option<ResourceId>;

    /// Mount an archive into the backend's virtual file system
    fn add_file_archive(&self, path: &Path) -> bool;

    /// Set the window title
    fn set_window_caption(&self, caption: &str);

    /// Show or hide the mouse cursor
    fn set_cursor_visible(&self, visible: bool);

    /// Pump the device; `false` once the device has been closed
    fn run(&self) -> bool;

    /// Whether the window currently has focus
    fn is_window_active(&self) -> bool;

    /// Give up the rest of the time slice while inactive
    fn yield_now(&self);

    /// Input events received since the last call
    fn poll_events(&self) -> Vec<InputEvent>;

    // ---- assets ---------------------------------------------------------

    /// Load (or fetch from cache) a mesh
    fn load_mesh(&self, path: &Path) -> Option<MeshId>;

    /// Load (or fetch from cache) a texture
    fn load_texture(&self, path: &Path) -> Option<TextureId>;

    /// Load (or fetch from cache) a GUI font
    fn load_font(&self, path: &Path) -> Option<FontId>;

    // ---- scene manager --------------------------------------------------

    /// Add an animated mesh node
    fn add_animated_mesh_node(&self, mesh: MeshId, flags: NodeFlags) -> Option<ResourceId>;

    /// Add a static mesh node with octree culling
    fn add_octree_node(&self, mesh: MeshId, flags: NodeFlags) -> Option<ResourceId>;

    /// Add a camera-facing billboard
    fn add_billboard_node(&self) -> Option<ResourceId>;

    /// Add a first-person camera and make it active
    fn add_camera_fps(&self, params: &CameraParams) -> Option<ResourceId>;

    /// Add a point light
    fn add_light(&self, params: &LightParams) -> Option<ResourceId>;

    /// Build a triangle selector over an animated node's current mesh
    fn create_triangle_selector(&self, node: ResourceId) -> Option<ResourceId>;

    /// Build an octree triangle selector over a static node's mesh
    fn create_octree_triangle_selector(&self, node: ResourceId, min_polys_per_node: u32) -> Option<ResourceId>;

    /// Build an animator that slides `node` along the triangles of `world`
    fn create_collision_response_animator(
        &self,
        world: ResourceId,
        node: ResourceId,
        params: &CollisionResponseParams,
    ) -> Option<ResourceId>;

    /// Nearest node whose id flags intersect `mask` along the ray
    fn cast_ray(&self, ray: &Ray, mask: NodeFlags) -> Option<RayHit>;

    // ---- nodes ----------------------------------------------------------

    /// Move a node
    fn set_position(&self, node: ResourceId, position: Vec3);

    /// Current node position
    fn position(&self, node: ResourceId) -> Vec3;

    /// Rotate a node (degrees per axis)
    fn set_rotation(&self, node: ResourceId, rotation: Vec3);

    /// Scale a node
    fn set_scale(&self, node: ResourceId, scale: Vec3);

    /// Point a camera at a target
    fn set_target(&self, camera: ResourceId, target: Vec3);

    /// Current camera target
    fn target(&self, camera: ResourceId) -> Vec3;

    /// Rename a node
    fn set_name(&self, node: ResourceId, name: &str);

    /// Node name
    fn name(&self, node: ResourceId) -> String;

    /// Show or hide a node
    fn set_visible(&self, node: ResourceId, visible: bool);

    /// Whether a node is visible
    fn is_visible(&self, node: ResourceId) -> bool;

    /// Replace material slot 0
    fn set_material(&self, node: ResourceId, material: &MaterialDesc);

    /// Toggle one flag on every material of the node
    fn set_material_flag(&self, node: ResourceId, flag: MaterialFlag, enabled: bool);

    /// Configure animation playback
    fn set_animation(&self, node: ResourceId, animation: &AnimationDesc);

    /// Billboard size
    fn set_size(&self, billboard: ResourceId, width: f32, height: f32);

    /// Node id flags
    fn flags(&self, node: ResourceId) -> NodeFlags;

    /// Replace node id flags
    fn set_flags(&self, node: ResourceId, flags: NodeFlags);

    /// Attach a triangle selector to a node, grabbing a reference to it
    fn set_triangle_selector(&self, node: ResourceId, selector: Option<ResourceId>);

    /// Selector currently attached to a node
    fn triangle_selector(&self, node: ResourceId) -> Option<ResourceId>;

    /// Attach an animator to a node, grabbing a reference to it
    fn add_animator(&self, node: ResourceId, animator: ResourceId);

    // ---- video ----------------------------------------------------------

    /// Start a frame; `false` on failure
    fn begin_scene(&self) -> bool;

    /// Render the scene graph and the GUI
    fn draw_all(&self);

    /// Present the frame; `false` on failure
    fn end_scene(&self) -> bool;

    /// Current render target size
    fn screen_size(&self) -> (u32, u32);

    /// Draw text with a GUI font
    fn draw_text(
        &self,
        font: FontId,
        text: &str,
        rect: ScreenRect,
        color: Color,
        center_horizontally: bool,
        center_vertically: bool,
    );

    // ---- reference counting ---------------------------------------------

    /// Add a reference to a native object
    fn grab(&self, id: ResourceId);

    /// Drop a reference to a native object; `true` when it was destroyed
    fn release(&self, id: ResourceId) -> bool;
}
