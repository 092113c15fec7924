//! In-memory scene backend
//!
//! [`HeadlessBackend`] implements [`SceneBackend`] without a window or a GPU.
//! Native objects live in a `slotmap` arena with real reference counts, so
//! leaks and double releases show up in its [`ReleaseLedger`]. It also
//! provides just enough scene behavior to drive the picking loop:
//!
//! - animated nodes are picked as bounding spheres around their position
//! - octree (level) nodes are picked as a horizontal floor at their height
//! - only visible nodes with a triangle selector attached can be hit
//!
//! Everything a real device would decide on its own (window focus, input,
//! device shutdown, missing files, driver failures) is scripted through the
//! builder methods and the `&self` control methods.

use crate::core::config::DeviceType;
use crate::foundation::math::{Color, Ray, ScreenRect, Vec3};
use crate::input::InputEvent;
use crate::render::backend::{
    AnimationDesc, CameraParams, CollisionResponseParams, DeviceParams, FontId, LightParams, MaterialDesc,
    MaterialFlag, MeshId, NodeFlags, RayHit, SceneBackend, TextureId,
};
use crate::render::resource::ResourceId;
use slotmap::{new_key_type, Key, KeyData, SlotMap};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};

/// Bounding sphere radius given to new animated nodes, in world units
///
/// Node scale does not enlarge it; use [`HeadlessBackend::set_pick_radius`]
/// for unusually large characters.
pub const DEFAULT_PICK_RADIUS: f32 = 25.0;

new_key_type! {
    struct ObjectKey;
}

/// Kinds of native objects the headless backend creates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeKind {
    /// Rendering device
    Device,
    /// Animated mesh node
    AnimatedNode,
    /// Octree mesh node
    OctreeNode,
    /// Billboard node
    Billboard,
    /// Camera node
    Camera,
    /// Light node
    Light,
    /// Triangle selector (plain or octree)
    TriangleSelector,
    /// Node animator
    Animator,
}

/// One call to [`SceneBackend::release`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseRecord {
    /// Object the reference was given back for
    pub id: ResourceId,
    /// Its kind, or `None` if it no longer existed
    pub kind: Option<NativeKind>,
    /// Whether this call destroyed it
    pub destroyed: bool,
}

/// Reference counting summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseLedger {
    /// Objects created so far
    pub created: usize,
    /// Objects still alive
    pub live: usize,
    /// Objects destroyed because their count reached zero
    pub released: usize,
    /// Releases of objects that no longer existed
    pub over_released: usize,
    /// Every external release call, in order
    pub log: Vec<ReleaseRecord>,
}

impl ReleaseLedger {
    /// Kinds of the objects destroyed by external release calls, in order
    pub fn destroyed_kinds(&self) -> Vec<NativeKind> {
        self.log
            .iter()
            .filter(|record| record.destroyed)
            .filter_map(|record| record.kind)
            .collect()
    }
}

/// Text drawn during the current frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawnText {
    /// Font used
    pub font: FontId,
    /// The text
    pub text: String,
    /// Clip rectangle
    pub rect: ScreenRect,
    /// Text color
    pub color: Color,
    /// Centered horizontally in the rectangle
    pub center_horizontally: bool,
    /// Centered vertically in the rectangle
    pub center_vertically: bool,
}

/// Scene node state
#[derive(Debug, Clone)]
struct NodeState {
    mesh: Option<MeshId>,
    position: Vec3,
    rotation: Vec3,
    scale: Vec3,
    target: Vec3,
    name: String,
    visible: bool,
    flags: NodeFlags,
    material: MaterialDesc,
    zbuffer: bool,
    animation: Option<AnimationDesc>,
    size: (f32, f32),
    pick_radius: f32,
    triangle_selector: Option<ObjectKey>,
    animators: Vec<ObjectKey>,
}

impl NodeState {
    fn new(mesh: Option<MeshId>, flags: NodeFlags) -> Self {
        Self {
            mesh,
            position: Vec3::zeros(),
            rotation: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            target: Vec3::new(0.0, 0.0, 100.0),
            name: String::new(),
            visible: true,
            flags,
            material: MaterialDesc {
                lighting: true,
                ..MaterialDesc::default()
            },
            zbuffer: true,
            animation: None,
            size: (10.0, 10.0),
            pick_radius: DEFAULT_PICK_RADIUS,
            triangle_selector: None,
            animators: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct NativeObject {
    kind: NativeKind,
    refcount: u32,
    node: Option<NodeState>,
    /// References this object holds on other objects
    holds: Vec<ObjectKey>,
}

#[derive(Debug, Default)]
struct Faults {
    missing_assets: Vec<PathBuf>,
    failing_kinds: HashSet<NativeKind>,
    begin_scene_failures: HashSet<u64>,
    end_scene_failures: HashSet<u64>,
}

#[derive(Debug, Default)]
struct AssetCache {
    meshes: HashMap<PathBuf, MeshId>,
    textures: HashMap<PathBuf, TextureId>,
    fonts: HashMap<PathBuf, FontId>,
    next_id: u64,
}

impl AssetCache {
    fn next(&mut self) -> Option<NonZeroU64> {
        self.next_id += 1;
        NonZeroU64::new(self.next_id)
    }
}

#[derive(Debug, Default)]
struct DeviceState {
    params: Option<DeviceParams>,
    archives: Vec<PathBuf>,
    caption: String,
    cursor_visible: bool,
    window_inactive: bool,
    closed: bool,
    close_after: Option<u64>,
    cycles: u64,
    yields: u64,
    pending_events: Vec<InputEvent>,
    scheduled_events: BTreeMap<u64, Vec<InputEvent>>,
}

#[derive(Debug, Default)]
struct FrameState {
    begun: u64,
    presented: u64,
    scene_draws: u64,
    text: Vec<DrawnText>,
}

#[derive(Debug, Default)]
struct HeadlessState {
    objects: SlotMap<ObjectKey, NativeObject>,
    ledger: ReleaseLedger,
    faults: Faults,
    assets: AssetCache,
    device: DeviceState,
    frame: FrameState,
    active_camera: Option<ObjectKey>,
}

fn id_of(key: ObjectKey) -> Option<ResourceId> {
    NonZeroU64::new(key.data().as_ffi()).map(ResourceId::from_raw)
}

fn key_of(id: ResourceId) -> ObjectKey {
    ObjectKey::from(KeyData::from_ffi(id.raw().get()))
}

impl HeadlessState {
    fn create(&mut self, kind: NativeKind, node: Option<NodeState>, holds: Vec<ObjectKey>) -> Option<ResourceId> {
        if self.faults.failing_kinds.contains(&kind) {
            log::warn!("Headless backend refusing to create {kind:?}");
            return None;
        }
        for held in &holds {
            self.grab_key(*held);
        }
        let key = self.objects.insert(NativeObject {
            kind,
            refcount: 1,
            node,
            holds,
        });
        self.ledger.created += 1;
        id_of(key)
    }

    fn grab_key(&mut self, key: ObjectKey) {
        if let Some(object) = self.objects.get_mut(key) {
            object.refcount += 1;
        }
    }

    /// Drop one reference; destroys the object and everything only it kept alive
    fn drop_reference(&mut self, key: ObjectKey) -> bool {
        let Some(object) = self.objects.get_mut(key) else {
            return false;
        };
        object.refcount -= 1;
        if object.refcount > 0 {
            return false;
        }

        let mut pending = vec![key];
        while let Some(key) = pending.pop() {
            let Some(object) = self.objects.remove(key) else {
                continue;
            };
            self.ledger.released += 1;
            if self.active_camera == Some(key) {
                self.active_camera = None;
            }

            let mut held = object.holds;
            if let Some(node) = object.node {
                held.extend(node.triangle_selector);
                held.extend(node.animators);
            }
            for child in held {
                if let Some(child_object) = self.objects.get_mut(child) {
                    child_object.refcount -= 1;
                    if child_object.refcount == 0 {
                        pending.push(child);
                    }
                }
            }
        }
        true
    }

    #[track_caller]
    fn node(&self, id: ResourceId) -> &NodeState {
        match self.objects.get(key_of(id)).and_then(|object| object.node.as_ref()) {
            Some(node) => node,
            None => panic!("headless backend: {id} is not a live scene node"),
        }
    }

    #[track_caller]
    fn node_mut(&mut self, id: ResourceId) -> &mut NodeState {
        match self.objects.get_mut(key_of(id)).and_then(|object| object.node.as_mut()) {
            Some(node) => node,
            None => panic!("headless backend: {id} is not a live scene node"),
        }
    }

    fn kind(&self, id: ResourceId) -> Option<NativeKind> {
        self.objects.get(key_of(id)).map(|object| object.kind)
    }

    fn is_missing(&self, path: &Path) -> bool {
        self.faults.missing_assets.iter().any(|missing| path.ends_with(missing))
    }
}

/// Scene backend that keeps everything in memory
///
/// # Examples
/// ```
/// # use laser_engine::render::headless::HeadlessBackend;
/// # use laser_engine::render::backend::SceneBackend;
/// let backend = HeadlessBackend::new().with_missing_asset("faerie2.bmp");
/// assert!(backend.load_texture("media/faerie2.bmp".as_ref()).is_none());
/// assert!(backend.load_texture("media/particle.bmp".as_ref()).is_some());
/// ```
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    state: RefCell<HeadlessState>,
}

impl HeadlessBackend {
    /// Empty scene; every asset exists and every creation succeeds
    pub fn new() -> Self {
        Self::default()
    }

    // ---- builder ----------------------------------------------------------

    /// Make loading any path ending in `path` fail (archives included)
    pub fn with_missing_asset(self, path: impl Into<PathBuf>) -> Self {
        self.state.borrow_mut().faults.missing_assets.push(path.into());
        self
    }

    /// Make every creation of `kind` fail
    pub fn with_failing(self, kind: NativeKind) -> Self {
        self.state.borrow_mut().faults.failing_kinds.insert(kind);
        self
    }

    /// Make the `frame`-th `begin_scene` call (1-based) fail
    pub fn with_begin_scene_failure(self, frame: u64) -> Self {
        self.state.borrow_mut().faults.begin_scene_failures.insert(frame);
        self
    }

    /// Make the `frame`-th `end_scene` call (1-based) fail
    pub fn with_end_scene_failure(self, frame: u64) -> Self {
        self.state.borrow_mut().faults.end_scene_failures.insert(frame);
        self
    }

    /// Let the device run for `cycles` loop iterations, then report it closed
    pub fn with_cycle_limit(self, cycles: u64) -> Self {
        self.state.borrow_mut().device.close_after = Some(cycles);
        self
    }

    /// Deliver `event` during the `cycle`-th loop iteration (1-based)
    pub fn with_event_at(self, cycle: u64, event: InputEvent) -> Self {
        self.state
            .borrow_mut()
            .device
            .scheduled_events
            .entry(cycle)
            .or_default()
            .push(event);
        self
    }

    // ---- runtime control --------------------------------------------------

    /// Queue an event for the next poll
    pub fn push_event(&self, event: InputEvent) {
        self.state.borrow_mut().device.pending_events.push(event);
    }

    /// Give or take window focus
    pub fn set_window_active(&self, active: bool) {
        self.state.borrow_mut().device.window_inactive = !active;
    }

    /// Close the device; the next `run` returns `false`
    pub fn close(&self) {
        self.state.borrow_mut().device.closed = true;
    }

    /// Change the bounding sphere radius used to pick an animated node
    pub fn set_pick_radius(&self, node: ResourceId, radius: f32) {
        self.state.borrow_mut().node_mut(node).pick_radius = radius;
    }

    /// Make creations of `kind` fail from now on (or succeed again)
    pub fn set_failing(&self, kind: NativeKind, failing: bool) {
        let faults = &mut self.state.borrow_mut().faults;
        if failing {
            faults.failing_kinds.insert(kind);
        } else {
            faults.failing_kinds.remove(&kind);
        }
    }

    // ---- inspection -------------------------------------------------------

    /// Reference counting summary
    pub fn ledger(&self) -> ReleaseLedger {
        let state = self.state.borrow();
        ReleaseLedger {
            live: state.objects.len(),
            ..state.ledger.clone()
        }
    }

    /// Kind of a live object
    pub fn kind_of(&self, id: ResourceId) -> Option<NativeKind> {
        self.state.borrow().kind(id)
    }

    /// Current reference count of a live object
    pub fn refcount(&self, id: ResourceId) -> Option<u32> {
        self.state.borrow().objects.get(key_of(id)).map(|object| object.refcount)
    }

    /// Number of live objects of one kind
    pub fn live_count(&self, kind: NativeKind) -> usize {
        self.state.borrow().objects.values().filter(|object| object.kind == kind).count()
    }

    /// Parameters the device was created with
    pub fn device_params(&self) -> Option<DeviceParams> {
        self.state.borrow().device.params
    }

    /// Archives mounted so far
    pub fn mounted_archives(&self) -> Vec<PathBuf> {
        self.state.borrow().device.archives.clone()
    }

    /// Window title
    pub fn caption(&self) -> String {
        self.state.borrow().device.caption.clone()
    }

    /// Whether the mouse cursor is shown
    pub fn cursor_visible(&self) -> bool {
        self.state.borrow().device.cursor_visible
    }

    /// Loop iterations started so far (`run` calls that returned `true`)
    pub fn cycles(&self) -> u64 {
        self.state.borrow().device.cycles
    }

    /// Times the device yielded while inactive
    pub fn yields(&self) -> u64 {
        self.state.borrow().device.yields
    }

    /// Frames presented successfully
    pub fn frames_presented(&self) -> u64 {
        self.state.borrow().frame.presented
    }

    /// Times the scene graph was drawn
    pub fn scene_draws(&self) -> u64 {
        self.state.borrow().frame.scene_draws
    }

    /// Text drawn since the last `begin_scene`
    pub fn drawn_text(&self) -> Vec<DrawnText> {
        self.state.borrow().frame.text.clone()
    }

    /// Material of a node
    pub fn material(&self, node: ResourceId) -> MaterialDesc {
        self.state.borrow().node(node).material
    }

    /// Whether a node uses depth testing
    pub fn zbuffer(&self, node: ResourceId) -> bool {
        self.state.borrow().node(node).zbuffer
    }

    /// Node scale
    pub fn scale(&self, node: ResourceId) -> Vec3 {
        self.state.borrow().node(node).scale
    }

    /// Node rotation in degrees
    pub fn rotation(&self, node: ResourceId) -> Vec3 {
        self.state.borrow().node(node).rotation
    }

    /// Animation playback of a node
    pub fn animation(&self, node: ResourceId) -> Option<AnimationDesc> {
        self.state.borrow().node(node).animation
    }

    /// Billboard size
    pub fn size(&self, node: ResourceId) -> (f32, f32) {
        self.state.borrow().node(node).size
    }

    /// Mesh a node was created from
    pub fn mesh_of(&self, node: ResourceId) -> Option<MeshId> {
        self.state.borrow().node(node).mesh
    }

    /// Animators attached to a node
    pub fn animators(&self, node: ResourceId) -> Vec<ResourceId> {
        self.state.borrow().node(node).animators.iter().filter_map(|key| id_of(*key)).collect()
    }

    /// Camera that `add_camera_fps` made active
    pub fn active_camera(&self) -> Option<ResourceId> {
        self.state.borrow().active_camera.and_then(id_of)
    }

    fn load<Id: Copy>(
        &self,
        path: &Path,
        what: &str,
        cache: impl Fn(&mut AssetCache) -> &mut HashMap<PathBuf, Id>,
        make: impl Fn(NonZeroU64) -> Id,
    ) -> Option<Id> {
        let mut state = self.state.borrow_mut();
        if state.is_missing(path) {
            log::warn!("Headless backend: {what} {} not found", path.display());
            return None;
        }
        if let Some(id) = cache(&mut state.assets).get(path) {
            return Some(*id);
        }
        let id = make(state.assets.next()?);
        cache(&mut state.assets).insert(path.to_path_buf(), id);
        Some(id)
    }

    fn add_node(&self, kind: NativeKind, node: NodeState) -> Option<ResourceId> {
        self.state.borrow_mut().create(kind, Some(node), Vec::new())
    }
}

/// Distance along `direction` from `start` to the first point of the sphere
fn ray_sphere(start: Vec3, direction: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let offset = start - center;
    let b = offset.dot(&direction);
    let c = offset.norm_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    let near = -b - root;
    if near >= 0.0 {
        Some(near)
    } else if -b + root >= 0.0 {
        // starts inside the sphere
        Some(0.0)
    } else {
        None
    }
}

/// Distance along `direction` from `start` to the horizontal plane at `height`
fn ray_floor(start: Vec3, direction: Vec3, height: f32) -> Option<f32> {
    if direction.y.abs() <= f32::EPSILON {
        return None;
    }
    let distance = (height - start.y) / direction.y;
    (distance >= 0.0).then_some(distance)
}

impl SceneBackend for HeadlessBackend {
    fn create_device(&self, params: &DeviceParams) -> Option<ResourceId> {
        let mut state = self.state.borrow_mut();
        let id = state.create(NativeKind::Device, None, Vec::new())?;
        if params.device_type != DeviceType::Null {
            log::debug!("Headless backend emulating {:?} device", params.device_type);
        }
        state.device.params = Some(*params);
        state.device.cursor_visible = true;
        Some(id)
    }

    fn add_file_archive(&self, path: &Path) -> bool {
        let mut state = self.state.borrow_mut();
        if state.is_missing(path) {
            log::warn!("Headless backend: archive {} not found", path.display());
            return false;
        }
        state.device.archives.push(path.to_path_buf());
        true
    }

    fn set_window_caption(&self, caption: &str) {
        self.state.borrow_mut().device.caption = caption.to_string();
    }

    fn set_cursor_visible(&self, visible: bool) {
        self.state.borrow_mut().device.cursor_visible = visible;
    }

    fn run(&self) -> bool {
        let mut state = self.state.borrow_mut();
        let device = &mut state.device;
        if device.closed || device.close_after.is_some_and(|limit| device.cycles >= limit) {
            device.closed = true;
            return false;
        }
        device.cycles += 1;
        if let Some(events) = device.scheduled_events.remove(&device.cycles) {
            device.pending_events.extend(events);
        }
        true
    }

    fn is_window_active(&self) -> bool {
        !self.state.borrow().device.window_inactive
    }

    fn yield_now(&self) {
        self.state.borrow_mut().device.yields += 1;
    }

    fn poll_events(&self) -> Vec<InputEvent> {
        std::mem::take(&mut self.state.borrow_mut().device.pending_events)
    }

    fn load_mesh(&self, path: &Path) -> Option<MeshId> {
        self.load(path, "mesh", |assets| &mut assets.meshes, MeshId::from_raw)
    }

    fn load_texture(&self, path: &Path) -> Option<TextureId> {
        self.load(path, "texture", |assets| &mut assets.textures, TextureId::from_raw)
    }

    fn load_font(&self, path: &Path) -> Option<FontId> {
        self.load(path, "font", |assets| &mut assets.fonts, FontId::from_raw)
    }

    fn add_animated_mesh_node(&self, mesh: MeshId, flags: NodeFlags) -> Option<ResourceId> {
        self.add_node(NativeKind::AnimatedNode, NodeState::new(Some(mesh), flags))
    }

    fn add_octree_node(&self, mesh: MeshId, flags: NodeFlags) -> Option<ResourceId> {
        self.add_node(NativeKind::OctreeNode, NodeState::new(Some(mesh), flags))
    }

    fn add_billboard_node(&self) -> Option<ResourceId> {
        self.add_node(NativeKind::Billboard, NodeState::new(None, NodeFlags::empty()))
    }

    fn add_camera_fps(&self, params: &CameraParams) -> Option<ResourceId> {
        let id = self.add_node(NativeKind::Camera, NodeState::new(None, params.flags))?;
        self.state.borrow_mut().active_camera = Some(key_of(id));
        Some(id)
    }

    fn add_light(&self, params: &LightParams) -> Option<ResourceId> {
        let mut node = NodeState::new(None, NodeFlags::empty());
        node.position = params.position;
        node.pick_radius = params.radius;
        self.add_node(NativeKind::Light, node)
    }

    fn create_triangle_selector(&self, node: ResourceId) -> Option<ResourceId> {
        let mut state = self.state.borrow_mut();
        if state.kind(node) != Some(NativeKind::AnimatedNode) {
            log::warn!("Headless backend: {node} is not an animated node");
            return None;
        }
        state.create(NativeKind::TriangleSelector, None, Vec::new())
    }

    fn create_octree_triangle_selector(&self, node: ResourceId, min_polys_per_node: u32) -> Option<ResourceId> {
        let mut state = self.state.borrow_mut();
        if state.kind(node) != Some(NativeKind::OctreeNode) || min_polys_per_node == 0 {
            log::warn!("Headless backend: cannot build octree selector over {node}");
            return None;
        }
        state.create(NativeKind::TriangleSelector, None, Vec::new())
    }

    fn create_collision_response_animator(
        &self,
        world: ResourceId,
        node: ResourceId,
        params: &CollisionResponseParams,
    ) -> Option<ResourceId> {
        let mut state = self.state.borrow_mut();
        if state.kind(world) != Some(NativeKind::TriangleSelector) || state.kind(node).is_none() {
            return None;
        }
        log::trace!("Collision animator for {node}: ellipsoid {:?}", params.ellipsoid_radius);
        // the animator keeps the world selector alive
        state.create(NativeKind::Animator, None, vec![key_of(world)])
    }

    fn cast_ray(&self, ray: &Ray, mask: NodeFlags) -> Option<RayHit> {
        let direction = ray.direction()?.into_inner();
        let length = ray.length();
        let state = self.state.borrow();

        let mut nearest: Option<(f32, ObjectKey)> = None;
        for (key, object) in &state.objects {
            let Some(node) = object.node.as_ref() else {
                continue;
            };
            if !node.visible || !node.flags.intersects(mask) || node.triangle_selector.is_none() {
                continue;
            }
            let distance = match object.kind {
                NativeKind::AnimatedNode => ray_sphere(ray.start, direction, node.position, node.pick_radius),
                NativeKind::OctreeNode => ray_floor(ray.start, direction, node.position.y),
                _ => None,
            };
            if let Some(distance) = distance.filter(|distance| *distance <= length) {
                if nearest.map_or(true, |(best, _)| distance < best) {
                    nearest = Some((distance, key));
                }
            }
        }

        let (distance, key) = nearest?;
        Some(RayHit {
            node: id_of(key)?,
            point: ray.start + direction * distance,
        })
    }

    fn set_position(&self, node: ResourceId, position: Vec3) {
        self.state.borrow_mut().node_mut(node).position = position;
    }

    fn position(&self, node: ResourceId) -> Vec3 {
        self.state.borrow().node(node).position
    }

    fn set_rotation(&self, node: ResourceId, rotation: Vec3) {
        self.state.borrow_mut().node_mut(node).rotation = rotation;
    }

    fn set_scale(&self, node: ResourceId, scale: Vec3) {
        self.state.borrow_mut().node_mut(node).scale = scale;
    }

    fn set_target(&self, camera: ResourceId, target: Vec3) {
        self.state.borrow_mut().node_mut(camera).target = target;
    }

    fn target(&self, camera: ResourceId) -> Vec3 {
        self.state.borrow().node(camera).target
    }

    fn set_name(&self, node: ResourceId, name: &str) {
        self.state.borrow_mut().node_mut(node).name = name.to_string();
    }

    fn name(&self, node: ResourceId) -> String {
        self.state.borrow().node(node).name.clone()
    }

    fn set_visible(&self, node: ResourceId, visible: bool) {
        self.state.borrow_mut().node_mut(node).visible = visible;
    }

    fn is_visible(&self, node: ResourceId) -> bool {
        self.state.borrow().node(node).visible
    }

    fn set_material(&self, node: ResourceId, material: &MaterialDesc) {
        self.state.borrow_mut().node_mut(node).material = *material;
    }

    fn set_material_flag(&self, node: ResourceId, flag: MaterialFlag, enabled: bool) {
        let mut state = self.state.borrow_mut();
        let node = state.node_mut(node);
        match flag {
            MaterialFlag::Lighting => node.material.lighting = enabled,
            MaterialFlag::ZBuffer => node.zbuffer = enabled,
        }
    }

    fn set_animation(&self, node: ResourceId, animation: &AnimationDesc) {
        self.state.borrow_mut().node_mut(node).animation = Some(*animation);
    }

    fn set_size(&self, billboard: ResourceId, width: f32, height: f32) {
        self.state.borrow_mut().node_mut(billboard).size = (width, height);
    }

    fn flags(&self, node: ResourceId) -> NodeFlags {
        self.state.borrow().node(node).flags
    }

    fn set_flags(&self, node: ResourceId, flags: NodeFlags) {
        self.state.borrow_mut().node_mut(node).flags = flags;
    }

    fn set_triangle_selector(&self, node: ResourceId, selector: Option<ResourceId>) {
        let mut state = self.state.borrow_mut();
        let new = selector.map(key_of);
        if let Some(key) = new {
            state.grab_key(key);
        }
        let old = std::mem::replace(&mut state.node_mut(node).triangle_selector, new);
        if let Some(key) = old {
            state.drop_reference(key);
        }
    }

    fn triangle_selector(&self, node: ResourceId) -> Option<ResourceId> {
        self.state.borrow().node(node).triangle_selector.and_then(id_of)
    }

    fn add_animator(&self, node: ResourceId, animator: ResourceId) {
        let mut state = self.state.borrow_mut();
        let key = key_of(animator);
        state.grab_key(key);
        state.node_mut(node).animators.push(key);
    }

    fn begin_scene(&self) -> bool {
        let mut state = self.state.borrow_mut();
        state.frame.begun += 1;
        state.frame.text.clear();
        !state.faults.begin_scene_failures.contains(&state.frame.begun)
    }

    fn draw_all(&self) {
        self.state.borrow_mut().frame.scene_draws += 1;
    }

    fn end_scene(&self) -> bool {
        let mut state = self.state.borrow_mut();
        let frame = state.frame.begun;
        if state.faults.end_scene_failures.contains(&frame) {
            return false;
        }
        state.frame.presented += 1;
        true
    }

    fn screen_size(&self) -> (u32, u32) {
        self.state
            .borrow()
            .device
            .params
            .map_or((640, 480), |params| (params.width, params.height))
    }

    fn draw_text(
        &self,
        font: FontId,
        text: &str,
        rect: ScreenRect,
        color: Color,
        center_horizontally: bool,
        center_vertically: bool,
    ) {
        self.state.borrow_mut().frame.text.push(DrawnText {
            font,
            text: text.to_string(),
            rect,
            color,
            center_horizontally,
            center_vertically,
        });
    }

    fn grab(&self, id: ResourceId) {
        self.state.borrow_mut().grab_key(key_of(id));
    }

    fn release(&self, id: ResourceId) -> bool {
        let mut state = self.state.borrow_mut();
        let key = key_of(id);
        let kind = state.kind(id);
        if kind.is_none() {
            log::error!("Headless backend: release of dead object {id}");
            state.ledger.over_released += 1;
        }
        let destroyed = state.drop_reference(key);
        state.ledger.log.push(ReleaseRecord { id, kind, destroyed });
        destroyed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pickable_node(backend: &HeadlessBackend, position: Vec3) -> ResourceId {
        let mesh = backend.load_mesh(Path::new("media/ninja.b3d")).unwrap();
        let node = backend.add_animated_mesh_node(mesh, NodeFlags::all()).unwrap();
        backend.set_position(node, position);
        let selector = backend.create_triangle_selector(node).unwrap();
        backend.set_triangle_selector(node, Some(selector));
        backend.release(selector);
        node
    }

    #[test]
    fn test_ids_are_unique_and_counted() {
        let backend = HeadlessBackend::new();
        let a = backend.add_billboard_node().unwrap();
        let b = backend.add_billboard_node().unwrap();
        assert_ne!(a, b);
        assert_eq!(backend.refcount(a), Some(1));

        backend.grab(a);
        assert!(!backend.release(a));
        assert!(backend.release(a));
        assert_eq!(backend.kind_of(a), None);

        let ledger = backend.ledger();
        assert_eq!(ledger.created, 2);
        assert_eq!(ledger.live, 1);
        assert_eq!(ledger.released, 1);
    }

    #[test]
    fn test_release_of_dead_object_is_recorded() {
        let backend = HeadlessBackend::new();
        let id = backend.add_billboard_node().unwrap();
        backend.release(id);
        backend.release(id);

        let ledger = backend.ledger();
        assert_eq!(ledger.over_released, 1);
        assert_eq!(ledger.log.len(), 2);
        assert_eq!(ledger.log[1].kind, None);
    }

    #[test]
    fn test_attached_selector_lives_with_node() {
        let backend = HeadlessBackend::new();
        let node = pickable_node(&backend, Vec3::zeros());
        let selector = backend.triangle_selector(node).unwrap();
        assert_eq!(backend.refcount(selector), Some(1));

        backend.release(node);
        assert_eq!(backend.kind_of(selector), None);
        assert_eq!(backend.ledger().live, 0);
    }

    #[test]
    fn test_assets_are_cached_and_can_be_missing() {
        let backend = HeadlessBackend::new().with_missing_asset("dwarf.x");
        let first = backend.load_mesh(Path::new("media/ninja.b3d"));
        assert_eq!(first, backend.load_mesh(Path::new("media/ninja.b3d")));
        assert!(backend.load_mesh(Path::new("media/dwarf.x")).is_none());
        assert!(!backend.add_file_archive(Path::new("media/dwarf.x")));
        assert!(backend.add_file_archive(Path::new("media/map-20kdm2.pk3")));
    }

    #[test]
    fn test_cast_ray_hits_nearest_sphere() {
        let backend = HeadlessBackend::new();
        let near = pickable_node(&backend, Vec3::new(0.0, 0.0, 100.0));
        let _far = pickable_node(&backend, Vec3::new(0.0, 0.0, 300.0));

        let ray = Ray::towards(Vec3::zeros(), Vec3::new(0.0, 0.0, 1.0), 1000.0);
        let hit = backend.cast_ray(&ray, NodeFlags::PICKABLE).unwrap();

        assert_eq!(hit.node, near);
        assert_relative_eq!(hit.point, Vec3::new(0.0, 0.0, 75.0), epsilon = 1e-3);
    }

    #[test]
    fn test_scale_does_not_grow_pick_sphere() {
        let backend = HeadlessBackend::new();
        let big = pickable_node(&backend, Vec3::new(0.0, 0.0, 100.0));
        backend.set_scale(big, Vec3::repeat(10.0));

        let past = Ray::towards(Vec3::new(0.0, 40.0, 0.0), Vec3::new(0.0, 40.0, 1.0), 1000.0);
        assert!(backend.cast_ray(&past, NodeFlags::PICKABLE).is_none());

        backend.set_pick_radius(big, 50.0);
        assert_eq!(backend.cast_ray(&past, NodeFlags::PICKABLE).map(|hit| hit.node), Some(big));
    }

    #[test]
    fn test_cast_ray_respects_mask_visibility_and_length() {
        let backend = HeadlessBackend::new();
        let node = pickable_node(&backend, Vec3::new(0.0, 0.0, 100.0));
        let ray = Ray::towards(Vec3::zeros(), Vec3::new(0.0, 0.0, 1.0), 1000.0);

        backend.set_flags(node, NodeFlags::HIGHLIGHTABLE);
        assert!(backend.cast_ray(&ray, NodeFlags::PICKABLE).is_none());

        backend.set_flags(node, NodeFlags::PICKABLE);
        backend.set_visible(node, false);
        assert!(backend.cast_ray(&ray, NodeFlags::PICKABLE).is_none());

        backend.set_visible(node, true);
        let short = Ray::towards(Vec3::zeros(), Vec3::new(0.0, 0.0, 1.0), 50.0);
        assert!(backend.cast_ray(&short, NodeFlags::PICKABLE).is_none());
        assert!(backend.cast_ray(&ray, NodeFlags::PICKABLE).is_some());
    }

    #[test]
    fn test_cast_ray_hits_level_floor() {
        let backend = HeadlessBackend::new();
        let mesh = backend.load_mesh(Path::new("20kdm2.bsp")).unwrap();
        let level = backend.add_octree_node(mesh, NodeFlags::PICKABLE).unwrap();
        backend.set_position(level, Vec3::new(-1350.0, -130.0, -1400.0));
        let selector = backend.create_octree_triangle_selector(level, 128).unwrap();
        backend.set_triangle_selector(level, Some(selector));

        let down = Ray::towards(Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, -1.0, 1.0), 1000.0);
        let hit = backend.cast_ray(&down, NodeFlags::PICKABLE).unwrap();
        assert_eq!(hit.node, level);
        assert_relative_eq!(hit.point.y, -130.0, epsilon = 1e-3);

        let up = Ray::towards(Vec3::zeros(), Vec3::new(0.0, 1.0, 1.0), 1000.0);
        assert!(backend.cast_ray(&up, NodeFlags::PICKABLE).is_none());
    }

    #[test]
    fn test_scripted_device() {
        let backend = HeadlessBackend::new()
            .with_cycle_limit(2)
            .with_event_at(2, InputEvent::key_pressed(crate::input::KeyCode::Q));

        assert!(backend.run());
        assert!(backend.poll_events().is_empty());
        assert!(backend.run());
        assert_eq!(backend.poll_events().len(), 1);
        assert!(!backend.run());
        assert_eq!(backend.cycles(), 2);
    }

    #[test]
    fn test_frame_failures() {
        let backend = HeadlessBackend::new()
            .with_begin_scene_failure(1)
            .with_end_scene_failure(2);

        assert!(!backend.begin_scene());
        assert!(backend.begin_scene());
        assert!(!backend.end_scene());
        assert!(backend.begin_scene());
        assert!(backend.end_scene());
        assert_eq!(backend.frames_presented(), 1);
    }

    #[test]
    fn test_failing_kind() {
        let backend = HeadlessBackend::new().with_failing(NativeKind::Light);
        let light = LightParams {
            position: Vec3::zeros(),
            color: crate::foundation::math::ColorF::WHITE,
            radius: 1.0,
        };
        assert!(backend.add_light(&light).is_none());
        backend.set_failing(NativeKind::Light, false);
        assert!(backend.add_light(&light).is_some());
    }
}
