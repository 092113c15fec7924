//! Rendering backend seam
//!
//! The engine talks to the rendering library only through the
//! [`SceneBackend`](backend::SceneBackend) trait. Native objects it creates
//! are wrapped in [`ResourceHandle`](resource::ResourceHandle)s, which carry a
//! [`SceneContext`](context::SceneContext) so they know where to release them.

pub mod backend;
pub mod context;
pub mod headless;
pub mod resource;

pub use backend::{NodeFlags, SceneBackend};
pub use context::SceneContext;
pub use headless::HeadlessBackend;
pub use resource::{ResourceHandle, ResourceId, ResourceKind};
