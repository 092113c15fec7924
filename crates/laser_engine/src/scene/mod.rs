//! Scene entities
//!
//! Thin owning wrappers over the native objects that make up the scene:
//! characters and their selectors, the camera, the level, the laser dot and
//! the light.

pub mod camera;
pub mod laser;
pub mod level;
pub mod light;
pub mod object;
pub mod selector;

pub use camera::Camera;
pub use laser::LaserPointer;
pub use level::Level;
pub use light::Light;
pub use object::{CharacterDescriptor, CharacterKind, ObjectHandle};
pub use selector::Selector;
