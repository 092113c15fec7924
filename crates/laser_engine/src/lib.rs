//! # Laser Engine
//!
//! Ownership-safe handles over a reference-counted 3D scene backend, with a
//! per-frame "laser" picking loop on top.
//!
//! ## Features
//!
//! - **Resource Handles**: every native resource is released exactly once
//! - **Scene Entities**: characters, selectors, camera, level, laser and light
//! - **Picking**: ray cast from the camera every frame, tracking the selected object
//! - **Lifetime Counters**: per-type construct/destroy accounting with leak detection
//! - **Headless Backend**: in-memory scene used by tests and the demo application
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use laser_engine::prelude::*;
//!
//! fn main() -> Result<(), EngineError> {
//!     let backend = Rc::new(HeadlessBackend::new());
//!     let mut engine = Engine::new(backend, EngineConfig::default())?;
//!
//!     let ninja = ObjectHandle::create(&engine, CharacterKind::Ninja, "Ninja")?;
//!     let selector = Selector::create(&engine, &ninja)?;
//!     ninja.attach_selector(&selector);
//!
//!     engine.run(|engine| {
//!         if let Some(selected) = engine.selected_object() {
//!             let label = selected.name();
//!             engine.draw_label(&label);
//!         }
//!     })?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Core engine modules
pub mod core;

pub mod config;
pub mod foundation;
pub mod input;
pub mod picking;
pub mod render;
pub mod scene;

mod engine;

pub use engine::{Cycle, Engine, EngineError, EngineResult, EngineState, FrameError, RunSummary};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        Cycle, Engine, EngineError, EngineResult, EngineState, FrameError, RunSummary,
        core::config::{
            BitsPerPixel, DeviceType, EngineConfig, FrameErrorPolicy, FullScreenParams,
            ScreenMode, StencilBuffer, VerticalSync, WindowHeight, WindowParams, WindowWidth,
        },
        config::{Config, ConfigError},
        foundation::{
            counters::{CounterRegistry, Counted, InstanceCounter},
            math::{Ray, Vec3},
            named::NamedValue,
            ranged::{Angle, RangeError, RangedValue},
        },
        input::{EventReceiver, InputEvent, KeyCode},
        picking::{PickOutcome, PickingSystem},
        render::{
            backend::{NodeFlags, SceneBackend},
            context::SceneContext,
            headless::HeadlessBackend,
            resource::{ResourceHandle, ResourceId},
        },
        scene::{Camera, CharacterKind, LaserPointer, Level, Light, ObjectHandle, Selector},
    };
}
