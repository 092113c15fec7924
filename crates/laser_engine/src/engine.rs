//! Core engine implementation
//!
//! [`Engine`] owns the device and every scene entity it creates at startup,
//! and drives the main loop: poll input, draw the scene, cast the laser, run
//! the caller's per-frame code, present.
//!
//! Construction acquires resources in a fixed order. If any step fails, the
//! resources acquired so far are released in reverse order as the locals
//! holding them go out of scope. Dropping the engine releases everything in
//! reverse acquisition order, which is why the struct fields are declared
//! last-acquired first.

use crate::config::ConfigError;
use crate::core::config::{EngineConfig, FrameErrorPolicy};
use crate::foundation::counters::InstanceCounter;
use crate::foundation::math::{Color, ScreenRect};
use crate::foundation::ranged::RangeError;
use crate::input::EventReceiver;
use crate::picking::{PickOutcome, PickingSystem};
use crate::render::backend::{FontId, SceneBackend};
use crate::render::context::SceneContext;
use crate::render::resource::{Device, ResourceHandle, ResourceId};
use crate::scene::level::MAP_ARCHIVE;
use crate::scene::light::default_light;
use crate::scene::{Camera, LaserPointer, Level, Light, ObjectHandle};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

/// GUI font, relative to the media directory
pub const FONT_FILE: &str = "fonthaettenschweiler.bmp";

/// Color of all text the engine draws
pub const TEXT_COLOR: Color = Color::argb(0xff, 0xff, 0xff, 0xf0);

/// Result type used throughout the engine
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// The backend returned nothing from a creation call
    #[error("failed to create {resource}")]
    ResourceCreation {
        /// Kind of resource that could not be created
        resource: &'static str,
    },

    /// A media file could not be loaded
    #[error("failed to load asset {}", path.display())]
    AssetLoad {
        /// Path that was requested
        path: PathBuf,
    },

    /// A range-checked value was out of range
    #[error(transparent)]
    OutOfRange(#[from] RangeError),

    /// Beginning or ending a frame failed
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The configuration is unusable
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Per-frame failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// The driver refused to start a frame
    #[error("failed to begin the scene")]
    BeginScene,
    /// The driver failed to present a frame
    #[error("failed to end the scene")]
    EndScene,
}

/// Main loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    /// Constructed, loop not started
    Idle,
    /// Inside the main loop
    Running,
    /// The loop ended (device closed, quit key or fatal frame error)
    Stopped,
}

/// What one main loop cycle did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cycle {
    /// A frame was drawn and the laser cast
    Drawn(PickOutcome),
    /// The window had no focus; the device yielded instead of drawing
    Idle,
    /// The device closed or the quit key was pressed
    Finished,
}

/// Statistics returned by [`Engine::run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Frames drawn and presented
    pub frames: u64,
    /// Frames abandoned because of a [`FrameError`]
    pub skipped_frames: u64,
    /// Cycles spent yielding while the window was inactive
    pub idle_cycles: u64,
}

/// 3D engine over a [`SceneBackend`]
///
/// Creates the device, mounts the level archive and sets up the font, laser,
/// level, camera and light. Characters are added afterwards with
/// [`ObjectHandle::create`].
pub struct Engine {
    picking: PickingSystem,
    light: Light,
    camera: Camera,
    level: Level,
    laser: LaserPointer,
    font: FontId,
    device: ResourceHandle<Device>,
    receiver: EventReceiver,
    context: SceneContext,
    config: EngineConfig,
    state: EngineState,
    _counter: InstanceCounter<Self>,
}

impl Engine {
    /// Create an engine accounting into the process-wide counter registry
    ///
    /// # Errors
    /// Any [`EngineError`] raised while bringing up the device or the
    /// startup entities; nothing stays acquired in that case.
    pub fn new(backend: Rc<dyn SceneBackend>, config: EngineConfig) -> EngineResult<Self> {
        Self::with_context(SceneContext::new(backend), config)
    }

    /// Create an engine in an existing context
    ///
    /// # Errors
    /// See [`Engine::new`].
    pub fn with_context(context: SceneContext, config: EngineConfig) -> EngineResult<Self> {
        log::info!("Initializing engine...");
        config.validate()?;

        let receiver = EventReceiver::new_in(config.quit_key, context.counters());
        let device = ResourceHandle::<Device>::acquire(&context, context.create_device(&config.device_params()))?;

        let archive = config.media_path.join(MAP_ARCHIVE);
        if !context.add_file_archive(&archive) {
            return Err(EngineError::AssetLoad { path: archive });
        }
        context.set_window_caption(&config.caption);
        // the laser dot replaces the cursor
        context.set_cursor_visible(false);

        let font_path = config.media_path.join(FONT_FILE);
        let font = context
            .load_font(&font_path)
            .ok_or(EngineError::AssetLoad { path: font_path })?;

        let laser = LaserPointer::create(&context, &config.media_path)?;
        let level = Level::create(&context)?;
        let camera = Camera::create(&context, &level)?;
        let light = Light::create(&context, &default_light())?;

        log::info!("Engine ready ({:?} device)", config.device_type);
        Ok(Self {
            picking: PickingSystem::new(),
            light,
            camera,
            level,
            laser,
            font,
            device,
            receiver,
            _counter: context.counter(),
            context,
            config,
            state: EngineState::Idle,
        })
    }

    /// Run the main loop until the device closes or the quit key is pressed
    ///
    /// `frame` runs once per drawn frame, after the laser has been cast and
    /// before the frame is presented.
    ///
    /// # Errors
    /// A [`FrameError`] when [`FrameErrorPolicy::Stop`] is configured; with
    /// [`FrameErrorPolicy::Skip`] failed frames are only counted.
    pub fn run<F: FnMut(&mut Self)>(&mut self, mut frame: F) -> EngineResult<RunSummary> {
        log::info!("Starting main loop...");
        let mut summary = RunSummary::default();

        loop {
            match self.step(&mut frame) {
                Ok(Cycle::Drawn(_)) => summary.frames += 1,
                Ok(Cycle::Idle) => summary.idle_cycles += 1,
                Ok(Cycle::Finished) => break,
                Err(err) => match self.config.frame_error_policy {
                    FrameErrorPolicy::Skip => {
                        log::warn!("Skipping frame: {err}");
                        summary.skipped_frames += 1;
                    }
                    FrameErrorPolicy::Stop => {
                        log::error!("Stopping main loop: {err}");
                        self.state = EngineState::Stopped;
                        return Err(err.into());
                    }
                },
            }
        }

        log::info!(
            "Main loop finished: {} frames, {} skipped",
            summary.frames,
            summary.skipped_frames
        );
        Ok(summary)
    }

    /// Run one main loop cycle
    ///
    /// # Errors
    /// [`FrameError::BeginScene`] if the frame could not be started (the
    /// laser is not cast and `frame` does not run), [`FrameError::EndScene`]
    /// if it could not be presented.
    pub fn step<F: FnOnce(&mut Self)>(&mut self, frame: F) -> Result<Cycle, FrameError> {
        if !self.context.run() {
            self.state = EngineState::Stopped;
            return Ok(Cycle::Finished);
        }
        for event in self.context.poll_events() {
            let _ = self.receiver.on_event(&event);
        }
        if self.receiver.quit() {
            self.state = EngineState::Stopped;
            return Ok(Cycle::Finished);
        }
        self.state = EngineState::Running;

        if !self.context.is_window_active() {
            self.context.yield_now();
            return Ok(Cycle::Idle);
        }

        let outcome = self.begin_scene()?;
        frame(self);
        self.end_scene()?;
        Ok(Cycle::Drawn(outcome))
    }

    fn begin_scene(&mut self) -> Result<PickOutcome, FrameError> {
        if !self.context.begin_scene() {
            return Err(FrameError::BeginScene);
        }
        self.context.draw_all();

        let (_, height) = self.screen_size();
        let hint = format!("Press '{}' to exit", quit_key_label(&self.config));
        self.context
            .draw_text(self.font, &hint, ScreenRect::new(10, height - 50, 200, height), TEXT_COLOR, false, true);

        Ok(self.picking.process(&self.camera, &self.laser))
    }

    fn end_scene(&self) -> Result<(), FrameError> {
        if self.context.end_scene() {
            Ok(())
        } else {
            Err(FrameError::EndScene)
        }
    }

    fn screen_size(&self) -> (i32, i32) {
        let (width, height) = self.context.screen_size();
        (
            i32::try_from(width).unwrap_or(i32::MAX),
            i32::try_from(height).unwrap_or(i32::MAX),
        )
    }

    /// Draw a centered label across the top of the screen
    pub fn draw_label(&self, label: &str) {
        let (width, _) = self.screen_size();
        self.context
            .draw_text(self.font, label, ScreenRect::new(100, 10, width - 100, 60), TEXT_COLOR, true, true);
    }

    /// Object currently under the laser, if it is a character
    pub const fn selected_object(&self) -> Option<&ObjectHandle> {
        self.picking.selected_object()
    }

    /// The engine's camera
    pub const fn camera(&self) -> &Camera {
        &self.camera
    }

    /// The laser dot
    pub const fn laser(&self) -> &LaserPointer {
        &self.laser
    }

    /// The level
    pub const fn level(&self) -> &Level {
        &self.level
    }

    /// The scene light
    pub const fn light(&self) -> &Light {
        &self.light
    }

    /// Directory the media files are read from
    pub fn media_path(&self) -> &Path {
        &self.config.media_path
    }

    /// Backend and counter registry shared by everything the engine creates
    pub const fn context(&self) -> &SceneContext {
        &self.context
    }

    /// Configuration the engine was created with
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Main loop state
    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// Whether the quit key has been pressed
    pub const fn quit_requested(&self) -> bool {
        self.receiver.quit()
    }

    /// Identity of the device
    pub fn device_id(&self) -> ResourceId {
        self.device.id()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        log::info!("Shutting down engine");
        // the selection only observes, but it must not outlive the nodes
        self.picking.clear();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("device", &self.device)
            .field("state", &self.state)
            .field("selected", &self.picking.selected_object())
            .finish_non_exhaustive()
    }
}

fn quit_key_label(config: &EngineConfig) -> String {
    format!("{:?}", config.quit_key).to_lowercase()
}
