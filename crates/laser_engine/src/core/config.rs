//! # Engine Configuration
//!
//! Everything needed to bring the engine up: where the media files live,
//! what kind of device to open and how the main loop reacts to input and
//! failures.
//!
//! ## Design Goals
//!
//! - **Type Safe**: same-typed parameters (width/height, stencil/vsync) are
//!   distinct named types, so they cannot be swapped
//! - **Serializable**: loadable from TOML or RON through [`Config`]
//! - **Sensible Defaults**: a software device in a 640x480 window, reading
//!   media from `./media`

use crate::foundation::named::NamedValue;
use crate::input::KeyCode;
use crate::render::backend::DeviceParams;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use crate::config::{Config, ConfigError};

/// Tag for [`StencilBuffer`]
#[derive(Debug)]
pub enum StencilBufferTag {}
/// Tag for [`VerticalSync`]
#[derive(Debug)]
pub enum VerticalSyncTag {}
/// Tag for [`WindowWidth`]
#[derive(Debug)]
pub enum WindowWidthTag {}
/// Tag for [`WindowHeight`]
#[derive(Debug)]
pub enum WindowHeightTag {}

/// Allocate a stencil buffer (needed for shadows)
pub type StencilBuffer = NamedValue<bool, StencilBufferTag>;
/// Wait for vertical sync when presenting
pub type VerticalSync = NamedValue<bool, VerticalSyncTag>;
/// Window width in pixels
pub type WindowWidth = NamedValue<u32, WindowWidthTag>;
/// Window height in pixels
pub type WindowHeight = NamedValue<u32, WindowHeightTag>;

/// Color depth passed for windowed devices, where the desktop depth wins anyway
const WINDOWED_BITS_PER_PIXEL: u32 = 16;

/// Window resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowParams {
    /// Width in pixels
    pub width: WindowWidth,
    /// Height in pixels
    pub height: WindowHeight,
}

impl WindowParams {
    /// Create window parameters
    pub const fn new(width: WindowWidth, height: WindowHeight) -> Self {
        Self { width, height }
    }
}

impl Default for WindowParams {
    fn default() -> Self {
        Self::new(WindowWidth::new(640), WindowHeight::new(480))
    }
}

/// Color depth of a full screen mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitsPerPixel {
    /// 16 bits per pixel
    Bpp16,
    /// 32 bits per pixel
    Bpp32,
}

impl BitsPerPixel {
    /// Numeric bit depth
    pub const fn bits(self) -> u32 {
        match self {
            Self::Bpp16 => 16,
            Self::Bpp32 => 32,
        }
    }
}

/// Full screen resolution and depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullScreenParams {
    /// Screen resolution
    pub window: WindowParams,
    /// Color depth
    pub bpp: BitsPerPixel,
}

/// Windowed or full screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScreenMode {
    /// Run in a window
    Windowed(WindowParams),
    /// Take over the whole screen
    FullScreen(FullScreenParams),
}

impl ScreenMode {
    /// Resolution regardless of mode
    pub const fn window(&self) -> WindowParams {
        match self {
            Self::Windowed(window) => *window,
            Self::FullScreen(full) => full.window,
        }
    }
}

impl Default for ScreenMode {
    fn default() -> Self {
        Self::Windowed(WindowParams::default())
    }
}

/// Video driver to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceType {
    /// Renders nothing; useful for tests
    Null,
    /// Built-in software rasterizer
    #[default]
    Software,
    /// Direct3D 9
    Direct3D9,
    /// OpenGL
    OpenGl,
}

/// What the main loop does when beginning or ending a frame fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FrameErrorPolicy {
    /// Log the failure, count the frame as skipped and keep running
    #[default]
    Skip,
    /// Stop the loop and return the error
    Stop,
}

/// # Engine Configuration
///
/// Parameters for [`Engine::new`](crate::Engine::new).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding the backend's media files
    pub media_path: PathBuf,
    /// Window or full screen resolution and depth
    pub screen: ScreenMode,
    /// Enables usage of the stencil buffer for shadows
    pub stencil_buffer: StencilBuffer,
    /// Enables vertical sync
    pub vsync: VerticalSync,
    /// Type of the device to use
    pub device_type: DeviceType,
    /// Window title
    pub caption: String,
    /// Key that ends the main loop
    pub quit_key: KeyCode,
    /// Reaction to frame failures
    pub frame_error_policy: FrameErrorPolicy,
}

impl EngineConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self {
            media_path: PathBuf::from("media"),
            screen: ScreenMode::default(),
            stencil_buffer: StencilBuffer::new(true),
            vsync: VerticalSync::new(true),
            device_type: DeviceType::default(),
            caption: "Laser Picking Demo".to_string(),
            quit_key: KeyCode::Q,
            frame_error_policy: FrameErrorPolicy::default(),
        }
    }

    /// Set the media directory
    pub fn with_media_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.media_path = path.into();
        self
    }

    /// Set windowed or full screen mode
    pub fn with_screen(mut self, screen: ScreenMode) -> Self {
        self.screen = screen;
        self
    }

    /// Run in a window of the given size
    pub fn windowed(self, width: u32, height: u32) -> Self {
        self.with_screen(ScreenMode::Windowed(WindowParams::new(
            WindowWidth::new(width),
            WindowHeight::new(height),
        )))
    }

    /// Set stencil buffer and vertical sync
    pub fn with_buffers(mut self, stencil: StencilBuffer, vsync: VerticalSync) -> Self {
        self.stencil_buffer = stencil;
        self.vsync = vsync;
        self
    }

    /// Set the device type
    pub fn with_device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = device_type;
        self
    }

    /// Set the window title
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    /// Set the quit key
    pub fn with_quit_key(mut self, key: KeyCode) -> Self {
        self.quit_key = key;
        self
    }

    /// Set the frame error policy
    pub fn with_frame_error_policy(mut self, policy: FrameErrorPolicy) -> Self {
        self.frame_error_policy = policy;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let window = self.screen.window();
        if window.width.get() == 0 || window.height.get() == 0 {
            return Err(ConfigError::Invalid(format!(
                "screen size {}x{} must not be empty",
                window.width, window.height
            )));
        }
        if self.media_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("media path must not be empty".to_string()));
        }
        Ok(())
    }

    /// Device creation parameters derived from this configuration
    pub const fn device_params(&self) -> DeviceParams {
        let (window, bits_per_pixel, full_screen) = match self.screen {
            ScreenMode::Windowed(window) => (window, WINDOWED_BITS_PER_PIXEL, false),
            ScreenMode::FullScreen(full) => (full.window, full.bpp.bits(), true),
        };
        DeviceParams {
            device_type: self.device_type,
            width: window.width.get(),
            height: window.height.get(),
            bits_per_pixel,
            full_screen,
            stencil_buffer: self.stencil_buffer.get(),
            vsync: self.vsync.get(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for EngineConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        let params = config.device_params();

        assert_eq!(params.device_type, DeviceType::Software);
        assert_eq!((params.width, params.height), (640, 480));
        assert!(!params.full_screen);
        assert!(params.stencil_buffer);
        assert!(params.vsync);
        assert_eq!(config.quit_key, KeyCode::Q);
        assert_eq!(config.frame_error_policy, FrameErrorPolicy::Skip);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_screen_params() {
        let config = EngineConfig::new()
            .with_screen(ScreenMode::FullScreen(FullScreenParams {
                window: WindowParams::new(WindowWidth::new(1920), WindowHeight::new(1080)),
                bpp: BitsPerPixel::Bpp32,
            }))
            .with_buffers(StencilBuffer::new(false), VerticalSync::new(false))
            .with_device_type(DeviceType::OpenGl);
        let params = config.device_params();

        assert!(params.full_screen);
        assert_eq!(params.bits_per_pixel, 32);
        assert_eq!((params.width, params.height), (1920, 1080));
        assert!(!params.stencil_buffer);
        assert!(!params.vsync);
        assert_eq!(params.device_type, DeviceType::OpenGl);
    }

    #[test]
    fn test_validation_rejects_empty_window() {
        let config = EngineConfig::new().windowed(0, 480);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_round_trip_toml_and_ron() {
        let config = EngineConfig::new()
            .windowed(800, 600)
            .with_media_path("/opt/irrlicht/media")
            .with_quit_key(KeyCode::Escape)
            .with_frame_error_policy(FrameErrorPolicy::Stop);

        for format in [ConfigFormat::Toml, ConfigFormat::Ron] {
            let text = format.render(&config).unwrap();
            let parsed: EngineConfig = format.parse(&text).unwrap();
            assert_eq!(parsed, config);
        }
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: EngineConfig = ConfigFormat::Toml
            .parse("media_path = \"assets\"\ndevice_type = \"Null\"\n")
            .unwrap();

        assert_eq!(parsed.media_path, PathBuf::from("assets"));
        assert_eq!(parsed.device_type, DeviceType::Null);
        assert_eq!(parsed.screen, ScreenMode::default());
    }
}
