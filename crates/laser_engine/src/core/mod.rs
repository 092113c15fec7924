//! # Core Engine Module
//!
//! Shared configuration types used to bring the engine up.

pub mod config;

pub use config::{
    BitsPerPixel, Config, ConfigError, DeviceType, EngineConfig, FrameErrorPolicy, FullScreenParams, ScreenMode,
    StencilBuffer, VerticalSync, WindowHeight, WindowParams, WindowWidth,
};
