//! Input events and the quit-detecting event receiver
//!
//! The backend translates native window events into [`InputEvent`]s; the
//! engine forwards each of them to its [`EventReceiver`], which only cares
//! about one thing: whether the configured quit key has been pressed.

use crate::foundation::counters::{CounterRegistry, InstanceCounter};
use serde::{Deserialize, Serialize};

/// Key codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    /// A key
    A,
    /// B key
    B,
    /// C key
    C,
    /// D key
    D,
    /// E key
    E,
    /// F key
    F,
    /// G key
    G,
    /// H key
    H,
    /// I key
    I,
    /// J key
    J,
    /// K key
    K,
    /// L key
    L,
    /// M key
    M,
    /// N key
    N,
    /// O key
    O,
    /// P key
    P,
    /// Q key
    Q,
    /// R key
    R,
    /// S key
    S,
    /// T key
    T,
    /// U key
    U,
    /// V key
    V,
    /// W key
    W,
    /// X key
    X,
    /// Y key
    Y,
    /// Z key
    Z,
    /// Space key
    Space,
    /// Enter key
    Enter,
    /// Escape key
    Escape,
    /// Up arrow
    Up,
    /// Down arrow
    Down,
    /// Left arrow
    Left,
    /// Right arrow
    Right,
}

/// Mouse buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    /// Left mouse button
    Left,
    /// Right mouse button
    Right,
    /// Middle mouse button
    Middle,
}

/// Window input delivered by the backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Key pressed or released
    Key {
        /// Which key
        key: KeyCode,
        /// `true` on press, `false` on release
        pressed: bool,
    },
    /// Mouse button pressed or released
    MouseButton {
        /// Which button
        button: MouseButton,
        /// `true` on press, `false` on release
        pressed: bool,
    },
    /// Cursor moved to a new window position
    MouseMoved {
        /// Horizontal position in pixels
        x: f64,
        /// Vertical position in pixels
        y: f64,
    },
}

impl InputEvent {
    /// Key press event
    pub const fn key_pressed(key: KeyCode) -> Self {
        Self::Key { key, pressed: true }
    }

    /// Key release event
    pub const fn key_released(key: KeyCode) -> Self {
        Self::Key { key, pressed: false }
    }
}

/// Watches the input stream for the quit key
///
/// Once the quit key has been pressed the receiver stays in the quit state;
/// the engine's main loop checks [`EventReceiver::quit`] once per cycle.
#[derive(Debug)]
pub struct EventReceiver {
    quit_key: KeyCode,
    quit: bool,
    _counter: InstanceCounter<Self>,
}

impl EventReceiver {
    /// Receiver accounted in the process-wide counter registry
    pub fn new(quit_key: KeyCode) -> Self {
        Self::new_in(quit_key, CounterRegistry::global())
    }

    /// Receiver accounted in `registry`
    pub fn new_in(quit_key: KeyCode, registry: &CounterRegistry) -> Self {
        Self {
            quit_key,
            quit: false,
            _counter: InstanceCounter::new_in(registry),
        }
    }

    /// Inspect one event
    ///
    /// Always returns `false`: the event is never consumed, so the backend
    /// keeps forwarding it to the camera and the GUI.
    pub fn on_event(&mut self, event: &InputEvent) -> bool {
        if let InputEvent::Key { key, pressed: true } = *event {
            if key == self.quit_key && !self.quit {
                log::info!("Quit key {key:?} pressed");
                self.quit = true;
            }
        }
        false
    }

    /// Whether the quit key has been pressed
    pub const fn quit(&self) -> bool {
        self.quit
    }

    /// Key that ends the main loop
    pub const fn quit_key(&self) -> KeyCode {
        self.quit_key
    }
}
