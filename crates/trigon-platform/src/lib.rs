// SPDX-License-Identifier: CEPL-1.0
//! Window and input collaborator for the presentation loop.
//!
//! The renderer only ever sees a window handle and a polled close flag; this
//! crate owns how those are produced from winit.
#![deny(unsafe_op_in_unsafe_fn)]

pub use winit;

use tracing::info;
use winit::dpi::PhysicalSize;
use winit::event::ElementState;
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowAttributes;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowSpec {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowSpec {
    fn default() -> Self {
        WindowSpec {
            width: 800,
            height: 600,
            title: "Trigon".to_string(),
        }
    }
}

impl WindowSpec {
    /// Window attributes for this spec. The window opens without stealing
    /// focus.
    pub fn attributes(&self) -> WindowAttributes {
        WindowAttributes::default()
            .with_title(self.title.clone())
            .with_inner_size(PhysicalSize::new(self.width.max(1), self.height.max(1)))
            .with_active(false)
    }
}

/// Close request raised by input or the window system, polled once per loop
/// iteration.
#[derive(Debug, Default)]
pub struct CloseSignal {
    requested: bool,
}

impl CloseSignal {
    pub fn request(&mut self) {
        self.requested = true;
    }

    pub fn should_close(&self) -> bool {
        self.requested
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyResponse {
    RequestClose,
    Logged,
    Ignored,
}

/// Escape press asks the loop to close; any other key release is logged.
pub fn handle_key(signal: &mut CloseSignal, key: &Key, state: ElementState) -> KeyResponse {
    match (key, state) {
        (Key::Named(NamedKey::Escape), ElementState::Pressed) => {
            signal.request();
            KeyResponse::RequestClose
        }
        (_, ElementState::Released) => {
            info!("key released: {key:?}");
            KeyResponse::Logged
        }
        _ => KeyResponse::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::keyboard::SmolStr;

    #[test]
    fn escape_press_requests_close() {
        let mut signal = CloseSignal::default();
        let r = handle_key(
            &mut signal,
            &Key::Named(NamedKey::Escape),
            ElementState::Pressed,
        );
        assert_eq!(r, KeyResponse::RequestClose);
        assert!(signal.should_close());
    }

    #[test]
    fn escape_release_is_only_logged() {
        let mut signal = CloseSignal::default();
        let r = handle_key(
            &mut signal,
            &Key::Named(NamedKey::Escape),
            ElementState::Released,
        );
        assert_eq!(r, KeyResponse::Logged);
        assert!(!signal.should_close());
    }

    #[test]
    fn other_keys_never_close() {
        let mut signal = CloseSignal::default();
        let a = Key::Character(SmolStr::new("a"));
        assert_eq!(
            handle_key(&mut signal, &a, ElementState::Pressed),
            KeyResponse::Ignored
        );
        assert_eq!(
            handle_key(&mut signal, &a, ElementState::Released),
            KeyResponse::Logged
        );
        assert!(!signal.should_close());
    }

    #[test]
    fn default_spec_matches_classic_window() {
        let spec = WindowSpec::default();
        assert_eq!((spec.width, spec.height), (800, 600));
    }
}
