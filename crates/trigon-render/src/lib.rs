// SPDX-License-Identifier: CEPL-1.0
pub mod shader;

pub use shader::{load_shader, read_len, DirSource, ShaderBinary, ShaderError, ShaderSource};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

/// Linear RGBA clear value used for the single render pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClearColor(pub [f32; 4]);

impl Default for ClearColor {
    fn default() -> Self {
        ClearColor([0.02, 0.02, 0.04, 1.0])
    }
}
