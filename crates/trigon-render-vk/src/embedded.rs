// SPDX-License-Identifier: CEPL-1.0
use std::io;

use trigon_render::{ShaderError, ShaderSource};

static VERT_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/vert.spv"));
static FRAG_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/frag.spv"));

/// The triangle shaders compiled into the binary at build time, served under
/// the same names the on-disk layout uses.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmbeddedSource;

impl ShaderSource for EmbeddedSource {
    fn read(&self, name: &str) -> Result<Vec<u8>, ShaderError> {
        match name {
            "vert.spv" => Ok(VERT_SPV.to_vec()),
            "frag.spv" => Ok(FRAG_SPV.to_vec()),
            _ => Err(ShaderError::NotFound {
                name: name.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "not an embedded shader"),
            }),
        }
    }

    fn describe(&self) -> String {
        "embedded".to_string()
    }
}
