// SPDX-License-Identifier: CEPL-1.0
//! SPIR-V blobs resolved by name.
//!
//! Bytecode is never inspected here. The only guarantee made about the
//! contents is that the length is a multiple of four; anything shorter is
//! padded with zero bytes, and the padding is part of the binary.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("shader resource `{name}` could not be opened")]
    NotFound {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("short read on shader resource `{name}`: got {actual} of {expected} bytes")]
    ShortRead {
        name: String,
        expected: u64,
        actual: u64,
    },

    #[error("shader resource `{name}` is empty")]
    Empty { name: String },

    #[error("I/O error reading shader resource `{name}`")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

impl ShaderError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ShaderError::NotFound { .. })
    }
}

/// Where named shader blobs come from.
pub trait ShaderSource {
    /// Raw bytes of `name`, exactly as stored.
    fn read(&self, name: &str) -> Result<Vec<u8>, ShaderError>;

    /// Human-readable origin, for logs.
    fn describe(&self) -> String;
}

/// Files in a directory, one per resource name.
#[derive(Clone, Debug)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirSource { root: root.into() }
    }

    /// `dir` resolved against the directory holding the running executable.
    /// Absolute paths are kept as they are.
    pub fn beside_executable(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        if dir.is_absolute() {
            return DirSource::new(dir);
        }
        let base = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        DirSource::new(base.join(dir))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ShaderSource for DirSource {
    fn read(&self, name: &str) -> Result<Vec<u8>, ShaderError> {
        let path = self.root.join(name);
        let file = File::open(&path).map_err(|source| ShaderError::NotFound {
            name: name.to_string(),
            source,
        })?;
        let expected = file
            .metadata()
            .map_err(|source| ShaderError::Io {
                name: name.to_string(),
                source,
            })?
            .len();

        let bytes = read_len(file, name, expected)?;
        let actual = bytes.len();
        debug!("read {actual} bytes from {}", path.display());
        Ok(bytes)
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// Read exactly `expected` bytes from `reader`. Fewer is a `ShortRead`.
pub fn read_len(reader: impl Read, name: &str, expected: u64) -> Result<Vec<u8>, ShaderError> {
    let mut bytes = Vec::with_capacity(expected as usize);
    reader
        .take(expected)
        .read_to_end(&mut bytes)
        .map_err(|source| ShaderError::Io {
            name: name.to_string(),
            source,
        })?;
    let actual = bytes.len() as u64;
    if actual < expected {
        return Err(ShaderError::ShortRead {
            name: name.to_string(),
            expected,
            actual,
        });
    }
    Ok(bytes)
}

/// A loaded shader, length padded to a whole number of 32-bit words.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderBinary {
    name: String,
    bytes: Vec<u8>,
    original_len: usize,
}

impl ShaderBinary {
    pub fn from_bytes(name: impl Into<String>, mut bytes: Vec<u8>) -> Self {
        let original_len = bytes.len();
        bytes.resize(original_len.next_multiple_of(4), 0);
        ShaderBinary {
            name: name.into(),
            bytes,
            original_len,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Padded bytes. This, not `original_len`, is the code size.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn original_len(&self) -> usize {
        self.original_len
    }

    /// Code as native-endian words, ready for module creation.
    pub fn words(&self) -> Vec<u32> {
        bytemuck::pod_collect_to_vec(self.bytes.as_slice())
    }
}

pub fn load_shader(source: &dyn ShaderSource, name: &str) -> Result<ShaderBinary, ShaderError> {
    let bytes = source.read(name)?;
    if bytes.is_empty() {
        return Err(ShaderError::Empty {
            name: name.to_string(),
        });
    }
    let binary = ShaderBinary::from_bytes(name, bytes);
    if binary.len() != binary.original_len() {
        debug!(
            "padded `{name}` from {} to {} bytes",
            binary.original_len(),
            binary.len()
        );
    }
    Ok(binary)
}
