// SPDX-License-Identifier: CEPL-1.0
use std::fmt;

use ash::vk;
use thiserror::Error;
use trigon_render::ShaderError;

use crate::chain::ChainState;

/// Driver objects the chain creates, named in errors and in release logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resource {
    Instance,
    Surface,
    Device,
    Queue,
    Swapchain,
    SwapchainImages,
    ImageView,
    RenderPass,
    ShaderModule,
    PipelineLayout,
    Pipeline,
    Framebuffer,
    CommandPool,
    CommandBuffers,
    CommandRecording,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Instance => "instance",
            Resource::Surface => "surface",
            Resource::Device => "logical device",
            Resource::Queue => "device queue",
            Resource::Swapchain => "swapchain",
            Resource::SwapchainImages => "swapchain images",
            Resource::ImageView => "image view",
            Resource::RenderPass => "render pass",
            Resource::ShaderModule => "shader module",
            Resource::PipelineLayout => "pipeline layout",
            Resource::Pipeline => "graphics pipeline",
            Resource::Framebuffer => "framebuffer",
            Resource::CommandPool => "command pool",
            Resource::CommandBuffers => "command buffers",
            Resource::CommandRecording => "command recording",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("presentation is not supported on this platform: {0}")]
    UnsupportedPlatform(String),

    #[error("required feature missing: {0}")]
    MissingFeature(String),

    #[error("no physical device satisfies the presentation requirements")]
    NoSuitableDevice,

    #[error("failed to create {resource}: {result}")]
    ResourceCreation {
        resource: Resource,
        result: vk::Result,
    },

    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error("`{op}` is not valid in state {state:?}")]
    InvalidTransition { state: ChainState, op: &'static str },
}

impl ChainError {
    pub(crate) fn creation(resource: Resource) -> impl FnOnce(vk::Result) -> ChainError {
        move |result| ChainError::ResourceCreation { resource, result }
    }

    /// Process exit code for this failure class. Zero is reserved for a
    /// graceful shutdown and one for failures outside the chain.
    pub fn exit_code(&self) -> u8 {
        match self {
            ChainError::UnsupportedPlatform(_) => 2,
            ChainError::MissingFeature(_) => 3,
            ChainError::NoSuitableDevice => 4,
            ChainError::ResourceCreation { .. } => 5,
            ChainError::Shader(e) if e.is_not_found() => 6,
            ChainError::Shader(_) => 7,
            ChainError::InvalidTransition { .. } => 8,
        }
    }
}

pub type ChainResult<T> = Result<T, ChainError>;
