// SPDX-License-Identifier: CEPL-1.0
//! Vulkan bootstrap: instance through recorded command buffers, built and
//! released as one ordered chain.
#![deny(unsafe_op_in_unsafe_fn)]

mod ash_driver;
mod chain;
mod driver;
mod embedded;
mod error;
mod negotiate;
mod probe;
mod record;
mod select;

#[cfg(test)]
mod mock;

pub use ash::vk;
pub use ash_driver::AshDriver;
pub use chain::{ChainConfig, ChainState, ResourceChain, VALIDATION_LAYER};
pub use driver::{DeviceRequest, Driver, InstanceRequest, PipelineRequest, RenderPassBegin};
pub use embedded::EmbeddedSource;
pub use error::{ChainError, ChainResult, Resource};
pub use negotiate::{
    choose_extent, choose_image_count, choose_present_mode, choose_surface_format,
    SwapchainConfig, SwapchainPreferences, GUARANTEED_PRESENT_MODE, SURFACE_DECIDES,
};
pub use probe::SwapchainSupport;
pub use record::{record_triangle, DrawTarget, TRIANGLE_VERTICES};
pub use select::{
    check, is_suitable, pick, Candidate, DeviceRequirements, PhysicalDeviceDescriptor, Rejection,
};
