// SPDX-License-Identifier: CEPL-1.0
//! Swapchain parameter selection from driver-reported capability lists.
//!
//! Everything here is pure: identical input (including list order) gives
//! identical output.

use ash::vk;
use trigon_render::RenderSize;

use crate::error::{ChainError, ChainResult};
use crate::probe::SwapchainSupport;

/// `current_extent` value meaning the application picks the size.
pub const SURFACE_DECIDES: u32 = u32::MAX;

/// Present mode every conforming implementation supports.
pub const GUARANTEED_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::FIFO;

#[derive(Clone, Copy, Debug)]
pub struct SwapchainPreferences {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
}

impl Default for SwapchainPreferences {
    fn default() -> Self {
        SwapchainPreferences {
            format: vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            present_mode: vk::PresentModeKHR::MAILBOX,
        }
    }
}

/// Negotiated swapchain parameters. Independent of any handle.
#[derive(Clone, Copy, Debug)]
pub struct SwapchainConfig {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainConfig {
    pub fn negotiate(
        support: &SwapchainSupport,
        prefs: &SwapchainPreferences,
        requested: RenderSize,
    ) -> ChainResult<Self> {
        let format = choose_surface_format(&support.formats, prefs.format).ok_or_else(|| {
            ChainError::MissingFeature("surface reports no formats".to_string())
        })?;
        if support.present_modes.is_empty() {
            return Err(ChainError::MissingFeature(
                "surface reports no present modes".to_string(),
            ));
        }
        let caps = &support.capabilities;
        Ok(SwapchainConfig {
            format,
            present_mode: choose_present_mode(&support.present_modes, prefs.present_mode),
            extent: choose_extent(caps, requested),
            image_count: choose_image_count(caps),
            pre_transform: caps.current_transform,
        })
    }
}

/// Exact (format, color space) match on `preferred`, else the first
/// reported entry. `None` only for an empty list.
pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
    preferred: vk::SurfaceFormatKHR,
) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| f.format == preferred.format && f.color_space == preferred.color_space)
        .or_else(|| formats.first().copied())
}

pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    if modes.contains(&preferred) {
        preferred
    } else {
        GUARANTEED_PRESENT_MODE
    }
}

pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != SURFACE_DECIDES {
        return caps.current_extent;
    }
    // a broken report may have min > max
    vk::Extent2D {
        width: want
            .width
            .max(caps.min_image_extent.width)
            .min(caps.max_image_extent.width),
        height: want
            .height
            .max(caps.min_image_extent.height)
            .min(caps.max_image_extent.height),
    }
}

/// One more than the minimum, capped by the maximum unless it is 0
/// (unbounded).
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = caps.min_image_count.saturating_add(1);
    if caps.max_image_count == 0 {
        count
    } else {
        count.min(caps.max_image_count)
    }
}
