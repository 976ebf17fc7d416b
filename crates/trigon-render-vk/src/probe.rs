// SPDX-License-Identifier: CEPL-1.0
//! Read-only capability queries against the driver.

use std::collections::BTreeSet;

use ash::prelude::VkResult;
use ash::vk;
use tracing::warn;

use crate::driver::Driver;

/// What a device can do with a given surface.
#[derive(Clone, Debug, Default)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    /// Empty format or present-mode lists mean the device cannot present to
    /// the surface at all.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

pub fn supported_layers(driver: &dyn Driver) -> VkResult<BTreeSet<String>> {
    Ok(driver.instance_layers()?.into_iter().collect())
}

pub fn supported_instance_extensions(driver: &dyn Driver) -> VkResult<BTreeSet<String>> {
    Ok(driver.instance_extensions()?.into_iter().collect())
}

pub fn supported_device_extensions(
    driver: &dyn Driver,
    physical: vk::PhysicalDevice,
) -> VkResult<BTreeSet<String>> {
    Ok(driver.device_extensions(physical)?.into_iter().collect())
}

/// Requested layers the driver actually has. Missing ones are reported and
/// dropped; debug tooling is best effort.
pub fn available_layers(driver: &dyn Driver, requested: &[String]) -> Vec<String> {
    if requested.is_empty() {
        return Vec::new();
    }
    let supported = match supported_layers(driver) {
        Ok(s) => s,
        Err(e) => {
            warn!("could not enumerate instance layers ({e}); continuing without validation");
            return Vec::new();
        }
    };
    requested
        .iter()
        .filter(|name| {
            let present = supported.contains(name.as_str());
            if !present {
                warn!("validation layer {name} requested but not available");
            }
            present
        })
        .cloned()
        .collect()
}

/// Names from `required` absent in `supported`, in `required` order.
pub fn missing<'a>(required: &'a [String], supported: &BTreeSet<String>) -> Vec<&'a str> {
    required
        .iter()
        .filter(|name| !supported.contains(name.as_str()))
        .map(String::as_str)
        .collect()
}

pub fn swapchain_support(
    driver: &dyn Driver,
    physical: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> VkResult<SwapchainSupport> {
    Ok(SwapchainSupport {
        capabilities: driver.surface_capabilities(physical, surface)?,
        formats: driver.surface_formats(physical, surface)?,
        present_modes: driver.present_modes(physical, surface)?,
    })
}

/// First queue family that can both draw and present to `surface`.
pub fn find_queue_family(
    driver: &dyn Driver,
    physical: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> VkResult<Option<u32>> {
    for (index, family) in driver.queue_families(physical)?.iter().enumerate() {
        let index = index as u32;
        if family.queue_count == 0 || !family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            continue;
        }
        if driver.surface_support(physical, index, surface)? {
            return Ok(Some(index));
        }
    }
    Ok(None)
}
