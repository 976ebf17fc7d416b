// SPDX-License-Identifier: CEPL-1.0
//! Physical device selection.
//!
//! First match in driver enumeration order wins. There is no scoring: a
//! device either passes every check or is skipped.

use std::collections::BTreeSet;
use std::fmt;

use ash::prelude::VkResult;
use ash::vk;
use tracing::{debug, info, warn};

use crate::driver::Driver;
use crate::error::{ChainError, ChainResult};
use crate::probe::{self, SwapchainSupport};

#[derive(Clone, Debug)]
pub struct DeviceRequirements {
    pub extensions: Vec<String>,
}

impl Default for DeviceRequirements {
    fn default() -> Self {
        DeviceRequirements {
            extensions: vec![ash::khr::swapchain::NAME.to_string_lossy().into_owned()],
        }
    }
}

/// A device that passed selection, with the facts that got it there.
#[derive(Clone, Debug)]
pub struct PhysicalDeviceDescriptor {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub queue_family: u32,
    pub extensions: BTreeSet<String>,
    pub support: SwapchainSupport,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    NoQueueFamily,
    MissingExtensions,
    InadequateSwapchain,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Rejection::NoQueueFamily => "no queue family with graphics and present support",
            Rejection::MissingExtensions => "required device extensions unsupported",
            Rejection::InadequateSwapchain => "no surface formats or present modes",
        })
    }
}

/// Facts gathered for one candidate. `support` stays `None` until the
/// earlier checks pass.
#[derive(Clone, Debug, Default)]
pub struct Candidate {
    pub queue_family: Option<u32>,
    pub extensions: BTreeSet<String>,
    pub support: Option<SwapchainSupport>,
}

/// Queue family first, then extensions, then swapchain support. Returns
/// the queue family on success.
pub fn check(candidate: &Candidate, required: &[String]) -> Result<u32, Rejection> {
    let family = candidate.queue_family.ok_or(Rejection::NoQueueFamily)?;
    if !probe::missing(required, &candidate.extensions).is_empty() {
        return Err(Rejection::MissingExtensions);
    }
    match &candidate.support {
        Some(support) if support.is_adequate() => Ok(family),
        _ => Err(Rejection::InadequateSwapchain),
    }
}

pub fn is_suitable(candidate: &Candidate, required: &[String]) -> bool {
    check(candidate, required).is_ok()
}

fn gather(
    driver: &dyn Driver,
    physical: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    required: &[String],
) -> VkResult<Candidate> {
    let mut candidate = Candidate {
        queue_family: probe::find_queue_family(driver, physical, surface)?,
        ..Default::default()
    };
    if candidate.queue_family.is_none() {
        return Ok(candidate);
    }
    candidate.extensions = probe::supported_device_extensions(driver, physical)?;
    if !probe::missing(required, &candidate.extensions).is_empty() {
        return Ok(candidate);
    }
    // surface queries are only meaningful once swapchain support is known
    candidate.support = Some(probe::swapchain_support(driver, physical, surface)?);
    Ok(candidate)
}

pub fn pick(
    driver: &dyn Driver,
    surface: vk::SurfaceKHR,
    requirements: &DeviceRequirements,
) -> ChainResult<PhysicalDeviceDescriptor> {
    let devices = driver.physical_devices().unwrap_or_else(|e| {
        warn!("physical device enumeration failed: {e}");
        Vec::new()
    });
    debug!("{} physical device(s) reported", devices.len());

    for handle in devices {
        let name = driver.device_name(handle);
        let candidate = match gather(driver, handle, surface, &requirements.extensions) {
            Ok(c) => c,
            Err(e) => {
                warn!("skipping {name}: query failed ({e})");
                continue;
            }
        };
        match check(&candidate, &requirements.extensions) {
            Ok(queue_family) => {
                info!("selected {name} (queue family {queue_family})");
                return Ok(PhysicalDeviceDescriptor {
                    handle,
                    name,
                    queue_family,
                    extensions: candidate.extensions,
                    support: candidate.support.unwrap_or_default(),
                });
            }
            Err(why) => debug!("rejected {name}: {why}"),
        }
    }
    Err(ChainError::NoSuitableDevice)
}
