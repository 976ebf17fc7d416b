// SPDX-License-Identifier: CEPL-1.0
//! Recording driver for tests. Hands out unique handles, logs every call
//! that creates, releases or records, and can fail a chosen creation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use ash::prelude::VkResult;
use ash::vk::{self, Handle};

use trigon_render::{ShaderError, ShaderSource};

use crate::driver::{DeviceRequest, Driver, InstanceRequest, PipelineRequest, RenderPassBegin};
use crate::error::Resource;
use crate::negotiate::{SwapchainConfig, SURFACE_DECIDES};

pub const SWAPCHAIN_EXT: &str = "VK_KHR_swapchain";

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Create(Resource, u64),
    Destroy(Resource, u64),
    WaitIdle,
    Begin(u64),
    BeginRenderPass {
        buffer: u64,
        render_pass: u64,
        framebuffer: u64,
        extent: (u32, u32),
        clear: [f32; 4],
    },
    BindPipeline {
        buffer: u64,
        pipeline: u64,
    },
    Draw {
        buffer: u64,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    EndRenderPass(u64),
    End(u64),
}

#[derive(Clone, Debug, Default)]
pub struct CallLog(Rc<RefCell<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        self.0.borrow_mut().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().clone()
    }

    pub fn created(&self) -> Vec<(Resource, u64)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create(r, h) => Some((r, h)),
                _ => None,
            })
            .collect()
    }

    pub fn destroyed(&self) -> Vec<(Resource, u64)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Destroy(r, h) => Some((r, h)),
                _ => None,
            })
            .collect()
    }

    /// Commands recorded into `buffer`, in order.
    pub fn recorded(&self, buffer: u64) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| match c {
                Call::Begin(b) | Call::EndRenderPass(b) | Call::End(b) => *b == buffer,
                Call::BeginRenderPass { buffer: b, .. }
                | Call::BindPipeline { buffer: b, .. }
                | Call::Draw { buffer: b, .. } => *b == buffer,
                _ => false,
            })
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct MockDevice {
    pub name: String,
    /// (flags, can present to the surface)
    pub queue_families: Vec<(vk::QueueFlags, bool)>,
    pub extensions: Vec<String>,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl MockDevice {
    pub fn suitable(name: &str) -> Self {
        MockDevice {
            name: name.to_string(),
            queue_families: vec![(vk::QueueFlags::GRAPHICS, true)],
            extensions: vec![SWAPCHAIN_EXT.to_string()],
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 8,
                current_extent: vk::Extent2D {
                    width: SURFACE_DECIDES,
                    height: SURFACE_DECIDES,
                },
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        }
    }
}

/// Shader blobs held in memory, keyed by resource name.
#[derive(Clone, Debug, Default)]
pub struct MemoryShaders(pub HashMap<String, Vec<u8>>);

impl MemoryShaders {
    /// Both stages present, with lengths that need padding.
    pub fn triangle() -> Self {
        let mut map = HashMap::new();
        map.insert("vert.spv".to_string(), vec![0x03, 0x02, 0x23, 0x07, 0x01]);
        map.insert("frag.spv".to_string(), vec![0x03, 0x02, 0x23, 0x07, 0x02, 0x02]);
        MemoryShaders(map)
    }
}

impl ShaderSource for MemoryShaders {
    fn read(&self, name: &str) -> Result<Vec<u8>, ShaderError> {
        self.0.get(name).cloned().ok_or_else(|| ShaderError::NotFound {
            name: name.to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

const PHYSICAL_BASE: u64 = 0x1000;

pub struct MockDriver {
    pub devices: Vec<MockDevice>,
    pub layers: Vec<String>,
    pub instance_extensions: Vec<String>,
    /// `None` simulates a window system with no presentation support.
    pub required_extensions: Option<Vec<String>>,
    log: CallLog,
    next_handle: u64,
    attempts: HashMap<Resource, usize>,
    fail_at: Option<(Resource, usize)>,
    image_count: u32,
}

impl MockDriver {
    pub fn new(devices: Vec<MockDevice>) -> Self {
        let required = vec!["VK_KHR_surface".to_string()];
        MockDriver {
            devices,
            layers: Vec::new(),
            instance_extensions: required.clone(),
            required_extensions: Some(required),
            log: CallLog::default(),
            next_handle: 1,
            attempts: HashMap::new(),
            fail_at: None,
            image_count: 0,
        }
    }

    /// Fail the `nth` (zero-based) attempt to create `resource`.
    pub fn fail_on(mut self, resource: Resource, nth: usize) -> Self {
        self.fail_at = Some((resource, nth));
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    fn device(&self, physical: vk::PhysicalDevice) -> VkResult<&MockDevice> {
        physical
            .as_raw()
            .checked_sub(PHYSICAL_BASE)
            .and_then(|i| self.devices.get(i as usize))
            .ok_or(vk::Result::ERROR_DEVICE_LOST)
    }

    fn create<H: Handle>(&mut self, resource: Resource) -> VkResult<H> {
        let attempt = self.attempts.entry(resource).or_insert(0);
        let nth = *attempt;
        *attempt += 1;
        if self.fail_at == Some((resource, nth)) {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        let raw = self.next_handle;
        self.next_handle += 1;
        self.log.push(Call::Create(resource, raw));
        Ok(H::from_raw(raw))
    }

    fn destroy<H: Handle>(&self, resource: Resource, handle: H) {
        self.log.push(Call::Destroy(resource, handle.as_raw()));
    }
}

impl Driver for MockDriver {
    fn required_instance_extensions(&self) -> VkResult<Vec<String>> {
        self.required_extensions
            .clone()
            .ok_or(vk::Result::ERROR_EXTENSION_NOT_PRESENT)
    }

    fn instance_layers(&self) -> VkResult<Vec<String>> {
        Ok(self.layers.clone())
    }

    fn instance_extensions(&self) -> VkResult<Vec<String>> {
        Ok(self.instance_extensions.clone())
    }

    fn create_instance(&mut self, _request: &InstanceRequest<'_>) -> VkResult<vk::Instance> {
        self.create(Resource::Instance)
    }

    fn destroy_instance(&mut self, instance: vk::Instance) {
        self.destroy(Resource::Instance, instance);
    }

    fn create_surface(&mut self, _instance: vk::Instance) -> VkResult<vk::SurfaceKHR> {
        self.create(Resource::Surface)
    }

    fn destroy_surface(&mut self, surface: vk::SurfaceKHR) {
        self.destroy(Resource::Surface, surface);
    }

    fn physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        Ok((0..self.devices.len() as u64)
            .map(|i| vk::PhysicalDevice::from_raw(PHYSICAL_BASE + i))
            .collect())
    }

    fn device_name(&self, physical: vk::PhysicalDevice) -> String {
        self.device(physical)
            .map(|d| d.name.clone())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    fn queue_families(
        &self,
        physical: vk::PhysicalDevice,
    ) -> VkResult<Vec<vk::QueueFamilyProperties>> {
        Ok(self
            .device(physical)?
            .queue_families
            .iter()
            .map(|&(queue_flags, _)| vk::QueueFamilyProperties {
                queue_flags,
                queue_count: 1,
                ..Default::default()
            })
            .collect())
    }

    fn surface_support(
        &self,
        physical: vk::PhysicalDevice,
        family: u32,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        Ok(self
            .device(physical)?
            .queue_families
            .get(family as usize)
            .is_some_and(|&(_, present)| present))
    }

    fn device_extensions(&self, physical: vk::PhysicalDevice) -> VkResult<Vec<String>> {
        Ok(self.device(physical)?.extensions.clone())
    }

    fn surface_capabilities(
        &self,
        physical: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        Ok(self.device(physical)?.capabilities)
    }

    fn surface_formats(
        &self,
        physical: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(self.device(physical)?.formats.clone())
    }

    fn present_modes(
        &self,
        physical: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        Ok(self.device(physical)?.present_modes.clone())
    }

    fn create_device(&mut self, request: &DeviceRequest<'_>) -> VkResult<vk::Device> {
        self.device(request.physical)?;
        self.create(Resource::Device)
    }

    fn device_queue(&self, family: u32, index: u32) -> VkResult<vk::Queue> {
        Ok(vk::Queue::from_raw(0x100 + u64::from(family) * 16 + u64::from(index)))
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        self.log.push(Call::WaitIdle);
        Ok(())
    }

    fn destroy_device(&mut self, device: vk::Device) {
        self.destroy(Resource::Device, device);
    }

    fn create_swapchain(
        &mut self,
        _surface: vk::SurfaceKHR,
        config: &SwapchainConfig,
    ) -> VkResult<vk::SwapchainKHR> {
        let swapchain = self.create(Resource::Swapchain)?;
        self.image_count = config.image_count;
        Ok(swapchain)
    }

    fn swapchain_images(&self, _swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        Ok((0..u64::from(self.image_count))
            .map(|i| vk::Image::from_raw(0x8000 + i))
            .collect())
    }

    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR) {
        self.destroy(Resource::Swapchain, swapchain);
    }

    fn create_image_view(
        &mut self,
        _image: vk::Image,
        _format: vk::Format,
    ) -> VkResult<vk::ImageView> {
        self.create(Resource::ImageView)
    }

    fn destroy_image_view(&mut self, view: vk::ImageView) {
        self.destroy(Resource::ImageView, view);
    }

    fn create_render_pass(&mut self, _format: vk::Format) -> VkResult<vk::RenderPass> {
        self.create(Resource::RenderPass)
    }

    fn destroy_render_pass(&mut self, render_pass: vk::RenderPass) {
        self.destroy(Resource::RenderPass, render_pass);
    }

    fn create_shader_module(&mut self, code: &[u32]) -> VkResult<vk::ShaderModule> {
        if code.is_empty() {
            return Err(vk::Result::ERROR_INVALID_SHADER_NV);
        }
        self.create(Resource::ShaderModule)
    }

    fn destroy_shader_module(&mut self, module: vk::ShaderModule) {
        self.destroy(Resource::ShaderModule, module);
    }

    fn create_pipeline_layout(&mut self) -> VkResult<vk::PipelineLayout> {
        self.create(Resource::PipelineLayout)
    }

    fn destroy_pipeline_layout(&mut self, layout: vk::PipelineLayout) {
        self.destroy(Resource::PipelineLayout, layout);
    }

    fn create_graphics_pipeline(&mut self, _request: &PipelineRequest) -> VkResult<vk::Pipeline> {
        self.create(Resource::Pipeline)
    }

    fn destroy_pipeline(&mut self, pipeline: vk::Pipeline) {
        self.destroy(Resource::Pipeline, pipeline);
    }

    fn create_framebuffer(
        &mut self,
        _render_pass: vk::RenderPass,
        _view: vk::ImageView,
        _extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer> {
        self.create(Resource::Framebuffer)
    }

    fn destroy_framebuffer(&mut self, framebuffer: vk::Framebuffer) {
        self.destroy(Resource::Framebuffer, framebuffer);
    }

    fn create_command_pool(&mut self, _family: u32) -> VkResult<vk::CommandPool> {
        self.create(Resource::CommandPool)
    }

    fn destroy_command_pool(&mut self, pool: vk::CommandPool) {
        self.destroy(Resource::CommandPool, pool);
    }

    fn allocate_command_buffers(
        &mut self,
        _pool: vk::CommandPool,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        // one allocation call, one failure point
        let first: vk::CommandBuffer = self.create(Resource::CommandBuffers)?;
        let mut buffers = vec![first];
        while buffers.len() < count as usize {
            let raw = self.next_handle;
            self.next_handle += 1;
            self.log.push(Call::Create(Resource::CommandBuffers, raw));
            buffers.push(vk::CommandBuffer::from_raw(raw));
        }
        Ok(buffers)
    }

    fn free_command_buffers(&mut self, _pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        // logged newest first so a batch free reads like individual releases
        for &b in buffers.iter().rev() {
            self.destroy(Resource::CommandBuffers, b);
        }
    }

    fn begin_command_buffer(&mut self, buffer: vk::CommandBuffer) -> VkResult<()> {
        let attempt = self.attempts.entry(Resource::CommandRecording).or_insert(0);
        let nth = *attempt;
        *attempt += 1;
        if self.fail_at == Some((Resource::CommandRecording, nth)) {
            return Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        }
        self.log.push(Call::Begin(buffer.as_raw()));
        Ok(())
    }

    fn cmd_begin_render_pass(&mut self, buffer: vk::CommandBuffer, begin: &RenderPassBegin) {
        self.log.push(Call::BeginRenderPass {
            buffer: buffer.as_raw(),
            render_pass: begin.render_pass.as_raw(),
            framebuffer: begin.framebuffer.as_raw(),
            extent: (begin.extent.width, begin.extent.height),
            clear: begin.clear,
        });
    }

    fn cmd_bind_pipeline(&mut self, buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.log.push(Call::BindPipeline {
            buffer: buffer.as_raw(),
            pipeline: pipeline.as_raw(),
        });
    }

    fn cmd_draw(
        &mut self,
        buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        self.log.push(Call::Draw {
            buffer: buffer.as_raw(),
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        });
    }

    fn cmd_end_render_pass(&mut self, buffer: vk::CommandBuffer) {
        self.log.push(Call::EndRenderPass(buffer.as_raw()));
    }

    fn end_command_buffer(&mut self, buffer: vk::CommandBuffer) -> VkResult<()> {
        self.log.push(Call::End(buffer.as_raw()));
        Ok(())
    }
}
