// SPDX-License-Identifier: CEPL-1.0
//! The seam between the resource chain and the graphics driver.
//!
//! Methods mirror the Vulkan entry points the chain needs and deal only in
//! raw `vk` handle values. Dispatch tables and extension loaders stay inside
//! the implementation.

use ash::prelude::VkResult;
use ash::vk;

use crate::negotiate::SwapchainConfig;

#[derive(Clone, Debug)]
pub struct InstanceRequest<'a> {
    pub app_name: &'a str,
    pub engine_name: &'a str,
    pub api_version: u32,
    pub layers: &'a [String],
    pub extensions: &'a [String],
}

#[derive(Clone, Debug)]
pub struct DeviceRequest<'a> {
    pub physical: vk::PhysicalDevice,
    pub queue_family: u32,
    pub extensions: &'a [String],
    pub layers: &'a [String],
}

#[derive(Clone, Copy, Debug)]
pub struct PipelineRequest {
    pub render_pass: vk::RenderPass,
    pub layout: vk::PipelineLayout,
    pub vertex: vk::ShaderModule,
    pub fragment: vk::ShaderModule,
    pub extent: vk::Extent2D,
}

#[derive(Clone, Copy, Debug)]
pub struct RenderPassBegin {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub clear: [f32; 4],
}

pub trait Driver {
    // --- instance level ---
    /// Instance extensions the window system needs to present at all.
    fn required_instance_extensions(&self) -> VkResult<Vec<String>>;
    fn instance_layers(&self) -> VkResult<Vec<String>>;
    fn instance_extensions(&self) -> VkResult<Vec<String>>;
    fn create_instance(&mut self, request: &InstanceRequest<'_>) -> VkResult<vk::Instance>;
    fn destroy_instance(&mut self, instance: vk::Instance);

    fn create_surface(&mut self, instance: vk::Instance) -> VkResult<vk::SurfaceKHR>;
    fn destroy_surface(&mut self, surface: vk::SurfaceKHR);

    // --- physical device queries ---
    fn physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>>;
    fn device_name(&self, physical: vk::PhysicalDevice) -> String;
    fn queue_families(&self, physical: vk::PhysicalDevice)
        -> VkResult<Vec<vk::QueueFamilyProperties>>;
    fn surface_support(
        &self,
        physical: vk::PhysicalDevice,
        family: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool>;
    fn device_extensions(&self, physical: vk::PhysicalDevice) -> VkResult<Vec<String>>;
    fn surface_capabilities(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR>;
    fn surface_formats(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>>;
    fn present_modes(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>>;

    // --- device level ---
    fn create_device(&mut self, request: &DeviceRequest<'_>) -> VkResult<vk::Device>;
    fn device_queue(&self, family: u32, index: u32) -> VkResult<vk::Queue>;
    fn device_wait_idle(&self) -> VkResult<()>;
    fn destroy_device(&mut self, device: vk::Device);

    fn create_swapchain(
        &mut self,
        surface: vk::SurfaceKHR,
        config: &SwapchainConfig,
    ) -> VkResult<vk::SwapchainKHR>;
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;
    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR);

    fn create_image_view(&mut self, image: vk::Image, format: vk::Format)
        -> VkResult<vk::ImageView>;
    fn destroy_image_view(&mut self, view: vk::ImageView);

    fn create_render_pass(&mut self, format: vk::Format) -> VkResult<vk::RenderPass>;
    fn destroy_render_pass(&mut self, render_pass: vk::RenderPass);

    fn create_shader_module(&mut self, code: &[u32]) -> VkResult<vk::ShaderModule>;
    fn destroy_shader_module(&mut self, module: vk::ShaderModule);

    fn create_pipeline_layout(&mut self) -> VkResult<vk::PipelineLayout>;
    fn destroy_pipeline_layout(&mut self, layout: vk::PipelineLayout);

    fn create_graphics_pipeline(&mut self, request: &PipelineRequest) -> VkResult<vk::Pipeline>;
    fn destroy_pipeline(&mut self, pipeline: vk::Pipeline);

    fn create_framebuffer(
        &mut self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer>;
    fn destroy_framebuffer(&mut self, framebuffer: vk::Framebuffer);

    fn create_command_pool(&mut self, family: u32) -> VkResult<vk::CommandPool>;
    fn destroy_command_pool(&mut self, pool: vk::CommandPool);

    fn allocate_command_buffers(
        &mut self,
        pool: vk::CommandPool,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>>;
    fn free_command_buffers(&mut self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]);

    // --- recording ---
    fn begin_command_buffer(&mut self, buffer: vk::CommandBuffer) -> VkResult<()>;
    fn cmd_begin_render_pass(&mut self, buffer: vk::CommandBuffer, begin: &RenderPassBegin);
    fn cmd_bind_pipeline(&mut self, buffer: vk::CommandBuffer, pipeline: vk::Pipeline);
    fn cmd_draw(
        &mut self,
        buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );
    fn cmd_end_render_pass(&mut self, buffer: vk::CommandBuffer);
    fn end_command_buffer(&mut self, buffer: vk::CommandBuffer) -> VkResult<()>;
}
