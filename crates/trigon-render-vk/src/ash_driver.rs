// SPDX-License-Identifier: CEPL-1.0
//! `Driver` backed by the real Vulkan loader through ash.

use std::ffi::{c_char, CStr, CString};

use ash::khr::{surface, swapchain};
use ash::prelude::VkResult;
use ash::{vk, Entry};
use raw_window_handle::{
    HandleError, HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle,
};

use crate::driver::{DeviceRequest, Driver, InstanceRequest, PipelineRequest, RenderPassBegin};
use crate::negotiate::SwapchainConfig;

const SHADER_ENTRY: &CStr = c"main";

pub struct AshDriver {
    entry: Entry,
    display: RawDisplayHandle,
    window: RawWindowHandle,
    instance: Option<ash::Instance>,
    surface_loader: Option<surface::Instance>,
    device: Option<ash::Device>,
    swapchain_loader: Option<swapchain::Device>,
}

impl AshDriver {
    /// Capture the raw handles of `window` and bind the linked loader.
    ///
    /// # Safety
    /// `window` must outlive the returned driver and every surface created
    /// through it.
    pub unsafe fn from_window(
        window: &(impl HasWindowHandle + HasDisplayHandle),
    ) -> Result<Self, HandleError> {
        Ok(AshDriver {
            entry: Entry::linked(),
            display: window.display_handle()?.as_raw(),
            window: window.window_handle()?.as_raw(),
            instance: None,
            surface_loader: None,
            device: None,
            swapchain_loader: None,
        })
    }

    fn instance(&self) -> VkResult<&ash::Instance> {
        self.instance
            .as_ref()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn surface_loader(&self) -> VkResult<&surface::Instance> {
        self.surface_loader
            .as_ref()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn device(&self) -> VkResult<&ash::Device> {
        self.device
            .as_ref()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn swapchain_loader(&self) -> VkResult<&swapchain::Device> {
        self.swapchain_loader
            .as_ref()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }
}

fn c_strings(names: &[String]) -> VkResult<Vec<CString>> {
    names
        .iter()
        .map(|n| CString::new(n.as_str()).map_err(|_| vk::Result::ERROR_INITIALIZATION_FAILED))
        .collect()
}

fn pointers(names: &[CString]) -> Vec<*const c_char> {
    names.iter().map(|n| n.as_ptr()).collect()
}

fn owned(name: Result<&CStr, std::ffi::FromBytesUntilNulError>) -> Option<String> {
    name.ok().map(|s| s.to_string_lossy().into_owned())
}

impl Driver for AshDriver {
    fn required_instance_extensions(&self) -> VkResult<Vec<String>> {
        let names = ash_window::enumerate_required_extensions(self.display)?;
        Ok(names
            .iter()
            .map(|&p| unsafe { CStr::from_ptr(p) }.to_string_lossy().into_owned())
            .collect())
    }

    fn instance_layers(&self) -> VkResult<Vec<String>> {
        let props = unsafe { self.entry.enumerate_instance_layer_properties()? };
        Ok(props.iter().filter_map(|p| owned(p.layer_name_as_c_str())).collect())
    }

    fn instance_extensions(&self) -> VkResult<Vec<String>> {
        let props = unsafe { self.entry.enumerate_instance_extension_properties(None)? };
        Ok(props.iter().filter_map(|p| owned(p.extension_name_as_c_str())).collect())
    }

    fn create_instance(&mut self, request: &InstanceRequest<'_>) -> VkResult<vk::Instance> {
        let app_name = CString::new(request.app_name)
            .map_err(|_| vk::Result::ERROR_INITIALIZATION_FAILED)?;
        let engine_name = CString::new(request.engine_name)
            .map_err(|_| vk::Result::ERROR_INITIALIZATION_FAILED)?;
        let layers = c_strings(request.layers)?;
        let extensions = c_strings(request.extensions)?;
        let layer_ptrs = pointers(&layers);
        let ext_ptrs = pointers(&extensions);

        let app_info = vk::ApplicationInfo {
            s_type: vk::StructureType::APPLICATION_INFO,
            p_application_name: app_name.as_ptr(),
            application_version: vk::make_api_version(0, 1, 0, 0),
            p_engine_name: engine_name.as_ptr(),
            engine_version: vk::make_api_version(0, 1, 0, 0),
            api_version: request.api_version,
            ..Default::default()
        };
        let create_info = vk::InstanceCreateInfo {
            s_type: vk::StructureType::INSTANCE_CREATE_INFO,
            p_application_info: &app_info,
            enabled_layer_count: layer_ptrs.len() as u32,
            pp_enabled_layer_names: layer_ptrs.as_ptr(),
            enabled_extension_count: ext_ptrs.len() as u32,
            pp_enabled_extension_names: ext_ptrs.as_ptr(),
            ..Default::default()
        };

        let instance = unsafe { self.entry.create_instance(&create_info, None)? };
        let handle = instance.handle();
        self.surface_loader = Some(surface::Instance::new(&self.entry, &instance));
        self.instance = Some(instance);
        Ok(handle)
    }

    fn destroy_instance(&mut self, instance: vk::Instance) {
        if self.instance.as_ref().map(ash::Instance::handle) != Some(instance) {
            return;
        }
        self.surface_loader = None;
        if let Some(instance) = self.instance.take() {
            unsafe { instance.destroy_instance(None) };
        }
    }

    fn create_surface(&mut self, _instance: vk::Instance) -> VkResult<vk::SurfaceKHR> {
        let instance = self.instance()?;
        unsafe { ash_window::create_surface(&self.entry, instance, self.display, self.window, None) }
    }

    fn destroy_surface(&mut self, surface: vk::SurfaceKHR) {
        if let Ok(loader) = self.surface_loader() {
            unsafe { loader.destroy_surface(surface, None) };
        }
    }

    fn physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        unsafe { self.instance()?.enumerate_physical_devices() }
    }

    fn device_name(&self, physical: vk::PhysicalDevice) -> String {
        self.instance()
            .ok()
            .and_then(|i| {
                let props = unsafe { i.get_physical_device_properties(physical) };
                owned(props.device_name_as_c_str())
            })
            .unwrap_or_else(|| "<unnamed device>".to_string())
    }

    fn queue_families(
        &self,
        physical: vk::PhysicalDevice,
    ) -> VkResult<Vec<vk::QueueFamilyProperties>> {
        Ok(unsafe { self.instance()?.get_physical_device_queue_family_properties(physical) })
    }

    fn surface_support(
        &self,
        physical: vk::PhysicalDevice,
        family: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        unsafe {
            self.surface_loader()?
                .get_physical_device_surface_support(physical, family, surface)
        }
    }

    fn device_extensions(&self, physical: vk::PhysicalDevice) -> VkResult<Vec<String>> {
        let props = unsafe { self.instance()?.enumerate_device_extension_properties(physical)? };
        Ok(props.iter().filter_map(|p| owned(p.extension_name_as_c_str())).collect())
    }

    fn surface_capabilities(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.surface_loader()?
                .get_physical_device_surface_capabilities(physical, surface)
        }
    }

    fn surface_formats(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.surface_loader()?
                .get_physical_device_surface_formats(physical, surface)
        }
    }

    fn present_modes(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.surface_loader()?
                .get_physical_device_surface_present_modes(physical, surface)
        }
    }

    fn create_device(&mut self, request: &DeviceRequest<'_>) -> VkResult<vk::Device> {
        let instance = self.instance()?;
        let extensions = c_strings(request.extensions)?;
        let layers = c_strings(request.layers)?;
        let ext_ptrs = pointers(&extensions);
        let layer_ptrs = pointers(&layers);

        let priorities = [1.0_f32];
        let queue_info = vk::DeviceQueueCreateInfo {
            s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
            queue_family_index: request.queue_family,
            queue_count: 1,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        };
        let features = vk::PhysicalDeviceFeatures::default();
        // device layers are ignored by current loaders; older ones still read them
        let create_info = vk::DeviceCreateInfo {
            s_type: vk::StructureType::DEVICE_CREATE_INFO,
            queue_create_info_count: 1,
            p_queue_create_infos: &queue_info,
            enabled_extension_count: ext_ptrs.len() as u32,
            pp_enabled_extension_names: ext_ptrs.as_ptr(),
            enabled_layer_count: layer_ptrs.len() as u32,
            pp_enabled_layer_names: layer_ptrs.as_ptr(),
            p_enabled_features: &features,
            ..Default::default()
        };

        let device = unsafe { instance.create_device(request.physical, &create_info, None)? };
        let handle = device.handle();
        self.swapchain_loader = Some(swapchain::Device::new(instance, &device));
        self.device = Some(device);
        Ok(handle)
    }

    fn device_queue(&self, family: u32, index: u32) -> VkResult<vk::Queue> {
        Ok(unsafe { self.device()?.get_device_queue(family, index) })
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        unsafe { self.device()?.device_wait_idle() }
    }

    fn destroy_device(&mut self, device: vk::Device) {
        if self.device.as_ref().map(ash::Device::handle) != Some(device) {
            return;
        }
        self.swapchain_loader = None;
        if let Some(device) = self.device.take() {
            unsafe { device.destroy_device(None) };
        }
    }

    fn create_swapchain(
        &mut self,
        surface: vk::SurfaceKHR,
        config: &SwapchainConfig,
    ) -> VkResult<vk::SwapchainKHR> {
        let create_info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface,
            min_image_count: config.image_count,
            image_format: config.format.format,
            image_color_space: config.format.color_space,
            image_extent: config.extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            // graphics and present share one family
            image_sharing_mode: vk::SharingMode::EXCLUSIVE,
            pre_transform: config.pre_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode: config.present_mode,
            clipped: vk::TRUE,
            old_swapchain: vk::SwapchainKHR::null(),
            ..Default::default()
        };
        unsafe { self.swapchain_loader()?.create_swapchain(&create_info, None) }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        unsafe { self.swapchain_loader()?.get_swapchain_images(swapchain) }
    }

    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR) {
        if let Ok(loader) = self.swapchain_loader() {
            unsafe { loader.destroy_swapchain(swapchain, None) };
        }
    }

    fn create_image_view(
        &mut self,
        image: vk::Image,
        format: vk::Format,
    ) -> VkResult<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format,
            components: vk::ComponentMapping::default(),
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        unsafe { self.device()?.create_image_view(&create_info, None) }
    }

    fn destroy_image_view(&mut self, view: vk::ImageView) {
        if let Ok(d) = self.device() {
            unsafe { d.destroy_image_view(view, None) };
        }
    }

    fn create_render_pass(&mut self, format: vk::Format) -> VkResult<vk::RenderPass> {
        // single color attachment, cleared then handed to present
        let color = vk::AttachmentDescription {
            format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            ..Default::default()
        };
        let color_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        let subpass = vk::SubpassDescription {
            pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
            color_attachment_count: 1,
            p_color_attachments: &color_ref,
            ..Default::default()
        };
        let create_info = vk::RenderPassCreateInfo {
            s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &color,
            subpass_count: 1,
            p_subpasses: &subpass,
            ..Default::default()
        };
        unsafe { self.device()?.create_render_pass(&create_info, None) }
    }

    fn destroy_render_pass(&mut self, render_pass: vk::RenderPass) {
        if let Ok(d) = self.device() {
            unsafe { d.destroy_render_pass(render_pass, None) };
        }
    }

    fn create_shader_module(&mut self, code: &[u32]) -> VkResult<vk::ShaderModule> {
        let create_info = vk::ShaderModuleCreateInfo {
            s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
            code_size: std::mem::size_of_val(code),
            p_code: code.as_ptr(),
            ..Default::default()
        };
        unsafe { self.device()?.create_shader_module(&create_info, None) }
    }

    fn destroy_shader_module(&mut self, module: vk::ShaderModule) {
        if let Ok(d) = self.device() {
            unsafe { d.destroy_shader_module(module, None) };
        }
    }

    fn create_pipeline_layout(&mut self) -> VkResult<vk::PipelineLayout> {
        // no descriptors, no push constants
        let create_info = vk::PipelineLayoutCreateInfo {
            s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
            ..Default::default()
        };
        unsafe { self.device()?.create_pipeline_layout(&create_info, None) }
    }

    fn destroy_pipeline_layout(&mut self, layout: vk::PipelineLayout) {
        if let Ok(d) = self.device() {
            unsafe { d.destroy_pipeline_layout(layout, None) };
        }
    }

    fn create_graphics_pipeline(&mut self, request: &PipelineRequest) -> VkResult<vk::Pipeline> {
        let device = self.device()?;

        let stages = [
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::VERTEX,
                module: request.vertex,
                p_name: SHADER_ENTRY.as_ptr(),
                ..Default::default()
            },
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::FRAGMENT,
                module: request.fragment,
                p_name: SHADER_ENTRY.as_ptr(),
                ..Default::default()
            },
        ];

        // Positions come from gl_VertexIndex; nothing is bound.
        let vertex_input = vk::PipelineVertexInputStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
            ..Default::default()
        };
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            primitive_restart_enable: vk::FALSE,
            ..Default::default()
        };

        // Static viewport and scissor covering the whole swapchain extent.
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: request.extent.width as f32,
            height: request.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: request.extent,
        };
        let viewport_state = vk::PipelineViewportStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
            viewport_count: 1,
            p_viewports: &viewport,
            scissor_count: 1,
            p_scissors: &scissor,
            ..Default::default()
        };

        let raster = vk::PipelineRasterizationStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::CLOCKWISE,
            line_width: 1.0,
            ..Default::default()
        };
        let multisample = vk::PipelineMultisampleStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
            rasterization_samples: vk::SampleCountFlags::TYPE_1,
            ..Default::default()
        };
        let blend_attachment = vk::PipelineColorBlendAttachmentState {
            color_write_mask: vk::ColorComponentFlags::RGBA,
            blend_enable: vk::FALSE,
            ..Default::default()
        };
        let color_blend = vk::PipelineColorBlendStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &blend_attachment,
            ..Default::default()
        };

        let create_info = vk::GraphicsPipelineCreateInfo {
            s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
            stage_count: stages.len() as u32,
            p_stages: stages.as_ptr(),
            p_vertex_input_state: &vertex_input,
            p_input_assembly_state: &input_assembly,
            p_viewport_state: &viewport_state,
            p_rasterization_state: &raster,
            p_multisample_state: &multisample,
            p_color_blend_state: &color_blend,
            layout: request.layout,
            render_pass: request.render_pass,
            subpass: 0,
            ..Default::default()
        };

        let pipelines = unsafe {
            device
                .create_graphics_pipelines(
                    vk::PipelineCache::null(),
                    std::slice::from_ref(&create_info),
                    None,
                )
                .map_err(|(_, err)| err)?
        };
        pipelines
            .into_iter()
            .next()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn destroy_pipeline(&mut self, pipeline: vk::Pipeline) {
        if let Ok(d) = self.device() {
            unsafe { d.destroy_pipeline(pipeline, None) };
        }
    }

    fn create_framebuffer(
        &mut self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer> {
        let create_info = vk::FramebufferCreateInfo {
            s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
            render_pass,
            attachment_count: 1,
            p_attachments: &view,
            width: extent.width,
            height: extent.height,
            layers: 1,
            ..Default::default()
        };
        unsafe { self.device()?.create_framebuffer(&create_info, None) }
    }

    fn destroy_framebuffer(&mut self, framebuffer: vk::Framebuffer) {
        if let Ok(d) = self.device() {
            unsafe { d.destroy_framebuffer(framebuffer, None) };
        }
    }

    fn create_command_pool(&mut self, family: u32) -> VkResult<vk::CommandPool> {
        let create_info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            queue_family_index: family,
            ..Default::default()
        };
        unsafe { self.device()?.create_command_pool(&create_info, None) }
    }

    fn destroy_command_pool(&mut self, pool: vk::CommandPool) {
        if let Ok(d) = self.device() {
            unsafe { d.destroy_command_pool(pool, None) };
        }
    }

    fn allocate_command_buffers(
        &mut self,
        pool: vk::CommandPool,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: count,
            ..Default::default()
        };
        unsafe { self.device()?.allocate_command_buffers(&alloc_info) }
    }

    fn free_command_buffers(&mut self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        if buffers.is_empty() {
            return;
        }
        if let Ok(d) = self.device() {
            unsafe { d.free_command_buffers(pool, buffers) };
        }
    }

    fn begin_command_buffer(&mut self, buffer: vk::CommandBuffer) -> VkResult<()> {
        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            flags: vk::CommandBufferUsageFlags::empty(),
            ..Default::default()
        };
        unsafe { self.device()?.begin_command_buffer(buffer, &begin) }
    }

    fn cmd_begin_render_pass(&mut self, buffer: vk::CommandBuffer, begin: &RenderPassBegin) {
        let Ok(d) = self.device() else { return };
        let clears = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: begin.clear,
            },
        }];
        let info = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass: begin.render_pass,
            framebuffer: begin.framebuffer,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: begin.extent,
            },
            clear_value_count: clears.len() as u32,
            p_clear_values: clears.as_ptr(),
            ..Default::default()
        };
        unsafe { d.cmd_begin_render_pass(buffer, &info, vk::SubpassContents::INLINE) };
    }

    fn cmd_bind_pipeline(&mut self, buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        if let Ok(d) = self.device() {
            unsafe { d.cmd_bind_pipeline(buffer, vk::PipelineBindPoint::GRAPHICS, pipeline) };
        }
    }

    fn cmd_draw(
        &mut self,
        buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        if let Ok(d) = self.device() {
            unsafe {
                d.cmd_draw(buffer, vertex_count, instance_count, first_vertex, first_instance)
            };
        }
    }

    fn cmd_end_render_pass(&mut self, buffer: vk::CommandBuffer) {
        if let Ok(d) = self.device() {
            unsafe { d.cmd_end_render_pass(buffer) };
        }
    }

    fn end_command_buffer(&mut self, buffer: vk::CommandBuffer) -> VkResult<()> {
        unsafe { self.device()?.end_command_buffer(buffer) }
    }
}
