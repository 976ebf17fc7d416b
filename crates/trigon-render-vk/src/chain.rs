// SPDX-License-Identifier: CEPL-1.0
//! The ordered acquire/release chain.
//!
//! Every acquired handle is pushed onto `held` the moment the driver hands
//! it out. Teardown pops that stack, so release order is always the exact
//! reverse of acquisition, whatever prefix of the chain was built.
//!
//! STRICT ORDER (acquire ↓, release ↑):
//! instance, surface, device, swapchain, image views, render pass,
//! pipeline layout, pipeline, framebuffers, command pool, command buffers.

use ash::vk;
use tracing::{debug, info, warn};
use trigon_render::{load_shader, ClearColor, RenderSize, ShaderSource};

use crate::driver::{DeviceRequest, Driver, InstanceRequest, PipelineRequest};
use crate::error::{ChainError, ChainResult, Resource};
use crate::negotiate::{SwapchainConfig, SwapchainPreferences};
use crate::probe;
use crate::record::{self, DrawTarget};
use crate::select::{self, DeviceRequirements, PhysicalDeviceDescriptor};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChainState {
    Uninitialized,
    InstanceReady,
    SurfaceReady,
    DeviceReady,
    SwapchainReady,
    PipelineReady,
    BuffersReady,
    Running,
    TornDown,
}

pub const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Everything the chain needs to know up front. Replaces global name tables.
#[derive(Clone, Debug)]
pub struct ChainConfig {
    pub app_name: String,
    pub engine_name: String,
    pub api_version: u32,
    pub size: RenderSize,
    /// Requested debug layers. Missing ones only produce a warning.
    pub validation_layers: Vec<String>,
    pub device: DeviceRequirements,
    pub swapchain: SwapchainPreferences,
    pub clear: ClearColor,
    pub vertex_shader: String,
    pub fragment_shader: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            app_name: "Hello Triangle".to_string(),
            engine_name: "No Engine".to_string(),
            api_version: vk::API_VERSION_1_1,
            size: RenderSize {
                width: 800,
                height: 600,
            },
            validation_layers: Vec::new(),
            device: DeviceRequirements::default(),
            swapchain: SwapchainPreferences::default(),
            clear: ClearColor::default(),
            vertex_shader: "vert.spv".to_string(),
            fragment_shader: "frag.spv".to_string(),
        }
    }
}

#[derive(Debug)]
enum Held {
    Instance(vk::Instance),
    Surface(vk::SurfaceKHR),
    Device(vk::Device),
    Swapchain(vk::SwapchainKHR),
    ImageView(vk::ImageView),
    RenderPass(vk::RenderPass),
    PipelineLayout(vk::PipelineLayout),
    Pipeline(vk::Pipeline),
    Framebuffer(vk::Framebuffer),
    CommandPool(vk::CommandPool),
    CommandBuffers(vk::CommandPool, Vec<vk::CommandBuffer>),
}

impl Held {
    fn resource(&self) -> Resource {
        match self {
            Held::Instance(_) => Resource::Instance,
            Held::Surface(_) => Resource::Surface,
            Held::Device(_) => Resource::Device,
            Held::Swapchain(_) => Resource::Swapchain,
            Held::ImageView(_) => Resource::ImageView,
            Held::RenderPass(_) => Resource::RenderPass,
            Held::PipelineLayout(_) => Resource::PipelineLayout,
            Held::Pipeline(_) => Resource::Pipeline,
            Held::Framebuffer(_) => Resource::Framebuffer,
            Held::CommandPool(_) => Resource::CommandPool,
            Held::CommandBuffers(..) => Resource::CommandBuffers,
        }
    }

    fn release(self, driver: &mut dyn Driver) {
        match self {
            Held::Instance(h) => driver.destroy_instance(h),
            Held::Surface(h) => driver.destroy_surface(h),
            Held::Device(h) => driver.destroy_device(h),
            // images belong to the swapchain and go with it
            Held::Swapchain(h) => driver.destroy_swapchain(h),
            Held::ImageView(h) => driver.destroy_image_view(h),
            Held::RenderPass(h) => driver.destroy_render_pass(h),
            Held::PipelineLayout(h) => driver.destroy_pipeline_layout(h),
            Held::Pipeline(h) => driver.destroy_pipeline(h),
            Held::Framebuffer(h) => driver.destroy_framebuffer(h),
            Held::CommandPool(h) => driver.destroy_command_pool(h),
            Held::CommandBuffers(pool, bufs) => driver.free_command_buffers(pool, &bufs),
        }
    }
}

pub struct ResourceChain<D: Driver> {
    driver: D,
    config: ChainConfig,
    shaders: Box<dyn ShaderSource>,
    state: ChainState,
    held: Vec<Held>,

    enabled_layers: Vec<String>,
    instance: vk::Instance,
    surface: vk::SurfaceKHR,
    physical: Option<PhysicalDeviceDescriptor>,
    device: vk::Device,
    queue: vk::Queue,

    swapchain_config: Option<SwapchainConfig>,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,

    render_pass: vk::RenderPass,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,

    framebuffers: Vec<vk::Framebuffer>,
    command_pool: vk::CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
}

impl<D: Driver> ResourceChain<D> {
    pub fn new(driver: D, config: ChainConfig, shaders: Box<dyn ShaderSource>) -> Self {
        ResourceChain {
            driver,
            config,
            shaders,
            state: ChainState::Uninitialized,
            held: Vec::new(),
            enabled_layers: Vec::new(),
            instance: vk::Instance::null(),
            surface: vk::SurfaceKHR::null(),
            physical: None,
            device: vk::Device::null(),
            queue: vk::Queue::null(),
            swapchain_config: None,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            image_views: Vec::new(),
            render_pass: vk::RenderPass::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            pipeline: vk::Pipeline::null(),
            framebuffers: Vec::new(),
            command_pool: vk::CommandPool::null(),
            command_buffers: Vec::new(),
        }
    }

    /// Run every stage in order. On failure everything acquired so far is
    /// released before the error is returned, leaving the chain `TornDown`.
    pub fn build(&mut self) -> ChainResult<()> {
        self.require_state(ChainState::Uninitialized, "build")?;
        if let Err(e) = self.build_stages() {
            warn!("chain build failed in state {:?}: {e}", self.state);
            self.teardown();
            return Err(e);
        }
        Ok(())
    }

    fn build_stages(&mut self) -> ChainResult<()> {
        self.create_instance()?;
        self.create_surface()?;
        self.create_device()?;
        self.create_swapchain()?;
        self.create_pipeline()?;
        self.create_buffers()?;
        self.record_commands()
    }

    pub fn create_instance(&mut self) -> ChainResult<()> {
        self.stage(
            ChainState::Uninitialized,
            ChainState::InstanceReady,
            "create_instance",
            |chain| {
                let required = chain.driver.required_instance_extensions().map_err(|e| {
                    ChainError::UnsupportedPlatform(format!(
                        "window system exposes no surface extensions ({e})"
                    ))
                })?;
                let supported = probe::supported_instance_extensions(&chain.driver).map_err(|e| {
                    ChainError::UnsupportedPlatform(format!(
                        "instance extensions cannot be enumerated ({e})"
                    ))
                })?;
                let missing = probe::missing(&required, &supported);
                if !missing.is_empty() {
                    return Err(ChainError::MissingFeature(format!(
                        "instance extension(s) {}",
                        missing.join(", ")
                    )));
                }

                chain.enabled_layers =
                    probe::available_layers(&chain.driver, &chain.config.validation_layers);

                let request = InstanceRequest {
                    app_name: &chain.config.app_name,
                    engine_name: &chain.config.engine_name,
                    api_version: chain.config.api_version,
                    layers: &chain.enabled_layers,
                    extensions: &required,
                };
                let instance = chain
                    .driver
                    .create_instance(&request)
                    .map_err(ChainError::creation(Resource::Instance))?;
                chain.push(Held::Instance(instance));
                chain.instance = instance;
                info!(
                    "instance ready (extensions: {}; layers: {})",
                    required.join(", "),
                    if chain.enabled_layers.is_empty() {
                        "none".to_string()
                    } else {
                        chain.enabled_layers.join(", ")
                    }
                );
                Ok(())
            },
        )
    }

    pub fn create_surface(&mut self) -> ChainResult<()> {
        self.stage(
            ChainState::InstanceReady,
            ChainState::SurfaceReady,
            "create_surface",
            |chain| {
                let surface = chain
                    .driver
                    .create_surface(chain.instance)
                    .map_err(ChainError::creation(Resource::Surface))?;
                chain.push(Held::Surface(surface));
                chain.surface = surface;
                Ok(())
            },
        )
    }

    pub fn create_device(&mut self) -> ChainResult<()> {
        self.stage(
            ChainState::SurfaceReady,
            ChainState::DeviceReady,
            "create_device",
            |chain| {
                let physical = select::pick(&chain.driver, chain.surface, &chain.config.device)?;
                let request = DeviceRequest {
                    physical: physical.handle,
                    queue_family: physical.queue_family,
                    extensions: &chain.config.device.extensions,
                    layers: &chain.enabled_layers,
                };
                let device = chain
                    .driver
                    .create_device(&request)
                    .map_err(ChainError::creation(Resource::Device))?;
                chain.push(Held::Device(device));
                chain.device = device;
                chain.queue = chain
                    .driver
                    .device_queue(physical.queue_family, 0)
                    .map_err(ChainError::creation(Resource::Queue))?;
                info!("logical device ready on {}", physical.name);
                chain.physical = Some(physical);
                Ok(())
            },
        )
    }

    pub fn create_swapchain(&mut self) -> ChainResult<()> {
        self.stage(
            ChainState::DeviceReady,
            ChainState::SwapchainReady,
            "create_swapchain",
            |chain| {
                let support = match &chain.physical {
                    Some(p) => &p.support,
                    None => return Err(chain.invalid("create_swapchain")),
                };
                let sc = SwapchainConfig::negotiate(
                    support,
                    &chain.config.swapchain,
                    chain.config.size,
                )?;
                let swapchain = chain
                    .driver
                    .create_swapchain(chain.surface, &sc)
                    .map_err(ChainError::creation(Resource::Swapchain))?;
                chain.push(Held::Swapchain(swapchain));
                chain.swapchain = swapchain;
                chain.swapchain_config = Some(sc);

                chain.images = chain
                    .driver
                    .swapchain_images(swapchain)
                    .map_err(ChainError::creation(Resource::SwapchainImages))?;
                for i in 0..chain.images.len() {
                    let view = chain
                        .driver
                        .create_image_view(chain.images[i], sc.format.format)
                        .map_err(ChainError::creation(Resource::ImageView))?;
                    chain.push(Held::ImageView(view));
                    chain.image_views.push(view);
                }
                info!(
                    "swapchain ready ({}x{}, {} images, fmt {:?}/{:?}, {:?})",
                    sc.extent.width,
                    sc.extent.height,
                    chain.images.len(),
                    sc.format.format,
                    sc.format.color_space,
                    sc.present_mode
                );
                Ok(())
            },
        )
    }

    pub fn create_pipeline(&mut self) -> ChainResult<()> {
        self.stage(
            ChainState::SwapchainReady,
            ChainState::PipelineReady,
            "create_pipeline",
            |chain| {
                let sc = match chain.swapchain_config {
                    Some(sc) => sc,
                    None => return Err(chain.invalid("create_pipeline")),
                };
                let vert = load_shader(chain.shaders.as_ref(), &chain.config.vertex_shader)?;
                let frag = load_shader(chain.shaders.as_ref(), &chain.config.fragment_shader)?;
                debug!(
                    "shaders from {}: {} ({} B), {} ({} B)",
                    chain.shaders.describe(),
                    vert.name(),
                    vert.len(),
                    frag.name(),
                    frag.len()
                );

                let render_pass = chain
                    .driver
                    .create_render_pass(sc.format.format)
                    .map_err(ChainError::creation(Resource::RenderPass))?;
                chain.push(Held::RenderPass(render_pass));
                chain.render_pass = render_pass;

                let layout = chain
                    .driver
                    .create_pipeline_layout()
                    .map_err(ChainError::creation(Resource::PipelineLayout))?;
                chain.push(Held::PipelineLayout(layout));
                chain.pipeline_layout = layout;

                // Shader modules only live for the pipeline-create call.
                let vs = chain
                    .driver
                    .create_shader_module(&vert.words())
                    .map_err(ChainError::creation(Resource::ShaderModule))?;
                let fs = match chain.driver.create_shader_module(&frag.words()) {
                    Ok(fs) => fs,
                    Err(e) => {
                        chain.driver.destroy_shader_module(vs);
                        return Err(ChainError::creation(Resource::ShaderModule)(e));
                    }
                };
                let pipeline = chain.driver.create_graphics_pipeline(&PipelineRequest {
                    render_pass,
                    layout,
                    vertex: vs,
                    fragment: fs,
                    extent: sc.extent,
                });
                chain.driver.destroy_shader_module(vs);
                chain.driver.destroy_shader_module(fs);

                let pipeline = pipeline.map_err(ChainError::creation(Resource::Pipeline))?;
                chain.push(Held::Pipeline(pipeline));
                chain.pipeline = pipeline;
                info!("graphics pipeline ready");
                Ok(())
            },
        )
    }

    pub fn create_buffers(&mut self) -> ChainResult<()> {
        self.stage(
            ChainState::PipelineReady,
            ChainState::BuffersReady,
            "create_buffers",
            |chain| {
                let extent = match chain.swapchain_config {
                    Some(sc) => sc.extent,
                    None => return Err(chain.invalid("create_buffers")),
                };
                for i in 0..chain.image_views.len() {
                    let fb = chain
                        .driver
                        .create_framebuffer(chain.render_pass, chain.image_views[i], extent)
                        .map_err(ChainError::creation(Resource::Framebuffer))?;
                    chain.push(Held::Framebuffer(fb));
                    chain.framebuffers.push(fb);
                }

                let family = match &chain.physical {
                    Some(p) => p.queue_family,
                    None => return Err(chain.invalid("create_buffers")),
                };
                let pool = chain
                    .driver
                    .create_command_pool(family)
                    .map_err(ChainError::creation(Resource::CommandPool))?;
                chain.push(Held::CommandPool(pool));
                chain.command_pool = pool;

                let buffers = chain
                    .driver
                    .allocate_command_buffers(pool, chain.framebuffers.len() as u32)
                    .map_err(ChainError::creation(Resource::CommandBuffers))?;
                chain.push(Held::CommandBuffers(pool, buffers.clone()));
                chain.command_buffers = buffers;
                debug!(
                    "{} framebuffer(s), {} command buffer(s)",
                    chain.framebuffers.len(),
                    chain.command_buffers.len()
                );
                Ok(())
            },
        )
    }

    pub fn record_commands(&mut self) -> ChainResult<()> {
        self.stage(
            ChainState::BuffersReady,
            ChainState::Running,
            "record_commands",
            |chain| {
                let extent = match chain.swapchain_config {
                    Some(sc) => sc.extent,
                    None => return Err(chain.invalid("record_commands")),
                };
                let target = DrawTarget {
                    render_pass: chain.render_pass,
                    pipeline: chain.pipeline,
                    extent,
                    clear: chain.config.clear.0,
                };
                record::record_triangle(
                    &mut chain.driver,
                    &target,
                    &chain.command_buffers,
                    &chain.framebuffers,
                )?;
                info!("command buffers recorded; chain running");
                Ok(())
            },
        )
    }

    /// Release every acquired resource in reverse acquisition order. Valid
    /// from any state; a second call does nothing.
    pub fn teardown(&mut self) {
        if self.state == ChainState::TornDown {
            return;
        }
        if self.held.iter().any(|h| matches!(h, Held::Device(_))) {
            if let Err(e) = self.driver.device_wait_idle() {
                warn!("device_wait_idle before teardown: {e}");
            }
        }
        let count = self.held.len();
        self.unwind_to(0);
        self.state = ChainState::TornDown;
        info!("chain torn down ({count} resource(s) released)");
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn physical_device(&self) -> Option<&PhysicalDeviceDescriptor> {
        self.physical.as_ref()
    }

    pub fn instance(&self) -> vk::Instance {
        self.instance
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn device(&self) -> vk::Device {
        self.device
    }

    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    pub fn swapchain(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout
    }

    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn framebuffers(&self) -> &[vk::Framebuffer] {
        &self.framebuffers
    }

    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    pub fn swapchain_config(&self) -> Option<&SwapchainConfig> {
        self.swapchain_config.as_ref()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn command_buffers(&self) -> &[vk::CommandBuffer] {
        &self.command_buffers
    }

    pub fn enabled_layers(&self) -> &[String] {
        &self.enabled_layers
    }

    /// Kinds of everything currently held, in acquisition order.
    pub fn acquired(&self) -> Vec<Resource> {
        self.held.iter().map(Held::resource).collect()
    }

    fn stage(
        &mut self,
        from: ChainState,
        to: ChainState,
        op: &'static str,
        body: impl FnOnce(&mut Self) -> ChainResult<()>,
    ) -> ChainResult<()> {
        self.require_state(from, op)?;
        let mark = self.held.len();
        match body(self) {
            Ok(()) => {
                debug!("{op}: {from:?} -> {to:?}");
                self.state = to;
                Ok(())
            }
            Err(e) => {
                self.unwind_to(mark);
                Err(e)
            }
        }
    }

    fn require_state(&self, from: ChainState, op: &'static str) -> ChainResult<()> {
        if self.state == from {
            Ok(())
        } else {
            Err(self.invalid(op))
        }
    }

    fn invalid(&self, op: &'static str) -> ChainError {
        ChainError::InvalidTransition {
            state: self.state,
            op,
        }
    }

    fn push(&mut self, held: Held) {
        debug!("acquired {}", held.resource());
        self.held.push(held);
    }

    fn unwind_to(&mut self, mark: usize) {
        while self.held.len() > mark {
            let Some(held) = self.held.pop() else { break };
            self.forget(&held);
            debug!("releasing {}", held.resource());
            held.release(&mut self.driver);
        }
    }

    /// Drop the typed copy of a handle that is about to be released.
    fn forget(&mut self, held: &Held) {
        match held {
            Held::Instance(_) => {
                self.instance = vk::Instance::null();
                self.enabled_layers.clear();
            }
            Held::Surface(_) => self.surface = vk::SurfaceKHR::null(),
            Held::Device(_) => {
                self.device = vk::Device::null();
                self.queue = vk::Queue::null();
                self.physical = None;
            }
            Held::Swapchain(_) => {
                self.swapchain = vk::SwapchainKHR::null();
                self.swapchain_config = None;
                self.images.clear();
            }
            Held::ImageView(v) => self.image_views.retain(|x| x != v),
            Held::RenderPass(_) => self.render_pass = vk::RenderPass::null(),
            Held::PipelineLayout(_) => self.pipeline_layout = vk::PipelineLayout::null(),
            Held::Pipeline(_) => self.pipeline = vk::Pipeline::null(),
            Held::Framebuffer(f) => self.framebuffers.retain(|x| x != f),
            Held::CommandPool(_) => self.command_pool = vk::CommandPool::null(),
            Held::CommandBuffers(..) => self.command_buffers.clear(),
        }
    }
}

impl<D: Driver> Drop for ResourceChain<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}
