// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{error, info};
use trigon_core::init_tracing;
use trigon_platform::{handle_key, CloseSignal};
use trigon_render_vk::{AshDriver, ChainError, ResourceChain};

use trigon_platform::winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use config::AppCfg;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file; missing means defaults
    #[arg(long, default_value = "trigon.toml")]
    config: PathBuf,

    /// Force validation layers on
    #[arg(long)]
    validation: bool,

    /// Directory holding vert.spv and frag.spv
    #[arg(long)]
    shader_dir: Option<PathBuf>,

    /// Use the shaders compiled into the binary
    #[arg(long)]
    embedded_shaders: bool,
}

impl Args {
    fn apply(&self, cfg: &mut AppCfg) {
        if self.validation {
            cfg.render.validation = true;
        }
        if let Some(dir) = &self.shader_dir {
            cfg.shaders.dir = dir.clone();
        }
        if self.embedded_shaders {
            cfg.shaders.embedded = true;
        }
    }
}

struct App {
    cfg: AppCfg,
    close: CloseSignal,
    // declared before `window`: the chain holds a surface on it
    chain: Option<ResourceChain<AshDriver>>,
    window: Option<Window>,
    failure: Option<ChainError>,
    platform_error: Option<anyhow::Error>,
}

impl App {
    fn new(cfg: AppCfg) -> Self {
        App {
            cfg,
            close: CloseSignal::default(),
            chain: None,
            window: None,
            failure: None,
            platform_error: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let spec = self.cfg.window_spec();
        let window = event_loop
            .create_window(spec.attributes())
            .context("create_window")?;

        let driver =
            unsafe { AshDriver::from_window(&window) }.map_err(|e| anyhow!("window handle: {e}"))?;
        self.window = Some(window);

        let mut chain =
            ResourceChain::new(driver, self.cfg.chain_config(), self.cfg.shader_source());
        match chain.build() {
            Ok(()) => {
                if let (Some(sc), Some(dev)) = (chain.swapchain_config(), chain.physical_device()) {
                    info!(
                        "running on {} ({}x{}, {} images, {:?})",
                        dev.name,
                        sc.extent.width,
                        sc.extent.height,
                        chain.image_count(),
                        sc.present_mode
                    );
                }
                self.chain = Some(chain);
            }
            Err(e) => {
                error!("startup failed: {e}");
                self.failure = Some(e);
                self.close.request();
            }
        }
        Ok(())
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.chain = None;
        self.window = None;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            self.platform_error = Some(e);
            self.close.request();
        }
        if self.close.should_close() {
            self.shutdown(event_loop);
        }
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.close.request();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                handle_key(&mut self.close, &event.logical_key, event.state);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.close.should_close() {
            self.shutdown(event_loop);
        }
    }
}

fn run(args: Args) -> Result<Option<ChainError>> {
    let mut cfg = config::load(&args.config);
    args.apply(&mut cfg);

    let event_loop: EventLoop<()> = EventLoop::new().context("event loop")?;
    let mut app = App::new(cfg);
    event_loop.run_app(&mut app).context("event loop")?;

    if let Some(e) = app.platform_error.take() {
        return Err(e);
    }
    Ok(app.failure.take())
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    match run(args) {
        Ok(None) => {
            info!("shut down cleanly");
            ExitCode::SUCCESS
        }
        Ok(Some(e)) => ExitCode::from(e.exit_code()),
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
