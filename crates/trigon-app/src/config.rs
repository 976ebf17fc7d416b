// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};
use trigon_platform::WindowSpec;
use trigon_render::{ClearColor, DirSource, RenderSize, ShaderSource};
use trigon_render_vk::{
    vk, ChainConfig, DeviceRequirements, EmbeddedSource, SwapchainPreferences, VALIDATION_LAYER,
};

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WindowCfg {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowCfg {
    fn default() -> Self {
        let spec = WindowSpec::default();
        WindowCfg {
            width: spec.width,
            height: spec.height,
            title: spec.title,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeCfg {
    Fifo,
    FifoRelaxed,
    Immediate,
    #[default]
    Mailbox,
}

impl PresentModeCfg {
    pub fn to_vk(self) -> vk::PresentModeKHR {
        match self {
            PresentModeCfg::Fifo => vk::PresentModeKHR::FIFO,
            PresentModeCfg::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
            PresentModeCfg::Immediate => vk::PresentModeKHR::IMMEDIATE,
            PresentModeCfg::Mailbox => vk::PresentModeKHR::MAILBOX,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RenderCfg {
    pub clear_color: [f32; 4],
    /// Preferred mode; FIFO is used when the surface lacks it.
    pub present_mode: PresentModeCfg,
    /// Debug builds turn validation on unless the file says otherwise.
    pub validation: bool,
    pub validation_layers: Vec<String>,
    /// Extra device extensions on top of the swapchain one.
    pub device_extensions: Vec<String>,
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            clear_color: ClearColor::default().0,
            present_mode: PresentModeCfg::default(),
            validation: cfg!(debug_assertions),
            validation_layers: vec![VALIDATION_LAYER.to_string()],
            device_extensions: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ShaderCfg {
    /// Relative paths resolve next to the executable.
    pub dir: PathBuf,
    pub vertex: String,
    pub fragment: String,
    pub embedded: bool,
}

impl Default for ShaderCfg {
    fn default() -> Self {
        ShaderCfg {
            dir: PathBuf::from("shaders"),
            vertex: "vert.spv".to_string(),
            fragment: "frag.spv".to_string(),
            embedded: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppCfg {
    pub window: WindowCfg,
    pub render: RenderCfg,
    pub shaders: ShaderCfg,
}

impl AppCfg {
    pub fn window_spec(&self) -> WindowSpec {
        WindowSpec {
            width: self.window.width,
            height: self.window.height,
            title: self.window.title.clone(),
        }
    }

    pub fn chain_config(&self) -> ChainConfig {
        let mut device = DeviceRequirements::default();
        for ext in &self.render.device_extensions {
            if !device.extensions.contains(ext) {
                device.extensions.push(ext.clone());
            }
        }
        ChainConfig {
            size: RenderSize {
                width: self.window.width.max(1),
                height: self.window.height.max(1),
            },
            validation_layers: if self.render.validation {
                self.render.validation_layers.clone()
            } else {
                Vec::new()
            },
            device,
            swapchain: SwapchainPreferences {
                present_mode: self.render.present_mode.to_vk(),
                ..Default::default()
            },
            clear: ClearColor(self.render.clear_color),
            vertex_shader: self.shaders.vertex.clone(),
            fragment_shader: self.shaders.fragment.clone(),
            ..Default::default()
        }
    }

    /// The configured directory when it exists, otherwise the shaders built
    /// into the binary.
    pub fn shader_source(&self) -> Box<dyn ShaderSource> {
        if self.shaders.embedded {
            return Box::new(EmbeddedSource);
        }
        let dir = DirSource::beside_executable(&self.shaders.dir);
        if dir.root().is_dir() {
            Box::new(dir)
        } else {
            info!(
                "no shader directory at {}, using embedded shaders",
                dir.root().display()
            );
            Box::new(EmbeddedSource)
        }
    }
}

pub fn parse(text: &str) -> Result<AppCfg, toml::de::Error> {
    toml::from_str(text)
}

/// Read `path`, falling back to defaults when it is absent or unparsable.
pub fn load(path: &Path) -> AppCfg {
    match fs::read_to_string(path) {
        Ok(text) => parse(&text).unwrap_or_else(|e| {
            warn!("{} is not valid config, using defaults: {e}", path.display());
            AppCfg::default()
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("no config at {}, using defaults", path.display());
            AppCfg::default()
        }
        Err(e) => {
            warn!("could not read {}, using defaults: {e}", path.display());
            AppCfg::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trigon_render::load_shader;

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg, AppCfg::default());
        assert_eq!(cfg.window.width, 800);
        assert_eq!(cfg.window.height, 600);
        assert_eq!(cfg.shaders.vertex, "vert.spv");
    }

    #[test]
    fn partial_file_fills_the_rest() {
        let cfg = parse(
            r#"
            [window]
            title = "tri"

            [render]
            present_mode = "fifo"
            validation = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.window.title, "tri");
        assert_eq!(cfg.window.width, 800);
        assert_eq!(cfg.render.present_mode, PresentModeCfg::Fifo);
        assert_eq!(cfg.render.clear_color, ClearColor::default().0);
        assert_eq!(cfg.shaders, ShaderCfg::default());
    }

    #[test]
    fn unknown_present_mode_is_rejected() {
        assert!(parse("[render]\npresent_mode = \"tearing\"").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("trigon-config-does-not-exist.toml");
        assert_eq!(load(&path), AppCfg::default());
    }

    #[test]
    fn broken_file_gives_defaults() {
        let path = std::env::temp_dir().join(format!("trigon-broken-{}.toml", std::process::id()));
        fs::write(&path, "[window\nwidth = ").unwrap();
        let cfg = load(&path);
        fs::remove_file(&path).ok();
        assert_eq!(cfg, AppCfg::default());
    }

    #[test]
    fn chain_config_follows_file() {
        let mut cfg = AppCfg::default();
        cfg.render.validation = false;
        cfg.render.present_mode = PresentModeCfg::Immediate;
        cfg.render.device_extensions = vec![
            "VK_KHR_swapchain".to_string(),
            "VK_KHR_maintenance1".to_string(),
        ];
        cfg.window.width = 0;

        let chain = cfg.chain_config();
        assert!(chain.validation_layers.is_empty());
        assert_eq!(chain.swapchain.present_mode, vk::PresentModeKHR::IMMEDIATE);
        assert_eq!(
            chain.device.extensions,
            vec!["VK_KHR_swapchain".to_string(), "VK_KHR_maintenance1".to_string()]
        );
        assert_eq!(chain.size.width, 1);
        assert_eq!(chain.app_name, "Hello Triangle");
    }

    #[test]
    fn default_config_loads_both_stages() {
        let cfg = AppCfg::default();
        let source = cfg.shader_source();
        for name in [&cfg.shaders.vertex, &cfg.shaders.fragment] {
            let bin = load_shader(source.as_ref(), name).unwrap();
            assert_eq!(bin.len() % 4, 0, "{name}");
        }
    }

    #[test]
    fn existing_shader_dir_is_preferred() {
        let dir = std::env::temp_dir().join(format!("trigon-cfg-shaders-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("vert.spv"), [1u8, 2, 3, 4]).unwrap();

        let mut cfg = AppCfg::default();
        cfg.shaders.dir = dir.clone();
        let source = cfg.shader_source();
        assert_eq!(source.describe(), dir.display().to_string());
        assert_eq!(
            load_shader(source.as_ref(), "vert.spv").unwrap().bytes(),
            &[1, 2, 3, 4]
        );
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn validation_uses_configured_layers() {
        let mut cfg = AppCfg::default();
        cfg.render.validation = true;
        assert_eq!(
            cfg.chain_config().validation_layers,
            vec![VALIDATION_LAYER.to_string()]
        );
    }
}
