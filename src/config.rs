// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Every field has a default, so a missing file or a partial file is fine.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub shaders: ShaderConfig,
    pub debug: DebugConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "VKE Renderer".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// Graphics settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub present_mode: String,
    pub clear_color: [f32; 4],
    pub max_frames_in_flight: usize,
    /// Swap chain image count the application asks for; the driver range wins
    pub image_count: u32,
    /// Absent means wait indefinitely
    pub acquire_timeout_ms: Option<u64>,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            present_mode: "mailbox".to_string(),
            clear_color: [0.1, 0.1, 0.1, 1.0],
            max_frames_in_flight: 2,
            image_count: 3,
            acquire_timeout_ms: None,
        }
    }
}

/// Pre-compiled SPIR-V artifacts
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            vertex: PathBuf::from("shaders/simple_shader.vert.spv"),
            fragment: PathBuf::from("shaders/simple_shader.frag.spv"),
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub log_level: String,
    pub show_fps: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            log_level: "info".to_string(),
            show_fps: true,
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get present mode as Vulkan enum
    pub fn present_mode(&self) -> ash::vk::PresentModeKHR {
        match self.graphics.present_mode.to_lowercase().as_str() {
            "immediate" => ash::vk::PresentModeKHR::IMMEDIATE,
            "mailbox" => ash::vk::PresentModeKHR::MAILBOX,
            "fifo" => ash::vk::PresentModeKHR::FIFO,
            "fifo_relaxed" => ash::vk::PresentModeKHR::FIFO_RELAXED,
            _ => {
                log::warn!(
                    "Unknown present mode '{}', defaulting to FIFO",
                    self.graphics.present_mode
                );
                ash::vk::PresentModeKHR::FIFO
            }
        }
    }

    /// In-flight slot count; zero slots would stall the first acquire forever
    pub fn frames_in_flight(&self) -> usize {
        self.graphics.max_frames_in_flight.max(1)
    }

    /// Acquire timeout in nanoseconds
    pub fn acquire_timeout_ns(&self) -> u64 {
        self.graphics
            .acquire_timeout_ms
            .map(|ms| ms.saturating_mul(1_000_000))
            .unwrap_or(u64::MAX)
    }

    /// Log filter, parsed from `debug.log_level`
    pub fn log_level(&self) -> log::LevelFilter {
        self.debug.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_the_reference_scene() {
        let config = Config::default();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.graphics.clear_color, [0.1, 0.1, 0.1, 1.0]);
        assert_eq!(config.frames_in_flight(), 2);
        assert_eq!(config.graphics.image_count, 3);
        assert_eq!(config.acquire_timeout_ns(), u64::MAX);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [graphics]
            present_mode = "fifo"
            acquire_timeout_ms = 250

            [shaders]
            vertex = "out/tri.vert.spv"
            "#,
        )
        .unwrap();

        assert_eq!(config.present_mode(), vk::PresentModeKHR::FIFO);
        assert_eq!(config.acquire_timeout_ns(), 250_000_000);
        assert_eq!(config.shaders.vertex, PathBuf::from("out/tri.vert.spv"));
        assert_eq!(
            config.shaders.fragment,
            PathBuf::from("shaders/simple_shader.frag.spv")
        );
        assert_eq!(config.window.title, "VKE Renderer");
    }

    #[test]
    fn unknown_present_mode_falls_back_to_fifo() {
        let config = Config::from_toml("[graphics]\npresent_mode = \"vsync-ish\"").unwrap();
        assert_eq!(config.present_mode(), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn zero_frames_in_flight_is_clamped() {
        let config = Config::from_toml("[graphics]\nmax_frames_in_flight = 0").unwrap();
        assert_eq!(config.frames_in_flight(), 1);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Config::from_toml("[window]\nwidth = \"wide\"").is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("vke-renderer-no-such-config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.window.height, 600);
    }

    #[test]
    fn log_level_parses_or_defaults() {
        let config = Config::from_toml("[debug]\nlog_level = \"trace\"").unwrap();
        assert_eq!(config.log_level(), log::LevelFilter::Trace);

        let config = Config::from_toml("[debug]\nlog_level = \"loud\"").unwrap();
        assert_eq!(config.log_level(), log::LevelFilter::Info);
    }
}
