// Error taxonomy for the rendering core
//
// Startup failures are fatal: nothing half-built survives them.
// Per-frame failures are recoverable and surface to the frame loop.

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    /// Vulkan loader could not be found or opened
    #[error("Failed to load Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("No GPU satisfies the required extensions and queue capabilities")]
    NoCompatibleAdapter,

    #[error("Logical device creation failed: {0}")]
    DeviceCreation(vk::Result),

    #[error("Swap chain creation failed: {0}")]
    SwapChainCreation(String),

    #[error("Graphics pipeline creation failed: {0}")]
    PipelineCreation(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Shader file not found: {}", path.display())]
    ShaderFileNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Surface no longer matches the swap chain (e.g. the window changed size)
    #[error("Swap chain out of date")]
    SwapChainOutOfDate,

    /// A bounded fence wait or image acquire ran past its timeout
    #[error("Timed out waiting for frame resources")]
    FrameTimeout,

    #[error("Window error: {0}")]
    Window(String),

    #[error("GPU memory allocation failed: {0}")]
    Allocation(#[from] gpu_allocator::AllocationError),

    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),
}

impl RenderError {
    /// True for conditions the frame loop may survive by skipping a frame.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SwapChainOutOfDate | Self::FrameTimeout)
    }

    /// Maps a raw result from a per-frame call onto the frame-level taxonomy.
    pub(crate) fn from_frame_result(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_OUT_OF_DATE_KHR => Self::SwapChainOutOfDate,
            vk::Result::TIMEOUT | vk::Result::NOT_READY => Self::FrameTimeout,
            other => Self::Vulkan(other),
        }
    }
}

pub type RenderResult<T> = std::result::Result<T, RenderError>;
