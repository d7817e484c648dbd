// Backend module - Vulkan abstraction layer
//
// Design: Thin wrapper around ash with safety and ergonomics. Every object
// borrows the one `Device`, so it cannot outlive it.

pub mod adapter;
pub mod buffer;
pub mod device;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use adapter::{AdapterRequirements, PhysicalAdapterInfo, QueueFamilyIndex};
pub use device::{Device, DeviceOptions, SurfaceProvider};
pub use pipeline::{GraphicsPipeline, PipelineConfig, PipelineLayout, VertexInputLayout};
pub use swapchain::{Swapchain, SwapchainOptions};
