// =============================================================================
// VKE RENDERER - Vulkan rendering harness
// =============================================================================
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  HostWindow (winit, pumped from the render loop)                │
// │    └── Device (instance, surface, adapter, queue, pool)         │
// │          └── Swapchain (images, depth, render pass, sync)       │
// │                └── FrameOrchestrator (pipeline, commands)       │
// └─────────────────────────────────────────────────────────────────┘
//
// Everything below `Device` holds a `&Device`, so objects can only be
// destroyed in reverse creation order.
//
// =============================================================================

//! Minimal Vulkan rendering harness: adapter selection, swap chain, a single
//! graphics pipeline and a paced acquire/submit/present loop.
//!
//! Destruction order is enforced by borrows. A pipeline cannot outlive the
//! device it was built on:
//!
//! ```compile_fail,E0505
//! use vke_renderer::backend::{Device, GraphicsPipeline};
//!
//! fn device_outlives_pipeline(
//!     device: Device,
//!     build: impl FnOnce(&Device) -> GraphicsPipeline<'_>,
//! ) {
//!     let pipeline = build(&device);
//!     drop(device);
//!     drop(pipeline);
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod frame;
pub mod model;
pub mod window;

pub use config::Config;
pub use error::{RenderError, RenderResult};
pub use frame::{FrameOrchestrator, FrameOutcome, FrameStats};
pub use window::HostWindow;
