// Swapchain - Window presentation
//
// Manages the chain of images we render to and present to the screen, the
// per-image depth targets and framebuffers, and the in-flight slot ring that
// paces the CPU against the GPU.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;

use std::time::Instant;

use super::sync::{remaining_timeout, FrameRing, FrameSync};
use super::device::log_idle_failure;
use super::Device;
use crate::error::{RenderError, RenderResult};

/// Depth formats in order of preference
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// What the application asks of the swap chain
#[derive(Debug, Clone, Copy)]
pub struct SwapchainOptions {
    pub extent: vk::Extent2D,
    /// Target image count, clamped into the driver's supported range
    pub image_count: u32,
    pub present_mode: vk::PresentModeKHR,
    pub frames_in_flight: usize,
}

/// Index of an acquired image and whether the surface still matches it exactly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredImage {
    pub index: u32,
    pub suboptimal: bool,
}

/// Result of presenting a frame that did reach the display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    Optimal,
    /// Presented, but the swap chain no longer matches the surface exactly
    Suboptimal,
}

/// Choose surface format (prefer SRGB)
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
}

/// Preferred mode if offered, otherwise FIFO (always supported)
pub fn choose_present_mode(
    available: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    if available.contains(&preferred) {
        preferred
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Surface's current extent, or `desired` clamped to the surface limits when
/// the surface leaves the size up to us
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, desired: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: desired
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: desired
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// At least the driver minimum, at most the driver maximum (0 means unbounded)
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR, target: u32) -> u32 {
    let count = target.max(caps.min_image_count);
    if caps.max_image_count > 0 {
        count.min(caps.max_image_count)
    } else {
        count
    }
}

/// First candidate usable as an optimal-tiling depth/stencil attachment
pub fn choose_depth_format(
    candidates: &[vk::Format],
    properties: impl Fn(vk::Format) -> vk::FormatProperties,
) -> Option<vk::Format> {
    candidates.iter().copied().find(|&format| {
        properties(format)
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
    })
}

fn creation_error(stage: &'static str) -> impl Fn(RenderError) -> RenderError {
    move |e| match e {
        RenderError::SwapChainCreation(_) => e,
        other => RenderError::SwapChainCreation(format!("{stage}: {other}")),
    }
}

/// GPU-only depth image for one swap-chain image
struct DepthTarget<'d> {
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
    device: &'d Device,
}

impl<'d> DepthTarget<'d> {
    fn new(device: &'d Device, format: vk::Format, extent: vk::Extent2D) -> RenderResult<Self> {
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let mut target = Self {
            image: unsafe { device.handle().create_image(&image_info, None) }?,
            view: vk::ImageView::null(),
            allocation: None,
            device,
        };

        let requirements = unsafe { device.handle().get_image_memory_requirements(target.image) };
        let allocation = device.allocator().lock().allocate(&AllocationCreateDesc {
            name: "depth target",
            requirements,
            location: MemoryLocation::GpuOnly,
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })?;

        let allocation = target.allocation.insert(allocation);
        unsafe {
            device
                .handle()
                .bind_image_memory(target.image, allocation.memory(), allocation.offset())
        }?;

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(target.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::DEPTH,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        target.view = unsafe { device.handle().create_image_view(&view_info, None) }?;

        Ok(target)
    }
}

impl Drop for DepthTarget<'_> {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_image_view(self.view, None);
            self.device.handle().destroy_image(self.image, None);
        }
        if let Some(allocation) = self.allocation.take() {
            if let Err(e) = self.device.allocator().lock().free(allocation) {
                log::error!("Failed to free depth target allocation: {:?}", e);
            }
        }
    }
}

pub struct Swapchain<'d> {
    // Teardown in Drop runs in reverse of this build order
    frame_sync: Vec<FrameSync<'d>>,
    framebuffers: Vec<vk::Framebuffer>,
    render_pass: vk::RenderPass,
    depth_targets: Vec<DepthTarget<'d>>,
    image_views: Vec<vk::ImageView>,
    images: Vec<vk::Image>,
    swapchain: vk::SwapchainKHR,
    swapchain_loader: ash::extensions::khr::Swapchain,

    ring: FrameRing,
    format: vk::Format,
    depth_format: vk::Format,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
    device: &'d Device,
}

impl<'d> Swapchain<'d> {
    pub fn new(device: &'d Device, options: &SwapchainOptions) -> RenderResult<Self> {
        log::info!(
            "Creating swapchain: {}x{}",
            options.extent.width,
            options.extent.height
        );

        let surface = device.surface();
        let surface_loader = device.surface_loader();

        let (surface_caps, formats, present_modes) = unsafe {
            (
                surface_loader
                    .get_physical_device_surface_capabilities(device.physical_device(), surface)?,
                surface_loader.get_physical_device_surface_formats(device.physical_device(), surface)?,
                surface_loader
                    .get_physical_device_surface_present_modes(device.physical_device(), surface)?,
            )
        };

        let surface_format = choose_surface_format(&formats)
            .ok_or_else(|| RenderError::SwapChainCreation("surface reports no formats".into()))?;
        let present_mode = choose_present_mode(&present_modes, options.present_mode);
        let extent = choose_extent(&surface_caps, options.extent);
        let image_count = choose_image_count(&surface_caps, options.image_count);

        log::info!("Present mode: {:?}", present_mode);

        let depth_format = device
            .find_depth_format(&DEPTH_FORMAT_CANDIDATES)
            .map_err(creation_error("depth format"))?;

        let swapchain_loader =
            ash::extensions::khr::Swapchain::new(device.instance(), device.handle());

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(surface_caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None) }
            .map_err(|e| RenderError::SwapChainCreation(format!("vkCreateSwapchainKHR: {e}")))?;

        // From here on, Drop cleans up whatever has been built so far
        let mut this = Self {
            frame_sync: Vec::new(),
            framebuffers: Vec::new(),
            render_pass: vk::RenderPass::null(),
            depth_targets: Vec::new(),
            image_views: Vec::new(),
            images: Vec::new(),
            swapchain,
            swapchain_loader,
            ring: FrameRing::new(options.frames_in_flight.max(1), 0),
            format: surface_format.format,
            depth_format,
            extent,
            present_mode,
            device,
        };

        this.images = unsafe { this.swapchain_loader.get_swapchain_images(swapchain) }
            .map_err(|e| RenderError::SwapChainCreation(format!("swapchain images: {e}")))?;

        log::info!(
            "Created swapchain with {} images (requested {}, driver range {}..={})",
            this.images.len(),
            options.image_count,
            surface_caps.min_image_count,
            if surface_caps.max_image_count == 0 {
                u32::MAX
            } else {
                surface_caps.max_image_count
            }
        );

        this.create_image_views().map_err(creation_error("image views"))?;
        this.create_depth_targets().map_err(creation_error("depth targets"))?;
        this.render_pass = this.create_render_pass().map_err(creation_error("render pass"))?;
        this.create_framebuffers().map_err(creation_error("framebuffers"))?;

        for _ in 0..options.frames_in_flight.max(1) {
            let sync = FrameSync::new(device).map_err(creation_error("sync objects"))?;
            this.frame_sync.push(sync);
        }
        this.ring = FrameRing::new(this.frame_sync.len(), this.images.len());

        Ok(this)
    }

    fn create_image_views(&mut self) -> RenderResult<()> {
        for &image in &self.images {
            let create_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            let view = unsafe { self.device.handle().create_image_view(&create_info, None) }?;
            self.image_views.push(view);
        }
        Ok(())
    }

    fn create_depth_targets(&mut self) -> RenderResult<()> {
        for _ in 0..self.images.len() {
            let target = DepthTarget::new(self.device, self.depth_format, self.extent)?;
            self.depth_targets.push(target);
        }
        log::debug!(
            "Created {} depth targets ({:?})",
            self.depth_targets.len(),
            self.depth_format
        );
        Ok(())
    }

    /// Color attachment cleared and kept for presentation, depth cleared and
    /// discarded
    fn create_render_pass(&self) -> RenderResult<vk::RenderPass> {
        let color_attachment = vk::AttachmentDescription::builder()
            .format(self.format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .build();

        let depth_attachment = vk::AttachmentDescription::builder()
            .format(self.depth_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .build();

        let color_attachment_ref = vk::AttachmentReference::builder()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .build();

        let depth_attachment_ref = vk::AttachmentReference::builder()
            .attachment(1)
            .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .build();

        let color_attachments = &[color_attachment_ref];
        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(color_attachments)
            .depth_stencil_attachment(&depth_attachment_ref)
            .build();

        // Attachment writes wait for the acquire semaphore's stage
        let dependency = vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )
            .build();

        let attachments = &[color_attachment, depth_attachment];
        let subpasses = &[subpass];
        let dependencies = &[dependency];

        let render_pass_info = vk::RenderPassCreateInfo::builder()
            .attachments(attachments)
            .subpasses(subpasses)
            .dependencies(dependencies);

        let render_pass = unsafe { self.device.handle().create_render_pass(&render_pass_info, None) }?;
        Ok(render_pass)
    }

    /// One framebuffer per image: its color view plus its own depth target
    fn create_framebuffers(&mut self) -> RenderResult<()> {
        for (&view, depth) in self.image_views.iter().zip(&self.depth_targets) {
            let attachments = &[view, depth.view];
            let framebuffer_info = vk::FramebufferCreateInfo::builder()
                .render_pass(self.render_pass)
                .attachments(attachments)
                .width(self.extent.width)
                .height(self.extent.height)
                .layers(1);

            let framebuffer =
                unsafe { self.device.handle().create_framebuffer(&framebuffer_info, None) }?;
            self.framebuffers.push(framebuffer);
        }
        Ok(())
    }

    /// Acquire next image for rendering.
    ///
    /// Blocks on the current slot's fence first, so the slot's semaphores and
    /// fence are free to reuse. The slot's image-available semaphore is
    /// signaled once the presentation engine releases the image.
    ///
    /// `timeout` bounds the whole call: the acquire gets whatever the fence
    /// wait left over.
    pub fn acquire_next_image(&mut self, timeout: u64) -> RenderResult<AcquiredImage> {
        let started = Instant::now();
        let slot = self.ring.begin_acquire(&mut self.frame_sync[..], timeout)?;
        let sync = &self.frame_sync[slot];

        let (index, suboptimal) = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                remaining_timeout(timeout, started.elapsed()),
                sync.image_available,
                vk::Fence::null(),
            )
        }
        .map_err(RenderError::from_frame_result)?;

        log::trace!(
            "Acquired image {} on slot {}{}",
            index,
            self.ring.current_slot(),
            if suboptimal { " (suboptimal)" } else { "" }
        );

        Ok(AcquiredImage { index, suboptimal })
    }

    /// Submit `command_buffer` for `image_index` and present it.
    ///
    /// The ring advances even when presentation reports the surface out of
    /// date, since the submission itself went through.
    pub fn submit_command_buffer(
        &mut self,
        image_index: u32,
        command_buffer: vk::CommandBuffer,
    ) -> RenderResult<PresentStatus> {
        // Waits out the image's previous frame, then resets this slot's fence
        let slot = self
            .ring
            .begin_submit(image_index as usize, &mut self.frame_sync[..])?;
        let sync = &self.frame_sync[slot];

        let wait_semaphores = [sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [sync.render_finished];
        let command_buffers = [command_buffer];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device.handle().queue_submit(
                self.device.graphics_queue(),
                &[submit_info.build()],
                sync.in_flight_fence,
            )
        }?;

        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            self.swapchain_loader
                .queue_present(self.device.graphics_queue(), &present_info)
        };

        self.ring.advance();

        match result {
            Ok(false) => Ok(PresentStatus::Optimal),
            Ok(true) => Ok(PresentStatus::Suboptimal),
            Err(e) => Err(RenderError::from_frame_result(e)),
        }
    }

    #[inline]
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    #[inline]
    pub fn framebuffer(&self, index: usize) -> vk::Framebuffer {
        self.framebuffers[index]
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Achieved image count after negotiation
    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.ring.slot_count()
    }

    #[inline]
    pub fn current_slot(&self) -> usize {
        self.ring.current_slot()
    }
}

impl Drop for Swapchain<'_> {
    fn drop(&mut self) {
        // Fences/semaphores may still be referenced by queued work
        log_idle_failure("Swapchain", self.device.wait_idle());

        self.frame_sync.clear();

        let device = self.device.handle();
        unsafe {
            for &framebuffer in &self.framebuffers {
                device.destroy_framebuffer(framebuffer, None);
            }
            device.destroy_render_pass(self.render_pass, None);
        }

        self.depth_targets.clear();

        unsafe {
            for &view in &self.image_views {
                device.destroy_image_view(view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }

        log::debug!("Destroyed swapchain");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            ..Default::default()
        }
    }

    #[test]
    fn surface_format_prefers_srgb_pair() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn surface_format_falls_back_to_first() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            // Right format, wrong color space
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
            },
        ];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
        assert!(choose_surface_format(&[]).is_none());
    }

    #[test]
    fn present_mode_uses_preference_when_available() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&modes, vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&modes, vk::PresentModeKHR::IMMEDIATE),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn image_count_clamps_to_driver_maximum() {
        // Asking for three on a surface that tops out at two
        assert_eq!(choose_image_count(&caps(2, 2), 3), 2);
    }

    #[test]
    fn image_count_respects_driver_minimum() {
        assert_eq!(choose_image_count(&caps(3, 8), 2), 3);
        assert_eq!(choose_image_count(&caps(2, 8), 3), 3);
        assert_eq!(choose_image_count(&caps(2, 0), 5), 5);
    }

    #[test]
    fn extent_follows_surface_when_fixed() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: 1024, height: 768 },
            ..Default::default()
        };
        let extent = choose_extent(&caps, vk::Extent2D { width: 800, height: 600 });
        assert_eq!(extent, vk::Extent2D { width: 1024, height: 768 });
    }

    #[test]
    fn extent_clamps_when_surface_defers() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: u32::MAX, height: u32::MAX },
            min_image_extent: vk::Extent2D { width: 64, height: 64 },
            max_image_extent: vk::Extent2D { width: 1920, height: 1080 },
            ..Default::default()
        };
        assert_eq!(
            choose_extent(&caps, vk::Extent2D { width: 4000, height: 10 }),
            vk::Extent2D { width: 1920, height: 64 }
        );
        assert_eq!(
            choose_extent(&caps, vk::Extent2D { width: 800, height: 600 }),
            vk::Extent2D { width: 800, height: 600 }
        );
    }

    #[test]
    fn depth_format_takes_first_supported_candidate() {
        let supported = |format: vk::Format| {
            let features = if format == vk::Format::D24_UNORM_S8_UINT
                || format == vk::Format::D32_SFLOAT_S8_UINT
            {
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
            } else {
                vk::FormatFeatureFlags::empty()
            };
            vk::FormatProperties {
                optimal_tiling_features: features,
                ..Default::default()
            }
        };
        assert_eq!(
            choose_depth_format(&DEPTH_FORMAT_CANDIDATES, supported),
            Some(vk::Format::D32_SFLOAT_S8_UINT)
        );
        assert_eq!(
            choose_depth_format(&DEPTH_FORMAT_CANDIDATES, |_| vk::FormatProperties::default()),
            None
        );
    }

    #[test]
    fn depth_format_ignores_linear_tiling_support() {
        let linear_only = |_: vk::Format| vk::FormatProperties {
            linear_tiling_features: vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            ..Default::default()
        };
        assert_eq!(choose_depth_format(&DEPTH_FORMAT_CANDIDATES, linear_only), None);
    }
}
