// Graphics pipeline creation and management
//
// The graphics pipeline defines how vertices are processed and rasterized.
// It includes: vertex input, shaders, rasterization, depth/stencil, blending.

use ash::vk;
use std::path::Path;

use super::shader::{self, ShaderModule};
use super::Device;
use crate::error::{RenderError, RenderResult};

const ENTRY_POINT: &std::ffi::CStr = c"main";

/// Vertex buffer layout as declared by whoever produces the vertices
#[derive(Debug, Clone, Default)]
pub struct VertexInputLayout {
    pub bindings: Vec<vk::VertexInputBindingDescription>,
    pub attributes: Vec<vk::VertexInputAttributeDescription>,
}

/// Fixed-function state for one pipeline.
///
/// Every member is plain data with null `p_next`, so two configs built from
/// the same inputs compare equal field for field. The layout and render pass
/// start null and must be filled in before linking.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub viewport: vk::Viewport,
    pub scissor: vk::Rect2D,
    pub input_assembly: vk::PipelineInputAssemblyStateCreateInfo,
    pub rasterization: vk::PipelineRasterizationStateCreateInfo,
    pub multisample: vk::PipelineMultisampleStateCreateInfo,
    pub color_blend_attachment: vk::PipelineColorBlendAttachmentState,
    pub blend_constants: [f32; 4],
    pub depth_stencil: vk::PipelineDepthStencilStateCreateInfo,
    pub pipeline_layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
}

impl PipelineConfig {
    /// Opaque triangle list covering exactly `width` x `height`, depth tested
    pub fn default_for(width: u32, height: u32) -> Self {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D { width, height },
        };

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false)
            .build();

        let rasterization = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false)
            .build();

        // Multisampling (disabled)
        let multisample = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .min_sample_shading(1.0)
            .alpha_to_coverage_enable(false)
            .alpha_to_one_enable(false)
            .build();

        // Color blending (no blending, opaque)
        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .src_color_blend_factor(vk::BlendFactor::ONE)
            .dst_color_blend_factor(vk::BlendFactor::ZERO)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
            .build();

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS) // Closer objects win
            .depth_bounds_test_enable(false)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0)
            .stencil_test_enable(false)
            .build();

        Self {
            viewport,
            scissor,
            input_assembly,
            rasterization,
            multisample,
            color_blend_attachment,
            blend_constants: [0.0; 4],
            depth_stencil,
            pipeline_layout: vk::PipelineLayout::null(),
            render_pass: vk::RenderPass::null(),
            subpass: 0,
        }
    }

    /// Panics unless a layout and a render pass have been provided
    pub fn check_linkable(&self) {
        assert!(
            self.pipeline_layout != vk::PipelineLayout::null(),
            "cannot create graphics pipeline: no pipeline layout in config"
        );
        assert!(
            self.render_pass != vk::RenderPass::null(),
            "cannot create graphics pipeline: no render pass in config"
        );
    }
}

/// Empty pipeline layout: no descriptor sets, no push constants
pub struct PipelineLayout<'d> {
    handle: vk::PipelineLayout,
    device: &'d Device,
}

impl<'d> PipelineLayout<'d> {
    pub fn new(device: &'d Device) -> RenderResult<Self> {
        let layout_info = vk::PipelineLayoutCreateInfo::builder();

        let handle = unsafe { device.handle().create_pipeline_layout(&layout_info, None) }
            .map_err(|e| RenderError::PipelineCreation(format!("vkCreatePipelineLayout: {e}")))?;

        Ok(Self { handle, device })
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.handle
    }
}

impl Drop for PipelineLayout<'_> {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_pipeline_layout(self.handle, None) };
    }
}

/// Linked, immutable graphics pipeline. Owns its shader modules.
pub struct GraphicsPipeline<'d> {
    pipeline: vk::Pipeline,
    vertex_shader: ShaderModule<'d>,
    fragment_shader: ShaderModule<'d>,
    device: &'d Device,
}

impl<'d> GraphicsPipeline<'d> {
    /// Link `vertex_code` and `fragment_code` against `config`.
    ///
    /// # Panics
    ///
    /// If `config` has no pipeline layout or render pass. Checked before any
    /// driver call.
    pub fn new(
        device: &'d Device,
        vertex_code: &[u8],
        fragment_code: &[u8],
        config: &PipelineConfig,
        vertex_layout: &VertexInputLayout,
    ) -> RenderResult<Self> {
        config.check_linkable();

        let vertex_shader = ShaderModule::new(device, vertex_code)?;
        let fragment_shader = ShaderModule::new(device, fragment_code)?;

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_shader.handle())
                .name(ENTRY_POINT)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment_shader.handle())
                .name(ENTRY_POINT)
                .build(),
        ];

        let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&vertex_layout.bindings)
            .vertex_attribute_descriptions(&vertex_layout.attributes);

        let viewports = [config.viewport];
        let scissors = [config.scissor];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(&viewports)
            .scissors(&scissors);

        let color_blend_attachments = [config.color_blend_attachment];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments)
            .blend_constants(config.blend_constants);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_info)
            .input_assembly_state(&config.input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&config.rasterization)
            .multisample_state(&config.multisample)
            .depth_stencil_state(&config.depth_stencil)
            .color_blend_state(&color_blending)
            .layout(config.pipeline_layout)
            .render_pass(config.render_pass)
            .subpass(config.subpass)
            .base_pipeline_index(-1)
            .build();

        let pipelines = unsafe {
            device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        }
        .map_err(|(_, e)| RenderError::PipelineCreation(format!("vkCreateGraphicsPipelines: {e}")))?;

        let pipeline = pipelines
            .into_iter()
            .next()
            .ok_or_else(|| RenderError::PipelineCreation("driver returned no pipeline".into()))?;

        log::info!("Created graphics pipeline");

        Ok(Self {
            pipeline,
            vertex_shader,
            fragment_shader,
            device,
        })
    }

    /// Same as [`GraphicsPipeline::new`], reading both shaders from disk
    pub fn from_files(
        device: &'d Device,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
        config: &PipelineConfig,
        vertex_layout: &VertexInputLayout,
    ) -> RenderResult<Self> {
        config.check_linkable();

        let vertex_code = shader::read_shader_file(vertex_path)?;
        let fragment_code = shader::read_shader_file(fragment_path)?;

        Self::new(device, &vertex_code, &fragment_code, config, vertex_layout)
    }

    /// Record a bind of this pipeline into `command_buffer`
    pub fn bind(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device.handle().cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline,
            )
        };
    }

    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn shader_modules(&self) -> [vk::ShaderModule; 2] {
        [self.vertex_shader.handle(), self.fragment_shader.handle()]
    }
}

impl Drop for GraphicsPipeline<'_> {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_pipeline(self.pipeline, None) };
        log::debug!("Destroyed graphics pipeline");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_is_deterministic() {
        let a = PipelineConfig::default_for(800, 600);
        let b = PipelineConfig::default_for(800, 600);
        // All pointers inside are null, so the debug dump is a faithful dump
        assert_eq!(format!("{a:?}"), format!("{b:?}"));
    }

    #[test]
    fn default_config_covers_the_target_exactly() {
        let config = PipelineConfig::default_for(1280, 720);
        assert_eq!(config.viewport.width, 1280.0);
        assert_eq!(config.viewport.height, 720.0);
        assert_eq!(config.scissor.offset, vk::Offset2D { x: 0, y: 0 });
        assert_eq!(config.scissor.extent, vk::Extent2D { width: 1280, height: 720 });
    }

    #[test]
    fn default_config_fixed_function_state() {
        let config = PipelineConfig::default_for(800, 600);
        assert_eq!(config.input_assembly.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(config.rasterization.polygon_mode, vk::PolygonMode::FILL);
        assert_eq!(config.rasterization.cull_mode, vk::CullModeFlags::NONE);
        assert_eq!(config.multisample.rasterization_samples, vk::SampleCountFlags::TYPE_1);
        assert_eq!(config.color_blend_attachment.blend_enable, vk::FALSE);
        assert_eq!(config.color_blend_attachment.color_write_mask, vk::ColorComponentFlags::RGBA);
        assert_eq!(config.depth_stencil.depth_test_enable, vk::TRUE);
        assert_eq!(config.depth_stencil.depth_write_enable, vk::TRUE);
        assert_eq!(config.depth_stencil.depth_compare_op, vk::CompareOp::LESS);
        assert_eq!(config.depth_stencil.stencil_test_enable, vk::FALSE);
        assert_eq!(config.pipeline_layout, vk::PipelineLayout::null());
        assert_eq!(config.render_pass, vk::RenderPass::null());
    }

    #[test]
    #[should_panic(expected = "no render pass")]
    fn null_render_pass_fails_fast() {
        let mut config = PipelineConfig::default_for(800, 600);
        config.pipeline_layout = vk::PipelineLayout::from_raw(0x1);
        config.check_linkable();
    }

    #[test]
    #[should_panic(expected = "no pipeline layout")]
    fn null_layout_fails_fast() {
        let mut config = PipelineConfig::default_for(800, 600);
        config.render_pass = vk::RenderPass::from_raw(0x1);
        config.check_linkable();
    }

    #[test]
    fn complete_config_is_linkable() {
        let mut config = PipelineConfig::default_for(800, 600);
        config.pipeline_layout = vk::PipelineLayout::from_raw(0x1);
        config.render_pass = vk::RenderPass::from_raw(0x2);
        config.check_linkable();
    }
}
