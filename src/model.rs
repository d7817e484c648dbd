// Vertex layout and the fixed triangle the renderer draws

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use std::mem::{offset_of, size_of};

use crate::backend::buffer::VertexBuffer;
use crate::backend::pipeline::VertexInputLayout;
use crate::backend::Device;
use crate::error::{RenderError, RenderResult};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec2,
    pub color: Vec3,
}

impl Vertex {
    pub const fn new(position: Vec2, color: Vec3) -> Self {
        Self { position, color }
    }

    /// One interleaved binding: position at location 0, color at location 1
    pub fn input_layout() -> VertexInputLayout {
        let binding = vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        };

        let attributes = vec![
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: offset_of!(Vertex, position) as u32,
            },
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(Vertex, color) as u32,
            },
        ];

        VertexInputLayout {
            bindings: vec![binding],
            attributes,
        }
    }
}

/// Red, green and blue corners in clip space
pub const TRIANGLE: [Vertex; 3] = [
    Vertex::new(Vec2::new(0.0, -0.5), Vec3::new(1.0, 0.0, 0.0)),
    Vertex::new(Vec2::new(0.5, 0.5), Vec3::new(0.0, 1.0, 0.0)),
    Vertex::new(Vec2::new(-0.5, 0.5), Vec3::new(0.0, 0.0, 1.0)),
];

/// A triangle list needs a whole number of triangles, and at least one.
pub fn check_triangle_list(vertices: &[Vertex]) -> RenderResult<()> {
    if vertices.len() < 3 || vertices.len() % 3 != 0 {
        return Err(RenderError::InvalidModel(format!(
            "{} vertices do not form a triangle list",
            vertices.len()
        )));
    }
    Ok(())
}

/// Vertices uploaded once, drawn as a non-indexed triangle list
pub struct Model<'d> {
    vertex_buffer: VertexBuffer<'d>,
    device: &'d Device,
}

impl<'d> Model<'d> {
    pub fn new(device: &'d Device, vertices: &[Vertex]) -> RenderResult<Self> {
        check_triangle_list(vertices)?;
        let vertex_buffer = VertexBuffer::new(device, vertices)?;
        Ok(Self {
            vertex_buffer,
            device,
        })
    }

    pub fn triangle(device: &'d Device) -> RenderResult<Self> {
        Self::new(device, &TRIANGLE)
    }

    pub fn bind(&self, command_buffer: vk::CommandBuffer) {
        self.vertex_buffer.bind(command_buffer);
    }

    pub fn draw(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device
                .handle()
                .cmd_draw(command_buffer, self.vertex_buffer.vertex_count(), 1, 0, 0)
        };
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_buffer.vertex_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn layout_matches_struct() {
        let layout = Vertex::input_layout();
        assert_eq!(layout.bindings.len(), 1);
        assert_eq!(layout.bindings[0].stride, 20);
        assert_eq!(layout.bindings[0].input_rate, vk::VertexInputRate::VERTEX);

        let described: Vec<_> = layout
            .attributes
            .iter()
            .map(|a| (a.location, a.binding, a.format, a.offset))
            .collect();
        assert_eq!(
            described,
            vec![
                (0, 0, vk::Format::R32G32_SFLOAT, 0),
                (1, 0, vk::Format::R32G32B32_SFLOAT, 8),
            ]
        );
    }

    #[test]
    fn triangle_bytes_are_tightly_packed() {
        let bytes: &[u8] = bytemuck::cast_slice(&TRIANGLE);
        assert_eq!(bytes.len(), 60);

        let floats: &[f32] = bytemuck::cast_slice(&TRIANGLE);
        assert_eq!(&floats[..5], &[0.0, -0.5, 1.0, 0.0, 0.0]);
        assert_eq!(&floats[10..12], &[-0.5, 0.5]);
    }

    #[test]
    fn too_few_vertices_is_an_error() {
        let err = check_triangle_list(&TRIANGLE[..2]).unwrap_err();
        assert!(matches!(err, RenderError::InvalidModel(_)));
        assert_eq!(err.to_string(), "Invalid model: 2 vertices do not form a triangle list");
        assert!(check_triangle_list(&[]).is_err());
    }

    #[test]
    fn partial_triangle_is_an_error() {
        let four = [TRIANGLE[0], TRIANGLE[1], TRIANGLE[2], TRIANGLE[0]];
        assert!(matches!(check_triangle_list(&four), Err(RenderError::InvalidModel(_))));
    }

    #[test]
    fn whole_triangles_are_accepted() {
        assert!(check_triangle_list(&TRIANGLE).is_ok());
        let two: Vec<Vertex> = TRIANGLE.iter().chain(TRIANGLE.iter()).copied().collect();
        assert!(check_triangle_list(&two).is_ok());
    }
}
