// Buffer utilities for vertex data
//
// Host-visible buffers allocated through gpu-allocator and filled once at
// creation.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;

use super::Device;
use crate::error::{RenderError, RenderResult};

pub struct VertexBuffer<'d> {
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: vk::DeviceSize,
    vertex_count: u32,
    device: &'d Device,
}

impl<'d> VertexBuffer<'d> {
    /// Create a buffer sized for `vertices` and copy them in
    pub fn new<T: bytemuck::Pod>(device: &'d Device, vertices: &[T]) -> RenderResult<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        if bytes.is_empty() {
            return Err(RenderError::Allocation(
                gpu_allocator::AllocationError::InvalidAllocationCreateDesc,
            ));
        }
        let size = bytes.len() as vk::DeviceSize;

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(vk::BufferUsageFlags::VERTEX_BUFFER)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let mut this = Self {
            buffer: unsafe { device.handle().create_buffer(&buffer_info, None) }?,
            allocation: None,
            size,
            vertex_count: vertices.len() as u32,
            device,
        };

        let requirements = unsafe { device.handle().get_buffer_memory_requirements(this.buffer) };
        let allocation = device.allocator().lock().allocate(&AllocationCreateDesc {
            name: "vertex buffer",
            requirements,
            location: MemoryLocation::CpuToGpu,
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })?;

        let allocation = this.allocation.insert(allocation);
        unsafe {
            device
                .handle()
                .bind_buffer_memory(this.buffer, allocation.memory(), allocation.offset())
        }?;

        let mapped = allocation
            .mapped_ptr()
            .ok_or(RenderError::Vulkan(vk::Result::ERROR_MEMORY_MAP_FAILED))?;

        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.as_ptr() as *mut u8, bytes.len());
        }

        log::debug!(
            "Created vertex buffer: {} vertices, {} bytes",
            this.vertex_count,
            this.size
        );

        Ok(this)
    }

    /// Record a bind at binding 0
    pub fn bind(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device
                .handle()
                .cmd_bind_vertex_buffers(command_buffer, 0, &[self.buffer], &[0])
        };
    }

    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}

impl Drop for VertexBuffer<'_> {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_buffer(self.buffer, None) };
        if let Some(allocation) = self.allocation.take() {
            if let Err(e) = self.device.allocator().lock().free(allocation) {
                log::error!("Failed to free vertex buffer allocation: {:?}", e);
            }
        }
    }
}
