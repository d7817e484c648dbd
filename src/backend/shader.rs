// Shader module loading and management
//
// Vulkan uses SPIR-V bytecode for shaders. The bytes are handed to the driver
// as-is; the driver validates them at module creation.

use ash::vk;
use std::io::Cursor;
use std::path::Path;

use super::Device;
use crate::error::{RenderError, RenderResult};

/// Read a compiled shader artifact in full
pub fn read_shader_file(path: impl AsRef<Path>) -> RenderResult<Vec<u8>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| RenderError::ShaderFileNotFound {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("Read shader {:?} ({} bytes)", path, bytes.len());
    Ok(bytes)
}

/// Repack SPIR-V bytes into aligned 32-bit words
pub fn spirv_words(code: &[u8]) -> RenderResult<Vec<u32>> {
    ash::util::read_spv(&mut Cursor::new(code))
        .map_err(|e| RenderError::PipelineCreation(format!("malformed SPIR-V blob: {e}")))
}

pub struct ShaderModule<'d> {
    handle: vk::ShaderModule,
    device: &'d Device,
}

impl<'d> ShaderModule<'d> {
    pub fn new(device: &'d Device, code: &[u8]) -> RenderResult<Self> {
        let words = spirv_words(code)?;
        let create_info = vk::ShaderModuleCreateInfo::builder().code(&words);

        let handle = unsafe { device.handle().create_shader_module(&create_info, None) }
            .map_err(|e| RenderError::PipelineCreation(format!("vkCreateShaderModule: {e}")))?;

        Ok(Self { handle, device })
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }
}

impl Drop for ShaderModule<'_> {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_shader_module(self.handle, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reads_whole_file() {
        let path = std::env::temp_dir().join("vke-renderer-shader-read.spv");
        let blob: Vec<u8> = (0u8..64).collect();
        std::fs::write(&path, &blob).unwrap();

        assert_eq!(read_shader_file(&path).unwrap(), blob);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_reports_path() {
        let path = std::env::temp_dir().join("vke-renderer-no-such-shader.spv");
        match read_shader_file(&path) {
            Err(RenderError::ShaderFileNotFound { path: reported, .. }) => {
                assert_eq!(reported, path)
            }
            other => panic!("expected ShaderFileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn words_keep_byte_order() {
        let bytes = [0x03, 0x02, 0x23, 0x07, 0x00, 0x00, 0x01, 0x00];
        assert_eq!(spirv_words(&bytes).unwrap(), vec![0x0723_0203, 0x0001_0000]);
    }

    #[test]
    fn truncated_blob_is_rejected() {
        assert!(matches!(
            spirv_words(&[0x03, 0x02, 0x23]),
            Err(RenderError::PipelineCreation(_))
        ));
    }
}
