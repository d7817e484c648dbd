// Vulkan Device - the single owning GPU context
//
// Responsibilities:
// - Instance creation with validation layers
// - Window surface (through the host window)
// - Physical device selection (see adapter.rs for the rules)
// - Logical device + queue creation
// - Memory allocator and command pool setup
//
// Everything else in the renderer borrows `&Device`, so the borrow checker
// keeps the device alive until every dependent object is gone.

use ash::{vk, Entry};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use parking_lot::Mutex;
use std::ffi::{c_char, CStr, CString};
use std::mem::ManuallyDrop;

use super::adapter::{self, AdapterRequirements, PhysicalAdapterInfo, QueueFamily, QueueFamilyIndex};
use crate::error::{RenderError, RenderResult};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Source of a presentable surface (the host window)
pub trait SurfaceProvider {
    /// Instance extensions the platform needs for surface creation
    fn required_instance_extensions(&self) -> RenderResult<Vec<*const c_char>>;

    fn create_surface(&self, entry: &Entry, instance: &ash::Instance) -> RenderResult<vk::SurfaceKHR>;

    /// Current drawable size in pixels
    fn drawable_extent(&self) -> vk::Extent2D;
}

/// Settings for device creation
#[derive(Debug, Clone)]
pub struct DeviceOptions {
    pub app_name: String,
    pub enable_validation: bool,
    pub requirements: AdapterRequirements,
}

impl DeviceOptions {
    pub fn new(app_name: &str, enable_validation: bool) -> Self {
        Self {
            app_name: app_name.to_string(),
            enable_validation,
            requirements: AdapterRequirements::presentable_graphics(),
        }
    }
}

/// Loader + instance + optional debug messenger
struct Instance {
    debug_utils: Option<(ash::extensions::ext::DebugUtils, vk::DebugUtilsMessengerEXT)>,
    instance: ash::Instance,
    entry: Entry,
}

impl Instance {
    fn new(
        app_name: &str,
        enable_validation: bool,
        surface_extensions: &[*const c_char],
    ) -> RenderResult<Self> {
        let entry = unsafe { Entry::load() }?;

        let enable_validation = enable_validation && Self::validation_available(&entry);

        let app_name_cstr = CString::new(app_name).unwrap_or_else(|_| c"vke".to_owned());
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"vke")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_1);

        let mut extensions = surface_extensions.to_vec();
        if enable_validation {
            extensions.push(ash::extensions::ext::DebugUtils::name().as_ptr());
        }

        let layer_names = if enable_validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);

        let instance = unsafe { entry.create_instance(&create_info, None) }?;

        let mut this = Self {
            debug_utils: None,
            instance,
            entry,
        };

        if enable_validation {
            this.debug_utils = Some(this.setup_debug_messenger()?);
            log::info!("Validation layers enabled");
        }

        Ok(this)
    }

    fn validation_available(entry: &Entry) -> bool {
        let available = entry
            .enumerate_instance_layer_properties()
            .unwrap_or_default()
            .iter()
            .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == VALIDATION_LAYER);

        if !available {
            log::warn!("Validation layer requested but not installed, continuing without it");
        }
        available
    }

    fn setup_debug_messenger(
        &self,
    ) -> RenderResult<(ash::extensions::ext::DebugUtils, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ash::extensions::ext::DebugUtils::new(&self.entry, &self.instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }?;

        Ok((debug_utils, messenger))
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        log::debug!("Destroyed Vulkan instance");
    }
}

/// Window surface; must be dropped before its instance
struct Surface {
    loader: ash::extensions::khr::Surface,
    handle: vk::SurfaceKHR,
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe { self.loader.destroy_surface(self.handle, None) };
        log::debug!("Destroyed window surface");
    }
}

/// The logical device and everything that lives exactly as long as it does.
///
/// IMPORTANT: field order matters. `Drop` releases the pool, allocator and
/// logical device; the surface and the instance then drop in declaration
/// order.
pub struct Device {
    command_pool: vk::CommandPool,
    allocator: ManuallyDrop<Mutex<Allocator>>,
    device: ash::Device,
    graphics_queue: vk::Queue,
    queue_family: QueueFamilyIndex,
    physical_device: vk::PhysicalDevice,
    adapter_name: String,
    surface: Surface,
    instance: Instance,
}

impl Device {
    /// Create the full device context for `window`.
    ///
    /// Fails without leaking: anything built before the failing step is
    /// released before the error is returned.
    pub fn new(window: &impl SurfaceProvider, options: &DeviceOptions) -> RenderResult<Self> {
        log::info!("Creating Vulkan device: {}", options.app_name);

        let instance = Instance::new(
            &options.app_name,
            options.enable_validation,
            &window.required_instance_extensions()?,
        )?;

        let surface = Surface {
            loader: ash::extensions::khr::Surface::new(&instance.entry, &instance.instance),
            handle: window.create_surface(&instance.entry, &instance.instance)?,
        };

        let adapter = Self::select_adapter(&instance.instance, &surface, &options.requirements)?;
        let queue_family = adapter
            .find_queue_family(&options.requirements)
            .ok_or(RenderError::NoCompatibleAdapter)?;

        let (major, minor, patch) = (
            vk::api_version_major(adapter.api_version),
            vk::api_version_minor(adapter.api_version),
            vk::api_version_patch(adapter.api_version),
        );
        log::info!("Selected GPU: {} ({})", adapter.name, adapter.type_name());
        log::info!("API Version: {}.{}.{}", major, minor, patch);

        let (device, graphics_queue) = Self::create_logical_device(
            &instance.instance,
            &adapter,
            queue_family,
            &options.requirements.extensions,
        )?;

        let allocator = match Self::create_allocator(&instance.instance, adapter.handle, &device) {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(e);
            }
        };

        let command_pool = match Self::create_command_pool(&device, queue_family) {
            Ok(pool) => pool,
            Err(e) => {
                drop(allocator);
                unsafe { device.destroy_device(None) };
                return Err(e);
            }
        };

        Ok(Self {
            command_pool,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            device,
            graphics_queue,
            queue_family,
            physical_device: adapter.handle,
            adapter_name: adapter.name,
            surface,
            instance,
        })
    }

    fn select_adapter(
        instance: &ash::Instance,
        surface: &Surface,
        requirements: &AdapterRequirements,
    ) -> RenderResult<PhysicalAdapterInfo> {
        let handles = unsafe { instance.enumerate_physical_devices() }?;
        log::info!("Found {} GPU(s)", handles.len());

        let mut adapters = adapter::keep_described(
            handles
                .into_iter()
                .map(|handle| Self::describe_adapter(instance, surface, handle)),
        );

        let choice = adapter::choose_adapter(&adapters, requirements)
            .ok_or(RenderError::NoCompatibleAdapter)?;

        Ok(adapters.swap_remove(choice.adapter))
    }

    /// Gather everything selection needs to know about one GPU
    fn describe_adapter(
        instance: &ash::Instance,
        surface: &Surface,
        handle: vk::PhysicalDevice,
    ) -> RenderResult<PhysicalAdapterInfo> {
        let properties = unsafe { instance.get_physical_device_properties(handle) };
        let features = unsafe { instance.get_physical_device_features(handle) };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(handle) };

        let extensions = unsafe { instance.enumerate_device_extension_properties(handle) }?
            .iter()
            .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }.to_owned())
            .collect();

        let queue_families = unsafe { instance.get_physical_device_queue_family_properties(handle) }
            .iter()
            .enumerate()
            .map(|(i, family)| {
                let present = unsafe {
                    surface
                        .loader
                        .get_physical_device_surface_support(handle, i as u32, surface.handle)
                }
                .unwrap_or(false);
                QueueFamily {
                    flags: family.queue_flags,
                    queue_count: family.queue_count,
                    present,
                }
            })
            .collect();

        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        Ok(PhysicalAdapterInfo {
            handle,
            name,
            device_type: properties.device_type,
            api_version: properties.api_version,
            features,
            memory_properties,
            extensions,
            queue_families,
        })
    }

    /// One queue from `queue_family` at priority 1.0.
    ///
    /// The driver can still reject an extension here even though enumeration
    /// listed it; that surfaces as `DeviceCreation`.
    fn create_logical_device(
        instance: &ash::Instance,
        adapter: &PhysicalAdapterInfo,
        queue_family: QueueFamilyIndex,
        extensions: &[&CStr],
    ) -> RenderResult<(ash::Device, vk::Queue)> {
        let queue_priorities = [1.0];
        let queue_create_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(queue_family.index)
            .queue_priorities(&queue_priorities)
            .build();

        let extension_names: Vec<*const c_char> = extensions.iter().map(|e| e.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(std::slice::from_ref(&queue_create_info))
            .enabled_extension_names(&extension_names)
            .enabled_features(&adapter.features);

        let device = unsafe { instance.create_device(adapter.handle, &create_info, None) }
            .map_err(RenderError::DeviceCreation)?;

        let graphics_queue = unsafe { device.get_device_queue(queue_family.index, 0) };

        Ok((device, graphics_queue))
    }

    fn create_allocator(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: &ash::Device,
    ) -> RenderResult<Allocator> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?;

        Ok(allocator)
    }

    /// Command buffers from this pool can be reset one at a time
    fn create_command_pool(
        device: &ash::Device,
        queue_family: QueueFamilyIndex,
    ) -> RenderResult<vk::CommandPool> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(queue_family.index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let pool = unsafe { device.create_command_pool(&pool_info, None) }?;
        Ok(pool)
    }

    /// First of `candidates` usable as an optimal-tiling depth attachment
    pub fn find_depth_format(&self, candidates: &[vk::Format]) -> RenderResult<vk::Format> {
        super::swapchain::choose_depth_format(candidates, |format| unsafe {
            self.instance
                .instance
                .get_physical_device_format_properties(self.physical_device, format)
        })
        .ok_or_else(|| RenderError::SwapChainCreation("no supported depth format".to_string()))
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> RenderResult<()> {
        unsafe { self.device.device_wait_idle() }?;
        Ok(())
    }

    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn instance(&self) -> &ash::Instance {
        &self.instance.instance
    }

    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    #[inline]
    pub fn queue_family(&self) -> QueueFamilyIndex {
        self.queue_family
    }

    #[inline]
    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    #[inline]
    pub fn allocator(&self) -> &Mutex<Allocator> {
        &self.allocator
    }

    #[inline]
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface.handle
    }

    #[inline]
    pub fn surface_loader(&self) -> &ash::extensions::khr::Surface {
        &self.surface.loader
    }
}

/// Logs a failed idle wait during teardown; destruction goes ahead regardless.
/// Returns whether the wait failed.
pub(crate) fn log_idle_failure(owner: &str, result: RenderResult<()>) -> bool {
    match result {
        Ok(()) => false,
        Err(e) => {
            log::error!("{} teardown: wait for device idle failed: {}", owner, e);
            true
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        log_idle_failure("Device", self.wait_idle());

        unsafe {
            self.device.destroy_command_pool(self.command_pool, None);
            // Allocator frees its memory blocks through the device
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
        }
    }
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn teardown_reports_failed_idle_wait() {
        assert!(log_idle_failure(
            "Device",
            Err(RenderError::Vulkan(vk::Result::ERROR_DEVICE_LOST))
        ));
        assert!(!log_idle_failure("Device", Ok(())));
    }
}
