// Adapter (physical GPU) description and selection rules
//
// Everything here works on plain data gathered from the driver, so the
// selection policy can be exercised without a GPU.

use ash::vk;
use std::ffi::{CStr, CString};

use crate::error::RenderResult;

/// One queue family as reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamily {
    pub flags: vk::QueueFlags,
    pub queue_count: u32,
    /// Can present to the window surface
    pub present: bool,
}

/// A queue family index that satisfied a capability mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndex {
    pub index: u32,
    pub capabilities: vk::QueueFlags,
}

/// Snapshot of one candidate GPU, gathered during selection
#[derive(Debug, Clone)]
pub struct PhysicalAdapterInfo {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub api_version: u32,
    pub features: vk::PhysicalDeviceFeatures,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub extensions: Vec<CString>,
    pub queue_families: Vec<QueueFamily>,
}

impl PhysicalAdapterInfo {
    pub fn is_discrete(&self) -> bool {
        self.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
    }

    pub fn supports_extension(&self, name: &CStr) -> bool {
        self.extensions.iter().any(|ext| ext.as_c_str() == name)
    }

    /// First family with at least one queue whose flags are a superset of the
    /// requested ones
    pub fn find_queue_family(&self, requirements: &AdapterRequirements) -> Option<QueueFamilyIndex> {
        self.queue_families
            .iter()
            .enumerate()
            .find(|(_, family)| {
                family.queue_count > 0
                    && family.flags.contains(requirements.queue_flags)
                    && (!requirements.present || family.present)
            })
            .map(|(i, family)| QueueFamilyIndex {
                index: i as u32,
                capabilities: family.flags,
            })
    }

    pub fn type_name(&self) -> &'static str {
        match self.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }
}

/// What an adapter must expose to be considered at all
#[derive(Debug, Clone)]
pub struct AdapterRequirements {
    pub extensions: Vec<&'static CStr>,
    pub queue_flags: vk::QueueFlags,
    pub present: bool,
}

impl AdapterRequirements {
    /// Swapchain support plus a graphics queue that can present
    pub fn presentable_graphics() -> Self {
        Self {
            extensions: vec![ash::extensions::khr::Swapchain::name()],
            queue_flags: vk::QueueFlags::GRAPHICS,
            present: true,
        }
    }

    pub fn is_satisfied_by(&self, adapter: &PhysicalAdapterInfo) -> Option<QueueFamilyIndex> {
        if !self.extensions.iter().all(|ext| adapter.supports_extension(ext)) {
            return None;
        }
        adapter.find_queue_family(self)
    }
}

/// Outcome of selection: which adapter, and which of its queue families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterChoice {
    pub adapter: usize,
    pub queue_family: QueueFamilyIndex,
}

/// Picks an adapter from `adapters` (in enumeration order).
///
/// The first qualifying adapter is taken, and every later qualifying discrete
/// adapter replaces the current pick. With several discrete GPUs the last one
/// enumerated therefore wins.
pub fn choose_adapter(
    adapters: &[PhysicalAdapterInfo],
    requirements: &AdapterRequirements,
) -> Option<AdapterChoice> {
    let mut chosen: Option<AdapterChoice> = None;

    for (i, adapter) in adapters.iter().enumerate() {
        let Some(queue_family) = requirements.is_satisfied_by(adapter) else {
            log::debug!("Adapter '{}' skipped: requirements not met", adapter.name);
            continue;
        };

        if chosen.is_none() || adapter.is_discrete() {
            chosen = Some(AdapterChoice { adapter: i, queue_family });
        }
    }

    chosen
}

/// Drops adapters whose properties could not be queried.
///
/// A driver that fails to describe one GPU should not hide the others from
/// selection.
pub fn keep_described(
    described: impl IntoIterator<Item = RenderResult<PhysicalAdapterInfo>>,
) -> Vec<PhysicalAdapterInfo> {
    described
        .into_iter()
        .enumerate()
        .filter_map(|(i, result)| match result {
            Ok(info) => Some(info),
            Err(e) => {
                log::warn!("GPU {} skipped: could not query its properties: {}", i, e);
                None
            }
        })
        .collect()
}
