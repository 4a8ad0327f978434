// Physical device selection
//
// Every accelerator is reduced to a `Candidate`: its type, total
// device-local memory, and the queue families it exposes (with present
// support against the window's surface, if there is one). Filtering and
// ranking then run on plain data.
//
// Ranking key: (type rank, device-local bytes). Discrete beats integrated
// beats everything else; memory size breaks ties. If the key still ties,
// the last candidate in enumeration order wins.

use ash::vk;
use std::ffi::CStr;

use super::error::{DeviceError, Result, VkContext};

/// Capabilities every selected device must expose across its queue families.
pub const REQUIRED_QUEUE_FLAGS: vk::QueueFlags = vk::QueueFlags::from_raw(
    vk::QueueFlags::GRAPHICS.as_raw()
        | vk::QueueFlags::COMPUTE.as_raw()
        | vk::QueueFlags::TRANSFER.as_raw(),
);

/// Preference order of device types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceRank {
    Other = 0,
    Integrated = 1,
    Discrete = 2,
}

impl From<vk::PhysicalDeviceType> for DeviceRank {
    fn from(ty: vk::PhysicalDeviceType) -> Self {
        match ty {
            vk::PhysicalDeviceType::DISCRETE_GPU => Self::Discrete,
            vk::PhysicalDeviceType::INTEGRATED_GPU => Self::Integrated,
            _ => Self::Other,
        }
    }
}

/// One queue family as seen by selection and queue planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyInfo {
    pub flags: vk::QueueFlags,
    pub queue_count: u32,
    /// Can present to the window's surface. Always false when headless.
    pub present: bool,
}

/// An enumerated accelerator.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub rank: DeviceRank,
    pub device_local_bytes: u64,
    pub api_version: u32,
    pub families: Vec<QueueFamilyInfo>,
}

impl Candidate {
    /// Union of the capability flags of all families.
    pub fn combined_flags(&self) -> vk::QueueFlags {
        self.families
            .iter()
            .fold(vk::QueueFlags::empty(), |acc, family| acc | family.flags)
    }

    /// Graphics, compute and transfer across its families, plus a
    /// present-capable graphics family when a window is attached.
    pub fn is_suitable(&self, windowed: bool) -> bool {
        if !self.combined_flags().contains(REQUIRED_QUEUE_FLAGS) {
            return false;
        }
        !windowed
            || self
                .families
                .iter()
                .any(|family| family.present && family.flags.contains(vk::QueueFlags::GRAPHICS))
    }

    pub fn score(&self) -> (DeviceRank, u64) {
        (self.rank, self.device_local_bytes)
    }
}

/// Pick the best suitable candidate.
pub fn pick_best(candidates: Vec<Candidate>, windowed: bool) -> Result<Candidate> {
    candidates
        .into_iter()
        .filter(|candidate| candidate.is_suitable(windowed))
        .max_by_key(Candidate::score)
        .ok_or(DeviceError::NoSuitableDevice)
}

/// Describe every physical device on the instance.
///
/// `surface` is the window's surface; headless callers pass `None`.
pub(crate) fn enumerate(
    instance: &ash::Instance,
    surface: Option<(&ash::khr::surface::Instance, vk::SurfaceKHR)>,
) -> Result<Vec<Candidate>> {
    let devices = unsafe { instance.enumerate_physical_devices() }
        .vk_context("vkEnumeratePhysicalDevices")?;

    devices
        .into_iter()
        .map(|device| describe(instance, device, surface))
        .collect()
}

fn describe(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: Option<(&ash::khr::surface::Instance, vk::SurfaceKHR)>,
) -> Result<Candidate> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let memory = unsafe { instance.get_physical_device_memory_properties(device) };
    let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let device_local_bytes = memory
        .memory_heaps
        .iter()
        .take(memory.memory_heap_count as usize)
        .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
        .map(|heap| heap.size)
        .sum();

    let families = queue_families
        .iter()
        .enumerate()
        .map(|(index, family)| {
            let present = match surface {
                Some((loader, surface)) => unsafe {
                    loader.get_physical_device_surface_support(device, index as u32, surface)
                }
                .vk_context("vkGetPhysicalDeviceSurfaceSupportKHR")?,
                None => false,
            };
            Ok(QueueFamilyInfo {
                flags: family.queue_flags,
                queue_count: family.queue_count,
                present,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned();

    log::debug!(
        "Found GPU: {} ({:?}, {} MiB device-local, {} queue families)",
        name,
        properties.device_type,
        device_local_bytes / (1024 * 1024),
        families.len()
    );

    Ok(Candidate {
        handle: device,
        name,
        rank: properties.device_type.into(),
        device_local_bytes,
        api_version: properties.api_version,
        families,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    const GIB: u64 = 1024 * 1024 * 1024;

    fn unified(present: bool) -> QueueFamilyInfo {
        QueueFamilyInfo {
            flags: REQUIRED_QUEUE_FLAGS,
            queue_count: 1,
            present,
        }
    }

    fn candidate(id: u64, rank: DeviceRank, memory: u64, families: Vec<QueueFamilyInfo>) -> Candidate {
        Candidate {
            handle: vk::PhysicalDevice::from_raw(id),
            name: format!("gpu-{id}"),
            rank,
            device_local_bytes: memory,
            api_version: vk::API_VERSION_1_3,
            families,
        }
    }

    fn picked(candidates: Vec<Candidate>, windowed: bool) -> u64 {
        pick_best(candidates, windowed).unwrap().handle.as_raw()
    }

    #[test]
    fn discrete_wins_over_integrated_with_more_memory() {
        let devices = vec![
            candidate(1, DeviceRank::Integrated, 16 * GIB, vec![unified(false)]),
            candidate(2, DeviceRank::Discrete, 4 * GIB, vec![unified(false)]),
            candidate(3, DeviceRank::Other, 64 * GIB, vec![unified(false)]),
        ];
        assert_eq!(picked(devices, false), 2);
    }

    #[test]
    fn memory_breaks_rank_ties() {
        let devices = vec![
            candidate(1, DeviceRank::Discrete, 8 * GIB, vec![unified(false)]),
            candidate(2, DeviceRank::Discrete, 12 * GIB, vec![unified(false)]),
            candidate(3, DeviceRank::Discrete, 6 * GIB, vec![unified(false)]),
        ];
        assert_eq!(picked(devices, false), 2);
    }

    #[test]
    fn full_tie_picks_last_enumerated() {
        let devices = vec![
            candidate(1, DeviceRank::Integrated, 2 * GIB, vec![unified(false)]),
            candidate(2, DeviceRank::Integrated, 2 * GIB, vec![unified(false)]),
        ];
        assert_eq!(picked(devices.clone(), false), 2);
        // Same input, same answer.
        assert_eq!(picked(devices, false), 2);
    }

    #[test]
    fn capabilities_may_be_spread_across_families() {
        let split = vec![
            QueueFamilyInfo {
                flags: vk::QueueFlags::GRAPHICS,
                queue_count: 1,
                present: false,
            },
            QueueFamilyInfo {
                flags: vk::QueueFlags::COMPUTE,
                queue_count: 1,
                present: false,
            },
            QueueFamilyInfo {
                flags: vk::QueueFlags::TRANSFER,
                queue_count: 1,
                present: false,
            },
        ];
        assert!(candidate(1, DeviceRank::Discrete, GIB, split).is_suitable(false));
    }

    #[test]
    fn devices_missing_a_capability_are_filtered() {
        let compute_only = vec![QueueFamilyInfo {
            flags: vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            queue_count: 4,
            present: false,
        }];
        let devices = vec![
            candidate(1, DeviceRank::Discrete, 24 * GIB, compute_only),
            candidate(2, DeviceRank::Other, GIB, vec![unified(false)]),
        ];
        assert_eq!(picked(devices, false), 2);
    }

    #[test]
    fn windowed_requires_present_on_a_graphics_family() {
        let present_on_compute = vec![
            QueueFamilyInfo {
                flags: REQUIRED_QUEUE_FLAGS,
                queue_count: 1,
                present: false,
            },
            QueueFamilyInfo {
                flags: vk::QueueFlags::COMPUTE,
                queue_count: 1,
                present: true,
            },
        ];
        let device = candidate(1, DeviceRank::Discrete, GIB, present_on_compute);
        assert!(device.is_suitable(false));
        assert!(!device.is_suitable(true));

        let devices = vec![
            device,
            candidate(2, DeviceRank::Integrated, GIB, vec![unified(true)]),
        ];
        assert_eq!(picked(devices, true), 2);
    }

    #[test]
    fn no_survivors_is_an_error() {
        assert!(matches!(
            pick_best(Vec::new(), false),
            Err(DeviceError::NoSuitableDevice)
        ));

        let graphics_only = vec![QueueFamilyInfo {
            flags: vk::QueueFlags::GRAPHICS,
            queue_count: 1,
            present: true,
        }];
        assert!(matches!(
            pick_best(vec![candidate(1, DeviceRank::Discrete, GIB, graphics_only)], true),
            Err(DeviceError::NoSuitableDevice)
        ));
    }

    #[test]
    fn rank_from_device_type() {
        assert_eq!(DeviceRank::from(vk::PhysicalDeviceType::DISCRETE_GPU), DeviceRank::Discrete);
        assert_eq!(DeviceRank::from(vk::PhysicalDeviceType::INTEGRATED_GPU), DeviceRank::Integrated);
        assert_eq!(DeviceRank::from(vk::PhysicalDeviceType::VIRTUAL_GPU), DeviceRank::Other);
        assert_eq!(DeviceRank::from(vk::PhysicalDeviceType::CPU), DeviceRank::Other);
    }
}
