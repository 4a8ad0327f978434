// Logical device and queues
//
// Queue planning assigns one family to each role (graphics, compute,
// transfer) by a last-match scan over the family flags. Roles that land on
// the same family get distinct queue slots while the family has queues to
// spare; once it runs out, the remaining roles alias its last slot. A
// unified family with a single queue therefore yields one requested queue
// and three role handles to it.

use ash::vk;
use std::sync::Arc;

use super::error::{DeviceError, Result, VkContext};
use super::handle::Owned;
use super::selector::{Candidate, QueueFamilyInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueRole {
    Graphics,
    Compute,
    Transfer,
}

impl QueueRole {
    pub const ALL: [QueueRole; 3] = [Self::Graphics, Self::Compute, Self::Transfer];

    pub fn flag(self) -> vk::QueueFlags {
        match self {
            Self::Graphics => vk::QueueFlags::GRAPHICS,
            Self::Compute => vk::QueueFlags::COMPUTE,
            Self::Transfer => vk::QueueFlags::TRANSFER,
        }
    }
}

/// A queue position: family index and index within the family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSlot {
    pub family: u32,
    pub index: u32,
}

/// Number of queues to create from one family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyRequest {
    pub family: u32,
    pub count: u32,
}

/// Role-to-queue assignment plus the per-family create requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePlan {
    pub graphics: QueueSlot,
    pub compute: QueueSlot,
    pub transfer: QueueSlot,
    pub requests: Vec<FamilyRequest>,
}

impl QueuePlan {
    /// Plan queues for a device's families.
    ///
    /// When `windowed`, the graphics role only considers families that can
    /// present to the surface.
    pub fn new(families: &[QueueFamilyInfo], windowed: bool) -> Result<Self> {
        let [graphics, compute, transfer] =
            QueueRole::ALL.map(|role| family_for(families, role, windowed));
        let assigned = [graphics?, compute?, transfer?];

        let mut roles_per_family = vec![0u32; families.len()];
        let ordinals = assigned.map(|family| {
            let ordinal = roles_per_family[family as usize];
            roles_per_family[family as usize] += 1;
            ordinal
        });

        let requests: Vec<FamilyRequest> = roles_per_family
            .iter()
            .zip(families)
            .enumerate()
            .filter(|(_, (roles, _))| **roles > 0)
            .map(|(family, (roles, info))| FamilyRequest {
                family: family as u32,
                count: (*roles).min(info.queue_count.max(1)),
            })
            .collect();

        let slot = |role: usize| {
            let family = assigned[role];
            let count = requests
                .iter()
                .find(|r| r.family == family)
                .map_or(1, |r| r.count);
            QueueSlot {
                family,
                index: ordinals[role].min(count - 1),
            }
        };

        let plan = Self {
            graphics: slot(0),
            compute: slot(1),
            transfer: slot(2),
            requests,
        };
        plan.validate(families)?;
        Ok(plan)
    }

    /// Reject any family asked for more queues than it reports.
    pub fn validate(&self, families: &[QueueFamilyInfo]) -> Result<()> {
        for request in &self.requests {
            let available = families
                .get(request.family as usize)
                .map_or(0, |family| family.queue_count);
            if request.count > available {
                return Err(DeviceError::QueueOversubscribed {
                    family: request.family,
                    requested: request.count,
                    available,
                });
            }
        }
        Ok(())
    }

    pub fn slot(&self, role: QueueRole) -> QueueSlot {
        match role {
            QueueRole::Graphics => self.graphics,
            QueueRole::Compute => self.compute,
            QueueRole::Transfer => self.transfer,
        }
    }
}

fn family_for(families: &[QueueFamilyInfo], role: QueueRole, windowed: bool) -> Result<u32> {
    families
        .iter()
        .enumerate()
        .rev()
        .find(|(_, family)| {
            family.flags.contains(role.flag())
                && (role != QueueRole::Graphics || !windowed || family.present)
        })
        .map(|(index, _)| index as u32)
        .ok_or(DeviceError::MissingQueueRole(role))
}

/// Destroys the logical device when dropped. Declared last in
/// [`LogicalDevice`] so every pool is gone first.
struct DeviceGuard(Arc<ash::Device>);

impl Drop for DeviceGuard {
    fn drop(&mut self) {
        unsafe { self.0.destroy_device(None) };
        log::debug!("Logical device destroyed");
    }
}

/// Logical device, one queue handle per role, and one command pool per role.
pub(crate) struct LogicalDevice {
    graphics_pool: Owned<vk::CommandPool>,
    compute_pool: Owned<vk::CommandPool>,
    transfer_pool: Owned<vk::CommandPool>,
    graphics_queue: vk::Queue,
    compute_queue: vk::Queue,
    transfer_queue: vk::Queue,
    plan: QueuePlan,
    device: DeviceGuard,
}

impl LogicalDevice {
    pub fn new(instance: &ash::Instance, physical: &Candidate, windowed: bool) -> Result<Self> {
        let plan = QueuePlan::new(&physical.families, windowed)?;
        log::debug!("Queue plan: {:?}", plan);

        let priorities: Vec<Vec<f32>> = plan
            .requests
            .iter()
            .map(|request| vec![1.0; request.count as usize])
            .collect();

        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = plan
            .requests
            .iter()
            .zip(&priorities)
            .map(|(request, priorities)| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(request.family)
                    .queue_priorities(priorities)
            })
            .collect();

        let extensions = [ash::khr::swapchain::NAME.as_ptr()];

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions);

        let device = unsafe { instance.create_device(physical.handle, &create_info, None) }
            .vk_context("vkCreateDevice")?;
        let device = DeviceGuard(Arc::new(device));

        let graphics_pool = create_pool(&device.0, plan.graphics.family)?;
        let compute_pool = create_pool(&device.0, plan.compute.family)?;
        let transfer_pool = create_pool(&device.0, plan.transfer.family)?;

        let queue = |slot: QueueSlot| unsafe { device.0.get_device_queue(slot.family, slot.index) };
        let graphics_queue = queue(plan.graphics);
        let compute_queue = queue(plan.compute);
        let transfer_queue = queue(plan.transfer);

        Ok(Self {
            graphics_pool,
            compute_pool,
            transfer_pool,
            graphics_queue,
            compute_queue,
            transfer_queue,
            plan,
            device,
        })
    }

    pub fn device(&self) -> &Arc<ash::Device> {
        &self.device.0
    }

    pub fn plan(&self) -> &QueuePlan {
        &self.plan
    }

    pub fn queue(&self, role: QueueRole) -> vk::Queue {
        match role {
            QueueRole::Graphics => self.graphics_queue,
            QueueRole::Compute => self.compute_queue,
            QueueRole::Transfer => self.transfer_queue,
        }
    }

    pub fn pool(&self, role: QueueRole) -> vk::CommandPool {
        match role {
            QueueRole::Graphics => self.graphics_pool.handle(),
            QueueRole::Compute => self.compute_pool.handle(),
            QueueRole::Transfer => self.transfer_pool.handle(),
        }
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.0.device_wait_idle() }.vk_context("vkDeviceWaitIdle")
    }
}

fn create_pool(device: &Arc<ash::Device>, family: u32) -> Result<Owned<vk::CommandPool>> {
    let create_info = vk::CommandPoolCreateInfo::default()
        .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
        .queue_family_index(family);

    let pool = unsafe { device.create_command_pool(&create_info, None) }
        .vk_context("vkCreateCommandPool")?;
    Ok(Owned::new(device, pool))
}
