//! Tasks
//!
//! A task binds a scheduler identity to an address space and a domain. It is
//! created `Constructed`, becomes `Running` on `start`, alternates with
//! `Suspended` while parked in a blocking call and ends `Terminated` when its
//! last reference goes away.

use crate::kernel::{Kernel, TaskContext};
use crate::object::{KernelObject, ObjectBody};
use core_types::{Handle, MapFlags, ObjectKind, Rights, TaskId};
use kernel_api::{KernelError, TaskArgs};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lifecycle phase of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskPhase {
    Constructed,
    Running,
    /// Parked in a blocking syscall
    Suspended,
    Terminated,
}

/// Register state a task was started with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EntryState {
    pub ip: u64,
    pub sp: u64,
    pub args: TaskArgs,
}

pub(crate) struct TaskState {
    pub task_id: TaskId,
    pub phase: TaskPhase,
    pub space: Option<Arc<KernelObject>>,
    pub domain: Option<Arc<KernelObject>>,
    pub entry: Option<EntryState>,
}

impl TaskState {
    /// A constructed task; the caller has already taken references on
    /// `space` and `domain`
    pub(crate) fn new(task_id: TaskId, space: Arc<KernelObject>, domain: Arc<KernelObject>) -> Self {
        Self {
            task_id,
            phase: TaskPhase::Constructed,
            space: Some(space),
            domain: Some(domain),
            entry: None,
        }
    }
}

impl Kernel {
    pub(crate) fn task_body(
        &self,
        ctx: &TaskContext,
        space: Handle,
        domain: Handle,
    ) -> Result<ObjectBody, KernelError> {
        let space = self.lookup(ctx, space, Some(ObjectKind::Space), Rights::empty())?;
        let domain = self.lookup(ctx, domain, Some(ObjectKind::Domain), Rights::empty())?;
        if !space.object.try_acquire() {
            return Err(KernelError::InvalidCapability("space destroyed".to_string()));
        }
        if !domain.object.try_acquire() {
            self.release(space.object);
            return Err(KernelError::InvalidCapability("domain destroyed".to_string()));
        }
        Ok(ObjectBody::Task(TaskState::new(
            TaskId::new(),
            space.object,
            domain.object,
        )))
    }

    pub(crate) fn sys_start(
        &self,
        ctx: &TaskContext,
        task: Handle,
        ip: u64,
        sp: u64,
        args: TaskArgs,
    ) -> Result<(), KernelError> {
        let entry = self.lookup(ctx, task, Some(ObjectKind::Task), Rights::START)?;
        let space = {
            let state = entry.object.lock();
            let bound = state
                .body
                .task()
                .filter(|_| !state.dead)
                .ok_or_else(|| KernelError::InvalidCapability(format!("{} destroyed", task)))?;
            if bound.phase != TaskPhase::Constructed {
                return Err(KernelError::AlreadyInUse(format!(
                    "task {} is {:?}",
                    bound.task_id, bound.phase
                )));
            }
            bound
                .space
                .clone()
                .ok_or_else(|| KernelError::InvalidCapability(format!("{} has no space", task)))?
        };

        if ip == 0 {
            return Err(KernelError::InvalidArgument("null entry point".to_string()));
        }
        if sp == 0 || sp % 16 != 0 {
            return Err(KernelError::InvalidArgument(format!(
                "stack pointer {:#x} is not 16-byte aligned",
                sp
            )));
        }
        {
            let state = space.lock();
            let mappings = state
                .body
                .space()
                .ok_or_else(|| KernelError::InvalidCapability("space destroyed".to_string()))?;
            let executable = mappings
                .find(ip)
                .map(|(_, flags)| flags.contains(MapFlags::EXEC))
                .unwrap_or(false);
            if !executable {
                return Err(KernelError::InvalidArgument(format!(
                    "entry point {:#x} is not in an executable mapping",
                    ip
                )));
            }
            let writable = mappings
                .find(sp - 1)
                .map(|(_, flags)| flags.contains(MapFlags::WRITE))
                .unwrap_or(false);
            if !writable {
                return Err(KernelError::InvalidArgument(format!(
                    "stack {:#x} is not in a writable mapping",
                    sp
                )));
            }
        }

        let task_id = {
            let mut state = entry.object.lock();
            let dead = state.dead;
            let bound = state
                .body
                .task_mut()
                .filter(|_| !dead)
                .ok_or_else(|| KernelError::InvalidCapability(format!("{} destroyed", task)))?;
            if bound.phase != TaskPhase::Constructed {
                return Err(KernelError::AlreadyInUse(format!(
                    "task {} is {:?}",
                    bound.task_id, bound.phase
                )));
            }
            bound.phase = TaskPhase::Running;
            bound.entry = Some(EntryState { ip, sp, args });
            bound.task_id
        };
        self.scheduler.enqueue(task_id);
        info!(
            "{} started task {} at ip={:#x} sp={:#x}",
            ctx.task_id(),
            task_id,
            ip,
            sp
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_support::boot;
    use core_types::PAGE_SIZE;
    use kernel_api::{CreateParams, KernelApi};

    struct Fixture {
        boot: crate::Boot,
        scheduler: Arc<crate::HostScheduler>,
        task: Handle,
        code: u64,
        stack_top: u64,
    }

    fn fixture() -> Fixture {
        let (boot, scheduler, _) = boot();
        let k = &boot.kernel;
        let root = &boot.root;
        let d = boot.root_domain;
        let space = k.create(root, d, CreateParams::Space).unwrap();
        let task = k
            .create(root, d, CreateParams::Task { space, domain: d })
            .unwrap();
        let code = k.create(root, d, CreateParams::memory(PAGE_SIZE)).unwrap();
        let stack = k.create(root, d, CreateParams::memory(2 * PAGE_SIZE)).unwrap();
        let code = k
            .map(root, task, None, code, 0, 0, MapFlags::READ | MapFlags::EXEC)
            .unwrap();
        let stack = k
            .map(root, task, None, stack, 0, 0, MapFlags::READ | MapFlags::WRITE)
            .unwrap();
        Fixture {
            boot,
            scheduler,
            task,
            code: code.virt,
            stack_top: stack.range().end(),
        }
    }

    #[test]
    fn test_start_runs_and_enqueues() {
        let f = fixture();
        let k = &f.boot.kernel;
        let root = &f.boot.root;
        assert_eq!(k.task_phase(root, f.task).unwrap(), TaskPhase::Constructed);

        k.start(root, f.task, f.code, f.stack_top, TaskArgs::new(1, 2, 3, 4))
            .unwrap();
        assert_eq!(k.task_phase(root, f.task).unwrap(), TaskPhase::Running);
        assert_eq!(f.scheduler.run_queue().len(), 2);

        assert!(matches!(
            k.start(root, f.task, f.code, f.stack_top, TaskArgs::default()),
            Err(KernelError::AlreadyInUse(_))
        ));
    }

    #[test]
    fn test_start_validates_registers() {
        let f = fixture();
        let k = &f.boot.kernel;
        let root = &f.boot.root;
        let cases = [
            (0, f.stack_top),
            (f.code, f.stack_top - 8),
            (f.code, 0),
            // stack is not executable
            (f.stack_top - 16, f.stack_top),
            // code is not writable
            (f.code, f.code + 16),
        ];
        for (ip, sp) in cases {
            assert!(
                matches!(
                    k.start(root, f.task, ip, sp, TaskArgs::default()),
                    Err(KernelError::InvalidArgument(_))
                ),
                "ip={:#x} sp={:#x}",
                ip,
                sp
            );
        }
        assert_eq!(k.task_phase(root, f.task).unwrap(), TaskPhase::Constructed);
    }

    #[test]
    fn test_start_needs_start_right() {
        let f = fixture();
        let k = &f.boot.kernel;
        let root = &f.boot.root;
        let weak = k.duplicate(root, f.task, Rights::MAP).unwrap();
        assert!(matches!(
            k.start(root, weak, f.code, f.stack_top, TaskArgs::default()),
            Err(KernelError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_task_creation_checks_kinds() {
        let (boot, _, _) = boot();
        let k = &boot.kernel;
        let root = &boot.root;
        let listener = k
            .create(root, boot.root_domain, CreateParams::Listener)
            .unwrap();
        assert!(matches!(
            k.create(
                root,
                boot.root_domain,
                CreateParams::Task {
                    space: listener,
                    domain: boot.root_domain
                }
            ),
            Err(KernelError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_dropping_task_terminates_it() {
        let f = fixture();
        let k = &f.boot.kernel;
        let root = &f.boot.root;
        k.start(root, f.task, f.code, f.stack_top, TaskArgs::default())
            .unwrap();
        let tasks = k.live_objects(ObjectKind::Task);
        k.drop_handle(root, f.task).unwrap();
        assert_eq!(k.live_objects(ObjectKind::Task), tasks - 1);
        assert_eq!(f.scheduler.run_queue().len(), 1);
    }
}
