//! Domains: capability tables and creation scopes
//!
//! Also home of the handle-management syscalls (`create`, `label`, `drop`,
//! `duplicate`, `duplicate_into`) and `log`, which only touch tables and
//! object metadata.

use crate::cap_table::{CapEntry, CapTable};
use crate::channel::ChannelState;
use crate::kernel::{Kernel, TaskContext};
use crate::object::ObjectBody;
use crate::port_io::PortRange;
use crate::address_space::SpaceState;
use core_types::{CapabilityEvent, Handle, ObjectKind, Rights};
use kernel_api::{CreateParams, KernelError};
use log::{debug, info};

pub(crate) struct DomainState {
    pub table: CapTable,
    /// Bytes of memory objects this domain may have charged to it
    pub quota: Option<u64>,
    pub charged: u64,
}

impl DomainState {
    pub(crate) fn new(capacity: usize, quota: Option<u64>) -> Self {
        Self {
            table: CapTable::new(capacity),
            quota,
            charged: 0,
        }
    }

    pub(crate) fn charge(&mut self, bytes: u64) -> Result<(), KernelError> {
        let total = self
            .charged
            .checked_add(bytes)
            .ok_or_else(|| KernelError::ResourceExhausted("quota overflow".to_string()))?;
        if let Some(quota) = self.quota {
            if total > quota {
                return Err(KernelError::ResourceExhausted(format!(
                    "quota exceeded: {} of {} bytes in use, {} requested",
                    self.charged, quota, bytes
                )));
            }
        }
        self.charged = total;
        Ok(())
    }

    pub(crate) fn credit(&mut self, bytes: u64) {
        self.charged = self.charged.saturating_sub(bytes);
    }
}

impl Kernel {
    pub(crate) fn sys_create(
        &self,
        ctx: &TaskContext,
        dest: Handle,
        params: CreateParams,
    ) -> Result<Handle, KernelError> {
        let scope = self.lookup(ctx, dest, Some(ObjectKind::Domain), Rights::CREATE)?;
        let kind = params.kind();
        let body = match params {
            CreateParams::Domain { quota } => {
                ObjectBody::Domain(DomainState::new(self.config.max_handles, quota))
            }
            CreateParams::Task { space, domain } => self.task_body(ctx, space, domain)?,
            CreateParams::Space => ObjectBody::Space(SpaceState::default()),
            CreateParams::Memory { size } => self.memory_body(&scope.object, size)?,
            CreateParams::Channel { depth, mode } => {
                if depth == 0 || depth > self.config.max_channel_depth {
                    return Err(KernelError::InvalidArgument(format!(
                        "channel depth {} outside 1..={}",
                        depth, self.config.max_channel_depth
                    )));
                }
                ObjectBody::Channel(ChannelState::new(depth, mode))
            }
            CreateParams::PortIo { base, len } => ObjectBody::PortIo(PortRange::new(base, len)?),
            CreateParams::Listener => ObjectBody::listener(),
        };

        let object = self.new_object(kind, body);
        let id = object.id();
        let handle = self.install(
            &ctx.domain,
            CapEntry {
                object,
                rights: kind.default_rights(),
            },
        )?;
        self.audit(CapabilityEvent::Created {
            domain: ctx.domain_id(),
            handle,
            object: id,
            kind,
        });
        info!("{} created {} {} as {}", ctx.task_id(), kind, id, handle);
        Ok(handle)
    }

    pub(crate) fn sys_label(
        &self,
        ctx: &TaskContext,
        handle: Handle,
        text: &str,
    ) -> Result<(), KernelError> {
        if text.len() > self.config.max_label_len {
            return Err(KernelError::InvalidArgument(format!(
                "label of {} bytes exceeds {}",
                text.len(),
                self.config.max_label_len
            )));
        }
        let entry = self.lookup(ctx, handle, None, Rights::empty())?;
        let mut state = entry.object.lock();
        if state.dead {
            return Err(KernelError::InvalidCapability(format!("{} destroyed", handle)));
        }
        state.label = Some(text.to_string());
        debug!("{} labelled {:?}", entry.object.id(), text);
        Ok(())
    }

    pub(crate) fn sys_drop(&self, ctx: &TaskContext, handle: Handle) -> Result<(), KernelError> {
        // validates and audits the failure case
        self.lookup(ctx, handle, None, Rights::empty())?;
        let removed = {
            let mut state = ctx.domain.lock();
            match state.body.domain_mut() {
                Some(domain) => domain.table.remove(handle).ok(),
                None => None,
            }
        };
        let entry = removed.ok_or_else(|| {
            KernelError::InvalidCapability(format!("{} dropped concurrently", handle))
        })?;
        self.audit(CapabilityEvent::Dropped {
            domain: ctx.domain_id(),
            handle,
            object: entry.object.id(),
        });
        debug!("{} dropped {}", ctx.task_id(), handle);
        self.release(entry.object);
        Ok(())
    }

    /// `duplicate` when `target` is `None`, `duplicate_into` otherwise
    pub(crate) fn sys_duplicate(
        &self,
        ctx: &TaskContext,
        target: Option<Handle>,
        handle: Handle,
        rights: Rights,
    ) -> Result<Handle, KernelError> {
        let destination = match target {
            Some(target) => {
                self.lookup(ctx, target, Some(ObjectKind::Domain), Rights::CREATE)?
                    .object
            }
            None => ctx.domain.clone(),
        };
        let source = self.lookup(ctx, handle, None, Rights::DUPLICATE)?;
        if !rights.is_subset_of(source.rights) {
            self.deny(ctx, handle, rights, source.rights);
            return Err(KernelError::PermissionDenied(format!(
                "{} cannot widen to {:?}",
                handle,
                rights - source.rights
            )));
        }
        if !source.object.try_acquire() {
            return Err(KernelError::InvalidCapability(format!("{} destroyed", handle)));
        }
        let object = source.object.id();
        let copy = self.install(
            &destination,
            CapEntry {
                object: source.object,
                rights,
            },
        )?;
        self.audit(CapabilityEvent::Duplicated {
            from_domain: ctx.domain_id(),
            to_domain: destination.id(),
            source: handle,
            handle: copy,
            object,
            rights,
        });
        debug!(
            "{} duplicated {} into {} as {} ({:?})",
            ctx.task_id(),
            handle,
            destination.id(),
            copy,
            rights
        );
        Ok(copy)
    }

    pub(crate) fn sys_log(&self, ctx: &TaskContext, text: &str) -> Result<(), KernelError> {
        if text.len() > self.config.max_log_len {
            return Err(KernelError::InvalidArgument(format!(
                "log line of {} bytes exceeds {}",
                text.len(),
                self.config.max_log_len
            )));
        }
        let label = ctx.task.lock().label.clone();
        match label {
            Some(label) => info!(target: "user", "[{}] {}", label, text),
            None => info!(target: "user", "[{}] {}", ctx.task_id(), text),
        }
        Ok(())
    }
}
