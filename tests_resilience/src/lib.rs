//! Resilience Test Utilities
//!
//! Shared setup for the integration tests: booting a kernel on the host,
//! spawning extra tasks on OS threads and waiting for them to park.
//!
//! ## Test Philosophy
//!
//! - **No capability leaks**: a handle stops working the moment its entry or
//!   object goes away, and objects go away as soon as nothing holds them
//! - **Blocking is real**: tasks run on their own threads and genuinely park
//! - **Deterministic time**: deadlines only elapse when a test advances the clock

use core_types::{Handle, MapFlags, PAGE_SIZE};
use handover::{Payload, PayloadBuilder, Record, Tag};
use kernel_api::{CreateParams, KernelApi, KernelError, TaskArgs};
use kernel_objects::{
    Boot, HostScheduler, Kernel, KernelConfig, SimPortBus, TaskContext, TaskPhase,
};
use log::debug;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Routes kernel logging to the test harness; `RUST_LOG` selects the level
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

/// Four megabytes of RAM at 1 MiB with one boot file inside
pub fn test_payload() -> Payload {
    let mut builder = PayloadBuilder::new("tests_resilience");
    builder
        .add(Record::new(Tag::Free, 0x10_0000, 0x40_0000))
        .and_then(|b| b.add(Record::new(Tag::Kernel, 0x10_0000, 0x2_0000)))
        .and_then(|b| b.add(Record::file("init", 0x20_0000, 0x3000)))
        .expect("test payload is well formed");
    builder.build()
}

/// A booted kernel plus the host pieces tests poke at
pub struct Harness {
    pub boot: Boot,
    pub scheduler: Arc<HostScheduler>,
    pub ports: SimPortBus,
}

impl Harness {
    pub fn kernel(&self) -> &Kernel {
        &self.boot.kernel
    }

    pub fn root(&self) -> &TaskContext {
        &self.boot.root
    }

    /// The root domain's self handle
    pub fn domain(&self) -> Handle {
        self.boot.root_domain
    }
}

pub fn boot() -> Harness {
    boot_with(KernelConfig::default())
}

pub fn boot_with(config: KernelConfig) -> Harness {
    init_logging();
    let scheduler = Arc::new(HostScheduler::new());
    let ports = SimPortBus::new();
    let boot = Kernel::boot(
        config,
        scheduler.clone(),
        Arc::new(ports.clone()),
        &test_payload(),
    )
    .expect("boot");
    Harness {
        boot,
        scheduler,
        ports,
    }
}

/// A started task with its own space, using `domain` as its table
pub struct Spawned {
    pub task: Handle,
    pub space: Handle,
    pub ctx: TaskContext,
}

/// Creates, maps and starts a task from `ctx`, then enters it
pub fn spawn_task(
    kernel: &Kernel,
    ctx: &TaskContext,
    domain: Handle,
) -> Result<Spawned, KernelError> {
    let space = kernel.create(ctx, domain, CreateParams::Space)?;
    let task = kernel.create(ctx, domain, CreateParams::Task { space, domain })?;
    let code = kernel.create(ctx, domain, CreateParams::memory(PAGE_SIZE))?;
    let stack = kernel.create(ctx, domain, CreateParams::memory(4 * PAGE_SIZE))?;
    let code = kernel.map(ctx, space, None, code, 0, 0, MapFlags::READ | MapFlags::EXEC)?;
    let stack = kernel.map(ctx, space, None, stack, 0, 0, MapFlags::READ | MapFlags::WRITE)?;
    kernel.start(ctx, task, code.virt, stack.range().end(), TaskArgs::default())?;
    let entered = kernel.enter(ctx, task)?;
    debug!("spawned {} with code at {:#x}", entered.task_id(), code.virt);
    Ok(Spawned {
        task,
        space,
        ctx: entered,
    })
}

/// Spins until the task is parked inside a blocking call
pub fn wait_until_parked(scheduler: &HostScheduler, ctx: &TaskContext) {
    let give_up = Instant::now() + Duration::from_secs(10);
    while !(ctx.phase() == TaskPhase::Suspended && scheduler.is_parked(ctx.task_id())) {
        assert!(Instant::now() < give_up, "task {} never parked", ctx.task_id());
        thread::sleep(Duration::from_millis(1));
    }
}
