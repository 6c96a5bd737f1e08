//! Signal and Listener Tests
//!
//! Watches, event coalescing and blocking `listen` with deadlines on the
//! simulated clock.

use core_types::Signals;
use ipc::Message;
use kernel_api::{CreateParams, Duration, Instant, KernelApi, KernelError};
use std::thread;
use tests_resilience::{boot, spawn_task, wait_until_parked};

#[test]
fn test_watched_channel_reports_readable() {
    let h = boot();
    let (k, root) = (h.kernel(), h.root());

    let listener = k.create(root, h.domain(), CreateParams::Listener).unwrap();
    let ch = k.create(root, h.domain(), CreateParams::channel(2)).unwrap();
    k.watch(root, listener, ch, Signals::READABLE, Signals::empty())
        .unwrap();
    assert!(matches!(
        k.listen(root, listener, 8, Instant::ZERO),
        Err(KernelError::Timeout)
    ));

    k.send(root, ch, Message::from("ping"), None).unwrap();
    let events = k.listen(root, listener, 8, Instant::ZERO).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].handle, ch);
    assert_eq!(events[0].object, k.object_id(root, ch).unwrap());
    assert!(events[0].signals.contains(Signals::READABLE));

    // a second message is not a new rising edge
    k.send(root, ch, Message::from("pong"), None).unwrap();
    assert!(matches!(
        k.listen(root, listener, 8, Instant::ZERO),
        Err(KernelError::Timeout)
    ));
}

#[test]
fn test_watch_reports_current_state() {
    let h = boot();
    let (k, root) = (h.kernel(), h.root());

    let listener = k.create(root, h.domain(), CreateParams::Listener).unwrap();
    let ch = k.create(root, h.domain(), CreateParams::channel(1)).unwrap();
    k.watch(root, listener, ch, Signals::WRITABLE, Signals::empty())
        .unwrap();
    let events = k.listen(root, listener, 1, Instant::ZERO).unwrap();
    assert_eq!(events[0].signals, Signals::WRITABLE);
}

#[test]
fn test_pending_events_coalesce_per_object() {
    let h = boot();
    let (k, root) = (h.kernel(), h.root());

    let listener = k.create(root, h.domain(), CreateParams::Listener).unwrap();
    let a = k.create(root, h.domain(), CreateParams::Listener).unwrap();
    let b = k.create(root, h.domain(), CreateParams::Listener).unwrap();
    for target in [a, b] {
        k.watch(root, listener, target, Signals::USER0, Signals::USER0)
            .unwrap();
    }

    k.signal(root, a, Signals::USER0, Signals::empty()).unwrap();
    k.signal(root, b, Signals::USER0, Signals::empty()).unwrap();
    k.signal(root, a, Signals::empty(), Signals::USER0).unwrap();
    k.signal(root, a, Signals::USER0, Signals::empty()).unwrap();

    let events = k.listen(root, listener, 8, Instant::ZERO).unwrap();
    assert_eq!(events.len(), 2);
    // `a` keeps its place in the queue but carries its latest snapshot
    assert_eq!(events[0].handle, a);
    assert_eq!(events[1].handle, b);
    assert!(events[0].sequence > events[1].sequence);
    assert_eq!(events[0].signals, Signals::USER0);
}

#[test]
fn test_listen_respects_max_events() {
    let h = boot();
    let (k, root) = (h.kernel(), h.root());

    let listener = k.create(root, h.domain(), CreateParams::Listener).unwrap();
    let targets: Vec<_> = (0..3)
        .map(|_| k.create(root, h.domain(), CreateParams::channel(1)).unwrap())
        .collect();
    for target in &targets {
        k.watch(root, listener, *target, Signals::USER1, Signals::empty())
            .unwrap();
        k.signal(root, *target, Signals::USER1, Signals::empty())
            .unwrap();
    }

    assert_eq!(k.listen(root, listener, 2, Instant::ZERO).unwrap().len(), 2);
    assert!(k.signals_of(root, listener).unwrap().contains(Signals::READABLE));
    assert_eq!(k.listen(root, listener, 2, Instant::ZERO).unwrap().len(), 1);
    assert!(!k.signals_of(root, listener).unwrap().contains(Signals::READABLE));
    assert!(matches!(
        k.listen(root, listener, 0, Instant::ZERO),
        Err(KernelError::InvalidArgument(_))
    ));
}

#[test]
fn test_user_signals_only() {
    let h = boot();
    let (k, root) = (h.kernel(), h.root());

    let ch = k.create(root, h.domain(), CreateParams::channel(1)).unwrap();
    assert!(matches!(
        k.signal(root, ch, Signals::READABLE, Signals::empty()),
        Err(KernelError::InvalidArgument(_))
    ));
    assert!(matches!(
        k.signal(root, ch, Signals::empty(), Signals::WRITABLE),
        Err(KernelError::InvalidArgument(_))
    ));
    let quiet = k.duplicate(root, ch, core_types::Rights::READ).unwrap();
    assert!(matches!(
        k.signal(root, quiet, Signals::USER7, Signals::empty()),
        Err(KernelError::PermissionDenied(_))
    ));
    k.signal(root, ch, Signals::USER7, Signals::empty()).unwrap();
    assert_eq!(
        k.signals_of(root, ch).unwrap(),
        Signals::WRITABLE | Signals::USER7
    );
}

#[test]
fn test_empty_masks_remove_watch() {
    let h = boot();
    let (k, root) = (h.kernel(), h.root());

    let listener = k.create(root, h.domain(), CreateParams::Listener).unwrap();
    let target = k.create(root, h.domain(), CreateParams::Listener).unwrap();
    k.watch(root, listener, target, Signals::USER2, Signals::empty())
        .unwrap();
    k.watch(root, listener, target, Signals::empty(), Signals::empty())
        .unwrap();
    k.signal(root, target, Signals::USER2, Signals::empty())
        .unwrap();
    assert!(matches!(
        k.listen(root, listener, 1, Instant::ZERO),
        Err(KernelError::Timeout)
    ));
}

#[test]
fn test_destroyed_target_reports_closed() {
    let h = boot();
    let (k, root) = (h.kernel(), h.root());

    let listener = k.create(root, h.domain(), CreateParams::Listener).unwrap();
    let ch = k.create(root, h.domain(), CreateParams::channel(1)).unwrap();
    // the final event reaches every watcher, whatever its masks
    k.watch(root, listener, ch, Signals::USER0, Signals::empty())
        .unwrap();
    k.drop_handle(root, ch).unwrap();

    let events = k.listen(root, listener, 4, Instant::ZERO).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].handle, ch);
    assert!(events[0].signals.contains(Signals::CLOSED));
}

#[test]
fn test_listeners_can_watch_listeners() {
    let h = boot();
    let (k, root) = (h.kernel(), h.root());

    let outer = k.create(root, h.domain(), CreateParams::Listener).unwrap();
    let inner = k.create(root, h.domain(), CreateParams::Listener).unwrap();
    let ch = k.create(root, h.domain(), CreateParams::channel(1)).unwrap();
    k.watch(root, outer, inner, Signals::READABLE, Signals::empty())
        .unwrap();
    k.watch(root, inner, ch, Signals::READABLE, Signals::empty())
        .unwrap();

    k.send(root, ch, Message::empty(), None).unwrap();
    let events = k.listen(root, outer, 4, Instant::ZERO).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].handle, inner);
}

#[test]
fn test_parked_listener_wakes_on_signal() {
    let h = boot();
    let (k, root) = (h.kernel(), h.root());

    let listener = k.create(root, h.domain(), CreateParams::Listener).unwrap();
    let target = k.create(root, h.domain(), CreateParams::Listener).unwrap();
    k.watch(root, listener, target, Signals::USER3, Signals::empty())
        .unwrap();
    let worker = spawn_task(k, root, h.domain()).unwrap();

    let waiting = {
        let kernel = h.boot.kernel.clone();
        let ctx = worker.ctx.clone();
        thread::spawn(move || kernel.listen(&ctx, listener, 4, Instant::FOREVER))
    };
    wait_until_parked(&h.scheduler, &worker.ctx);

    k.signal(root, target, Signals::USER3, Signals::empty())
        .unwrap();
    let events = waiting.join().unwrap().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].signals, Signals::USER3);
}

#[test]
fn test_deadline_elapses_with_clock() {
    let h = boot();
    let (k, root) = (h.kernel(), h.root());

    let listener = k.create(root, h.domain(), CreateParams::Listener).unwrap();
    let worker = spawn_task(k, root, h.domain()).unwrap();
    let deadline = k.now() + Duration::from_millis(10);

    let waiting = {
        let kernel = h.boot.kernel.clone();
        let ctx = worker.ctx.clone();
        thread::spawn(move || kernel.listen(&ctx, listener, 4, deadline))
    };
    wait_until_parked(&h.scheduler, &worker.ctx);

    h.scheduler.advance_time(Duration::from_millis(4));
    assert!(!waiting.is_finished());
    h.scheduler.advance_time(Duration::from_millis(6));
    assert_eq!(waiting.join().unwrap(), Err(KernelError::Timeout));
    assert_eq!(worker.ctx.phase(), kernel_objects::TaskPhase::Running);
}
