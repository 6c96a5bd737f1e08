//! Capability Lifecycle Integration Tests
//!
//! These tests validate the complete capability lifecycle model:
//! - Create, duplicate, drop semantics
//! - Objects live exactly as long as something references them
//! - Teardown cascades through tables, spaces and queued messages
//! - Audit trail verification

use core_types::{CapabilityEvent, CapabilityInvalidReason, MapFlags, ObjectKind, Rights};
use ipc::Message;
use kernel_api::{CreateParams, KernelApi, KernelError};
use tests_resilience::boot;

#[test]
fn test_create_duplicate_drop_audit_trail() {
    let h = boot();
    let (k, root) = (h.kernel(), h.root());

    let ch = k.create(root, h.domain(), CreateParams::channel(1)).unwrap();
    let copy = k.duplicate(root, ch, Rights::READ).unwrap();
    let object = k.object_id(root, ch).unwrap();
    k.drop_handle(root, ch).unwrap();
    k.drop_handle(root, copy).unwrap();

    let log = k.audit_log();
    let trail: Vec<_> = log
        .get_events_for_object(object)
        .into_iter()
        .map(|e| e.event.clone())
        .collect();
    assert_eq!(trail.len(), 5);
    assert!(matches!(trail[0], CapabilityEvent::Created { kind: ObjectKind::Channel, .. }));
    assert!(matches!(trail[1], CapabilityEvent::Duplicated { rights, .. } if rights == Rights::READ));
    assert!(matches!(trail[2], CapabilityEvent::Dropped { handle, .. } if handle == ch));
    assert!(matches!(trail[3], CapabilityEvent::Dropped { handle, .. } if handle == copy));
    assert!(matches!(trail[4], CapabilityEvent::Destroyed { .. }));
}

#[test]
fn test_stale_handle_after_slot_reuse() {
    let h = boot();
    let (k, root) = (h.kernel(), h.root());

    let old = k.create(root, h.domain(), CreateParams::Listener).unwrap();
    k.drop_handle(root, old).unwrap();
    let new = k.create(root, h.domain(), CreateParams::channel(1)).unwrap();
    assert_eq!(new.index(), old.index());

    // the old handle must not reach the channel now living in its slot
    assert!(matches!(
        k.send(root, old, Message::from("x"), None),
        Err(KernelError::InvalidCapability(_))
    ));
    assert!(k.audit_log().has_event(|e| matches!(
        e,
        CapabilityEvent::InvalidUseAttempt {
            reason: CapabilityInvalidReason::Stale,
            ..
        }
    )));
}

#[test]
fn test_mapping_keeps_memory_alive() {
    let h = boot();
    let (k, root) = (h.kernel(), h.root());
    let free = k.free_frames();

    let mem = k.create(root, h.domain(), CreateParams::memory(8192)).unwrap();
    let mapping = k
        .map(root, h.boot.root_space, None, mem, 0, 0, MapFlags::READ)
        .unwrap();
    k.drop_handle(root, mem).unwrap();
    assert_eq!(k.live_objects(ObjectKind::Memory), 2);
    assert_eq!(k.free_frames(), free - 8192);

    k.unmap(root, h.boot.root_space, mapping.virt, mapping.len)
        .unwrap();
    assert_eq!(k.live_objects(ObjectKind::Memory), 1);
    assert_eq!(k.free_frames(), free);
}

#[test]
fn test_domain_teardown_cascades() {
    let h = boot();
    let (k, root) = (h.kernel(), h.root());
    let before = k.total_live_objects();

    let child = k
        .create(root, h.domain(), CreateParams::Domain { quota: None })
        .unwrap();
    // objects that only the child's table references
    for params in [
        CreateParams::channel(2),
        CreateParams::Listener,
        CreateParams::memory(4096),
        CreateParams::Space,
    ] {
        let made = k.create(root, h.domain(), params).unwrap();
        k.duplicate_into(root, child, made, Rights::DUPLICATE)
            .unwrap();
        k.drop_handle(root, made).unwrap();
    }
    assert_eq!(k.total_live_objects(), before + 5);

    k.drop_handle(root, child).unwrap();
    assert_eq!(k.total_live_objects(), before);
}

#[test]
fn test_space_teardown_releases_mappings() {
    let h = boot();
    let (k, root) = (h.kernel(), h.root());
    let free = k.free_frames();

    let space = k.create(root, h.domain(), CreateParams::Space).unwrap();
    for _ in 0..3 {
        let mem = k.create(root, h.domain(), CreateParams::memory(4096)).unwrap();
        k.map(root, space, None, mem, 0, 0, MapFlags::READ | MapFlags::WRITE)
            .unwrap();
        k.drop_handle(root, mem).unwrap();
    }
    assert_eq!(k.free_frames(), free - 3 * 4096);

    k.drop_handle(root, space).unwrap();
    assert_eq!(k.free_frames(), free);
    assert_eq!(k.live_objects(ObjectKind::Space), 1);
}

#[test]
fn test_long_chain_of_channels_tears_down() {
    let h = boot();
    let (k, root) = (h.kernel(), h.root());
    let before = k.total_live_objects();

    // each channel carries the previous one; dropping the head frees them all
    let mut head = k.create(root, h.domain(), CreateParams::channel(1)).unwrap();
    for _ in 0..200 {
        let next = k.create(root, h.domain(), CreateParams::channel(1)).unwrap();
        k.send(root, next, Message::empty(), Some(head)).unwrap();
        head = next;
    }
    assert_eq!(k.total_live_objects(), before + 201);

    k.drop_handle(root, head).unwrap();
    assert_eq!(k.total_live_objects(), before);
}

#[test]
fn test_ref_count_tracks_holders() {
    let h = boot();
    let (k, root) = (h.kernel(), h.root());

    let mem = k.create(root, h.domain(), CreateParams::memory(4096)).unwrap();
    assert_eq!(k.ref_count(root, mem).unwrap(), 1);
    let copy = k.duplicate(root, mem, Rights::MAP | Rights::READ).unwrap();
    k.map(root, h.boot.root_space, None, mem, 0, 0, MapFlags::READ)
        .unwrap();
    assert_eq!(k.ref_count(root, mem).unwrap(), 3);
    k.drop_handle(root, copy).unwrap();
    assert_eq!(k.ref_count(root, mem).unwrap(), 2);
}
