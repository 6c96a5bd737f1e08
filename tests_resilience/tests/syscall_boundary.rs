//! Syscall Boundary Tests
//!
//! Drives the real kernel through encoded request/response frames and checks
//! that results and error kinds survive the trip unchanged.

use core_types::{Handle, IoWidth, MapFlags, Rights, Signals};
use ipc::Message;
use kernel_api::syscalls::{
    SyscallClient, SyscallCodec, SyscallCodecError, SyscallRequest, SyscallRequestPayload,
    SyscallServer, LoopbackTransport, SYSCALL_ABI_VERSION,
};
use kernel_api::{CreateParams, ErrorKind, Instant, KernelApi, KernelError};
use tests_resilience::boot;

/// Exercises one of each object kind through any kernel front end
fn round_trip<K: KernelApi>(
    kernel: &K,
    ctx: &K::Context,
    domain: Handle,
    space: Handle,
) -> Result<(), KernelError> {
    let ch = kernel.create(ctx, domain, CreateParams::channel(2))?;
    let listener = kernel.create(ctx, domain, CreateParams::Listener)?;
    kernel.watch(ctx, listener, ch, Signals::READABLE, Signals::empty())?;
    kernel.label(ctx, ch, "boundary")?;

    let mem = kernel.create(ctx, domain, CreateParams::memory(8192))?;
    let mapping = kernel.map(ctx, space, None, mem, 0, 0, MapFlags::READ)?;
    assert_eq!(mapping.len, 8192);

    kernel.send(ctx, ch, Message::from("over the wire"), Some(mem))?;
    let events = kernel.listen(ctx, listener, 4, Instant::ZERO)?;
    assert_eq!(events.len(), 1);

    let received = kernel.recv(ctx, ch)?;
    assert_eq!(received.payload(), b"over the wire");
    let mem = received.transferred.expect("capability rides along");

    kernel.unmap(ctx, space, mapping.virt, mapping.len)?;
    kernel.drop_handle(ctx, mem)?;
    kernel.close(ctx, ch)?;
    kernel.log(ctx, "round trip done")
}

#[test]
fn test_direct_and_framed_calls_agree() {
    let h = boot();
    let (k, root) = (h.kernel(), h.root());
    round_trip(k, root, h.domain(), h.boot.root_space).unwrap();

    let client = SyscallClient::new(LoopbackTransport::new(k, root));
    round_trip(&client, &(), h.domain(), h.boot.root_space).unwrap();
}

#[test]
fn test_error_kinds_cross_the_boundary() {
    let h = boot();
    let (k, root) = (h.kernel(), h.root());
    let client = SyscallClient::new(LoopbackTransport::new(k, root));

    let ch = client
        .create(&(), h.domain(), CreateParams::channel(1))
        .unwrap();
    let reader = client.duplicate(&(), ch, Rights::READ).unwrap();

    let bogus = Handle::new(200, 0);
    let cases: Vec<(Result<(), KernelError>, ErrorKind)> = vec![
        (client.drop_handle(&(), bogus), ErrorKind::InvalidCapability),
        (
            client.send(&(), reader, Message::empty(), None),
            ErrorKind::PermissionDenied,
        ),
        (
            client.signal(&(), ch, Signals::CLOSED, Signals::empty()),
            ErrorKind::InvalidArgument,
        ),
        (
            client
                .listen(&(), ch, 1, Instant::ZERO)
                .map(|_| ()),
            ErrorKind::InvalidArgument,
        ),
    ];
    for (result, kind) in cases {
        assert_eq!(result.unwrap_err().kind(), kind);
    }

    client.close(&(), ch).unwrap();
    assert_eq!(client.close(&(), ch), Err(KernelError::Closed));
    assert_eq!(client.recv(&(), ch), Err(KernelError::Closed));
}

#[test]
fn test_port_io_through_client() {
    let h = boot();
    let (k, root) = (h.kernel(), h.root());
    let client = SyscallClient::new(LoopbackTransport::new(k, root));

    let port = client
        .create(&(), h.domain(), CreateParams::PortIo { base: 0x60, len: 5 })
        .unwrap();
    h.ports.poke(0x64, 0x1c);
    assert_eq!(client.port_in(&(), port, IoWidth::Byte, 0x64).unwrap(), 0x1c);
    client
        .port_out(&(), port, IoWidth::Word, 0x60, 0xbeef)
        .unwrap();
    assert_eq!(h.ports.peek(0x60), 0xef);
    assert_eq!(h.ports.peek(0x61), 0xbe);
}

#[test]
fn test_server_rejects_wrong_abi() {
    let h = boot();
    let (k, root) = (h.kernel(), h.root());
    let server = SyscallServer::new(k);

    let request = SyscallRequest {
        request_id: 1,
        payload: SyscallRequestPayload::Log {
            text: "hello".to_string(),
        },
    };
    let mut frame: serde_json::Value =
        serde_json::from_slice(&SyscallCodec::new().encode_request(&request).unwrap()).unwrap();
    frame["abi"] = serde_json::json!(SYSCALL_ABI_VERSION + 1);
    let frame = serde_json::to_vec(&frame).unwrap();

    match server.handle_frame(root, &frame) {
        Err(SyscallCodecError::AbiMismatch { expected, actual }) => {
            assert_eq!(expected, SYSCALL_ABI_VERSION);
            assert_eq!(actual, SYSCALL_ABI_VERSION + 1);
        }
        other => panic!("expected ABI mismatch, got {:?}", other.map(|_| ())),
    }
    assert!(matches!(
        server.handle_frame(root, b"not json"),
        Err(SyscallCodecError::Json(_))
    ));
}

#[test]
fn test_request_ids_advance() {
    let h = boot();
    let (k, root) = (h.kernel(), h.root());
    let codec = SyscallCodec::new();
    let server = SyscallServer::new(k);

    for request_id in [7u64, 8] {
        let frame = codec
            .encode_request(&SyscallRequest {
                request_id,
                payload: SyscallRequestPayload::Log {
                    text: format!("request {}", request_id),
                },
            })
            .unwrap();
        let reply = codec
            .decode_response(&server.handle_frame(root, &frame).unwrap())
            .unwrap();
        assert_eq!(reply.request_id, request_id);
    }
}
