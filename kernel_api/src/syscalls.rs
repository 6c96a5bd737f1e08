//! Syscall boundary as fixed-layout tagged values.
//!
//! Requests and responses are plain serializable enums. Every request carries
//! its syscall number implicitly through its variant; every response carries
//! either a value or a [`SyscallError`] (error kind plus optional diagnostic),
//! so nothing but data crosses the boundary.
//!
//! [`dispatch`] executes a decoded request against any [`KernelApi`]
//! implementation. [`SyscallCodec`] frames requests and responses as JSON
//! with an ABI version, and [`SyscallClient`] turns a transport back into a
//! [`KernelApi`].

use crate::{CreateParams, ErrorKind, Instant, KernelApi, KernelError, Mapping, TaskArgs};
use core::cell::{Cell, RefCell};
use core_types::{Handle, IoWidth, MapFlags, Rights, Signals};
use ipc::{Event, Message, ReceivedMessage};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Version of the request/response framing
pub const SYSCALL_ABI_VERSION: u32 = 1;

/// Fixed syscall numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum SyscallNumber {
    Log = 0,
    Create = 1,
    Label = 2,
    Drop = 3,
    Duplicate = 4,
    Start = 5,
    Map = 6,
    Unmap = 7,
    PortIn = 8,
    PortOut = 9,
    Send = 10,
    Recv = 11,
    Close = 12,
    Signal = 13,
    Watch = 14,
    Listen = 15,
    DuplicateInto = 16,
}

impl SyscallNumber {
    pub const fn code(&self) -> u32 {
        *self as u32
    }
}

/// Syscall request wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyscallRequest {
    pub request_id: u64,
    pub payload: SyscallRequestPayload,
}

/// Typed syscall request payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyscallRequestPayload {
    Log {
        text: String,
    },
    Create {
        dest: Handle,
        params: CreateParams,
    },
    Label {
        handle: Handle,
        text: String,
    },
    Drop {
        handle: Handle,
    },
    Duplicate {
        handle: Handle,
        rights: Rights,
    },
    DuplicateInto {
        target: Handle,
        handle: Handle,
        rights: Rights,
    },
    Start {
        task: Handle,
        ip: u64,
        sp: u64,
        args: TaskArgs,
    },
    Map {
        space: Handle,
        virt: Option<u64>,
        memory: Handle,
        offset: u64,
        len: u64,
        flags: MapFlags,
    },
    Unmap {
        space: Handle,
        virt: u64,
        len: u64,
    },
    PortIn {
        handle: Handle,
        width: IoWidth,
        port: u16,
    },
    PortOut {
        handle: Handle,
        width: IoWidth,
        port: u16,
        value: u32,
    },
    Send {
        channel: Handle,
        message: Message,
        transfer: Option<Handle>,
    },
    Recv {
        channel: Handle,
    },
    Close {
        channel: Handle,
    },
    Signal {
        handle: Handle,
        set: Signals,
        unset: Signals,
    },
    Watch {
        listener: Handle,
        target: Handle,
        set: Signals,
        unset: Signals,
    },
    Listen {
        listener: Handle,
        max_events: usize,
        deadline: Instant,
    },
}

impl SyscallRequestPayload {
    /// The syscall number this request invokes
    pub fn number(&self) -> SyscallNumber {
        match self {
            SyscallRequestPayload::Log { .. } => SyscallNumber::Log,
            SyscallRequestPayload::Create { .. } => SyscallNumber::Create,
            SyscallRequestPayload::Label { .. } => SyscallNumber::Label,
            SyscallRequestPayload::Drop { .. } => SyscallNumber::Drop,
            SyscallRequestPayload::Duplicate { .. } => SyscallNumber::Duplicate,
            SyscallRequestPayload::DuplicateInto { .. } => SyscallNumber::DuplicateInto,
            SyscallRequestPayload::Start { .. } => SyscallNumber::Start,
            SyscallRequestPayload::Map { .. } => SyscallNumber::Map,
            SyscallRequestPayload::Unmap { .. } => SyscallNumber::Unmap,
            SyscallRequestPayload::PortIn { .. } => SyscallNumber::PortIn,
            SyscallRequestPayload::PortOut { .. } => SyscallNumber::PortOut,
            SyscallRequestPayload::Send { .. } => SyscallNumber::Send,
            SyscallRequestPayload::Recv { .. } => SyscallNumber::Recv,
            SyscallRequestPayload::Close { .. } => SyscallNumber::Close,
            SyscallRequestPayload::Signal { .. } => SyscallNumber::Signal,
            SyscallRequestPayload::Watch { .. } => SyscallNumber::Watch,
            SyscallRequestPayload::Listen { .. } => SyscallNumber::Listen,
        }
    }
}

/// Syscall response wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyscallResponse {
    pub request_id: u64,
    pub payload: SyscallResponsePayload,
}

/// Typed syscall response payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyscallResponsePayload {
    Unit(SyscallResult<()>),
    Handle(SyscallResult<Handle>),
    Mapping(SyscallResult<Mapping>),
    Value(SyscallResult<u32>),
    Received(SyscallResult<ReceivedMessage>),
    Events(SyscallResult<Vec<Event>>),
}

/// Result type used in syscall responses.
pub type SyscallResult<T> = Result<T, SyscallError>;

/// Serializable syscall error: a discriminated kind plus optional diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyscallError {
    pub kind: ErrorKind,
    pub message: Option<String>,
}

impl From<KernelError> for SyscallError {
    fn from(error: KernelError) -> Self {
        SyscallError {
            kind: error.kind(),
            message: error.diagnostic().map(str::to_string),
        }
    }
}

impl From<SyscallError> for KernelError {
    fn from(error: SyscallError) -> Self {
        KernelError::from_parts(error.kind, error.message)
    }
}

/// Executes one request against a kernel on behalf of `ctx`
pub fn dispatch<K: KernelApi>(
    kernel: &K,
    ctx: &K::Context,
    request: SyscallRequest,
) -> SyscallResponse {
    use SyscallRequestPayload as Req;
    use SyscallResponsePayload as Resp;

    let payload = match request.payload {
        Req::Log { text } => Resp::Unit(kernel.log(ctx, &text).map_err(Into::into)),
        Req::Create { dest, params } => {
            Resp::Handle(kernel.create(ctx, dest, params).map_err(Into::into))
        }
        Req::Label { handle, text } => {
            Resp::Unit(kernel.label(ctx, handle, &text).map_err(Into::into))
        }
        Req::Drop { handle } => Resp::Unit(kernel.drop_handle(ctx, handle).map_err(Into::into)),
        Req::Duplicate { handle, rights } => {
            Resp::Handle(kernel.duplicate(ctx, handle, rights).map_err(Into::into))
        }
        Req::DuplicateInto {
            target,
            handle,
            rights,
        } => Resp::Handle(
            kernel
                .duplicate_into(ctx, target, handle, rights)
                .map_err(Into::into),
        ),
        Req::Start { task, ip, sp, args } => {
            Resp::Unit(kernel.start(ctx, task, ip, sp, args).map_err(Into::into))
        }
        Req::Map {
            space,
            virt,
            memory,
            offset,
            len,
            flags,
        } => Resp::Mapping(
            kernel
                .map(ctx, space, virt, memory, offset, len, flags)
                .map_err(Into::into),
        ),
        Req::Unmap { space, virt, len } => {
            Resp::Unit(kernel.unmap(ctx, space, virt, len).map_err(Into::into))
        }
        Req::PortIn {
            handle,
            width,
            port,
        } => Resp::Value(kernel.port_in(ctx, handle, width, port).map_err(Into::into)),
        Req::PortOut {
            handle,
            width,
            port,
            value,
        } => Resp::Unit(
            kernel
                .port_out(ctx, handle, width, port, value)
                .map_err(Into::into),
        ),
        Req::Send {
            channel,
            message,
            transfer,
        } => Resp::Unit(
            kernel
                .send(ctx, channel, message, transfer)
                .map_err(Into::into),
        ),
        Req::Recv { channel } => Resp::Received(kernel.recv(ctx, channel).map_err(Into::into)),
        Req::Close { channel } => Resp::Unit(kernel.close(ctx, channel).map_err(Into::into)),
        Req::Signal { handle, set, unset } => {
            Resp::Unit(kernel.signal(ctx, handle, set, unset).map_err(Into::into))
        }
        Req::Watch {
            listener,
            target,
            set,
            unset,
        } => Resp::Unit(
            kernel
                .watch(ctx, listener, target, set, unset)
                .map_err(Into::into),
        ),
        Req::Listen {
            listener,
            max_events,
            deadline,
        } => Resp::Events(
            kernel
                .listen(ctx, listener, max_events, deadline)
                .map_err(Into::into),
        ),
    };

    SyscallResponse {
        request_id: request.request_id,
        payload,
    }
}

/// Errors when encoding or decoding syscall frames.
#[derive(Debug, Error)]
pub enum SyscallCodecError {
    #[error("ABI mismatch: expected v{expected}, got v{actual}")]
    AbiMismatch { expected: u32, actual: u32 },

    #[error("Malformed syscall frame: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
struct Frame<T> {
    abi: u32,
    body: T,
}

/// Encoder/decoder for syscall frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyscallCodec;

impl SyscallCodec {
    pub fn new() -> Self {
        Self
    }

    fn encode<T: Serialize>(&self, body: &T) -> Result<Vec<u8>, SyscallCodecError> {
        Ok(serde_json::to_vec(&Frame {
            abi: SYSCALL_ABI_VERSION,
            body,
        })?)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, SyscallCodecError> {
        let frame: Frame<T> = serde_json::from_slice(bytes)?;
        if frame.abi != SYSCALL_ABI_VERSION {
            return Err(SyscallCodecError::AbiMismatch {
                expected: SYSCALL_ABI_VERSION,
                actual: frame.abi,
            });
        }
        Ok(frame.body)
    }

    pub fn encode_request(&self, request: &SyscallRequest) -> Result<Vec<u8>, SyscallCodecError> {
        self.encode(request)
    }

    pub fn decode_request(&self, bytes: &[u8]) -> Result<SyscallRequest, SyscallCodecError> {
        self.decode(bytes)
    }

    pub fn encode_response(
        &self,
        response: &SyscallResponse,
    ) -> Result<Vec<u8>, SyscallCodecError> {
        self.encode(response)
    }

    pub fn decode_response(&self, bytes: &[u8]) -> Result<SyscallResponse, SyscallCodecError> {
        self.decode(bytes)
    }
}

/// Transport abstraction for syscall frames.
pub trait SyscallTransport {
    /// Delivers one encoded request and returns the encoded response
    fn call(&mut self, request: Vec<u8>) -> Result<Vec<u8>, KernelError>;
}

/// Syscall server that decodes frames and executes them for one caller.
pub struct SyscallServer<'k, K: KernelApi> {
    kernel: &'k K,
    codec: SyscallCodec,
}

impl<'k, K: KernelApi> SyscallServer<'k, K> {
    pub fn new(kernel: &'k K) -> Self {
        Self {
            kernel,
            codec: SyscallCodec::new(),
        }
    }

    pub fn handle_frame(
        &self,
        ctx: &K::Context,
        frame: &[u8],
    ) -> Result<Vec<u8>, SyscallCodecError> {
        let request = self.codec.decode_request(frame)?;
        let response = dispatch(self.kernel, ctx, request);
        self.codec.encode_response(&response)
    }

    pub fn kernel(&self) -> &K {
        self.kernel
    }
}

/// Loopback transport binding a server to one calling context.
pub struct LoopbackTransport<'k, K: KernelApi> {
    server: SyscallServer<'k, K>,
    ctx: &'k K::Context,
}

impl<'k, K: KernelApi> LoopbackTransport<'k, K> {
    pub fn new(kernel: &'k K, ctx: &'k K::Context) -> Self {
        Self {
            server: SyscallServer::new(kernel),
            ctx,
        }
    }
}

impl<K: KernelApi> SyscallTransport for LoopbackTransport<'_, K> {
    fn call(&mut self, request: Vec<u8>) -> Result<Vec<u8>, KernelError> {
        self.server
            .handle_frame(self.ctx, &request)
            .map_err(|err| KernelError::InvalidArgument(format!("syscall frame: {}", err)))
    }
}

/// Syscall client implementing KernelApi over a SyscallTransport.
///
/// The caller identity is implied by the transport, so the context is `()`.
pub struct SyscallClient<T: SyscallTransport> {
    transport: RefCell<T>,
    codec: SyscallCodec,
    next_request: Cell<u64>,
}

impl<T: SyscallTransport> SyscallClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: RefCell::new(transport),
            codec: SyscallCodec::new(),
            next_request: Cell::new(1),
        }
    }

    fn round_trip(&self, payload: SyscallRequestPayload) -> Result<SyscallResponsePayload, KernelError> {
        let request_id = self.next_request.get();
        self.next_request.set(request_id.wrapping_add(1));

        let frame = self
            .codec
            .encode_request(&SyscallRequest {
                request_id,
                payload,
            })
            .map_err(|err| KernelError::InvalidArgument(format!("syscall encode: {}", err)))?;
        let reply = self.transport.borrow_mut().call(frame)?;
        let response = self
            .codec
            .decode_response(&reply)
            .map_err(|err| KernelError::InvalidArgument(format!("syscall decode: {}", err)))?;

        if response.request_id != request_id {
            return Err(KernelError::InvalidArgument(
                "syscall response request_id mismatch".to_string(),
            ));
        }
        Ok(response.payload)
    }

    fn mismatch<V>() -> Result<V, KernelError> {
        Err(KernelError::InvalidArgument(
            "syscall response payload mismatch".to_string(),
        ))
    }

    fn unit(&self, payload: SyscallRequestPayload) -> Result<(), KernelError> {
        match self.round_trip(payload)? {
            SyscallResponsePayload::Unit(result) => result.map_err(KernelError::from),
            _ => Self::mismatch(),
        }
    }

    fn handle(&self, payload: SyscallRequestPayload) -> Result<Handle, KernelError> {
        match self.round_trip(payload)? {
            SyscallResponsePayload::Handle(result) => result.map_err(KernelError::from),
            _ => Self::mismatch(),
        }
    }

    pub fn with_transport<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut transport = self.transport.borrow_mut();
        f(&mut transport)
    }
}

impl<T: SyscallTransport> KernelApi for SyscallClient<T> {
    type Context = ();

    fn log(&self, _ctx: &(), text: &str) -> Result<(), KernelError> {
        self.unit(SyscallRequestPayload::Log {
            text: text.to_string(),
        })
    }

    fn create(&self, _ctx: &(), dest: Handle, params: CreateParams) -> Result<Handle, KernelError> {
        self.handle(SyscallRequestPayload::Create { dest, params })
    }

    fn label(&self, _ctx: &(), handle: Handle, text: &str) -> Result<(), KernelError> {
        self.unit(SyscallRequestPayload::Label {
            handle,
            text: text.to_string(),
        })
    }

    fn drop_handle(&self, _ctx: &(), handle: Handle) -> Result<(), KernelError> {
        self.unit(SyscallRequestPayload::Drop { handle })
    }

    fn duplicate(&self, _ctx: &(), handle: Handle, rights: Rights) -> Result<Handle, KernelError> {
        self.handle(SyscallRequestPayload::Duplicate { handle, rights })
    }

    fn duplicate_into(
        &self,
        _ctx: &(),
        target: Handle,
        handle: Handle,
        rights: Rights,
    ) -> Result<Handle, KernelError> {
        self.handle(SyscallRequestPayload::DuplicateInto {
            target,
            handle,
            rights,
        })
    }

    fn start(
        &self,
        _ctx: &(),
        task: Handle,
        ip: u64,
        sp: u64,
        args: TaskArgs,
    ) -> Result<(), KernelError> {
        self.unit(SyscallRequestPayload::Start { task, ip, sp, args })
    }

    fn map(
        &self,
        _ctx: &(),
        space: Handle,
        virt: Option<u64>,
        memory: Handle,
        offset: u64,
        len: u64,
        flags: MapFlags,
    ) -> Result<Mapping, KernelError> {
        match self.round_trip(SyscallRequestPayload::Map {
            space,
            virt,
            memory,
            offset,
            len,
            flags,
        })? {
            SyscallResponsePayload::Mapping(result) => result.map_err(KernelError::from),
            _ => Self::mismatch(),
        }
    }

    fn unmap(&self, _ctx: &(), space: Handle, virt: u64, len: u64) -> Result<(), KernelError> {
        self.unit(SyscallRequestPayload::Unmap { space, virt, len })
    }

    fn port_in(
        &self,
        _ctx: &(),
        handle: Handle,
        width: IoWidth,
        port: u16,
    ) -> Result<u32, KernelError> {
        match self.round_trip(SyscallRequestPayload::PortIn {
            handle,
            width,
            port,
        })? {
            SyscallResponsePayload::Value(result) => result.map_err(KernelError::from),
            _ => Self::mismatch(),
        }
    }

    fn port_out(
        &self,
        _ctx: &(),
        handle: Handle,
        width: IoWidth,
        port: u16,
        value: u32,
    ) -> Result<(), KernelError> {
        self.unit(SyscallRequestPayload::PortOut {
            handle,
            width,
            port,
            value,
        })
    }

    fn send(
        &self,
        _ctx: &(),
        channel: Handle,
        message: Message,
        transfer: Option<Handle>,
    ) -> Result<(), KernelError> {
        self.unit(SyscallRequestPayload::Send {
            channel,
            message,
            transfer,
        })
    }

    fn recv(&self, _ctx: &(), channel: Handle) -> Result<ReceivedMessage, KernelError> {
        match self.round_trip(SyscallRequestPayload::Recv { channel })? {
            SyscallResponsePayload::Received(result) => result.map_err(KernelError::from),
            _ => Self::mismatch(),
        }
    }

    fn close(&self, _ctx: &(), channel: Handle) -> Result<(), KernelError> {
        self.unit(SyscallRequestPayload::Close { channel })
    }

    fn signal(
        &self,
        _ctx: &(),
        handle: Handle,
        set: Signals,
        unset: Signals,
    ) -> Result<(), KernelError> {
        self.unit(SyscallRequestPayload::Signal { handle, set, unset })
    }

    fn watch(
        &self,
        _ctx: &(),
        listener: Handle,
        target: Handle,
        set: Signals,
        unset: Signals,
    ) -> Result<(), KernelError> {
        self.unit(SyscallRequestPayload::Watch {
            listener,
            target,
            set,
            unset,
        })
    }

    fn listen(
        &self,
        _ctx: &(),
        listener: Handle,
        max_events: usize,
        deadline: Instant,
    ) -> Result<Vec<Event>, KernelError> {
        match self.round_trip(SyscallRequestPayload::Listen {
            listener,
            max_events,
            deadline,
        })? {
            SyscallResponsePayload::Events(result) => result.map_err(KernelError::from),
            _ => Self::mismatch(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::TaskId;
    use std::sync::Mutex;

    /// Records the last label and answers everything else with fixed values.
    #[derive(Default)]
    struct MockKernel {
        labels: Mutex<Vec<(Handle, String)>>,
    }

    impl KernelApi for MockKernel {
        type Context = u32;

        fn log(&self, _ctx: &u32, _text: &str) -> Result<(), KernelError> {
            Ok(())
        }

        fn create(&self, ctx: &u32, _dest: Handle, params: CreateParams) -> Result<Handle, KernelError> {
            match params {
                CreateParams::Channel { depth: 0, .. } => {
                    Err(KernelError::InvalidArgument("depth must be positive".to_string()))
                }
                _ => Ok(Handle::new(*ctx, 1)),
            }
        }

        fn label(&self, _ctx: &u32, handle: Handle, text: &str) -> Result<(), KernelError> {
            self.labels
                .lock()
                .expect("lock labels")
                .push((handle, text.to_string()));
            Ok(())
        }

        fn drop_handle(&self, _ctx: &u32, _handle: Handle) -> Result<(), KernelError> {
            Err(KernelError::InvalidCapability("unknown".to_string()))
        }

        fn duplicate(&self, _ctx: &u32, handle: Handle, _rights: Rights) -> Result<Handle, KernelError> {
            Ok(handle)
        }

        fn duplicate_into(
            &self,
            _ctx: &u32,
            _target: Handle,
            handle: Handle,
            _rights: Rights,
        ) -> Result<Handle, KernelError> {
            Ok(handle)
        }

        fn start(&self, _ctx: &u32, _task: Handle, _ip: u64, _sp: u64, _args: TaskArgs) -> Result<(), KernelError> {
            Err(KernelError::AlreadyInUse("running".to_string()))
        }

        fn map(
            &self,
            _ctx: &u32,
            _space: Handle,
            virt: Option<u64>,
            _memory: Handle,
            _offset: u64,
            len: u64,
            _flags: MapFlags,
        ) -> Result<Mapping, KernelError> {
            Ok(Mapping {
                virt: virt.unwrap_or(0x1000),
                len,
            })
        }

        fn unmap(&self, _ctx: &u32, _space: Handle, _virt: u64, _len: u64) -> Result<(), KernelError> {
            Ok(())
        }

        fn port_in(&self, _ctx: &u32, _handle: Handle, _width: IoWidth, port: u16) -> Result<u32, KernelError> {
            Ok(port as u32)
        }

        fn port_out(
            &self,
            _ctx: &u32,
            _handle: Handle,
            _width: IoWidth,
            _port: u16,
            _value: u32,
        ) -> Result<(), KernelError> {
            Ok(())
        }

        fn send(
            &self,
            _ctx: &u32,
            _channel: Handle,
            _message: Message,
            _transfer: Option<Handle>,
        ) -> Result<(), KernelError> {
            Err(KernelError::Closed)
        }

        fn recv(&self, _ctx: &u32, _channel: Handle) -> Result<ReceivedMessage, KernelError> {
            Ok(ReceivedMessage {
                message: Message::from("hi"),
                sender: TaskId::new(),
                transferred: None,
            })
        }

        fn close(&self, _ctx: &u32, _channel: Handle) -> Result<(), KernelError> {
            Ok(())
        }

        fn signal(&self, _ctx: &u32, _handle: Handle, _set: Signals, _unset: Signals) -> Result<(), KernelError> {
            Ok(())
        }

        fn watch(
            &self,
            _ctx: &u32,
            _listener: Handle,
            _target: Handle,
            _set: Signals,
            _unset: Signals,
        ) -> Result<(), KernelError> {
            Ok(())
        }

        fn listen(
            &self,
            _ctx: &u32,
            _listener: Handle,
            _max_events: usize,
            _deadline: Instant,
        ) -> Result<Vec<Event>, KernelError> {
            Err(KernelError::Timeout)
        }
    }

    #[test]
    fn test_client_round_trip_through_loopback() {
        let kernel = MockKernel::default();
        let ctx = 9u32;
        let client = SyscallClient::new(LoopbackTransport::new(&kernel, &ctx));

        let handle = client.create(&(), Handle::new(0, 1), CreateParams::channel(1)).unwrap();
        assert_eq!(handle, Handle::new(9, 1));

        client.label(&(), handle, "inbox").unwrap();
        assert_eq!(
            kernel.labels.lock().unwrap().as_slice(),
            &[(handle, "inbox".to_string())]
        );

        let received = client.recv(&(), handle).unwrap();
        assert_eq!(received.payload(), b"hi");
        assert_eq!(client.port_in(&(), handle, IoWidth::Byte, 0x60).unwrap(), 0x60);
    }

    #[test]
    fn test_errors_cross_the_boundary_as_data() {
        let kernel = MockKernel::default();
        let ctx = 1u32;
        let client = SyscallClient::new(LoopbackTransport::new(&kernel, &ctx));

        assert_eq!(
            client.create(&(), Handle::NULL, CreateParams::channel(0)),
            Err(KernelError::InvalidArgument("depth must be positive".to_string()))
        );
        assert_eq!(
            client.send(&(), Handle::NULL, Message::empty(), None),
            Err(KernelError::Closed)
        );
        assert_eq!(
            client.listen(&(), Handle::NULL, 4, Instant::ZERO),
            Err(KernelError::Timeout)
        );
    }

    #[test]
    fn test_dispatch_reports_numbers() {
        let kernel = MockKernel::default();
        let request = SyscallRequest {
            request_id: 77,
            payload: SyscallRequestPayload::Drop {
                handle: Handle::new(3, 1),
            },
        };
        assert_eq!(request.payload.number(), SyscallNumber::Drop);
        assert_eq!(SyscallNumber::Drop.code(), 3);

        let response = dispatch(&kernel, &0, request);
        assert_eq!(response.request_id, 77);
        match response.payload {
            SyscallResponsePayload::Unit(Err(err)) => {
                assert_eq!(err.kind, ErrorKind::InvalidCapability);
                assert_eq!(err.message.as_deref(), Some("unknown"));
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_codec_rejects_other_abi() {
        let codec = SyscallCodec::new();
        let bytes = br#"{"abi":99,"body":{"request_id":1,"payload":{"Recv":{"channel":{"index":0,"generation":1}}}}}"#;
        assert!(matches!(
            codec.decode_request(bytes),
            Err(SyscallCodecError::AbiMismatch { actual: 99, .. })
        ));

        let request = SyscallRequest {
            request_id: 5,
            payload: SyscallRequestPayload::Close {
                channel: Handle::new(2, 3),
            },
        };
        let encoded = codec.encode_request(&request).unwrap();
        assert_eq!(codec.decode_request(&encoded).unwrap(), request);
    }
}
