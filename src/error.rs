//! Kernel error taxonomy.
//!
//! Internal APIs return [`KResult<T>`]; the syscall dispatcher is the
//! only place a [`Error`] is converted to a negative errno via
//! [`Error::to_errno`]. Everything else propagates the typed value with
//! `?`, the way the reference kernel's `KernelError`/`KernelResult` pair
//! does, trimmed to the syscall-shaped taxonomy this kernel needs.

use core::fmt;

#[repr(isize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "kernel errors must be handled, not silently discarded"]
pub enum Error {
    Success = 0,
    Perm = 1,
    NoEnt = 2,
    Io = 5,
    NoDev = 19,
    Inval = 22,
    NFile = 23,
    MFile = 24,
    NotDirectory = 20,
    IsDirectory = 21,
    Exist = 17,
    WouldBlock = 11,
    Busy = 16,
    SeekPipe = 29,
    ReadOnlyFs = 30,
    NameTooLong = 36,
    NotImplemented = 38,
    BadFd = 9,
    NotSupported = 95,
    NotSocket = 88,
    DestAddrRequired = 89,
    MsgSize = 90,
    Prototype = 91,
    NoProtoOpt = 92,
    ProtoNotSupported = 93,
    SockTNotSupported = 94,
    PfNotSupported = 96,
    AfNotSupported = 97,
    AddrInUse = 98,
    AddrNotAvailable = 99,
    NetDown = 100,
    NetUnreachable = 101,
    NoBufferSpace = 105,
    IsConnected = 106,
    NotConnected = 107,
    NoMem = 12,
}

impl Error {
    /// The value written into the syscall return register: the negative
    /// of the error's numeric identifier.
    pub const fn to_errno(self) -> isize {
        -(self as isize)
    }
}

pub type KResult<T> = Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::Success => "success",
            Error::Perm => "operation not permitted",
            Error::NoEnt => "no such file or directory",
            Error::Io => "I/O error",
            Error::NoDev => "no such device",
            Error::Inval => "invalid argument",
            Error::NFile => "too many open files in system",
            Error::MFile => "too many open files",
            Error::NotDirectory => "not a directory",
            Error::IsDirectory => "is a directory",
            Error::Exist => "already exists",
            Error::WouldBlock => "operation would block",
            Error::Busy => "device or resource busy",
            Error::SeekPipe => "illegal seek on pipe",
            Error::ReadOnlyFs => "read-only file system",
            Error::NameTooLong => "name too long",
            Error::NotImplemented => "function not implemented",
            Error::BadFd => "bad file descriptor",
            Error::NotSupported => "operation not supported",
            Error::NotSocket => "not a socket",
            Error::DestAddrRequired => "destination address required",
            Error::MsgSize => "message too long",
            Error::Prototype => "protocol wrong type for socket",
            Error::NoProtoOpt => "protocol not available",
            Error::ProtoNotSupported => "protocol not supported",
            Error::SockTNotSupported => "socket type not supported",
            Error::PfNotSupported => "protocol family not supported",
            Error::AfNotSupported => "address family not supported",
            Error::AddrInUse => "address already in use",
            Error::AddrNotAvailable => "cannot assign requested address",
            Error::NetDown => "network is down",
            Error::NetUnreachable => "network is unreachable",
            Error::NoBufferSpace => "no buffer space available",
            Error::IsConnected => "already connected",
            Error::NotConnected => "not connected",
            Error::NoMem => "out of memory",
        };
        f.write_str(msg)
    }
}
