//! Control-socket attach handshake: connect to a named
//! local-domain socket, receive one ancillary file descriptor plus a
//! 128-byte control record, then disconnect — the socket isn't needed
//! again once the ring memory is mapped.

use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::net::UnixStream;

use nix::sys::socket::{recvmsg, ControlMessageOwned, MsgFlags};
use nix::sys::uio::IoSliceMut;

use crate::error::SensorError;

pub const CONTROL_RECORD_SIZE: usize = 128;

/// u8 type=0x01, reserved[3], u32 version, u64 ring-size, char[108]
/// diagnostic path.
pub struct ControlRecord {
    pub record_type: u8,
    pub version: u32,
    pub ring_size: u64,
    pub diagnostic_path: String,
}

impl ControlRecord {
    fn parse(raw: &[u8; CONTROL_RECORD_SIZE]) -> Result<Self, SensorError> {
        let record_type = raw[0];
        if record_type != 0x01 {
            return Err(SensorError::HandshakeFailed(format!(
                "unexpected control record type {record_type}"
            )));
        }
        let version = u32::from_le_bytes(raw[4..8].try_into().unwrap());
        let ring_size = u64::from_le_bytes(raw[8..16].try_into().unwrap());
        let path_bytes = &raw[16..16 + 108];
        let nul = path_bytes.iter().position(|&b| b == 0).unwrap_or(path_bytes.len());
        let diagnostic_path = String::from_utf8_lossy(&path_bytes[..nul]).into_owned();
        Ok(Self { record_type, version, ring_size, diagnostic_path })
    }
}

pub struct HandshakeResult {
    pub ring_fd: OwnedFd,
    pub control: ControlRecord,
}

/// Connects to `socket_path`, performs the handshake, and closes the
/// connection. The returned `ring_fd` is the caller's to `mmap`.
pub fn attach(socket_path: &str) -> Result<HandshakeResult, SensorError> {
    let stream = UnixStream::connect(socket_path)
        .map_err(|e| SensorError::HandshakeFailed(format!("connect {socket_path}: {e}")))?;
    let raw_fd = stream.as_raw_fd();

    let mut control_buf = [0u8; CONTROL_RECORD_SIZE];
    let mut iov = [IoSliceMut::new(&mut control_buf)];
    let mut cmsg_space = nix::cmsg_space!([std::os::fd::RawFd; 1]);

    let message = recvmsg::<()>(raw_fd, &mut iov, Some(&mut cmsg_space), MsgFlags::empty())
        .map_err(|e| SensorError::HandshakeFailed(format!("recvmsg: {e}")))?;

    let mut ring_fd = None;
    for cmsg in message.cmsgs().map_err(|e| SensorError::HandshakeFailed(e.to_string()))? {
        if let ControlMessageOwned::ScmRights(fds) = cmsg {
            if let Some(&fd) = fds.first() {
                use std::os::fd::FromRawFd;
                ring_fd = Some(unsafe { OwnedFd::from_raw_fd(fd) });
            }
        }
    }

    let ring_fd = ring_fd.ok_or_else(|| {
        SensorError::HandshakeFailed("no ring descriptor in ancillary data".into())
    })?;

    let control = ControlRecord::parse(&control_buf)?;

    // `stream` drops here, closing the control socket; the ring fd and the
    // caller's mmap of it remain valid independently.
    Ok(HandshakeResult { ring_fd, control })
}
