//! Bootstrap synchronization channel between controller and child stages.
//!
//! The protocol is deliberately minimal: every message is a bare 4-byte
//! native-endian tag, requests from the child are answered with exactly one
//! matching acknowledge from the controller, and the loop ends only when
//! the child reports its final PID. The one message with a payload
//! ([`SyncMsg::PidRequest`]) appends a 4-byte PID directly after its tag.
//!
//! Both endpoints are spawned from the same build, so there is no version
//! field and no length prefix; short reads and partial writes are hard
//! errors rather than retryable conditions.

use std::io::{Read, Write};
use std::os::fd::OwnedFd;
use std::os::unix::net::UnixStream;

use nix::sys::socket::{AddressFamily, SockFlag, SockType, socketpair};
use vessel_common::constants::SYNC_FRAME_SIZE;
use vessel_common::error::{Result, VesselError};

/// Control message exchanged during container bootstrap.
///
/// Discriminants start at `0x40` so a stray zeroed frame never decodes as
/// a valid message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SyncMsg {
    /// Child asks the controller to write its user-namespace ID maps.
    UsermapRequest = 0x40,
    /// Controller confirms the ID maps are in place.
    UsermapAck = 0x41,
    /// Child is about to report its final PID (payload follows the tag).
    PidRequest = 0x42,
    /// Controller confirms it stored the reported PID.
    PidAck = 0x43,
    /// Child asks the controller to configure time-namespace offsets.
    TimeOffsetsRequest = 0x44,
    /// Controller confirms the offsets are applied.
    TimeOffsetsAck = 0x45,
}

impl SyncMsg {
    /// Decodes a wire tag.
    ///
    /// # Errors
    ///
    /// Returns a protocol error for tags outside the fixed grammar; the
    /// channel cannot resynchronize after one.
    pub fn from_tag(tag: u32) -> Result<Self> {
        match tag {
            0x40 => Ok(Self::UsermapRequest),
            0x41 => Ok(Self::UsermapAck),
            0x42 => Ok(Self::PidRequest),
            0x43 => Ok(Self::PidAck),
            0x44 => Ok(Self::TimeOffsetsRequest),
            0x45 => Ok(Self::TimeOffsetsAck),
            other => Err(VesselError::Protocol {
                message: format!("unexpected message tag {other:#x}"),
            }),
        }
    }

    /// Returns the wire tag for this message.
    #[must_use]
    pub const fn tag(self) -> u32 {
        self as u32
    }
}

/// One end of the duplex bootstrap channel.
///
/// Exclusively owned: exactly one endpoint lives in the controller and one
/// in the child, and the controller drops (closes) its end once the PID
/// handoff completes.
#[derive(Debug)]
pub struct SyncSocket {
    stream: UnixStream,
}

impl SyncSocket {
    /// Reads one fixed-size frame and decodes it.
    ///
    /// # Errors
    ///
    /// A short read (including a channel closed mid-handshake) or an
    /// unknown tag is a fatal protocol error.
    pub fn recv(&mut self) -> Result<SyncMsg> {
        let mut buf = [0u8; SYNC_FRAME_SIZE];
        self.stream
            .read_exact(&mut buf)
            .map_err(|e| VesselError::Protocol {
                message: format!("failed to read sync message: {e}"),
            })?;
        SyncMsg::from_tag(u32::from_ne_bytes(buf))
    }

    /// Writes one message as a single unbuffered write.
    ///
    /// # Errors
    ///
    /// A failed or partial write is fatal; there is no retry.
    pub fn send(&mut self, msg: SyncMsg) -> Result<()> {
        let buf = msg.tag().to_ne_bytes();
        let n = self.stream.write(&buf).map_err(|e| VesselError::Protocol {
            message: format!("failed to write sync message {msg:?}: {e}"),
        })?;
        if n != buf.len() {
            return Err(VesselError::Protocol {
                message: format!("short write for sync message {msg:?}"),
            });
        }
        Ok(())
    }

    /// Reads the 4-byte PID payload that trails [`SyncMsg::PidRequest`].
    ///
    /// # Errors
    ///
    /// A short read is a fatal protocol error.
    pub fn recv_pid(&mut self) -> Result<u32> {
        let mut buf = [0u8; SYNC_FRAME_SIZE];
        self.stream
            .read_exact(&mut buf)
            .map_err(|e| VesselError::Protocol {
                message: format!("failed to read reported pid: {e}"),
            })?;
        Ok(u32::from_ne_bytes(buf))
    }
}

impl From<UnixStream> for SyncSocket {
    fn from(stream: UnixStream) -> Self {
        Self { stream }
    }
}

impl From<OwnedFd> for SyncSocket {
    fn from(fd: OwnedFd) -> Self {
        Self {
            stream: UnixStream::from(fd),
        }
    }
}

/// Creates the per-launch socket pair.
///
/// The first element is the controller's endpoint; the second is the raw
/// descriptor to hand to the spawned child stage as an inherited fd.
///
/// # Errors
///
/// Returns an error if the `socketpair` syscall fails.
pub fn channel_pair() -> Result<(SyncSocket, OwnedFd)> {
    let (parent, child) = socketpair(
        AddressFamily::Unix,
        SockType::Stream,
        None,
        SockFlag::empty(),
    )
    .map_err(|e| VesselError::Setup {
        message: format!("failed to create bootstrap socket pair: {e}"),
    })?;
    Ok((SyncSocket::from(parent), child))
}

/// Receiver side of the bootstrap handshake.
pub trait SyncHandler {
    /// Processes one decoded message, performing its side effect and
    /// writing the matching acknowledge back on `socket`.
    ///
    /// # Errors
    ///
    /// Any error aborts the handshake; the container process is not usable
    /// afterwards.
    fn on_message(&mut self, msg: SyncMsg, socket: &mut SyncSocket) -> Result<()>;
}

/// Drives the controller side of the handshake until the child reports
/// its PID.
///
/// Messages are processed strictly in arrival order with no pipelining;
/// the only suspension points are the blocking reads and writes on the
/// channel. The loop exits normally only after [`SyncMsg::PidRequest`] has
/// been handled.
///
/// # Errors
///
/// Propagates the first read, decode, or handler error; all are fatal to
/// the bootstrap.
pub fn run_sync(socket: &mut SyncSocket, handler: &mut dyn SyncHandler) -> Result<()> {
    tracing::debug!("bootstrap handshake started");
    loop {
        let msg = socket.recv()?;
        handler.on_message(msg, socket)?;
        if msg == SyncMsg::PidRequest {
            break;
        }
    }
    tracing::debug!("bootstrap handshake finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for msg in [
            SyncMsg::UsermapRequest,
            SyncMsg::UsermapAck,
            SyncMsg::PidRequest,
            SyncMsg::PidAck,
            SyncMsg::TimeOffsetsRequest,
            SyncMsg::TimeOffsetsAck,
        ] {
            assert_eq!(SyncMsg::from_tag(msg.tag()).unwrap(), msg);
        }
    }

    #[test]
    fn unknown_tag_is_protocol_error() {
        assert!(matches!(
            SyncMsg::from_tag(0x99),
            Err(VesselError::Protocol { .. })
        ));
        assert!(matches!(
            SyncMsg::from_tag(0),
            Err(VesselError::Protocol { .. })
        ));
    }

    #[test]
    fn send_and_recv_over_stream_pair() {
        let (a, b) = UnixStream::pair().unwrap();
        let mut tx = SyncSocket::from(a);
        let mut rx = SyncSocket::from(b);
        tx.send(SyncMsg::UsermapRequest).unwrap();
        assert_eq!(rx.recv().unwrap(), SyncMsg::UsermapRequest);
    }

    #[test]
    fn pid_payload_follows_tag() {
        let (a, b) = UnixStream::pair().unwrap();
        let mut tx = SyncSocket::from(a);
        let mut rx = SyncSocket::from(b);
        tx.send(SyncMsg::PidRequest).unwrap();
        let n = tx.stream.write(&4242u32.to_ne_bytes()).unwrap();
        assert_eq!(n, 4);
        assert_eq!(rx.recv().unwrap(), SyncMsg::PidRequest);
        assert_eq!(rx.recv_pid().unwrap(), 4242);
    }

    #[test]
    fn closed_channel_is_protocol_error() {
        let (a, b) = UnixStream::pair().unwrap();
        drop(a);
        let mut rx = SyncSocket::from(b);
        assert!(matches!(rx.recv(), Err(VesselError::Protocol { .. })));
    }
}
