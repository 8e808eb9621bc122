mod udp;

pub use udp::UdpCommandChannel;

use std::net::SocketAddr;
use thiserror::Error;

/// Errors raised by the control channel
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Failed to bind control socket on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Control socket I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChannelError {
    /// Errors tied to one datagram rather than to the socket itself
    pub fn is_transient(&self) -> bool {
        match self {
            ChannelError::Io(err) => is_per_datagram(err),
            ChannelError::Bind { .. } => false,
        }
    }
}

// Winsock error for a datagram larger than the receive buffer
const WSAEMSGSIZE: i32 = 10040;

/// Receive errors that only affect the datagram at hand
///
/// Windows reports an ICMP port-unreachable for an earlier send as a reset
/// on the next receive, and an oversized datagram as `WSAEMSGSIZE`.
pub(crate) fn is_per_datagram(err: &std::io::Error) -> bool {
    use std::io::ErrorKind;

    matches!(
        err.kind(),
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionRefused
            | ErrorKind::InvalidInput
            | ErrorKind::Interrupted
    ) || (cfg!(windows) && err.raw_os_error() == Some(WSAEMSGSIZE))
}

/// Single-byte control commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Agent is up and waiting for commands
    Ready,
    /// Take one photo
    Capture,
    /// Photo written
    Done,
    /// Any other byte; ignored by the controller
    Unknown(u8),
}

impl Command {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b'a' => Command::Ready,
            b't' => Command::Capture,
            b'd' => Command::Done,
            other => Command::Unknown(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Command::Ready => b'a',
            Command::Capture => b't',
            Command::Done => b'd',
            Command::Unknown(byte) => byte,
        }
    }
}

/// A command together with the address it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Received {
    pub command: Command,
    pub sender: SocketAddr,
}

/// Trait for the controller's command transport
pub trait CommandChannel {
    /// Send READY to the configured peer
    fn announce_ready(&mut self) -> Result<(), ChannelError>;

    /// Block until one command arrives
    fn receive_command(&mut self) -> Result<Received, ChannelError>;

    /// Send DONE to `sender`
    fn acknowledge(&mut self, sender: SocketAddr) -> Result<(), ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_bytes() {
        assert_eq!(Command::from_byte(b'a'), Command::Ready);
        assert_eq!(Command::from_byte(b't'), Command::Capture);
        assert_eq!(Command::from_byte(b'd'), Command::Done);
        assert_eq!(Command::Done.to_byte(), b'd');
        assert_eq!(Command::Ready.to_byte(), b'a');
    }

    #[test]
    fn test_per_datagram_errors_are_transient() {
        use std::io::{Error, ErrorKind};

        for kind in [ErrorKind::ConnectionReset, ErrorKind::ConnectionRefused, ErrorKind::InvalidInput] {
            assert!(ChannelError::Io(Error::new(kind, "datagram")).is_transient());
        }
        assert!(!ChannelError::Io(Error::new(ErrorKind::NotConnected, "socket")).is_transient());
    }

    #[cfg(windows)]
    #[test]
    fn test_oversized_datagram_is_transient() {
        let err = std::io::Error::from_raw_os_error(WSAEMSGSIZE);
        assert!(ChannelError::Io(err).is_transient());
    }

    #[test]
    fn test_unknown_byte_preserved() {
        assert_eq!(Command::from_byte(b'x'), Command::Unknown(b'x'));
        assert_eq!(Command::from_byte(b'T'), Command::Unknown(b'T'));
        assert_eq!(Command::Unknown(b'x').to_byte(), b'x');
    }
}
