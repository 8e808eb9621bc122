use super::{is_per_datagram, ChannelError, Command, CommandChannel, Received};
use std::net::{SocketAddr, UdpSocket};

// Only the first byte matters. Longer datagrams are truncated on Unix and
// rejected with WSAEMSGSIZE on Windows.
const RECV_BUFFER_LEN: usize = 64;

/// Control channel over a bound loopback UDP socket
pub struct UdpCommandChannel {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpCommandChannel {
    /// Bind the command socket on `listen`; READY goes to `peer`
    pub fn bind(listen: SocketAddr, peer: SocketAddr) -> Result<Self, ChannelError> {
        tracing::info!("Binding control socket on {} (peer {})", listen, peer);

        let socket =
            UdpSocket::bind(listen).map_err(|source| ChannelError::Bind { addr: listen, source })?;

        Ok(Self { socket, peer })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ChannelError> {
        Ok(self.socket.local_addr()?)
    }

    fn send(&self, command: Command, to: SocketAddr) -> Result<(), ChannelError> {
        self.socket.send_to(&[command.to_byte()], to)?;
        tracing::debug!("Sent {:?} to {}", command, to);
        Ok(())
    }
}

impl CommandChannel for UdpCommandChannel {
    fn announce_ready(&mut self) -> Result<(), ChannelError> {
        self.send(Command::Ready, self.peer)
    }

    fn receive_command(&mut self) -> Result<Received, ChannelError> {
        let mut buf = [0u8; RECV_BUFFER_LEN];
        loop {
            let (len, sender) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(err) if is_per_datagram(&err) => {
                    tracing::warn!("Dropped control datagram: {}", err);
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            if len == 0 {
                tracing::debug!("Ignoring empty datagram from {}", sender);
                continue;
            }

            let command = Command::from_byte(buf[0]);
            tracing::debug!("Received {:?} from {}", command, sender);
            return Ok(Received { command, sender });
        }
    }

    fn acknowledge(&mut self, sender: SocketAddr) -> Result<(), ChannelError> {
        self.send(Command::Done, sender)
    }
}
