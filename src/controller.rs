use crate::capture::{CaptureError, DeviceDescriptor, FormatProfile, FrameBuffer, FrameSource};
use crate::channel::{ChannelError, Command, CommandChannel};
use crate::writer::{ImageWriter, WriteError};
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("Controller has not been opened")]
    NotReady,

    #[error("No frame after {0} pull attempts")]
    PullExhausted(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Initializing,
    AwaitingCommand,
    Capturing { sender: SocketAddr },
}

/// How hard to try for a frame once a capture is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PullPolicy {
    /// `None` keeps pulling until the device delivers
    pub max_attempts: Option<u64>,
}

/// Result of handling one received command
#[derive(Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Command was not CAPTURE and was dropped
    Ignored(Command),
    /// Frame written and DONE sent
    Captured { path: PathBuf, sender: SocketAddr },
    /// Capture failed; no DONE was sent
    Aborted { sender: SocketAddr },
}

/// Sequences commands, captures and acknowledgements on a single thread
pub struct CaptureController<S, W, C>
where
    S: FrameSource,
    W: ImageWriter,
    C: CommandChannel,
{
    source: S,
    writer: W,
    channel: C,
    profile: FormatProfile,
    policy: PullPolicy,
    state: ControllerState,
}

impl<S, W, C> CaptureController<S, W, C>
where
    S: FrameSource,
    W: ImageWriter,
    C: CommandChannel,
{
    pub fn new(source: S, writer: W, channel: C, profile: FormatProfile, policy: PullPolicy) -> Self {
        Self {
            source,
            writer,
            channel,
            profile,
            policy,
            state: ControllerState::Initializing,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Select the device, commit the capture format, then announce READY
    ///
    /// READY is only sent once both discovery and negotiation succeed.
    pub fn open(&mut self, device_name: &str) -> Result<DeviceDescriptor, ControllerError> {
        let device = self.source.discover(device_name)?;
        tracing::info!("Found capture device {:?} ({})", device.name, device.handle);

        self.profile = self.source.negotiate(&self.profile)?;

        if let Err(err) = self.channel.announce_ready() {
            tracing::warn!("Failed to announce readiness: {}", err);
        }
        tracing::info!("Ready, awaiting commands");

        self.state = ControllerState::AwaitingCommand;
        Ok(device)
    }

    /// Serve commands until the control socket itself fails
    pub fn run(&mut self) -> Result<(), ControllerError> {
        let mut captured: u64 = 0;
        loop {
            match self.step()? {
                CycleOutcome::Captured { path, sender } => {
                    captured += 1;
                    tracing::debug!("Capture {} for {} -> {}", captured, sender, path.display());
                }
                CycleOutcome::Aborted { sender } => {
                    tracing::debug!("No DONE sent to {}", sender);
                }
                CycleOutcome::Ignored(_) => {}
            }
        }
    }

    /// Receive one command and handle it
    ///
    /// Receive errors that only concern one datagram are logged and the wait
    /// continues. Other receive errors propagate. A failed capture is logged
    /// and reported as [`CycleOutcome::Aborted`].
    pub fn step(&mut self) -> Result<CycleOutcome, ControllerError> {
        if self.state == ControllerState::Initializing {
            return Err(ControllerError::NotReady);
        }

        let received = loop {
            match self.channel.receive_command() {
                Ok(received) => break received,
                Err(err) if err.is_transient() => {
                    tracing::warn!("Control receive failed, still waiting: {}", err);
                }
                Err(err) => return Err(err.into()),
            }
        };
        if received.command != Command::Capture {
            tracing::debug!("Ignoring {:?} from {}", received.command, received.sender);
            return Ok(CycleOutcome::Ignored(received.command));
        }

        tracing::info!("Capture requested by {}", received.sender);
        self.state = ControllerState::Capturing {
            sender: received.sender,
        };
        let outcome = match self.capture(received.sender) {
            Ok(path) => CycleOutcome::Captured {
                path,
                sender: received.sender,
            },
            Err(err) => {
                tracing::error!("Capture for {} aborted: {}", received.sender, err);
                CycleOutcome::Aborted {
                    sender: received.sender,
                }
            }
        };
        self.state = ControllerState::AwaitingCommand;

        Ok(outcome)
    }

    fn capture(&mut self, sender: SocketAddr) -> Result<PathBuf, ControllerError> {
        let frame = self.next_frame()?;

        let written = self.writer.write(&frame, &self.profile);
        drop(frame);

        // Reset even after a failed write so the next cycle never sees this frame
        let reset = self.source.reset();

        let path = match written {
            Ok(path) => path,
            Err(err) => {
                if let Err(reset_err) = reset {
                    tracing::warn!("Stream reset failed: {}", reset_err);
                }
                return Err(err.into());
            }
        };
        tracing::info!("Saved {}", path.display());

        if let Err(err) = reset {
            tracing::warn!("Stream reset after {} failed: {}", path.display(), err);
        }

        if let Err(err) = self.channel.acknowledge(sender) {
            tracing::warn!("Failed to acknowledge {}: {}", sender, err);
        }
        Ok(path)
    }

    fn next_frame(&mut self) -> Result<FrameBuffer, ControllerError> {
        let mut attempts: u64 = 0;
        loop {
            if let Some(max) = self.policy.max_attempts {
                if attempts >= max {
                    return Err(ControllerError::PullExhausted(attempts));
                }
            }
            attempts += 1;

            match self.source.pull()? {
                Some(frame) if !frame.is_empty() => {
                    tracing::debug!("Frame of {} bytes after {} pulls", frame.len(), attempts);
                    return Ok(frame);
                }
                _ => std::thread::yield_now(),
            }
        }
    }

    /// Release the capture device
    pub fn close(&mut self) {
        self.source.close();
        self.state = ControllerState::Initializing;
    }
}

impl<S, W, C> Drop for CaptureController<S, W, C>
where
    S: FrameSource,
    W: ImageWriter,
    C: CommandChannel,
{
    fn drop(&mut self) {
        self.close();
    }
}
