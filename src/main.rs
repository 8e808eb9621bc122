mod capture;
mod channel;
mod controller;
mod writer;

use anyhow::{Context, Result};
use capture::{FormatProfile, NokhwaSource};
use channel::UdpCommandChannel;
use clap::Parser;
use controller::{CaptureController, PullPolicy};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use writer::JpegWriter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Friendly name of the camera to use, matched exactly
    #[arg(long, default_value = "Logitech HD Webcam C310")]
    device_name: String,

    /// Address to receive control commands on
    #[arg(long, default_value = "127.0.0.1:10001")]
    listen: SocketAddr,

    /// Controller address that receives the READY announcement
    #[arg(long, default_value = "127.0.0.1:10000")]
    peer: SocketAddr,

    /// Directory to write captured images into
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Device slot suffix appended to image file names
    #[arg(long, default_value = "A")]
    slot: String,

    /// JPEG quality (1-100)
    #[arg(long, default_value_t = 90, value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Give up on a capture after this many empty pulls.
    /// If not provided, keeps pulling until the camera delivers a frame
    #[arg(long)]
    max_pull_attempts: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:#}", err);
            // Startup failures exit with -1
            ExitCode::from(255)
        }
    }
}

fn run(args: &Args) -> Result<()> {
    tracing::info!("camsnap starting");
    tracing::info!("Device: {:?}", args.device_name);
    tracing::info!("Control: listen {} peer {}", args.listen, args.peer);

    let channel = UdpCommandChannel::bind(args.listen, args.peer)
        .context("Failed to initialize control channel")?;
    tracing::info!("Control socket bound on {}", channel.local_addr()?);

    let writer = JpegWriter::new(&args.output_dir, &args.slot, args.jpeg_quality);

    let policy = PullPolicy {
        max_attempts: args.max_pull_attempts,
    };

    let mut controller = CaptureController::new(
        NokhwaSource::new(),
        writer,
        channel,
        FormatProfile::standard(),
        policy,
    );

    controller
        .open(&args.device_name)
        .context("Failed to initialize capture device")?;

    // Only returns if the control socket fails
    controller.run().context("Control channel failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_deployment() {
        let args = Args::parse_from(["camsnap"]);
        assert_eq!(args.device_name, "Logitech HD Webcam C310");
        assert_eq!(args.listen, "127.0.0.1:10001".parse::<SocketAddr>().unwrap());
        assert_eq!(args.peer, "127.0.0.1:10000".parse::<SocketAddr>().unwrap());
        assert_eq!(args.slot, "A");
        assert_eq!(args.max_pull_attempts, None);
    }

    #[test]
    fn test_quality_range_enforced() {
        assert!(Args::try_parse_from(["camsnap", "--jpeg-quality", "0"]).is_err());
        assert!(Args::try_parse_from(["camsnap", "--jpeg-quality", "101"]).is_err());
    }
}
