//! Replay a captured UART hex dump through the device core.
//!
//! The capture is parsed into packets, each packet is dispatched against
//! recording mock collaborators, and the resulting status, collaborator
//! requests and outbound control commands are printed as JSON.

mod capture;

use std::io::Read;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tokio::task::LocalSet;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use auxlink_core::DeviceConfig;
use auxlink_device::{Device, DispatchStats, Dispatcher, StatusSnapshot};
use auxlink_hardware::mock::{MockBoard, MockPlatform};
use auxlink_hardware::{PairingResponse, Platform};
use auxlink_protocol::StreamParser;

const USAGE: &str = "\
usage: auxlink-replay [OPTIONS] <CAPTURE>

Replays a hex dump of chip-to-host UART traffic. Use `-` to read stdin.

options:
  --config <PATH>            device configuration (JSON)
  --provisioned              start from a provisioned, unlocked device
  --pairing <accept|reject>  answer every pairing code automatically
  -h, --help                 print this help";

#[derive(Debug, Default, PartialEq)]
struct Options {
    config: Option<PathBuf>,
    provisioned: bool,
    pairing: Option<PairingResponse>,
    capture: String,
}

impl Options {
    /// Parse the command line. `Ok(None)` means help was requested.
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Option<Self>> {
        let mut options = Options::default();
        let mut capture = None;
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => return Ok(None),
                "--provisioned" => options.provisioned = true,
                "--config" => {
                    let path = args.next().context("--config needs a path")?;
                    options.config = Some(PathBuf::from(path));
                }
                "--pairing" => {
                    options.pairing = Some(match args.next().as_deref() {
                        Some("accept") => PairingResponse::Accepted,
                        Some("reject") => PairingResponse::Rejected,
                        _ => bail!("--pairing expects `accept` or `reject`"),
                    });
                }
                flag if flag.starts_with("--") => bail!("unknown option {flag}"),
                _ if capture.is_some() => bail!("only one capture can be replayed"),
                _ => capture = Some(arg),
            }
        }

        options.capture = capture.context("missing capture file")?;
        Ok(Some(options))
    }
}

#[derive(Debug, Serialize)]
struct Report {
    status: StatusSnapshot,
    dispatch: DispatchStats,
    discarded_bytes: u64,
    rejected_packets: u64,
    ui_events: Vec<String>,
    board_events: Vec<String>,
    control: Vec<String>,
    fault: Option<String>,
}

async fn replay(options: &Options, config: DeviceConfig, bytes: &[u8]) -> Report {
    let board = if options.provisioned {
        MockBoard::provisioned()
    } else {
        MockBoard::new()
    };
    let (platform, _handle) = MockPlatform::with_board(board);
    platform.ui().set_auto_response(options.pairing);

    let mut parser = StreamParser::from_config(&config);
    let (device, mut control) = Device::new(platform, config);
    let dispatcher = Dispatcher::new(Rc::new(device));
    let device = dispatcher.device();

    parser.feed(bytes);
    while let Some(frame) = parser.next_frame() {
        match dispatcher.dispatch(&frame).await {
            Ok(outcome) => debug!(?outcome, "frame replayed"),
            Err(error) => device.report_fault("dispatcher", &error),
        }
        // Give detached pairing tasks a chance to run between frames.
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        if device.is_faulted() {
            warn!("replay stopped by a fault");
            break;
        }
    }

    let platform = device.platform();
    Report {
        status: device.snapshot(),
        dispatch: dispatcher.stats(),
        discarded_bytes: parser.discarded_bytes(),
        rejected_packets: parser.rejected_packets(),
        ui_events: debug_strings(platform.ui().events()),
        board_events: debug_strings(platform.board().events()),
        control: control.drain().iter().map(ToString::to_string).collect(),
        fault: device.fault(),
    }
}

fn debug_strings<T: std::fmt::Debug>(items: Vec<T>) -> Vec<String> {
    items.iter().map(|item| format!("{item:?}")).collect()
}

fn read_capture(source: &str) -> Result<String> {
    if source == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading capture from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(source).with_context(|| format!("reading capture {source}"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(options) = Options::parse(std::env::args().skip(1))? else {
        println!("{USAGE}");
        return Ok(());
    };

    let config = match &options.config {
        Some(path) => DeviceConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => DeviceConfig::default(),
    };
    config.validate().context("invalid configuration")?;

    let bytes = capture::parse_hex(&read_capture(&options.capture)?)?;
    info!(bytes = bytes.len(), "replaying capture");

    let report = LocalSet::new()
        .run_until(replay(&options, config, &bytes))
        .await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(fault) = &report.fault {
        bail!("device faulted: {fault}");
    }
    Ok(())
}
