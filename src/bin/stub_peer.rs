//! Minimal peer speaking the lockstep protocol.
//!
//! Answers every action with a solid frame, a fixed reward and a done flag
//! every `--episode-len` ticks. Exits cleanly when the bridge closes the
//! stream.
//!
//! Usage:
//!   bridge-stub-peer [--gray N] [--reward R] [--episode-len N] [--echo-action] [--debug] <port>

// ============================================================================
// Imports
// ============================================================================

use std::process::ExitCode;

use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use lockstep_bridge::protocol::FRAME_LEN;
use lockstep_bridge::{Error, PeerClient, Result};

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    /// Fill value for every frame byte.
    gray: u8,
    /// Reward reported each tick.
    reward: f32,
    /// Ticks per episode; 0 never ends an episode.
    episode_len: u64,
    /// Fill frames with the received action byte instead of `gray`.
    echo_action: bool,
    /// Verbose logging.
    debug: bool,
    /// Bridge port.
    port: u16,
}

impl Args {
    /// Parses arguments; the port is the last one.
    fn parse(args: impl IntoIterator<Item = String>) -> std::result::Result<Self, String> {
        let mut parsed = Self {
            gray: 128,
            reward: 0.0,
            episode_len: 0,
            echo_action: false,
            debug: false,
            port: 0,
        };
        let mut port = None;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--gray" => parsed.gray = value(&arg, args.next())?,
                "--reward" => parsed.reward = value(&arg, args.next())?,
                "--episode-len" => parsed.episode_len = value(&arg, args.next())?,
                "--echo-action" => parsed.echo_action = true,
                "--debug" => parsed.debug = true,
                other if other.starts_with("--") => return Err(format!("unknown flag {other}")),
                other => {
                    port = Some(
                        other
                            .parse()
                            .map_err(|_| format!("invalid port {other:?}"))?,
                    );
                }
            }
        }

        parsed.port = port.ok_or("missing port argument")?;
        Ok(parsed)
    }
}

/// Parses the value following `flag`.
fn value<T: std::str::FromStr>(flag: &str, raw: Option<String>) -> std::result::Result<T, String> {
    let raw = raw.ok_or_else(|| format!("{flag} needs a value"))?;
    raw.parse().map_err(|_| format!("invalid value {raw:?} for {flag}"))
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("bridge-stub-peer: {message}");
            eprintln!(
                "usage: bridge-stub-peer [--gray N] [--reward R] [--episode-len N] \
                 [--echo-action] [--debug] <port>"
            );
            return ExitCode::from(2);
        }
    };
    init_logging(args.debug);

    match run(&args).await {
        Ok(()) | Err(Error::ConnectionClosed) => {
            info!("Bridge closed the stream, exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Stub peer failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<()> {
    let mut peer = PeerClient::connect(args.port).await?;
    let mut frame = vec![args.gray; FRAME_LEN];
    let mut tick: u64 = 0;

    loop {
        let action = peer.recv_action().await?;
        tick += 1;

        if args.echo_action {
            frame.fill(action);
        }

        let done = args.episode_len > 0 && tick % args.episode_len == 0;
        debug!(tick, action, done, "Tick");

        peer.send_step(&frame, args.reward, done).await?;
    }
}

/// Initialize tracing/logging on stderr.
fn init_logging(debug: bool) {
    let filter = if debug {
        "bridge_stub_peer=debug,lockstep_bridge=debug"
    } else {
        "bridge_stub_peer=info,lockstep_bridge=info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<Args, String> {
        Args::parse(args.iter().map(|s| (*s).to_string()))
    }

    #[test]
    fn test_parse_port_only() {
        let args = parse(&["45000"]).unwrap();
        assert_eq!(args.port, 45000);
        assert_eq!(args.gray, 128);
        assert_eq!(args.episode_len, 0);
        assert!(!args.echo_action);
    }

    #[test]
    fn test_parse_flags_before_port() {
        let args = parse(&[
            "--gray",
            "7",
            "--reward",
            "1.5",
            "--episode-len",
            "3",
            "--echo-action",
            "9",
        ])
        .unwrap();
        assert_eq!(args.gray, 7);
        assert_eq!(args.reward, 1.5);
        assert_eq!(args.episode_len, 3);
        assert!(args.echo_action);
        assert_eq!(args.port, 9);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["--gray"]).is_err());
        assert!(parse(&["--gray", "300", "1"]).is_err());
        assert!(parse(&["--bogus", "1"]).is_err());
        assert!(parse(&["not-a-port"]).is_err());
    }
}
