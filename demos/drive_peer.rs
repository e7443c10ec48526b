//! Drive a peer for a number of steps and save a preview.
//!
//! Demonstrates:
//! - Launching a peer through the builder
//! - Reset/step loop with episode handling
//! - Exporting the last observation and raw frame as PNG
//!
//! Usage:
//!   cargo build --bin bridge-stub-peer
//!   cargo run --example drive_peer -- target/debug/bridge-stub-peer --echo-action
//!   cargo run --example drive_peer -- --steps 500 --preview out --debug ./bullettest

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, bail};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lockstep_bridge::Session;
use lockstep_bridge::frame::PREVIEW_SCALE;
use lockstep_bridge::protocol::ACTION_COUNT;

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    steps: u64,
    preview: Option<PathBuf>,
    debug: bool,
    program: PathBuf,
    peer_args: Vec<String>,
}

impl Args {
    /// Parse command-line arguments.
    ///
    /// Flags come first; the first non-flag is the peer program and
    /// everything after it is passed to the peer.
    fn parse() -> anyhow::Result<Self> {
        let mut args = std::env::args().skip(1);
        let mut steps = 100;
        let mut preview = None;
        let mut debug = false;

        let program = loop {
            match args.next().as_deref() {
                Some("--steps") => {
                    steps = args
                        .next()
                        .context("--steps needs a value")?
                        .parse()
                        .context("--steps must be a number")?;
                }
                Some("--preview") => {
                    preview = Some(args.next().context("--preview needs a path")?.into());
                }
                Some("--debug") => debug = true,
                Some(program) => break PathBuf::from(program),
                None => {
                    bail!("usage: drive_peer [--steps N] [--preview PREFIX] [--debug] <peer> [args...]")
                }
            }
        };

        Ok(Self {
            steps,
            preview,
            debug,
            program,
            peer_args: args.collect(),
        })
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = match Args::parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e:#}");
            std::process::exit(2);
        }
    };
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    println!("=== drive_peer ===\n");

    // ========================================================================
    // Setup
    // ========================================================================

    println!("[Setup] Launching {}...", args.program.display());

    let mut session = Session::builder()
        .program(&args.program)
        .args(args.peer_args.iter().cloned())
        .launch()
        .await
        .context("launching peer")?;

    println!(
        "[Setup] Connected on port {} (pid {})",
        session.port().unwrap_or_default(),
        session.pid().unwrap_or_default()
    );

    // ========================================================================
    // Loop
    // ========================================================================

    let started = Instant::now();
    let mut observation = session.reset().await?;
    let mut episodes = 0u64;
    let mut episode_reward = 0.0f32;

    for tick in 0..args.steps {
        let action = (tick % ACTION_COUNT as u64) as u8;
        let result = session.step(action).await?;

        episode_reward += result.reward;
        observation = result.observation;

        if result.done {
            episodes += 1;
            info!(episode = episodes, reward = episode_reward, "Episode finished");
            episode_reward = 0.0;
            observation = session.reset().await?;
        }
    }

    let elapsed = started.elapsed();
    println!(
        "[Loop] {} steps, {} episodes in {:.2?} ({:.0} steps/s)",
        args.steps,
        episodes,
        elapsed,
        args.steps as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );

    // ========================================================================
    // Preview
    // ========================================================================

    if let Some(prefix) = &args.preview {
        let observation_path = prefix.with_extension("observation.png");
        observation.save_png(&observation_path, PREVIEW_SCALE)?;
        println!("[Preview] Observation -> {}", observation_path.display());

        if let Some(frame) = session.last_frame() {
            let frame_path = prefix.with_extension("frame.png");
            frame.save_png(&frame_path)?;
            println!("[Preview] Raw frame   -> {}", frame_path.display());
        }
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    session.close().await?;
    println!("\n[Done] Session closed");

    Ok(())
}

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let filter = if debug {
        "lockstep_bridge=debug,drive_peer=debug"
    } else {
        "lockstep_bridge=info,drive_peer=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}
