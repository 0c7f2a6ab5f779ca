//! Gesturepad CLI
//!
//! Replays hand-landmark frames (JSON lines, one frame per line) through the
//! calculator or the canvas and prints a JSON report line whenever the
//! visible state changes.

use anyhow::Context;
use clap::{Parser, Subcommand};
use gesturepad_lib::calculator::CalculatorMachine;
use gesturepad_lib::canvas::CanvasMachine;
use gesturepad_lib::config::Config;
use gesturepad_lib::dispatch::{AiWorker, CanvasDispatcher, InlineDispatcher, OllamaClient};
use gesturepad_lib::pipeline::{self, FrameReport, SessionSummary};
use gesturepad_lib::source::{FrameSource, JsonlFrameSource};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "gesturepad", version, about = "Hand-gesture calculator and air-drawing canvas")]
struct Cli {
    /// Config file (default: ~/.gesturepad/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the gesture calculator
    Calculator {
        /// Frame file, or "-" for stdin
        #[arg(long, default_value = "-")]
        frames: String,
    },

    /// Run the air-drawing canvas
    Canvas {
        /// Frame file, or "-" for stdin
        #[arg(long, default_value = "-")]
        frames: String,

        /// Query the AI on a worker thread instead of blocking the frame loop
        #[arg(long)]
        background: bool,

        /// Write the final canvas to this PNG file
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Seconds to wait for an outstanding AI answer at end of input (0 = don't wait)
        #[arg(long, default_value_t = 30)]
        wait_secs: u64,
    },

    /// List models on the configured AI server
    Models,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    gesturepad_lib::init_logging();
    info!("gesturepad v{} starting", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Command::Calculator { frames } => {
            let mut source = open_frames(&frames)?;
            let mut machine = CalculatorMachine::new(&config.calculator);
            let summary =
                pipeline::run_calculator(source.as_mut(), &config.frame, &mut machine, print_report)?;
            print_summary(&summary);
        }
        Command::Canvas {
            frames,
            background,
            snapshot,
            wait_secs,
        } => {
            let client = OllamaClient::from_config(&config.ai)?;
            let wait = (wait_secs > 0).then(|| Duration::from_secs(wait_secs));
            let source = open_frames(&frames)?;

            if background {
                let worker = AiWorker::spawn(client).context("Failed to start AI worker")?;
                run_canvas(&config, source, worker, wait, snapshot.as_deref())?;
            } else {
                let inline =
                    InlineDispatcher::new(client).context("Failed to create async runtime")?;
                run_canvas(&config, source, inline, wait, snapshot.as_deref())?;
            }
        }
        Command::Models => {
            let client = OllamaClient::from_config(&config.ai)?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(async {
                if !client.is_available().await {
                    anyhow::bail!("AI server at {} is not reachable", config.ai.base_url);
                }
                for model in client.list_models().await? {
                    println!("{}", model);
                }
                Ok::<(), anyhow::Error>(())
            })?;
        }
    }

    Ok(())
}

fn run_canvas<D: CanvasDispatcher>(
    config: &Config,
    mut source: Box<dyn FrameSource>,
    dispatcher: D,
    wait: Option<Duration>,
    snapshot: Option<&Path>,
) -> anyhow::Result<()> {
    let mut machine = CanvasMachine::new(&config.frame, &config.canvas, dispatcher);
    let summary =
        pipeline::run_canvas(source.as_mut(), &config.frame, &mut machine, wait, print_report)?;

    if let Some(path) = snapshot {
        machine
            .rasterizer()
            .save_png(&machine.state().segments, path)?;
    }

    print_summary(&summary);
    Ok(())
}

fn open_frames(frames: &str) -> anyhow::Result<Box<dyn FrameSource>> {
    if frames == "-" {
        info!("Reading frames from stdin");
        Ok(Box::new(JsonlFrameSource::new(std::io::stdin().lock())))
    } else {
        Ok(Box::new(JsonlFrameSource::open(Path::new(frames))?))
    }
}

fn print_report(report: &FrameReport) {
    match serde_json::to_string(report) {
        Ok(line) => println!("{}", line),
        Err(e) => tracing::warn!("Failed to serialise report: {}", e),
    }
}

fn print_summary(summary: &SessionSummary) {
    match serde_json::to_string(&serde_json::json!({ "summary": summary })) {
        Ok(line) => println!("{}", line),
        Err(e) => tracing::warn!("Failed to serialise summary: {}", e),
    }
}
