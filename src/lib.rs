//! Gesturepad - hand-gesture calculator and air-drawing canvas
//!
//! Turns per-frame hand landmarks into calculator input or canvas strokes,
//! with AI judgement of finished drawings.

pub mod calculator;
pub mod canvas;
pub mod config;
pub mod debounce;
pub mod dispatch;
pub mod hand;
pub mod pipeline;
pub mod region;
pub mod source;

/// Format timestamps using the system's local time via chrono
struct LocalTimer;

impl tracing_subscriber::fmt::time::FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Install the global tracing subscriber
///
/// Logs go to stderr (stdout carries reports) and are appended to
/// `~/.gesturepad/logs/gesturepad.log`. `RUST_LOG` overrides the default
/// `info` filter.
pub fn init_logging() {
    use tracing_subscriber::prelude::*;

    let log_dir = config::get_app_dir().join("logs");
    let _ = std::fs::create_dir_all(&log_dir);
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("gesturepad.log"))
        .ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(LocalTimer);

    if let Some(file) = log_file {
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::sync::Mutex::new(file))
            .with_timer(LocalTimer)
            .with_ansi(false);
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .init();
    }
}
