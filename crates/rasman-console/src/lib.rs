//! Console for administering a Retro AIM Server.
//!
//! The library holds everything but the terminal: a generic list component,
//! one controller per page, the settings service and the prompter seam the
//! controllers ask questions through.  `main.rs` drives it from the command
//! line.

pub mod controllers;
pub mod list;
pub mod prompt;
pub mod render;
pub mod settings;
pub mod state;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global `tracing` subscriber.  Logs go to stderr so they never
/// interleave with rendered pages on stdout.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("rasman_console=info,rasman_api=info,rasman_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
