//! Rockchip decode helper
//!
//! Small command-line front end for the `rk-decoder` and `rk-display`
//! crates: list the HDMI modes a board offers, or push an elementary stream
//! through `librkffplayer.so` and report what the hardware did with it.

mod playback;
mod probe;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use rk_common::DecoderSettings;
use rk_display::DISPLAY_CLASS_ROOT;

/// Rockchip hardware decode helper
#[derive(Parser, Debug)]
#[command(name = "rkmc-helper")]
#[command(about = "Display probing and hardware decode through librkffplayer")]
#[command(version)]
struct Args {
    /// Decoder settings (JSON); defaults are used when omitted
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Path to librkffplayer.so, overriding the settings file
    #[arg(long, global = true)]
    library: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List HDMI modes, their 3D variants and the active mode
    Modes {
        /// sysfs display class directory
        #[arg(long, default_value = DISPLAY_CLASS_ROOT)]
        sysfs_root: PathBuf,
    },
    /// Decode an elementary stream file on the hardware codec
    Decode(playback::DecodeArgs),
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    let mut settings = match &args.settings {
        Some(path) => DecoderSettings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => DecoderSettings::default(),
    };
    if let Some(library) = args.library {
        settings.library_path = Some(library);
    }
    debug!(?settings, "Decoder settings");

    match args.command {
        Command::Modes { sysfs_root } => probe::run(&sysfs_root),
        Command::Decode(decode) => playback::run(settings, decode),
    }
}
