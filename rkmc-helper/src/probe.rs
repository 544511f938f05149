//! `modes` subcommand.

use std::path::Path;

use anyhow::Context;
use tracing::info;

use rk_common::DisplayNegotiator;
use rk_display::{DisplayConfig, SysfsDisplay};

pub fn run(root: &Path) -> anyhow::Result<()> {
    let display = SysfsDisplay::open(DisplayConfig {
        root: root.to_path_buf(),
        ..Default::default()
    })
    .with_context(|| format!("No HDMI display under {}", root.display()))?;

    let current = display.native_resolution();
    let modes = display
        .probe_resolutions()
        .context("Failed to read the HDMI mode list")?;
    info!(count = modes.len(), "Probed display modes");

    for res in &modes {
        let active = current.as_ref().is_some_and(|c| c.id == res.id) && res.mode_3d.is_none();
        let marker = if active { "*" } else { " " };
        match res.mode_3d {
            Some(mode) => println!("{marker} {:<28} {}  [3D {mode:?}]", res.id, res.label),
            None => println!("{marker} {:<28} {}", res.id, res.label),
        }
    }

    match display.current_3d_mode() {
        Some(mode) => println!("HDMI 3D: {mode:?}"),
        None => println!("HDMI 3D: off"),
    }
    Ok(())
}
