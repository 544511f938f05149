//! [`DisplayNegotiator`] over the Rockchip HDMI sysfs nodes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use rk_common::{Display3dMode, DisplayError, DisplayNegotiator, ResolutionInfo};

use crate::mode::{
    native_mode_string, parse_3d_capabilities, parse_current_3d_mode, subtitle_line,
    sys_mode_to_resolution,
};

/// Default sysfs class directory.
pub const DISPLAY_CLASS_ROOT: &str = "/sys/class/display";

/// HDMI node directories, in the order they are tried.
const HDMI_NODE_DIRS: [&str; 2] = ["display0.HDMI", "HDMI"];

/// Where and how to drive the display.
#[derive(Clone, Debug)]
pub struct DisplayConfig {
    /// Directory holding the `display0.HDMI` / `HDMI` node directories.
    pub root: PathBuf,
    /// Request 4:2:0 sampling for 2160p50/60.
    pub prefer_ycbcr420: bool,
    /// GUI framebuffer size, when it differs from the HDMI mode.
    pub framebuffer: Option<(u32, u32)>,
    /// Node that toggles fractional (x/1001) refresh rates, if the kernel
    /// exposes one.
    pub fractional_node: Option<PathBuf>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DISPLAY_CLASS_ROOT),
            prefer_ycbcr420: true,
            framebuffer: None,
            fractional_node: None,
        }
    }
}

/// The HDMI output of a Rockchip board.
pub struct SysfsDisplay {
    config: DisplayConfig,
    node_dir: PathBuf,
    /// Last mode string read from or written to the `mode` node.
    current_mode: Mutex<String>,
    fractional: Mutex<bool>,
}

impl SysfsDisplay {
    /// Whether an HDMI mode node exists under `root`.
    pub fn is_compatible(root: &Path) -> bool {
        find_node_dir(root).is_some()
    }

    pub fn open(config: DisplayConfig) -> Result<Self, DisplayError> {
        let node_dir = find_node_dir(&config.root).ok_or(DisplayError::NoDisplayNode)?;
        info!(node = %node_dir.display(), "Using HDMI display node");

        let current = read_trimmed(&node_dir.join("mode")).unwrap_or_default();
        Ok(Self {
            config,
            node_dir,
            current_mode: Mutex::new(current),
            fractional: Mutex::new(false),
        })
    }

    fn node(&self, name: &str) -> PathBuf {
        self.node_dir.join(name)
    }

    /// Apply the framebuffer size to a parsed HDMI mode.
    fn with_framebuffer(&self, mut res: ResolutionInfo) -> ResolutionInfo {
        if let Some((width, height)) = self.config.framebuffer {
            res.width = width;
            res.height = height;
            res.subtitle_line = subtitle_line(height);
        }
        res
    }

    /// Every listed mode, each followed by its 3D variants.
    pub fn probe_resolutions(&self) -> Result<Vec<ResolutionInfo>, DisplayError> {
        let modes = fs::read_to_string(self.node("modes"))?;
        let caps = parse_3d_capabilities(&fs::read_to_string(self.node("3dmode")).unwrap_or_default());

        let mut resolutions = Vec::new();
        for line in modes.lines() {
            let Some(res) = sys_mode_to_resolution(line) else {
                continue;
            };
            let res = self.with_framebuffer(res);

            for cap in caps.iter().filter(|c| c.applies_to(line)) {
                for mode in cap.modes() {
                    resolutions.push(ResolutionInfo {
                        mode_3d: Some(mode),
                        ..res.clone()
                    });
                }
            }
            debug!(
                mode = %res.id,
                width = res.screen_width,
                height = res.screen_height,
                refresh = res.refresh_rate,
                "Probed resolution"
            );
            resolutions.push(res);
        }
        Ok(resolutions)
    }

    /// Raw `cur3dmode` value; `-1` when 3D is off or unknown.
    pub fn current_3d_mode_raw(&self) -> i32 {
        fs::read_to_string(self.node("3dmode"))
            .map(|text| parse_current_3d_mode(&text))
            .unwrap_or(-1)
    }

    /// Write a mode string to the `mode` node.
    pub fn set_display_resolution(&self, mode: &str) -> Result<(), DisplayError> {
        if self.current_3d_mode_raw() >= 0 {
            return Err(DisplayError::ModeLocked3d);
        }
        if sys_mode_to_resolution(mode).is_none() {
            return Err(DisplayError::InvalidMode(mode.to_string()));
        }

        let mut current = self.current_mode.lock();
        if *current == mode {
            debug!(mode, "Display already in requested mode");
            return Ok(());
        }

        fs::write(self.node("mode"), format!("{mode}\n"))?;
        info!(from = %current, to = mode, "Display mode switched");
        *current = mode.to_string();
        Ok(())
    }

    /// Fractional-rate preference last applied.
    pub fn fractional_rate(&self) -> bool {
        *self.fractional.lock()
    }
}

impl DisplayNegotiator for SysfsDisplay {
    fn native_resolution(&self) -> Option<ResolutionInfo> {
        let mode = read_trimmed(&self.node("mode")).ok()?;
        let res = sys_mode_to_resolution(&mode)?;
        *self.current_mode.lock() = mode;
        Some(self.with_framebuffer(res))
    }

    fn set_native_resolution(&self, res: &ResolutionInfo) -> Result<(), DisplayError> {
        let mode = native_mode_string(res, self.config.prefer_ycbcr420);
        debug!(
            width = res.screen_width,
            refresh = res.refresh_rate,
            mode = %mode,
            "Native resolution requested"
        );
        self.set_display_resolution(&mode)
    }

    fn supported_3d_modes(&self) -> Vec<Display3dMode> {
        let current = self.current_mode.lock().clone();
        let text = fs::read_to_string(self.node("3dmode")).unwrap_or_default();
        parse_3d_capabilities(&text)
            .iter()
            .filter(|c| c.applies_to(&current))
            .flat_map(|c| c.modes())
            .collect()
    }

    fn current_3d_mode(&self) -> Option<Display3dMode> {
        Display3dMode::from_sysfs_value(self.current_3d_mode_raw())
    }

    fn set_3d_mode(&self, mode: Option<Display3dMode>) -> Result<(), DisplayError> {
        let value = mode.map(Display3dMode::sysfs_value).unwrap_or(-1);
        fs::write(self.node("3dmode"), value.to_string())?;
        info!(?mode, value, "HDMI 3D mode written");
        Ok(())
    }

    fn set_fractional_rate(&self, enable: bool) -> Result<(), DisplayError> {
        match &self.config.fractional_node {
            Some(node) => {
                fs::write(node, if enable { "1" } else { "0" })?;
                info!(enable, node = %node.display(), "Fractional refresh rate written");
            }
            None => warn!(enable, "No fractional-rate node configured; preference recorded only"),
        }
        *self.fractional.lock() = enable;
        Ok(())
    }
}

fn find_node_dir(root: &Path) -> Option<PathBuf> {
    HDMI_NODE_DIRS
        .iter()
        .map(|dir| root.join(dir))
        .find(|dir| dir.join("mode").exists())
}

fn read_trimmed(path: &Path) -> io::Result<String> {
    Ok(fs::read_to_string(path)?.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(dir_name: &str, mode: &str) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let node = root.path().join(dir_name);
        fs::create_dir_all(&node).unwrap();
        fs::write(node.join("mode"), format!("{mode}\n")).unwrap();
        root
    }

    #[test]
    fn prefers_display0_node() {
        let root = fixture("display0.HDMI", "1920x1080p-60");
        fs::create_dir_all(root.path().join("HDMI")).unwrap();
        fs::write(root.path().join("HDMI/mode"), "1280x720p-60\n").unwrap();

        let display = SysfsDisplay::open(DisplayConfig {
            root: root.path().to_path_buf(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(display.native_resolution().unwrap().screen_width, 1920);
    }

    #[test]
    fn falls_back_to_hdmi_node() {
        let root = fixture("HDMI", "1280x720p-50");
        assert!(SysfsDisplay::is_compatible(root.path()));
        let display = SysfsDisplay::open(DisplayConfig {
            root: root.path().to_path_buf(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(display.native_resolution().unwrap().refresh_rate, 50.0);
    }

    #[test]
    fn missing_node_is_reported() {
        let root = tempfile::tempdir().unwrap();
        assert!(!SysfsDisplay::is_compatible(root.path()));
        assert!(matches!(
            SysfsDisplay::open(DisplayConfig {
                root: root.path().to_path_buf(),
                ..Default::default()
            }),
            Err(DisplayError::NoDisplayNode)
        ));
    }
}
