//! `SysfsDisplay` against a fake sysfs tree in a temp directory.

use std::fs;
use std::path::{Path, PathBuf};

use rk_common::{Display3dMode, DisplayError, DisplayNegotiator, ResolutionInfo};
use rk_display::{DisplayConfig, SysfsDisplay};
use tempfile::TempDir;

const MODES: &str = "\
3840x2160p-60(YCbCr420)
3840x2160p-24
1920x1080p-60
1920x1080p-50
1920x1080p-24
1920x1080i-60
1280x720p-60
";

const CAPS_2D: &str = "\
1920x1080p-24,321
1920x1080p-60,64
1280x720p-60,65
cur3dmode=-1
";

struct Board {
    root: TempDir,
}

impl Board {
    fn new(mode: &str, three_d: &str) -> Self {
        let root = tempfile::tempdir().unwrap();
        let node = root.path().join("display0.HDMI");
        fs::create_dir_all(&node).unwrap();
        fs::write(node.join("mode"), format!("{mode}\n")).unwrap();
        fs::write(node.join("modes"), MODES).unwrap();
        fs::write(node.join("3dmode"), three_d).unwrap();
        Self { root }
    }

    fn node(&self, name: &str) -> PathBuf {
        self.root.path().join("display0.HDMI").join(name)
    }

    fn read(&self, name: &str) -> String {
        fs::read_to_string(self.node(name)).unwrap()
    }

    fn display(&self) -> SysfsDisplay {
        self.display_with(|_| {})
    }

    fn display_with(&self, tweak: impl FnOnce(&mut DisplayConfig)) -> SysfsDisplay {
        let mut config = DisplayConfig {
            root: self.root.path().to_path_buf(),
            ..Default::default()
        };
        tweak(&mut config);
        SysfsDisplay::open(config).unwrap()
    }

    fn path(&self) -> &Path {
        self.root.path()
    }
}

fn request(width: u32, refresh: f32) -> ResolutionInfo {
    ResolutionInfo {
        screen_width: width,
        refresh_rate: refresh,
        ..Default::default()
    }
}

#[test]
fn probe_lists_modes_with_3d_variants() {
    let board = Board::new("1920x1080p-60", CAPS_2D);
    let modes = board.display().probe_resolutions().unwrap();

    // 7 plain modes, 3 variants for 1080p24, 1 for 1080p60, 2 for 720p60.
    assert_eq!(modes.len(), 13);
    let p24: Vec<_> = modes
        .iter()
        .filter(|r| r.id == "1920x1080p-24")
        .map(|r| r.mode_3d)
        .collect();
    assert_eq!(
        p24,
        vec![
            Some(Display3dMode::FramePacking),
            Some(Display3dMode::SideBySide),
            Some(Display3dMode::TopBottom),
            None
        ]
    );
    assert!(modes.iter().any(|r| r.interlaced && r.screen_height == 1080));
}

#[test]
fn framebuffer_size_overrides_gui_resolution() {
    let board = Board::new("3840x2160p-24", CAPS_2D);
    let display = board.display_with(|c| c.framebuffer = Some((1920, 1080)));

    let native = display.native_resolution().unwrap();
    assert_eq!((native.width, native.height), (1920, 1080));
    assert_eq!((native.screen_width, native.screen_height), (3840, 2160));
    assert_eq!(native.subtitle_line, 1042);
}

#[test]
fn supported_3d_follows_current_mode() {
    let board = Board::new("1920x1080p-24", CAPS_2D);
    let display = board.display();
    assert_eq!(
        display.supported_3d_modes(),
        vec![
            Display3dMode::FramePacking,
            Display3dMode::SideBySide,
            Display3dMode::TopBottom
        ]
    );

    let board = Board::new("1920x1080p-50", CAPS_2D);
    assert!(board.display().supported_3d_modes().is_empty());
}

#[test]
fn set_native_resolution_writes_mode() {
    let board = Board::new("1920x1080p-60", CAPS_2D);
    let display = board.display();

    display.set_native_resolution(&request(1920, 24.0)).unwrap();
    assert_eq!(board.read("mode"), "1920x1080p-24\n");

    display.set_native_resolution(&request(3840, 60.0)).unwrap();
    assert_eq!(board.read("mode"), "3840x2160p-60(YCbCr420)\n");
}

#[test]
fn ycbcr420_can_be_disabled() {
    let board = Board::new("1920x1080p-60", CAPS_2D);
    let display = board.display_with(|c| c.prefer_ycbcr420 = false);
    display.set_native_resolution(&request(4096, 50.0)).unwrap();
    assert_eq!(board.read("mode"), "4096x2160p-50\n");
}

#[test]
fn unchanged_mode_is_not_rewritten() {
    let board = Board::new("1920x1080p-60", CAPS_2D);
    let display = board.display();

    // Mark the node so a rewrite would be visible.
    fs::write(board.node("mode"), "untouched").unwrap();
    display.set_display_resolution("1920x1080p-60").unwrap();
    assert_eq!(board.read("mode"), "untouched");
}

#[test]
fn mode_switch_refused_in_3d() {
    let board = Board::new("1920x1080p-24", "1920x1080p-24,1\ncur3dmode=0\n");
    let display = board.display();

    assert_eq!(display.current_3d_mode(), Some(Display3dMode::FramePacking));
    assert!(matches!(
        display.set_display_resolution("1920x1080p-60"),
        Err(DisplayError::ModeLocked3d)
    ));
    assert_eq!(board.read("mode"), "1920x1080p-24\n");
}

#[test]
fn invalid_mode_is_rejected() {
    let board = Board::new("1920x1080p-60", CAPS_2D);
    assert!(matches!(
        board.display().set_display_resolution("bogus"),
        Err(DisplayError::InvalidMode(_))
    ));
}

#[test]
fn set_3d_mode_values() {
    let board = Board::new("1920x1080p-24", CAPS_2D);
    let display = board.display();

    display.set_3d_mode(Some(Display3dMode::SideBySide)).unwrap();
    assert_eq!(board.read("3dmode"), "8");
    display.set_3d_mode(Some(Display3dMode::TopBottom)).unwrap();
    assert_eq!(board.read("3dmode"), "6");
    display.set_3d_mode(Some(Display3dMode::FramePacking)).unwrap();
    assert_eq!(board.read("3dmode"), "0");
    display.set_3d_mode(None).unwrap();
    assert_eq!(board.read("3dmode"), "-1");
}

#[test]
fn fractional_rate_with_and_without_node() {
    let board = Board::new("1920x1080p-24", CAPS_2D);

    let display = board.display();
    display.set_fractional_rate(true).unwrap();
    assert!(display.fractional_rate());

    let node = board.path().join("frac");
    let display = board.display_with(|c| c.fractional_node = Some(node.clone()));
    display.set_fractional_rate(true).unwrap();
    assert_eq!(fs::read_to_string(&node).unwrap(), "1");
    display.set_fractional_rate(false).unwrap();
    assert_eq!(fs::read_to_string(&node).unwrap(), "0");
    assert!(!display.fractional_rate());
}
