//! Display-side types: per-frame timing snapshots, screen geometry,
//! output resolutions, and the interface to the display device.

use serde::{Deserialize, Serialize};

use crate::error::DisplayError;
use crate::stereo::StereoMode;

// ---------------------------------------------------------------------------
// Display timing snapshot
// ---------------------------------------------------------------------------

/// Which stage of the hardware pipeline reported a display event.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DisplayEventType {
    /// No event received yet.
    #[default]
    None,
    /// A picture left the decoder.
    Decode,
    /// A picture was put on screen.
    Render,
    /// A type tag this crate does not know about.
    Unknown(u32),
}

impl DisplayEventType {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::None,
            1 => Self::Decode,
            2 => Self::Render,
            other => Self::Unknown(other),
        }
    }
}

/// Latest display timing reported by the hardware.
///
/// Timestamps are in microseconds. `record` is the per-session sequence
/// number assigned by the coordinator; it is `-1` until the first event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DisplayInfo {
    pub event: DisplayEventType,
    /// Presentation timestamp as reported by the hardware.
    pub raw_pts: i64,
    /// Sync-adjusted presentation timestamp.
    pub pts: i64,
    pub eos: bool,
    pub record: i64,
}

impl Default for DisplayInfo {
    fn default() -> Self {
        Self {
            event: DisplayEventType::None,
            raw_pts: 0,
            pts: 0,
            eos: false,
            record: -1,
        }
    }
}

impl DisplayInfo {
    /// Drift between the hardware clock and the corrected clock.
    pub fn drift(&self) -> i64 {
        self.raw_pts.saturating_sub(self.pts)
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Axis-aligned rectangle in screen or source pixels.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Rect {
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }
}

// ---------------------------------------------------------------------------
// Output resolutions
// ---------------------------------------------------------------------------

/// HDMI 3D output structure.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Display3dMode {
    SideBySide,
    TopBottom,
    FramePacking,
}

impl Display3dMode {
    /// Value written to the HDMI `3dmode` node.
    pub fn sysfs_value(self) -> i32 {
        match self {
            Self::SideBySide => 8,
            Self::TopBottom => 6,
            Self::FramePacking => 0,
        }
    }

    pub fn from_sysfs_value(value: i32) -> Option<Self> {
        match value {
            8 => Some(Self::SideBySide),
            6 => Some(Self::TopBottom),
            0 => Some(Self::FramePacking),
            _ => None,
        }
    }

    /// Bit in the per-mode 3D capability mask reported by the HDMI driver.
    pub fn capability_bit(self) -> u32 {
        match self {
            Self::FramePacking => 1,
            Self::SideBySide => 1 << 6,
            Self::TopBottom => 1 << 8,
        }
    }

    /// The output structure used to show a stereo layout, if any.
    pub fn for_stereo(mode: StereoMode) -> Option<Self> {
        match mode {
            StereoMode::SideBySide => Some(Self::SideBySide),
            StereoMode::TopBottom => Some(Self::TopBottom),
            StereoMode::Mvc => Some(Self::FramePacking),
            StereoMode::Off | StereoMode::Mono2d => None,
        }
    }
}

/// One display output mode.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionInfo {
    pub width: u32,
    pub height: u32,
    pub screen_width: u32,
    pub screen_height: u32,
    pub refresh_rate: f32,
    pub interlaced: bool,
    pub mode_3d: Option<Display3dMode>,
    /// Subtitle baseline in pixels from the top.
    pub subtitle_line: u32,
    /// Human-readable label, e.g. `1920x1080 @ 60.00 - Full Screen`.
    pub label: String,
    /// Mode string exactly as reported by the device.
    pub id: String,
}

impl ResolutionInfo {
    /// Whether this mode runs at (approximately) the given frame rate.
    pub fn matches_rate(&self, fps: f32) -> bool {
        (self.refresh_rate - fps).abs() < 0.5
    }
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// The display device: output mode, HDMI 3D structure, fractional rates.
///
/// Implementations are called from the coordinator's public methods, never
/// from the hardware callback thread.
pub trait DisplayNegotiator: Send + Sync {
    /// The mode the display is currently driven at.
    fn native_resolution(&self) -> Option<ResolutionInfo>;

    /// Switch the display to the mode closest to `res`.
    fn set_native_resolution(&self, res: &ResolutionInfo) -> Result<(), DisplayError>;

    /// 3D structures the display accepts at its current mode.
    fn supported_3d_modes(&self) -> Vec<Display3dMode>;

    /// The 3D structure currently active, if any.
    fn current_3d_mode(&self) -> Option<Display3dMode>;

    /// Enter (`Some`) or leave (`None`) HDMI 3D output.
    fn set_3d_mode(&self, mode: Option<Display3dMode>) -> Result<(), DisplayError>;

    /// Select fractional (23.976 Hz-class) instead of integer refresh rates.
    fn set_fractional_rate(&self, enable: bool) -> Result<(), DisplayError>;
}

/// Receives on-screen geometry changes from the renderer.
pub trait RenderRectListener: Send + Sync {
    fn render_rect_changed(&self, src: Rect, dest: Rect);
}

/// Display negotiator for headless use: reports nothing, accepts everything.
#[derive(Debug, Default)]
pub struct NullDisplay;

impl DisplayNegotiator for NullDisplay {
    fn native_resolution(&self) -> Option<ResolutionInfo> {
        None
    }

    fn set_native_resolution(&self, _res: &ResolutionInfo) -> Result<(), DisplayError> {
        Ok(())
    }

    fn supported_3d_modes(&self) -> Vec<Display3dMode> {
        Vec::new()
    }

    fn current_3d_mode(&self) -> Option<Display3dMode> {
        None
    }

    fn set_3d_mode(&self, _mode: Option<Display3dMode>) -> Result<(), DisplayError> {
        Ok(())
    }

    fn set_fractional_rate(&self, _enable: bool) -> Result<(), DisplayError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_info_starts_before_first_record() {
        let info = DisplayInfo::default();
        assert_eq!(info.record, -1);
        assert_eq!(info.event, DisplayEventType::None);
        assert!(!info.eos);
    }

    #[test]
    fn event_types() {
        assert_eq!(DisplayEventType::from_raw(1), DisplayEventType::Decode);
        assert_eq!(DisplayEventType::from_raw(2), DisplayEventType::Render);
        assert_eq!(DisplayEventType::from_raw(7), DisplayEventType::Unknown(7));
    }

    #[test]
    fn rect_size() {
        let r = Rect::new(0.0, 0.0, 1920.0, 1080.0);
        assert_eq!(r.width(), 1920.0);
        assert_eq!(r.height(), 1080.0);
        assert!(!r.is_empty());
        assert!(Rect::default().is_empty());
    }

    #[test]
    fn sysfs_values_round_trip_through_lookup() {
        assert_eq!(Display3dMode::SideBySide.sysfs_value(), 8);
        assert_eq!(Display3dMode::from_sysfs_value(6), Some(Display3dMode::TopBottom));
        assert_eq!(Display3dMode::from_sysfs_value(-1), None);
    }

    #[test]
    fn stereo_to_output_structure() {
        assert_eq!(
            Display3dMode::for_stereo(StereoMode::Mvc),
            Some(Display3dMode::FramePacking)
        );
        assert_eq!(Display3dMode::for_stereo(StereoMode::Mono2d), None);
    }
}
