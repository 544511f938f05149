//! Stereo (3D) layout bits understood by the vendor codec.
//!
//! The codec packs the stereo layout into the high nibble of the decode type
//! (`RK_STEREO_MASK`). Only one layout may be set at a time.

use serde::{Deserialize, Serialize};

/// Mask covering every stereo layout bit.
pub const STEREO_MASK: u32 = 0xF000;

/// Stereo layout of the decoded stream.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StereoMode {
    /// Plain 2D stream.
    #[default]
    Off = 0x0000,
    /// Side-by-side (left/right halves).
    SideBySide = 0x1000,
    /// Top-bottom (over/under).
    TopBottom = 0x2000,
    /// Multi-view coding (3D Blu-ray), output as frame packing.
    Mvc = 0x4000,
    /// MVC stream decoded as its 2D base view only.
    Mono2d = 0x8000,
}

impl StereoMode {
    pub fn bits(self) -> u32 {
        self as u32
    }

    /// Extract the layout from a mask. Unknown or multiple bits read as `Off`.
    pub fn from_bits(bits: u32) -> Self {
        match bits & STEREO_MASK {
            0x1000 => Self::SideBySide,
            0x2000 => Self::TopBottom,
            0x4000 => Self::Mvc,
            0x8000 => Self::Mono2d,
            _ => Self::Off,
        }
    }

    /// Map a demuxer stereo hint (`left_right`, `block_lr`, ...) to a layout.
    pub fn from_hint(hint: &str) -> Self {
        match hint.trim() {
            "left_right" | "right_left" => Self::SideBySide,
            "top_bottom" | "bottom_top" => Self::TopBottom,
            "block_lr" | "block_rl" => Self::Mvc,
            _ => Self::Off,
        }
    }

    /// Whether the layout carries two views on screen.
    pub fn is_3d(self) -> bool {
        matches!(self, Self::SideBySide | Self::TopBottom | Self::Mvc)
    }
}

/// A decode-type word with at most one stereo layout set.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct StereoMask(u32);

impl StereoMask {
    pub fn new(bits: u32) -> Self {
        let mut mask = Self(bits & !STEREO_MASK);
        mask.set(StereoMode::from_bits(bits));
        mask
    }

    /// Replace the stereo layout, clearing whatever layout was set before.
    pub fn set(&mut self, mode: StereoMode) {
        self.0 = (self.0 & !STEREO_MASK) | mode.bits();
    }

    pub fn mode(self) -> StereoMode {
        StereoMode::from_bits(self.0)
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl From<StereoMode> for StereoMask {
    fn from(mode: StereoMode) -> Self {
        Self(mode.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setting_a_layout_clears_the_previous_one() {
        let mut mask = StereoMask::default();
        mask.set(StereoMode::TopBottom);
        mask.set(StereoMode::SideBySide);
        assert_eq!(mask.bits() & STEREO_MASK, StereoMode::SideBySide.bits());
        assert_eq!(mask.mode(), StereoMode::SideBySide);
    }

    #[test]
    fn non_stereo_bits_survive() {
        let mut mask = StereoMask::new(0x0001 | StereoMode::Mvc.bits());
        mask.set(StereoMode::Off);
        assert_eq!(mask.bits(), 0x0001);
    }

    #[test]
    fn ambiguous_bits_normalize_to_one_layout() {
        let mask = StereoMask::new(0x3000);
        assert_eq!(mask.bits() & STEREO_MASK, 0);
    }

    #[test]
    fn hints() {
        assert_eq!(StereoMode::from_hint("left_right"), StereoMode::SideBySide);
        assert_eq!(StereoMode::from_hint("bottom_top"), StereoMode::TopBottom);
        assert_eq!(StereoMode::from_hint("block_rl"), StereoMode::Mvc);
        assert_eq!(StereoMode::from_hint("mono"), StereoMode::Off);
        assert_eq!(StereoMode::from_hint(""), StereoMode::Off);
        assert!(StereoMode::Mvc.is_3d());
        assert!(!StereoMode::Mono2d.is_3d());
    }
}
