//! Video codec and media type identifiers.

use serde::{Deserialize, Serialize};

/// Video codec identifier.
///
/// The raw ids are the libavcodec `AVCodecID` values the demuxer hands us;
/// the vendor library expects the same numbering in `RKCodecStreamInfo.codec`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoCodec {
    Mpeg2,
    Mpeg4,
    H264,
    Vc1,
    Vp8,
    Vp9,
    Hevc,
    /// Any other codec id, passed through untouched.
    Other(u32),
}

impl VideoCodec {
    /// Map a libavcodec codec id to a `VideoCodec`.
    pub fn from_raw(id: u32) -> Self {
        match id {
            2 => Self::Mpeg2,
            12 => Self::Mpeg4,
            27 => Self::H264,
            70 => Self::Vc1,
            139 => Self::Vp8,
            167 => Self::Vp9,
            173 => Self::Hevc,
            other => Self::Other(other),
        }
    }

    /// The libavcodec codec id.
    pub fn raw(self) -> u32 {
        match self {
            Self::Mpeg2 => 2,
            Self::Mpeg4 => 12,
            Self::H264 => 27,
            Self::Vc1 => 70,
            Self::Vp8 => 139,
            Self::Vp9 => 167,
            Self::Hevc => 173,
            Self::Other(id) => id,
        }
    }

    /// Human-readable name (for display/logging).
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Mpeg2 => "MPEG-2",
            Self::Mpeg4 => "MPEG-4 Part 2",
            Self::H264 => "H.264/AVC",
            Self::Vc1 => "VC-1",
            Self::Vp8 => "VP8",
            Self::Vp9 => "VP9",
            Self::Hevc => "H.265/HEVC",
            Self::Other(_) => "unknown",
        }
    }

    /// Parse a short codec name as used on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mpeg2" | "mpeg2video" => Some(Self::Mpeg2),
            "mpeg4" => Some(Self::Mpeg4),
            "h264" | "avc" => Some(Self::H264),
            "vc1" => Some(Self::Vc1),
            "vp8" => Some(Self::Vp8),
            "vp9" => Some(Self::Vp9),
            "h265" | "hevc" => Some(Self::Hevc),
            _ => None,
        }
    }
}

/// Stream media type. Values match the vendor's `RKCodecDecodeType`.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    Audio = 0,
    #[default]
    Video = 1,
    Subtitle = 2,
}

impl MediaType {
    pub fn raw(self) -> u32 {
        self as u32
    }
}
