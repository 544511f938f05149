//! Stream descriptors: what the demuxer tells us, and what the codec gets.

use crate::codec::{MediaType, VideoCodec};
use crate::stereo::StereoMode;

/// Stream descriptor as produced by the demuxer.
///
/// This is the external input to `open_decoder`. It is translated once into
/// an immutable [`StreamInfo`].
#[derive(Clone, Debug, Default)]
pub struct StreamHints {
    pub codec: Option<VideoCodec>,
    pub media_type: MediaType,
    /// Container/demuxer flags, passed through.
    pub flags: u32,
    pub filename: String,
    pub fps_scale: u32,
    pub fps_rate: u32,
    /// "Real" frame rate as measured by the demuxer.
    pub rfps_scale: u32,
    pub rfps_rate: u32,
    pub width: u32,
    pub height: u32,
    pub profile: u32,
    pub pts_invalid: bool,
    pub bits_per_pixel: u32,
    /// Demuxer stereo hint, e.g. `left_right` or `block_lr`.
    pub stereo_mode: String,
    /// Color transfer characteristic (ISO/IEC 23001-8 value).
    pub color_trc: i32,
    pub extradata: Vec<u8>,
    pub codec_tag: u32,
}

/// Immutable per-session stream description handed to the codec at init.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamInfo {
    pub codec: VideoCodec,
    pub media_type: MediaType,
    pub flags: u32,
    pub filename: String,
    pub fps_scale: u32,
    pub fps_rate: u32,
    pub rfps_scale: u32,
    pub rfps_rate: u32,
    pub width: u32,
    pub height: u32,
    pub profile: u32,
    pub pts_invalid: bool,
    pub bits_per_pixel: u32,
    /// Resolved stereo layout (after frame-packing policy).
    pub stereo: StereoMode,
    pub color_trc: i32,
    pub extradata: Vec<u8>,
    pub codec_tag: u32,
}

impl StreamInfo {
    /// Build the session stream info from demuxer hints.
    ///
    /// `frame_packing` controls whether MVC streams keep their second view;
    /// when disabled they are decoded as the 2D base view.
    pub fn from_hints(hints: &StreamHints, frame_packing: bool) -> Option<Self> {
        let codec = hints.codec?;

        let stereo = match StereoMode::from_hint(&hints.stereo_mode) {
            StereoMode::Mvc if !frame_packing => StereoMode::Mono2d,
            mode => mode,
        };

        Some(Self {
            codec,
            media_type: hints.media_type,
            flags: hints.flags,
            filename: hints.filename.clone(),
            fps_scale: hints.fps_scale,
            fps_rate: hints.fps_rate,
            rfps_scale: hints.rfps_scale,
            rfps_rate: hints.rfps_rate,
            width: hints.width,
            height: hints.height,
            profile: hints.profile,
            pts_invalid: hints.pts_invalid,
            bits_per_pixel: hints.bits_per_pixel,
            stereo,
            color_trc: hints.color_trc,
            extradata: hints.extradata.clone(),
            codec_tag: hints.codec_tag,
        })
    }

    /// Frames per second, preferring the container rate over the measured one.
    pub fn fps(&self) -> f32 {
        if self.fps_rate > 0 && self.fps_scale > 0 {
            self.fps_rate as f32 / self.fps_scale as f32
        } else if self.rfps_rate > 0 && self.rfps_scale > 0 {
            self.rfps_rate as f32 / self.rfps_scale as f32
        } else {
            0.0
        }
    }

    /// Whether the frame rate is an NTSC-style fractional rate (x/1001).
    pub fn is_fractional_rate(&self) -> bool {
        let (rate, scale) = if self.fps_rate > 0 && self.fps_scale > 0 {
            (self.fps_rate, self.fps_scale)
        } else {
            (self.rfps_rate, self.rfps_scale)
        };
        if rate == 0 || scale == 0 {
            return false;
        }
        let (rate, scale) = (u64::from(rate), u64::from(scale));
        rate % scale != 0 && (rate * 1001) % (scale * 1000) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hints() -> StreamHints {
        StreamHints {
            codec: Some(VideoCodec::H264),
            width: 1920,
            height: 1080,
            fps_rate: 24000,
            fps_scale: 1001,
            stereo_mode: "block_lr".to_string(),
            extradata: vec![0, 0, 0, 1, 0x67],
            ..Default::default()
        }
    }

    #[test]
    fn requires_a_codec() {
        let hints = StreamHints::default();
        assert!(StreamInfo::from_hints(&hints, true).is_none());
    }

    #[test]
    fn mvc_without_frame_packing_decodes_base_view() {
        let info = StreamInfo::from_hints(&hints(), false).unwrap();
        assert_eq!(info.stereo, StereoMode::Mono2d);
        let info = StreamInfo::from_hints(&hints(), true).unwrap();
        assert_eq!(info.stereo, StereoMode::Mvc);
    }

    #[test]
    fn copies_extradata() {
        let info = StreamInfo::from_hints(&hints(), true).unwrap();
        assert_eq!(info.extradata, vec![0, 0, 0, 1, 0x67]);
        assert_eq!(info.width, 1920);
    }

    #[test]
    fn fractional_rates() {
        let info = StreamInfo::from_hints(&hints(), true).unwrap();
        assert!(info.is_fractional_rate());
        assert!((info.fps() - 23.976).abs() < 0.01);

        let mut h = hints();
        h.fps_rate = 25;
        h.fps_scale = 1;
        let info = StreamInfo::from_hints(&h, true).unwrap();
        assert!(!info.is_fractional_rate());

        h.fps_rate = 30000;
        h.fps_scale = 1001;
        let info = StreamInfo::from_hints(&h, true).unwrap();
        assert!(info.is_fractional_rate());
    }
}
