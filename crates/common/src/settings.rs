//! Decoder settings, supplied by the host at construction time.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::VideoCodec;
use crate::error::SettingsError;
use crate::stereo::StereoMode;

/// Who corrects A/V drift. Values match the vendor's `RKCodecSyncMode`.
#[repr(i32)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Hardware reports raw timestamps, the coordinator issues corrections.
    #[default]
    Server = 1,
    /// Corrections are left to the downstream renderer.
    ClientNotify = 2,
}

impl SyncMode {
    pub fn raw(self) -> i32 {
        self as i32
    }
}

/// Options controlling hardware decode and 3D output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderSettings {
    /// Master switch for hardware decode.
    pub use_rkcodec: bool,
    /// VP9 needs an explicit opt-in.
    pub rkcodec_vp9: bool,
    /// MPEG-2 needs an explicit opt-in.
    pub rkcodec_mpeg2: bool,
    /// Output MVC streams as frame-packed 3D instead of the 2D base view.
    pub frame_packing: bool,
    /// Force 24 Hz output for 3D Blu-ray.
    pub force_24hz_3d: bool,
    /// Switch the HDMI link into 3D mode for stereo content.
    pub force_hdmi_3d: bool,
    /// Prefer fractional refresh rates for NTSC-rate content.
    pub frac_hdmi: bool,
    pub sync_mode: SyncMode,
    /// Drift below this many microseconds is not corrected.
    pub sync_threshold_us: i64,
    /// Per-title stereo layout override.
    pub stereo_override: Option<StereoMode>,
    /// Vendor library location; the system library is used when unset.
    pub library_path: Option<PathBuf>,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            use_rkcodec: true,
            rkcodec_vp9: false,
            rkcodec_mpeg2: false,
            frame_packing: true,
            force_24hz_3d: false,
            force_hdmi_3d: false,
            frac_hdmi: false,
            sync_mode: SyncMode::Server,
            sync_threshold_us: 100_000,
            stereo_override: None,
            library_path: None,
        }
    }
}

impl DecoderSettings {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&text)?;
        debug!(path = %path.display(), ?settings, "Loaded decoder settings");
        Ok(settings)
    }

    /// Whether the hardware path should be used for `codec`.
    pub fn accepts_codec(&self, codec: VideoCodec) -> bool {
        if !self.use_rkcodec {
            return false;
        }
        match codec {
            VideoCodec::Vp9 => self.rkcodec_vp9,
            VideoCodec::Mpeg2 => self.rkcodec_mpeg2,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn codec_opt_in() {
        let mut settings = DecoderSettings::default();
        assert!(settings.accepts_codec(VideoCodec::H264));
        assert!(!settings.accepts_codec(VideoCodec::Vp9));
        assert!(!settings.accepts_codec(VideoCodec::Mpeg2));

        settings.rkcodec_vp9 = true;
        assert!(settings.accepts_codec(VideoCodec::Vp9));

        settings.use_rkcodec = false;
        assert!(!settings.accepts_codec(VideoCodec::H264));
    }

    #[test]
    fn load_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "force_hdmi_3d": true, "sync_mode": "client_notify", "stereo_override": "top_bottom" }}"#
        )
        .unwrap();

        let settings = DecoderSettings::load(file.path()).unwrap();
        assert!(settings.force_hdmi_3d);
        assert_eq!(settings.sync_mode, SyncMode::ClientNotify);
        assert_eq!(settings.stereo_override, Some(StereoMode::TopBottom));
        assert!(settings.use_rkcodec);
        assert_eq!(settings.sync_threshold_us, 100_000);
    }

    #[test]
    fn load_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            DecoderSettings::load(file.path()),
            Err(SettingsError::Parse(_))
        ));
    }
}
