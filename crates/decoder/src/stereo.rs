//! Stereo/3D and render-geometry negotiation.
//!
//! Runs on the caller's thread in response to geometry notifications and at
//! open. The worker never touches [`RenderGeometry`].

use tracing::{debug, info, warn};

use rk_common::{
    DecoderSettings, Display3dMode, DisplayNegotiator, Rect, RenderRectListener, ResolutionInfo,
    StereoMask, StereoMode, StreamInfo,
};

use crate::coordinator::RkCodec;
use crate::rkcodec::ffi::{command, config};
use crate::rkcodec::CommandParam;

/// What the renderer and display currently agree on.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderGeometry {
    pub src: Rect,
    pub dest: Rect,
    pub stereo: StereoMask,
    /// The HDMI link was switched into a 3D structure by us.
    pub native_3d: bool,
    /// The display was switched to fractional refresh rates by us.
    pub frac_hdmi: bool,
}

/// Whether HDMI 1.4a mandates `mode` at this output format.
///
/// Frame packing: 1080p23.976/24, 720p50/59.94/60.
/// Side-by-side and top-bottom: 1080p and 1080i at 24/50/60, 720p50/60.
pub fn support_3d(width: u32, height: u32, fps: f32, mode: Display3dMode) -> bool {
    let near = |target: f32| (fps - target).abs() < 0.05;

    match (mode, width, height) {
        (Display3dMode::FramePacking, 1920, 1080) => near(23.976) || near(24.0),
        (Display3dMode::FramePacking, 1280, 720) => near(50.0) || near(59.94) || near(60.0),
        (Display3dMode::SideBySide | Display3dMode::TopBottom, 1920, 1080) => {
            near(24.0) || near(23.976) || near(50.0) || near(60.0) || near(59.94)
        }
        (Display3dMode::SideBySide | Display3dMode::TopBottom, 1280, 720) => {
            near(50.0) || near(60.0) || near(59.94)
        }
        _ => false,
    }
}

/// Stereo layout to present: per-title override, then the stream, then 2D.
pub fn desired_stereo(settings: &DecoderSettings, stream: &StreamInfo) -> StereoMode {
    match settings.stereo_override {
        Some(StereoMode::Mvc) if !settings.frame_packing => StereoMode::Mono2d,
        Some(mode) => mode,
        None => stream.stereo,
    }
}

/// The HDMI 3D structure to switch to for `mode`, if policy and the display
/// both allow it.
fn plan_native_3d(
    settings: &DecoderSettings,
    mode: StereoMode,
    display: &dyn DisplayNegotiator,
) -> Option<Display3dMode> {
    if !settings.force_hdmi_3d {
        return None;
    }
    let target = Display3dMode::for_stereo(mode)?;
    let current = display.native_resolution()?;

    if !support_3d(
        current.screen_width,
        current.screen_height,
        current.refresh_rate,
        target,
    ) {
        debug!(?target, mode = %current.id, "Output mode cannot carry this 3D structure");
        return None;
    }
    if !display.supported_3d_modes().contains(&target) {
        debug!(?target, "Display does not advertise this 3D structure");
        return None;
    }
    Some(target)
}

impl RkCodec {
    /// Apply a new source/destination geometry from the renderer.
    pub fn update_render_rect(&self, src: Rect, dest: Rect) {
        let (src_changed, dest_changed) = {
            let mut geometry = self.geometry.lock();
            let changed = (geometry.src != src, geometry.dest != dest);
            geometry.src = src;
            geometry.dest = dest;
            changed
        };

        if src_changed {
            self.send_command(command::RK_CMD_SETCROP, CommandParam::Rect(src));
        }
        if dest_changed {
            self.send_command(command::RK_CMD_SETRES, CommandParam::Rect(dest));
        }

        self.update_render_stereo(false);
    }

    /// Re-evaluate the stereo layout; `force` re-applies it even if unchanged.
    pub fn update_render_stereo(&self, force: bool) {
        let Some(stream) = self.stream_info() else {
            return;
        };
        let target = desired_stereo(&self.settings, &stream);

        let native_3d = {
            let mut geometry = self.geometry.lock();
            if !force && geometry.stereo.mode() == target {
                return;
            }
            geometry.stereo.set(target);

            // The HDMI node refuses mode changes once 3D is active.
            if self.settings.force_hdmi_3d
                && self.settings.force_24hz_3d
                && target == StereoMode::Mvc
                && !geometry.native_3d
            {
                self.force_24hz_output();
            }

            match plan_native_3d(&self.settings, target, self.display.as_ref()) {
                Some(mode) => {
                    geometry.native_3d = self.switch_3d(Some(mode));
                }
                None if geometry.native_3d => {
                    geometry.native_3d = !self.switch_3d(None);
                }
                None => {}
            }
            geometry.native_3d
        };

        info!(stereo = ?target, native_3d, "Stereo layout applied");
        self.set_write_stereo(target);
        self.configure_setting();
    }

    /// Active stereo mask.
    pub fn stereo_mode(&self) -> StereoMask {
        self.geometry.lock().stereo
    }

    /// Switch the display into (`Some`) or out of (`None`) HDMI 3D.
    pub fn set_native_3d_resolution(&self, mode: Option<Display3dMode>) -> bool {
        let applied = self.switch_3d(mode);
        if applied {
            self.geometry.lock().native_3d = mode.is_some();
        }
        applied
    }

    fn switch_3d(&self, mode: Option<Display3dMode>) -> bool {
        match self.display.set_3d_mode(mode) {
            Ok(()) => {
                info!(?mode, "HDMI 3D mode switched");
                true
            }
            Err(e) => {
                warn!(?mode, error = %e, "HDMI 3D mode switch failed");
                false
            }
        }
    }

    fn force_24hz_output(&self) {
        let Some(current) = self.display.native_resolution() else {
            return;
        };
        if current.matches_rate(24.0) {
            return;
        }
        let target = ResolutionInfo {
            width: current.width,
            height: current.height,
            screen_width: current.screen_width,
            screen_height: current.screen_height,
            refresh_rate: 24.0,
            ..Default::default()
        };
        if let Err(e) = self.display.set_native_resolution(&target) {
            warn!(error = %e, "Could not switch output to 24 Hz for 3D");
        }
    }

    /// Follow the stream's frame rate with fractional HDMI timings when
    /// enabled. Only changes reach the display.
    pub fn update_render_frac_hdmi(&self) {
        let Some(stream) = self.stream_info() else {
            return;
        };
        let enable = self.settings.frac_hdmi && stream.is_fractional_rate();
        if self.geometry.lock().frac_hdmi == enable {
            return;
        }
        self.set_native_frac_resolution(enable);
    }

    /// Switch the display between fractional and integer refresh rates.
    pub fn set_native_frac_resolution(&self, enable: bool) -> bool {
        match self.display.set_fractional_rate(enable) {
            Ok(()) => {
                self.geometry.lock().frac_hdmi = enable;
                debug!(enable, "Fractional HDMI rate applied");
                true
            }
            Err(e) => {
                warn!(enable, error = %e, "Fractional HDMI rate switch failed");
                false
            }
        }
    }

    /// Push the negotiated 3D state to the codec.
    ///
    /// `RK_CONF_FORCE24HZ_3D` is 1 while 24 Hz output is forced for MVC.
    /// `RK_CONF_FORCESWITCH_3D` carries the stereo bits while the HDMI link
    /// is in 3D, 0 otherwise.
    pub fn configure_setting(&self) {
        let (stereo, native_3d) = {
            let geometry = self.geometry.lock();
            (geometry.stereo, geometry.native_3d)
        };
        let force_24hz = self.settings.force_24hz_3d && stereo.mode() == StereoMode::Mvc;
        let switch_bits = if native_3d { stereo.bits() as i32 } else { 0 };

        self.send_configure(
            config::RK_CONF_FORCE24HZ_3D,
            CommandParam::Int(i32::from(force_24hz)),
        );
        self.send_configure(config::RK_CONF_FORCESWITCH_3D, CommandParam::Int(switch_bits));
    }

    /// Undo display changes made for the closing session.
    pub(crate) fn restore_display(&self) {
        let mut geometry = self.geometry.lock();
        if geometry.native_3d && !self.switch_3d(None) {
            warn!("Display left in 3D mode");
        }
        if geometry.frac_hdmi {
            if let Err(e) = self.display.set_fractional_rate(false) {
                warn!(error = %e, "Could not restore integer refresh rate");
            }
        }
        *geometry = RenderGeometry::default();
    }
}

impl RenderRectListener for RkCodec {
    fn render_rect_changed(&self, src: Rect, dest: Rect) {
        self.update_render_rect(src, dest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rk_common::VideoCodec;

    fn stream(stereo: StereoMode) -> StreamInfo {
        let hints = rk_common::StreamHints {
            codec: Some(VideoCodec::H264),
            ..Default::default()
        };
        StreamInfo {
            stereo,
            ..StreamInfo::from_hints(&hints, true).unwrap()
        }
    }

    #[test]
    fn frame_packing_table() {
        assert!(support_3d(1920, 1080, 23.976, Display3dMode::FramePacking));
        assert!(support_3d(1920, 1080, 24.0, Display3dMode::FramePacking));
        assert!(!support_3d(1920, 1080, 60.0, Display3dMode::FramePacking));
        assert!(support_3d(1280, 720, 59.94, Display3dMode::FramePacking));
        assert!(!support_3d(3840, 2160, 24.0, Display3dMode::FramePacking));
    }

    #[test]
    fn side_by_side_table() {
        assert!(support_3d(1920, 1080, 50.0, Display3dMode::SideBySide));
        assert!(support_3d(1280, 720, 60.0, Display3dMode::TopBottom));
        assert!(!support_3d(1280, 720, 24.0, Display3dMode::TopBottom));
        assert!(!support_3d(720, 576, 50.0, Display3dMode::SideBySide));
    }

    #[test]
    fn override_wins_over_stream() {
        let mut settings = DecoderSettings::default();
        let sbs = stream(StereoMode::SideBySide);
        assert_eq!(desired_stereo(&settings, &sbs), StereoMode::SideBySide);

        settings.stereo_override = Some(StereoMode::TopBottom);
        assert_eq!(desired_stereo(&settings, &sbs), StereoMode::TopBottom);

        settings.stereo_override = Some(StereoMode::Mvc);
        settings.frame_packing = false;
        assert_eq!(desired_stereo(&settings, &sbs), StereoMode::Mono2d);
    }

    #[test]
    fn plain_stream_stays_2d() {
        let settings = DecoderSettings::default();
        assert_eq!(desired_stereo(&settings, &stream(StereoMode::Off)), StereoMode::Off);
    }
}
