//! Safe seam over the vendor codec.
//!
//! The coordinator never calls the FFI table directly. It talks to a
//! [`CodecBinding`] obtained from a [`BindingLoader`], so the same session
//! logic runs against `librkffplayer.so` on a Rockchip box and against
//! [`FakeBinding`](crate::fake::FakeBinding) everywhere else.

use std::ffi::{c_void, CString};
use std::path::PathBuf;
use std::ptr;
use std::sync::Arc;

use tracing::{debug, trace};

use rk_common::{LoadError, Rect, StreamInfo};

use super::ffi::{
    decode_state, RkCallbackFn, RkCodecLibrary, RkCodecStreamInfo, RkEnv, RkPtr, RkRect, RkU32,
};

// ---------------------------------------------------------------------------
// Write status
// ---------------------------------------------------------------------------

/// Outcome of one `RK_CodecWrite` call.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DecodeStatus {
    /// Input consumed, no picture yet.
    #[default]
    Buffer,
    /// A picture is ready and the codec does not want more input right now.
    Picture,
    /// Input consumed and a picture is ready.
    BufferPicture,
    /// The codec passed the data through undecoded.
    Bypass,
    /// Negative status from the codec.
    Error(i32),
}

impl DecodeStatus {
    pub fn from_raw(status: i32) -> Self {
        match status {
            decode_state::RK_DECODE_STATE_BUFFER => Self::Buffer,
            decode_state::RK_DECODE_STATE_PICTURE => Self::Picture,
            decode_state::RK_DECODE_STATE_BUFFER_PICTURE => Self::BufferPicture,
            decode_state::RK_DECODE_STATE_BYPASS => Self::Bypass,
            s if s < 0 => Self::Error(s),
            // Unknown non-negative codes are treated as plain acceptance.
            _ => Self::Buffer,
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            Self::Buffer => decode_state::RK_DECODE_STATE_BUFFER,
            Self::Picture => decode_state::RK_DECODE_STATE_PICTURE,
            Self::BufferPicture => decode_state::RK_DECODE_STATE_BUFFER_PICTURE,
            Self::Bypass => decode_state::RK_DECODE_STATE_BYPASS,
            Self::Error(s) => s,
        }
    }

    pub fn has_picture(self) -> bool {
        matches!(self, Self::Picture | Self::BufferPicture)
    }

    /// The codec has output pending and wants the feeder to hold off.
    pub fn wants_backoff(self) -> bool {
        self == Self::Picture
    }

    pub fn is_error(self) -> bool {
        matches!(self, Self::Error(_))
    }
}

// ---------------------------------------------------------------------------
// Command parameters
// ---------------------------------------------------------------------------

/// Parameter attached to `RK_CodecSendCommand`. Converted to a pointer only
/// for the duration of the call.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum CommandParam {
    #[default]
    None,
    Int(i32),
    Pts(i64),
    Rect(Rect),
}

/// Listener context pointer handed back on every callback.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ListenerEnv(pub RkEnv);

impl ListenerEnv {
    pub fn null() -> Self {
        Self(ptr::null())
    }
}

// SAFETY: The env is an opaque token. Only the callback dereferences it, and
// the coordinator keeps the pointee alive until the listener is removed.
unsafe impl Send for ListenerEnv {}
unsafe impl Sync for ListenerEnv {}

// ---------------------------------------------------------------------------
// Binding trait
// ---------------------------------------------------------------------------

/// The vendor codec's ten entry points. Every method returns the raw status;
/// negative is failure.
pub trait CodecBinding: Send + Sync {
    fn init(&self, info: &StreamInfo) -> i32;
    fn open(&self) -> i32;
    fn write(&self, kind: u32, data: &[u8], pts: i64, dts: i64) -> i32;
    fn close(&self) -> i32;
    fn flush(&self) -> i32;
    fn reset(&self) -> i32;
    fn pause(&self) -> i32;
    fn resume(&self) -> i32;
    fn send_command(&self, cmd: u32, param: &CommandParam) -> i32;
    /// Register `callback` for `kind` events, or remove it when `None`.
    fn register_listener(&self, env: ListenerEnv, kind: u32, callback: Option<RkCallbackFn>)
        -> i32;
}

/// Produces a binding per decode session.
pub trait BindingLoader: Send + Sync {
    fn load(&self) -> Result<Arc<dyn CodecBinding>, LoadError>;
}

/// Loads the real vendor library, from the search path or an explicit file.
#[derive(Clone, Debug, Default)]
pub struct SystemBindingLoader {
    path: Option<PathBuf>,
}

impl SystemBindingLoader {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl BindingLoader for SystemBindingLoader {
    fn load(&self) -> Result<Arc<dyn CodecBinding>, LoadError> {
        let lib = match &self.path {
            Some(path) => RkCodecLibrary::load_from(path)?,
            None => RkCodecLibrary::load()?,
        };
        Ok(Arc::new(lib))
    }
}

// ---------------------------------------------------------------------------
// Real binding
// ---------------------------------------------------------------------------

impl CodecBinding for RkCodecLibrary {
    fn init(&self, info: &StreamInfo) -> i32 {
        // The vendor copies what it needs during init, so these buffers only
        // have to outlive the call.
        let filename = CString::new(info.filename.replace('\0', "")).unwrap_or_default();
        let mut extradata = info.extradata.clone();

        let mut raw = RkCodecStreamInfo {
            codec: info.codec.raw(),
            stream_type: info.media_type.raw(),
            flags: info.flags,
            filename: filename.as_ptr() as RkPtr,
            fpsscale: info.fps_scale,
            fpsrate: info.fps_rate,
            rfpsscale: info.rfps_scale,
            rfpsrate: info.rfps_rate,
            height: info.height,
            width: info.width,
            profile: info.profile,
            ptsinvalid: u32::from(info.pts_invalid),
            bitsperpixel: info.bits_per_pixel,
            stereo_mode: info.stereo.bits(),
            extradata: if extradata.is_empty() {
                ptr::null_mut()
            } else {
                extradata.as_mut_ptr() as RkPtr
            },
            extrasize: extradata.len() as RkU32,
            codec_tag: info.codec_tag,
            colortrc: info.color_trc,
            ..Default::default()
        };

        debug!(
            codec = info.codec.display_name(),
            width = info.width,
            height = info.height,
            extradata = extradata.len(),
            "RK_CodecInit"
        );

        // SAFETY: `raw` and the buffers it points into live until return.
        unsafe { (self.RK_CodecInit)(&mut raw as *mut RkCodecStreamInfo as RkPtr) }
    }

    fn open(&self) -> i32 {
        // SAFETY: No arguments; valid after a successful init.
        unsafe { (self.RK_CodecOpen)() }
    }

    fn write(&self, kind: u32, data: &[u8], pts: i64, dts: i64) -> i32 {
        trace!(kind, size = data.len(), pts, dts, "RK_CodecWrite");
        // SAFETY: The codec copies the bitstream before returning; it never
        // writes through this pointer.
        unsafe {
            (self.RK_CodecWrite)(
                kind,
                data.as_ptr() as RkPtr,
                data.len() as RkU32,
                pts,
                dts,
            )
        }
    }

    fn close(&self) -> i32 {
        // SAFETY: Close is valid in every state.
        unsafe { (self.RK_CodecClose)() }
    }

    fn flush(&self) -> i32 {
        // SAFETY: No arguments.
        unsafe { (self.RK_CodecFlush)() }
    }

    fn reset(&self) -> i32 {
        // SAFETY: No arguments.
        unsafe { (self.RK_CodecReset)() }
    }

    fn pause(&self) -> i32 {
        // SAFETY: No arguments.
        unsafe { (self.RK_CodecPause)() }
    }

    fn resume(&self) -> i32 {
        // SAFETY: No arguments.
        unsafe { (self.RK_CodecResume)() }
    }

    fn send_command(&self, cmd: u32, param: &CommandParam) -> i32 {
        debug!(cmd, ?param, "RK_CodecSendCommand");

        let mut int_value: i32;
        let mut pts_value: i64;
        let mut rect_value: RkRect;

        let param_ptr: RkPtr = match *param {
            CommandParam::None => ptr::null_mut(),
            CommandParam::Int(v) => {
                int_value = v;
                &mut int_value as *mut i32 as *mut c_void
            }
            CommandParam::Pts(v) => {
                pts_value = v;
                &mut pts_value as *mut i64 as *mut c_void
            }
            CommandParam::Rect(r) => {
                rect_value = RkRect::from(r);
                &mut rect_value as *mut RkRect as *mut c_void
            }
        };

        // SAFETY: `param_ptr` is null or points to a local that outlives
        // the call.
        unsafe { (self.RK_CodecSendCommand)(cmd, param_ptr) }
    }

    fn register_listener(
        &self,
        env: ListenerEnv,
        kind: u32,
        callback: Option<RkCallbackFn>,
    ) -> i32 {
        debug!(kind, registered = callback.is_some(), "RK_CodecRegisterListener");
        // SAFETY: The coordinator keeps `env` alive until the listener is
        // removed with a `None` callback.
        unsafe { (self.RK_CodecRegisterListener)(env.0, kind, callback) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_status_from_raw() {
        assert_eq!(DecodeStatus::from_raw(0), DecodeStatus::Buffer);
        assert_eq!(DecodeStatus::from_raw(1), DecodeStatus::Picture);
        assert_eq!(DecodeStatus::from_raw(2), DecodeStatus::BufferPicture);
        assert_eq!(DecodeStatus::from_raw(3), DecodeStatus::Bypass);
        assert_eq!(DecodeStatus::from_raw(-1), DecodeStatus::Error(-1));
        assert_eq!(DecodeStatus::from_raw(-22), DecodeStatus::Error(-22));
    }

    #[test]
    fn only_bare_picture_asks_for_backoff() {
        assert!(DecodeStatus::Picture.wants_backoff());
        assert!(!DecodeStatus::BufferPicture.wants_backoff());
        assert!(DecodeStatus::BufferPicture.has_picture());
        assert!(!DecodeStatus::Buffer.has_picture());
    }

    #[test]
    fn system_loader_reports_missing_file() {
        let loader = SystemBindingLoader::new(Some(PathBuf::from("/nonexistent/librkffplayer.so")));
        assert!(matches!(loader.load(), Err(LoadError::LibraryNotFound(_))));
    }
}
