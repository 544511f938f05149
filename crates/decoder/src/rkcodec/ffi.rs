//! Raw FFI bindings for the Rockchip media codec (`librkffplayer.so`).
//!
//! The library is loaded dynamically at runtime via `libloading`, so the
//! host can fall back to software decode on boards without it. The exported
//! surface is ten C functions; the shapes below match the vendor header.

use std::ffi::c_void;
use std::mem;
use std::path::Path;

use libloading::Library;
use tracing::{debug, info};

use rk_common::{CodecError, LoadError};

// ---------------------------------------------------------------------------
// Vendor scalar types
// ---------------------------------------------------------------------------

pub type RkU32 = u32;
pub type RkS32 = i32;
pub type RkRet = i32;
pub type RkPtr = *mut c_void;
/// Opaque listener context handed back on every callback.
pub type RkEnv = *const c_void;
pub type RkPts = i64;
pub type RkDts = i64;

/// Listener callback: `(env, payload, payload_size)`.
pub type RkCallbackFn = unsafe extern "C" fn(env: RkEnv, data: RkPtr, size: RkU32);

/// Timestamp value written when the container supplied none.
pub const RK_NOPTS: RkPts = -1;

// ---------------------------------------------------------------------------
// Protocol constants
// ---------------------------------------------------------------------------

/// Event types a listener can register for.
pub mod listener {
    pub const RK_DECODE: u32 = 1;
    pub const RK_RENDER: u32 = 2;
}

/// Commands for `RK_CodecSendCommand`.
pub mod command {
    pub const RK_CMD_NONE: u32 = 0;
    pub const RK_CMD_SETSPEED: u32 = 1;
    pub const RK_CMD_SYNC: u32 = 2;
    pub const RK_CMD_EOS: u32 = 3;
    pub const RK_CMD_SETRES: u32 = 4;
    pub const RK_CMD_SETCROP: u32 = 5;
    pub const RK_CMD_MAX: u32 = 1000;
}

/// Configuration keys, sent through the command entry point.
pub mod config {
    pub const RK_CONF_NONE: u32 = 1000;
    pub const RK_CONF_FORCE24HZ_3D: u32 = 1001;
    pub const RK_CONF_FORCESWITCH_3D: u32 = 1002;
    pub const RK_CONF_MAX: u32 = 2000;
}

/// Return values of `RK_CodecWrite`.
pub mod decode_state {
    pub const RK_DECODE_STATE_ERROR: i32 = -1;
    pub const RK_DECODE_STATE_BUFFER: i32 = 0;
    pub const RK_DECODE_STATE_PICTURE: i32 = 1;
    pub const RK_DECODE_STATE_BUFFER_PICTURE: i32 = 2;
    pub const RK_DECODE_STATE_BYPASS: i32 = 3;
}

/// Library file name on Rockchip Android/Linux images.
pub const RK_LIBRARY: &str = "librkffplayer.so";

// ---------------------------------------------------------------------------
// RKCodecStreamInfo: stream description passed to RK_CodecInit
// ---------------------------------------------------------------------------

/// Matches `RKCodecStreamInfo`. Audio fields are unused for video streams.
#[repr(C)]
#[derive(Debug)]
pub struct RkCodecStreamInfo {
    pub codec: RkU32,
    pub stream_type: RkU32,
    pub flags: RkU32,
    pub filename: RkPtr,

    pub fpsscale: RkU32,
    pub fpsrate: RkU32,
    pub rfpsscale: RkU32,
    pub rfpsrate: RkU32,
    pub height: RkU32,
    pub width: RkU32,
    pub profile: RkU32,
    pub ptsinvalid: RkU32,
    pub bitsperpixel: RkU32,
    pub stereo_mode: RkU32,

    pub channels: RkU32,
    pub samplerate: RkU32,
    pub bitrate: RkU32,
    pub blockalign: RkU32,
    pub bitspersample: RkU32,

    pub extradata: RkPtr,
    pub extrasize: RkU32,
    pub codec_tag: RkU32,

    pub colortrc: RkS32,
}

impl Default for RkCodecStreamInfo {
    fn default() -> Self {
        // SAFETY: All-zeros is valid for this POD struct (null pointers).
        unsafe { mem::zeroed() }
    }
}

// ---------------------------------------------------------------------------
// RKCodecDisplayInfo: payload of display events
// ---------------------------------------------------------------------------

/// Matches `RKCodecDisplayInfo`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RkCodecDisplayInfo {
    pub event_type: RkU32,
    pub raw: RkPts,
    pub pts: RkPts,
    pub eos: RkU32,
    pub record: RkPts,
}

/// Size every display event payload must have.
pub const DISPLAY_INFO_SIZE: usize = mem::size_of::<RkCodecDisplayInfo>();

/// Copy a display event payload out of vendor memory.
///
/// # Safety
///
/// If `data` is non-null and `size` equals [`DISPLAY_INFO_SIZE`], `data`
/// must point to `size` readable bytes for the duration of the call.
pub unsafe fn read_display_info(data: RkPtr, size: RkU32) -> Result<RkCodecDisplayInfo, CodecError> {
    let got = size as usize;
    if data.is_null() || got != DISPLAY_INFO_SIZE {
        return Err(CodecError::MalformedCallback {
            expected: DISPLAY_INFO_SIZE,
            got: if data.is_null() { 0 } else { got },
        });
    }
    // SAFETY: size checked above; the vendor gives no alignment guarantee.
    Ok(std::ptr::read_unaligned(data as *const RkCodecDisplayInfo))
}

// ---------------------------------------------------------------------------
// Command parameter payloads
// ---------------------------------------------------------------------------

/// Rectangle payload for `RK_CMD_SETRES` / `RK_CMD_SETCROP`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RkRect {
    pub left: RkS32,
    pub top: RkS32,
    pub right: RkS32,
    pub bottom: RkS32,
}

impl From<rk_common::Rect> for RkRect {
    fn from(r: rk_common::Rect) -> Self {
        Self {
            left: r.x1.round() as i32,
            top: r.y1.round() as i32,
            right: r.x2.round() as i32,
            bottom: r.y2.round() as i32,
        }
    }
}

// ---------------------------------------------------------------------------
// Dynamic library wrapper
// ---------------------------------------------------------------------------

type FnInit = unsafe extern "C" fn(info: RkPtr) -> RkRet;
type FnVoid = unsafe extern "C" fn() -> RkRet;
type FnWrite =
    unsafe extern "C" fn(kind: RkU32, data: RkPtr, size: RkU32, pts: RkPts, dts: RkDts) -> RkRet;
type FnSendCommand = unsafe extern "C" fn(cmd: RkU32, param: RkPtr) -> RkRet;
type FnRegisterListener =
    unsafe extern "C" fn(env: RkEnv, kind: RkU32, callback: Option<RkCallbackFn>) -> RkRet;

/// Dynamically loaded codec library with typed function pointers.
#[allow(non_snake_case)]
pub struct RkCodecLibrary {
    /// The loaded library handle; must live as long as we use any symbols.
    _lib: Library,

    pub RK_CodecInit: FnInit,
    pub RK_CodecOpen: FnVoid,
    pub RK_CodecWrite: FnWrite,
    pub RK_CodecClose: FnVoid,
    pub RK_CodecFlush: FnVoid,
    pub RK_CodecReset: FnVoid,
    pub RK_CodecPause: FnVoid,
    pub RK_CodecResume: FnVoid,
    pub RK_CodecSendCommand: FnSendCommand,
    pub RK_CodecRegisterListener: FnRegisterListener,
}

// SAFETY: The function pointers come from a shared library that stays
// loaded as long as `_lib` lives. The vendor codec serializes calls
// internally; the coordinator additionally keeps one session per library.
unsafe impl Send for RkCodecLibrary {}
unsafe impl Sync for RkCodecLibrary {}

impl std::fmt::Debug for RkCodecLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RkCodecLibrary")
            .field("loaded", &true)
            .finish()
    }
}

impl RkCodecLibrary {
    /// Load `librkffplayer.so` from the standard library search path.
    pub fn load() -> Result<Self, LoadError> {
        info!(library = RK_LIBRARY, "Loading Rockchip codec library");

        // SAFETY: Loading the vendor codec library runs its initializers,
        // which only register codec components.
        let lib = unsafe { Library::new(RK_LIBRARY) }.map_err(|e| {
            LoadError::LibraryNotFound(format!(
                "Failed to load {RK_LIBRARY}: {e}. Is this a Rockchip device?"
            ))
        })?;
        Self::resolve(lib)
    }

    /// Load from a specific path (non-standard installs, vendor overlays).
    pub fn load_from(path: &Path) -> Result<Self, LoadError> {
        info!(path = %path.display(), "Loading Rockchip codec library from custom path");

        // SAFETY: The caller asserts this is the vendor codec library.
        let lib = unsafe { Library::new(path) }.map_err(|e| {
            LoadError::LibraryNotFound(format!("Failed to load {}: {e}", path.display()))
        })?;
        Self::resolve(lib)
    }

    fn resolve(lib: Library) -> Result<Self, LoadError> {
        // SAFETY: The signatures below match the vendor header. Each symbol
        // is dereferenced to copy the raw function pointer out, which drops
        // the borrow on `lib` before it moves into the struct.
        unsafe {
            let init = *symbol::<FnInit>(&lib, b"RK_CodecInit\0")?;
            let open = *symbol::<FnVoid>(&lib, b"RK_CodecOpen\0")?;
            let write = *symbol::<FnWrite>(&lib, b"RK_CodecWrite\0")?;
            let reset = *symbol::<FnVoid>(&lib, b"RK_CodecReset\0")?;
            let close = *symbol::<FnVoid>(&lib, b"RK_CodecClose\0")?;
            let flush = *symbol::<FnVoid>(&lib, b"RK_CodecFlush\0")?;
            let pause = *symbol::<FnVoid>(&lib, b"RK_CodecPause\0")?;
            let resume = *symbol::<FnVoid>(&lib, b"RK_CodecResume\0")?;
            let send_command = *symbol::<FnSendCommand>(&lib, b"RK_CodecSendCommand\0")?;
            let register_listener =
                *symbol::<FnRegisterListener>(&lib, b"RK_CodecRegisterListener\0")?;

            debug!("All Rockchip codec symbols resolved");

            Ok(Self {
                _lib: lib,
                RK_CodecInit: init,
                RK_CodecOpen: open,
                RK_CodecWrite: write,
                RK_CodecClose: close,
                RK_CodecFlush: flush,
                RK_CodecReset: reset,
                RK_CodecPause: pause,
                RK_CodecResume: resume,
                RK_CodecSendCommand: send_command,
                RK_CodecRegisterListener: register_listener,
            })
        }
    }
}

/// Look up one symbol, naming it in the error.
///
/// # Safety
///
/// `T` must match the C signature of the exported symbol.
unsafe fn symbol<'lib, T>(
    lib: &'lib Library,
    name: &[u8],
) -> Result<libloading::Symbol<'lib, T>, LoadError> {
    lib.get::<T>(name).map_err(|e| {
        let printable = String::from_utf8_lossy(name.strip_suffix(b"\0").unwrap_or(name));
        LoadError::SymbolNotFound(format!("{printable}: {e}"))
    })
}

/// Convert a vendor status to a Result, mapping negative values to a
/// protocol error.
pub fn check_rk_result(status: RkRet, call: &'static str) -> Result<RkRet, CodecError> {
    if status >= 0 {
        Ok(status)
    } else {
        Err(CodecError::Protocol { call, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_info_layout() {
        // u32 + pad, i64, i64, u32 + pad, i64
        assert_eq!(DISPLAY_INFO_SIZE, 40);
    }

    #[test]
    fn default_stream_info_is_zeroed() {
        let info = RkCodecStreamInfo::default();
        assert_eq!(info.codec, 0);
        assert!(info.filename.is_null());
        assert!(info.extradata.is_null());
    }

    #[test]
    fn read_display_info_validates_size() {
        let mut payload = RkCodecDisplayInfo {
            event_type: listener::RK_RENDER,
            raw: 40_000,
            pts: 40_100,
            eos: 0,
            record: 7,
        };
        let ptr = &mut payload as *mut RkCodecDisplayInfo as RkPtr;

        let ok = unsafe { read_display_info(ptr, DISPLAY_INFO_SIZE as u32) }.unwrap();
        assert_eq!(ok, payload);

        let short = unsafe { read_display_info(ptr, 16) };
        assert!(matches!(
            short,
            Err(CodecError::MalformedCallback { expected: 40, got: 16 })
        ));

        let null = unsafe { read_display_info(std::ptr::null_mut(), 40) };
        assert!(matches!(null, Err(CodecError::MalformedCallback { got: 0, .. })));
    }

    #[test]
    fn check_result_success() {
        assert_eq!(check_rk_result(2, "RK_CodecWrite").unwrap(), 2);
    }

    #[test]
    fn check_result_failure() {
        let err = check_rk_result(-1, "RK_CodecOpen").unwrap_err();
        assert!(err.to_string().contains("RK_CodecOpen"));
    }

    #[test]
    fn rect_rounds_to_pixels() {
        let r = RkRect::from(rk_common::Rect::new(0.4, 10.6, 1919.5, 1080.0));
        assert_eq!(r, RkRect { left: 0, top: 11, right: 1920, bottom: 1080 });
    }

    #[test]
    fn missing_library_is_reported() {
        let err = RkCodecLibrary::load_from(Path::new("/nonexistent/librkffplayer.so")).unwrap_err();
        assert!(matches!(err, LoadError::LibraryNotFound(_)));
    }
}
