//! Rockchip media codec (`librkffplayer.so`) binding.
//!
//! - [`ffi`]: raw C types, protocol constants and the `libloading` table.
//! - [`binding`]: the [`CodecBinding`] seam the coordinator drives.

pub mod binding;
pub mod ffi;

pub use binding::{
    BindingLoader, CodecBinding, CommandParam, DecodeStatus, ListenerEnv, SystemBindingLoader,
};
pub use ffi::{RkCallbackFn, RkCodecDisplayInfo, RkCodecLibrary, DISPLAY_INFO_SIZE, RK_NOPTS};
