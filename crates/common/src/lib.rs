//! `rk-common`: shared types, traits, and errors for the Rockchip decode stack.
//!
//! This crate is the foundation that the decoder, display, and helper crates
//! depend on. It defines:
//!
//! - **Codec / stream**: `VideoCodec`, `MediaType`, `StreamHints`, `StreamInfo`
//! - **Packets**: `VideoPacket` (compressed input for the hardware codec)
//! - **Display**: `DisplayInfo`, `Rect`, `ResolutionInfo`, `Display3dMode`,
//!   and the `DisplayNegotiator` / `RenderRectListener` traits
//! - **Stereo**: `StereoMode`, `StereoMask` (mutually exclusive vendor bits)
//! - **Settings**: `DecoderSettings`, `SyncMode`
//! - **Errors**: `CodecError`, `LoadError`, `DisplayError`, `SettingsError`

pub mod codec;
pub mod display;
pub mod error;
pub mod packet;
pub mod settings;
pub mod stereo;
pub mod stream;

// Re-export commonly used items at crate root
pub use codec::{MediaType, VideoCodec};
pub use display::{
    Display3dMode, DisplayEventType, DisplayInfo, DisplayNegotiator, NullDisplay, Rect,
    RenderRectListener, ResolutionInfo,
};
pub use error::{CodecError, CodecResult, DisplayError, LoadError, SettingsError};
pub use packet::VideoPacket;
pub use settings::{DecoderSettings, SyncMode};
pub use stereo::{StereoMask, StereoMode, STEREO_MASK};
pub use stream::{StreamHints, StreamInfo};
