//! Rockchip hardware video decode.
//!
//! [`RkCodec`] drives one `librkffplayer.so` session: it feeds compressed
//! frames from a worker thread, tracks display timing reported by the
//! vendor's callback thread, corrects A/V drift, and negotiates stereo/3D
//! output with a [`DisplayNegotiator`](rk_common::DisplayNegotiator).

pub mod coordinator;
pub mod fake;
pub mod rkcodec;
pub mod stereo;
mod sync;

pub use coordinator::{
    CodecState, DecoderStats, RkCodec, MAX_CONSECUTIVE_ERRORS, MAX_QUEUED_FRAMES, SPEED_NORMAL,
    SPEED_PAUSE, WORKER_BACKOFF,
};
pub use rkcodec::{
    BindingLoader, CodecBinding, CommandParam, DecodeStatus, ListenerEnv, SystemBindingLoader,
};
pub use stereo::{support_3d, RenderGeometry};
