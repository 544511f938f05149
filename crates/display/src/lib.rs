//! Rockchip HDMI output control through sysfs.
//!
//! [`SysfsDisplay`] implements [`DisplayNegotiator`](rk_common::DisplayNegotiator)
//! for the decode coordinator: it reads and switches the output mode, the
//! HDMI 3D structure and the fractional refresh-rate preference.

pub mod mode;
pub mod sysfs;

pub use mode::{
    native_mode_string, parse_3d_capabilities, parse_current_3d_mode, sys_mode_to_resolution,
    Capability3d,
};
pub use sysfs::{DisplayConfig, SysfsDisplay, DISPLAY_CLASS_ROOT};
