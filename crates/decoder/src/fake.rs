//! In-process stand-in for the vendor codec.
//!
//! [`FakeBinding`] records every call, returns scripted statuses, and can
//! fire the registered display listener from any thread. With echo enabled
//! it behaves like an idealized decoder: every write is shown immediately
//! and EOS drains at once, which is what `rkmc-helper decode --dry-run`
//! uses on machines without Rockchip hardware.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::trace;

use rk_common::{LoadError, StereoMode, StreamInfo, VideoCodec};

use crate::rkcodec::ffi::{command, listener, RkCallbackFn, RkCodecDisplayInfo, RkPtr};
use crate::rkcodec::{BindingLoader, CodecBinding, CommandParam, ListenerEnv, DISPLAY_INFO_SIZE};

/// One recorded binding call.
#[derive(Clone, Debug, PartialEq)]
pub enum FakeCall {
    Init {
        codec: VideoCodec,
        width: u32,
        height: u32,
        stereo: StereoMode,
    },
    Open,
    Write {
        kind: u32,
        size: usize,
        pts: i64,
        dts: i64,
    },
    Close,
    Flush,
    Reset,
    Pause,
    Resume,
    Command {
        cmd: u32,
        param: CommandParam,
    },
    Listener {
        kind: u32,
        registered: bool,
    },
}

#[derive(Copy, Clone)]
struct Listener {
    kind: u32,
    env: ListenerEnv,
    callback: RkCallbackFn,
}

/// Scriptable [`CodecBinding`].
pub struct FakeBinding {
    calls: Mutex<Vec<FakeCall>>,
    listeners: Mutex<Vec<Listener>>,
    write_script: Mutex<VecDeque<i32>>,
    default_write: AtomicI32,
    failures: Mutex<HashMap<&'static str, i32>>,
    echo: AtomicBool,
    last_pts: Mutex<i64>,
    /// Next vendor record per event type.
    records: Mutex<HashMap<u32, i64>>,
    write_times: Mutex<Vec<Instant>>,
}

impl Default for FakeBinding {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBinding {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            write_script: Mutex::new(VecDeque::new()),
            default_write: AtomicI32::new(0),
            failures: Mutex::new(HashMap::new()),
            echo: AtomicBool::new(false),
            last_pts: Mutex::new(0),
            records: Mutex::new(HashMap::new()),
            write_times: Mutex::new(Vec::new()),
        }
    }

    /// A binding that displays every written frame at once.
    pub fn echoing() -> Self {
        let fake = Self::new();
        fake.echo.store(true, Ordering::Relaxed);
        fake.default_write.store(2, Ordering::Relaxed);
        fake
    }

    /// Queue statuses returned by the next writes, in order.
    pub fn push_write_status(&self, status: i32) {
        self.write_script.lock().push_back(status);
    }

    /// Status returned by writes once the script is exhausted.
    pub fn set_default_write_status(&self, status: i32) {
        self.default_write.store(status, Ordering::Relaxed);
    }

    /// Make `call` (e.g. `"open"`, `"reset"`) return `status`.
    pub fn fail(&self, call: &'static str, status: i32) {
        self.failures.lock().insert(call, status);
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&FakeCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    /// Parameters of every `cmd` sent so far.
    pub fn commands(&self, cmd: u32) -> Vec<CommandParam> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                FakeCall::Command { cmd: c, param } if *c == cmd => Some(*param),
                _ => None,
            })
            .collect()
    }

    /// Presentation timestamps of every write so far.
    pub fn written_pts(&self) -> Vec<i64> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                FakeCall::Write { pts, .. } => Some(*pts),
                _ => None,
            })
            .collect()
    }

    /// When each write reached the binding.
    pub fn write_times(&self) -> Vec<Instant> {
        self.write_times.lock().clone()
    }

    /// Advance the vendor record of `kind` without emitting, as if events
    /// were lost inside the library.
    pub fn skip_records(&self, kind: u32, count: i64) {
        *self.records.lock().entry(kind).or_insert(0) += count;
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Deliver a display event to the listener registered for `kind`.
    /// Returns `false` if nobody is listening.
    pub fn emit(&self, kind: u32, raw: i64, pts: i64, eos: bool) -> bool {
        let record = {
            let mut records = self.records.lock();
            let next = records.entry(kind).or_insert(0);
            *next += 1;
            *next - 1
        };
        let mut info = RkCodecDisplayInfo {
            event_type: kind,
            raw,
            pts,
            eos: u32::from(eos),
            record,
        };
        // SAFETY: `info` is a live, correctly sized payload.
        unsafe {
            self.emit_payload(
                kind,
                &mut info as *mut RkCodecDisplayInfo as RkPtr,
                DISPLAY_INFO_SIZE as u32,
            )
        }
    }

    /// Deliver an arbitrary payload, as a misbehaving vendor library might.
    ///
    /// # Safety
    ///
    /// `data` must be null or point to `size` readable bytes.
    pub unsafe fn emit_payload(&self, kind: u32, data: RkPtr, size: u32) -> bool {
        // Copy out so the callback can call back into this binding.
        let targets: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .filter(|l| l.kind == kind)
            .copied()
            .collect();

        for l in &targets {
            (l.callback)(l.env.0, data, size);
        }
        !targets.is_empty()
    }

    fn record(&self, call: FakeCall) -> i32 {
        let name = match &call {
            FakeCall::Init { .. } => "init",
            FakeCall::Open => "open",
            FakeCall::Write { .. } => "write",
            FakeCall::Close => "close",
            FakeCall::Flush => "flush",
            FakeCall::Reset => "reset",
            FakeCall::Pause => "pause",
            FakeCall::Resume => "resume",
            FakeCall::Command { .. } => "command",
            FakeCall::Listener { .. } => "listener",
        };
        trace!(?call, "Fake binding call");
        self.calls.lock().push(call);
        self.failures.lock().get(name).copied().unwrap_or(0)
    }
}

impl CodecBinding for FakeBinding {
    fn init(&self, info: &StreamInfo) -> i32 {
        self.record(FakeCall::Init {
            codec: info.codec,
            width: info.width,
            height: info.height,
            stereo: info.stereo,
        })
    }

    fn open(&self) -> i32 {
        self.record(FakeCall::Open)
    }

    fn write(&self, kind: u32, data: &[u8], pts: i64, dts: i64) -> i32 {
        self.write_times.lock().push(Instant::now());
        let forced = self.record(FakeCall::Write {
            kind,
            size: data.len(),
            pts,
            dts,
        });
        if forced < 0 {
            return forced;
        }

        let status = self
            .write_script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default_write.load(Ordering::Relaxed));

        if status >= 0 && self.echo.load(Ordering::Relaxed) {
            *self.last_pts.lock() = pts;
            self.emit(listener::RK_RENDER, pts, pts, false);
        }
        status
    }

    fn close(&self) -> i32 {
        self.record(FakeCall::Close)
    }

    fn flush(&self) -> i32 {
        self.record(FakeCall::Flush)
    }

    fn reset(&self) -> i32 {
        self.record(FakeCall::Reset)
    }

    fn pause(&self) -> i32 {
        self.record(FakeCall::Pause)
    }

    fn resume(&self) -> i32 {
        self.record(FakeCall::Resume)
    }

    fn send_command(&self, cmd: u32, param: &CommandParam) -> i32 {
        let status = self.record(FakeCall::Command { cmd, param: *param });
        if cmd == command::RK_CMD_EOS && self.echo.load(Ordering::Relaxed) {
            let pts = *self.last_pts.lock();
            self.emit(listener::RK_RENDER, pts, pts, true);
        }
        status
    }

    fn register_listener(
        &self,
        env: ListenerEnv,
        kind: u32,
        callback: Option<RkCallbackFn>,
    ) -> i32 {
        let status = self.record(FakeCall::Listener {
            kind,
            registered: callback.is_some(),
        });
        if status < 0 {
            return status;
        }

        let mut listeners = self.listeners.lock();
        listeners.retain(|l| l.kind != kind);
        if let Some(callback) = callback {
            listeners.push(Listener {
                kind,
                env,
                callback,
            });
        }
        status
    }
}

/// Hands out one shared [`FakeBinding`], or fails like a missing library.
pub struct FakeLoader {
    binding: Option<Arc<FakeBinding>>,
    loads: AtomicUsize,
}

impl FakeLoader {
    pub fn new(binding: Arc<FakeBinding>) -> Self {
        Self {
            binding: Some(binding),
            loads: AtomicUsize::new(0),
        }
    }

    /// A loader that behaves like a board without the vendor library.
    pub fn missing() -> Self {
        Self {
            binding: None,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

impl BindingLoader for FakeLoader {
    fn load(&self) -> Result<Arc<dyn CodecBinding>, LoadError> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        match &self.binding {
            Some(binding) => Ok(binding.clone() as Arc<dyn CodecBinding>),
            None => Err(LoadError::LibraryNotFound(
                "librkffplayer.so: not present on this device".to_string(),
            )),
        }
    }
}
