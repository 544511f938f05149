//! Decode coordinator: owns one hardware codec session and its worker.
//!
//! ## Threads
//!
//! - Callers (demuxer, render clock, UI) use the public `&self` methods.
//! - The **worker** owns every `write` into the codec. It pulls compressed
//!   frames from an unbounded feed queue, applies staged speed changes, and
//!   executes flush/reset on behalf of callers.
//! - The **vendor callback thread** reports display timing through
//!   [`on_display_event`], which only touches [`DisplaySync`].
//!
//! ## Locks
//!
//! `lifecycle` → `state` → (`geometry` on teardown only). The worker takes
//! `state` alone; the callback takes only the `DisplaySync` lock. Vendor
//! calls that can re-enter the callback are never made while holding the
//! `DisplaySync` lock.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, select, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use rk_common::{
    CodecError, CodecResult, DecoderSettings, DisplayInfo, DisplayNegotiator, MediaType,
    StereoMask, StereoMode, StreamHints, StreamInfo, SyncMode, VideoCodec, VideoPacket,
};

use crate::rkcodec::ffi::{check_rk_result, command, listener, RkEnv};
use crate::rkcodec::{
    BindingLoader, CodecBinding, CommandParam, DecodeStatus, ListenerEnv, RkCallbackFn,
    SystemBindingLoader, RK_NOPTS,
};
use crate::stereo::RenderGeometry;
use crate::sync::{on_display_event, DisplaySync};

/// Normal playback speed in host units.
pub const SPEED_NORMAL: i32 = 1000;
/// Speed value that pauses the codec.
pub const SPEED_PAUSE: i32 = 0;

/// Consecutive failed writes after which the session is given up.
pub const MAX_CONSECUTIVE_ERRORS: u32 = 8;

/// Upper bound on any single worker wait.
pub const WORKER_BACKOFF: Duration = Duration::from_millis(10);

/// Queue depth at which `decode_video` starts asking the caller to hold off.
pub const MAX_QUEUED_FRAMES: usize = 16;

const WORKER_THREAD_NAME: &str = "rkcodec-worker";

// ---------------------------------------------------------------------------
// Public state & stats
// ---------------------------------------------------------------------------

/// Lifecycle of the hardware session.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum CodecState {
    #[default]
    Unopened,
    /// Library loaded, codec not yet open.
    Loaded,
    /// Open, nothing written yet.
    Opened,
    Running,
    Paused,
    Flushing,
    Resetting,
    Closed,
}

impl CodecState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Unopened => "unopened",
            Self::Loaded => "loaded",
            Self::Opened => "opened",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Flushing => "flushing",
            Self::Resetting => "resetting",
            Self::Closed => "closed",
        }
    }

    /// Whether a codec session exists (frames may be submitted).
    pub fn is_open(self) -> bool {
        matches!(
            self,
            Self::Opened | Self::Running | Self::Paused | Self::Flushing | Self::Resetting
        )
    }
}

/// Counters for one session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub frames_written: u64,
    pub pictures: u64,
    pub write_errors: u64,
    pub display_events: u64,
    pub dropped_events: u64,
    pub sync_corrections: u64,
    /// Breaks in the vendor's own display record sequence.
    pub record_gaps: u64,
}

// ---------------------------------------------------------------------------
// Session internals
// ---------------------------------------------------------------------------

/// Work items for the worker, in submission order.
enum Feed {
    Packet(VideoPacket),
    Eos,
}

/// Out-of-band requests. Flush and reset reply with the vendor status.
enum Control {
    Flush(Sender<i32>),
    Reset(Sender<i32>),
    Stop,
}

/// Worker-side results and staged inputs, shared with the coordinator.
struct SessionControl {
    speed: AtomicI32,
    next_speed: AtomicI32,
    last_status: AtomicI32,
    pending_error: Mutex<Option<i32>>,
    consecutive_errors: AtomicU32,
    unusable: AtomicBool,
    frames_written: AtomicU64,
    pictures: AtomicU64,
    write_errors: AtomicU64,
}

impl SessionControl {
    fn new() -> Self {
        Self {
            speed: AtomicI32::new(SPEED_NORMAL),
            next_speed: AtomicI32::new(SPEED_NORMAL),
            last_status: AtomicI32::new(DecodeStatus::Buffer.raw()),
            pending_error: Mutex::new(None),
            consecutive_errors: AtomicU32::new(0),
            unusable: AtomicBool::new(false),
            frames_written: AtomicU64::new(0),
            pictures: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
        }
    }

    // Counters last: a reader that sees the count also sees the status.
    fn record_success(&self, status: DecodeStatus) {
        self.consecutive_errors.store(0, Ordering::Relaxed);
        self.last_status.store(status.raw(), Ordering::Release);
        if status.has_picture() {
            self.pictures.fetch_add(1, Ordering::Relaxed);
        }
        self.frames_written.fetch_add(1, Ordering::Release);
    }

    fn record_error(&self, status: i32) {
        *self.pending_error.lock() = Some(status);

        let consecutive = self.consecutive_errors.fetch_add(1, Ordering::Relaxed) + 1;
        if consecutive >= MAX_CONSECUTIVE_ERRORS {
            if !self.unusable.swap(true, Ordering::AcqRel) {
                error!(status, consecutive, "Codec keeps rejecting input; session unusable");
            }
        } else {
            warn!(status, consecutive, "RK_CodecWrite failed");
        }
        self.write_errors.fetch_add(1, Ordering::Release);
    }

    /// Forget write history after a discontinuity.
    fn clear_history(&self) {
        *self.pending_error.lock() = None;
        self.consecutive_errors.store(0, Ordering::Relaxed);
        self.last_status
            .store(DecodeStatus::Buffer.raw(), Ordering::Release);
    }

    fn take_error(&self) -> Option<i32> {
        self.pending_error.lock().take()
    }

    fn last_status(&self) -> DecodeStatus {
        DecodeStatus::from_raw(self.last_status.load(Ordering::Acquire))
    }

    fn is_unusable(&self) -> bool {
        self.unusable.load(Ordering::Acquire)
    }
}

/// An open codec session. Dropping it releases the binding.
struct Session {
    binding: Arc<dyn CodecBinding>,
    stream: Arc<StreamInfo>,
    sync: Arc<DisplaySync>,
    control: Arc<SessionControl>,
    /// Decode-type word passed to every write; follows the negotiated stereo.
    write_kind: Arc<AtomicU32>,
    feed_tx: Sender<Feed>,
    ctrl_tx: Sender<Control>,
    worker: Option<JoinHandle<()>>,
    listening: bool,
    opened: bool,
}

impl Session {
    /// Bring up the codec: init, open, listeners, worker.
    ///
    /// On failure everything acquired so far is released again.
    fn start(
        binding: Arc<dyn CodecBinding>,
        stream: Arc<StreamInfo>,
        settings: &DecoderSettings,
        state: &Arc<Mutex<CodecState>>,
    ) -> CodecResult<Self> {
        let status = binding.init(&stream);
        if status < 0 {
            return Err(CodecError::Init {
                call: "RK_CodecInit",
                status,
            });
        }

        let status = binding.open();
        if status < 0 {
            binding.close();
            return Err(CodecError::Init {
                call: "RK_CodecOpen",
                status,
            });
        }

        let (space_tx, space_rx) = bounded(1);
        let (feed_tx, feed_rx) = unbounded();
        let (ctrl_tx, ctrl_rx) = unbounded();

        let mut kind = StereoMask::new(MediaType::Video.raw());
        kind.set(stream.stereo);

        let mut session = Self {
            sync: Arc::new(DisplaySync::new(
                binding.clone(),
                settings.sync_mode,
                settings.sync_threshold_us,
                space_tx,
            )),
            control: Arc::new(SessionControl::new()),
            write_kind: Arc::new(AtomicU32::new(kind.bits())),
            binding,
            stream,
            feed_tx,
            ctrl_tx,
            worker: None,
            listening: false,
            opened: true,
        };

        for kind in [listener::RK_DECODE, listener::RK_RENDER] {
            session.listening = true;
            let status = session.binding.register_listener(
                session.listener_env(),
                kind,
                Some(on_display_event as RkCallbackFn),
            );
            if status < 0 {
                session.shutdown();
                return Err(CodecError::Init {
                    call: "RK_CodecRegisterListener",
                    status,
                });
            }
        }

        let core = WorkerCore {
            binding: session.binding.clone(),
            sync: session.sync.clone(),
            control: session.control.clone(),
            state: state.clone(),
            write_kind: session.write_kind.clone(),
            input_full: false,
        };
        let channels = WorkerChannels {
            feed_rx,
            ctrl_rx,
            space_rx,
        };

        let spawned = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_worker(core, channels));

        match spawned {
            Ok(handle) => session.worker = Some(handle),
            Err(e) => {
                session.shutdown();
                return Err(CodecError::Worker(format!(
                    "failed to spawn {WORKER_THREAD_NAME}: {e}"
                )));
            }
        }

        Ok(session)
    }

    fn listener_env(&self) -> ListenerEnv {
        ListenerEnv(Arc::as_ptr(&self.sync) as RkEnv)
    }

    /// Stop the worker, remove listeners, close the codec. Idempotent.
    fn shutdown(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = self.ctrl_tx.send(Control::Stop);
            if handle.join().is_err() {
                error!("Decode worker panicked");
            }
        }

        if self.listening {
            for kind in [listener::RK_DECODE, listener::RK_RENDER] {
                let status = self
                    .binding
                    .register_listener(self.listener_env(), kind, None);
                if status < 0 {
                    error!(kind, status, "Failed to remove display listener");
                }
            }
            self.listening = false;
        }

        if self.opened {
            let status = self.binding.close();
            if status < 0 {
                error!(status, "RK_CodecClose failed");
            }
            self.opened = false;
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

struct WorkerChannels {
    feed_rx: Receiver<Feed>,
    ctrl_rx: Receiver<Control>,
    space_rx: Receiver<()>,
}

struct WorkerCore {
    binding: Arc<dyn CodecBinding>,
    sync: Arc<DisplaySync>,
    control: Arc<SessionControl>,
    state: Arc<Mutex<CodecState>>,
    write_kind: Arc<AtomicU32>,
    /// The codec asked us to hold off until a picture is consumed.
    input_full: bool,
}

fn run_worker(mut core: WorkerCore, channels: WorkerChannels) {
    debug!("Decode worker started");

    loop {
        // Control requests first, so flush/stop never wait behind input.
        let mut keep_running = true;
        while let Ok(ctrl) = channels.ctrl_rx.try_recv() {
            if !core.handle_control(ctrl, &channels.feed_rx) {
                keep_running = false;
                break;
            }
        }
        if !keep_running {
            break;
        }

        core.apply_staged_speed();

        keep_running = if core.input_full || core.is_paused() {
            let keep = select! {
                recv(channels.ctrl_rx) -> msg => match msg {
                    Ok(ctrl) => core.handle_control(ctrl, &channels.feed_rx),
                    Err(_) => false,
                },
                recv(channels.space_rx) -> _ => true,
                default(WORKER_BACKOFF) => true,
            };
            core.input_full = false;
            keep
        } else {
            select! {
                recv(channels.ctrl_rx) -> msg => match msg {
                    Ok(ctrl) => core.handle_control(ctrl, &channels.feed_rx),
                    Err(_) => false,
                },
                recv(channels.feed_rx) -> msg => match msg {
                    Ok(feed) => {
                        core.handle_feed(feed);
                        if core.input_full {
                            // Only an event after this write means space.
                            discard_stale_space(&channels.space_rx);
                        }
                        true
                    }
                    Err(_) => false,
                },
                default(WORKER_BACKOFF) => true,
            }
        };

        if !keep_running {
            break;
        }
    }

    debug!("Decode worker stopped");
}

fn discard_stale_space(space_rx: &Receiver<()>) {
    while space_rx.try_recv().is_ok() {}
}

impl WorkerCore {
    fn set_state(&self, next: CodecState) -> CodecState {
        std::mem::replace(&mut *self.state.lock(), next)
    }

    fn is_paused(&self) -> bool {
        self.control.speed.load(Ordering::Relaxed) == SPEED_PAUSE
    }

    /// Returns `false` when the worker should exit.
    fn handle_control(&mut self, ctrl: Control, feed_rx: &Receiver<Feed>) -> bool {
        match ctrl {
            Control::Stop => false,
            Control::Flush(reply) => {
                let previous = self.set_state(CodecState::Flushing);
                let discarded = feed_rx.try_iter().count();
                let status = self.binding.flush();
                self.after_discontinuity();
                self.set_state(previous);
                debug!(status, discarded, "Codec flushed");
                let _ = reply.send(status);
                true
            }
            Control::Reset(reply) => {
                let previous = self.set_state(CodecState::Resetting);
                let discarded = feed_rx.try_iter().count();
                let status = self.binding.reset();
                self.after_discontinuity();
                if status < 0 {
                    self.control.unusable.store(true, Ordering::Release);
                    error!(status, "RK_CodecReset failed; session unusable");
                }
                self.set_state(if previous == CodecState::Paused {
                    CodecState::Paused
                } else {
                    CodecState::Opened
                });
                debug!(status, discarded, "Codec reset");
                let _ = reply.send(status);
                true
            }
        }
    }

    fn after_discontinuity(&mut self) {
        self.input_full = false;
        self.sync.reset_records();
        self.control.clear_history();
    }

    fn handle_feed(&mut self, feed: Feed) {
        match feed {
            Feed::Packet(packet) => self.write(packet),
            Feed::Eos => {
                let status = self
                    .binding
                    .send_command(command::RK_CMD_EOS, &CommandParam::None);
                if status < 0 {
                    warn!(status, "RK_CMD_EOS rejected");
                } else {
                    info!("End of stream submitted to codec");
                }
            }
        }
    }

    fn write(&mut self, packet: VideoPacket) {
        let pts = packet.pts.unwrap_or(RK_NOPTS);
        let dts = packet.dts.unwrap_or(RK_NOPTS);

        let kind = self.write_kind.load(Ordering::Acquire);
        let raw = self.binding.write(kind, &packet.data, pts, dts);
        match DecodeStatus::from_raw(raw) {
            DecodeStatus::Error(code) => self.control.record_error(code),
            status => {
                self.control.record_success(status);
                if status.wants_backoff() {
                    self.input_full = true;
                }
            }
        }

        let mut state = self.state.lock();
        if *state == CodecState::Opened {
            *state = CodecState::Running;
        }
    }

    /// Apply a speed staged by `set_speed`. Runs at the top of every
    /// iteration, before any write.
    fn apply_staged_speed(&mut self) {
        let next = self.control.next_speed.load(Ordering::Acquire);
        let current = self.control.speed.load(Ordering::Relaxed);
        if next == current {
            return;
        }

        if next == SPEED_PAUSE {
            let status = self.binding.pause();
            if status < 0 {
                warn!(status, "RK_CodecPause failed");
            }
            self.set_state(CodecState::Paused);
        } else if current == SPEED_PAUSE {
            let status = self.binding.resume();
            if status < 0 {
                warn!(status, "RK_CodecResume failed");
            }
            self.set_state(CodecState::Running);
        }

        let status = self
            .binding
            .send_command(command::RK_CMD_SETSPEED, &CommandParam::Int(next));
        if status < 0 {
            warn!(status, speed = next, "RK_CMD_SETSPEED rejected");
        }
        self.control.speed.store(next, Ordering::Relaxed);
        debug!(from = current, to = next, "Speed applied");
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Hardware decode coordinator for one video stream at a time.
///
/// All methods take `&self`; share it behind an `Arc` between the demux,
/// render-clock and UI threads.
pub struct RkCodec {
    pub(crate) settings: DecoderSettings,
    loader: Box<dyn BindingLoader>,
    pub(crate) display: Arc<dyn DisplayNegotiator>,
    state: Arc<Mutex<CodecState>>,
    lifecycle: Mutex<Option<Session>>,
    sync_slot: Mutex<Option<Arc<DisplaySync>>>,
    pub(crate) geometry: Mutex<RenderGeometry>,
}

impl RkCodec {
    /// Coordinator backed by the system `librkffplayer.so` (or
    /// `settings.library_path`).
    pub fn new(settings: DecoderSettings, display: Arc<dyn DisplayNegotiator>) -> Self {
        let loader = SystemBindingLoader::new(settings.library_path.clone());
        Self::with_loader(settings, Box::new(loader), display)
    }

    pub fn with_loader(
        settings: DecoderSettings,
        loader: Box<dyn BindingLoader>,
        display: Arc<dyn DisplayNegotiator>,
    ) -> Self {
        Self {
            settings,
            loader,
            display,
            state: Arc::new(Mutex::new(CodecState::Unopened)),
            lifecycle: Mutex::new(None),
            sync_slot: Mutex::new(None),
            geometry: Mutex::new(RenderGeometry::default()),
        }
    }

    fn set_state(&self, next: CodecState) {
        *self.state.lock() = next;
    }

    /// Open a hardware session for `hints`, closing any previous one.
    pub fn open_decoder(&self, hints: &StreamHints) -> CodecResult<()> {
        {
            let mut lifecycle = self.lifecycle.lock();
            self.shutdown_locked(&mut lifecycle);

            let codec = hints.codec.unwrap_or(VideoCodec::Other(0));
            if !self.settings.accepts_codec(codec) {
                info!(codec = codec.display_name(), "Hardware decode disabled for codec");
                return Err(CodecError::Unsupported(codec));
            }
            let stream = match StreamInfo::from_hints(hints, self.settings.frame_packing) {
                Some(stream) => Arc::new(stream),
                None => return Err(CodecError::Unsupported(codec)),
            };

            let binding = self.loader.load()?;
            self.set_state(CodecState::Loaded);

            let session = match Session::start(binding, stream, &self.settings, &self.state) {
                Ok(session) => session,
                Err(e) => {
                    self.set_state(CodecState::Unopened);
                    warn!(error = %e, "Hardware decoder bring-up failed");
                    return Err(e);
                }
            };

            info!(
                codec = session.stream.codec.display_name(),
                width = session.stream.width,
                height = session.stream.height,
                fps = session.stream.fps(),
                stereo = ?session.stream.stereo,
                "Hardware decoder opened"
            );

            *self.sync_slot.lock() = Some(session.sync.clone());
            *lifecycle = Some(session);
            self.set_state(CodecState::Opened);
        }

        self.update_render_frac_hdmi();
        self.update_render_stereo(true);
        Ok(())
    }

    /// Tear down the session, if any. Safe to call repeatedly.
    pub fn close_decoder(&self) {
        let mut lifecycle = self.lifecycle.lock();
        self.shutdown_locked(&mut lifecycle);
    }

    fn shutdown_locked(&self, lifecycle: &mut Option<Session>) {
        let Some(mut session) = lifecycle.take() else {
            return;
        };

        session.shutdown();
        *self.sync_slot.lock() = None;
        self.restore_display();
        self.set_state(CodecState::Closed);
        info!(
            frames = session.control.frames_written.load(Ordering::Relaxed),
            "Hardware decoder closed"
        );
    }

    /// Queue one compressed frame.
    ///
    /// Returns the latest write status seen by the worker, or the error of
    /// an earlier write that has not been reported yet. The frame is queued
    /// in both cases. Once [`MAX_QUEUED_FRAMES`] are waiting the status is
    /// [`DecodeStatus::Picture`]: the caller should hold further input.
    pub fn decode_video(&self, packet: VideoPacket) -> CodecResult<DecodeStatus> {
        let lifecycle = self.lifecycle.lock();
        let Some(session) = lifecycle.as_ref() else {
            return Err(CodecError::StateViolation {
                op: "decode_video",
                state: self.state().name(),
            });
        };

        if session.control.is_unusable() {
            return Err(CodecError::Unusable);
        }

        session
            .feed_tx
            .send(Feed::Packet(packet))
            .map_err(|_| CodecError::Worker("decode worker has exited".to_string()))?;

        if let Some(status) = session.control.take_error() {
            return Err(CodecError::Protocol {
                call: "RK_CodecWrite",
                status,
            });
        }
        if session.feed_tx.len() >= MAX_QUEUED_FRAMES {
            return Ok(DecodeStatus::Picture);
        }
        Ok(session.control.last_status())
    }

    /// Frames queued but not yet written.
    pub fn queued_frames(&self) -> usize {
        self.lifecycle
            .lock()
            .as_ref()
            .map_or(0, |s| s.feed_tx.len())
    }

    /// Carry a stereo layout into the type word of subsequent writes.
    pub(crate) fn set_write_stereo(&self, mode: StereoMode) {
        if let Some(session) = self.lifecycle.lock().as_ref() {
            let mut kind = StereoMask::new(session.write_kind.load(Ordering::Acquire));
            kind.set(mode);
            session.write_kind.store(kind.bits(), Ordering::Release);
        }
    }

    /// Drop queued and in-flight frames. No-op without a session.
    pub fn flush(&self) -> CodecResult<()> {
        self.run_on_worker("flush", Control::Flush, "RK_CodecFlush")
    }

    /// Reset the codec to its post-open state. No-op without a session.
    pub fn reset(&self) -> CodecResult<()> {
        self.run_on_worker("reset", Control::Reset, "RK_CodecReset")
    }

    fn run_on_worker(
        &self,
        op: &'static str,
        request: fn(Sender<i32>) -> Control,
        call: &'static str,
    ) -> CodecResult<()> {
        let lifecycle = self.lifecycle.lock();
        let Some(session) = lifecycle.as_ref() else {
            debug!(op, "No open session; ignoring");
            return Ok(());
        };

        let (reply_tx, reply_rx) = bounded(1);
        session
            .ctrl_tx
            .send(request(reply_tx))
            .map_err(|_| CodecError::Worker("decode worker has exited".to_string()))?;
        let status = reply_rx
            .recv()
            .map_err(|_| CodecError::Worker(format!("decode worker died during {op}")))?;

        check_rk_result(status, call).map(|_| ())
    }

    /// Stage a playback speed; the worker applies it before its next write.
    pub fn set_speed(&self, speed: i32) {
        match self.lifecycle.lock().as_ref() {
            Some(session) => session.control.next_speed.store(speed, Ordering::Release),
            None => debug!(speed, "No open session; speed ignored"),
        }
    }

    /// Speed currently applied by the worker.
    pub fn speed(&self) -> i32 {
        self.lifecycle
            .lock()
            .as_ref()
            .map(|s| s.control.speed.load(Ordering::Relaxed))
            .unwrap_or(SPEED_NORMAL)
    }

    /// Queue end-of-stream behind every frame already submitted.
    /// Repeated calls are ignored until the next flush or reset.
    pub fn submit_eos(&self) -> CodecResult<()> {
        let lifecycle = self.lifecycle.lock();
        let Some(session) = lifecycle.as_ref() else {
            return Err(CodecError::StateViolation {
                op: "submit_eos",
                state: self.state().name(),
            });
        };

        if !session.sync.mark_eos_submitted() {
            debug!("End of stream already submitted");
            return Ok(());
        }
        session
            .feed_tx
            .send(Feed::Eos)
            .map_err(|_| CodecError::Worker("decode worker has exited".to_string()))
    }

    pub fn submitted_eos(&self) -> bool {
        self.current_sync().is_some_and(|s| s.submitted_eos())
    }

    /// Whether the codec reported that it drained after EOS.
    pub fn is_eos(&self) -> bool {
        self.current_sync().is_some_and(|s| s.is_eos())
    }

    /// Latest display timing. Record `-1` means nothing was shown yet.
    pub fn display_info(&self) -> DisplayInfo {
        self.current_sync()
            .map(|s| s.display_info())
            .unwrap_or_default()
    }

    fn current_sync(&self) -> Option<Arc<DisplaySync>> {
        self.sync_slot.lock().clone()
    }

    /// Forward a command to the codec. Failures are logged, not returned.
    pub fn send_command(&self, cmd: u32, param: CommandParam) {
        let binding = self.lifecycle.lock().as_ref().map(|s| s.binding.clone());
        match binding {
            Some(binding) => {
                let status = binding.send_command(cmd, &param);
                if status < 0 {
                    warn!(cmd, status, "Codec command rejected");
                }
            }
            None => debug!(cmd, "No open session; command dropped"),
        }
    }

    /// Forward a `RK_CONF_*` configuration value to the codec.
    pub fn send_configure(&self, config: u32, param: CommandParam) {
        debug!(config, ?param, "Configure");
        self.send_command(config, param);
    }

    pub fn state(&self) -> CodecState {
        *self.state.lock()
    }

    pub fn stream_info(&self) -> Option<Arc<StreamInfo>> {
        self.lifecycle.lock().as_ref().map(|s| s.stream.clone())
    }

    pub fn sync_mode(&self) -> SyncMode {
        self.current_sync()
            .map(|s| s.mode())
            .unwrap_or(self.settings.sync_mode)
    }

    pub fn settings(&self) -> &DecoderSettings {
        &self.settings
    }

    pub fn stats(&self) -> DecoderStats {
        let lifecycle = self.lifecycle.lock();
        let Some(session) = lifecycle.as_ref() else {
            return DecoderStats::default();
        };
        let control = &session.control;
        DecoderStats {
            frames_written: control.frames_written.load(Ordering::Acquire),
            pictures: control.pictures.load(Ordering::Relaxed),
            write_errors: control.write_errors.load(Ordering::Acquire),
            display_events: session.sync.events(),
            dropped_events: session.sync.dropped(),
            sync_corrections: session.sync.corrections(),
            record_gaps: session.sync.record_gaps(),
        }
    }
}

impl Drop for RkCodec {
    fn drop(&mut self) {
        self.close_decoder();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeBinding, FakeCall, FakeLoader};
    use rk_common::NullDisplay;
    use std::time::Instant;

    fn wait_until(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        cond()
    }

    fn h264() -> StreamHints {
        StreamHints {
            codec: Some(VideoCodec::H264),
            width: 1920,
            height: 1080,
            fps_rate: 24,
            fps_scale: 1,
            ..Default::default()
        }
    }

    fn codec_with(binding: &Arc<FakeBinding>) -> RkCodec {
        RkCodec::with_loader(
            DecoderSettings::default(),
            Box::new(FakeLoader::new(binding.clone())),
            Arc::new(NullDisplay),
        )
    }

    #[test]
    fn state_names() {
        assert_eq!(CodecState::Unopened.name(), "unopened");
        assert!(CodecState::Paused.is_open());
        assert!(!CodecState::Closed.is_open());
    }

    #[test]
    fn write_failures_surface_once() {
        let binding = Arc::new(FakeBinding::new());
        binding.push_write_status(-1);
        let codec = codec_with(&binding);
        codec.open_decoder(&h264()).unwrap();

        codec.decode_video(VideoPacket::new(vec![0; 8], Some(0), None)).unwrap();
        assert!(wait_until(|| codec.stats().write_errors == 1));

        let err = codec
            .decode_video(VideoPacket::new(vec![0; 8], Some(40_000), None))
            .unwrap_err();
        assert!(matches!(err, CodecError::Protocol { status: -1, .. }));

        assert!(wait_until(|| codec.stats().frames_written == 1));
        assert!(codec
            .decode_video(VideoPacket::new(vec![0; 8], Some(80_000), None))
            .is_ok());
    }

    #[test]
    fn repeated_failures_make_session_unusable() {
        let binding = Arc::new(FakeBinding::new());
        binding.set_default_write_status(-1);
        let codec = codec_with(&binding);
        codec.open_decoder(&h264()).unwrap();

        for i in 0..MAX_CONSECUTIVE_ERRORS {
            let _ = codec.decode_video(VideoPacket::new(vec![0; 4], Some(i64::from(i)), None));
        }
        assert!(wait_until(|| codec.stats().write_errors
            == u64::from(MAX_CONSECUTIVE_ERRORS)));
        assert!(matches!(
            codec.decode_video(VideoPacket::new(vec![0; 4], None, None)),
            Err(CodecError::Unusable)
        ));
    }

    #[test]
    fn missing_pts_uses_nopts() {
        let binding = Arc::new(FakeBinding::new());
        let codec = codec_with(&binding);
        codec.open_decoder(&h264()).unwrap();

        codec.decode_video(VideoPacket::new(vec![1, 2, 3], None, None)).unwrap();
        assert!(wait_until(|| binding.written_pts() == vec![RK_NOPTS]));
        assert_eq!(
            binding.count(|c| matches!(c, FakeCall::Write { kind, size: 3, .. } if *kind == MediaType::Video.raw())),
            1
        );
    }

    #[test]
    fn reset_failure_marks_unusable() {
        let binding = Arc::new(FakeBinding::new());
        binding.fail("reset", -5);
        let codec = codec_with(&binding);
        codec.open_decoder(&h264()).unwrap();

        assert!(matches!(
            codec.reset(),
            Err(CodecError::Protocol { call: "RK_CodecReset", status: -5 })
        ));
        assert!(matches!(
            codec.decode_video(VideoPacket::new(vec![0], None, None)),
            Err(CodecError::Unusable)
        ));
    }
}
