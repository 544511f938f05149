//! Display-event callback and A/V sync reconciliation.
//!
//! The codec reports display timing from its own thread. Each event replaces
//! the latest [`DisplayInfo`] snapshot under one lock; any reaction (a sync
//! correction, waking the feeder) happens after the lock is released.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::channel::Sender;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use rk_common::{CodecError, DisplayEventType, DisplayInfo, SyncMode};

use crate::rkcodec::ffi::{self, command, RkCodecDisplayInfo, RkEnv, RkPtr, RkU32};
use crate::rkcodec::{CodecBinding, CommandParam};

/// Everything the callback mutates, behind a single lock.
#[derive(Debug, Default)]
struct DisplayState {
    info: DisplayInfo,
    next_record: i64,
    /// Last vendor sequence number per event type (decode, render).
    vendor_records: [Option<i64>; 2],
    submitted_eos: bool,
    observed_eos: bool,
}

/// Shared between the callback thread, the worker and the coordinator.
///
/// Its address is the listener `env`, so it lives in an `Arc` that the
/// session holds until the listener has been removed.
pub(crate) struct DisplaySync {
    binding: Arc<dyn CodecBinding>,
    mode: SyncMode,
    threshold_us: u64,
    state: Mutex<DisplayState>,
    space_tx: Sender<()>,
    events: AtomicU64,
    dropped: AtomicU64,
    corrections: AtomicU64,
    record_gaps: AtomicU64,
}

impl DisplaySync {
    pub(crate) fn new(
        binding: Arc<dyn CodecBinding>,
        mode: SyncMode,
        threshold_us: i64,
        space_tx: Sender<()>,
    ) -> Self {
        Self {
            binding,
            mode,
            threshold_us: threshold_us.max(0) as u64,
            state: Mutex::new(DisplayState::default()),
            space_tx,
            events: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            corrections: AtomicU64::new(0),
            record_gaps: AtomicU64::new(0),
        }
    }

    pub(crate) fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Record one display event and react to it.
    pub(crate) fn handle_event(&self, raw: &RkCodecDisplayInfo) {
        let (snapshot, gap) = self.set_display_info(raw);
        self.events.fetch_add(1, Ordering::Relaxed);

        trace!(
            event = ?snapshot.event,
            raw = snapshot.raw_pts,
            pts = snapshot.pts,
            record = snapshot.record,
            vendor_record = raw.record,
            eos = snapshot.eos,
            "Display event"
        );
        if let Some(expected) = gap {
            self.record_gaps.fetch_add(1, Ordering::Relaxed);
            debug!(expected, got = raw.record, event = ?snapshot.event, "Vendor record gap");
        }

        if self.mode == SyncMode::Server && snapshot.drift().unsigned_abs() > self.threshold_us {
            self.corrections.fetch_add(1, Ordering::Relaxed);
            debug!(drift = snapshot.drift(), pts = snapshot.pts, "Issuing sync correction");
            let status = self
                .binding
                .send_command(command::RK_CMD_SYNC, &CommandParam::Pts(snapshot.pts));
            if status < 0 {
                warn!(status, "RK_CMD_SYNC rejected");
            }
        }

        // Bounded(1): a pending wakeup already covers this one.
        let _ = self.space_tx.try_send(());
    }

    /// Returns the new snapshot and, if the vendor sequence skipped, the
    /// record that was expected instead.
    fn set_display_info(&self, raw: &RkCodecDisplayInfo) -> (DisplayInfo, Option<i64>) {
        let mut state = self.state.lock();
        let info = DisplayInfo {
            event: DisplayEventType::from_raw(raw.event_type),
            raw_pts: raw.raw,
            pts: raw.pts,
            eos: raw.eos != 0,
            record: state.next_record,
        };
        state.next_record += 1;
        state.info = info;
        if info.eos {
            state.observed_eos = true;
        }

        let slot = match info.event {
            DisplayEventType::Decode => Some(0),
            DisplayEventType::Render => Some(1),
            _ => None,
        };
        let gap = slot.and_then(|i| {
            let previous = state.vendor_records[i].replace(raw.record)?;
            let expected = previous + 1;
            (raw.record != expected).then_some(expected)
        });
        (info, gap)
    }

    pub(crate) fn drop_malformed(&self, err: &CodecError) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        debug!(error = %err, "Dropping display event");
    }

    pub(crate) fn display_info(&self) -> DisplayInfo {
        self.state.lock().info
    }

    /// Forget every event seen so far; the next one gets record 0.
    pub(crate) fn reset_records(&self) {
        *self.state.lock() = DisplayState::default();
    }

    /// Mark EOS as submitted. Returns `false` if it already was.
    pub(crate) fn mark_eos_submitted(&self) -> bool {
        let mut state = self.state.lock();
        !std::mem::replace(&mut state.submitted_eos, true)
    }

    pub(crate) fn submitted_eos(&self) -> bool {
        self.state.lock().submitted_eos
    }

    pub(crate) fn is_eos(&self) -> bool {
        self.state.lock().observed_eos
    }

    pub(crate) fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn corrections(&self) -> u64 {
        self.corrections.load(Ordering::Relaxed)
    }

    /// Events whose vendor record did not follow the previous one.
    pub(crate) fn record_gaps(&self) -> u64 {
        self.record_gaps.load(Ordering::Relaxed)
    }
}

/// Listener registered for `RK_DECODE` and `RK_RENDER`.
///
/// # Safety
///
/// `env` must be null or the address of a live [`DisplaySync`]; `data` must
/// point to `size` readable bytes when non-null.
pub(crate) unsafe extern "C" fn on_display_event(env: RkEnv, data: RkPtr, size: RkU32) {
    if env.is_null() {
        return;
    }
    // SAFETY: The session keeps the DisplaySync alive until the listener is
    // deregistered, and only shared references are created from it.
    let sync = &*(env as *const DisplaySync);

    match ffi::read_display_info(data, size) {
        Ok(info) => sync.handle_event(&info),
        Err(err) => sync.drop_malformed(&err),
    }
}
