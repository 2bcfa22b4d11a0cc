//! Self-rearming refresh timer driven by the forecast slot.
//!
//! The scheduler is an explicit state machine:
//!
//! ```text
//! Idle --start--> Armed --boundary--> Firing --> Armed
//!   ^               |                   |
//!   +-----stop------+-------------------+
//! ```
//!
//! `stop` is idempotent and `start` on a running scheduler replaces the
//! pending timer, so at most one timer exists per instance.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::clock::{
    current_forecast_slot, has_slot_changed, next_slot_boundary, Clock, ForecastSlot,
    ProviderClock,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Armed,
    Firing,
}

#[derive(Debug)]
struct Shared {
    state: SchedulerState,
    last_slot: Option<ForecastSlot>,
}

impl Shared {
    fn idle() -> Self {
        Self {
            state: SchedulerState::Idle,
            last_slot: None,
        }
    }
}

pub struct RefreshScheduler {
    clock: Arc<dyn Clock>,
    shared: Arc<Mutex<Shared>>,
    cancel: Option<CancellationToken>,
}

impl RefreshScheduler {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(ProviderClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            shared: Arc::new(Mutex::new(Shared::idle())),
            cancel: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.shared.lock().state
    }

    pub fn last_slot(&self) -> Option<ForecastSlot> {
        self.shared.lock().last_slot
    }

    /// Arm the timer. `on_slot_changed` runs on the runtime each time the
    /// slot differs from the last one observed.
    ///
    /// The callback runs while the scheduler state is locked and must not
    /// call back into this scheduler. Once [`Self::stop`] returns it is
    /// never invoked again.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F>(&mut self, on_slot_changed: F)
    where
        F: FnMut(ForecastSlot) + Send + 'static,
    {
        self.stop();

        let slot = current_forecast_slot(self.clock.now());
        let shared = Arc::new(Mutex::new(Shared {
            state: SchedulerState::Armed,
            last_slot: Some(slot),
        }));
        let token = CancellationToken::new();

        self.shared = Arc::clone(&shared);
        self.cancel = Some(token.clone());

        tracing::debug!("Refresh scheduler armed at slot {}", slot);
        tokio::spawn(run(Arc::clone(&self.clock), shared, token, on_slot_changed));
    }

    /// Cancel the pending timer. Requests already started by a callback
    /// are not affected.
    pub fn stop(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
            tracing::debug!("Refresh scheduler stopped");
        }
        self.shared.lock().state = SchedulerState::Idle;
    }
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run<F>(
    clock: Arc<dyn Clock>,
    shared: Arc<Mutex<Shared>>,
    token: CancellationToken,
    mut on_slot_changed: F,
) where
    F: FnMut(ForecastSlot) + Send + 'static,
{
    loop {
        let boundary = next_slot_boundary(clock.now());
        tracing::debug!(
            "Next slot {} at {} ({} ms)",
            boundary.slot,
            boundary.valid_at(),
            boundary.millis_until()
        );

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(boundary.until) => {}
        }

        if !fire(clock.as_ref(), &shared, &token, &mut on_slot_changed) {
            break;
        }
    }
}

/// One Armed -> Firing -> Armed transition. Returns false once cancelled.
fn fire<F>(
    clock: &dyn Clock,
    shared: &Mutex<Shared>,
    token: &CancellationToken,
    on_slot_changed: &mut F,
) -> bool
where
    F: FnMut(ForecastSlot),
{
    let mut shared = shared.lock();
    if token.is_cancelled() {
        return false;
    }
    shared.state = SchedulerState::Firing;

    let now = clock.now();
    if has_slot_changed(shared.last_slot, now) {
        let slot = current_forecast_slot(now);
        tracing::info!("Forecast slot changed to {}", slot);
        shared.last_slot = Some(slot);
        on_slot_changed(slot);
    }

    shared.state = SchedulerState::Armed;
    true
}
