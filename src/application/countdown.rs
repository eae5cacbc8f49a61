use crate::application::commands::{start_timer_impl, tick_timer_impl, AppState};
use crate::domain::timer::TimerSnapshot;
use crate::infrastructure::error::InfraError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Owns the single background task that ticks the timer once per period.
#[derive(Debug)]
pub struct CountdownHandle {
    period: Duration,
    generation: AtomicU64,
    slot: Mutex<Option<(u64, JoinHandle<()>)>>,
}

impl CountdownHandle {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            generation: AtomicU64::new(0),
            slot: Mutex::new(None),
        }
    }

    /// Spawns a driver for `state`, aborting any previous one. Must be called
    /// from within a tokio runtime.
    pub fn start(&self, state: Arc<AppState>) -> Result<(), InfraError> {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let period = self.period;
        let handle = tokio::spawn(drive(state, generation, period));

        let mut slot = self
            .slot
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("countdown lock poisoned: {error}")))?;
        if let Some((_, previous)) = slot.replace((generation, handle)) {
            previous.abort();
        }
        Ok(())
    }

    /// Aborts the running driver, if any. Returns whether one was running.
    pub fn cancel(&self) -> bool {
        let taken = match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(error) => {
                tracing::warn!(%error, "countdown lock poisoned");
                return false;
            }
        };
        match taken {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.slot
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|(_, handle)| !handle.is_finished()))
            .unwrap_or(false)
    }

    // Clears the slot if it still belongs to the driver that is exiting.
    fn release(&self, generation: u64) {
        if let Ok(mut slot) = self.slot.lock() {
            if slot.as_ref().is_some_and(|(owner, _)| *owner == generation) {
                slot.take();
            }
        }
    }
}

async fn drive(state: Arc<AppState>, generation: u64, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of a tokio interval fires immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match tick_timer_impl(&state).await {
            Ok(response) if response.timer.is_running => continue,
            Ok(_) => break,
            Err(error) => {
                state.command_error("countdown", &error);
                break;
            }
        }
    }
    state.countdown().release(generation);
}

/// Starts (or resumes) the timer and hands it to the background countdown.
pub async fn start_countdown(
    state: &Arc<AppState>,
    task_id: Option<String>,
) -> Result<TimerSnapshot, InfraError> {
    let snapshot = start_timer_impl(state, task_id).await?;
    state.countdown().start(Arc::clone(state))?;
    Ok(snapshot)
}
