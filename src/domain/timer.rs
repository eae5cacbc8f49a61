use crate::domain::models::Task;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TIMER_MINUTES: u32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimerError {
    #[error("timer must be idle to change its duration")]
    NotIdle,
    #[error("timer is already running")]
    AlreadyRunning,
    #[error("timer is not running")]
    NotRunning,
    #[error("timer is not active")]
    NotActive,
    #[error("select a task first or use a custom session")]
    TaskRequired,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "minutes")]
pub enum TimerPreset {
    Minutes(i64),
    Custom(i64),
}

impl TimerPreset {
    /// Non-positive minute counts, and counts whose length in seconds does
    /// not fit a `u32`, fall back to the default session length.
    pub fn minutes(self) -> u32 {
        let raw = match self {
            Self::Minutes(minutes) | Self::Custom(minutes) => minutes,
        };
        u32::try_from(raw)
            .ok()
            .filter(|minutes| *minutes > 0 && minutes.checked_mul(60).is_some())
            .unwrap_or(DEFAULT_TIMER_MINUTES)
    }

    pub fn seconds(self) -> u32 {
        self.minutes() * 60
    }

    pub fn is_custom(self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl Default for TimerPreset {
    fn default() -> Self {
        Self::Minutes(i64::from(DEFAULT_TIMER_MINUTES))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    Idle,
    Running,
    Paused,
}

impl TimerPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
        }
    }
}

/// Snapshot of the task a session is bound to. The task itself stays owned
/// by the task store and may be edited or deleted meanwhile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BoundTask {
    pub id: String,
    pub title: String,
}

impl BoundTask {
    pub fn from_task(task: &Task) -> Option<Self> {
        task.id.as_ref().map(|id| Self {
            id: id.clone(),
            title: task.title.clone(),
        })
    }
}

/// Emitted by [`TimerEngine::tick`] when the countdown reaches zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedSession {
    pub task: Option<BoundTask>,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Inactive,
    Running { time_left: u32 },
    Completed(CompletedSession),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub phase: TimerPhase,
    pub is_running: bool,
    pub time_left: u32,
    pub total_time: u32,
    pub display: String,
    pub progress_percent: u32,
    pub preset: TimerPreset,
    pub current_task: Option<BoundTask>,
}

#[derive(Debug, Clone)]
pub struct TimerEngine {
    phase: TimerPhase,
    preset: TimerPreset,
    time_left: u32,
    total_time: u32,
    current_task: Option<BoundTask>,
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new(TimerPreset::default())
    }
}

impl TimerEngine {
    pub fn new(preset: TimerPreset) -> Self {
        let seconds = preset.seconds();
        Self {
            phase: TimerPhase::Idle,
            preset,
            time_left: seconds,
            total_time: seconds,
            current_task: None,
        }
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn preset(&self) -> TimerPreset {
        self.preset
    }

    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    pub fn total_time(&self) -> u32 {
        self.total_time
    }

    pub fn current_task(&self) -> Option<&BoundTask> {
        self.current_task.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.phase == TimerPhase::Running
    }

    pub fn configure(&mut self, preset: TimerPreset) -> Result<(), TimerError> {
        if self.phase != TimerPhase::Idle {
            return Err(TimerError::NotIdle);
        }
        self.preset = preset;
        self.total_time = preset.seconds();
        self.time_left = self.total_time;
        Ok(())
    }

    /// Starts from idle (binding `task`) or resumes a paused session, in which
    /// case `task` is ignored and the frozen time is kept.
    pub fn start(&mut self, task: Option<BoundTask>) -> Result<(), TimerError> {
        if self.phase == TimerPhase::Idle && task.is_none() && !self.preset.is_custom() {
            return Err(TimerError::TaskRequired);
        }
        self.begin(task)
    }

    /// Like [`start`](Self::start), but runs unbound on any preset. Used when
    /// the selected task can no longer be found.
    pub fn start_untracked(&mut self) -> Result<(), TimerError> {
        self.begin(None)
    }

    fn begin(&mut self, task: Option<BoundTask>) -> Result<(), TimerError> {
        match self.phase {
            TimerPhase::Running => Err(TimerError::AlreadyRunning),
            TimerPhase::Paused => {
                self.phase = TimerPhase::Running;
                Ok(())
            }
            TimerPhase::Idle => {
                if self.time_left == 0 {
                    self.time_left = self.total_time;
                }
                self.current_task = task;
                self.phase = TimerPhase::Running;
                Ok(())
            }
        }
    }

    pub fn pause(&mut self) -> Result<(), TimerError> {
        if self.phase != TimerPhase::Running {
            return Err(TimerError::NotRunning);
        }
        self.phase = TimerPhase::Paused;
        Ok(())
    }

    /// Halts the countdown without recording anything. The remaining time is
    /// left as is; only [`reset`](Self::reset) restores the preset.
    pub fn stop(&mut self) -> Result<(), TimerError> {
        if self.phase == TimerPhase::Idle {
            return Err(TimerError::NotActive);
        }
        self.phase = TimerPhase::Idle;
        self.current_task = None;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.phase = TimerPhase::Idle;
        self.current_task = None;
        self.total_time = self.preset.seconds();
        self.time_left = self.total_time;
    }

    /// Advances the countdown by one second.
    pub fn tick(&mut self) -> TickOutcome {
        if self.phase != TimerPhase::Running {
            return TickOutcome::Inactive;
        }
        self.time_left = self.time_left.saturating_sub(1);
        if self.time_left > 0 {
            return TickOutcome::Running {
                time_left: self.time_left,
            };
        }

        let completed = CompletedSession {
            task: self.current_task.take(),
            duration_minutes: self.elapsed_minutes(),
        };
        self.reset();
        TickOutcome::Completed(completed)
    }

    pub fn elapsed_seconds(&self) -> u32 {
        self.total_time.saturating_sub(self.time_left)
    }

    /// Elapsed time rounded half-up to whole minutes.
    pub fn elapsed_minutes(&self) -> u32 {
        (self.elapsed_seconds() + 30) / 60
    }

    pub fn progress_percent(&self) -> u32 {
        if self.total_time == 0 {
            return 0;
        }
        let elapsed = u64::from(self.elapsed_seconds()) * 100;
        let percent = (elapsed + u64::from(self.total_time) / 2) / u64::from(self.total_time);
        u32::try_from(percent).unwrap_or(100).min(100)
    }

    pub fn display(&self) -> String {
        format!("{:02}:{:02}", self.time_left / 60, self.time_left % 60)
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            phase: self.phase,
            is_running: self.is_running(),
            time_left: self.time_left,
            total_time: self.total_time,
            display: self.display(),
            progress_percent: self.progress_percent(),
            preset: self.preset,
            current_task: self.current_task.clone(),
        }
    }
}
