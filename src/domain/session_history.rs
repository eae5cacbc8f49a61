use crate::domain::models::TimerSession;
use chrono::{NaiveDate, TimeZone};
use serde::Serialize;

pub const SESSION_HISTORY_CAPACITY: usize = 50;
pub const RECENT_SESSIONS_DEFAULT: usize = 10;

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total_minutes: u32,
    pub session_count: usize,
    pub completed_count: usize,
}

/// Most-recent-first list of timer sessions, capped at
/// [`SESSION_HISTORY_CAPACITY`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionHistory {
    sessions: Vec<TimerSession>,
}

impl SessionHistory {
    pub fn from_sessions(mut sessions: Vec<TimerSession>) -> Self {
        sessions.truncate(SESSION_HISTORY_CAPACITY);
        Self { sessions }
    }

    pub fn append(&mut self, session: TimerSession) {
        self.sessions.insert(0, session);
        self.sessions.truncate(SESSION_HISTORY_CAPACITY);
    }

    pub fn all(&self) -> &[TimerSession] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    pub fn recent(&self, limit: usize) -> &[TimerSession] {
        let end = limit.min(self.sessions.len());
        &self.sessions[..end]
    }

    /// Totals over sessions that ended on `today` in the given timezone.
    pub fn today_stats<Tz: TimeZone>(&self, today: NaiveDate, timezone: &Tz) -> SessionStats {
        self.sessions
            .iter()
            .filter(|session| session.completed_at.with_timezone(timezone).date_naive() == today)
            .fold(SessionStats::default(), |mut stats, session| {
                stats.total_minutes = stats.total_minutes.saturating_add(session.duration);
                stats.session_count += 1;
                stats.completed_count += usize::from(session.completed);
                stats
            })
    }
}
