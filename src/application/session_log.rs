use crate::application::task_store::NowProvider;
use crate::domain::models::TimerSession;
use crate::domain::session_history::{SessionHistory, SessionStats};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::local_cache::{
    load_cached_sessions, save_cached_sessions, timer_sessions_key, LocalCache,
};
use chrono::{NaiveDate, TimeZone, Utc};
use std::sync::Arc;

/// Session history of one user, persisted under `timer_sessions_{uid}`.
pub struct SessionHistoryLog {
    uid: String,
    cache: Arc<dyn LocalCache>,
    now_provider: NowProvider,
    history: SessionHistory,
}

impl SessionHistoryLog {
    pub fn new(uid: impl Into<String>, cache: Arc<dyn LocalCache>) -> Self {
        Self {
            uid: uid.into(),
            cache,
            now_provider: Arc::new(Utc::now),
            history: SessionHistory::default(),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    /// Restores the persisted history. An unreadable snapshot starts empty.
    pub fn load(&mut self) -> usize {
        let sessions = match load_cached_sessions(self.cache.as_ref(), &self.uid) {
            Ok(sessions) => sessions,
            Err(error) => {
                tracing::warn!(uid = %self.uid, %error, "ignoring unreadable session history");
                Vec::new()
            }
        };
        self.history = SessionHistory::from_sessions(sessions);
        self.history.len()
    }

    pub fn append(&mut self, session: TimerSession) -> Result<(), InfraError> {
        session.validate().map_err(InfraError::Validation)?;
        self.history.append(session);
        save_cached_sessions(
            self.cache.as_ref(),
            &self.uid,
            self.history.all(),
            (self.now_provider)(),
        )
    }

    pub fn all(&self) -> &[TimerSession] {
        self.history.all()
    }

    pub fn recent(&self, limit: usize) -> &[TimerSession] {
        self.history.recent(limit)
    }

    pub fn today_stats<Tz: TimeZone>(&self, today: NaiveDate, timezone: &Tz) -> SessionStats {
        self.history.today_stats(today, timezone)
    }

    pub fn clear(&mut self) -> Result<usize, InfraError> {
        let cleared = self.history.len();
        self.history.clear();
        self.cache.remove(&timer_sessions_key(&self.uid))?;
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session_history::SESSION_HISTORY_CAPACITY;
    use crate::infrastructure::local_cache::InMemoryLocalCache;
    use chrono::{DateTime, Duration};

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn session(index: usize) -> TimerSession {
        TimerSession {
            id: format!("session-{index}"),
            task_id: Some("task-1".to_string()),
            task_title: "Calculus".to_string(),
            duration: 25,
            completed_at: fixed_time("2026-02-18T08:00:00Z") + Duration::minutes(index as i64),
            completed: true,
        }
    }

    #[test]
    fn history_survives_a_reload() {
        let cache = Arc::new(InMemoryLocalCache::default());
        let mut log = SessionHistoryLog::new("uid-1", cache.clone());
        for index in 0..(SESSION_HISTORY_CAPACITY + 3) {
            log.append(session(index)).expect("append");
        }

        let mut reloaded = SessionHistoryLog::new("uid-1", cache.clone());
        assert_eq!(reloaded.load(), SESSION_HISTORY_CAPACITY);
        assert_eq!(reloaded.all(), log.all());
        assert_eq!(reloaded.recent(1)[0].id, format!("session-{}", SESSION_HISTORY_CAPACITY + 2));

        let mut other_user = SessionHistoryLog::new("uid-2", cache);
        assert_eq!(other_user.load(), 0);
    }

    #[test]
    fn clear_removes_persisted_history() {
        let cache = Arc::new(InMemoryLocalCache::default());
        let mut log = SessionHistoryLog::new("uid-1", cache.clone());
        log.append(session(0)).expect("append");

        assert_eq!(log.clear().expect("clear"), 1);
        assert_eq!(cache.read(&timer_sessions_key("uid-1")).expect("read"), None);
    }

    #[test]
    fn corrupt_snapshot_loads_empty() {
        let cache = Arc::new(InMemoryLocalCache::default());
        cache
            .write(&timer_sessions_key("uid-1"), "not json", Utc::now())
            .expect("write");
        let mut log = SessionHistoryLog::new("uid-1", cache);
        assert_eq!(log.load(), 0);
    }

    #[test]
    fn append_rejects_sessions_without_title() {
        let mut log = SessionHistoryLog::new("uid-1", Arc::new(InMemoryLocalCache::default()));
        let mut invalid = session(0);
        invalid.task_title = " ".to_string();
        assert!(matches!(log.append(invalid), Err(InfraError::Validation(_))));
        assert!(log.all().is_empty());
    }
}
