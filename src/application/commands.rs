use crate::application::bootstrap::bootstrap_workspace;
use crate::application::countdown::CountdownHandle;
use crate::application::session_log::SessionHistoryLog;
use crate::application::task_store::{LoadSource, NowProvider, SyncReport, TaskStore};
use crate::domain::day_index::DayIndex;
use crate::domain::models::{Task, TaskDraft, TaskPatch, TimerSession, UserIdentity, CUSTOM_SESSION_TITLE};
use crate::domain::projector::{
    completion_rate, day_progress, group_by_type, performance_metrics, time_spent_by_type,
    timer_candidates, today_tasks, type_distribution, weekly_summary, DayProgress,
    PerformanceMetrics, TypeGroups, TypeTotals, WeeklySummary,
};
use crate::domain::session_history::{SessionStats, RECENT_SESSIONS_DEFAULT};
use crate::domain::timer::{BoundTask, TickOutcome, TimerEngine, TimerPhase, TimerPreset, TimerSnapshot};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::local_cache::{LocalCache, SqliteLocalCache};
use crate::infrastructure::notifier::{
    NotificationSink, TracingNotificationSink, SESSION_FINISHED_BODY, SESSION_FINISHED_TITLE,
};
use crate::infrastructure::task_remote::{FirestoreTaskRemote, InMemoryTaskRemote, TaskRemote};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

const COUNTDOWN_PERIOD: Duration = Duration::from_secs(1);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str, now: DateTime<Utc>) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", now.timestamp_micros())
}

/// Everything that belongs to the signed-in user. Dropped on sign-out.
struct UserSession {
    identity: UserIdentity,
    tasks: TaskStore,
    history: SessionHistoryLog,
    timer: TimerEngine,
}

pub struct AppState {
    workspace_root: PathBuf,
    config: AppConfig,
    remote: Arc<dyn TaskRemote>,
    cache: Arc<dyn LocalCache>,
    notifier: Arc<dyn NotificationSink>,
    now_provider: NowProvider,
    countdown: CountdownHandle,
    session: Mutex<Option<UserSession>>,
}

impl AppState {
    pub fn new(
        workspace_root: PathBuf,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root, lookup)?;
        let remote: Arc<dyn TaskRemote> = if bootstrap.config.backend.project_id.is_empty() {
            tracing::warn!("backend.projectId is not configured; tasks stay on this device");
            Arc::new(InMemoryTaskRemote::default())
        } else {
            Arc::new(FirestoreTaskRemote::new(bootstrap.config.backend.clone()))
        };
        let cache = Arc::new(SqliteLocalCache::new(&bootstrap.database_path));

        Ok(Self::with_backends(bootstrap.config, remote, cache, Arc::new(TracingNotificationSink))
            .with_workspace_root(bootstrap.workspace_root))
    }

    pub fn with_backends(
        config: AppConfig,
        remote: Arc<dyn TaskRemote>,
        cache: Arc<dyn LocalCache>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            workspace_root: PathBuf::new(),
            config,
            remote,
            cache,
            notifier,
            now_provider: Arc::new(Utc::now),
            countdown: CountdownHandle::new(COUNTDOWN_PERIOD),
            session: Mutex::new(None),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn with_countdown_period(mut self, period: Duration) -> Self {
        self.countdown = CountdownHandle::new(period);
        self
    }

    fn with_workspace_root(mut self, workspace_root: PathBuf) -> Self {
        self.workspace_root = workspace_root;
        self
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn countdown(&self) -> &CountdownHandle {
        &self.countdown
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.now_provider)()
    }

    /// Local calendar date in the configured timezone.
    pub fn today(&self) -> NaiveDate {
        self.now().with_timezone(&self.config.timezone).date_naive()
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        tracing::error!(command, %error, "command failed");
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        tracing::info!(command, "{message}");
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserSummary {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub label: String,
}

impl From<&UserIdentity> for UserSummary {
    fn from(identity: &UserIdentity) -> Self {
        Self {
            uid: identity.uid.clone(),
            email: identity.email.clone(),
            display_name: identity.display_name.clone(),
            label: identity.label(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SignInResponse {
    pub user: UserSummary,
    pub source: LoadSource,
    pub task_count: usize,
    pub pending_sync: usize,
    pub session_count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TodayViewResponse {
    pub date: String,
    pub day: DayIndex,
    pub day_name: &'static str,
    pub progress: DayProgress,
    pub tasks: TypeGroups,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatsViewResponse {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub completion_rate: u32,
    pub type_distribution: TypeTotals,
    pub time_spent_by_type: TypeTotals,
    pub metrics: PerformanceMetrics,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TickResponse {
    pub timer: TimerSnapshot,
    pub completed_session: Option<TimerSession>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub tasks: Vec<Task>,
    pub timer_sessions: Vec<TimerSession>,
    pub export_date: DateTime<Utc>,
    pub user_email: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ResetAllResponse {
    pub tasks_cleared: usize,
    pub sessions_cleared: usize,
}

async fn lock_session(state: &AppState) -> MutexGuard<'_, Option<UserSession>> {
    state.session.lock().await
}

fn signed_in(guard: &mut Option<UserSession>) -> Result<&mut UserSession, InfraError> {
    guard.as_mut().ok_or(InfraError::NotSignedIn)
}

fn normalized_task_id(task_id: &str) -> Result<&str, InfraError> {
    let task_id = task_id.trim();
    if task_id.is_empty() {
        return Err(InfraError::Validation("task_id must not be empty".to_string()));
    }
    Ok(task_id)
}

pub async fn sign_in_impl(state: &AppState, identity: UserIdentity) -> Result<SignInResponse, InfraError> {
    identity.validate().map_err(InfraError::Validation)?;
    // A driver mid-tick finishes settling its session before it is cancelled.
    let mut guard = lock_session(state).await;
    state.countdown.cancel();

    let mut tasks = TaskStore::new(identity.clone(), state.remote.clone(), state.cache.clone())
        .with_now_provider(state.now_provider.clone());
    let source = tasks.load().await?;

    let mut history = SessionHistoryLog::new(identity.uid.clone(), state.cache.clone())
        .with_now_provider(state.now_provider.clone());
    let session_count = history.load();

    let timer = TimerEngine::new(TimerPreset::Minutes(i64::from(
        state.config.default_timer_minutes,
    )));
    let response = SignInResponse {
        user: UserSummary::from(&identity),
        source,
        task_count: tasks.tasks().len(),
        pending_sync: tasks.pending_count(),
        session_count,
    };

    *guard = Some(UserSession {
        identity,
        tasks,
        history,
        timer,
    });
    drop(guard);

    state.log_info(
        "sign_in",
        &format!(
            "signed in uid={} tasks={} source={:?}",
            response.user.uid, response.task_count, response.source
        ),
    );
    Ok(response)
}

/// Drops the signed-in session. The local cache is kept for the next sign-in.
pub async fn sign_out_impl(state: &AppState) -> Result<bool, InfraError> {
    let mut guard = lock_session(state).await;
    state.countdown.cancel();
    let previous = guard.take();
    drop(guard);
    if let Some(session) = previous.as_ref() {
        state.log_info("sign_out", &format!("signed out uid={}", session.identity.uid));
    }
    Ok(previous.is_some())
}

pub async fn current_user_impl(state: &AppState) -> Result<Option<UserSummary>, InfraError> {
    let guard = lock_session(state).await;
    Ok(guard.as_ref().map(|session| UserSummary::from(&session.identity)))
}

pub async fn list_tasks_impl(state: &AppState) -> Result<Vec<Task>, InfraError> {
    let mut guard = lock_session(state).await;
    let session = signed_in(&mut guard)?;
    Ok(session.tasks.tasks().to_vec())
}

pub async fn create_task_impl(state: &AppState, draft: TaskDraft) -> Result<Task, InfraError> {
    let mut guard = lock_session(state).await;
    let session = signed_in(&mut guard)?;
    let task = session.tasks.create(draft).await?;
    state.log_info(
        "create_task",
        &format!("created task_id={}", task.id.as_deref().unwrap_or("pending")),
    );
    Ok(task)
}

pub async fn update_task_impl(
    state: &AppState,
    task_id: String,
    patch: TaskPatch,
) -> Result<Option<Task>, InfraError> {
    let task_id = normalized_task_id(&task_id)?;
    let mut guard = lock_session(state).await;
    let session = signed_in(&mut guard)?;
    let updated = session.tasks.update(task_id, &patch).await?;
    if updated.is_some() {
        state.log_info("update_task", &format!("updated task_id={task_id}"));
    }
    Ok(updated)
}

pub async fn delete_task_impl(state: &AppState, task_id: String) -> Result<bool, InfraError> {
    let task_id = normalized_task_id(&task_id)?;
    let mut guard = lock_session(state).await;
    let session = signed_in(&mut guard)?;
    let deleted = session.tasks.delete(task_id).await?;
    if deleted {
        state.log_info("delete_task", &format!("deleted task_id={task_id}"));
    }
    Ok(deleted)
}

pub async fn toggle_task_impl(state: &AppState, task_id: String) -> Result<Option<Task>, InfraError> {
    let task_id = normalized_task_id(&task_id)?;
    let mut guard = lock_session(state).await;
    let session = signed_in(&mut guard)?;
    let toggled = session.tasks.toggle_completion(task_id).await?;
    if let Some(task) = toggled.as_ref() {
        state.log_info(
            "toggle_task",
            &format!("task_id={task_id} completed={}", task.completed),
        );
    }
    Ok(toggled)
}

pub async fn sync_pending_impl(state: &AppState) -> Result<SyncReport, InfraError> {
    let mut guard = lock_session(state).await;
    let session = signed_in(&mut guard)?;
    let report = session.tasks.sync_pending().await?;
    state.log_info(
        "sync_pending",
        &format!(
            "created={} updated={} still_pending={}",
            report.created, report.updated, report.still_pending
        ),
    );
    Ok(report)
}

pub async fn today_view_impl(state: &AppState) -> Result<TodayViewResponse, InfraError> {
    let mut guard = lock_session(state).await;
    let session = signed_in(&mut guard)?;
    let today = state.today();
    let day = DayIndex::for_date(today);
    let tasks = today_tasks(session.tasks.tasks(), today);

    Ok(TodayViewResponse {
        date: today.to_string(),
        day,
        day_name: day.name(),
        progress: day_progress(&tasks, day),
        tasks: group_by_type(&tasks),
    })
}

pub async fn weekly_view_impl(state: &AppState) -> Result<WeeklySummary, InfraError> {
    let mut guard = lock_session(state).await;
    let session = signed_in(&mut guard)?;
    Ok(weekly_summary(session.tasks.tasks(), state.today()))
}

pub async fn stats_view_impl(state: &AppState) -> Result<StatsViewResponse, InfraError> {
    let mut guard = lock_session(state).await;
    let session = signed_in(&mut guard)?;
    let tasks = session.tasks.tasks();

    Ok(StatsViewResponse {
        total_tasks: tasks.len(),
        completed_tasks: tasks.iter().filter(|task| task.completed).count(),
        completion_rate: completion_rate(tasks),
        type_distribution: type_distribution(tasks),
        time_spent_by_type: time_spent_by_type(tasks),
        metrics: performance_metrics(tasks, state.today()),
    })
}

pub async fn configure_timer_impl(
    state: &AppState,
    preset: TimerPreset,
) -> Result<TimerSnapshot, InfraError> {
    let mut guard = lock_session(state).await;
    let session = signed_in(&mut guard)?;
    if let TimerPreset::Minutes(minutes) = preset {
        let configured = u32::try_from(minutes)
            .is_ok_and(|minutes| state.config.timer_presets.contains(&minutes));
        if !configured {
            return Err(InfraError::Validation(format!(
                "{minutes} minutes is not a configured preset; use a custom session"
            )));
        }
    }
    session.timer.configure(preset)?;
    state.log_info(
        "configure_timer",
        &format!("minutes={} custom={}", preset.minutes(), preset.is_custom()),
    );
    Ok(session.timer.snapshot())
}

/// Starts a fresh session bound to `task_id`, or resumes a paused one. The
/// countdown itself is driven by [`CountdownHandle`].
pub async fn start_timer_impl(
    state: &AppState,
    task_id: Option<String>,
) -> Result<TimerSnapshot, InfraError> {
    let mut guard = lock_session(state).await;
    let session = signed_in(&mut guard)?;

    // The selection only matters for a fresh session; a paused one keeps its task.
    let selected = task_id.as_deref().map(str::trim).filter(|id| !id.is_empty());
    match selected {
        Some(task_id) if session.timer.phase() == TimerPhase::Idle => {
            match session.tasks.get(task_id).and_then(BoundTask::from_task) {
                Some(bound) => session.timer.start(Some(bound))?,
                None => {
                    tracing::warn!(task_id = %task_id, "selected task not found; starting untracked session");
                    session.timer.start_untracked()?;
                }
            }
        }
        _ => session.timer.start(None)?,
    }
    state.log_info(
        "start_timer",
        &format!(
            "task_id={} time_left={}",
            session
                .timer
                .current_task()
                .map(|task| task.id.as_str())
                .unwrap_or("untracked"),
            session.timer.time_left()
        ),
    );
    Ok(session.timer.snapshot())
}

pub async fn pause_timer_impl(state: &AppState) -> Result<TimerSnapshot, InfraError> {
    let mut guard = lock_session(state).await;
    let session = signed_in(&mut guard)?;
    session.timer.pause()?;
    state.countdown.cancel();
    state.log_info("pause_timer", &format!("time_left={}", session.timer.time_left()));
    Ok(session.timer.snapshot())
}

/// Abandons the running session. Nothing is recorded in the history.
pub async fn stop_timer_impl(state: &AppState) -> Result<TimerSnapshot, InfraError> {
    let mut guard = lock_session(state).await;
    let session = signed_in(&mut guard)?;
    session.timer.stop()?;
    state.countdown.cancel();
    state.log_info("stop_timer", "stopped timer");
    Ok(session.timer.snapshot())
}

pub async fn reset_timer_impl(state: &AppState) -> Result<TimerSnapshot, InfraError> {
    let mut guard = lock_session(state).await;
    let session = signed_in(&mut guard)?;
    state.countdown.cancel();
    session.timer.reset();
    state.log_info("reset_timer", "reset timer");
    Ok(session.timer.snapshot())
}

/// Advances the timer by one second and settles a finished session: marks the
/// bound task completed, records the session and notifies the user.
pub async fn tick_timer_impl(state: &AppState) -> Result<TickResponse, InfraError> {
    let mut guard = lock_session(state).await;
    let session = signed_in(&mut guard)?;

    let completed = match session.timer.tick() {
        TickOutcome::Completed(completed) => completed,
        TickOutcome::Inactive | TickOutcome::Running { .. } => {
            return Ok(TickResponse {
                timer: session.timer.snapshot(),
                completed_session: None,
            });
        }
    };

    let now = state.now();
    if let Some(task) = completed.task.as_ref() {
        if let Err(error) = session.tasks.set_completed(&task.id, true).await {
            tracing::warn!(task_id = %task.id, %error, "completion flag not yet synced");
        }
    }

    let record = TimerSession {
        id: next_id("session", now),
        task_id: completed.task.as_ref().map(|task| task.id.clone()),
        task_title: completed
            .task
            .as_ref()
            .map(|task| task.title.clone())
            .unwrap_or_else(|| CUSTOM_SESSION_TITLE.to_string()),
        duration: completed.duration_minutes,
        completed_at: now,
        completed: true,
    };
    if let Err(error) = session.history.append(record.clone()) {
        tracing::warn!(session_id = %record.id, %error, "failed to persist session history");
    }

    state.notifier.notify(SESSION_FINISHED_TITLE, SESSION_FINISHED_BODY);
    state.notifier.play_completion_cue();
    state.log_info(
        "tick_timer",
        &format!(
            "session finished id={} minutes={}",
            record.id, record.duration
        ),
    );

    Ok(TickResponse {
        timer: session.timer.snapshot(),
        completed_session: Some(record),
    })
}

pub async fn get_timer_state_impl(state: &AppState) -> Result<TimerSnapshot, InfraError> {
    let mut guard = lock_session(state).await;
    let session = signed_in(&mut guard)?;
    Ok(session.timer.snapshot())
}

pub async fn timer_stats_impl(state: &AppState) -> Result<SessionStats, InfraError> {
    let mut guard = lock_session(state).await;
    let session = signed_in(&mut guard)?;
    Ok(session
        .history
        .today_stats(state.today(), &state.config.timezone))
}

pub async fn timer_history_impl(
    state: &AppState,
    limit: Option<usize>,
) -> Result<Vec<TimerSession>, InfraError> {
    let mut guard = lock_session(state).await;
    let session = signed_in(&mut guard)?;
    Ok(session
        .history
        .recent(limit.unwrap_or(RECENT_SESSIONS_DEFAULT))
        .to_vec())
}

pub async fn timer_candidates_impl(state: &AppState) -> Result<Vec<Task>, InfraError> {
    let mut guard = lock_session(state).await;
    let session = signed_in(&mut guard)?;
    Ok(timer_candidates(session.tasks.tasks(), state.today()))
}

/// Configures the default-length preset and starts it on the first task still
/// open today.
pub async fn start_quick_timer_impl(state: &AppState) -> Result<TimerSnapshot, InfraError> {
    let mut guard = lock_session(state).await;
    let session = signed_in(&mut guard)?;

    let candidate = timer_candidates(session.tasks.tasks(), state.today())
        .iter()
        .find_map(BoundTask::from_task)
        .ok_or_else(|| InfraError::Validation("no open task for today".to_string()))?;

    session.timer.configure(TimerPreset::default())?;
    session.timer.start(Some(candidate))?;
    state.log_info("start_quick_timer", "started quick session");
    Ok(session.timer.snapshot())
}

pub async fn export_data_impl(state: &AppState) -> Result<ExportData, InfraError> {
    let mut guard = lock_session(state).await;
    let session = signed_in(&mut guard)?;
    let export = ExportData {
        tasks: session.tasks.tasks().to_vec(),
        timer_sessions: session.history.all().to_vec(),
        export_date: state.now(),
        user_email: session.identity.email.clone(),
    };
    state.log_info(
        "export_data",
        &format!(
            "tasks={} sessions={}",
            export.tasks.len(),
            export.timer_sessions.len()
        ),
    );
    Ok(export)
}

/// Clears the device-local tasks and history of the signed-in user and resets
/// the timer. Remote documents are not deleted.
pub async fn reset_all_data_impl(state: &AppState) -> Result<ResetAllResponse, InfraError> {
    let mut guard = lock_session(state).await;
    let session = signed_in(&mut guard)?;
    state.countdown.cancel();
    session.timer.reset();

    let response = ResetAllResponse {
        tasks_cleared: session.tasks.clear_local()?,
        sessions_cleared: session.history.clear()?,
    };
    state.log_info(
        "reset_all_data",
        &format!(
            "tasks_cleared={} sessions_cleared={}",
            response.tasks_cleared, response.sessions_cleared
        ),
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Priority, TaskType};
    use crate::domain::timer::{TimerError, TimerPhase};
    use crate::infrastructure::local_cache::InMemoryLocalCache;
    use crate::infrastructure::notifier::{Notification, RecordingNotificationSink};
    use std::fs;
    use std::sync::atomic::AtomicUsize;

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    // 2026-02-18 is a Wednesday, day index 4.
    const NOW: &str = "2026-02-18T08:00:00Z";

    struct TempWorkspace {
        path: PathBuf,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "weekly-planner-command-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            Self { path }
        }

        fn app_state(&self) -> AppState {
            AppState::new(self.path.clone(), |_| None)
                .expect("initialize app state")
                .with_now_provider(Arc::new(|| fixed_time(NOW)))
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn identity() -> UserIdentity {
        UserIdentity {
            uid: "uid-1".to_string(),
            email: Some("student@example.com".to_string()),
            display_name: Some("Sam".to_string()),
            id_token: "token".to_string(),
        }
    }

    fn draft(title: &str, day: u8) -> TaskDraft {
        TaskDraft {
            title: title.to_string(),
            description: None,
            task_type: TaskType::Study,
            day: DayIndex::new(day).expect("valid day"),
            duration: 25,
            priority: Priority::High,
        }
    }

    fn in_memory_state(notifier: Arc<RecordingNotificationSink>) -> AppState {
        AppState::with_backends(
            AppConfig::default(),
            Arc::new(InMemoryTaskRemote::default()),
            Arc::new(InMemoryLocalCache::default()),
            notifier,
        )
        .with_now_provider(Arc::new(|| fixed_time(NOW)))
    }

    #[tokio::test]
    async fn commands_require_sign_in() {
        let state = in_memory_state(Arc::new(RecordingNotificationSink::default()));
        assert!(matches!(list_tasks_impl(&state).await, Err(InfraError::NotSignedIn)));
        assert!(matches!(
            create_task_impl(&state, draft("Calculus", 4)).await,
            Err(InfraError::NotSignedIn)
        ));
        assert!(matches!(tick_timer_impl(&state).await, Err(InfraError::NotSignedIn)));
        assert_eq!(current_user_impl(&state).await.expect("current user"), None);
    }

    #[tokio::test]
    async fn sign_in_rejects_identity_without_token() {
        let state = in_memory_state(Arc::new(RecordingNotificationSink::default()));
        let mut invalid = identity();
        invalid.id_token = String::new();
        assert!(matches!(
            sign_in_impl(&state, invalid).await,
            Err(InfraError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn task_crud_flow() {
        let state = in_memory_state(Arc::new(RecordingNotificationSink::default()));
        let signed = sign_in_impl(&state, identity()).await.expect("sign in");
        assert_eq!(signed.source, LoadSource::Empty);
        assert_eq!(signed.user.label, "Sam");

        let created = create_task_impl(&state, draft("Calculus", 4)).await.expect("create");
        let task_id = created.id.clone().expect("persisted id");

        let patch = TaskPatch {
            title: Some("Calculus II".to_string()),
            ..TaskPatch::default()
        };
        let updated = update_task_impl(&state, task_id.clone(), patch)
            .await
            .expect("update")
            .expect("task exists");
        assert_eq!(updated.title, "Calculus II");

        let toggled = toggle_task_impl(&state, task_id.clone())
            .await
            .expect("toggle")
            .expect("task exists");
        assert!(toggled.completed);

        assert!(delete_task_impl(&state, task_id.clone()).await.expect("delete"));
        assert!(!delete_task_impl(&state, task_id).await.expect("second delete"));
        assert!(list_tasks_impl(&state).await.expect("list").is_empty());
        assert!(matches!(
            delete_task_impl(&state, "  ".to_string()).await,
            Err(InfraError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn today_and_stats_views_follow_saturday_first_index() {
        let state = in_memory_state(Arc::new(RecordingNotificationSink::default()));
        sign_in_impl(&state, identity()).await.expect("sign in");
        let today_task = create_task_impl(&state, draft("Linear algebra", 4)).await.expect("create");
        create_task_impl(&state, draft("Saturday review", 0)).await.expect("create");
        toggle_task_impl(&state, today_task.id.clone().expect("id"))
            .await
            .expect("toggle");

        let today = today_view_impl(&state).await.expect("today view");
        assert_eq!(today.date, "2026-02-18");
        assert_eq!(today.day.value(), 4);
        assert_eq!(today.day_name, "Wednesday");
        assert_eq!(today.tasks.study.len(), 1);
        assert_eq!(today.progress.percentage, 100);

        let weekly = weekly_view_impl(&state).await.expect("weekly view");
        assert_eq!(weekly.total_tasks, 2);
        assert_eq!(weekly.week_progress, 50);
        assert!(weekly.days[4].is_today);

        let stats = stats_view_impl(&state).await.expect("stats view");
        assert_eq!(stats.completion_rate, 50);
        assert_eq!(stats.metrics.goals_achieved, 1);
        assert_eq!(stats.time_spent_by_type.study, 25);
    }

    #[tokio::test]
    async fn full_countdown_completes_bound_task_and_records_session() {
        let notifier = Arc::new(RecordingNotificationSink::default());
        let state = in_memory_state(notifier.clone());
        sign_in_impl(&state, identity()).await.expect("sign in");
        let task = create_task_impl(&state, draft("Organic chemistry", 4)).await.expect("create");
        let task_id = task.id.clone().expect("id");

        let started = start_timer_impl(&state, Some(task_id.clone())).await.expect("start");
        assert_eq!(started.time_left, 1500);
        assert_eq!(started.phase, TimerPhase::Running);

        let mut finished = None;
        for _ in 0..1500 {
            let tick = tick_timer_impl(&state).await.expect("tick");
            if tick.completed_session.is_some() {
                finished = tick.completed_session;
            }
        }

        let session = finished.expect("session completed on the last tick");
        assert_eq!(session.task_id.as_deref(), Some(task_id.as_str()));
        assert_eq!(session.task_title, "Organic chemistry");
        assert_eq!(session.duration, 25);
        assert!(session.completed);

        let timer = get_timer_state_impl(&state).await.expect("timer state");
        assert_eq!(timer.phase, TimerPhase::Idle);
        assert_eq!(timer.time_left, 1500);
        assert_eq!(timer.current_task, None);

        let tasks = list_tasks_impl(&state).await.expect("list");
        assert!(tasks[0].completed);
        assert!(timer_candidates_impl(&state).await.expect("candidates").is_empty());

        let stats = timer_stats_impl(&state).await.expect("stats");
        assert_eq!(
            stats,
            SessionStats {
                total_minutes: 25,
                session_count: 1,
                completed_count: 1,
            }
        );
        assert_eq!(
            notifier.delivered(),
            vec![
                Notification::Message {
                    title: SESSION_FINISHED_TITLE.to_string(),
                    body: SESSION_FINISHED_BODY.to_string(),
                },
                Notification::Cue,
            ]
        );
    }

    #[tokio::test]
    async fn manual_stop_records_nothing() {
        let notifier = Arc::new(RecordingNotificationSink::default());
        let state = in_memory_state(notifier.clone());
        sign_in_impl(&state, identity()).await.expect("sign in");
        let task_id = create_task_impl(&state, draft("Physics", 4))
            .await
            .expect("create")
            .id
            .expect("id");

        start_timer_impl(&state, Some(task_id)).await.expect("start");
        for _ in 0..600 {
            tick_timer_impl(&state).await.expect("tick");
        }
        let stopped = stop_timer_impl(&state).await.expect("stop");
        assert_eq!(stopped.phase, TimerPhase::Idle);
        assert_eq!(stopped.time_left, 900);

        assert!(timer_history_impl(&state, None).await.expect("history").is_empty());
        assert!(!list_tasks_impl(&state).await.expect("list")[0].completed);
        assert!(notifier.delivered().is_empty());
    }

    #[tokio::test]
    async fn start_without_selection_needs_custom_preset() {
        let state = in_memory_state(Arc::new(RecordingNotificationSink::default()));
        sign_in_impl(&state, identity()).await.expect("sign in");

        assert!(matches!(
            start_timer_impl(&state, None).await,
            Err(InfraError::Timer(TimerError::TaskRequired))
        ));
        assert!(matches!(
            configure_timer_impl(&state, TimerPreset::Minutes(35)).await,
            Err(InfraError::Validation(_))
        ));

        configure_timer_impl(&state, TimerPreset::Custom(1)).await.expect("configure");
        start_timer_impl(&state, None).await.expect("start custom");
        assert!(matches!(
            configure_timer_impl(&state, TimerPreset::Minutes(45)).await,
            Err(InfraError::Timer(TimerError::NotIdle))
        ));

        let paused = pause_timer_impl(&state).await.expect("pause");
        assert_eq!(paused.phase, TimerPhase::Paused);
        let resumed = start_timer_impl(&state, None).await.expect("resume");
        assert_eq!(resumed.phase, TimerPhase::Running);

        let mut finished = None;
        for _ in 0..60 {
            if let Some(session) = tick_timer_impl(&state).await.expect("tick").completed_session {
                finished = Some(session);
            }
        }
        let session = finished.expect("custom session completed");
        assert_eq!(session.task_id, None);
        assert_eq!(session.task_title, CUSTOM_SESSION_TITLE);
        assert_eq!(session.duration, 1);
    }

    #[tokio::test]
    async fn stale_selection_starts_an_untracked_session() {
        let state = in_memory_state(Arc::new(RecordingNotificationSink::default()));
        sign_in_impl(&state, identity()).await.expect("sign in");
        let deleted = create_task_impl(&state, draft("Algebra", 4))
            .await
            .expect("create")
            .id
            .expect("id");
        assert!(delete_task_impl(&state, deleted.clone()).await.expect("delete"));

        let started = start_timer_impl(&state, Some(deleted)).await.expect("start");
        assert_eq!(started.phase, TimerPhase::Running);
        assert_eq!(started.current_task, None);

        pause_timer_impl(&state).await.expect("pause");
        let other = create_task_impl(&state, draft("Geometry", 4))
            .await
            .expect("create")
            .id
            .expect("id");
        let resumed = start_timer_impl(&state, Some(other)).await.expect("resume");
        assert_eq!(resumed.phase, TimerPhase::Running);
        assert_eq!(resumed.current_task, None);

        let mut finished = None;
        for _ in 0..1500 {
            if let Some(session) = tick_timer_impl(&state).await.expect("tick").completed_session {
                finished = Some(session);
            }
        }
        let session = finished.expect("untracked session completed");
        assert_eq!(session.task_id, None);
        assert_eq!(session.task_title, CUSTOM_SESSION_TITLE);
        assert_eq!(session.duration, 25);
        assert!(list_tasks_impl(&state).await.expect("list").iter().all(|task| !task.completed));
    }

    #[tokio::test]
    async fn quick_timer_binds_first_open_task_of_today() {
        let state = in_memory_state(Arc::new(RecordingNotificationSink::default()));
        sign_in_impl(&state, identity()).await.expect("sign in");
        assert!(matches!(
            start_quick_timer_impl(&state).await,
            Err(InfraError::Validation(_))
        ));

        create_task_impl(&state, draft("Saturday only", 0)).await.expect("create");
        let today = create_task_impl(&state, draft("Wednesday focus", 4)).await.expect("create");

        let snapshot = start_quick_timer_impl(&state).await.expect("quick start");
        assert_eq!(snapshot.total_time, 1500);
        assert_eq!(
            snapshot.current_task.map(|task| task.id),
            today.id
        );
    }

    #[tokio::test]
    async fn export_and_reset_all_data() {
        let state = in_memory_state(Arc::new(RecordingNotificationSink::default()));
        sign_in_impl(&state, identity()).await.expect("sign in");
        create_task_impl(&state, draft("Statistics", 4)).await.expect("create");
        configure_timer_impl(&state, TimerPreset::Custom(1)).await.expect("configure");
        start_timer_impl(&state, None).await.expect("start");
        for _ in 0..60 {
            tick_timer_impl(&state).await.expect("tick");
        }

        let export = export_data_impl(&state).await.expect("export");
        assert_eq!(export.tasks.len(), 1);
        assert_eq!(export.timer_sessions.len(), 1);
        assert_eq!(export.user_email.as_deref(), Some("student@example.com"));
        let json = serde_json::to_value(&export).expect("serialize export");
        assert!(json.get("timerSessions").is_some());
        assert!(json.get("exportDate").is_some());

        let reset = reset_all_data_impl(&state).await.expect("reset");
        assert_eq!(
            reset,
            ResetAllResponse {
                tasks_cleared: 1,
                sessions_cleared: 1,
            }
        );
        assert!(list_tasks_impl(&state).await.expect("list").is_empty());
        assert!(timer_history_impl(&state, None).await.expect("history").is_empty());
    }

    #[tokio::test]
    async fn workspace_cache_survives_sign_out_and_sign_in() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        sign_in_impl(&state, identity()).await.expect("sign in");
        create_task_impl(&state, draft("Persisted", 2)).await.expect("create");
        let before = list_tasks_impl(&state).await.expect("list");

        assert!(sign_out_impl(&state).await.expect("sign out"));
        assert!(!sign_out_impl(&state).await.expect("second sign out"));

        // A fresh state has an empty remote; tasks come back from the SQLite cache.
        let restarted = workspace.app_state();
        let signed = sign_in_impl(&restarted, identity()).await.expect("sign in again");
        assert_eq!(signed.source, LoadSource::Cache);
        assert_eq!(signed.pending_sync, 0);
        assert_eq!(list_tasks_impl(&restarted).await.expect("list"), before);
    }
}
