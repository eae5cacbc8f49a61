pub mod application;
pub mod domain;
pub mod infrastructure;

use application::commands::{
    sign_in_impl, stats_view_impl, sync_pending_impl, timer_stats_impl, today_view_impl,
    weekly_view_impl, AppState, SignInResponse, StatsViewResponse, TodayViewResponse,
};
use application::task_store::SyncReport;
use domain::projector::WeeklySummary;
use domain::session_history::SessionStats;
use infrastructure::config::{identity_from_lookup, ENV_ID_TOKEN, ENV_USER_ID, ENV_WORKSPACE};
use infrastructure::error::InfraError;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub app_name: String,
    pub workspace_root: String,
    pub sign_in: SignInResponse,
    pub sync: SyncReport,
    pub today: TodayViewResponse,
    pub weekly: WeeklySummary,
    pub stats: StatsViewResponse,
    pub timer_stats: SessionStats,
}

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weekly_planner=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Bootstraps the workspace, signs in with the identity from the environment
/// and collects the dashboard views.
pub async fn run(lookup: impl Fn(&str) -> Option<String>) -> Result<Dashboard, InfraError> {
    let workspace_root = match lookup(ENV_WORKSPACE).filter(|value| !value.trim().is_empty()) {
        Some(path) => PathBuf::from(path.trim()),
        None => std::env::current_dir()?,
    };

    let identity = identity_from_lookup(&lookup)?.ok_or_else(|| {
        InfraError::InvalidConfig(format!("{ENV_USER_ID} and {ENV_ID_TOKEN} must be set"))
    })?;
    let state = AppState::new(workspace_root, &lookup)?;
    tracing::info!(
        app = %state.config().app_name,
        workspace = %state.workspace_root().display(),
        timezone = %state.config().timezone,
        "workspace ready"
    );

    let sign_in = sign_in_impl(&state, identity)
        .await
        .map_err(|error| command_failure(&state, "sign_in", error))?;
    let sync = sync_pending_impl(&state)
        .await
        .map_err(|error| command_failure(&state, "sync_pending", error))?;

    Ok(Dashboard {
        app_name: state.config().app_name.clone(),
        workspace_root: state.workspace_root().display().to_string(),
        sign_in,
        sync,
        today: today_view_impl(&state).await?,
        weekly: weekly_view_impl(&state).await?,
        stats: stats_view_impl(&state).await?,
        timer_stats: timer_stats_impl(&state).await?,
    })
}

fn command_failure(state: &AppState, command: &str, error: InfraError) -> InfraError {
    state.command_error(command, &error);
    error
}
