use crate::domain::models::UserIdentity;
use crate::domain::timer::DEFAULT_TIMER_MINUTES;
use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const SUPPORTED_SCHEMA: u64 = 1;
pub const DEFAULT_API_BASE_URL: &str = "https://firestore.googleapis.com/v1/";

pub const ENV_API_KEY: &str = "PLANNER_FIRESTORE_API_KEY";
pub const ENV_PROJECT_ID: &str = "PLANNER_PROJECT_ID";
pub const ENV_USER_ID: &str = "PLANNER_USER_ID";
pub const ENV_USER_EMAIL: &str = "PLANNER_USER_EMAIL";
pub const ENV_USER_NAME: &str = "PLANNER_USER_NAME";
pub const ENV_ID_TOKEN: &str = "PLANNER_ID_TOKEN";
pub const ENV_WORKSPACE: &str = "PLANNER_WORKSPACE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    pub project_id: String,
    pub api_base_url: String,
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub app_name: String,
    pub timezone: Tz,
    pub default_timer_minutes: u32,
    pub timer_presets: Vec<u32>,
    pub backend: BackendConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "Weekly Planner".to_string(),
            timezone: Tz::UTC,
            default_timer_minutes: DEFAULT_TIMER_MINUTES,
            timer_presets: vec![25, 45, 60, 90],
            backend: BackendConfig {
                project_id: String::new(),
                api_base_url: DEFAULT_API_BASE_URL.to_string(),
                api_key: None,
            },
        }
    }
}

fn default_app_json() -> serde_json::Value {
    serde_json::json!({
        "schema": SUPPORTED_SCHEMA,
        "appName": "Weekly Planner",
        "timezone": "UTC",
        "defaultTimerMinutes": DEFAULT_TIMER_MINUTES,
        "timerPresets": [25, 45, 60, 90],
        "backend": {
            "projectId": "",
            "apiBaseUrl": DEFAULT_API_BASE_URL
        }
    })
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_app_json())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SUPPORTED_SCHEMA {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {schema} in {}",
            path.display()
        )));
    }
    Ok(parsed)
}

fn non_empty_str<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Reads `app.json` and layers environment overrides on top of it.
pub fn load_app_config(
    config_dir: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<AppConfig, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let defaults = AppConfig::default();

    let timezone = match non_empty_str(&app, "timezone") {
        Some(name) => name
            .parse::<Tz>()
            .map_err(|error| InfraError::InvalidConfig(format!("invalid timezone '{name}': {error}")))?,
        None => defaults.timezone,
    };

    let default_timer_minutes = match app.get("defaultTimerMinutes").and_then(serde_json::Value::as_u64) {
        Some(0) => {
            return Err(InfraError::InvalidConfig(
                "defaultTimerMinutes must be > 0".to_string(),
            ));
        }
        Some(minutes) => u32::try_from(minutes).map_err(|_| {
            InfraError::InvalidConfig(format!("defaultTimerMinutes out of range: {minutes}"))
        })?,
        None => defaults.default_timer_minutes,
    };

    let timer_presets = match app.get("timerPresets") {
        Some(raw) => serde_json::from_value::<Vec<u32>>(raw.clone())
            .map_err(|error| InfraError::InvalidConfig(format!("invalid timerPresets: {error}")))?
            .into_iter()
            .filter(|minutes| *minutes > 0)
            .collect(),
        None => defaults.timer_presets,
    };

    let backend_json = app.get("backend").cloned().unwrap_or_else(|| serde_json::json!({}));
    let project_id = lookup_non_empty(&lookup, ENV_PROJECT_ID)
        .or_else(|| non_empty_str(&backend_json, "projectId").map(ToOwned::to_owned))
        .unwrap_or_default();
    let api_base_url = non_empty_str(&backend_json, "apiBaseUrl")
        .map(ToOwned::to_owned)
        .unwrap_or(defaults.backend.api_base_url);

    Ok(AppConfig {
        app_name: non_empty_str(&app, "appName")
            .map(ToOwned::to_owned)
            .unwrap_or(defaults.app_name),
        timezone,
        default_timer_minutes,
        timer_presets,
        backend: BackendConfig {
            project_id,
            api_base_url,
            api_key: lookup_non_empty(&lookup, ENV_API_KEY),
        },
    })
}

/// Identity handed over by the external sign-in flow, if the environment
/// carries one.
pub fn identity_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<UserIdentity>, InfraError> {
    let Some(uid) = lookup_non_empty(&lookup, ENV_USER_ID) else {
        return Ok(None);
    };
    let id_token = lookup_non_empty(&lookup, ENV_ID_TOKEN).ok_or_else(|| {
        InfraError::InvalidConfig(format!("{ENV_ID_TOKEN} is required when {ENV_USER_ID} is set"))
    })?;
    Ok(Some(UserIdentity {
        uid,
        email: lookup_non_empty(&lookup, ENV_USER_EMAIL),
        display_name: lookup_non_empty(&lookup, ENV_USER_NAME),
        id_token,
    }))
}

fn lookup_non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
