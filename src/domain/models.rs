use crate::domain::day_index::DayIndex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CUSTOM_SESSION_TITLE: &str = "Custom session";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Study,
    Gym,
    Rest,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Study => "study",
            Self::Gym => "gym",
            Self::Rest => "rest",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "study" => Some(Self::Study),
            "gym" => Some(Self::Gym),
            "rest" => Some(Self::Rest),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Unknown values fall back to medium, like the task form does.
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Medium,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub day: DayIndex,
    pub duration: u32,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn from_draft(draft: TaskDraft, now: DateTime<Utc>) -> Result<Self, String> {
        draft.validate()?;
        Ok(Self {
            id: None,
            title: draft.title.trim().to_string(),
            description: normalize_optional(draft.description.as_deref()),
            task_type: draft.task_type,
            day: draft.day,
            duration: draft.duration,
            priority: draft.priority,
            completed: false,
            completed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.title, "task.title")?;
        validate_positive(self.duration, "task.duration")?;
        if self.completed_at.is_some() && !self.completed {
            return Err("task.completed_at must be empty while the task is open".to_string());
        }
        Ok(())
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Sets the completion flag, keeping `completed_at` in step with it.
    pub fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        self.completed = completed;
        self.completed_at = completed.then_some(now);
        self.updated_at = now;
    }

    pub fn apply_patch(&mut self, patch: &TaskPatch, now: DateTime<Utc>) -> Result<(), String> {
        patch.validate()?;
        if let Some(title) = patch.title.as_deref() {
            self.title = title.trim().to_string();
        }
        if let Some(description) = patch.description.as_deref() {
            self.description = normalize_optional(Some(description));
        }
        if let Some(task_type) = patch.task_type {
            self.task_type = task_type;
        }
        if let Some(day) = patch.day {
            self.day = day;
        }
        if let Some(duration) = patch.duration {
            self.duration = duration;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        match patch.completed {
            Some(completed) if completed != self.completed => self.set_completed(completed, now),
            _ => self.updated_at = now,
        }
        Ok(())
    }
}

/// Input for a new task, before it has timestamps or an id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub day: DayIndex,
    pub duration: u32,
    #[serde(default)]
    pub priority: Priority,
}

impl TaskDraft {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.title, "title")?;
        validate_positive(self.duration, "duration")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub task_type: Option<TaskType>,
    pub day: Option<DayIndex>,
    pub duration: Option<u32>,
    pub priority: Option<Priority>,
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(title) = self.title.as_deref() {
            validate_non_empty(title, "title")?;
        }
        if let Some(duration) = self.duration {
            validate_positive(duration, "duration")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSession {
    pub id: String,
    pub task_id: Option<String>,
    pub task_title: String,
    pub duration: u32,
    pub completed_at: DateTime<Utc>,
    pub completed: bool,
}

impl TimerSession {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "session.id")?;
        validate_non_empty(&self.task_title, "session.task_title")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    #[serde(default, skip_serializing)]
    pub id_token: String,
}

impl UserIdentity {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.uid, "user.uid")?;
        validate_non_empty(&self.id_token, "user.id_token")
    }

    /// Display name, falling back to the local part of the email.
    pub fn label(&self) -> String {
        if let Some(name) = self.display_name.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            return name.to_string();
        }
        self.email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .filter(|value| !value.is_empty())
            .unwrap_or("User")
            .to_string()
    }
}

fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_positive(value: u32, field_name: &str) -> Result<(), String> {
    if value == 0 {
        return Err(format!("{field_name} must be > 0"));
    }
    Ok(())
}
