use crate::domain::day_index::DayIndex;
use crate::domain::models::{Priority, Task, TaskType};
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const FIELD_USER_ID: &str = "userId";
const FIELD_TITLE: &str = "title";
const FIELD_DESCRIPTION: &str = "description";
const FIELD_TYPE: &str = "type";
const FIELD_DAY: &str = "day";
const FIELD_DURATION: &str = "duration";
const FIELD_PRIORITY: &str = "priority";
const FIELD_COMPLETED: &str = "completed";
const FIELD_COMPLETED_AT: &str = "completedAt";
pub const FIELD_CREATED_AT: &str = "createdAt";
const FIELD_UPDATED_AT: &str = "updatedAt";

/// Field paths written on update; `userId` and `createdAt` never change.
pub const UPDATE_FIELD_PATHS: [&str; 9] = [
    FIELD_TITLE,
    FIELD_DESCRIPTION,
    FIELD_TYPE,
    FIELD_DAY,
    FIELD_DURATION,
    FIELD_PRIORITY,
    FIELD_COMPLETED,
    FIELD_COMPLETED_AT,
    FIELD_UPDATED_AT,
];

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Default)]
pub struct FirestoreDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    #[serde(rename = "createTime", skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(rename = "updateTime", skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl FirestoreDocument {
    /// Trailing path segment of the resource name.
    pub fn document_id(&self) -> Option<&str> {
        self.name
            .as_deref()
            .and_then(|name| name.rsplit('/').next())
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

pub fn encode_task_document(task: &Task, uid: &str) -> FirestoreDocument {
    let mut fields = BTreeMap::new();
    fields.insert(FIELD_USER_ID.to_string(), string_value(uid));
    fields.insert(FIELD_TITLE.to_string(), string_value(&task.title));
    fields.insert(
        FIELD_DESCRIPTION.to_string(),
        task.description
            .as_deref()
            .map(string_value)
            .unwrap_or_else(null_value),
    );
    fields.insert(FIELD_TYPE.to_string(), string_value(task.task_type.as_str()));
    fields.insert(FIELD_DAY.to_string(), integer_value(i64::from(task.day.value())));
    fields.insert(FIELD_DURATION.to_string(), integer_value(i64::from(task.duration)));
    fields.insert(FIELD_PRIORITY.to_string(), string_value(task.priority.as_str()));
    fields.insert(FIELD_COMPLETED.to_string(), json!({ "booleanValue": task.completed }));
    fields.insert(
        FIELD_COMPLETED_AT.to_string(),
        task.completed_at.map(timestamp_value).unwrap_or_else(null_value),
    );
    fields.insert(FIELD_CREATED_AT.to_string(), timestamp_value(task.created_at));
    fields.insert(FIELD_UPDATED_AT.to_string(), timestamp_value(task.updated_at));

    FirestoreDocument {
        name: None,
        fields,
        create_time: None,
        update_time: None,
    }
}

/// Decodes a stored task. Documents owned by another user decode to `None`.
pub fn decode_task_document(
    document: &FirestoreDocument,
    uid: &str,
) -> Result<Option<Task>, InfraError> {
    let owner = read_string(&document.fields, FIELD_USER_ID);
    if owner.as_deref() != Some(uid) {
        return Ok(None);
    }

    let id = document
        .document_id()
        .map(ToOwned::to_owned)
        .ok_or_else(|| InfraError::Remote("task document is missing its name".to_string()))?;

    let title = read_string(&document.fields, FIELD_TITLE)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| InfraError::Remote(format!("task document {id} has no title")))?;

    let task_type = match read_string(&document.fields, FIELD_TYPE) {
        Some(raw) => TaskType::parse(&raw)
            .ok_or_else(|| InfraError::Remote(format!("invalid task type value: {raw}")))?,
        None => TaskType::Study,
    };

    let day_raw = read_integer(&document.fields, FIELD_DAY)?
        .ok_or_else(|| InfraError::Remote(format!("task document {id} has no day")))?;
    let day = u8::try_from(day_raw)
        .ok()
        .and_then(DayIndex::new)
        .ok_or_else(|| InfraError::Remote(format!("invalid day value: {day_raw}")))?;

    let duration_raw = read_integer(&document.fields, FIELD_DURATION)?.unwrap_or(0);
    let duration = u32::try_from(duration_raw)
        .ok()
        .filter(|minutes| *minutes > 0)
        .ok_or_else(|| InfraError::Remote(format!("invalid duration value: {duration_raw}")))?;

    let priority = read_string(&document.fields, FIELD_PRIORITY)
        .map(|raw| Priority::parse_or_default(&raw))
        .unwrap_or_default();
    let completed = read_bool(&document.fields, FIELD_COMPLETED).unwrap_or(false);
    let completed_at = if completed {
        read_timestamp(&document.fields, FIELD_COMPLETED_AT)?
    } else {
        None
    };

    let created_at = read_timestamp(&document.fields, FIELD_CREATED_AT)?
        .or(parse_optional_rfc3339(document.create_time.as_deref())?)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    let updated_at = read_timestamp(&document.fields, FIELD_UPDATED_AT)?
        .or(parse_optional_rfc3339(document.update_time.as_deref())?)
        .unwrap_or(created_at);

    Ok(Some(Task {
        id: Some(id),
        title,
        description: read_string(&document.fields, FIELD_DESCRIPTION)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()),
        task_type,
        day,
        duration,
        priority,
        completed,
        completed_at,
        created_at,
        updated_at,
    }))
}

fn string_value(value: &str) -> Value {
    json!({ "stringValue": value })
}

fn integer_value(value: i64) -> Value {
    json!({ "integerValue": value.to_string() })
}

fn timestamp_value(value: DateTime<Utc>) -> Value {
    json!({ "timestampValue": value.to_rfc3339() })
}

fn null_value() -> Value {
    json!({ "nullValue": null })
}

fn read_string(fields: &BTreeMap<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(|value| value.get("stringValue"))
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}

fn read_bool(fields: &BTreeMap<String, Value>, key: &str) -> Option<bool> {
    fields
        .get(key)
        .and_then(|value| value.get("booleanValue"))
        .and_then(Value::as_bool)
}

// Firestore sends integers as strings, but doubles may appear for values
// written by other clients.
fn read_integer(fields: &BTreeMap<String, Value>, key: &str) -> Result<Option<i64>, InfraError> {
    let Some(value) = fields.get(key) else {
        return Ok(None);
    };
    if let Some(raw) = value.get("integerValue") {
        let parsed = match raw {
            Value::String(text) => text.trim().parse::<i64>().map_err(|error| {
                InfraError::Remote(format!("invalid integer value '{text}' for {key}: {error}"))
            })?,
            Value::Number(number) => number.as_i64().ok_or_else(|| {
                InfraError::Remote(format!("invalid integer value '{number}' for {key}"))
            })?,
            other => {
                return Err(InfraError::Remote(format!(
                    "invalid integer value '{other}' for {key}"
                )));
            }
        };
        return Ok(Some(parsed));
    }
    if let Some(double) = value.get("doubleValue").and_then(Value::as_f64) {
        return Ok(Some(double.round() as i64));
    }
    Ok(None)
}

fn read_timestamp(
    fields: &BTreeMap<String, Value>,
    key: &str,
) -> Result<Option<DateTime<Utc>>, InfraError> {
    let raw = fields
        .get(key)
        .and_then(|value| value.get("timestampValue"))
        .and_then(Value::as_str);
    parse_optional_rfc3339(raw)
}

fn parse_optional_rfc3339(value: Option<&str>) -> Result<Option<DateTime<Utc>>, InfraError> {
    value
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|parsed| parsed.with_timezone(&Utc))
                .map_err(|error| InfraError::Remote(format!("invalid timestamp '{raw}': {error}")))
        })
        .transpose()
}
