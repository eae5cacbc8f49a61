use crate::domain::models::{Task, UserIdentity};
use crate::infrastructure::config::BackendConfig;
use crate::infrastructure::document_mapper::{
    decode_task_document, encode_task_document, FirestoreDocument, FIELD_CREATED_AT,
    FIELD_USER_ID, UPDATE_FIELD_PATHS,
};
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use url::Url;

const TASKS_COLLECTION: &str = "tasks";

/// Durable per-user task collection.
#[async_trait]
pub trait TaskRemote: Send + Sync {
    /// All tasks of the user, newest first.
    async fn list_tasks(&self, identity: &UserIdentity) -> Result<Vec<Task>, InfraError>;

    /// Stores a new task and returns the id the backend assigned.
    async fn create_task(&self, identity: &UserIdentity, task: &Task) -> Result<String, InfraError>;

    async fn update_task(&self, identity: &UserIdentity, task: &Task) -> Result<(), InfraError>;

    async fn delete_task(&self, identity: &UserIdentity, task_id: &str) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct FirestoreTaskRemote {
    client: Client,
    config: BackendConfig,
}

impl FirestoreTaskRemote {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::Remote(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn http_error(status: StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("firestore api error: http {}", status.as_u16())
        } else {
            format!("firestore api error: http {}; body={body}", status.as_u16())
        };
        InfraError::Remote(message)
    }

    fn database_endpoint(&self, resource: &str) -> Result<Url, InfraError> {
        let project_id = self.config.project_id.trim();
        if project_id.is_empty() {
            return Err(InfraError::InvalidConfig(
                "backend.projectId is not configured".to_string(),
            ));
        }
        let mut url = Url::parse(&self.config.api_base_url)
            .map_err(|error| InfraError::InvalidConfig(format!("invalid firestore base url: {error}")))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::InvalidConfig("firestore base URL cannot be a base".to_string())
            })?;
            segments.pop_if_empty();
            segments.extend(["projects", project_id, "databases", "(default)", resource]);
        }
        Ok(url)
    }

    fn collection_endpoint(&self) -> Result<Url, InfraError> {
        let mut url = self.database_endpoint("documents")?;
        url.path_segments_mut()
            .map_err(|_| InfraError::InvalidConfig("firestore documents URL cannot be a base".to_string()))?
            .push(TASKS_COLLECTION);
        Ok(url)
    }

    fn document_endpoint(&self, task_id: &str) -> Result<Url, InfraError> {
        let mut url = self.collection_endpoint()?;
        url.path_segments_mut()
            .map_err(|_| InfraError::InvalidConfig("firestore collection URL cannot be a base".to_string()))?
            .push(task_id.trim());
        Ok(url)
    }

    fn run_query_endpoint(&self) -> Result<Url, InfraError> {
        self.database_endpoint("documents:runQuery")
    }

    fn authorize(&self, request: RequestBuilder, identity: &UserIdentity) -> RequestBuilder {
        let request = request.bearer_auth(&identity.id_token);
        match self.config.api_key.as_deref() {
            Some(key) => request.query(&[("key", key)]),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, action: &str) -> Result<String, InfraError> {
        let response = request
            .send()
            .await
            .map_err(|error| InfraError::Remote(format!("network error while {action}: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Remote(format!("failed reading response while {action}: {error}")))?;

        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }
        Ok(body)
    }
}

#[derive(Debug, serde::Deserialize)]
struct RunQueryEntry {
    document: Option<FirestoreDocument>,
}

fn list_query(uid: &str) -> serde_json::Value {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": TASKS_COLLECTION }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": FIELD_USER_ID },
                    "op": "EQUAL",
                    "value": { "stringValue": uid }
                }
            },
            "orderBy": [{
                "field": { "fieldPath": FIELD_CREATED_AT },
                "direction": "DESCENDING"
            }]
        }
    })
}

#[async_trait]
impl TaskRemote for FirestoreTaskRemote {
    async fn list_tasks(&self, identity: &UserIdentity) -> Result<Vec<Task>, InfraError> {
        Self::ensure_non_empty(&identity.uid, "user id")?;
        Self::ensure_non_empty(&identity.id_token, "id token")?;

        let endpoint = self.run_query_endpoint()?;
        let request = self
            .authorize(self.client.post(endpoint), identity)
            .json(&list_query(&identity.uid));
        let body = self.send(request, "listing tasks").await?;

        let entries: Vec<RunQueryEntry> = serde_json::from_str(&body).map_err(|error| {
            InfraError::Remote(format!("invalid task query payload: {error}; body={body}"))
        })?;

        let mut tasks = Vec::with_capacity(entries.len());
        for document in entries.into_iter().filter_map(|entry| entry.document) {
            match decode_task_document(&document, &identity.uid) {
                Ok(Some(task)) => tasks.push(task),
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(
                        document = document.name.as_deref().unwrap_or_default(),
                        %error,
                        "skipping undecodable task document"
                    );
                }
            }
        }
        Ok(tasks)
    }

    async fn create_task(&self, identity: &UserIdentity, task: &Task) -> Result<String, InfraError> {
        Self::ensure_non_empty(&identity.id_token, "id token")?;

        let endpoint = self.collection_endpoint()?;
        let request = self
            .authorize(self.client.post(endpoint), identity)
            .json(&encode_task_document(task, &identity.uid));
        let body = self.send(request, "creating task").await?;

        let created: FirestoreDocument = serde_json::from_str(&body).map_err(|error| {
            InfraError::Remote(format!("invalid task create payload: {error}; body={body}"))
        })?;
        created
            .document_id()
            .map(ToOwned::to_owned)
            .ok_or_else(|| InfraError::Remote("task create response did not include a name".to_string()))
    }

    async fn update_task(&self, identity: &UserIdentity, task: &Task) -> Result<(), InfraError> {
        Self::ensure_non_empty(&identity.id_token, "id token")?;
        let task_id = task
            .id
            .as_deref()
            .ok_or_else(|| InfraError::Validation("task id is required for update".to_string()))?;
        Self::ensure_non_empty(task_id, "task id")?;

        let endpoint = self.document_endpoint(task_id)?;
        let mut request = self
            .authorize(self.client.patch(endpoint), identity)
            .query(&[("currentDocument.exists", "true")]);
        for field_path in UPDATE_FIELD_PATHS {
            request = request.query(&[("updateMask.fieldPaths", field_path)]);
        }
        let request = request.json(&encode_task_document(task, &identity.uid));
        self.send(request, "updating task").await?;
        Ok(())
    }

    async fn delete_task(&self, identity: &UserIdentity, task_id: &str) -> Result<(), InfraError> {
        Self::ensure_non_empty(&identity.id_token, "id token")?;
        Self::ensure_non_empty(task_id, "task id")?;

        let endpoint = self.document_endpoint(task_id)?;
        let request = self.authorize(self.client.delete(endpoint), identity);
        self.send(request, "deleting task").await?;
        Ok(())
    }
}

/// Process-local stand-in for the hosted store; used when no backend project
/// is configured.
#[derive(Debug, Default)]
pub struct InMemoryTaskRemote {
    documents: Mutex<Vec<(String, Task)>>,
    next_sequence: AtomicU64,
}

impl InMemoryTaskRemote {
    fn lock(&self) -> Result<MutexGuard<'_, Vec<(String, Task)>>, InfraError> {
        self.documents
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("task remote lock poisoned: {error}")))
    }
}

#[async_trait]
impl TaskRemote for InMemoryTaskRemote {
    async fn list_tasks(&self, identity: &UserIdentity) -> Result<Vec<Task>, InfraError> {
        let documents = self.lock()?;
        let mut tasks = documents
            .iter()
            .filter(|(owner, _)| owner == &identity.uid)
            .map(|(_, task)| task.clone())
            .collect::<Vec<_>>();
        tasks.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(tasks)
    }

    async fn create_task(&self, identity: &UserIdentity, task: &Task) -> Result<String, InfraError> {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let id = format!("task-{sequence}");
        let mut stored = task.clone();
        stored.id = Some(id.clone());
        self.lock()?.push((identity.uid.clone(), stored));
        Ok(id)
    }

    async fn update_task(&self, identity: &UserIdentity, task: &Task) -> Result<(), InfraError> {
        let task_id = task
            .id
            .as_deref()
            .ok_or_else(|| InfraError::Validation("task id is required for update".to_string()))?;
        let mut documents = self.lock()?;
        let stored = documents
            .iter_mut()
            .find(|(owner, candidate)| owner == &identity.uid && candidate.id.as_deref() == Some(task_id))
            .ok_or_else(|| InfraError::Remote(format!("task document not found: {task_id}")))?;
        stored.1 = task.clone();
        Ok(())
    }

    async fn delete_task(&self, identity: &UserIdentity, task_id: &str) -> Result<(), InfraError> {
        self.lock()?
            .retain(|(owner, task)| !(owner == &identity.uid && task.id.as_deref() == Some(task_id)));
        Ok(())
    }
}
