use crate::domain::models::{Task, TaskDraft, TaskPatch, UserIdentity};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::local_cache::{load_cached_tasks, save_cached_tasks, tasks_key, LocalCache};
use crate::infrastructure::task_remote::TaskRemote;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoadSource {
    Remote,
    Cache,
    Empty,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub still_pending: usize,
}

/// The signed-in user's tasks, kept in memory and mirrored to the remote
/// store and the local cache on every mutation.
///
/// Tasks whose remote create failed stay in the list with `id == None`;
/// ids whose remote update failed are tracked as dirty. Both are retried by
/// [`TaskStore::sync_pending`].
pub struct TaskStore {
    identity: UserIdentity,
    remote: Arc<dyn TaskRemote>,
    cache: Arc<dyn LocalCache>,
    now_provider: NowProvider,
    tasks: Vec<Task>,
    dirty: HashSet<String>,
}

impl TaskStore {
    pub fn new(identity: UserIdentity, remote: Arc<dyn TaskRemote>, cache: Arc<dyn LocalCache>) -> Self {
        Self {
            identity,
            remote,
            cache,
            now_provider: Arc::new(Utc::now),
            tasks: Vec::new(),
            dirty: HashSet::new(),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, task_id: &str) -> Option<&Task> {
        self.tasks
            .iter()
            .find(|task| task.id.as_deref() == Some(task_id))
    }

    pub fn pending_count(&self) -> usize {
        self.tasks.iter().filter(|task| !task.is_persisted()).count() + self.dirty.len()
    }

    /// Replaces the in-memory list from the remote store, falling back to the
    /// local copy when the remote read fails or comes back empty. Tasks the
    /// remote has not seen yet survive a successful read.
    pub async fn load(&mut self) -> Result<LoadSource, InfraError> {
        let local = if self.tasks.is_empty() {
            self.read_cache()
        } else {
            std::mem::take(&mut self.tasks)
        };

        match self.remote.list_tasks(&self.identity).await {
            Ok(remote_tasks) if !remote_tasks.is_empty() => {
                self.tasks = remote_tasks;
                self.carry_over_unsynced(local);
                self.write_cache();
                Ok(LoadSource::Remote)
            }
            Ok(_) if !local.is_empty() => {
                tracing::info!(
                    uid = %self.identity.uid,
                    count = local.len(),
                    "remote store is empty; using cached tasks"
                );
                self.tasks = local;
                Ok(LoadSource::Cache)
            }
            Ok(_) => Ok(LoadSource::Empty),
            Err(error) => {
                tracing::warn!(
                    uid = %self.identity.uid,
                    %error,
                    count = local.len(),
                    "remote task read failed; using cached tasks"
                );
                let source = if local.is_empty() {
                    LoadSource::Empty
                } else {
                    LoadSource::Cache
                };
                self.tasks = local;
                Ok(source)
            }
        }
    }

    pub async fn create(&mut self, draft: TaskDraft) -> Result<Task, InfraError> {
        let mut task = Task::from_draft(draft, (self.now_provider)()).map_err(InfraError::Validation)?;

        match self.remote.create_task(&self.identity, &task).await {
            Ok(id) => {
                task.id = Some(id);
                self.tasks.insert(0, task.clone());
                self.write_cache();
                Ok(task)
            }
            Err(error) => {
                tracing::warn!(title = %task.title, %error, "task kept locally until sync");
                self.tasks.insert(0, task);
                self.write_cache();
                Err(error)
            }
        }
    }

    pub async fn update(&mut self, task_id: &str, patch: &TaskPatch) -> Result<Option<Task>, InfraError> {
        let now = (self.now_provider)();
        let Some(task) = self.find_mut(task_id) else {
            return Ok(None);
        };
        task.apply_patch(patch, now).map_err(InfraError::Validation)?;
        let updated = task.clone();
        self.push_update(updated).await.map(Some)
    }

    pub async fn toggle_completion(&mut self, task_id: &str) -> Result<Option<Task>, InfraError> {
        let Some(completed) = self.get(task_id).map(|task| !task.completed) else {
            return Ok(None);
        };
        self.set_completed(task_id, completed).await
    }

    pub async fn set_completed(&mut self, task_id: &str, completed: bool) -> Result<Option<Task>, InfraError> {
        let now = (self.now_provider)();
        let Some(task) = self.find_mut(task_id) else {
            return Ok(None);
        };
        task.set_completed(completed, now);
        let updated = task.clone();
        self.push_update(updated).await.map(Some)
    }

    /// Removes the task only after the remote delete succeeded.
    pub async fn delete(&mut self, task_id: &str) -> Result<bool, InfraError> {
        if self.get(task_id).is_none() {
            return Ok(false);
        }

        if let Err(error) = self.remote.delete_task(&self.identity, task_id).await {
            self.write_cache();
            return Err(error);
        }

        self.tasks.retain(|task| task.id.as_deref() != Some(task_id));
        self.dirty.remove(task_id);
        self.write_cache();
        Ok(true)
    }

    /// Pushes pending creates and dirty updates. Anything that fails again
    /// stays pending.
    pub async fn sync_pending(&mut self) -> Result<SyncReport, InfraError> {
        let mut report = SyncReport::default();

        for index in 0..self.tasks.len() {
            if self.tasks[index].is_persisted() {
                continue;
            }
            match self.remote.create_task(&self.identity, &self.tasks[index]).await {
                Ok(id) => {
                    self.tasks[index].id = Some(id);
                    report.created += 1;
                }
                Err(error) => {
                    tracing::warn!(title = %self.tasks[index].title, %error, "pending create failed again");
                    report.still_pending += 1;
                }
            }
        }

        let mut dirty = self.dirty.drain().collect::<Vec<_>>();
        dirty.sort();
        for task_id in dirty {
            let Some(task) = self.get(&task_id).cloned() else {
                continue;
            };
            match self.remote.update_task(&self.identity, &task).await {
                Ok(()) => report.updated += 1,
                Err(error) => {
                    tracing::warn!(task_id = %task_id, %error, "pending update failed again");
                    self.dirty.insert(task_id);
                    report.still_pending += 1;
                }
            }
        }

        if report.created > 0 || report.updated > 0 {
            self.write_cache();
        }
        Ok(report)
    }

    /// Forgets every local trace of the user's tasks. Remote data is left as is.
    pub fn clear_local(&mut self) -> Result<usize, InfraError> {
        let cleared = self.tasks.len();
        self.tasks.clear();
        self.dirty.clear();
        self.cache.remove(&tasks_key(&self.identity.uid))?;
        Ok(cleared)
    }

    fn read_cache(&self) -> Vec<Task> {
        let cached = match load_cached_tasks(self.cache.as_ref(), &self.identity.uid) {
            Ok(tasks) => tasks,
            Err(error) => {
                tracing::warn!(uid = %self.identity.uid, %error, "ignoring unreadable task cache");
                return Vec::new();
            }
        };
        cached
            .into_iter()
            .filter(|task| match task.validate() {
                Ok(()) => true,
                Err(error) => {
                    tracing::warn!(uid = %self.identity.uid, %error, "dropping invalid cached task");
                    false
                }
            })
            .collect()
    }

    // Pending creates go back on top of the freshly read list and dirty tasks
    // replace their remote copy. Dirty ids the remote no longer has are dropped.
    fn carry_over_unsynced(&mut self, local: Vec<Task>) {
        let mut pending = Vec::new();
        for task in local {
            match task.id.as_deref() {
                None => pending.push(task),
                Some(task_id) if self.dirty.contains(task_id) => {
                    if let Some(slot) = self.find_mut(task_id) {
                        *slot = task;
                    }
                }
                Some(_) => {}
            }
        }

        let tasks = &self.tasks;
        self.dirty
            .retain(|task_id| tasks.iter().any(|task| task.id.as_deref() == Some(task_id.as_str())));
        if !pending.is_empty() {
            tracing::info!(
                uid = %self.identity.uid,
                count = pending.len(),
                "keeping tasks that were never synced"
            );
        }
        pending.append(&mut self.tasks);
        self.tasks = pending;
    }

    fn find_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|task| task.id.as_deref() == Some(task_id))
    }

    async fn push_update(&mut self, task: Task) -> Result<Task, InfraError> {
        let task_id = task.id.clone().unwrap_or_default();
        match self.remote.update_task(&self.identity, &task).await {
            Ok(()) => {
                self.dirty.remove(&task_id);
                self.write_cache();
                Ok(task)
            }
            Err(error) => {
                tracing::warn!(task_id = %task_id, %error, "task update kept locally until sync");
                self.dirty.insert(task_id);
                self.write_cache();
                Err(error)
            }
        }
    }

    fn write_cache(&self) {
        let now = (self.now_provider)();
        if let Err(error) = save_cached_tasks(self.cache.as_ref(), &self.identity.uid, &self.tasks, now) {
            tracing::warn!(uid = %self.identity.uid, %error, "failed to write task cache");
        }
    }
}
