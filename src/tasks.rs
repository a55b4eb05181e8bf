//! Task list state: the authoritative in-memory collection plus a
//! derived, filtered and sorted view.
//!
//! Derivation is pure and synchronous; it reruns whenever the source
//! collection or any filter/sort parameter changes. Mutations are
//! call-first: the API round-trip happens before any in-memory change,
//! so a failed call leaves the visible list exactly as it was.

use std::cmp::Reverse;
use std::sync::Arc;

use tracing::info;

use crate::traits::TaskApi;
use crate::types::{CreateTaskRequest, Priority, Task};

/// Completion partition for the status filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Completed,
}

impl std::str::FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(StatusFilter::All),
            "pending" => Ok(StatusFilter::Pending),
            "completed" => Ok(StatusFilter::Completed),
            other => Err(format!("unknown status filter '{}'", other)),
        }
    }
}

/// Exactly one sort key is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Creation time descending (the default view).
    #[default]
    NewestFirst,
    /// Creation time ascending.
    OldestFirst,
    /// High before medium before low; ties keep their relative order.
    Priority,
    /// Due date ascending; undated tasks sort after all dated ones.
    DueDate,
    /// Case-insensitive lexicographic title order.
    Title,
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" | "created_at" => Ok(SortKey::NewestFirst),
            "oldest" => Ok(SortKey::OldestFirst),
            "priority" => Ok(SortKey::Priority),
            "due_date" => Ok(SortKey::DueDate),
            "title" => Ok(SortKey::Title),
            other => Err(format!("unknown sort key '{}'", other)),
        }
    }
}

/// Pure derivation of the visible list. Filters compose with AND;
/// all sorts are stable.
pub fn derive_visible(
    tasks: &[Task],
    search: &str,
    status: StatusFilter,
    priority: Option<Priority>,
    sort: SortKey,
) -> Vec<Task> {
    let query = search.trim().to_lowercase();

    let mut result: Vec<Task> = tasks
        .iter()
        .filter(|task| {
            if !query.is_empty() {
                let in_title = task.title.to_lowercase().contains(&query);
                let in_description = task
                    .description
                    .as_deref()
                    .map(|d| d.to_lowercase().contains(&query))
                    .unwrap_or(false);
                if !in_title && !in_description {
                    return false;
                }
            }
            match status {
                StatusFilter::All => {}
                StatusFilter::Pending => {
                    if task.completed {
                        return false;
                    }
                }
                StatusFilter::Completed => {
                    if !task.completed {
                        return false;
                    }
                }
            }
            if let Some(p) = priority {
                if task.priority != p {
                    return false;
                }
            }
            true
        })
        .cloned()
        .collect();

    match sort {
        SortKey::NewestFirst => result.sort_by_key(|t| Reverse(t.created_at)),
        SortKey::OldestFirst => result.sort_by_key(|t| t.created_at),
        SortKey::Priority => result.sort_by_key(|t| Reverse(t.priority.rank())),
        SortKey::DueDate => result.sort_by_key(|t| (t.due_date.is_none(), t.due_date)),
        SortKey::Title => result.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase())),
    }

    result
}

pub struct TaskListController {
    api: Arc<dyn TaskApi>,
    user_id: String,
    tasks: Vec<Task>,
    visible: Vec<Task>,
    search: String,
    status: StatusFilter,
    priority: Option<Priority>,
    sort: SortKey,
    error: Option<String>,
}

impl TaskListController {
    pub fn new(api: Arc<dyn TaskApi>, user_id: &str) -> Self {
        Self {
            api,
            user_id: user_id.to_string(),
            tasks: Vec::new(),
            visible: Vec::new(),
            search: String::new(),
            status: StatusFilter::All,
            priority: None,
            sort: SortKey::NewestFirst,
            error: None,
        }
    }

    /// Replace the collection with the server's current task list.
    pub async fn load(&mut self) -> anyhow::Result<()> {
        match self.api.list_tasks(&self.user_id).await {
            Ok(tasks) => {
                info!(count = tasks.len(), "Loaded tasks");
                self.tasks = tasks;
                self.error = None;
                self.apply();
                Ok(())
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn set_search(&mut self, search: &str) {
        self.search = search.to_string();
        self.apply();
    }

    pub fn set_status(&mut self, status: StatusFilter) {
        self.status = status;
        self.apply();
    }

    pub fn set_priority(&mut self, priority: Option<Priority>) {
        self.priority = priority;
        self.apply();
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.sort = sort;
        self.apply();
    }

    pub fn visible(&self) -> &[Task] {
        &self.visible
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Create a task on the server and append its returned
    /// representation to the collection.
    pub async fn create(&mut self, req: &CreateTaskRequest) -> anyhow::Result<Task> {
        match self.api.create_task(&self.user_id, req).await {
            Ok(task) => {
                self.tasks.push(task.clone());
                self.error = None;
                self.apply();
                Ok(task)
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Flip a task's completion flag via the dedicated partial-update
    /// call. The in-memory task is replaced by the server's returned
    /// representation only after the call succeeds.
    pub async fn toggle_complete(&mut self, task_id: i64) -> anyhow::Result<Task> {
        let current = self
            .tasks
            .iter()
            .find(|t| t.id == task_id)
            .ok_or_else(|| anyhow::anyhow!("no task with id {}", task_id))?;
        let target = !current.completed;

        match self.api.set_completed(&self.user_id, task_id, target).await {
            Ok(updated) => {
                if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == task_id) {
                    *slot = updated.clone();
                }
                self.error = None;
                self.apply();
                Ok(updated)
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Update a task's fields. As with completion, the in-memory entry
    /// is replaced by the server's representation only on success.
    pub async fn update(
        &mut self,
        task_id: i64,
        req: &crate::types::UpdateTaskRequest,
    ) -> anyhow::Result<Task> {
        match self.api.update_task(&self.user_id, task_id, req).await {
            Ok(updated) => {
                if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == task_id) {
                    *slot = updated.clone();
                }
                self.error = None;
                self.apply();
                Ok(updated)
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Delete a task. Removed from the collection only after the call
    /// succeeds.
    pub async fn delete(&mut self, task_id: i64) -> anyhow::Result<()> {
        match self.api.delete_task(&self.user_id, task_id).await {
            Ok(()) => {
                self.tasks.retain(|t| t.id != task_id);
                self.error = None;
                self.apply();
                Ok(())
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn apply(&mut self) {
        self.visible =
            derive_visible(&self.tasks, &self.search, self.status, self.priority, self.sort);
    }
}
