use std::collections::HashMap;

use chrono::Utc;
use shared::domain::{Task, TaskId, TaskStatus};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("no task with id `{0}`")]
    UnknownTask(TaskId),
    #[error("task `{id}` is {status}; only finished tasks can be dismissed")]
    NotFinished { id: TaskId, status: TaskStatus },
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: HashMap<TaskId, Task>,
    order: Vec<TaskId>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.iter().cloned().collect()
    }

    pub fn record(&mut self, id: TaskId, name: Option<String>, status: TaskStatus) -> &Task {
        let now = Utc::now();
        if !self.tasks.contains_key(&id) {
            self.order.push(id.clone());
        }
        let task = self.tasks.entry(id.clone()).or_insert_with(|| Task {
            name: id.to_string(),
            id: id.clone(),
            status,
            updated_at: now,
        });

        if let Some(name) = name {
            task.name = name;
        }
        if task.status != status {
            debug!(task = %id, from = %task.status, to = %status, "task status changed");
            task.status = status;
            task.updated_at = now;
        }
        task
    }

    pub fn queued(&mut self, id: TaskId, name: Option<String>) -> &Task {
        self.record(id, name, TaskStatus::Queued)
    }

    pub fn started(&mut self, id: TaskId, name: Option<String>) -> &Task {
        self.record(id, name, TaskStatus::Running)
    }

    pub fn completed(&mut self, id: TaskId, name: Option<String>) -> &Task {
        self.record(id, name, TaskStatus::Finished)
    }

    pub fn dismiss(&mut self, id: &TaskId) -> Result<Task, TaskError> {
        let status = self
            .tasks
            .get(id)
            .map(|task| task.status)
            .ok_or_else(|| TaskError::UnknownTask(id.clone()))?;
        if status != TaskStatus::Finished {
            return Err(TaskError::NotFinished {
                id: id.clone(),
                status,
            });
        }
        self.order.retain(|existing| existing != id);
        self.tasks
            .remove(id)
            .ok_or_else(|| TaskError::UnknownTask(id.clone()))
    }
}
