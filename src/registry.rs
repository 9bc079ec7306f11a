//! The set of tasks available to one run.

use crate::error::LoadError;
use crate::task::Task;

/// Declared tasks, in registration order, with unique names.
#[derive(Debug, Default)]
pub struct TaskSet {
    tasks: Vec<Task>,
}

impl TaskSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `task` to the set.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Duplicate`] if a task with the same name is
    /// already registered.
    pub fn register(&mut self, task: Task) -> Result<(), LoadError> {
        if self.contains(task.name()) {
            return Err(LoadError::Duplicate(task.name().to_string()));
        }
        self.tasks.push(task);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.name() == name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Task names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.iter().map(Task::name).collect();
        names.sort_unstable();
        names
    }

    /// Tasks sorted by name.
    #[must_use]
    pub fn sorted(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.iter().collect();
        tasks.sort_by(|a, b| a.name().cmp(b.name()));
        tasks
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
