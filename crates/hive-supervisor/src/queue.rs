//! Pending queue, active set and completed archive.

use std::collections::{HashMap, VecDeque};

use hive_core::{Task, TaskId};
use tokio::time::Instant;

/// The three collections a task moves through.
///
/// A task lives in exactly one of them at a time.
#[derive(Default)]
pub(crate) struct TaskQueue {
    pending: VecDeque<Task>,
    active: HashMap<TaskId, Task>,
    completed: HashMap<TaskId, Task>,

    /// Earliest admission time of pending tasks that are backing off.
    not_before: HashMap<TaskId, Instant>,
}

impl TaskQueue {
    /// Insert before the first task with strictly lower priority, so equal
    /// priorities keep submission order.
    pub fn push(&mut self, task: Task) {
        match self
            .pending
            .iter()
            .position(|queued| queued.priority < task.priority)
        {
            Some(index) => self.pending.insert(index, task),
            None => self.pending.push_back(task),
        }
    }

    /// Put a retried task at the very front, ahead of any priority.
    ///
    /// With `not_before` set the task holds the front but is not admitted
    /// before that instant.
    pub fn requeue(&mut self, task: Task, not_before: Option<Instant>) {
        match not_before {
            Some(at) => self.not_before.insert(task.id.clone(), at),
            None => self.not_before.remove(&task.id),
        };
        self.pending.push_front(task);
    }

    /// The next task to dispatch.
    pub fn head(&self) -> Option<&Task> {
        self.pending.front()
    }

    /// When the head task may be admitted, if it is backing off.
    pub fn head_not_before(&self) -> Option<Instant> {
        let head = self.pending.front()?;
        self.not_before.get(&head.id).copied()
    }

    /// Remove and return the next task to dispatch.
    pub fn pop_head(&mut self) -> Option<Task> {
        let task = self.pending.pop_front()?;
        self.not_before.remove(&task.id);
        Some(task)
    }

    /// Remove a specific task from the pending queue.
    pub fn remove_pending(&mut self, id: &TaskId) -> Option<Task> {
        let index = self.pending.iter().position(|t| &t.id == id)?;
        self.not_before.remove(id);
        self.pending.remove(index)
    }

    /// Move an admitted task into the active set.
    pub fn activate(&mut self, task: Task) {
        self.active.insert(task.id.clone(), task);
    }

    /// Take a task out of the active set. Returns None if it was already
    /// settled.
    pub fn take_active(&mut self, id: &TaskId) -> Option<Task> {
        self.active.remove(id)
    }

    /// Move a settled task into the archive.
    pub fn archive(&mut self, task: Task) {
        self.completed.insert(task.id.clone(), task);
    }

    /// Look a task up in the archive, then the active set, then the queue.
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.completed
            .get(id)
            .or_else(|| self.active.get(id))
            .or_else(|| self.pending.iter().find(|t| &t.id == id))
    }

    /// Whether the id is known in any collection.
    pub fn contains(&self, id: &TaskId) -> bool {
        self.get(id).is_some()
    }

    /// Number of queued tasks.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of running tasks.
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// No queued and no running work.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.active.is_empty()
    }

    /// Queued tasks in dispatch order.
    pub fn pending(&self) -> impl Iterator<Item = &Task> {
        self.pending.iter()
    }

    /// Running tasks, unordered.
    pub fn active(&self) -> impl Iterator<Item = &Task> {
        self.active.values()
    }

    /// Settled tasks, unordered.
    pub fn completed(&self) -> impl Iterator<Item = &Task> {
        self.completed.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use hive_core::{TaskStatus, TaskSubmission, WorkerId};
    use serde_json::json;

    fn task(id: &str, priority: i32) -> Task {
        let submission = TaskSubmission::new(id, "lint", json!(null));
        Task::new(submission.with_priority(priority))
    }

    fn pending_ids(queue: &TaskQueue) -> Vec<&str> {
        queue.pending().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_priority_order_with_fifo_ties() {
        let mut queue = TaskQueue::default();
        queue.push(task("a", 1));
        queue.push(task("b", 5));
        queue.push(task("c", 1));
        queue.push(task("d", 3));
        queue.push(task("e", 5));
        queue.push(task("f", -2));

        assert_eq!(pending_ids(&queue), vec!["b", "e", "d", "a", "c", "f"]);
    }

    #[test]
    fn test_requeue_goes_to_front() {
        let mut queue = TaskQueue::default();
        queue.push(task("high", 10));
        queue.push(task("low", 0));

        queue.requeue(task("retried", -5), None);
        assert_eq!(pending_ids(&queue), vec!["retried", "high", "low"]);

        // Insertion scans from the front, so a fresh task outranking the
        // retried head lands before it.
        queue.push(task("mid", 5));
        assert_eq!(pending_ids(&queue), vec!["mid", "retried", "high", "low"]);

        queue.push(task("floor", -10));
        assert_eq!(
            pending_ids(&queue),
            vec!["mid", "retried", "high", "low", "floor"]
        );
    }

    #[test]
    fn test_lookup_order_and_membership() {
        let mut queue = TaskQueue::default();
        queue.push(task("t1", 0));
        queue.push(task("t2", 0));

        let mut running = queue.pop_head().unwrap();
        running.start(WorkerId::new("w1")).unwrap();
        queue.activate(running);

        let status = |id: &str| queue.get(&TaskId::new(id)).map(|t| t.status);
        assert_eq!(status("t1"), Some(TaskStatus::Running));
        assert_eq!(status("t2"), Some(TaskStatus::Pending));
        assert!(!queue.is_idle());

        let mut done = queue.take_active(&TaskId::new("t1")).unwrap();
        assert!(queue.take_active(&TaskId::new("t1")).is_none());
        done.complete(json!(1)).unwrap();
        queue.archive(done);

        let removed = queue.remove_pending(&TaskId::new("t2")).unwrap();
        assert_eq!(removed.id, TaskId::new("t2"));
        assert!(queue.is_idle());
        assert!(queue.contains(&TaskId::new("t1")));
        assert!(!queue.contains(&TaskId::new("t2")));
    }

    #[test]
    fn test_backoff_deadline_follows_the_head() {
        let mut queue = TaskQueue::default();
        queue.push(task("fresh", 0));
        assert_eq!(queue.head_not_before(), None);

        let at = Instant::now() + Duration::from_millis(200);
        queue.requeue(task("retried", 0), Some(at));
        assert_eq!(queue.head_not_before(), Some(at));
        assert_eq!(pending_ids(&queue), vec!["retried", "fresh"]);

        let popped = queue.pop_head().unwrap();
        assert_eq!(popped.id.as_str(), "retried");
        assert_eq!(queue.head_not_before(), None);

        queue.requeue(popped, Some(at));
        queue.remove_pending(&TaskId::new("retried"));
        assert_eq!(queue.head_not_before(), None);
        assert_eq!(pending_ids(&queue), vec!["fresh"]);
    }
}
