//! 派生视图
//!
//! 任务视图 = 每个任务 + 属于它的评论（按创建时间升序）。
//! 纯计算；`TaskViewComposer` 只在输入集合的身份变化时重新计算。

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::storage::{Task, TaskComment};
use crate::utils::TimeFormatter;

/// 把评论挂到对应的任务上
///
/// 无法解析的 `created_at` 排在最前；时间相同时保持原有顺序。
pub fn compose_task_view(tasks: &[Task], comments: &[TaskComment]) -> Vec<Task> {
    let mut by_task: HashMap<&str, Vec<&TaskComment>> = HashMap::new();
    for comment in comments {
        by_task.entry(comment.task_id.as_str()).or_default().push(comment);
    }
    for list in by_task.values_mut() {
        list.sort_by_key(|c| TimeFormatter::parse_to_utc_millis(&c.created_at).unwrap_or(i64::MIN));
    }

    tasks
        .iter()
        .map(|task| {
            let mut view = task.clone();
            view.comments = by_task
                .get(task.id.as_str())
                .map(|list| list.iter().map(|c| (*c).clone()).collect())
                .unwrap_or_default();
            view
        })
        .collect()
}

struct Memo {
    tasks: Arc<Vec<Task>>,
    comments: Arc<Vec<TaskComment>>,
    view: Arc<Vec<Task>>,
}

/// 按输入身份缓存的任务视图
#[derive(Default)]
pub struct TaskViewComposer {
    memo: Mutex<Option<Memo>>,
}

impl std::fmt::Debug for TaskViewComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskViewComposer")
            .field("cached", &self.memo.lock().is_some())
            .finish()
    }
}

impl TaskViewComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compose(&self, tasks: &Arc<Vec<Task>>, comments: &Arc<Vec<TaskComment>>) -> Arc<Vec<Task>> {
        let mut memo = self.memo.lock();
        if let Some(cached) = memo.as_ref() {
            if Arc::ptr_eq(&cached.tasks, tasks) && Arc::ptr_eq(&cached.comments, comments) {
                return cached.view.clone();
            }
        }

        let view = Arc::new(compose_task_view(tasks, comments));
        *memo = Some(Memo {
            tasks: tasks.clone(),
            comments: comments.clone(),
            view: view.clone(),
        });
        view
    }
}
