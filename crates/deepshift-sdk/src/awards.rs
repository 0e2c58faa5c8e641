//! 成就徽章判定
//!
//! 在一次乐观修改之后，根据修改后的快照判断哪些用户获得了新徽章。
//! 只做判定，授予由 `sync::optimistic::award_badge` 完成并走正常的同步流程。

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::storage::catalog::{BADGE_PRAISED, BADGE_STREAK, BADGE_TASK_MASTER};
use crate::storage::queue::SyncAction;
use crate::storage::{Snapshot, Task, TaskStatus};
use crate::sync::optimistic::has_badge;
use crate::utils::TimeFormatter;

/// 连续提交日志的天数门槛
pub const STREAK_DAYS: usize = 5;
/// 完成任务数门槛
pub const COMPLETED_TASKS: usize = 10;

/// 一次待授予的徽章
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EarnedBadge {
    pub user_id: String,
    pub badge_id: &'static str,
}

/// 学生日志的最长连续天数（同一天多条只算一次）
pub fn longest_log_streak(snapshot: &Snapshot, student_id: &str) -> usize {
    let days: BTreeSet<NaiveDate> = snapshot
        .logs
        .iter()
        .filter(|log| log.student_id == student_id)
        .filter_map(|log| TimeFormatter::parse_date(&log.date))
        .collect();

    let mut longest = 0;
    let mut current = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in days {
        current = match previous {
            Some(prev) if (day - prev).num_days() == 1 => current + 1,
            _ => 1,
        };
        longest = longest.max(current);
        previous = Some(day);
    }
    longest
}

pub fn completed_task_count(snapshot: &Snapshot, user_id: &str) -> usize {
    snapshot
        .tasks
        .iter()
        .filter(|task| task.assigned_to_id == user_id && task.status == TaskStatus::Completed)
        .count()
}

fn assignee_of(snapshot: &Snapshot, task_id: &str) -> Option<String> {
    snapshot
        .find::<Task>(task_id)
        .map(|task| task.assigned_to_id.clone())
        .filter(|id| !id.is_empty())
}

/// `action` 已经应用到 `snapshot` 之后，判断新获得的徽章
pub fn earned_after(snapshot: &Snapshot, action: &SyncAction) -> Vec<EarnedBadge> {
    let candidate = match action {
        SyncAction::AddLog(log) => (longest_log_streak(snapshot, &log.student_id) >= STREAK_DAYS)
            .then(|| (log.student_id.clone(), BADGE_STREAK)),
        SyncAction::UpdateTaskStatus {
            id,
            status: TaskStatus::Completed,
        }
        | SyncAction::SubmitDeliverable {
            id,
            status: TaskStatus::Completed,
            ..
        } => assignee_of(snapshot, id)
            .filter(|user| completed_task_count(snapshot, user) >= COMPLETED_TASKS)
            .map(|user| (user, BADGE_TASK_MASTER)),
        SyncAction::GiveFeedback { id, feedback } if feedback.is_praise() => {
            assignee_of(snapshot, id).map(|user| (user, BADGE_PRAISED))
        }
        _ => None,
    };

    candidate
        .filter(|(user, badge)| !has_badge(snapshot, user, badge))
        .map(|(user_id, badge_id)| EarnedBadge { user_id, badge_id })
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LogEntry, Normalize, TaskFeedback, UserBadge};
    use serde_json::json;

    fn log(student: &str, date: &str) -> LogEntry {
        LogEntry::normalize(&json!({ "id": date, "student_id": student, "date": date }))
    }

    fn snapshot_with_logs(student: &str, dates: &[&str]) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for date in dates {
            snapshot.insert(log(student, date));
        }
        snapshot
    }

    #[test]
    fn streak_counts_consecutive_unique_days() {
        let snapshot = snapshot_with_logs(
            "s1",
            &["2024-03-04", "2024-03-01", "2024-03-02", "2024-03-02", "2024-03-03", "2024-03-07"],
        );
        assert_eq!(longest_log_streak(&snapshot, "s1"), 4);
        assert_eq!(longest_log_streak(&snapshot, "other"), 0);
    }

    #[test]
    fn five_day_streak_earns_badge_once() {
        let dates = ["2024-03-01", "2024-03-02", "2024-03-03", "2024-03-04", "2024-03-05"];
        let mut snapshot = snapshot_with_logs("s1", &dates);
        let action = SyncAction::AddLog(log("s1", "2024-03-05"));

        let earned = earned_after(&snapshot, &action);
        assert_eq!(
            earned,
            vec![EarnedBadge {
                user_id: "s1".into(),
                badge_id: BADGE_STREAK
            }]
        );

        snapshot.insert(UserBadge::normalize(&json!({ "id": "ub1", "user_id": "s1", "badge_id": BADGE_STREAK })));
        assert!(earned_after(&snapshot, &action).is_empty());
    }

    #[test]
    fn streak_spanning_month_boundary() {
        let snapshot = snapshot_with_logs(
            "s1",
            &["2024-02-27T09:00:00Z", "2024-02-28", "2024-02-29", "2024-03-01", "2024-03-02"],
        );
        assert_eq!(longest_log_streak(&snapshot, "s1"), 5);
    }

    #[test]
    fn tenth_completed_task_earns_task_master() {
        let mut snapshot = Snapshot::new();
        for i in 0..10 {
            snapshot.insert(Task::normalize(&json!({
                "id": format!("t{}", i),
                "assigned_to_id": "s1",
                "status": "COMPLETED",
            })));
        }
        let action = SyncAction::UpdateTaskStatus {
            id: "t9".into(),
            status: TaskStatus::Completed,
        };
        let earned = earned_after(&snapshot, &action);
        assert_eq!(earned.len(), 1);
        assert_eq!(earned[0].badge_id, BADGE_TASK_MASTER);

        let in_progress = SyncAction::UpdateTaskStatus {
            id: "t9".into(),
            status: TaskStatus::InProgress,
        };
        assert!(earned_after(&snapshot, &in_progress).is_empty());
    }

    #[test]
    fn praise_feedback_rewards_assignee() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(Task::normalize(&json!({ "id": "t1", "assigned_to_id": "s1" })));

        let praise = SyncAction::GiveFeedback {
            id: "t1".into(),
            feedback: TaskFeedback {
                feedback_type: crate::storage::FEEDBACK_PRAISE.into(),
                comment: "great".into(),
                given_at: None,
            },
        };
        let earned = earned_after(&snapshot, &praise);
        assert_eq!(earned[0].user_id, "s1");
        assert_eq!(earned[0].badge_id, BADGE_PRAISED);

        let critique = SyncAction::GiveFeedback {
            id: "t1".into(),
            feedback: TaskFeedback {
                feedback_type: "CONSTRUCTIVE".into(),
                comment: "tighten scope".into(),
                given_at: None,
            },
        };
        assert!(earned_after(&snapshot, &critique).is_empty());
    }
}
