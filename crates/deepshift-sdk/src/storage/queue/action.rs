//! 同步操作 - 受控枚举
//!
//! 每个变体对应一种用户修改，载荷类型在编译期确定。
//! 持久化形式为 `{"type": "ADD_LOG", "payload": {...}}`，与已发布客户端的队列格式一致。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::entities::*;
use crate::storage::entity_kind::EntityKind;
use crate::storage::normalize::Normalize;

/// 日志审批字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogStatusUpdate {
    pub status: LogStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supervisor_comment: Option<String>,
}

/// 目标的部分更新；只有 `Some` 的字段会发往远端
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<GoalStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<i64>,
}

impl GoalUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// 把更新应用到本地目标上
    pub fn apply(&self, goal: &mut Goal) {
        if let Some(description) = &self.description {
            goal.description = description.clone();
        }
        if let Some(category) = &self.category {
            goal.category = category.clone();
        }
        if let Some(alignment) = &self.alignment {
            goal.alignment = alignment.clone();
        }
        if let Some(status) = self.status {
            goal.status = status;
        }
        if let Some(progress) = self.progress {
            goal.progress = progress;
        }
    }
}

/// 走访记录的部分更新
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteVisitUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SiteVisitUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, visit: &mut SiteVisit) {
        if let Some(date) = &self.date {
            visit.date = date.clone();
        }
        if let Some(location) = &self.location {
            visit.location = location.clone();
        }
        if let Some(purpose) = &self.purpose {
            visit.purpose = purpose.clone();
        }
        if let Some(notes) = &self.notes {
            visit.notes = notes.clone();
        }
    }
}

/// 待同步的修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncAction {
    AddLog(LogEntry),
    UpdateLogStatus { id: String, updates: LogStatusUpdate },
    AddTask(Task),
    UpdateTaskStatus { id: String, status: TaskStatus },
    SubmitDeliverable {
        id: String,
        deliverable: TaskDeliverable,
        status: TaskStatus,
    },
    AddTaskComment(TaskComment),
    AddReport(Report),
    AddGoal(Goal),
    UpdateGoal { id: String, updates: GoalUpdate },
    AddEvaluation(Evaluation),
    AddMessage(Message),
    AddLeave(LeaveRequest),
    AddSiteVisit(SiteVisit),
    GiveFeedback { id: String, feedback: TaskFeedback },
    AddUserBadge(UserBadge),
    DeleteGoal { id: String },
    UpdateLeaveStatus { id: String, status: LeaveStatus },
    UpdateSiteVisit { id: String, updates: SiteVisitUpdate },
    DeleteSiteVisit { id: String },
    AddResource(Resource),
    AddSkillAssessment(SkillAssessment),
    MarkNotificationRead { id: String },
    DeleteAttendanceException { id: String },
}

/// 远端操作
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOp {
    /// 插入一行
    Insert { kind: EntityKind, row: Value },
    /// 按 ID 更新部分字段
    UpdateById {
        kind: EntityKind,
        id: String,
        patch: Value,
    },
    /// 按 ID 删除
    DeleteById { kind: EntityKind, id: String },
}

impl RemoteOp {
    pub fn kind(&self) -> EntityKind {
        match self {
            RemoteOp::Insert { kind, .. }
            | RemoteOp::UpdateById { kind, .. }
            | RemoteOp::DeleteById { kind, .. } => *kind,
        }
    }
}

fn insert<T: Entity>(item: &T) -> RemoteOp {
    RemoteOp::Insert {
        kind: T::KIND,
        row: item.to_raw(),
    }
}

fn update_by_id(kind: EntityKind, id: &str, patch: Value) -> RemoteOp {
    RemoteOp::UpdateById {
        kind,
        id: id.to_string(),
        patch,
    }
}

fn delete_by_id(kind: EntityKind, id: &str) -> RemoteOp {
    RemoteOp::DeleteById {
        kind,
        id: id.to_string(),
    }
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

impl SyncAction {
    /// 类型标签，与持久化格式中的 `type` 一致
    pub fn type_tag(&self) -> &'static str {
        match self {
            SyncAction::AddLog(_) => "ADD_LOG",
            SyncAction::UpdateLogStatus { .. } => "UPDATE_LOG_STATUS",
            SyncAction::AddTask(_) => "ADD_TASK",
            SyncAction::UpdateTaskStatus { .. } => "UPDATE_TASK_STATUS",
            SyncAction::SubmitDeliverable { .. } => "SUBMIT_DELIVERABLE",
            SyncAction::AddTaskComment(_) => "ADD_TASK_COMMENT",
            SyncAction::AddReport(_) => "ADD_REPORT",
            SyncAction::AddGoal(_) => "ADD_GOAL",
            SyncAction::UpdateGoal { .. } => "UPDATE_GOAL",
            SyncAction::AddEvaluation(_) => "ADD_EVALUATION",
            SyncAction::AddMessage(_) => "ADD_MESSAGE",
            SyncAction::AddLeave(_) => "ADD_LEAVE",
            SyncAction::AddSiteVisit(_) => "ADD_SITE_VISIT",
            SyncAction::GiveFeedback { .. } => "GIVE_FEEDBACK",
            SyncAction::AddUserBadge(_) => "ADD_USER_BADGE",
            SyncAction::DeleteGoal { .. } => "DELETE_GOAL",
            SyncAction::UpdateLeaveStatus { .. } => "UPDATE_LEAVE_STATUS",
            SyncAction::UpdateSiteVisit { .. } => "UPDATE_SITE_VISIT",
            SyncAction::DeleteSiteVisit { .. } => "DELETE_SITE_VISIT",
            SyncAction::AddResource(_) => "ADD_RESOURCE",
            SyncAction::AddSkillAssessment(_) => "ADD_SKILL_ASSESSMENT",
            SyncAction::MarkNotificationRead { .. } => "MARK_NOTIFICATION_READ",
            SyncAction::DeleteAttendanceException { .. } => "DELETE_ATTENDANCE_EXCEPTION",
        }
    }

    /// 被修改（或新建）记录的 ID
    pub fn entity_id(&self) -> &str {
        match self {
            SyncAction::AddLog(log) => &log.id,
            SyncAction::AddTask(task) => &task.id,
            SyncAction::AddTaskComment(comment) => &comment.id,
            SyncAction::AddReport(report) => &report.id,
            SyncAction::AddGoal(goal) => &goal.id,
            SyncAction::AddEvaluation(evaluation) => &evaluation.id,
            SyncAction::AddMessage(message) => &message.id,
            SyncAction::AddLeave(leave) => &leave.id,
            SyncAction::AddSiteVisit(visit) => &visit.id,
            SyncAction::AddUserBadge(badge) => &badge.id,
            SyncAction::AddResource(resource) => &resource.id,
            SyncAction::AddSkillAssessment(assessment) => &assessment.id,
            SyncAction::UpdateLogStatus { id, .. }
            | SyncAction::UpdateTaskStatus { id, .. }
            | SyncAction::SubmitDeliverable { id, .. }
            | SyncAction::UpdateGoal { id, .. }
            | SyncAction::GiveFeedback { id, .. }
            | SyncAction::DeleteGoal { id }
            | SyncAction::UpdateLeaveStatus { id, .. }
            | SyncAction::UpdateSiteVisit { id, .. }
            | SyncAction::DeleteSiteVisit { id }
            | SyncAction::MarkNotificationRead { id }
            | SyncAction::DeleteAttendanceException { id } => id,
        }
    }

    /// 路由到唯一的远端操作
    pub fn route(&self) -> RemoteOp {
        match self {
            SyncAction::AddLog(log) => insert(log),
            SyncAction::UpdateLogStatus { id, updates } => {
                update_by_id(EntityKind::Logs, id, to_value(updates))
            }
            SyncAction::AddTask(task) => insert(task),
            SyncAction::UpdateTaskStatus { id, status } => {
                update_by_id(EntityKind::Tasks, id, serde_json::json!({ "status": status }))
            }
            SyncAction::SubmitDeliverable {
                id,
                deliverable,
                status,
            } => update_by_id(
                EntityKind::Tasks,
                id,
                serde_json::json!({ "deliverable": deliverable, "status": status }),
            ),
            SyncAction::AddTaskComment(comment) => insert(comment),
            SyncAction::AddReport(report) => insert(report),
            SyncAction::AddGoal(goal) => insert(goal),
            SyncAction::UpdateGoal { id, updates } => {
                update_by_id(EntityKind::Goals, id, to_value(updates))
            }
            SyncAction::AddEvaluation(evaluation) => insert(evaluation),
            SyncAction::AddMessage(message) => insert(message),
            SyncAction::AddLeave(leave) => insert(leave),
            SyncAction::AddSiteVisit(visit) => insert(visit),
            SyncAction::GiveFeedback { id, feedback } => update_by_id(
                EntityKind::Tasks,
                id,
                serde_json::json!({ "feedback": feedback }),
            ),
            SyncAction::AddUserBadge(badge) => insert(badge),
            SyncAction::DeleteGoal { id } => delete_by_id(EntityKind::Goals, id),
            SyncAction::UpdateLeaveStatus { id, status } => update_by_id(
                EntityKind::LeaveRequests,
                id,
                serde_json::json!({ "status": status }),
            ),
            SyncAction::UpdateSiteVisit { id, updates } => {
                update_by_id(EntityKind::SiteVisits, id, to_value(updates))
            }
            SyncAction::DeleteSiteVisit { id } => delete_by_id(EntityKind::SiteVisits, id),
            SyncAction::AddResource(resource) => insert(resource),
            SyncAction::AddSkillAssessment(assessment) => insert(assessment),
            SyncAction::MarkNotificationRead { id } => update_by_id(
                EntityKind::Notifications,
                id,
                serde_json::json!({ "read": true }),
            ),
            SyncAction::DeleteAttendanceException { id } => {
                delete_by_id(EntityKind::AttendanceExceptions, id)
            }
        }
    }
}
