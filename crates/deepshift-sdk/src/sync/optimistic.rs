//! 第一阶段：乐观的本地修改
//!
//! 这里的函数只操作 `&mut Snapshot`，不做任何 I/O。每个函数把用户意图应用到
//! 本地快照上，并返回描述这次修改的 `SyncAction`，交给第二阶段确认。
//! 新记录的 ID 在这里生成。

use serde_json::Value;

use crate::error::{DeepshiftSDKError, Result};
use crate::storage::queue::{GoalUpdate, LogStatusUpdate, SiteVisitUpdate, SyncAction};
use crate::storage::*;
use crate::utils::{generate_id, TimeFormatter};

// ========== 草稿（新建记录时由调用方提供的字段） ==========

#[derive(Debug, Clone, Default)]
pub struct NewLog {
    pub student_id: String,
    /// `YYYY-MM-DD` 或 ISO-8601
    pub date: String,
    pub hours_worked: f64,
    pub activity_description: String,
    pub challenges: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub assigned_to_id: String,
    pub assigned_by_id: String,
    pub priority: String,
    pub due_date: String,
    pub linked_goal_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewTaskComment {
    pub task_id: String,
    pub author_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewReport {
    pub student_id: String,
    pub report_type: String,
    pub period_start: String,
    pub period_end: String,
    pub summary: String,
    pub key_learnings: String,
    pub next_steps: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewGoal {
    pub student_id: String,
    pub description: String,
    pub category: String,
    pub alignment: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewEvaluation {
    pub student_id: String,
    pub supervisor_id: String,
    pub evaluation_type: String,
    pub scores: Vec<Value>,
    pub overall_feedback: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub sender_id: String,
    pub content: String,
    pub channel: String,
    pub related_student_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewLeaveRequest {
    pub student_id: String,
    pub start_date: String,
    pub end_date: String,
    pub leave_type: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewSiteVisit {
    pub student_id: String,
    pub visitor_id: String,
    pub date: String,
    pub location: String,
    pub purpose: String,
    pub notes: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewResource {
    pub title: String,
    /// `LINK`、`PDF`、`DOC` ...
    pub resource_type: String,
    pub url: String,
    pub uploaded_by: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewSkillAssessment {
    pub student_id: String,
    pub rater_id: String,
    pub role: Role,
    /// 为空时取当前时间
    pub date: String,
    pub ratings: Vec<Value>,
}

fn or_default(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

fn not_found(kind: EntityKind, id: &str) -> DeepshiftSDKError {
    DeepshiftSDKError::NotFound(format!("{} {}", kind, id))
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DeepshiftSDKError::InvalidArgument(format!("{} 不能为空", field)));
    }
    Ok(())
}

// ========== 日志 ==========

pub fn add_log(snapshot: &mut Snapshot, draft: NewLog) -> Result<SyncAction> {
    require_text("student_id", &draft.student_id)?;
    if !draft.hours_worked.is_finite() || draft.hours_worked < 0.0 {
        return Err(DeepshiftSDKError::InvalidArgument(format!(
            "hours_worked 非法: {}",
            draft.hours_worked
        )));
    }
    let log = LogEntry {
        id: generate_id(),
        student_id: draft.student_id,
        date: or_default(draft.date, &TimeFormatter::now_iso8601()),
        hours_worked: draft.hours_worked,
        activity_description: draft.activity_description,
        challenges: draft.challenges,
        status: LogStatus::Pending,
        supervisor_comment: None,
    };
    snapshot.insert(log.clone());
    Ok(SyncAction::AddLog(log))
}

/// 导师审批日志
pub fn review_log(
    snapshot: &mut Snapshot,
    log_id: &str,
    approved: bool,
    comment: Option<String>,
) -> Result<SyncAction> {
    let status = if approved {
        LogStatus::Approved
    } else {
        LogStatus::Rejected
    };
    let updates = LogStatusUpdate {
        status,
        supervisor_comment: comment,
    };
    let found = snapshot.update_by_id::<LogEntry, _>(log_id, |log| {
        log.status = updates.status;
        log.supervisor_comment = updates.supervisor_comment.clone();
    });
    if !found {
        return Err(not_found(EntityKind::Logs, log_id));
    }
    Ok(SyncAction::UpdateLogStatus {
        id: log_id.to_string(),
        updates,
    })
}

// ========== 任务 ==========

pub fn add_task(snapshot: &mut Snapshot, draft: NewTask) -> Result<SyncAction> {
    require_text("title", &draft.title)?;
    let task = Task {
        id: generate_id(),
        title: draft.title,
        description: draft.description,
        assigned_to_id: draft.assigned_to_id,
        assigned_by_id: draft.assigned_by_id,
        status: TaskStatus::Todo,
        priority: or_default(draft.priority, "MEDIUM"),
        due_date: draft.due_date,
        created_at: TimeFormatter::now_iso8601(),
        deliverable: None,
        feedback: None,
        linked_goal_id: draft.linked_goal_id.filter(|id| !id.is_empty()),
        comments: Vec::new(),
    };
    snapshot.insert(task.clone());
    Ok(SyncAction::AddTask(task))
}

pub fn update_task_status(
    snapshot: &mut Snapshot,
    task_id: &str,
    status: TaskStatus,
) -> Result<SyncAction> {
    if !snapshot.update_by_id::<Task, _>(task_id, |task| task.status = status) {
        return Err(not_found(EntityKind::Tasks, task_id));
    }
    Ok(SyncAction::UpdateTaskStatus {
        id: task_id.to_string(),
        status,
    })
}

/// 提交交付物，任务同时标记为完成
pub fn submit_deliverable(
    snapshot: &mut Snapshot,
    task_id: &str,
    url: String,
    notes: Option<String>,
) -> Result<SyncAction> {
    require_text("url", &url)?;
    let deliverable = TaskDeliverable {
        url,
        notes,
        submitted_at: TimeFormatter::now_iso8601(),
    };
    let status = TaskStatus::Completed;
    let found = snapshot.update_by_id::<Task, _>(task_id, |task| {
        task.deliverable = Some(deliverable.clone());
        task.status = status;
    });
    if !found {
        return Err(not_found(EntityKind::Tasks, task_id));
    }
    Ok(SyncAction::SubmitDeliverable {
        id: task_id.to_string(),
        deliverable,
        status,
    })
}

pub fn add_task_comment(snapshot: &mut Snapshot, draft: NewTaskComment) -> Result<SyncAction> {
    require_text("content", &draft.content)?;
    if snapshot.find::<Task>(&draft.task_id).is_none() {
        return Err(not_found(EntityKind::Tasks, &draft.task_id));
    }
    let comment = TaskComment {
        id: generate_id(),
        task_id: draft.task_id,
        author_id: draft.author_id,
        content: draft.content,
        created_at: TimeFormatter::now_iso8601(),
    };
    snapshot.insert(comment.clone());
    Ok(SyncAction::AddTaskComment(comment))
}

pub fn give_feedback(
    snapshot: &mut Snapshot,
    task_id: &str,
    feedback_type: String,
    comment: String,
) -> Result<SyncAction> {
    require_text("feedback_type", &feedback_type)?;
    let feedback = TaskFeedback {
        feedback_type,
        comment,
        given_at: Some(TimeFormatter::now_iso8601()),
    };
    let found = snapshot.update_by_id::<Task, _>(task_id, |task| {
        task.feedback = Some(feedback.clone());
    });
    if !found {
        return Err(not_found(EntityKind::Tasks, task_id));
    }
    Ok(SyncAction::GiveFeedback {
        id: task_id.to_string(),
        feedback,
    })
}

// ========== 报告 / 目标 / 评估 ==========

pub fn add_report(snapshot: &mut Snapshot, draft: NewReport) -> Result<SyncAction> {
    require_text("student_id", &draft.student_id)?;
    let report = Report {
        id: generate_id(),
        student_id: draft.student_id,
        report_type: or_default(draft.report_type, "WEEKLY"),
        period_start: draft.period_start,
        period_end: draft.period_end,
        summary: draft.summary,
        key_learnings: draft.key_learnings,
        next_steps: draft.next_steps,
        submitted_at: TimeFormatter::now_iso8601(),
    };
    snapshot.insert(report.clone());
    Ok(SyncAction::AddReport(report))
}

pub fn add_goal(snapshot: &mut Snapshot, draft: NewGoal) -> Result<SyncAction> {
    require_text("description", &draft.description)?;
    let goal = Goal {
        id: generate_id(),
        student_id: draft.student_id,
        description: draft.description,
        category: draft.category,
        alignment: draft.alignment,
        status: GoalStatus::NotStarted,
        progress: 0,
    };
    snapshot.insert(goal.clone());
    Ok(SyncAction::AddGoal(goal))
}

pub fn update_goal(snapshot: &mut Snapshot, goal_id: &str, updates: GoalUpdate) -> Result<SyncAction> {
    if updates.is_empty() {
        return Err(DeepshiftSDKError::InvalidArgument("目标更新内容为空".to_string()));
    }
    if let Some(progress) = updates.progress {
        if !(0..=100).contains(&progress) {
            return Err(DeepshiftSDKError::InvalidArgument(format!(
                "progress 超出范围: {}",
                progress
            )));
        }
    }
    if !snapshot.update_by_id::<Goal, _>(goal_id, |goal| updates.apply(goal)) {
        return Err(not_found(EntityKind::Goals, goal_id));
    }
    Ok(SyncAction::UpdateGoal {
        id: goal_id.to_string(),
        updates,
    })
}

pub fn delete_goal(snapshot: &mut Snapshot, goal_id: &str) -> Result<SyncAction> {
    if !snapshot.remove_by_id::<Goal>(goal_id) {
        return Err(not_found(EntityKind::Goals, goal_id));
    }
    Ok(SyncAction::DeleteGoal {
        id: goal_id.to_string(),
    })
}

pub fn add_evaluation(snapshot: &mut Snapshot, draft: NewEvaluation) -> Result<SyncAction> {
    require_text("student_id", &draft.student_id)?;
    let evaluation = Evaluation {
        id: generate_id(),
        student_id: draft.student_id,
        supervisor_id: draft.supervisor_id,
        evaluation_type: or_default(draft.evaluation_type, "MID_TERM"),
        date: TimeFormatter::now_iso8601(),
        scores: draft.scores,
        overall_feedback: draft.overall_feedback,
    };
    snapshot.insert(evaluation.clone());
    Ok(SyncAction::AddEvaluation(evaluation))
}

pub fn add_skill_assessment(snapshot: &mut Snapshot, draft: NewSkillAssessment) -> Result<SyncAction> {
    require_text("student_id", &draft.student_id)?;
    let assessment = SkillAssessment {
        id: generate_id(),
        student_id: draft.student_id,
        rater_id: draft.rater_id,
        role: draft.role,
        date: or_default(draft.date, &TimeFormatter::now_iso8601()),
        ratings: draft.ratings,
    };
    snapshot.insert(assessment.clone());
    Ok(SyncAction::AddSkillAssessment(assessment))
}

// ========== 资源 / 通知 ==========

/// 资源类型为 `LINK` 时不需要上传文件
pub fn is_link_resource(resource_type: &str) -> bool {
    resource_type.is_empty() || resource_type.eq_ignore_ascii_case("LINK")
}

pub fn add_resource(snapshot: &mut Snapshot, draft: NewResource) -> Result<SyncAction> {
    require_text("title", &draft.title)?;
    require_text("url", &draft.url)?;
    let resource = Resource {
        id: generate_id(),
        title: draft.title,
        resource_type: or_default(draft.resource_type, "LINK"),
        url: draft.url,
        uploaded_by: draft.uploaded_by,
        upload_date: TimeFormatter::now_iso8601(),
    };
    snapshot.insert(resource.clone());
    Ok(SyncAction::AddResource(resource))
}

pub fn mark_notification_read(snapshot: &mut Snapshot, notification_id: &str) -> Result<SyncAction> {
    if !snapshot.update_by_id::<Notification, _>(notification_id, |n| n.read = true) {
        return Err(not_found(EntityKind::Notifications, notification_id));
    }
    Ok(SyncAction::MarkNotificationRead {
        id: notification_id.to_string(),
    })
}

// ========== 消息 / 请假 / 走访 / 考勤 ==========

pub fn send_message(snapshot: &mut Snapshot, draft: NewMessage) -> Result<SyncAction> {
    require_text("content", &draft.content)?;
    let message = Message {
        id: generate_id(),
        sender_id: draft.sender_id,
        content: draft.content,
        timestamp: TimeFormatter::now_iso8601(),
        channel: or_default(draft.channel, "DIRECT"),
        related_student_id: draft.related_student_id,
    };
    snapshot.insert(message.clone());
    Ok(SyncAction::AddMessage(message))
}

pub fn add_leave_request(snapshot: &mut Snapshot, draft: NewLeaveRequest) -> Result<SyncAction> {
    require_text("student_id", &draft.student_id)?;
    if let (Some(start), Some(end)) = (
        TimeFormatter::parse_date(&draft.start_date),
        TimeFormatter::parse_date(&draft.end_date),
    ) {
        if end < start {
            return Err(DeepshiftSDKError::InvalidArgument(
                "请假结束日期早于开始日期".to_string(),
            ));
        }
    }
    let leave = LeaveRequest {
        id: generate_id(),
        student_id: draft.student_id,
        start_date: draft.start_date,
        end_date: draft.end_date,
        leave_type: or_default(draft.leave_type, "SICK"),
        reason: draft.reason,
        status: LeaveStatus::Pending,
    };
    snapshot.insert(leave.clone());
    Ok(SyncAction::AddLeave(leave))
}

/// 审批请假
pub fn update_leave_status(
    snapshot: &mut Snapshot,
    leave_id: &str,
    status: LeaveStatus,
) -> Result<SyncAction> {
    if !snapshot.update_by_id::<LeaveRequest, _>(leave_id, |leave| leave.status = status) {
        return Err(not_found(EntityKind::LeaveRequests, leave_id));
    }
    Ok(SyncAction::UpdateLeaveStatus {
        id: leave_id.to_string(),
        status,
    })
}

pub fn add_site_visit(snapshot: &mut Snapshot, draft: NewSiteVisit) -> Result<SyncAction> {
    require_text("student_id", &draft.student_id)?;
    let visit = SiteVisit {
        id: generate_id(),
        student_id: draft.student_id,
        visitor_id: draft.visitor_id,
        date: draft.date,
        location: draft.location,
        purpose: draft.purpose,
        notes: draft.notes,
    };
    snapshot.insert(visit.clone());
    Ok(SyncAction::AddSiteVisit(visit))
}

pub fn update_site_visit(
    snapshot: &mut Snapshot,
    visit_id: &str,
    updates: SiteVisitUpdate,
) -> Result<SyncAction> {
    if updates.is_empty() {
        return Err(DeepshiftSDKError::InvalidArgument("走访更新内容为空".to_string()));
    }
    if !snapshot.update_by_id::<SiteVisit, _>(visit_id, |visit| updates.apply(visit)) {
        return Err(not_found(EntityKind::SiteVisits, visit_id));
    }
    Ok(SyncAction::UpdateSiteVisit {
        id: visit_id.to_string(),
        updates,
    })
}

pub fn delete_site_visit(snapshot: &mut Snapshot, visit_id: &str) -> Result<SyncAction> {
    if !snapshot.remove_by_id::<SiteVisit>(visit_id) {
        return Err(not_found(EntityKind::SiteVisits, visit_id));
    }
    Ok(SyncAction::DeleteSiteVisit {
        id: visit_id.to_string(),
    })
}

pub fn delete_attendance_exception(snapshot: &mut Snapshot, exception_id: &str) -> Result<SyncAction> {
    if !snapshot.remove_by_id::<AttendanceException>(exception_id) {
        return Err(not_found(EntityKind::AttendanceExceptions, exception_id));
    }
    Ok(SyncAction::DeleteAttendanceException {
        id: exception_id.to_string(),
    })
}

// ========== 徽章 ==========

pub fn has_badge(snapshot: &Snapshot, user_id: &str, badge_id: &str) -> bool {
    snapshot
        .user_badges
        .iter()
        .any(|ub| ub.user_id == user_id && ub.badge_id == badge_id)
}

/// 授予徽章；已经拥有时返回 `None`，快照不变
pub fn award_badge(snapshot: &mut Snapshot, user_id: &str, badge_id: &str) -> Option<SyncAction> {
    if user_id.is_empty() || has_badge(snapshot, user_id, badge_id) {
        return None;
    }
    let user_badge = UserBadge {
        id: generate_id(),
        user_id: user_id.to_string(),
        badge_id: badge_id.to_string(),
        earned_at: TimeFormatter::now_iso8601(),
    };
    snapshot.insert(user_badge.clone());
    Some(SyncAction::AddUserBadge(user_badge))
}
