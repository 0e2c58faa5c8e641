//! 实体定义 - 实习管理门户的领域记录
//!
//! 所有实体：
//! - `Serialize` 输出即线上表示（snake_case 字段名，字段名与远端表列一致）
//! - `Deserialize` 经由 [`Normalize`]，对残缺记录同样成功
//! - ID 在客户端用 UUID 生成，乐观插入不会与服务端 ID 冲突

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entity_kind::EntityKind;
use super::normalize::{deserialize_via_normalize, Fields, Normalize};

/// 带稳定标识符的领域记录
pub trait Entity: Normalize + Serialize + Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &str;
}

// ========== 枚举 ==========

/// 用户角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    Student,
    Supervisor,
    Admin,
}

/// 工作日志审批状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// 任务看板列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
    Overdue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoalStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    #[default]
    Info,
    Alert,
    Announcement,
}

/// 表扬类反馈的类型值，触发徽章奖励
pub const FEEDBACK_PRAISE: &str = "PRAISE";

// ========== 内嵌对象（以 JSON 列存储，保留客户端 camelCase 键） ==========

/// 任务交付物
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskDeliverable {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub submitted_at: String,
}

/// 导师对任务的反馈
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskFeedback {
    #[serde(rename = "type")]
    pub feedback_type: String,
    pub comment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_at: Option<String>,
}

impl TaskFeedback {
    pub fn is_praise(&self) -> bool {
        self.feedback_type == FEEDBACK_PRAISE
    }
}

// ========== 实体 ==========

/// 用户（学生 / 导师 / 管理员）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub avatar: String,
    pub total_hours_required: i64,
    pub assigned_supervisor_id: Option<String>,
    pub internship_start_date: Option<String>,
    pub internship_end_date: Option<String>,
    pub institution: Option<String>,
    pub department: Option<String>,
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub hobbies: Vec<String>,
    pub profile_skills: Vec<String>,
    pub achievements: Vec<String>,
    pub future_goals: Vec<String>,
    pub institute_supervisor_name: Option<String>,
    pub institute_supervisor_phone: Option<String>,
    pub next_of_kin_name: Option<String>,
    pub next_of_kin_relationship: Option<String>,
    pub next_of_kin_phone: Option<String>,
}

/// 默认实习总时长（小时）
pub const DEFAULT_HOURS_REQUIRED: i64 = 120;

impl Normalize for User {
    fn normalize(raw: &Value) -> Self {
        let f = Fields::of(raw);
        Self {
            id: f.text("id"),
            name: f.text_or("name", "Unknown User"),
            email: f.text("email"),
            role: f.enumeration("role"),
            avatar: f.text("avatar"),
            total_hours_required: f.integer_or("total_hours_required", DEFAULT_HOURS_REQUIRED),
            assigned_supervisor_id: f.opt_text("assigned_supervisor_id"),
            internship_start_date: f.opt_text("internship_start_date"),
            internship_end_date: f.opt_text("internship_end_date"),
            institution: f.opt_text("institution"),
            department: f.opt_text("department"),
            bio: f.opt_text("bio"),
            phone: f.opt_text("phone"),
            hobbies: f.list("hobbies"),
            profile_skills: f.list("profile_skills"),
            achievements: f.list("achievements"),
            future_goals: f.list("future_goals"),
            institute_supervisor_name: f.opt_text("institute_supervisor_name"),
            institute_supervisor_phone: f.opt_text("institute_supervisor_phone"),
            next_of_kin_name: f.opt_text("next_of_kin_name"),
            next_of_kin_relationship: f.opt_text("next_of_kin_relationship"),
            next_of_kin_phone: f.opt_text("next_of_kin_phone"),
        }
    }
}

/// 工作日志
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub id: String,
    pub student_id: String,
    pub date: String,
    pub hours_worked: f64,
    pub activity_description: String,
    pub challenges: Option<String>,
    pub status: LogStatus,
    pub supervisor_comment: Option<String>,
}

impl Normalize for LogEntry {
    fn normalize(raw: &Value) -> Self {
        let f = Fields::of(raw);
        Self {
            id: f.text("id"),
            student_id: f.text("student_id"),
            date: f.timestamp("date"),
            hours_worked: f.number("hours_worked"),
            activity_description: f.text("activity_description"),
            challenges: f.opt_text("challenges"),
            status: f.enumeration("status"),
            supervisor_comment: f.opt_text("supervisor_comment"),
        }
    }
}

/// 任务
///
/// `comments` 只存在于内存视图中，由 [`crate::views`] 组合，不参与序列化。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub assigned_to_id: String,
    pub assigned_by_id: String,
    pub status: TaskStatus,
    pub priority: String,
    pub due_date: String,
    pub created_at: String,
    pub deliverable: Option<TaskDeliverable>,
    pub feedback: Option<TaskFeedback>,
    pub linked_goal_id: Option<String>,
    #[serde(skip)]
    pub comments: Vec<TaskComment>,
}

impl Normalize for Task {
    fn normalize(raw: &Value) -> Self {
        let f = Fields::of(raw);
        Self {
            id: f.text("id"),
            title: f.text("title"),
            description: f.text("description"),
            assigned_to_id: f.text("assigned_to_id"),
            assigned_by_id: f.text("assigned_by_id"),
            status: f.enumeration("status"),
            priority: f.text_or("priority", "MEDIUM"),
            due_date: f.text("due_date"),
            created_at: f.timestamp("created_at"),
            deliverable: f.object("deliverable"),
            feedback: f.object("feedback"),
            linked_goal_id: f.opt_text("linked_goal_id"),
            comments: Vec::new(),
        }
    }
}

/// 任务评论
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskComment {
    pub id: String,
    pub task_id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: String,
}

impl Normalize for TaskComment {
    fn normalize(raw: &Value) -> Self {
        let f = Fields::of(raw);
        Self {
            id: f.text("id"),
            task_id: f.text("task_id"),
            author_id: f.text("author_id"),
            content: f.text("content"),
            created_at: f.timestamp("created_at"),
        }
    }
}

/// 周期报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub id: String,
    pub student_id: String,
    #[serde(rename = "type")]
    pub report_type: String,
    pub period_start: String,
    pub period_end: String,
    pub summary: String,
    pub key_learnings: String,
    pub next_steps: String,
    pub submitted_at: String,
}

impl Normalize for Report {
    fn normalize(raw: &Value) -> Self {
        let f = Fields::of(raw);
        Self {
            id: f.text("id"),
            student_id: f.text("student_id"),
            report_type: f.text_or("type", "WEEKLY"),
            period_start: f.text("period_start"),
            period_end: f.text("period_end"),
            summary: f.text("summary"),
            key_learnings: f.text("key_learnings"),
            next_steps: f.text("next_steps"),
            submitted_at: f.timestamp("submitted_at"),
        }
    }
}

/// 学习目标
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Goal {
    pub id: String,
    pub student_id: String,
    pub description: String,
    pub category: String,
    pub alignment: String,
    pub status: GoalStatus,
    pub progress: i64,
}

impl Normalize for Goal {
    fn normalize(raw: &Value) -> Self {
        let f = Fields::of(raw);
        Self {
            id: f.text("id"),
            student_id: f.text("student_id"),
            description: f.text("description"),
            category: f.text("category"),
            alignment: f.text("alignment"),
            status: f.enumeration("status"),
            progress: f.integer("progress"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub url: String,
    pub uploaded_by: String,
    pub upload_date: String,
}

impl Normalize for Resource {
    fn normalize(raw: &Value) -> Self {
        let f = Fields::of(raw);
        Self {
            id: f.text("id"),
            title: f.text("title"),
            resource_type: f.text_or("type", "LINK"),
            url: f.text_or("url", "#"),
            uploaded_by: f.text("uploaded_by"),
            upload_date: f.timestamp("upload_date"),
        }
    }
}

/// 导师评估；评分项结构由后端决定，这里原样保留
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub id: String,
    pub student_id: String,
    pub supervisor_id: String,
    #[serde(rename = "type")]
    pub evaluation_type: String,
    pub date: String,
    pub scores: Vec<Value>,
    pub overall_feedback: String,
}

impl Normalize for Evaluation {
    fn normalize(raw: &Value) -> Self {
        let f = Fields::of(raw);
        Self {
            id: f.text("id"),
            student_id: f.text("student_id"),
            supervisor_id: f.text("supervisor_id"),
            evaluation_type: f.text_or("type", "MID_TERM"),
            date: f.timestamp("date"),
            scores: f.list("scores"),
            overall_feedback: f.text("overall_feedback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub content: String,
    pub timestamp: String,
    pub channel: String,
    pub related_student_id: String,
}

impl Normalize for Message {
    fn normalize(raw: &Value) -> Self {
        let f = Fields::of(raw);
        Self {
            id: f.text("id"),
            sender_id: f.text("sender_id"),
            content: f.text("content"),
            timestamp: f.timestamp("timestamp"),
            channel: f.text_or("channel", "DIRECT"),
            related_student_id: f.text("related_student_id"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Meeting {
    pub id: String,
    pub title: String,
    pub organizer_id: String,
    pub date: String,
    pub time: String,
    pub attendees: Vec<String>,
    pub link: Option<String>,
}

impl Normalize for Meeting {
    fn normalize(raw: &Value) -> Self {
        let f = Fields::of(raw);
        Self {
            id: f.text("id"),
            title: f.text("title"),
            organizer_id: f.text("organizer_id"),
            date: f.text("date"),
            time: f.text("time"),
            attendees: f.list("attendees"),
            link: f.opt_text("link"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub sender_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub timestamp: String,
    pub read: bool,
}

impl Normalize for Notification {
    fn normalize(raw: &Value) -> Self {
        let f = Fields::of(raw);
        Self {
            id: f.text("id"),
            recipient_id: f.text("recipient_id"),
            sender_id: f.text("sender_id"),
            title: f.text("title"),
            message: f.text("message"),
            notification_type: f.enumeration("type"),
            timestamp: f.timestamp("timestamp"),
            read: f.flag("read"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub category: String,
}

impl Normalize for Skill {
    fn normalize(raw: &Value) -> Self {
        let f = Fields::of(raw);
        Self {
            id: f.text("id"),
            name: f.text("name"),
            category: f.text_or("category", "Technical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillAssessment {
    pub id: String,
    pub student_id: String,
    pub rater_id: String,
    pub role: Role,
    pub date: String,
    pub ratings: Vec<Value>,
}

impl Normalize for SkillAssessment {
    fn normalize(raw: &Value) -> Self {
        let f = Fields::of(raw);
        Self {
            id: f.text("id"),
            student_id: f.text("student_id"),
            rater_id: f.text("rater_id"),
            role: f.enumeration("role"),
            date: f.timestamp("date"),
            ratings: f.list("ratings"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub color: String,
    pub points: i64,
}

impl Normalize for Badge {
    fn normalize(raw: &Value) -> Self {
        let f = Fields::of(raw);
        Self {
            id: f.text("id"),
            name: f.text("name"),
            description: f.text("description"),
            icon: f.text_or("icon", "Star"),
            color: f.text_or("color", "bg-gray-100"),
            points: f.integer("points"),
        }
    }
}

/// 用户已获得的徽章
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserBadge {
    pub id: String,
    pub user_id: String,
    pub badge_id: String,
    pub earned_at: String,
}

impl Normalize for UserBadge {
    fn normalize(raw: &Value) -> Self {
        let f = Fields::of(raw);
        Self {
            id: f.text("id"),
            user_id: f.text("user_id"),
            badge_id: f.text("badge_id"),
            earned_at: f.timestamp("earned_at"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaveRequest {
    pub id: String,
    pub student_id: String,
    pub start_date: String,
    pub end_date: String,
    #[serde(rename = "type")]
    pub leave_type: String,
    pub reason: String,
    pub status: LeaveStatus,
}

impl Normalize for LeaveRequest {
    fn normalize(raw: &Value) -> Self {
        let f = Fields::of(raw);
        Self {
            id: f.text("id"),
            student_id: f.text("student_id"),
            start_date: f.text("start_date"),
            end_date: f.text("end_date"),
            leave_type: f.text_or("type", "SICK"),
            reason: f.text("reason"),
            status: f.enumeration("status"),
        }
    }
}

/// 导师实地走访记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteVisit {
    pub id: String,
    pub student_id: String,
    pub visitor_id: String,
    pub date: String,
    pub location: String,
    pub purpose: String,
    pub notes: String,
}

impl Normalize for SiteVisit {
    fn normalize(raw: &Value) -> Self {
        let f = Fields::of(raw);
        Self {
            id: f.text("id"),
            student_id: f.text("student_id"),
            visitor_id: f.text("visitor_id"),
            date: f.text("date"),
            location: f.text("location"),
            purpose: f.text("purpose"),
            notes: f.text("notes"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceException {
    pub id: String,
    pub student_id: String,
    pub date: String,
    pub reason: String,
    #[serde(rename = "type")]
    pub exception_type: String,
}

impl Normalize for AttendanceException {
    fn normalize(raw: &Value) -> Self {
        let f = Fields::of(raw);
        Self {
            id: f.text("id"),
            student_id: f.text("student_id"),
            date: f.text("date"),
            reason: f.text("reason"),
            exception_type: f.text_or("type", "EXCUSED"),
        }
    }
}

deserialize_via_normalize!(
    User,
    LogEntry,
    Task,
    TaskComment,
    Report,
    Goal,
    Resource,
    Evaluation,
    Message,
    Meeting,
    Notification,
    Skill,
    SkillAssessment,
    Badge,
    UserBadge,
    LeaveRequest,
    SiteVisit,
    AttendanceException,
);

macro_rules! impl_entity {
    ($($ty:ty => $kind:expr),* $(,)?) => {
        $(
            impl Entity for $ty {
                const KIND: EntityKind = $kind;

                fn id(&self) -> &str {
                    &self.id
                }
            }
        )*
    };
}

impl_entity!(
    User => EntityKind::Users,
    LogEntry => EntityKind::Logs,
    Task => EntityKind::Tasks,
    TaskComment => EntityKind::TaskComments,
    Report => EntityKind::Reports,
    Goal => EntityKind::Goals,
    Resource => EntityKind::Resources,
    Evaluation => EntityKind::Evaluations,
    Message => EntityKind::Messages,
    Meeting => EntityKind::Meetings,
    Notification => EntityKind::Notifications,
    Skill => EntityKind::Skills,
    SkillAssessment => EntityKind::SkillAssessments,
    Badge => EntityKind::Badges,
    UserBadge => EntityKind::UserBadges,
    LeaveRequest => EntityKind::LeaveRequests,
    SiteVisit => EntityKind::SiteVisits,
    AttendanceException => EntityKind::AttendanceExceptions,
);
