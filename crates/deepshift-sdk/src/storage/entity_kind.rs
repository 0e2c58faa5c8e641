//! 实体类型枚举 - 受控枚举
//!
//! 每个实体类型同时拥有远端表名（`as_table`）和本地持久化键（`storage_key`），
//! 两者都是稳定值，新增类型需与后端表结构同步。

use std::str::FromStr;

/// 快照中的实体集合类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Users,
    Logs,
    Tasks,
    TaskComments,
    Reports,
    Goals,
    Resources,
    Evaluations,
    Messages,
    Meetings,
    Notifications,
    Skills,
    SkillAssessments,
    Badges,
    UserBadges,
    LeaveRequests,
    SiteVisits,
    AttendanceExceptions,
}

impl EntityKind {
    /// 全部类型（全量拉取与加载顺序）
    pub const ALL: [EntityKind; 18] = [
        EntityKind::Users,
        EntityKind::Logs,
        EntityKind::Tasks,
        EntityKind::TaskComments,
        EntityKind::Reports,
        EntityKind::Goals,
        EntityKind::Resources,
        EntityKind::Evaluations,
        EntityKind::Messages,
        EntityKind::Meetings,
        EntityKind::Notifications,
        EntityKind::Skills,
        EntityKind::SkillAssessments,
        EntityKind::Badges,
        EntityKind::UserBadges,
        EntityKind::LeaveRequests,
        EntityKind::SiteVisits,
        EntityKind::AttendanceExceptions,
    ];

    /// 远端表名
    pub fn as_table(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Logs => "logs",
            Self::Tasks => "tasks",
            Self::TaskComments => "task_comments",
            Self::Reports => "reports",
            Self::Goals => "goals",
            Self::Resources => "resources",
            Self::Evaluations => "evaluations",
            Self::Messages => "messages",
            Self::Meetings => "meetings",
            Self::Notifications => "notifications",
            Self::Skills => "skills",
            Self::SkillAssessments => "skill_assessments",
            Self::Badges => "badges",
            Self::UserBadges => "user_badges",
            Self::LeaveRequests => "leave_requests",
            Self::SiteVisits => "site_visits",
            Self::AttendanceExceptions => "attendance_exceptions",
        }
    }

    /// 本地持久化键（不含 `deepshift_` 前缀），沿用已发布客户端的键名
    pub fn storage_key(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Logs => "logs",
            Self::Tasks => "tasks",
            Self::TaskComments => "taskComments",
            Self::Reports => "reports",
            Self::Goals => "goals",
            Self::Resources => "resources",
            Self::Evaluations => "evaluations",
            Self::Messages => "messages",
            Self::Meetings => "meetings",
            Self::Notifications => "notifications",
            Self::Skills => "skills",
            Self::SkillAssessments => "assessments",
            Self::Badges => "badges",
            Self::UserBadges => "userBadges",
            Self::LeaveRequests => "leaves",
            Self::SiteVisits => "visits",
            Self::AttendanceExceptions => "exceptions",
        }
    }
}

impl FromStr for EntityKind {
    type Err = ();

    /// 按远端表名解析
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_table() == s)
            .ok_or(())
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_table())
    }
}
