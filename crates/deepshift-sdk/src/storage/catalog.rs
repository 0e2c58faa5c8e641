//! 默认目录 - 远端与本地都没有技能/徽章数据时使用

use super::entities::{Badge, Skill};

/// 连续 5 天提交日志
pub const BADGE_STREAK: &str = "b1";
/// 累计完成 10 个任务
pub const BADGE_TASK_MASTER: &str = "b2";
/// 达成一个学习目标
pub const BADGE_GOAL_GETTER: &str = "b3";
/// 获得导师表扬
pub const BADGE_PRAISED: &str = "b4";

pub fn default_badges() -> Vec<Badge> {
    let badge = |id: &str, name: &str, description: &str, icon: &str, color: &str, points| Badge {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        icon: icon.to_string(),
        color: color.to_string(),
        points,
    };
    vec![
        badge(
            BADGE_STREAK,
            "Consistency Streak",
            "Logged work 5 days in a row",
            "Flame",
            "bg-orange-100",
            50,
        ),
        badge(
            BADGE_TASK_MASTER,
            "Task Master",
            "Completed 10 tasks",
            "CheckCircle",
            "bg-green-100",
            100,
        ),
        badge(
            BADGE_GOAL_GETTER,
            "Goal Getter",
            "Completed a learning goal",
            "Target",
            "bg-blue-100",
            75,
        ),
        badge(
            BADGE_PRAISED,
            "Rising Star",
            "Received praise from a supervisor",
            "Star",
            "bg-yellow-100",
            25,
        ),
    ]
}

pub fn default_skills() -> Vec<Skill> {
    [
        ("s1", "Communication", "Soft"),
        ("s2", "Teamwork", "Soft"),
        ("s3", "Problem Solving", "Soft"),
        ("s4", "Time Management", "Soft"),
        ("s5", "Programming", "Technical"),
        ("s6", "Data Analysis", "Technical"),
        ("s7", "Technical Writing", "Technical"),
    ]
    .into_iter()
    .map(|(id, name, category)| Skill {
        id: id.to_string(),
        name: name.to_string(),
        category: category.to_string(),
    })
    .collect()
}
