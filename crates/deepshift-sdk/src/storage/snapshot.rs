//! 本地快照 - 每种实体一个集合
//!
//! 每个集合是 `Arc<Vec<T>>`。任何修改都会分配新的 `Arc`，
//! 因此：
//! - 克隆快照只复制指针
//! - 派生视图可以按指针判断输入是否变化
//! - 持久化时按指针比对，只写入变化过的集合

use std::sync::Arc;

use serde_json::Value;

use super::catalog;
use super::entities::*;
use super::entity_kind::EntityKind;
use super::normalize::Normalize;

/// 在快照中拥有一个集合槽位的实体
pub trait Collected: Entity {
    fn slot(snapshot: &Snapshot) -> &Arc<Vec<Self>>;
    fn slot_mut(snapshot: &mut Snapshot) -> &mut Arc<Vec<Self>>;
}

macro_rules! snapshot_collections {
    ($($field:ident: $ty:ty => $kind:ident),* $(,)?) => {
        /// 全部实体集合的不可变快照
        #[derive(Debug, Clone, Default)]
        pub struct Snapshot {
            $(pub $field: Arc<Vec<$ty>>,)*
        }

        $(
            impl Collected for $ty {
                fn slot(snapshot: &Snapshot) -> &Arc<Vec<Self>> {
                    &snapshot.$field
                }

                fn slot_mut(snapshot: &mut Snapshot) -> &mut Arc<Vec<Self>> {
                    &mut snapshot.$field
                }
            }
        )*

        impl Snapshot {
            /// 指定集合的线上表示（JSON 数组）
            pub fn raw(&self, kind: EntityKind) -> Value {
                match kind {
                    $(EntityKind::$kind => Value::Array(
                        self.$field.iter().map(|item| item.to_raw()).collect(),
                    ),)*
                }
            }

            /// 用原始数据整体替换某个集合；非数组视为空集合
            pub fn load_raw(&mut self, kind: EntityKind, raw: &Value) {
                let items: &[Value] = raw.as_array().map(Vec::as_slice).unwrap_or(&[]);
                match kind {
                    $(EntityKind::$kind => {
                        self.$field = Arc::new(<$ty>::normalize_all(items));
                    })*
                }
            }

            pub fn len_of(&self, kind: EntityKind) -> usize {
                match kind {
                    $(EntityKind::$kind => self.$field.len(),)*
                }
            }

            /// 两个快照中指向同一份数据的集合
            fn same_collection(&self, other: &Snapshot, kind: EntityKind) -> bool {
                match kind {
                    $(EntityKind::$kind => Arc::ptr_eq(&self.$field, &other.$field),)*
                }
            }

            /// 从 `other` 拿过某个集合（共享指针，不复制数据）
            pub fn adopt(&mut self, kind: EntityKind, other: &Snapshot) {
                match kind {
                    $(EntityKind::$kind => self.$field = Arc::clone(&other.$field),)*
                }
            }
        }
    };
}

snapshot_collections! {
    users: User => Users,
    logs: LogEntry => Logs,
    tasks: Task => Tasks,
    task_comments: TaskComment => TaskComments,
    reports: Report => Reports,
    goals: Goal => Goals,
    resources: Resource => Resources,
    evaluations: Evaluation => Evaluations,
    messages: Message => Messages,
    meetings: Meeting => Meetings,
    notifications: Notification => Notifications,
    skills: Skill => Skills,
    skill_assessments: SkillAssessment => SkillAssessments,
    badges: Badge => Badges,
    user_badges: UserBadge => UserBadges,
    leave_requests: LeaveRequest => LeaveRequests,
    site_visits: SiteVisit => SiteVisits,
    attendance_exceptions: AttendanceException => AttendanceExceptions,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从每种类型的原始数组构造快照
    pub fn from_raw<'a, I>(collections: I) -> Self
    where
        I: IntoIterator<Item = (EntityKind, &'a Value)>,
    {
        let mut snapshot = Self::default();
        for (kind, raw) in collections {
            snapshot.load_raw(kind, raw);
        }
        snapshot.with_default_catalogs()
    }

    /// 技能/徽章为空时填入默认目录
    pub fn with_default_catalogs(mut self) -> Self {
        if self.skills.is_empty() {
            self.skills = Arc::new(catalog::default_skills());
        }
        if self.badges.is_empty() {
            self.badges = Arc::new(catalog::default_badges());
        }
        self
    }

    pub fn get<T: Collected>(&self) -> &Arc<Vec<T>> {
        T::slot(self)
    }

    pub fn find<T: Collected>(&self, id: &str) -> Option<&T> {
        T::slot(self).iter().find(|item| item.id() == id)
    }

    /// 追加一条记录
    pub fn insert<T: Collected>(&mut self, item: T) {
        let slot = T::slot_mut(self);
        let mut items = Vec::with_capacity(slot.len() + 1);
        items.extend(slot.iter().cloned());
        items.push(item);
        *slot = Arc::new(items);
    }

    /// 按 ID 原地修改一条记录；找不到时集合保持不变并返回 `false`
    pub fn update_by_id<T, F>(&mut self, id: &str, f: F) -> bool
    where
        T: Collected,
        F: FnOnce(&mut T),
    {
        let slot = T::slot_mut(self);
        let Some(index) = slot.iter().position(|item| item.id() == id) else {
            return false;
        };
        let mut items: Vec<T> = slot.as_ref().clone();
        f(&mut items[index]);
        *slot = Arc::new(items);
        true
    }

    /// 按 ID 删除一条记录；找不到时集合保持不变并返回 `false`
    pub fn remove_by_id<T: Collected>(&mut self, id: &str) -> bool {
        let slot = T::slot_mut(self);
        if !slot.iter().any(|item| item.id() == id) {
            return false;
        }
        let items: Vec<T> = slot.iter().filter(|item| item.id() != id).cloned().collect();
        *slot = Arc::new(items);
        true
    }

    /// 与 `previous` 相比身份发生变化的集合
    pub fn changed_kinds(&self, previous: &Snapshot) -> Vec<EntityKind> {
        EntityKind::ALL
            .iter()
            .copied()
            .filter(|kind| !self.same_collection(previous, *kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn log(id: &str) -> LogEntry {
        LogEntry::normalize(&json!({ "id": id, "student_id": "s1" }))
    }

    #[test]
    fn insert_appends_and_allocates_new_collection() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(log("l1"));
        let before = snapshot.clone();
        snapshot.insert(log("l2"));

        assert_eq!(snapshot.logs.iter().map(|l| l.id.as_str()).collect::<Vec<_>>(), ["l1", "l2"]);
        assert!(!Arc::ptr_eq(&before.logs, &snapshot.logs));
        assert_eq!(before.logs.len(), 1);
        assert_eq!(snapshot.changed_kinds(&before), vec![EntityKind::Logs]);
    }

    #[test]
    fn update_by_id_missing_keeps_identity() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(log("l1"));
        let before = snapshot.clone();

        assert!(!snapshot.update_by_id::<LogEntry, _>("nope", |l| l.hours_worked = 3.0));
        assert!(snapshot.changed_kinds(&before).is_empty());

        assert!(snapshot.update_by_id::<LogEntry, _>("l1", |l| l.status = LogStatus::Approved));
        assert_eq!(snapshot.find::<LogEntry>("l1").unwrap().status, LogStatus::Approved);
        assert_eq!(before.find::<LogEntry>("l1").unwrap().status, LogStatus::Pending);
    }

    #[test]
    fn remove_by_id_only_touches_matching_record() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(log("l1"));
        snapshot.insert(log("l2"));
        let before = snapshot.clone();

        assert!(!snapshot.remove_by_id::<LogEntry>("nope"));
        assert!(Arc::ptr_eq(&before.logs, &snapshot.logs));

        assert!(snapshot.remove_by_id::<LogEntry>("l1"));
        assert_eq!(snapshot.logs.iter().map(|l| l.id.as_str()).collect::<Vec<_>>(), ["l2"]);
        assert_eq!(before.logs.len(), 2);
    }

    #[test]
    fn raw_and_load_raw_cover_every_kind() {
        let mut snapshot = Snapshot::new();
        for kind in EntityKind::ALL {
            snapshot.load_raw(kind, &json!([{ "id": format!("{}-1", kind) }, null]));
        }
        for kind in EntityKind::ALL {
            assert_eq!(snapshot.len_of(kind), 2, "{}", kind);
            assert_eq!(snapshot.raw(kind)[0]["id"], format!("{}-1", kind));
        }
    }

    #[test]
    fn from_raw_fills_default_catalogs() {
        let logs = json!([{ "id": "l1" }]);
        let garbage = json!({ "not": "an array" });
        let snapshot = Snapshot::from_raw([(EntityKind::Logs, &logs), (EntityKind::Tasks, &garbage)]);

        assert_eq!(snapshot.logs.len(), 1);
        assert!(snapshot.tasks.is_empty());
        assert!(!snapshot.skills.is_empty());
        assert!(!snapshot.badges.is_empty());
    }
}
