pub mod time;

pub use time::TimeFormatter;

/// 客户端生成实体 ID（UUID v4），保证乐观插入不会与服务端 ID 冲突
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
