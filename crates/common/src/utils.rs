//! 通用工具函数

use uuid::Uuid;

/// 生成新的 UUID v7（时间有序）
pub fn new_id() -> Uuid {
    Uuid::now_v7()
}

/// 生成不带连字符的短 ID，用于通知回执等一次性标识
pub fn new_simple_id() -> String {
    Uuid::now_v7().simple().to_string()
}
