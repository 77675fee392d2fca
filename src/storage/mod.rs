// 存储模块 - 档案与就诊历史的 JSON 文件存储

// 子模块
pub mod history;
pub mod json_file;
pub mod models;
pub mod profile;

// 重新导出主要类型
pub use history::{
    delta, ChartPoint, Delta, Direction, DynamicsSummary, Favorability, HistoryTracker,
    TrendField, TrendPolicy,
};
pub use models::*;
pub use profile::{bmi, Profile, ProfileStore, PROFILE_FIELDS};

/// 档案文件名
pub const PROFILE_FILE: &str = "profile.json";
/// 就诊历史文件名
pub const HISTORY_FILE: &str = "history.json";
