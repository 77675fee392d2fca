//! 命令模块
//!
//! 交互式 shell 和一次性子命令共用的命令实现，按功能分组：
//! - analysis: 草稿编辑与诊断分析
//! - history: 就诊历史与病情动态
//! - profile: 患者档案
//! - report: 报告导出
//! - config: 配置管理
//!
//! 所有命令返回 `Result<String, String>`，内容直接显示给用户

pub mod analysis;
pub mod config;
pub mod history;
pub mod profile;
pub mod report;

// 重新导出所有命令
pub use analysis::*;
pub use config::*;
pub use history::*;
pub use profile::*;
pub use report::*;
