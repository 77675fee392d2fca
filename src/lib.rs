// 脊柱健康助手 - 主库

// 声明模块
pub mod actors;
pub mod analysis;
pub mod app;
pub mod cli;
pub mod commands;
pub mod llm;
pub mod logger;
pub mod models;
pub mod report;
pub mod session;
pub mod settings;
pub mod shell;
pub mod storage;
pub mod utils;

pub use app::{run, AppState};
pub use cli::Cli;
